use anyhow::{Context, Result};
use log::{debug, error, info};
use std::future;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::app_config::Config;
use crate::dom::DocumentTree;
use crate::export::ExportPipeline;
use crate::modes::{
    BulkFlow, EpochSource, FlowContext, FlowEvent, FlowKind, HostEvent, ModeState, PageType, SingleItemFlow,
};
use crate::reconciler::ChangeWatcher;
use crate::ui::OverlayUi;

// @module: Session owner that switches flows with the navigation context

/// Top-level controller of one page session
///
/// Owns the single-item flow while the page is a watch page and the bulk flow
/// for the whole session. Host signals and completions of spawned flow
/// operations are both funnelled through this controller.
pub struct ModeController {
    // @field: Collaborators handed to every flow
    ctx: FlowContext,

    // @field: Live only on watch pages
    single: Option<SingleItemFlow>,

    // @field: Created once at initialization
    bulk: Option<BulkFlow>,

    // @field: Page type seen by the last page check
    page: PageType,

    initialized: bool,
    uninstalled: bool,

    // @field: Whole-document subscription used to notice navigations
    page_watcher: ChangeWatcher,

    // @field: Completions of spawned flow operations
    flow_rx: mpsc::UnboundedReceiver<FlowEvent>,
}

impl ModeController {
    // @method: Create a controller for the given document and collaborators
    pub fn new(
        tree: Arc<dyn DocumentTree>,
        ui: Arc<dyn OverlayUi>,
        pipeline: Arc<ExportPipeline>,
        config: Config,
    ) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let base_url = config.base_url()?;
        let debounce = config.timings.debounce();
        let (events, flow_rx) = mpsc::unbounded_channel();

        let ctx = FlowContext {
            tree,
            ui,
            pipeline,
            config: Arc::new(config),
            base_url,
            epochs: EpochSource::new(),
            events,
        };

        Ok(Self {
            ctx,
            single: None,
            bulk: None,
            page: PageType::Other,
            initialized: false,
            uninstalled: false,
            page_watcher: ChangeWatcher::new(debounce),
            flow_rx,
        })
    }

    /// Create the bulk flow and enter the current page's mode
    ///
    /// Returns `false` when already initialized.
    pub fn initialize(&mut self) -> Result<bool> {
        if self.initialized {
            debug!("Controller already initialized, skipping");
            return Ok(false);
        }

        self.uninstalled = false;
        self.ensure_bulk()?;
        self.handle_page_change()?;

        let tree = &self.ctx.tree;
        self.page_watcher.attach(tree.observe(&[tree.root()]));
        self.initialized = true;
        info!("Controller initialized on {} page", self.page);
        Ok(true)
    }

    /// Re-classify the navigation context and start or stop the single-item flow
    pub fn handle_page_change(&mut self) -> Result<()> {
        let location = self.ctx.tree.location();
        let page = PageType::classify(&location, &self.ctx.config);
        if page != self.page {
            debug!("Page changed from {} to {}", self.page, page);
        }
        self.page = page;

        if page.is_watch() {
            match self.single.as_mut() {
                Some(flow) if flow.is_initialized() => {
                    flow.refresh();
                }
                Some(flow) => {
                    flow.initialize();
                }
                None => {
                    let mut flow =
                        SingleItemFlow::new(self.ctx.clone()).context("Failed to create single-item flow")?;
                    flow.initialize();
                    self.single = Some(flow);
                }
            }
        } else if let Some(mut flow) = self.single.take() {
            flow.teardown();
        }

        if !self.uninstalled {
            self.ensure_bulk()?;
        }
        Ok(())
    }

    /// Route one host signal; returns whether any flow handled it
    pub fn handle_host_event(&mut self, event: HostEvent) -> Result<bool> {
        match event {
            HostEvent::NavigationFinished => {
                self.handle_page_change()?;
                Ok(true)
            }
            HostEvent::Clicked(node) => {
                let single = self.single.as_mut().is_some_and(|flow| flow.handle_click(node));
                Ok(single || self.bulk.as_mut().is_some_and(|flow| flow.handle_click(node)))
            }
            HostEvent::Toggled { control, checked } => Ok(self
                .bulk
                .as_mut()
                .is_some_and(|flow| flow.handle_toggle(control, checked))),
            HostEvent::Dialog { dialog, action } => {
                if let Some(flow) = self.single.as_mut() {
                    if flow.handle_dialog(dialog, action.clone()) {
                        return Ok(true);
                    }
                }
                Ok(self
                    .bulk
                    .as_mut()
                    .is_some_and(|flow| flow.handle_dialog(dialog, action)))
            }
            HostEvent::Uninstall => {
                self.uninstall();
                Ok(true)
            }
        }
    }

    /// Apply the completion of a spawned operation
    ///
    /// The loading overlay is always removed. The result itself is dropped
    /// when its flow is gone or has moved to a newer epoch.
    pub fn handle_flow_event(&mut self, event: FlowEvent) {
        self.ctx.ui.remove_loading(event.loading());

        let epoch = event.epoch();
        match event.owner() {
            FlowKind::Single => match self.single.as_mut() {
                Some(flow) if flow.epoch() == epoch => flow.handle_event(event),
                _ => debug!("Discarding stale single-item result from epoch {}", epoch),
            },
            FlowKind::Bulk => match self.bulk.as_mut() {
                Some(flow) if flow.epoch() == epoch => flow.handle_event(event),
                _ => debug!("Discarding stale bulk result from epoch {}", epoch),
            },
        }
    }

    /// Wait for the next completion and apply it
    ///
    /// Returns `false` only if no flow can send events anymore.
    pub async fn process_flow_event(&mut self) -> bool {
        match self.flow_rx.recv().await {
            Some(event) => {
                self.handle_flow_event(event);
                true
            }
            None => false,
        }
    }

    /// Current states; `Idle` when no flow is engaged
    pub fn mode_states(&self) -> Vec<ModeState> {
        let mut states = Vec::new();
        if self.single.as_ref().is_some_and(SingleItemFlow::is_initialized) {
            states.push(ModeState::SingleActive);
        }
        if let Some(state) = self.bulk.as_ref().and_then(BulkFlow::mode_state) {
            states.push(state);
        }
        if states.is_empty() {
            states.push(ModeState::Idle);
        }
        states
    }

    pub fn page_type(&self) -> PageType {
        self.page
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn single(&self) -> Option<&SingleItemFlow> {
        self.single.as_ref()
    }

    pub fn bulk(&self) -> Option<&BulkFlow> {
        self.bulk.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Remove every control and stop observing
    pub fn uninstall(&mut self) {
        info!("Uninstalling controller");
        if let Some(mut flow) = self.single.take() {
            flow.teardown();
        }
        if let Some(mut flow) = self.bulk.take() {
            flow.uninstall();
        }
        self.page_watcher.detach();
        self.uninstalled = true;
        self.initialized = false;
    }

    /// Drive the session until the host stops or asks for uninstall
    pub async fn run(mut self, mut host_events: mpsc::UnboundedReceiver<HostEvent>) -> Result<()> {
        self.initialize()?;

        loop {
            tokio::select! {
                event = host_events.recv() => match event {
                    Some(HostEvent::Uninstall) | None => {
                        self.uninstall();
                        break;
                    }
                    Some(event) => {
                        if let Err(e) = self.handle_host_event(event) {
                            error!("Failed to handle host event: {}", e);
                        }
                    }
                },
                Some(event) = self.flow_rx.recv() => self.handle_flow_event(event),
                _ = self.page_watcher.quiesced(|_| true) => {
                    let page = PageType::classify(&self.ctx.tree.location(), &self.ctx.config);
                    if page != self.page {
                        if let Err(e) = self.handle_page_change() {
                            error!("Failed to switch mode: {}", e);
                        }
                    }
                }
                _ = single_change(&mut self.single) => {}
                _ = bulk_pass(&mut self.bulk) => {}
            }
        }

        debug!("Controller stopped");
        Ok(())
    }

    fn ensure_bulk(&mut self) -> Result<()> {
        if self.bulk.is_none() {
            let mut flow = BulkFlow::new(self.ctx.clone()).context("Failed to create bulk flow")?;
            flow.initialize();
            self.bulk = Some(flow);
        }
        Ok(())
    }
}

async fn single_change(flow: &mut Option<SingleItemFlow>) {
    match flow {
        Some(flow) => {
            flow.wait_for_change().await;
        }
        None => future::pending::<()>().await,
    }
}

async fn bulk_pass(flow: &mut Option<BulkFlow>) {
    match flow {
        Some(flow) => {
            flow.wait_for_pass().await;
        }
        None => future::pending::<()>().await,
    }
}
