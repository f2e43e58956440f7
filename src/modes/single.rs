/*!
 * Single-item flow.
 *
 * Lives while the navigation context is a watch page. Installs one download
 * button in the watch container, discovers the item's tracks on every click
 * and exports the tracks picked in the review dialog.
 */

use log::{debug, error, warn};
use tokio::time::Instant;

use crate::dom::{InsertPosition, NodeId, Selector};
use crate::errors::SelectorError;
use crate::export::{ExportJob, HeaderStyle};
use crate::reconciler::{ChangeWatcher, UNTITLED};
use crate::subtitle_processor::{CaptionTrack, SubtitleFormat};
use crate::ui::{self, messages, DialogAction, DialogId, ReviewDialog, ReviewSection, TrackPick};

use super::{report_export, Epoch, ExportOutcome, FlowContext, FlowEvent, FlowKind};

/// What the flow is currently showing a button for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemIdentity {
    pub item_id: String,
    /// Full location, so that the same item under new parameters counts as a change
    pub location: String,
}

/// Download button flow for the item of a watch page
pub struct SingleItemFlow {
    ctx: FlowContext,
    epoch: Epoch,
    container: Selector,
    app_root: Selector,
    stale_buttons: Selector,
    watcher: ChangeWatcher,
    identity: Option<ItemIdentity>,
    button: Option<NodeId>,
    install_deadline: Option<Instant>,
    tracks: Option<Vec<CaptionTrack>>,
    dialog: Option<DialogId>,
    initialized: bool,
}

impl SingleItemFlow {
    pub fn new(ctx: FlowContext) -> Result<Self, SelectorError> {
        let selectors = &ctx.config.selectors;
        let container = Selector::parse(&selectors.watch_container)?;
        let app_root = Selector::parse(&selectors.app_root)?;
        let stale_buttons = Selector::parse(&format!(".{}", ui::BUTTON_CLASS))?;
        let watcher = ChangeWatcher::new(ctx.config.timings.debounce());
        let epoch = ctx.epochs.issue();
        debug!("Created single-item flow {}", epoch);

        Ok(Self {
            ctx,
            epoch,
            container,
            app_root,
            stale_buttons,
            watcher,
            identity: None,
            button: None,
            install_deadline: None,
            tracks: None,
            dialog: None,
            initialized: false,
        })
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn identity(&self) -> Option<&ItemIdentity> {
        self.identity.as_ref()
    }

    pub fn button(&self) -> Option<NodeId> {
        self.button
    }

    /// Tracks of the last discovery, kept only while its dialog is open
    pub fn tracks(&self) -> Option<&[CaptionTrack]> {
        self.tracks.as_deref()
    }

    pub fn dialog(&self) -> Option<DialogId> {
        self.dialog
    }

    /// Start observing and install the button; no-op when already initialized
    pub fn initialize(&mut self) -> bool {
        if self.initialized {
            debug!("Single-item flow already initialized, skipping");
            return false;
        }

        let tree = &self.ctx.tree;
        let root = tree.root();
        let scope = tree.query_selector(root, &self.app_root).unwrap_or(root);
        self.watcher.attach(tree.observe(&[scope]));
        self.initialized = true;
        self.refresh();
        true
    }

    /// Re-derive the identity and rebuild the button only when it changed
    ///
    /// Returns whether setup ran again.
    pub fn refresh(&mut self) -> bool {
        if !self.initialized {
            return false;
        }

        let identity = self.derive_identity();
        if identity != self.identity {
            debug!(
                "Item changed from {:?} to {:?}",
                self.identity.as_ref().map(|i| &i.item_id),
                identity.as_ref().map(|i| &i.item_id)
            );
            self.identity = identity;
            self.tracks = None;
            self.epoch = self.ctx.epochs.issue();
            self.remove_button();
            self.install_deadline = self
                .identity
                .as_ref()
                .map(|_| Instant::now() + self.ctx.config.timings.container_timeout());
            self.try_install();
            return true;
        }

        if let Some(button) = self.button {
            if !self.ctx.tree.is_connected(button) {
                debug!("Download button was removed by the page, reinstalling");
                self.button = None;
                self.install_deadline =
                    Some(Instant::now() + self.ctx.config.timings.container_timeout());
            }
        }
        if self.button.is_none() && self.install_deadline.is_some() {
            self.try_install();
        }
        false
    }

    /// Wait for a quiet burst of changes, then refresh
    pub async fn wait_for_change(&mut self) -> bool {
        self.watcher.quiesced(|_| true).await;
        self.refresh()
    }

    /// Handle a click; returns whether the node is this flow's button
    pub fn handle_click(&mut self, node: NodeId) -> bool {
        if self.button != Some(node) {
            return false;
        }
        let Some(identity) = self.identity.clone() else {
            return true;
        };

        debug!("Download button clicked for item {}", identity.item_id);
        // no caching across clicks
        self.tracks = None;
        let loading = self.ctx.ui.show_loading(messages::LOADING);
        let ctx = self.ctx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = ctx.pipeline.codec().discover_tracks(&identity.item_id).await;
            ctx.send(FlowEvent::TracksDiscovered {
                epoch,
                loading,
                item_id: identity.item_id,
                result,
            });
        });
        true
    }

    /// Apply a flow event issued under the current epoch
    pub fn handle_event(&mut self, event: FlowEvent) {
        match event {
            FlowEvent::TracksDiscovered { item_id, result, .. } => match result {
                Ok(tracks) if tracks.is_empty() => {
                    debug!("No tracks for item {}", item_id);
                    self.ctx.toast(messages::NO_SUBTITLE);
                }
                Ok(tracks) => self.open_review(item_id, tracks),
                Err(e) => {
                    error!("Failed to fetch subtitles for item {}: {}", item_id, e);
                    self.ctx.toast(messages::ERROR_FETCH);
                }
            },
            FlowEvent::ExportFinished { outcome, .. } => report_export(&self.ctx, outcome),
            FlowEvent::PrefetchFinished { .. } => {
                warn!("Single-item flow received a bulk prefetch result");
            }
        }
    }

    /// Handle a dialog answer; returns whether the dialog belongs to this flow
    pub fn handle_dialog(&mut self, dialog: DialogId, action: DialogAction) -> bool {
        if self.dialog != Some(dialog) {
            return false;
        }

        match action {
            DialogAction::Close => {
                self.ctx.ui.close_dialog(dialog);
                self.dialog = None;
                self.tracks = None;
            }
            DialogAction::Download { picks, format } => self.start_export(&picks, format, false),
            DialogAction::Copy { picks, format } => self.start_export(&picks, format, true),
        }
        true
    }

    /// Remove the button, stop observing and forget the item
    ///
    /// Safe to call at any point, including after a partial setup.
    pub fn teardown(&mut self) {
        debug!("Tearing down single-item flow {}", self.epoch);
        self.watcher.detach();
        self.remove_button();
        if let Some(dialog) = self.dialog.take() {
            self.ctx.ui.close_dialog(dialog);
        }
        self.tracks = None;
        self.identity = None;
        self.install_deadline = None;
        self.epoch = self.ctx.epochs.issue();
        self.initialized = false;
    }

    fn derive_identity(&self) -> Option<ItemIdentity> {
        let location = self.ctx.tree.location();
        let item_id = crate::dom::query_param(
            &self.ctx.base_url,
            &location,
            &self.ctx.config.site.item_param,
        )?;
        Some(ItemIdentity { item_id, location })
    }

    fn try_install(&mut self) {
        let Some(deadline) = self.install_deadline else {
            return;
        };

        let tree = &self.ctx.tree;
        let Some(container) = tree.query_selector(tree.root(), &self.container) else {
            if Instant::now() >= deadline {
                debug!("Container {} not found, giving up", self.container);
                self.install_deadline = None;
            }
            return;
        };

        for stale in tree.query_selector_all(container, &self.stale_buttons) {
            tree.remove(stale);
        }
        match tree.insert(
            container,
            ui::button(messages::DOWNLOAD_BUTTON, None),
            InsertPosition::Append,
        ) {
            Ok(button) => {
                debug!("Download button added");
                self.button = Some(button);
                self.install_deadline = None;
            }
            Err(e) => warn!("Failed to add download button: {}", e),
        }
    }

    fn remove_button(&mut self) {
        if let Some(button) = self.button.take() {
            self.ctx.tree.remove(button);
        }
    }

    fn open_review(&mut self, item_id: String, tracks: Vec<CaptionTrack>) {
        if let Some(previous) = self.dialog.take() {
            self.ctx.ui.close_dialog(previous);
        }
        self.tracks = Some(tracks.clone());
        let dialog = ReviewDialog {
            heading: messages::HAVE_SUBTITLE.to_string(),
            sections: vec![ReviewSection {
                item_id,
                title: self.document_title(),
                tracks,
            }],
            default_format: SubtitleFormat::default(),
        };
        self.dialog = Some(self.ctx.ui.open_dialog(dialog));
    }

    fn document_title(&self) -> String {
        let title = self.ctx.tree.title();
        let title = title.trim();
        if title.is_empty() {
            UNTITLED.to_string()
        } else {
            title.to_string()
        }
    }

    fn start_export(&mut self, picks: &[TrackPick], format: SubtitleFormat, copy: bool) {
        let title = self.document_title();
        let jobs: Vec<ExportJob> = match (&self.tracks, &self.identity) {
            (Some(tracks), Some(identity)) => picks
                .iter()
                .filter(|pick| pick.item_id == identity.item_id)
                .filter_map(|pick| tracks.iter().find(|t| t.language_code == pick.language_code))
                .map(|track| ExportJob::new(title.clone(), track.clone()))
                .collect(),
            _ => Vec::new(),
        };

        if jobs.is_empty() {
            self.ctx.toast(messages::SELECT_SUBTITLE);
            return;
        }

        let message = if copy { messages::COPYING } else { messages::DOWNLOADING };
        let loading = self.ctx.ui.show_loading(message);
        let ctx = self.ctx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let outcome = if copy {
                ExportOutcome::Copied(ctx.pipeline.copy(&jobs, format, HeaderStyle::Track).await)
            } else {
                ExportOutcome::Downloaded(ctx.pipeline.download(&jobs, format).await)
            };
            ctx.send(FlowEvent::ExportFinished {
                owner: FlowKind::Single,
                epoch,
                loading,
                outcome,
            });
        });
    }
}
