/*!
 * Multi-item flow.
 *
 * Created once per session and kept across navigations. A floating button
 * cycles the flow through three states:
 *
 * - Dormant: only the button is visible
 * - Selecting: every item element carries a checkbox, kept in place by the
 *   reconciler; the button starts discovery for the selected items
 * - Reviewing: the review dialog lists every selected item with its tracks
 *
 * Closing the dialog removes the checkboxes and clears the selection.
 */

use std::sync::Arc;

use log::{debug, warn};

use crate::dom::{InsertPosition, NewElement, NodeId};
use crate::errors::{FetchError, SelectorError};
use crate::export::{resolve_picks, HeaderStyle};
use crate::reconciler::{PassReport, Reconciler, ReconcilerSelectors};
use crate::selection::SelectionModel;
use crate::subtitle_processor::{CaptionTrack, SubtitleFormat};
use crate::ui::{self, messages, DialogAction, DialogId, ReviewDialog, ReviewSection, TrackPick};

use super::{report_export, Epoch, ExportOutcome, FlowContext, FlowEvent, FlowKind, ModeState};

/// Id of the select-all checkbox
pub const SELECT_ALL_ID: &str = "select-all";

/// Selection sub-state of the bulk flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkState {
    Dormant,
    Selecting,
    Reviewing,
}

/// Floating controls owned by the flow
#[derive(Debug, Clone, Copy)]
struct FloatingControls {
    toggle: NodeId,
    select_all_container: NodeId,
    select_all: NodeId,
}

/// Multi-item selection and export flow
pub struct BulkFlow {
    ctx: FlowContext,
    epoch: Epoch,
    state: BulkState,
    reconciler: Reconciler,
    selection: SelectionModel,
    controls: Option<FloatingControls>,
    dialog: Option<DialogId>,
    processing: bool,
    initialized: bool,
}

impl BulkFlow {
    pub fn new(ctx: FlowContext) -> Result<Self, SelectorError> {
        let selectors = ReconcilerSelectors::from_config(&ctx.config.selectors)?;
        let reconciler = Reconciler::new(
            Arc::clone(&ctx.tree),
            selectors,
            ctx.base_url.clone(),
            ctx.config.site.item_param.clone(),
            ctx.config.timings.debounce(),
        );
        let epoch = ctx.epochs.issue();
        debug!("Created bulk flow {}", epoch);

        Ok(Self {
            ctx,
            epoch,
            state: BulkState::Dormant,
            reconciler,
            selection: SelectionModel::new(),
            controls: None,
            dialog: None,
            processing: false,
            initialized: false,
        })
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn state(&self) -> BulkState {
        self.state
    }

    /// Mode state contributed by this flow, if any
    pub fn mode_state(&self) -> Option<ModeState> {
        match self.state {
            BulkState::Dormant => None,
            BulkState::Selecting => Some(ModeState::BulkSelecting),
            BulkState::Reviewing => Some(ModeState::BulkReviewing),
        }
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn dialog(&self) -> Option<DialogId> {
        self.dialog
    }

    /// The floating toggle button
    pub fn toggle_button(&self) -> Option<NodeId> {
        self.controls.map(|c| c.toggle)
    }

    /// The select-all checkbox
    pub fn select_all_control(&self) -> Option<NodeId> {
        self.controls.map(|c| c.select_all)
    }

    /// Create the floating controls; no-op when already initialized
    pub fn initialize(&mut self) -> bool {
        if self.initialized {
            debug!("Bulk flow already initialized, skipping");
            return false;
        }

        match self.create_controls() {
            Ok(controls) => {
                self.controls = Some(controls);
                self.initialized = true;
                true
            }
            Err(e) => {
                warn!("Failed to create bulk controls: {}", e);
                false
            }
        }
    }

    /// Wait for new item elements and decorate them
    ///
    /// Pends forever unless the flow is selecting.
    pub async fn wait_for_pass(&mut self) -> PassReport {
        self.reconciler.wait_for_pass(&self.selection).await
    }

    /// Handle a click; returns whether the node is this flow's toggle button
    pub fn handle_click(&mut self, node: NodeId) -> bool {
        if self.toggle_button() != Some(node) {
            return false;
        }

        match self.state {
            BulkState::Dormant => self.start_selection(),
            BulkState::Selecting => self.process_selected(),
            BulkState::Reviewing => debug!("Review dialog already open, ignoring toggle"),
        }
        true
    }

    /// Handle a checkbox change; returns whether the control belongs to this flow
    pub fn handle_toggle(&mut self, control: NodeId, checked: bool) -> bool {
        if self.select_all_control() == Some(control) {
            if self.processing {
                debug!("Ignoring select all while fetching");
            } else {
                let changed = self.reconciler.select_all(checked, &mut self.selection);
                debug!("Select all ({}) changed {} checkbox(es)", checked, changed);
            }
            return true;
        }

        if self.reconciler.owns(control) {
            self.reconciler.toggle(control, checked, &mut self.selection);
            return true;
        }
        false
    }

    /// Apply a flow event issued under the current epoch
    pub fn handle_event(&mut self, event: FlowEvent) {
        match event {
            FlowEvent::PrefetchFinished { results, .. } => self.finish_prefetch(results),
            FlowEvent::ExportFinished { outcome, .. } => report_export(&self.ctx, outcome),
            FlowEvent::TracksDiscovered { .. } => {
                warn!("Bulk flow received a single-item discovery result");
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
                self.cleanup();
            }
            DialogAction::Download { picks, format } => self.start_export(&picks, format, false),
            DialogAction::Copy { picks, format } => self.start_export(&picks, format, true),
        }
        true
    }

    /// Leave selection: remove checkboxes, clear the selection, reset the
    /// controls and move to a new epoch
    ///
    /// Skipped while discovery is in flight. Returns whether it ran.
    pub fn cleanup(&mut self) -> bool {
        if self.processing {
            debug!("Processing in progress, skipping cleanup");
            return false;
        }

        self.reconciler.deactivate();
        self.selection.clear();
        if let Some(controls) = self.controls {
            let tree = &self.ctx.tree;
            let results = [
                tree.set_text(controls.toggle, messages::BULK_DORMANT_BUTTON),
                tree.set_style(controls.select_all_container, "display", Some("none")),
                tree.set_attribute(controls.select_all, "checked", None),
            ];
            for result in results {
                if let Err(e) = result {
                    debug!("Bulk control already gone: {}", e);
                }
            }
        }
        self.state = BulkState::Dormant;
        self.epoch = self.ctx.epochs.issue();
        true
    }

    /// Remove everything the flow added to the page
    pub fn uninstall(&mut self) {
        debug!("Uninstalling bulk flow");
        self.processing = false;
        if let Some(dialog) = self.dialog.take() {
            self.ctx.ui.close_dialog(dialog);
        }
        self.cleanup();
        if let Some(controls) = self.controls.take() {
            self.ctx.tree.remove(controls.toggle);
            self.ctx.tree.remove(controls.select_all_container);
        }
        self.initialized = false;
    }

    fn create_controls(&self) -> Result<FloatingControls, crate::errors::TreeError> {
        let tree = &self.ctx.tree;
        let root = tree.root();

        let toggle = tree.insert(
            root,
            ui::button(messages::BULK_DORMANT_BUTTON, Some("yt-sub-bulk-btn"))
                .with_style("position", "fixed")
                .with_style("right", "20px")
                .with_style("top", "80px")
                .with_style("z-index", "9999"),
            InsertPosition::Append,
        )?;

        let select_all_container = tree.insert(
            root,
            NewElement::new("div")
                .with_class("yt-sub-select-all")
                .with_style("position", "fixed")
                .with_style("right", "20px")
                .with_style("top", "130px")
                .with_style("z-index", "9999")
                .with_style("display", "none"),
            InsertPosition::Append,
        )?;
        let select_all = tree.insert(
            select_all_container,
            NewElement::new("input")
                .with_id(SELECT_ALL_ID)
                .with_attribute("type", "checkbox"),
            InsertPosition::Append,
        )?;
        tree.insert(
            select_all_container,
            NewElement::new("label")
                .with_attribute("for", SELECT_ALL_ID)
                .with_text(messages::SELECT_ALL),
            InsertPosition::Append,
        )?;

        Ok(FloatingControls {
            toggle,
            select_all_container,
            select_all,
        })
    }

    fn start_selection(&mut self) {
        debug!("Starting selection mode");
        self.state = BulkState::Selecting;
        if let Some(controls) = self.controls {
            let tree = &self.ctx.tree;
            if let Err(e) = tree
                .set_text(controls.toggle, messages::BULK_SELECTING_BUTTON)
                .and_then(|_| tree.set_style(controls.select_all_container, "display", Some("flex")))
            {
                warn!("Failed to update bulk controls: {}", e);
            }
        }
        self.reconciler.activate(&self.selection);
    }

    fn process_selected(&mut self) {
        if self.processing {
            return;
        }
        if self.selection.is_empty() {
            self.ctx.toast(messages::SELECT_VIDEO);
            return;
        }

        self.processing = true;
        self.set_toggle_busy(true);
        let loading = self.ctx.ui.show_loading(messages::FETCHING);
        let ids = self.selection.ids();
        debug!("Fetching tracks for {} item(s)", ids.len());

        let ctx = self.ctx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let results = ctx.pipeline.prefetch(ids).await;
            ctx.send(FlowEvent::PrefetchFinished {
                epoch,
                loading,
                results,
            });
        });
    }

    fn finish_prefetch(&mut self, results: Vec<(String, Result<Vec<CaptionTrack>, FetchError>)>) {
        self.processing = false;
        self.set_toggle_busy(false);

        let mut failed = 0;
        for (id, result) in results {
            match result {
                // items deselected meanwhile are not stored
                Ok(tracks) => {
                    self.selection.set_tracks(&id, tracks);
                }
                Err(_) => failed += 1,
            }
        }
        if failed > 0 {
            debug!("{} item(s) failed discovery and will show no subtitles", failed);
        }

        if self.selection.is_empty() {
            self.ctx.toast(messages::SELECT_VIDEO);
            return;
        }

        let mut sections: Vec<ReviewSection> = self
            .selection
            .entries()
            .map(|(id, record)| ReviewSection {
                item_id: id.clone(),
                title: record.title.clone(),
                tracks: record.tracks.clone().unwrap_or_default(),
            })
            .collect();
        sections.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.item_id.cmp(&b.item_id)));

        let dialog = ReviewDialog {
            heading: messages::BULK_TITLE.to_string(),
            sections,
            default_format: SubtitleFormat::default(),
        };
        self.dialog = Some(self.ctx.ui.open_dialog(dialog));
        self.state = BulkState::Reviewing;
    }

    fn set_toggle_busy(&self, busy: bool) {
        let Some(controls) = self.controls else {
            return;
        };
        let tree = &self.ctx.tree;
        let (label, disabled) = if busy {
            (messages::BULK_PROCESSING_BUTTON, Some(""))
        } else {
            (messages::BULK_SELECTING_BUTTON, None)
        };
        if let Err(e) = tree
            .set_text(controls.toggle, label)
            .and_then(|_| tree.set_attribute(controls.toggle, "disabled", disabled))
        {
            debug!("Toggle button already gone: {}", e);
        }
    }

    fn start_export(&mut self, picks: &[TrackPick], format: SubtitleFormat, copy: bool) {
        let jobs = resolve_picks(&self.selection, picks);
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
                ExportOutcome::Copied(ctx.pipeline.copy(&jobs, format, HeaderStyle::ItemAndTrack).await)
            } else {
                ExportOutcome::Downloaded(ctx.pipeline.download(&jobs, format).await)
            };
            ctx.send(FlowEvent::ExportFinished {
                owner: FlowKind::Bulk,
                epoch,
                loading,
                outcome,
            });
        });
    }
}
