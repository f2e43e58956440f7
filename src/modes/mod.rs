/*!
 * Page modes and their flows.
 *
 * - `single`: download button for the item on a watch page, rebuilt on
 *   every navigation
 * - `bulk`: floating multi-item selection, alive for the whole session
 *
 * Flows never block on I/O. Long operations run as spawned tasks that report
 * back through [`FlowEvent`]s tagged with the [`Epoch`] they were issued
 * under; a flow ignores results whose epoch it has moved past.
 */

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::mpsc;
use url::Url;

use crate::app_config::Config;
use crate::dom::{DocumentTree, NodeId};
use crate::errors::{ExportError, FetchError};
use crate::export::ExportPipeline;
use crate::subtitle_processor::CaptionTrack;
use crate::ui::{messages, DialogAction, DialogId, LoadingId, OverlayUi};

pub mod bulk;
pub mod single;

pub use bulk::{BulkFlow, BulkState};
pub use single::{ItemIdentity, SingleItemFlow};

/// Classification of the current navigation context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    Watch,
    Search,
    Home,
    Other,
}

impl PageType {
    /// Classify `location` by its path
    pub fn classify(location: &str, config: &Config) -> Self {
        let Ok(url) = Url::parse(location) else {
            return PageType::Other;
        };
        let path = url.path();
        if path == config.site.watch_path {
            PageType::Watch
        } else if path == config.site.search_path {
            PageType::Search
        } else if path == config.site.home_path {
            PageType::Home
        } else {
            PageType::Other
        }
    }

    pub fn is_watch(&self) -> bool {
        matches!(self, PageType::Watch)
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageType::Watch => "watch",
            PageType::Search => "search",
            PageType::Home => "home",
            PageType::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// Combined state of the session's modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Idle,
    SingleActive,
    BulkSelecting,
    BulkReviewing,
}

/// Generation of a flow instance or of one of its sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Session-wide epoch counter; every issued epoch is unique
#[derive(Debug, Clone, Default)]
pub struct EpochSource {
    next: Arc<AtomicU64>,
}

impl EpochSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Epoch {
        Epoch(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Flow that issued an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Single,
    Bulk,
}

/// Signals delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The host finished a client-side navigation
    NavigationFinished,
    /// An element was clicked
    Clicked(NodeId),
    /// A checkbox changed state
    Toggled { control: NodeId, checked: bool },
    /// The user answered a review dialog
    Dialog { dialog: DialogId, action: DialogAction },
    /// Remove every control and stop
    Uninstall,
}

/// Result of an export started by a flow
#[derive(Debug)]
pub enum ExportOutcome {
    Downloaded(Result<usize, ExportError>),
    Copied(Result<String, ExportError>),
}

/// Completion of a spawned flow operation
#[derive(Debug)]
pub enum FlowEvent {
    /// Single-item discovery finished
    TracksDiscovered {
        epoch: Epoch,
        loading: LoadingId,
        item_id: String,
        result: Result<Vec<CaptionTrack>, FetchError>,
    },
    /// Bulk discovery for every selected item settled
    PrefetchFinished {
        epoch: Epoch,
        loading: LoadingId,
        results: Vec<(String, Result<Vec<CaptionTrack>, FetchError>)>,
    },
    /// An export finished
    ExportFinished {
        owner: FlowKind,
        epoch: Epoch,
        loading: LoadingId,
        outcome: ExportOutcome,
    },
}

impl FlowEvent {
    pub fn owner(&self) -> FlowKind {
        match self {
            FlowEvent::TracksDiscovered { .. } => FlowKind::Single,
            FlowEvent::PrefetchFinished { .. } => FlowKind::Bulk,
            FlowEvent::ExportFinished { owner, .. } => *owner,
        }
    }

    pub fn epoch(&self) -> Epoch {
        match self {
            FlowEvent::TracksDiscovered { epoch, .. }
            | FlowEvent::PrefetchFinished { epoch, .. }
            | FlowEvent::ExportFinished { epoch, .. } => *epoch,
        }
    }

    pub fn loading(&self) -> LoadingId {
        match self {
            FlowEvent::TracksDiscovered { loading, .. }
            | FlowEvent::PrefetchFinished { loading, .. }
            | FlowEvent::ExportFinished { loading, .. } => *loading,
        }
    }
}

/// Collaborators shared by both flows
#[derive(Clone)]
pub struct FlowContext {
    pub tree: Arc<dyn DocumentTree>,
    pub ui: Arc<dyn OverlayUi>,
    pub pipeline: Arc<ExportPipeline>,
    pub config: Arc<Config>,
    pub base_url: Url,
    pub epochs: EpochSource,
    pub events: mpsc::UnboundedSender<FlowEvent>,
}

impl FlowContext {
    /// Deliver a flow event; dropped silently once the controller is gone
    pub fn send(&self, event: FlowEvent) {
        if self.events.send(event).is_err() {
            debug!("Flow event dropped, controller is gone");
        }
    }

    /// Show the generic transient notification
    pub fn toast(&self, message: &str) {
        self.ui.show_toast(message, self.config.timings.toast());
    }
}

/// Surface the outcome of an export as one notification
pub(crate) fn report_export(ctx: &FlowContext, outcome: ExportOutcome) {
    match outcome {
        ExportOutcome::Downloaded(Ok(count)) => info!("Downloaded {} subtitle file(s)", count),
        ExportOutcome::Copied(Ok(_)) => ctx.toast(messages::COPY_SUCCESS),
        ExportOutcome::Copied(Err(e)) => {
            error!("Copy error: {}", e);
            ctx.toast(messages::ERROR_COPY);
        }
        ExportOutcome::Downloaded(Err(e)) => {
            error!("Download error: {}", e);
            ctx.toast(messages::ERROR_FETCH);
        }
    }
}
