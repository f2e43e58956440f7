/*!
 * Overlay UI collaborator.
 *
 * Rendering of dialogs, toasts and loading overlays belongs to the host. The
 * engine describes what to show through [`OverlayUi`] and receives the user's
 * answer back as a [`DialogAction`] event; it never waits on the UI inline.
 */

use std::time::Duration;

use crate::dom::NewElement;
use crate::subtitle_processor::{CaptionTrack, SubtitleFormat};

/// Handle of an open review dialog
pub type DialogId = u64;

/// Handle of a visible loading overlay
pub type LoadingId = u64;

/// Class carried by every button the engine creates
pub const BUTTON_CLASS: &str = "yt-sub-btn";

/// User-facing strings
pub mod messages {
    pub const NO_SUBTITLE: &str = "No Subtitles Available";
    pub const HAVE_SUBTITLE: &str = "Available Subtitles";
    pub const LOADING: &str = "Loading Subtitles...";
    pub const FETCHING: &str = "Fetching subtitles...";
    pub const DOWNLOADING: &str = "Downloading subtitles...";
    pub const COPYING: &str = "Copying subtitles...";
    pub const COPY_SUCCESS: &str = "✓ Copied!";
    pub const ERROR_COPY: &str = "Failed to copy to clipboard";
    pub const ERROR_FETCH: &str = "Failed to fetch subtitles";
    pub const SELECT_SUBTITLE: &str = "Please select at least one subtitle";
    pub const SELECT_VIDEO: &str = "Please select at least one video";
    pub const BULK_TITLE: &str = "Select Subtitles to Download";

    pub const DOWNLOAD_BUTTON: &str = "Download Subtitles";
    pub const BULK_DORMANT_BUTTON: &str = "Get Videos Sub";
    pub const BULK_SELECTING_BUTTON: &str = "Download Subtitles";
    pub const BULK_PROCESSING_BUTTON: &str = "Processing...";
    pub const SELECT_ALL: &str = "Select All";
}

/// One item's block in a review dialog
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSection {
    pub item_id: String,
    pub title: String,
    /// Pickable tracks; empty renders as [`messages::NO_SUBTITLE`]
    pub tracks: Vec<CaptionTrack>,
}

/// Review surface listing pickable tracks and the format choice
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDialog {
    pub heading: String,
    pub sections: Vec<ReviewSection>,
    pub default_format: SubtitleFormat,
}

impl ReviewDialog {
    /// Number of sections with at least one track
    pub fn pickable_sections(&self) -> usize {
        self.sections.iter().filter(|s| !s.tracks.is_empty()).count()
    }
}

/// An (item, track) pair picked in a review dialog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackPick {
    pub item_id: String,
    pub language_code: String,
}

impl TrackPick {
    pub fn new(item_id: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            language_code: language_code.into(),
        }
    }
}

/// User's answer to a review dialog
#[derive(Debug, Clone, PartialEq)]
pub enum DialogAction {
    Download {
        picks: Vec<TrackPick>,
        format: SubtitleFormat,
    },
    Copy {
        picks: Vec<TrackPick>,
        format: SubtitleFormat,
    },
    Close,
}

/// Rendering primitives provided by the host
pub trait OverlayUi: Send + Sync {
    /// Show a review dialog; the answer arrives later as a dialog event
    fn open_dialog(&self, dialog: ReviewDialog) -> DialogId;

    fn close_dialog(&self, dialog: DialogId);

    /// Show a message that disappears after `duration`
    fn show_toast(&self, message: &str, duration: Duration);

    fn show_loading(&self, message: &str) -> LoadingId;

    fn remove_loading(&self, loading: LoadingId);
}

/// Button element with the shared class plus `extra_class`
pub fn button(label: &str, extra_class: Option<&str>) -> NewElement {
    let element = NewElement::new("button")
        .with_class(BUTTON_CLASS)
        .with_text(label);
    match extra_class {
        Some(class) => element.with_class(class),
        None => element,
    }
}
