/*!
 * Export pipeline.
 *
 * Turns picked tracks into downloads or one clipboard payload. Exports run
 * sequentially with a fixed pause between downloads so the host does not
 * throttle them; discovery for many items runs concurrently and never fails
 * as a whole.
 */

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, error};

use crate::errors::{ClipboardError, ExportError, FetchError};
use crate::file_utils::{subtitle_filename, with_bom};
use crate::selection::SelectionModel;
use crate::subtitle_processor::{CaptionTrack, SubtitleFormat, TrackCodec};
use crate::ui::TrackPick;

/// Destination of exported content
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Emit one named download
    async fn emit_file(&self, filename: &str, contents: &str) -> Result<(), ExportError>;

    /// Replace the clipboard contents
    async fn write_clipboard(&self, text: &str) -> Result<(), ClipboardError>;
}

/// One track to export together with the title of its item
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    pub title: String,
    pub track: CaptionTrack,
}

impl ExportJob {
    pub fn new(title: impl Into<String>, track: CaptionTrack) -> Self {
        Self {
            title: title.into(),
            track,
        }
    }

    pub fn filename(&self, format: SubtitleFormat) -> String {
        subtitle_filename(&self.title, &self.track.language_code, format)
    }

    /// Clipboard section header
    pub fn header(&self, style: HeaderStyle) -> String {
        match style {
            HeaderStyle::Track => format!("=== {} ===", self.track.language_name),
            HeaderStyle::ItemAndTrack => {
                format!("=== {} - {} ===", self.title, self.track.language_name)
            }
        }
    }
}

/// How clipboard sections are headed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStyle {
    /// Language name only, for a single item
    Track,
    /// Item title and language name, for many items
    ItemAndTrack,
}

/// Resolve picks through the selection; picks whose item or track is gone
/// are skipped
pub fn resolve_picks(selection: &SelectionModel, picks: &[TrackPick]) -> Vec<ExportJob> {
    picks
        .iter()
        .filter_map(|pick| {
            let record = selection.get(&pick.item_id)?;
            let track = record.track(&pick.language_code)?;
            Some(ExportJob::new(record.title.clone(), track.clone()))
        })
        .collect()
}

/// Fetch, convert and emit picked tracks
pub struct ExportPipeline {
    codec: Arc<TrackCodec>,
    sink: Arc<dyn ExportSink>,
    pacing: Duration,
}

impl ExportPipeline {
    pub fn new(codec: Arc<TrackCodec>, sink: Arc<dyn ExportSink>, pacing: Duration) -> Self {
        Self { codec, sink, pacing }
    }

    pub fn codec(&self) -> &Arc<TrackCodec> {
        &self.codec
    }

    /// Emit each job as a download, in order, stopping at the first failure
    ///
    /// Returns the number of files emitted.
    pub async fn download(&self, jobs: &[ExportJob], format: SubtitleFormat) -> Result<usize, ExportError> {
        if jobs.is_empty() {
            return Err(ExportError::NothingSelected);
        }

        for (i, job) in jobs.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            let content = self.codec.fetch_and_convert(&job.track, format).await?;
            let filename = job.filename(format);
            self.sink.emit_file(&filename, &with_bom(&content)).await?;
            debug!("Emitted {} ({}/{})", filename, i + 1, jobs.len());
        }

        Ok(jobs.len())
    }

    /// Aggregate all jobs under headers and write them to the clipboard
    ///
    /// Nothing is written when any job fails. Returns the written payload.
    pub async fn copy(
        &self,
        jobs: &[ExportJob],
        format: SubtitleFormat,
        style: HeaderStyle,
    ) -> Result<String, ExportError> {
        if jobs.is_empty() {
            return Err(ExportError::NothingSelected);
        }

        let mut payload = String::new();
        for job in jobs {
            let content = self.codec.fetch_and_convert(&job.track, format).await?;
            payload.push_str(&job.header(style));
            payload.push('\n');
            payload.push_str(&content);
            payload.push_str("\n\n");
        }

        self.sink.write_clipboard(&payload).await?;
        debug!("Copied {} track(s) to the clipboard", jobs.len());
        Ok(payload)
    }

    /// Discover tracks for every id concurrently and wait for all to settle
    ///
    /// Results come back in input order; failures are logged and returned
    /// per item.
    pub async fn prefetch(&self, ids: Vec<String>) -> Vec<(String, Result<Vec<CaptionTrack>, FetchError>)> {
        let lookups = ids.into_iter().map(|id| async move {
            let result = self.codec.discover_tracks(&id).await;
            if let Err(e) = &result {
                error!("Failed to fetch subtitles for item {}: {}", id, e);
            }
            (id, result)
        });
        join_all(lookups).await
    }
}
