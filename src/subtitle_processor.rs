use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use log::{debug, warn};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::app_config::Config;
use crate::errors::{ConversionError, ExportError, FetchError};
use crate::language_utils;
use crate::providers::PageFetcher;

// @module: Caption track discovery and timed-text conversion

// @const: Assignment of the embedded player metadata
static PLAYER_RESPONSE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ytInitialPlayerResponse\s*=\s*").unwrap()
});

// @struct: One caption stream of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionTrack {
    // @field: Language code, unique per item
    pub language_code: String,

    // @field: Human readable language name
    pub language_name: String,

    // @field: Absolute locator of the timed-text payload
    pub payload_locator: String,

    // @field: Speech recognition track
    #[serde(default)]
    pub auto_generated: bool,
}

/// Output encoding of a converted track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// Numbered blocks with `start --> end` timestamps
    #[default]
    Srt,
    /// Caption text only, one cue per line
    Txt,
}

impl SubtitleFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Txt => "txt",
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for SubtitleFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "srt" => Ok(SubtitleFormat::Srt),
            "txt" | "text" => Ok(SubtitleFormat::Txt),
            other => Err(anyhow!("Unsupported subtitle format: {}", other)),
        }
    }
}

// @struct: One cue of a timed-text payload, times in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct TimedTextCue {
    pub start: f64,
    pub duration: f64,
    pub text: String,
}

impl TimedTextCue {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

// @struct: Single subtitle entry
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleEntry {
    // @field: Sequence number
    pub seq_num: usize,

    // @field: Start time in ms
    pub start_time_ms: u64,

    // @field: End time in ms
    pub end_time_ms: u64,

    // @field: Subtitle text
    pub text: String,
}

impl SubtitleEntry {
    pub fn new(seq_num: usize, start_time_ms: u64, end_time_ms: u64, text: String) -> Self {
        SubtitleEntry {
            seq_num,
            start_time_ms,
            end_time_ms,
            text,
        }
    }

    /// Build the numbered entry for a cue; negative times clamp to zero
    pub fn from_cue(seq_num: usize, cue: &TimedTextCue) -> Self {
        Self::new(
            seq_num,
            seconds_to_ms(cue.start),
            seconds_to_ms(cue.end()),
            cue.text.clone(),
        )
    }

    /// Convert start time to formatted SRT timestamp
    pub fn format_start_time(&self) -> String {
        Self::format_timestamp(self.start_time_ms)
    }

    /// Convert end time to formatted SRT timestamp
    pub fn format_end_time(&self) -> String {
        Self::format_timestamp(self.end_time_ms)
    }

    /// Format a timestamp in milliseconds to SRT format (HH:MM:SS,mmm)
    pub fn format_timestamp(ms: u64) -> String {
        let hours = ms / 3_600_000;
        let minutes = (ms % 3_600_000) / 60_000;
        let seconds = (ms % 60_000) / 1_000;
        let millis = ms % 1_000;

        format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
    }
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", self.seq_num)?;
        writeln!(f, "{} --> {}", self.format_start_time(), self.format_end_time())?;
        writeln!(f, "{}", self.text)?;
        writeln!(f)
    }
}

/// Whole milliseconds in `seconds`, floored, negatives clamped to zero
///
/// The epsilon absorbs binary representation error so that 3725.25 s is
/// 3 725 250 ms rather than 3 725 249 ms.
pub fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_nan() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0 + 1e-6).floor() as u64
}

/// Format fractional seconds as `HH:MM:SS,mmm`
pub fn format_seconds(seconds: f64) -> String {
    SubtitleEntry::format_timestamp(seconds_to_ms(seconds))
}

// @struct: What an item page announces about the item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredItem {
    // @field: Display title, if the page carries a non-empty one
    pub title: Option<String>,

    // @field: Announced caption tracks
    pub tracks: Vec<CaptionTrack>,
}

/// Extract the title and caption tracks announced by an item page
pub fn extract_item(html: &str, base_url: &Url) -> DiscoveredItem {
    let Some(player_response) = find_player_response(html) else {
        debug!("No player metadata block found");
        return DiscoveredItem::default();
    };

    let title = player_response
        .pointer("/videoDetails/title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string);

    DiscoveredItem {
        title,
        tracks: tracks_of(&player_response, base_url),
    }
}

/// Extract the caption tracks announced by an item page
///
/// Returns an empty list when the metadata block or the track list is missing
/// or malformed. Tracks without a language code or payload locator are
/// skipped; for duplicate language codes the first track wins.
pub fn extract_caption_tracks(html: &str, base_url: &Url) -> Vec<CaptionTrack> {
    extract_item(html, base_url).tracks
}

fn tracks_of(player_response: &Value, base_url: &Url) -> Vec<CaptionTrack> {
    let Some(entries) = player_response
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .and_then(Value::as_array)
    else {
        debug!("Player metadata carries no caption track list");
        return Vec::new();
    };

    let mut tracks: Vec<CaptionTrack> = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(track) = parse_track_entry(entry, base_url) else {
            continue;
        };
        if tracks.iter().any(|t| t.language_code == track.language_code) {
            debug!("Ignoring duplicate caption track for {}", track.language_code);
            continue;
        }
        tracks.push(track);
    }
    tracks
}

/// First assignment of the player metadata whose value parses as a JSON object
fn find_player_response(html: &str) -> Option<Value> {
    for assignment in PLAYER_RESPONSE_REGEX.find_iter(html) {
        let rest = &html[assignment.end()..];
        let mut values = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) if value.is_object() => return Some(value),
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!("Failed to parse player metadata block: {}", e);
                continue;
            }
            None => continue,
        }
    }
    None
}

fn parse_track_entry(entry: &Value, base_url: &Url) -> Option<CaptionTrack> {
    let language_code = entry
        .get("languageCode")
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())?;
    let base = entry
        .get("baseUrl")
        .and_then(Value::as_str)
        .filter(|locator| !locator.is_empty())?;

    let payload_locator = match base_url.join(base) {
        Ok(url) => url.to_string(),
        Err(e) => {
            warn!("Skipping {} track with unusable payload locator: {}", language_code, e);
            return None;
        }
    };

    let language_name = track_display_name(entry)
        .unwrap_or_else(|| language_utils::display_name(language_code));

    Some(CaptionTrack {
        language_code: language_code.to_string(),
        language_name,
        payload_locator,
        auto_generated: entry.get("kind").and_then(Value::as_str) == Some("asr"),
    })
}

fn track_display_name(entry: &Value) -> Option<String> {
    let name = entry.get("name")?;
    if let Some(simple) = name.get("simpleText").and_then(Value::as_str) {
        if !simple.trim().is_empty() {
            return Some(simple.to_string());
        }
    }

    let joined: String = name
        .get("runs")?
        .as_array()?
        .iter()
        .filter_map(|run| run.get("text").and_then(Value::as_str))
        .collect();
    if joined.trim().is_empty() {
        None
    } else {
        Some(joined)
    }
}

// @struct: Cue being collected while its element is open
struct OpenCue {
    start: f64,
    duration: f64,
    text: String,
    depth: usize,
}

/// Parse a timed-text payload into cues, in document order
///
/// Every `<text>` element is a cue; its text content includes the text of
/// nested elements.
pub fn parse_timed_text(payload: &str) -> Result<Vec<TimedTextCue>, ConversionError> {
    let mut reader = Reader::from_str(payload);
    let mut cues = Vec::new();
    let mut current: Option<OpenCue> = None;
    let mut depth = 0usize;
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            ConversionError::Markup(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Start(element) => {
                depth += 1;
                saw_root = true;
                if current.is_none() && is_cue(&element) {
                    let (start, duration) = cue_timing(&element, cues.len() + 1)?;
                    current = Some(OpenCue {
                        start,
                        duration,
                        text: String::new(),
                        depth,
                    });
                }
            }
            Event::Empty(element) => {
                saw_root = true;
                if current.is_none() && is_cue(&element) {
                    let (start, duration) = cue_timing(&element, cues.len() + 1)?;
                    cues.push(TimedTextCue {
                        start,
                        duration,
                        text: String::new(),
                    });
                }
            }
            Event::Text(text) => {
                if let Some(cue) = current.as_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| ConversionError::Markup(e.to_string()))?;
                    cue.text.push_str(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(cue) = current.as_mut() {
                    cue.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                if depth == 0 {
                    return Err(ConversionError::Markup("unexpected closing tag".to_string()));
                }
                if current.as_ref().is_some_and(|cue| cue.depth == depth) {
                    if let Some(cue) = current.take() {
                        cues.push(TimedTextCue {
                            start: cue.start,
                            duration: cue.duration,
                            text: cue.text,
                        });
                    }
                }
                depth -= 1;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ConversionError::Markup(format!(
            "{} element(s) left open at end of payload",
            depth
        )));
    }
    if !saw_root {
        return Err(ConversionError::MissingRoot);
    }

    Ok(cues)
}

fn is_cue(element: &BytesStart<'_>) -> bool {
    element.local_name().as_ref() == b"text"
}

/// `start` is required; `dur` defaults to zero
fn cue_timing(element: &BytesStart<'_>, index: usize) -> Result<(f64, f64), ConversionError> {
    let start = timing_attribute(element, "start", index)?.ok_or(ConversionError::InvalidTiming {
        index,
        attribute: "start",
        value: String::new(),
    })?;
    let duration = timing_attribute(element, "dur", index)?.unwrap_or(0.0);
    Ok((start, duration))
}

fn timing_attribute(
    element: &BytesStart<'_>,
    name: &'static str,
    index: usize,
) -> Result<Option<f64>, ConversionError> {
    let attribute = element
        .try_get_attribute(name)
        .map_err(|e| ConversionError::Markup(e.to_string()))?;
    let Some(attribute) = attribute else {
        return Ok(None);
    };

    let raw = attribute
        .unescape_value()
        .map_err(|e| ConversionError::Markup(e.to_string()))?;
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(ConversionError::InvalidTiming {
            index,
            attribute: name,
            value: raw.into_owned(),
        }),
    }
}

/// Numbered SRT blocks, one per cue including empty ones
pub fn to_srt(cues: &[TimedTextCue]) -> String {
    cues.iter()
        .enumerate()
        .map(|(i, cue)| SubtitleEntry::from_cue(i + 1, cue).to_string())
        .collect()
}

/// Trimmed non-empty cue texts, one per line
pub fn to_plain_text(cues: &[TimedTextCue]) -> String {
    cues.iter()
        .map(|cue| cue.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode a timed-text payload and encode it in `format`
pub fn convert_timed_text(payload: &str, format: SubtitleFormat) -> Result<String, ConversionError> {
    let cues = parse_timed_text(payload)?;
    Ok(match format {
        SubtitleFormat::Srt => to_srt(&cues),
        SubtitleFormat::Txt => to_plain_text(&cues),
    })
}

/// Discovers tracks for items and converts their payloads
#[derive(Debug, Clone)]
pub struct TrackCodec {
    fetcher: Arc<dyn PageFetcher>,
    base_url: Url,
    watch_path: String,
    item_param: String,
}

impl TrackCodec {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        base_url: Url,
        watch_path: impl Into<String>,
        item_param: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            base_url,
            watch_path: watch_path.into(),
            item_param: item_param.into(),
        }
    }

    /// Codec for the site described by `config`
    pub fn from_config(fetcher: Arc<dyn PageFetcher>, config: &Config) -> Result<Self> {
        Ok(Self::new(
            fetcher,
            config.base_url()?,
            config.site.watch_path.clone(),
            config.site.item_param.clone(),
        ))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Locator of the page of `item_id`
    pub fn item_locator(&self, item_id: &str) -> String {
        let mut url = self.base_url.clone();
        url.set_path(&self.watch_path);
        url.query_pairs_mut()
            .clear()
            .append_pair(&self.item_param, item_id);
        url.to_string()
    }

    /// Caption tracks of `item_id`; empty when the page announces none
    pub async fn discover_tracks(&self, item_id: &str) -> Result<Vec<CaptionTrack>, FetchError> {
        Ok(self.discover_item(item_id).await?.tracks)
    }

    /// Title and caption tracks of `item_id`
    pub async fn discover_item(&self, item_id: &str) -> Result<DiscoveredItem, FetchError> {
        let locator = self.item_locator(item_id);
        let html = self.fetcher.fetch_text(&locator).await?;
        let item = extract_item(&html, &self.base_url);
        debug!("Discovered {} caption track(s) for {}", item.tracks.len(), item_id);
        Ok(item)
    }

    /// Fetch the payload of `track` and encode it in `format`
    pub async fn fetch_and_convert(
        &self,
        track: &CaptionTrack,
        format: SubtitleFormat,
    ) -> Result<String, ExportError> {
        let payload = self.fetcher.fetch_text(&track.payload_locator).await?;
        let content = convert_timed_text(&payload, format)?;
        Ok(content)
    }
}
