use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::errors::{ClipboardError, ExportError};
use crate::export::ExportSink;
use crate::subtitle_processor::SubtitleFormat;

// @module: Export file naming and directory output

// @const: Characters that are unsafe in file names on common platforms
static UNSAFE_FILENAME_CHARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).unwrap()
});

/// Longest sanitized title, in characters
pub const MAX_FILENAME_CHARS: usize = 100;

/// Byte order mark prepended to exported files
pub const BOM: char = '\u{feff}';

/// Replace unsafe characters with `_` and cap the length
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_FILENAME_CHARS
        .replace_all(name, "_")
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// `{sanitizedTitle}_{languageCode}.{ext}`
pub fn subtitle_filename(title: &str, language_code: &str, format: SubtitleFormat) -> String {
    format!(
        "{}_{}.{}",
        sanitize_file_name(title),
        language_code,
        format.extension()
    )
}

/// Contents with a leading byte order mark
pub fn with_bom(contents: &str) -> String {
    let mut output = String::with_capacity(contents.len() + BOM.len_utf8());
    output.push(BOM);
    output.push_str(contents);
    output
}

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    /// First free path for `filename` in `dir`, adding ` (n)` before the
    /// extension when the name is taken
    pub fn unique_path<P: AsRef<Path>>(dir: P, filename: &str) -> PathBuf {
        let dir = dir.as_ref();
        let candidate = dir.join(filename);
        if !candidate.exists() {
            return candidate;
        }

        let (stem, extension) = match filename.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{}", ext)),
            None => (filename, String::new()),
        };
        (1..)
            .map(|n| dir.join(format!("{} ({}){}", stem, n, extension)))
            .find(|path| !path.exists())
            .unwrap_or(candidate)
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }
}

/// Export sink that writes downloads into a directory and the clipboard
/// payload to standard output
#[derive(Debug, Clone)]
pub struct DirectorySink {
    output_dir: PathBuf,
}

impl DirectorySink {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl ExportSink for DirectorySink {
    async fn emit_file(&self, filename: &str, contents: &str) -> Result<(), ExportError> {
        let emit_error = |e: anyhow::Error| ExportError::Emit {
            filename: filename.to_string(),
            message: format!("{:#}", e),
        };

        FileManager::ensure_dir(&self.output_dir).map_err(emit_error)?;
        let path = FileManager::unique_path(&self.output_dir, filename);
        tokio::fs::write(&path, contents.as_bytes())
            .await
            .with_context(|| format!("Failed to write to file: {:?}", path))
            .map_err(emit_error)?;

        debug!("Wrote {:?}", path);
        Ok(())
    }

    async fn write_clipboard(&self, text: &str) -> Result<(), ClipboardError> {
        print_payload(text).map_err(|e| ClipboardError::Denied(e.to_string()))
    }
}

fn print_payload(text: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()
}
