/*!
 * Error types for the captrack engine.
 *
 * Each stage of the pipeline owns a small error enum built with thiserror:
 * network access (`FetchError`), timed-text decoding (`ConversionError`),
 * clipboard output (`ClipboardError`) and document tree writes (`TreeError`).
 * An empty track list is a valid discovery outcome and has no error variant.
 */

use thiserror::Error;

/// Errors raised while fetching a page or a timed-text payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read
    #[error("Request failed for {locator}: {message}")]
    RequestFailed {
        /// Locator that was requested
        locator: String,
        /// Transport error message
        message: String,
    },

    /// The server answered with a non-success status
    #[error("Server responded with status {status_code} for {locator}")]
    Status {
        /// Locator that was requested
        locator: String,
        /// HTTP status code
        status_code: u16,
    },

    /// The locator could not be turned into a URL
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),
}

/// Errors raised while decoding a timed-text payload
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The markup is not well formed
    #[error("Malformed timed-text markup: {0}")]
    Markup(String),

    /// A cue carries a timing attribute that is not a finite number
    #[error("Invalid {attribute} value '{value}' on caption {index}")]
    InvalidTiming {
        /// One-based caption index
        index: usize,
        /// Attribute name (`start` or `dur`)
        attribute: &'static str,
        /// Raw attribute value
        value: String,
    },

    /// The payload contains no root element at all
    #[error("Timed-text payload has no root element")]
    MissingRoot,
}

/// Errors raised by clipboard writes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClipboardError {
    /// The host refused the write
    #[error("Clipboard write denied: {0}")]
    Denied(String),
}

/// Errors raised by document tree writes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    /// The target node is no longer attached to the tree
    #[error("Node {0} is not attached to the document")]
    Detached(usize),
}

/// Errors raised while parsing an element pattern
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    /// The pattern (or one alternative of it) is empty
    #[error("Empty selector in '{0}'")]
    Empty(String),

    /// A `#` or `.` is not followed by a name
    #[error("Missing name after '{marker}' in '{selector}'")]
    MissingName {
        /// Full pattern
        selector: String,
        /// The marker character
        marker: char,
    },

    /// The pattern uses syntax beyond tag, id and class
    #[error("Unsupported character '{character}' in '{selector}'")]
    Unsupported {
        /// Full pattern
        selector: String,
        /// The offending character
        character: char,
    },
}

/// Errors that abort one export trigger
#[derive(Error, Debug)]
pub enum ExportError {
    /// Fetching a payload failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Converting a payload failed
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Writing the aggregated payload to the clipboard failed
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    /// Emitting a download failed
    #[error("Failed to emit {filename}: {message}")]
    Emit {
        /// Target filename
        filename: String,
        /// Underlying error message
        message: String,
    },

    /// The export was triggered with an empty pick list
    #[error("No tracks selected")]
    NothingSelected,
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a fetch
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Error from an export
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
