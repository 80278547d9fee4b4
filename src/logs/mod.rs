//! Log Reader
//!
//! Lists and pages through the application's log files. All returned text is
//! scrubbed of PII.
//!
//! # Safety
//!
//! File names are validated on the raw string before any filesystem access:
//! `..`, `/`, `\` and NUL are rejected outright, as are names longer than a
//! single path component may be. Only allow-listed extensions may be opened.

pub mod reader;
pub mod search;

pub use reader::{LogEntry, LogFile, LogReader, ReadRequest, ReadResult, MAX_UNFILTERED_SIZE};
pub use search::{GrepSearcher, LineFilter, LineSearcher, ScanSearcher};

/// Log reader errors
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Invalid filename.")]
    InvalidFilename,

    #[error("File type not allowed.")]
    ExtensionNotAllowed,

    #[error("Log file not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidFilter(String),

    #[error("Log file too large ({size_mb:.1} MB). Use search or level filter to read large files.")]
    TooLarge { size_mb: f64 },

    #[error("Unable to read log file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<search::SearchError> for LogError {
    fn from(err: search::SearchError) -> Self {
        match err {
            search::SearchError::Io(e) | search::SearchError::Unavailable(e) => LogError::Io(e),
            search::SearchError::Failed(msg) => LogError::Io(std::io::Error::other(msg)),
            search::SearchError::InvalidFilter(msg) => {
                LogError::InvalidFilter(format!("Invalid log filter: {}", msg))
            }
        }
    }
}
