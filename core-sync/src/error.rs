use core_library::LibraryError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Source {source_id} unavailable: {message}")]
    SourceUnavailable { source_id: String, message: String },

    #[error("Scan of {source_id} timed out after {secs} seconds")]
    Timeout { source_id: String, secs: u64 },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Snapshot is not self-contained: {0}")]
    InvalidSnapshot(String),

    #[error("Scanner registered twice for source {0}")]
    DuplicateSource(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

impl SyncError {
    pub fn unavailable(source_id: impl Into<String>, message: impl ToString) -> Self {
        SyncError::SourceUnavailable {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// One item a scanner could not read. Absorbed into the skipped count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    /// URI or path of the item, when known
    pub item: String,
    pub reason: String,
}

impl ScanFailure {
    pub fn new(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.reason)
    }
}
