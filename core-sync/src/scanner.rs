//! # Library Scanner
//!
//! A scanner reads one media source into a [`MediaSnapshot`]. Unreadable
//! items are skipped and counted; only a whole-source failure is an error.
//! An empty snapshot is a successful scan (for example a source that does
//! not exist on this platform).

use crate::error::Result;
use crate::snapshot::MediaSnapshot;
use async_trait::async_trait;
use std::collections::HashSet;

/// Result of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    pub snapshot: MediaSnapshot,
    /// Items that could not be read
    pub skipped: usize,
    /// Requested URIs the source no longer has (scoped scans only)
    pub missing: Vec<String>,
}

impl ScanOutcome {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait LibraryScanner: Send + Sync {
    /// Stable id of the source; partitions the persisted library
    fn source_id(&self) -> &str;

    /// Full rescan of the source
    ///
    /// # Errors
    ///
    /// `SyncError::SourceUnavailable` when the source cannot be read at all.
    async fn scan_all(&self) -> Result<ScanOutcome>;

    /// Rescan of a known-changed subset. URIs that do not belong to this
    /// source are ignored.
    async fn scan_by_uris(&self, uris: &HashSet<String>) -> Result<ScanOutcome>;
}
