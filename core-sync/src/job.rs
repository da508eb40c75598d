//! # Sync Status and Jobs
//!
//! Observable status of the syncer and the per-source job record written to
//! the sync history.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Syncing → Success(stats)
//!           ↑    ↘ Failed(reason)
//!           └──── (next trigger)
//! ```
//!
//! A terminal status stays until the next run resets it to `Syncing`. A
//! cancelled run is reported as `Failed("cancelled")`.

use crate::error::SyncError;
use core_library::{SyncRun, SyncRunKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Reason reported for runs stopped by cancellation
pub const CANCELLED_REASON: &str = "cancelled";

// ============================================================================
// Scope
// ============================================================================

/// How much of a source a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncScope {
    /// Whole source; absent URIs are deleted
    Full,
    /// Known-changed URIs only
    Scoped,
}

impl SyncScope {
    pub fn as_str(&self) -> &'static str {
        self.run_kind().as_str()
    }

    pub fn run_kind(&self) -> SyncRunKind {
        match self {
            SyncScope::Full => SyncRunKind::Full,
            SyncScope::Scoped => SyncRunKind::Scoped,
        }
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Stats
// ============================================================================

/// Counters of a successful run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub added: u64,
    pub updated: u64,
    pub deleted: u64,
    pub unchanged: u64,
    /// Items the scanner could not read
    pub skipped: u64,
}

impl SyncStats {
    /// Accumulate the counters of another source into this run
    pub fn merge(&mut self, other: SyncStats) {
        self.added += other.added;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
    }

    /// Rows written by the run
    pub fn writes(&self) -> u64 {
        self.added + self.updated + self.deleted
    }
}

// ============================================================================
// Status
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum SyncStatus {
    /// No run has happened yet
    Idle,
    Syncing,
    Success(SyncStats),
    Failed(String),
}

impl SyncStatus {
    pub fn cancelled() -> Self {
        SyncStatus::Failed(CANCELLED_REASON.to_string())
    }

    /// Status a run ends with when it stops on `error`
    pub fn from_error(error: &SyncError) -> Self {
        match error {
            SyncError::Cancelled => SyncStatus::cancelled(),
            other => SyncStatus::Failed(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Success(_) | SyncStatus::Failed(_))
    }

    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncStatus::Syncing)
    }

    /// Name stored in the sync history
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Success(_) => "success",
            SyncStatus::Failed(_) => "failed",
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Idle
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Failed(reason) => write!(f, "failed: {}", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

// ============================================================================
// Job
// ============================================================================

/// One source's share of a run, from start to its history row.
///
/// Finishing consumes the job, so a run is finished exactly once.
#[derive(Debug)]
pub struct SyncJob {
    run: SyncRun,
    started: Instant,
}

impl SyncJob {
    pub fn start(source_id: &str, scope: SyncScope, started_at_ms: i64) -> Self {
        Self {
            run: SyncRun::started(source_id, scope.run_kind(), started_at_ms),
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.run.id
    }

    pub fn source_id(&self) -> &str {
        &self.run.source_id
    }

    /// History row as inserted when the job starts
    pub fn record(&self) -> &SyncRun {
        &self.run
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn complete(mut self, stats: SyncStats, finished_at_ms: i64) -> SyncRun {
        self.run.status = SyncStatus::Success(stats).as_str().to_string();
        self.run.finished_at = Some(finished_at_ms);
        self.run.added = stats.added as i64;
        self.run.updated = stats.updated as i64;
        self.run.deleted = stats.deleted as i64;
        self.run.unchanged = stats.unchanged as i64;
        self.run.skipped = stats.skipped as i64;
        self.run
    }

    pub fn fail(mut self, error: &SyncError, finished_at_ms: i64) -> SyncRun {
        let status = SyncStatus::from_error(error);
        self.run.status = status.as_str().to_string();
        self.run.finished_at = Some(finished_at_ms);
        if let SyncStatus::Failed(reason) = status {
            self.run.error_message = Some(reason);
        }
        self.run
    }
}
