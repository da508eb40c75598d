//! # Library Sync Module
//!
//! Keeps the persisted library in line with the platform's media sources.
//!
//! ## Overview
//!
//! - Scanning each source into a self-contained [`MediaSnapshot`]
//! - Diffing snapshots against persisted fingerprints
//! - Applying the resulting change set in one transaction per source
//! - Coalescing content-change notifications into resyncs
//!
//! ## Components
//!
//! - **Snapshot** (`snapshot`): Snapshot model, builder and fingerprints
//! - **Scanner** (`scanner`, `scanners`): Media store, filesystem and remote catalog scanners
//! - **Observer** (`observer`): Change signals from the host or the filesystem
//! - **Diff** (`diff`): Pure snapshot-to-change-set comparison
//! - **Job** (`job`): Sync status, stats and history records
//! - **Syncer** (`syncer`): Orchestrates runs, joining and cancellation

pub mod diff;
pub mod error;
pub mod job;
pub mod observer;
pub mod scanner;
pub mod scanners;
pub mod snapshot;
pub mod syncer;

pub use diff::{Diff, DiffScope, PersistedFingerprints};
pub use error::{Result, ScanFailure, SyncError};
pub use job::{SyncJob, SyncScope, SyncStats, SyncStatus};
pub use observer::{ChangeObserver, ChangeSignals, FsChangeObserver, SignalSender};
pub use scanner::{LibraryScanner, ScanOutcome};
pub use scanners::{FilesystemScanner, MediaStoreScanner, RemoteCatalogScanner};
pub use snapshot::{
    AlbumKey, MediaSnapshot, SnapshotAlbum, SnapshotBuilder, SnapshotTrack, SnapshotVideo,
    TrackEntry, VideoEntry,
};
pub use syncer::{LibrarySyncer, SyncConfig, SyncStatusStream};
