//! # Library Management Module
//!
//! Owns the persisted media library: SQLite schema and migrations, read
//! repositories with pagination, and the transactional [`LibraryStore`]
//! through which the sync engine applies its changes.
//!
//! ## Overview
//!
//! - `db` - connection pool creation and embedded migrations
//! - `models` - Track, Album, Artist, Genre, Video and sync history rows
//! - `repositories` - read-side queries
//! - `store` - atomic change application with relation interning and
//!   orphan collection

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod store;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{normalize_name, Album, Artist, Genre, SyncRun, SyncRunKind, Track, Video};
pub use store::{AppliedChanges, ChangeSet, LibraryStore, TrackChange, TrackWrite, VideoWrite};
