//! Device Media Index
//!
//! Read-only access to the platform's media index (Android `MediaStore`,
//! the iOS media library). Rows are returned as the host read them; the
//! scanner decides which ones are usable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One audio row from the device media index.
///
/// Every column is optional because hosts routinely return rows with
/// missing or unreadable columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaStoreAudioRow {
    pub uri: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    /// Album artist when the index exposes one; falls back to `artist`.
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub duration_ms: Option<i64>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub album_art_uri: Option<String>,
    pub date_modified_ms: i64,
    pub size_bytes: i64,
}

/// One video row from the device media index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaStoreVideoRow {
    pub uri: Option<String>,
    pub title: Option<String>,
    pub duration_ms: Option<i64>,
    pub date_modified_ms: i64,
    pub size_bytes: i64,
}

/// Result of a URI-scoped lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaStoreRows {
    pub audio: Vec<MediaStoreAudioRow>,
    pub video: Vec<MediaStoreVideoRow>,
}

/// Query surface over the device media index.
///
/// A host without a media index (desktop) returns empty vectors rather than
/// an error; an index that exists but cannot be read returns
/// [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable).
#[async_trait]
pub trait MediaStoreQuery: Send + Sync {
    /// All audio rows currently indexed.
    async fn query_audio(&self) -> Result<Vec<MediaStoreAudioRow>>;

    /// All video rows currently indexed.
    async fn query_video(&self) -> Result<Vec<MediaStoreVideoRow>>;

    /// Rows for the given URIs only. URIs the index no longer knows are
    /// simply absent from the result.
    async fn query_by_uris(&self, uris: &[String]) -> Result<MediaStoreRows>;
}
