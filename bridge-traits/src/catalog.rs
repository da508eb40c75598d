//! Remote Catalog Abstraction
//!
//! A remote media service exposing its track list. Network clients live in
//! the host; the core only sees already-parsed DTOs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Track DTO as returned by a remote catalog.
///
/// Fields are optional because remote payloads are not trusted; the scanner
/// skips and counts entries that lack the required ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrack {
    /// Service-specific identifier, stable across listings
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub duration_ms: Option<i64>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub artwork_url: Option<String>,
    /// Last modification time (Unix milliseconds)
    pub modified_at_ms: Option<i64>,
    pub size_bytes: Option<i64>,
}

/// One page of a catalog listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrackPage {
    pub tracks: Vec<RemoteTrack>,
    /// Cursor for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Remote catalog trait
///
/// # Example
///
/// ```ignore
/// let mut cursor = None;
/// loop {
///     let page = catalog.list_tracks(cursor.as_deref()).await?;
///     handle(page.tracks);
///     match page.next_cursor {
///         Some(next) => cursor = Some(next),
///         None => break,
///     }
/// }
/// ```
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Stable identifier of the catalog (used as the library source id).
    fn catalog_id(&self) -> &str;

    /// List one page of tracks.
    async fn list_tracks(&self, cursor: Option<&str>) -> Result<RemoteTrackPage>;

    /// Fetch specific tracks by id. Unknown ids are omitted from the result.
    async fn get_tracks(&self, ids: &[String]) -> Result<Vec<RemoteTrack>>;
}
