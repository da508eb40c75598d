//! Scanner over a remote catalog service
//!
//! Tracks are identified as `remote://<catalog id>/<track id>`. The catalog
//! id doubles as the source id.

use crate::error::{Result, SyncError};
use crate::scanner::{LibraryScanner, ScanOutcome};
use crate::snapshot::{SnapshotBuilder, TrackEntry};
use async_trait::async_trait;
use bridge_traits::{RemoteCatalog, RemoteTrack};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const REMOTE_SCHEME: &str = "remote://";

pub struct RemoteCatalogScanner {
    source_id: String,
    catalog: Arc<dyn RemoteCatalog>,
}

impl RemoteCatalogScanner {
    pub fn new(catalog: Arc<dyn RemoteCatalog>) -> Self {
        Self {
            source_id: catalog.catalog_id().to_string(),
            catalog,
        }
    }

    pub fn track_uri(&self, track_id: &str) -> String {
        format!("{}{}/{}", REMOTE_SCHEME, self.source_id, track_id)
    }

    /// Track id of a URI that belongs to this catalog
    pub fn track_id<'a>(&self, uri: &'a str) -> Option<&'a str> {
        uri.strip_prefix(REMOTE_SCHEME)?
            .strip_prefix(self.source_id.as_str())?
            .strip_prefix('/')
            .filter(|id| !id.is_empty())
    }

    fn add(&self, builder: &mut SnapshotBuilder, track: RemoteTrack) -> bool {
        let id = track.id.trim();
        if id.is_empty() {
            warn!(source_id = %self.source_id, "Skipping remote track without id");
            return false;
        }

        let entry = TrackEntry {
            content_uri: self.track_uri(id),
            title: track.title,
            duration_ms: track.duration_ms,
            track_number: track.track_number,
            disc_number: track.disc_number,
            album: track.album,
            album_artist: track.album_artist,
            artist: track.artist,
            genre: track.genre,
            artwork_uri: track.artwork_url,
            last_modified_ms: track.modified_at_ms.unwrap_or(0),
            size_bytes: track.size_bytes.unwrap_or(0),
        };
        match builder.add_track(entry) {
            Ok(()) => true,
            Err(failure) => {
                warn!(source_id = %self.source_id, %failure, "Skipping remote track");
                false
            }
        }
    }
}

#[async_trait]
impl LibraryScanner for RemoteCatalogScanner {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    #[instrument(skip(self), fields(source_id = %self.source_id))]
    async fn scan_all(&self) -> Result<ScanOutcome> {
        let mut builder = SnapshotBuilder::new();
        let mut skipped = 0;
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let page = self
                .catalog
                .list_tracks(cursor.as_deref())
                .await
                .map_err(|e| SyncError::unavailable(&self.source_id, e))?;
            pages += 1;

            for track in page.tracks {
                if !self.add(&mut builder, track) {
                    skipped += 1;
                }
            }

            match page.next_cursor {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    return Err(SyncError::unavailable(
                        &self.source_id,
                        format!("catalog repeated cursor {}", next),
                    ));
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(pages, "Remote catalog listed");
        Ok(ScanOutcome {
            snapshot: builder.build(),
            skipped,
            missing: Vec::new(),
        })
    }

    #[instrument(skip(self, uris), fields(source_id = %self.source_id, requested = uris.len()))]
    async fn scan_by_uris(&self, uris: &HashSet<String>) -> Result<ScanOutcome> {
        let mut ids: Vec<String> = uris
            .iter()
            .filter_map(|uri| self.track_id(uri))
            .map(str::to_string)
            .collect();
        ids.sort();

        if ids.is_empty() {
            return Ok(ScanOutcome::empty());
        }

        let tracks = self
            .catalog
            .get_tracks(&ids)
            .await
            .map_err(|e| SyncError::unavailable(&self.source_id, e))?;

        let returned: HashSet<String> = tracks.iter().map(|t| t.id.trim().to_string()).collect();
        let missing = ids
            .iter()
            .filter(|id| !returned.contains(*id))
            .map(|id| self.track_uri(id))
            .collect();

        let mut builder = SnapshotBuilder::new();
        let mut skipped = 0;
        for track in tracks {
            if !self.add(&mut builder, track) {
                skipped += 1;
            }
        }

        Ok(ScanOutcome {
            snapshot: builder.build(),
            skipped,
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, RemoteTrackPage};
    use std::collections::HashMap;

    /// Catalog serving fixed pages keyed by cursor
    struct PagedCatalog {
        pages: HashMap<Option<String>, RemoteTrackPage>,
        fail: bool,
    }

    #[async_trait]
    impl RemoteCatalog for PagedCatalog {
        fn catalog_id(&self) -> &str {
            "cloud"
        }

        async fn list_tracks(&self, cursor: Option<&str>) -> BridgeResult<RemoteTrackPage> {
            if self.fail {
                return Err(BridgeError::OperationFailed("503".to_string()));
            }
            Ok(self
                .pages
                .get(&cursor.map(str::to_string))
                .cloned()
                .unwrap_or_default())
        }

        async fn get_tracks(&self, ids: &[String]) -> BridgeResult<Vec<RemoteTrack>> {
            Ok(self
                .pages
                .values()
                .flat_map(|p| p.tracks.iter())
                .filter(|t| ids.contains(&t.id))
                .cloned()
                .collect())
        }
    }

    fn remote(id: &str, title: Option<&str>) -> RemoteTrack {
        RemoteTrack {
            id: id.to_string(),
            title: title.map(str::to_string),
            artist: Some("Band".to_string()),
            album: Some("Live".to_string()),
            duration_ms: Some(100_000),
            modified_at_ms: Some(5),
            ..Default::default()
        }
    }

    fn catalog() -> PagedCatalog {
        let mut pages = HashMap::new();
        pages.insert(
            None,
            RemoteTrackPage {
                tracks: vec![remote("1", Some("One")), remote("", Some("No id"))],
                next_cursor: Some("p2".to_string()),
            },
        );
        pages.insert(
            Some("p2".to_string()),
            RemoteTrackPage {
                tracks: vec![remote("2", Some("Two")), remote("3", None)],
                next_cursor: None,
            },
        );
        PagedCatalog { pages, fail: false }
    }

    #[tokio::test]
    async fn test_scan_all_follows_cursors() {
        let scanner = RemoteCatalogScanner::new(Arc::new(catalog()));

        let outcome = scanner.scan_all().await.unwrap();

        let uris: Vec<_> = outcome
            .snapshot
            .tracks
            .iter()
            .map(|t| t.content_uri.as_str())
            .collect();
        assert_eq!(uris, vec!["remote://cloud/1", "remote://cloud/2"]);
        assert_eq!(outcome.skipped, 2);
        assert_eq!(scanner.source_id(), "cloud");
    }

    #[tokio::test]
    async fn test_scan_all_unavailable() {
        let mut failing = catalog();
        failing.fail = true;
        let scanner = RemoteCatalogScanner::new(Arc::new(failing));

        assert!(matches!(
            scanner.scan_all().await,
            Err(SyncError::SourceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_scan_by_uris_ignores_foreign_uris() {
        let scanner = RemoteCatalogScanner::new(Arc::new(catalog()));
        let uris: HashSet<String> = [
            "remote://cloud/2",
            "remote://cloud/9",
            "remote://other/1",
            "file:///music/a.mp3",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let outcome = scanner.scan_by_uris(&uris).await.unwrap();

        assert_eq!(outcome.snapshot.tracks.len(), 1);
        assert_eq!(outcome.snapshot.tracks[0].title, "Two");
        assert_eq!(outcome.missing, vec!["remote://cloud/9".to_string()]);
    }

    #[test]
    fn test_track_id_parsing() {
        let scanner = RemoteCatalogScanner::new(Arc::new(catalog()));
        assert_eq!(scanner.track_id("remote://cloud/abc"), Some("abc"));
        assert_eq!(scanner.track_id("remote://cloud/"), None);
        assert_eq!(scanner.track_id("remote://cloudy/abc"), None);
    }
}
