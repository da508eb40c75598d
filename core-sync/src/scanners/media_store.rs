//! Scanner over the device media index

use crate::error::{Result, SyncError};
use crate::scanner::{LibraryScanner, ScanOutcome};
use crate::snapshot::{SnapshotBuilder, TrackEntry, VideoEntry};
use async_trait::async_trait;
use bridge_traits::{MediaStoreAudioRow, MediaStoreQuery, MediaStoreVideoRow};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct MediaStoreScanner {
    source_id: String,
    store: Arc<dyn MediaStoreQuery>,
}

impl MediaStoreScanner {
    pub fn new(source_id: impl Into<String>, store: Arc<dyn MediaStoreQuery>) -> Self {
        Self {
            source_id: source_id.into(),
            store,
        }
    }

    fn build(
        &self,
        audio: Vec<MediaStoreAudioRow>,
        video: Vec<MediaStoreVideoRow>,
    ) -> (SnapshotBuilder, usize) {
        let mut builder = SnapshotBuilder::new();
        let mut skipped = 0;

        for row in audio {
            let entry = TrackEntry {
                content_uri: row.uri.unwrap_or_default(),
                title: row.title,
                duration_ms: row.duration_ms,
                track_number: row.track_number,
                disc_number: row.disc_number,
                album: row.album,
                album_artist: row.album_artist,
                artist: row.artist,
                genre: row.genre,
                artwork_uri: row.album_art_uri,
                last_modified_ms: row.date_modified_ms,
                size_bytes: row.size_bytes,
            };
            if let Err(failure) = builder.add_track(entry) {
                warn!(source_id = %self.source_id, %failure, "Skipping media store row");
                skipped += 1;
            }
        }

        for row in video {
            let entry = VideoEntry {
                content_uri: row.uri.unwrap_or_default(),
                title: row.title,
                duration_ms: row.duration_ms,
                last_modified_ms: row.date_modified_ms,
                size_bytes: row.size_bytes,
            };
            if let Err(failure) = builder.add_video(entry) {
                warn!(source_id = %self.source_id, %failure, "Skipping media store video row");
                skipped += 1;
            }
        }

        (builder, skipped)
    }
}

#[async_trait]
impl LibraryScanner for MediaStoreScanner {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    #[instrument(skip(self), fields(source_id = %self.source_id))]
    async fn scan_all(&self) -> Result<ScanOutcome> {
        let audio = self
            .store
            .query_audio()
            .await
            .map_err(|e| SyncError::unavailable(&self.source_id, e))?;
        let video = self
            .store
            .query_video()
            .await
            .map_err(|e| SyncError::unavailable(&self.source_id, e))?;

        debug!(audio = audio.len(), video = video.len(), "Media store rows read");

        let (builder, skipped) = self.build(audio, video);
        Ok(ScanOutcome {
            snapshot: builder.build(),
            skipped,
            missing: Vec::new(),
        })
    }

    #[instrument(skip(self, uris), fields(source_id = %self.source_id, requested = uris.len()))]
    async fn scan_by_uris(&self, uris: &HashSet<String>) -> Result<ScanOutcome> {
        let mut requested: Vec<String> = uris.iter().cloned().collect();
        requested.sort();

        let rows = self
            .store
            .query_by_uris(&requested)
            .await
            .map_err(|e| SyncError::unavailable(&self.source_id, e))?;

        let returned: HashSet<String> = rows
            .audio
            .iter()
            .filter_map(|r| r.uri.clone())
            .chain(rows.video.iter().filter_map(|r| r.uri.clone()))
            .collect();
        let missing = requested
            .into_iter()
            .filter(|uri| !returned.contains(uri))
            .collect();

        let (builder, skipped) = self.build(rows.audio, rows.video);
        Ok(ScanOutcome {
            snapshot: builder.build(),
            skipped,
            missing,
        })
    }
}
