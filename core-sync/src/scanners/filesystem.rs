//! Scanner over directories of tagged audio files
//!
//! Content URIs are `file://` followed by the canonical path. Roots that do
//! not exist are skipped, so a host without a music directory gets an empty
//! snapshot rather than an error.

use crate::error::{Result, SyncError};
use crate::scanner::{LibraryScanner, ScanOutcome};
use crate::snapshot::{SnapshotBuilder, TrackEntry};
use async_trait::async_trait;
use core_metadata::extractor::{is_audio_file, MetadataExtractor};
use std::collections::HashSet;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

const FILE_SCHEME: &str = "file://";

pub fn file_uri(path: &Path) -> String {
    format!("{}{}", FILE_SCHEME, path.display())
}

pub fn path_from_uri(uri: &str) -> Option<PathBuf> {
    uri.strip_prefix(FILE_SCHEME).map(PathBuf::from)
}

#[derive(Debug, Clone)]
struct FileStamp {
    path: PathBuf,
    modified_ms: i64,
    size_bytes: i64,
}

impl FileStamp {
    fn new(path: PathBuf, metadata: &Metadata) -> Self {
        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self {
            path,
            modified_ms,
            size_bytes: metadata.len() as i64,
        }
    }
}

/// Result of the blocking directory pass
#[derive(Default)]
struct Listing {
    files: Vec<FileStamp>,
    missing: Vec<String>,
    skipped: usize,
}

fn canonical_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .filter_map(|root| match root.canonicalize() {
            Ok(canonical) => Some(canonical),
            Err(e) => {
                debug!(root = %root.display(), error = %e, "Skipping unavailable scan root");
                None
            }
        })
        .collect()
}

fn walk_roots(roots: &[PathBuf]) -> Listing {
    let mut listing = Listing::default();

    for root in canonical_roots(roots) {
        for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Unreadable directory entry");
                    listing.skipped += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
                continue;
            }

            match entry.metadata() {
                Ok(metadata) => listing
                    .files
                    .push(FileStamp::new(entry.path().to_path_buf(), &metadata)),
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "Unreadable file metadata");
                    listing.skipped += 1;
                }
            }
        }
    }

    listing
}

fn stat_uris(roots: &[PathBuf], uris: &[String]) -> Listing {
    let roots = canonical_roots(roots);
    let mut listing = Listing::default();

    for uri in uris {
        let Some(path) = path_from_uri(uri) else {
            continue;
        };
        if !roots.iter().any(|root| path.starts_with(root)) {
            continue;
        }

        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() && is_audio_file(&path) => {
                listing.files.push(FileStamp::new(path, &metadata))
            }
            Ok(_) => listing.missing.push(uri.clone()),
            Err(e) if e.kind() == ErrorKind::NotFound => listing.missing.push(uri.clone()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable file metadata");
                listing.skipped += 1;
            }
        }
    }

    listing
}

pub struct FilesystemScanner {
    source_id: String,
    roots: Vec<PathBuf>,
    extractor: Arc<MetadataExtractor>,
}

impl FilesystemScanner {
    pub fn new(source_id: impl Into<String>, roots: Vec<PathBuf>) -> Self {
        Self {
            source_id: source_id.into(),
            roots,
            extractor: Arc::new(MetadataExtractor::new()),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    async fn read_tags(&self, listing: Listing) -> ScanOutcome {
        let mut builder = SnapshotBuilder::new();
        let mut skipped = listing.skipped;

        for file in listing.files {
            let uri = file_uri(&file.path);
            if builder.contains(&uri) {
                continue;
            }

            let metadata = match self.extractor.extract_from_file(&file.path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Skipping unreadable audio file");
                    skipped += 1;
                    continue;
                }
            };

            let entry = TrackEntry {
                content_uri: uri,
                title: Some(metadata.title),
                duration_ms: Some(metadata.duration_ms as i64),
                track_number: metadata.track_number.map(i64::from),
                disc_number: metadata.disc_number.map(i64::from),
                album: metadata.album,
                album_artist: metadata.album_artist,
                artist: metadata.artist,
                genre: metadata.genre,
                artwork_uri: None,
                last_modified_ms: file.modified_ms,
                size_bytes: file.size_bytes,
            };
            if let Err(failure) = builder.add_track(entry) {
                warn!(%failure, "Skipping audio file");
                skipped += 1;
            }
        }

        ScanOutcome {
            snapshot: builder.build(),
            skipped,
            missing: listing.missing,
        }
    }
}

#[async_trait]
impl LibraryScanner for FilesystemScanner {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    #[instrument(skip(self), fields(source_id = %self.source_id))]
    async fn scan_all(&self) -> Result<ScanOutcome> {
        let roots = self.roots.clone();
        let listing = tokio::task::spawn_blocking(move || walk_roots(&roots))
            .await
            .map_err(|e| SyncError::unavailable(&self.source_id, e))?;

        debug!(files = listing.files.len(), "Audio files found");
        Ok(self.read_tags(listing).await)
    }

    #[instrument(skip(self, uris), fields(source_id = %self.source_id, requested = uris.len()))]
    async fn scan_by_uris(&self, uris: &HashSet<String>) -> Result<ScanOutcome> {
        let roots = self.roots.clone();
        let mut uris: Vec<String> = uris.iter().cloned().collect();
        uris.sort();

        let listing = tokio::task::spawn_blocking(move || stat_uris(&roots, &uris))
            .await
            .map_err(|e| SyncError::unavailable(&self.source_id, e))?;

        Ok(self.read_tags(listing).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::UNKNOWN_ARTIST;
    use std::fs;

    /// Half a second of 8 kHz mono 16-bit silence
    fn silent_wav() -> Vec<u8> {
        let data_len: u32 = 8_000;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&8_000u32.to_le_bytes());
        bytes.extend_from_slice(&16_000u32.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(bytes.len() + data_len as usize, 0);
        bytes
    }

    fn music_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("album")).unwrap();
        fs::write(dir.path().join("album/First Song.wav"), silent_wav()).unwrap();
        fs::write(dir.path().join("album/broken.mp3"), b"garbage").unwrap();
        fs::write(dir.path().join("album/notes.txt"), b"not audio").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_scan_all_reads_and_skips() {
        let dir = music_dir();
        let scanner = FilesystemScanner::new("files", vec![dir.path().to_path_buf()]);

        let outcome = scanner.scan_all().await.unwrap();

        assert_eq!(outcome.snapshot.tracks.len(), 1);
        assert_eq!(outcome.skipped, 1);
        let track = &outcome.snapshot.tracks[0];
        assert_eq!(track.title, "First Song");
        assert_eq!(track.artist, UNKNOWN_ARTIST);
        assert!(track.content_uri.starts_with("file://"));
        assert!(track.content_uri.ends_with("First Song.wav"));
        outcome.snapshot.validate().unwrap();
    }

    #[tokio::test]
    async fn test_missing_root_is_empty_success() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = FilesystemScanner::new("files", vec![dir.path().join("absent")]);

        let outcome = scanner.scan_all().await.unwrap();

        assert!(outcome.snapshot.is_empty());
        assert_eq!(outcome.skipped, 0);
    }

    #[tokio::test]
    async fn test_scan_by_uris() {
        let dir = music_dir();
        let root = dir.path().canonicalize().unwrap();
        let scanner = FilesystemScanner::new("files", vec![dir.path().to_path_buf()]);

        let present = file_uri(&root.join("album/First Song.wav"));
        let gone = file_uri(&root.join("album/deleted.wav"));
        let foreign = "content://media/1".to_string();
        let uris: HashSet<String> = [present.clone(), gone.clone(), foreign].into_iter().collect();

        let outcome = scanner.scan_by_uris(&uris).await.unwrap();

        assert_eq!(outcome.snapshot.tracks.len(), 1);
        assert_eq!(outcome.snapshot.tracks[0].content_uri, present);
        assert_eq!(outcome.missing, vec![gone]);
    }

    #[test]
    fn test_uri_round_trip() {
        let path = Path::new("/music/a b.flac");
        assert_eq!(path_from_uri(&file_uri(path)).as_deref(), Some(path));
        assert!(path_from_uri("remote://x/1").is_none());
    }
}
