//! # Media Snapshot
//!
//! The normalized read of one source that a scanner hands to the syncer.
//!
//! Snapshots reference albums, artists and genres by name. Identity is the
//! normalized name (case-insensitive, whitespace-collapsed); the first
//! spelling seen becomes the display name. [`SnapshotBuilder`] interns every
//! reference as it adds a track, so a built snapshot is self-contained.

use crate::error::{Result, ScanFailure, SyncError};
use core_library::normalize_name;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_GENRE: &str = "Unknown Genre";

/// Album reference: album name within its album artist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumKey {
    pub name: String,
    pub artist: String,
}

impl AlbumKey {
    pub fn new(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
        }
    }

    pub(crate) fn identity(&self) -> (String, String) {
        (normalize_name(&self.name), normalize_name(&self.artist))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTrack {
    pub content_uri: String,
    pub title: String,
    pub duration_ms: i64,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub album: AlbumKey,
    pub artist: String,
    pub genre: String,
    pub last_modified_ms: i64,
    pub size_bytes: i64,
    /// Computed from this track's own tags, not the interned names
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotAlbum {
    pub key: AlbumKey,
    pub artwork_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVideo {
    pub content_uri: String,
    pub title: String,
    pub duration_ms: i64,
    pub last_modified_ms: i64,
    pub size_bytes: i64,
}

/// Complete normalized read of a media source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSnapshot {
    pub tracks: Vec<SnapshotTrack>,
    pub albums: Vec<SnapshotAlbum>,
    pub artists: Vec<String>,
    pub genres: Vec<String>,
    pub videos: Vec<SnapshotVideo>,
}

impl MediaSnapshot {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.videos.is_empty()
    }

    pub fn album(&self, key: &AlbumKey) -> Option<&SnapshotAlbum> {
        let identity = key.identity();
        self.albums.iter().find(|a| a.key.identity() == identity)
    }

    /// Check that every reference resolves inside the snapshot and that
    /// content URIs are unique.
    pub fn validate(&self) -> Result<()> {
        let artists: HashSet<String> = self.artists.iter().map(|a| normalize_name(a)).collect();
        let genres: HashSet<String> = self.genres.iter().map(|g| normalize_name(g)).collect();
        let albums: HashSet<(String, String)> =
            self.albums.iter().map(|a| a.key.identity()).collect();

        for album in &self.albums {
            if !artists.contains(&normalize_name(&album.key.artist)) {
                return Err(SyncError::InvalidSnapshot(format!(
                    "album '{}' references unknown artist '{}'",
                    album.key.name, album.key.artist
                )));
            }
        }

        let mut uris = HashSet::new();
        for track in &self.tracks {
            if !uris.insert(track.content_uri.as_str()) {
                return Err(SyncError::InvalidSnapshot(format!(
                    "duplicate content URI {}",
                    track.content_uri
                )));
            }
            if !albums.contains(&track.album.identity()) {
                return Err(SyncError::InvalidSnapshot(format!(
                    "track {} references unknown album '{}'",
                    track.content_uri, track.album.name
                )));
            }
            if !artists.contains(&normalize_name(&track.artist)) {
                return Err(SyncError::InvalidSnapshot(format!(
                    "track {} references unknown artist '{}'",
                    track.content_uri, track.artist
                )));
            }
            if !genres.contains(&normalize_name(&track.genre)) {
                return Err(SyncError::InvalidSnapshot(format!(
                    "track {} references unknown genre '{}'",
                    track.content_uri, track.genre
                )));
            }
        }

        for video in &self.videos {
            if !uris.insert(video.content_uri.as_str()) {
                return Err(SyncError::InvalidSnapshot(format!(
                    "duplicate content URI {}",
                    video.content_uri
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Fingerprints
// =============================================================================

/// Change detector over the file stamp and the cleaned tag fields of a
/// single entry. The spelling another track contributed to a shared album
/// or artist never reaches this hash.
fn track_fingerprint(
    entry: &TrackEntry,
    names: [&str; 6],
    duration_ms: i64,
    track_number: Option<i64>,
    disc_number: Option<i64>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entry.last_modified_ms.to_le_bytes());
    hasher.update(entry.size_bytes.to_le_bytes());
    for field in names {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(track_number.unwrap_or(0).to_le_bytes());
    hasher.update(disc_number.unwrap_or(0).to_le_bytes());
    hasher.update(duration_ms.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

impl SnapshotVideo {
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.last_modified_ms.to_le_bytes());
        hasher.update(self.size_bytes.to_le_bytes());
        hasher.update(self.title.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.duration_ms.to_le_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Raw track fields as a scanner reads them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackEntry {
    pub content_uri: String,
    pub title: Option<String>,
    pub duration_ms: Option<i64>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub album: Option<String>,
    /// Falls back to `artist`
    pub album_artist: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub artwork_uri: Option<String>,
    pub last_modified_ms: i64,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoEntry {
    pub content_uri: String,
    pub title: Option<String>,
    pub duration_ms: Option<i64>,
    pub last_modified_ms: i64,
    pub size_bytes: i64,
}

/// Builds self-contained snapshots
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: MediaSnapshot,
    uris: HashSet<String>,
    artists: HashMap<String, String>,
    genres: HashMap<String, String>,
    albums: HashMap<(String, String), usize>,
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|v| !v.is_empty())
}

fn intern(names: &mut HashMap<String, String>, list: &mut Vec<String>, name: String) -> String {
    names
        .entry(normalize_name(&name))
        .or_insert_with(|| {
            list.push(name.clone());
            name
        })
        .clone()
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a track, interning its album, artist and genre.
    ///
    /// # Errors
    ///
    /// Returns a [`ScanFailure`] for an empty URI, a missing title, a
    /// negative duration or a URI already in the snapshot.
    pub fn add_track(&mut self, entry: TrackEntry) -> std::result::Result<(), ScanFailure> {
        let uri = entry.content_uri.trim().to_string();
        if uri.is_empty() {
            return Err(ScanFailure::new("<unknown>", "missing content URI"));
        }
        let title = clean(entry.title.as_deref())
            .ok_or_else(|| ScanFailure::new(&uri, "missing title"))?;
        let duration_ms = entry.duration_ms.unwrap_or(0);
        if duration_ms < 0 {
            return Err(ScanFailure::new(&uri, format!("negative duration {}", duration_ms)));
        }
        if self.uris.contains(&uri) {
            return Err(ScanFailure::new(&uri, "duplicate content URI"));
        }

        let artist_name =
            clean(entry.artist.as_deref()).unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        let album_artist_name =
            clean(entry.album_artist.as_deref()).unwrap_or_else(|| artist_name.clone());
        let album_name =
            clean(entry.album.as_deref()).unwrap_or_else(|| UNKNOWN_ALBUM.to_string());
        let genre_name = clean(entry.genre.as_deref()).unwrap_or_else(|| UNKNOWN_GENRE.to_string());
        let artwork_uri = clean(entry.artwork_uri.as_deref());
        let track_number = entry.track_number.filter(|n| *n > 0);
        let disc_number = entry.disc_number.filter(|n| *n > 0);

        let fingerprint = track_fingerprint(
            &entry,
            [
                title.as_str(),
                album_name.as_str(),
                album_artist_name.as_str(),
                artist_name.as_str(),
                genre_name.as_str(),
                artwork_uri.as_deref().unwrap_or(""),
            ],
            duration_ms,
            track_number,
            disc_number,
        );

        let artist = intern(&mut self.artists, &mut self.snapshot.artists, artist_name);
        let album_artist = intern(&mut self.artists, &mut self.snapshot.artists, album_artist_name);
        let genre = intern(&mut self.genres, &mut self.snapshot.genres, genre_name);

        let album_identity = (normalize_name(&album_name), normalize_name(&album_artist));
        let album = match self.albums.get(&album_identity).copied() {
            Some(index) => {
                let existing = &mut self.snapshot.albums[index];
                if existing.artwork_uri.is_none() {
                    existing.artwork_uri = artwork_uri;
                }
                existing.key.clone()
            }
            None => {
                let key = AlbumKey::new(album_name, album_artist);
                self.albums
                    .insert(album_identity, self.snapshot.albums.len());
                self.snapshot.albums.push(SnapshotAlbum {
                    key: key.clone(),
                    artwork_uri,
                });
                key
            }
        };

        self.uris.insert(uri.clone());
        self.snapshot.tracks.push(SnapshotTrack {
            content_uri: uri,
            title,
            duration_ms,
            track_number,
            disc_number,
            album,
            artist,
            genre,
            last_modified_ms: entry.last_modified_ms,
            size_bytes: entry.size_bytes,
            fingerprint,
        });

        Ok(())
    }

    pub fn add_video(&mut self, entry: VideoEntry) -> std::result::Result<(), ScanFailure> {
        let uri = entry.content_uri.trim().to_string();
        if uri.is_empty() {
            return Err(ScanFailure::new("<unknown>", "missing content URI"));
        }
        let title = clean(entry.title.as_deref())
            .ok_or_else(|| ScanFailure::new(&uri, "missing title"))?;
        let duration_ms = entry.duration_ms.unwrap_or(0);
        if duration_ms < 0 {
            return Err(ScanFailure::new(&uri, format!("negative duration {}", duration_ms)));
        }
        if !self.uris.insert(uri.clone()) {
            return Err(ScanFailure::new(&uri, "duplicate content URI"));
        }

        self.snapshot.videos.push(SnapshotVideo {
            content_uri: uri,
            title,
            duration_ms,
            last_modified_ms: entry.last_modified_ms,
            size_bytes: entry.size_bytes,
        });

        Ok(())
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.uris.contains(uri)
    }

    pub fn build(self) -> MediaSnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(uri: &str, title: &str, album: &str, artist: &str) -> TrackEntry {
        TrackEntry {
            content_uri: uri.to_string(),
            title: Some(title.to_string()),
            duration_ms: Some(1_000),
            album: Some(album.to_string()),
            artist: Some(artist.to_string()),
            genre: Some("Rock".to_string()),
            last_modified_ms: 10,
            size_bytes: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_builder_interns_names_case_insensitively() {
        let mut builder = SnapshotBuilder::new();
        builder.add_track(entry("u1", "One", "Abbey Road", "The Beatles")).unwrap();
        builder.add_track(entry("u2", "Two", "abbey  road", "THE BEATLES")).unwrap();

        let snapshot = builder.build();
        assert_eq!(snapshot.artists, vec!["The Beatles"]);
        assert_eq!(snapshot.albums.len(), 1);
        assert_eq!(snapshot.tracks[1].album.name, "Abbey Road");
        assert_eq!(snapshot.tracks[1].artist, "The Beatles");
        snapshot.validate().unwrap();
    }

    #[test]
    fn test_builder_fallbacks() {
        let mut builder = SnapshotBuilder::new();
        builder
            .add_track(TrackEntry {
                content_uri: "u1".to_string(),
                title: Some("Loose".to_string()),
                ..Default::default()
            })
            .unwrap();

        let snapshot = builder.build();
        let track = &snapshot.tracks[0];
        assert_eq!(track.artist, UNKNOWN_ARTIST);
        assert_eq!(track.album, AlbumKey::new(UNKNOWN_ALBUM, UNKNOWN_ARTIST));
        assert_eq!(track.genre, UNKNOWN_GENRE);
        snapshot.validate().unwrap();
    }

    #[test]
    fn test_album_artist_separates_albums() {
        let mut builder = SnapshotBuilder::new();
        let mut first = entry("u1", "A", "Greatest Hits", "Queen");
        first.album_artist = Some("Queen".to_string());
        let mut second = entry("u2", "B", "Greatest Hits", "ABBA");
        second.album_artist = Some("ABBA".to_string());
        builder.add_track(first).unwrap();
        builder.add_track(second).unwrap();

        let snapshot = builder.build();
        assert_eq!(snapshot.albums.len(), 2);
    }

    #[test]
    fn test_builder_rejects_malformed_entries() {
        let mut builder = SnapshotBuilder::new();
        assert!(builder.add_track(entry(" ", "t", "a", "b")).is_err());

        let mut untitled = entry("u1", "", "a", "b");
        untitled.title = Some("   ".to_string());
        assert!(builder.add_track(untitled).is_err());

        let mut negative = entry("u2", "t", "a", "b");
        negative.duration_ms = Some(-5);
        assert!(builder.add_track(negative).is_err());

        builder.add_track(entry("u3", "t", "a", "b")).unwrap();
        assert!(builder.add_track(entry("u3", "t", "a", "b")).is_err());
        assert!(builder
            .add_video(VideoEntry {
                content_uri: "u3".to_string(),
                title: Some("v".to_string()),
                ..Default::default()
            })
            .is_err());

        assert_eq!(builder.build().tracks.len(), 1);
    }

    #[test]
    fn test_album_artwork_from_first_track_that_has_one() {
        let mut builder = SnapshotBuilder::new();
        builder.add_track(entry("u1", "A", "X", "Y")).unwrap();
        let mut with_art = entry("u2", "B", "X", "Y");
        with_art.artwork_uri = Some("content://art/1".to_string());
        builder.add_track(with_art).unwrap();

        let snapshot = builder.build();
        let album = snapshot.album(&AlbumKey::new("x", "y")).unwrap();
        assert_eq!(album.artwork_uri.as_deref(), Some("content://art/1"));
    }

    #[test]
    fn test_validate_detects_dangling_references() {
        let mut builder = SnapshotBuilder::new();
        builder.add_track(entry("u1", "A", "X", "Y")).unwrap();
        let mut snapshot = builder.build();
        snapshot.genres.clear();

        assert!(matches!(
            snapshot.validate(),
            Err(SyncError::InvalidSnapshot(_))
        ));
    }

    fn fingerprint_of(entry: TrackEntry) -> String {
        let mut builder = SnapshotBuilder::new();
        builder.add_track(entry).unwrap();
        builder.build().tracks.remove(0).fingerprint
    }

    #[test]
    fn test_fingerprint_tracks_relevant_changes() {
        let base = fingerprint_of(entry("u1", "A", "X", "Y"));

        assert_eq!(base.len(), 64);
        assert_eq!(base, fingerprint_of(entry("u1", "A", "X", "Y")));
        assert_eq!(base, fingerprint_of(entry("u1", " A ", "X", "Y")));

        assert_ne!(fingerprint_of(entry("u1", "a", "X", "Y")), base);

        let mut touched = entry("u1", "A", "X", "Y");
        touched.last_modified_ms += 1;
        assert_ne!(fingerprint_of(touched), base);

        let mut renumbered = entry("u1", "A", "X", "Y");
        renumbered.track_number = Some(3);
        assert_ne!(fingerprint_of(renumbered), base);

        let mut with_art = entry("u1", "A", "X", "Y");
        with_art.artwork_uri = Some("art".to_string());
        assert_ne!(fingerprint_of(with_art), base);
    }

    #[test]
    fn test_fingerprint_ignores_spelling_from_other_tracks() {
        let alone = fingerprint_of(entry("u2", "Two", "Album", "first"));

        let mut builder = SnapshotBuilder::new();
        builder.add_track(entry("u1", "One", "Album", "First")).unwrap();
        builder.add_track(entry("u2", "Two", "Album", "first")).unwrap();
        let snapshot = builder.build();

        assert_eq!(snapshot.tracks[1].artist, "First");
        assert_eq!(snapshot.tracks[1].fingerprint, alone);
    }
}
