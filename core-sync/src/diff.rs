//! # Snapshot Diff
//!
//! Compares a snapshot with the persisted fingerprints of its source and
//! produces the [`ChangeSet`] that brings the store in line. Pure: no I/O.
//!
//! - URI not persisted: insert
//! - fingerprint differs: update
//! - fingerprint equal: unchanged, no write
//! - full scope: persisted URIs absent from the snapshot are deleted
//! - URI scope: only URIs the scanner reported missing are deleted

use crate::snapshot::{MediaSnapshot, SnapshotTrack, SnapshotVideo};
use core_library::{ChangeSet, TrackWrite, VideoWrite};
use std::collections::{HashMap, HashSet};

/// What part of the source a snapshot covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffScope<'a> {
    Full,
    /// URIs the scanner reported as gone
    Uris { missing: &'a [String] },
}

/// Persisted fingerprints of one source, keyed by content URI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedFingerprints {
    pub tracks: HashMap<String, String>,
    pub videos: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub changes: ChangeSet,
    pub unchanged: u64,
}

pub fn diff(
    source_id: &str,
    snapshot: &MediaSnapshot,
    persisted: &PersistedFingerprints,
    scope: DiffScope<'_>,
) -> Diff {
    let mut changes = ChangeSet::new(source_id);
    let mut unchanged = 0;

    let artwork: HashMap<(String, String), &str> = snapshot
        .albums
        .iter()
        .filter_map(|album| {
            album
                .artwork_uri
                .as_deref()
                .map(|uri| (album.key.identity(), uri))
        })
        .collect();

    for track in &snapshot.tracks {
        match persisted.tracks.get(&track.content_uri) {
            Some(existing) if *existing == track.fingerprint => unchanged += 1,
            found => {
                let write = track_write(track, artwork.get(&track.album.identity()).copied());
                if found.is_none() {
                    changes.track_inserts.push(write);
                } else {
                    changes.track_updates.push(write);
                }
            }
        }
    }

    for video in &snapshot.videos {
        let fingerprint = video.fingerprint();
        match persisted.videos.get(&video.content_uri) {
            None => changes.video_inserts.push(video_write(video, fingerprint)),
            Some(existing) if *existing != fingerprint => {
                changes.video_updates.push(video_write(video, fingerprint))
            }
            Some(_) => unchanged += 1,
        }
    }

    match scope {
        DiffScope::Full => {
            let present: HashSet<&str> = snapshot
                .tracks
                .iter()
                .map(|t| t.content_uri.as_str())
                .chain(snapshot.videos.iter().map(|v| v.content_uri.as_str()))
                .collect();

            changes.track_deletes = stale(persisted.tracks.keys(), &present);
            changes.video_deletes = stale(persisted.videos.keys(), &present);
        }
        DiffScope::Uris { missing } => {
            for uri in missing {
                if persisted.tracks.contains_key(uri) {
                    changes.track_deletes.push(uri.clone());
                } else if persisted.videos.contains_key(uri) {
                    changes.video_deletes.push(uri.clone());
                }
            }
        }
    }

    Diff { changes, unchanged }
}

fn stale<'a>(persisted: impl Iterator<Item = &'a String>, present: &HashSet<&str>) -> Vec<String> {
    let mut uris: Vec<String> = persisted
        .filter(|uri| !present.contains(uri.as_str()))
        .cloned()
        .collect();
    uris.sort();
    uris
}

fn track_write(track: &SnapshotTrack, artwork: Option<&str>) -> TrackWrite {
    TrackWrite {
        content_uri: track.content_uri.clone(),
        fingerprint: track.fingerprint.clone(),
        title: track.title.clone(),
        duration_ms: track.duration_ms,
        track_number: track.track_number,
        disc_number: track.disc_number,
        album_name: track.album.name.clone(),
        album_artist: track.album.artist.clone(),
        album_artwork_uri: artwork.map(str::to_string),
        artist_name: track.artist.clone(),
        genre_name: track.genre.clone(),
        last_modified_ms: track.last_modified_ms,
        size_bytes: track.size_bytes,
    }
}

fn video_write(video: &SnapshotVideo, fingerprint: String) -> VideoWrite {
    VideoWrite {
        content_uri: video.content_uri.clone(),
        fingerprint,
        title: video.title.clone(),
        duration_ms: video.duration_ms,
        last_modified_ms: video.last_modified_ms,
        size_bytes: video.size_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SnapshotBuilder, TrackEntry, VideoEntry};

    fn snapshot(tracks: &[(&str, &str)]) -> MediaSnapshot {
        let mut builder = SnapshotBuilder::new();
        for (uri, title) in tracks {
            builder
                .add_track(TrackEntry {
                    content_uri: uri.to_string(),
                    title: Some(title.to_string()),
                    duration_ms: Some(1_000),
                    ..Default::default()
                })
                .unwrap();
        }
        builder.build()
    }

    fn persisted_from(snapshot: &MediaSnapshot) -> PersistedFingerprints {
        diff("s", snapshot, &PersistedFingerprints::default(), DiffScope::Full)
            .changes
            .track_inserts
            .into_iter()
            .map(|w| (w.content_uri, w.fingerprint))
            .collect::<HashMap<_, _>>()
            .into()
    }

    impl From<HashMap<String, String>> for PersistedFingerprints {
        fn from(tracks: HashMap<String, String>) -> Self {
            Self {
                tracks,
                videos: HashMap::new(),
            }
        }
    }

    #[test]
    fn test_first_sync_inserts_everything() {
        let snap = snapshot(&[("u1", "A"), ("u2", "B")]);
        let result = diff("s", &snap, &PersistedFingerprints::default(), DiffScope::Full);

        assert_eq!(result.changes.track_inserts.len(), 2);
        assert_eq!(result.unchanged, 0);
        assert!(result.changes.track_deletes.is_empty());
    }

    #[test]
    fn test_unchanged_snapshot_is_empty_change_set() {
        let snap = snapshot(&[("u1", "A"), ("u2", "B")]);
        let persisted = persisted_from(&snap);

        let result = diff("s", &snap, &persisted, DiffScope::Full);

        assert!(result.changes.is_empty());
        assert_eq!(result.unchanged, 2);
    }

    #[test]
    fn test_full_scope_deletes_absent_uris() {
        let before = snapshot(&[("u1", "A"), ("u2", "B"), ("u3", "C")]);
        let persisted = persisted_from(&before);
        let after = snapshot(&[("u1", "A"), ("u2", "B, remastered")]);

        let result = diff("s", &after, &persisted, DiffScope::Full);

        assert_eq!(result.changes.track_updates.len(), 1);
        assert_eq!(result.changes.track_updates[0].content_uri, "u2");
        assert_eq!(result.changes.track_deletes, vec!["u3".to_string()]);
        assert_eq!(result.unchanged, 1);
    }

    #[test]
    fn test_uri_scope_only_deletes_reported_missing() {
        let before = snapshot(&[("u1", "A"), ("u2", "B"), ("u3", "C")]);
        let persisted = persisted_from(&before);
        let after = snapshot(&[("u1", "A2")]);
        let missing = vec!["u2".to_string(), "elsewhere".to_string()];

        let result = diff("s", &after, &persisted, DiffScope::Uris { missing: &missing });

        assert_eq!(result.changes.track_updates.len(), 1);
        assert_eq!(result.changes.track_deletes, vec!["u2".to_string()]);
    }

    #[test]
    fn test_videos_follow_the_same_rules() {
        let mut builder = SnapshotBuilder::new();
        builder
            .add_video(VideoEntry {
                content_uri: "v1".to_string(),
                title: Some("Clip".to_string()),
                ..Default::default()
            })
            .unwrap();
        let snap = builder.build();

        let first = diff("s", &snap, &PersistedFingerprints::default(), DiffScope::Full);
        assert_eq!(first.changes.video_inserts.len(), 1);

        let persisted = PersistedFingerprints {
            tracks: HashMap::new(),
            videos: [
                ("v1".to_string(), first.changes.video_inserts[0].fingerprint.clone()),
                ("v2".to_string(), "old".to_string()),
            ]
            .into_iter()
            .collect(),
        };
        let second = diff("s", &snap, &persisted, DiffScope::Full);
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.changes.video_deletes, vec!["v2".to_string()]);
    }

    #[test]
    fn test_album_artwork_reaches_every_track_write() {
        let mut builder = SnapshotBuilder::new();
        for (uri, art) in [("u1", None), ("u2", Some("content://art/7"))] {
            builder
                .add_track(TrackEntry {
                    content_uri: uri.to_string(),
                    title: Some(uri.to_string()),
                    album: Some("Kind of Blue".to_string()),
                    artist: Some("Miles Davis".to_string()),
                    artwork_uri: art.map(str::to_string),
                    ..Default::default()
                })
                .unwrap();
        }
        let snap = builder.build();

        let result = diff("s", &snap, &PersistedFingerprints::default(), DiffScope::Full);
        for write in &result.changes.track_inserts {
            assert_eq!(write.album_artwork_uri.as_deref(), Some("content://art/7"));
        }
    }
}
