//! # Library Store
//!
//! Transactional write path used by the sync engine. A [`ChangeSet`] is the
//! diff between one source's snapshot and the persisted rows; [`LibraryStore::apply`]
//! writes all of it in a single transaction or nothing at all.
//!
//! Dropping the future returned by `apply` before it resolves rolls the
//! transaction back, which is how sync cancellation abandons pending writes.

use crate::error::{LibraryError, Result};
use crate::models::{new_id, normalize_name};
use bridge_traits::Clock;
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Track as read from a source, with its relations given by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackWrite {
    pub content_uri: String,
    pub fingerprint: String,
    pub title: String,
    pub duration_ms: i64,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub album_name: String,
    /// Album artist; part of the album identity
    pub album_artist: String,
    pub album_artwork_uri: Option<String>,
    pub artist_name: String,
    pub genre_name: String,
    pub last_modified_ms: i64,
    pub size_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoWrite {
    pub content_uri: String,
    pub fingerprint: String,
    pub title: String,
    pub duration_ms: i64,
    pub last_modified_ms: i64,
    pub size_bytes: i64,
}

/// Writes for one source, applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub source_id: String,
    pub track_inserts: Vec<TrackWrite>,
    pub track_updates: Vec<TrackWrite>,
    /// Content URIs to delete
    pub track_deletes: Vec<String>,
    pub video_inserts: Vec<VideoWrite>,
    pub video_updates: Vec<VideoWrite>,
    pub video_deletes: Vec<String>,
}

impl ChangeSet {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.track_inserts.is_empty()
            && self.track_updates.is_empty()
            && self.track_deletes.is_empty()
            && self.video_inserts.is_empty()
            && self.video_updates.is_empty()
            && self.video_deletes.is_empty()
    }

    /// Number of row writes this change set will perform (relations excluded).
    pub fn write_count(&self) -> usize {
        self.track_inserts.len()
            + self.track_updates.len()
            + self.track_deletes.len()
            + self.video_inserts.len()
            + self.video_updates.len()
            + self.video_deletes.len()
    }
}

/// A committed track write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackChange {
    pub track_id: String,
    pub content_uri: String,
    pub title: String,
}

/// What [`LibraryStore::apply`] committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub tracks_added: Vec<TrackChange>,
    pub tracks_updated: Vec<TrackChange>,
    pub tracks_deleted: Vec<TrackChange>,
    pub videos_added: u64,
    pub videos_updated: u64,
    pub videos_deleted: u64,
    pub albums_collected: u64,
    pub artists_collected: u64,
    pub genres_collected: u64,
}

impl AppliedChanges {
    pub fn added(&self) -> u64 {
        self.tracks_added.len() as u64 + self.videos_added
    }

    pub fn updated(&self) -> u64 {
        self.tracks_updated.len() as u64 + self.videos_updated
    }

    pub fn deleted(&self) -> u64 {
        self.tracks_deleted.len() as u64 + self.videos_deleted
    }
}

/// Counts returned by the relation garbage collection pass.
#[derive(Debug, Clone, Copy, Default)]
struct Collected {
    albums: u64,
    artists: u64,
    genres: u64,
}

/// Interns relation ids within one transaction.
#[derive(Default)]
struct RelationCache {
    artists: HashMap<String, String>,
    genres: HashMap<String, String>,
    albums: HashMap<(String, String), String>,
}

/// Transactional writer over the library database.
#[derive(Clone)]
pub struct LibraryStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl LibraryStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Current wall-clock time in Unix milliseconds.
    pub fn now_ms(&self) -> i64 {
        self.clock.unix_timestamp_millis()
    }

    /// Persisted track fingerprints of one source, keyed by content URI.
    pub async fn track_fingerprints(&self, source_id: &str) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> =
            query_as("SELECT content_uri, fingerprint FROM tracks WHERE source_id = ?")
                .bind(source_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().collect())
    }

    /// Persisted video fingerprints of one source, keyed by content URI.
    pub async fn video_fingerprints(&self, source_id: &str) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> =
            query_as("SELECT content_uri, fingerprint FROM videos WHERE source_id = ?")
                .bind(source_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().collect())
    }

    /// Apply a change set in one transaction.
    ///
    /// An empty change set performs no writes at all. Otherwise relations are
    /// resolved (created on first use), tracks and videos are written, album
    /// track counts are recounted and orphaned albums, artists and genres are
    /// removed before the commit.
    #[instrument(skip(self, changes), fields(source_id = %changes.source_id, writes = changes.write_count()))]
    pub async fn apply(&self, changes: &ChangeSet) -> Result<AppliedChanges> {
        let mut applied = AppliedChanges::default();
        if changes.is_empty() {
            debug!("Change set is empty, nothing to write");
            return Ok(applied);
        }

        let now = self.now_ms();
        let mut tx = self.pool.begin().await?;
        let mut relations = RelationCache::default();

        for track in &changes.track_inserts {
            let id = upsert_track(&mut tx, &mut relations, &changes.source_id, track, now).await?;
            applied.tracks_added.push(TrackChange {
                track_id: id,
                content_uri: track.content_uri.clone(),
                title: track.title.clone(),
            });
        }

        for track in &changes.track_updates {
            let id = upsert_track(&mut tx, &mut relations, &changes.source_id, track, now).await?;
            applied.tracks_updated.push(TrackChange {
                track_id: id,
                content_uri: track.content_uri.clone(),
                title: track.title.clone(),
            });
        }

        for uri in &changes.track_deletes {
            let deleted: Option<(String, String)> = query_as(
                "DELETE FROM tracks WHERE content_uri = ? AND source_id = ? RETURNING id, title",
            )
            .bind(uri)
            .bind(&changes.source_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some((track_id, title)) = deleted {
                applied.tracks_deleted.push(TrackChange {
                    track_id,
                    content_uri: uri.clone(),
                    title,
                });
            }
        }

        for video in &changes.video_inserts {
            upsert_video(&mut tx, &changes.source_id, video, now).await?;
            applied.videos_added += 1;
        }

        for video in &changes.video_updates {
            upsert_video(&mut tx, &changes.source_id, video, now).await?;
            applied.videos_updated += 1;
        }

        for uri in &changes.video_deletes {
            let result = query("DELETE FROM videos WHERE content_uri = ? AND source_id = ?")
                .bind(uri)
                .bind(&changes.source_id)
                .execute(&mut *tx)
                .await?;
            applied.videos_deleted += result.rows_affected();
        }

        let collected = collect_orphans(&mut tx, now).await?;
        applied.albums_collected = collected.albums;
        applied.artists_collected = collected.artists;
        applied.genres_collected = collected.genres;

        tx.commit().await?;

        info!(
            added = applied.added(),
            updated = applied.updated(),
            deleted = applied.deleted(),
            albums_collected = collected.albums,
            "Library changes committed"
        );

        Ok(applied)
    }
}

async fn upsert_track(
    tx: &mut Transaction<'_, Sqlite>,
    relations: &mut RelationCache,
    source_id: &str,
    track: &TrackWrite,
    now: i64,
) -> Result<String> {
    if track.title.trim().is_empty() || track.content_uri.trim().is_empty() {
        return Err(LibraryError::InvalidInput {
            field: "Track".to_string(),
            message: format!("track '{}' has no title or content URI", track.content_uri),
        });
    }

    let artist_id = resolve_named(tx, &mut relations.artists, "artists", &track.artist_name, now).await?;
    let album_artist_id = resolve_named(
        tx,
        &mut relations.artists,
        "artists",
        &track.album_artist,
        now,
    )
    .await?;
    let genre_id = resolve_named(tx, &mut relations.genres, "genres", &track.genre_name, now).await?;
    let album_id = resolve_album(
        tx,
        relations,
        &track.album_name,
        &album_artist_id,
        track.album_artwork_uri.as_deref(),
        now,
    )
    .await?;

    // The update only applies to rows of the same source; a URI held by
    // another source returns no row.
    let row: Option<(String,)> = query_as(
        r#"
        INSERT INTO tracks (
            id, source_id, content_uri, fingerprint, title, normalized_title,
            duration_ms, track_number, disc_number, album_id, artist_id, genre_id,
            last_modified_ms, size_bytes, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(content_uri) DO UPDATE SET
            fingerprint = excluded.fingerprint,
            title = excluded.title,
            normalized_title = excluded.normalized_title,
            duration_ms = excluded.duration_ms,
            track_number = excluded.track_number,
            disc_number = excluded.disc_number,
            album_id = excluded.album_id,
            artist_id = excluded.artist_id,
            genre_id = excluded.genre_id,
            last_modified_ms = excluded.last_modified_ms,
            size_bytes = excluded.size_bytes,
            updated_at = excluded.updated_at
        WHERE tracks.source_id = excluded.source_id
        RETURNING id
        "#,
    )
    .bind(new_id())
    .bind(source_id)
    .bind(&track.content_uri)
    .bind(&track.fingerprint)
    .bind(track.title.trim())
    .bind(normalize_name(&track.title))
    .bind(track.duration_ms)
    .bind(track.track_number)
    .bind(track.disc_number)
    .bind(&album_id)
    .bind(&artist_id)
    .bind(&genre_id)
    .bind(track.last_modified_ms)
    .bind(track.size_bytes)
    .bind(now)
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some((id,)) => Ok(id),
        None => Err(uri_owner_conflict(tx, "tracks", &track.content_uri).await),
    }
}

async fn upsert_video(
    tx: &mut Transaction<'_, Sqlite>,
    source_id: &str,
    video: &VideoWrite,
    now: i64,
) -> Result<()> {
    let result = query(
        r#"
        INSERT INTO videos (
            id, source_id, content_uri, fingerprint, title, duration_ms,
            last_modified_ms, size_bytes, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(content_uri) DO UPDATE SET
            fingerprint = excluded.fingerprint,
            title = excluded.title,
            duration_ms = excluded.duration_ms,
            last_modified_ms = excluded.last_modified_ms,
            size_bytes = excluded.size_bytes,
            updated_at = excluded.updated_at
        WHERE videos.source_id = excluded.source_id
        "#,
    )
    .bind(new_id())
    .bind(source_id)
    .bind(&video.content_uri)
    .bind(&video.fingerprint)
    .bind(video.title.trim())
    .bind(video.duration_ms)
    .bind(video.last_modified_ms)
    .bind(video.size_bytes)
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(uri_owner_conflict(tx, "videos", &video.content_uri).await);
    }
    Ok(())
}

/// Error for an upsert that hit a row owned by another source
async fn uri_owner_conflict(
    tx: &mut Transaction<'_, Sqlite>,
    table: &'static str,
    content_uri: &str,
) -> LibraryError {
    let owner: std::result::Result<Option<(String,)>, sqlx::Error> =
        query_as(&format!("SELECT source_id FROM {} WHERE content_uri = ?", table))
            .bind(content_uri)
            .fetch_optional(&mut **tx)
            .await;

    match owner {
        Ok(owner) => LibraryError::UriOwnedByOtherSource {
            content_uri: content_uri.to_string(),
            owner: owner.map(|(id,)| id).unwrap_or_default(),
        },
        Err(e) => LibraryError::Database(e),
    }
}

/// Resolve an artist or genre id by normalized name, creating the row on
/// first use. `table` is one of the fixed relation tables.
async fn resolve_named(
    tx: &mut Transaction<'_, Sqlite>,
    cache: &mut HashMap<String, String>,
    table: &'static str,
    name: &str,
    now: i64,
) -> Result<String> {
    let key = normalize_name(name);
    if let Some(id) = cache.get(&key) {
        return Ok(id.clone());
    }

    let existing: Option<(String,)> =
        query_as(&format!("SELECT id FROM {} WHERE normalized_name = ?", table))
            .bind(&key)
            .fetch_optional(&mut **tx)
            .await?;

    let id = match existing {
        Some((id,)) => id,
        None => {
            let id = new_id();
            query(&format!(
                "INSERT INTO {} (id, name, normalized_name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
                table
            ))
            .bind(&id)
            .bind(name.trim())
            .bind(&key)
            .bind(now)
            .bind(now)
            .execute(&mut **tx)
            .await?;
            debug!(table, name = name.trim(), "Created relation row");
            id
        }
    };

    cache.insert(key, id.clone());
    Ok(id)
}

async fn resolve_album(
    tx: &mut Transaction<'_, Sqlite>,
    relations: &mut RelationCache,
    name: &str,
    artist_id: &str,
    artwork_uri: Option<&str>,
    now: i64,
) -> Result<String> {
    let key = (normalize_name(name), artist_id.to_string());
    if let Some(id) = relations.albums.get(&key) {
        return Ok(id.clone());
    }

    let existing: Option<(String, Option<String>)> =
        query_as("SELECT id, artwork_uri FROM albums WHERE normalized_name = ? AND artist_id = ?")
            .bind(&key.0)
            .bind(artist_id)
            .fetch_optional(&mut **tx)
            .await?;

    let id = match existing {
        Some((id, current_artwork)) => {
            if artwork_uri.is_some() && current_artwork.as_deref() != artwork_uri {
                query("UPDATE albums SET artwork_uri = ?, updated_at = ? WHERE id = ?")
                    .bind(artwork_uri)
                    .bind(now)
                    .bind(&id)
                    .execute(&mut **tx)
                    .await?;
            }
            id
        }
        None => {
            let id = new_id();
            query(
                r#"
                INSERT INTO albums (
                    id, name, normalized_name, artist_id, artwork_uri, track_count,
                    created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, 0, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(name.trim())
            .bind(&key.0)
            .bind(artist_id)
            .bind(artwork_uri)
            .bind(now)
            .bind(now)
            .execute(&mut **tx)
            .await?;
            id
        }
    };

    relations.albums.insert(key, id.clone());
    Ok(id)
}

/// Recount album membership and remove relations left without tracks.
async fn collect_orphans(tx: &mut Transaction<'_, Sqlite>, now: i64) -> Result<Collected> {
    query(
        r#"
        UPDATE albums
        SET track_count = (SELECT COUNT(*) FROM tracks WHERE tracks.album_id = albums.id),
            updated_at = ?
        WHERE track_count != (SELECT COUNT(*) FROM tracks WHERE tracks.album_id = albums.id)
        "#,
    )
    .bind(now)
    .execute(&mut **tx)
    .await?;

    let albums = query("DELETE FROM albums WHERE track_count = 0")
        .execute(&mut **tx)
        .await?
        .rows_affected();

    let genres = query(
        "DELETE FROM genres WHERE NOT EXISTS (SELECT 1 FROM tracks WHERE tracks.genre_id = genres.id)",
    )
    .execute(&mut **tx)
    .await?
    .rows_affected();

    let artists = query(
        r#"
        DELETE FROM artists
        WHERE NOT EXISTS (SELECT 1 FROM tracks WHERE tracks.artist_id = artists.id)
          AND NOT EXISTS (SELECT 1 FROM albums WHERE albums.artist_id = artists.id)
        "#,
    )
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(Collected {
        albums,
        artists,
        genres,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use bridge_traits::FixedClock;
    use chrono::{TimeZone, Utc};

    fn store(pool: SqlitePool) -> LibraryStore {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        LibraryStore::new(pool, Arc::new(clock))
    }

    fn track(uri: &str, title: &str, album: &str, artist: &str) -> TrackWrite {
        TrackWrite {
            content_uri: uri.to_string(),
            fingerprint: format!("fp-{}", title),
            title: title.to_string(),
            duration_ms: 200_000,
            track_number: Some(1),
            disc_number: None,
            album_name: album.to_string(),
            album_artist: artist.to_string(),
            album_artwork_uri: None,
            artist_name: artist.to_string(),
            genre_name: "Rock".to_string(),
            last_modified_ms: 1_000,
            size_bytes: 2_000,
        }
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        let (n,): (i64,) = query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn test_empty_change_set_writes_nothing() {
        let pool = create_test_pool().await.unwrap();
        let store = store(pool.clone());

        let applied = store.apply(&ChangeSet::new("device")).await.unwrap();

        assert_eq!(applied, AppliedChanges::default());
        assert_eq!(count(&pool, "tracks").await, 0);
    }

    #[tokio::test]
    async fn test_insert_creates_relations_once() {
        let pool = create_test_pool().await.unwrap();
        let store = store(pool.clone());

        let mut changes = ChangeSet::new("device");
        changes.track_inserts.push(track("u1", "One", "Abbey Road", "The Beatles"));
        changes.track_inserts.push(track("u2", "Two", "abbey road", "the  beatles"));

        let applied = store.apply(&changes).await.unwrap();

        assert_eq!(applied.tracks_added.len(), 2);
        assert_eq!(count(&pool, "albums").await, 1);
        assert_eq!(count(&pool, "artists").await, 1);
        assert_eq!(count(&pool, "genres").await, 1);

        let (track_count,): (i64,) = query_as("SELECT track_count FROM albums")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(track_count, 2);

        let fingerprints = store.track_fingerprints("device").await.unwrap();
        assert_eq!(fingerprints.get("u1"), Some(&"fp-One".to_string()));
    }

    #[tokio::test]
    async fn test_delete_collects_orphaned_relations() {
        let pool = create_test_pool().await.unwrap();
        let store = store(pool.clone());

        let mut changes = ChangeSet::new("device");
        changes.track_inserts.push(track("u1", "One", "Album A", "Artist A"));
        changes.track_inserts.push(track("u2", "Two", "Album B", "Artist B"));
        store.apply(&changes).await.unwrap();

        let mut removal = ChangeSet::new("device");
        removal.track_deletes.push("u2".to_string());
        let applied = store.apply(&removal).await.unwrap();

        assert_eq!(applied.tracks_deleted.len(), 1);
        assert_eq!(applied.albums_collected, 1);
        assert_eq!(applied.artists_collected, 1);
        assert_eq!(applied.genres_collected, 0);
        assert_eq!(count(&pool, "albums").await, 1);
        assert_eq!(count(&pool, "artists").await, 1);
    }

    #[tokio::test]
    async fn test_delete_ignores_other_sources() {
        let pool = create_test_pool().await.unwrap();
        let store = store(pool.clone());

        let mut changes = ChangeSet::new("device");
        changes.track_inserts.push(track("u1", "One", "Album", "Artist"));
        store.apply(&changes).await.unwrap();

        let mut foreign = ChangeSet::new("remote");
        foreign.track_deletes.push("u1".to_string());
        let applied = store.apply(&foreign).await.unwrap();

        assert!(applied.tracks_deleted.is_empty());
        assert_eq!(count(&pool, "tracks").await, 1);
    }

    #[tokio::test]
    async fn test_invalid_track_rolls_back_whole_change_set() {
        let pool = create_test_pool().await.unwrap();
        let store = store(pool.clone());

        let mut changes = ChangeSet::new("device");
        changes.track_inserts.push(track("u1", "One", "Album", "Artist"));
        changes.track_inserts.push(track("u2", "  ", "Album", "Artist"));

        let result = store.apply(&changes).await;

        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
        assert_eq!(count(&pool, "tracks").await, 0);
        assert_eq!(count(&pool, "albums").await, 0);
    }

    #[tokio::test]
    async fn test_update_moves_track_between_albums() {
        let pool = create_test_pool().await.unwrap();
        let store = store(pool.clone());

        let mut changes = ChangeSet::new("device");
        changes.track_inserts.push(track("u1", "One", "Old Album", "Artist"));
        let first = store.apply(&changes).await.unwrap();

        let mut moved = track("u1", "One", "New Album", "Artist");
        moved.fingerprint = "fp-moved".to_string();
        let mut update = ChangeSet::new("device");
        update.track_updates.push(moved);
        let applied = store.apply(&update).await.unwrap();

        assert_eq!(applied.tracks_updated[0].track_id, first.tracks_added[0].track_id);
        assert_eq!(applied.albums_collected, 1);

        let (name,): (String,) = query_as("SELECT name FROM albums")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(name, "New Album");
    }

    #[tokio::test]
    async fn test_videos_follow_same_rules() {
        let pool = create_test_pool().await.unwrap();
        let store = store(pool.clone());

        let mut changes = ChangeSet::new("device");
        changes.video_inserts.push(VideoWrite {
            content_uri: "v1".to_string(),
            fingerprint: "fp".to_string(),
            title: "Clip".to_string(),
            duration_ms: 10_000,
            last_modified_ms: 1,
            size_bytes: 10,
        });
        let applied = store.apply(&changes).await.unwrap();
        assert_eq!(applied.videos_added, 1);
        assert_eq!(
            store.video_fingerprints("device").await.unwrap().len(),
            1
        );

        let mut removal = ChangeSet::new("device");
        removal.video_deletes.push("v1".to_string());
        let applied = store.apply(&removal).await.unwrap();
        assert_eq!(applied.videos_deleted, 1);
        assert_eq!(count(&pool, "videos").await, 0);
    }

    #[tokio::test]
    async fn test_uri_owned_by_another_source_fails_without_takeover() {
        let pool = create_test_pool().await.unwrap();
        let store = store(pool.clone());

        let mut device = ChangeSet::new("device");
        device.track_inserts.push(track("shared://1", "One", "Album", "Artist"));
        store.apply(&device).await.unwrap();

        let mut sdcard = ChangeSet::new("sdcard");
        sdcard.track_inserts.push(track("sdcard://2", "Two", "Other", "Someone"));
        sdcard.track_inserts.push(track("shared://1", "One (copy)", "Album", "Artist"));
        let result = store.apply(&sdcard).await;

        assert!(matches!(
            result,
            Err(LibraryError::UriOwnedByOtherSource { ref content_uri, ref owner })
                if content_uri == "shared://1" && owner == "device"
        ));
        // Rolled back as a whole, the first source keeps its row
        assert_eq!(count(&pool, "tracks").await, 1);
        assert!(store.track_fingerprints("sdcard").await.unwrap().is_empty());
        assert_eq!(
            store.track_fingerprints("device").await.unwrap().get("shared://1"),
            Some(&"fp-One".to_string())
        );

        // Resyncing the owner is still a no-op update of its own row
        let mut again = ChangeSet::new("device");
        again.track_updates.push(track("shared://1", "One", "Album", "Artist"));
        let applied = store.apply(&again).await.unwrap();
        assert_eq!(applied.tracks_updated.len(), 1);
    }

    #[tokio::test]
    async fn test_video_uri_owned_by_another_source_is_rejected() {
        let pool = create_test_pool().await.unwrap();
        let store = store(pool.clone());
        let video = VideoWrite {
            content_uri: "shared://v".to_string(),
            fingerprint: "fp".to_string(),
            title: "Clip".to_string(),
            duration_ms: 10_000,
            last_modified_ms: 1,
            size_bytes: 10,
        };

        let mut device = ChangeSet::new("device");
        device.video_inserts.push(video.clone());
        store.apply(&device).await.unwrap();

        let mut sdcard = ChangeSet::new("sdcard");
        sdcard.video_inserts.push(video);
        assert!(matches!(
            store.apply(&sdcard).await,
            Err(LibraryError::UriOwnedByOtherSource { .. })
        ));
        assert_eq!(store.video_fingerprints("device").await.unwrap().len(), 1);
    }
}
