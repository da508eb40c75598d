//! # Repository Pattern Implementation
//!
//! Read-side repositories over the library database. Writes come from the
//! sync engine through [`LibraryStore`](crate::store::LibraryStore); the
//! only repository with write methods is the sync history.
//!
//! ## Available Repositories
//!
//! - `TrackRepository` - Tracks by id, URI, album, artist, genre, source
//! - `AlbumRepository` - Albums with artist relationships
//! - `ArtistRepository` - Artists
//! - `GenreRepository` - Genres
//! - `VideoRepository` - Videos
//! - `SyncRunRepository` - History of sync runs

pub mod album;
pub mod artist;
pub mod genre;
pub mod pagination;
pub mod sync_run;
pub mod track;
pub mod video;

pub use album::{AlbumRepository, SqliteAlbumRepository};
pub use artist::{ArtistRepository, SqliteArtistRepository};
pub use genre::{GenreRepository, SqliteGenreRepository};
pub use pagination::{Page, PageRequest};
pub use sync_run::{SqliteSyncRunRepository, SyncRunRepository};
pub use track::{SqliteTrackRepository, TrackRepository};
pub use video::{SqliteVideoRepository, VideoRepository};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::db::create_test_pool;
    use crate::store::{ChangeSet, LibraryStore, TrackWrite};
    use bridge_traits::SystemClock;
    use sqlx::SqlitePool;
    use std::sync::Arc;

    pub fn track(uri: &str, title: &str, album: &str, artist: &str, genre: &str) -> TrackWrite {
        TrackWrite {
            content_uri: uri.to_string(),
            fingerprint: format!("fp-{}", uri),
            title: title.to_string(),
            duration_ms: 180_000,
            track_number: None,
            disc_number: None,
            album_name: album.to_string(),
            album_artist: artist.to_string(),
            album_artwork_uri: None,
            artist_name: artist.to_string(),
            genre_name: genre.to_string(),
            last_modified_ms: 1,
            size_bytes: 1,
        }
    }

    /// Pool holding two albums by two artists across two genres.
    pub async fn seeded_pool() -> SqlitePool {
        let pool = create_test_pool().await.unwrap();
        let store = LibraryStore::new(pool.clone(), Arc::new(SystemClock));

        let mut changes = ChangeSet::new("device");
        let mut first = track("u1", "Come Together", "Abbey Road", "The Beatles", "Rock");
        first.track_number = Some(1);
        let mut second = track("u2", "Something", "Abbey Road", "The Beatles", "Rock");
        second.track_number = Some(2);
        changes.track_inserts.push(second);
        changes.track_inserts.push(first);
        changes
            .track_inserts
            .push(track("u3", "So What", "Kind of Blue", "Miles Davis", "Jazz"));
        store.apply(&changes).await.unwrap();

        pool
    }
}
