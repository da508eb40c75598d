//! Track repository trait and implementation

use crate::error::Result;
use crate::models::{normalize_name, Track};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

/// Read access to persisted tracks
#[async_trait]
pub trait TrackRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>>;

    /// Find a track by its content URI (the natural key)
    async fn find_by_uri(&self, content_uri: &str) -> Result<Option<Track>>;

    /// All tracks, ordered by title
    async fn query(&self, page_request: PageRequest) -> Result<Page<Track>>;

    /// Tracks of an album in disc/track order
    async fn query_by_album(&self, album_id: &str, page_request: PageRequest)
        -> Result<Page<Track>>;

    async fn query_by_artist(
        &self,
        artist_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>>;

    async fn query_by_genre(&self, genre_id: &str, page_request: PageRequest)
        -> Result<Page<Track>>;

    async fn query_by_source(
        &self,
        source_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>>;

    /// Case-insensitive substring search over titles
    async fn search(&self, search_query: &str, page_request: PageRequest) -> Result<Page<Track>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of TrackRepository
pub struct SqliteTrackRepository {
    pool: SqlitePool,
}

impl SqliteTrackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs a filtered page query: `filter` is a fixed `WHERE` clause with
    /// at most one placeholder, bound to `value`.
    async fn page_where(
        &self,
        filter: &str,
        value: Option<&str>,
        order_by: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>> {
        let count_sql = format!("SELECT COUNT(*) FROM tracks WHERE {}", filter);
        let mut count_query = query_as::<_, (i64,)>(&count_sql);
        if let Some(value) = value {
            count_query = count_query.bind(value);
        }
        let (total,) = count_query.fetch_one(&self.pool).await?;

        let page_sql = format!(
            "SELECT * FROM tracks WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            filter, order_by
        );
        let mut page_query = query_as::<_, Track>(&page_sql);
        if let Some(value) = value {
            page_query = page_query.bind(value);
        }
        let tracks = page_query
            .bind(page_request.limit())
            .bind(page_request.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(tracks, total as u64, page_request))
    }
}

#[async_trait]
impl TrackRepository for SqliteTrackRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Track>> {
        let track = query_as::<_, Track>("SELECT * FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    async fn find_by_uri(&self, content_uri: &str) -> Result<Option<Track>> {
        let track = query_as::<_, Track>("SELECT * FROM tracks WHERE content_uri = ?")
            .bind(content_uri)
            .fetch_optional(&self.pool)
            .await?;

        Ok(track)
    }

    async fn query(&self, page_request: PageRequest) -> Result<Page<Track>> {
        self.page_where("1 = 1", None, "normalized_title, id", page_request)
            .await
    }

    async fn query_by_album(
        &self,
        album_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>> {
        self.page_where(
            "album_id = ?",
            Some(album_id),
            "COALESCE(disc_number, 1), COALESCE(track_number, 0), normalized_title",
            page_request,
        )
        .await
    }

    async fn query_by_artist(
        &self,
        artist_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>> {
        self.page_where(
            "artist_id = ?",
            Some(artist_id),
            "album_id, COALESCE(track_number, 0), normalized_title",
            page_request,
        )
        .await
    }

    async fn query_by_genre(
        &self,
        genre_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>> {
        self.page_where(
            "genre_id = ?",
            Some(genre_id),
            "normalized_title, id",
            page_request,
        )
        .await
    }

    async fn query_by_source(
        &self,
        source_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Track>> {
        self.page_where(
            "source_id = ?",
            Some(source_id),
            "created_at DESC, id",
            page_request,
        )
        .await
    }

    async fn search(&self, search_query: &str, page_request: PageRequest) -> Result<Page<Track>> {
        let pattern = format!("%{}%", normalize_name(search_query));
        self.page_where(
            "normalized_title LIKE ?",
            Some(&pattern),
            "normalized_title, id",
            page_request,
        )
        .await
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = query_as("SELECT COUNT(*) FROM tracks")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::seeded_pool;

    #[tokio::test]
    async fn test_find_by_uri_and_id() {
        let repo = SqliteTrackRepository::new(seeded_pool().await);

        let track = repo.find_by_uri("u3").await.unwrap().unwrap();
        assert_eq!(track.title, "So What");
        assert_eq!(track.source_id, "device");

        let same = repo.find_by_id(&track.id).await.unwrap().unwrap();
        assert_eq!(same, track);

        assert!(repo.find_by_uri("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_by_album_orders_by_track_number() {
        let repo = SqliteTrackRepository::new(seeded_pool().await);
        let track = repo.find_by_uri("u1").await.unwrap().unwrap();

        let page = repo
            .query_by_album(&track.album_id, PageRequest::default())
            .await
            .unwrap();

        let titles: Vec<_> = page.items.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Come Together", "Something"]);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_query_by_genre_and_source() {
        let repo = SqliteTrackRepository::new(seeded_pool().await);
        let jazz = repo.find_by_uri("u3").await.unwrap().unwrap();

        let page = repo
            .query_by_genre(&jazz.genre_id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let page = repo
            .query_by_source("device", PageRequest::new(0, 2))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);
        assert!(page.has_next());
    }

    #[tokio::test]
    async fn test_search_and_count() {
        let repo = SqliteTrackRepository::new(seeded_pool().await);

        let page = repo.search("WHAT", PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "So What");

        assert_eq!(repo.count().await.unwrap(), 3);
    }
}
