//! Album repository trait and implementation

use crate::error::Result;
use crate::models::{normalize_name, Album};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

/// Read access to albums
#[async_trait]
pub trait AlbumRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Album>>;

    /// Find an album by name within an album artist (case-insensitive)
    async fn find_by_name(&self, name: &str, artist_id: &str) -> Result<Option<Album>>;

    /// All albums, ordered by name
    async fn query(&self, page_request: PageRequest) -> Result<Page<Album>>;

    async fn query_by_artist(
        &self,
        artist_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Album>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqliteAlbumRepository {
    pool: SqlitePool,
}

impl SqliteAlbumRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlbumRepository for SqliteAlbumRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Album>> {
        let album = query_as::<_, Album>("SELECT * FROM albums WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(album)
    }

    async fn find_by_name(&self, name: &str, artist_id: &str) -> Result<Option<Album>> {
        let album = query_as::<_, Album>(
            "SELECT * FROM albums WHERE normalized_name = ? AND artist_id = ?",
        )
        .bind(normalize_name(name))
        .bind(artist_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(album)
    }

    async fn query(&self, page_request: PageRequest) -> Result<Page<Album>> {
        let total: (i64,) = query_as("SELECT COUNT(*) FROM albums")
            .fetch_one(&self.pool)
            .await?;

        let albums = query_as::<_, Album>(
            "SELECT * FROM albums ORDER BY normalized_name, id LIMIT ? OFFSET ?",
        )
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(albums, total.0 as u64, page_request))
    }

    async fn query_by_artist(
        &self,
        artist_id: &str,
        page_request: PageRequest,
    ) -> Result<Page<Album>> {
        let total: (i64,) = query_as("SELECT COUNT(*) FROM albums WHERE artist_id = ?")
            .bind(artist_id)
            .fetch_one(&self.pool)
            .await?;

        let albums = query_as::<_, Album>(
            "SELECT * FROM albums WHERE artist_id = ? ORDER BY normalized_name LIMIT ? OFFSET ?",
        )
        .bind(artist_id)
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(albums, total.0 as u64, page_request))
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = query_as("SELECT COUNT(*) FROM albums")
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
    async fn test_albums_carry_track_counts() {
        let repo = SqliteAlbumRepository::new(seeded_pool().await);

        let page = repo.query(PageRequest::default()).await.unwrap();
        let summary: Vec<_> = page
            .items
            .iter()
            .map(|a| (a.name.as_str(), a.track_count))
            .collect();

        assert_eq!(summary, vec![("Abbey Road", 2), ("Kind of Blue", 1)]);
        assert!(page.items.iter().all(|a| a.validate().is_ok()));
    }

    #[tokio::test]
    async fn test_find_by_name_is_case_insensitive() {
        let repo = SqliteAlbumRepository::new(seeded_pool().await);
        let album = repo.query(PageRequest::default()).await.unwrap().items[0].clone();

        let found = repo
            .find_by_name("ABBEY   road", &album.artist_id)
            .await
            .unwrap();
        assert_eq!(found.map(|a| a.id), Some(album.id.clone()));

        let other_artist = repo.find_by_name("Abbey Road", "nobody").await.unwrap();
        assert!(other_artist.is_none());
    }

    #[tokio::test]
    async fn test_query_by_artist() {
        let repo = SqliteAlbumRepository::new(seeded_pool().await);
        let album = repo.query(PageRequest::default()).await.unwrap().items[1].clone();

        let page = repo
            .query_by_artist(&album.artist_id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Kind of Blue");
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
