//! Artist repository trait and implementation

use crate::error::Result;
use crate::models::{normalize_name, Artist};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

#[async_trait]
pub trait ArtistRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Artist>>;

    /// Find artist by name (case-insensitive, whitespace-normalized)
    async fn find_by_name(&self, name: &str) -> Result<Option<Artist>>;

    async fn query(&self, page_request: PageRequest) -> Result<Page<Artist>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqliteArtistRepository {
    pool: SqlitePool,
}

impl SqliteArtistRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtistRepository for SqliteArtistRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Artist>> {
        let artist = query_as::<_, Artist>("SELECT * FROM artists WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(artist)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Artist>> {
        let artist = query_as::<_, Artist>("SELECT * FROM artists WHERE normalized_name = ?")
            .bind(normalize_name(name))
            .fetch_optional(&self.pool)
            .await?;

        Ok(artist)
    }

    async fn query(&self, page_request: PageRequest) -> Result<Page<Artist>> {
        let total: (i64,) = query_as("SELECT COUNT(*) FROM artists")
            .fetch_one(&self.pool)
            .await?;

        let artists = query_as::<_, Artist>(
            "SELECT * FROM artists ORDER BY normalized_name LIMIT ? OFFSET ?",
        )
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(artists, total.0 as u64, page_request))
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = query_as("SELECT COUNT(*) FROM artists")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
