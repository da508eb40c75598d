//! Genre repository trait and implementation

use crate::error::Result;
use crate::models::{normalize_name, Genre};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

#[async_trait]
pub trait GenreRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Genre>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Genre>>;

    /// Genres with their track counts, ordered by name
    async fn query_with_counts(&self, page_request: PageRequest) -> Result<Page<(Genre, i64)>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqliteGenreRepository {
    pool: SqlitePool,
}

impl SqliteGenreRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct GenreWithCount {
    #[sqlx(flatten)]
    genre: Genre,
    track_count: i64,
}

#[async_trait]
impl GenreRepository for SqliteGenreRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Genre>> {
        let genre = query_as::<_, Genre>("SELECT * FROM genres WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(genre)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Genre>> {
        let genre = query_as::<_, Genre>("SELECT * FROM genres WHERE normalized_name = ?")
            .bind(normalize_name(name))
            .fetch_optional(&self.pool)
            .await?;

        Ok(genre)
    }

    async fn query_with_counts(&self, page_request: PageRequest) -> Result<Page<(Genre, i64)>> {
        let total: (i64,) = query_as("SELECT COUNT(*) FROM genres")
            .fetch_one(&self.pool)
            .await?;

        let rows = query_as::<_, GenreWithCount>(
            r#"
            SELECT genres.*,
                   (SELECT COUNT(*) FROM tracks WHERE tracks.genre_id = genres.id) AS track_count
            FROM genres
            ORDER BY genres.normalized_name
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(page_request.limit())
        .bind(page_request.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| (row.genre, row.track_count))
            .collect();

        Ok(Page::new(items, total.0 as u64, page_request))
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = query_as("SELECT COUNT(*) FROM genres")
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
    async fn test_genres_with_counts() {
        let repo = SqliteGenreRepository::new(seeded_pool().await);

        let page = repo.query_with_counts(PageRequest::default()).await.unwrap();
        let summary: Vec<_> = page
            .items
            .iter()
            .map(|(genre, count)| (genre.name.as_str(), *count))
            .collect();

        assert_eq!(summary, vec![("Jazz", 1), ("Rock", 2)]);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_find_by_name() {
        let repo = SqliteGenreRepository::new(seeded_pool().await);

        let rock = repo.find_by_name(" ROCK ").await.unwrap().unwrap();
        assert_eq!(repo.find_by_id(&rock.id).await.unwrap(), Some(rock));
    }
}
