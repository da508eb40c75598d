//! Video repository trait and implementation

use crate::error::Result;
use crate::models::Video;
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use sqlx::{query_as, SqlitePool};

#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Video>>;

    async fn find_by_uri(&self, content_uri: &str) -> Result<Option<Video>>;

    async fn query(&self, page_request: PageRequest) -> Result<Page<Video>>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqliteVideoRepository {
    pool: SqlitePool,
}

impl SqliteVideoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VideoRepository for SqliteVideoRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Video>> {
        let video = query_as::<_, Video>("SELECT * FROM videos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(video)
    }

    async fn find_by_uri(&self, content_uri: &str) -> Result<Option<Video>> {
        let video = query_as::<_, Video>("SELECT * FROM videos WHERE content_uri = ?")
            .bind(content_uri)
            .fetch_optional(&self.pool)
            .await?;

        Ok(video)
    }

    async fn query(&self, page_request: PageRequest) -> Result<Page<Video>> {
        let total: (i64,) = query_as("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?;

        let videos =
            query_as::<_, Video>("SELECT * FROM videos ORDER BY title, id LIMIT ? OFFSET ?")
                .bind(page_request.limit())
                .bind(page_request.offset())
                .fetch_all(&self.pool)
                .await?;

        Ok(Page::new(videos, total.0 as u64, page_request))
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = query_as("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::store::{ChangeSet, LibraryStore, VideoWrite};
    use bridge_traits::SystemClock;
    use std::sync::Arc;

    fn video(uri: &str, title: &str) -> VideoWrite {
        VideoWrite {
            content_uri: uri.to_string(),
            fingerprint: "fp".to_string(),
            title: title.to_string(),
            duration_ms: 60_000,
            last_modified_ms: 1,
            size_bytes: 10,
        }
    }

    #[tokio::test]
    async fn test_videos_by_uri_and_title_order() {
        let pool = create_test_pool().await.unwrap();
        let store = LibraryStore::new(pool.clone(), Arc::new(SystemClock));
        let mut changes = ChangeSet::new("device");
        changes.video_inserts.push(video("v2", "Zebra"));
        changes.video_inserts.push(video("v1", "Aardvark"));
        store.apply(&changes).await.unwrap();

        let repo = SqliteVideoRepository::new(pool);
        let page = repo.query(PageRequest::default()).await.unwrap();
        let titles: Vec<_> = page.items.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, vec!["Aardvark", "Zebra"]);

        let found = repo.find_by_uri("v2").await.unwrap().unwrap();
        assert_eq!(found.source_id, "device");
        assert_eq!(repo.find_by_id(&found.id).await.unwrap(), Some(found));
        assert!(repo.find_by_uri("missing").await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
