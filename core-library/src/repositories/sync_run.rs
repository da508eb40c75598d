//! Sync run history
//!
//! One row per sync attempt. Rows are inserted as `syncing` when a run
//! starts and finished exactly once with `success` or `failed`.

use crate::error::{LibraryError, Result};
use crate::models::SyncRun;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Record a run that has just started
    async fn insert(&self, run: &SyncRun) -> Result<()>;

    /// Persist the terminal status, counters and error of a run
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the run was never inserted.
    async fn finish(&self, run: &SyncRun) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<SyncRun>>;

    /// Most recent runs of a source, newest first
    async fn recent(&self, source_id: &str, limit: u32) -> Result<Vec<SyncRun>>;
}

pub struct SqliteSyncRunRepository {
    pool: SqlitePool,
}

impl SqliteSyncRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    async fn insert(&self, run: &SyncRun) -> Result<()> {
        query(
            r#"
            INSERT INTO sync_runs (
                id, source_id, kind, status, started_at, finished_at,
                added, updated, deleted, unchanged, skipped, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.id)
        .bind(&run.source_id)
        .bind(&run.kind)
        .bind(&run.status)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.added)
        .bind(run.updated)
        .bind(run.deleted)
        .bind(run.unchanged)
        .bind(run.skipped)
        .bind(&run.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn finish(&self, run: &SyncRun) -> Result<()> {
        let result = query(
            r#"
            UPDATE sync_runs
            SET status = ?, finished_at = ?, added = ?, updated = ?, deleted = ?,
                unchanged = ?, skipped = ?, error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(&run.status)
        .bind(run.finished_at)
        .bind(run.added)
        .bind(run.updated)
        .bind(run.deleted)
        .bind(run.unchanged)
        .bind(run.skipped)
        .bind(&run.error_message)
        .bind(&run.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::NotFound {
                entity_type: "SyncRun".to_string(),
                id: run.id.clone(),
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SyncRun>> {
        let run = query_as::<_, SyncRun>("SELECT * FROM sync_runs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(run)
    }

    async fn recent(&self, source_id: &str, limit: u32) -> Result<Vec<SyncRun>> {
        let runs = query_as::<_, SyncRun>(
            "SELECT * FROM sync_runs WHERE source_id = ? ORDER BY started_at DESC, rowid DESC LIMIT ?",
        )
        .bind(source_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::SyncRunKind;

    #[tokio::test]
    async fn test_insert_and_finish() {
        let repo = SqliteSyncRunRepository::new(create_test_pool().await.unwrap());

        let mut run = SyncRun::started("device", SyncRunKind::Full, 1_000);
        repo.insert(&run).await.unwrap();

        let stored = repo.find_by_id(&run.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "syncing");
        assert!(!stored.is_finished());

        run.status = "success".to_string();
        run.finished_at = Some(2_000);
        run.added = 3;
        run.unchanged = 7;
        repo.finish(&run).await.unwrap();

        let stored = repo.find_by_id(&run.id).await.unwrap().unwrap();
        assert_eq!(stored, run);
        assert_eq!(stored.run_kind(), Some(SyncRunKind::Full));
    }

    #[tokio::test]
    async fn test_finish_unknown_run() {
        let repo = SqliteSyncRunRepository::new(create_test_pool().await.unwrap());
        let run = SyncRun::started("device", SyncRunKind::Scoped, 1_000);

        let result = repo.finish(&run).await;
        assert!(matches!(result, Err(LibraryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_per_source() {
        let repo = SqliteSyncRunRepository::new(create_test_pool().await.unwrap());

        for started_at in [1_000, 3_000, 2_000] {
            repo.insert(&SyncRun::started("device", SyncRunKind::Full, started_at))
                .await
                .unwrap();
        }
        repo.insert(&SyncRun::started("remote", SyncRunKind::Full, 9_000))
            .await
            .unwrap();

        let runs = repo.recent("device", 2).await.unwrap();
        let starts: Vec<_> = runs.iter().map(|r| r.started_at).collect();
        assert_eq!(starts, vec![3_000, 2_000]);
    }

    #[tokio::test]
    async fn test_rejects_unknown_status() {
        let repo = SqliteSyncRunRepository::new(create_test_pool().await.unwrap());
        let mut run = SyncRun::started("device", SyncRunKind::Full, 1_000);
        run.status = "paused".to_string();

        assert!(repo.insert(&run).await.is_err());
    }
}
