//! # Library Database
//!
//! SQLite pool for the library store. The syncer holds one write
//! transaction per source run while readers keep querying, so file-backed
//! databases run in WAL mode with a busy timeout instead of failing fast on
//! `SQLITE_BUSY`.
//!
//! Migrations under `migrations/` are embedded at compile time and applied
//! every time a pool is created.
//!
//! ```rust,ignore
//! let pool = create_pool(DatabaseConfig::new("/data/library.db")).await?;
//! let store = LibraryStore::new(pool.clone(), Arc::new(SystemClock));
//! ```

use crate::{LibraryError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    location: Location,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a connection waits on a locked database
    pub busy_timeout: Duration,
}

impl DatabaseConfig {
    /// File-backed library database, created if missing
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(database_path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Private in-memory database.
    ///
    /// Every connection to `:memory:` opens its own empty database, so the
    /// pool is pinned to a single connection.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        if self.path().is_some() {
            self.max_connections = max.max(1);
        }
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.location {
            Location::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal),
            Location::Memory => SqliteConnectOptions::new()
                .in_memory(true)
                .journal_mode(SqliteJournalMode::Memory),
        };

        options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open the pool, apply migrations and verify the connection.
///
/// # Errors
///
/// `LibraryError::Database` when the file cannot be opened,
/// `LibraryError::Migration` when the schema cannot be brought up to date.
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    let path = config.path().map(|p| p.display().to_string());
    info!(
        path = path.as_deref().unwrap_or(":memory:"),
        max_connections = config.max_connections,
        "Opening library database"
    );

    // Memory pools must never recycle their only connection.
    let (max_lifetime, idle_timeout) = match config.location {
        Location::File(_) => (
            Some(Duration::from_secs(1800)),
            Some(Duration::from_secs(600)),
        ),
        Location::Memory => (None, None),
    };

    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(max_lifetime)
        .idle_timeout(idle_timeout)
        .connect_with(config.connect_options())
        .await
        .map_err(|e| {
            warn!(error = %e, "Could not open library database");
            LibraryError::Database(e)
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Migration failed");
            LibraryError::Migration(e.to_string())
        })?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;
    debug!("Library database ready");

    Ok(pool)
}

/// In-memory pool with migrations applied
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pragma(pool: &Pool<Sqlite>, name: &str) -> String {
        use sqlx::Row;
        // PRAGMAs return INTEGER or TEXT depending on the name; read as text.
        let row = sqlx::query(&format!("PRAGMA {}", name))
            .fetch_one(pool)
            .await
            .unwrap();
        let value: String = row.try_get_unchecked(0).unwrap();
        value.to_lowercase()
    }

    #[tokio::test]
    async fn test_memory_pool_has_schema() {
        let pool = create_test_pool().await.unwrap();

        for table in ["tracks", "albums", "artists", "genres", "videos", "sync_runs"] {
            let (count,): (i32,) =
                sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
        assert_eq!(pragma(&pool, "foreign_keys").await, "1");
    }

    #[tokio::test]
    async fn test_file_pool_uses_wal_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");

        let pool = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        assert_eq!(pragma(&pool, "journal_mode").await, "wal");
        sqlx::query("INSERT INTO artists (id, name, normalized_name, created_at, updated_at) VALUES ('a1', 'Nina Simone', 'nina simone', 0, 0)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        // Migrations are idempotent across restarts
        let pool = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM artists")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_memory_config_stays_single_connection() {
        let config = DatabaseConfig::in_memory().max_connections(8);
        assert_eq!(config.max_connections, 1);
        assert!(config.path().is_none());

        let config = DatabaseConfig::new("/data/library.db")
            .max_connections(0)
            .busy_timeout(Duration::from_secs(1));
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
        assert_eq!(config.path(), Some(Path::new("/data/library.db")));
    }
}
