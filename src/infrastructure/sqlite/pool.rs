//! SQLite connection pool for the durable queue store.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use thiserror::Error;

use crate::config::DatabaseConfig;

/// Errors that can occur with the SQLite pool.
#[derive(Debug, Error)]
pub enum SqlitePoolError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// SQLite connection pool with the queue schema applied.
#[derive(Clone)]
pub struct SqliteDatabase {
    /// The underlying connection pool
    pool: SqlitePool,

    /// Database URL (for logging purposes)
    database_url: String,
}

impl SqliteDatabase {
    /// Open (creating if missing) the database and run migrations.
    ///
    /// In-memory databases live only as long as their connection, so they are
    /// pinned to a single connection that is never recycled.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, SqlitePoolError> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds));

        pool_options = if is_memory_url(&config.url) {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options.max_connections(config.max_connections)
        };

        let pool = pool_options.connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!(
            url = %config.url,
            max_connections = config.max_connections,
            "SQLite queue database opened"
        );

        Ok(Self {
            pool,
            database_url: config.url.clone(),
        })
    }

    /// In-memory database for tests and ephemeral deployments.
    pub async fn in_memory() -> Result<Self, SqlitePoolError> {
        Self::connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        })
        .await
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Close the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite connection pool closed");
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_url_detection() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite://file:queue?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite://mail-sync.db"));
    }

    #[tokio::test]
    async fn test_in_memory_database_has_schema() {
        let db = SqliteDatabase::in_memory().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_operations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_error_types() {
        let err = SqlitePoolError::Sqlx(sqlx::Error::PoolTimedOut);
        assert!(err.to_string().contains("SQLx error"));
    }
}
