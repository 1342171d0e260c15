//! Operation store factory

use std::sync::Arc;

use crate::config::QueueConfig;
use crate::sqlite::SqliteDatabase;

use super::backend::{OperationStore, StoreError};
use super::memory_backend::MemoryOperationStore;
use super::sqlite_backend::SqliteOperationStore;

/// Create an operation store based on configuration.
///
/// Returns the appropriate backend implementation based on the `backend` setting:
/// - `"sqlite"` (default): Returns a `SqliteOperationStore` if a database is provided
/// - `"memory"`: Returns a `MemoryOperationStore`
///
/// # Example
///
/// ```rust,ignore
/// let db = SqliteDatabase::connect(&settings.database).await?;
/// let store = create_operation_store(&settings.queue, Some(&db)).await?;
/// ```
pub async fn create_operation_store(
    settings: &QueueConfig,
    database: Option<&SqliteDatabase>,
) -> Result<Arc<dyn OperationStore>, StoreError> {
    match settings.backend.as_str() {
        "memory" => {
            tracing::warn!(
                backend = "memory",
                "Creating memory operation store; queued operations will not survive restart"
            );
            Ok(Arc::new(MemoryOperationStore::new()))
        }
        _ => {
            if let Some(db) = database {
                tracing::info!(backend = "sqlite", url = %db.database_url(), "Creating SQLite operation store");
                Ok(Arc::new(SqliteOperationStore::new(db.pool().clone()).await?))
            } else {
                tracing::warn!(
                    "SQLite backend requested but no database provided, falling back to memory"
                );
                Ok(Arc::new(MemoryOperationStore::new()))
            }
        }
    }
}
