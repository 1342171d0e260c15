//! SQLite-based operation store.
//!
//! This module provides the durable implementation of the `OperationStore`
//! trait. Records live in the `sync_operations` table, keyed by an
//! autoincrement id (never reused) that is also the FIFO ordering key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::{watch, Mutex};

use crate::metrics::QueueMetrics;
use crate::operation::{NewOperation, OperationKind, OperationRecord};

use super::backend::{CountPublisher, OperationStore, StoreError, StoreStats};

type OperationRow = (i64, String, String, String, Option<String>, i64, i64, Option<String>);

const SELECT_COLUMNS: &str =
    "SELECT id, kind, target_id, account_id, payload, enqueued_at, retry_count, last_error FROM sync_operations";

/// SQLite-based operation store.
///
/// Each mutation is a single statement or a single transaction, so it commits
/// independently and is durable once the call returns.
pub struct SqliteOperationStore {
    /// SQLite connection pool
    pool: SqlitePool,

    count: CountPublisher,

    /// Serializes count read-and-publish so a stale count never lands last
    count_lock: Mutex<()>,
}

impl SqliteOperationStore {
    /// Create a store over a pool whose schema is already migrated.
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        let initial = count_rows(&pool).await?;
        QueueMetrics::set_pending(initial);

        Ok(Self {
            pool,
            count: CountPublisher::new(initial),
            count_lock: Mutex::new(()),
        })
    }

    /// Re-read the row count and notify subscribers.
    ///
    /// The mutation has already committed at this point, so a failed count
    /// only delays the badge update until the next mutation.
    async fn refresh_count(&self) {
        let _guard = self.count_lock.lock().await;
        match count_rows(&self.pool).await {
            Ok(count) => {
                QueueMetrics::set_pending(count);
                self.count.publish(count);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh pending count");
            }
        }
    }
}

async fn count_rows(pool: &SqlitePool) -> Result<usize, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_operations")
        .fetch_one(pool)
        .await?;
    Ok(count as usize)
}

fn decode_row(row: OperationRow) -> Result<OperationRecord, StoreError> {
    let (id, kind, target_id, account_id, payload, enqueued_at, retry_count, last_error) = row;

    let kind: OperationKind = kind.parse().map_err(|e: crate::operation::UnknownKind| {
        StoreError::Corrupt {
            id,
            reason: e.to_string(),
        }
    })?;
    let enqueued_at = DateTime::<Utc>::from_timestamp_micros(enqueued_at).ok_or_else(|| {
        StoreError::Corrupt {
            id,
            reason: format!("invalid enqueued_at {}", enqueued_at),
        }
    })?;

    Ok(OperationRecord {
        id,
        kind,
        target_id,
        account_id,
        payload,
        enqueued_at,
        retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
        last_error,
    })
}

/// Decode rows, keeping undecodable ones in the table but out of the result.
fn decode_rows(rows: Vec<OperationRow>) -> Vec<OperationRecord> {
    rows.into_iter()
        .filter_map(|row| match decode_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable queued operation");
                None
            }
        })
        .collect()
}

async fn insert<'e, E>(executor: E, operation: &NewOperation) -> Result<i64, sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO sync_operations (kind, target_id, account_id, payload, enqueued_at, retry_count, last_error)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, NULL)
        "#,
    )
    .bind(operation.kind.as_str())
    .bind(&operation.target_id)
    .bind(&operation.account_id)
    .bind(&operation.payload)
    .bind(Utc::now().timestamp_micros())
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

#[async_trait]
impl OperationStore for SqliteOperationStore {
    fn backend_type(&self) -> &'static str {
        "sqlite"
    }

    async fn enqueue(&self, operation: NewOperation) -> Result<i64, StoreError> {
        operation.validate()?;

        let id = insert(&self.pool, &operation).await?;

        QueueMetrics::record_enqueued(operation.kind);
        self.refresh_count().await;

        tracing::debug!(
            operation_id = id,
            kind = %operation.kind,
            account_id = %operation.account_id,
            "Operation enqueued to SQLite"
        );

        Ok(id)
    }

    async fn enqueue_batch(&self, operations: Vec<NewOperation>) -> Result<Vec<i64>, StoreError> {
        for operation in &operations {
            operation.validate()?;
        }

        // Dropping the transaction on error rolls it back
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(operations.len());
        for operation in &operations {
            ids.push(insert(&mut *tx, operation).await?);
        }
        tx.commit().await?;

        for operation in &operations {
            QueueMetrics::record_enqueued(operation.kind);
        }
        self.refresh_count().await;

        tracing::debug!(batch_size = ids.len(), "Operation batch enqueued to SQLite");
        Ok(ids)
    }

    async fn list_pending(&self) -> Result<Vec<OperationRecord>, StoreError> {
        let rows: Vec<OperationRow> =
            sqlx::query_as(&format!("{} ORDER BY id ASC", SELECT_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        Ok(decode_rows(rows))
    }

    async fn list_failed(&self, max_retries: u32) -> Result<Vec<OperationRecord>, StoreError> {
        let rows: Vec<OperationRow> = sqlx::query_as(&format!(
            "{} WHERE retry_count >= ?1 ORDER BY id ASC",
            SELECT_COLUMNS
        ))
        .bind(max_retries as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows(rows))
    }

    async fn get(&self, id: i64) -> Result<Option<OperationRecord>, StoreError> {
        let row: Option<OperationRow> =
            sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(decode_row).transpose()
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sync_operations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let existed = result.rows_affected() > 0;
        if existed {
            self.refresh_count().await;
        }
        Ok(existed)
    }

    async fn delete_by_target(&self, target_id: &str) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM sync_operations WHERE target_id = ?1")
            .bind(target_id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() as usize;
        if removed > 0 {
            self.refresh_count().await;
            tracing::debug!(target_id = %target_id, removed = removed, "Removed operations for target");
        }
        Ok(removed)
    }

    async fn clear_all(&self) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM sync_operations")
            .execute(&self.pool)
            .await?;

        self.refresh_count().await;
        Ok(result.rows_affected() as usize)
    }

    async fn increment_retry(&self, id: i64, error: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE sync_operations SET retry_count = retry_count + 1, last_error = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn reset_retry(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE sync_operations SET retry_count = 0, last_error = NULL WHERE id = ?1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn reset_all_failed(&self, max_retries: u32) -> Result<usize, StoreError> {
        let result = sqlx::query(
            "UPDATE sync_operations SET retry_count = 0, last_error = NULL WHERE retry_count >= ?1",
        )
        .bind(max_retries as i64)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn count_pending(&self) -> Result<usize, StoreError> {
        count_rows(&self.pool).await
    }

    fn subscribe_count(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }

    async fn stats(&self, max_retries: u32) -> StoreStats {
        let (pending, exhausted, max_retry_count): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) AS pending,
                COALESCE(SUM(CASE WHEN retry_count >= ?1 THEN 1 ELSE 0 END), 0) AS exhausted,
                COALESCE(MAX(retry_count), 0) AS max_retry_count
            FROM sync_operations
            "#,
        )
        .bind(max_retries as i64)
        .fetch_one(&self.pool)
        .await
        .unwrap_or((0, 0, 0));

        StoreStats {
            backend_type: self.backend_type().to_string(),
            pending: pending as usize,
            exhausted: exhausted as usize,
            max_retry_count: u32::try_from(max_retry_count).unwrap_or(u32::MAX),
        }
    }
}
