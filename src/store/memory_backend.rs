//! In-memory operation store.
//!
//! This module provides a memory-based implementation of the `OperationStore`
//! trait. Records are lost on restart; use it for tests and for deployments
//! that accept losing queued actions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex};

use crate::metrics::QueueMetrics;
use crate::operation::{NewOperation, OperationRecord};

use super::backend::{CountPublisher, OperationStore, StoreError, StoreStats};

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<i64, OperationRecord>,
    next_id: i64,
}

impl Inner {
    /// Records in id order, which is enqueue order.
    fn ordered(&self) -> Vec<OperationRecord> {
        self.records.values().cloned().collect()
    }

    fn insert(&mut self, operation: NewOperation) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        self.records.insert(id, operation.into_record(id, Utc::now()));
        id
    }
}

/// In-memory operation store.
///
/// A single mutex guards the record map, so every call observes and produces
/// a consistent snapshot. Ids keep increasing after deletes.
pub struct MemoryOperationStore {
    inner: Mutex<Inner>,
    count: CountPublisher,
}

impl MemoryOperationStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            count: CountPublisher::new(0),
        }
    }

    fn publish(&self, count: usize) {
        QueueMetrics::set_pending(count);
        self.count.publish(count);
    }
}

impl Default for MemoryOperationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperationStore for MemoryOperationStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn enqueue(&self, operation: NewOperation) -> Result<i64, StoreError> {
        operation.validate()?;
        let kind = operation.kind;

        let mut inner = self.inner.lock().await;
        let id = inner.insert(operation);
        let count = inner.records.len();
        drop(inner);

        QueueMetrics::record_enqueued(kind);
        self.publish(count);

        tracing::debug!(operation_id = id, kind = %kind, "Operation enqueued");
        Ok(id)
    }

    async fn enqueue_batch(&self, operations: Vec<NewOperation>) -> Result<Vec<i64>, StoreError> {
        // Validate everything first so a bad entry leaves the store untouched
        for operation in &operations {
            operation.validate()?;
        }

        let kinds: Vec<_> = operations.iter().map(|op| op.kind).collect();

        let mut inner = self.inner.lock().await;
        let ids: Vec<i64> = operations.into_iter().map(|op| inner.insert(op)).collect();
        let count = inner.records.len();
        drop(inner);

        for kind in kinds {
            QueueMetrics::record_enqueued(kind);
        }
        self.publish(count);

        tracing::debug!(batch_size = ids.len(), "Operation batch enqueued");
        Ok(ids)
    }

    async fn list_pending(&self) -> Result<Vec<OperationRecord>, StoreError> {
        Ok(self.inner.lock().await.ordered())
    }

    async fn list_failed(&self, max_retries: u32) -> Result<Vec<OperationRecord>, StoreError> {
        let records = self.inner.lock().await.ordered();
        Ok(records
            .into_iter()
            .filter(|r| r.is_exhausted(max_retries))
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Option<OperationRecord>, StoreError> {
        Ok(self.inner.lock().await.records.get(&id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let existed = inner.records.remove(&id).is_some();
        let count = inner.records.len();
        drop(inner);

        if existed {
            self.publish(count);
        }
        Ok(existed)
    }

    async fn delete_by_target(&self, target_id: &str) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().await;
        let before = inner.records.len();
        inner.records.retain(|_, r| r.target_id != target_id);
        let count = inner.records.len();
        drop(inner);

        let removed = before - count;
        if removed > 0 {
            self.publish(count);
            tracing::debug!(target_id = %target_id, removed = removed, "Removed operations for target");
        }
        Ok(removed)
    }

    async fn clear_all(&self) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().await;
        let removed = inner.records.len();
        inner.records.clear();
        drop(inner);

        self.publish(0);
        Ok(removed)
    }

    async fn increment_retry(&self, id: i64, error: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.retry_count = record.retry_count.saturating_add(1);
        record.last_error = Some(error.to_string());
        Ok(())
    }

    async fn reset_retry(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.retry_count = 0;
        record.last_error = None;
        Ok(())
    }

    async fn reset_all_failed(&self, max_retries: u32) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut reset = 0;
        for record in inner.records.values_mut() {
            if record.is_exhausted(max_retries) {
                record.retry_count = 0;
                record.last_error = None;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn count_pending(&self) -> Result<usize, StoreError> {
        Ok(self.inner.lock().await.records.len())
    }

    fn subscribe_count(&self) -> watch::Receiver<usize> {
        self.count.subscribe()
    }

    async fn stats(&self, max_retries: u32) -> StoreStats {
        let inner = self.inner.lock().await;
        let mut exhausted = 0;
        let mut max_retry_count = 0;

        for record in inner.records.values() {
            if record.is_exhausted(max_retries) {
                exhausted += 1;
            }
            max_retry_count = max_retry_count.max(record.retry_count);
        }

        StoreStats {
            backend_type: self.backend_type().to_string(),
            pending: inner.records.len(),
            exhausted,
            max_retry_count,
        }
    }
}
