//! Backend trait for the durable operation queue.
//!
//! This module defines the abstraction layer for queue storage, allowing
//! different implementations (SQLite, memory) to be used interchangeably by
//! the queue processor.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::operation::{NewOperation, OperationRecord, OperationValidationError};

/// Errors that can occur during queue store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// A stored row could not be decoded
    #[error("Corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    /// The record does not exist (already synced or deleted)
    #[error("Operation {0} not found")]
    NotFound(i64),

    /// The operation was rejected before reaching storage
    #[error("Invalid operation: {0}")]
    Validation(#[from] OperationValidationError),
}

/// Statistics about the queue store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Backend type identifier
    pub backend_type: String,

    /// Total number of records in the queue
    pub pending: usize,

    /// Records that reached the retry limit
    pub exhausted: usize,

    /// Highest retry count among queued records
    pub max_retry_count: u32,
}

/// Durable, ordered store of queued operations.
///
/// # Ordering
///
/// `list_pending` returns records in enqueue order, which is `id` order.
/// Identity and `enqueued_at` are assigned by the store on insert, so a
/// caller's clock never affects ordering.
///
/// # Atomicity
///
/// Every mutating call either fully succeeds and is durably visible, or
/// returns an error with no partial state change. `enqueue_batch` is
/// all-or-nothing.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the processor, the admin API and
/// the enqueuing application share one instance.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Backend identifier for stats and logs.
    fn backend_type(&self) -> &'static str;

    /// Append one operation and return its assigned id.
    async fn enqueue(&self, operation: NewOperation) -> Result<i64, StoreError>;

    /// Append a list of operations atomically, returning ids in input order.
    async fn enqueue_batch(&self, operations: Vec<NewOperation>) -> Result<Vec<i64>, StoreError>;

    /// Snapshot of every queued record in enqueue order.
    async fn list_pending(&self) -> Result<Vec<OperationRecord>, StoreError>;

    /// Records with `retry_count >= max_retries`, in enqueue order.
    async fn list_failed(&self, max_retries: u32) -> Result<Vec<OperationRecord>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<OperationRecord>, StoreError>;

    /// Remove one record. Returns whether it existed.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;

    /// Remove every record targeting the given resource.
    async fn delete_by_target(&self, target_id: &str) -> Result<usize, StoreError>;

    async fn clear_all(&self) -> Result<usize, StoreError>;

    /// Atomically bump `retry_count` and record the failure message.
    async fn increment_retry(&self, id: i64, error: &str) -> Result<(), StoreError>;

    /// Atomically reset `retry_count` to 0 and clear `last_error`.
    async fn reset_retry(&self, id: i64) -> Result<(), StoreError>;

    /// Reset every exhausted record. Returns how many were reset.
    async fn reset_all_failed(&self, max_retries: u32) -> Result<usize, StoreError>;

    async fn count_pending(&self) -> Result<usize, StoreError>;

    /// Live pending count; a new value is published after every mutation.
    fn subscribe_count(&self) -> watch::Receiver<usize>;

    async fn stats(&self, max_retries: u32) -> StoreStats;
}

/// Publishes the pending count to subscribers.
///
/// Shared by the backends so each mutation ends with a single `publish` call.
#[derive(Debug)]
pub struct CountPublisher {
    tx: watch::Sender<usize>,
}

impl CountPublisher {
    pub fn new(initial: usize) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn publish(&self, count: usize) {
        self.tx.send_if_modified(|current| {
            if *current == count {
                false
            } else {
                *current = count;
                true
            }
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_count_publisher_notifies_on_change() {
        let publisher = CountPublisher::new(0);
        let mut rx = publisher.subscribe();

        publisher.publish(3);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 3);
    }

    #[test]
    fn test_count_publisher_skips_identical_values() {
        let publisher = CountPublisher::new(2);
        let rx = publisher.subscribe();

        publisher.publish(2);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound(42);
        assert_eq!(err.to_string(), "Operation 42 not found");
    }
}
