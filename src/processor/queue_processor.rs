use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::connectivity::ConnectivityMonitor;
use crate::metrics::DrainMetrics;
use crate::operation::OperationRecord;
use crate::remote::{dispatch, RemoteEndpoint};
use crate::retry::{ExhaustedAction, RetryPolicy};
use crate::store::{OperationStore, StoreError};

use super::report::DrainReport;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// What happened to a single record during a pass.
enum RecordOutcome {
    Synced,
    Failed { delay: Duration },
    Skipped,
    Dropped,
    /// Store error; the record is left as it was
    Aborted,
    Cancelled,
}

/// Drains queued operations against the remote endpoint.
///
/// Drains are serialized by an internal gate: concurrent callers wait and
/// then run their own pass over a fresh snapshot.
pub struct QueueProcessor {
    store: Arc<dyn OperationStore>,
    endpoint: Arc<dyn RemoteEndpoint>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    policy: Arc<dyn RetryPolicy>,
    gate: Mutex<()>,
    cancel: CancellationToken,
}

impl QueueProcessor {
    pub fn new(
        store: Arc<dyn OperationStore>,
        endpoint: Arc<dyn RemoteEndpoint>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        policy: Arc<dyn RetryPolicy>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            endpoint,
            connectivity,
            policy,
            gate: Mutex::new(()),
            cancel,
        }
    }

    pub fn store(&self) -> &Arc<dyn OperationStore> {
        &self.store
    }

    pub fn policy(&self) -> &Arc<dyn RetryPolicy> {
        &self.policy
    }

    /// Run one drain pass.
    ///
    /// Returns an empty report without touching the store when offline. Only
    /// a failure to read the pending snapshot is returned as an error; store
    /// errors on individual records are logged and the pass moves on.
    #[tracing::instrument(name = "drain", skip(self), fields(policy = self.policy.name()))]
    pub async fn process_queue(&self) -> Result<DrainReport, ProcessorError> {
        let _gate = self.gate.lock().await;

        if !self.connectivity.is_available() {
            tracing::debug!("Remote unavailable, skipping drain");
            return Ok(DrainReport::default());
        }

        let start = Instant::now();
        let result = self.drain().await;
        let elapsed = start.elapsed();

        match &result {
            Ok(report) => {
                DrainMetrics::record_pass(report.outcome(), elapsed.as_secs_f64());
                if !report.is_empty() {
                    tracing::info!(
                        synced = report.synced,
                        failed = report.failed,
                        skipped_exhausted = report.skipped_exhausted,
                        dropped_exhausted = report.dropped_exhausted,
                        cancelled = report.cancelled,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Drain completed"
                    );
                }
            }
            Err(e) => {
                DrainMetrics::record_pass("error", elapsed.as_secs_f64());
                tracing::error!(error = %e, "Drain failed to read pending operations");
            }
        }

        result
    }

    async fn drain(&self) -> Result<DrainReport, ProcessorError> {
        let mut report = DrainReport::default();

        let pass_delay = self.policy.pass_delay();
        if !pass_delay.is_zero() {
            tracing::debug!(delay_ms = pass_delay.as_millis() as u64, "Waiting before pass");
            if !self.pause(pass_delay).await {
                report.cancelled = true;
                return Ok(report);
            }
        }

        let pending = self.store.list_pending().await?;
        if pending.is_empty() {
            return Ok(report);
        }

        tracing::debug!(pending = pending.len(), "Processing pending operations");

        for record in pending {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.process_record(&record).await {
                RecordOutcome::Synced => report.synced += 1,
                RecordOutcome::Skipped => report.skipped_exhausted += 1,
                RecordOutcome::Dropped => report.dropped_exhausted += 1,
                RecordOutcome::Aborted => {}
                RecordOutcome::Cancelled => {
                    report.cancelled = true;
                    break;
                }
                RecordOutcome::Failed { delay } => {
                    report.failed += 1;
                    if !delay.is_zero() {
                        tracing::debug!(
                            operation_id = record.id,
                            delay_ms = delay.as_millis() as u64,
                            "Backing off after failure"
                        );
                        if !self.pause(delay).await {
                            report.cancelled = true;
                            break;
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    async fn process_record(&self, record: &OperationRecord) -> RecordOutcome {
        if !self.policy.should_retry(record.retry_count) {
            return self.handle_exhausted(record).await;
        }

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return RecordOutcome::Cancelled,
            result = dispatch(self.endpoint.as_ref(), record) => result,
        };

        match result {
            Ok(()) => match self.store.delete(record.id).await {
                Ok(_) => {
                    DrainMetrics::record_synced(record.kind);
                    tracing::debug!(
                        operation_id = record.id,
                        kind = %record.kind,
                        "Operation synced"
                    );
                    RecordOutcome::Synced
                }
                Err(e) => {
                    tracing::error!(
                        operation_id = record.id,
                        error = %e,
                        "Failed to remove synced operation"
                    );
                    RecordOutcome::Aborted
                }
            },
            Err(remote_error) => {
                DrainMetrics::record_failed(record.kind);
                let message = remote_error.to_string();
                tracing::warn!(
                    operation_id = record.id,
                    kind = %record.kind,
                    retry_count = record.retry_count + 1,
                    max_retries = self.policy.max_retries(),
                    error = %message,
                    "Operation sync failed"
                );

                if let Err(e) = self.store.increment_retry(record.id, &message).await {
                    tracing::error!(
                        operation_id = record.id,
                        error = %e,
                        "Failed to record retry"
                    );
                    return RecordOutcome::Aborted;
                }

                RecordOutcome::Failed {
                    delay: self.policy.failure_delay(record.retry_count),
                }
            }
        }
    }

    async fn handle_exhausted(&self, record: &OperationRecord) -> RecordOutcome {
        match self.policy.exhausted_action() {
            ExhaustedAction::Keep => {
                DrainMetrics::record_skipped();
                tracing::debug!(
                    operation_id = record.id,
                    retry_count = record.retry_count,
                    "Skipping exhausted operation"
                );
                RecordOutcome::Skipped
            }
            ExhaustedAction::Drop => match self.store.delete(record.id).await {
                Ok(_) => {
                    DrainMetrics::record_dropped();
                    tracing::warn!(
                        operation_id = record.id,
                        kind = %record.kind,
                        retry_count = record.retry_count,
                        last_error = record.last_error.as_deref().unwrap_or(""),
                        "Dropping exhausted operation"
                    );
                    RecordOutcome::Dropped
                }
                Err(e) => {
                    tracing::error!(
                        operation_id = record.id,
                        error = %e,
                        "Failed to drop exhausted operation"
                    );
                    RecordOutcome::Aborted
                }
            },
        }
    }

    /// Sleep unless cancelled first. Returns `false` on cancellation.
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Reset one record's retry count, then drain.
    pub async fn retry_operation(&self, id: i64) -> Result<DrainReport, ProcessorError> {
        self.store.reset_retry(id).await?;
        tracing::info!(operation_id = id, "Operation reset for retry");
        self.process_queue().await
    }

    /// Reset every exhausted record, then drain.
    pub async fn retry_all_failed(&self) -> Result<DrainReport, ProcessorError> {
        let reset = self.store.reset_all_failed(self.policy.max_retries()).await?;
        tracing::info!(reset = reset, "Exhausted operations reset for retry");
        self.process_queue().await
    }

    pub async fn list_failed(&self) -> Result<Vec<OperationRecord>, ProcessorError> {
        Ok(self.store.list_failed(self.policy.max_retries()).await?)
    }

    pub async fn pending_count(&self) -> Result<usize, ProcessorError> {
        Ok(self.store.count_pending().await?)
    }

    pub fn watch_pending_count(&self) -> watch::Receiver<usize> {
        self.store.subscribe_count()
    }
}
