use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::processor::QueueProcessor;

/// Command channel capacity
const COMMAND_BUFFER: usize = 32;

/// Commands accepted by a running `SyncWorker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    /// Drain now
    SyncNow,
    /// Reset one record's retry count, then drain
    RetryOperation(i64),
    /// Reset every exhausted record, then drain
    RetryAllFailed,
}

#[derive(Debug, Error)]
#[error("Sync worker is not running")]
pub struct WorkerStopped;

/// Sender side of the worker's command channel.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncCommand>,
}

impl SyncHandle {
    pub async fn send(&self, command: SyncCommand) -> Result<(), WorkerStopped> {
        self.tx.send(command).await.map_err(|_| WorkerStopped)
    }

    pub async fn sync_now(&self) -> Result<(), WorkerStopped> {
        self.send(SyncCommand::SyncNow).await
    }
}

/// Long-lived task that triggers drains.
///
/// Triggers: startup (optional), a periodic timer, connectivity coming back,
/// and commands from `SyncHandle`. Stops when the cancellation token fires;
/// the processor shares that token so an in-flight drain stops between
/// records.
pub struct SyncWorker {
    processor: Arc<QueueProcessor>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    config: SyncConfig,
    commands: mpsc::Receiver<SyncCommand>,
    cancel: CancellationToken,
}

impl SyncWorker {
    pub fn new(
        processor: Arc<QueueProcessor>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        config: SyncConfig,
        cancel: CancellationToken,
    ) -> (Self, SyncHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let worker = Self {
            processor,
            connectivity,
            config,
            commands: rx,
            cancel,
        };
        (worker, SyncHandle { tx })
    }

    pub async fn run(mut self) {
        let interval = Duration::from_secs(self.config.interval_seconds.max(1));
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip immediate first tick
        timer.tick().await;

        let mut connectivity = self.connectivity.observe();
        let mut online = self.connectivity.is_available();

        tracing::info!(
            interval_secs = interval.as_secs(),
            sync_on_start = self.config.sync_on_start,
            online = online,
            "Sync worker started"
        );

        if self.config.sync_on_start {
            self.drain("startup").await;
        }

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Sync worker received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.drain("timer").await;
                }
                Some(available) = connectivity.next() => {
                    let restored = available && !online;
                    online = available;
                    if restored {
                        self.drain("connectivity_restored").await;
                    }
                }
                Some(command) = self.commands.recv() => {
                    self.handle(command).await;
                }
            }
        }

        tracing::info!("Sync worker stopped");
    }

    async fn handle(&self, command: SyncCommand) {
        tracing::debug!(command = ?command, "Sync command received");

        let result = match command {
            SyncCommand::SyncNow => self.processor.process_queue().await,
            SyncCommand::RetryOperation(id) => self.processor.retry_operation(id).await,
            SyncCommand::RetryAllFailed => self.processor.retry_all_failed().await,
        };

        if let Err(e) = result {
            tracing::warn!(command = ?command, error = %e, "Sync command failed");
        }
    }

    async fn drain(&self, trigger: &'static str) {
        match self.processor.process_queue().await {
            Ok(report) => {
                tracing::debug!(trigger = trigger, synced = report.synced, "Drain triggered");
            }
            Err(e) => {
                tracing::warn!(trigger = trigger, error = %e, "Triggered drain failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::WatchConnectivity;
    use crate::operation::NewOperation;
    use crate::remote::RecordingEndpoint;
    use crate::retry::ExponentialRetryPolicy;
    use crate::store::{MemoryOperationStore, OperationStore};

    struct Fixture {
        store: Arc<MemoryOperationStore>,
        connectivity: Arc<WatchConnectivity>,
        cancel: CancellationToken,
        worker: SyncWorker,
        handle: SyncHandle,
    }

    fn fixture(online: bool, config: SyncConfig) -> Fixture {
        let store = Arc::new(MemoryOperationStore::new());
        let connectivity = Arc::new(WatchConnectivity::new(online));
        let cancel = CancellationToken::new();
        let processor = Arc::new(QueueProcessor::new(
            store.clone(),
            Arc::new(RecordingEndpoint::succeeding()),
            connectivity.clone(),
            Arc::new(ExponentialRetryPolicy::default()),
            cancel.clone(),
        ));
        let (worker, handle) = SyncWorker::new(processor, connectivity.clone(), config, cancel.clone());
        Fixture {
            store,
            connectivity,
            cancel,
            worker,
            handle,
        }
    }

    fn quiet_config() -> SyncConfig {
        SyncConfig {
            interval_seconds: 3600,
            sync_on_start: false,
        }
    }

    async fn wait_for_empty(store: &MemoryOperationStore) {
        tokio::time::timeout(Duration::from_secs(30), async {
            while store.count_pending().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("queue should drain");
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_shutdown() {
        let f = fixture(true, quiet_config());
        let task = tokio::spawn(f.worker.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        f.cancel.cancel();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("Task should complete")
            .expect("Task should not panic");

        assert!(f.handle.sync_now().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_on_start() {
        let f = fixture(
            true,
            SyncConfig {
                interval_seconds: 3600,
                sync_on_start: true,
            },
        );
        f.store.enqueue(NewOperation::mark_read("acct", "A")).await.unwrap();

        let task = tokio::spawn(f.worker.run());
        wait_for_empty(&f.store).await;

        f.cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_now_command() {
        let f = fixture(true, quiet_config());
        let task = tokio::spawn(f.worker.run());

        f.store.enqueue(NewOperation::star("acct", "A")).await.unwrap();
        f.handle.sync_now().await.unwrap();
        wait_for_empty(&f.store).await;

        f.cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_restored_triggers_drain() {
        let f = fixture(false, quiet_config());
        f.store.enqueue(NewOperation::delete("acct", "A")).await.unwrap();

        let task = tokio::spawn(f.worker.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(f.store.count_pending().await.unwrap(), 1);

        f.connectivity.set_available(true);
        wait_for_empty(&f.store).await;

        f.cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_triggers_drain() {
        let f = fixture(
            true,
            SyncConfig {
                interval_seconds: 60,
                sync_on_start: false,
            },
        );
        let task = tokio::spawn(f.worker.run());

        f.store.enqueue(NewOperation::unstar("acct", "A")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.store.count_pending().await.unwrap(), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        wait_for_empty(&f.store).await;

        f.cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_all_failed_command() {
        let f = fixture(true, quiet_config());
        let id = f.store.enqueue(NewOperation::delete("acct", "A")).await.unwrap();
        for _ in 0..5 {
            f.store.increment_retry(id, "offline").await.unwrap();
        }

        let task = tokio::spawn(f.worker.run());
        f.handle.sync_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(f.store.count_pending().await.unwrap(), 1);

        f.handle.send(SyncCommand::RetryAllFailed).await.unwrap();
        wait_for_empty(&f.store).await;

        f.cancel.cancel();
        task.await.unwrap();
    }
}
