//! Graceful shutdown handling for the sync service.
//!
//! Shutdown runs in order:
//! 1. Cancel the shared token; the worker, the probe and any in-flight drain
//!    observe it
//! 2. Wait (bounded) for background tasks to finish
//! 3. Report what is still queued; it stays durable for the next start
//! 4. Close the database pool

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::sqlite::SqliteDatabase;
use crate::store::OperationStore;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for background tasks to stop (default: 10 seconds)
    pub task_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(10),
        }
    }
}

/// Handles graceful shutdown of the sync service
pub struct GracefulShutdown {
    cancel: CancellationToken,
    store: Arc<dyn OperationStore>,
    database: Option<SqliteDatabase>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(
        cancel: CancellationToken,
        store: Arc<dyn OperationStore>,
        database: Option<SqliteDatabase>,
    ) -> Self {
        Self::with_config(cancel, store, database, ShutdownConfig::default())
    }

    pub fn with_config(
        cancel: CancellationToken,
        store: Arc<dyn OperationStore>,
        database: Option<SqliteDatabase>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            cancel,
            store,
            database,
            tasks: Vec::new(),
            config,
        }
    }

    /// Register a background task to wait for.
    pub fn track(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.push((name, handle));
    }

    /// Execute graceful shutdown sequence
    #[tracing::instrument(name = "graceful_shutdown", skip(self), fields(tasks = self.tasks.len()))]
    pub async fn execute(self, reason: &str) -> ShutdownResult {
        let start = Instant::now();
        let mut result = ShutdownResult::default();

        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Cancelling background work");
        self.cancel.cancel();

        tracing::info!("Phase 2: Waiting for background tasks");
        let (stopped, timed_out) = Self::wait_for_tasks(self.tasks, self.config.task_timeout).await;
        result.tasks_stopped = stopped;
        result.tasks_timed_out = timed_out;

        tracing::info!("Phase 3: Checking queued operations");
        result.pending_remaining = match self.store.count_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read pending count during shutdown");
                0
            }
        };
        if result.pending_remaining > 0 {
            tracing::info!(
                pending = result.pending_remaining,
                backend = self.store.backend_type(),
                "Operations remain queued for the next start"
            );
        }

        if let Some(database) = self.database {
            tracing::info!("Phase 4: Closing database");
            database.close().await;
        }

        result.duration = start.elapsed();
        result.success = result.tasks_timed_out == 0;

        tracing::info!(
            tasks_stopped = result.tasks_stopped,
            tasks_timed_out = result.tasks_timed_out,
            pending_remaining = result.pending_remaining,
            duration_ms = result.duration.as_millis() as u64,
            "Graceful shutdown completed"
        );

        result
    }

    async fn wait_for_tasks(
        tasks: Vec<(&'static str, JoinHandle<()>)>,
        limit: Duration,
    ) -> (usize, usize) {
        let total = tasks.len();
        let mut pending: FuturesUnordered<_> = tasks
            .into_iter()
            .map(|(name, handle)| async move { (name, handle.await) })
            .collect();

        let mut stopped = 0;
        let wait_future = async {
            while let Some((name, joined)) = pending.next().await {
                if let Err(e) = joined {
                    tracing::warn!(task = name, error = %e, "Background task ended abnormally");
                }
                stopped += 1;
            }
        };

        if timeout(limit, wait_future).await.is_err() {
            tracing::warn!(
                remaining = total - stopped,
                timeout_ms = limit.as_millis() as u64,
                "Background tasks did not stop in time"
            );
        }

        (stopped, total - stopped)
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Every tracked task stopped in time
    pub success: bool,
    pub tasks_stopped: usize,
    pub tasks_timed_out: usize,
    /// Operations still queued; they are picked up on the next start
    pub pending_remaining: usize,
    /// Total time taken for shutdown
    pub duration: Duration,
}
