use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::config::ConnectivityConfig;

use super::monitor::WatchConnectivity;

/// Background task that polls the remote base URL and publishes
/// reachability into a `WatchConnectivity`.
///
/// Any HTTP response, including 4xx/5xx, counts as reachable; only transport
/// failures and timeouts mark the remote as unavailable.
pub struct ConnectivityProbe {
    client: Client,
    url: String,
    interval: Duration,
    monitor: Arc<WatchConnectivity>,
    cancel: CancellationToken,
}

impl ConnectivityProbe {
    pub fn new(
        config: &ConnectivityConfig,
        url: impl Into<String>,
        monitor: Arc<WatchConnectivity>,
        cancel: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            interval: Duration::from_secs(config.probe_interval_seconds.max(1)),
            monitor,
            cancel,
        })
    }

    /// Run until cancelled. The first probe happens immediately.
    pub async fn run(self) {
        let mut timer = tokio::time::interval(self.interval);

        tracing::info!(
            url = %self.url,
            interval_secs = self.interval.as_secs(),
            "Connectivity probe started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Connectivity probe received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    let reachable = self.probe_once().await;
                    self.monitor.set_available(reachable);
                }
            }
        }

        tracing::info!("Connectivity probe stopped");
    }

    async fn probe_once(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                tracing::trace!(status = %response.status(), "Connectivity probe answered");
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Connectivity probe failed");
                false
            }
        }
    }
}
