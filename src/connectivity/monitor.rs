use futures::stream::{BoxStream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::metrics::ConnectivityMetrics;

/// Observable "is the remote reachable" flag.
pub trait ConnectivityMonitor: Send + Sync {
    fn is_available(&self) -> bool;

    /// Yields the current value, then every transition. Each call returns an
    /// independent stream.
    fn observe(&self) -> BoxStream<'static, bool>;
}

/// `ConnectivityMonitor` driven by the host through `set_available`.
#[derive(Debug)]
pub struct WatchConnectivity {
    tx: watch::Sender<bool>,
}

impl WatchConnectivity {
    pub fn new(initial: bool) -> Self {
        let (tx, _rx) = watch::channel(initial);
        ConnectivityMetrics::set_available(initial);
        Self { tx }
    }

    /// Publish a new value. Subscribers are only woken when it changes.
    pub fn set_available(&self, available: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == available {
                false
            } else {
                *current = available;
                true
            }
        });

        if changed {
            ConnectivityMetrics::set_available(available);
            if available {
                tracing::info!("Remote connectivity restored");
            } else {
                tracing::warn!("Remote connectivity lost");
            }
        }
    }
}

impl ConnectivityMonitor for WatchConnectivity {
    fn is_available(&self) -> bool {
        *self.tx.borrow()
    }

    fn observe(&self) -> BoxStream<'static, bool> {
        WatchStream::new(self.tx.subscribe()).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_set_available() {
        let monitor = WatchConnectivity::new(false);
        assert!(!monitor.is_available());

        monitor.set_available(true);
        assert!(monitor.is_available());
    }

    #[tokio::test]
    async fn test_observe_yields_current_then_transitions() {
        let monitor = WatchConnectivity::new(true);
        let mut stream = monitor.observe();

        assert_eq!(stream.next().await, Some(true));

        monitor.set_available(false);
        assert_eq!(stream.next().await, Some(false));

        monitor.set_available(true);
        assert_eq!(stream.next().await, Some(true));
    }

    #[tokio::test]
    async fn test_unchanged_value_is_not_published() {
        let monitor = WatchConnectivity::new(true);
        let mut stream = monitor.observe();
        assert_eq!(stream.next().await, Some(true));

        monitor.set_available(true);
        let next = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_observe_is_restartable() {
        let monitor = WatchConnectivity::new(false);
        drop(monitor.observe());
        monitor.set_available(true);

        let mut stream = monitor.observe();
        assert_eq!(stream.next().await, Some(true));
    }
}
