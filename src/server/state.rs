use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::connectivity::ConnectivityMonitor;
use crate::processor::QueueProcessor;
use crate::store::OperationStore;
use crate::tasks::SyncHandle;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn OperationStore>,
    pub processor: Arc<QueueProcessor>,
    pub connectivity: Arc<dyn ConnectivityMonitor>,
    pub sync: SyncHandle,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        processor: Arc<QueueProcessor>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        sync: SyncHandle,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            store: processor.store().clone(),
            processor,
            connectivity,
            sync,
            start_time: Instant::now(),
        }
    }
}
