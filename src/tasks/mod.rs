mod sync_worker;

pub use sync_worker::{SyncCommand, SyncHandle, SyncWorker, WorkerStopped};
