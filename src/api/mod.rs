//! API layer - HTTP endpoint handlers for the admin surface.

mod health;
mod metrics;
mod operations;
mod routes;
mod sync;

pub use health::health;
pub use metrics::prometheus_metrics;
pub use operations::{
    delete_by_target, delete_operation, enqueue_batch, enqueue_operation, list_failed,
    list_operations, retry_failed, retry_operation,
};
pub use routes::api_routes;
pub use sync::{pending_count, sync_now};
