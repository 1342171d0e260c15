use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::server::AppState;

use super::operations::{
    delete_by_target, delete_operation, enqueue_batch, enqueue_operation, list_failed,
    list_operations, retry_failed, retry_operation,
};
use super::sync::{pending_count, sync_now};

/// Routes mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Queue contents
        .route("/operations", get(list_operations).post(enqueue_operation))
        .route("/operations/batch", post(enqueue_batch))
        .route("/operations/failed", get(list_failed))
        .route("/operations/retry-failed", post(retry_failed))
        .route("/operations/target/{target_id}", delete(delete_by_target))
        .route("/operations/{id}", delete(delete_operation))
        .route("/operations/{id}/retry", post(retry_operation))
        // Drain control
        .route("/sync", post(sync_now))
        .route("/sync/pending-count", get(pending_count))
}
