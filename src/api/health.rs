//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connectivity: ConnectivityHealthResponse,
    pub queue: QueueHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct ConnectivityHealthResponse {
    pub online: bool,
    pub remote: String,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub backend: String,
    pub retry_policy: String,
    pub pending: usize,
    pub exhausted: usize,
    pub max_retries: u32,
}

/// GET /health
///
/// Being offline is normal for this service and does not degrade health; a
/// store that cannot be read does.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let policy = state.processor.policy();
    let max_retries = policy.max_retries();

    let store_ok = state.store.count_pending().await.is_ok();
    let stats = state.store.stats(max_retries).await;

    Json(HealthResponse {
        status: if store_ok { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        connectivity: ConnectivityHealthResponse {
            online: state.connectivity.is_available(),
            remote: state.settings.remote.base_url.clone(),
        },
        queue: QueueHealthResponse {
            backend: stats.backend_type,
            retry_policy: policy.name().to_string(),
            pending: stats.pending,
            exhausted: stats.exhausted,
            max_retries,
        },
    })
}
