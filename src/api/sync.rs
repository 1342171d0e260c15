//! Drain control endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::error::Result;
use crate::server::AppState;

use super::operations::AcceptedResponse;

#[derive(Debug, Serialize)]
pub struct PendingCountResponse {
    pub pending: usize,
    pub online: bool,
}

/// POST /api/v1/sync - Ask the worker to drain now
#[tracing::instrument(name = "http.sync_now", skip(state))]
pub async fn sync_now(State(state): State<AppState>) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    state.sync.sync_now().await?;
    Ok(AcceptedResponse::accepted())
}

/// GET /api/v1/sync/pending-count
pub async fn pending_count(State(state): State<AppState>) -> Result<Json<PendingCountResponse>> {
    let pending = state.processor.pending_count().await?;
    Ok(Json(PendingCountResponse {
        pending,
        online: state.connectivity.is_available(),
    }))
}
