//! Queue inspection and manual retry endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::operation::{NewOperation, OperationRecord};
use crate::server::AppState;
use crate::tasks::SyncCommand;

#[derive(Debug, Serialize)]
pub struct OperationListResponse {
    pub operations: Vec<OperationRecord>,
    pub total: usize,
}

impl From<Vec<OperationRecord>> for OperationListResponse {
    fn from(operations: Vec<OperationRecord>) -> Self {
        let total = operations.len();
        Self { operations, total }
    }
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct BatchEnqueueRequest {
    pub operations: Vec<NewOperation>,
}

#[derive(Debug, Serialize)]
pub struct BatchEnqueueResponse {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

/// Returned by endpoints that hand work to the sync worker.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
}

impl AcceptedResponse {
    pub(super) fn accepted() -> (StatusCode, Json<Self>) {
        (StatusCode::ACCEPTED, Json(Self { status: "accepted" }))
    }
}

/// GET /api/v1/operations - Pending operations in drain order
#[tracing::instrument(name = "http.list_operations", skip(state))]
pub async fn list_operations(State(state): State<AppState>) -> Result<Json<OperationListResponse>> {
    let operations = state.store.list_pending().await?;
    Ok(Json(operations.into()))
}

/// POST /api/v1/operations - Enqueue one operation
#[tracing::instrument(
    name = "http.enqueue_operation",
    skip(state, request),
    fields(kind = %request.kind)
)]
pub async fn enqueue_operation(
    State(state): State<AppState>,
    Json(request): Json<NewOperation>,
) -> Result<(StatusCode, Json<EnqueueResponse>)> {
    let id = state.store.enqueue(request).await?;
    Ok((StatusCode::CREATED, Json(EnqueueResponse { id })))
}

/// POST /api/v1/operations/batch - Enqueue several operations atomically
#[tracing::instrument(
    name = "http.enqueue_batch",
    skip(state, request),
    fields(count = request.operations.len())
)]
pub async fn enqueue_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchEnqueueRequest>,
) -> Result<(StatusCode, Json<BatchEnqueueResponse>)> {
    let ids = state.store.enqueue_batch(request.operations).await?;
    Ok((StatusCode::CREATED, Json(BatchEnqueueResponse { ids })))
}

/// DELETE /api/v1/operations/{id} - Remove one operation without syncing it
#[tracing::instrument(name = "http.delete_operation", skip(state))]
pub async fn delete_operation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    if state.store.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Operation {} not found", id)))
    }
}

/// DELETE /api/v1/operations/target/{target_id} - Remove every operation on a resource
#[tracing::instrument(name = "http.delete_by_target", skip(state))]
pub async fn delete_by_target(
    State(state): State<AppState>,
    Path(target_id): Path<String>,
) -> Result<Json<DeletedResponse>> {
    let deleted = state.store.delete_by_target(&target_id).await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// GET /api/v1/operations/failed - Operations that reached the retry limit
#[tracing::instrument(name = "http.list_failed", skip(state))]
pub async fn list_failed(State(state): State<AppState>) -> Result<Json<OperationListResponse>> {
    let operations = state.processor.list_failed().await?;
    Ok(Json(operations.into()))
}

/// POST /api/v1/operations/{id}/retry - Reset one operation and drain
#[tracing::instrument(name = "http.retry_operation", skip(state))]
pub async fn retry_operation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    if state.store.get(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Operation {} not found", id)));
    }

    state.sync.send(SyncCommand::RetryOperation(id)).await?;
    Ok(AcceptedResponse::accepted())
}

/// POST /api/v1/operations/retry-failed - Reset every exhausted operation and drain
#[tracing::instrument(name = "http.retry_failed", skip(state))]
pub async fn retry_failed(State(state): State<AppState>) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    state.sync.send(SyncCommand::RetryAllFailed).await?;
    Ok(AcceptedResponse::accepted())
}
