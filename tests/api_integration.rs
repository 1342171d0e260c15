//! Admin API tests driven through the full router with `tower::ServiceExt`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use mail_sync_queue::config::Settings;
use mail_sync_queue::connectivity::WatchConnectivity;
use mail_sync_queue::operation::NewOperation;
use mail_sync_queue::processor::QueueProcessor;
use mail_sync_queue::remote::RecordingEndpoint;
use mail_sync_queue::retry::{BackoffConfig, ExponentialRetryPolicy};
use mail_sync_queue::server::{create_app, AppState};
use mail_sync_queue::store::{MemoryOperationStore, OperationStore};
use mail_sync_queue::tasks::SyncWorker;

struct TestApp {
    app: Router,
    store: Arc<MemoryOperationStore>,
    endpoint: Arc<RecordingEndpoint>,
    cancel: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn test_app(api_key: Option<&str>) -> TestApp {
    let mut settings = Settings::default();
    settings.api.key = api_key.map(str::to_string);
    settings.sync.sync_on_start = false;
    settings.sync.interval_seconds = 3600;

    let store = Arc::new(MemoryOperationStore::new());
    let endpoint = Arc::new(RecordingEndpoint::succeeding());
    let connectivity = Arc::new(WatchConnectivity::new(true));
    let cancel = CancellationToken::new();
    let policy = Arc::new(ExponentialRetryPolicy {
        max_retries: 5,
        backoff: BackoffConfig {
            initial_delay_ms: 1,
            max_delay_ms: 4,
            ..BackoffConfig::default()
        },
    });

    let processor = Arc::new(QueueProcessor::new(
        store.clone(),
        endpoint.clone(),
        connectivity.clone(),
        policy,
        cancel.clone(),
    ));
    let (worker, sync) = SyncWorker::new(
        processor.clone(),
        connectivity.clone(),
        settings.sync.clone(),
        cancel.clone(),
    );
    tokio::spawn(worker.run());

    let state = AppState::new(settings, processor, connectivity, sync);
    TestApp {
        app: create_app(state),
        store,
        endpoint,
        cancel,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn wait_for_empty(store: &MemoryOperationStore) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.count_pending().await.unwrap() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queue should drain");
}

#[tokio::test]
async fn test_health_reports_queue_and_connectivity() {
    let t = test_app(None);
    t.store.enqueue(NewOperation::star("acct", "A")).await.unwrap();

    let (status, body) = send(&t.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connectivity"]["online"], true);
    assert_eq!(body["queue"]["backend"], "memory");
    assert_eq!(body["queue"]["retry_policy"], "exponential");
    assert_eq!(body["queue"]["pending"], 1);
}

#[tokio::test]
async fn test_enqueue_and_list() {
    let t = test_app(None);

    let (status, body) = send(
        &t.app,
        post_json(
            "/api/v1/operations",
            json!({"kind": "move_to_folder", "account_id": "acct", "target_id": "A", "payload": "Receipts"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let (status, body) = send(&t.app, get("/api/v1/operations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["operations"][0]["id"], id);
    assert_eq!(body["operations"][0]["kind"], "move_to_folder");
    assert_eq!(body["operations"][0]["retry_count"], 0);
}

#[tokio::test]
async fn test_invalid_operation_is_rejected() {
    let t = test_app(None);

    let (status, body) = send(
        &t.app,
        post_json("/api/v1/operations", json!({"kind": "delete", "account_id": "acct"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(t.store.count_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_batch_is_all_or_nothing() {
    let t = test_app(None);

    let (status, _) = send(
        &t.app,
        post_json(
            "/api/v1/operations/batch",
            json!({"operations": [
                {"kind": "star", "account_id": "acct", "target_id": "A"},
                {"kind": "send_email", "account_id": "acct"}
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.store.count_pending().await.unwrap(), 0);

    let (status, body) = send(
        &t.app,
        post_json(
            "/api/v1/operations/batch",
            json!({"operations": [
                {"kind": "star", "account_id": "acct", "target_id": "A"},
                {"kind": "send_email", "account_id": "acct", "payload": "{\"subject\":\"hi\"}"}
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ids"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_endpoints() {
    let t = test_app(None);
    let id = t.store.enqueue(NewOperation::delete("acct", "A")).await.unwrap();
    t.store.enqueue(NewOperation::star("acct", "B")).await.unwrap();
    t.store.enqueue(NewOperation::unstar("acct", "B")).await.unwrap();

    let (status, _) = send(&t.app, delete(&format!("/api/v1/operations/{}", id))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&t.app, delete(&format!("/api/v1/operations/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, body) = send(&t.app, delete("/api/v1/operations/target/B")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 2);
    assert_eq!(t.store.count_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sync_now_drains_queue() {
    let t = test_app(None);
    t.store.enqueue(NewOperation::mark_read("acct", "A")).await.unwrap();

    let (status, body) = send(&t.app, post_json("/api/v1/sync", json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "accepted");

    wait_for_empty(&t.store).await;
    assert_eq!(t.endpoint.call_count(), 1);

    let (status, body) = send(&t.app, get("/api/v1/sync/pending-count")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"], 0);
    assert_eq!(body["online"], true);
}

#[tokio::test]
async fn test_failed_list_and_retry() {
    let t = test_app(None);
    let id = t.store.enqueue(NewOperation::delete("acct", "A")).await.unwrap();
    for _ in 0..5 {
        t.store.increment_retry(id, "server unavailable").await.unwrap();
    }

    let (status, body) = send(&t.app, get("/api/v1/operations/failed")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["operations"][0]["last_error"], "server unavailable");

    let (status, _) = send(&t.app, post_json("/api/v1/operations/999/retry", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&t.app, post_json(&format!("/api/v1/operations/{}/retry", id), json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_empty(&t.store).await;
}

#[tokio::test]
async fn test_retry_failed_resets_all() {
    let t = test_app(None);
    for target in ["A", "B"] {
        let id = t.store.enqueue(NewOperation::delete("acct", target)).await.unwrap();
        for _ in 0..5 {
            t.store.increment_retry(id, "boom").await.unwrap();
        }
    }

    let (status, _) = send(&t.app, post_json("/api/v1/operations/retry-failed", json!({}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_empty(&t.store).await;
    assert_eq!(t.endpoint.call_count(), 2);
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let t = test_app(Some("secret"));

    let (status, body) = send(&t.app, get("/api/v1/operations")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let request = Request::builder()
        .uri("/api/v1/operations")
        .header("X-API-Key", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/v1/operations")
        .header("X-API-Key", "secret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&t.app, request).await;
    assert_eq!(status, StatusCode::OK);

    // Health and metrics stay open
    let (status, _) = send(&t.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = test_app(None);
    t.store.enqueue(NewOperation::archive("acct", "A")).await.unwrap();

    let response = t.app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("mailsync_operations_pending"));
    assert!(text.contains("mailsync_operations_enqueued_total"));
}
