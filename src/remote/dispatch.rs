//! Maps an operation record to exactly one remote endpoint call.

use std::future::Future;
use std::time::Instant;

use crate::metrics::RemoteMetrics;
use crate::operation::{OperationKind, OperationRecord};

use super::endpoint::{FlagsDelta, RemoteEndpoint, RemoteError, RemoteResult};

/// Dispatch one record to the endpoint.
///
/// `MoveToFolder` and `SendEmail` fail without touching the endpoint when
/// their payload is missing or blank. `Archive` has no remote counterpart yet
/// and succeeds without a call.
pub async fn dispatch(endpoint: &dyn RemoteEndpoint, record: &OperationRecord) -> RemoteResult {
    let account = record.account_id.as_str();
    let target = record.target_id.as_str();

    match record.kind {
        OperationKind::MarkRead => {
            timed("update_flags", endpoint.update_flags(account, target, FlagsDelta::seen(true))).await
        }
        OperationKind::MarkUnread => {
            timed("update_flags", endpoint.update_flags(account, target, FlagsDelta::seen(false))).await
        }
        OperationKind::Star => {
            timed("update_flags", endpoint.update_flags(account, target, FlagsDelta::flagged(true))).await
        }
        OperationKind::Unstar => {
            timed("update_flags", endpoint.update_flags(account, target, FlagsDelta::flagged(false))).await
        }
        OperationKind::Delete => timed("delete_resource", endpoint.delete_resource(account, target)).await,
        OperationKind::MoveToFolder => match record.non_blank_payload() {
            Some(destination) => {
                timed("move_resource", endpoint.move_resource(account, target, destination)).await
            }
            None => Err(RemoteError::InvalidOperation(
                "move_to_folder requires a destination folder".to_string(),
            )),
        },
        OperationKind::SendEmail => match record.non_blank_payload() {
            Some(payload) => timed("send_resource", endpoint.send_resource(account, payload)).await,
            None => Err(RemoteError::InvalidOperation(
                "send_email requires a message payload".to_string(),
            )),
        },
        OperationKind::Archive => {
            // No server-side archive yet; acknowledged locally
            tracing::debug!(operation_id = record.id, target_id = %target, "Archive acknowledged without remote call");
            Ok(())
        }
    }
}

async fn timed<F>(call: &str, fut: F) -> RemoteResult
where
    F: Future<Output = RemoteResult>,
{
    let start = Instant::now();
    let result = fut.await;
    RemoteMetrics::record_latency(call, start.elapsed().as_secs_f64());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::NewOperation;
    use crate::remote::testing::RecordingEndpoint;
    use crate::remote::RemoteCall;

    fn record(op: NewOperation) -> OperationRecord {
        op.into_record(1, chrono::Utc::now())
    }

    #[tokio::test]
    async fn test_flag_kinds_map_to_update_flags() {
        let endpoint = RecordingEndpoint::succeeding();

        dispatch(&endpoint, &record(NewOperation::mark_read("acct", "a"))).await.unwrap();
        dispatch(&endpoint, &record(NewOperation::mark_unread("acct", "a"))).await.unwrap();
        dispatch(&endpoint, &record(NewOperation::star("acct", "b"))).await.unwrap();
        dispatch(&endpoint, &record(NewOperation::unstar("acct", "b"))).await.unwrap();

        assert_eq!(
            endpoint.calls(),
            vec![
                RemoteCall::UpdateFlags { target_id: "a".into(), delta: FlagsDelta::seen(true) },
                RemoteCall::UpdateFlags { target_id: "a".into(), delta: FlagsDelta::seen(false) },
                RemoteCall::UpdateFlags { target_id: "b".into(), delta: FlagsDelta::flagged(true) },
                RemoteCall::UpdateFlags { target_id: "b".into(), delta: FlagsDelta::flagged(false) },
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_and_move() {
        let endpoint = RecordingEndpoint::succeeding();

        dispatch(&endpoint, &record(NewOperation::delete("acct", "a"))).await.unwrap();
        dispatch(
            &endpoint,
            &record(NewOperation::move_to_folder("acct", "b", Some("Receipts".into()))),
        )
        .await
        .unwrap();

        assert_eq!(
            endpoint.calls(),
            vec![
                RemoteCall::Delete { target_id: "a".into() },
                RemoteCall::Move { target_id: "b".into(), destination: "Receipts".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_move_without_destination_never_calls_endpoint() {
        let endpoint = RecordingEndpoint::succeeding();

        for payload in [None, Some(String::new()), Some("   ".to_string())] {
            let result = dispatch(
                &endpoint,
                &record(NewOperation::move_to_folder("acct", "a", payload)),
            )
            .await;
            assert!(matches!(result, Err(RemoteError::InvalidOperation(_))));
        }
        assert!(endpoint.calls().is_empty());
    }

    #[tokio::test]
    async fn test_archive_is_local_success() {
        let endpoint = RecordingEndpoint::failing();
        let result = dispatch(&endpoint, &record(NewOperation::archive("acct", "a"))).await;
        assert!(result.is_ok());
        assert!(endpoint.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_uses_payload() {
        let endpoint = RecordingEndpoint::succeeding();
        dispatch(&endpoint, &record(NewOperation::send_email("acct", r#"{"subject":"hi"}"#)))
            .await
            .unwrap();
        assert_eq!(
            endpoint.calls(),
            vec![RemoteCall::Send { payload: r#"{"subject":"hi"}"#.into() }]
        );
    }

    #[tokio::test]
    async fn test_failure_is_returned() {
        let endpoint = RecordingEndpoint::failing();
        let result = dispatch(&endpoint, &record(NewOperation::delete("acct", "a"))).await;
        assert!(matches!(result, Err(RemoteError::Transient(_))));
        assert_eq!(endpoint.calls().len(), 1);
    }
}
