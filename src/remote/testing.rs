//! Scriptable in-process endpoint.
//!
//! Records every call it receives and answers from per-target scripts, falling
//! back to a fixed default. Used by the unit and integration test suites.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::endpoint::{FlagsDelta, RemoteEndpoint, RemoteError, RemoteResult};

/// A call observed by `RecordingEndpoint`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    UpdateFlags { target_id: String, delta: FlagsDelta },
    Delete { target_id: String },
    Move { target_id: String, destination: String },
    Send { payload: String },
}

pub struct RecordingEndpoint {
    calls: Mutex<Vec<RemoteCall>>,
    scripts: Mutex<HashMap<String, VecDeque<RemoteResult>>>,
    default_ok: bool,
    latency: Option<Duration>,
}

impl RecordingEndpoint {
    fn with_default(default_ok: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            default_ok,
            latency: None,
        }
    }

    /// Every unscripted call succeeds.
    pub fn succeeding() -> Self {
        Self::with_default(true)
    }

    /// Every unscripted call fails with a transient error.
    pub fn failing() -> Self {
        Self::with_default(false)
    }

    /// Sleep before answering each call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue answers for calls on `key` (target id, or payload for sends).
    pub fn script(&self, key: &str, results: impl IntoIterator<Item = RemoteResult>) {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts.entry(key.to_string()).or_default().extend(results);
    }

    /// Fail the next `times` calls on `key`.
    pub fn fail_times(&self, key: &str, times: usize) {
        self.script(
            key,
            (0..times).map(|n| Err(RemoteError::Transient(format!("scripted failure {}", n + 1)))),
        );
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn answer(&self, key: &str, call: RemoteCall) -> RemoteResult {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        let scripted = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(key)
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(result) => result,
            None if self.default_ok => Ok(()),
            None => Err(RemoteError::Transient("endpoint unavailable".to_string())),
        }
    }
}

#[async_trait]
impl RemoteEndpoint for RecordingEndpoint {
    async fn update_flags(&self, _account_id: &str, target_id: &str, delta: FlagsDelta) -> RemoteResult {
        let call = RemoteCall::UpdateFlags {
            target_id: target_id.to_string(),
            delta,
        };
        self.answer(target_id, call).await
    }

    async fn delete_resource(&self, _account_id: &str, target_id: &str) -> RemoteResult {
        let call = RemoteCall::Delete {
            target_id: target_id.to_string(),
        };
        self.answer(target_id, call).await
    }

    async fn move_resource(&self, _account_id: &str, target_id: &str, destination: &str) -> RemoteResult {
        let call = RemoteCall::Move {
            target_id: target_id.to_string(),
            destination: destination.to_string(),
        };
        self.answer(target_id, call).await
    }

    async fn send_resource(&self, _account_id: &str, payload: &str) -> RemoteResult {
        let call = RemoteCall::Send {
            payload: payload.to_string(),
        };
        self.answer(payload, call).await
    }
}
