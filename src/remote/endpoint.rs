//! Remote endpoint abstraction.
//!
//! The processor talks to the mail server only through `RemoteEndpoint`.
//! Failures are returned as values; an implementation must never panic across
//! this boundary, and must report success only once the server is believed to
//! have durably applied the change.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by a remote endpoint.
///
/// The classification is informational: every variant consumes one retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Network error, timeout, 5xx; may succeed later
    #[error("Transient remote failure: {0}")]
    Transient(String),

    /// The server refused the request
    #[error("Remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The operation cannot be sent as recorded
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type RemoteResult = Result<(), RemoteError>;

/// Flag changes to apply to a message. `None` leaves the flag untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagsDelta {
    pub seen: Option<bool>,
    pub flagged: Option<bool>,
}

impl FlagsDelta {
    pub fn seen(value: bool) -> Self {
        Self {
            seen: Some(value),
            flagged: None,
        }
    }

    pub fn flagged(value: bool) -> Self {
        Self {
            seen: None,
            flagged: Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_none() && self.flagged.is_none()
    }
}

/// One remote call per operation kind.
#[async_trait]
pub trait RemoteEndpoint: Send + Sync {
    async fn update_flags(&self, account_id: &str, target_id: &str, delta: FlagsDelta) -> RemoteResult;

    async fn delete_resource(&self, account_id: &str, target_id: &str) -> RemoteResult;

    async fn move_resource(&self, account_id: &str, target_id: &str, destination: &str) -> RemoteResult;

    /// Submit a serialized message for delivery.
    async fn send_resource(&self, account_id: &str, payload: &str) -> RemoteResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_delta_constructors() {
        assert_eq!(FlagsDelta::seen(true).seen, Some(true));
        assert_eq!(FlagsDelta::seen(true).flagged, None);
        assert_eq!(FlagsDelta::flagged(false).flagged, Some(false));
        assert!(FlagsDelta::default().is_empty());
        assert!(!FlagsDelta::flagged(true).is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = RemoteError::Rejected {
            status: 403,
            message: "Forbidden".into(),
        };
        assert_eq!(err.to_string(), "Remote rejected request (403): Forbidden");
    }
}
