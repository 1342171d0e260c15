//! Operation record types.
//!
//! An `OperationRecord` is one user action (mark read, move, send, ...) waiting
//! to be replayed against the remote mail server.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of actions the queue can replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    MarkRead,
    MarkUnread,
    Archive,
    Delete,
    Star,
    Unstar,
    MoveToFolder,
    SendEmail,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::MarkRead,
        OperationKind::MarkUnread,
        OperationKind::Archive,
        OperationKind::Delete,
        OperationKind::Star,
        OperationKind::Unstar,
        OperationKind::MoveToFolder,
        OperationKind::SendEmail,
    ];

    /// Stable string form, used as the stored column value and metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarkRead => "mark_read",
            Self::MarkUnread => "mark_unread",
            Self::Archive => "archive",
            Self::Delete => "delete",
            Self::Star => "star",
            Self::Unstar => "unstar",
            Self::MoveToFolder => "move_to_folder",
            Self::SendEmail => "send_email",
        }
    }

    /// Whether the kind acts on an existing resource identified by `target_id`.
    ///
    /// Creation-style kinds carry their whole entity in the payload instead.
    pub fn requires_target(&self) -> bool {
        !matches!(self, Self::SendEmail)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown operation kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for OperationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// A queued operation as persisted in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Store-assigned identity, monotonically increasing; the ordering key
    pub id: i64,
    pub kind: OperationKind,
    /// Affected resource (email id); empty for creation-style kinds
    pub target_id: String,
    pub account_id: String,
    /// Destination folder for moves, serialized message for sends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl OperationRecord {
    /// Whether this record has used up all of its attempts.
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }

    /// The payload, if present and not blank.
    pub fn non_blank_payload(&self) -> Option<&str> {
        self.payload
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// An operation about to be enqueued; the store assigns `id` and
/// `enqueued_at` at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOperation {
    pub kind: OperationKind,
    #[serde(default)]
    pub target_id: String,
    pub account_id: String,
    #[serde(default)]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationValidationError {
    #[error("{kind} requires a target id")]
    MissingTarget { kind: OperationKind },

    #[error("{kind} requires a payload")]
    MissingPayload { kind: OperationKind },

    #[error("account id must not be empty")]
    MissingAccount,
}

impl NewOperation {
    pub fn new(kind: OperationKind, account_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            kind,
            target_id: target_id.into(),
            account_id: account_id.into(),
            payload: None,
        }
    }

    pub fn mark_read(account_id: impl Into<String>, email_id: impl Into<String>) -> Self {
        Self::new(OperationKind::MarkRead, account_id, email_id)
    }

    pub fn mark_unread(account_id: impl Into<String>, email_id: impl Into<String>) -> Self {
        Self::new(OperationKind::MarkUnread, account_id, email_id)
    }

    pub fn star(account_id: impl Into<String>, email_id: impl Into<String>) -> Self {
        Self::new(OperationKind::Star, account_id, email_id)
    }

    pub fn unstar(account_id: impl Into<String>, email_id: impl Into<String>) -> Self {
        Self::new(OperationKind::Unstar, account_id, email_id)
    }

    pub fn archive(account_id: impl Into<String>, email_id: impl Into<String>) -> Self {
        Self::new(OperationKind::Archive, account_id, email_id)
    }

    pub fn delete(account_id: impl Into<String>, email_id: impl Into<String>) -> Self {
        Self::new(OperationKind::Delete, account_id, email_id)
    }

    pub fn move_to_folder(
        account_id: impl Into<String>,
        email_id: impl Into<String>,
        folder: Option<String>,
    ) -> Self {
        Self::new(OperationKind::MoveToFolder, account_id, email_id).payload(folder)
    }

    pub fn send_email(account_id: impl Into<String>, message_json: impl Into<String>) -> Self {
        Self::new(OperationKind::SendEmail, account_id, String::new())
            .payload(Some(message_json.into()))
    }

    pub fn payload(mut self, payload: Option<String>) -> Self {
        self.payload = payload;
        self
    }

    /// Reject records that could never be dispatched.
    ///
    /// A move without a destination is accepted here; it fails at dispatch
    /// and consumes retries like any other failure.
    pub fn validate(&self) -> Result<(), OperationValidationError> {
        if self.account_id.trim().is_empty() {
            return Err(OperationValidationError::MissingAccount);
        }
        if self.kind.requires_target() && self.target_id.trim().is_empty() {
            return Err(OperationValidationError::MissingTarget { kind: self.kind });
        }
        if self.kind == OperationKind::SendEmail
            && self.payload.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            return Err(OperationValidationError::MissingPayload { kind: self.kind });
        }
        Ok(())
    }

    /// Materialize the record once the store has assigned its id.
    pub fn into_record(self, id: i64, enqueued_at: DateTime<Utc>) -> OperationRecord {
        OperationRecord {
            id,
            kind: self.kind,
            target_id: self.target_id,
            account_id: self.account_id,
            payload: self.payload,
            enqueued_at,
            retry_count: 0,
            last_error: None,
        }
    }
}
