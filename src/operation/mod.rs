//! Queued user actions and their validation rules.

mod types;

pub use types::{
    NewOperation, OperationKind, OperationRecord, OperationValidationError, UnknownKind,
};
