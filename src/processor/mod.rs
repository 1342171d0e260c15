//! Queue processor.
//!
//! Drains the operation store against the remote endpoint in FIFO order,
//! applying the configured `RetryPolicy`. Records are deleted only after the
//! endpoint reports success, so delivery is at-least-once.

mod queue_processor;
mod report;

pub use queue_processor::{ProcessorError, QueueProcessor};
pub use report::DrainReport;
