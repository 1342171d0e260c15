//! Durable operation queue.
//!
//! Queued user actions are kept here until the processor confirms them with
//! the remote server.
//!
//! # Architecture
//!
//! The store uses a backend abstraction to support different storage
//! implementations:
//!
//! - `SqliteOperationStore`: Durable storage in a local SQLite table (default)
//! - `MemoryOperationStore`: In-memory storage, lost on restart
//!
//! Use `create_operation_store()` to create the appropriate backend based on configuration.

pub mod backend;
mod factory;
pub mod memory_backend;
pub mod sqlite_backend;

pub use backend::{CountPublisher, OperationStore, StoreError, StoreStats};
pub use factory::create_operation_store;
pub use memory_backend::MemoryOperationStore;
pub use sqlite_backend::SqliteOperationStore;
