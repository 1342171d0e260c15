//! SQLite persistence module.
//!
//! Provides connection pooling and schema migrations for the durable queue.

pub mod pool;

pub use pool::{SqliteDatabase, SqlitePoolError};
