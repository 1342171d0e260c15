//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `config`: Application configuration and settings
//! - `error`: Unified API error type
//! - `metrics`: Prometheus metrics helpers
//! - `sqlite`: SQLite connection pool and schema migrations

pub mod config;
pub mod error;
pub mod metrics;
pub mod sqlite;
