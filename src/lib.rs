// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules at the crate root
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::sqlite;

// Domain layer (queue semantics)
pub mod connectivity;
pub mod operation;
pub mod processor;
pub mod remote;
pub mod retry;
pub mod store;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod shutdown;
pub mod tasks;
pub mod telemetry;
