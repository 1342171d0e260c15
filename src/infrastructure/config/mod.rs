mod settings;

pub use settings::{
    ApiConfig, ConnectivityConfig, DatabaseConfig, OtelConfig, QueueConfig, RemoteConfig,
    RetryConfig, ServerConfig, Settings, SyncConfig,
};
