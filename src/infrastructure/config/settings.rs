use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// `sqlite` or `memory`
    #[serde(default = "default_queue_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// `exponential` or `flat`
    #[serde(default = "default_retry_policy")]
    pub policy: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    #[serde(default)]
    pub jitter_factor: f64,
    #[serde(default = "default_flat_max_retries")]
    pub flat_max_retries: u32,
    #[serde(default = "default_flat_pass_delay")]
    pub flat_pass_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Periodic drain interval in seconds
    #[serde(default = "default_sync_interval")]
    pub interval_seconds: u64,
    /// Drain once as soon as the worker starts
    #[serde(default = "default_true")]
    pub sync_on_start: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_url")]
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_remote_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default = "default_probe_interval")]
    pub probe_interval_seconds: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_database_url() -> String {
    "sqlite://mail-sync.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_queue_backend() -> String {
    "sqlite".to_string()
}

fn default_retry_policy() -> String {
    "exponential".to_string()
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    1_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_backoff() -> u64 {
    32_000
}

fn default_flat_max_retries() -> u32 {
    3
}

fn default_flat_pass_delay() -> u64 {
    10_000
}

fn default_sync_interval() -> u64 {
    900 // 15 minutes
}

fn default_true() -> bool {
    true
}

fn default_remote_url() -> String {
    "http://localhost:8080/dav".to_string()
}

fn default_remote_timeout() -> u64 {
    30
}

fn default_probe_interval() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "mail-sync-queue".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("database.url", default_database_url())?
            .set_default("queue.backend", default_queue_backend())?
            .set_default("retry.policy", default_retry_policy())?
            .set_default("remote.base_url", default_remote_url())?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // MAILSYNC_SERVER__PORT, MAILSYNC_REMOTE__BASE_URL, MAILSYNC_RETRY__MAX_RETRIES, etc.
            .add_source(
                Environment::with_prefix("MAILSYNC")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.retry.validate()?;
        Ok(settings)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl RetryConfig {
    /// Reject backoff settings that would stall or break the drain loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_backoff_ms == 0 {
            return Err(ConfigError::Message(
                "retry.initial_backoff_ms must be greater than 0".into(),
            ));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(ConfigError::Message(
                "retry.max_backoff_ms must be at least retry.initial_backoff_ms".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Message(format!(
                "retry.multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::Message(format!(
                "retry.jitter_factor must be in [0, 1), got {}",
                self.jitter_factor
            )));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_queue_backend(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: default_retry_policy(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            multiplier: default_multiplier(),
            max_backoff_ms: default_max_backoff(),
            jitter_factor: 0.0,
            flat_max_retries: default_flat_max_retries(),
            flat_pass_delay_ms: default_flat_pass_delay(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sync_interval(),
            sync_on_start: true,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_url(),
            username: None,
            password: None,
            timeout_seconds: default_remote_timeout(),
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_interval_seconds: default_probe_interval(),
            probe_timeout_seconds: default_probe_timeout(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
            retry: RetryConfig::default(),
            sync: SyncConfig::default(),
            remote: RemoteConfig::default(),
            connectivity: ConnectivityConfig::default(),
            otel: OtelConfig::default(),
        }
    }
}
