//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Push provider configuration.
    #[serde(default)]
    pub push: PushConfig,
    /// Notification fan-out and retention.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Push provider configuration. A missing section disables that platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushConfig {
    /// Apple Push Notification service (iOS devices).
    #[serde(default)]
    pub apns: Option<ApnsConfig>,
    /// Firebase Cloud Messaging (Android devices).
    #[serde(default)]
    pub fcm: Option<FcmConfig>,
}

/// APNs token-based authentication settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApnsConfig {
    /// Key ID of the `.p8` signing key.
    pub key_id: String,
    /// Apple developer team ID.
    pub team_id: String,
    /// App bundle id, sent as `apns-topic`.
    pub topic: String,
    /// PEM contents of the `.p8` signing key.
    pub private_key_pem: String,
    /// Use the sandbox gateway.
    #[serde(default)]
    pub sandbox: bool,
}

/// FCM legacy HTTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    /// Server key used in the `Authorization: key=...` header.
    pub server_key: String,
    /// Send endpoint.
    #[serde(default = "default_fcm_endpoint")]
    pub endpoint: String,
}

/// Notification dispatch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Notifications not updated for this many days are pruned.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Recipients notified concurrently during a fan-out.
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,
    /// Seconds between prune runs.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            fanout_concurrency: default_fanout_concurrency(),
            prune_interval_secs: default_prune_interval_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

fn default_fcm_endpoint() -> String {
    "https://fcm.googleapis.com/fcm/send".to_string()
}

const fn default_retention_days() -> i64 {
    30
}

const fn default_fanout_concurrency() -> usize {
    8
}

const fn default_prune_interval_secs() -> u64 {
    3600
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `POLLEN_ENV`)
    /// 4. Environment variables with `POLLEN__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("POLLEN_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("POLLEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("POLLEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
