use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Admin authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Shared admin key (required when method = "api_key")
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Every request is treated as an admin. Must be chosen explicitly.
    None,
    ApiKey,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("walkin.db")
}

/// Queue behaviour configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// How long a called ticket stays visible before it is deleted.
    #[serde(default = "default_removal_delay_ms")]
    pub removal_delay_ms: u64,
    /// How often the removal worker looks for due removals.
    #[serde(default = "default_removal_poll_interval_ms")]
    pub removal_poll_interval_ms: u64,
}

/// Longest accepted `queue.removal_delay_ms` (one day).
pub const MAX_REMOVAL_DELAY_MS: u64 = 24 * 60 * 60 * 1000;

impl QueueConfig {
    /// Clamped to [`MAX_REMOVAL_DELAY_MS`] for configs that skipped validation.
    pub fn removal_delay(&self) -> Duration {
        Duration::from_millis(self.removal_delay_ms.min(MAX_REMOVAL_DELAY_MS))
    }

    pub fn removal_poll_interval(&self) -> Duration {
        Duration::from_millis(self.removal_poll_interval_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            removal_delay_ms: default_removal_delay_ms(),
            removal_poll_interval_ms: default_removal_poll_interval_ms(),
        }
    }
}

fn default_removal_delay_ms() -> u64 {
    1000
}

fn default_removal_poll_interval_ms() -> u64 {
    250
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
}

/// Sanitized auth config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                api_key_configured: config
                    .auth
                    .api_key
                    .as_deref()
                    .is_some_and(|key| !key.is_empty()),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            queue: config.queue.clone(),
        }
    }
}
