//! Configuration for the registration service.

use crate::api::DEFAULT_REQUESTS_PER_MINUTE;
use crate::handler::DEFAULT_STORE_TIMEOUT;
use anyhow::{bail, Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use user_store::{FileUserStore, MemoryUserStore, StoreError, UserStore};

/// Service configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// User table identifier (`USERS_TABLE`), required
    pub users_table: String,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Storage backend
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,

    /// Directory holding table files (file backend)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Passphrase enabling table encryption (file backend)
    #[serde(default)]
    pub encryption_key: Option<SecretString>,

    /// Bound on each store call
    #[serde(default = "default_store_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Global requests per minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level, used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

// Default implementations
impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
            encryption_key: None,
            timeout: default_store_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_store_timeout() -> Duration {
    DEFAULT_STORE_TIMEOUT
}

fn default_listen_addr() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    8080
}

fn default_requests_per_minute() -> u32 {
    DEFAULT_REQUESTS_PER_MINUTE
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_environment(config::Environment::default())
    }

    /// Load configuration from an explicit environment source.
    pub fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment.separator("__").try_parsing(false))
            .build()
            .context("Failed to build configuration")?;

        let config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration (is USERS_TABLE set?)")?;

        if config.users_table.trim().is_empty() {
            bail!("USERS_TABLE must not be empty");
        }

        Ok(config)
    }

    /// Open the configured user table.
    pub async fn open_store(&self) -> Result<Arc<dyn UserStore>, StoreError> {
        match self.store.backend {
            StoreBackend::Memory => {
                info!("Using in-memory user store (data will be lost on restart)");
                Ok(Arc::new(MemoryUserStore::new(self.users_table.as_str())))
            }
            StoreBackend::File => {
                let store = FileUserStore::open(
                    &self.store.data_dir,
                    self.users_table.as_str(),
                    self.store.encryption_key.as_ref(),
                )
                .await?;
                Ok(Arc::new(store))
            }
        }
    }
}
