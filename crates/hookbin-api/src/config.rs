//! Configuration management for the hookbin service.

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const CONFIG_FILE: &str = "hookbin.toml";

const ENV_KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "STORAGE_BACKEND",
    "DATABASE_URL",
    "DATABASE_MAX_CONNECTIONS",
    "DATA_DIR",
    "REQUEST_TIMEOUT",
    "RUST_LOG",
];

/// Which `EventStore` implementation the service runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite database at `database_url`.
    Sqlite,
    /// JSON document in `data_dir`.
    File,
    /// Process memory only; lost on restart.
    Memory,
}

/// Service configuration with defaults, file, and environment overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`hookbin.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// # Example
///
/// ```no_run
/// use hookbin_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
/// println!("Listening on {}:{}", config.host, config.port);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Storage backend.
    ///
    /// Environment variable: `STORAGE_BACKEND`
    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,
    /// SQLite connection URL.
    ///
    /// Environment variable: `DATABASE_URL`
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Maximum number of pooled SQLite connections.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    /// Directory holding the JSON document of the file backend.
    ///
    /// Environment variable: `DATA_DIR`
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log filter directive.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

impl Config {
    /// Load configuration from defaults, `hookbin.toml` and environment
    /// variable overrides, then validate it.
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// The layered provider stack used by [`Config::load`].
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::raw().only(ENV_KEYS))
    }

    /// Extracts and validates configuration from an arbitrary provider stack.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.storage_backend == StorageBackend::Sqlite {
            if self.database_max_connections == 0 {
                anyhow::bail!("database_max_connections must be greater than 0");
            }
            if !self.database_url.starts_with("sqlite:") {
                anyhow::bail!("database_url must be a sqlite: URL");
            }
        }

        if self.storage_backend == StorageBackend::File && self.data_dir.as_os_str().is_empty() {
            anyhow::bail!("data_dir must not be empty for the file backend");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            storage_backend: default_storage_backend(),
            database_url: default_database_url(),
            database_max_connections: default_max_connections(),
            data_dir: default_data_dir(),
            rust_log: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::Sqlite
}

fn default_database_url() -> String {
    "sqlite://data/hookbin.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_level() -> String {
    "info,hookbin=debug,tower_http=debug".to_string()
}
