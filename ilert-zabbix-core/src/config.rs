//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/ilert-zabbix/config.toml`. Every
//! setting has a default, so the file is optional.
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/ilert-zabbix/` (~/.config/ilert-zabbix/)
//! - State/Logs: `$XDG_STATE_HOME/ilert-zabbix/` (~/.local/state/ilert-zabbix/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Local event queue
    #[serde(default)]
    pub queue: QueueConfig,

    /// iLert events API
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where pending events are kept between invocations
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Queue directory, created on startup if missing
    #[serde(default = "default_queue_dir")]
    pub dir: PathBuf,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            dir: default_queue_dir(),
        }
    }
}

fn default_queue_dir() -> PathBuf {
    PathBuf::from("/tmp/ilert_zabbix")
}

/// iLert events API settings
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Base URL including scheme, without port (e.g., `https://api.ilert.com`)
    #[serde(default = "default_api_endpoint")]
    pub endpoint: String,

    /// TCP port appended to the endpoint
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Per-request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_api_endpoint(),
            port: default_api_port(),
            timeout_secs: default_api_timeout(),
        }
    }
}

impl ApiConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(Error::Config("api.endpoint must not be empty".to_string()));
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(Error::Config(format!(
                "api.endpoint must start with http:// or https://, got {}",
                endpoint
            )));
        }
        if self.port == 0 {
            return Err(Error::Config("api.port must not be 0".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "api.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Endpoint with the port attached and no trailing slash
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.endpoint.trim().trim_end_matches('/'), self.port)
    }

    /// Get the configured request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_endpoint() -> String {
    "https://api.ilert.com".to_string()
}

fn default_api_port() -> u16 {
    443
}

fn default_api_timeout() -> u64 {
    60
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.api.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/ilert-zabbix/config.toml` (~/.config/ilert-zabbix/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("ilert-zabbix").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/ilert-zabbix/` (~/.local/state/ilert-zabbix/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("ilert-zabbix")
    }
}
