//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/practiscope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/practiscope/` (~/.config/practiscope/)
//! - Data: `$XDG_DATA_HOME/practiscope/` (~/.local/share/practiscope/)
//! - State/Logs: `$XDG_STATE_HOME/practiscope/` (~/.local/state/practiscope/)

use crate::db::CategoryMatch;
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

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Analytics configuration
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Analytics engine configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    /// Upper bound for each store query issued while building a report
    #[serde(default = "default_query_timeout")]
    pub query_timeout_ms: u64,

    /// How category filters compare against stored categories
    #[serde(default)]
    pub category_match: CategoryMatch,

    /// Decimal digits kept in the therapist view's rates
    #[serde(default = "default_therapist_rate_decimals")]
    pub therapist_rate_decimals: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout(),
            category_match: CategoryMatch::default(),
            therapist_rate_decimals: default_therapist_rate_decimals(),
        }
    }
}

impl AnalyticsConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.query_timeout_ms == 0 {
            return Err(Error::Config(
                "analytics.query_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.therapist_rate_decimals > 6 {
            return Err(Error::Config(
                "analytics.therapist_rate_decimals must be between 0 and 6".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_query_timeout() -> u64 {
    5000
}

fn default_therapist_rate_decimals() -> u32 {
    2
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

    /// Also log to stderr (useful when running the server in a terminal)
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
            stderr: false,
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
            tracing::info!("No config file found at {:?}, using defaults", config_path);
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

        config.analytics.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/practiscope/config.toml` (~/.config/practiscope/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("practiscope").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/practiscope/` (~/.local/share/practiscope/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("practiscope")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/practiscope/` (~/.local/state/practiscope/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("practiscope")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/practiscope/data.db` (~/.local/share/practiscope/data.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("data.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/practiscope/practiscope.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("practiscope.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
