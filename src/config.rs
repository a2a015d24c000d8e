//! Configuration file handling.
//!
//! This module provides loading and saving of pkgscan configuration
//! from a TOML file. Command-line flags and environment variables override
//! whatever the file says.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/pkgscan/config.toml`
//! - macOS: `~/Library/Application Support/pkgscan/config.toml`
//! - Windows: `%APPDATA%\pkgscan\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! osv_api_url = "https://api.osv.dev/v1/query"
//! concurrency = 5
//! request_timeout_secs = 30
//! default_format = "table"
//!
//! [persistence]
//! enabled = true
//! database_path = "/var/lib/pkgscan/scans.db"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! file = "/var/log/pkgscan.log"
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checker::DEFAULT_OSV_API_URL;
use crate::error::ConfigError;
use crate::logging::LOG_FORMATS;

/// Application configuration.
///
/// # Example
///
/// ```no_run
/// use pkgscan::Config;
///
/// // Load from file (or use defaults if file doesn't exist)
/// let config = Config::load().unwrap();
///
/// println!("Concurrency: {}", config.concurrency);
/// println!("OSV endpoint: {}", config.osv_api_url);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OSV.dev query endpoint.
    pub osv_api_url: String,

    /// Maximum number of lookups in flight during a directory scan.
    ///
    /// Default: 5
    pub concurrency: usize,

    /// Timeout for a single vulnerability lookup, in seconds.
    ///
    /// Default: 30
    pub request_timeout_secs: u64,

    /// Default output format when no `--format` flag is provided.
    ///
    /// Valid values: "table", "json", "log"
    /// Default: "table"
    pub default_format: String,

    pub persistence: PersistenceConfig,

    pub logging: LoggingConfig,
}

/// Storage of vulnerable scan results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Default: false
    pub enabled: bool,

    /// SQLite database file. Created on first use.
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level; `RUST_LOG` takes precedence.
    pub level: String,

    /// One of "pretty", "compact" or "json".
    pub format: String,

    /// Also append JSON log lines to this file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            osv_api_url: DEFAULT_OSV_API_URL.to_string(),
            concurrency: 5,
            request_timeout_secs: 30,
            default_format: "table".to_string(),
            persistence: PersistenceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            database_path: default_database_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file: None,
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pkgscan")
        .join("scans.db")
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves the configuration to the config file.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects values no scan can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.osv_api_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "osv_api_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !LOG_FORMATS.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid {
                field: "logging.format",
                reason: format!(
                    "unknown format '{}', expected one of {}",
                    self.logging.format,
                    LOG_FORMATS.join(", ")
                ),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use pkgscan::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("pkgscan/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pkgscan")
            .join("config.toml")
    }

    /// Generates a string containing the default configuration.
    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
