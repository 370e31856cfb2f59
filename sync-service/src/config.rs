//! Configuration loading for fedsync-service.
//!
//! Configuration is loaded from a TOML file (default: `fedsync.toml`).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for fedsync-service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// This instance's identity in the federation.
    #[serde(default)]
    pub instance: InstanceConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Lock configuration.
    #[serde(default)]
    pub locks: LockConfig,
    /// Cleanup task configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Instance identity.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Federation address of this instance (default: localhost).
    #[serde(default = "default_instance_address")]
    pub address: String,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Lock configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// Seconds after which a lock is considered abandoned (default: 600).
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl LockConfig {
    /// The staleness window as a `Duration`.
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

/// Cleanup task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Stale-lock sweep interval in seconds (default: 300).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable cleanup task (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_instance_address() -> String {
    "localhost".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("fedsync.db")
}

fn default_stale_after_secs() -> u64 {
    sync_core::DEFAULT_STALE_AFTER.as_secs()
}

fn default_cleanup_interval() -> u64 {
    300 // 5 minutes
}

fn default_cleanup_enabled() -> bool {
    true
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            address: default_instance_address(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: default_cleanup_enabled(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance: InstanceConfig::default(),
            storage: StorageConfig::default(),
            locks: LockConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// is out of range.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the TOML types cannot constrain.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locks.stale_after_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "locks.stale_after_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value parsed but is not usable.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}
