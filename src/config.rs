//! Configuration management for duosida-direct
//!
//! This module handles loading, validation, and saving of the YAML
//! configuration. Command line flags override individual values after
//! loading.

mod defaults;

use crate::error::{ChargerError, Result};
use crate::logging::level::parse_log_level;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default TCP port of the charger firmware
pub const DEFAULT_PORT: u16 = 9988;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Charger connection parameters
    pub charger: ChargerConfig,

    /// Protocol delays and read deadlines
    pub timing: TimingConfig,

    /// Status polling behaviour
    pub polling: PollingConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Charger connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargerConfig {
    /// IP address or host name of the charger
    pub host: String,

    /// TCP port (9988 on stock firmware)
    pub port: u16,

    /// Device id printed on the charger label
    pub device_id: String,

    /// Connect and write timeout in milliseconds
    pub timeout_ms: u64,
}

/// Protocol delays and read deadlines, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause between the announcement frame and the drain read
    pub handshake_pause_ms: u64,

    /// Deadline of the drain read during the handshake
    pub handshake_drain_ms: u64,

    /// Settle delay after the identification frame
    pub handshake_settle_ms: u64,

    /// Deadline of a single status read
    pub read_timeout_ms: u64,

    /// Settle delay after every command
    pub command_settle_ms: u64,
}

/// Status polling behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Read attempts per status request
    pub retries: u32,

    /// Fall back to the last good status when attempts fail
    pub use_cache: bool,

    /// Monitor interval in milliseconds
    pub interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Log directory, or file path whose name and extension are kept for the
    /// daily files; empty disables file logging
    pub file: String,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,

    /// Number of rotated files to keep
    pub backup_count: u32,
}

impl ChargerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "duosida.yaml",
            "/data/duosida.yaml",
            "/etc/duosida/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Load from an explicit path, or the default locations when `None`
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::load(),
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.charger.host.trim().is_empty() {
            return Err(ChargerError::validation(
                "charger.host",
                "Host cannot be empty",
            ));
        }

        if self.charger.port == 0 {
            return Err(ChargerError::validation(
                "charger.port",
                "Port must be greater than 0",
            ));
        }

        if self.charger.timeout_ms == 0 {
            return Err(ChargerError::validation(
                "charger.timeout_ms",
                "Must be greater than 0",
            ));
        }

        if self.timing.read_timeout_ms == 0 {
            return Err(ChargerError::validation(
                "timing.read_timeout_ms",
                "Must be greater than 0",
            ));
        }

        if self.polling.interval_ms == 0 {
            return Err(ChargerError::validation(
                "polling.interval_ms",
                "Must be greater than 0",
            ));
        }

        parse_log_level(&self.logging.level)?;

        Ok(())
    }
}
