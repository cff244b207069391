//! Configuration loader for memscan
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use crate::lock::DEFAULT_LOCK_INTERVAL;
use crate::memory::codec::Tolerance;
use crate::memory::orchestrator::OrchestratorSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_scanner")]
    pub scanner: ScannerConfig,

    #[serde(default = "default_lock")]
    pub lock: LockConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_region_batch")]
    pub region_batch: usize,
    #[serde(default = "default_address_batch")]
    pub address_batch: usize,
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: usize,
    #[serde(default = "default_max_region_read")]
    pub max_region_read: usize,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
    #[serde(default = "default_absolute_tolerance")]
    pub absolute_tolerance: f64,
    #[serde(default = "default_float32_tolerance")]
    pub float32_tolerance: f64,
    #[serde(default = "default_float64_tolerance")]
    pub float64_tolerance: f64,
}

/// Lock writer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_interval_ms")]
    pub interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Config {
    /// Worker pool and batching settings for the orchestrator
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            workers: self.scanner.max_workers,
            region_batch: self.scanner.region_batch,
            address_batch: self.scanner.address_batch,
            max_matches: self.scanner.max_matches,
            progress_interval: Duration::from_millis(self.scanner.progress_interval_ms),
        }
    }

    /// Float comparison tolerances
    pub fn tolerance(&self) -> Tolerance {
        Tolerance {
            absolute: self.scanner.absolute_tolerance,
            float32: self.scanner.float32_tolerance,
            float64: self.scanner.float64_tolerance,
        }
    }

    /// Pause between two lock ticks
    pub fn lock_interval(&self) -> Duration {
        if self.lock.interval_ms == 0 {
            DEFAULT_LOCK_INTERVAL
        } else {
            Duration::from_millis(self.lock.interval_ms)
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration or returns defaults if file doesn't exist
    pub fn load_or_default(&self) -> Config {
        self.load().unwrap_or_default()
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    match ConfigLoader::new("memscan.toml").load() {
        Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
        other => other,
    }
}

// Default functions for serde
fn default_scanner() -> ScannerConfig {
    let defaults = default_config().scanner;
    ScannerConfig {
        max_workers: defaults.max_workers,
        region_batch: defaults.region_batch,
        address_batch: defaults.address_batch,
        max_matches: defaults.max_matches,
        read_chunk_size: defaults.read_chunk_size,
        max_region_read: defaults.max_region_read,
        progress_interval_ms: defaults.progress_interval_ms,
        absolute_tolerance: defaults.absolute_tolerance,
        float32_tolerance: defaults.float32_tolerance,
        float64_tolerance: defaults.float64_tolerance,
    }
}

fn default_lock() -> LockConfig {
    LockConfig {
        interval_ms: default_config().lock.interval_ms,
    }
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_config().logging.level,
    }
}

// Individual field defaults
fn default_max_workers() -> usize {
    default_config().scanner.max_workers
}

fn default_region_batch() -> usize {
    default_config().scanner.region_batch
}

fn default_address_batch() -> usize {
    default_config().scanner.address_batch
}

fn default_max_matches() -> usize {
    default_config().scanner.max_matches
}

fn default_read_chunk_size() -> usize {
    default_config().scanner.read_chunk_size
}

fn default_max_region_read() -> usize {
    default_config().scanner.max_region_read
}

fn default_progress_interval_ms() -> u64 {
    default_config().scanner.progress_interval_ms
}

fn default_absolute_tolerance() -> f64 {
    default_config().scanner.absolute_tolerance
}

fn default_float32_tolerance() -> f64 {
    default_config().scanner.float32_tolerance
}

fn default_float64_tolerance() -> f64 {
    default_config().scanner.float64_tolerance
}

fn default_lock_interval_ms() -> u64 {
    default_config().lock.interval_ms
}

fn default_log_level() -> String {
    default_config().logging.level
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scanner: default_scanner(),
            lock: default_lock(),
            logging: default_logging(),
        }
    }
}
