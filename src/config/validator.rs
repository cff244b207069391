//! Configuration validator for memscan
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{Config, ConfigError, LockConfig, LoggingConfig, ScannerConfig};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_scanner(&config.scanner)?;
        Self::validate_lock(&config.lock)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    /// Validates scanner configuration
    fn validate_scanner(scanner: &ScannerConfig) -> Result<(), ConfigError> {
        if scanner.max_workers == 0 {
            return Err(ConfigError::Invalid(
                "Scanner workers must be at least 1".to_string(),
            ));
        }

        if scanner.max_workers > 128 {
            return Err(ConfigError::Invalid(
                "Scanner workers cannot exceed 128".to_string(),
            ));
        }

        if scanner.region_batch == 0 || scanner.address_batch == 0 {
            return Err(ConfigError::Invalid(
                "Region and address batch sizes must be at least 1".to_string(),
            ));
        }

        if scanner.max_matches == 0 {
            return Err(ConfigError::Invalid(
                "Match cap must be at least 1".to_string(),
            ));
        }

        if scanner.read_chunk_size == 0 || !scanner.read_chunk_size.is_power_of_two() {
            return Err(ConfigError::Invalid(
                "Read chunk size must be a power of 2".to_string(),
            ));
        }

        if scanner.max_region_read < scanner.read_chunk_size {
            return Err(ConfigError::Invalid(
                "Region read cap must be at least as large as the read chunk size".to_string(),
            ));
        }

        for (name, value) in [
            ("absolute_tolerance", scanner.absolute_tolerance),
            ("float32_tolerance", scanner.float32_tolerance),
            ("float64_tolerance", scanner.float64_tolerance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a positive finite number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Validates lock writer configuration
    fn validate_lock(lock: &LockConfig) -> Result<(), ConfigError> {
        if lock.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "Lock interval must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates logging configuration
    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }
        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}
