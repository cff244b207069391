//! Default configuration values for memscan

use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub scanner: ScannerDefaults,
    pub lock: LockDefaults,
    pub logging: LoggingDefaults,
}

/// Default scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerDefaults {
    pub max_workers: usize,
    pub region_batch: usize,
    pub address_batch: usize,
    pub max_matches: usize,
    pub read_chunk_size: usize,
    pub max_region_read: usize,
    pub progress_interval_ms: u64,
    pub absolute_tolerance: f64,
    pub float32_tolerance: f64,
    pub float64_tolerance: f64,
}

/// Default lock writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockDefaults {
    pub interval_ms: u64,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        scanner: ScannerDefaults {
            max_workers: num_cpus::get().clamp(1, 8),
            region_batch: 16,
            address_batch: 4096,
            max_matches: 100_000,
            read_chunk_size: 4 * 1024 * 1024,  // 4MB
            max_region_read: 64 * 1024 * 1024, // 64MB
            progress_interval_ms: 100,
            absolute_tolerance: 1e-6,
            float32_tolerance: 1e-4,
            float64_tolerance: 1e-8,
        },
        lock: LockDefaults { interval_ms: 100 },
        logging: LoggingDefaults {
            level: "info".to_string(),
        },
    }
}
