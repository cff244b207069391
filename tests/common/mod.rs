//! Shared fixtures for the integration tests

#![allow(dead_code)]

use memscan::config::Config;
use memscan::{MemoryEngine, Protection, SimulatedProcess};
use std::sync::Arc;

pub const HEAP: usize = 0x0040_0000;
pub const HEAP_SIZE: usize = 64 * 1024;

/// Config with a short lock interval and small batches
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.scanner.max_workers = 4;
    config.scanner.region_batch = 2;
    config.scanner.address_batch = 64;
    config.scanner.progress_interval_ms = 0;
    config.lock.interval_ms = 10;
    config
}

pub fn engine() -> MemoryEngine {
    MemoryEngine::with_config(test_config()).unwrap()
}

/// One 64 KiB read-write region at [`HEAP`] with `values` written at their offsets
pub fn heap_with(values: &[(usize, Vec<u8>)]) -> Arc<SimulatedProcess> {
    let mut data = vec![0u8; HEAP_SIZE];
    for (offset, bytes) in values {
        data[*offset..*offset + bytes.len()].copy_from_slice(bytes);
    }
    Arc::new(
        SimulatedProcess::builder(4242)
            .region_data(HEAP, data, Protection::READ_WRITE)
            .build()
            .unwrap(),
    )
}

pub fn int(value: i32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

pub fn float(value: f32) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}
