//! Engine-level reads, writes, attachment and configuration

mod common;

use common::*;
use memscan::config::{validate_config, Config, ConfigLoader};
use memscan::{
    Address, CompareMode, MemoryEngine, MemoryError, NoopObserver, ProcessAccess, Protection,
    ScalarValue, SimulatedProcess, ValueType,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_not_attached_after_detach() {
    let engine = engine();
    engine.attach_source(heap_with(&[(0x100, int(1))])).unwrap();
    let session = engine.create_session("gone");
    engine.detach();

    assert!(!engine.is_attached());
    assert_eq!(engine.read_value(Address::new(HEAP + 0x100), ValueType::Int32), None);
    assert!(!engine.write_value(
        Address::new(HEAP + 0x100),
        ValueType::Int32,
        ScalarValue::Int32(2)
    ));
    assert!(matches!(
        engine.scan(&session, ScalarValue::Int32(1), CompareMode::Exact, &NoopObserver),
        Err(MemoryError::NotAttached)
    ));
    assert!(matches!(
        engine.lock(Address::new(HEAP), ScalarValue::Int32(1), ValueType::Int32),
        Err(MemoryError::NotAttached)
    ));

    // Detaching twice is harmless
    engine.detach();
}

#[test]
fn test_terminated_target_reads_nothing() {
    let engine = engine();
    let sim = heap_with(&[(0x100, int(1))]);
    engine.attach_source(sim.clone()).unwrap();
    let session = engine.create_session("dead");
    sim.terminate();

    assert_eq!(engine.read_value(Address::new(HEAP + 0x100), ValueType::Int32), None);
    let outcome = engine
        .scan(&session, ScalarValue::Int32(1), CompareMode::Exact, &NoopObserver)
        .unwrap();
    assert!(outcome.is_empty());
}

#[test]
fn test_unmapped_and_readonly_access() {
    let engine = engine();
    let sim = SimulatedProcess::builder(8)
        .region_data(0x10000, int(44), Protection::READ_ONLY)
        .build()
        .unwrap();
    engine.attach_source(Arc::new(sim)).unwrap();

    assert_eq!(
        engine.read_value(Address::new(0x10000), ValueType::Int32),
        Some(ScalarValue::Int32(44))
    );
    assert!(!engine.write_value(Address::new(0x10000), ValueType::Int32, ScalarValue::Int32(1)));
    assert_eq!(engine.read_value(Address::new(0x90000), ValueType::Int32), None);
}

#[test]
fn test_chunked_read_returns_readable_prefix() {
    let sim = SimulatedProcess::builder(5)
        .region(0x10000, 0x1000, Protection::READ_WRITE)
        .region(0x11000, 0x1000, Protection::NO_ACCESS)
        .build()
        .unwrap();
    let access = ProcessAccess::with_read_chunk(0x400);
    access.attach_source(Arc::new(sim));

    let bytes = access.read(Address::new(0x10800), 0x1000).unwrap();
    assert_eq!(bytes.len(), 0x800);
    assert_eq!(access.read(Address::new(0x11000), 0x10), None);
}

#[test]
fn test_engine_from_saved_config() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("memscan.toml");

    let mut config = test_config();
    config.scanner.max_matches = 3;
    let loader = ConfigLoader::new(&path);
    loader.save(&config).unwrap();

    let loaded = loader.load().unwrap();
    assert_eq!(loaded, config);
    validate_config(&loaded).unwrap();

    let engine = MemoryEngine::with_config(loaded).unwrap();
    engine.attach_source(heap_with(&[])).unwrap();
    let session = engine.create_session("capped");
    let outcome = engine
        .scan(&session, ScalarValue::Int32(0), CompareMode::Exact, &NoopObserver)
        .unwrap();
    assert_eq!(outcome.len(), 3);
}

#[test]
fn test_tolerance_from_config() {
    let mut config: Config = test_config();
    config.scanner.float32_tolerance = 1e-2;
    let engine = MemoryEngine::with_config(config).unwrap();
    engine
        .attach_source(heap_with(&[(0x100, float(100.9))]))
        .unwrap();
    let session = engine.create_session("loose");

    let outcome = engine
        .scan(&session, ScalarValue::Float32(100.0), CompareMode::Exact, &NoopObserver)
        .unwrap();
    assert_eq!(outcome.addresses, vec![Address::new(HEAP + 0x100)]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_write_then_read_int32(offset in 0usize..(HEAP_SIZE / 4), value in any::<i32>()) {
        let engine = engine();
        engine.attach_source(heap_with(&[])).unwrap();
        let address = Address::new(HEAP + offset * 4);

        prop_assert!(engine.write_value(address, ValueType::Int32, ScalarValue::Int32(value)));
        prop_assert_eq!(engine.read_value(address, ValueType::Int32), Some(ScalarValue::Int32(value)));
    }

    #[test]
    fn prop_write_then_read_float64(value in -1e12f64..1e12) {
        let engine = engine();
        engine.attach_source(heap_with(&[])).unwrap();
        let address = Address::new(HEAP + 0x800);

        prop_assert!(engine.write_value(address, ValueType::Float64, ScalarValue::Float64(value)));
        prop_assert_eq!(engine.read_value(address, ValueType::Float64), Some(ScalarValue::Float64(value)));
    }

    #[test]
    fn prop_narrowing_returns_subset(
        seeds in proptest::collection::vec((0usize..256, 0i32..4), 1..64),
        rewrites in proptest::collection::vec((0usize..256, 0i32..4), 0..64),
        target in 0i32..4,
    ) {
        let values: Vec<(usize, Vec<u8>)> = seeds
            .iter()
            .map(|(slot, v)| (slot * 4, int(*v + 1)))
            .collect();
        let engine = engine();
        engine.attach_source(heap_with(&values)).unwrap();
        let session = engine.create_session("subset");

        let first = engine
            .scan(&session, ScalarValue::Int32(0), CompareMode::Greater, &NoopObserver)
            .unwrap();
        for (slot, v) in rewrites {
            engine.write_value(Address::new(HEAP + slot * 4), ValueType::Int32, ScalarValue::Int32(v));
        }
        let narrowed = engine
            .scan(&session, ScalarValue::Int32(target), CompareMode::Exact, &NoopObserver)
            .unwrap();

        prop_assert!(narrowed.addresses.iter().all(|a| first.addresses.contains(a)));
        prop_assert!(narrowed.addresses.windows(2).all(|w| w[0] < w[1]));
    }
}
