//! End-to-end scan workflows against a simulated process

mod common;

use common::*;
use memscan::{
    Address, CompareMode, NoopObserver, RecordingObserver, ScalarValue, ScanEvent, ScanStatus,
    SessionPhase, ValueType,
};
use pretty_assertions::assert_eq;

#[test]
fn test_first_scan_then_narrow_by_exact_and_greater() {
    let engine = engine();
    let sim = heap_with(&[(0x100, int(1000))]);
    engine.attach_source(sim).unwrap();
    let session = engine.create_session("hp");
    let target = Address::new(HEAP + 0x100);

    let first = engine
        .scan(&session, ScalarValue::Int32(1000), CompareMode::Exact, &NoopObserver)
        .unwrap();
    assert!(first.full_scan);
    assert!(first.addresses.contains(&target));

    assert!(engine.write_value(target, ValueType::Int32, ScalarValue::Int32(2000)));
    let narrowed = engine
        .scan(&session, ScalarValue::Int32(2000), CompareMode::Exact, &NoopObserver)
        .unwrap();
    assert!(!narrowed.full_scan);
    assert_eq!(narrowed.addresses, vec![target]);

    // 2000 > 1500 keeps the candidate; nothing exceeds 2500
    let greater = engine
        .scan(&session, ScalarValue::Int32(1500), CompareMode::Greater, &NoopObserver)
        .unwrap();
    assert_eq!(greater.addresses, vec![target]);
    let none = engine
        .scan(&session, ScalarValue::Int32(2500), CompareMode::Greater, &NoopObserver)
        .unwrap();
    assert!(none.is_empty());
    assert_eq!(session.candidate_count(), 0);
}

#[test]
fn test_less_narrows() {
    let engine = engine();
    engine
        .attach_source(heap_with(&[(0x10, int(5)), (0x20, int(50)), (0x30, int(500))]))
        .unwrap();
    let session = engine.create_session("less");

    // Zeroed memory also matches Less 100; narrow to the seeded values first
    engine
        .scan(&session, ScalarValue::Int32(4), CompareMode::Greater, &NoopObserver)
        .unwrap();
    assert_eq!(session.candidate_count(), 3);

    let outcome = engine
        .scan(&session, ScalarValue::Int32(100), CompareMode::Less, &NoopObserver)
        .unwrap();
    assert_eq!(
        outcome.addresses,
        vec![Address::new(HEAP + 0x10), Address::new(HEAP + 0x20)]
    );
}

#[test]
fn test_changed_without_writes_is_empty() {
    let engine = engine();
    engine
        .attach_source(heap_with(&[(0x40, int(77)), (0x80, int(77))]))
        .unwrap();
    let session = engine.create_session("changed");

    engine
        .scan(&session, ScalarValue::Int32(77), CompareMode::Exact, &NoopObserver)
        .unwrap();
    let outcome = engine
        .scan(&session, ScalarValue::Int32(77), CompareMode::Changed, &NoopObserver)
        .unwrap();
    assert!(outcome.full_scan);
    assert!(outcome.is_empty());
}

#[test]
fn test_changed_after_write_finds_that_address() {
    let engine = engine();
    engine
        .attach_source(heap_with(&[(0x40, int(77)), (0x80, int(77)), (0xC0, int(77))]))
        .unwrap();
    let session = engine.create_session("changed");
    let moved = Address::new(HEAP + 0x80);

    engine
        .scan(&session, ScalarValue::Int32(77), CompareMode::Exact, &NoopObserver)
        .unwrap();
    assert!(engine.write_value(moved, ValueType::Int32, ScalarValue::Int32(78)));

    let outcome = engine
        .scan(&session, ScalarValue::Int32(77), CompareMode::Changed, &NoopObserver)
        .unwrap();
    assert_eq!(outcome.addresses, vec![moved]);
    assert_eq!(session.previous_value(moved), Some(ScalarValue::Int32(77)));
    assert_eq!(session.current_value(moved), Some(ScalarValue::Int32(78)));
    assert_eq!(session.first_value(moved), Some(ScalarValue::Int32(77)));
}

#[test]
fn test_unchanged_keeps_untouched_addresses() {
    let engine = engine();
    engine
        .attach_source(heap_with(&[(0x40, int(9)), (0x80, int(9)), (0xC0, int(9))]))
        .unwrap();
    let session = engine.create_session("unchanged");

    engine
        .scan(&session, ScalarValue::Int32(9), CompareMode::Exact, &NoopObserver)
        .unwrap();
    engine.write_value(Address::new(HEAP + 0x40), ValueType::Int32, ScalarValue::Int32(10));

    let outcome = engine
        .scan(&session, ScalarValue::Int32(9), CompareMode::Unchanged, &NoopObserver)
        .unwrap();
    assert_eq!(
        outcome.addresses,
        vec![Address::new(HEAP + 0x80), Address::new(HEAP + 0xC0)]
    );
    assert_eq!(session.phase(), SessionPhase::Narrowed);
}

#[test]
fn test_float32_tolerance_window() {
    let engine = engine();
    engine
        .attach_source(heap_with(&[
            (0x100, float(100.0)),
            (0x200, float(100.009)),
            (0x300, float(100.02)),
        ]))
        .unwrap();
    let session = engine.create_session("speed");

    let outcome = engine
        .scan(&session, ScalarValue::Float32(100.0), CompareMode::Exact, &NoopObserver)
        .unwrap();
    assert_eq!(
        outcome.addresses,
        vec![Address::new(HEAP + 0x100), Address::new(HEAP + 0x200)]
    );
}

#[test]
fn test_results_are_sorted_across_regions() {
    let engine = engine();
    let sim = memscan::SimulatedProcess::builder(1)
        .region_data(0x30000, int(3), memscan::Protection::READ_WRITE)
        .region_data(0x10000, int(3), memscan::Protection::READ_WRITE)
        .region_data(0x20000, int(3), memscan::Protection::READ_ONLY)
        .reserved(0x40000, 0x1000)
        .build()
        .unwrap();
    engine.attach_source(std::sync::Arc::new(sim)).unwrap();
    let session = engine.create_session("sorted");

    let outcome = engine
        .scan(&session, ScalarValue::Int32(3), CompareMode::Exact, &NoopObserver)
        .unwrap();
    assert_eq!(
        outcome.addresses,
        vec![
            Address::new(0x10000),
            Address::new(0x20000),
            Address::new(0x30000)
        ]
    );
    assert_eq!(outcome.regions_scanned, 3);
}

#[test]
fn test_truncation_keeps_exactly_the_cap() {
    let mut config = test_config();
    config.scanner.max_matches = 10;
    let engine = memscan::MemoryEngine::with_config(config).unwrap();
    engine.attach_source(heap_with(&[])).unwrap();
    let session = engine.create_session("zeros");
    let observer = RecordingObserver::new();

    let outcome = engine
        .scan(&session, ScalarValue::Int32(0), CompareMode::Exact, &observer)
        .unwrap();
    assert_eq!(outcome.status, ScanStatus::Truncated { limit: 10 });
    assert_eq!(outcome.len(), 10);
    assert!(outcome.is_truncated());
    assert_eq!(session.candidate_count(), 10);

    let events = observer.events();
    assert!(events.contains(&ScanEvent::Truncated { limit: 10 }));
    assert!(matches!(
        events.last(),
        Some(ScanEvent::Finished {
            matches: 10,
            status: ScanStatus::Truncated { limit: 10 }
        })
    ));
}

#[test]
fn test_events_bracket_the_scan() {
    let engine = engine();
    engine.attach_source(heap_with(&[(0x100, int(1))])).unwrap();
    let session = engine.create_session("events");
    let observer = RecordingObserver::new();

    engine
        .scan(&session, ScalarValue::Int32(1), CompareMode::Exact, &observer)
        .unwrap();
    let events = observer.events();

    assert!(matches!(
        events.first(),
        Some(ScanEvent::Started {
            full_scan: true,
            ..
        })
    ));
    assert!(matches!(
        events.last(),
        Some(ScanEvent::Finished {
            matches: 1,
            status: ScanStatus::Completed
        })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        ScanEvent::Progress { checked, total, .. } if checked == total
    )));
}

#[test]
fn test_type_mismatch_requires_clear() {
    let engine = engine();
    engine.attach_source(heap_with(&[(0x100, int(1000))])).unwrap();
    let session = engine.create_session("typed");

    engine
        .scan(&session, ScalarValue::Int32(1000), CompareMode::Exact, &NoopObserver)
        .unwrap();
    let result = engine.scan(&session, ScalarValue::Float64(1000.0), CompareMode::Exact, &NoopObserver);
    assert!(matches!(result, Err(memscan::MemoryError::TypeMismatch { .. })));

    session.clear();
    assert_eq!(session.phase(), SessionPhase::Empty);
    assert!(engine
        .scan(&session, ScalarValue::Float64(1000.0), CompareMode::Exact, &NoopObserver)
        .is_ok());
    assert_eq!(session.value_type(), Some(ValueType::Float64));
}

#[test]
fn test_unreadable_regions_are_skipped() {
    let engine = engine();
    let sim = memscan::SimulatedProcess::builder(2)
        .region_data(0x10000, int(8), memscan::Protection::READ_WRITE)
        .region_data(0x20000, int(8), memscan::Protection::NO_ACCESS)
        .region_data(0x30000, int(8), memscan::Protection::READ_WRITE.guarded())
        .build()
        .unwrap();
    engine.attach_source(std::sync::Arc::new(sim)).unwrap();
    let session = engine.create_session("skip");

    let outcome = engine
        .scan(&session, ScalarValue::Int32(8), CompareMode::Exact, &NoopObserver)
        .unwrap();
    assert_eq!(outcome.addresses, vec![Address::new(0x10000)]);
}
