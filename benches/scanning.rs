use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use memscan::config::Config;
use memscan::{CompareMode, MemoryEngine, NoopObserver, Protection, ScalarValue, SimulatedProcess};
use std::sync::Arc;

const REGION_SIZE: usize = 1024 * 1024;

/// `regions` 1 MiB regions with a 1000 every 4 KiB
fn simulated(regions: usize) -> Arc<SimulatedProcess> {
    let mut builder = SimulatedProcess::builder(1);
    for i in 0..regions {
        let mut data = vec![0u8; REGION_SIZE];
        for offset in (0..REGION_SIZE).step_by(4096) {
            data[offset..offset + 4].copy_from_slice(&1000i32.to_le_bytes());
        }
        builder = builder.region_data(0x0100_0000 + i * 0x0200_0000, data, Protection::READ_WRITE);
    }
    Arc::new(builder.build().unwrap())
}

fn engine() -> MemoryEngine {
    let mut config = Config::default();
    config.scanner.progress_interval_ms = 1000;
    MemoryEngine::with_config(config).unwrap()
}

fn benchmark_full_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_scan");
    for regions in [1usize, 8, 32] {
        let engine = engine();
        engine.attach_source(simulated(regions)).unwrap();
        group.throughput(Throughput::Bytes((regions * REGION_SIZE) as u64));

        group.bench_with_input(BenchmarkId::new("int32_exact", regions), &regions, |b, _| {
            b.iter(|| {
                let session = engine.create_session("bench");
                let outcome = engine
                    .scan(&session, black_box(ScalarValue::Int32(1000)), CompareMode::Exact, &NoopObserver)
                    .unwrap();
                black_box(outcome.len())
            });
        });

        group.bench_with_input(BenchmarkId::new("float32_exact", regions), &regions, |b, _| {
            b.iter(|| {
                let session = engine.create_session("bench");
                let outcome = engine
                    .scan(&session, black_box(ScalarValue::Float32(1.5)), CompareMode::Exact, &NoopObserver)
                    .unwrap();
                black_box(outcome.len())
            });
        });
    }
    group.finish();
}

fn benchmark_narrowing_scan(c: &mut Criterion) {
    let engine = engine();
    engine.attach_source(simulated(32)).unwrap();

    c.bench_function("narrowing_scan_8k_candidates", |b| {
        b.iter_batched(
            || {
                let session = engine.create_session("narrow");
                engine
                    .scan(&session, ScalarValue::Int32(1000), CompareMode::Exact, &NoopObserver)
                    .unwrap();
                session
            },
            |session| {
                let outcome = engine
                    .scan(&session, black_box(ScalarValue::Int32(999)), CompareMode::Greater, &NoopObserver)
                    .unwrap();
                black_box(outcome.len())
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, benchmark_full_scan, benchmark_narrowing_scan);
criterion_main!(benches);
