//! Semi-join filter benchmarks.
//!
//! Each sample is a full run: fresh store, load, filter and drain. Runs are
//! much slower than a typical micro-benchmark, so the sample count is kept at
//! criterion's minimum.

use std::time::Duration;

use criterion::measurement::WallTime;
use criterion::{criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion};
use semijoin_bench::{
    BenchConfig, BenchmarkDriver, ColumnarAdapter, KeyValueAdapter, StoreAdapter, StoreOptions,
};

const RECORDS: usize = 100_000;
const CHUNK: usize = 10_000;

fn driver(dir: &std::path::Path) -> BenchmarkDriver {
    let config = BenchConfig::new(dir)
        .with_records(RECORDS)
        .with_chunk(CHUNK)
        .with_seed(42)
        .with_store_options(StoreOptions {
            kv_cache_capacity: 64 * 1024 * 1024,
            ..Default::default()
        });
    BenchmarkDriver::new(config).unwrap()
}

fn bench_store<S: StoreAdapter>(
    group: &mut BenchmarkGroup<'_, WallTime>,
    driver: &BenchmarkDriver,
) {
    for selectivity in [1.0, 0.5, 0.0] {
        group.bench_with_input(
            BenchmarkId::new(S::NAME, selectivity),
            &selectivity,
            |b, &selectivity| {
                b.iter_custom(|iters| {
                    (0..iters)
                        .map(|_| driver.run::<S>(selectivity).unwrap().elapsed)
                        .sum()
                });
            },
        );
    }
}

fn bench_semijoin(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let driver = driver(dir.path());

    let mut group = c.benchmark_group("semijoin");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(30));

    bench_store::<ColumnarAdapter>(&mut group, &driver);
    bench_store::<KeyValueAdapter>(&mut group, &driver);

    group.finish();
}

criterion_group!(benches, bench_semijoin);
criterion_main!(benches);
