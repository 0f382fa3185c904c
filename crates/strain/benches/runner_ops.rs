//! Runner Operations Benchmarks
//!
//! Benchmarks for full stress runs against the in-memory target and for
//! single calls into it.
//!
//! Run with: `cargo bench --bench runner_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use strain::{
    run_stress_test, Identity, MemoryStore, Operation, Params, StressConfig, SystemUnderTest,
    WorkerRole,
};
use std::time::Duration;

fn bench_store_only_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_only_run");
    group.sample_size(20);

    for threads in [1_usize, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_threads", threads)),
            &threads,
            |bench, &n| {
                bench.iter(|| {
                    let config = StressConfig::single_role("bench", WorkerRole::Store, n, 100);
                    let result = run_stress_test(config, MemoryStore::new()).unwrap();
                    black_box(result);
                });
            },
        );
    }

    group.finish();
}

fn bench_mixed_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_run");
    group.sample_size(10);

    group.bench_function("4_roles_50_ops", |bench| {
        bench.iter(|| {
            let config = StressConfig::mixed_default("bench", WorkerRole::ALL, 4, 50)
                .with_retrieve_warmup(Duration::ZERO);
            black_box(run_stress_test(config, MemoryStore::new()).unwrap());
        });
    });

    group.finish();
}

fn bench_memory_store_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_store_calls");
    let identity = Identity::new("bench");

    let store = MemoryStore::new();
    for i in 0..1_000 {
        let mut params = Params::new();
        params.insert("key".to_string(), json!(format!("k{}", i)));
        params.insert("value".to_string(), json!({ "i": i }));
        store.execute(Operation::Store, &params, &identity).unwrap();
    }

    let mut retrieve = Params::new();
    retrieve.insert("key".to_string(), json!("k500"));
    group.bench_function("retrieve_hit", |bench| {
        bench.iter(|| black_box(store.execute(Operation::Retrieve, &retrieve, &identity)));
    });

    let mut search = Params::new();
    search.insert("query".to_string(), json!("k9"));
    group.bench_function("search_1000_entries", |bench| {
        bench.iter(|| black_box(store.execute(Operation::Search, &search, &identity)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_store_only_run,
    bench_mixed_run,
    bench_memory_store_calls
);
criterion_main!(benches);
