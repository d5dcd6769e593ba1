//! Performance benchmarks for credential loading and lookup
//!
//! Measures a full directory rescan and snapshot reads for different
//! numbers of credential files.
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use credwatch::store::CredentialStore;
use std::fs;
use tempfile::TempDir;

/// Create a secrets directory with `files` credential files
fn generate_secrets_dir(files: usize) -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    for i in 0..files {
        fs::write(
            dir.path().join(format!("SECRET_{:04}", i)),
            format!("value-{}-{}\n", i, "x".repeat(32)),
        )
        .expect("write secret");
    }
    dir
}

/// Benchmark a full rescan of one directory
fn bench_store_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_load");

    for size in [5, 50, 250].iter() {
        let dir = generate_secrets_dir(*size);
        let store = CredentialStore::new("bench", [dir.path()]);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_files", size)),
            &store,
            |b, store| {
                b.iter(|| black_box(store.load()));
            },
        );
    }

    group.finish();
}

/// Benchmark lookups against a published snapshot
fn bench_store_get(c: &mut Criterion) {
    let dir = generate_secrets_dir(250);
    let store = CredentialStore::new("bench", [dir.path()]);
    store.load();

    c.bench_function("store_get_hit", |b| {
        b.iter(|| black_box(store.get(black_box("SECRET_0125"))));
    });

    c.bench_function("store_get_miss", |b| {
        b.iter(|| black_box(store.get(black_box("MISSING"))));
    });

    c.bench_function("snapshot_get", |b| {
        b.iter(|| {
            let snapshot = store.snapshot();
            black_box(snapshot.get("SECRET_0125").map(str::len))
        });
    });
}

criterion_group!(benches, bench_store_load, bench_store_get);

criterion_main!(benches);
