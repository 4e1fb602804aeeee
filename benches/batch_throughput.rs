// benches/batch_throughput.rs
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch production and end-to-end write throughput
//!
//! ```bash
//! cargo bench --bench batch_throughput
//! cargo bench --bench batch_throughput -- produce_batch
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dgen_csv::{generate_csv, produce_batch, BatchSpec, CancelToken, GenerationConfig};

fn bench_produce_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("produce_batch");

    for &columns in &[4usize, 20, 100] {
        let spec = BatchSpec {
            batch_size: 10_000,
            expected_rows: u64::MAX,
            columns,
            precision: 2,
            seed_base: 42,
        };
        let sample = produce_batch(&spec, 0).expect("sample batch");
        group.throughput(Throughput::Bytes(sample.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(columns), &spec, |b, spec| {
            let mut index = 0u64;
            b.iter(|| {
                index += 1;
                black_box(produce_batch(spec, index).expect("batch"))
            });
        });
    }

    group.finish();
}

fn bench_generate_csv(c: &mut Criterion) {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = 32 * 1024 * 1024;

    let mut group = c.benchmark_group("generate_csv");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(target));

    for &workers in &[1usize, 4] {
        let config = GenerationConfig {
            target_bytes: target,
            buffer_bytes: 0,
            columns: 20,
            batch_size: 20_000,
            workers,
            output: dir.path().join(format!("bench_{}.csv", workers)),
            ..Default::default()
        };

        group.bench_with_input(BenchmarkId::new("workers", workers), &config, |b, config| {
            b.iter(|| generate_csv(config, &CancelToken::new()).expect("run"));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_produce_batch, bench_generate_csv);
criterion_main!(benches);
