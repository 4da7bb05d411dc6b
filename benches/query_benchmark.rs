//! Benchmarks for cellstore query performance.
//!
//! Run with: cargo bench
//!
//! This benchmark suite measures:
//! - Query throughput with and without cache
//! - Point lookups vs prefix lookups on the raw reader
//! - Scalability with different store sizes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cellstore::binary::{BlockStoreReader, BlockStoreWriter, FieldValue, Schema};
use cellstore::{QueryEngine, QueryEngineConfig};

/// Generate a store with `areas * cells_per_area` cells, two operators each.
fn generate_store(areas: i32, cells_per_area: i32) -> Vec<u8> {
    let mut writer = BlockStoreWriter::new(Schema::cell_towers());
    for area in 0..areas {
        for cell in 0..cells_per_area {
            for operator in 1..=2 {
                writer
                    .add(
                        &[
                            FieldValue::Int(area * 10),
                            FieldValue::Int(cell * 7),
                            FieldValue::Int(262),
                            FieldValue::Int(operator),
                        ],
                        &[
                            FieldValue::Double(13.0 + cell as f64 * 1e-4),
                            FieldValue::Double(52.0 + area as f64 * 1e-4),
                        ],
                    )
                    .unwrap();
            }
        }
    }
    writer.build().unwrap()
}

/// Generate queries as (country, operator, cell, area) - mix of hits and misses.
fn generate_queries(
    count: usize,
    areas: i32,
    cells_per_area: i32,
) -> Vec<(Option<i32>, Option<i32>, i32, i32)> {
    (0..count as i32)
        .map(|i| {
            let area = (i % areas) * 10;
            match i % 4 {
                0 => (Some(262), Some(1), (i % cells_per_area) * 7, area),
                1 => (None, None, (i % cells_per_area) * 7, area),
                2 => (Some(262), Some(9), (i % cells_per_area) * 7, area),
                // never present: cell ids are multiples of 7
                _ => (None, None, (i % cells_per_area) * 7 + 1, area),
            }
        })
        .collect()
}

/// Benchmark query throughput without cache.
fn bench_query_no_cache(c: &mut Criterion) {
    let data = generate_store(100, 100);
    let engine = QueryEngine::from_bytes_with_config(data, QueryEngineConfig::no_cache()).unwrap();
    let queries = generate_queries(1000, 100, 100);

    let mut group = c.benchmark_group("query_no_cache");
    group.throughput(Throughput::Elements(queries.len() as u64));

    group.bench_function("mixed_queries", |b| {
        b.iter(|| {
            for &(country, operator, cell, area) in &queries {
                black_box(engine.query(country, operator, cell, area).unwrap());
            }
        })
    });

    group.finish();
}

/// Benchmark query throughput with a warm cache.
fn bench_query_with_cache(c: &mut Criterion) {
    let data = generate_store(100, 100);
    let engine =
        QueryEngine::from_bytes_with_config(data, QueryEngineConfig::with_capacity(10_000))
            .unwrap();
    let queries = generate_queries(1000, 100, 100);

    // Warm up cache
    for &(country, operator, cell, area) in &queries {
        let _ = engine.query(country, operator, cell, area);
    }

    let mut group = c.benchmark_group("query_with_cache");
    group.throughput(Throughput::Elements(queries.len() as u64));

    group.bench_function("cache_hit", |b| {
        b.iter(|| {
            for &(country, operator, cell, area) in &queries {
                black_box(engine.query(country, operator, cell, area).unwrap());
            }
        })
    });

    group.finish();
}

/// Benchmark point vs prefix lookups on the reader.
fn bench_point_vs_prefix(c: &mut Criterion) {
    let data = generate_store(100, 100);
    let reader = BlockStoreReader::from_bytes(data, Schema::cell_towers()).unwrap();

    let mut group = c.benchmark_group("reader_lookup");

    let key = [
        FieldValue::Int(500),
        FieldValue::Int(350),
        FieldValue::Int(262),
        FieldValue::Int(2),
    ];
    group.bench_function("point", |b| b.iter(|| black_box(reader.get(&key).unwrap())));

    group.bench_function("prefix_area_cell", |b| {
        b.iter(|| black_box(reader.get_all(&key[..2]).unwrap()))
    });

    group.bench_function("prefix_area", |b| {
        b.iter(|| black_box(reader.get_all(&key[..1]).unwrap()))
    });

    group.finish();
}

/// Benchmark scalability with different store sizes.
fn bench_scalability(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalability");

    for areas in [10, 100, 1_000].iter() {
        let data = generate_store(*areas, 100);
        let engine =
            QueryEngine::from_bytes_with_config(data, QueryEngineConfig::no_cache()).unwrap();
        let queries = generate_queries(100, *areas, 100);

        group.throughput(Throughput::Elements(queries.len() as u64));
        group.bench_with_input(BenchmarkId::new("areas", areas), areas, |b, _| {
            b.iter(|| {
                for &(country, operator, cell, area) in &queries {
                    black_box(engine.query(country, operator, cell, area).unwrap());
                }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_query_no_cache,
    bench_query_with_cache,
    bench_point_vs_prefix,
    bench_scalability,
);

criterion_main!(benches);
