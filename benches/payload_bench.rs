use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use payload::{normalize, CatalogPayload, PayloadChunker};
use serde_json::{json, Value};
use std::hint::black_box;

fn legacy_catalog(items: usize) -> CatalogPayload {
    let items: Vec<Value> = (0..items)
        .map(|i| {
            json!({
                "DocumentId": format!("product://{i:06}"),
                "ObjectType": "Product",
                "ec_name": format!("Product {i}"),
                "ec_description": "Lightweight trail running shoe with a recycled mesh upper",
                "ec_price": 49.99,
                "ec_category": ["Shoes", "Shoes|Running"]
            })
        })
        .collect();
    CatalogPayload::from_value(json!({ "AddOrUpdate": items, "Delete": ["product://old"] }))
        .expect("catalog fixture is an object")
}

/// Legacy casing rewrite at several catalog sizes
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for items in [100, 1_000, 10_000] {
        let payload = legacy_catalog(items);
        group.throughput(Throughput::Elements(items as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), &payload, |b, payload| {
            b.iter(|| normalize(black_box(payload.clone())).expect("fixture is valid"));
        });
    }

    group.finish();
}

/// Splitting a payload into roughly ten chunks
fn bench_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunk");

    for items in [1_000, 10_000] {
        let payload = legacy_catalog(items);
        let total = payload.serialized_len().expect("fixture serializes");
        let chunker = PayloadChunker::new(total / 10);

        group.throughput(Throughput::Bytes(total as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), &payload, |b, payload| {
            b.iter(|| chunker.chunk(black_box(payload.clone())).expect("fixture chunks"));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_normalize, bench_chunk);
criterion_main!(benches);
