use std::sync::Arc;

use common::ProductId;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{InventoryOp, InventoryRecord};
use store::{InMemoryInventoryStore, InventoryStore, ReservationBatch};

fn bench_single_reserve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryInventoryStore::with_records([InventoryRecord::new("SKU-1", u32::MAX)]);
    let product = ProductId::new("SKU-1");

    c.bench_function("inventory_store/reserve_single", |b| {
        b.iter(|| {
            rt.block_on(async {
                store
                    .apply(&product, InventoryOp::Reserve(1))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_contended_reserves(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("inventory_store/contended_reserve");

    for tasks in [4usize, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(tasks), &tasks, |b, &tasks| {
            b.iter(|| {
                rt.block_on(async {
                    let store = Arc::new(InMemoryInventoryStore::with_records([
                        InventoryRecord::new("SKU-HOT", 1_000_000),
                    ]));
                    let handles: Vec<_> = (0..tasks)
                        .map(|_| {
                            let store = store.clone();
                            tokio::spawn(async move {
                                let product = ProductId::new("SKU-HOT");
                                for _ in 0..10 {
                                    let _ = store.apply(&product, InventoryOp::Reserve(1)).await;
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.await.unwrap();
                    }
                });
            });
        });
    }

    group.finish();
}

fn bench_batch_reserve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let records = (0..20).map(|i| InventoryRecord::new(format!("SKU-{i}"), u32::MAX));
    let store = InMemoryInventoryStore::with_records(records);
    let batch: ReservationBatch = (0..20)
        .map(|i| (ProductId::new(format!("SKU-{i}")), InventoryOp::Reserve(1)))
        .collect();

    c.bench_function("inventory_store/batch_20_items", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.apply_batch(&batch).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_single_reserve,
    bench_contended_reserves,
    bench_batch_reserve
);
criterion_main!(benches);
