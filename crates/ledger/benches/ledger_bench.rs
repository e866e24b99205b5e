use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use ledger::{ItemId, ItemQuantity, Ledger, OrderStep, SupplierId};

fn step(items: impl IntoIterator<Item = i64>) -> OrderStep {
    OrderStep::new(0, items.into_iter().map(|id| ItemQuantity::new(id, 1)).collect())
}

fn bench_apply_single_item(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = Ledger::new(SupplierId::new(0));
    let single = step([1]);

    c.bench_function("ledger/apply_single_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.apply_step(&single).await.unwrap();
            });
        });
    });
}

fn bench_apply_ten_items(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = Ledger::new(SupplierId::new(0));
    let wide = step(0..10);

    c.bench_function("ledger/apply_ten_items", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.apply_step(&wide).await.unwrap();
            });
        });
    });
}

fn bench_contended_apply(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .unwrap();
    let ledger = Arc::new(Ledger::new(SupplierId::new(0)));
    let shared = Arc::new(step([0, 1, 2]));

    c.bench_function("ledger/contended_apply_8x100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let tasks: Vec<_> = (0..8)
                    .map(|_| {
                        let ledger = ledger.clone();
                        let shared = shared.clone();
                        tokio::spawn(async move {
                            for _ in 0..100 {
                                ledger.apply_step(&shared).await.unwrap();
                            }
                        })
                    })
                    .collect();
                for task in tasks {
                    task.await.unwrap();
                }
            });
        });
    });
}

fn bench_get_quantities(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = Ledger::new(SupplierId::new(0));
    rt.block_on(async {
        ledger.apply_step(&step(0..100)).await.unwrap();
    });
    let ids: Vec<ItemId> = (0..100).map(ItemId::new).collect();

    c.bench_function("ledger/get_quantities_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.get_quantities(&ids).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_apply_single_item,
    bench_apply_ten_items,
    bench_contended_apply,
    bench_get_quantities
);
criterion_main!(benches);
