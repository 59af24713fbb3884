//! Benchmarks for namespaced key-value operations

use std::ops::ControlFlow;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use kvmux::{Config, KeyValue, PutOptions, Store};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Store {
    Store::open_with(
        Config::builder()
            .data_dir(dir.path())
            .auto_merge_interval(None)
            .build(),
    )
    .unwrap()
}

fn kv_benchmarks(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    let store = open_store(&temp);
    let kv = store.kv("bench");

    let value = vec![0xabu8; 128];
    for i in 0..10_000 {
        kv.put(PutOptions {
            key: &format!("key{:06}", i),
            data: &value,
            replace: true,
        })
        .unwrap();
    }

    let mut counter = 0u64;
    c.bench_function("put_replace", |b| {
        b.iter(|| {
            counter += 1;
            let key = format!("key{:06}", counter % 10_000);
            kv.put(PutOptions {
                key: &key,
                data: &value,
                replace: true,
            })
            .unwrap();
        })
    });

    let mut i = 0u64;
    c.bench_function("get", |b| {
        b.iter(|| {
            i = (i + 7919) % 10_000;
            black_box(kv.get(&format!("key{:06}", i)).unwrap());
        })
    });

    c.bench_function("list_100", |b| {
        b.iter(|| {
            let mut n = 0;
            kv.list("key005000", &mut |key: &str| -> kvmux::Result<ControlFlow<()>> {
                black_box(key);
                n += 1;
                Ok(if n == 100 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            })
            .unwrap();
        })
    });

    c.bench_function("merge_after_rewrite", |b| {
        b.iter_batched(
            || {
                for i in 0..1_000 {
                    kv.put(PutOptions {
                        key: &format!("key{:06}", i),
                        data: &value,
                        replace: true,
                    })
                    .unwrap();
                }
            },
            |_| store.engine().merge().unwrap(),
            BatchSize::PerIteration,
        )
    });

    store.close().unwrap();
}

criterion_group!(benches, kv_benchmarks);
criterion_main!(benches);
