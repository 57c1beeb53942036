// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

use criterion::{BatchSize, Bencher, BenchmarkId, Criterion};
use raft_progress::Inflights;

pub fn bench_inflights(c: &mut Criterion) {
    bench_inflights_add(c);
    bench_inflights_free_to(c);
    bench_inflights_cycle(c, 256);
    bench_inflights_cycle(c, 4096);
}

pub fn bench_inflights_add(c: &mut Criterion) {
    c.bench_function("Inflights::add", |b: &mut Bencher| {
        b.iter_batched_ref(
            || Inflights::new(256),
            |i| i.add(1),
            BatchSize::PerIteration,
        );
    });
}

pub fn bench_inflights_free_to(c: &mut Criterion) {
    let sizes: Vec<u64> = vec![64, 256, 1024, 4096];
    let mut group = c.benchmark_group("Inflights::free_to");
    for s in sizes {
        for i in vec![1, s / 4, s / 2, s - 1] {
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}@{}", s, i)),
                &(s, i),
                |b: &mut Bencher, (size, free_to)| {
                    let mut inflights = Inflights::new(*size as usize);
                    for i in 0..*size {
                        inflights.add(i);
                    }
                    b.iter_batched_ref(
                        || inflights.clone(),
                        |i| i.free_to(*free_to),
                        BatchSize::PerIteration,
                    );
                },
            );
        }
    }
}

fn bench_inflights_cycle(c: &mut Criterion, capacity: usize) {
    let mut inflights = Inflights::new(capacity);
    let bench = |b: &mut Bencher| {
        b.iter(|| {
            (0..capacity).for_each(|i| inflights.add(i as u64 + 1));
            (0..capacity).for_each(|_| inflights.free_first_one());
        })
    };
    c.bench_function(&format!("Inflights({})", capacity), bench);
}
