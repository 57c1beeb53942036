// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

use criterion::{BatchSize, Bencher, Criterion};
use raft_progress::Progress;

pub fn bench_progress(c: &mut Criterion) {
    bench_progress_default(c);
    bench_progress_replicate(c);
}

pub fn bench_progress_default(c: &mut Criterion) {
    let bench = |b: &mut Bencher| {
        b.iter(|| Progress::new(9, 10));
    };

    c.bench_function("Progress::default", bench);
}

// Pipeline a full window, then acknowledge it.
pub fn bench_progress_replicate(c: &mut Criterion) {
    c.bench_function("Progress::replicate(256)", |b: &mut Bencher| {
        b.iter_batched_ref(
            || {
                let mut pr = Progress::new(1, 256);
                pr.become_replicate();
                pr
            },
            |pr| {
                for last in 1..=256 {
                    pr.update_state(last);
                }
                pr.maybe_update(256)
            },
            BatchSize::SmallInput,
        );
    });
}
