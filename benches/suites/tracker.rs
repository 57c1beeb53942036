// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

use crate::DEFAULT_PEER_SETS;
use criterion::{Bencher, Criterion};
use raft_progress::{ProgressTracker, Status};

pub fn bench_tracker(c: &mut Criterion) {
    bench_tracker_new(c);
    bench_tracker_add_peer(c);
    bench_tracker_handle_append_response(c);
    bench_tracker_display(c);
}

fn quick_tracker(peers: usize) -> ProgressTracker {
    let logger = raft_progress::default_logger();
    let mut tracker = ProgressTracker::with_capacity(peers, 256, logger);
    (1..=peers as u64).for_each(|id| {
        tracker.add_peer(id, 1, false).ok();
    });
    tracker
}

pub fn bench_tracker_new(c: &mut Criterion) {
    let bench = |peers| {
        move |b: &mut Bencher| {
            let logger = raft_progress::default_logger();
            // No setup.
            b.iter(|| ProgressTracker::with_capacity(peers, 256, logger.clone()));
        }
    };

    DEFAULT_PEER_SETS.iter().for_each(|&peers| {
        c.bench_function(&format!("ProgressTracker::new ({})", peers), bench(peers));
    });
}

pub fn bench_tracker_add_peer(c: &mut Criterion) {
    let bench = |peers| {
        move |b: &mut Bencher| {
            let tracker = quick_tracker(peers);
            b.iter(|| {
                let mut tracker = tracker.clone();
                tracker.add_peer(99, 1, false).ok()
            });
        }
    };
    DEFAULT_PEER_SETS.iter().for_each(|&peers| {
        c.bench_function(
            &format!("ProgressTracker::add_peer ({})", peers),
            bench(peers),
        );
    });
}

pub fn bench_tracker_handle_append_response(c: &mut Criterion) {
    let bench = |peers: usize| {
        move |b: &mut Bencher| {
            let tracker = quick_tracker(peers);
            b.iter(|| {
                let mut tracker = tracker.clone();
                for id in 1..=peers as u64 {
                    tracker.sent_append(id, 1);
                    tracker.handle_append_response(id, 1);
                }
                tracker
            });
        }
    };
    DEFAULT_PEER_SETS.iter().for_each(|&peers| {
        c.bench_function(
            &format!("ProgressTracker::handle_append_response ({})", peers),
            bench(peers),
        );
    });
}

pub fn bench_tracker_display(c: &mut Criterion) {
    let bench = |peers| {
        move |b: &mut Bencher| {
            let tracker = quick_tracker(peers);
            b.iter(|| (tracker.to_string(), Status::new(&tracker)));
        }
    };
    DEFAULT_PEER_SETS.iter().for_each(|&peers| {
        c.bench_function(
            &format!("ProgressTracker::to_string ({})", peers),
            bench(peers),
        );
    });
}
