// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

use serde::Serialize;

use crate::errors::Result;
use crate::{Progress, ProgressState, ProgressTracker};

/// The replication state of one follower, as exported for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerStatus {
    /// The follower id.
    pub id: u64,
    /// The replication state.
    pub state: ProgressState,
    /// The highest index matched on the follower.
    pub matched: u64,
    /// The next index to send.
    pub next_idx: u64,
    /// Whether the follower is a learner.
    pub is_learner: bool,
    /// Whether sending to the follower is throttled.
    pub paused: bool,
    /// The index of the snapshot in flight, 0 if none.
    pub pending_snapshot: u64,
    /// Whether the follower was heard from recently.
    pub recent_active: bool,
    /// The number of appends in flight.
    pub inflight: usize,
}

impl PeerStatus {
    fn new(id: u64, pr: &Progress) -> Self {
        PeerStatus {
            id,
            state: pr.state(),
            matched: pr.matched(),
            next_idx: pr.next_idx(),
            is_learner: pr.is_learner(),
            paused: pr.is_paused(),
            pending_snapshot: pr.pending_snapshot(),
            recent_active: pr.recent_active(),
            inflight: pr.ins().count(),
        }
    }
}

/// A point in time view of a tracker, ordered by follower id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Status {
    /// One entry per follower.
    pub progress: Vec<PeerStatus>,
}

impl Status {
    /// Captures the current state of `tracker`.
    pub fn new(tracker: &ProgressTracker) -> Status {
        Status {
            progress: tracker
                .iter_sorted()
                .map(|(id, pr)| PeerStatus::new(id, pr))
                .collect(),
        }
    }

    /// Encodes the status as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
