// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

// Copyright 2015 The etcd Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::{Inflights, ProgressState};
use std::{cmp, fmt};

/// A follower's progress in the view of the leader.
///
/// The leader keeps one `Progress` per follower and sends entries to the
/// follower based on it. The state only changes through the `become_*`
/// transitions; the remaining methods feed responses and sends back into it.
#[derive(Debug, Clone, PartialEq, Getters, CopyGetters, Setters)]
pub struct Progress {
    /// How much state is matched.
    #[getset(get_copy = "pub")]
    matched: u64,
    /// The next index to send.
    #[getset(get_copy = "pub")]
    next_idx: u64,
    /// When in ProgressStateProbe, leader sends at most one replication message
    /// per heartbeat interval. It also probes actual progress of the follower.
    ///
    /// When in ProgressStateReplicate, leader optimistically increases next
    /// to the latest entry sent after sending replication message. This is
    /// an optimized state for fast replicating log entries to the follower.
    ///
    /// When in ProgressStateSnapshot, leader should have sent out snapshot
    /// before and stop sending any replication message.
    #[getset(get_copy = "pub")]
    state: ProgressState,
    /// This field is used in ProgressStateSnapshot.
    /// If there is a pending snapshot, the pendingSnapshot will be set to the
    /// index of the snapshot. If pendingSnapshot is set, the replication process of
    /// this Progress will be paused. raft will not resend snapshot until the pending one
    /// is reported to be failed.
    #[getset(get_copy = "pub")]
    pending_snapshot: u64,
    /// This is true if the progress is recently active. Receiving any messages
    /// from the corresponding follower indicates the progress is active.
    /// RecentActive can be reset to false after an election timeout.
    #[getset(get_copy = "pub", set = "pub")]
    recent_active: bool,
    /// Used in ProgressStateProbe. While a probe is unacknowledged, raft
    /// should pause sending replication messages to this peer.
    #[getset(get_copy = "pub")]
    probe_sent: bool,
    /// Whether the peer is a learner. It has no effect on the transitions.
    #[getset(get_copy = "pub", set = "pub")]
    is_learner: bool,
    /// Inflights is a sliding window for the inflight messages.
    /// When inflights is full, no more message should be sent.
    /// When a leader sends out a message, the index of the last
    /// entry should be added to inflights. The index MUST be added
    /// into inflights in order.
    /// When a leader receives a reply, the previous inflights should
    /// be freed by calling inflights.free_to.
    #[getset(get = "pub")]
    ins: Inflights,
}

impl Progress {
    /// Creates a new progress in `Probe` that will send from `next_idx`.
    pub fn new(next_idx: u64, ins_size: usize) -> Self {
        assert!(next_idx >= 1, "next index must be positive, got {}", next_idx);
        Progress {
            matched: 0,
            next_idx,
            state: ProgressState::default(),
            pending_snapshot: 0,
            recent_active: false,
            probe_sent: false,
            is_learner: false,
            ins: Inflights::new(ins_size),
        }
    }

    #[inline]
    pub(crate) fn ins_mut(&mut self) -> &mut Inflights {
        &mut self.ins
    }

    fn reset_state(&mut self, state: ProgressState) {
        self.probe_sent = false;
        self.pending_snapshot = 0;
        self.state = state;
        self.ins.reset();
    }

    /// Changes the progress to a probe.
    pub fn become_probe(&mut self) {
        // If the original state is ProgressStateSnapshot, progress knows that
        // the pending snapshot has been sent to this peer successfully, then
        // probes from pendingSnapshot + 1.
        if self.state == ProgressState::Snapshot {
            let pending_snapshot = self.pending_snapshot;
            self.reset_state(ProgressState::Probe);
            self.next_idx = cmp::max(self.matched + 1, pending_snapshot + 1);
        } else {
            self.reset_state(ProgressState::Probe);
            self.next_idx = self.matched + 1;
        }
    }

    /// Changes the progress to a Replicate.
    #[inline]
    pub fn become_replicate(&mut self) {
        self.reset_state(ProgressState::Replicate);
        self.next_idx = self.matched + 1;
    }

    /// Changes the progress to a snapshot.
    #[inline]
    pub fn become_snapshot(&mut self, snapshot_idx: u64) {
        self.reset_state(ProgressState::Snapshot);
        self.pending_snapshot = snapshot_idx;
    }

    /// Sets the snapshot to failure.
    #[inline]
    pub fn snapshot_failure(&mut self) {
        self.pending_snapshot = 0;
    }

    /// Returns true if the follower already holds everything the pending snapshot
    /// would bring, so the snapshot can be abandoned.
    #[inline]
    pub fn maybe_snapshot_abort(&self) -> bool {
        self.state == ProgressState::Snapshot && self.matched >= self.pending_snapshot
    }

    /// Returns false if the given n index comes from an outdated message.
    /// Otherwise it updates the progress and returns true.
    pub fn maybe_update(&mut self, n: u64) -> bool {
        let need_update = self.matched < n;
        if need_update {
            self.matched = n;
            self.probe_acked();
        }

        self.next_idx = cmp::max(self.next_idx, n + 1);
        need_update
    }

    /// Signals that appends all the way up to and including index `n` are in flight.
    #[inline]
    pub fn optimistic_update(&mut self, n: u64) {
        self.next_idx = n + 1;
    }

    /// Adjusts the progress to the receipt of an append rejection. `rejected` is
    /// the index the follower refused and `match_hint` the index it suggests the
    /// leader should go back to.
    ///
    /// Rejections can happen spuriously as messages are sent out of order or
    /// duplicated. Such a rejection pertains to an index the progress already
    /// knows about, and false is returned without changing anything.
    ///
    /// If the rejection is genuine, `next_idx` is lowered sensibly, the progress
    /// is cleared for sending and true is returned.
    pub fn maybe_decr_to(&mut self, rejected: u64, match_hint: u64) -> bool {
        if self.state == ProgressState::Replicate {
            // the rejection must be stale if the progress has matched and "rejected"
            // is smaller than "match".
            if rejected <= self.matched {
                return false;
            }
            // Directly decrease next to match + 1, the hint is not used to go
            // further back.
            self.next_idx = self.matched + 1;
            return true;
        }

        // The rejection must be stale if "rejected" does not match next - 1,
        // as non-replicating followers are probed one entry at a time.
        if self.next_idx - 1 != rejected {
            return false;
        }

        self.next_idx = cmp::max(cmp::min(rejected, match_hint.saturating_add(1)), 1);
        self.probe_sent = false;
        true
    }

    /// Called when this peer has accepted an append. The next probe may be sent
    /// without further delay.
    #[inline]
    pub fn probe_acked(&mut self) {
        self.probe_sent = false;
    }

    /// Holds back the next probe until the peer responds again.
    #[inline]
    pub(crate) fn pause(&mut self) {
        self.probe_sent = true;
    }

    /// Determine whether sending log entries to this node is throttled.
    ///
    /// That is the case while a probe is outstanding, while a snapshot is
    /// pending, or once the inflight window is full.
    #[inline]
    pub fn is_paused(&self) -> bool {
        match self.state {
            ProgressState::Probe => self.probe_sent,
            ProgressState::Replicate => self.ins.full(),
            ProgressState::Snapshot => true,
        }
    }

    /// Records that an append carrying entries up to `last` was sent.
    pub fn update_state(&mut self, last: u64) {
        match self.state {
            ProgressState::Replicate => {
                self.optimistic_update(last);
                self.ins.add(last);
            }
            ProgressState::Probe => self.pause(),
            ProgressState::Snapshot => panic!(
                "updating progress state in unhandled state {:?}",
                self.state
            ),
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} match={} next={}",
            self.state, self.matched, self.next_idx
        )?;
        if self.is_learner {
            write!(f, " learner")?;
        }
        if self.is_paused() {
            write!(f, " paused")?;
        }
        if self.pending_snapshot > 0 {
            write!(f, " pendingSnap={}", self.pending_snapshot)?;
        }
        if !self.recent_active {
            write!(f, " inactive")?;
        }
        let n = self.ins.count();
        if n > 0 {
            write!(f, " inflight={}", n)?;
            if self.ins.full() {
                write!(f, "[full]")?;
            }
        }
        Ok(())
    }
}
