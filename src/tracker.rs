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

mod inflights;
mod progress;
mod state;

pub use self::inflights::Inflights;
pub use self::progress::Progress;
pub use self::state::ProgressState;

use std::fmt;

use slog::Logger;

use crate::config::Config;
use crate::errors::{Error, Result};
use crate::util::majority;
use crate::{DefaultHashBuilder, HashMap, HashSet, INVALID_INDEX};

/// What the leader should send to a follower next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing may be sent right now.
    Wait,
    /// Send an append starting at `next_idx`.
    Append {
        /// The first index the append should carry.
        next_idx: u64,
    },
    /// The entries the follower needs are compacted, send a snapshot.
    Snapshot,
}

/// `ProgressTracker` contains the `Progress` of every follower of a leader.
///
/// It is owned by the leader role and mutated from its single processing
/// loop only. Lookups go through the follower id; enumeration in id order is
/// provided for diagnostics and for fan-outs that must be reproducible.
#[derive(Clone, CopyGetters)]
pub struct ProgressTracker {
    progress: HashMap<u64, Progress>,

    /// The capacity of the inflight window given to new followers.
    #[getset(get_copy = "pub")]
    max_inflight: usize,

    pub(crate) logger: Logger,
}

impl ProgressTracker {
    /// Creates a new ProgressTracker.
    pub fn new(max_inflight: usize, logger: Logger) -> Self {
        Self::with_capacity(0, max_inflight, logger)
    }

    /// Create a progress tracker with room for `peers` followers already reserved.
    pub fn with_capacity(peers: usize, max_inflight: usize, logger: Logger) -> Self {
        ProgressTracker {
            progress: HashMap::with_capacity_and_hasher(peers, DefaultHashBuilder::default()),
            max_inflight,
            logger,
        }
    }

    /// Creates a progress tracker from a validated config.
    pub fn with_config(config: &Config, logger: &Logger) -> Result<Self> {
        config.validate()?;
        let logger = logger.new(o!("raft_id" => config.id));
        Ok(Self::new(config.max_inflight_msgs, logger))
    }

    /// Grabs a reference to the progress of a node.
    #[inline]
    pub fn get(&self, id: u64) -> Option<&Progress> {
        self.progress.get(&id)
    }

    /// Grabs a mutable reference to the progress of a node.
    #[inline]
    pub fn get_mut(&mut self, id: u64) -> Option<&mut Progress> {
        self.progress.get_mut(&id)
    }

    /// Starts tracking a node.
    ///
    /// # Errors
    ///
    /// * `id` is tracked already.
    pub fn insert(&mut self, id: u64, pr: Progress) -> Result<()> {
        debug!(self.logger, "Inserting peer with id {id}", id = id);

        if self.progress.contains_key(&id) {
            return Err(Error::Exists(id, "progress"));
        }
        self.progress.insert(id, pr);
        Ok(())
    }

    /// Starts tracking a node in `Probe`, sending from `next_idx`, with the
    /// configured inflight window.
    ///
    /// # Errors
    ///
    /// * `id` is tracked already.
    pub fn add_peer(&mut self, id: u64, next_idx: u64, is_learner: bool) -> Result<()> {
        let mut pr = Progress::new(next_idx, self.max_inflight);
        pr.set_is_learner(is_learner);
        self.insert(id, pr)
    }

    /// Stops tracking a node, returning its last progress.
    pub fn remove(&mut self, id: u64) -> Option<Progress> {
        debug!(self.logger, "Removing peer with id {id}", id = id);
        self.progress.remove(&id)
    }

    /// The number of tracked nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.progress.len()
    }

    /// Whether no node is tracked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.progress.is_empty()
    }

    /// Returns an iterator across all the nodes and their progress, in no particular order.
    ///
    /// **Note:** Replication decisions must not depend on this order.
    #[inline]
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&u64, &Progress)> {
        self.progress.iter()
    }

    /// Returns the ids of all tracked nodes in ascending order.
    pub fn ids_sorted(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.progress.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns an iterator across all the nodes and their progress, ordered by id.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (u64, &Progress)> {
        self.ids_sorted()
            .into_iter()
            .filter_map(move |id| self.progress.get(&id).map(|pr| (id, pr)))
    }

    /// Calls `f` with every node and its progress, ordered by id.
    pub fn for_each_sorted<F>(&mut self, mut f: F)
    where
        F: FnMut(u64, &mut Progress),
    {
        for id in self.ids_sorted() {
            if let Some(pr) = self.progress.get_mut(&id) {
                f(id, pr);
            }
        }
    }

    /// Changes the inflight window of every node, and of the nodes added later.
    ///
    /// # Errors
    ///
    /// * `max_inflight` is 0, which would pause replicating nodes for good.
    pub fn set_max_inflight(&mut self, max_inflight: usize) -> Result<()> {
        if max_inflight == 0 {
            return Err(Error::ConfigInvalid(
                "max inflight messages must be greater than 0".to_owned(),
            ));
        }
        self.max_inflight = max_inflight;
        for pr in self.progress.values_mut() {
            pr.ins_mut().set_cap(max_inflight);
        }
        Ok(())
    }

    /// Releases the inflight buffers of the nodes with nothing in flight.
    ///
    /// Meant to be called periodically, e.g. on ticks, so that idle
    /// followers don't hold on to a full sized window.
    pub fn maybe_free_inflight_buffers(&mut self) {
        for pr in self.progress.values_mut() {
            pr.ins_mut().maybe_free_buffer();
        }
    }

    /// Whether sending to `id` is throttled. `None` if `id` isn't tracked.
    #[inline]
    pub fn is_paused(&self, id: u64) -> Option<bool> {
        self.get(id).map(Progress::is_paused)
    }

    /// The replication state of `id`.
    #[inline]
    pub fn state(&self, id: u64) -> Option<ProgressState> {
        self.get(id).map(Progress::state)
    }

    /// The next index to send to `id`.
    #[inline]
    pub fn next_idx(&self, id: u64) -> Option<u64> {
        self.get(id).map(Progress::next_idx)
    }

    /// The highest index known to be matched on `id`.
    #[inline]
    pub fn matched(&self, id: u64) -> Option<u64> {
        self.get(id).map(Progress::matched)
    }

    fn progress_mut(&mut self, id: u64) -> Option<&mut Progress> {
        let pr = self.progress.get_mut(&id);
        if pr.is_none() {
            debug!(self.logger, "no progress available for {}", id);
        }
        pr
    }

    /// Feeds an acknowledgement of `index` from `id` into its progress.
    /// See [`Progress::maybe_update`].
    pub fn maybe_update(&mut self, id: u64, index: u64) -> bool {
        self.progress_mut(id)
            .map_or(false, |pr| pr.maybe_update(index))
    }

    /// Feeds a rejection of `rejected` from `id` into its progress.
    /// See [`Progress::maybe_decr_to`].
    pub fn maybe_decr_to(&mut self, id: u64, rejected: u64, match_hint: u64) -> bool {
        self.progress_mut(id)
            .map_or(false, |pr| pr.maybe_decr_to(rejected, match_hint))
    }

    /// Clears the outstanding probe of `id`.
    pub fn probe_acked(&mut self, id: u64) {
        if let Some(pr) = self.progress_mut(id) {
            pr.probe_acked();
        }
    }

    /// Records that appends up to `index` are in flight to `id`.
    pub fn optimistic_update(&mut self, id: u64, index: u64) {
        if let Some(pr) = self.progress_mut(id) {
            pr.optimistic_update(index);
        }
    }

    /// Decides what to send to `id`, given the first index the leader's log
    /// still holds.
    pub fn next_action(&self, id: u64, first_index: u64) -> Action {
        let pr = match self.get(id) {
            Some(pr) => pr,
            None => return Action::Wait,
        };
        if pr.is_paused() {
            trace!(
                self.logger,
                "Skipping sending to {to}, it's paused",
                to = id;
                "progress" => %pr,
            );
            return Action::Wait;
        }
        if pr.next_idx() < first_index {
            if !pr.recent_active() {
                debug!(
                    self.logger,
                    "ignore sending snapshot to {} since it is not recently active",
                    id;
                );
                return Action::Wait;
            }
            return Action::Snapshot;
        }
        Action::Append {
            next_idx: pr.next_idx(),
        }
    }

    /// Records that an append with entries up to `last` was sent to `id`.
    pub fn sent_append(&mut self, id: u64, last: u64) {
        if let Some(pr) = self.progress_mut(id) {
            pr.update_state(last);
        }
    }

    /// Records that a snapshot at `snapshot_idx` was sent to `id`. Replication
    /// to `id` is paused until the snapshot is reported.
    pub fn sent_snapshot(&mut self, id: u64, snapshot_idx: u64) {
        if snapshot_idx == INVALID_INDEX {
            fatal!(self.logger, "need non-empty snapshot");
        }
        let logger = &self.logger;
        if let Some(pr) = self.progress.get_mut(&id) {
            pr.become_snapshot(snapshot_idx);
            debug!(
                logger,
                "paused sending replication messages to {}",
                id;
                "progress" => %pr,
            );
        } else {
            debug!(logger, "no progress available for {}", id);
        }
    }

    /// Handles an append accepted by `id` up to `index`.
    ///
    /// Returns true if the progress moved forward, in which case the leader
    /// should try sending more entries to `id`.
    pub fn handle_append_response(&mut self, id: u64, index: u64) -> bool {
        let logger = &self.logger;
        let pr = match self.progress.get_mut(&id) {
            Some(pr) => pr,
            None => {
                debug!(logger, "no progress available for {}", id);
                return false;
            }
        };
        pr.set_recent_active(true);

        if !pr.maybe_update(index) {
            return false;
        }

        match pr.state() {
            ProgressState::Probe => pr.become_replicate(),
            ProgressState::Snapshot => {
                if pr.maybe_snapshot_abort() {
                    debug!(
                        logger,
                        "snapshot aborted, resumed sending replication messages to {from}",
                        from = id;
                        "progress" => %pr,
                    );
                    // Moving through probe makes sure next is past the snapshot.
                    pr.become_probe();
                    pr.become_replicate();
                }
            }
            ProgressState::Replicate => pr.ins_mut().free_to(index),
        }
        true
    }

    /// Handles an append rejected by `id` at `rejected`, with the follower's
    /// `match_hint`.
    ///
    /// Returns true if the rejection was genuine, in which case the leader
    /// should send an append from the lowered `next_idx`.
    pub fn handle_append_rejection(&mut self, id: u64, rejected: u64, match_hint: u64) -> bool {
        let logger = &self.logger;
        let pr = match self.progress.get_mut(&id) {
            Some(pr) => pr,
            None => {
                debug!(logger, "no progress available for {}", id);
                return false;
            }
        };
        pr.set_recent_active(true);

        debug!(
            logger,
            "received msgAppend rejection";
            "hint" => match_hint,
            "from" => id,
            "index" => rejected,
        );

        if !pr.maybe_decr_to(rejected, match_hint) {
            return false;
        }
        debug!(
            logger,
            "decreased progress of {}",
            id;
            "progress" => %pr,
        );
        if pr.state() == ProgressState::Replicate {
            pr.become_probe();
        }
        true
    }

    /// Handles a heartbeat response from `id`. `last_index` is the last index
    /// of the leader's log.
    ///
    /// Returns true if `id` is behind, in which case the leader should send it
    /// an append.
    pub fn handle_heartbeat_response(&mut self, id: u64, last_index: u64) -> bool {
        let pr = match self.progress_mut(id) {
            Some(pr) => pr,
            None => return false,
        };
        pr.set_recent_active(true);
        pr.probe_acked();

        // free one slot for the full inflights window to allow progress.
        if pr.state() == ProgressState::Replicate && pr.ins().full() {
            pr.ins_mut().free_first_one();
        }
        pr.matched() < last_index
    }

    /// Handles the outcome of a snapshot sent to `id`.
    pub fn handle_snapshot_status(&mut self, id: u64, success: bool) {
        let logger = &self.logger;
        let pr = match self.progress.get_mut(&id) {
            Some(pr) => pr,
            None => {
                debug!(logger, "no progress available for {}", id);
                return;
            }
        };
        if pr.state() != ProgressState::Snapshot {
            return;
        }
        if success {
            pr.become_probe();
            debug!(
                logger,
                "snapshot succeeded, resumed sending replication messages to {from}",
                from = id;
                "progress" => %pr,
            );
        } else {
            pr.snapshot_failure();
            pr.become_probe();
            debug!(
                logger,
                "snapshot failed, resumed sending replication messages to {from}",
                from = id;
                "progress" => %pr,
            );
        }
        // If snapshot finish, wait for the append response from the remote node before
        // sending out the next append.
        // If snapshot failure, wait for a heartbeat interval before next try.
        pr.pause();
    }

    /// Handles `id` being reported unreachable by the transport.
    pub fn handle_unreachable(&mut self, id: u64) {
        let logger = &self.logger;
        let pr = match self.progress.get_mut(&id) {
            Some(pr) => pr,
            None => {
                debug!(logger, "no progress available for {}", id);
                return;
            }
        };
        // During optimistic replication, if the remote becomes unreachable,
        // there is huge probability that an append is lost.
        if pr.state() == ProgressState::Replicate {
            pr.become_probe();
        }
        debug!(
            logger,
            "failed to send message to {} because it is unreachable",
            id;
            "progress" => %pr,
        );
    }

    /// Determines if the current quorum is active according to the this raft node.
    /// Doing this will set the `recent_active` of each peer to false.
    ///
    /// Learners are not counted. `perspective_of` is always active, and is
    /// counted as a voter whether it is tracked or not. This should only be
    /// called by the leader.
    pub fn quorum_recently_active(&mut self, perspective_of: u64) -> bool {
        let mut active = HashSet::default();
        let mut voters = 0;
        if !self.progress.contains_key(&perspective_of) {
            voters += 1;
            active.insert(perspective_of);
        }
        for (&id, pr) in self.progress.iter_mut() {
            if pr.is_learner() {
                continue;
            }
            voters += 1;
            if id == perspective_of {
                pr.set_recent_active(true);
                active.insert(id);
            } else if pr.recent_active() {
                active.insert(id);
                pr.set_recent_active(false);
            }
        }
        voters > 0 && active.len() >= majority(voters)
    }
}

impl fmt::Display for ProgressTracker {
    /// One line per node, ordered by id.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, pr) in self.iter_sorted() {
            writeln!(f, "{}: {}", id, pr)?;
        }
        Ok(())
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter_sorted()).finish()
    }
}
