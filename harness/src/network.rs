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

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use raft_progress::{Action, ProgressState, ProgressTracker};
use slog::Logger;

use crate::interface::{Follower, LeaderLog, Message, Response};

/// A leader replicating its log to a set of followers over an unreliable network.
///
/// The leader side is driven exclusively through the `ProgressTracker`: it
/// decides what to send, and every response is fed back into it.
pub struct Network {
    /// The leader's tracker.
    pub tracker: ProgressTracker,
    /// The leader's log.
    pub log: LeaderLog,
    leader_id: u64,
    followers: BTreeMap<u64, Follower>,
    msgs: VecDeque<Message>,
    dropm: HashMap<u64, f64>,
    isolated: HashSet<u64>,
    reorder: bool,
    max_msg_entries: usize,
    rng: StdRng,
    logger: Logger,
}

impl Network {
    /// Creates a network where `leader_id` leads `log`.
    ///
    /// Every follower is tracked in `Probe` from the leader's last index plus
    /// one, as a freshly elected leader would. Learners are listed in `learners`.
    pub fn new(
        leader_id: u64,
        log: LeaderLog,
        followers: Vec<(u64, Follower)>,
        learners: &[u64],
        max_inflight: usize,
        logger: &Logger,
    ) -> Network {
        let logger = logger.new(o!("leader" => leader_id));
        let mut tracker = ProgressTracker::with_capacity(
            followers.len() + 1,
            max_inflight,
            logger.new(o!("component" => "tracker")),
        );
        let next = log.last_index() + 1;
        let insert = |tracker: &mut ProgressTracker, id, learner| {
            tracker
                .add_peer(id, next, learner)
                .unwrap_or_else(|e| panic!("failed to add {}: {}", id, e));
        };
        insert(&mut tracker, leader_id, false);
        tracker.maybe_update(leader_id, log.last_index());
        for (id, _) in &followers {
            insert(&mut tracker, *id, learners.contains(id));
        }
        Network {
            tracker,
            log,
            leader_id,
            followers: followers.into_iter().collect(),
            msgs: VecDeque::new(),
            dropm: HashMap::new(),
            isolated: HashSet::new(),
            reorder: false,
            max_msg_entries: usize::MAX,
            rng: StdRng::seed_from_u64(0),
            logger,
        }
    }

    /// Limits the number of entries carried by one append.
    pub fn set_max_msg_entries(&mut self, max: usize) {
        assert!(max > 0, "an append must be able to carry entries");
        self.max_msg_entries = max;
    }

    /// Drops messages to `to` with probability `perc`, using a generator
    /// seeded with `seed` for the whole network.
    pub fn drop(&mut self, to: u64, perc: f64, seed: u64) {
        self.dropm.insert(to, perc);
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Delivers queued messages in a random order.
    pub fn set_reorder(&mut self, reorder: bool) {
        self.reorder = reorder;
    }

    /// Drops every message to `id` and reports it unreachable.
    pub fn isolate(&mut self, id: u64) {
        self.isolated.insert(id);
    }

    /// Recovers the network to normal.
    pub fn recover(&mut self) {
        self.dropm.clear();
        self.isolated.clear();
    }

    /// The follower with `id`.
    pub fn follower(&self, id: u64) -> &Follower {
        &self.followers[&id]
    }

    /// The number of messages waiting for delivery.
    pub fn pending(&self) -> usize {
        self.msgs.len()
    }

    /// Appends `n` entries with `term` to the leader's log.
    pub fn propose(&mut self, term: u64, n: usize) {
        self.log.append(term, n);
        let last = self.log.last_index();
        self.tracker.maybe_update(self.leader_id, last);
    }

    /// Compacts the leader's log up to `to`, so that followers behind it need
    /// a snapshot.
    pub fn compact(&mut self, to: u64) {
        self.log.compact(to);
    }

    /// Sends an append or a snapshot to `to` if the tracker allows it.
    ///
    /// Empty appends are only sent when `allow_empty` is set. Returns true if
    /// a message was queued.
    pub fn send_append(&mut self, to: u64, allow_empty: bool) -> bool {
        match self.tracker.next_action(to, self.log.first_index()) {
            Action::Wait => false,
            Action::Snapshot => {
                let index = self.log.first_index() - 1;
                let term = self.log.term(index);
                self.tracker.sent_snapshot(to, index);
                debug!(self.logger, "sent snapshot"; "to" => to, "index" => index);
                self.msgs.push_back(Message::Snapshot { to, index, term });
                true
            }
            Action::Append { next_idx } => {
                let prev_index = next_idx - 1;
                let prev_term = self.log.term(prev_index);
                let entries = if next_idx > self.log.last_index() {
                    vec![]
                } else {
                    self.log.entries(next_idx, self.max_msg_entries)
                };
                if entries.is_empty() && !allow_empty {
                    return false;
                }
                if let Some(&(last, _)) = entries.last() {
                    self.tracker.sent_append(to, last);
                }
                self.msgs.push_back(Message::Append {
                    to,
                    prev_index,
                    prev_term,
                    entries,
                });
                true
            }
        }
    }

    /// Sends as many messages as the tracker allows to every follower, in id order.
    pub fn broadcast(&mut self) {
        let ids: Vec<u64> = self.followers.keys().cloned().collect();
        for id in ids {
            while self.send_append(id, false) {}
        }
    }

    /// Sends a heartbeat to every reachable follower. Followers that turn out
    /// to be behind are sent an append, even an empty one.
    pub fn heartbeat(&mut self) {
        let ids: Vec<u64> = self.followers.keys().cloned().collect();
        for id in ids {
            if self.isolated.contains(&id) {
                continue;
            }
            if self
                .tracker
                .handle_heartbeat_response(id, self.log.last_index())
            {
                self.send_append(id, true);
            }
        }
    }

    /// Delivers every queued message, feeding the responses back into the
    /// tracker. Returns the number of messages delivered.
    pub fn deliver(&mut self) -> usize {
        let mut msgs: Vec<Message> = self.msgs.drain(..).collect();
        if self.reorder {
            msgs.shuffle(&mut self.rng);
        }
        let mut delivered = 0;
        for m in msgs {
            let to = m.to();
            if self.isolated.contains(&to) {
                self.tracker.handle_unreachable(to);
                self.lost(&m);
                continue;
            }
            let perc = self.dropm.get(&to).cloned().unwrap_or(0f64);
            if perc > 0f64 && self.rng.gen::<f64>() < perc {
                self.lost(&m);
                continue;
            }
            delivered += 1;
            for resp in self.step(m) {
                self.handle_response(resp);
            }
            self.check_invariants();
        }
        delivered
    }

    fn lost(&mut self, m: &Message) {
        debug!(self.logger, "message lost"; "msg" => ?m);
        if let Message::Snapshot { to, .. } = *m {
            self.handle_response(Response::SnapshotStatus {
                from: to,
                success: false,
            });
        }
    }

    fn step(&mut self, m: Message) -> Vec<Response> {
        match m {
            Message::Append {
                to,
                prev_index,
                prev_term,
                entries,
            } => {
                let f = self.followers.get_mut(&to).expect("unknown follower");
                vec![f.handle_append(to, prev_index, prev_term, &entries)]
            }
            Message::Snapshot { to, index, term } => {
                let f = self.followers.get_mut(&to).expect("unknown follower");
                let resp = f.handle_snapshot(to, index, term);
                vec![
                    Response::SnapshotStatus {
                        from: to,
                        success: true,
                    },
                    resp,
                ]
            }
        }
    }

    fn handle_response(&mut self, resp: Response) {
        match resp {
            Response::Accepted { from, index } => {
                if self.tracker.handle_append_response(from, index) {
                    while self.send_append(from, false) {}
                }
            }
            Response::Rejected {
                from,
                rejected,
                hint,
            } => {
                if self.tracker.handle_append_rejection(from, rejected, hint) {
                    self.send_append(from, false);
                }
            }
            Response::SnapshotStatus { from, success } => {
                self.tracker.handle_snapshot_status(from, success)
            }
        }
    }

    /// Panics if the tracker believes something the followers contradict.
    pub fn check_invariants(&self) {
        for (&id, f) in &self.followers {
            let pr = self.tracker.get(id).expect("follower is tracked");
            assert!(
                pr.matched() < pr.next_idx(),
                "{}: match must stay below next, {}",
                id,
                pr
            );
            assert!(
                pr.matched() <= f.last_index() && f.matches_up_to(&self.log, pr.matched()),
                "{}: {} but the follower log diverges",
                id,
                pr
            );
            assert!(pr.ins().count() <= pr.ins().cap(), "{}: {}", id, pr);
            match pr.state() {
                ProgressState::Snapshot => assert!(pr.pending_snapshot() > 0, "{}: {}", id, pr),
                _ => assert_eq!(pr.pending_snapshot(), 0, "{}: {}", id, pr),
            }
        }
    }

    /// Heartbeats, broadcasts and delivers until nothing is in flight.
    pub fn round(&mut self) {
        self.heartbeat();
        self.broadcast();
        while !self.msgs.is_empty() {
            self.deliver();
        }
        self.tracker.maybe_free_inflight_buffers();
    }

    /// Whether every follower holds the leader's log and is replicating.
    pub fn is_converged(&self) -> bool {
        let last = self.log.last_index();
        self.followers.iter().all(|(&id, f)| {
            self.tracker.matched(id) == Some(last)
                && self.tracker.state(id) == Some(ProgressState::Replicate)
                && f.last_index() == last
                && f.matches_up_to(&self.log, last)
        })
    }

    /// Runs rounds until converged, returning the number of rounds used, or
    /// `None` if `max_rounds` were not enough.
    pub fn run_until_converged(&mut self, max_rounds: usize) -> Option<usize> {
        for i in 0..max_rounds {
            if self.is_converged() {
                return Some(i);
            }
            self.round();
        }
        if self.is_converged() {
            Some(max_rounds)
        } else {
            None
        }
    }
}
