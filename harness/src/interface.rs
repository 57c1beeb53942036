// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

use std::cmp;

/// A log entry, as `(index, term)`.
pub type Entry = (u64, u64);

/// A message sent by the leader.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Append `entries` after `prev_index`, which must have `prev_term`.
    Append {
        /// The receiver.
        to: u64,
        /// The index right before the first entry.
        prev_index: u64,
        /// The term of `prev_index` in the leader's log.
        prev_term: u64,
        /// The entries to append, possibly none.
        entries: Vec<Entry>,
    },
    /// Replace the receiver's log with a snapshot.
    Snapshot {
        /// The receiver.
        to: u64,
        /// The last index covered by the snapshot.
        index: u64,
        /// The term of `index`.
        term: u64,
    },
}

impl Message {
    /// The receiver of the message.
    pub fn to(&self) -> u64 {
        match *self {
            Message::Append { to, .. } | Message::Snapshot { to, .. } => to,
        }
    }
}

/// A response to the leader.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// The follower's log matches the leader's up to `index`.
    Accepted {
        /// The sender.
        from: u64,
        /// The last index known to match.
        index: u64,
    },
    /// The follower does not hold `rejected` with the expected term.
    Rejected {
        /// The sender.
        from: u64,
        /// The `prev_index` of the rejected append.
        rejected: u64,
        /// Where the follower suggests the leader should go back to.
        hint: u64,
    },
    /// The transport reports the outcome of sending a snapshot.
    SnapshotStatus {
        /// The receiver of the snapshot.
        from: u64,
        /// Whether it was delivered.
        success: bool,
    },
}

/// The leader's log. Only terms are kept; entries below `first_index` are
/// considered compacted into a snapshot.
#[derive(Debug, Clone, Default)]
pub struct LeaderLog {
    first_index: u64,
    terms: Vec<u64>,
}

impl LeaderLog {
    /// Creates a log holding one entry per term in `terms`, starting at index 1.
    pub fn new(terms: Vec<u64>) -> LeaderLog {
        LeaderLog {
            first_index: 1,
            terms,
        }
    }

    /// The first index still available for appends.
    pub fn first_index(&self) -> u64 {
        self.first_index
    }

    /// The last index of the log.
    pub fn last_index(&self) -> u64 {
        self.terms.len() as u64
    }

    /// The term of `index`, 0 for index 0.
    pub fn term(&self, index: u64) -> u64 {
        if index == 0 {
            return 0;
        }
        self.terms[index as usize - 1]
    }

    /// Returns at most `max` entries starting at `lo`.
    pub fn entries(&self, lo: u64, max: usize) -> Vec<Entry> {
        assert!(lo >= self.first_index, "{} is compacted", lo);
        let hi = cmp::min(self.last_index(), lo.saturating_add(max as u64 - 1));
        (lo..=hi).map(|i| (i, self.term(i))).collect()
    }

    /// Appends `n` entries with `term`.
    pub fn append(&mut self, term: u64, n: usize) {
        self.terms.extend(std::iter::repeat(term).take(n));
    }

    /// Compacts every entry up to and including `to`.
    pub fn compact(&mut self, to: u64) {
        assert!(to <= self.last_index(), "compact {} is out of bound", to);
        self.first_index = cmp::max(self.first_index, to + 1);
    }
}

/// A simulated follower.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Follower {
    snap_index: u64,
    snap_term: u64,
    // terms of the entries after the snapshot
    terms: Vec<u64>,
}

impl Follower {
    /// Creates a follower holding one entry per term in `terms`, starting at index 1.
    pub fn with_log(terms: Vec<u64>) -> Follower {
        Follower {
            snap_index: 0,
            snap_term: 0,
            terms,
        }
    }

    /// The last index of the follower's log.
    pub fn last_index(&self) -> u64 {
        self.snap_index + self.terms.len() as u64
    }

    /// The index of the last installed snapshot.
    pub fn snap_index(&self) -> u64 {
        self.snap_index
    }

    /// The term of `index`, `None` if unknown or compacted.
    pub fn term(&self, index: u64) -> Option<u64> {
        if index == self.snap_index {
            return Some(self.snap_term);
        }
        if index < self.snap_index || index > self.last_index() {
            return None;
        }
        Some(self.terms[(index - self.snap_index - 1) as usize])
    }

    /// Whether the log holds exactly the entries of `leader`.
    pub fn matches(&self, leader: &LeaderLog) -> bool {
        self.matches_up_to(leader, leader.last_index()) && self.last_index() == leader.last_index()
    }

    /// Whether the log agrees with `leader` on every index up to `index`.
    pub fn matches_up_to(&self, leader: &LeaderLog, index: u64) -> bool {
        if index > self.last_index() {
            return false;
        }
        if index <= self.snap_index {
            // Snapshots only ever carry committed state.
            return self.snap_term == leader.term(self.snap_index);
        }
        self.snap_term == leader.term(self.snap_index)
            && (self.snap_index + 1..=index).all(|i| self.term(i) == Some(leader.term(i)))
    }

    /// Handles an append, returning the response for `id`.
    pub fn handle_append(
        &mut self,
        id: u64,
        prev_index: u64,
        prev_term: u64,
        entries: &[Entry],
    ) -> Response {
        if prev_index < self.snap_index {
            return Response::Accepted {
                from: id,
                index: self.snap_index,
            };
        }
        if self.term(prev_index) != Some(prev_term) {
            return Response::Rejected {
                from: id,
                rejected: prev_index,
                hint: cmp::min(prev_index, self.last_index()),
            };
        }
        for &(index, term) in entries {
            if self.term(index) == Some(term) {
                continue;
            }
            // conflict or new entry, drop everything from here on
            self.terms.truncate((index - self.snap_index - 1) as usize);
            self.terms.push(term);
        }
        Response::Accepted {
            from: id,
            index: prev_index + entries.len() as u64,
        }
    }

    /// Installs a snapshot, returning the response for `id`.
    pub fn handle_snapshot(&mut self, id: u64, index: u64, term: u64) -> Response {
        if index > self.snap_index {
            self.snap_index = index;
            self.snap_term = term;
            self.terms.clear();
        }
        Response::Accepted {
            from: id,
            index: self.snap_index,
        }
    }
}
