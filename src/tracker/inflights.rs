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

use std::cmp::Ordering;
use std::collections::VecDeque;

/// A bounded window of inflight append messages.
///
/// Each entry is the index of the last log entry carried by one message that
/// has been sent to a follower but not acknowledged yet. Entries are added in
/// log order, so the window is always sorted, oldest first.
#[derive(Debug, PartialEq, Clone)]
pub struct Inflights {
    // last index of every outstanding message, oldest first
    buffer: VecDeque<u64>,

    // capacity
    cap: usize,

    // a smaller capacity that takes effect once the window has drained
    incoming_cap: Option<usize>,
}

impl Inflights {
    /// Creates a new window holding at most `cap` messages.
    ///
    /// The buffer is allocated on the first `add`.
    pub fn new(cap: usize) -> Inflights {
        Inflights {
            buffer: VecDeque::new(),
            cap,
            incoming_cap: None,
        }
    }

    /// Adjusts the capacity of the window.
    ///
    /// Growing takes effect at once. Shrinking below the number of messages
    /// currently in flight is deferred: the window reports full until it holds
    /// fewer messages than the new capacity, and the new capacity replaces the
    /// old one when the window drains or is reset.
    pub fn set_cap(&mut self, incoming_cap: usize) {
        match self.cap.cmp(&incoming_cap) {
            Ordering::Equal => self.incoming_cap = None,
            Ordering::Less => {
                if self.buffer.capacity() > 0 {
                    self.buffer.reserve(incoming_cap - self.buffer.len());
                }
                self.cap = incoming_cap;
                self.incoming_cap = None;
            }
            Ordering::Greater => {
                if self.buffer.len() <= incoming_cap {
                    self.cap = incoming_cap;
                    self.incoming_cap = None;
                    self.buffer.shrink_to(incoming_cap);
                } else {
                    self.incoming_cap = Some(incoming_cap);
                }
            }
        }
    }

    /// Returns true if no more messages may be sent.
    #[inline]
    pub fn full(&self) -> bool {
        let count = self.buffer.len();
        count == self.cap || self.incoming_cap.map_or(false, |cap| count >= cap)
    }

    /// Records `inflight` as the last index of a newly sent message.
    ///
    /// `inflight` must be greater than every index still in the window.
    pub fn add(&mut self, inflight: u64) {
        if self.full() {
            panic!("cannot add into a full inflights")
        }
        debug_assert!(self.buffer.back().map_or(true, |&last| last < inflight));

        if self.buffer.capacity() == 0 {
            self.buffer.reserve_exact(self.cap);
        }
        self.buffer.push_back(inflight);
    }

    /// Frees every inflight smaller or equal to `to`, oldest first.
    pub fn free_to(&mut self, to: u64) {
        while let Some(&first) = self.buffer.front() {
            if to < first {
                // found the first larger inflight
                break;
            }
            self.buffer.pop_front();
        }

        if self.buffer.is_empty() {
            if let Some(incoming_cap) = self.incoming_cap.take() {
                self.cap = incoming_cap;
                self.buffer = VecDeque::new();
            }
        }
    }

    /// Frees the oldest inflight.
    #[inline]
    pub fn free_first_one(&mut self) {
        if let Some(&first) = self.buffer.front() {
            self.free_to(first);
        }
    }

    /// Frees all inflights.
    #[inline]
    pub fn reset(&mut self) {
        self.buffer = VecDeque::new();
        self.cap = self.incoming_cap.take().unwrap_or(self.cap);
    }

    /// Number of inflight messages.
    #[inline]
    pub fn count(&self) -> usize {
        self.buffer.len()
    }

    /// The maximum number of inflight messages.
    #[inline]
    pub fn cap(&self) -> usize {
        self.cap
    }

    // Capacity of the internal buffer. It's for tests.
    #[doc(hidden)]
    #[inline]
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Releases the buffer if nothing is in flight.
    #[inline]
    pub fn maybe_free_buffer(&mut self) {
        if self.buffer.is_empty() {
            self.buffer = VecDeque::new();
        }
    }
}
