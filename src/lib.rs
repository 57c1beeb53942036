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

/*!

## Leader-side replication progress

A Raft leader keeps, for every follower it replicates to, a small state
machine describing how far that follower has caught up and how the leader
should talk to it next. This crate is that bookkeeping and nothing else:
storage, transport, elections and snapshot construction live elsewhere.

Each follower is described by a [`Progress`], which is in one of three
[`ProgressState`]s:

* `Probe`: the leader does not know where the follower's log matches its
  own. It sends at most one append at a time until a response narrows the
  match down.
* `Replicate`: the steady state. Appends are pipelined, bounded by the
  follower's [`Inflights`] window.
* `Snapshot`: the follower needs entries the leader has already compacted.
  Replication is paused until the snapshot is reported.

The [`ProgressTracker`] owns every `Progress` of a leader and turns the
responses it receives into state transitions.

```rust
use raft_progress::{default_logger, Action, ProgressState, ProgressTracker};

let mut tracker = ProgressTracker::new(256, default_logger());
tracker.add_peer(2, 1, false).unwrap();

// Probe with the first entry.
assert_eq!(tracker.next_action(2, 1), Action::Append { next_idx: 1 });
tracker.sent_append(2, 1);
assert_eq!(tracker.is_paused(2), Some(true));

// The follower accepts it, so the leader can start pipelining.
assert!(tracker.handle_append_response(2, 1));
assert_eq!(tracker.state(2), Some(ProgressState::Replicate));
assert_eq!(tracker.next_idx(2), Some(2));
```

Every mutation happens on the leader's single processing loop; nothing here
blocks or performs I/O.
*/

#![deny(clippy::all)]
#![deny(missing_docs)]
#![recursion_limit = "128"]

#[macro_use]
extern crate getset;
#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate slog;

macro_rules! fatal {
    ($logger:expr, $msg:expr) => {{
        let owned_kv = ($logger).list();
        let s = crate::util::format_kv_list(&owned_kv);
        if s.is_empty() {
            panic!("{}", $msg)
        } else {
            panic!("{}, {}", $msg, s)
        }
    }};
    ($logger:expr, $fmt:expr, $($arg:tt)+) => {{
        fatal!($logger, format_args!($fmt, $($arg)+))
    }};
}

mod config;
mod errors;
mod status;
mod tracker;
pub mod util;

pub use self::config::Config;
pub use self::errors::{Error, Result};
pub use self::status::{PeerStatus, Status};
pub use self::tracker::{Action, Inflights, Progress, ProgressState, ProgressTracker};

/// A constant represents invalid id of raft.
pub const INVALID_ID: u64 = 0;
/// A constant represents invalid index of raft log.
pub const INVALID_INDEX: u64 = 0;

type DefaultHashBuilder = std::hash::BuildHasherDefault<fxhash::FxHasher>;
type HashMap<K, V> = std::collections::HashMap<K, V, DefaultHashBuilder>;
type HashSet<K> = std::collections::HashSet<K, DefaultHashBuilder>;

pub mod prelude {
    //! A "prelude" for crates using the `raft-progress` crate.
    //!
    //! ```
    //! use raft_progress::prelude::*;
    //! ```

    pub use crate::{Action, Config, Inflights, Progress, ProgressState, ProgressTracker};
}

/// The default logger we fall back to when passed `None` in external facing constructors.
///
/// Currently, this is a terminal drain filtered through `RUST_LOG`, built once and tagged
/// with the name of the running test case, if any.
#[cfg(any(test, feature = "default-logger"))]
pub fn default_logger() -> slog::Logger {
    use slog::Drain;
    use std::sync::{Mutex, OnceLock};

    static LOGGER: OnceLock<slog::Logger> = OnceLock::new();

    let logger = LOGGER.get_or_init(|| {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::CompactFormat::new(decorator).build();
        let drain = slog_envlogger::new(drain);
        slog::Logger::root(Mutex::new(drain).fuse(), o!())
    });
    if let Some(case) = std::thread::current()
        .name()
        .and_then(|v| v.split(':').last())
    {
        logger.new(o!("case" => case.to_string()))
    } else {
        logger.new(o!())
    }
}
