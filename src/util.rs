//! This module contains a collection of various tools to use to manipulate
//! and inspect the progress of raft followers.

// Copyright 2017 PingCAP, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt;
use std::fmt::Write;

use slog::{OwnedKVList, Record, KV};

/// Get the majority number of given nodes count.
///
/// # Examples
///
/// ```
/// use raft_progress::util::majority;
///
/// assert_eq!(majority(1), 1);
/// assert_eq!(majority(4), 3);
/// assert_eq!(majority(5), 3);
/// ```
#[inline]
pub fn majority(total: usize) -> usize {
    (total / 2) + 1
}

struct FormatKeyValueList {
    pub buffer: String,
}

impl slog::Serializer for FormatKeyValueList {
    fn emit_arguments(&mut self, key: slog::Key, val: &fmt::Arguments) -> slog::Result {
        if !self.buffer.is_empty() {
            write!(&mut self.buffer, ", {}: {}", key, val)?;
        } else {
            write!(&mut self.buffer, "{}: {}", key, val)?;
        }
        Ok(())
    }
}

/// Renders the key/value pairs attached to a logger, so they can be carried into a panic.
pub(crate) fn format_kv_list(kv_list: &OwnedKVList) -> String {
    let mut formatter = FormatKeyValueList {
        buffer: "".to_owned(),
    };
    let record = record_static!(slog::Level::Trace, "");
    // Writing into a `String` cannot fail.
    let _ = kv_list.serialize(
        &Record::new(&record, &format_args!(""), b!()),
        &mut formatter,
    );
    formatter.buffer
}
