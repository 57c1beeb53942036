// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

use std::{cmp, result};

quick_error! {
    /// The base error type for the progress tracker.
    ///
    /// The replication state machine itself never fails; stale responses are
    /// reported as `false`. Errors only come from configuring the tracker and
    /// from changing or exporting its membership.
    #[derive(Debug)]
    pub enum Error {
        /// The configuration is invalid.
        ConfigInvalid(desc: String) {
            display("{}", desc)
        }
        /// The node exists, but should not.
        Exists(id: u64, set: &'static str) {
            display("The node {} already exists in the {} set.", id, set)
        }
        /// The status could not be encoded.
        Json(err: serde_json::Error) {
            from()
            cause(err)
            display("json error {:?}", err)
        }
    }
}

impl cmp::PartialEq for Error {
    #[allow(clippy::match_same_arms)]
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (&Error::ConfigInvalid(ref e1), &Error::ConfigInvalid(ref e2)) => e1 == e2,
            (&Error::Exists(id1, set1), &Error::Exists(id2, set2)) => id1 == id2 && set1 == set2,
            _ => false,
        }
    }
}

/// A result type that wraps up the progress tracker errors.
pub type Result<T> = result::Result<T, Error>;
