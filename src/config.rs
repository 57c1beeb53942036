// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

use super::{
    errors::{Error, Result},
    INVALID_ID,
};

/// Config contains the parameters to build a progress tracker.
#[derive(Clone, Debug)]
pub struct Config {
    /// The identity of the local raft, i.e. the leader owning the tracker. It cannot be 0.
    pub id: u64,

    /// Limit the max number of in-flight append messages during optimistic
    /// replication phase. The application transportation layer usually has its own sending
    /// buffer over TCP/UDP. Set to avoid overflowing that sending buffer.
    pub max_inflight_msgs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: 0,
            max_inflight_msgs: 256,
        }
    }
}

impl Config {
    /// Creates a new config.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Runs validations against the config.
    pub fn validate(&self) -> Result<()> {
        if self.id == INVALID_ID {
            return Err(Error::ConfigInvalid("invalid node id".to_owned()));
        }

        if self.max_inflight_msgs == 0 {
            return Err(Error::ConfigInvalid(
                "max inflight messages must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }
}
