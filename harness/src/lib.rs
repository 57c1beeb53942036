// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

/*!

This module contains testing harness utilities for the replication progress tracker.

A [`Network`] plays the leader: it owns a [`LeaderLog`] and a
`ProgressTracker`, and talks to a set of simulated [`Follower`]s. Messages
can be dropped or reordered to exercise the recovery paths of the tracker.

*/

#![deny(missing_docs)]

#[macro_use]
extern crate slog;

mod interface;
mod network;

pub use self::{
    interface::{Entry, Follower, LeaderLog, Message, Response},
    network::Network,
};
