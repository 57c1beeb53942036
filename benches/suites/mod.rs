// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

mod inflights;
pub use self::inflights::*;
mod progress;
pub use self::progress::*;
mod tracker;
pub use self::tracker::*;
