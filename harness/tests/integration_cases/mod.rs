// Copyright 2019 TiKV Project Authors. Licensed under Apache-2.0.

mod test_progress;
