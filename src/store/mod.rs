//! Concurrency-safe window counter store and its eviction.

mod counters;
mod sweeper;

pub use counters::{CounterKey, WindowCounterStore, WindowUsage};
pub use sweeper::{EvictionSweeper, SweeperHandle};

/// Default number of windows a counter may lag behind before eviction.
pub const DEFAULT_GRACE_WINDOWS: u64 = 1;
