//! Time source abstraction for window computation.
//!
//! The counter store takes explicit `now` values so that window arithmetic
//! is pure; the [`Clock`] trait is what the evaluator and the eviction
//! sweeper use to produce those values. Injecting a [`ManualClock`] makes
//! window-boundary and eviction behavior deterministic under test.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of "time since the Unix epoch".
pub trait Clock: Send + Sync {
    /// Current time as a duration since the Unix epoch.
    fn now(&self) -> Duration;
}

/// The default clock, backed by [`SystemTime`].
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
    }
}

/// A manually advanced clock for tests and hosts with virtual time.
///
/// Cloning shares the underlying instant, so a clone handed to the engine
/// can be advanced from the test body.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at the Unix epoch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at the given offset from the epoch.
    pub fn starting_at(now: Duration) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(now.as_nanos() as u64)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Set the clock to an absolute offset from the epoch.
    pub fn set(&self, now: Duration) {
        self.nanos.store(now.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
