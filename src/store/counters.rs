//! Per-key fixed-window counting state.

use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::error::{Result, TurnstileError};
use crate::rules::LimiterKind;

use super::DEFAULT_GRACE_WINDOWS;

/// A key that uniquely identifies one counter.
///
/// Composed of the rule name and the resolved discriminator value, so two
/// rules partitioned by the same discriminator never share state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    /// The rule this counter belongs to
    pub rule: String,
    /// The resolved discriminator value
    pub discriminator: String,
}

impl CounterKey {
    /// Create a new counter key.
    pub fn new(rule: &str, discriminator: &str) -> Self {
        Self {
            rule: rule.to_string(),
            discriminator: discriminator.to_string(),
        }
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.rule, self.discriminator)
    }
}

/// Counting state for one key.
///
/// One variant per limiting algorithm, mirroring
/// [`LimiterKind`](crate::rules::LimiterKind).
#[derive(Debug, Clone)]
enum WindowState {
    FixedWindow {
        /// Index of the window the count belongs to (`now / window`)
        window_index: u64,
        /// Requests counted within that window
        count: u64,
        /// Window duration, kept so the eviction sweep can judge staleness
        window: Duration,
    },
}

/// Outcome of one counted request against one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUsage {
    /// The count after this request's increment
    pub count: u64,
    /// Time left until the current window ends
    pub window_remaining: Duration,
}

/// Concurrency-safe mapping from (rule, discriminator value) to counting
/// state.
///
/// Backed by a sharded map: updates take exclusive access to a single key's
/// entry, never a store-wide lock, so hot keys do not convoy unrelated ones.
/// Entries are created lazily on first increment and removed by
/// [`sweep`](WindowCounterStore::sweep) once stale beyond the grace period.
#[derive(Debug)]
pub struct WindowCounterStore {
    counters: DashMap<CounterKey, WindowState>,
    grace_windows: u64,
}

impl WindowCounterStore {
    /// Create a store with the default eviction grace of one window.
    pub fn new() -> Self {
        Self::with_grace_windows(DEFAULT_GRACE_WINDOWS)
    }

    /// Create a store that keeps counters for `grace_windows` expired
    /// windows before the sweep removes them.
    pub fn with_grace_windows(grace_windows: u64) -> Self {
        Self {
            counters: DashMap::new(),
            grace_windows,
        }
    }

    /// Atomically count one request against a key and report the usage.
    ///
    /// Determines the window index for `now`, resets the count if the stored
    /// index differs, increments, and returns the new count together with
    /// the time remaining in the window. The whole update happens under the
    /// key's exclusive entry guard, so N concurrent calls produce exactly N
    /// increments.
    ///
    /// A request arriving exactly on a window boundary belongs to the new
    /// window.
    pub fn increment_and_check(
        &self,
        rule: &str,
        discriminator: &str,
        limiter: &LimiterKind,
        now: Duration,
    ) -> Result<WindowUsage> {
        match limiter {
            LimiterKind::FixedWindow { window, .. } => {
                self.increment_fixed_window(rule, discriminator, *window, now)
            }
        }
    }

    fn increment_fixed_window(
        &self,
        rule: &str,
        discriminator: &str,
        window: Duration,
        now: Duration,
    ) -> Result<WindowUsage> {
        let window_nanos = window.as_nanos();
        if window_nanos == 0 {
            // Sealed catalogs validate this; guard against hand-built params.
            return Err(TurnstileError::InternalStore(format!(
                "zero window duration for rule '{}'",
                rule
            )));
        }

        let now_nanos = now.as_nanos();
        let index = (now_nanos / window_nanos) as u64;
        let window_remaining =
            Duration::from_nanos(((index as u128 + 1) * window_nanos - now_nanos) as u64);

        let key = CounterKey::new(rule, discriminator);
        let mut entry = self
            .counters
            .entry(key)
            .or_insert_with(|| WindowState::FixedWindow {
                window_index: index,
                count: 0,
                window,
            });

        let WindowState::FixedWindow {
            window_index,
            count,
            window: stored_window,
        } = entry.value_mut();

        if *window_index != index {
            trace!(
                rule = rule,
                discriminator = discriminator,
                old_window = *window_index,
                new_window = index,
                "Window rolled over, resetting count"
            );
            *window_index = index;
            *count = 0;
        }
        // A rule reload may change the window duration; adopt it.
        *stored_window = window;
        *count += 1;

        Ok(WindowUsage {
            count: *count,
            window_remaining,
        })
    }

    /// Remove counters whose window is stale beyond the grace period.
    ///
    /// Returns the number of evicted entries. The underlying map locks one
    /// shard at a time, so concurrent increments are only ever delayed by a
    /// single shard's critical section.
    pub fn sweep(&self, now: Duration) -> usize {
        let before = self.counters.len();
        let now_nanos = now.as_nanos();
        let grace = self.grace_windows;

        self.counters.retain(|_, state| {
            let WindowState::FixedWindow {
                window_index,
                window,
                ..
            } = state;
            let window_nanos = window.as_nanos();
            if window_nanos == 0 {
                return false;
            }
            let current_index = (now_nanos / window_nanos) as u64;
            current_index.saturating_sub(*window_index) <= grace
        });

        // Inserts may land while retain runs; never report a negative delta.
        let removed = before.saturating_sub(self.counters.len());
        if removed > 0 {
            debug!(
                removed = removed,
                remaining = self.counters.len(),
                "Evicted stale rate limit counters"
            );
        }
        removed
    }

    /// Get the current count for a key, if a counter exists.
    pub fn current_count(&self, rule: &str, discriminator: &str) -> Option<u64> {
        let key = CounterKey::new(rule, discriminator);
        self.counters.get(&key).map(|state| {
            let WindowState::FixedWindow { count, .. } = state.value();
            *count
        })
    }

    /// Number of live counters.
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    /// Drop all counters.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

impl Default for WindowCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_secs(60);

    fn fixed(max_requests: u32) -> LimiterKind {
        LimiterKind::FixedWindow {
            max_requests,
            window: WINDOW,
        }
    }

    #[test]
    fn test_counts_within_one_window() {
        let store = WindowCounterStore::new();
        let limiter = fixed(5);

        for expected in 1..=6 {
            let usage = store
                .increment_and_check("rule", "abc", &limiter, Duration::from_secs(10))
                .unwrap();
            assert_eq!(usage.count, expected);
        }
        assert_eq!(store.current_count("rule", "abc"), Some(6));
    }

    #[test]
    fn test_window_remaining() {
        let store = WindowCounterStore::new();
        let usage = store
            .increment_and_check("rule", "abc", &fixed(5), Duration::from_secs(75))
            .unwrap();

        // Window [60, 120): 45 seconds left at t=75.
        assert_eq!(usage.window_remaining, Duration::from_secs(45));
    }

    #[test]
    fn test_count_resets_on_new_window() {
        let store = WindowCounterStore::new();
        let limiter = fixed(5);

        for _ in 0..5 {
            store
                .increment_and_check("rule", "abc", &limiter, Duration::from_secs(30))
                .unwrap();
        }

        let usage = store
            .increment_and_check("rule", "abc", &limiter, Duration::from_secs(90))
            .unwrap();
        assert_eq!(usage.count, 1);
    }

    #[test]
    fn test_boundary_belongs_to_new_window() {
        let store = WindowCounterStore::new();
        let limiter = fixed(5);

        store
            .increment_and_check("rule", "abc", &limiter, Duration::from_secs(59))
            .unwrap();

        // Exactly at the boundary: fresh window, full duration remaining.
        let usage = store
            .increment_and_check("rule", "abc", &limiter, Duration::from_secs(60))
            .unwrap();
        assert_eq!(usage.count, 1);
        assert_eq!(usage.window_remaining, WINDOW);
    }

    #[test]
    fn test_keys_are_isolated() {
        let store = WindowCounterStore::new();
        let limiter = fixed(5);
        let now = Duration::from_secs(10);

        store
            .increment_and_check("rule", "client-a", &limiter, now)
            .unwrap();
        store
            .increment_and_check("rule", "client-a", &limiter, now)
            .unwrap();
        store
            .increment_and_check("rule", "client-b", &limiter, now)
            .unwrap();

        assert_eq!(store.current_count("rule", "client-a"), Some(2));
        assert_eq!(store.current_count("rule", "client-b"), Some(1));
    }

    #[test]
    fn test_rules_are_isolated() {
        let store = WindowCounterStore::new();
        let limiter = fixed(5);
        let now = Duration::from_secs(10);

        store
            .increment_and_check("rule-a", "abc", &limiter, now)
            .unwrap();
        store
            .increment_and_check("rule-b", "abc", &limiter, now)
            .unwrap();

        assert_eq!(store.current_count("rule-a", "abc"), Some(1));
        assert_eq!(store.current_count("rule-b", "abc"), Some(1));
    }

    #[test]
    fn test_concurrent_increments_are_exact() {
        let store = Arc::new(WindowCounterStore::new());
        let limiter = fixed(1_000_000);
        let now = Duration::from_secs(10);

        let threads: u64 = 8;
        let per_thread: u64 = 500;
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let store = Arc::clone(&store);
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        store
                            .increment_and_check("rule", "shared", &limiter, now)
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.current_count("rule", "shared"),
            Some(threads * per_thread)
        );
    }

    #[test]
    fn test_zero_window_is_store_error() {
        let store = WindowCounterStore::new();
        let limiter = LimiterKind::FixedWindow {
            max_requests: 5,
            window: Duration::ZERO,
        };

        let err = store
            .increment_and_check("rule", "abc", &limiter, Duration::from_secs(10))
            .unwrap_err();
        assert!(matches!(err, TurnstileError::InternalStore(_)));
    }

    #[test]
    fn test_sweep_removes_stale_counters() {
        let store = WindowCounterStore::new(); // grace = 1 window
        let limiter = fixed(5);

        store
            .increment_and_check("rule", "stale", &limiter, Duration::from_secs(10))
            .unwrap();
        assert_eq!(store.counter_count(), 1);

        // One window behind: still within grace.
        assert_eq!(store.sweep(Duration::from_secs(70)), 0);
        assert_eq!(store.counter_count(), 1);

        // Two windows behind: evicted.
        assert_eq!(store.sweep(Duration::from_secs(130)), 1);
        assert_eq!(store.counter_count(), 0);
    }

    #[test]
    fn test_sweep_keeps_fresh_counters() {
        let store = WindowCounterStore::new();
        let limiter = fixed(5);
        let now = Duration::from_secs(700);

        store
            .increment_and_check("rule", "fresh", &limiter, now)
            .unwrap();
        store
            .increment_and_check("rule", "stale", &limiter, Duration::from_secs(10))
            .unwrap();

        assert_eq!(store.sweep(now), 1);
        assert_eq!(store.current_count("rule", "fresh"), Some(1));
        assert_eq!(store.current_count("rule", "stale"), None);
    }

    #[test]
    fn test_clear() {
        let store = WindowCounterStore::new();
        store
            .increment_and_check("rule", "abc", &fixed(5), Duration::from_secs(10))
            .unwrap();
        assert_eq!(store.counter_count(), 1);

        store.clear();
        assert_eq!(store.counter_count(), 0);
    }

    #[test]
    fn test_counter_key_display() {
        let key = CounterKey::new("login-attempts", "abc");
        assert_eq!(key.to_string(), "login-attempts:abc");
    }
}
