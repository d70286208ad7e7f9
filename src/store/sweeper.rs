//! Periodic background eviction of stale counters.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::clock::Clock;

use super::WindowCounterStore;

/// Spawns and owns the periodic eviction task for a counter store.
pub struct EvictionSweeper;

impl EvictionSweeper {
    /// Spawn the sweep loop on the current tokio runtime.
    ///
    /// Every `interval` the task calls [`WindowCounterStore::sweep`] with
    /// the clock's current time. The sweep itself never holds a store-wide
    /// lock, so foreground increments keep flowing while it runs.
    pub fn spawn(
        store: Arc<WindowCounterStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so a freshly started
            // sweeper does not race test setup.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.sweep(clock.now());
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Eviction sweeper shutting down");
                        break;
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }
}

/// Handle for stopping a running eviction sweeper.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweep loop and wait for it to exit.
    pub async fn shutdown(self) {
        // Receiver may already be gone if the runtime is tearing down.
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rules::LimiterKind;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_stale_entries() {
        let store = Arc::new(WindowCounterStore::new());
        let clock = ManualClock::starting_at(Duration::from_secs(10));
        let limiter = LimiterKind::FixedWindow {
            max_requests: 5,
            window: WINDOW,
        };

        store
            .increment_and_check("rule", "abc", &limiter, clock.now())
            .unwrap();
        assert_eq!(store.counter_count(), 1);

        let sweeper = EvictionSweeper::spawn(
            Arc::clone(&store),
            Arc::new(clock.clone()),
            Duration::from_millis(100),
        );

        // Untouched for two windows: past the default grace of one.
        clock.advance(Duration::from_secs(130));
        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(store.counter_count(), 0);
        sweeper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_leaves_fresh_entries() {
        let store = Arc::new(WindowCounterStore::new());
        let clock = ManualClock::starting_at(Duration::from_secs(10));
        let limiter = LimiterKind::FixedWindow {
            max_requests: 5,
            window: WINDOW,
        };

        store
            .increment_and_check("rule", "abc", &limiter, clock.now())
            .unwrap();

        let sweeper = EvictionSweeper::spawn(
            Arc::clone(&store),
            Arc::new(clock.clone()),
            Duration::from_millis(100),
        );

        tokio::time::sleep(Duration::from_millis(350)).await;

        assert_eq!(store.counter_count(), 1);
        sweeper.shutdown().await;
    }
}
