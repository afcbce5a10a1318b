// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic TTL sweep for a deduplication store.

use std::sync::Arc;
use std::time::Duration;

use courier_core::DedupStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Background task that calls [`DedupStore::cleanup`] on a fixed interval.
///
/// The first sweep runs one full interval after start. Dropping the
/// scheduler cancels the task.
pub struct CleanupScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CleanupScheduler {
    /// Spawn the sweep loop on the current runtime.
    pub fn start(store: Arc<dyn DedupStore>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(backend = store.name(), "dedup cleanup stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match store.cleanup().await {
                            Ok(0) => {}
                            Ok(removed) => debug!(removed, backend = store.name(), "dedup entries expired"),
                            Err(e) => warn!(error = %e, backend = store.name(), "dedup cleanup failed"),
                        }
                    }
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Whether the sweep loop is still scheduled.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the loop and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDedupStore;
    use courier_test_utils::ManualClock;

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_each_interval() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryDedupStore::new(Duration::from_secs(10)).with_clock(clock.clone()));
        store.add("a").await.unwrap();
        store.add("b").await.unwrap();

        let scheduler = CleanupScheduler::start(store.clone(), Duration::from_secs(60));
        clock.advance(Duration::from_secs(11));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(store.entry_count().await.unwrap(), 2, "no sweep before first interval");

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.entry_count().await.unwrap(), 0);

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_loop() {
        let store: Arc<dyn DedupStore> = Arc::new(MemoryDedupStore::new(Duration::from_secs(10)));
        let scheduler = CleanupScheduler::start(store, Duration::from_secs(1));
        assert!(scheduler.is_running());
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_the_loop() {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(MemoryDedupStore::new(Duration::from_secs(1)).with_clock(clock.clone()));
        let scheduler = CleanupScheduler::start(store.clone(), Duration::from_secs(5));
        drop(scheduler);

        store.add("kept").await.unwrap();
        clock.advance(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.entry_count().await.unwrap(), 1);
    }
}
