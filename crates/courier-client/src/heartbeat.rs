// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Liveness probes while connected.
//!
//! The monitor only schedules probes and records responses. Staleness is
//! advisory: a dead socket is detected by the transport closing, not here.

use std::time::Duration;

use courier_core::Frame;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Number of silent intervals after which the link is reported stale.
const STALE_AFTER_INTERVALS: u32 = 2;

/// Owns the heartbeat timer for one connection manager.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Duration,
    ticker: Option<Interval>,
    started_at: Option<Instant>,
    last_sent_at: Option<Instant>,
    last_response_at: Option<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ticker: None,
            started_at: None,
            last_sent_at: None,
            last_response_at: None,
        }
    }

    /// Arm the timer. The first probe fires one interval from now.
    pub fn start(&mut self) {
        let now = Instant::now();
        let mut ticker = tokio::time::interval_at(now + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        self.started_at = Some(now);
        self.last_sent_at = None;
        self.last_response_at = None;
    }

    /// Disarm the timer. No further ticks are produced.
    pub fn stop(&mut self) {
        self.ticker = None;
        self.started_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    /// Resolves at the next probe time; never resolves while stopped.
    pub async fn tick(&mut self) -> Instant {
        match self.ticker.as_mut() {
            Some(ticker) => ticker.tick().await,
            None => std::future::pending().await,
        }
    }

    /// The probe frame for `now_ms`, recording the send time.
    pub fn probe(&mut self, now_ms: i64) -> Frame {
        self.last_sent_at = Some(Instant::now());
        Frame::Heartbeat { timestamp: now_ms }
    }

    pub fn record_response(&mut self) {
        self.last_response_at = Some(Instant::now());
    }

    pub fn last_sent_at(&self) -> Option<Instant> {
        self.last_sent_at
    }

    pub fn last_response_at(&self) -> Option<Instant> {
        self.last_response_at
    }

    /// Whether no response arrived in the last two intervals.
    pub fn is_stale(&self, now: Instant) -> bool {
        let Some(reference) = self.last_response_at.or(self.started_at) else {
            return false;
        };
        now.saturating_duration_since(reference) > self.interval * STALE_AFTER_INTERVALS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_one_interval_after_start() {
        let mut monitor = HeartbeatMonitor::new(INTERVAL);
        let started = Instant::now();
        monitor.start();

        let fired = monitor.tick().await;
        assert_eq!(fired - started, INTERVAL);
        let fired = monitor.tick().await;
        assert_eq!(fired - started, INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_monitor_never_ticks() {
        let mut monitor = HeartbeatMonitor::new(INTERVAL);
        monitor.start();
        monitor.stop();
        assert!(!monitor.is_running());

        let result = tokio::time::timeout(INTERVAL * 3, monitor.tick()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn staleness_tracks_responses() {
        let mut monitor = HeartbeatMonitor::new(INTERVAL);
        assert!(!monitor.is_stale(Instant::now()));
        monitor.start();

        tokio::time::advance(INTERVAL * 2).await;
        assert!(!monitor.is_stale(Instant::now()));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(monitor.is_stale(Instant::now()));

        monitor.record_response();
        assert!(!monitor.is_stale(Instant::now()));
        assert!(monitor.last_response_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_is_heartbeat_frame() {
        let mut monitor = HeartbeatMonitor::new(INTERVAL);
        let frame = monitor.probe(1_767_225_600_000);
        assert_eq!(
            frame,
            Frame::Heartbeat {
                timestamp: 1_767_225_600_000
            }
        );
        assert!(monitor.last_sent_at().is_some());
    }
}
