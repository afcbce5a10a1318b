// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TTL arithmetic shared by every backend.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{Clock, SystemClock};

/// Retention window plus the clock it is measured against.
#[derive(Clone)]
pub(crate) struct Retention {
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl Retention {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock: Arc::new(SystemClock),
        }
    }

    pub(crate) fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Entries first seen strictly before this instant are expired.
    pub(crate) fn cutoff_ms(&self) -> i64 {
        self.now_ms().saturating_sub(self.ttl_ms)
    }

    pub(crate) fn is_expired(&self, first_seen_at: i64, now_ms: i64) -> bool {
        first_seen_at < now_ms.saturating_sub(self.ttl_ms)
    }
}
