// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-lifetime deduplication store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{Clock, CourierError, DedupStore, DeduplicationEntry};
use dashmap::DashMap;

use crate::retention::Retention;

/// In-memory map from message id to first-seen time.
///
/// Expired entries are removed lazily when read and in bulk by `cleanup`.
pub struct MemoryDedupStore {
    entries: DashMap<String, i64>,
    retention: Retention,
}

impl MemoryDedupStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            retention: Retention::new(ttl),
        }
    }

    /// Measure the TTL against `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.retention = self.retention.with_clock(clock);
        self
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn has(&self, msg_id: &str) -> Result<bool, CourierError> {
        let now = self.retention.now_ms();
        let Some(first_seen_at) = self.entries.get(msg_id).map(|entry| *entry) else {
            return Ok(false);
        };

        if self.retention.is_expired(first_seen_at, now) {
            // Re-check under the shard lock so a concurrent refresh survives.
            self.entries
                .remove_if(msg_id, |_, seen| self.retention.is_expired(*seen, now));
            return Ok(false);
        }
        Ok(true)
    }

    async fn add(&self, msg_id: &str) -> Result<(), CourierError> {
        self.entries
            .insert(msg_id.to_string(), self.retention.now_ms());
        Ok(())
    }

    async fn cleanup(&self) -> Result<usize, CourierError> {
        let now = self.retention.now_ms();
        let before = self.entries.len();
        self.entries
            .retain(|_, seen| !self.retention.is_expired(*seen, now));
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn clear(&self) -> Result<(), CourierError> {
        self.entries.clear();
        Ok(())
    }

    async fn entry(&self, msg_id: &str) -> Result<Option<DeduplicationEntry>, CourierError> {
        Ok(self.entries.get(msg_id).map(|seen| DeduplicationEntry {
            msg_id: msg_id.to_string(),
            first_seen_at: *seen,
        }))
    }

    async fn entry_count(&self) -> Result<usize, CourierError> {
        Ok(self.entries.len())
    }
}
