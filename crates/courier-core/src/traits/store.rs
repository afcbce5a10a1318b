// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deduplication store trait for seen-message identifiers.

use async_trait::async_trait;

use crate::error::CourierError;
use crate::types::DeduplicationEntry;

/// Persistence for message ids seen within a retention window (TTL).
///
/// Every backend honours the same contract:
/// - `has` is true only for an entry younger than the TTL; an expired entry
///   reads as absent even before it is swept.
/// - `add` stamps the current time, refreshing an existing entry.
/// - `cleanup` removes every expired entry and is safe to repeat.
/// - `clear` removes everything.
#[async_trait]
pub trait DedupStore: Send + Sync + 'static {
    /// Returns the backend name (`memory`, `persistent-kv`, `persistent-indexed`).
    fn name(&self) -> &str;

    /// Whether `msg_id` was recorded within the retention window.
    async fn has(&self, msg_id: &str) -> Result<bool, CourierError>;

    /// Records `msg_id` as seen now.
    async fn add(&self, msg_id: &str) -> Result<(), CourierError>;

    /// Evicts expired entries and returns how many were removed.
    async fn cleanup(&self) -> Result<usize, CourierError>;

    /// Removes all entries unconditionally.
    async fn clear(&self) -> Result<(), CourierError>;

    /// The stored record for `msg_id`, expired or not. Does not expire it.
    async fn entry(&self, msg_id: &str) -> Result<Option<DeduplicationEntry>, CourierError>;

    /// Number of stored entries, including expired ones not yet swept.
    async fn entry_count(&self) -> Result<usize, CourierError>;

    /// Releases backend resources. Defaults to a no-op.
    async fn close(&self) -> Result<(), CourierError> {
        Ok(())
    }
}
