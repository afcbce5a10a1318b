// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent indexed deduplication store.
//!
//! Rows live in `dedup_entries` with an index on `first_seen_at`, so eviction
//! is a single range delete. Reads filter expired rows but leave them for the
//! sweep to remove.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{Clock, CourierError, DedupStore, DeduplicationEntry};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::retention::Retention;

/// SQLite-backed store with a timestamp index for range eviction.
pub struct IndexedDedupStore {
    db: Database,
    retention: Retention,
}

impl IndexedDedupStore {
    /// Wrap an already-open database.
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self {
            db,
            retention: Retention::new(ttl),
        }
    }

    /// Open the database at `path` and wrap it.
    pub async fn open(path: &str, ttl: Duration) -> Result<Self, CourierError> {
        Ok(Self::new(Database::open(path).await?, ttl))
    }

    /// Measure the TTL against `clock` instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.retention = self.retention.with_clock(clock);
        self
    }
}

#[async_trait]
impl DedupStore for IndexedDedupStore {
    fn name(&self) -> &str {
        "persistent-indexed"
    }

    async fn has(&self, msg_id: &str) -> Result<bool, CourierError> {
        let msg_id = msg_id.to_string();
        let cutoff = self.retention.cutoff_ms();
        self.db
            .connection()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let mut stmt = conn.prepare_cached(
                    "SELECT 1 FROM dedup_entries WHERE msg_id = ?1 AND first_seen_at >= ?2",
                )?;
                stmt.exists(params![msg_id, cutoff])
            })
            .await
            .map_err(map_tr_err)
    }

    async fn add(&self, msg_id: &str) -> Result<(), CourierError> {
        let msg_id = msg_id.to_string();
        let now = self.retention.now_ms();
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO dedup_entries (msg_id, first_seen_at) VALUES (?1, ?2)
                     ON CONFLICT(msg_id) DO UPDATE SET first_seen_at = excluded.first_seen_at",
                    params![msg_id, now],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn cleanup(&self) -> Result<usize, CourierError> {
        let cutoff = self.retention.cutoff_ms();
        let removed = self
            .db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "DELETE FROM dedup_entries WHERE first_seen_at < ?1",
                    params![cutoff],
                )
            })
            .await
            .map_err(map_tr_err)?;

        debug!(removed, cutoff, backend = "persistent-indexed", "dedup cleanup range delete");
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), CourierError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute("DELETE FROM dedup_entries", [])?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn entry(&self, msg_id: &str) -> Result<Option<DeduplicationEntry>, CourierError> {
        let msg_id = msg_id.to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<Option<DeduplicationEntry>, rusqlite::Error> {
                conn.query_row(
                    "SELECT msg_id, first_seen_at FROM dedup_entries WHERE msg_id = ?1",
                    params![msg_id],
                    |row| {
                        Ok(DeduplicationEntry {
                            msg_id: row.get(0)?,
                            first_seen_at: row.get(1)?,
                        })
                    },
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn entry_count(&self) -> Result<usize, CourierError> {
        self.db
            .connection()
            .call(|conn| -> Result<usize, rusqlite::Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM dedup_entries", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn close(&self) -> Result<(), CourierError> {
        self.db.checkpoint().await
    }
}
