// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent key-value deduplication store.
//!
//! Rows live in `dedup_kv`, keyed by message id with no secondary index.
//! Reads expire entries lazily; `cleanup` walks the whole table.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{Clock, CourierError, DedupStore, DeduplicationEntry};
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::database::{Database, map_tr_err};
use crate::retention::Retention;

/// SQLite-backed key-value store of seen message ids.
pub struct KvDedupStore {
    db: Database,
    retention: Retention,
}

impl KvDedupStore {
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
impl DedupStore for KvDedupStore {
    fn name(&self) -> &str {
        "persistent-kv"
    }

    async fn has(&self, msg_id: &str) -> Result<bool, CourierError> {
        let msg_id = msg_id.to_string();
        let now = self.retention.now_ms();
        let retention = self.retention.clone();
        self.db
            .connection()
            .call(move |conn| -> Result<bool, rusqlite::Error> {
                let first_seen_at: Option<i64> = conn
                    .query_row(
                        "SELECT first_seen_at FROM dedup_kv WHERE msg_id = ?1",
                        params![msg_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                match first_seen_at {
                    Some(seen) if retention.is_expired(seen, now) => {
                        conn.execute(
                            "DELETE FROM dedup_kv WHERE msg_id = ?1 AND first_seen_at = ?2",
                            params![msg_id, seen],
                        )?;
                        Ok(false)
                    }
                    Some(_) => Ok(true),
                    None => Ok(false),
                }
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
                    "INSERT INTO dedup_kv (msg_id, first_seen_at) VALUES (?1, ?2)
                     ON CONFLICT(msg_id) DO UPDATE SET first_seen_at = excluded.first_seen_at",
                    params![msg_id, now],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn cleanup(&self) -> Result<usize, CourierError> {
        let now = self.retention.now_ms();
        let retention = self.retention.clone();
        let removed = self
            .db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                let tx = conn.transaction()?;
                let expired: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT msg_id, first_seen_at FROM dedup_kv")?;
                    let rows = stmt.query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                    })?;
                    let mut expired = Vec::new();
                    for row in rows {
                        let (msg_id, seen) = row?;
                        if retention.is_expired(seen, now) {
                            expired.push(msg_id);
                        }
                    }
                    expired
                };

                {
                    let mut delete = tx.prepare("DELETE FROM dedup_kv WHERE msg_id = ?1")?;
                    for msg_id in &expired {
                        delete.execute(params![msg_id])?;
                    }
                }
                tx.commit()?;
                Ok(expired.len())
            })
            .await
            .map_err(map_tr_err)?;

        debug!(removed, backend = "persistent-kv", "dedup cleanup scanned table");
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), CourierError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute("DELETE FROM dedup_kv", [])?;
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
                    "SELECT msg_id, first_seen_at FROM dedup_kv WHERE msg_id = ?1",
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
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM dedup_kv", [], |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn close(&self) -> Result<(), CourierError> {
        self.db.checkpoint().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_test_utils::ManualClock;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    const TTL: Duration = Duration::from_secs(60);

    async fn store(clock: Arc<ManualClock>) -> KvDedupStore {
        let db = Database::open_in_memory().await.unwrap();
        KvDedupStore::new(db, TTL).with_clock(clock)
    }

    #[tokio::test]
    async fn add_then_has() {
        let clock = Arc::new(ManualClock::new(5_000_000));
        let store = store(clock).await;
        store.add("m1").await.unwrap();
        assert!(store.has("m1").await.unwrap());
        assert!(!store.has("m2").await.unwrap());
    }

    #[tokio::test]
    async fn expired_read_deletes_row() {
        let clock = Arc::new(ManualClock::new(5_000_000));
        let store = store(clock.clone()).await;
        store.add("m1").await.unwrap();
        clock.advance(TTL + Duration::from_secs(1));

        assert!(!store.has("m1").await.unwrap());
        assert_eq!(store.entry_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn re_adding_refreshes_timestamp() {
        let clock = Arc::new(ManualClock::new(5_000_000));
        let store = store(clock.clone()).await;
        store.add("m1").await.unwrap();
        clock.advance(Duration::from_secs(40));
        store.add("m1").await.unwrap();
        clock.advance(Duration::from_secs(40));

        assert!(store.has("m1").await.unwrap());
        assert_eq!(store.entry_count().await.unwrap(), 1);
        assert_eq!(
            store.entry("m1").await.unwrap().map(|e| e.first_seen_at),
            Some(5_040_000)
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn cleanup_scans_and_removes_expired() {
        let clock = Arc::new(ManualClock::new(5_000_000));
        let store = store(clock.clone()).await;
        for id in ["a", "b", "c"] {
            store.add(id).await.unwrap();
        }
        clock.advance(Duration::from_secs(30));
        store.add("d").await.unwrap();
        clock.advance(Duration::from_secs(31));

        assert_eq!(store.cleanup().await.unwrap(), 3);
        assert!(logs_contain("dedup cleanup scanned table"));
        assert_eq!(store.cleanup().await.unwrap(), 0);
        assert_eq!(store.entry_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kv.db");
        let path = path.to_str().unwrap();

        let first = KvDedupStore::open(path, TTL).await.unwrap();
        first.add("persisted").await.unwrap();
        first.close().await.unwrap();
        drop(first);

        let second = KvDedupStore::open(path, TTL).await.unwrap();
        assert!(second.has("persisted").await.unwrap());
    }

    #[tokio::test]
    async fn clear_empties_table() {
        let clock = Arc::new(ManualClock::new(5_000_000));
        let store = store(clock).await;
        store.add("a").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.entry_count().await.unwrap(), 0);
    }
}
