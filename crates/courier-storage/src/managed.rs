// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store construction from configuration, with an owned cleanup task.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use courier_config::{DedupConfig, StorageType};
use courier_core::{CourierError, DedupStore, DeduplicationEntry};
use tracing::info;

use crate::database::Database;
use crate::indexed::IndexedDedupStore;
use crate::kv::KvDedupStore;
use crate::memory::MemoryDedupStore;
use crate::scheduler::CleanupScheduler;

/// A deduplication store bundled with its periodic sweep.
///
/// All [`DedupStore`] calls are forwarded to the backend. [`shutdown`](Self::shutdown)
/// stops the sweep and closes the backend.
pub struct ManagedStore {
    inner: Arc<dyn DedupStore>,
    cleanup: Mutex<Option<CleanupScheduler>>,
}

impl ManagedStore {
    /// Wrap `inner` and start sweeping it every `interval`.
    pub fn new(inner: Arc<dyn DedupStore>, interval: std::time::Duration) -> Self {
        let scheduler = CleanupScheduler::start(inner.clone(), interval);
        Self {
            inner,
            cleanup: Mutex::new(Some(scheduler)),
        }
    }

    /// Whether the periodic sweep is still active.
    pub fn is_sweeping(&self) -> bool {
        self.cleanup
            .lock()
            .map(|guard| guard.as_ref().is_some_and(CleanupScheduler::is_running))
            .unwrap_or(false)
    }

    /// Stop the sweep and release the backend. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<(), CourierError> {
        let scheduler = self
            .cleanup
            .lock()
            .map_err(|_| CourierError::Internal("cleanup scheduler lock poisoned".into()))?
            .take();
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
            self.inner.close().await?;
            info!(backend = self.inner.name(), "dedup store shut down");
        }
        Ok(())
    }
}

#[async_trait]
impl DedupStore for ManagedStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn has(&self, msg_id: &str) -> Result<bool, CourierError> {
        self.inner.has(msg_id).await
    }

    async fn add(&self, msg_id: &str) -> Result<(), CourierError> {
        self.inner.add(msg_id).await
    }

    async fn cleanup(&self) -> Result<usize, CourierError> {
        self.inner.cleanup().await
    }

    async fn clear(&self) -> Result<(), CourierError> {
        self.inner.clear().await
    }

    async fn entry(&self, msg_id: &str) -> Result<Option<DeduplicationEntry>, CourierError> {
        self.inner.entry(msg_id).await
    }

    async fn entry_count(&self) -> Result<usize, CourierError> {
        self.inner.entry_count().await
    }

    async fn close(&self) -> Result<(), CourierError> {
        self.shutdown().await
    }
}

/// Build the backend selected by `config` and start its sweep.
///
/// Must be called from within a tokio runtime.
pub async fn open_store(config: &DedupConfig) -> Result<Arc<ManagedStore>, CourierError> {
    let ttl = config.ttl();
    let backend: Arc<dyn DedupStore> = match config.storage {
        StorageType::Memory => Arc::new(MemoryDedupStore::new(ttl)),
        StorageType::PersistentKv | StorageType::PersistentIndexed => {
            let path = config.database_path.trim();
            if path.is_empty() {
                return Err(CourierError::Config(format!(
                    "deduplication.database_path is required for {} storage",
                    config.storage.as_str()
                )));
            }
            let db = Database::open(path).await?;
            if config.storage == StorageType::PersistentKv {
                Arc::new(KvDedupStore::new(db, ttl))
            } else {
                Arc::new(IndexedDedupStore::new(db, ttl))
            }
        }
    };

    info!(
        backend = backend.name(),
        ttl_secs = config.ttl_secs,
        cleanup_interval_secs = config.cleanup_interval_secs,
        "dedup store opened"
    );
    Ok(Arc::new(ManagedStore::new(backend, config.cleanup_interval())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(storage: StorageType, path: &str) -> DedupConfig {
        DedupConfig {
            storage,
            database_path: path.to_string(),
            ..DedupConfig::default()
        }
    }

    #[tokio::test]
    async fn memory_backend_from_config() {
        let store = open_store(&config(StorageType::Memory, "")).await.unwrap();
        assert_eq!(store.name(), "memory");
        assert!(store.is_sweeping());
        store.add("x").await.unwrap();
        assert!(store.has("x").await.unwrap());
        store.shutdown().await.unwrap();
        assert!(!store.is_sweeping());
    }

    #[tokio::test]
    async fn persistent_backends_from_config() {
        let dir = tempdir().unwrap();
        for (storage, name) in [
            (StorageType::PersistentKv, "persistent-kv"),
            (StorageType::PersistentIndexed, "persistent-indexed"),
        ] {
            let path = dir.path().join(format!("{name}.db"));
            let cfg = config(storage, &path.to_string_lossy());
            let store = open_store(&cfg).await.unwrap();
            assert_eq!(store.name(), name);
            store.add("x").await.unwrap();
            assert_eq!(store.entry_count().await.unwrap(), 1);
            store.shutdown().await.unwrap();
            assert!(path.exists());
        }
    }

    #[tokio::test]
    async fn persistent_backend_without_path_is_config_error() {
        let err = open_store(&config(StorageType::PersistentIndexed, "  "))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, CourierError::Config(_)));
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let store = open_store(&config(StorageType::Memory, "")).await.unwrap();
        store.shutdown().await.unwrap();
        store.shutdown().await.unwrap();
    }
}
