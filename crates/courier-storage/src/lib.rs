// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deduplication stores for the Courier messaging client.
//!
//! Three interchangeable backends implement [`courier_core::DedupStore`]:
//! an in-memory map, a SQLite key-value table swept by full scan, and a
//! SQLite table indexed on first-seen time for range eviction.
//! [`open_store`] picks one from configuration and attaches the periodic sweep.

pub mod database;
pub mod indexed;
pub mod kv;
pub mod managed;
pub mod memory;
pub mod migrations;
mod retention;
pub mod scheduler;

pub use database::Database;
pub use indexed::IndexedDedupStore;
pub use kv::KvDedupStore;
pub use managed::{ManagedStore, open_store};
pub use memory::MemoryDedupStore;
pub use scheduler::CleanupScheduler;
