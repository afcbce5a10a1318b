// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams between the client core and its pluggable collaborators.
//!
//! Both traits use `#[async_trait]` so they can be held as trait objects.

pub mod store;
pub mod transport;

pub use store::DedupStore;
pub use transport::{
    CloseInfo, LinkEndpoint, Transport, TransportCommand, TransportEvent, TransportLink,
};
