// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Courier messaging client.
//!
//! This crate provides the error taxonomy, domain types, the wire frame
//! codec, and the traits that transports and deduplication stores implement.

pub mod clock;
pub mod error;
pub mod frame;
pub mod identity;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use clock::{Clock, SystemClock};
pub use error::CourierError;
pub use frame::Frame;
pub use traits::{DedupStore, Transport, TransportEvent, TransportLink};
pub use types::{
    AckStatus, Acknowledgement, ClientIdentity, ConnectionState, DeduplicationEntry,
    IncomingMessage, OutgoingMessage, ReadReceipt, ReconnectState, RecipientType,
};
