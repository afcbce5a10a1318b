// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides a scripted transport and a controllable clock so the connection
//! state machine and the deduplication stores can be tested without a
//! network or wall-clock waits.
//!
//! # Components
//!
//! - [`MockTransport`] - Transport whose opens and handshakes are scripted
//! - [`MockPeer`] - Gateway side of one mock link: inject frames, capture sends
//! - [`ManualClock`] - [`courier_core::Clock`] that only moves when told to
//! - [`frames`] - Builders for inbound gateway frames

pub mod clock;
pub mod frames;
pub mod mock_transport;

pub use clock::ManualClock;
pub use mock_transport::{Handshake, MockPeer, MockTransport, OpenOutcome};
