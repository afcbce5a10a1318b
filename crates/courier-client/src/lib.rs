// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time messaging client core.
//!
//! [`ConnectionManager`] maintains an authenticated session to a messaging
//! gateway: it drives the handshake, probes liveness with the
//! [`HeartbeatMonitor`], reconnects with bounded exponential backoff via the
//! [`ReconnectionPolicy`], and routes inbound frames through the
//! [`MessageDispatcher`], which suppresses duplicates and correlates ACKs
//! with outbound messages.

pub mod dispatcher;
pub mod events;
pub mod heartbeat;
pub mod manager;
pub mod reconnect;
pub mod transport;

pub use dispatcher::{Dispatch, MessageDispatcher, PendingTracker};
pub use events::{ClientEvent, EventBus, EventHandler, EventKind};
pub use heartbeat::HeartbeatMonitor;
pub use manager::ConnectionManager;
pub use reconnect::{ReconnectionPolicy, RetryDecision};
pub use transport::WsTransport;
