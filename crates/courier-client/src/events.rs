// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed client events and the single-slot-per-kind handler registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use courier_core::{
    Acknowledgement, ClientIdentity, ConnectionState, CourierError, IncomingMessage, ReadReceipt,
};

/// Event names handlers subscribe to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Connected,
    Disconnected,
    Error,
    Message,
    Ack,
    ReadReceipt,
    StateChange,
    Reconnecting,
}

/// Notification delivered to application handlers.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The handshake succeeded.
    Connected(ClientIdentity),
    /// A live session ended.
    Disconnected { reason: String },
    /// A failure with no synchronous caller, or one also returned to a caller.
    Error(Arc<CourierError>),
    /// A first-seen inbound message.
    Message(IncomingMessage),
    /// A status update for an outbound message.
    Ack(Acknowledgement),
    ReadReceipt(ReadReceipt),
    /// Emitted once per actual transition.
    StateChange {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// A retry is scheduled to start after `delay`.
    Reconnecting {
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Connected(_) => EventKind::Connected,
            ClientEvent::Disconnected { .. } => EventKind::Disconnected,
            ClientEvent::Error(_) => EventKind::Error,
            ClientEvent::Message(_) => EventKind::Message,
            ClientEvent::Ack(_) => EventKind::Ack,
            ClientEvent::ReadReceipt(_) => EventKind::ReadReceipt,
            ClientEvent::StateChange { .. } => EventKind::StateChange,
            ClientEvent::Reconnecting { .. } => EventKind::Reconnecting,
        }
    }
}

/// A registered event handler.
pub type EventHandler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Registry holding at most one handler per [`EventKind`].
///
/// Handlers run on the connection driver task, in emission order. A handler
/// may register or remove handlers while it runs.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` for `kind`, returning the handler it replaced.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Option<EventHandler>
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.write().insert(kind, Arc::new(handler))
    }

    /// Remove the handler for `kind`. Returns whether one was installed.
    pub fn off(&self, kind: EventKind) -> bool {
        self.write().remove(&kind).is_some()
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.read().contains_key(&kind)
    }

    /// Deliver `event` to its handler, if any.
    pub fn emit(&self, event: &ClientEvent) {
        let handler = self.read().get(&event.kind()).cloned();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<EventKind, EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<EventKind, EventHandler>> {
        self.handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
