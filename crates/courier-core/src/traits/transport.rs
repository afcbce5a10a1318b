// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport contract: a bidirectional, message-framed text socket.
//!
//! A [`Transport`] opens links. Each [`TransportLink`] is owned by exactly
//! one connection manager and is never shared. The link exposes the socket
//! as two channels so the manager can multiplex it with timers and commands
//! in a single event loop.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::CourierError;

/// Close code for a deliberate, orderly closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the socket vanished without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Instruction from the client to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    /// Write a text frame.
    Send(String),
    /// Close the socket with the given code and reason.
    Close { code: u16, reason: String },
}

/// Close details reported by the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: reason.into(),
        }
    }
}

/// Notification from the socket to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame arrived.
    Message(String),
    /// A socket-level error. The socket may still close afterwards.
    Error(String),
    /// The socket closed. No further events follow.
    Closed(CloseInfo),
}

/// The client side of an open socket.
#[derive(Debug)]
pub struct TransportLink {
    commands: mpsc::UnboundedSender<TransportCommand>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// The socket side of a [`TransportLink`], held by transport implementations.
#[derive(Debug)]
pub struct LinkEndpoint {
    pub commands: mpsc::UnboundedReceiver<TransportCommand>,
    pub events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportLink {
    /// Creates a link and the endpoint a transport implementation drives.
    pub fn pair() -> (TransportLink, LinkEndpoint) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            TransportLink {
                commands: command_tx,
                events: event_rx,
            },
            LinkEndpoint {
                commands: command_rx,
                events: event_tx,
            },
        )
    }

    /// Queues a text frame on the socket's write buffer.
    pub fn send(&self, text: String) -> Result<(), CourierError> {
        self.commands
            .send(TransportCommand::Send(text))
            .map_err(|_| CourierError::transport("socket is closed"))
    }

    /// Requests closure. Closing an already-closed socket is a no-op.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.commands.send(TransportCommand::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// Waits for the next socket event.
    ///
    /// A dropped endpoint is reported as an abnormal closure.
    pub async fn next_event(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => TransportEvent::Closed(CloseInfo::abnormal("transport went away")),
        }
    }
}

/// Factory for socket links to the messaging gateway.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Returns the human-readable name of this transport.
    fn name(&self) -> &str;

    /// Opens a socket to `url`. Resolves once the socket is open.
    async fn open(&self, url: &str) -> Result<TransportLink, CourierError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn link_relays_commands_and_events() {
        let (mut link, mut endpoint) = TransportLink::pair();

        link.send("frame".into()).unwrap();
        link.close(NORMAL_CLOSURE, "bye");
        assert_eq!(
            endpoint.commands.recv().await,
            Some(TransportCommand::Send("frame".into()))
        );
        assert_eq!(
            endpoint.commands.recv().await,
            Some(TransportCommand::Close {
                code: NORMAL_CLOSURE,
                reason: "bye".into()
            })
        );

        endpoint
            .events
            .send(TransportEvent::Message("in".into()))
            .unwrap();
        assert_eq!(link.next_event().await, TransportEvent::Message("in".into()));
    }

    #[tokio::test]
    async fn dropped_endpoint_reads_as_abnormal_close() {
        let (mut link, endpoint) = TransportLink::pair();
        drop(endpoint);

        assert!(link.send("late".into()).is_err());
        match link.next_event().await {
            TransportEvent::Closed(info) => assert_eq!(info.code, ABNORMAL_CLOSURE),
            other => panic!("expected close, got {other:?}"),
        }
    }
}
