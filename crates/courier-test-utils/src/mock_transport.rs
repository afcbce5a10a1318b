// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock transport for deterministic connection tests.
//!
//! `MockTransport` implements `Transport` with a script of open outcomes.
//! Every successful open hands the gateway side of the link to the test as a
//! [`MockPeer`], which injects inbound frames and captures outbound ones.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use courier_core::traits::transport::{CloseInfo, LinkEndpoint, TransportCommand};
use courier_core::{CourierError, Frame, Transport, TransportEvent, TransportLink};

/// What the mock gateway does right after a socket opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Reply with a successful `auth_response`.
    Accept { user_id: String, device_id: String },
    /// Reply with a failed `auth_response`.
    Reject(String),
    /// Never reply.
    Silent,
}

/// Result of one `Transport::open` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The socket opens and the gateway performs `Handshake`.
    Open(Handshake),
    /// The socket fails to open with a transport error.
    Fail(String),
    /// The open call never resolves.
    Hang,
}

impl OpenOutcome {
    /// Open and authenticate as `u1`/`d1`.
    pub fn accept() -> Self {
        OpenOutcome::Open(Handshake::Accept {
            user_id: "u1".to_string(),
            device_id: "d1".to_string(),
        })
    }
}

/// A scripted transport.
///
/// Outcomes are consumed in order; once the script runs out every open uses
/// the fallback outcome (successful authentication by default).
pub struct MockTransport {
    script: Mutex<VecDeque<OpenOutcome>>,
    fallback: Mutex<OpenOutcome>,
    urls: Mutex<Vec<String>>,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
    peers_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockPeer>>,
}

impl MockTransport {
    /// A transport that accepts every connection as `u1`/`d1`.
    pub fn new() -> Self {
        Self::with_fallback(OpenOutcome::accept())
    }

    pub fn with_fallback(fallback: OpenOutcome) -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            urls: Mutex::new(Vec::new()),
            peers_tx,
            peers_rx: tokio::sync::Mutex::new(peers_rx),
        }
    }

    /// Queue the outcome of the next unscripted open.
    pub fn push_outcome(&self, outcome: OpenOutcome) {
        lock(&self.script).push_back(outcome);
    }

    /// Replace the outcome used once the script is exhausted.
    pub fn set_fallback(&self, outcome: OpenOutcome) {
        *lock(&self.fallback) = outcome;
    }

    /// Every URL passed to `open`, in call order.
    pub fn opened_urls(&self) -> Vec<String> {
        lock(&self.urls).clone()
    }

    /// Number of `open` calls so far, including failed and hung ones.
    pub fn open_count(&self) -> usize {
        lock(&self.urls).len()
    }

    /// Wait for the next successfully opened link.
    pub async fn next_peer(&self) -> MockPeer {
        self.peers_rx
            .lock()
            .await
            .recv()
            .await
            .expect("MockTransport owns the peer sender")
    }

    fn next_outcome(&self) -> OpenOutcome {
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| lock(&self.fallback).clone())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self, url: &str) -> Result<TransportLink, CourierError> {
        lock(&self.urls).push(url.to_string());

        let handshake = match self.next_outcome() {
            OpenOutcome::Open(handshake) => handshake,
            OpenOutcome::Fail(reason) => return Err(CourierError::transport(reason)),
            OpenOutcome::Hang => std::future::pending().await,
        };

        let (link, endpoint) = TransportLink::pair();
        let peer = MockPeer::new(endpoint);
        match handshake {
            Handshake::Accept { user_id, device_id } => {
                peer.push_frame(&crate::frames::auth_ok(&user_id, &device_id));
            }
            Handshake::Reject(reason) => peer.push_frame(&crate::frames::auth_rejected(&reason)),
            Handshake::Silent => {}
        }
        let _ = self.peers_tx.send(peer);
        Ok(link)
    }
}

#[derive(Debug, Default)]
struct PeerLog {
    sent: Vec<String>,
    close: Option<CloseInfo>,
}

/// The gateway side of one mock link.
pub struct MockPeer {
    events: mpsc::UnboundedSender<TransportEvent>,
    commands: Mutex<mpsc::UnboundedReceiver<TransportCommand>>,
    log: Mutex<PeerLog>,
}

impl MockPeer {
    fn new(endpoint: LinkEndpoint) -> Self {
        Self {
            events: endpoint.events,
            commands: Mutex::new(endpoint.commands),
            log: Mutex::new(PeerLog::default()),
        }
    }

    /// Deliver a frame to the client.
    pub fn push_frame(&self, frame: &Frame) {
        let text = frame.encode().expect("test frames encode");
        self.push_text(&text);
    }

    /// Deliver raw text to the client, well-formed or not.
    pub fn push_text(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_string()));
    }

    /// Report a socket error without closing.
    pub fn push_error(&self, message: &str) {
        let _ = self.events.send(TransportEvent::Error(message.to_string()));
    }

    /// Close the socket from the gateway side with `code`.
    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.events.send(TransportEvent::Closed(CloseInfo {
            code,
            reason: reason.to_string(),
        }));
    }

    /// Drop the connection without a close frame.
    pub fn drop_connection(&self) {
        let _ = self
            .events
            .send(TransportEvent::Closed(CloseInfo::abnormal("connection reset")));
    }

    /// All text frames the client has written so far.
    pub fn sent_texts(&self) -> Vec<String> {
        self.drain();
        lock(&self.log).sent.clone()
    }

    /// All frames the client has written so far, decoded.
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.sent_texts()
            .iter()
            .map(|text| Frame::decode(text).expect("client writes valid frames"))
            .collect()
    }

    /// Sent frames of one `type`.
    pub fn sent_of_kind(&self, kind: &str) -> Vec<Frame> {
        self.sent_frames()
            .into_iter()
            .filter(|frame| frame.kind() == kind)
            .collect()
    }

    /// The close the client requested, if any.
    pub fn closed_by_client(&self) -> Option<CloseInfo> {
        self.drain();
        lock(&self.log).close.clone()
    }

    /// Whether the client has released its side of the link.
    pub fn is_released(&self) -> bool {
        self.events.is_closed()
    }

    fn drain(&self) {
        let mut commands = lock(&self.commands);
        let mut log = lock(&self.log);
        while let Ok(command) = commands.try_recv() {
            match command {
                TransportCommand::Send(text) => log.sent.push(text),
                TransportCommand::Close { code, reason } => {
                    log.close.get_or_insert(CloseInfo { code, reason });
                }
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::traits::transport::NORMAL_CLOSURE;

    #[tokio::test]
    async fn accepting_open_queues_auth_response() {
        let transport = MockTransport::new();
        let mut link = transport.open("ws://gw/ws?token=t").await.unwrap();
        let _peer = transport.next_peer().await;

        match link.next_event().await {
            TransportEvent::Message(text) => {
                assert!(matches!(
                    Frame::decode(&text).unwrap(),
                    Frame::AuthResponse { success: true, .. }
                ));
            }
            other => panic!("expected auth_response, got {other:?}"),
        }
        assert_eq!(transport.opened_urls(), vec!["ws://gw/ws?token=t".to_string()]);
    }

    #[tokio::test]
    async fn script_is_consumed_before_fallback() {
        let transport = MockTransport::new();
        transport.push_outcome(OpenOutcome::Fail("refused".into()));

        assert!(transport.open("ws://gw").await.is_err());
        assert!(transport.open("ws://gw").await.is_ok());
        assert_eq!(transport.open_count(), 2);
    }

    #[tokio::test]
    async fn peer_captures_sends_and_close() {
        let transport = MockTransport::with_fallback(OpenOutcome::Open(Handshake::Silent));
        let link = transport.open("ws://gw").await.unwrap();
        let peer = transport.next_peer().await;

        link.send(r#"{"type":"heartbeat","timestamp":1}"#.into()).unwrap();
        link.close(NORMAL_CLOSURE, "bye");

        assert_eq!(peer.sent_of_kind("heartbeat").len(), 1);
        assert_eq!(peer.closed_by_client().unwrap().code, NORMAL_CLOSURE);

        drop(link);
        assert!(peer.is_released());
    }
}
