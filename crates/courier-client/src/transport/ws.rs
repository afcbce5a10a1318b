// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport over tokio-tungstenite.
//!
//! Each open socket is split into two tasks:
//! 1. Writer task: drains link commands into the socket sink
//! 2. Reader task: converts socket frames into link events
//!
//! Dropping the [`TransportLink`] closes the socket with code 1000.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, warn};
use url::Url;

use courier_core::traits::transport::{
    CloseInfo, LinkEndpoint, NORMAL_CLOSURE, TransportCommand,
};
use courier_core::{CourierError, Transport, TransportEvent, TransportLink};

/// WebSocket client transport.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn name(&self) -> &str {
        "websocket"
    }

    async fn open(&self, url: &str) -> Result<TransportLink, CourierError> {
        let target = redact(url);
        let (socket, _response) = connect_async(url).await.map_err(|e| CourierError::Transport {
            message: format!("failed to open {target}: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(url = %target, "websocket open");

        let (mut sink, mut stream) = socket.split();
        let (link, endpoint) = TransportLink::pair();
        let LinkEndpoint {
            mut commands,
            events,
        } = endpoint;

        let writer_events = events.clone();
        tokio::spawn(async move {
            loop {
                let (message, last) = match commands.recv().await {
                    Some(TransportCommand::Send(text)) => (Message::Text(text.into()), false),
                    Some(TransportCommand::Close { code, reason }) => {
                        (close_message(code, reason), true)
                    }
                    None => (close_message(NORMAL_CLOSURE, "client released link".into()), true),
                };
                if let Err(e) = sink.send(message).await {
                    let _ = writer_events.send(TransportEvent::Error(e.to_string()));
                    break;
                }
                if last {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let closed = loop {
                let next = tokio::select! {
                    _ = events.closed() => return,
                    next = stream.next() => next,
                };
                match next {
                    Some(Ok(Message::Text(text))) => {
                        let _ = events.send(TransportEvent::Message(text.to_string()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| CloseInfo {
                                code: u16::from(f.code),
                                reason: f.reason.to_string(),
                            })
                            .unwrap_or_else(|| CloseInfo::abnormal("close without status"));
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("ignoring binary websocket frame");
                    }
                    // Ping/pong are answered by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = events.send(TransportEvent::Error(e.to_string()));
                        break CloseInfo::abnormal(e.to_string());
                    }
                    None => break CloseInfo::abnormal("stream ended"),
                }
            };
            debug!(code = closed.code, reason = %closed.reason, "websocket closed");
            let _ = events.send(TransportEvent::Closed(closed));
        });

        Ok(link)
    }
}

fn close_message(code: u16, reason: String) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into(),
    }))
}

/// `url` without its query string and fragment, which may carry the credential.
fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.into()
        }
        Err(_) => "<unparseable url>".to_string(),
    }
}
