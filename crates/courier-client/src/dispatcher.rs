// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound frame routing, deduplication, and outbound ACK correlation.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};

use courier_core::{
    AckStatus, Acknowledgement, ClientIdentity, CourierError, DedupStore, Frame, IncomingMessage,
    OutgoingMessage, ReadReceipt, RecipientType,
};

/// Outbound messages awaiting their first acknowledgement.
#[derive(Debug, Clone, Default)]
pub struct PendingTracker {
    inner: Arc<DashMap<String, OutgoingMessage>>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, message: OutgoingMessage) {
        self.inner.insert(message.msg_id.clone(), message);
    }

    /// Remove `msg_id`, returning the message if it was pending.
    pub fn remove(&self, msg_id: &str) -> Option<OutgoingMessage> {
        self.inner.remove(msg_id).map(|(_, message)| message)
    }

    pub fn contains(&self, msg_id: &str) -> bool {
        self.inner.contains_key(msg_id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

/// Outcome of routing one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Handshake verdict.
    Auth {
        success: bool,
        user_id: Option<String>,
        device_id: Option<String>,
        message: Option<String>,
    },
    /// First sighting of a message. Already recorded as seen.
    Deliver(IncomingMessage),
    /// A message seen within the retention window.
    Duplicate { msg_id: String },
    /// Status update; `was_pending` is true only for the first ACK of an id.
    ///
    /// ACKs for ids that are no longer pending are still routed here, so
    /// later statuses such as `delivered` and `read` reach the application.
    /// They are logged at debug and are never errors.
    Ack {
        ack: Acknowledgement,
        was_pending: bool,
    },
    ReadReceipt(ReadReceipt),
    HeartbeatResponse,
    /// Gateway-reported failure.
    GatewayError { code: String, message: String },
    /// Malformed, unknown, or client-bound-only frame.
    Dropped,
}

/// Parses inbound frames and applies deduplication and ACK bookkeeping.
pub struct MessageDispatcher {
    store: Option<Arc<dyn DedupStore>>,
    pending: PendingTracker,
}

impl MessageDispatcher {
    /// `store` is `None` when deduplication is disabled.
    pub fn new(store: Option<Arc<dyn DedupStore>>, pending: PendingTracker) -> Self {
        Self { store, pending }
    }

    pub fn pending(&self) -> &PendingTracker {
        &self.pending
    }

    pub fn store(&self) -> Option<&Arc<dyn DedupStore>> {
        self.store.as_ref()
    }

    /// Route one inbound text frame on an authenticated session.
    pub async fn dispatch(&self, text: &str) -> Dispatch {
        match decode(text) {
            Some(frame) => self.route(frame).await,
            None => Dispatch::Dropped,
        }
    }

    /// Route a frame that arrived before the handshake completed.
    ///
    /// Only `auth_response` and `error` are acted on. Application frames are
    /// dropped without touching the dedup store or the pending set.
    pub async fn dispatch_handshake(&self, text: &str) -> Dispatch {
        match decode(text) {
            Some(frame @ (Frame::AuthResponse { .. } | Frame::Error { .. })) => {
                self.route(frame).await
            }
            Some(frame) => {
                debug!(kind = frame.kind(), "dropping frame received before handshake");
                Dispatch::Dropped
            }
            None => Dispatch::Dropped,
        }
    }

    async fn route(&self, frame: Frame) -> Dispatch {
        match frame {
            Frame::AuthResponse {
                success,
                user_id,
                device_id,
                message,
            } => Dispatch::Auth {
                success,
                user_id,
                device_id,
                message,
            },
            Frame::Message {
                msg_id,
                sender_id,
                recipient_id,
                recipient_type,
                content,
                sequence_number,
                ..
            } => {
                if self.already_seen(&msg_id).await {
                    debug!(msg_id = %msg_id, sequence_number, "duplicate message dropped");
                    return Dispatch::Duplicate { msg_id };
                }
                self.mark_seen(&msg_id).await;
                Dispatch::Deliver(IncomingMessage {
                    msg_id,
                    sender_id,
                    recipient_id,
                    recipient_type,
                    content,
                    sequence_number,
                    received_at: Utc::now(),
                })
            }
            Frame::Ack {
                msg_id,
                status,
                sequence_number,
                timestamp,
            } => {
                let was_pending = self.pending.remove(&msg_id).is_some();
                if !was_pending {
                    debug!(msg_id = %msg_id, %status, "ack for unknown or settled message");
                }
                Dispatch::Ack {
                    ack: Acknowledgement {
                        msg_id,
                        status,
                        sequence_number,
                        at: timestamp.map(millis_to_datetime).unwrap_or_else(Utc::now),
                    },
                    was_pending,
                }
            }
            Frame::ReadReceipt {
                msg_id,
                reader_id,
                read_at,
            } => Dispatch::ReadReceipt(ReadReceipt {
                msg_id,
                reader_id,
                read_at: millis_to_datetime(read_at),
            }),
            Frame::HeartbeatResponse { .. } => Dispatch::HeartbeatResponse,
            Frame::Error { code, message } => Dispatch::GatewayError { code, message },
            other @ (Frame::SendMsg { .. } | Frame::Heartbeat { .. }) => {
                warn!(kind = other.kind(), "dropping client-bound frame type");
                Dispatch::Dropped
            }
        }
    }

    /// Build a message for `recipient_id` with a fresh id.
    ///
    /// Fails with [`CourierError::DuplicateMessage`] if the id is already in
    /// the dedup store.
    pub async fn prepare_outgoing(
        &self,
        identity: &ClientIdentity,
        recipient_id: &str,
        content: &str,
        recipient_type: RecipientType,
    ) -> Result<OutgoingMessage, CourierError> {
        let created_at = Utc::now();
        let msg_id = new_msg_id(identity, created_at.timestamp_millis());

        if let Some(store) = &self.store
            && store.has(&msg_id).await?
        {
            return Err(CourierError::DuplicateMessage { msg_id });
        }

        Ok(OutgoingMessage {
            msg_id,
            recipient_id: recipient_id.to_string(),
            recipient_type,
            content: content.to_string(),
            created_at,
        })
    }

    /// Record a sent id in the dedup store. Failures are logged.
    pub async fn mark_seen(&self, msg_id: &str) {
        if let Some(store) = &self.store
            && let Err(e) = store.add(msg_id).await
        {
            warn!(msg_id = %msg_id, error = %e, "failed to record message id");
        }
    }

    async fn already_seen(&self, msg_id: &str) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.has(msg_id).await {
            Ok(seen) => seen,
            Err(e) => {
                warn!(msg_id = %msg_id, error = %e, "dedup lookup failed, delivering");
                false
            }
        }
    }
}

/// The wire frame for an outgoing message.
pub fn send_frame(message: &OutgoingMessage) -> Frame {
    Frame::SendMsg {
        msg_id: message.msg_id.clone(),
        recipient_id: message.recipient_id.clone(),
        recipient_type: message.recipient_type,
        content: message.content.clone(),
        timestamp: message.created_at.timestamp_millis(),
    }
}

/// An acknowledgement the client sends for `msg_id`.
pub fn ack_frame(msg_id: &str, status: AckStatus) -> Frame {
    Frame::Ack {
        msg_id: msg_id.to_string(),
        status,
        sequence_number: None,
        timestamp: Some(Utc::now().timestamp_millis()),
    }
}

/// `{user}-{device}-{millis}-{random}`. The random part keeps ids distinct
/// within one millisecond and across devices.
pub fn new_msg_id(identity: &ClientIdentity, now_ms: i64) -> String {
    format!(
        "{}-{}-{}-{}",
        identity.user_id,
        identity.device_id,
        now_ms,
        uuid::Uuid::new_v4().simple()
    )
}

fn decode(text: &str) -> Option<Frame> {
    match Frame::decode(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "dropping inbound frame");
            None
        }
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}
