// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the client, the stores, and the wire codec.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle state of a connection manager.
///
/// Exactly one state holds at any time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Disconnecting,
    Failed,
}

/// Whether a message is addressed to a single user or a group.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecipientType {
    #[default]
    User,
    Group,
}

/// Delivery progress of an outbound message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Pending,
    Sent,
    Delivered,
    Received,
    Read,
    Failed,
}

impl AckStatus {
    /// Position in the delivery progression. `Failed` sits outside it.
    pub fn rank(self) -> u8 {
        match self {
            AckStatus::Pending => 0,
            AckStatus::Sent => 1,
            AckStatus::Delivered => 2,
            AckStatus::Received => 3,
            AckStatus::Read => 4,
            AckStatus::Failed => u8::MAX,
        }
    }

    /// Whether no further status is expected for the message.
    pub fn is_terminal(self) -> bool {
        matches!(self, AckStatus::Read | AckStatus::Failed)
    }
}

/// Identity of the authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub user_id: String,
    pub device_id: String,
}

/// A message created by this client, owned until acknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub msg_id: String,
    pub recipient_id: String,
    pub recipient_type: RecipientType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A message delivered by the gateway.
///
/// `sequence_number` is gateway-assigned and only used for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub msg_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub recipient_type: RecipientType,
    pub content: String,
    pub sequence_number: u64,
    pub received_at: DateTime<Utc>,
}

/// A status update correlated to an outbound message id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub msg_id: String,
    pub status: AckStatus,
    pub sequence_number: Option<u64>,
    pub at: DateTime<Utc>,
}

/// Notification that a peer has read a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub msg_id: String,
    pub reader_id: String,
    pub read_at: DateTime<Utc>,
}

/// A message id recorded by a deduplication store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeduplicationEntry {
    pub msg_id: String,
    /// Milliseconds since the Unix epoch.
    pub first_seen_at: i64,
}

/// Progress through the reconnection policy.
///
/// Reset to zero only when the manager enters `connected`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectState {
    pub attempt_count: u32,
    pub next_delay_ms: u64,
}
