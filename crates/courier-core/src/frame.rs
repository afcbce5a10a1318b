// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire frames exchanged with the messaging gateway.
//!
//! Every frame is a JSON object discriminated by its `type` field:
//!
//! ```json
//! {"type": "auth_response", "success": true, "user_id": "u1", "device_id": "d1"}
//! {"type": "send_msg", "msg_id": "...", "recipient_id": "u2", "recipient_type": "user", "content": "hi", "timestamp": 1767225600000}
//! {"type": "message", "msg_id": "...", "sender_id": "u2", "recipient_id": "u1", "recipient_type": "user", "content": "yo", "sequence_number": 42}
//! {"type": "ack", "msg_id": "...", "status": "delivered"}
//! {"type": "heartbeat", "timestamp": 1767225600000}
//! {"type": "heartbeat_response", "timestamp": 1767225600000}
//! {"type": "read_receipt", "msg_id": "...", "reader_id": "u2", "read_at": 1767225600000}
//! {"type": "error", "code": "rate_limited", "message": "slow down"}
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CourierError;
use crate::types::{AckStatus, RecipientType};

/// Frame type names this client understands.
pub const KNOWN_FRAME_TYPES: &[&str] = &[
    "auth_response",
    "send_msg",
    "message",
    "ack",
    "heartbeat",
    "heartbeat_response",
    "read_receipt",
    "error",
];

/// A single text frame on the gateway connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Gateway verdict on the credential presented at connect time.
    AuthResponse {
        success: bool,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Outbound application message.
    SendMsg {
        msg_id: String,
        recipient_id: String,
        recipient_type: RecipientType,
        content: String,
        timestamp: i64,
    },

    /// Inbound application message.
    Message {
        msg_id: String,
        sender_id: String,
        recipient_id: String,
        recipient_type: RecipientType,
        content: String,
        sequence_number: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Delivery status update. Sent in both directions.
    Ack {
        msg_id: String,
        status: AckStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sequence_number: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },

    /// Liveness probe.
    Heartbeat { timestamp: i64 },

    /// Reply to a liveness probe.
    HeartbeatResponse {
        #[serde(default)]
        timestamp: Option<i64>,
    },

    /// A peer has read a message.
    ReadReceipt {
        msg_id: String,
        reader_id: String,
        read_at: i64,
    },

    /// Gateway-reported failure.
    Error {
        #[serde(deserialize_with = "string_or_number")]
        code: String,
        message: String,
    },
}

impl Frame {
    /// Parses a text frame.
    ///
    /// Unknown `type` values and malformed payloads both map to
    /// [`CourierError::Protocol`]; the caller decides whether to drop them.
    pub fn decode(text: &str) -> Result<Self, CourierError> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| CourierError::protocol(format!("frame is not valid JSON: {e}")))?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| CourierError::protocol("frame has no `type` field"))?;

        if !KNOWN_FRAME_TYPES.contains(&kind) {
            return Err(CourierError::protocol(format!(
                "unrecognized frame type `{kind}`"
            )));
        }

        let kind = kind.to_string();
        serde_json::from_value(value)
            .map_err(|e| CourierError::protocol(format!("malformed `{kind}` frame: {e}")))
    }

    /// Serializes the frame to its wire text.
    pub fn encode(&self) -> Result<String, CourierError> {
        serde_json::to_string(self)
            .map_err(|e| CourierError::Internal(format!("failed to encode frame: {e}")))
    }

    /// The wire `type` discriminator of this frame.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::AuthResponse { .. } => "auth_response",
            Frame::SendMsg { .. } => "send_msg",
            Frame::Message { .. } => "message",
            Frame::Ack { .. } => "ack",
            Frame::Heartbeat { .. } => "heartbeat",
            Frame::HeartbeatResponse { .. } => "heartbeat_response",
            Frame::ReadReceipt { .. } => "read_receipt",
            Frame::Error { .. } => "error",
        }
    }
}

/// Gateways disagree on whether error codes are strings or integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(i64),
    }

    Ok(match Code::deserialize(deserializer)? {
        Code::Text(s) => s,
        Code::Number(n) => n.to_string(),
    })
}
