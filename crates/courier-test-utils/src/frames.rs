// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for frames a gateway would send.

use courier_core::{AckStatus, Frame, RecipientType};

pub fn auth_ok(user_id: &str, device_id: &str) -> Frame {
    Frame::AuthResponse {
        success: true,
        user_id: Some(user_id.to_string()),
        device_id: Some(device_id.to_string()),
        message: None,
    }
}

pub fn auth_rejected(reason: &str) -> Frame {
    Frame::AuthResponse {
        success: false,
        user_id: None,
        device_id: None,
        message: Some(reason.to_string()),
    }
}

/// A direct message from `sender_id` to the test user `u1`.
pub fn message(msg_id: &str, sender_id: &str, content: &str, sequence_number: u64) -> Frame {
    Frame::Message {
        msg_id: msg_id.to_string(),
        sender_id: sender_id.to_string(),
        recipient_id: "u1".to_string(),
        recipient_type: RecipientType::User,
        content: content.to_string(),
        sequence_number,
        timestamp: None,
    }
}

pub fn ack(msg_id: &str, status: AckStatus) -> Frame {
    Frame::Ack {
        msg_id: msg_id.to_string(),
        status,
        sequence_number: None,
        timestamp: None,
    }
}

pub fn read_receipt(msg_id: &str, reader_id: &str, read_at: i64) -> Frame {
    Frame::ReadReceipt {
        msg_id: msg_id.to_string(),
        reader_id: reader_id.to_string(),
        read_at,
    }
}

pub fn heartbeat_response() -> Frame {
    Frame::HeartbeatResponse { timestamp: None }
}

pub fn gateway_error(code: &str, message: &str) -> Frame {
    Frame::Error {
        code: code.to_string(),
        message: message.to_string(),
    }
}
