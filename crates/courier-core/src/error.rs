// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Courier messaging client.

use thiserror::Error;

use crate::types::ConnectionState;

/// The primary error type used across the Courier client, stores, and transports.
#[derive(Debug, Error)]
pub enum CourierError {
    /// Socket-level failure before or during the handshake, or while connected.
    ///
    /// Feeds the reconnection policy rather than failing the session outright.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The gateway explicitly rejected the credential during the handshake.
    #[error("authentication rejected: {message}")]
    Authentication { message: String },

    /// No `auth_response` arrived within the configured connection timeout.
    #[error("handshake timed out after {duration:?}")]
    HandshakeTimeout { duration: std::time::Duration },

    /// An inbound frame was malformed or of an unrecognized type.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// A freshly generated message id is already present in the dedup store.
    #[error("duplicate message id `{msg_id}`")]
    DuplicateMessage { msg_id: String },

    /// An operation that needs a live session was attempted outside `connected`.
    #[error("not connected (state: {state})")]
    NotConnected { state: ConnectionState },

    /// The reconnection policy ran out of attempts.
    #[error("reconnection failed after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// The gateway reported an error frame.
    #[error("gateway error {code}: {message}")]
    Gateway { code: String, message: String },

    /// Deduplication backend errors (database open, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A pending `connect()` was abandoned by `disconnect()` or `destroy()`.
    #[error("operation cancelled")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CourierError {
    /// Builds a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Whether the reconnection policy should retry after this error.
    ///
    /// Only transport failures are retried: a rejected or silent handshake
    /// would fail the same way with the same credential.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
