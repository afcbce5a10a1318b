// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Network transports implementing [`courier_core::Transport`].

pub mod ws;

pub use ws::WsTransport;
