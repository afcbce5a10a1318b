// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use courier_client::{ClientEvent, ConnectionManager, EventKind, WsTransport};
use courier_config::CourierConfig;
use courier_core::{
    Acknowledgement, ConnectionState, CourierError, DedupStore, RecipientType, Transport,
};
use courier_storage::{ManagedStore, open_store};

use crate::shutdown::install_signal_handler;

const EVENT_KINDS: [EventKind; 8] = [
    EventKind::Connected,
    EventKind::Disconnected,
    EventKind::Error,
    EventKind::Message,
    EventKind::Ack,
    EventKind::ReadReceipt,
    EventKind::StateChange,
    EventKind::Reconnecting,
];

/// `courier listen`
pub async fn listen(config: &CourierConfig) -> Result<(), CourierError> {
    let store = open_configured_store(config).await?;
    let shutdown = install_signal_handler();
    let result = run_listen(
        config,
        Arc::new(WsTransport::new()),
        store.clone().map(|s| s as Arc<dyn DedupStore>),
        shutdown,
    )
    .await;
    close_store(store).await;
    result
}

/// `courier send`
pub async fn send(
    config: &CourierConfig,
    to: &str,
    group: bool,
    content: &str,
) -> Result<(), CourierError> {
    let store = open_configured_store(config).await?;
    let recipient_type = if group {
        RecipientType::Group
    } else {
        RecipientType::User
    };
    let result = run_send(
        config,
        Arc::new(WsTransport::new()),
        store.clone().map(|s| s as Arc<dyn DedupStore>),
        to,
        recipient_type,
        content,
    )
    .await;
    close_store(store).await;

    let ack = result?;
    println!("{} {}", ack.msg_id, ack.status);
    Ok(())
}

/// `courier config`
pub fn print_config(config: &CourierConfig) -> Result<(), CourierError> {
    print!("{}", render_config(config)?);
    Ok(())
}

async fn run_listen(
    config: &CourierConfig,
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn DedupStore>>,
    shutdown: CancellationToken,
) -> Result<(), CourierError> {
    let manager = ConnectionManager::new(config, transport, store)?;
    for kind in EVENT_KINDS {
        manager.on(kind, |event| println!("{}", describe(event)));
    }

    manager.connect().await?;
    info!(user_id = ?manager.user_id(), "listening, press Ctrl+C to stop");

    let mut states = manager.watch_state();
    let failed = async move {
        while states.changed().await.is_ok() {
            if *states.borrow() == ConnectionState::Failed {
                break;
            }
        }
    };
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = failed => warn!("session failed, exiting"),
    }

    manager.disconnect().await;
    manager.destroy();
    Ok(())
}

/// Connect, send one message, and wait for its first ACK.
async fn run_send(
    config: &CourierConfig,
    transport: Arc<dyn Transport>,
    store: Option<Arc<dyn DedupStore>>,
    to: &str,
    recipient_type: RecipientType,
    content: &str,
) -> Result<Acknowledgement, CourierError> {
    let manager = ConnectionManager::new(config, transport, store)?;
    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
    manager.on(EventKind::Ack, move |event| {
        if let ClientEvent::Ack(ack) = event {
            let _ = ack_tx.send(ack.clone());
        }
    });

    manager.connect().await?;
    let msg_id = manager.send_message(to, content, recipient_type).await?;
    info!(msg_id = %msg_id, recipient = %to, "message sent, awaiting acknowledgement");

    let timeout = config.client.connection_timeout();
    let waited = tokio::time::timeout(timeout, async {
        while let Some(ack) = ack_rx.recv().await {
            if ack.msg_id == msg_id {
                return Some(ack);
            }
        }
        None
    })
    .await;

    manager.disconnect().await;
    match waited {
        Ok(Some(ack)) => Ok(ack),
        Ok(None) => Err(CourierError::Cancelled),
        Err(_) => Err(CourierError::transport(format!(
            "no acknowledgement for {msg_id} within {timeout:?}"
        ))),
    }
}

async fn open_configured_store(
    config: &CourierConfig,
) -> Result<Option<Arc<ManagedStore>>, CourierError> {
    if !config.deduplication.enabled {
        return Ok(None);
    }
    open_store(&config.deduplication).await.map(Some)
}

async fn close_store(store: Option<Arc<ManagedStore>>) {
    if let Some(store) = store
        && let Err(e) = store.shutdown().await
    {
        warn!(error = %e, "failed to close dedup store");
    }
}

/// Effective configuration as TOML with the credential masked.
fn render_config(config: &CourierConfig) -> Result<String, CourierError> {
    let mut shown = config.clone();
    if shown.client.token.is_some() {
        shown.client.token = Some("<redacted>".to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| CourierError::Internal(format!("failed to render configuration: {e}")))
}

/// One line per event for the terminal.
fn describe(event: &ClientEvent) -> String {
    match event {
        ClientEvent::Connected(identity) => {
            format!("connected as {} ({})", identity.user_id, identity.device_id)
        }
        ClientEvent::Disconnected { reason } => format!("disconnected: {reason}"),
        ClientEvent::Error(e) => format!("error: {e}"),
        ClientEvent::Message(msg) => format!(
            "[{}] {} -> {}: {}",
            msg.msg_id, msg.sender_id, msg.recipient_id, msg.content
        ),
        ClientEvent::Ack(ack) => format!("ack {} {}", ack.msg_id, ack.status),
        ClientEvent::ReadReceipt(receipt) => format!(
            "read {} by {} at {}",
            receipt.msg_id,
            receipt.reader_id,
            receipt.read_at.to_rfc3339()
        ),
        ClientEvent::StateChange { from, to } => format!("state {from} -> {to}"),
        ClientEvent::Reconnecting {
            attempt,
            max_attempts,
            delay,
        } => format!(
            "reconnecting {attempt}/{max_attempts} in {}ms",
            delay.as_millis()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use courier_core::AckStatus;
    use courier_test_utils::{MockTransport, frames};

    fn config() -> CourierConfig {
        let mut config = CourierConfig::default();
        config.client.gateway_url = "ws://gateway.test/ws".into();
        config.client.token = Some("secret-token".into());
        config.client.connection_timeout_ms = 500;
        config.deduplication.enabled = false;
        config
    }

    #[test]
    fn rendered_config_hides_token() {
        let rendered = render_config(&config()).unwrap();
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("gateway_url = \"ws://gateway.test/ws\""));
    }

    #[test]
    fn describes_state_changes_and_backoff() {
        let change = ClientEvent::StateChange {
            from: ConnectionState::Connected,
            to: ConnectionState::Reconnecting,
        };
        assert_eq!(describe(&change), "state connected -> reconnecting");

        let backoff = ClientEvent::Reconnecting {
            attempt: 2,
            max_attempts: 5,
            delay: Duration::from_millis(2_000),
        };
        assert_eq!(describe(&backoff), "reconnecting 2/5 in 2000ms");
    }

    #[tokio::test(start_paused = true)]
    async fn send_returns_first_matching_ack() {
        let transport = Arc::new(MockTransport::new());
        let gateway = transport.clone();

        let sending = tokio::spawn(async move {
            run_send(&config(), transport, None, "u2", RecipientType::User, "hi").await
        });

        let peer = gateway.next_peer().await;
        let msg_id = loop {
            if let Some(courier_core::Frame::SendMsg { msg_id, .. }) =
                peer.sent_of_kind("send_msg").into_iter().next()
            {
                break msg_id;
            }
            tokio::task::yield_now().await;
        };
        peer.push_frame(&frames::ack("other", AckStatus::Delivered));
        peer.push_frame(&frames::ack(&msg_id, AckStatus::Sent));

        let ack = sending.await.unwrap().unwrap();
        assert_eq!(ack.msg_id, msg_id);
        assert_eq!(ack.status, AckStatus::Sent);
    }

    #[tokio::test(start_paused = true)]
    async fn send_times_out_without_ack() {
        let transport = Arc::new(MockTransport::new());
        let err = run_send(&config(), transport, None, "u2", RecipientType::User, "hi")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no acknowledgement"));
    }

    #[tokio::test(start_paused = true)]
    async fn listen_stops_on_shutdown() {
        let transport = Arc::new(MockTransport::new());
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        let listening = tokio::spawn(async move {
            run_listen(&config(), transport, None, shutdown).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.cancel();

        listening.await.unwrap().unwrap();
    }
}
