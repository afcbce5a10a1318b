// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle state machine.
//!
//! [`ConnectionManager`] is a handle. The state machine runs in a driver task
//! that owns the transport link and every timer (open, handshake deadline,
//! heartbeat, reconnect backoff) and multiplexes them with caller commands in
//! one `select!` loop, so all state mutation happens on a single task.
//!
//! ```text
//! disconnected --connect--> connecting --auth ok--> connected
//!                               |                      |  \
//!                   auth fail / timeout       lost link  disconnect
//!                               v                      v    v
//!                             failed <--exhausted-- reconnecting   disconnecting --> disconnected
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use courier_config::CourierConfig;
use courier_core::identity::{claims_from_token, url_with_token};
use courier_core::traits::transport::NORMAL_CLOSURE;
use courier_core::{
    AckStatus, ClientIdentity, ConnectionState, CourierError, DedupStore, Frame, RecipientType,
    Transport, TransportEvent, TransportLink,
};

use crate::dispatcher::{self, Dispatch, MessageDispatcher, PendingTracker};
use crate::events::{ClientEvent, EventBus, EventKind};
use crate::heartbeat::HeartbeatMonitor;
use crate::reconnect::{ReconnectionPolicy, RetryDecision};

type Reply<T> = oneshot::Sender<Result<T, CourierError>>;
type OpenFuture = Pin<Box<dyn Future<Output = Result<TransportLink, CourierError>> + Send>>;

enum Command {
    Connect(Reply<()>),
    Disconnect(oneshot::Sender<()>),
    Send {
        recipient_id: String,
        content: String,
        recipient_type: RecipientType,
        reply: Reply<String>,
    },
    ReadReceipt {
        msg_id: String,
        reply: Reply<()>,
    },
    ClearDeduplication(Reply<()>),
}

/// State readable from the handle without a round trip to the driver.
struct Shared {
    identity: RwLock<Option<ClientIdentity>>,
    token: RwLock<Option<String>>,
    events: EventBus,
    pending: PendingTracker,
}

/// Public handle to one logical messaging session.
///
/// Dropping the handle has the same effect as [`destroy`](Self::destroy).
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Create a manager and spawn its driver on the current tokio runtime.
    ///
    /// `store` is ignored when deduplication is disabled in `config`.
    pub fn new(
        config: &CourierConfig,
        transport: Arc<dyn Transport>,
        store: Option<Arc<dyn DedupStore>>,
    ) -> Result<Self, CourierError> {
        if config.client.gateway_url.trim().is_empty() {
            return Err(CourierError::Config("client.gateway_url is not set".into()));
        }
        url_with_token(&config.client.gateway_url, "")?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CourierError::Internal("ConnectionManager must be created inside a tokio runtime".into())
        })?;

        let store = if config.deduplication.enabled {
            store
        } else {
            None
        };

        let shared = Arc::new(Shared {
            identity: RwLock::new(None),
            token: RwLock::new(config.client.token.clone()),
            events: EventBus::new(),
            pending: PendingTracker::new(),
        });
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();

        let driver = Driver {
            gateway_url: config.client.gateway_url.clone(),
            connection_timeout: config.client.connection_timeout(),
            transport,
            shared: shared.clone(),
            state: state_tx,
            commands: command_rx,
            cancel: cancel.clone(),
            link: None,
            opening: None,
            handshake_deadline: None,
            reconnect_timer: None,
            heartbeat: HeartbeatMonitor::new(config.client.heartbeat_interval()),
            policy: ReconnectionPolicy::new(&config.reconnect),
            dispatcher: MessageDispatcher::new(store, shared.pending.clone()),
            waiters: Vec::new(),
        };
        runtime.spawn(driver.run());

        Ok(Self {
            commands: command_tx,
            state: state_rx,
            shared,
            cancel,
        })
    }

    /// Connect and authenticate.
    ///
    /// Returns immediately when already connected, joins an attempt already
    /// in flight, and otherwise resolves once the handshake succeeds or the
    /// session reaches `failed`.
    pub async fn connect(&self) -> Result<(), CourierError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Connect(reply))?;
        rx.await.unwrap_or(Err(CourierError::Cancelled))
    }

    /// Close the session and stop every timer. Always ends in `disconnected`.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.request(Command::Disconnect(reply)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Send a message and return its id, the correlation key for ACK events.
    ///
    /// Resolves once the frame is queued on the transport, not on delivery.
    pub async fn send_message(
        &self,
        recipient_id: &str,
        content: &str,
        recipient_type: RecipientType,
    ) -> Result<String, CourierError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Send {
            recipient_id: recipient_id.to_string(),
            content: content.to_string(),
            recipient_type,
            reply,
        })?;
        rx.await.unwrap_or(Err(CourierError::Cancelled))
    }

    /// Tell the gateway that `msg_id` was read.
    pub async fn send_read_receipt(&self, msg_id: &str) -> Result<(), CourierError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::ReadReceipt {
            msg_id: msg_id.to_string(),
            reply,
        })?;
        rx.await.unwrap_or(Err(CourierError::Cancelled))
    }

    /// Remove every entry from the deduplication store.
    pub async fn clear_deduplication(&self) -> Result<(), CourierError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::ClearDeduplication(reply))?;
        rx.await.unwrap_or(Err(CourierError::Cancelled))
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver that observes every state the driver publishes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.identity().map(|identity| identity.user_id)
    }

    pub fn device_id(&self) -> Option<String> {
        self.identity().map(|identity| identity.device_id)
    }

    pub fn identity(&self) -> Option<ClientIdentity> {
        read(&self.shared.identity).clone()
    }

    /// Install the handler for `kind`, replacing any previous one.
    pub fn on<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.shared.events.on(kind, handler);
    }

    pub fn off(&self, kind: EventKind) {
        self.shared.events.off(kind);
    }

    /// Replace the credential used by the next connection attempt.
    pub fn update_credential(&self, token: impl Into<String>) {
        *write(&self.shared.token) = Some(token.into());
    }

    /// Outbound messages still waiting for their first ACK.
    ///
    /// The set is emptied whenever the session ends in `disconnected` or
    /// `failed`; it survives a `reconnecting` cycle.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn is_pending(&self, msg_id: &str) -> bool {
        self.shared.pending.contains(msg_id)
    }

    /// Tear everything down: detach handlers, drop pending messages, close
    /// the transport, and cancel every timer. Safe in any state and
    /// idempotent. The manager accepts no further commands.
    pub fn destroy(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.shared.events.clear();
        self.shared.pending.clear();
        self.cancel.cancel();
    }

    fn request(&self, command: Command) -> Result<(), CourierError> {
        if self.cancel.is_cancelled() {
            return Err(CourierError::Cancelled);
        }
        self.commands
            .send(command)
            .map_err(|_| CourierError::Cancelled)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Owner of the link and timers. Runs until destroyed.
struct Driver {
    gateway_url: String,
    connection_timeout: Duration,
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
    state: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,

    link: Option<TransportLink>,
    opening: Option<OpenFuture>,
    handshake_deadline: Option<Pin<Box<Sleep>>>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    heartbeat: HeartbeatMonitor,

    policy: ReconnectionPolicy,
    dispatcher: MessageDispatcher,
    waiters: Vec<Reply<()>>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },

                opened = poll_slot(&mut self.opening) => {
                    self.opening = None;
                    self.on_opened(opened);
                }

                event = next_link_event(&mut self.link) => self.on_transport_event(event).await,

                _ = poll_slot(&mut self.handshake_deadline) => {
                    self.handshake_deadline = None;
                    self.on_handshake_timeout();
                }

                _ = poll_slot(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    self.begin_attempt();
                }

                _ = self.heartbeat.tick() => self.send_heartbeat(),
            }
        }
        self.teardown();
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Move to `to`, emitting one state-change event and releasing every
    /// timer the new state does not own.
    fn transition(&mut self, to: ConnectionState) {
        let from = self.current();
        if from == to {
            return;
        }
        self.state.send_replace(to);

        if to != ConnectionState::Connected {
            self.heartbeat.stop();
        }
        if to != ConnectionState::Connecting {
            self.opening = None;
            self.handshake_deadline = None;
        }
        if to != ConnectionState::Reconnecting {
            self.reconnect_timer = None;
        }
        if matches!(to, ConnectionState::Disconnected | ConnectionState::Failed) {
            *write(&self.shared.identity) = None;
            let abandoned = self.shared.pending.len();
            if abandoned > 0 {
                debug!(abandoned, "dropping unacknowledged outbound messages");
                self.shared.pending.clear();
            }
        }

        info!(%from, %to, "connection state changed");
        self.emit(ClientEvent::StateChange { from, to });
    }

    fn emit(&self, event: ClientEvent) {
        self.shared.events.emit(&event);
    }

    fn emit_error(&self, error: CourierError) {
        self.emit(ClientEvent::Error(Arc::new(error)));
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => self.on_connect(reply),
            Command::Disconnect(reply) => {
                self.on_disconnect();
                let _ = reply.send(());
            }
            Command::Send {
                recipient_id,
                content,
                recipient_type,
                reply,
            } => {
                let result = self.send_message(&recipient_id, &content, recipient_type).await;
                let _ = reply.send(result);
            }
            Command::ReadReceipt { msg_id, reply } => {
                let result = self
                    .live_link()
                    .and_then(|link| send_frame(link, &dispatcher::ack_frame(&msg_id, AckStatus::Read)));
                let _ = reply.send(result);
            }
            Command::ClearDeduplication(reply) => {
                let result = match self.dispatcher.store() {
                    Some(store) => store.clear().await,
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
        }
    }

    fn on_connect(&mut self, reply: Reply<()>) {
        match self.current() {
            ConnectionState::Connected => {
                let _ = reply.send(Ok(()));
            }
            ConnectionState::Connecting => self.waiters.push(reply),
            ConnectionState::Reconnecting => {
                debug!("explicit connect preempts reconnect backoff");
                self.waiters.push(reply);
                self.policy.reset();
                self.begin_attempt();
            }
            ConnectionState::Failed | ConnectionState::Disconnected | ConnectionState::Disconnecting => {
                self.transition(ConnectionState::Disconnected);
                self.waiters.push(reply);
                self.policy.reset();
                self.begin_attempt();
            }
        }
    }

    fn on_disconnect(&mut self) {
        match self.current() {
            ConnectionState::Disconnected => return,
            ConnectionState::Connected | ConnectionState::Connecting | ConnectionState::Disconnecting => {
                let was_connected = self.current() == ConnectionState::Connected;
                self.close_link("client disconnect");
                self.transition(ConnectionState::Disconnecting);
                self.transition(ConnectionState::Disconnected);
                if was_connected {
                    self.emit(ClientEvent::Disconnected {
                        reason: "client disconnect".into(),
                    });
                }
            }
            ConnectionState::Reconnecting | ConnectionState::Failed => {
                self.transition(ConnectionState::Disconnected);
            }
        }
        self.settle_waiters(|| Err(CourierError::Cancelled));
    }

    /// Open a fresh socket. The handshake deadline covers the open and the
    /// `auth_response`.
    fn begin_attempt(&mut self) {
        self.link = None;
        self.transition(ConnectionState::Connecting);

        let token = read(&self.shared.token).clone().unwrap_or_default();
        let url = match url_with_token(&self.gateway_url, &token) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "cannot build gateway URL");
                self.fail(e);
                return;
            }
        };
        let transport = self.transport.clone();
        debug!(transport = transport.name(), attempt = self.policy.state().attempt_count, "opening transport");

        self.opening = Some(Box::pin(async move { transport.open(&url).await }));
        self.handshake_deadline = Some(Box::pin(tokio::time::sleep(self.connection_timeout)));
    }

    fn on_opened(&mut self, opened: Result<TransportLink, CourierError>) {
        match opened {
            Ok(link) => {
                debug!("transport open, awaiting auth_response");
                self.link = Some(link);
            }
            Err(e) => {
                warn!(error = %e, "transport failed to open");
                self.on_link_lost(e);
            }
        }
    }

    fn on_handshake_timeout(&mut self) {
        let error = CourierError::HandshakeTimeout {
            duration: self.connection_timeout,
        };
        error!(timeout_ms = self.connection_timeout.as_millis() as u64, "handshake timed out");
        self.close_link("handshake timeout");
        self.fail(error);
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(text) => self.on_frame(&text).await,
            TransportEvent::Error(message) => {
                warn!(error = %message, "transport error");
                self.emit_error(CourierError::transport(message));
            }
            TransportEvent::Closed(info) => {
                self.link = None;
                info!(code = info.code, reason = %info.reason, "transport closed by peer");
                self.on_link_lost(CourierError::transport(format!(
                    "connection closed ({}): {}",
                    info.code, info.reason
                )));
            }
        }
    }

    /// A socket closed or failed without the caller asking for it.
    fn on_link_lost(&mut self, cause: CourierError) {
        self.link = None;
        let state = self.current();
        if state == ConnectionState::Connected {
            self.emit(ClientEvent::Disconnected {
                reason: cause.to_string(),
            });
        }
        if !matches!(state, ConnectionState::Connected | ConnectionState::Connecting) {
            return;
        }

        match self.policy.next_retry() {
            RetryDecision::Retry { attempt, delay } => {
                self.transition(ConnectionState::Reconnecting);
                info!(attempt, max_attempts = self.policy.max_attempts(), delay_ms = delay.as_millis() as u64, "scheduling reconnect");
                self.emit(ClientEvent::Reconnecting {
                    attempt,
                    max_attempts: self.policy.max_attempts(),
                    delay,
                });
                self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
            }
            RetryDecision::Exhausted { attempts } => {
                error!(attempts, "reconnection attempts exhausted");
                self.fail(CourierError::ReconnectExhausted { attempts });
            }
            RetryDecision::Disabled if state == ConnectionState::Connecting => self.fail(cause),
            RetryDecision::Disabled => self.transition(ConnectionState::Disconnected),
        }
    }

    async fn on_frame(&mut self, text: &str) {
        let routed = if self.current() == ConnectionState::Connected {
            self.dispatcher.dispatch(text).await
        } else {
            self.dispatcher.dispatch_handshake(text).await
        };
        match routed {
            Dispatch::Auth {
                success,
                user_id,
                device_id,
                message,
            } => self.on_auth(success, user_id, device_id, message),
            Dispatch::Deliver(message) => {
                let msg_id = message.msg_id.clone();
                debug!(msg_id = %msg_id, sender = %message.sender_id, "message received");
                self.emit(ClientEvent::Message(message));
                if let Some(link) = &self.link
                    && let Err(e) = send_frame(link, &dispatcher::ack_frame(&msg_id, AckStatus::Received))
                {
                    warn!(msg_id = %msg_id, error = %e, "failed to acknowledge message");
                    self.emit_error(e);
                }
            }
            Dispatch::Duplicate { .. } | Dispatch::Dropped => {}
            Dispatch::Ack { ack, .. } => self.emit(ClientEvent::Ack(ack)),
            Dispatch::ReadReceipt(receipt) => self.emit(ClientEvent::ReadReceipt(receipt)),
            Dispatch::HeartbeatResponse => self.heartbeat.record_response(),
            Dispatch::GatewayError { code, message } => {
                warn!(%code, %message, "gateway reported error");
                self.emit_error(CourierError::Gateway { code, message });
            }
        }
    }

    fn on_auth(
        &mut self,
        success: bool,
        user_id: Option<String>,
        device_id: Option<String>,
        message: Option<String>,
    ) {
        if self.current() != ConnectionState::Connecting {
            debug!("ignoring auth_response outside handshake");
            return;
        }

        if !success {
            let error = CourierError::Authentication {
                message: message.unwrap_or_else(|| "credential rejected".into()),
            };
            error!(error = %error, "handshake rejected");
            self.close_link("authentication rejected");
            self.fail(error);
            return;
        }

        let claims = read(&self.shared.token)
            .as_deref()
            .and_then(claims_from_token);
        let identity = ClientIdentity {
            user_id: user_id
                .or_else(|| claims.as_ref().map(|c| c.user_id.clone()))
                .unwrap_or_default(),
            device_id: device_id
                .or_else(|| claims.map(|c| c.device_id))
                .unwrap_or_default(),
        };

        *write(&self.shared.identity) = Some(identity.clone());
        self.policy.reset();
        self.transition(ConnectionState::Connected);
        self.heartbeat.start();
        info!(user_id = %identity.user_id, device_id = %identity.device_id, "authenticated");
        self.emit(ClientEvent::Connected(identity));
        self.settle_waiters(|| Ok(()));
    }

    async fn send_message(
        &mut self,
        recipient_id: &str,
        content: &str,
        recipient_type: RecipientType,
    ) -> Result<String, CourierError> {
        self.live_link()?;
        let identity = read(&self.shared.identity).clone().ok_or(CourierError::NotConnected {
            state: self.current(),
        })?;

        let message = self
            .dispatcher
            .prepare_outgoing(&identity, recipient_id, content, recipient_type)
            .await?;
        let msg_id = message.msg_id.clone();
        let frame = dispatcher::send_frame(&message);

        self.shared.pending.insert(message);
        if let Err(e) = self.live_link().and_then(|link| send_frame(link, &frame)) {
            self.shared.pending.remove(&msg_id);
            return Err(e);
        }
        self.dispatcher.mark_seen(&msg_id).await;

        debug!(msg_id = %msg_id, recipient = %recipient_id, "message sent");
        Ok(msg_id)
    }

    fn send_heartbeat(&mut self) {
        let now = tokio::time::Instant::now();
        if self.heartbeat.is_stale(now) {
            warn!("no heartbeat response within two intervals");
        }
        let frame = self.heartbeat.probe(chrono::Utc::now().timestamp_millis());
        if let Some(link) = &self.link
            && let Err(e) = send_frame(link, &frame)
        {
            warn!(error = %e, "heartbeat send failed");
            self.emit_error(e);
        }
    }

    /// The link, if the session is usable for application traffic.
    fn live_link(&self) -> Result<&TransportLink, CourierError> {
        let state = self.current();
        match (&self.link, state) {
            (Some(link), ConnectionState::Connected) => Ok(link),
            _ => Err(CourierError::NotConnected { state }),
        }
    }

    fn close_link(&mut self, reason: &str) {
        self.opening = None;
        if let Some(link) = self.link.take() {
            link.close(NORMAL_CLOSURE, reason);
        }
    }

    /// Enter `failed`, report `error`, and reject pending `connect()` calls.
    fn fail(&mut self, error: CourierError) {
        self.transition(ConnectionState::Failed);
        self.settle_waiters(|| Err(replicate(&error)));
        self.emit_error(error);
    }

    fn settle_waiters(&mut self, outcome: impl Fn() -> Result<(), CourierError>) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(outcome());
        }
    }

    fn teardown(&mut self) {
        self.close_link("client destroyed");
        self.handshake_deadline = None;
        self.reconnect_timer = None;
        self.heartbeat.stop();
        self.settle_waiters(|| Err(CourierError::Cancelled));
        self.transition(ConnectionState::Disconnected);
        debug!("connection manager destroyed");
    }
}

fn send_frame(link: &TransportLink, frame: &Frame) -> Result<(), CourierError> {
    link.send(frame.encode()?)
}

/// Poll an optional future; an empty slot never resolves.
async fn poll_slot<F>(slot: &mut Option<F>) -> F::Output
where
    F: Future + Unpin,
{
    match slot {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn next_link_event(link: &mut Option<TransportLink>) -> TransportEvent {
    match link {
        Some(link) => link.next_event().await,
        None => std::future::pending().await,
    }
}

/// A copy of a connection failure for each waiting `connect()` caller.
fn replicate(error: &CourierError) -> CourierError {
    match error {
        CourierError::Transport { message, .. } => CourierError::transport(message.clone()),
        CourierError::Authentication { message } => CourierError::Authentication {
            message: message.clone(),
        },
        CourierError::HandshakeTimeout { duration } => CourierError::HandshakeTimeout {
            duration: *duration,
        },
        CourierError::ReconnectExhausted { attempts } => CourierError::ReconnectExhausted {
            attempts: *attempts,
        },
        CourierError::Cancelled => CourierError::Cancelled,
        other => CourierError::Internal(other.to_string()),
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
