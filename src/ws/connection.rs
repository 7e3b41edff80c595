#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;
use futures::{SinkExt as _, StreamExt as _};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep, interval_at, sleep};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::config::{Config, ConfigUpdate, RECONNECT_DELAY_CEILING};
use super::error::WsError;
use super::events::{EventBus, ListenerToken, MessageCallback, StatusCallback};
use super::frame::{self, Heartbeat, InboundFrame};
use super::queue::OutboundQueue;
use super::state::{ConnectionEvent, ConnectionStatus, Effect, transition};
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type OpenFuture =
    Pin<Box<dyn Future<Output = std::result::Result<WsStream, tungstenite::Error>> + Send>>;

/// Broadcast channel capacity for decoded application payloads.
const BROADCAST_CAPACITY: usize = 1024;

/// Commands the public handle sends to the owning actor task.
enum Command {
    Connect { url: Option<String> },
    Disconnect,
    Send { payload: String },
    ForceReconnect,
    UpdateConfig(ConfigUpdate),
    AddMessageListener {
        token: ListenerToken,
        callback: MessageCallback,
    },
    AddStatusListener {
        token: ListenerToken,
        callback: StatusCallback,
    },
    RemoveListener { token: ListenerToken },
    Cleanup,
}

/// Observable counters written only by the actor task.
struct Shared {
    attempts: AtomicU32,
    max_attempts: AtomicU32,
    queued: AtomicUsize,
    last_error: RwLock<Option<String>>,
}

/// Handle for removing a registered listener.
///
/// Removal is explicit: dropping the handle leaves the listener registered
/// for the lifetime of the connection manager.
pub struct Subscription {
    token: ListenerToken,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    /// The opaque token identifying this listener.
    #[must_use]
    pub fn token(&self) -> ListenerToken {
        self.token
    }

    /// Remove the listener. Removing an already-removed listener is a no-op.
    pub fn unsubscribe(self) {
        drop(self.cmd_tx.send(Command::RemoveListener { token: self.token }));
    }
}

/// Manages the lifecycle of a single persistent WebSocket connection.
///
/// The manager keeps a logical "always connected" channel alive over an
/// unreliable transport: it establishes the socket, detects silent death via
/// application-level heartbeats, reconnects with bounded exponential backoff,
/// buffers outbound traffic while disconnected, and fans inbound payloads and
/// status transitions out to subscribers.
///
/// All state lives in a single owning actor task; the handle is cheap to
/// clone and every method returns immediately. Outcomes are observed
/// asynchronously through [`ConnectionManager::on_status_change`],
/// [`ConnectionManager::status_receiver`], or the getter methods.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::new(Config::default());
/// let mut rx = manager.subscribe();
/// manager.connect();
///
/// while let Ok(payload) = rx.recv().await {
///     println!("received: {payload}");
/// }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
    broadcast_tx: broadcast::Sender<Value>,
    shared: Arc<Shared>,
    next_token: Arc<AtomicU64>,
}

impl ConnectionManager {
    /// Create a new connection manager and spawn its actor task.
    ///
    /// The manager starts disconnected; call [`ConnectionManager::connect`]
    /// to establish the socket. Must be called within a Tokio runtime.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        let shared = Arc::new(Shared {
            attempts: AtomicU32::new(0),
            max_attempts: AtomicU32::new(config.max_reconnect_attempts),
            queued: AtomicUsize::new(0),
            last_error: RwLock::new(None),
        });

        let actor = ConnectionActor {
            cmd_rx,
            status_tx,
            broadcast_tx: broadcast_tx.clone(),
            shared: Arc::clone(&shared),
            bus: EventBus::new(ConnectionStatus::Disconnected),
            queue: OutboundQueue::new(config.max_queued_messages),
            backoff: (&config).into(),
            config,
            status: ConnectionStatus::Disconnected,
            attempts: 0,
            socket: None,
            opening: None,
            heartbeat: None,
            pong_deadline: None,
            reconnect_timer: None,
        };
        tokio::spawn(actor.run());

        Self {
            cmd_tx,
            status_rx,
            broadcast_tx,
            shared,
            next_token: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open the socket to the configured endpoint.
    ///
    /// A no-op while an open is already in flight. Closes any existing socket
    /// first.
    pub fn connect(&self) {
        drop(self.cmd_tx.send(Command::Connect { url: None }));
    }

    /// Open the socket to `url`, updating the configured endpoint for this
    /// and all future attempts.
    pub fn connect_to(&self, url: impl Into<String>) {
        drop(self.cmd_tx.send(Command::Connect {
            url: Some(url.into()),
        }));
    }

    /// Close the socket with a normal-closure code and stop reconnecting.
    ///
    /// Always safe and idempotent. Queued outbound payloads survive for the
    /// next connect.
    pub fn disconnect(&self) {
        drop(self.cmd_tx.send(Command::Disconnect));
    }

    /// Serialize `payload` and send it, or queue it until the socket is
    /// writable.
    ///
    /// Transport state never produces an error here: while disconnected the
    /// payload is buffered and delivered, in order, on the next successful
    /// connect. An `Err` means the payload itself failed to serialize, or the
    /// manager was already cleaned up.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let payload = serde_json::to_string(payload)?;
        self.cmd_tx
            .send(Command::Send { payload })
            .map_err(|_e| WsError::ManagerGone)?;
        Ok(())
    }

    /// Reset the reconnect budget and force a fresh connection cycle.
    ///
    /// If a socket exists it is closed through the unclean path, which
    /// guarantees an immediate reconnect because the attempt counter was just
    /// reset; otherwise this connects directly.
    pub fn force_reconnect(&self) {
        drop(self.cmd_tx.send(Command::ForceReconnect));
    }

    /// Merge a partial configuration update.
    ///
    /// Takes effect on the next connect attempt, never mid-flight.
    pub fn update_config(&self, update: ConfigUpdate) {
        drop(self.cmd_tx.send(Command::UpdateConfig(update)));
    }

    /// Terminal teardown: disconnect, clear all timers, and drop every
    /// registered listener. The actor task exits.
    pub fn cleanup(&self) {
        drop(self.cmd_tx.send(Command::Cleanup));
    }

    /// Register a callback for every inbound application payload.
    ///
    /// Payloads are forwarded verbatim; validation is the subscriber's
    /// responsibility. Heartbeat replies never reach message listeners.
    pub fn on_message(&self, callback: impl Fn(&Value) + Send + 'static) -> Subscription {
        let token = self.mint_token();
        drop(self.cmd_tx.send(Command::AddMessageListener {
            token,
            callback: Box::new(callback),
        }));
        Subscription {
            token,
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Register a callback for status transitions.
    ///
    /// Fires only when the status actually changes; a repeated identical
    /// status never notifies twice.
    pub fn on_status_change(
        &self,
        callback: impl Fn(ConnectionStatus) + Send + 'static,
    ) -> Subscription {
        let token = self.mint_token();
        drop(self.cmd_tx.send(Command::AddStatusListener {
            token,
            callback: Box::new(callback),
        }));
        Subscription {
            token,
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Subscribe to decoded application payloads.
    ///
    /// Each call returns a new independent receiver. Multiple subscribers can
    /// receive payloads concurrently without blocking each other.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.broadcast_tx.subscribe()
    }

    /// Subscribe to connection status changes.
    ///
    /// Useful for detecting reconnections and re-establishing application
    /// state from async contexts.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Whether the connection is currently established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// The most recent externally meaningful failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.shared
            .last_error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reconnect attempts made since the last successful connection.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Number of outbound payloads waiting for a writable socket.
    #[must_use]
    pub fn queued_messages(&self) -> usize {
        self.shared.queued.load(Ordering::SeqCst)
    }

    /// Whether the reconnect budget still allows another attempt.
    #[must_use]
    pub fn can_reconnect(&self) -> bool {
        self.shared.attempts.load(Ordering::SeqCst)
            < self.shared.max_attempts.load(Ordering::SeqCst)
    }

    fn mint_token(&self) -> ListenerToken {
        ListenerToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }
}

/// The owning actor: exclusive holder of the socket, timers, queue, state
/// machine, and listener registries. All mutation is serialized through its
/// single task, so no field needs a lock.
struct ConnectionActor {
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    config: Config,
    status: ConnectionStatus,
    status_tx: watch::Sender<ConnectionStatus>,
    broadcast_tx: broadcast::Sender<Value>,
    shared: Arc<Shared>,
    bus: EventBus,
    queue: OutboundQueue,
    backoff: ExponentialBackoff,
    attempts: u32,
    socket: Option<WsStream>,
    opening: Option<OpenFuture>,
    heartbeat: Option<Interval>,
    pong_deadline: Option<Pin<Box<Sleep>>>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
}

impl ConnectionActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                maybe_cmd = self.cmd_rx.recv() => {
                    match maybe_cmd {
                        Some(Command::Cleanup) | None => {
                            self.teardown().await;
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
                opened = poll_open(&mut self.opening), if self.opening.is_some() => {
                    self.opening = None;
                    self.handle_open_result(opened).await;
                }
                event = next_frame(&mut self.socket), if self.socket.is_some() => {
                    self.handle_socket_event(event).await;
                }
                () = tick(&mut self.heartbeat), if self.heartbeat.is_some() => {
                    self.send_probe().await;
                }
                () = expire(&mut self.pong_deadline), if self.pong_deadline.is_some() => {
                    self.pong_deadline = None;
                    self.handle_heartbeat_timeout().await;
                }
                () = expire(&mut self.reconnect_timer), if self.reconnect_timer.is_some() => {
                    self.reconnect_timer = None;
                    self.handle_reconnect_fired().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { url } => {
                // Re-entrant connect while a socket is mid-open is a no-op,
                // including any url it carries.
                if self.status == ConnectionStatus::Connecting {
                    return;
                }
                if let Some(url) = url {
                    self.config.url = url;
                }
                self.begin_connect().await;
            }
            Command::Disconnect => {
                self.opening = None;
                self.close_socket(true).await;
                self.apply(ConnectionEvent::DisconnectRequested).await;
            }
            Command::Send { payload } => self.handle_send(payload).await,
            Command::ForceReconnect => {
                self.reset_attempts();
                if self.socket.is_some() {
                    // Counter was just reset, so the recovery path is
                    // guaranteed to arm a fresh cycle.
                    self.close_socket(false).await;
                    self.apply(ConnectionEvent::UncleanClosed).await;
                } else {
                    self.opening = None;
                    self.begin_connect().await;
                }
            }
            Command::UpdateConfig(update) => {
                self.config.apply(update);
                self.shared
                    .max_attempts
                    .store(self.config.max_reconnect_attempts, Ordering::SeqCst);
                self.queue.set_max(self.config.max_queued_messages);
            }
            Command::AddMessageListener { token, callback } => {
                self.bus.add_message(token, callback);
            }
            Command::AddStatusListener { token, callback } => {
                self.bus.add_status(token, callback);
            }
            Command::RemoveListener { token } => self.bus.remove(token),
            Command::Cleanup => {
                // Handled in the run loop so it can break.
            }
        }
    }

    /// Transition into `Connecting` and start an open attempt.
    async fn begin_connect(&mut self) {
        self.close_socket(true).await;
        self.apply(ConnectionEvent::ConnectRequested).await;
        self.record_error(None);

        match url::Url::parse(&self.config.url) {
            Ok(_) => {
                let endpoint = self.config.url.clone();
                self.opening = Some(Box::pin(async move {
                    connect_async(endpoint).await.map(|(stream, _response)| stream)
                }));
            }
            Err(e) => {
                // Construction failure: the transport cannot be instantiated.
                #[cfg(feature = "tracing")]
                tracing::error!(url = %self.config.url, error = %e, "invalid WebSocket endpoint");
                self.record_error(Some(WsError::InvalidUrl(e).to_string()));
                self.apply(ConnectionEvent::ConstructionFailed).await;
            }
        }
    }

    async fn handle_open_result(
        &mut self,
        result: std::result::Result<WsStream, tungstenite::Error>,
    ) {
        match result {
            Ok(stream) => {
                #[cfg(feature = "tracing")]
                tracing::info!(url = %self.config.url, "WebSocket connected");
                self.socket = Some(stream);
                self.apply(ConnectionEvent::OpenSucceeded).await;
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(url = %self.config.url, error = %e, "unable to connect");
                self.record_error(Some(WsError::Connection(e).to_string()));
                self.apply(ConnectionEvent::OpenFailed).await;
            }
        }
    }

    async fn handle_socket_event(
        &mut self,
        event: Option<std::result::Result<Message, tungstenite::Error>>,
    ) {
        match event {
            Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
            Some(Ok(Message::Close(_close_frame))) => {
                // Any closure not initiated by a local disconnect is unclean.
                #[cfg(feature = "tracing")]
                tracing::info!("WebSocket closed by server");
                self.socket = None;
                self.apply(ConnectionEvent::UncleanClosed).await;
            }
            Some(Ok(_)) => {
                // Binary frames and transport-level ping/pong are ignored.
            }
            Some(Err(e)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "WebSocket transport error");
                self.record_error(Some(WsError::Connection(e).to_string()));
                self.socket = None;
                // The error signal and the closure are distinct events; the
                // closure drives recovery.
                self.apply(ConnectionEvent::TransportErrored).await;
                self.apply(ConnectionEvent::UncleanClosed).await;
            }
            None => {
                self.socket = None;
                self.apply(ConnectionEvent::UncleanClosed).await;
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        match frame::decode(text) {
            Ok(InboundFrame::HeartbeatReply) => {
                // Matched by type only; a stale reply still cancels the
                // currently outstanding deadline.
                self.pong_deadline = None;
            }
            Ok(InboundFrame::Application(payload)) => {
                self.bus.notify_message(&payload);
                drop(self.broadcast_tx.send(payload));
            }
            Err(e) => {
                // Malformed frames are dropped without surfacing to
                // subscribers and without touching connection state.
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "dropping malformed WebSocket frame");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
            }
        }
    }

    async fn handle_send(&mut self, payload: String) {
        if self.status.is_connected()
            && let Some(socket) = self.socket.as_mut()
        {
            if let Err(e) = socket.send(Message::Text(payload.clone().into())).await {
                // The write failure will also surface on the read side and
                // drive recovery; keep the payload for the next flush.
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %e, "send failed, queueing payload");
                #[cfg(not(feature = "tracing"))]
                let _ = &e;
                self.enqueue(payload);
            }
        } else {
            self.enqueue(payload);
        }
    }

    fn enqueue(&mut self, payload: String) {
        if let Some(_evicted) = self.queue.enqueue(payload) {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                max = self.config.max_queued_messages,
                "outbound queue full, evicting oldest payload"
            );
        }
        self.publish_queue_len();
    }

    /// Drain the queue onto the now-open socket, in order. Payloads that
    /// fail to write go back in their original relative order.
    async fn flush_queue(&mut self) {
        if self.queue.is_empty() {
            return;
        }

        let mut pending = self.queue.take_all();
        let mut unsent: VecDeque<String> = VecDeque::new();

        while let Some(payload) = pending.pop_front() {
            if !unsent.is_empty() {
                unsent.push_back(payload);
                continue;
            }
            match self.socket.as_mut() {
                Some(socket) => {
                    if socket
                        .send(Message::Text(payload.clone().into()))
                        .await
                        .is_err()
                    {
                        unsent.push_back(payload);
                    }
                }
                None => unsent.push_back(payload),
            }
        }

        if !unsent.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                remaining = unsent.len(),
                "socket became unwritable mid-flush, re-queueing payloads"
            );
            self.queue.restore(unsent);
        }
        self.publish_queue_len();
    }

    async fn send_probe(&mut self) {
        // Only one outstanding deadline at a time.
        if self.pong_deadline.is_some() {
            return;
        }
        let Some(socket) = self.socket.as_mut() else {
            return;
        };
        // Serializing a ping cannot fail; bail quietly if it somehow does.
        let Ok(text) = serde_json::to_string(&Heartbeat::ping_now()) else {
            return;
        };
        if socket.send(Message::Text(text.into())).await.is_err() {
            // Surface via the read side.
            return;
        }
        self.pong_deadline = Some(Box::pin(sleep(self.config.heartbeat_timeout)));
    }

    async fn handle_heartbeat_timeout(&mut self) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            timeout = ?self.config.heartbeat_timeout,
            "heartbeat timeout, forcing socket closed"
        );
        // The monitor only forces closure; the state machine decides what
        // happens next.
        self.close_socket(false).await;
        self.apply(ConnectionEvent::UncleanClosed).await;
    }

    async fn handle_reconnect_fired(&mut self) {
        // The fired attempt counts even if it fails immediately.
        self.attempts += 1;
        self.shared.attempts.store(self.attempts, Ordering::SeqCst);
        self.begin_connect().await;
    }

    /// Feed an event through the transition table and run the effects.
    async fn apply(&mut self, event: ConnectionEvent) {
        let can_reconnect = self.attempts < self.config.max_reconnect_attempts;
        let outcome = transition(self.status, event, can_reconnect);
        self.set_status(outcome.next);
        for effect in outcome.effects {
            self.run_effect(*effect).await;
        }
    }

    async fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ClearTimers => self.clear_timers(),
            Effect::ResetAttempts => self.reset_attempts(),
            Effect::StartHeartbeat => self.start_heartbeat(),
            Effect::FlushQueue => self.flush_queue().await,
            Effect::ScheduleReconnect => self.schedule_reconnect(),
        }
    }

    fn set_status(&mut self, next: ConnectionStatus) {
        if self.status == next {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(from = %self.status, to = %next, "connection status changed");
        self.status = next;
        drop(self.status_tx.send(next));
        self.bus.notify_status(next);
    }

    fn clear_timers(&mut self) {
        self.heartbeat = None;
        self.pong_deadline = None;
        self.reconnect_timer = None;
    }

    fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.shared.attempts.store(0, Ordering::SeqCst);
        self.backoff.reset();
    }

    fn start_heartbeat(&mut self) {
        let period = self.config.heartbeat_interval;
        if period.is_zero() {
            // Heartbeats disabled; liveness falls back to transport closure.
            return;
        }
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(interval);
    }

    fn schedule_reconnect(&mut self) {
        // One pending timer at a time; assigning drops any armed one.
        let delay = self.backoff.next_backoff().unwrap_or(RECONNECT_DELAY_CEILING);
        #[cfg(feature = "tracing")]
        tracing::info!(
            attempt = self.attempts + 1,
            max = self.config.max_reconnect_attempts,
            delay = ?delay,
            "scheduling reconnect"
        );
        self.reconnect_timer = Some(Box::pin(sleep(delay)));
    }

    async fn close_socket(&mut self, clean: bool) {
        if let Some(mut socket) = self.socket.take() {
            if clean {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "client disconnect".into(),
                };
                // The socket may already be dead; nothing to do about it.
                drop(socket.close(Some(frame)).await);
            }
            // An unclean close simply drops the stream.
        }
    }

    fn record_error(&mut self, message: Option<String>) {
        *self
            .shared
            .last_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = message;
    }

    fn publish_queue_len(&self) {
        self.shared.queued.store(self.queue.len(), Ordering::SeqCst);
    }

    async fn teardown(&mut self) {
        self.opening = None;
        self.close_socket(true).await;
        self.apply(ConnectionEvent::DisconnectRequested).await;
        self.bus.clear();
    }
}

async fn poll_open(
    opening: &mut Option<OpenFuture>,
) -> std::result::Result<WsStream, tungstenite::Error> {
    match opening {
        Some(open) => open.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn next_frame(
    socket: &mut Option<WsStream>,
) -> Option<std::result::Result<Message, tungstenite::Error>> {
    match socket {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn expire(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(deadline) => deadline.as_mut().await,
        None => std::future::pending().await,
    }
}
