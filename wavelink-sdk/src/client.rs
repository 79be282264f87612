//! The client event loop and its UI-facing handle.
//!
//! Everything mutable — connection, reconnect policy, room tracker,
//! reconciler — lives on one spawned task and is touched only from
//! there. UI intents arrive as commands carrying a oneshot reply, so a
//! send while offline is rejected synchronously from the caller's point
//! of view instead of being buffered. State flows back out as
//! [`ClientEvent`]s plus cloned snapshots for queries.

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::connection::{Connection, TransportEvent};
use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::outbound::OutboundQueue;
use crate::reconcile::{ChatMessage, Reconciler};
use crate::reconnect::{ReconnectDecision, ReconnectPolicy};
use crate::rooms::RoomTracker;
use crate::wire::InboundEnvelope;

/// Connection status as the UI should render it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Online,
    /// Offline, with automatic attempt `attempt` pending.
    Reconnecting { attempt: u32 },
    /// Offline with no automatic attempt pending (exhausted or closed);
    /// recovery needs a user-initiated `reconnect()`.
    Offline,
}

/// Events the client emits to the UI layer.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Status(ConnectionStatus),
    /// The reconciled sequence for this room changed; fetch a fresh
    /// snapshot with [`ChatHandle::messages`].
    RoomUpdated { room: String },
    /// Typing-indicator pulse from another participant.
    Typing { room: String, user: String },
    /// The backend reported an error envelope.
    ServerError { message: String },
    /// Automatic reconnection gave up. Terminal until `reconnect()`.
    ReconnectExhausted,
}

enum Command {
    SendMessage {
        room: String,
        body: String,
        reply: oneshot::Sender<Result<String, Error>>,
    },
    Join {
        room: String,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Reconnect {
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Messages {
        room: String,
        reply: oneshot::Sender<Vec<ChatMessage>>,
    },
    Status {
        reply: oneshot::Sender<ConnectionStatus>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-able handle to a running client. All methods are rejected with
/// [`Error::ChannelClosed`] once the loop has shut down.
#[derive(Clone)]
pub struct ChatHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl ChatHandle {
    /// Optimistically send `body` to `room`. Returns the provisional
    /// message id on success; [`Error::NotConnected`] while offline —
    /// nothing is transmitted or buffered in that case.
    pub async fn send_message(&self, room: &str, body: &str) -> Result<String, Error> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SendMessage {
                room: room.to_string(),
                body: body.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Join `room`. Membership intent is recorded even while offline
    /// (and replayed on reconnect), but the immediate join command is
    /// rejected with [`Error::NotConnected`] when the channel is down.
    pub async fn join(&self, room: &str) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Join {
                room: room.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Manual retry after [`ClientEvent::ReconnectExhausted`]. Resets
    /// the attempt budget and opens immediately.
    pub async fn reconnect(&self) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Reconnect { reply })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)?
    }

    /// Read-only snapshot of the reconciled message sequence for `room`.
    pub async fn messages(&self, room: &str) -> Result<Vec<ChatMessage>, Error> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Messages {
                room: room.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    pub async fn status(&self) -> Result<ConnectionStatus, Error> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Status { reply })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }

    /// Terminal shutdown: cancels any pending reconnect timer, closes
    /// the socket and stops the loop. There is no reopen after this —
    /// construct a fresh client instead.
    pub async fn close(&self) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Close { reply })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        rx.await.map_err(|_| Error::ChannelClosed)
    }
}

/// Start a client session. Spawns the event loop and begins connecting
/// immediately; establishment failures feed the reconnect policy rather
/// than surfacing here.
pub fn connect(config: ClientConfig) -> (ChatHandle, mpsc::Receiver<ClientEvent>) {
    let (events_tx, events_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (transport_tx, transport_rx) = mpsc::channel(256);

    let connection = Connection::new(
        config.ws_url.clone(),
        config.user_id.clone(),
        transport_tx,
    );
    let mut dispatcher = Dispatcher::new();
    register_handlers(&mut dispatcher);

    let client = ClientLoop {
        connection,
        policy: ReconnectPolicy::new(config.reconnect.clone()),
        tracker: RoomTracker::new(),
        outbound: OutboundQueue::new(config.user_id.clone()),
        dispatcher,
        session: SessionState {
            user_id: config.user_id.clone(),
            reconciler: Reconciler::new(config.user_id, config.correlation_window),
            pending: Vec::new(),
        },
        transport_rx,
        cmd_rx,
        events_tx,
        reconnect_at: None,
        status: ConnectionStatus::Connecting,
    };
    tokio::spawn(client.run());

    (ChatHandle { cmd_tx }, events_rx)
}

/// State the dispatcher handlers mutate; owned by the loop.
struct SessionState {
    user_id: String,
    reconciler: Reconciler,
    /// Events produced by handlers, drained and emitted by the loop
    /// after each dispatched frame.
    pending: Vec<ClientEvent>,
}

fn register_handlers(dispatcher: &mut Dispatcher<SessionState>) {
    dispatcher.register("newMessage", |session: &mut SessionState, env| {
        if let InboundEnvelope::NewMessage {
            chat_id,
            message_id,
            user_id,
            message,
            timestamp,
            ..
        } = env
        {
            let changed = session.reconciler.apply_new_message(
                &chat_id,
                &message_id,
                &user_id,
                &message,
                timestamp,
                Utc::now(),
            );
            if changed {
                session.pending.push(ClientEvent::RoomUpdated { room: chat_id });
            }
        }
    });
    dispatcher.register("messageDelivered", |session: &mut SessionState, env| {
        if let InboundEnvelope::Delivered { chat_id, message_id } = env
            && session.reconciler.apply_delivered(&chat_id, &message_id)
        {
            session.pending.push(ClientEvent::RoomUpdated { room: chat_id });
        }
    });
    dispatcher.register("messageRead", |session: &mut SessionState, env| {
        if let InboundEnvelope::Read { chat_id, message_id } = env
            && session.reconciler.apply_read(&chat_id, &message_id)
        {
            session.pending.push(ClientEvent::RoomUpdated { room: chat_id });
        }
    });
    dispatcher.register("reaction", |session: &mut SessionState, env| {
        if let InboundEnvelope::Reaction {
            chat_id,
            message_id,
            emoji,
            ..
        } = env
            && session.reconciler.apply_reaction(&chat_id, &message_id, &emoji)
        {
            session.pending.push(ClientEvent::RoomUpdated { room: chat_id });
        }
    });
    dispatcher.register("typing", |session: &mut SessionState, env| {
        if let InboundEnvelope::Typing { chat_id, user_id } = env
            && user_id != session.user_id
        {
            session.pending.push(ClientEvent::Typing {
                room: chat_id,
                user: user_id,
            });
        }
    });
    dispatcher.register("error", |session: &mut SessionState, env| {
        if let InboundEnvelope::Error { message } = env {
            session.pending.push(ClientEvent::ServerError { message });
        }
    });
}

struct ClientLoop {
    connection: Connection,
    policy: ReconnectPolicy,
    tracker: RoomTracker,
    outbound: OutboundQueue,
    dispatcher: Dispatcher<SessionState>,
    session: SessionState,
    transport_rx: mpsc::Receiver<TransportEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    events_tx: mpsc::Sender<ClientEvent>,
    /// When the next automatic reconnect attempt fires; cleared by
    /// explicit close so no stray attempt survives shutdown.
    reconnect_at: Option<Instant>,
    status: ConnectionStatus,
}

impl ClientLoop {
    async fn run(mut self) {
        self.set_status(ConnectionStatus::Connecting).await;
        if let Err(e) = self.connection.open().await {
            tracing::warn!(error = %e, "initial connect failed");
            self.handle_unexpected_close().await;
        }

        loop {
            tokio::select! {
                maybe = self.transport_rx.recv() => {
                    match maybe {
                        Some(event) => self.on_transport(event).await,
                        None => break,
                    }
                }
                maybe = self.cmd_rx.recv() => {
                    match maybe {
                        Some(command) => {
                            if self.on_command(command).await {
                                break;
                            }
                        }
                        // All handles dropped: shut down like a close.
                        None => {
                            self.connection.close().await;
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(self.reconnect_at.unwrap_or_else(Instant::now)),
                    if self.reconnect_at.is_some() =>
                {
                    self.on_reconnect_timer().await;
                }
            }
        }
        tracing::debug!("client loop stopped");
    }

    async fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                self.policy.on_open();
                self.set_status(ConnectionStatus::Online).await;
                self.replay_joins().await;
            }
            TransportEvent::Closed { reason } => {
                // A late close from a socket we already shut down on
                // purpose must not wake the policy.
                if self.connection.is_terminal() {
                    return;
                }
                tracing::warn!(%reason, "connection lost");
                self.connection.mark_closed();
                self.handle_unexpected_close().await;
            }
            TransportEvent::Frame(text) => {
                if let Err(e) = self.dispatcher.dispatch(&mut self.session, &text) {
                    // Recoverable: this frame is discarded, the channel
                    // stays up.
                    tracing::warn!(error = %e, "dropping inbound frame");
                }
                let pending: Vec<ClientEvent> = self.session.pending.drain(..).collect();
                for event in pending {
                    self.emit(event).await;
                }
            }
        }
    }

    /// Restore server-side subscriptions after a (re)connect, in the
    /// original join order.
    async fn replay_joins(&mut self) {
        for room in self.tracker.rooms().to_vec() {
            let envelope = self.outbound.join_room(&room);
            if let Err(e) = self.outbound.transmit(&mut self.connection, envelope).await {
                tracing::warn!(%room, error = %e, "join replay failed");
            } else {
                tracing::debug!(%room, "replayed join");
            }
        }
    }

    async fn handle_unexpected_close(&mut self) {
        match self.policy.on_unexpected_close() {
            ReconnectDecision::RetryAfter { attempt, delay } => {
                tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                self.reconnect_at = Some(Instant::now() + delay);
                self.set_status(ConnectionStatus::Reconnecting { attempt }).await;
            }
            ReconnectDecision::Exhausted => {
                tracing::warn!("reconnect attempts exhausted, going offline");
                self.reconnect_at = None;
                self.set_status(ConnectionStatus::Offline).await;
                self.emit(ClientEvent::ReconnectExhausted).await;
            }
        }
    }

    async fn on_reconnect_timer(&mut self) {
        self.reconnect_at = None;
        let attempt = self.policy.begin_attempt();
        tracing::info!(attempt, "attempting reconnect");
        if let Err(e) = self.connection.open().await {
            tracing::warn!(attempt, error = %e, "reconnect attempt failed");
            self.handle_unexpected_close().await;
        }
    }

    /// Returns true when the loop should stop.
    async fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::SendMessage { room, body, reply } => {
                if !self.connection.is_open() {
                    // Synchronous rejection: never transmitted, never
                    // buffered. The UI decides what to do.
                    let _ = reply.send(Err(Error::NotConnected));
                    return false;
                }
                let id = self.session.reconciler.record_local_send(&room, &body, Utc::now());
                let envelope = self.outbound.send_message(&room, &body);
                let result = self.outbound.transmit(&mut self.connection, envelope).await;
                self.emit(ClientEvent::RoomUpdated { room }).await;
                let _ = reply.send(result.map(|()| id));
            }
            Command::Join { room, reply } => {
                // Intent is transport-independent; record it either way.
                self.tracker.join(&room);
                if !self.connection.is_open() {
                    let _ = reply.send(Err(Error::NotConnected));
                    return false;
                }
                let envelope = self.outbound.join_room(&room);
                let _ = reply.send(self.outbound.transmit(&mut self.connection, envelope).await);
            }
            Command::Reconnect { reply } => {
                if self.connection.is_terminal() {
                    let _ = reply.send(Err(Error::Connection("client is closed".into())));
                } else if self.connection.is_open() {
                    let _ = reply.send(Ok(()));
                } else {
                    self.policy.reset();
                    self.reconnect_at = None;
                    self.set_status(ConnectionStatus::Connecting).await;
                    let result = self.connection.open().await;
                    if result.is_err() {
                        self.handle_unexpected_close().await;
                    }
                    let _ = reply.send(result);
                }
            }
            Command::Messages { room, reply } => {
                let _ = reply.send(self.session.reconciler.messages(&room).to_vec());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status);
            }
            Command::Close { reply } => {
                self.reconnect_at = None;
                self.policy.reset();
                self.connection.close().await;
                self.set_status(ConnectionStatus::Offline).await;
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    async fn set_status(&mut self, status: ConnectionStatus) {
        if self.status != status {
            self.status = status;
            self.emit(ClientEvent::Status(status)).await;
        }
    }

    async fn emit(&mut self, event: ClientEvent) {
        // A vanished UI consumer is not an error for the core.
        let _ = self.events_tx.send(event).await;
    }
}
