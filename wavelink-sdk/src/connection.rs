//! Transport connection: one WebSocket channel to the chat backend.
//!
//! Owns the physical socket exclusively — establishing and closing it is
//! the only I/O boundary in the core. Everything above this layer is
//! state transitions driven by the [`TransportEvent`]s it emits.
//!
//! At most one establishment attempt is outstanding at a time; `open()`
//! while Connecting fails instead of stacking a second attempt. An
//! explicit `close()` is terminal for this instance — reconnection after
//! that requires a fresh `Connection`.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::Error;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Lifecycle state of the transport channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Lifecycle and inbound-data events, delivered to the client loop.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Opened,
    Closed { reason: String },
    /// One raw text frame off the wire, for the dispatcher.
    Frame(String),
}

/// A persistent channel to the backend.
pub struct Connection {
    ws_url: String,
    user_id: String,
    state: ConnectionState,
    writer: Option<WsSink>,
    reader: Option<JoinHandle<()>>,
    events: mpsc::Sender<TransportEvent>,
}

impl Connection {
    /// `events` is where lifecycle and frame events land; the receiver
    /// side belongs to the client event loop.
    pub fn new(
        ws_url: impl Into<String>,
        user_id: impl Into<String>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            user_id: user_id.into(),
            state: ConnectionState::Idle,
            writer: None,
            reader: None,
            events,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// True once `close()` has been called; the instance will never
    /// reopen and late `Closed` events from the old socket are stale.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ConnectionState::Closing | ConnectionState::Closed)
    }

    /// Establish the channel. Resolves once the state is Open and a
    /// `TransportEvent::Opened` has been queued.
    ///
    /// Fails with [`Error::Connection`] if the handshake fails, if an
    /// attempt is already in flight, or if the connection was explicitly
    /// closed. Calling while already Open is a no-op.
    pub async fn open(&mut self) -> Result<(), Error> {
        match self.state {
            ConnectionState::Open => return Ok(()),
            ConnectionState::Connecting => {
                return Err(Error::Connection("open already in progress".into()));
            }
            ConnectionState::Closing | ConnectionState::Closed => {
                return Err(Error::Connection("connection is closed".into()));
            }
            ConnectionState::Idle => {}
        }

        self.state = ConnectionState::Connecting;
        let url = format!("{}?userId={}", self.ws_url, self.user_id);
        tracing::debug!(url = %self.ws_url, "opening websocket");

        let (stream, _response) = match connect_async(&url).await {
            Ok(ok) => ok,
            Err(e) => {
                self.state = ConnectionState::Idle;
                return Err(Error::Connection(e.to_string()));
            }
        };

        let (sink, mut source) = stream.split();
        self.writer = Some(sink);

        let events = self.events.clone();
        self.reader = Some(tokio::spawn(async move {
            while let Some(item) = source.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        if events.send(TransportEvent::Frame(text)).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .unwrap_or_else(|| "closed by server".to_string());
                        let _ = events.send(TransportEvent::Closed { reason }).await;
                        return;
                    }
                    // Binary, ping and pong frames carry no chat payload.
                    Ok(_) => {}
                    Err(e) => {
                        let _ = events
                            .send(TransportEvent::Closed { reason: e.to_string() })
                            .await;
                        return;
                    }
                }
            }
            let _ = events
                .send(TransportEvent::Closed { reason: "eof".to_string() })
                .await;
        }));

        self.state = ConnectionState::Open;
        tracing::info!(url = %self.ws_url, "websocket open");
        let _ = self.events.send(TransportEvent::Opened).await;
        Ok(())
    }

    /// Transmit one text frame. Only legal while Open — no implicit
    /// queueing here; deferring is the outbound queue's business.
    pub async fn send(&mut self, text: String) -> Result<(), Error> {
        if self.state != ConnectionState::Open {
            return Err(Error::NotConnected);
        }
        let writer = self.writer.as_mut().ok_or(Error::NotConnected)?;
        writer
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::Connection(e.to_string()))
    }

    /// The reader task observed the socket dying. Drops the dead halves
    /// and returns to Idle so the reconnect policy may call `open()`
    /// again. Does nothing after an explicit close.
    pub fn mark_closed(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.writer = None;
        if let Some(task) = self.reader.take() {
            task.abort();
        }
        self.state = ConnectionState::Idle;
    }

    /// Explicit shutdown: Closing → Closed, terminal. Suppresses any
    /// future reconnection for this instance.
    pub async fn close(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.state = ConnectionState::Closing;
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.send(Message::Close(None)).await;
        }
        if let Some(task) = self.reader.take() {
            task.abort();
        }
        self.state = ConnectionState::Closed;
        tracing::info!("websocket closed");
    }
}
