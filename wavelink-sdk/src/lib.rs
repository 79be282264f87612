//! Resilient duplex chat client core.
//!
//! Keeps a client synchronized with a remote chat backend over an
//! unreliable transport: a persistent WebSocket connection with bounded
//! exponential-backoff reconnection, join replay after reconnect, and a
//! reconciliation layer that merges optimistically-sent local messages
//! with server-confirmed echoes, receipts and reactions.
//!
//! Entry point is [`client::connect`], which returns a [`ChatHandle`]
//! for intents (send, join, reconnect, close) and a stream of
//! [`ClientEvent`]s for the UI. Rendering, profiles, uploads and auth
//! live with the consumer, not here.
//!
//! ```rust,no_run
//! use wavelink_sdk::{ClientConfig, connect};
//!
//! # async fn example() -> Result<(), wavelink_sdk::Error> {
//! let config = ClientConfig {
//!     ws_url: "wss://chat.example.com/ws".into(),
//!     user_id: "alice".into(),
//!     ..Default::default()
//! };
//! let (handle, mut events) = connect(config);
//! handle.join("42").await?;
//! handle.send_message("42", "hi").await?;
//! while let Some(event) = events.recv().await {
//!     // feed the UI
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod outbound;
pub mod reconcile;
pub mod reconnect;
pub mod rest;
pub mod rooms;
pub mod wire;

pub use client::{connect, ChatHandle, ClientEvent, ConnectionStatus};
pub use config::{ClientConfig, ReconnectConfig};
pub use error::Error;
pub use reconcile::{ChatMessage, MessageStatus};
pub use rest::RestClient;
