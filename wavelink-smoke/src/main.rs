//! wavelink-smoke: connect to a chat backend, join a room, optionally
//! send one message, and log everything the client emits.
//!
//! Useful for poking at a deployed backend and for eyeballing the
//! reconnect behavior (kill the server mid-session and watch).

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use wavelink_sdk::{connect, ClientConfig, ClientEvent, ReconnectConfig, RestClient};

#[derive(Parser)]
#[command(name = "wavelink-smoke", about = "Smoke client for the wavelink chat SDK")]
struct Args {
    /// WebSocket endpoint (ws:// or wss://)
    #[arg(long, default_value = "ws://127.0.0.1:9001")]
    ws_url: String,

    /// REST API base URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    api_url: String,

    /// User identity to connect as
    #[arg(long, default_value = "smoke")]
    user: String,

    /// Room to join on connect
    #[arg(long, default_value = "42")]
    room: String,

    /// Message to send once online
    #[arg(long)]
    message: Option<String>,

    /// Base reconnect delay in milliseconds
    #[arg(long, default_value_t = 1000)]
    base_delay_ms: u64,

    /// Maximum automatic reconnect attempts
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wavelink_sdk=debug".into()),
        )
        .init();

    let args = Args::parse();
    let config = ClientConfig {
        ws_url: args.ws_url,
        api_url: args.api_url,
        user_id: args.user,
        reconnect: ReconnectConfig {
            base_delay: Duration::from_millis(args.base_delay_ms),
            max_attempts: args.max_attempts,
        },
        ..Default::default()
    };

    // Best-effort room listing; the realtime core works without it.
    let rest = RestClient::new(&config.api_url);
    match rest.list_chats(&config.user_id).await {
        Ok(chats) => {
            for chat in &chats {
                info!(chat_id = %chat.chat_id, kind = ?chat.chat_type, "existing chat");
            }
        }
        Err(e) => warn!(error = %e, "chat listing unavailable"),
    }

    let (handle, mut events) = connect(config);
    let mut pending_send = args.message;
    let room = args.room;

    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Status(status) => {
                info!(?status, "connection status");
                if status == wavelink_sdk::ConnectionStatus::Online {
                    if let Err(e) = handle.join(&room).await {
                        warn!(error = %e, %room, "join failed");
                    }
                    if let Some(body) = pending_send.take() {
                        match handle.send_message(&room, &body).await {
                            Ok(id) => info!(%room, %id, "message sent optimistically"),
                            Err(e) => warn!(error = %e, "send failed"),
                        }
                    }
                }
            }
            ClientEvent::RoomUpdated { room } => {
                let msgs = handle.messages(&room).await?;
                for m in &msgs {
                    info!(
                        %room,
                        id = %m.id,
                        author = %m.author,
                        status = ?m.status,
                        reactions = m.reactions.len(),
                        body = %m.body,
                        "room state"
                    );
                }
            }
            ClientEvent::Typing { room, user } => info!(%room, %user, "typing"),
            ClientEvent::ServerError { message } => warn!(%message, "server error"),
            ClientEvent::ReconnectExhausted => {
                warn!("reconnect attempts exhausted, exiting");
                break;
            }
        }
    }

    handle.close().await.ok();
    Ok(())
}
