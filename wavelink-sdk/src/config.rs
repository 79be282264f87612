//! Client configuration.
//!
//! The user identity is injected here at construction time; the core
//! keeps no process-global state.

use std::time::Duration;

/// Configuration for a chat client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint (`ws://` or `wss://`). The user id is appended
    /// as a `userId` query parameter, matching the backend's `$connect`
    /// route.
    pub ws_url: String,
    /// Base URL of the REST collaborator (chat management, history).
    pub api_url: String,
    /// Identity stamped on every outbound envelope.
    pub user_id: String,
    /// Automatic reconnection parameters.
    pub reconnect: ReconnectConfig,
    /// How far apart a local optimistic send and its server echo may be
    /// and still be treated as the same logical message.
    pub correlation_window: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:9001".to_string(),
            api_url: "http://127.0.0.1:8080".to_string(),
            user_id: "user".to_string(),
            reconnect: ReconnectConfig::default(),
            correlation_window: Duration::from_secs(5),
        }
    }
}

/// Parameters for the exponential-backoff reconnect policy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt; doubles per attempt.
    pub base_delay: Duration,
    /// Total automatic attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}
