//! Error taxonomy for the client core.
//!
//! Nothing here is fatal to the process. `Connection` feeds the reconnect
//! policy, `NotConnected` is surfaced synchronously to callers, and
//! `MalformedMessage` discards a single envelope without touching the
//! channel. The worst outcome is an exhausted-reconnect offline state
//! that requires a user-initiated retry.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Establishing (or keeping) the channel failed. Triggers the
    /// reconnect policy; never surfaced as fatal.
    #[error("connection failed: {0}")]
    Connection(String),

    /// A send or join was attempted while the channel is not Open.
    /// The core never buffers or retries these; the caller decides.
    #[error("not connected")]
    NotConnected,

    /// A single inbound envelope could not be decoded. The envelope is
    /// dropped; the channel is unaffected.
    #[error("malformed inbound envelope: {0}")]
    MalformedMessage(String),

    /// The configured maximum of automatic reconnect attempts was reached.
    #[error("reconnection attempts exhausted")]
    ReconnectExhausted,

    /// The REST collaborator answered with a non-success status.
    #[error("api request failed: {0}")]
    Api(String),

    /// The client event loop has shut down (explicit close or dropped).
    #[error("client loop has shut down")]
    ChannelClosed,
}
