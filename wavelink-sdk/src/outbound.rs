//! Outbound command queue: user intents → wire envelopes.
//!
//! Stamps the client identity on every envelope and transmits through
//! the connection only when it is Open. Anything else is rejected with
//! [`Error::NotConnected`] — deliberately no local buffering of intents
//! across disconnects; the caller chooses whether to retry, surface the
//! error, or fall back to optimistic-local-only.

use crate::connection::Connection;
use crate::error::Error;
use crate::wire::OutboundEnvelope;

/// Serializes user intents into wire envelopes for one client identity.
#[derive(Debug)]
pub struct OutboundQueue {
    user_id: String,
}

impl OutboundQueue {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    pub fn send_message(&self, room: &str, body: &str) -> OutboundEnvelope {
        OutboundEnvelope::SendMessage {
            chat_id: room.to_string(),
            message: body.to_string(),
            user_id: self.user_id.clone(),
        }
    }

    pub fn join_room(&self, room: &str) -> OutboundEnvelope {
        OutboundEnvelope::JoinRoom {
            chat_id: room.to_string(),
            user_id: self.user_id.clone(),
        }
    }

    /// Transmit immediately or reject; never buffer.
    pub async fn transmit(
        &self,
        connection: &mut Connection,
        envelope: OutboundEnvelope,
    ) -> Result<(), Error> {
        if !connection.is_open() {
            return Err(Error::NotConnected);
        }
        let text = serde_json::to_string(&envelope)
            .map_err(|e| Error::Connection(format!("envelope encode failed: {e}")))?;
        connection.send(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelopes_carry_the_originating_identity() {
        let q = OutboundQueue::new("alice");
        assert_eq!(
            q.send_message("42", "hi"),
            OutboundEnvelope::SendMessage {
                chat_id: "42".into(),
                message: "hi".into(),
                user_id: "alice".into(),
            }
        );
        assert_eq!(
            q.join_room("lobby"),
            OutboundEnvelope::JoinRoom {
                chat_id: "lobby".into(),
                user_id: "alice".into(),
            }
        );
    }
}
