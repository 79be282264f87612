//! JSON wire envelopes exchanged with the chat backend.
//!
//! Field names are a contract with the deployed backend and must stay
//! bit-exact: outbound frames carry an `action` discriminator
//! (`sendMessage` / `joinChat`), inbound frames a `type` discriminator.
//! `createdAt` is whatever ISO-ish string the backend produced (it has no
//! timezone suffix, so it is carried opaquely); `timestamp` is epoch
//! milliseconds and is what the client actually uses for ordering.

use serde::{Deserialize, Serialize};

/// Client → server envelope. Exists transiently between enqueue and
/// transmit; always stamped with the originating user identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum OutboundEnvelope {
    #[serde(rename = "sendMessage", rename_all = "camelCase")]
    SendMessage {
        chat_id: String,
        message: String,
        user_id: String,
    },
    #[serde(rename = "joinChat", rename_all = "camelCase")]
    JoinRoom { chat_id: String, user_id: String },
}

/// Server → client envelope, keyed by the `type` field.
///
/// Unknown discriminators never reach this type: the dispatcher drops
/// them before deserialization (forward compatibility).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEnvelope {
    #[serde(rename = "newMessage", rename_all = "camelCase")]
    NewMessage {
        chat_id: String,
        message_id: String,
        user_id: String,
        message: String,
        /// Epoch milliseconds assigned by the backend.
        #[serde(default)]
        timestamp: Option<i64>,
        #[serde(default)]
        created_at: Option<String>,
    },
    #[serde(rename = "messageDelivered", rename_all = "camelCase")]
    Delivered { chat_id: String, message_id: String },
    #[serde(rename = "messageRead", rename_all = "camelCase")]
    Read { chat_id: String, message_id: String },
    #[serde(rename = "reaction", rename_all = "camelCase")]
    Reaction {
        chat_id: String,
        message_id: String,
        user_id: String,
        emoji: String,
    },
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing { chat_id: String, user_id: String },
    #[serde(rename = "error", rename_all = "camelCase")]
    Error {
        #[serde(default)]
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_send_message_field_names() {
        let env = OutboundEnvelope::SendMessage {
            chat_id: "42".into(),
            message: "hi".into(),
            user_id: "alice".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "sendMessage",
                "chatId": "42",
                "message": "hi",
                "userId": "alice",
            })
        );
    }

    #[test]
    fn outbound_join_field_names() {
        let env = OutboundEnvelope::JoinRoom {
            chat_id: "lobby".into(),
            user_id: "bob".into(),
        };
        let json: serde_json::Value = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "joinChat",
                "chatId": "lobby",
                "userId": "bob",
            })
        );
    }

    #[test]
    fn inbound_new_message_parses_backend_shape() {
        // Exact shape the backend broadcasts (createdAt has no timezone).
        let raw = r#"{
            "type": "newMessage",
            "chatId": "42",
            "messageId": "alice-1700000000000",
            "userId": "alice",
            "message": "hi",
            "timestamp": 1700000000000,
            "createdAt": "2023-11-14T22:13:20.000000"
        }"#;
        let env: InboundEnvelope = serde_json::from_str(raw).unwrap();
        match env {
            InboundEnvelope::NewMessage {
                chat_id,
                message_id,
                user_id,
                message,
                timestamp,
                ..
            } => {
                assert_eq!(chat_id, "42");
                assert_eq!(message_id, "alice-1700000000000");
                assert_eq!(user_id, "alice");
                assert_eq!(message, "hi");
                assert_eq!(timestamp, Some(1_700_000_000_000));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn inbound_new_message_tolerates_missing_optionals() {
        let raw = r#"{"type":"newMessage","chatId":"1","messageId":"m","userId":"u","message":"x"}"#;
        let env: InboundEnvelope = serde_json::from_str(raw).unwrap();
        assert!(matches!(env, InboundEnvelope::NewMessage { timestamp: None, .. }));
    }

    #[test]
    fn inbound_receipts_parse() {
        let d: InboundEnvelope =
            serde_json::from_str(r#"{"type":"messageDelivered","chatId":"1","messageId":"m"}"#)
                .unwrap();
        assert!(matches!(d, InboundEnvelope::Delivered { .. }));
        let r: InboundEnvelope =
            serde_json::from_str(r#"{"type":"messageRead","chatId":"1","messageId":"m"}"#).unwrap();
        assert!(matches!(r, InboundEnvelope::Read { .. }));
    }
}
