//! Inbound envelope dispatch.
//!
//! Routes raw frames to registered handlers by the `type` discriminator.
//! At most one handler per type; registering again replaces the previous
//! handler (last-write-wins — this is a contract, not an accident).
//! Unknown discriminators are dropped without error so newer backends
//! cannot crash older clients.

use std::collections::HashMap;

use crate::error::Error;
use crate::wire::InboundEnvelope;

type Handler<C> = Box<dyn FnMut(&mut C, InboundEnvelope) + Send>;

/// Maps `type` discriminators to handlers operating on a shared context
/// `C` (the client's session state).
pub struct Dispatcher<C> {
    handlers: HashMap<String, Handler<C>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `kind`, replacing any previous handler.
    pub fn register<F>(&mut self, kind: impl Into<String>, handler: F)
    where
        F: FnMut(&mut C, InboundEnvelope) + Send + 'static,
    {
        self.handlers.insert(kind.into(), Box::new(handler));
    }

    /// Consume one raw frame.
    ///
    /// - not JSON, or no `type` field → [`Error::MalformedMessage`]
    /// - `type` with no registered handler → dropped, `Ok(())`
    /// - registered `type` with a payload that fails to decode →
    ///   [`Error::MalformedMessage`]
    ///
    /// A malformed frame only discards that frame; channel state is
    /// untouched.
    pub fn dispatch(&mut self, ctx: &mut C, raw: &str) -> Result<(), Error> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| Error::MalformedMessage(e.to_string()))?;
        let Some(kind) = value.get("type").and_then(|t| t.as_str()) else {
            return Err(Error::MalformedMessage("missing type discriminator".into()));
        };
        let Some(handler) = self.handlers.get_mut(kind) else {
            tracing::debug!(kind, "no handler for inbound type, dropping");
            return Ok(());
        };
        let envelope: InboundEnvelope =
            serde_json::from_value(value).map_err(|e| Error::MalformedMessage(e.to_string()))?;
        handler(ctx, envelope);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_to_registered_handler() {
        let mut d: Dispatcher<Vec<String>> = Dispatcher::new();
        d.register("typing", |seen: &mut Vec<String>, env| {
            if let InboundEnvelope::Typing { user_id, .. } = env {
                seen.push(user_id);
            }
        });
        let mut seen = Vec::new();
        d.dispatch(&mut seen, r#"{"type":"typing","chatId":"1","userId":"bob"}"#)
            .unwrap();
        assert_eq!(seen, vec!["bob"]);
    }

    #[test]
    fn register_replaces_previous_handler() {
        let mut d: Dispatcher<u32> = Dispatcher::new();
        d.register("typing", |n: &mut u32, _| *n += 1);
        d.register("typing", |n: &mut u32, _| *n += 100);
        let mut n = 0;
        d.dispatch(&mut n, r#"{"type":"typing","chatId":"1","userId":"x"}"#)
            .unwrap();
        // Only the replacement ran.
        assert_eq!(n, 100);
    }

    #[test]
    fn unknown_type_is_dropped_without_error() {
        let mut d: Dispatcher<u32> = Dispatcher::new();
        d.register("typing", |n: &mut u32, _| *n += 1);
        let mut n = 0;
        d.dispatch(&mut n, r#"{"type":"somethingNewer","payload":{}}"#)
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn malformed_json_is_reported_recoverably() {
        let mut d: Dispatcher<u32> = Dispatcher::new();
        let mut n = 0;
        let err = d.dispatch(&mut n, "{not json").unwrap_err();
        assert!(matches!(err, Error::MalformedMessage(_)));
    }

    #[test]
    fn missing_discriminator_is_malformed() {
        let mut d: Dispatcher<u32> = Dispatcher::new();
        let mut n = 0;
        let err = d.dispatch(&mut n, r#"{"chatId":"1"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedMessage(_)));
    }

    #[test]
    fn known_type_with_bad_payload_is_malformed() {
        let mut d: Dispatcher<u32> = Dispatcher::new();
        d.register("newMessage", |n: &mut u32, _| *n += 1);
        let mut n = 0;
        // newMessage requires chatId/messageId/userId/message
        let err = d
            .dispatch(&mut n, r#"{"type":"newMessage","chatId":"1"}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedMessage(_)));
        assert_eq!(n, 0);
    }
}
