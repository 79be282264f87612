//! Message reconciliation: merging optimistic local sends with
//! server-confirmed state.
//!
//! A local send is appended immediately as a provisional entry (status
//! Sent, client-generated id). When the server's echo arrives it is
//! correlated by room + author + exact text + a time window, and the
//! provisional entry is replaced *in place* — same position, server id
//! adopted — so one logical send never shows up twice. When several
//! provisional entries match (same text sent rapidly), the oldest one
//! wins.
//!
//! Status only ever moves forward: Sent → Delivered → Read. Reactions
//! are an append-only feed; duplicates are kept on purpose.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;

/// Delivery status of a message, ordered so reconciliation can take the
/// maximum of current and incoming status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

/// One reconciled message in a room's sequence.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Server-assigned id once confirmed; `local-…` before that.
    pub id: String,
    pub room: String,
    pub author: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub status: MessageStatus,
    /// Append-only reaction feed; duplicates preserved.
    pub reactions: Vec<String>,
    /// Still awaiting the server echo.
    pub provisional: bool,
}

impl ChatMessage {
    fn advance(&mut self, to: MessageStatus) -> bool {
        if to > self.status {
            self.status = to;
            true
        } else {
            false
        }
    }
}

/// Per-room message sequences, owned by the client loop and exposed to
/// the UI as read-only snapshots.
#[derive(Debug)]
pub struct Reconciler {
    user_id: String,
    window: chrono::Duration,
    rooms: HashMap<String, Vec<ChatMessage>>,
}

impl Reconciler {
    pub fn new(user_id: impl Into<String>, correlation_window: Duration) -> Self {
        Self {
            user_id: user_id.into(),
            window: chrono::Duration::from_std(correlation_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(5)),
            rooms: HashMap::new(),
        }
    }

    /// The reconciled sequence for `room`, in arrival/send order.
    pub fn messages(&self, room: &str) -> &[ChatMessage] {
        self.rooms.get(room).map_or(&[], Vec::as_slice)
    }

    /// Optimistic local send: append immediately with a client-generated
    /// provisional id and status Sent. Returns the provisional id.
    pub fn record_local_send(
        &mut self,
        room: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> String {
        let id = provisional_id();
        self.rooms.entry(room.to_string()).or_default().push(ChatMessage {
            id: id.clone(),
            room: room.to_string(),
            author: self.user_id.clone(),
            body: body.to_string(),
            sent_at: now,
            status: MessageStatus::Sent,
            reactions: Vec::new(),
            provisional: true,
        });
        id
    }

    /// A `newMessage` arrived from the wire. Either collapses into a
    /// matching provisional entry or appends a new one. Returns whether
    /// the room's sequence changed.
    pub fn apply_new_message(
        &mut self,
        room: &str,
        message_id: &str,
        author: &str,
        body: &str,
        timestamp_ms: Option<i64>,
        now: DateTime<Utc>,
    ) -> bool {
        let window = self.window;
        let own = author == self.user_id;
        let entries = self.rooms.entry(room.to_string()).or_default();

        if own {
            // Oldest matching provisional wins the correlation.
            let matched = entries.iter().position(|m| {
                m.provisional
                    && m.body == body
                    && (now - m.sent_at) <= window
                    && (now - m.sent_at) >= chrono::Duration::zero()
            });
            if let Some(pos) = matched {
                let entry = &mut entries[pos];
                entry.id = message_id.to_string();
                entry.provisional = false;
                if let Some(at) = wire_time(timestamp_ms) {
                    entry.sent_at = at;
                }
                entry.advance(MessageStatus::Delivered);
                tracing::debug!(room, message_id, "collapsed echo into provisional entry");
                return true;
            }
        }

        // At most one entry per (room, id): a repeated broadcast of an
        // already-known message is ignored.
        if entries.iter().any(|m| m.id == message_id) {
            return false;
        }

        entries.push(ChatMessage {
            id: message_id.to_string(),
            room: room.to_string(),
            author: author.to_string(),
            body: body.to_string(),
            sent_at: wire_time(timestamp_ms).unwrap_or(now),
            // Server-confirmed either way: a foreign message reached us,
            // an own echo was accepted by the backend.
            status: MessageStatus::Delivered,
            reactions: Vec::new(),
            provisional: false,
        });
        true
    }

    /// Delivery receipt. Unknown ids are ignored.
    pub fn apply_delivered(&mut self, room: &str, message_id: &str) -> bool {
        self.advance_status(room, message_id, MessageStatus::Delivered)
    }

    /// Read receipt. Unknown ids are ignored; status never regresses.
    pub fn apply_read(&mut self, room: &str, message_id: &str) -> bool {
        self.advance_status(room, message_id, MessageStatus::Read)
    }

    /// Append one reaction symbol. Always grows the sequence — the model
    /// is a "someone reacted" feed, so duplicates are kept.
    pub fn apply_reaction(&mut self, room: &str, message_id: &str, emoji: &str) -> bool {
        let Some(entry) = self.find_mut(room, message_id) else {
            return false;
        };
        entry.reactions.push(emoji.to_string());
        true
    }

    fn advance_status(&mut self, room: &str, message_id: &str, to: MessageStatus) -> bool {
        self.find_mut(room, message_id)
            .is_some_and(|m| m.advance(to))
    }

    fn find_mut(&mut self, room: &str, message_id: &str) -> Option<&mut ChatMessage> {
        self.rooms
            .get_mut(room)?
            .iter_mut()
            .find(|m| m.id == message_id)
    }
}

fn wire_time(timestamp_ms: Option<i64>) -> Option<DateTime<Utc>> {
    timestamp_ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn provisional_id() -> String {
    let n: u64 = rand::thread_rng().r#gen();
    format!("local-{n:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconciler() -> Reconciler {
        Reconciler::new("alice", Duration::from_secs(5))
    }

    #[test]
    fn echo_collapses_into_provisional_entry() {
        let mut r = reconciler();
        let t0 = Utc::now();
        let local = r.record_local_send("42", "hi", t0);
        assert!(local.starts_with("local-"));
        assert_eq!(r.messages("42").len(), 1);

        let changed = r.apply_new_message("42", "srv-1", "alice", "hi", None, t0);
        assert!(changed);

        let msgs = r.messages("42");
        assert_eq!(msgs.len(), 1, "echo must not duplicate the local send");
        assert_eq!(msgs[0].id, "srv-1");
        assert!(!msgs[0].provisional);
        assert!(msgs[0].status >= MessageStatus::Delivered);
    }

    #[test]
    fn echo_outside_window_appends_instead() {
        let mut r = reconciler();
        let t0 = Utc::now();
        r.record_local_send("42", "hi", t0);
        let late = t0 + chrono::Duration::seconds(30);
        r.apply_new_message("42", "srv-1", "alice", "hi", None, late);
        // Correlation window missed: two entries, one still provisional.
        let msgs = r.messages("42");
        assert_eq!(msgs.len(), 2);
        assert!(msgs[0].provisional);
        assert_eq!(msgs[1].id, "srv-1");
    }

    #[test]
    fn rapid_same_text_sends_collapse_oldest_first() {
        let mut r = reconciler();
        let t0 = Utc::now();
        r.record_local_send("42", "hi", t0);
        r.record_local_send("42", "hi", t0 + chrono::Duration::milliseconds(100));
        r.apply_new_message("42", "srv-1", "alice", "hi", None, t0 + chrono::Duration::seconds(1));
        let msgs = r.messages("42");
        assert_eq!(msgs.len(), 2);
        // First entry (oldest provisional) took the server id.
        assert_eq!(msgs[0].id, "srv-1");
        assert!(msgs[1].provisional);
    }

    #[test]
    fn collapse_preserves_position() {
        let mut r = reconciler();
        let t0 = Utc::now();
        r.apply_new_message("42", "m-1", "bob", "hello", None, t0);
        r.record_local_send("42", "hi bob", t0);
        r.apply_new_message("42", "m-2", "bob", "more", None, t0);
        r.apply_new_message("42", "srv-9", "alice", "hi bob", None, t0);
        let ids: Vec<&str> = r.messages("42").iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m-1", "srv-9", "m-2"]);
    }

    #[test]
    fn foreign_messages_append_as_delivered() {
        let mut r = reconciler();
        let changed = r.apply_new_message("42", "m-1", "bob", "yo", Some(1_700_000_000_000), Utc::now());
        assert!(changed);
        let msgs = r.messages("42");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].author, "bob");
        assert_eq!(msgs[0].status, MessageStatus::Delivered);
        assert!(!msgs[0].provisional);
    }

    #[test]
    fn duplicate_broadcast_is_ignored() {
        let mut r = reconciler();
        let now = Utc::now();
        r.apply_new_message("42", "m-1", "bob", "yo", None, now);
        let changed = r.apply_new_message("42", "m-1", "bob", "yo", None, now);
        assert!(!changed);
        assert_eq!(r.messages("42").len(), 1);
    }

    #[test]
    fn status_is_monotonic() {
        let mut r = reconciler();
        let now = Utc::now();
        r.apply_new_message("42", "m-1", "bob", "yo", None, now);
        assert!(r.apply_read("42", "m-1"));
        // A late delivery receipt must not regress Read → Delivered.
        assert!(!r.apply_delivered("42", "m-1"));
        assert_eq!(r.messages("42")[0].status, MessageStatus::Read);
    }

    #[test]
    fn receipts_for_unknown_ids_are_ignored() {
        let mut r = reconciler();
        assert!(!r.apply_delivered("42", "nope"));
        assert!(!r.apply_read("42", "nope"));
        assert!(!r.apply_reaction("42", "nope", "❤️"));
        assert!(r.messages("42").is_empty());
    }

    #[test]
    fn reactions_append_with_duplicates() {
        let mut r = reconciler();
        let now = Utc::now();
        r.apply_new_message("42", "m-1", "bob", "yo", None, now);
        r.apply_reaction("42", "m-1", "❤️");
        r.apply_reaction("42", "m-1", "❤️");
        assert_eq!(r.messages("42")[0].reactions, ["❤️", "❤️"]);
    }

    #[test]
    fn full_send_scenario() {
        // open, join "42", send "hi", backend echoes srv-1 within window
        let mut r = reconciler();
        let t0 = Utc::now();
        r.record_local_send("42", "hi", t0);
        r.apply_new_message(
            "42",
            "srv-1",
            "alice",
            "hi",
            Some(1_700_000_000_000),
            t0 + chrono::Duration::milliseconds(200),
        );
        let msgs = r.messages("42");
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].id, "srv-1");
        assert_eq!(msgs[0].body, "hi");
        assert!(msgs[0].status >= MessageStatus::Delivered);
    }
}
