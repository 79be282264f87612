//! Room membership tracking.
//!
//! Join intent is transport-independent: rooms stay in the set across
//! disconnects, and every transition into Open replays a join for each
//! tracked room in original join order, restoring the server-side
//! subscription state a reconnect would otherwise have dropped.

/// Insertion-ordered set of room ids the client intends to be joined to.
#[derive(Debug, Default)]
pub struct RoomTracker {
    rooms: Vec<String>,
}

impl RoomTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the intent to be in `room`. Idempotent at the model level;
    /// returns whether the room was newly added. The caller still emits
    /// a join command either way (the backend's join is idempotent too).
    pub fn join(&mut self, room: &str) -> bool {
        if self.rooms.iter().any(|r| r == room) {
            return false;
        }
        self.rooms.push(room.to_string());
        true
    }

    pub fn contains(&self, room: &str) -> bool {
        self.rooms.iter().any(|r| r == room)
    }

    /// Rooms to replay after (re)connection, in insertion order.
    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_idempotent_and_ordered() {
        let mut t = RoomTracker::new();
        assert!(t.join("42"));
        assert!(t.join("lobby"));
        assert!(!t.join("42"));
        assert!(t.join("dev"));
        assert_eq!(t.rooms(), ["42", "lobby", "dev"]);
    }

    #[test]
    fn membership_survives_without_transport() {
        // The tracker has no notion of a connection at all; this pins
        // the contract that disconnects cannot mutate it.
        let mut t = RoomTracker::new();
        t.join("42");
        assert!(t.contains("42"));
        assert!(!t.contains("43"));
    }
}
