//! Per-connection relay session state.

use std::collections::HashSet;

/// State for a single identified WebSocket connection. Room membership here
/// mirrors the registry; it exists so the protocol handler can check
/// preconditions without touching shared maps.
pub struct RelaySession {
    /// Process-local connection identifier (`conn_` prefixed ULID).
    pub connection_id: String,
    /// Authenticated user ID (bound at IDENTIFY from the consumed ticket).
    pub user_id: String,
    /// Display name shown to other session members.
    pub display_name: String,
    /// Rooms this connection has joined.
    rooms: HashSet<String>,
}

impl RelaySession {
    pub fn new(connection_id: String, user_id: String, display_name: String) -> Self {
        Self {
            connection_id,
            user_id,
            display_name,
            rooms: HashSet::new(),
        }
    }

    pub fn is_member(&self, room_id: &str) -> bool {
        self.rooms.contains(room_id)
    }

    pub fn note_join(&mut self, room_id: String) {
        self.rooms.insert(room_id);
    }

    pub fn note_leave(&mut self, room_id: &str) -> bool {
        self.rooms.remove(room_id)
    }
}
