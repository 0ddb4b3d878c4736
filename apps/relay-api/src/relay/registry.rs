//! Connection registry: live connections, their outbound channels, and
//! room membership.
//!
//! Uses `DashMap` for shard-level concurrency and `parking_lot::Mutex` per
//! entry for non-poisoning, fast locking. Fan-out enumerates members while
//! holding the room's membership lock, so a broadcast and a concurrent
//! join/leave are mutually ordered and delivery reaches exactly the
//! connections joined at that instant.

use std::collections::HashSet;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::events::ServerFrame;

/// Outbound channel feeding one connection's writer loop.
pub type OutboundSender = mpsc::UnboundedSender<ServerFrame>;

struct ConnectionEntry {
    sender: OutboundSender,
    rooms: HashSet<String>,
}

/// Registry of all live relay connections.
pub struct ConnectionRegistry {
    connections: DashMap<String, Mutex<ConnectionEntry>>,
    rooms: DashMap<String, Mutex<HashSet<String>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Add a connection with no room membership. No-op if already present.
    pub fn register(&self, connection_id: &str, sender: OutboundSender) {
        self.connections
            .entry(connection_id.to_string())
            .or_insert_with(|| {
                Mutex::new(ConnectionEntry {
                    sender,
                    rooms: HashSet::new(),
                })
            });
    }

    /// Add the connection to a room's membership set. A connection may be in
    /// several rooms at once; joining the same room twice is a no-op.
    pub fn join(&self, connection_id: &str, room_id: &str) {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Mutex::new(HashSet::new()))
            .lock()
            .insert(connection_id.to_string());

        if let Some(entry) = self.connections.get(connection_id) {
            entry.lock().rooms.insert(room_id.to_string());
        }
    }

    /// Remove the connection from a room. Returns whether it was a member.
    /// The room entry itself is dropped once its last member leaves.
    pub fn leave(&self, connection_id: &str, room_id: &str) -> bool {
        let removed = self.remove_membership(connection_id, room_id);

        if let Some(entry) = self.connections.get(connection_id) {
            entry.lock().rooms.remove(room_id);
        }

        removed
    }

    /// Remove the connection from every room it belonged to and drop its
    /// outbound channel. Returns the rooms it was in. Idempotent.
    pub fn unregister(&self, connection_id: &str) -> Vec<String> {
        let Some((_, entry)) = self.connections.remove(connection_id) else {
            return Vec::new();
        };

        let rooms: Vec<String> = entry.into_inner().rooms.into_iter().collect();
        for room_id in &rooms {
            self.remove_membership(connection_id, room_id);
        }

        rooms
    }

    /// Duplicate-free snapshot of the connections currently joined to a room.
    pub fn members_of(&self, room_id: &str) -> Vec<String> {
        match self.rooms.get(room_id) {
            Some(entry) => entry.lock().iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Run `f` for each current member of a room, under the room's
    /// membership lock.
    pub fn for_each_member(&self, room_id: &str, mut f: impl FnMut(&str, &OutboundSender)) {
        let Some(entry) = self.rooms.get(room_id) else {
            return;
        };
        let members = entry.lock();
        for connection_id in members.iter() {
            if let Some(conn) = self.connections.get(connection_id) {
                f(connection_id, &conn.lock().sender);
            }
        }
    }

    /// Deliver a frame to a single connection. Returns false when the
    /// connection is gone; the caller treats that as a non-event.
    pub fn send_to(&self, connection_id: &str, frame: ServerFrame) -> bool {
        match self.connections.get(connection_id) {
            Some(entry) => entry.lock().sender.send(frame).is_ok(),
            None => false,
        }
    }

    fn remove_membership(&self, connection_id: &str, room_id: &str) -> bool {
        let mut removed = false;
        let mut now_empty = false;

        if let Some(entry) = self.rooms.get(room_id) {
            let mut members = entry.lock();
            removed = members.remove(connection_id);
            now_empty = members.is_empty();
        }

        if now_empty {
            self.rooms.remove_if(room_id, |_, members| members.lock().is_empty());
        }

        removed
    }
}
