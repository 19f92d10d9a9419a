//! Live connections, the users behind them and their room memberships.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl Default for ConnectionId {
    fn default() -> Self {
        Self(Uuid::now_v7())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// Sending half of one client socket.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
}

impl Connection {
    /// A connection with a bounded outbound queue and the receiver draining it.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: ConnectionId::default(),
                tx,
            },
            rx,
        )
    }

    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue `text` without waiting. Returns `false` if the queue is full or
    /// the socket is gone; the message is dropped in both cases.
    pub fn send(&self, text: String) -> bool {
        match self.tx.try_send(text) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    msg_len = msg.len(),
                    "Send queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// In-process registry of connections, users and rooms.
///
/// A user is known only while it has at least one connection. Rooms with no
/// members are dropped. No operation fails on unknown ids.
#[derive(Default)]
pub struct SessionRegistry {
    owners: DashMap<ConnectionId, String>,
    users: DashMap<String, HashMap<ConnectionId, Arc<Connection>>>,
    rooms: DashMap<String, HashSet<String>>,
    /// Reverse index of `rooms`: the rooms each user is in.
    joined: DashMap<String, HashSet<String>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, user_id: &str, connection: Arc<Connection>) {
        let id = connection.id();
        self.users
            .entry(user_id.to_string())
            .or_default()
            .insert(id, connection);
        self.owners.insert(id, user_id.to_string());
        tracing::info!(connection_id = %id, user_id, "Connection registered");
    }

    /// Remove a connection. When it was the user's last one the user leaves
    /// every room. Returns the user the connection belonged to.
    pub fn disconnect(&self, connection_id: ConnectionId) -> Option<String> {
        let (_, user_id) = self.owners.remove(&connection_id)?;

        // Holding the user's entry keeps a concurrent connect for the same
        // user from interleaving with the room purge.
        if let Entry::Occupied(mut entry) = self.users.entry(user_id.clone()) {
            entry.get_mut().remove(&connection_id);
            if entry.get().is_empty() {
                let rooms = self
                    .joined
                    .remove(&user_id)
                    .map(|(_, rooms)| rooms)
                    .unwrap_or_default();
                for room_id in &rooms {
                    self.remove_member(room_id, &user_id);
                }
                entry.remove();
                tracing::info!(user_id = %user_id, "Last connection closed, user left all rooms");
            }
        }
        Some(user_id)
    }

    /// Snapshot of the user's open connections; empty if unknown.
    pub fn connections_for(&self, user_id: &str) -> Vec<Arc<Connection>> {
        self.users
            .get(user_id)
            .map(|conns| conns.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn user_for(&self, connection_id: ConnectionId) -> Option<String> {
        self.owners.get(&connection_id).map(|user| user.clone())
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    pub fn join_room(&self, room_id: &str, user_id: &str) {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(user_id.to_string());
        self.joined
            .entry(user_id.to_string())
            .or_default()
            .insert(room_id.to_string());
    }

    pub fn leave_room(&self, room_id: &str, user_id: &str) {
        self.remove_member(room_id, user_id);
        if let Some(mut rooms) = self.joined.get_mut(user_id) {
            rooms.remove(room_id);
        }
        self.joined.remove_if(user_id, |_, rooms| rooms.is_empty());
    }

    fn remove_member(&self, room_id: &str, user_id: &str) {
        if let Some(mut members) = self.rooms.get_mut(room_id) {
            members.remove(user_id);
        }
        self.rooms.remove_if(room_id, |_, members| members.is_empty());
    }

    /// Sorted snapshot of the rooms a user is in.
    pub fn rooms_of(&self, user_id: &str) -> Vec<String> {
        let mut rooms: Vec<String> = self
            .joined
            .get(user_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort_unstable();
        rooms
    }

    /// Sorted snapshot of a room's members.
    pub fn members_of(&self, room_id: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.owners.len()
    }
}
