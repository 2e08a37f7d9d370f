use std::collections::HashSet;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::dto::ws::ServerMessage;

/// Identifier assigned to each live WebSocket connection.
pub type ConnectionId = Uuid;

/// Fan-out router for server events.
///
/// Three delivery scopes: a single connection, every connection subscribed to
/// a room's topic, or every connection on the server. Delivery is
/// fire-and-forget; a send to a closed writer is ignored and the connection
/// task cleans itself up on exit. Ordering holds per connection channel, so
/// events broadcast while a room's lock is held arrive in commit order.
pub struct BroadcastHub {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Message>>,
    topics: DashMap<Uuid, HashSet<ConnectionId>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            topics: DashMap::new(),
        }
    }

    /// Track a new connection's writer channel.
    pub fn register(&self, id: ConnectionId, tx: mpsc::UnboundedSender<Message>) {
        self.connections.insert(id, tx);
    }

    /// Forget a connection and drop it from every room topic.
    pub fn unregister(&self, id: ConnectionId) {
        self.connections.remove(&id);
        for mut entry in self.topics.iter_mut() {
            entry.value_mut().remove(&id);
        }
    }

    /// Subscribe `connection` to `room`'s broadcast topic.
    pub fn subscribe(&self, room: Uuid, connection: ConnectionId) {
        self.topics.entry(room).or_default().insert(connection);
    }

    /// Remove `connection` from `room`'s broadcast topic.
    pub fn unsubscribe(&self, room: Uuid, connection: ConnectionId) {
        if let Some(mut subscribers) = self.topics.get_mut(&room) {
            subscribers.remove(&connection);
        }
    }

    /// Drop a room topic entirely (room deleted).
    pub fn drop_topic(&self, room: Uuid) {
        self.topics.remove(&room);
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Deliver only to the originating connection.
    pub fn unicast(&self, connection: ConnectionId, message: &ServerMessage) {
        let Some(payload) = encode(message) else {
            return;
        };
        if let Some(tx) = self.connections.get(&connection) {
            let _ = tx.send(payload);
        }
    }

    /// Deliver to every subscriber of `room`, optionally excluding the
    /// originating connection.
    pub fn broadcast_room(
        &self,
        room: Uuid,
        message: &ServerMessage,
        except: Option<ConnectionId>,
    ) {
        let Some(payload) = encode(message) else {
            return;
        };
        let Some(subscribers) = self.topics.get(&room) else {
            return;
        };
        for connection in subscribers.iter() {
            if Some(*connection) == except {
                continue;
            }
            if let Some(tx) = self.connections.get(connection) {
                let _ = tx.send(payload.clone());
            }
        }
    }

    /// Deliver to every connected client.
    pub fn broadcast_global(&self, message: &ServerMessage) {
        let Some(payload) = encode(message) else {
            return;
        };
        for entry in self.connections.iter() {
            let _ = entry.value().send(payload.clone());
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a server message into a text frame, logging rather than
/// propagating serialization bugs.
fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound message");
            None
        }
    }
}
