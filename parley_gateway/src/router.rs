//! Per-connection frame handling: handshake, membership, delivery and receipts.

use std::collections::HashMap;
use std::sync::Arc;

use parley_core::{MessageStore, NewChatRecord};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::frame::{Frame, FrameType};
use crate::registry::{Connection, ConnectionId, SessionRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    #[error("missing userId parameter, connection refused")]
    MissingUserId,
}

/// Routes decoded client frames between connected users.
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn MessageStore>,
}

impl MessageRouter {
    pub fn new(registry: Arc<SessionRegistry>, store: Arc<dyn MessageStore>) -> Self {
        Self { registry, store }
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The trimmed, non-blank `userId` query parameter.
    pub fn resolve_user_id(query: &HashMap<String, String>) -> Result<String, HandshakeError> {
        query
            .get("userId")
            .map(|raw| raw.trim())
            .filter(|user| !user.is_empty())
            .map(str::to_string)
            .ok_or(HandshakeError::MissingUserId)
    }

    /// Register the connection under its user and acknowledge it. On failure
    /// an ERROR frame is queued and nothing is registered; the caller closes.
    pub fn handshake(
        &self,
        query: &HashMap<String, String>,
        connection: Arc<Connection>,
    ) -> Result<String, HandshakeError> {
        match Self::resolve_user_id(query) {
            Ok(user_id) => {
                self.registry.connect(&user_id, Arc::clone(&connection));
                connection.send(Frame::ack(None, format!("connected as {user_id}")).to_text());
                Ok(user_id)
            }
            Err(e) => {
                warn!(connection_id = %connection.id(), "Handshake rejected: {}", e);
                connection.send(Frame::error(None, e.to_string()).to_text());
                Err(e)
            }
        }
    }

    /// Handle one inbound text frame. Every outcome is reported to the sender
    /// as ACK or ERROR; nothing here closes the connection.
    pub async fn handle_text(&self, connection: &Connection, text: &str) {
        let reply = self.route(connection, text).await;
        connection.send(reply.to_text());
    }

    async fn route(&self, connection: &Connection, text: &str) -> Frame {
        let Some(user_id) = self.registry.user_for(connection.id()) else {
            return Frame::error(None, "unrecognised user session");
        };
        let mut frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(rejected) => {
                debug!(user_id = %user_id, "Rejected frame: {}", rejected.error);
                return Frame::error(rejected.client_msg_id, rejected.error.to_string());
            }
        };
        frame.from_user_id = Some(user_id.clone());
        let client_msg_id = frame.client_msg_id.clone();

        // Required fields were checked by `Frame::decode`.
        let room_id = frame.room_id.clone().unwrap_or_default();
        let to_user_id = frame.to_user_id.clone().unwrap_or_default();
        let content = frame.content.clone().unwrap_or_default();

        match frame.frame_type {
            FrameType::JoinGroup => {
                self.registry.join_room(&room_id, &user_id);
                info!(user_id = %user_id, room_id = %room_id, "Joined room");
                Frame::ack(client_msg_id, format!("joined room {room_id}"))
            }
            FrameType::LeaveGroup => {
                self.registry.leave_room(&room_id, &user_id);
                info!(user_id = %user_id, room_id = %room_id, "Left room");
                Frame::ack(client_msg_id, format!("left room {room_id}"))
            }
            FrameType::GroupMsg => {
                let record = NewChatRecord::group(&user_id, &room_id, &content);
                if let Err(e) = self.store.insert_chat(&record).await {
                    warn!(
                        user_id = %user_id,
                        room_id = %room_id,
                        "Failed to persist group message: {}",
                        e
                    );
                    return Frame::error(client_msg_id, format!("failed to persist message: {e}"));
                }
                let payload = frame.to_text();
                let delivered: usize = self
                    .registry
                    .members_of(&room_id)
                    .iter()
                    .map(|member| self.deliver(member, &payload))
                    .sum();
                debug!(
                    user_id = %user_id,
                    room_id = %room_id,
                    delivered,
                    "Group message fanned out"
                );
                Frame::ack(
                    client_msg_id,
                    format!("group message delivered and stored in room {room_id}"),
                )
            }
            FrameType::PrivateMsg => {
                let record = NewChatRecord::private(&user_id, &to_user_id, &content);
                if let Err(e) = self.store.insert_chat(&record).await {
                    warn!(
                        user_id = %user_id,
                        to_user_id = %to_user_id,
                        "Failed to persist private message: {}",
                        e
                    );
                    return Frame::error(client_msg_id, format!("failed to persist message: {e}"));
                }
                let delivered = self.deliver(&to_user_id, &frame.to_text());
                debug!(
                    user_id = %user_id,
                    to_user_id = %to_user_id,
                    delivered,
                    "Private message delivered"
                );
                Frame::ack(
                    client_msg_id,
                    format!("private message sent and stored for {to_user_id}"),
                )
            }
            FrameType::Ack | FrameType::Error => {
                Frame::error(client_msg_id, "unsupported message type from client")
            }
        }
    }

    /// Queue `payload` on every open connection of `user_id`. Returns how many
    /// connections accepted it.
    fn deliver(&self, user_id: &str, payload: &str) -> usize {
        self.registry
            .connections_for(user_id)
            .iter()
            .filter(|connection| connection.send(payload.to_string()))
            .count()
    }

    pub fn disconnect(&self, connection_id: ConnectionId) {
        if let Some(user_id) = self.registry.disconnect(connection_id) {
            info!(connection_id = %connection_id, user_id = %user_id, "Connection closed");
        }
    }
}
