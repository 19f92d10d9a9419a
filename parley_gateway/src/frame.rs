//! Wire format of the chat socket.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameType {
    JoinGroup,
    LeaveGroup,
    GroupMsg,
    PrivateMsg,
    Ack,
    Error,
}

impl FrameType {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "JOIN_GROUP" => Some(Self::JoinGroup),
            "LEAVE_GROUP" => Some(Self::LeaveGroup),
            "GROUP_MSG" => Some(Self::GroupMsg),
            "PRIVATE_MSG" => Some(Self::PrivateMsg),
            "ACK" => Some(Self::Ack),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    /// Always set by the server.
    pub from_user_id: Option<String>,
    pub to_user_id: Option<String>,
    pub room_id: Option<String>,
    pub content: Option<String>,
    pub client_msg_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("missing message type")]
    MissingType,

    #[error("unsupported message type: {0}")]
    Unsupported(String),

    #[error("{frame} is missing {field}")]
    MissingField {
        frame: &'static str,
        field: &'static str,
    },
}

/// A frame that could not be accepted, with the client id to echo back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub error: FrameError,
    pub client_msg_id: Option<String>,
}

fn text_field(map: &serde_json::Map<String, Value>, field: &str) -> Option<String> {
    match map.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn non_blank(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

impl Frame {
    fn reply(frame_type: FrameType, client_msg_id: Option<String>, content: String) -> Self {
        Self {
            frame_type,
            from_user_id: None,
            to_user_id: None,
            room_id: None,
            content: Some(content),
            client_msg_id,
        }
    }

    #[must_use]
    pub fn ack(client_msg_id: Option<String>, content: impl Into<String>) -> Self {
        Self::reply(FrameType::Ack, client_msg_id, content.into())
    }

    #[must_use]
    pub fn error(client_msg_id: Option<String>, content: impl Into<String>) -> Self {
        Self::reply(FrameType::Error, client_msg_id, content.into())
    }

    /// Decode an inbound client frame and check its required fields.
    ///
    /// Clients may not send ACK or ERROR. Blank strings count as missing.
    pub fn decode(text: &str) -> Result<Self, Rejected> {
        let value: Value = serde_json::from_str(text).map_err(|e| Rejected {
            error: FrameError::Malformed(e.to_string()),
            client_msg_id: None,
        })?;
        let Value::Object(map) = value else {
            return Err(Rejected {
                error: FrameError::Malformed("expected a JSON object".to_string()),
                client_msg_id: None,
            });
        };
        let client_msg_id = text_field(&map, "clientMsgId");
        let reject = |error| Rejected {
            error,
            client_msg_id: client_msg_id.clone(),
        };

        let label = text_field(&map, "type").ok_or_else(|| reject(FrameError::MissingType))?;
        let frame_type = match FrameType::from_label(label.trim()) {
            Some(FrameType::Ack | FrameType::Error) | None => {
                return Err(reject(FrameError::Unsupported(label)));
            }
            Some(frame_type) => frame_type,
        };

        let frame = Self {
            frame_type,
            from_user_id: None,
            to_user_id: text_field(&map, "toUserId"),
            room_id: text_field(&map, "roomId"),
            content: text_field(&map, "content"),
            client_msg_id: client_msg_id.clone(),
        };
        frame.validate().map_err(reject)?;
        Ok(frame)
    }

    fn validate(&self) -> Result<(), FrameError> {
        let (frame, required) = match self.frame_type {
            FrameType::JoinGroup => ("JOIN_GROUP", vec![("roomId", &self.room_id)]),
            FrameType::LeaveGroup => ("LEAVE_GROUP", vec![("roomId", &self.room_id)]),
            FrameType::GroupMsg => (
                "GROUP_MSG",
                vec![("roomId", &self.room_id), ("content", &self.content)],
            ),
            FrameType::PrivateMsg => (
                "PRIVATE_MSG",
                vec![("toUserId", &self.to_user_id), ("content", &self.content)],
            ),
            FrameType::Ack | FrameType::Error => return Ok(()),
        };
        for (field, value) in required {
            if !non_blank(value.as_ref()) {
                return Err(FrameError::MissingField { frame, field });
            }
        }
        Ok(())
    }

    /// JSON text of this frame.
    #[must_use]
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
