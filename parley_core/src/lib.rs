#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Shared domain types and collaborator traits for parley.
//!
//! Everything that talks to the outside world (text generation, the
//! relational store, the ordered-list key-value store) is expressed here as
//! a trait so the orchestration crates can be exercised with in-memory
//! doubles.

use serde::{Deserialize, Serialize};

pub mod clock;
pub mod generation;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clock::monotonic_millis;
pub use generation::{ExchangeParams, GenerationError, GenerationRequest, Scope, TextGenerator};
pub use store::{ListStore, MessageStore};

/// Reserved room id of the shared autonomous-agent feed.
pub const PUBLIC_ROOM: &str = "PUBLIC";

/// Whether a persisted message was received by the system or produced by a model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Received from a human or another agent, awaiting a reply.
    #[default]
    In,
    /// Produced by the model.
    Out,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::In => write!(f, "IN"),
            Self::Out => write!(f, "OUT"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            _ => Err(anyhow::anyhow!("unknown message direction: {s}")),
        }
    }
}

/// A role supplies the immutable system memory of the agents bound to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub system_memory: Option<String>,
}

impl Role {
    /// System memory text, or `""` when unset or blank.
    #[must_use]
    pub fn system_memory_text(&self) -> &str {
        match self.system_memory.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub role_id: Option<i64>,
    /// Vendor selector, e.g. `ollama` or `dash_scope`.
    pub model_type: Option<String>,
    pub model_name: Option<String>,
    pub description: Option<String>,
}

/// A persisted agent-level message. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: i64,
    pub sender_agent_id: Option<i64>,
    pub receiver_agent_id: Option<i64>,
    pub session_id: Option<String>,
    pub room_id: Option<String>,
    pub content: String,
    pub model_type: Option<String>,
    pub model_name: Option<String>,
    pub role_id: Option<i64>,
    pub direction: Direction,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub round_id: Option<i64>,
    pub is_autonomous: bool,
    pub metadata: Option<String>,
}

/// Insert payload for [`MessageRecord`]; the store assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMessage {
    pub sender_agent_id: Option<i64>,
    pub receiver_agent_id: Option<i64>,
    pub session_id: Option<String>,
    pub room_id: Option<String>,
    pub content: String,
    pub model_type: Option<String>,
    pub model_name: Option<String>,
    pub role_id: Option<i64>,
    pub direction: Direction,
    pub created_at: i64,
    pub round_id: Option<i64>,
    pub is_autonomous: bool,
    pub metadata: Option<String>,
}

impl NewMessage {
    #[must_use]
    pub fn into_record(self, id: i64) -> MessageRecord {
        MessageRecord {
            id,
            sender_agent_id: self.sender_agent_id,
            receiver_agent_id: self.receiver_agent_id,
            session_id: self.session_id,
            room_id: self.room_id,
            content: self.content,
            model_type: self.model_type,
            model_name: self.model_name,
            role_id: self.role_id,
            direction: self.direction,
            created_at: self.created_at,
            round_id: self.round_id,
            is_autonomous: self.is_autonomous,
            metadata: self.metadata,
        }
    }
}

/// Kind of a persisted human-facing chat frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatKind {
    GroupMsg,
    PrivateMsg,
}

impl std::fmt::Display for ChatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroupMsg => write!(f, "GROUP_MSG"),
            Self::PrivateMsg => write!(f, "PRIVATE_MSG"),
        }
    }
}

impl std::str::FromStr for ChatKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GROUP_MSG" => Ok(Self::GroupMsg),
            "PRIVATE_MSG" => Ok(Self::PrivateMsg),
            _ => Err(anyhow::anyhow!("unknown chat kind: {s}")),
        }
    }
}

/// A chat frame persisted by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    pub id: i64,
    pub kind: ChatKind,
    pub from_user_id: String,
    pub to_user_id: Option<String>,
    pub room_id: Option<String>,
    pub content: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatRecord {
    pub kind: ChatKind,
    pub from_user_id: String,
    pub to_user_id: Option<String>,
    pub room_id: Option<String>,
    pub content: String,
}

impl NewChatRecord {
    #[must_use]
    pub fn group(from_user_id: &str, room_id: &str, content: &str) -> Self {
        Self {
            kind: ChatKind::GroupMsg,
            from_user_id: from_user_id.to_string(),
            to_user_id: None,
            room_id: Some(room_id.to_string()),
            content: content.to_string(),
        }
    }

    #[must_use]
    pub fn private(from_user_id: &str, to_user_id: &str, content: &str) -> Self {
        Self {
            kind: ChatKind::PrivateMsg,
            from_user_id: from_user_id.to_string(),
            to_user_id: Some(to_user_id.to_string()),
            room_id: None,
            content: content.to_string(),
        }
    }
}

/// Zero-based page of a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

impl Page {
    /// Rows skipped before this page; saturates instead of overflowing.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.number.saturating_mul(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 0,
            size: 50,
        }
    }
}

/// Optional creation-time bounds (epoch ms, inclusive) for history queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl TimeRange {
    #[must_use]
    pub fn contains(&self, ts: i64) -> bool {
        self.from.is_none_or(|from| ts >= from) && self.to.is_none_or(|to| ts <= to)
    }
}
