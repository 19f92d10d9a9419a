//! The text-generation capability and its request shape.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Conversation scope a generation call belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Scope {
    Session(String),
    Room(String),
    #[default]
    None,
}

/// Per-exchange parameters forwarded to the model and to persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeParams {
    /// Round the exchange belongs to; copied onto persisted records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Vendor-specific extras, copied verbatim into the vendor request.
    /// Fields the client sets itself take precedence.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ExchangeParams {
    #[must_use]
    pub fn for_round(round_id: Option<i64>) -> Self {
        Self {
            round_id,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Vendor selector taken from the agent record.
    pub model_type: Option<String>,
    pub model_name: Option<String>,
    pub system_memory: String,
    /// Recent conversation window, oldest first.
    pub window: Vec<String>,
    pub user_message: String,
    pub scope: Scope,
    pub agent_id: Option<i64>,
    pub params: ExchangeParams,
}

impl GenerationRequest {
    /// Render system memory, window and current message into a single prompt.
    ///
    /// Empty sections are omitted. Vendors that accept a separate system
    /// message use [`Self::render_user_prompt`] instead.
    #[must_use]
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::new();
        let system = self.system_memory.trim();
        if !system.is_empty() {
            prompt.push_str("[System memory]\n");
            prompt.push_str(system);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&self.render_user_prompt());
        prompt
    }

    /// Window and current message, without the system memory block.
    #[must_use]
    pub fn render_user_prompt(&self) -> String {
        let mut prompt = String::new();
        let entries: Vec<&str> = self
            .window
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .collect();
        if !entries.is_empty() {
            prompt.push_str("[Recent context]\n");
            for entry in entries {
                prompt.push_str("- ");
                prompt.push_str(entry);
                prompt.push('\n');
            }
            prompt.push('\n');
        }
        let message = self.user_message.trim();
        if !message.is_empty() {
            prompt.push_str("[Current message]\n");
            prompt.push_str(message);
        }
        prompt
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no generator available for vendor: {0}")]
    Unsupported(String),
}

/// A vendor-specific text generator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Short vendor name used in logs.
    fn name(&self) -> &str;
}
