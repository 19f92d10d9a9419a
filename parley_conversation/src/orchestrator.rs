use std::fmt::Write;
use std::sync::Arc;

use parley_core::{
    Agent, Direction, ExchangeParams, GenerationRequest, MessageStore, NewMessage, Scope,
    TextGenerator, monotonic_millis,
};
use parley_memory::MemoryWindowStore;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::ConversationError;

/// What one participant of a room broadcast produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ParticipantOutcome {
    Replied { reply: String },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantReport {
    pub agent_id: i64,
    #[serde(flatten)]
    pub outcome: ParticipantOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastSummary {
    pub room_id: String,
    /// Id of the persisted inbound record.
    pub message_id: i64,
    pub participants: Vec<ParticipantReport>,
}

impl BroadcastSummary {
    /// One line per participant.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = String::new();
        for report in &self.participants {
            let _ = match &report.outcome {
                ParticipantOutcome::Replied { reply } => {
                    writeln!(text, "Agent {} replied: {reply}", report.agent_id)
                }
                ParticipantOutcome::Skipped { reason } => {
                    writeln!(text, "Agent {} skipped: {reason}", report.agent_id)
                }
                ParticipantOutcome::Failed { error } => {
                    writeln!(text, "Agent {} failed: {error}", report.agent_id)
                }
            };
        }
        text
    }
}

/// Runs private and room exchanges between agents.
pub struct Orchestrator {
    store: Arc<dyn MessageStore>,
    memory: Arc<MemoryWindowStore>,
    generator: Arc<dyn TextGenerator>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn MessageStore>,
        memory: Arc<MemoryWindowStore>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            store,
            memory,
            generator,
        }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn memory(&self) -> &Arc<MemoryWindowStore> {
        &self.memory
    }

    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    /// Resolve an agent and its role's system memory.
    pub async fn agent_with_memory(
        &self,
        agent_id: i64,
    ) -> Result<(Agent, String), ConversationError> {
        let agent = self
            .store
            .agent_by_id(agent_id)
            .await?
            .ok_or(ConversationError::AgentNotFound(agent_id))?;
        let system_memory = match agent.role_id {
            Some(role_id) => self
                .store
                .role_by_id(role_id)
                .await?
                .map(|role| role.system_memory_text().to_string())
                .unwrap_or_default(),
            None => String::new(),
        };
        Ok((agent, system_memory))
    }

    /// One agent answers `content` sent to it by another agent.
    ///
    /// The inbound record is persisted before anything else and stays even
    /// when the exchange then fails.
    #[instrument(skip(self, content, params))]
    pub async fn send_private(
        &self,
        sender_agent_id: i64,
        receiver_agent_id: i64,
        session_id: &str,
        content: &str,
        params: &ExchangeParams,
    ) -> Result<String, ConversationError> {
        self.store
            .insert_message(&NewMessage {
                sender_agent_id: Some(sender_agent_id),
                receiver_agent_id: Some(receiver_agent_id),
                session_id: Some(session_id.to_string()),
                content: content.to_string(),
                direction: Direction::In,
                created_at: monotonic_millis(),
                round_id: params.round_id,
                is_autonomous: false,
                ..NewMessage::default()
            })
            .await?;

        let (receiver, system_memory) = self.agent_with_memory(receiver_agent_id).await?;
        let window_key = MemoryWindowStore::key_for_session(receiver.id, session_id);
        let window = self.memory.window(&window_key).await?;

        let reply = self
            .generator
            .generate(&GenerationRequest {
                model_type: receiver.model_type.clone(),
                model_name: receiver.model_name.clone(),
                system_memory,
                window,
                user_message: content.to_string(),
                scope: Scope::Session(session_id.to_string()),
                agent_id: Some(receiver.id),
                params: params.clone(),
            })
            .await?;

        self.store
            .insert_message(&NewMessage {
                sender_agent_id: Some(receiver.id),
                receiver_agent_id: Some(sender_agent_id),
                session_id: Some(session_id.to_string()),
                content: reply.clone(),
                model_type: receiver.model_type.clone(),
                model_name: receiver.model_name.clone(),
                role_id: receiver.role_id,
                direction: Direction::Out,
                created_at: monotonic_millis(),
                round_id: params.round_id,
                is_autonomous: true,
                ..NewMessage::default()
            })
            .await?;

        self.memory
            .append(&window_key, &format!("Peer: {content}"))
            .await?;
        self.memory.append(&window_key, &format!("Me: {reply}")).await?;

        info!(
            "Agent {} replied to agent {} in session {}",
            receiver.id, sender_agent_id, session_id
        );
        Ok(reply)
    }

    /// Broadcast `content` into a room and let every participant answer.
    ///
    /// Participants are handled independently: an unknown agent is skipped
    /// and a failing one is reported, neither stops the others. With no
    /// participants only the inbound record is written.
    #[instrument(skip(self, content, params), fields(participants = participants.len()))]
    pub async fn broadcast_room(
        &self,
        room_id: &str,
        sender_agent_id: Option<i64>,
        participants: &[i64],
        content: &str,
        params: &ExchangeParams,
    ) -> Result<BroadcastSummary, ConversationError> {
        let message_id = self
            .store
            .insert_message(&NewMessage {
                sender_agent_id,
                room_id: Some(room_id.to_string()),
                content: content.to_string(),
                direction: Direction::In,
                created_at: monotonic_millis(),
                round_id: params.round_id,
                is_autonomous: false,
                ..NewMessage::default()
            })
            .await?;

        let mut reports = Vec::with_capacity(participants.len());
        for &agent_id in participants {
            let outcome = match self.reply_in_room(room_id, agent_id, content, params).await {
                Ok(reply) => ParticipantOutcome::Replied { reply },
                Err(ConversationError::AgentNotFound(id)) => {
                    warn!("Agent {} not found, skipping", id);
                    ParticipantOutcome::Skipped {
                        reason: format!("agent {id} not found"),
                    }
                }
                Err(e) => {
                    warn!("Agent {} failed to reply in room {}: {}", agent_id, room_id, e);
                    ParticipantOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            reports.push(ParticipantReport { agent_id, outcome });
        }

        Ok(BroadcastSummary {
            room_id: room_id.to_string(),
            message_id,
            participants: reports,
        })
    }

    async fn reply_in_room(
        &self,
        room_id: &str,
        agent_id: i64,
        content: &str,
        params: &ExchangeParams,
    ) -> Result<String, ConversationError> {
        let (agent, system_memory) = self.agent_with_memory(agent_id).await?;
        let window_key = MemoryWindowStore::key_for_room(agent.id, room_id);
        let window = self.memory.window(&window_key).await?;

        let reply = self
            .generator
            .generate(&GenerationRequest {
                model_type: agent.model_type.clone(),
                model_name: agent.model_name.clone(),
                system_memory,
                window,
                user_message: content.to_string(),
                scope: Scope::Room(room_id.to_string()),
                agent_id: Some(agent.id),
                params: params.clone(),
            })
            .await?;

        self.store
            .insert_message(&NewMessage {
                sender_agent_id: Some(agent.id),
                room_id: Some(room_id.to_string()),
                content: reply.clone(),
                model_type: agent.model_type.clone(),
                model_name: agent.model_name.clone(),
                role_id: agent.role_id,
                direction: Direction::Out,
                created_at: monotonic_millis(),
                round_id: params.round_id,
                is_autonomous: true,
                ..NewMessage::default()
            })
            .await?;

        self.memory
            .append(&window_key, &format!("Broadcast: {content}"))
            .await?;
        self.memory
            .append(&window_key, &format!("Reply: {reply}"))
            .await?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_renders_one_line_per_participant() {
        let summary = BroadcastSummary {
            room_id: "r1".to_string(),
            message_id: 1,
            participants: vec![
                ParticipantReport {
                    agent_id: 1,
                    outcome: ParticipantOutcome::Replied {
                        reply: "hi".to_string(),
                    },
                },
                ParticipantReport {
                    agent_id: 2,
                    outcome: ParticipantOutcome::Skipped {
                        reason: "agent 2 not found".to_string(),
                    },
                },
            ],
        };
        assert_eq!(
            summary.render(),
            "Agent 1 replied: hi\nAgent 2 skipped: agent 2 not found\n"
        );
    }

    #[test]
    fn participant_report_serializes_flat() {
        let report = ParticipantReport {
            agent_id: 3,
            outcome: ParticipantOutcome::Failed {
                error: "timeout".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&report).unwrap_or_default(),
            serde_json::json!({"agentId": 3, "status": "failed", "error": "timeout"})
        );
    }
}
