use std::sync::Arc;

use parley_core::{ExchangeParams, GenerationRequest, MessageRecord, PUBLIC_ROOM, Scope};
use parley_memory::MemoryWindowStore;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::decision::{Action, Decision, is_agent_token, parse_agent_target, parse_decision};
use crate::prompt::{DecisionContext, build_decision_prompt};
use crate::{ConversationError, Orchestrator};

/// Session id shared by two agents talking privately, independent of order.
#[must_use]
pub fn session_id_for(a: i64, b: i64) -> String {
    format!("s-{}-{}", a.min(b), a.max(b))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoundOutcome {
    Silent,
    PublicPost { message_id: i64 },
    PrivateMessage { target: i64, reply: String },
    /// The decision could not be carried out, e.g. an unresolvable target.
    Dropped { reason: String },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRoundReport {
    pub agent_id: i64,
    #[serde(flatten)]
    pub outcome: RoundOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundReport {
    pub round_id: i64,
    pub agents: Vec<AgentRoundReport>,
}

/// Lets each participant decide whether to speak, and acts on that decision.
pub struct RoundRunner {
    orchestrator: Arc<Orchestrator>,
    digest_limit: u64,
    public_room: String,
    max_batch_rounds: u32,
}

/// Default cap on rounds per `run_rounds` call.
pub const DEFAULT_MAX_BATCH_ROUNDS: u32 = 100;

impl RoundRunner {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            digest_limit: 5,
            public_room: PUBLIC_ROOM.to_string(),
            max_batch_rounds: DEFAULT_MAX_BATCH_ROUNDS,
        }
    }

    #[must_use]
    pub const fn with_digest_limit(mut self, limit: u64) -> Self {
        self.digest_limit = limit;
        self
    }

    #[must_use]
    pub fn with_public_room(mut self, room_id: &str) -> Self {
        self.public_room = room_id.to_string();
        self
    }

    #[must_use]
    pub const fn with_max_batch_rounds(mut self, max: u32) -> Self {
        self.max_batch_rounds = max;
        self
    }

    /// Run one round. Participants act one after another; a failing
    /// participant is recorded in the report and never aborts the round.
    #[instrument(skip(self))]
    pub async fn run_round(&self, participants: &[i64], round_id: i64) -> RoundReport {
        let mut agents = Vec::with_capacity(participants.len());
        for &agent_id in participants {
            let outcome = match self.run_for_agent(agent_id, round_id).await {
                Ok(outcome) => outcome,
                Err(ConversationError::AgentNotFound(id)) => {
                    warn!("Agent {} not found, skipping", id);
                    RoundOutcome::Skipped {
                        reason: format!("agent {id} not found"),
                    }
                }
                Err(e) => {
                    warn!("Agent {} failed in round {}: {}", agent_id, round_id, e);
                    RoundOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            agents.push(AgentRoundReport { agent_id, outcome });
        }
        info!("Round {} finished with {} participants", round_id, agents.len());
        RoundReport { round_id, agents }
    }

    /// Run `count` consecutive rounds starting at `start_round_id`; at least one.
    /// Rejected before any round runs when `count` exceeds the batch cap or the
    /// last round id would overflow.
    pub async fn run_rounds(
        &self,
        participants: &[i64],
        start_round_id: i64,
        count: u32,
    ) -> Result<Vec<RoundReport>, ConversationError> {
        let count = count.max(1);
        if count > self.max_batch_rounds {
            return Err(ConversationError::InvalidRounds(format!(
                "{count} rounds requested, at most {} allowed",
                self.max_batch_rounds
            )));
        }
        start_round_id
            .checked_add(i64::from(count - 1))
            .ok_or_else(|| {
                ConversationError::InvalidRounds(format!(
                    "round ids starting at {start_round_id} overflow after {count} rounds"
                ))
            })?;

        let mut reports = Vec::new();
        for offset in 0..count {
            let round_id = start_round_id + i64::from(offset);
            reports.push(self.run_round(participants, round_id).await);
        }
        Ok(reports)
    }

    async fn run_for_agent(
        &self,
        agent_id: i64,
        round_id: i64,
    ) -> Result<RoundOutcome, ConversationError> {
        let (agent, system_memory) = self.orchestrator.agent_with_memory(agent_id).await?;
        let window_key = MemoryWindowStore::key_for_room(agent.id, &self.public_room);
        let window = self.orchestrator.memory().window(&window_key).await?;

        let context = DecisionContext {
            system_memory,
            window,
            public_digest: self.public_digest().await,
            private_digest: self.private_digest(agent.id).await,
        };
        let params = ExchangeParams::for_round(Some(round_id));
        let request = GenerationRequest {
            model_type: agent.model_type.clone(),
            model_name: agent.model_name.clone(),
            user_message: build_decision_prompt(&context),
            scope: Scope::Room(self.public_room.clone()),
            agent_id: Some(agent.id),
            params: params.clone(),
            ..GenerationRequest::default()
        };

        let text = match self.orchestrator.generator().generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Agent {} produced no decision: {}", agent.id, e);
                String::new()
            }
        };
        let decision = parse_decision(&text);
        debug!("Agent {} decided {:?}", agent.id, decision.action);

        self.dispatch(agent.id, decision, &params).await
    }

    async fn dispatch(
        &self,
        agent_id: i64,
        decision: Decision,
        params: &ExchangeParams,
    ) -> Result<RoundOutcome, ConversationError> {
        let content = decision.content.unwrap_or_default();
        let target = decision.target.as_deref().unwrap_or_default();
        match decision.action {
            Action::Silence => Ok(RoundOutcome::Silent),
            Action::PrivateMessage => match parse_agent_target(target) {
                Some(target) => self.private(agent_id, target, &content, params).await,
                None => Ok(dropped(format!("unresolvable target {target:?}"))),
            },
            Action::Reply if is_agent_token(target) => match parse_agent_target(target) {
                Some(target) => self.private(agent_id, target, &content, params).await,
                None => Ok(dropped(format!("unresolvable target {target:?}"))),
            },
            Action::PublicPost | Action::Reply => {
                self.public_post(agent_id, &content, params).await
            }
        }
    }

    async fn public_post(
        &self,
        agent_id: i64,
        content: &str,
        params: &ExchangeParams,
    ) -> Result<RoundOutcome, ConversationError> {
        let summary = self
            .orchestrator
            .broadcast_room(&self.public_room, Some(agent_id), &[], content, params)
            .await?;
        Ok(RoundOutcome::PublicPost {
            message_id: summary.message_id,
        })
    }

    async fn private(
        &self,
        agent_id: i64,
        target: i64,
        content: &str,
        params: &ExchangeParams,
    ) -> Result<RoundOutcome, ConversationError> {
        let session_id = session_id_for(agent_id, target);
        match self
            .orchestrator
            .send_private(agent_id, target, &session_id, content, params)
            .await
        {
            Ok(reply) => Ok(RoundOutcome::PrivateMessage { target, reply }),
            // The speaker exists; an unknown target only drops this message.
            Err(ConversationError::AgentNotFound(id)) => {
                Ok(dropped(format!("target agent {id} not found")))
            }
            Err(e) => Err(e),
        }
    }

    /// Most recent public posts, oldest first. Empty if the query fails.
    async fn public_digest(&self) -> Vec<String> {
        match self
            .orchestrator
            .store()
            .recent_in_room(&self.public_room, self.digest_limit)
            .await
        {
            Ok(records) => digest(records, |m| {
                format!("{}: {}", speaker(m.sender_agent_id), m.content.trim())
            }),
            Err(e) => {
                warn!("Public pool digest unavailable: {}", e);
                Vec::new()
            }
        }
    }

    async fn private_digest(&self, agent_id: i64) -> Vec<String> {
        match self
            .orchestrator
            .store()
            .recent_inbound_private(agent_id, self.digest_limit)
            .await
        {
            Ok(records) => digest(records, |m| {
                format!("from {}: {}", speaker(m.sender_agent_id), m.content.trim())
            }),
            Err(e) => {
                warn!("Private digest for agent {} unavailable: {}", agent_id, e);
                Vec::new()
            }
        }
    }
}

const fn dropped(reason: String) -> RoundOutcome {
    RoundOutcome::Dropped { reason }
}

fn speaker(sender: Option<i64>) -> String {
    sender.map_or_else(|| "someone".to_string(), |id| format!("agent_{id}"))
}

fn digest<F>(newest_first: Vec<MessageRecord>, line: F) -> Vec<String>
where
    F: Fn(&MessageRecord) -> String,
{
    newest_first.iter().rev().map(line).collect()
}
