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

//! Agent-mediated exchanges and the autonomous round loop.
//!
//! [`Orchestrator`] runs private and room exchanges: it persists the inbound
//! message, asks each replying agent's model for a reply, persists that and
//! updates the agent's memory window. [`RoundRunner`] lets each participant
//! decide on its own what to do and dispatches that decision back through
//! the orchestrator.

pub mod decision;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod round;

pub use decision::{Action, Decision, parse_agent_target, parse_decision};
pub use error::ConversationError;
pub use orchestrator::{BroadcastSummary, Orchestrator, ParticipantOutcome, ParticipantReport};
pub use round::{
    AgentRoundReport, DEFAULT_MAX_BATCH_ROUNDS, RoundOutcome, RoundReport, RoundRunner,
    session_id_for,
};
