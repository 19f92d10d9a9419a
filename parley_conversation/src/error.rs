use parley_core::GenerationError;
use parley_memory::MemoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("agent not found: {0}")]
    AgentNotFound(i64),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("memory window error: {0}")]
    Memory(#[from] MemoryError),

    #[error("invalid round batch: {0}")]
    InvalidRounds(String),
}
