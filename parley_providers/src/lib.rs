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

//! Text-generation vendors and the registry that dispatches between them.

pub mod ollama;
pub mod openai_compat;
pub mod registry;
pub mod retry;

pub use ollama::OllamaClient;
pub use openai_compat::OpenAiCompatibleClient;
pub use registry::{GeneratorRegistry, normalize_vendor};

use parley_core::GenerationError;

/// 4xx answers mean the request itself was rejected and map to
/// [`GenerationError::InvalidResponse`]; everything else is a transport error.
fn transport_error(err: reqwest::Error) -> GenerationError {
    if err.status().is_some_and(|status| status.is_client_error()) {
        GenerationError::InvalidResponse(err.to_string())
    } else {
        GenerationError::Transport(err.to_string())
    }
}

const fn is_retryable(err: &GenerationError) -> bool {
    matches!(err, GenerationError::Transport(_))
}
