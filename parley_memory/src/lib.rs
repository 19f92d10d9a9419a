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

//! Bounded conversational memory windows.

pub mod list_store;
pub mod window;

pub use list_store::InMemoryListStore;
pub use window::{DEFAULT_WINDOW_LENGTH, MemoryWindowStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("window length must be positive, got {0}")]
    InvalidWindowLength(usize),

    #[error("list store error: {0}")]
    Store(#[from] anyhow::Error),
}
