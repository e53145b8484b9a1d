//! Embedding and generation backends consumed by the askcode indexer and CLI.

pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod provider;

pub use error::LlmError;
pub use provider::{ChatOptions, LlmProvider};
