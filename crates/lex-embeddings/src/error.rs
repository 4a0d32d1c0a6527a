//! Embedding error types.

use thiserror::Error;

/// Errors raised while loading the model or encoding text.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Model download or initialization failed.
    #[error("Embedding model unavailable: {0}")]
    Model(String),

    /// Encoding a batch failed.
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// The blocking encode task was cancelled or panicked.
    #[error("Encode task failed: {0}")]
    Task(String),
}
