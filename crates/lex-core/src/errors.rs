//! Cross-cutting error types for Lexmex.
//!
//! Domain-specific errors (`ParserError`, `StoreError`, `PipelineError`, …)
//! live in their respective crates. Everything converges on `anyhow` at the
//! CLI boundary.

use thiserror::Error;

/// Errors that can be raised by any Lexmex crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Lookup returned no result.
    #[error("Not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    /// Data failed validation (shape, format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
