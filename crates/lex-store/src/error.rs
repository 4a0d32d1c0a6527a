//! Storage error types.

use thiserror::Error;

/// Errors raised by document and checkpoint stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote store failure. Callers downgrade this to a warning and fall
    /// back to the local write.
    #[error("Remote store error: {0}")]
    Remote(#[from] libsql::Error),

    /// Remote mode requested without a configured URL.
    #[error("Remote store not configured: {0}")]
    NotConfigured(String),
}
