//! Pipeline error types.

use thiserror::Error;

/// Errors raised by pipeline plumbing. Worker-level failures never surface
/// here — they travel as typed [`crate::messages::ActorError`] events.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The target worker's mailbox is closed (worker stopped).
    #[error("Mailbox closed: {0}")]
    MailboxClosed(&'static str),

    /// An ask was issued but the worker dropped the reply handle.
    #[error("Reply dropped by {0}")]
    ReplyDropped(&'static str),

    /// A search is already running on this bridge.
    #[error("A search job is already active: {0}")]
    JobActive(String),

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error(transparent)]
    Store(#[from] lex_store::StoreError),
}
