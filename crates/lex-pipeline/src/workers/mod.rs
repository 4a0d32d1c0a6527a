//! Pipeline workers.
//!
//! Each worker owns private state and a bounded mailbox; a spawned task
//! drains the mailbox in arrival order. Failures convert to
//! [`crate::messages::ActorError`] events at the handler boundary — nothing
//! else escapes.

pub mod checkpoint;
pub mod discovery;
pub mod embedder;
pub mod pdf;
pub mod persistence;
pub mod scraper;
pub mod vector_index;

pub use checkpoint::{CheckpointMsg, CheckpointWorker};
pub use discovery::{DiscoveryMsg, DiscoveryWorker};
pub use embedder::{EmbedderMsg, EmbedderWorker};
pub use pdf::{PdfMsg, PdfWorker};
pub use persistence::{PersistMsg, PersistenceWorker};
pub use scraper::{ScraperMsg, ScraperWorker};
pub use vector_index::{VectorIndexWorker, VectorMsg};
