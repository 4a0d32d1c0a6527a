//! Typed message catalog: commands, events, and error events.
//!
//! Three shapes flow through the pipeline:
//!
//! - **Commands** — imperative; the sender expects work done.
//! - **Events** — past tense; inform interested parties.
//! - **[`ActorError`]** — failures as values, addressed to the coordinator.
//!
//! Every message carries a `correlation_id` generated at command creation
//! and propagated verbatim through all derived events and errors, plus a
//! creation `timestamp`. Nothing escapes a worker's handler except through
//! one of these shapes.

use chrono::{DateTime, Utc};

use lex_core::entities::{Checkpoint, ChunkEmbedding, Document, TextChunk};
use lex_core::ids;

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Search filter triple passed through to the upstream query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub category: Option<String>,
    pub scope: Option<String>,
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Start discovery over the paginated search interface.
#[derive(Debug, Clone)]
pub struct DiscoverCommand {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub query: SearchQuery,
    /// Stop emitting once this many documents were discovered (0 = no cap).
    pub max_results: usize,
    pub discover_all_pages: bool,
}

impl DiscoverCommand {
    #[must_use]
    pub fn new(query: SearchQuery, max_results: usize, discover_all_pages: bool) -> Self {
        Self {
            correlation_id: ids::new_correlation_id(),
            timestamp: now(),
            query,
            max_results,
            discover_all_pages,
        }
    }
}

/// Fetch a single search page.
#[derive(Debug, Clone)]
pub struct DiscoverPageCommand {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub query: SearchQuery,
    pub page: u32,
}

/// Download one document's detail page (and optionally its reform PDFs).
#[derive(Debug, Clone)]
pub struct DownloadCommand {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub q_param: String,
    pub include_pdf: bool,
    pub include_reforms: bool,
}

impl DownloadCommand {
    #[must_use]
    pub fn new(q_param: impl Into<String>, include_pdf: bool, include_reforms: bool) -> Self {
        Self {
            correlation_id: ids::new_correlation_id(),
            timestamp: now(),
            q_param: q_param.into(),
            include_pdf,
            include_reforms,
        }
    }

    /// Derived command reusing an existing correlation id.
    #[must_use]
    pub fn with_correlation(
        correlation_id: impl Into<String>,
        q_param: impl Into<String>,
        include_pdf: bool,
        include_reforms: bool,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            timestamp: now(),
            q_param: q_param.into(),
            include_pdf,
            include_reforms,
        }
    }
}

/// Extract and chunk a fetched PDF.
#[derive(Debug, Clone)]
pub struct ProcessPdfCommand {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub document_id: String,
    pub pdf_bytes: Vec<u8>,
    pub source_url: String,
}

/// Encode chunk text into vectors.
#[derive(Debug, Clone)]
pub struct GenerateEmbeddingsCommand {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub document_id: String,
    pub chunks: Vec<TextChunk>,
}

/// Persist a document record.
#[derive(Debug, Clone)]
pub struct SaveDocumentCommand {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub document: Document,
}

/// Persist a document's embeddings (vector index + disk).
#[derive(Debug, Clone)]
pub struct SaveEmbeddingsCommand {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub document_id: String,
    pub embeddings: Vec<ChunkEmbedding>,
}

/// Persist a progress snapshot.
#[derive(Debug, Clone)]
pub struct SaveCheckpointCommand {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub checkpoint: Checkpoint,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A search row was seen for the first time this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDiscovered {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub q_param: String,
    pub title: String,
    pub category: String,
}

/// A search page finished parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDiscovered {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub documents_found: usize,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_more_pages: bool,
}

/// A detail page was fetched, parsed, and mapped into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDownloaded {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub document_id: String,
    pub q_param: String,
    pub has_pdf: bool,
    /// Bytes fetched at download time; PDFs stream afterwards.
    pub pdf_size_bytes: u64,
}

/// A PDF was extracted and chunked.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfProcessed {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub document_id: String,
    pub chunk_count: usize,
    pub total_tokens: usize,
    pub extraction_confidence: f64,
}

/// Chunk vectors were generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingsGenerated {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub document_id: String,
    pub embedding_count: usize,
}

/// A document record hit durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSaved {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub document_id: String,
}

/// A checkpoint hit durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSaved {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub processed_count: usize,
}

/// k-NN search response.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    /// `(chunk_id, similarity)` pairs, best first.
    pub results: Vec<(String, f64)>,
    pub search_time_ms: f64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A command retained for retry inside an error event.
#[derive(Debug, Clone)]
pub enum RetryCommand {
    Discover(DiscoverCommand),
    Download(DownloadCommand),
    ProcessPdf(ProcessPdfCommand),
    GenerateEmbeddings(GenerateEmbeddingsCommand),
}

/// Failure as a value, addressed to the coordinator. Recoverable errors
/// carry the original command so the coordinator can re-dispatch it.
#[derive(Debug, Clone)]
pub struct ActorError {
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub actor_name: &'static str,
    pub error_type: String,
    pub error_message: String,
    pub recoverable: bool,
    pub original_command: Option<RetryCommand>,
}

impl ActorError {
    #[must_use]
    pub fn new(
        correlation_id: impl Into<String>,
        actor_name: &'static str,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
        recoverable: bool,
        original_command: Option<RetryCommand>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            timestamp: now(),
            actor_name,
            error_type: error_type.into(),
            error_message: error_message.into(),
            recoverable,
            original_command,
        }
    }
}
