//! Entity structs for the legislation domain.
//!
//! All entities are value records: constructed once, never mutated. An
//! "update" is the construction of a new record. Collections preserve
//! insertion order.

use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{DocumentCategory, DocumentScope, DocumentStatus, SubjectMatter};
use crate::ids;

/// An individual article within a legal instrument. Sequence position in
/// [`Document::articles`] is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct Article {
    /// Tolerates forms like `"1"`, `"2 Bis"`, `"Transitorio Primero"`.
    pub number: String,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    /// Raw date strings of reforms affecting this article.
    #[serde(default)]
    pub reform_dates: Vec<String>,
    /// Transitory articles number with Spanish ordinals and live at the end
    /// of the instrument.
    #[serde(default)]
    pub is_transitory: bool,
}

/// A reform (amendment) to a legal instrument. Has its own detail page and
/// may carry its own gazette PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Reform {
    pub id: String,
    /// Opaque upstream identifier for the amendment document.
    pub q_param: String,
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub publication_number: String,
    #[serde(default)]
    pub gazette_section: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub pdf_path: Option<String>,
    /// Derived from the presence of a PDF link in the parsed reform row.
    #[serde(default)]
    pub has_pdf: bool,
}

impl Reform {
    /// Reform with a fresh ID and everything else defaulted.
    #[must_use]
    pub fn new(q_param: impl Into<String>) -> Self {
        Self {
            id: ids::new_reform_id(),
            q_param: q_param.into(),
            publication_date: None,
            publication_number: String::new(),
            gazette_section: String::new(),
            text_content: None,
            pdf_path: None,
            has_pdf: false,
        }
    }
}

/// Aggregate root: a complete legal instrument with its articles and reform
/// history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Document {
    /// Internally assigned opaque ID (UUID-shaped).
    pub id: String,
    /// Opaque upstream identifier; globally unique and the deduplication key.
    pub q_param: String,
    pub title: String,
    #[serde(default)]
    pub short_title: Option<String>,
    pub category: DocumentCategory,
    pub scope: DocumentScope,
    pub status: DocumentStatus,
    pub publication_date: Option<NaiveDate>,
    pub expedition_date: Option<NaiveDate>,
    /// Set for sub-federal instruments.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub subject_matters: Vec<SubjectMatter>,
    #[serde(default)]
    pub articles: Vec<Article>,
    #[serde(default)]
    pub reforms: Vec<Reform>,
    pub source_url: String,
}

impl Document {
    /// Document with a fresh ID, default variants, and empty collections.
    #[must_use]
    pub fn new(q_param: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: ids::new_document_id(),
            q_param: q_param.into(),
            title: title.into(),
            short_title: None,
            category: DocumentCategory::default(),
            scope: DocumentScope::default(),
            status: DocumentStatus::default(),
            publication_date: None,
            expedition_date: None,
            state: None,
            subject_matters: Vec::new(),
            articles: Vec::new(),
            reforms: Vec::new(),
            source_url: String::new(),
        }
    }

    #[must_use]
    pub fn article_count(&self) -> usize {
        self.articles.len()
    }

    #[must_use]
    pub fn reform_count(&self) -> usize {
        self.reforms.len()
    }

    /// Whether any parsed reform row carried a PDF link.
    #[must_use]
    pub fn has_reform_pdf(&self) -> bool {
        self.reforms.iter().any(|r| r.has_pdf)
    }
}

/// A segment of document text prepared for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TextChunk {
    /// `{document_id}-chunk-{index:04}`.
    pub id: String,
    pub document_id: String,
    pub content: String,
    pub token_count: usize,
    /// Dense, zero-based.
    pub chunk_index: usize,
    /// Insertion-ordered key-value pairs (`source_url`, `start_char`, ...).
    #[serde(default)]
    pub metadata: Vec<(String, String)>,
}

impl TextChunk {
    /// Look up a metadata value by key.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Vector embedding for a text chunk. The vector length must equal the
/// configured dimension at insert time; the vector store enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChunkEmbedding {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    pub model_name: String,
}

/// Durable progress snapshot for a scraping session. The most recent
/// checkpoint for a `session_id` supersedes older ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Checkpoint {
    pub session_id: String,
    pub last_processed_q_param: String,
    pub processed_count: usize,
    #[serde(default)]
    pub failed_q_params: Vec<String>,
    pub created_at: DateTime<Utc>,
}
