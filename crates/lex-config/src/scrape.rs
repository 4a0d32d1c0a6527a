//! Scraping and pipeline configuration.

use serde::{Deserialize, Serialize};

const fn default_rate_limit() -> f64 {
    0.5
}

const fn default_max_concurrent_downloads() -> usize {
    3
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_backoff_ms() -> u64 {
    500
}

const fn default_checkpoint_interval() -> usize {
    10
}

const fn default_max_pages() -> u32 {
    100
}

const fn default_http_timeout_seconds() -> u64 {
    30
}

const fn default_pdf_timeout_seconds() -> u64 {
    120
}

const fn default_pdf_max_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_user_agent() -> String {
    "Lexmex/0.1 (legislative research; +https://github.com/lexmex)".to_string()
}

fn default_base_url() -> String {
    "https://legislacion.scjn.gob.mx/Buscador/Paginas".to_string()
}

/// Knobs for the discovery/download pipeline and its HTTP traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScrapeConfig {
    /// Token-bucket refill rate. 0.5 means one request every two seconds.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: f64,

    /// Queue-pump gate: concurrent detail downloads.
    #[serde(default = "default_max_concurrent_downloads")]
    pub max_concurrent_downloads: usize,

    /// Per-q_param retry ceiling for recoverable errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before a retry is re-dispatched.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Downloads between checkpoint writes.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Discovery pagination cap.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Total timeout for page fetches.
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,

    /// Total timeout for PDF fetches (separately configurable; PDFs are big).
    #[serde(default = "default_pdf_timeout_seconds")]
    pub pdf_timeout_seconds: u64,

    /// Reject PDFs larger than this, both on Content-Length and post-read.
    #[serde(default = "default_pdf_max_bytes")]
    pub pdf_max_bytes: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream endpoint root (search, detail, and PDF pages hang off it).
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_second: default_rate_limit(),
            max_concurrent_downloads: default_max_concurrent_downloads(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            checkpoint_interval: default_checkpoint_interval(),
            max_pages: default_max_pages(),
            http_timeout_seconds: default_http_timeout_seconds(),
            pdf_timeout_seconds: default_pdf_timeout_seconds(),
            pdf_max_bytes: default_pdf_max_bytes(),
            user_agent: default_user_agent(),
            base_url: default_base_url(),
        }
    }
}
