//! Page fetching: the trait, the HTTP implementation, and the error
//! taxonomy for outbound requests.
//!
//! The upstream search interface is a stateful JavaScript form; a
//! browser-rendered fetcher is a valid alternative implementation of
//! [`PageFetcher`] and the parsers operate on its HTML identically. The
//! bundled implementation is direct HTTP, and its known failure modes
//! (empty or malformed responses) flow through the same parse-error and
//! transient-error paths as everything else.
//!
//! Callers acquire a rate-limit token before every fetch; the fetcher
//! itself stays limiter-free.

use std::future::Future;

use thiserror::Error;

use lex_config::ScrapeConfig;

use crate::error::PipelineError;
use crate::messages::SearchQuery;

/// Outbound HTTP failure, classified for the retry policy.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// 404 — the document is gone; never retried.
    #[error("Not found: {url}")]
    NotFound { url: String },

    /// 429 — upstream throttling; transient (the next rate-limit acquire is
    /// already gated).
    #[error("Rate limited by upstream: {url}")]
    RateLimited { url: String },

    /// 5xx — transient.
    #[error("Server error {status}: {url}")]
    Server { status: u16, url: String },

    /// Total-timeout expiry — transient.
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    /// Connection-level failure — transient.
    #[error("Network error: {0}")]
    Network(String),

    /// Payload over the configured cap — permanent.
    #[error("Payload too large: {bytes} bytes (limit {limit})")]
    TooLarge { bytes: u64, limit: u64 },
}

impl FetchError {
    /// Whether a retry can plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Timeout { .. } | Self::Network(_)
        )
    }

    /// Short classification name for error events.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::RateLimited { .. } => "RateLimited",
            Self::Server { .. } => "ServerError",
            Self::Timeout { .. } => "Timeout",
            Self::Network(_) => "NetworkError",
            Self::TooLarge { .. } => "PayloadTooLarge",
        }
    }
}

/// Fetching contract for discovery and scraping. Implementations must be
/// shareable across workers.
pub trait PageFetcher: Send + Sync + 'static {
    /// Fetch one page of search results.
    fn fetch_search_page(
        &self,
        query: &SearchQuery,
        page: u32,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Fetch a document detail page by its opaque `q` parameter.
    fn fetch_detail_page(
        &self,
        q_param: &str,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Fetch a reform PDF by its opaque `q` parameter.
    fn fetch_pdf(&self, q_param: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;

    /// Canonical detail-page URL (recorded on documents as `source_url`).
    fn detail_url(&self, q_param: &str) -> String {
        format!(
            "https://legislacion.scjn.gob.mx/Buscador/Paginas/wfOrdenamientoDetalle.aspx?q={}",
            urlencoding::encode(q_param)
        )
    }
}

/// Direct-HTTP fetcher over reqwest.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    pdf_client: reqwest::Client,
    base_url: String,
    pdf_max_bytes: u64,
}

impl HttpFetcher {
    /// Build clients with the configured timeouts and User-Agent.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Http`] when client construction fails.
    pub fn new(config: &ScrapeConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.http_timeout_seconds))
            .build()
            .map_err(|e| PipelineError::Http(e.to_string()))?;
        let pdf_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.pdf_timeout_seconds))
            .build()
            .map_err(|e| PipelineError::Http(e.to_string()))?;

        Ok(Self {
            client,
            pdf_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            pdf_max_bytes: config.pdf_max_bytes,
        })
    }

    fn search_url(&self, query: &SearchQuery, page: u32) -> String {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(category) = query.category.as_deref() {
            params.push(("categoria", category));
        }
        if let Some(scope) = query.scope.as_deref() {
            params.push(("ambito", scope));
        }
        if let Some(status) = query.status.as_deref() {
            params.push(("estatus", status));
        }
        let page_str = page.to_string();
        if page > 1 {
            params.push(("pagina", &page_str));
        }

        let mut url = format!("{}/Buscar.aspx", self.base_url);
        for (i, (key, value)) in params.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    fn q_url(&self, endpoint: &str, q_param: &str) -> String {
        format!(
            "{}/{}?q={}",
            self.base_url,
            endpoint,
            urlencoding::encode(q_param)
        )
    }

    async fn fetch_text(&self, url: String) -> Result<String, FetchError> {
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_transport(&e, &url))?;
        let response = classify_status(response, &url)?;
        response
            .text()
            .await
            .map_err(|e| classify_transport(&e, &url))
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch_search_page(
        &self,
        query: &SearchQuery,
        page: u32,
    ) -> Result<String, FetchError> {
        self.fetch_text(self.search_url(query, page)).await
    }

    async fn fetch_detail_page(&self, q_param: &str) -> Result<String, FetchError> {
        self.fetch_text(self.q_url("wfOrdenamientoDetalle.aspx", q_param))
            .await
    }

    async fn fetch_pdf(&self, q_param: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.q_url("AbrirDocReforma.aspx", q_param);
        let response = self
            .pdf_client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_transport(&e, &url))?;
        let response = classify_status(response, &url)?;

        // Pre-check the advertised size, then verify after the read.
        if let Some(length) = response.content_length()
            && length > self.pdf_max_bytes
        {
            return Err(FetchError::TooLarge {
                bytes: length,
                limit: self.pdf_max_bytes,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport(&e, &url))?;
        if bytes.len() as u64 > self.pdf_max_bytes {
            return Err(FetchError::TooLarge {
                bytes: bytes.len() as u64,
                limit: self.pdf_max_bytes,
            });
        }
        Ok(bytes.to_vec())
    }

    fn detail_url(&self, q_param: &str) -> String {
        self.q_url("wfOrdenamientoDetalle.aspx", q_param)
    }
}

fn classify_status(response: reqwest::Response, url: &str) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.as_u16() == 404 {
        return Err(FetchError::NotFound { url: url.into() });
    }
    if status.as_u16() == 429 {
        return Err(FetchError::RateLimited { url: url.into() });
    }
    if status.is_server_error() || !status.is_success() {
        return Err(FetchError::Server {
            status: status.as_u16(),
            url: url.into(),
        });
    }
    Ok(response)
}

fn classify_transport(error: &reqwest::Error, url: &str) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout { url: url.into() }
    } else {
        FetchError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&ScrapeConfig::default()).unwrap()
    }

    #[test]
    fn search_url_carries_filters_and_page() {
        let query = SearchQuery {
            category: Some("LEY".into()),
            scope: Some("FEDERAL".into()),
            status: None,
        };
        let url = fetcher().search_url(&query, 3);
        assert_eq!(
            url,
            "https://legislacion.scjn.gob.mx/Buscador/Paginas/Buscar.aspx?categoria=LEY&ambito=FEDERAL&pagina=3"
        );
    }

    #[test]
    fn first_page_omits_the_page_parameter() {
        let url = fetcher().search_url(&SearchQuery::default(), 1);
        assert_eq!(
            url,
            "https://legislacion.scjn.gob.mx/Buscador/Paginas/Buscar.aspx"
        );
    }

    #[test]
    fn q_urls_encode_the_parameter() {
        let f = fetcher();
        assert_eq!(
            f.detail_url("AbC=="),
            "https://legislacion.scjn.gob.mx/Buscador/Paginas/wfOrdenamientoDetalle.aspx?q=AbC%3D%3D"
        );
        assert_eq!(
            f.q_url("AbrirDocReforma.aspx", "R1=="),
            "https://legislacion.scjn.gob.mx/Buscador/Paginas/AbrirDocReforma.aspx?q=R1%3D%3D"
        );
    }

    #[test]
    fn transience_classification() {
        assert!(!FetchError::NotFound { url: String::new() }.is_transient());
        assert!(!FetchError::TooLarge { bytes: 1, limit: 0 }.is_transient());
        assert!(FetchError::RateLimited { url: String::new() }.is_transient());
        assert!(FetchError::Server { status: 503, url: String::new() }.is_transient());
        assert!(FetchError::Timeout { url: String::new() }.is_transient());
        assert!(FetchError::Network("reset".into()).is_transient());
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(FetchError::NotFound { url: String::new() }.kind(), "NotFound");
        assert_eq!(
            FetchError::Server { status: 500, url: String::new() }.kind(),
            "ServerError"
        );
    }
}
