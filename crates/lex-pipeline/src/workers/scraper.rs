//! Scraper worker: detail fetch, document construction, reform-PDF fetch.
//!
//! HTTP outcomes classify into the error taxonomy (404 permanent, 429/5xx
//! and transport failures transient); recoverable errors keep the original
//! command so the coordinator can retry. PDF fetches are best-effort and
//! never fail the parent document — their bytes stream straight into the
//! PDF processor's mailbox, which is the pipeline's backpressure point.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chrono::NaiveDate;
use lex_core::entities::{Article, Document, Reform};
use lex_core::enums::{DocumentCategory, DocumentScope, DocumentStatus};
use lex_core::ids;
use lex_parser::detail::{
    parse_articles, parse_document_detail, parse_reforms, ArticleBlock, DocumentDetail, ReformRow,
};

use crate::coordinator::CoordinatorMsg;
use crate::fetch::PageFetcher;
use crate::mailbox::{mailbox, Addr};
use crate::messages::{
    ActorError, DocumentDownloaded, DownloadCommand, ProcessPdfCommand, RetryCommand,
    SaveDocumentCommand,
};
use crate::rate_limit::RateLimiter;
use crate::workers::pdf::PdfMsg;

const ACTOR_NAME: &str = "scraper";

/// Messages the scraper consumes.
pub enum ScraperMsg {
    Download(DownloadCommand),
    Shutdown,
}

/// Detail-page downloader.
pub struct ScraperWorker<F> {
    coordinator: Addr<CoordinatorMsg>,
    pdf_processor: Addr<PdfMsg>,
    fetcher: Arc<F>,
    limiter: Arc<RateLimiter>,
    download_pdfs: bool,
}

impl<F: PageFetcher> ScraperWorker<F> {
    /// Spawn the worker loop.
    pub fn spawn(
        coordinator: Addr<CoordinatorMsg>,
        pdf_processor: Addr<PdfMsg>,
        fetcher: Arc<F>,
        limiter: Arc<RateLimiter>,
        download_pdfs: bool,
        capacity: usize,
    ) -> (Addr<ScraperMsg>, JoinHandle<()>) {
        let (addr, rx) = mailbox("scraper", capacity);
        let worker = Self {
            coordinator,
            pdf_processor,
            fetcher,
            limiter,
            download_pdfs,
        };
        let handle = tokio::spawn(worker.run(rx));
        (addr, handle)
    }

    async fn run(self, mut rx: mpsc::Receiver<ScraperMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                ScraperMsg::Download(cmd) => self.handle_download(cmd).await,
                ScraperMsg::Shutdown => break,
            }
        }
    }

    async fn handle_download(&self, cmd: DownloadCommand) {
        self.limiter.acquire().await;

        let html = match self.fetcher.fetch_detail_page(&cmd.q_param).await {
            Ok(html) => html,
            Err(error) => {
                let recoverable = error.is_transient();
                self.emit_error(
                    &cmd,
                    error.kind(),
                    &error.to_string(),
                    recoverable,
                )
                .await;
                return;
            }
        };

        let detail = match parse_document_detail(&html) {
            Ok(detail) => detail,
            Err(error) => {
                self.emit_error(&cmd, "ParseError", &error.to_string(), false)
                    .await;
                return;
            }
        };

        let reform_rows = if cmd.include_reforms {
            parse_reforms(&html)
        } else {
            Vec::new()
        };
        let article_blocks = parse_articles(&html);

        let document = build_document(
            &cmd.q_param,
            &detail,
            &article_blocks,
            &reform_rows,
            self.fetcher.detail_url(&cmd.q_param),
        );
        let has_pdf = document.has_reform_pdf();

        self.coordinator
            .tell(CoordinatorMsg::Downloaded(DocumentDownloaded {
                correlation_id: cmd.correlation_id.clone(),
                timestamp: chrono::Utc::now(),
                document_id: document.id.clone(),
                q_param: cmd.q_param.clone(),
                has_pdf,
                pdf_size_bytes: 0,
            }))
            .await;

        self.coordinator
            .tell(CoordinatorMsg::SaveDocument(SaveDocumentCommand {
                correlation_id: cmd.correlation_id.clone(),
                timestamp: chrono::Utc::now(),
                document: document.clone(),
            }))
            .await;

        if cmd.include_pdf && self.download_pdfs && has_pdf {
            for reform in document.reforms.iter().filter(|r| r.has_pdf) {
                self.download_pdf(&cmd, &document.id, &reform.q_param).await;
            }
        }
    }

    /// Fetch one reform PDF and hand it to the processor. Failures are
    /// logged and swallowed.
    async fn download_pdf(&self, cmd: &DownloadCommand, document_id: &str, reform_q: &str) {
        self.limiter.acquire().await;

        match self.fetcher.fetch_pdf(reform_q).await {
            Ok(bytes) => {
                self.pdf_processor
                    .tell(PdfMsg::Process(ProcessPdfCommand {
                        correlation_id: cmd.correlation_id.clone(),
                        timestamp: chrono::Utc::now(),
                        document_id: document_id.to_string(),
                        pdf_bytes: bytes,
                        source_url: self.fetcher.detail_url(reform_q),
                    }))
                    .await;
            }
            Err(error) => {
                tracing::warn!(q_param = reform_q, %error, "reform PDF fetch failed, continuing");
            }
        }
    }

    async fn emit_error(
        &self,
        cmd: &DownloadCommand,
        error_type: &str,
        message: &str,
        recoverable: bool,
    ) {
        self.coordinator
            .tell(CoordinatorMsg::Error(ActorError::new(
                &cmd.correlation_id,
                ACTOR_NAME,
                error_type,
                message,
                recoverable,
                Some(RetryCommand::Download(cmd.clone())),
            )))
            .await;
    }
}

/// Map parsed detail strings into the domain record. Unknown labels take
/// the documented defaults; malformed dates become `None`, never errors.
fn build_document(
    q_param: &str,
    detail: &DocumentDetail,
    articles: &[ArticleBlock],
    reforms: &[ReformRow],
    source_url: String,
) -> Document {
    Document {
        id: ids::new_document_id(),
        q_param: q_param.to_string(),
        title: detail.title.clone(),
        short_title: (!detail.short_title.is_empty()).then(|| detail.short_title.clone()),
        category: DocumentCategory::from_label(&detail.category),
        scope: DocumentScope::from_label(&detail.scope),
        status: DocumentStatus::from_label(&detail.status),
        publication_date: parse_spanish_date(detail.publication_date.as_deref()),
        expedition_date: parse_spanish_date(detail.expedition_date.as_deref()),
        state: None,
        subject_matters: Vec::new(),
        articles: articles
            .iter()
            .map(|block| Article {
                number: block.number.clone(),
                title: (!block.title.is_empty()).then(|| block.title.clone()),
                content: block.content.clone(),
                reform_dates: Vec::new(),
                is_transitory: block.is_transitory,
            })
            .collect(),
        reforms: reforms
            .iter()
            .map(|row| Reform {
                id: ids::new_reform_id(),
                q_param: row.q_param.clone(),
                publication_date: parse_spanish_date(row.publication_date.as_deref()),
                publication_number: String::new(),
                gazette_section: row.gazette_reference.clone(),
                text_content: None,
                pdf_path: None,
                has_pdf: row.has_pdf,
            })
            .collect(),
        source_url,
    }
}

/// Strict `DD/MM/YYYY`. Anything else — including the ISO strings some
/// upstream paths emit — parses to `None`.
fn parse_spanish_date(raw: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw?.trim(), "%d/%m/%Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn spanish_dates_parse_strictly() {
        assert_eq!(
            parse_spanish_date(Some("01/04/1970")),
            NaiveDate::from_ymd_opt(1970, 4, 1)
        );
        assert_eq!(parse_spanish_date(Some("1970-04-01")), None);
        assert_eq!(parse_spanish_date(Some("32/01/2000")), None);
        assert_eq!(parse_spanish_date(Some("")), None);
        assert_eq!(parse_spanish_date(None), None);
    }

    #[test]
    fn build_document_maps_labels_with_defaults() {
        let detail = DocumentDetail {
            title: "LEY FEDERAL DEL TRABAJO".into(),
            short_title: "LFT".into(),
            category: "Ley Federal".into(),
            scope: "federal".into(),
            status: "QUIEN SABE".into(),
            publication_date: Some("01/04/1970".into()),
            expedition_date: Some("sin fecha".into()),
            full_text: String::new(),
            article_count: 0,
        };
        let reforms = vec![ReformRow {
            q_param: "R1==".into(),
            title: "Decreto".into(),
            publication_date: Some("12/06/2015".into()),
            gazette_reference: "DOF".into(),
            has_pdf: true,
        }];

        let doc = build_document("AbC==", &detail, &[], &reforms, "https://x/detalle?q=AbC%3D%3D".into());
        assert_eq!(doc.q_param, "AbC==");
        assert_eq!(doc.category, DocumentCategory::LeyFederal);
        assert_eq!(doc.scope, DocumentScope::Federal);
        assert_eq!(doc.status, DocumentStatus::Vigente); // unknown → default
        assert_eq!(doc.publication_date, NaiveDate::from_ymd_opt(1970, 4, 1));
        assert_eq!(doc.expedition_date, None);
        assert_eq!(doc.short_title.as_deref(), Some("LFT"));
        assert!(doc.has_reform_pdf());
        assert_eq!(doc.reforms[0].gazette_section, "DOF");
    }
}
