//! End-to-end pipeline scenarios over a scripted fetcher.
//!
//! The fetcher replaces the network with canned HTML and error sequences;
//! everything else — workers, mailboxes, coordinator, stores — is the real
//! pipeline writing into temp directories.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use lex_config::LexmexConfig;
use lex_embeddings::{EmbeddingEngine, EngineOptions};
use lex_pipeline::coordinator::{PipelinePhase, PipelineStatus};
use lex_pipeline::messages::{DiscoverCommand, SearchQuery};
use lex_pipeline::workers::{PersistMsg, ScraperMsg};
use lex_pipeline::{
    ask, spawn_pipeline, DiscoveryOutcome, FetchError, PageFetcher, PipelineDeps, PipelineHandle,
    PipelineOptions, RateLimiter,
};
use lex_store::{CheckpointStore, DocumentStore, LocalDocumentStore};

// ---------------------------------------------------------------------------
// Scripted fetcher
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ScriptedFetcher {
    search_pages: Vec<String>,
    /// Per-q_param response sequences; the last entry repeats.
    details: Mutex<HashMap<String, VecDeque<Result<String, FetchError>>>>,
    detail_calls: Mutex<HashMap<String, u32>>,
    pdfs: HashMap<String, Vec<u8>>,
    detail_delay: Duration,
}

impl ScriptedFetcher {
    fn with_search_page(mut self, html: String) -> Self {
        self.search_pages.push(html);
        self
    }

    fn with_detail(self, q_param: &str, responses: Vec<Result<String, FetchError>>) -> Self {
        self.details
            .lock()
            .unwrap()
            .insert(q_param.to_string(), responses.into());
        self
    }

    fn with_pdf(mut self, q_param: &str, bytes: Vec<u8>) -> Self {
        self.pdfs.insert(q_param.to_string(), bytes);
        self
    }

    fn with_detail_delay(mut self, delay: Duration) -> Self {
        self.detail_delay = delay;
        self
    }

    fn detail_calls(&self, q_param: &str) -> u32 {
        self.detail_calls
            .lock()
            .unwrap()
            .get(q_param)
            .copied()
            .unwrap_or(0)
    }
}

impl PageFetcher for ScriptedFetcher {
    fn fetch_search_page(
        &self,
        _query: &SearchQuery,
        page: u32,
    ) -> impl Future<Output = Result<String, FetchError>> + Send {
        let result = self
            .search_pages
            .get((page as usize).saturating_sub(1))
            .cloned()
            .ok_or(FetchError::Server {
                status: 500,
                url: format!("search page {page}"),
            });
        async move { result }
    }

    fn fetch_detail_page(
        &self,
        q_param: &str,
    ) -> impl Future<Output = Result<String, FetchError>> + Send {
        *self
            .detail_calls
            .lock()
            .unwrap()
            .entry(q_param.to_string())
            .or_insert(0) += 1;

        let mut details = self.details.lock().unwrap();
        let result = match details.get_mut(q_param) {
            Some(responses) if responses.len() > 1 => {
                responses.pop_front().unwrap_or(Err(FetchError::NotFound {
                    url: q_param.to_string(),
                }))
            }
            Some(responses) => responses
                .front()
                .cloned()
                .unwrap_or(Err(FetchError::NotFound {
                    url: q_param.to_string(),
                })),
            None => Err(FetchError::NotFound {
                url: q_param.to_string(),
            }),
        };
        drop(details);

        let delay = self.detail_delay;
        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }

    fn fetch_pdf(&self, q_param: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        let result = self.pdfs.get(q_param).cloned().ok_or(FetchError::NotFound {
            url: q_param.to_string(),
        });
        async move { result }
    }
}

// ---------------------------------------------------------------------------
// HTML fixtures
// ---------------------------------------------------------------------------

fn search_page(rows: &[(&str, &str)], current: u32, total: u32) -> String {
    let mut body = String::new();
    for (q_param, title) in rows {
        body.push_str(&format!(
            r#"<tr class="dxgvDataRow">
            <td><a href="wfOrdenamientoDetalle.aspx?q={}">{title}</a></td>
            <td>01/04/1970</td><td>23/12/1969</td>
            <td>VIGENTE</td><td>LEY</td><td>FEDERAL</td>
            </tr>"#,
            urlencoding::encode(q_param)
        ));
    }
    format!(
        r#"<html><body><div id="gridResultados"><table class="dxgvTable">{body}</table>
        <div class="dxpPagerTotal">Página {current} de {total}</div></div></body></html>"#
    )
}

fn detail_page(title: &str) -> String {
    format!(
        r#"<html><body><div id="contenedor">
        <h1 class="titulo-ordenamiento">{title}</h1>
        <div class="datos-ordenamiento">
          <div class="dato"><span class="etiqueta">Tipo de Ordenamiento:</span><span class="valor">LEY</span></div>
          <div class="dato"><span class="etiqueta">Ámbito:</span><span class="valor">FEDERAL</span></div>
          <div class="dato"><span class="etiqueta">Estatus:</span><span class="valor">VIGENTE</span></div>
          <div class="dato"><span class="etiqueta">Fecha de Publicación:</span><span class="valor">01/04/1970</span></div>
        </div>
        <div id="contenido-ordenamiento">
          <div class="articulo"><h3>Artículo 1</h3><p>Disposiciones generales.</p></div>
        </div>
        </div></body></html>"#
    )
}

fn detail_page_with_pdf(title: &str, reform_q: &str) -> String {
    let encoded = urlencoding::encode(reform_q).into_owned();
    format!(
        r#"<html><body><div id="contenedor">
        <h1 class="titulo-ordenamiento">{title}</h1>
        <div id="contenido-ordenamiento"><div class="articulo"><h3>Artículo 1</h3><p>Texto.</p></div></div>
        <div id="reformas"><table class="tabla-reformas">
          <tr class="reforma-row">
            <td><a href="wfOrdenamientoDetalle.aspx?q={encoded}">Decreto de reforma</a></td>
            <td>12/06/2015</td><td>DOF</td>
            <td><a href="AbrirDocReforma.aspx?q={encoded}">PDF</a></td>
          </tr>
        </table></div>
        </div></body></html>"#
    )
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

async fn spawn_test_pipeline(
    root: &Path,
    fetcher: Arc<ScriptedFetcher>,
    options: PipelineOptions,
    tweak: impl FnOnce(&mut LexmexConfig),
) -> PipelineHandle {
    let mut config = LexmexConfig::default();
    config.scrape.retry_backoff_ms = 10;
    tweak(&mut config);

    let deps = PipelineDeps {
        fetcher,
        limiter: Arc::new(RateLimiter::no_op()),
        document_store: DocumentStore::open_local(&root.join("storage"))
            .await
            .expect("document store"),
        checkpoint_store: CheckpointStore::open(&root.join("checkpoints"))
            .await
            .expect("checkpoint store"),
        engine: EmbeddingEngine::new(&EngineOptions {
            cache_dir: None,
            prefer_fallback: true,
        }),
    };

    spawn_pipeline(&config, deps, &options)
}

/// Poll until the run drains, asserting the structural invariants on every
/// observation.
async fn wait_for_drain(pipeline: &PipelineHandle, max_concurrency: usize) -> PipelineStatus {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let status = pipeline.status().await.expect("status");
        assert!(
            status.downloaded_count <= status.discovered_count,
            "downloaded exceeded discovered: {status:?}"
        );
        assert!(
            status.active_downloads <= max_concurrency,
            "concurrency gate violated: {status:?}"
        );
        if status.is_drained() {
            return status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "pipeline did not drain: {status:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn persisted(pipeline: &PipelineHandle, q_param: &str) -> bool {
    let q_param = q_param.to_string();
    ask(&pipeline.persistence, |reply| PersistMsg::Exists {
        q_param,
        reply,
    })
    .await
    .expect("persistence alive")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_path_single_page() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .with_search_page(search_page(
                &[("A==", "LEY DE AMPARO"), ("B==", "LEY MINERA")],
                1,
                1,
            ))
            .with_detail("A==", vec![Ok(detail_page("LEY DE AMPARO"))])
            .with_detail("B==", vec![Ok(detail_page("LEY MINERA"))]),
    );

    let pipeline =
        spawn_test_pipeline(dir.path(), Arc::clone(&fetcher), PipelineOptions::default(), |_| {})
            .await;

    let cmd = DiscoverCommand::new(SearchQuery::default(), 100, false);
    let correlation_id = cmd.correlation_id.clone();
    let outcome = pipeline.discover(cmd).await.unwrap();

    let DiscoveryOutcome::Page(page) = outcome else {
        panic!("expected page outcome");
    };
    assert_eq!(page.documents_found, 2);
    assert_eq!(page.correlation_id, correlation_id);
    assert!(!page.has_more_pages);

    let status = wait_for_drain(&pipeline, 3).await;
    assert_eq!(status.discovered_count, 2);
    assert_eq!(status.downloaded_count, 2);
    assert_eq!(status.error_count, 0);

    assert!(persisted(&pipeline, "A==").await);
    assert!(persisted(&pipeline, "B==").await);

    pipeline.shutdown().await;

    // Rehydration: a fresh store over the same directory sees both.
    let reopened = LocalDocumentStore::open(&dir.path().join("storage"))
        .await
        .unwrap();
    assert!(reopened.exists("A==").await);
    let doc = reopened.find_by_q_param("B==").await.unwrap().unwrap();
    assert_eq!(doc.title, "LEY MINERA");
}

#[tokio::test]
async fn dedup_skips_documents_already_persisted() {
    let dir = tempfile::tempdir().unwrap();

    // Pre-seed A== as an earlier run would have.
    {
        let store = LocalDocumentStore::open(&dir.path().join("storage"))
            .await
            .unwrap();
        store
            .save(&lex_core::entities::Document::new("A==", "LEY DE AMPARO"))
            .await
            .unwrap();
    }

    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .with_search_page(search_page(
                &[("A==", "LEY DE AMPARO"), ("C==", "LEY ADUANERA")],
                1,
                1,
            ))
            .with_detail("A==", vec![Ok(detail_page("LEY DE AMPARO"))])
            .with_detail("C==", vec![Ok(detail_page("LEY ADUANERA"))]),
    );

    let pipeline =
        spawn_test_pipeline(dir.path(), Arc::clone(&fetcher), PipelineOptions::default(), |_| {})
            .await;

    pipeline
        .discover(DiscoverCommand::new(SearchQuery::default(), 100, false))
        .await
        .unwrap();

    let status = wait_for_drain(&pipeline, 3).await;
    assert_eq!(status.discovered_count, 2);
    assert_eq!(status.downloaded_count, 1);

    // Dedup happens before dispatch: the scraper never saw A==.
    assert_eq!(fetcher.detail_calls("A=="), 0);
    assert_eq!(fetcher.detail_calls("C=="), 1);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn transient_error_retries_then_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .with_search_page(search_page(&[("A==", "LEY DE AMPARO")], 1, 1))
            .with_detail(
                "A==",
                vec![
                    Err(FetchError::Server {
                        status: 503,
                        url: "detail A==".into(),
                    }),
                    Ok(detail_page("LEY DE AMPARO")),
                ],
            ),
    );

    let pipeline =
        spawn_test_pipeline(dir.path(), Arc::clone(&fetcher), PipelineOptions::default(), |_| {})
            .await;

    pipeline
        .discover(DiscoverCommand::new(SearchQuery::default(), 100, false))
        .await
        .unwrap();

    let status = wait_for_drain(&pipeline, 3).await;
    assert_eq!(status.downloaded_count, 1);
    assert_eq!(status.error_count, 1);
    assert_eq!(fetcher.detail_calls("A=="), 2);
    assert!(persisted(&pipeline, "A==").await);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn permanent_error_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .with_search_page(search_page(&[("A==", "LEY FANTASMA")], 1, 1))
            .with_detail(
                "A==",
                vec![Err(FetchError::NotFound {
                    url: "detail A==".into(),
                })],
            ),
    );

    let pipeline =
        spawn_test_pipeline(dir.path(), Arc::clone(&fetcher), PipelineOptions::default(), |_| {})
            .await;

    pipeline
        .discover(DiscoverCommand::new(SearchQuery::default(), 100, false))
        .await
        .unwrap();

    let status = wait_for_drain(&pipeline, 3).await;
    assert_eq!(status.discovered_count, 1);
    assert_eq!(status.downloaded_count, 0);
    assert_eq!(status.error_count, 1);
    assert_eq!(fetcher.detail_calls("A=="), 1);
    assert!(!persisted(&pipeline, "A==").await);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn losing_the_scraper_is_a_terminal_error() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::default()
            .with_search_page(search_page(&[("A==", "LEY DE AMPARO")], 1, 1))
            .with_detail("A==", vec![Ok(detail_page("LEY DE AMPARO"))]),
    );

    let pipeline =
        spawn_test_pipeline(dir.path(), Arc::clone(&fetcher), PipelineOptions::default(), |_| {})
            .await;

    // Stop the scraper before anything dispatches: the run cannot proceed
    // without it.
    pipeline.scraper.tell(ScraperMsg::Shutdown).await;

    pipeline
        .discover(DiscoverCommand::new(SearchQuery::default(), 100, false))
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = pipeline.status().await.unwrap();
        if status.phase == PipelinePhase::Error {
            assert_eq!(status.downloaded_count, 0);
            assert!(status.error_count >= 1);
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "error phase never reached: {status:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Terminal: the phase stays put and nothing downloads afterwards.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let status = pipeline.status().await.unwrap();
    assert_eq!(status.phase, PipelinePhase::Error);
    assert_eq!(status.downloaded_count, 0);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn pause_saves_checkpoint_and_resume_drains() {
    let dir = tempfile::tempdir().unwrap();

    let q_params: Vec<String> = (1..=5).map(|i| format!("Q{i}==")).collect();
    let rows: Vec<(&str, &str)> = q_params
        .iter()
        .map(|q| (q.as_str(), "LEY DE PRUEBA"))
        .collect();

    let mut fetcher = ScriptedFetcher::default()
        .with_search_page(search_page(&rows, 1, 1))
        .with_detail_delay(Duration::from_millis(30));
    for q in &q_params {
        fetcher = fetcher.with_detail(q, vec![Ok(detail_page("LEY DE PRUEBA"))]);
    }
    let fetcher = Arc::new(fetcher);

    let pipeline = spawn_test_pipeline(
        dir.path(),
        Arc::clone(&fetcher),
        PipelineOptions::default(),
        |config| {
            config.scrape.max_concurrent_downloads = 1;
            config.scrape.checkpoint_interval = 2;
        },
    )
    .await;

    let cmd = DiscoverCommand::new(SearchQuery::default(), 100, false);
    let session_id = cmd.correlation_id.clone();
    pipeline.discover(cmd).await.unwrap();

    // Let at least one download land, then pause.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = pipeline.status().await.unwrap();
        if status.downloaded_count >= 1 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "no progress");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let paused = pipeline.pause().await.unwrap();
    assert_eq!(paused.phase, PipelinePhase::Paused);
    assert_eq!(paused.session_id, session_id);
    let downloaded_at_pause = paused.downloaded_count;

    // In-flight work may land, but the queue stops pumping.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let still_paused = pipeline.status().await.unwrap();
    assert_eq!(still_paused.phase, PipelinePhase::Paused);
    assert!(still_paused.downloaded_count <= downloaded_at_pause + 1);
    assert!(still_paused.downloaded_count < 5);

    // The pause checkpoint is on disk under <checkpoint-dir>/<session>.json.
    let checkpoint_path = dir.path().join(format!("checkpoints/{session_id}.json"));
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !checkpoint_path.exists() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "pause checkpoint not written"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let checkpoint: lex_core::entities::Checkpoint =
        serde_json::from_str(&std::fs::read_to_string(&checkpoint_path).unwrap()).unwrap();
    assert_eq!(checkpoint.session_id, session_id);
    assert!(checkpoint.processed_count >= downloaded_at_pause.saturating_sub(1));

    let resumed = pipeline.resume().await.unwrap();
    assert_ne!(resumed.phase, PipelinePhase::Paused);

    let status = wait_for_drain(&pipeline, 1).await;
    assert_eq!(status.downloaded_count, 5);
    assert_eq!(status.error_count, 0);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn backpressure_with_tiny_pdf_mailbox_loses_nothing() {
    let dir = tempfile::tempdir().unwrap();

    let docs: Vec<(String, String)> = (1..=4)
        .map(|i| (format!("D{i}=="), format!("R{i}==")))
        .collect();
    let rows: Vec<(&str, &str)> = docs
        .iter()
        .map(|(q, _)| (q.as_str(), "LEY CON REFORMAS"))
        .collect();

    let mut fetcher = ScriptedFetcher::default().with_search_page(search_page(&rows, 1, 1));
    for (doc_q, reform_q) in &docs {
        fetcher = fetcher
            .with_detail(doc_q, vec![Ok(detail_page_with_pdf("LEY CON REFORMAS", reform_q))])
            // Empty body: the processor reports it, the document survives.
            .with_pdf(reform_q, Vec::new());
    }
    let fetcher = Arc::new(fetcher);

    let options = PipelineOptions {
        pdf_mailbox_capacity: 1,
        ..PipelineOptions::default()
    };
    let pipeline = spawn_test_pipeline(dir.path(), Arc::clone(&fetcher), options, |_| {}).await;

    pipeline
        .discover(DiscoverCommand::new(SearchQuery::default(), 100, false))
        .await
        .unwrap();

    let status = wait_for_drain(&pipeline, 3).await;
    assert_eq!(status.discovered_count, 4);
    assert_eq!(status.downloaded_count, 4);

    for (doc_q, _) in &docs {
        assert!(persisted(&pipeline, doc_q).await, "{doc_q} not persisted");
    }

    // Every empty PDF produced exactly one error event; none were lost to
    // the capacity-1 mailbox.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = pipeline.status().await.unwrap();
        if status.error_count >= 4 {
            assert_eq!(status.error_count, 4);
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "pdf errors not reported: {status:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    pipeline.shutdown().await;
}
