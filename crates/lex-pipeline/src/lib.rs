//! # lex-pipeline
//!
//! The concurrent scraping pipeline: an actor-style system in which a
//! coordinator drives specialized workers (discovery, scraper, PDF
//! processor, embedder, vector index, persistence, checkpoint) over bounded
//! mailboxes, with a process-wide rate limiter gating all outbound HTTP.
//!
//! Assembly lives in [`spawn_pipeline`]; [`PipelineHandle`] is the external
//! surface (commands in, status out, orderly shutdown). The
//! [`bridge::ControlBridge`] layers coarse start/stop/pause/status commands
//! and progress polling on top for external clients.

pub mod bridge;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod mailbox;
pub mod messages;
pub mod rate_limit;
pub mod workers;

use std::sync::Arc;

use tokio::task::JoinHandle;

use lex_config::LexmexConfig;
use lex_embeddings::{EmbeddingEngine, EngineOptions};
use lex_parser::chunker::{ChunkerConfig, TextChunker};
use lex_store::{CheckpointStore, DocumentStore};

pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorMsg, DiscoveryOutcome, PipelinePhase,
    PipelineStatus,
};
pub use error::PipelineError;
pub use fetch::{FetchError, HttpFetcher, PageFetcher};
pub use mailbox::{ask, mailbox, Addr, DEFAULT_MAILBOX_CAPACITY};
pub use rate_limit::RateLimiter;

use workers::{
    CheckpointMsg, CheckpointWorker, DiscoveryMsg, DiscoveryWorker, EmbedderMsg, EmbedderWorker,
    PdfMsg, PdfWorker, PersistMsg, PersistenceWorker, ScraperMsg, ScraperWorker, VectorIndexWorker,
    VectorMsg,
};

/// Mailbox sizing for a pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Worker mailbox capacity.
    pub mailbox_capacity: usize,
    /// Coordinator mailbox capacity — larger, to absorb event fan-in from
    /// every worker.
    pub coordinator_capacity: usize,
    /// PDF processor capacity; the scraper suspends on it when processing
    /// lags (the intended flow control).
    pub pdf_mailbox_capacity: usize,
    /// Skip reform-PDF downloads entirely.
    pub skip_pdfs: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            coordinator_capacity: 256,
            pdf_mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            skip_pdfs: false,
        }
    }
}

/// Externally supplied collaborators.
pub struct PipelineDeps<F> {
    pub fetcher: Arc<F>,
    pub limiter: Arc<RateLimiter>,
    pub document_store: DocumentStore,
    pub checkpoint_store: CheckpointStore,
    pub engine: EmbeddingEngine,
}

/// Addresses of a running pipeline plus its task handles.
pub struct PipelineHandle {
    pub coordinator: Addr<CoordinatorMsg>,
    pub discovery: Addr<DiscoveryMsg>,
    pub scraper: Addr<ScraperMsg>,
    pub pdf_processor: Addr<PdfMsg>,
    pub embedder: Addr<EmbedderMsg>,
    pub vector_index: Addr<VectorMsg>,
    pub persistence: Addr<PersistMsg>,
    pub checkpoint: Addr<CheckpointMsg>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Start a discovery run and await its page summary (or error event).
    ///
    /// # Errors
    ///
    /// [`PipelineError`] when the coordinator or discovery worker stopped.
    pub async fn discover(
        &self,
        cmd: messages::DiscoverCommand,
    ) -> Result<DiscoveryOutcome, PipelineError> {
        ask(&self.coordinator, |reply| CoordinatorMsg::Discover {
            cmd,
            reply: Some(reply),
        })
        .await
    }

    /// Pause: stop pumping the queue and save a checkpoint.
    ///
    /// # Errors
    ///
    /// [`PipelineError`] when the coordinator stopped.
    pub async fn pause(&self) -> Result<PipelineStatus, PipelineError> {
        ask(&self.coordinator, |reply| CoordinatorMsg::Pause {
            reply: Some(reply),
        })
        .await
    }

    /// Resume from pause and pump the queue.
    ///
    /// # Errors
    ///
    /// [`PipelineError`] when the coordinator stopped.
    pub async fn resume(&self) -> Result<PipelineStatus, PipelineError> {
        ask(&self.coordinator, |reply| CoordinatorMsg::Resume {
            reply: Some(reply),
        })
        .await
    }

    /// Current pipeline snapshot.
    ///
    /// # Errors
    ///
    /// [`PipelineError`] when the coordinator stopped.
    pub async fn status(&self) -> Result<PipelineStatus, PipelineError> {
        ask(&self.coordinator, |reply| CoordinatorMsg::GetState { reply }).await
    }

    /// Drain and stop every component: intake first (discovery, scraper),
    /// then the processing chain, stores last, coordinator at the end.
    pub async fn shutdown(self) {
        self.discovery.tell(DiscoveryMsg::Shutdown).await;
        self.scraper.tell(ScraperMsg::Shutdown).await;
        self.pdf_processor.tell(PdfMsg::Shutdown).await;
        self.embedder.tell(EmbedderMsg::Shutdown).await;
        self.vector_index.tell(VectorMsg::Shutdown).await;
        self.persistence.tell(PersistMsg::Shutdown).await;
        self.checkpoint.tell(CheckpointMsg::Shutdown).await;
        self.coordinator.tell(CoordinatorMsg::Shutdown).await;

        for task in self.tasks {
            if let Err(error) = task.await {
                tracing::debug!(%error, "pipeline task ended abnormally");
            }
        }
    }
}

/// Wire and spawn a full pipeline.
pub fn spawn_pipeline<F: PageFetcher>(
    config: &LexmexConfig,
    deps: PipelineDeps<F>,
    options: &PipelineOptions,
) -> PipelineHandle {
    let (coordinator_addr, coordinator_rx) =
        mailbox::mailbox("coordinator", options.coordinator_capacity);

    let mut tasks = Vec::new();

    let (persistence, task) = PersistenceWorker::spawn(
        coordinator_addr.clone(),
        deps.document_store,
        options.mailbox_capacity,
    );
    tasks.push(task);

    let (checkpoint, task) = CheckpointWorker::spawn(
        coordinator_addr.clone(),
        deps.checkpoint_store,
        options.mailbox_capacity,
    );
    tasks.push(task);

    let (vector_index, task) = VectorIndexWorker::spawn(
        coordinator_addr.clone(),
        config.chunking.embedding_dimension,
        options.mailbox_capacity,
    );
    tasks.push(task);

    let (embedder, task) = EmbedderWorker::spawn(
        coordinator_addr.clone(),
        vector_index.clone(),
        persistence.clone(),
        deps.engine,
        options.mailbox_capacity,
    );
    tasks.push(task);

    let chunker = TextChunker::new(ChunkerConfig {
        max_tokens: config.chunking.chunk_max_tokens,
        overlap_tokens: config.chunking.chunk_overlap_tokens,
        min_chunk_tokens: config.chunking.chunk_min_tokens,
        respect_boundaries: config.chunking.respect_boundaries,
    });
    let (pdf_processor, task) = PdfWorker::spawn(
        coordinator_addr.clone(),
        embedder.clone(),
        persistence.clone(),
        chunker,
        options.pdf_mailbox_capacity,
    );
    tasks.push(task);

    let (scraper, task) = ScraperWorker::spawn(
        coordinator_addr.clone(),
        pdf_processor.clone(),
        Arc::clone(&deps.fetcher),
        Arc::clone(&deps.limiter),
        !options.skip_pdfs,
        options.mailbox_capacity,
    );
    tasks.push(task);

    let (discovery, task) = DiscoveryWorker::spawn(
        coordinator_addr.clone(),
        deps.fetcher,
        deps.limiter,
        config.scrape.max_pages,
        options.mailbox_capacity,
    );
    tasks.push(task);

    let coordinator_config = CoordinatorConfig {
        max_concurrent_downloads: config.scrape.max_concurrent_downloads,
        checkpoint_interval: config.scrape.checkpoint_interval,
        max_retries: config.scrape.max_retries,
        retry_backoff: std::time::Duration::from_millis(config.scrape.retry_backoff_ms),
        include_pdfs: !options.skip_pdfs,
        include_reforms: true,
    };
    tasks.push(Coordinator::spawn(
        coordinator_addr.clone(),
        coordinator_rx,
        discovery.clone(),
        scraper.clone(),
        persistence.clone(),
        checkpoint.clone(),
        coordinator_config,
    ));

    PipelineHandle {
        coordinator: coordinator_addr,
        discovery,
        scraper,
        pdf_processor,
        embedder,
        vector_index,
        persistence,
        checkpoint,
        tasks,
    }
}

/// Spawn a pipeline over live HTTP with stores, limiter, and embedding
/// engine built from configuration (the CLI entry point).
///
/// # Errors
///
/// [`PipelineError`] when the HTTP client or a store cannot be created.
pub async fn spawn_http_pipeline(
    config: &LexmexConfig,
    options: &PipelineOptions,
) -> Result<PipelineHandle, PipelineError> {
    let fetcher = Arc::new(HttpFetcher::new(&config.scrape)?);
    let limiter = Arc::new(RateLimiter::token_bucket(config.scrape.rate_limit_per_second));
    let document_store = DocumentStore::open(&config.storage).await?;
    let checkpoint_store =
        CheckpointStore::open(std::path::Path::new(&config.storage.checkpoint_dir)).await?;
    let engine = EmbeddingEngine::new(&EngineOptions::default());

    Ok(spawn_pipeline(
        config,
        PipelineDeps {
            fetcher,
            limiter,
            document_store,
            checkpoint_store,
            engine,
        },
        options,
    ))
}
