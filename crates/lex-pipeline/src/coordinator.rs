//! Coordinator: the pipeline state machine.
//!
//! The coordinator is the single owner of pipeline progress. All counter
//! mutation happens on its mailbox loop; workers report through events.
//! Policies implemented here:
//!
//! - **Deduplication** — a `q_param` is dispatched at most once per run,
//!   and never when persistence already has it (the existence check runs on
//!   a spawned task so the loop stays responsive).
//! - **Bounded concurrency** — the pending queue pumps while
//!   `active_downloads < max_concurrent_downloads` and the pipeline is not
//!   paused. Scraper errors release their slot like completions do.
//! - **Retry** — recoverable errors carrying their original download are
//!   re-dispatched after a fixed backoff, at most `max_retries` times per
//!   `q_param`; exhausted or permanent failures land in the failed set.
//! - **Checkpointing** — every `checkpoint_interval` downloads and on
//!   pause.
//! - **Pause/Resume** — pause stops pumping; in-flight downloads drain
//!   naturally and their results are still accepted.
//! - **Terminal error** — when a worker the run cannot proceed without has
//!   stopped (a dispatch target's mailbox is closed), the phase moves to
//!   `error` and stays there. Per-document failures only count errors and
//!   never halt the run.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use lex_core::entities::Checkpoint;

use crate::mailbox::{ask, Addr};
use crate::messages::{
    ActorError, CheckpointSaved, DiscoverCommand, DocumentDiscovered, DocumentDownloaded,
    DocumentSaved, DownloadCommand, EmbeddingsGenerated, PageDiscovered, PdfProcessed,
    RetryCommand, SaveCheckpointCommand, SaveDocumentCommand,
};
use crate::workers::checkpoint::CheckpointMsg;
use crate::workers::discovery::DiscoveryMsg;
use crate::workers::persistence::PersistMsg;
use crate::workers::scraper::ScraperMsg;

/// Pipeline execution phase.
///
/// ```text
/// idle → discovering → downloading → processing → {idle | completed}
/// ```
///
/// `paused` is reachable from any active phase. `error` is terminal for a
/// run and entered only when a worker the pipeline cannot proceed without
/// has stopped; individual document failures are counted, never terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Idle,
    Discovering,
    Downloading,
    Processing,
    Paused,
    Completed,
    Error,
}

impl PipelinePhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::Downloading => "downloading",
            Self::Processing => "processing",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable pipeline snapshot, served on `GetState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub phase: PipelinePhase,
    pub session_id: String,
    pub discovered_count: usize,
    pub downloaded_count: usize,
    pub pending_count: usize,
    pub active_downloads: usize,
    pub error_count: usize,
}

impl PipelineStatus {
    /// The run has drained: nothing pending, nothing in flight, and at
    /// least one document was discovered.
    #[must_use]
    pub const fn is_drained(&self) -> bool {
        self.pending_count == 0 && self.active_downloads == 0 && self.discovered_count > 0
    }
}

/// Result of a `Discover` ask.
#[derive(Debug, Clone)]
pub enum DiscoveryOutcome {
    Page(PageDiscovered),
    Error(ActorError),
}

/// Messages the coordinator consumes.
pub enum CoordinatorMsg {
    // External commands
    Discover {
        cmd: DiscoverCommand,
        reply: Option<oneshot::Sender<DiscoveryOutcome>>,
    },
    Pause {
        reply: Option<oneshot::Sender<PipelineStatus>>,
    },
    Resume {
        reply: Option<oneshot::Sender<PipelineStatus>>,
    },
    GetState {
        reply: oneshot::Sender<PipelineStatus>,
    },
    // Worker events
    Discovered(DocumentDiscovered),
    Page(PageDiscovered),
    Downloaded(DocumentDownloaded),
    SaveDocument(SaveDocumentCommand),
    Saved(DocumentSaved),
    PdfDone(PdfProcessed),
    EmbeddingsDone(EmbeddingsGenerated),
    CheckpointDone(CheckpointSaved),
    Error(ActorError),
    /// A worker required for the run has stopped; the run cannot proceed.
    Fatal(ActorError),
    // Internal
    Enqueue(DocumentDiscovered),
    /// Existence check found the document already persisted.
    Skipped { q_param: String },
    RetryReady(DownloadCommand),
    Shutdown,
}

/// Coordinator policy knobs.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub max_concurrent_downloads: usize,
    pub checkpoint_interval: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub include_pdfs: bool,
    pub include_reforms: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 3,
            checkpoint_interval: 10,
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            include_pdfs: true,
            include_reforms: true,
        }
    }
}

/// The state machine.
pub struct Coordinator {
    discovery: Addr<DiscoveryMsg>,
    scraper: Addr<ScraperMsg>,
    persistence: Addr<PersistMsg>,
    checkpoint: Addr<CheckpointMsg>,
    self_addr: Addr<CoordinatorMsg>,
    config: CoordinatorConfig,

    phase: PipelinePhase,
    session_id: String,
    discovered: HashSet<String>,
    downloaded: HashSet<String>,
    last_downloaded: Option<String>,
    pending: VecDeque<DocumentDiscovered>,
    retry_queue: VecDeque<DownloadCommand>,
    retry_counts: HashMap<String, u32>,
    failed: HashSet<String>,
    active_downloads: usize,
    /// Existence checks in flight — still "pending" to observers.
    existence_checks: usize,
    /// Backoff timers in flight — still "pending" to observers.
    scheduled_retries: usize,
    error_count: usize,
}

impl Coordinator {
    /// Spawn the coordinator loop. The mailbox is created by the caller so
    /// workers can hold the address before this runs.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        self_addr: Addr<CoordinatorMsg>,
        rx: mpsc::Receiver<CoordinatorMsg>,
        discovery: Addr<DiscoveryMsg>,
        scraper: Addr<ScraperMsg>,
        persistence: Addr<PersistMsg>,
        checkpoint: Addr<CheckpointMsg>,
        config: CoordinatorConfig,
    ) -> JoinHandle<()> {
        let coordinator = Self {
            discovery,
            scraper,
            persistence,
            checkpoint,
            self_addr,
            config,
            phase: PipelinePhase::Idle,
            session_id: lex_core::ids::new_session_id(),
            discovered: HashSet::new(),
            downloaded: HashSet::new(),
            last_downloaded: None,
            pending: VecDeque::new(),
            retry_queue: VecDeque::new(),
            retry_counts: HashMap::new(),
            failed: HashSet::new(),
            active_downloads: 0,
            existence_checks: 0,
            scheduled_retries: 0,
            error_count: 0,
        };
        tokio::spawn(coordinator.run(rx))
    }

    async fn run(mut self, mut rx: mpsc::Receiver<CoordinatorMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                CoordinatorMsg::Discover { cmd, reply } => self.handle_discover(cmd, reply),
                CoordinatorMsg::Pause { reply } => {
                    self.handle_pause();
                    if let Some(reply) = reply {
                        let _ = reply.send(self.status());
                    }
                }
                CoordinatorMsg::Resume { reply } => {
                    self.handle_resume();
                    if let Some(reply) = reply {
                        let _ = reply.send(self.status());
                    }
                }
                CoordinatorMsg::GetState { reply } => {
                    let _ = reply.send(self.status());
                }
                CoordinatorMsg::Discovered(event) => self.handle_discovered(event),
                CoordinatorMsg::Enqueue(event) => self.handle_enqueue(event),
                CoordinatorMsg::Skipped { q_param } => {
                    tracing::debug!(q_param, "already persisted, skipping");
                    self.existence_checks = self.existence_checks.saturating_sub(1);
                    self.check_completion();
                }
                CoordinatorMsg::Page(event) => self.handle_page(event),
                CoordinatorMsg::Downloaded(event) => self.handle_downloaded(event),
                CoordinatorMsg::SaveDocument(cmd) => {
                    self.persistence.tell(PersistMsg::SaveDocument(cmd)).await;
                }
                CoordinatorMsg::Saved(event) => {
                    tracing::debug!(document_id = %event.document_id, "document saved");
                }
                CoordinatorMsg::PdfDone(event) => {
                    tracing::debug!(
                        document_id = %event.document_id,
                        chunks = event.chunk_count,
                        confidence = event.extraction_confidence,
                        "pdf processed"
                    );
                }
                CoordinatorMsg::EmbeddingsDone(event) => {
                    tracing::debug!(
                        document_id = %event.document_id,
                        count = event.embedding_count,
                        "embeddings generated"
                    );
                }
                CoordinatorMsg::CheckpointDone(event) => {
                    tracing::debug!(
                        session_id = %event.session_id,
                        processed = event.processed_count,
                        "checkpoint saved"
                    );
                }
                CoordinatorMsg::Error(error) => self.handle_error(error),
                CoordinatorMsg::Fatal(error) => self.handle_fatal(&error),
                CoordinatorMsg::RetryReady(cmd) => {
                    self.scheduled_retries = self.scheduled_retries.saturating_sub(1);
                    self.retry_queue.push_back(cmd);
                    self.pump();
                }
                CoordinatorMsg::Shutdown => break,
            }
        }
    }

    fn handle_discover(
        &mut self,
        cmd: DiscoverCommand,
        reply: Option<oneshot::Sender<DiscoveryOutcome>>,
    ) {
        self.phase = PipelinePhase::Discovering;
        self.session_id = cmd.correlation_id.clone();
        self.discovery
            .tell_detached(DiscoveryMsg::Discover { cmd, reply });
    }

    /// Dedup gate: drop repeats, then check persistence off-loop and
    /// enqueue only documents we have never saved.
    fn handle_discovered(&mut self, event: DocumentDiscovered) {
        if !self.discovered.insert(event.q_param.clone()) {
            return;
        }

        self.existence_checks += 1;
        let persistence = self.persistence.clone();
        let me = self.self_addr.clone();
        tokio::spawn(async move {
            let q_param = event.q_param.clone();
            let exists = ask(&persistence, |reply| PersistMsg::Exists { q_param, reply })
                .await
                .unwrap_or(false);
            if exists {
                me.tell(CoordinatorMsg::Skipped {
                    q_param: event.q_param,
                })
                .await;
            } else {
                me.tell(CoordinatorMsg::Enqueue(event)).await;
            }
        });
    }

    fn handle_enqueue(&mut self, event: DocumentDiscovered) {
        self.existence_checks = self.existence_checks.saturating_sub(1);
        self.pending.push_back(event);
        self.pump();
    }

    fn handle_page(&mut self, event: PageDiscovered) {
        if !event.has_more_pages {
            // Existence checks and backoff timers still count as work: the
            // final Page event usually lands before their results do.
            if self.has_outstanding_work() {
                self.phase = PipelinePhase::Downloading;
            } else if self.phase == PipelinePhase::Discovering {
                self.phase = PipelinePhase::Idle;
            }
        }
    }

    fn handle_downloaded(&mut self, event: DocumentDownloaded) {
        self.downloaded.insert(event.q_param.clone());
        self.last_downloaded = Some(event.q_param.clone());
        self.retry_counts.remove(&event.q_param);
        self.failed.remove(&event.q_param);
        self.active_downloads = self.active_downloads.saturating_sub(1);

        let interval = self.config.checkpoint_interval;
        if interval > 0 && self.downloaded.len() % interval == 0 {
            self.save_checkpoint();
        }

        self.pump();
        self.check_completion();
    }

    fn handle_pause(&mut self) {
        self.phase = PipelinePhase::Paused;
        self.save_checkpoint();
    }

    fn handle_resume(&mut self) {
        if self.phase != PipelinePhase::Paused {
            return;
        }
        self.phase = if self.pending.is_empty() && self.retry_queue.is_empty() {
            PipelinePhase::Idle
        } else {
            PipelinePhase::Downloading
        };
        self.pump();
    }

    fn handle_error(&mut self, error: ActorError) {
        self.error_count += 1;
        tracing::warn!(
            actor = error.actor_name,
            error_type = %error.error_type,
            recoverable = error.recoverable,
            "{}",
            error.error_message
        );

        if let Some(RetryCommand::Download(cmd)) = &error.original_command {
            // The scraper reported instead of completing; its slot frees.
            self.active_downloads = self.active_downloads.saturating_sub(1);

            if error.recoverable {
                let attempts = self.retry_counts.entry(cmd.q_param.clone()).or_insert(0);
                if *attempts < self.config.max_retries {
                    *attempts += 1;
                    self.schedule_retry(cmd.clone());
                } else {
                    self.failed.insert(cmd.q_param.clone());
                }
            } else {
                self.failed.insert(cmd.q_param.clone());
            }

            self.pump();
            self.check_completion();
        }
    }

    /// A dispatch target is gone. The run ends here; progress is
    /// checkpointed so a later session can pick up the remainder.
    fn handle_fatal(&mut self, error: &ActorError) {
        self.error_count += 1;
        // The failed dispatch was holding a concurrency slot.
        self.active_downloads = self.active_downloads.saturating_sub(1);
        tracing::error!(
            actor = error.actor_name,
            error_type = %error.error_type,
            "{}",
            error.error_message
        );
        self.phase = PipelinePhase::Error;
        self.save_checkpoint();
    }

    fn schedule_retry(&mut self, cmd: DownloadCommand) {
        self.scheduled_retries += 1;
        let me = self.self_addr.clone();
        let backoff = self.config.retry_backoff;
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            me.tell(CoordinatorMsg::RetryReady(cmd)).await;
        });
    }

    /// Dispatch queued downloads up to the concurrency gate. Retries go
    /// first. No-op while paused or after a terminal error.
    fn pump(&mut self) {
        if self.phase == PipelinePhase::Paused || self.phase == PipelinePhase::Error {
            return;
        }

        while self.active_downloads < self.config.max_concurrent_downloads {
            let cmd = if let Some(retry) = self.retry_queue.pop_front() {
                retry
            } else if let Some(event) = self.pending.pop_front() {
                DownloadCommand::with_correlation(
                    &event.correlation_id,
                    &event.q_param,
                    self.config.include_pdfs,
                    self.config.include_reforms,
                )
            } else {
                break;
            };

            self.active_downloads += 1;
            self.phase = PipelinePhase::Downloading;

            let scraper = self.scraper.clone();
            let me = self.self_addr.clone();
            tokio::spawn(async move {
                if !scraper.tell(ScraperMsg::Download(cmd.clone())).await {
                    me.tell(CoordinatorMsg::Fatal(ActorError::new(
                        &cmd.correlation_id,
                        "coordinator",
                        "ScraperUnavailable",
                        format!("scraper mailbox closed dispatching {}", cmd.q_param),
                        false,
                        None,
                    )))
                    .await;
                }
            });
        }
    }

    /// Anything queued, in flight, mid-dedup, or waiting on a backoff
    /// timer.
    fn has_outstanding_work(&self) -> bool {
        !self.pending.is_empty()
            || !self.retry_queue.is_empty()
            || self.active_downloads > 0
            || self.existence_checks > 0
            || self.scheduled_retries > 0
    }

    fn check_completion(&mut self) {
        if self.phase == PipelinePhase::Downloading
            && !self.has_outstanding_work()
            && !self.discovered.is_empty()
        {
            self.phase = PipelinePhase::Idle;
        }
    }

    fn save_checkpoint(&self) {
        let mut failed: Vec<String> = self.failed.iter().cloned().collect();
        failed.sort();

        let checkpoint = Checkpoint {
            session_id: self.session_id.clone(),
            last_processed_q_param: self.last_downloaded.clone().unwrap_or_default(),
            processed_count: self.downloaded.len(),
            failed_q_params: failed,
            created_at: chrono::Utc::now(),
        };

        self.checkpoint
            .tell_detached(CheckpointMsg::Save(SaveCheckpointCommand {
                correlation_id: self.session_id.clone(),
                timestamp: chrono::Utc::now(),
                checkpoint,
            }));
    }

    fn status(&self) -> PipelineStatus {
        PipelineStatus {
            phase: self.phase,
            session_id: self.session_id.clone(),
            discovered_count: self.discovered.len(),
            downloaded_count: self.downloaded.len(),
            pending_count: self.pending.len()
                + self.retry_queue.len()
                + self.existence_checks
                + self.scheduled_retries,
            active_downloads: self.active_downloads,
            error_count: self.error_count,
        }
    }
}
