//! PDF processor worker: extraction, chunking, chunk-record assembly.
//!
//! Extraction and chunking are CPU-bound and run under `spawn_blocking`.
//! Produced chunks are cached per document for introspection, pushed to
//! persistence as chunk rows, and handed to the embedder. Corrupted or
//! password-protected PDFs fail non-recoverably; an empty text layer is
//! recoverable (a re-fetch may return complete data).

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use lex_core::entities::TextChunk;
use lex_core::ids;
use lex_parser::chunker::TextChunker;
use lex_parser::pdf::extract_pdf_text;
use lex_parser::PdfError;

use crate::coordinator::CoordinatorMsg;
use crate::mailbox::{mailbox, Addr};
use crate::messages::{
    ActorError, GenerateEmbeddingsCommand, PdfProcessed, ProcessPdfCommand, RetryCommand,
};
use crate::workers::embedder::EmbedderMsg;
use crate::workers::persistence::PersistMsg;

const ACTOR_NAME: &str = "pdf_processor";

/// Messages the PDF processor consumes.
pub enum PdfMsg {
    Process(ProcessPdfCommand),
    /// Chunks produced for a document this run (introspection/tests).
    GetChunks {
        document_id: String,
        reply: oneshot::Sender<Vec<TextChunk>>,
    },
    Shutdown,
}

/// Extractor + chunker coordinator.
pub struct PdfWorker {
    coordinator: Addr<CoordinatorMsg>,
    embedder: Addr<EmbedderMsg>,
    persistence: Addr<PersistMsg>,
    chunker: TextChunker,
    chunks: HashMap<String, Vec<TextChunk>>,
}

impl PdfWorker {
    /// Spawn the worker loop. `capacity` bounds the mailbox — the scraper
    /// suspends on it when processing lags.
    pub fn spawn(
        coordinator: Addr<CoordinatorMsg>,
        embedder: Addr<EmbedderMsg>,
        persistence: Addr<PersistMsg>,
        chunker: TextChunker,
        capacity: usize,
    ) -> (Addr<PdfMsg>, JoinHandle<()>) {
        let (addr, rx) = mailbox("pdf_processor", capacity);
        let worker = Self {
            coordinator,
            embedder,
            persistence,
            chunker,
            chunks: HashMap::new(),
        };
        let handle = tokio::spawn(worker.run(rx));
        (addr, handle)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<PdfMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                PdfMsg::Process(cmd) => self.handle_process(cmd).await,
                PdfMsg::GetChunks { document_id, reply } => {
                    let _ = reply.send(self.chunks.get(&document_id).cloned().unwrap_or_default());
                }
                PdfMsg::Shutdown => break,
            }
        }
    }

    async fn handle_process(&mut self, cmd: ProcessPdfCommand) {
        if cmd.pdf_bytes.is_empty() {
            self.emit_error(&cmd, "PdfEmptyInput", "Empty PDF bytes provided", false)
                .await;
            return;
        }

        let bytes = cmd.pdf_bytes.clone();
        let extraction = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes)).await;

        let extracted = match extraction {
            Ok(Ok(extracted)) => extracted,
            Ok(Err(error)) => {
                let recoverable = error.is_recoverable();
                self.emit_error(&cmd, pdf_error_type(&error), &error.to_string(), recoverable)
                    .await;
                return;
            }
            Err(join_error) => {
                self.emit_error(&cmd, "ExtractionTask", &join_error.to_string(), true)
                    .await;
                return;
            }
        };

        let chunker = self.chunker.clone();
        let text = extracted.text;
        let chunked = tokio::task::spawn_blocking(move || chunker.chunk(&text)).await;
        let pieces = match chunked {
            Ok(pieces) => pieces,
            Err(join_error) => {
                self.emit_error(&cmd, "ChunkingTask", &join_error.to_string(), true)
                    .await;
                return;
            }
        };

        let mut total_tokens = 0usize;
        let chunks: Vec<TextChunk> = pieces
            .into_iter()
            .map(|piece| {
                total_tokens += piece.token_count;
                TextChunk {
                    id: ids::chunk_id(&cmd.document_id, piece.chunk_index),
                    document_id: cmd.document_id.clone(),
                    content: piece.content,
                    token_count: piece.token_count,
                    chunk_index: piece.chunk_index,
                    metadata: vec![
                        ("source_url".into(), cmd.source_url.clone()),
                        ("start_char".into(), piece.start_char.to_string()),
                        ("end_char".into(), piece.end_char.to_string()),
                    ],
                }
            })
            .collect();

        self.chunks.insert(cmd.document_id.clone(), chunks.clone());

        self.persistence
            .tell(PersistMsg::SaveChunks {
                document_id: cmd.document_id.clone(),
                chunks: chunks.clone(),
            })
            .await;

        self.coordinator
            .tell(CoordinatorMsg::PdfDone(PdfProcessed {
                correlation_id: cmd.correlation_id.clone(),
                timestamp: chrono::Utc::now(),
                document_id: cmd.document_id.clone(),
                chunk_count: chunks.len(),
                total_tokens,
                extraction_confidence: extracted.confidence,
            }))
            .await;

        self.embedder
            .tell(EmbedderMsg::Generate(GenerateEmbeddingsCommand {
                correlation_id: cmd.correlation_id,
                timestamp: chrono::Utc::now(),
                document_id: cmd.document_id,
                chunks,
            }))
            .await;
    }

    async fn emit_error(
        &self,
        cmd: &ProcessPdfCommand,
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
                recoverable.then(|| RetryCommand::ProcessPdf(cmd.clone())),
            )))
            .await;
    }
}

const fn pdf_error_type(error: &PdfError) -> &'static str {
    match error {
        PdfError::EmptyInput => "PdfEmptyInput",
        PdfError::Corrupted(_) => "PdfCorrupted",
        PdfError::PasswordProtected(_) => "PdfPasswordProtected",
        PdfError::EmptyText => "PdfEmptyText",
    }
}
