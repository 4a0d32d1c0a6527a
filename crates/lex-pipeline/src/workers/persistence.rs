//! Persistence worker: owns the [`DocumentStore`] and serializes writes
//! through its mailbox.
//!
//! Save acknowledgements travel back to the coordinator as detached sends
//! so the coordinator's existence asks and this worker's notifications can
//! never block each other in a cycle.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use lex_core::entities::{Document, TextChunk};
use lex_store::DocumentStore;

use crate::coordinator::CoordinatorMsg;
use crate::mailbox::{mailbox, Addr};
use crate::messages::{ActorError, DocumentSaved, SaveDocumentCommand, SaveEmbeddingsCommand};

const ACTOR_NAME: &str = "persistence";

/// Messages the persistence worker consumes.
pub enum PersistMsg {
    SaveDocument(SaveDocumentCommand),
    SaveEmbeddings(SaveEmbeddingsCommand),
    SaveChunks {
        document_id: String,
        chunks: Vec<TextChunk>,
    },
    Exists {
        q_param: String,
        reply: oneshot::Sender<bool>,
    },
    FindByQParam {
        q_param: String,
        reply: oneshot::Sender<Option<Document>>,
    },
    ListDocuments {
        reply: oneshot::Sender<Vec<String>>,
    },
    Shutdown,
}

/// Store-owning worker.
pub struct PersistenceWorker {
    coordinator: Addr<CoordinatorMsg>,
    store: DocumentStore,
}

impl PersistenceWorker {
    /// Spawn the worker loop.
    pub fn spawn(
        coordinator: Addr<CoordinatorMsg>,
        store: DocumentStore,
        capacity: usize,
    ) -> (Addr<PersistMsg>, JoinHandle<()>) {
        let (addr, rx) = mailbox("persistence", capacity);
        let worker = Self { coordinator, store };
        let handle = tokio::spawn(worker.run(rx));
        (addr, handle)
    }

    async fn run(self, mut rx: mpsc::Receiver<PersistMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                PersistMsg::SaveDocument(cmd) => self.handle_save(cmd).await,
                PersistMsg::SaveEmbeddings(cmd) => self.handle_save_embeddings(cmd).await,
                PersistMsg::SaveChunks {
                    document_id,
                    chunks,
                } => {
                    self.store.save_chunks(&document_id, &chunks).await;
                }
                PersistMsg::Exists { q_param, reply } => {
                    let _ = reply.send(self.store.exists(&q_param).await);
                }
                PersistMsg::FindByQParam { q_param, reply } => {
                    let found = self.store.find_by_q_param(&q_param).await.unwrap_or_default();
                    let _ = reply.send(found);
                }
                PersistMsg::ListDocuments { reply } => {
                    let _ = reply.send(self.store.list_ids().await);
                }
                PersistMsg::Shutdown => break,
            }
        }
    }

    async fn handle_save(&self, cmd: SaveDocumentCommand) {
        match self.store.save(&cmd.document).await {
            Ok(()) => {
                self.coordinator
                    .tell_detached(CoordinatorMsg::Saved(DocumentSaved {
                        correlation_id: cmd.correlation_id,
                        timestamp: chrono::Utc::now(),
                        document_id: cmd.document.id,
                    }));
            }
            Err(error) => {
                self.coordinator
                    .tell_detached(CoordinatorMsg::Error(ActorError::new(
                        &cmd.correlation_id,
                        ACTOR_NAME,
                        "SaveFailed",
                        error.to_string(),
                        false,
                        None,
                    )));
            }
        }
    }

    async fn handle_save_embeddings(&self, cmd: SaveEmbeddingsCommand) {
        if let Err(error) = self
            .store
            .save_embeddings(&cmd.document_id, &cmd.embeddings)
            .await
        {
            // The document record is already durable; embeddings can be
            // regenerated later.
            self.coordinator
                .tell_detached(CoordinatorMsg::Error(ActorError::new(
                    &cmd.correlation_id,
                    ACTOR_NAME,
                    "EmbeddingSaveFailed",
                    error.to_string(),
                    true,
                    None,
                )));
        }
    }
}
