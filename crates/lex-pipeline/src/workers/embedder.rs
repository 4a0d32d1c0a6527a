//! Embedder worker: chunk text → vectors.
//!
//! Encoding is CPU-bound and runs off the cooperative scheduler inside
//! [`EmbeddingEngine::encode`]. Generated embeddings fan out to the vector
//! index and to persistence; the coordinator only sees the count. Empty
//! input yields a zero-count event, not an error.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use lex_core::entities::ChunkEmbedding;
use lex_embeddings::EmbeddingEngine;

use crate::coordinator::CoordinatorMsg;
use crate::mailbox::{mailbox, Addr};
use crate::messages::{
    ActorError, EmbeddingsGenerated, GenerateEmbeddingsCommand, RetryCommand,
    SaveEmbeddingsCommand,
};
use crate::workers::persistence::PersistMsg;
use crate::workers::vector_index::VectorMsg;

const ACTOR_NAME: &str = "embedder";

/// Messages the embedder consumes.
pub enum EmbedderMsg {
    Generate(GenerateEmbeddingsCommand),
    /// Embeddings generated for a document this run (introspection/tests).
    GetEmbeddings {
        document_id: String,
        reply: oneshot::Sender<Vec<ChunkEmbedding>>,
    },
    Shutdown,
}

/// Vector-generating worker.
pub struct EmbedderWorker {
    coordinator: Addr<CoordinatorMsg>,
    vector_index: Addr<VectorMsg>,
    persistence: Addr<PersistMsg>,
    engine: EmbeddingEngine,
    embeddings: HashMap<String, Vec<ChunkEmbedding>>,
}

impl EmbedderWorker {
    /// Spawn the worker loop.
    pub fn spawn(
        coordinator: Addr<CoordinatorMsg>,
        vector_index: Addr<VectorMsg>,
        persistence: Addr<PersistMsg>,
        engine: EmbeddingEngine,
        capacity: usize,
    ) -> (Addr<EmbedderMsg>, JoinHandle<()>) {
        let (addr, rx) = mailbox("embedder", capacity);
        let worker = Self {
            coordinator,
            vector_index,
            persistence,
            engine,
            embeddings: HashMap::new(),
        };
        let handle = tokio::spawn(worker.run(rx));
        (addr, handle)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<EmbedderMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                EmbedderMsg::Generate(cmd) => self.handle_generate(cmd).await,
                EmbedderMsg::GetEmbeddings { document_id, reply } => {
                    let _ = reply.send(
                        self.embeddings
                            .get(&document_id)
                            .cloned()
                            .unwrap_or_default(),
                    );
                }
                EmbedderMsg::Shutdown => break,
            }
        }
    }

    async fn handle_generate(&mut self, cmd: GenerateEmbeddingsCommand) {
        let populated: Vec<_> = cmd
            .chunks
            .iter()
            .filter(|chunk| !chunk.content.is_empty())
            .collect();

        if populated.is_empty() {
            self.emit_generated(&cmd, 0).await;
            return;
        }

        let texts: Vec<String> = populated.iter().map(|c| c.content.clone()).collect();
        let vectors = match self.engine.encode(texts).await {
            Ok(vectors) => vectors,
            Err(error) => {
                self.coordinator
                    .tell(CoordinatorMsg::Error(ActorError::new(
                        &cmd.correlation_id,
                        ACTOR_NAME,
                        "EncodingError",
                        error.to_string(),
                        true,
                        Some(RetryCommand::GenerateEmbeddings(cmd.clone())),
                    )))
                    .await;
                return;
            }
        };

        let model_name = self.engine.model_name().to_string();
        let embeddings: Vec<ChunkEmbedding> = populated
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| ChunkEmbedding {
                chunk_id: chunk.id.clone(),
                vector,
                model_name: model_name.clone(),
            })
            .collect();

        self.embeddings
            .insert(cmd.document_id.clone(), embeddings.clone());

        let count = embeddings.len();
        let save = SaveEmbeddingsCommand {
            correlation_id: cmd.correlation_id.clone(),
            timestamp: chrono::Utc::now(),
            document_id: cmd.document_id.clone(),
            embeddings,
        };
        self.vector_index
            .tell(VectorMsg::AddBatch(save.clone()))
            .await;
        self.persistence
            .tell(PersistMsg::SaveEmbeddings(save))
            .await;

        self.emit_generated(&cmd, count).await;
    }

    async fn emit_generated(&self, cmd: &GenerateEmbeddingsCommand, count: usize) {
        self.coordinator
            .tell(CoordinatorMsg::EmbeddingsDone(EmbeddingsGenerated {
                correlation_id: cmd.correlation_id.clone(),
                timestamp: chrono::Utc::now(),
                document_id: cmd.document_id.clone(),
                embedding_count: count,
            }))
            .await;
    }
}
