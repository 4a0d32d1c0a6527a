//! Vector index worker: owns the [`VectorStore`] and serializes all
//! mutation through its mailbox.

use std::collections::HashSet;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use lex_vector::{VectorStats, VectorStore};

use crate::coordinator::CoordinatorMsg;
use crate::mailbox::{mailbox, Addr};
use crate::messages::{ActorError, SaveEmbeddingsCommand, SearchResults};

const ACTOR_NAME: &str = "vector_index";

/// Messages the vector index consumes.
pub enum VectorMsg {
    AddBatch(SaveEmbeddingsCommand),
    Search {
        correlation_id: String,
        query_vector: Vec<f32>,
        top_k: usize,
        filter_document_ids: Option<HashSet<String>>,
        reply: oneshot::Sender<SearchResults>,
    },
    Stats {
        reply: oneshot::Sender<VectorStats>,
    },
    Shutdown,
}

/// Store-owning worker.
pub struct VectorIndexWorker {
    coordinator: Addr<CoordinatorMsg>,
    store: VectorStore,
}

impl VectorIndexWorker {
    /// Spawn the worker loop around a store of the given dimension.
    pub fn spawn(
        coordinator: Addr<CoordinatorMsg>,
        dimension: usize,
        capacity: usize,
    ) -> (Addr<VectorMsg>, JoinHandle<()>) {
        let (addr, rx) = mailbox("vector_index", capacity);
        let worker = Self {
            coordinator,
            store: VectorStore::new(dimension),
        };
        let handle = tokio::spawn(worker.run(rx));
        (addr, handle)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<VectorMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                VectorMsg::AddBatch(cmd) => self.handle_add(cmd).await,
                VectorMsg::Search {
                    correlation_id,
                    query_vector,
                    top_k,
                    filter_document_ids,
                    reply,
                } => {
                    let results =
                        self.handle_search(&correlation_id, &query_vector, top_k, filter_document_ids.as_ref());
                    let _ = reply.send(results);
                }
                VectorMsg::Stats { reply } => {
                    let _ = reply.send(self.store.stats());
                }
                VectorMsg::Shutdown => break,
            }
        }
    }

    async fn handle_add(&mut self, cmd: SaveEmbeddingsCommand) {
        if cmd.embeddings.is_empty() {
            return;
        }

        let mut vectors = Vec::with_capacity(cmd.embeddings.len());
        let mut chunk_ids = Vec::with_capacity(cmd.embeddings.len());
        for embedding in cmd.embeddings {
            vectors.push(embedding.vector);
            chunk_ids.push(embedding.chunk_id);
        }

        if let Err(error) = self.store.add(vectors, chunk_ids, &cmd.document_id) {
            self.coordinator
                .tell(CoordinatorMsg::Error(ActorError::new(
                    &cmd.correlation_id,
                    ACTOR_NAME,
                    "VectorInsert",
                    error.to_string(),
                    false,
                    None,
                )))
                .await;
        }
    }

    fn handle_search(
        &self,
        correlation_id: &str,
        query: &[f32],
        top_k: usize,
        filter: Option<&HashSet<String>>,
    ) -> SearchResults {
        let start = std::time::Instant::now();
        let hits = self.store.search(query, top_k, filter).unwrap_or_default();
        let search_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        SearchResults {
            correlation_id: correlation_id.to_string(),
            timestamp: chrono::Utc::now(),
            results: hits
                .into_iter()
                .map(|hit| (hit.chunk_id, hit.similarity))
                .collect(),
            search_time_ms,
        }
    }
}
