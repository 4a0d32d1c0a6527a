//! # lex-store
//!
//! Document persistence and checkpoint storage for Lexmex.
//!
//! [`DocumentStore`] fronts two backends selected by [`StorageMode`]: a
//! local JSON directory ([`local::LocalDocumentStore`]) and a remote libsql
//! database ([`remote::RemoteDocumentStore`]). The local directory is the
//! durable base in every mode — a remote failure degrades to a warning and
//! never fails a save. [`checkpoints::CheckpointStore`] persists session
//! progress snapshots.

pub mod checkpoints;
pub mod error;
pub mod local;
pub mod remote;

use std::path::Path;

use lex_config::{StorageConfig, StorageMode};
use lex_core::entities::{ChunkEmbedding, Document, TextChunk};
use lex_core::enums::EmbeddingStatus;

pub use checkpoints::CheckpointStore;
pub use error::StoreError;
pub use local::LocalDocumentStore;
pub use remote::RemoteDocumentStore;

/// Mode-dispatching document store. Saves are idempotent by `q_param` and
/// never fail the pipeline when the local write succeeds.
#[derive(Debug)]
pub struct DocumentStore {
    local: LocalDocumentStore,
    remote: Option<RemoteDocumentStore>,
    mode: StorageMode,
}

impl DocumentStore {
    /// Open stores per configuration. In `remote`/`dual` modes a missing or
    /// unreachable remote degrades to local-only with a warning.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when the local layout cannot be created.
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let local = LocalDocumentStore::open(Path::new(&config.storage_dir)).await?;

        let remote = if config.mode == StorageMode::Local {
            None
        } else {
            match connect_remote(config).await {
                Ok(store) => Some(store),
                Err(error) => {
                    tracing::warn!(%error, "remote store unavailable, continuing local-only");
                    None
                }
            }
        };

        Ok(Self {
            local,
            remote,
            mode: config.mode,
        })
    }

    /// Local-only store rooted at `root` (tests and default runs).
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when the local layout cannot be created.
    pub async fn open_local(root: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            local: LocalDocumentStore::open(root).await?,
            remote: None,
            mode: StorageMode::Local,
        })
    }

    /// Upsert a document. The remote write (when enabled) is best-effort;
    /// the local write is authoritative and its failure is the only way
    /// this returns an error.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] / [`StoreError::Json`] from the local write.
    pub async fn save(&self, document: &Document) -> Result<(), StoreError> {
        if let Some(remote) = &self.remote
            && let Err(error) = remote.upsert_document(document).await
        {
            tracing::warn!(q_param = %document.q_param, %error, "remote save failed, local write stands");
        }
        self.local.save(document).await
    }

    /// Existence by `q_param`. Consults the remote store when enabled,
    /// falling back to the local index on remote failure.
    pub async fn exists(&self, q_param: &str) -> bool {
        if self.mode != StorageMode::Local
            && let Some(remote) = &self.remote
        {
            match remote.exists(q_param).await {
                Ok(found) => return found || self.local.exists(q_param).await,
                Err(error) => {
                    tracing::warn!(%error, "remote existence check failed, using local index");
                }
            }
        }
        self.local.exists(q_param).await
    }

    /// Load by `q_param` from the local store.
    ///
    /// # Errors
    ///
    /// [`StoreError::Json`] when the indexed file does not parse.
    pub async fn find_by_q_param(&self, q_param: &str) -> Result<Option<Document>, StoreError> {
        self.local.find_by_q_param(q_param).await
    }

    /// All locally indexed document IDs.
    pub async fn list_ids(&self) -> Vec<String> {
        self.local.list_ids().await
    }

    /// Batched chunk upsert (remote concern; no-op without a remote).
    pub async fn save_chunks(&self, document_id: &str, chunks: &[TextChunk]) {
        if let Some(remote) = &self.remote
            && let Err(error) = remote.upsert_chunks(document_id, chunks).await
        {
            tracing::warn!(document_id, %error, "remote chunk upsert failed");
        }
    }

    /// Persist embeddings locally and advance the remote status column.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] / [`StoreError::Json`] from the local write.
    pub async fn save_embeddings(
        &self,
        document_id: &str,
        embeddings: &[ChunkEmbedding],
    ) -> Result<(), StoreError> {
        self.local.save_embeddings(document_id, embeddings).await?;
        if let Some(remote) = &self.remote
            && let Err(error) = remote
                .set_embedding_status(document_id, EmbeddingStatus::Completed)
                .await
        {
            tracing::warn!(document_id, %error, "remote embedding status update failed");
        }
        Ok(())
    }
}

async fn connect_remote(config: &StorageConfig) -> Result<RemoteDocumentStore, StoreError> {
    let url = config.remote_url.as_deref().ok_or_else(|| {
        StoreError::NotConfigured("storage.remote_url is required for remote/dual modes".into())
    })?;
    let token = config.remote_token.as_deref().unwrap_or_default();
    RemoteDocumentStore::connect(url, token).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_mode_saves_and_checks_existence() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open_local(dir.path()).await.unwrap();

        let doc = Document::new("AbC==", "LEY DE AMPARO");
        store.save(&doc).await.unwrap();
        assert!(store.exists("AbC==").await);

        let found = store.find_by_q_param("AbC==").await.unwrap().unwrap();
        assert_eq!(found.id, doc.id);
    }

    #[tokio::test]
    async fn chunk_saves_are_noop_without_remote() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open_local(dir.path()).await.unwrap();
        store.save_chunks("d1", &[]).await;
    }

    #[tokio::test]
    async fn remote_mode_without_url_degrades_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            mode: StorageMode::Dual,
            storage_dir: dir.path().to_string_lossy().into_owned(),
            checkpoint_dir: "checkpoints".into(),
            remote_url: None,
            remote_token: None,
        };
        let store = DocumentStore::open(&config).await.unwrap();
        let doc = Document::new("AbC==", "LEY MINERA");
        store.save(&doc).await.unwrap();
        assert!(store.exists("AbC==").await);
    }
}
