//! Local document storage: one JSON file per document.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/documents/{document_id}.json
//! <root>/embeddings/{document_id}.json
//! ```
//!
//! The JSON shape is stable: enums as canonical uppercase strings, dates as
//! ISO-8601, missing optionals as explicit `null`, articles and reforms as
//! nested arrays. On startup the store rehydrates a `q_param → document_id`
//! index from the documents directory so existence checks survive restarts;
//! unreadable files are skipped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use lex_core::entities::{ChunkEmbedding, Document};

use crate::error::StoreError;

/// Filesystem-backed document store with an in-memory `q_param` index.
#[derive(Debug)]
pub struct LocalDocumentStore {
    documents_dir: PathBuf,
    embeddings_dir: PathBuf,
    /// `q_param → document_id`. The lock also serializes writes so the
    /// directory and index stay consistent.
    index: Mutex<HashMap<String, String>>,
}

impl LocalDocumentStore {
    /// Open (and create) the storage layout under `root`, rehydrating the
    /// index from existing document files.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when the directories cannot be created or listed.
    pub async fn open(root: &Path) -> Result<Self, StoreError> {
        let documents_dir = root.join("documents");
        let embeddings_dir = root.join("embeddings");
        tokio::fs::create_dir_all(&documents_dir).await?;
        tokio::fs::create_dir_all(&embeddings_dir).await?;

        let mut index = HashMap::new();
        let mut entries = tokio::fs::read_dir(&documents_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_document(&path).await {
                Ok(document) => {
                    index.insert(document.q_param, document.id);
                }
                Err(error) => {
                    tracing::debug!(path = %path.display(), %error, "skipping unreadable document file");
                }
            }
        }

        Ok(Self {
            documents_dir,
            embeddings_dir,
            index: Mutex::new(index),
        })
    }

    /// Upsert a document. Re-saving a `q_param` replaces the prior record;
    /// a superseded file under a different document ID is removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] / [`StoreError::Json`] on write failure.
    pub async fn save(&self, document: &Document) -> Result<(), StoreError> {
        let mut index = self.index.lock().await;

        if let Some(previous_id) = index.get(&document.q_param)
            && previous_id != &document.id
        {
            let stale = self.documents_dir.join(format!("{previous_id}.json"));
            if let Err(error) = tokio::fs::remove_file(&stale).await {
                tracing::debug!(path = %stale.display(), %error, "stale document file not removed");
            }
        }

        let json = serde_json::to_string_pretty(document)?;
        let path = self.documents_dir.join(format!("{}.json", document.id));
        tokio::fs::write(&path, json).await?;

        index.insert(document.q_param.clone(), document.id.clone());
        Ok(())
    }

    /// Whether a document with this `q_param` has been saved.
    pub async fn exists(&self, q_param: &str) -> bool {
        self.index.lock().await.contains_key(q_param)
    }

    /// Load a document by its ID. Missing file yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Json`] when the file exists but does not parse.
    pub async fn load(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        let path = self.documents_dir.join(format!("{document_id}.json"));
        if !path.exists() {
            return Ok(None);
        }
        read_document(&path).await.map(Some)
    }

    /// Load a document by its upstream `q_param`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Json`] when the indexed file does not parse.
    pub async fn find_by_q_param(&self, q_param: &str) -> Result<Option<Document>, StoreError> {
        let id = { self.index.lock().await.get(q_param).cloned() };
        match id {
            Some(id) => self.load(&id).await,
            None => Ok(None),
        }
    }

    /// All indexed document IDs, unordered.
    pub async fn list_ids(&self) -> Vec<String> {
        self.index.lock().await.values().cloned().collect()
    }

    /// Persist a document's embeddings. The on-disk format is JSON but not
    /// part of the store contract.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] / [`StoreError::Json`] on write failure.
    pub async fn save_embeddings(
        &self,
        document_id: &str,
        embeddings: &[ChunkEmbedding],
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(embeddings)?;
        let path = self.embeddings_dir.join(format!("{document_id}.json"));
        tokio::fs::write(&path, json).await?;
        Ok(())
    }
}

async fn read_document(path: &Path) -> Result<Document, StoreError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}
