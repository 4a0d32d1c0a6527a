//! Durable checkpoint storage: one JSON file per session.
//!
//! Files live under the checkpoint directory as `{session_id}.json` with a
//! stable, additive-only schema: `session_id`, `last_processed_q_param`,
//! `processed_count`, `failed_q_params`, `created_at`. Startup scans the
//! directory and indexes every valid file; corrupted files (malformed JSON,
//! missing `session_id`) are skipped silently. A per-store lock serializes
//! writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use lex_core::entities::Checkpoint;

use crate::error::StoreError;

/// Filesystem-backed checkpoint store with an in-memory cache.
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    cache: Mutex<HashMap<String, Checkpoint>>,
}

impl CheckpointStore {
    /// Open (and create) the checkpoint directory, indexing valid files.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when the directory cannot be created or listed.
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(dir).await?;

        let mut cache = HashMap::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(checkpoint) = read_checkpoint(&path).await {
                cache.insert(checkpoint.session_id.clone(), checkpoint);
            }
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            cache: Mutex::new(cache),
        })
    }

    /// Persist a checkpoint, superseding any previous one for the session.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] / [`StoreError::Json`] on write failure.
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().await;
        let json = serde_json::to_string_pretty(checkpoint)?;
        let path = self.path_for(&checkpoint.session_id);
        tokio::fs::write(&path, json).await?;
        cache.insert(checkpoint.session_id.clone(), checkpoint.clone());
        Ok(())
    }

    /// Most recent checkpoint for a session, if any.
    pub async fn load(&self, session_id: &str) -> Option<Checkpoint> {
        self.cache.lock().await.get(session_id).cloned()
    }

    /// All known session IDs, unordered.
    pub async fn list(&self) -> Vec<String> {
        self.cache.lock().await.keys().cloned().collect()
    }

    /// Remove a session's checkpoint from disk and cache.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when the file exists but cannot be removed.
    pub async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.lock().await;
        cache.remove(session_id);
        let path = self.path_for(session_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }
}

async fn read_checkpoint(path: &Path) -> Option<Checkpoint> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    let checkpoint: Checkpoint = serde_json::from_str(&content).ok()?;
    if checkpoint.session_id.is_empty() {
        return None;
    }
    Some(checkpoint)
}
