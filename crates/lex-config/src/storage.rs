//! Storage configuration: local directories, remote store, write mode.

use serde::{Deserialize, Serialize};

/// Where document writes land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// JSON files under the storage root only.
    #[default]
    Local,
    /// Remote tabular store only (still falls back to local on failure).
    Remote,
    /// Write both; remote failures degrade to warnings.
    Dual,
}

fn default_storage_dir() -> String {
    "scjn_data".to_string()
}

fn default_checkpoint_dir() -> String {
    "checkpoints".to_string()
}

/// Storage roots and the remote store connection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub mode: StorageMode,

    /// Root for `documents/` and `embeddings/` subdirectories.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,

    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,

    /// Remote libsql database URL. Required for `remote`/`dual` modes.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Remote auth token; usually injected via `LEXMEX_STORAGE__REMOTE_TOKEN`.
    #[serde(default)]
    pub remote_token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::default(),
            storage_dir: default_storage_dir(),
            checkpoint_dir: default_checkpoint_dir(),
            remote_url: None,
            remote_token: None,
        }
    }
}
