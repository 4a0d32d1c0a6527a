//! Chunking and embedding configuration.

use serde::{Deserialize, Serialize};

const fn default_chunk_max_tokens() -> usize {
    512
}

const fn default_chunk_overlap_tokens() -> usize {
    50
}

const fn default_chunk_min_tokens() -> usize {
    100
}

const fn default_respect_boundaries() -> bool {
    true
}

const fn default_embedding_dimension() -> usize {
    384
}

/// Chunker sizing. Token counts are estimates (words × 1.3), so a chunk may
/// exceed `chunk_max_tokens` slightly when a boundary is preserved.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_max_tokens")]
    pub chunk_max_tokens: usize,

    #[serde(default = "default_chunk_overlap_tokens")]
    pub chunk_overlap_tokens: usize,

    #[serde(default = "default_chunk_min_tokens")]
    pub chunk_min_tokens: usize,

    /// Prefer article/paragraph/sentence boundaries over hard splits.
    #[serde(default = "default_respect_boundaries")]
    pub respect_boundaries: bool,

    /// Vector length the embedder must produce and the store must enforce.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_max_tokens: default_chunk_max_tokens(),
            chunk_overlap_tokens: default_chunk_overlap_tokens(),
            chunk_min_tokens: default_chunk_min_tokens(),
            respect_boundaries: default_respect_boundaries(),
            embedding_dimension: default_embedding_dimension(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = ChunkingConfig::default();
        assert_eq!(config.chunk_max_tokens, 512);
        assert_eq!(config.chunk_overlap_tokens, 50);
        assert_eq!(config.chunk_min_tokens, 100);
        assert!(config.respect_boundaries);
        assert_eq!(config.embedding_dimension, 384);
    }
}
