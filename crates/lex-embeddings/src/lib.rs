//! # lex-embeddings
//!
//! Local embedding generation for Lexmex using fastembed (ONNX runtime).
//!
//! Generates 384-dimensional vectors for chunk text without any external API
//! keys. fastembed is synchronous — the ONNX runtime parallelizes
//! internally — so encoding runs under `tokio::task::spawn_blocking`.
//!
//! When the model cannot be loaded (offline machine, missing cache), the
//! engine substitutes a deterministic hash-based embedder of the same
//! dimension so the pipeline stays functional and testable. The active
//! backend is visible through [`EmbeddingEngine::model_name`].

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};

mod error;

pub use error::EmbedError;

/// Vector width of both backends.
pub const EMBEDDING_DIMENSION: usize = 384;

const FASTEMBED_MODEL_NAME: &str = "sentence-transformers/all-MiniLM-L6-v2";
const FALLBACK_MODEL_NAME: &str = "deterministic-hash-384";

/// Engine construction options.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Model cache directory; defaults to `~/.lexmex/cache/fastembed/`.
    pub cache_dir: Option<PathBuf>,
    /// Skip fastembed entirely and use the hash fallback (tests, offline CI).
    pub prefer_fallback: bool,
}

enum Backend {
    FastEmbed(Mutex<TextEmbedding>),
    Hash,
}

/// Text → vector engine shared by the embedder worker.
#[derive(Clone)]
pub struct EmbeddingEngine {
    backend: Arc<Backend>,
}

impl std::fmt::Debug for EmbeddingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingEngine")
            .field("model", &self.model_name())
            .finish()
    }
}

impl EmbeddingEngine {
    /// Build the engine, loading the fastembed model once. Falls back to the
    /// deterministic hash embedder when the model is unavailable.
    #[must_use]
    pub fn new(options: &EngineOptions) -> Self {
        if options.prefer_fallback {
            return Self {
                backend: Arc::new(Backend::Hash),
            };
        }

        let cache_dir = options.cache_dir.clone().unwrap_or_else(default_cache_dir);
        let init = TextInitOptions::new(EmbeddingModel::AllMiniLML6V2)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(false);

        match TextEmbedding::try_new(init) {
            Ok(model) => Self {
                backend: Arc::new(Backend::FastEmbed(Mutex::new(model))),
            },
            Err(error) => {
                tracing::warn!(%error, "embedding model unavailable, using hash fallback");
                Self {
                    backend: Arc::new(Backend::Hash),
                }
            }
        }
    }

    /// Name of the active backend model.
    #[must_use]
    pub fn model_name(&self) -> &'static str {
        match *self.backend {
            Backend::FastEmbed(_) => FASTEMBED_MODEL_NAME,
            Backend::Hash => FALLBACK_MODEL_NAME,
        }
    }

    /// Encode a batch off the cooperative scheduler. Empty input yields an
    /// empty output without error.
    ///
    /// # Errors
    ///
    /// [`EmbedError::Encode`] when the model rejects the batch,
    /// [`EmbedError::Task`] when the blocking task fails.
    pub async fn encode(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || encode_blocking(&backend, &texts))
            .await
            .map_err(|e| EmbedError::Task(e.to_string()))?
    }

    /// Synchronous encode for callers already off the scheduler.
    ///
    /// # Errors
    ///
    /// [`EmbedError::Encode`] when the model rejects the batch.
    pub fn encode_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        encode_blocking(&self.backend, texts)
    }
}

fn encode_blocking(backend: &Backend, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    match backend {
        Backend::FastEmbed(model) => {
            let mut model = model
                .lock()
                .map_err(|_| EmbedError::Encode("model mutex poisoned".into()))?;
            model
                .embed(texts.to_vec(), None)
                .map_err(|e| EmbedError::Encode(e.to_string()))
        }
        Backend::Hash => Ok(texts.iter().map(|t| hash_embedding(t)).collect()),
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lexmex")
        .join("cache")
        .join("fastembed")
}

/// Deterministic pseudo-embedding: FNV-1a seed, LCG-filled vector,
/// L2-normalized. Same text always yields the same vector.
fn hash_embedding(text: &str) -> Vec<f32> {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut state = FNV_OFFSET;
    for byte in text.as_bytes() {
        state ^= u64::from(*byte);
        state = state.wrapping_mul(FNV_PRIME);
    }

    let mut vector = Vec::with_capacity(EMBEDDING_DIMENSION);
    for _ in 0..EMBEDDING_DIMENSION {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        #[allow(clippy::cast_precision_loss)]
        let value = ((state >> 33) as f32 / (u32::MAX >> 1) as f32) - 1.0;
        vector.push(value);
    }

    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fallback_engine() -> EmbeddingEngine {
        EmbeddingEngine::new(&EngineOptions {
            cache_dir: None,
            prefer_fallback: true,
        })
    }

    #[test]
    fn fallback_reports_its_model_name() {
        assert_eq!(fallback_engine().model_name(), FALLBACK_MODEL_NAME);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let engine = fallback_engine();
        assert_eq!(engine.encode(Vec::new()).await.unwrap(), Vec::<Vec<f32>>::new());
    }

    #[tokio::test]
    async fn vectors_have_fixed_dimension() {
        let engine = fallback_engine();
        let vectors = engine
            .encode(vec!["Artículo 1".into(), "Artículo 2".into()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        for v in &vectors {
            assert_eq!(v.len(), EMBEDDING_DIMENSION);
        }
    }

    #[tokio::test]
    async fn fallback_is_deterministic() {
        let engine = fallback_engine();
        let a = engine.encode(vec!["texto jurídico".into()]).await.unwrap();
        let b = engine.encode(vec!["texto jurídico".into()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_texts_produce_distinct_vectors() {
        let a = hash_embedding("ley federal");
        let b = hash_embedding("ley general");
        assert_ne!(a, b);
    }

    #[test]
    fn hash_vectors_are_normalized() {
        let v = hash_embedding("norma");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm = {norm}");
    }
}
