//! # lex-vector
//!
//! In-memory exact-search vector store.
//!
//! The pipeline only needs an "add vectors / k-NN search" contract; a native
//! ANN index is deliberately not required. Search is a brute-force L2 scan
//! with similarity derived as `1 / (1 + distance)` — monotonic in distance
//! and bounded to `(0, 1]`. Document filtering happens after the scan
//! (over-fetching 2×) to keep the index itself untyped.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the vector store.
#[derive(Debug, Error)]
pub enum VectorError {
    /// A vector's length does not match the store dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// `vectors` and `chunk_ids` lengths differ in a batch add.
    #[error("Batch shape mismatch: {vectors} vectors, {chunk_ids} chunk ids")]
    BatchShape { vectors: usize, chunk_ids: usize },
}

/// One k-NN search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    /// `1 / (1 + L2 distance)`, in `(0, 1]`.
    pub similarity: f64,
}

/// Store snapshot for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorStats {
    pub total_vectors: usize,
    pub dimension: usize,
    pub document_count: usize,
    /// Rough estimate: vectors × dimension × 4 bytes.
    pub memory_bytes: usize,
}

#[derive(Debug, Clone)]
struct VectorEntry {
    chunk_id: String,
    document_id: String,
}

/// Exact-search vector index with chunk and document bookkeeping.
#[derive(Debug)]
pub struct VectorStore {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    entries: Vec<VectorEntry>,
    chunk_to_index: HashMap<String, usize>,
    document_chunks: HashMap<String, HashSet<String>>,
}

impl VectorStore {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            entries: Vec::new(),
            chunk_to_index: HashMap::new(),
            document_chunks: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index position of a chunk, when present.
    #[must_use]
    pub fn chunk_index(&self, chunk_id: &str) -> Option<usize> {
        self.chunk_to_index.get(chunk_id).copied()
    }

    /// Add a batch of vectors for one document.
    ///
    /// # Errors
    ///
    /// [`VectorError::BatchShape`] on length mismatch,
    /// [`VectorError::DimensionMismatch`] when any vector has the wrong
    /// length. Nothing is inserted on error.
    pub fn add(
        &mut self,
        vectors: Vec<Vec<f32>>,
        chunk_ids: Vec<String>,
        document_id: &str,
    ) -> Result<(), VectorError> {
        if vectors.len() != chunk_ids.len() {
            return Err(VectorError::BatchShape {
                vectors: vectors.len(),
                chunk_ids: chunk_ids.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        for (vector, chunk_id) in vectors.into_iter().zip(chunk_ids) {
            let index = self.entries.len();
            self.vectors.push(vector);
            self.entries.push(VectorEntry {
                chunk_id: chunk_id.clone(),
                document_id: document_id.to_string(),
            });
            self.chunk_to_index.insert(chunk_id.clone(), index);
            if !document_id.is_empty() {
                self.document_chunks
                    .entry(document_id.to_string())
                    .or_default()
                    .insert(chunk_id);
            }
        }
        Ok(())
    }

    /// k-NN search. Over-fetches `2 × top_k` before applying the optional
    /// document filter, then truncates.
    ///
    /// # Errors
    ///
    /// [`VectorError::DimensionMismatch`] when the query has the wrong
    /// length.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter_document_ids: Option<&HashSet<String>>,
    ) -> Result<Vec<SearchHit>, VectorError> {
        if query.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut distances: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, l2_distance(query, v)))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1));

        let fetch = (top_k * 2).min(distances.len());
        let mut hits = Vec::with_capacity(top_k);
        for &(index, distance) in &distances[..fetch] {
            let entry = &self.entries[index];
            if let Some(filter) = filter_document_ids
                && !filter.contains(&entry.document_id)
            {
                continue;
            }
            hits.push(SearchHit {
                chunk_id: entry.chunk_id.clone(),
                similarity: 1.0 / (1.0 + distance),
            });
            if hits.len() >= top_k {
                break;
            }
        }
        Ok(hits)
    }

    #[must_use]
    pub fn stats(&self) -> VectorStats {
        VectorStats {
            total_vectors: self.entries.len(),
            dimension: self.dimension,
            document_count: self.document_chunks.len(),
            memory_bytes: self.entries.len() * self.dimension * 4,
        }
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(x - y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
