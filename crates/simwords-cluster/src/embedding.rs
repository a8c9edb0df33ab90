//! Embedding provider interface and a deterministic mock.
//!
//! - `EmbeddingService` is the batch text-to-vector collaborator. Production
//!   providers (e.g. an HTTP batch endpoint) live outside this crate.
//! - `MockEmbedding` provides deterministic hash-based vectors for testing,
//!   with optional fixed vectors for specific texts.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use simwords_core::error::{Result, SimWordsError};
use simwords_core::types::Vector;

/// Service for generating text embeddings in batches.
///
/// Implementations return exactly one vector per input text, in input order.
/// Failures surface as `SimWordsError::Embedding`; there is no retry.
pub trait EmbeddingService: Send + Sync {
    /// Embed every text in `texts` with a single provider call.
    fn embed_batch(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vector>>> + Send;

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Embed a single text through a batch call.
pub async fn embed_one<E: EmbeddingService>(embedder: &E, text: &str) -> Result<Vector> {
    let mut vectors = embedder.embed_batch(&[text.to_string()]).await?;
    match vectors.pop() {
        Some(v) if vectors.is_empty() => Ok(v),
        _ => Err(SimWordsError::embedding(
            "embed single text",
            "provider did not return exactly one vector",
        )),
    }
}

/// Check a provider response has one vector per input.
pub fn expect_batch_len(context: &str, expected: usize, vectors: &[Vector]) -> Result<()> {
    if vectors.len() != expected {
        return Err(SimWordsError::embedding(
            context,
            format!("expected {} vectors, provider returned {}", expected, vectors.len()),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hash-based vectors for testing
// ---------------------------------------------------------------------------

/// Mock embedding service returning deterministic unit vectors.
///
/// The output is derived from a hash of the input text, so identical inputs
/// always produce identical outputs. Specific texts can be pinned to fixed
/// vectors with [`MockEmbedding::with_vector`].
#[derive(Debug, Default)]
pub struct MockEmbedding {
    dimensions: usize,
    fixed: HashMap<String, Vector>,
    calls: AtomicUsize,
}

impl MockEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            fixed: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always return `vector` for `text`.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vector) -> Self {
        self.fixed.insert(text.into(), vector);
        self
    }

    /// Number of `embed_batch` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    fn hash_to_vector(&self, text: &str) -> Vector {
        let mut result = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            result.push(val as f32);
        }

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }
        result
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        texts
            .iter()
            .map(|text| {
                if text.is_empty() {
                    return Err(SimWordsError::embedding(
                        "mock embedding",
                        "cannot embed empty text",
                    ));
                }
                Ok(self
                    .fixed
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| self.hash_to_vector(text)))
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
