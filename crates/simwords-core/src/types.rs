use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::vector_ops;

/// A dense embedding. All vectors in one run share the same dimension.
pub type Vector = Vec<f32>;

// =============================================================================
// Words
// =============================================================================

/// A word and its corpus frequency, before embedding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    pub word: String,
    pub frequency: u64,
}

impl WordRecord {
    pub fn new(word: impl Into<String>, frequency: u64) -> Self {
        Self {
            word: word.into(),
            frequency,
        }
    }
}

/// An embedded word.
///
/// `normalized_embedding` is computed once from `raw_embedding` at
/// construction. A zero raw embedding normalizes to itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WordVector {
    pub id: Uuid,
    pub word: String,
    pub frequency: u64,
    pub raw_embedding: Vector,
    pub normalized_embedding: Vector,
    /// Set exactly once, after clustering converges.
    pub cluster_id: Option<Uuid>,
}

impl WordVector {
    pub fn new(word: impl Into<String>, frequency: u64, raw_embedding: Vector) -> Self {
        let normalized_embedding = vector_ops::l2_normalize(&raw_embedding);
        Self {
            id: Uuid::new_v4(),
            word: word.into(),
            frequency,
            raw_embedding,
            normalized_embedding,
            cluster_id: None,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.normalized_embedding.len()
    }

    /// Whether the raw embedding had zero norm, so the cached normalized
    /// embedding is not a unit vector.
    pub fn is_degenerate(&self) -> bool {
        vector_ops::is_zero(&self.raw_embedding)
    }
}

impl AsRef<[f32]> for WordVector {
    fn as_ref(&self) -> &[f32] {
        &self.normalized_embedding
    }
}

// =============================================================================
// Clusters
// =============================================================================

/// A k-means cluster. Its center never changes after creation; re-clustering
/// produces new `Cluster` values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: Uuid,
    pub center: Vector,
    /// Representative member word, used for template substitution.
    pub anchor_word: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Cluster {
    pub fn new(center: Vector) -> Self {
        Self {
            id: Uuid::new_v4(),
            center,
            anchor_word: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_anchor(mut self, anchor_word: impl Into<String>) -> Self {
        self.anchor_word = Some(anchor_word.into());
        self
    }
}

/// A word-to-cluster link written back after clustering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub word_id: Uuid,
    pub cluster_id: Uuid,
}

/// Transient score of one cluster against a query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredCluster {
    /// Index into the cluster slice that was scored.
    pub cluster_index: usize,
    pub score: f64,
}

// =============================================================================
// Query results
// =============================================================================

/// One ranked word returned from a query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub word: String,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub similarity: f64,
    pub frequency: u64,
}
