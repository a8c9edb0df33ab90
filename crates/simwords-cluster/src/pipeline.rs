//! Clustering pipeline.
//!
//! Turns a vocabulary into persisted clusters:
//! 1. Embedding in fixed-size batches (optional, when starting from records)
//! 2. Saving words
//! 3. k-means over normalized embeddings
//! 4. Creating clusters and choosing anchor words
//! 5. Saving clusters and writing word-to-cluster assignments
//!
//! Any collaborator failure aborts the run; nothing is retried.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use simwords_core::config::ClusteringConfig;
use simwords_core::error::{Result, SimWordsError};
use simwords_core::types::{Cluster, ClusterAssignment, Vector, WordRecord, WordVector};
use simwords_core::vector_ops::cosine_similarity;

use crate::embedding::{expect_batch_len, EmbeddingService};
use crate::kmeans::KMeansEngine;
use crate::repository::VectorRepository;

/// Outcome of a clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringReport {
    /// Persisted clusters, in center order.
    pub clusters: Vec<Cluster>,
    /// Member count per cluster, parallel to `clusters`.
    pub cluster_sizes: Vec<usize>,
    pub iterations: usize,
    pub converged: bool,
    /// Words whose raw embedding had zero norm.
    pub degenerate_vectors: usize,
}

/// Embed `records` in sequential batches of `batch_size`.
///
/// The returned words carry cached normalized embeddings and no cluster.
pub async fn embed_records<E: EmbeddingService>(
    embedder: &E,
    records: &[WordRecord],
    batch_size: usize,
) -> Result<Vec<WordVector>> {
    if batch_size == 0 {
        return Err(SimWordsError::InvalidArgument("batch_size must be at least 1".into()));
    }
    let batches = records.len().div_ceil(batch_size);
    info!(records = records.len(), batches, "embedding vocabulary");

    let mut words = Vec::with_capacity(records.len());
    for (b, batch) in records.chunks(batch_size).enumerate() {
        let start = b * batch_size;
        let context = format!("embed batch {} ({}..{})", b, start, start + batch.len());
        let texts: Vec<String> = batch.iter().map(|r| r.word.clone()).collect();

        let vectors = embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| e.within(&context))?;
        expect_batch_len(&context, texts.len(), &vectors)?;

        words.extend(
            batch
                .iter()
                .zip(vectors)
                .map(|(r, v)| WordVector::new(r.word.clone(), r.frequency, v)),
        );
    }
    Ok(words)
}

/// Pick, for each center, the member word most similar to it.
///
/// Clusters without members get no anchor.
pub fn anchor_words(
    words: &[WordVector],
    centers: &[Vector],
    assignments: &[usize],
) -> Vec<Option<String>> {
    let mut best: Vec<Option<(usize, f64)>> = vec![None; centers.len()];
    for (i, (word, &c)) in words.iter().zip(assignments).enumerate() {
        let score = cosine_similarity(&word.normalized_embedding, &centers[c]);
        match best[c] {
            Some((_, s)) if s >= score => {}
            _ => best[c] = Some((i, score)),
        }
    }
    best.into_iter()
        .map(|b| b.map(|(i, _)| words[i].word.clone()))
        .collect()
}

/// Clusters a vocabulary and persists the result.
pub struct ClusteringPipeline<R: VectorRepository> {
    repository: Arc<R>,
    engine: KMeansEngine,
    k: usize,
}

impl<R: VectorRepository> ClusteringPipeline<R> {
    pub fn new(repository: Arc<R>, engine: KMeansEngine, k: usize) -> Self {
        Self {
            repository,
            engine,
            k,
        }
    }

    pub fn from_config(repository: Arc<R>, config: &ClusteringConfig) -> Self {
        Self::new(repository, KMeansEngine::from_config(config), config.k)
    }

    /// Embed `records`, then cluster them.
    pub async fn load<E: EmbeddingService>(
        &self,
        embedder: &E,
        records: &[WordRecord],
        batch_size: usize,
    ) -> Result<ClusteringReport> {
        let words = embed_records(embedder, records, batch_size).await?;
        info!(words = words.len(), "vocabulary embedded");
        self.run(words)
    }

    /// Save `words`, cluster them, and persist clusters and assignments.
    pub fn run(&self, words: Vec<WordVector>) -> Result<ClusteringReport> {
        if words.is_empty() {
            return Err(SimWordsError::Precondition("cannot cluster an empty vocabulary".into()));
        }

        let degenerate_vectors = words.iter().filter(|w| w.is_degenerate()).count();
        if degenerate_vectors > 0 {
            warn!(
                degenerate_vectors,
                "zero-norm embeddings found; they score 0 against every query"
            );
        }

        self.engine.check(&words, self.k)?;
        self.repository.save_words(&words)?;
        info!(words = words.len(), "words saved");

        let output = self.engine.fit(&words, self.k)?;
        let cluster_sizes = output.cluster_sizes();

        let anchors = anchor_words(&words, &output.centers, &output.assignments);
        let clusters: Vec<Cluster> = output
            .centers
            .into_iter()
            .zip(anchors)
            .map(|(center, anchor)| {
                let cluster = Cluster::new(center);
                match anchor {
                    Some(word) => cluster.with_anchor(word),
                    None => cluster,
                }
            })
            .collect();

        self.repository.save_clusters(&clusters)?;
        info!(clusters = clusters.len(), "clusters saved");

        let assignments: Vec<ClusterAssignment> = words
            .iter()
            .zip(&output.assignments)
            .map(|(w, &c)| ClusterAssignment {
                word_id: w.id,
                cluster_id: clusters[c].id,
            })
            .collect();
        self.repository.update_cluster_assignments(&assignments)?;
        info!(words = assignments.len(), "cluster assignments updated");

        Ok(ClusteringReport {
            clusters,
            cluster_sizes,
            iterations: output.iterations,
            converged: output.converged,
            degenerate_vectors,
        })
    }
}
