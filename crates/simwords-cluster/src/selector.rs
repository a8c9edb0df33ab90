//! Cluster selection: pick the clusters most and least similar to a query.

use tracing::debug;

use simwords_core::error::{Result, SimWordsError};
use simwords_core::types::{Cluster, ScoredCluster};
use simwords_core::vector_ops::cosine_similarity;

/// The two ends of a cluster ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateClusters {
    /// Highest-scoring clusters, best first.
    pub top: Vec<ScoredCluster>,
    /// Lowest-scoring clusters, in descending score order.
    pub bottom: Vec<ScoredCluster>,
}

impl CandidateClusters {
    /// Resolve both ends against the slice that was scored.
    pub fn resolve<'a>(&self, clusters: &'a [Cluster]) -> (Vec<&'a Cluster>, Vec<&'a Cluster>) {
        let pick = |scored: &[ScoredCluster]| {
            scored
                .iter()
                .map(|s| &clusters[s.cluster_index])
                .collect::<Vec<_>>()
        };
        (pick(&self.top), pick(&self.bottom))
    }
}

/// Score every vector in `targets` against `query`, sorted by descending
/// score. Equal scores keep their input order.
pub fn score_clusters<T: AsRef<[f32]>>(query: &[f32], targets: &[T]) -> Vec<ScoredCluster> {
    let mut scores: Vec<ScoredCluster> = targets
        .iter()
        .enumerate()
        .map(|(cluster_index, t)| ScoredCluster {
            cluster_index,
            score: cosine_similarity(query, t.as_ref()),
        })
        .collect();
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scores
}

/// Take `top_k` entries from each end of a descending ranking.
///
/// `top_k == 0` is rejected; a `top_k` larger than the ranking is clamped to
/// its length. When `2 * top_k` exceeds the length the two sets overlap.
pub fn split_ends(ranked: Vec<ScoredCluster>, top_k: usize) -> Result<CandidateClusters> {
    if ranked.is_empty() {
        return Err(SimWordsError::Precondition("no clusters to select from".into()));
    }
    if top_k == 0 {
        return Err(SimWordsError::InvalidArgument("top_k must be at least 1".into()));
    }
    let k = if top_k > ranked.len() {
        debug!(top_k, clusters = ranked.len(), "clamping top_k to the cluster count");
        ranked.len()
    } else {
        top_k
    };

    let top = ranked[..k].to_vec();
    let bottom = ranked[ranked.len() - k..].to_vec();
    Ok(CandidateClusters { top, bottom })
}

/// Select the `top_k` clusters whose centers are most similar to `query`
/// and the `top_k` least similar.
pub fn select_candidate_clusters(
    query: &[f32],
    clusters: &[Cluster],
    top_k: usize,
) -> Result<CandidateClusters> {
    let centers: Vec<&[f32]> = clusters.iter().map(|c| c.center.as_slice()).collect();
    split_ends(score_clusters(query, &centers), top_k)
}
