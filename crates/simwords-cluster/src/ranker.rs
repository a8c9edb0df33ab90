//! Candidate ranking inside selected clusters.
//!
//! Members are scored by cosine similarity to the query, the best
//! `limit_per_cluster` are kept per cluster, and all kept candidates are
//! merged into one list sorted by descending similarity.

use tracing::debug;

use simwords_core::error::Result;
use simwords_core::types::{Cluster, SearchResult, WordVector};
use simwords_core::vector_ops::{check_dimensions, cosine_similarity};

/// Similarities this close to 1.0 are treated as the query word itself.
pub const SELF_MATCH_EPSILON: f64 = 1e-6;

/// Per-cluster emission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankPolicy {
    pub limit_per_cluster: usize,
    pub include_self: bool,
}

impl RankPolicy {
    pub fn new(limit_per_cluster: usize, include_self: bool) -> Self {
        Self {
            limit_per_cluster,
            include_self,
        }
    }
}

pub fn is_self_match(similarity: f64) -> bool {
    (similarity - 1.0).abs() < SELF_MATCH_EPSILON
}

/// Rank one cluster's members against `query`.
///
/// Each member is paired with the vector it is scored by (its normalized
/// embedding, or a template re-embedding). Self matches are skipped
/// without counting toward the limit when `include_self` is false.
///
/// A member vector whose length differs from the query's is an error.
pub fn rank_members<'a, I>(
    query: &[f32],
    members: I,
    policy: RankPolicy,
) -> Result<Vec<SearchResult>>
where
    I: IntoIterator<Item = (&'a WordVector, &'a [f32])>,
{
    let mut scored: Vec<(&WordVector, f64)> = members
        .into_iter()
        .map(|(word, vector)| -> Result<(&'a WordVector, f64)> {
            check_dimensions(query.len(), vector.len())?;
            Ok((word, cosine_similarity(query, vector)))
        })
        .collect::<Result<_>>()?;
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut results = Vec::with_capacity(policy.limit_per_cluster.min(scored.len()));
    for (word, similarity) in scored {
        if results.len() >= policy.limit_per_cluster {
            break;
        }
        if !policy.include_self && is_self_match(similarity) {
            continue;
        }
        results.push(SearchResult {
            word: word.word.clone(),
            similarity,
            frequency: word.frequency,
        });
    }
    Ok(results)
}

/// Rank the members of every cluster in `clusters` and merge the results.
///
/// `words_of` fetches a cluster's members; its first error aborts the pass.
pub fn rank_within_clusters<F>(
    query: &[f32],
    clusters: &[&Cluster],
    policy: RankPolicy,
    mut words_of: F,
) -> Result<Vec<SearchResult>>
where
    F: FnMut(&Cluster) -> Result<Vec<WordVector>>,
{
    let mut results = Vec::new();
    for cluster in clusters {
        let words = words_of(cluster)?;
        debug!(
            cluster = %cluster.id,
            anchor = cluster.anchor_word.as_deref().unwrap_or(""),
            members = words.len(),
            "ranking cluster members"
        );
        results.extend(rank_members(
            query,
            words
                .iter()
                .map(|w| (w, w.normalized_embedding.as_slice())),
            policy,
        )?);
    }
    Ok(merge_results([results]))
}

/// Concatenate result runs and sort by descending similarity.
///
/// Words found by more than one run are kept as separate entries.
pub fn merge_results<I>(runs: I) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Vec<SearchResult>>,
{
    let mut merged: Vec<SearchResult> = runs.into_iter().flatten().collect();
    merged.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged
}
