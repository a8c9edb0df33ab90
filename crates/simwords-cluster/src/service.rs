//! Query service for similar and opposite words.
//!
//! `SimilarityService` is built once at startup from an embedding provider,
//! a repository, and the persisted clusters, then shared by reference across
//! requests. It holds no mutable state; each query runs independently.

use std::sync::Arc;

use tracing::{debug, info, warn};

use simwords_core::config::QueryConfig;
use simwords_core::error::{Result, SimWordsError};
use simwords_core::request::QueryRequest;
use simwords_core::types::{Cluster, SearchResult};
use simwords_core::vector_ops::{check_dimensions, is_zero};

use crate::embedding::{embed_one, EmbeddingService};
use crate::ranker::{merge_results, rank_members, rank_within_clusters, RankPolicy};
use crate::repository::VectorRepository;
use crate::selector::{score_clusters, select_candidate_clusters, split_ends};
use crate::template::TemplateReembedder;

/// Cluster-narrowed similarity search.
pub struct SimilarityService<E: EmbeddingService, R: VectorRepository> {
    embedder: E,
    repository: Arc<R>,
    clusters: Arc<[Cluster]>,
    config: QueryConfig,
}

impl<E: EmbeddingService, R: VectorRepository> SimilarityService<E, R> {
    /// Build the service with clusters read from `repository`.
    pub fn load(embedder: E, repository: Arc<R>, config: QueryConfig) -> Result<Self> {
        let clusters = repository.clusters()?;
        info!(clusters = clusters.len(), "clusters loaded");
        Ok(Self::with_clusters(embedder, repository, clusters, config))
    }

    /// Build the service from an explicit cluster set.
    pub fn with_clusters(
        embedder: E,
        repository: Arc<R>,
        clusters: Vec<Cluster>,
        config: QueryConfig,
    ) -> Self {
        Self {
            embedder,
            repository,
            clusters: clusters.into(),
            config,
        }
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Answer a validated request, embedding the query text first.
    pub async fn handle(&self, request: &QueryRequest) -> Result<Vec<SearchResult>> {
        request.validate()?;
        match request.template.as_deref() {
            Some(template) => {
                self.query_with_template(
                    &request.query,
                    template,
                    request.top_k,
                    request.limit_per_cluster,
                    request.include_self,
                )
                .await
            }
            None => {
                let vector = embed_one(&self.embedder, &request.query)
                    .await
                    .map_err(|e| e.within("embed query"))?;
                self.query(
                    &vector,
                    request.top_k,
                    request.limit_per_cluster,
                    request.include_self,
                )
            }
        }
    }

    /// Rank words from the `top_k` most and `top_k` least similar clusters.
    ///
    /// Results from both passes are merged and sorted by descending
    /// similarity. A word reachable from both passes appears twice.
    pub fn query(
        &self,
        query: &[f32],
        top_k: usize,
        limit_per_cluster: usize,
        include_self: bool,
    ) -> Result<Vec<SearchResult>> {
        let policy = rank_policy(limit_per_cluster, include_self)?;
        for cluster in self.clusters.iter() {
            check_dimensions(cluster.center.len(), query.len())?;
        }
        warn_if_degenerate(query);
        info!(top_k, limit_per_cluster, include_self, "query");

        let selected = select_candidate_clusters(query, &self.clusters, top_k)?;
        let (top, bottom) = selected.resolve(&self.clusters);

        let top_results = rank_within_clusters(query, &top, policy, |c| {
            self.repository.words_by_cluster(c.id)
        })
        .map_err(|e| e.within("top clusters"))?;
        let bottom_results = rank_within_clusters(query, &bottom, policy, |c| {
            self.repository.words_by_cluster(c.id)
        })
        .map_err(|e| e.within("bottom clusters"))?;

        Ok(merge_results([top_results, bottom_results]))
    }

    /// Like [`query`](Self::query), but every word is embedded inside
    /// `template` first.
    ///
    /// Cluster selection scores the templated query against templated anchor
    /// words. Each selected cluster costs one extra embedding call for its
    /// members.
    pub async fn query_with_template(
        &self,
        query_text: &str,
        template: &str,
        top_k: usize,
        limit_per_cluster: usize,
        include_self: bool,
    ) -> Result<Vec<SearchResult>> {
        let policy = rank_policy(limit_per_cluster, include_self)?;
        let reembedder = TemplateReembedder::new(template, self.config.placeholder.as_str())?;
        info!(top_k, limit_per_cluster, include_self, template, "query with template");

        // Clusters without an anchor word have no members and are not scored.
        let anchored: Vec<(usize, &str)> = self
            .clusters
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.anchor_word.as_deref().map(|a| (i, a)))
            .collect();
        if anchored.is_empty() {
            return Err(SimWordsError::Precondition(format!(
                "none of the {} clusters has an anchor word",
                self.clusters.len()
            )));
        }
        if anchored.len() < self.clusters.len() {
            debug!(
                skipped = self.clusters.len() - anchored.len(),
                "skipping clusters without an anchor word"
            );
        }

        let mut phrases: Vec<&str> = Vec::with_capacity(anchored.len() + 1);
        phrases.push(query_text);
        phrases.extend(anchored.iter().map(|&(_, anchor)| anchor));

        let vectors = reembedder
            .reembed(phrases.as_slice(), &self.embedder, "embed query and cluster anchors")
            .await?;
        let (query, anchors) = vectors
            .split_first()
            .ok_or_else(|| SimWordsError::embedding("embed query", "no vector returned"))?;

        warn_if_degenerate(query);

        let mut ranked = score_clusters(query, anchors);
        for scored in &mut ranked {
            scored.cluster_index = anchored[scored.cluster_index].0;
        }
        let selected = split_ends(ranked, top_k)?;
        let (top, bottom) = selected.resolve(&self.clusters);

        let top_results = self
            .rank_templated(query, &top, &reembedder, policy)
            .await
            .map_err(|e| e.within("top clusters"))?;
        let bottom_results = self
            .rank_templated(query, &bottom, &reembedder, policy)
            .await
            .map_err(|e| e.within("bottom clusters"))?;

        Ok(merge_results([top_results, bottom_results]))
    }

    async fn rank_templated(
        &self,
        query: &[f32],
        clusters: &[&Cluster],
        reembedder: &TemplateReembedder,
        policy: RankPolicy,
    ) -> Result<Vec<SearchResult>> {
        let mut results = Vec::new();
        for (i, cluster) in clusters.iter().enumerate() {
            debug!(
                rank = i,
                cluster = %cluster.id,
                anchor = cluster.anchor_word.as_deref().unwrap_or(""),
                "ranking templated cluster"
            );
            let words = self.repository.words_by_cluster(cluster.id)?;
            let texts: Vec<&str> = words.iter().map(|w| w.word.as_str()).collect();
            let vectors = reembedder
                .reembed(
                    texts.as_slice(),
                    &self.embedder,
                    &format!("embed members of cluster {}", cluster.id),
                )
                .await?;
            results.extend(rank_members(
                query,
                words.iter().zip(vectors.iter().map(|v| v.as_slice())),
                policy,
            )?);
        }
        Ok(merge_results([results]))
    }
}

fn warn_if_degenerate(query: &[f32]) {
    if is_zero(query) {
        warn!(
            dimensions = query.len(),
            "zero-norm query vector; every cluster and word scores 0"
        );
    }
}

fn rank_policy(limit_per_cluster: usize, include_self: bool) -> Result<RankPolicy> {
    if limit_per_cluster == 0 {
        return Err(SimWordsError::InvalidArgument(
            "limit_per_cluster must be at least 1".into(),
        ));
    }
    Ok(RankPolicy::new(limit_per_cluster, include_self))
}
