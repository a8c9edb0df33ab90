//! Simwords cluster crate - k-means clustering, cluster selection, candidate
//! ranking, template re-embedding, and the query service built on them.
//!
//! Search narrows a query to the clusters whose centers are most and least
//! similar to it, then ranks the members of those clusters individually by
//! cosine similarity.

pub mod embedding;
pub mod kmeans;
pub mod pipeline;
pub mod ranker;
pub mod repository;
pub mod selector;
pub mod service;
pub mod template;

pub use embedding::{EmbeddingService, MockEmbedding};
pub use kmeans::{KMeansEngine, KMeansOutput};
pub use pipeline::{ClusteringPipeline, ClusteringReport};
pub use ranker::{rank_within_clusters, RankPolicy};
pub use repository::{InMemoryRepository, VectorRepository};
pub use selector::{select_candidate_clusters, CandidateClusters};
pub use service::SimilarityService;
pub use template::TemplateReembedder;
