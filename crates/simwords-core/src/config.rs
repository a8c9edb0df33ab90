use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SimWordsError};

/// Placeholder token replaced by a word inside a phrase template.
pub const DEFAULT_PLACEHOLDER: &str = "{{placeholder}}";

/// Top-level configuration for clustering runs and queries.
///
/// Loaded from a TOML file. Every section falls back to its defaults when
/// absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimWordsConfig {
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl SimWordsConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SimWordsConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or is invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.clustering.validate()?;
        self.query.validate()?;
        self.embedding.validate()
    }
}

/// k-means settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Number of clusters.
    pub k: usize,
    /// Upper bound on Lloyd iterations.
    pub max_iterations: usize,
    /// Seed for center initialization. Random when absent.
    pub seed: Option<u64>,
    /// Assignment-step workers. Defaults to the available parallelism.
    pub workers: Option<usize>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            k: 10,
            max_iterations: 1000,
            seed: None,
            workers: None,
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(SimWordsError::Config("clustering.k must be at least 1".into()));
        }
        if self.max_iterations == 0 {
            return Err(SimWordsError::Config(
                "clustering.max_iterations must be at least 1".into(),
            ));
        }
        if self.workers == Some(0) {
            return Err(SimWordsError::Config(
                "clustering.workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Query defaults applied when a request leaves a parameter out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Clusters taken from each end of the similarity ranking.
    pub top_k: usize,
    /// Words emitted per scanned cluster.
    pub candidates_per_cluster: usize,
    /// Keep results that are (numerically) the query itself.
    pub include_self: bool,
    /// Token substituted in phrase templates.
    pub placeholder: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            candidates_per_cluster: 5,
            include_self: false,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

impl QueryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(SimWordsError::Config("query.top_k must be at least 1".into()));
        }
        if self.candidates_per_cluster == 0 {
            return Err(SimWordsError::Config(
                "query.candidates_per_cluster must be at least 1".into(),
            ));
        }
        if self.placeholder.is_empty() {
            return Err(SimWordsError::Config(
                "query.placeholder must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Texts sent per provider call while embedding a vocabulary.
    pub batch_size: usize,
    /// Batch endpoint of the HTTP provider.
    pub endpoint: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            endpoint: "http://localhost:8000/api/v1/embd/batch".to_string(),
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SimWordsError::Config(
                "embedding.batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
