//! Vector repository interface and an in-memory implementation.
//!
//! Persistence backends (SQLite, etc.) implement [`VectorRepository`]
//! outside this crate. Every call returns a full result set or an error.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use simwords_core::error::{Result, SimWordsError};
use simwords_core::types::{Cluster, ClusterAssignment, WordVector};

/// Storage of word vectors and clusters.
pub trait VectorRepository: Send + Sync {
    /// All words currently assigned to `cluster_id`.
    fn words_by_cluster(&self, cluster_id: Uuid) -> Result<Vec<WordVector>>;

    /// Insert or overwrite words by id.
    fn save_words(&self, words: &[WordVector]) -> Result<()>;

    /// Insert or overwrite clusters by id.
    fn save_clusters(&self, clusters: &[Cluster]) -> Result<()>;

    /// Link words to clusters.
    fn update_cluster_assignments(&self, assignments: &[ClusterAssignment]) -> Result<()>;

    /// Every persisted cluster, in creation order.
    fn clusters(&self) -> Result<Vec<Cluster>>;
}

/// In-memory repository guarded by `RwLock`s.
///
/// Words keep their insertion order, so `words_by_cluster` is stable.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    words: RwLock<WordTable>,
    clusters: RwLock<Vec<Cluster>>,
}

#[derive(Debug, Default)]
struct WordTable {
    rows: Vec<WordVector>,
    by_id: HashMap<Uuid, usize>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored words.
    pub fn word_count(&self) -> usize {
        self.words.read().map(|t| t.rows.len()).unwrap_or(0)
    }

    /// Look up a word by id.
    pub fn word(&self, id: Uuid) -> Result<Option<WordVector>> {
        let table = self
            .words
            .read()
            .map_err(|e| SimWordsError::repository("read word", format!("Lock poisoned: {}", e)))?;
        Ok(table.by_id.get(&id).map(|&i| table.rows[i].clone()))
    }
}

impl VectorRepository for InMemoryRepository {
    fn words_by_cluster(&self, cluster_id: Uuid) -> Result<Vec<WordVector>> {
        let table = self.words.read().map_err(|e| {
            SimWordsError::repository(
                format!("load words of cluster {}", cluster_id),
                format!("Lock poisoned: {}", e),
            )
        })?;
        Ok(table
            .rows
            .iter()
            .filter(|w| w.cluster_id == Some(cluster_id))
            .cloned()
            .collect())
    }

    fn save_words(&self, words: &[WordVector]) -> Result<()> {
        let mut table = self
            .words
            .write()
            .map_err(|e| SimWordsError::repository("save words", format!("Lock poisoned: {}", e)))?;
        for word in words {
            match table.by_id.get(&word.id).copied() {
                Some(i) => table.rows[i] = word.clone(),
                None => {
                    let i = table.rows.len();
                    table.rows.push(word.clone());
                    table.by_id.insert(word.id, i);
                }
            }
        }
        Ok(())
    }

    fn save_clusters(&self, clusters: &[Cluster]) -> Result<()> {
        let mut stored = self.clusters.write().map_err(|e| {
            SimWordsError::repository("save clusters", format!("Lock poisoned: {}", e))
        })?;
        for cluster in clusters {
            match stored.iter_mut().find(|c| c.id == cluster.id) {
                Some(existing) => *existing = cluster.clone(),
                None => stored.push(cluster.clone()),
            }
        }
        Ok(())
    }

    fn update_cluster_assignments(&self, assignments: &[ClusterAssignment]) -> Result<()> {
        let mut table = self.words.write().map_err(|e| {
            SimWordsError::repository("update cluster assignments", format!("Lock poisoned: {}", e))
        })?;
        // Resolve every id before touching a row.
        let rows = assignments
            .iter()
            .map(|a| {
                table.by_id.get(&a.word_id).copied().ok_or_else(|| {
                    SimWordsError::repository(
                        "update cluster assignments",
                        format!("unknown word {}", a.word_id),
                    )
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        for (i, assignment) in rows.into_iter().zip(assignments) {
            table.rows[i].cluster_id = Some(assignment.cluster_id);
        }
        Ok(())
    }

    fn clusters(&self) -> Result<Vec<Cluster>> {
        let stored = self.clusters.read().map_err(|e| {
            SimWordsError::repository("load clusters", format!("Lock poisoned: {}", e))
        })?;
        Ok(stored.clone())
    }
}
