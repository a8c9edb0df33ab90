//! Lloyd's k-means with a parallel assignment step.
//!
//! Centers are seeded by sampling `k` data points uniformly and
//! independently, so two centers may start out identical. Each iteration
//! assigns every vector to its nearest center (squared Euclidean, ties to
//! the lowest center index), stops if nothing moved, and otherwise replaces
//! each center by the mean of its members. Empty clusters keep their center.

use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use simwords_core::config::ClusteringConfig;
use simwords_core::error::{Result, SimWordsError};
use simwords_core::types::{Vector, WordVector};
use simwords_core::vector_ops::{check_dimensions, squared_distance_unchecked};

/// Assignment slot value before the first assignment step.
const UNASSIGNED: usize = usize::MAX;

/// Result of a k-means run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansOutput {
    pub centers: Vec<Vector>,
    /// `assignments[i]` is the index into `centers` for input vector `i`.
    pub assignments: Vec<usize>,
    /// Number of update steps performed.
    pub iterations: usize,
    /// True when an assignment step changed nothing before the cap.
    pub converged: bool,
}

impl KMeansOutput {
    /// Member count per center.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.centers.len()];
        for &a in &self.assignments {
            sizes[a] += 1;
        }
        sizes
    }
}

/// k-means clusterer.
#[derive(Debug, Clone)]
pub struct KMeansEngine {
    max_iterations: usize,
    workers: usize,
    seed: Option<u64>,
}

impl KMeansEngine {
    /// Engine with one assignment worker per available CPU and random seeding.
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            workers: default_workers(),
            seed: None,
        }
    }

    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            workers: config.workers.unwrap_or_else(default_workers),
            seed: config.seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Check that `data` can be split into `k` clusters by this engine.
    ///
    /// Returns the common dimension. `fit` fails exactly when this does.
    pub fn check<V: AsRef<[f32]>>(&self, data: &[V], k: usize) -> Result<usize> {
        let dim = validate_data(data)?;
        if self.max_iterations == 0 {
            return Err(SimWordsError::Precondition(
                "max_iterations must be at least 1".into(),
            ));
        }
        if k == 0 {
            return Err(SimWordsError::Precondition("k must be at least 1".into()));
        }
        if k > data.len() {
            return Err(SimWordsError::Precondition(format!(
                "k ({}) exceeds the number of vectors ({})",
                k,
                data.len()
            )));
        }
        Ok(dim)
    }

    /// Partition `data` into `k` clusters, seeding centers by sampling.
    pub fn fit<V>(&self, data: &[V], k: usize) -> Result<KMeansOutput>
    where
        V: AsRef<[f32]> + Sync,
    {
        self.check(data, k)?;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let centers = init_centers(data, k, &mut rng);
        self.fit_from(data, centers)
    }

    /// Run Lloyd iterations from explicit initial centers.
    pub fn fit_from<V>(&self, data: &[V], mut centers: Vec<Vector>) -> Result<KMeansOutput>
    where
        V: AsRef<[f32]> + Sync,
    {
        let dim = validate_data(data)?;
        if centers.is_empty() {
            return Err(SimWordsError::Precondition("at least one center is required".into()));
        }
        for center in &centers {
            check_dimensions(dim, center.len())?;
        }
        if self.max_iterations == 0 {
            return Err(SimWordsError::Precondition(
                "max_iterations must be at least 1".into(),
            ));
        }

        let mut assignments = vec![UNASSIGNED; data.len()];
        let mut iterations = 0;
        let mut converged = false;

        for iteration in 0..self.max_iterations {
            debug!(iteration, max_iterations = self.max_iterations, "k-means iteration");

            let changed = assign(data, &centers, &mut assignments, self.workers);
            if !changed {
                converged = true;
                break;
            }
            update_centers(data, &mut centers, &assignments);
            iterations += 1;
        }

        if converged {
            info!(k = centers.len(), iterations, "k-means reached convergence");
        } else {
            info!(
                k = centers.len(),
                iterations, "k-means stopped at the iteration cap"
            );
        }

        Ok(KMeansOutput {
            centers,
            assignments,
            iterations,
            converged,
        })
    }
}

/// Cluster word vectors by their normalized embeddings.
pub fn cluster(vectors: &[WordVector], k: usize, max_iterations: usize) -> Result<KMeansOutput> {
    KMeansEngine::new(max_iterations).fit(vectors, k)
}

fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Check the input is non-empty and of uniform dimension; returns that dimension.
fn validate_data<V: AsRef<[f32]>>(data: &[V]) -> Result<usize> {
    let first = data
        .first()
        .ok_or_else(|| SimWordsError::Precondition("cannot cluster an empty input".into()))?;
    let dim = first.as_ref().len();
    if dim == 0 {
        return Err(SimWordsError::Precondition("vectors must not be empty".into()));
    }
    for v in data {
        check_dimensions(dim, v.as_ref().len())?;
    }
    Ok(dim)
}

fn init_centers<V: AsRef<[f32]>>(data: &[V], k: usize, rng: &mut StdRng) -> Vec<Vector> {
    (0..k)
        .map(|_| data[rng.random_range(0..data.len())].as_ref().to_vec())
        .collect()
}

/// Assign every vector to its nearest center.
///
/// The index range is split into contiguous chunks, one per worker. Each
/// worker reads the shared centers and writes only its own slice of
/// `assignments`; the call returns once every worker has joined. Returns
/// whether any assignment changed.
pub fn assign<V>(data: &[V], centers: &[Vector], assignments: &mut [usize], workers: usize) -> bool
where
    V: AsRef<[f32]> + Sync,
{
    debug_assert_eq!(data.len(), assignments.len());
    let n = data.len();
    if n == 0 {
        return false;
    }
    let workers = workers.clamp(1, n);
    if workers == 1 {
        return assign_chunk(data, centers, assignments);
    }
    let chunk_size = n.div_ceil(workers);

    thread::scope(|scope| {
        let handles: Vec<_> = data
            .chunks(chunk_size)
            .zip(assignments.chunks_mut(chunk_size))
            .enumerate()
            .map(|(worker, (rows, slots))| {
                let start = worker * chunk_size;
                debug!(worker, start, end = start + rows.len(), "launch assignment chunk");
                scope.spawn(move || assign_chunk(rows, centers, slots))
            })
            .collect();

        let mut changed = false;
        for handle in handles {
            match handle.join() {
                Ok(local) => changed |= local,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        changed
    })
}

fn assign_chunk<V: AsRef<[f32]>>(rows: &[V], centers: &[Vector], slots: &mut [usize]) -> bool {
    let mut changed = false;
    for (row, slot) in rows.iter().zip(slots.iter_mut()) {
        let best = nearest_center(row.as_ref(), centers);
        if *slot != best {
            *slot = best;
            changed = true;
        }
    }
    changed
}

/// Index of the closest center; the first one wins on ties.
fn nearest_center(v: &[f32], centers: &[Vector]) -> usize {
    let mut best = 0usize;
    let mut best_dist = f64::INFINITY;
    for (c, center) in centers.iter().enumerate() {
        let d = squared_distance_unchecked(v, center);
        if d < best_dist {
            best_dist = d;
            best = c;
        }
    }
    best
}

/// Replace each center by the coordinate-wise mean of its members.
pub fn update_centers<V: AsRef<[f32]>>(data: &[V], centers: &mut [Vector], assignments: &[usize]) {
    let k = centers.len();
    let dim = centers.first().map(|c| c.len()).unwrap_or(0);
    let mut sums = vec![vec![0.0f64; dim]; k];
    let mut counts = vec![0usize; k];

    for (v, &c) in data.iter().zip(assignments.iter()) {
        if c >= k {
            continue;
        }
        counts[c] += 1;
        for (s, x) in sums[c].iter_mut().zip(v.as_ref().iter()) {
            *s += *x as f64;
        }
    }

    for c in 0..k {
        if counts[c] == 0 {
            continue;
        }
        let inv = 1.0 / counts[c] as f64;
        for (dst, s) in centers[c].iter_mut().zip(sums[c].iter()) {
            *dst = (*s * inv) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: &[f32], b: &[f32]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    fn scenario() -> Vec<Vec<f32>> {
        vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![10.0, 10.0],
            vec![10.0, 11.0],
        ]
    }

    /// Grid of well-separated 2-d blobs, generated without randomness.
    fn blobs(per_blob: usize) -> Vec<Vec<f32>> {
        let origins = [(0.0f32, 0.0f32), (50.0, 0.0), (0.0, 50.0), (50.0, 50.0)];
        let mut data = Vec::new();
        for (ox, oy) in origins {
            for i in 0..per_blob {
                let dx = (i % 7) as f32 * 0.3;
                let dy = (i % 5) as f32 * 0.4;
                data.push(vec![ox + dx, oy + dy]);
            }
        }
        data
    }

    #[test]
    fn test_scenario_converges_to_two_groups() {
        let engine = KMeansEngine::new(10);
        let out = engine
            .fit_from(&scenario(), vec![vec![0.0, 0.0], vec![10.0, 10.0]])
            .unwrap();

        assert!(out.converged);
        assert_eq!(out.assignments, vec![0, 0, 1, 1]);
        assert!(approx(&out.centers[0], &[0.0, 0.5]));
        assert!(approx(&out.centers[1], &[10.0, 10.5]));
    }

    #[test]
    fn test_single_cluster_is_the_mean_after_one_iteration() {
        let data = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 0.0]];
        let out = KMeansEngine::new(10).with_seed(3).fit(&data, 1).unwrap();

        assert_eq!(out.assignments, vec![0, 0, 0]);
        assert_eq!(out.iterations, 1);
        assert!(out.converged);
        assert!(approx(&out.centers[0], &[3.0, 2.0]));
    }

    #[test]
    fn test_converged_assignment_is_a_fixed_point() {
        let data = blobs(12);
        let out = KMeansEngine::new(100).with_seed(11).fit(&data, 4).unwrap();
        assert!(out.converged);

        let mut again = out.assignments.clone();
        let changed = assign(&data, &out.centers, &mut again, 3);
        assert!(!changed);
        assert_eq!(again, out.assignments);
    }

    #[test]
    fn test_nonempty_centers_are_member_means() {
        let data = blobs(10);
        for seed in 0..16 {
            let out = KMeansEngine::new(100).with_seed(seed).fit(&data, 4).unwrap();
            assert!(out.converged, "seed {} did not converge", seed);
            assert!(out.assignments.iter().all(|&a| a < 4));

            for (c, center) in out.centers.iter().enumerate() {
                let members: Vec<&Vec<f32>> = data
                    .iter()
                    .zip(&out.assignments)
                    .filter(|(_, a)| **a == c)
                    .map(|(v, _)| v)
                    .collect();
                if members.is_empty() {
                    continue;
                }
                let n = members.len() as f64;
                let mean_x = members.iter().map(|v| v[0] as f64).sum::<f64>() / n;
                let mean_y = members.iter().map(|v| v[1] as f64).sum::<f64>() / n;
                assert!(
                    (center[0] as f64 - mean_x).abs() < 1e-3
                        && (center[1] as f64 - mean_y).abs() < 1e-3,
                    "seed {} center {} off",
                    seed,
                    c
                );
            }
        }
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let data = blobs(8);
        let a = KMeansEngine::new(50).with_seed(99).fit(&data, 3).unwrap();
        let b = KMeansEngine::new(50).with_seed(99).fit(&data, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parallel_matches_serial() {
        let data = blobs(25);
        let init = vec![data[0].clone(), data[30].clone(), data[60].clone(), data[99].clone()];

        let serial = KMeansEngine::new(50)
            .with_workers(1)
            .fit_from(&data, init.clone())
            .unwrap();
        let parallel = KMeansEngine::new(50)
            .with_workers(6)
            .fit_from(&data, init)
            .unwrap();

        assert_eq!(serial.assignments, parallel.assignments);
        assert_eq!(serial.centers, parallel.centers);
        assert_eq!(serial.iterations, parallel.iterations);
    }

    #[test]
    fn test_more_workers_than_vectors() {
        let out = KMeansEngine::new(10)
            .with_workers(64)
            .fit_from(&scenario(), vec![vec![0.0, 0.0], vec![10.0, 10.0]])
            .unwrap();
        assert_eq!(out.assignments, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_empty_cluster_keeps_its_center() {
        let data = vec![vec![0.0, 0.0], vec![0.0, 1.0]];
        let out = KMeansEngine::new(10)
            .fit_from(&data, vec![vec![0.0, 0.0], vec![50.0, 50.0]])
            .unwrap();

        assert_eq!(out.assignments, vec![0, 0]);
        assert!(approx(&out.centers[0], &[0.0, 0.5]));
        assert_eq!(out.centers[1], vec![50.0, 50.0]);
        assert_eq!(out.cluster_sizes(), vec![2, 0]);
    }

    #[test]
    fn test_duplicate_initial_centers_prefer_lowest_index() {
        let data: Vec<Vec<f32>> = vec![vec![1.0, 1.0]; 3];
        let out = KMeansEngine::new(10)
            .fit_from(&data, vec![vec![1.0, 1.0], vec![1.0, 1.0]])
            .unwrap();

        assert_eq!(out.assignments, vec![0, 0, 0]);
        assert_eq!(out.cluster_sizes(), vec![3, 0]);
        assert!(out.converged);
    }

    #[test]
    fn test_duplicate_center_recovers_once_the_first_moves() {
        // First pass: everything goes to center 0, which moves to (5, 5.5).
        // Second pass: the duplicate left at the origin takes the near pair.
        let out = KMeansEngine::new(10)
            .fit_from(&scenario(), vec![vec![0.0, 0.0], vec![0.0, 0.0]])
            .unwrap();

        assert_eq!(out.assignments, vec![1, 1, 0, 0]);
        assert!(approx(&out.centers[0], &[10.0, 10.5]));
        assert!(approx(&out.centers[1], &[0.0, 0.5]));
        assert!(out.converged);
    }

    #[test]
    fn test_check_matches_fit_preconditions() {
        let engine = KMeansEngine::new(10);
        assert_eq!(engine.check(&scenario(), 2).unwrap(), 2);
        assert!(matches!(
            engine.check(&scenario(), 5),
            Err(SimWordsError::Precondition(_))
        ));
        assert!(matches!(
            engine.check(&[vec![1.0f32, 0.0], vec![1.0]], 1),
            Err(SimWordsError::DimensionMismatch { .. })
        ));
        assert!(KMeansEngine::new(0).check(&scenario(), 1).is_err());
    }

    #[test]
    fn test_tie_breaks_to_lowest_center_index() {
        let data = vec![vec![5.0, 0.0]];
        let mut assignments = vec![UNASSIGNED];
        let centers = vec![vec![0.0, 0.0], vec![10.0, 0.0]];
        assert!(assign(&data, &centers, &mut assignments, 1));
        assert_eq!(assignments, vec![0]);
    }

    #[test]
    fn test_iteration_cap() {
        let out = KMeansEngine::new(1)
            .fit_from(&scenario(), vec![vec![0.0, 0.0], vec![10.0, 10.0]])
            .unwrap();
        assert_eq!(out.iterations, 1);
        assert!(!out.converged);
        assert!(approx(&out.centers[0], &[0.0, 0.5]));
    }

    #[test]
    fn test_cluster_word_vectors_uses_normalized_embeddings() {
        let words = vec![
            WordVector::new("a", 1, vec![2.0, 0.0]),
            WordVector::new("b", 1, vec![3.0, 0.0]),
        ];
        let out = cluster(&words, 1, 5).unwrap();
        assert!(approx(&out.centers[0], &[1.0, 0.0]));
    }

    #[test]
    fn test_preconditions() {
        let engine = KMeansEngine::new(10);
        let empty: Vec<Vec<f32>> = Vec::new();
        assert!(matches!(
            engine.fit(&empty, 1),
            Err(SimWordsError::Precondition(_))
        ));
        assert!(matches!(
            engine.fit(&scenario(), 0),
            Err(SimWordsError::Precondition(_))
        ));
        assert!(matches!(
            engine.fit(&scenario(), 5),
            Err(SimWordsError::Precondition(_))
        ));

        let ragged = vec![vec![0.0, 0.0], vec![1.0]];
        assert!(matches!(
            engine.fit(&ragged, 1),
            Err(SimWordsError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));

        assert!(matches!(
            engine.fit_from(&scenario(), vec![vec![0.0, 0.0, 0.0]]),
            Err(SimWordsError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            KMeansEngine::new(0).fit(&scenario(), 2),
            Err(SimWordsError::Precondition(_))
        ));
    }

    #[test]
    fn test_from_config() {
        let config = ClusteringConfig {
            k: 4,
            max_iterations: 25,
            seed: Some(5),
            workers: Some(2),
        };
        let engine = KMeansEngine::from_config(&config);
        assert_eq!(engine.max_iterations(), 25);
        assert_eq!(engine.workers(), 2);
    }
}
