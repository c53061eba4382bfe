//! Partitioning around medoids (PAM) over a precomputed dissimilarity matrix

use crate::clustering::Clustering;
use crate::error::{Error, Result};
use crate::initialization::{initialize_medoids, InitMethod};
use crate::similarity::DissimilarityMatrix;
use crate::utils::{
    assign_to_medoids, ensure_finite, medoid_distances, total_cost, validate_cluster_count,
    validate_parameters, validate_square,
};
use ndarray::{Array1, ArrayView2};
use rand::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Partitioning around medoids: BUILD (or random) seeding followed by the
/// greedy SWAP phase
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pam {
    /// Number of clusters
    pub n_clusters: usize,
    /// Initialization method
    pub init_method: InitMethod,
    /// Maximum number of swap iterations
    pub max_iter: usize,
    /// A swap must lower the total cost by more than this to be accepted
    pub tol: f64,
    /// Number of initialization runs
    pub n_init: usize,
    /// Random seed for reproducibility
    pub random_state: Option<u64>,
    /// Number of parallel jobs
    pub n_jobs: Option<usize>,
    /// Enable verbose output
    pub verbose: bool,
}

/// Result of a PAM fit on a raw matrix
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PamResult {
    /// Cluster label of each item (position of its medoid in `medoids`)
    pub labels: Array1<usize>,
    /// Medoid item index of each cluster, ascending
    pub medoids: Vec<usize>,
    /// Number of swap iterations performed
    pub n_iter: usize,
    /// Total dissimilarity of every item to its medoid
    pub cost: f64,
    /// Whether no improving swap remained
    pub converged: bool,
}

/// A clustering of named items together with the medoid of each cluster
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MedoidClustering {
    /// Item-to-label assignment
    pub clustering: Clustering,
    /// Medoid item index of each cluster label
    pub medoids: Vec<usize>,
    /// Total dissimilarity of every item to its medoid
    pub cost: f64,
    /// Number of swap iterations performed
    pub n_iter: usize,
    /// Whether no improving swap remained
    pub converged: bool,
}

impl MedoidClustering {
    /// Name of each cluster's medoid, indexed by cluster label
    pub fn medoid_names(&self) -> Vec<String> {
        self.medoids
            .iter()
            .map(|&m| self.clustering.names()[m].clone())
            .collect()
    }

    /// Each item's cluster shown as its medoid's name
    pub fn medoid_labels(&self) -> Result<Vec<String>> {
        let medoid_names = self.medoid_names();
        Ok(self
            .clustering
            .display_labels(&medoid_names)?
            .into_iter()
            .map(str::to_owned)
            .collect())
    }
}

impl Default for Pam {
    fn default() -> Self {
        Self {
            n_clusters: 2,
            init_method: InitMethod::Build,
            max_iter: 100,
            tol: 1e-12,
            n_init: 1,
            random_state: None,
            n_jobs: None,
            verbose: false,
        }
    }
}

impl Pam {
    /// Create a new PAM clusterer with specified number of clusters
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Default::default()
        }
    }

    /// Set the initialization method
    pub fn init_method(mut self, method: InitMethod) -> Self {
        self.init_method = method;
        self
    }

    /// Set the maximum number of swap iterations
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the minimum cost improvement for a swap
    pub fn tolerance(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the number of initialization runs
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set the random seed for reproducibility
    pub fn random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Set the number of parallel jobs
    pub fn n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    /// Enable verbose output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Cluster the items of a dissimilarity matrix
    pub fn fit(&self, dissim: &DissimilarityMatrix) -> Result<MedoidClustering> {
        dissim.ensure_finite()?;
        let result = self.fit_matrix(dissim.values())?;
        let clustering = Clustering::new(dissim.names().to_vec(), result.labels.to_vec())?;

        Ok(MedoidClustering {
            clustering,
            medoids: result.medoids,
            cost: result.cost,
            n_iter: result.n_iter,
            converged: result.converged,
        })
    }

    /// Cluster a raw square dissimilarity matrix
    pub fn fit_matrix(&self, dissim: ArrayView2<f64>) -> Result<PamResult> {
        self.validate_input(dissim)?;

        let results: Vec<Result<PamResult>> = if self.should_use_parallel() {
            (0..self.n_init)
                .into_par_iter()
                .map(|i| self.fit_single(dissim, self.random_state.unwrap_or(0).wrapping_add(i as u64)))
                .collect()
        } else {
            (0..self.n_init)
                .map(|i| self.fit_single(dissim, self.random_state.unwrap_or(0).wrapping_add(i as u64)))
                .collect()
        };

        // Runs are kept in order, so ties resolve to the earliest seed.
        let mut results = results.into_iter();
        let mut best_result = match results.next() {
            Some(result) => result?,
            None => return Err(Error::invalid_parameter("n_init must be > 0")),
        };
        for result in results {
            let result = result?;
            if result.cost < best_result.cost {
                best_result = result;
            }
        }

        Ok(best_result)
    }

    /// Fit the model and return only the labels
    pub fn fit_predict(&self, dissim: ArrayView2<f64>) -> Result<Array1<usize>> {
        Ok(self.fit_matrix(dissim)?.labels)
    }

    /// Single run: seed the medoids, then apply the best improving swap until none is left
    fn fit_single(&self, dissim: ArrayView2<f64>, seed: u64) -> Result<PamResult> {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = dissim.nrows();

        let mut medoids = initialize_medoids(dissim, self.n_clusters, self.init_method, &mut rng)?;
        let mut is_medoid = vec![false; n];
        for &m in &medoids {
            is_medoid[m] = true;
        }

        let mut n_iter = 0;
        let mut converged = false;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;
            let current = medoid_distances(dissim, &medoids);

            let mut best_swap: Option<(usize, usize, f64)> = None;
            for pos in 0..medoids.len() {
                for candidate in (0..n).filter(|&h| !is_medoid[h]) {
                    let delta: f64 = (0..n)
                        .map(|j| {
                            let d_jh = dissim[[j, candidate]];
                            if current.nearest[j] == pos {
                                d_jh.min(current.second_dist[j]) - current.nearest_dist[j]
                            } else {
                                (d_jh - current.nearest_dist[j]).min(0.0)
                            }
                        })
                        .sum();
                    if best_swap.map_or(true, |(_, _, best)| delta < best) {
                        best_swap = Some((pos, candidate, delta));
                    }
                }
            }

            match best_swap {
                Some((pos, candidate, delta)) if delta < -self.tol => {
                    trace!(
                        iteration = n_iter,
                        removed = medoids[pos],
                        added = candidate,
                        delta,
                        "pam swap"
                    );
                    is_medoid[medoids[pos]] = false;
                    is_medoid[candidate] = true;
                    medoids[pos] = candidate;
                }
                _ => {
                    converged = true;
                    break;
                }
            }
        }

        if self.verbose {
            info!(seed, n_iter, converged, "PAM finished");
        } else {
            debug!(seed, n_iter, converged, "PAM finished");
        }

        medoids.sort_unstable();
        let labels = assign_to_medoids(dissim, &medoids);
        let cost = total_cost(dissim, &medoids, &labels.to_vec())?;

        Ok(PamResult {
            labels,
            medoids,
            n_iter,
            cost,
            converged,
        })
    }

    /// Validate input parameters and data
    fn validate_input(&self, dissim: ArrayView2<f64>) -> Result<()> {
        validate_parameters(self.max_iter, self.tol, self.n_init)?;
        validate_square(dissim)?;
        validate_cluster_count(self.n_clusters, dissim.nrows())?;
        ensure_finite(dissim, &[])
    }

    /// Determine if parallel processing should be used
    fn should_use_parallel(&self) -> bool {
        match self.n_jobs {
            Some(1) => false,
            Some(_) => true,
            None => self.n_init > 1,
        }
    }
}
