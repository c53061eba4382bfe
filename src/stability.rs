//! Cluster-count stability from repeated sub-sampled PAM runs
//!
//! For every k, `n_iterations` independent runs each draw a fraction of the
//! items without replacement, cluster the restricted matrix, and keep the
//! labels. Runs are compared in disjoint pairs (0 with 1, 2 with 3, ...) over
//! the items both sub-samples contain, giving `n_iterations / 2` Jaccard
//! scores per k. An odd final run has no partner and is dropped.
//!
//! Each (k, iteration) task seeds its own generator from the base seed, so the
//! report is identical whether the grid runs in parallel or not.

use crate::error::{Error, Result};
use crate::initialization::InitMethod;
use crate::jaccard::subsample_jaccard;
use crate::pam::Pam;
use crate::similarity::DissimilarityMatrix;
use crate::utils::validate_cluster_count;
use ndarray::{ArrayView2, Axis};
use rand::prelude::*;
use rayon::prelude::*;
use std::ops::RangeInclusive;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One sub-sampled clustering
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StabilityRun {
    /// Number of clusters
    pub k: usize,
    /// Iteration number within this k
    pub iteration: usize,
    /// Sorted indices of the sampled items in the full matrix
    pub indices: Vec<usize>,
    /// Cluster label of each sampled item, aligned with `indices`
    pub labels: Vec<usize>,
}

impl StabilityRun {
    /// Jaccard similarity with another run over the items both sampled
    pub fn jaccard(&self, other: &StabilityRun) -> Result<f64> {
        subsample_jaccard(&self.indices, &self.labels, &other.indices, &other.labels)
    }
}

/// Distribution of pairwise Jaccard scores for one cluster count
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KStability {
    /// Number of clusters
    pub k: usize,
    /// One score per independent pair of runs
    pub scores: Vec<f64>,
    /// Mean score
    #[cfg_attr(feature = "serde", serde(with = "crate::nan_serde::scalar"))]
    pub mean: f64,
    /// Sample standard deviation (0 for a single score)
    #[cfg_attr(feature = "serde", serde(with = "crate::nan_serde::scalar"))]
    pub std_dev: f64,
    /// Smallest score
    #[cfg_attr(feature = "serde", serde(with = "crate::nan_serde::scalar"))]
    pub min: f64,
    /// Median score
    #[cfg_attr(feature = "serde", serde(with = "crate::nan_serde::scalar"))]
    pub median: f64,
    /// Largest score
    #[cfg_attr(feature = "serde", serde(with = "crate::nan_serde::scalar"))]
    pub max: f64,
}

impl KStability {
    /// Summarise a list of pairwise scores
    pub fn from_scores(k: usize, scores: Vec<f64>) -> Self {
        if scores.is_empty() {
            return Self {
                k,
                scores,
                mean: f64::NAN,
                std_dev: f64::NAN,
                min: f64::NAN,
                median: f64::NAN,
                max: f64::NAN,
            };
        }

        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let std_dev = if scores.len() > 1 {
            (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };

        let mut sorted = scores.clone();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Self {
            k,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            scores,
            mean,
            std_dev,
            median,
        }
    }
}

/// Stability of every requested cluster count
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StabilityReport {
    /// Runs per k
    pub n_iterations: usize,
    /// Fraction of items drawn per run
    pub sample_fraction: f64,
    /// Items drawn per run
    pub sample_size: usize,
    /// Base seed
    pub random_state: u64,
    /// One entry per k, ascending
    pub per_k: Vec<KStability>,
    /// Raw runs, only when requested with [`StabilityAnalysis::keep_runs`]
    pub runs: Option<Vec<StabilityRun>>,
}

impl StabilityReport {
    /// Stability entry for one k
    pub fn get(&self, k: usize) -> Option<&KStability> {
        self.per_k.iter().find(|entry| entry.k == k)
    }
}

/// Configuration of a sub-sampling stability analysis
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StabilityAnalysis {
    /// Smallest cluster count
    pub k_min: usize,
    /// Largest cluster count
    pub k_max: usize,
    /// Runs per k
    pub n_iterations: usize,
    /// Fraction of items drawn per run, in `(0, 1]`
    pub sample_fraction: f64,
    /// Base seed for sub-sampling and PAM
    pub random_state: Option<u64>,
    /// PAM initialization method
    pub init_method: InitMethod,
    /// PAM swap iteration limit
    pub max_iter: usize,
    /// Number of parallel jobs
    pub n_jobs: Option<usize>,
    /// Keep every run in the report
    pub keep_runs: bool,
    /// Enable verbose output
    pub verbose: bool,
}

impl Default for StabilityAnalysis {
    fn default() -> Self {
        Self {
            k_min: 2,
            k_max: 10,
            n_iterations: 100,
            sample_fraction: 0.9,
            random_state: None,
            init_method: InitMethod::Build,
            max_iter: 100,
            n_jobs: None,
            keep_runs: false,
            verbose: false,
        }
    }
}

impl StabilityAnalysis {
    /// Create an analysis over the given cluster counts
    pub fn new(k_range: RangeInclusive<usize>) -> Self {
        Self {
            k_min: *k_range.start(),
            k_max: *k_range.end(),
            ..Default::default()
        }
    }

    /// Cluster counts covered, ascending
    pub fn k_range(&self) -> RangeInclusive<usize> {
        self.k_min..=self.k_max
    }

    /// Set the number of runs per k
    pub fn n_iterations(mut self, n_iterations: usize) -> Self {
        self.n_iterations = n_iterations;
        self
    }

    /// Set the fraction of items drawn per run
    pub fn sample_fraction(mut self, fraction: f64) -> Self {
        self.sample_fraction = fraction;
        self
    }

    /// Set the random seed for reproducibility
    pub fn random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Set the PAM initialization method
    pub fn init_method(mut self, method: InitMethod) -> Self {
        self.init_method = method;
        self
    }

    /// Set the PAM swap iteration limit
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the number of parallel jobs
    pub fn n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    /// Keep the raw runs in the report
    pub fn keep_runs(mut self, keep: bool) -> Self {
        self.keep_runs = keep;
        self
    }

    /// Enable verbose output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Items drawn per run for a matrix of `n_items`
    pub fn sample_size(&self, n_items: usize) -> usize {
        ((self.sample_fraction * n_items as f64).round() as usize).min(n_items)
    }

    /// PAM configuration used for a single run
    pub fn pam(&self, k: usize, seed: u64) -> Pam {
        Pam::new(k)
            .init_method(self.init_method)
            .max_iter(self.max_iter)
            .n_init(1)
            .n_jobs(1)
            .random_state(seed)
    }

    /// Run the analysis over every k in the range
    pub fn run(&self, dissim: &DissimilarityMatrix) -> Result<StabilityReport> {
        dissim.ensure_finite()?;
        let n_items = dissim.len();
        let sample_size = self.validate(n_items)?;
        let base_seed = self.random_state.unwrap_or(0);

        let mut per_k = Vec::with_capacity(self.k_max - self.k_min + 1);
        let mut kept_runs = self.keep_runs.then(Vec::new);

        for k in self.k_range() {
            let runs = self.runs_for_k(dissim.values(), k, sample_size, base_seed)?;
            let scores = self.score_pairs(&runs)?;
            let summary = KStability::from_scores(k, scores);

            if self.verbose {
                info!(k, mean = summary.mean, std_dev = summary.std_dev, "stability");
            } else {
                debug!(k, mean = summary.mean, std_dev = summary.std_dev, "stability");
            }

            per_k.push(summary);
            if let Some(kept) = kept_runs.as_mut() {
                kept.extend(runs);
            }
        }

        Ok(StabilityReport {
            n_iterations: self.n_iterations,
            sample_fraction: self.sample_fraction,
            sample_size,
            random_state: base_seed,
            per_k,
            runs: kept_runs,
        })
    }

    /// All sub-sampled runs for one k, in iteration order
    fn runs_for_k(
        &self,
        dissim: ArrayView2<f64>,
        k: usize,
        sample_size: usize,
        base_seed: u64,
    ) -> Result<Vec<StabilityRun>> {
        let single = |iteration: usize| {
            self.single_run(dissim, k, iteration, sample_size, derive_seed(base_seed, k, iteration))
        };

        if self.should_use_parallel() {
            (0..self.n_iterations).into_par_iter().map(single).collect()
        } else {
            (0..self.n_iterations).map(single).collect()
        }
    }

    fn single_run(
        &self,
        dissim: ArrayView2<f64>,
        k: usize,
        iteration: usize,
        sample_size: usize,
        seed: u64,
    ) -> Result<StabilityRun> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices = rand::seq::index::sample(&mut rng, dissim.nrows(), sample_size).into_vec();
        indices.sort_unstable();

        let sub = dissim.select(Axis(0), &indices).select(Axis(1), &indices);
        let fit = self.pam(k, rng.gen()).fit_matrix(sub.view())?;

        Ok(StabilityRun {
            k,
            iteration,
            indices,
            labels: fit.labels.to_vec(),
        })
    }

    /// Jaccard score of each disjoint pair of consecutive runs
    fn score_pairs(&self, runs: &[StabilityRun]) -> Result<Vec<f64>> {
        let pairs: Vec<(&StabilityRun, &StabilityRun)> =
            runs.chunks_exact(2).map(|pair| (&pair[0], &pair[1])).collect();

        if self.should_use_parallel() {
            pairs.into_par_iter().map(|(a, b)| a.jaccard(b)).collect()
        } else {
            pairs.into_iter().map(|(a, b)| a.jaccard(b)).collect()
        }
    }

    /// Validate parameters and return the sub-sample size
    fn validate(&self, n_items: usize) -> Result<usize> {
        if self.k_min > self.k_max {
            return Err(Error::invalid_parameter(format!(
                "Empty cluster-count range {}..={}",
                self.k_min, self.k_max
            )));
        }
        if self.n_iterations < 2 {
            return Err(Error::invalid_parameter(
                "n_iterations must be >= 2 to form at least one pair of runs",
            ));
        }
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(Error::invalid_parameter("sample_fraction must be in (0, 1]"));
        }
        if self.max_iter == 0 {
            return Err(Error::invalid_parameter("max_iter must be > 0"));
        }

        let sample_size = self.sample_size(n_items);
        validate_cluster_count(self.k_min, sample_size)?;
        validate_cluster_count(self.k_max, sample_size)?;
        Ok(sample_size)
    }

    fn should_use_parallel(&self) -> bool {
        !matches!(self.n_jobs, Some(1))
    }
}

/// Independent, reproducible seed for one (k, iteration) task (SplitMix64 finaliser)
pub fn derive_seed(base: u64, k: usize, iteration: usize) -> u64 {
    let mut z = base
        .wrapping_add((k as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((iteration as u64).wrapping_mul(0xD1B5_4A32_D192_ED03));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Three tight groups on a line, `n_per_group` items each
    fn grouped(n_per_group: usize) -> DissimilarityMatrix {
        let xs: Vec<f64> = (0..3)
            .flat_map(|g| (0..n_per_group).map(move |i| g as f64 * 10.0 + i as f64 * 0.1))
            .collect();
        let n = xs.len();
        let max = xs[n - 1] - xs[0];
        let values = Array2::from_shape_fn((n, n), |(i, j)| (xs[i] - xs[j]).abs() / max);
        let names = (0..n).map(|i| format!("item{}", i)).collect();
        DissimilarityMatrix::from_matrix(names, values).unwrap()
    }

    #[test]
    fn test_builder() {
        let analysis = StabilityAnalysis::new(2..=5)
            .n_iterations(20)
            .sample_fraction(0.8)
            .random_state(3)
            .init_method(InitMethod::Random)
            .max_iter(10)
            .n_jobs(1)
            .keep_runs(true)
            .verbose(true);

        assert_eq!(analysis.k_range(), 2..=5);
        assert_eq!(analysis.n_iterations, 20);
        assert_eq!(analysis.sample_fraction, 0.8);
        assert_eq!(analysis.random_state, Some(3));
        assert_eq!(analysis.init_method, InitMethod::Random);
        assert_eq!(analysis.max_iter, 10);
        assert_eq!(analysis.n_jobs, Some(1));
        assert!(analysis.keep_runs);
        assert!(analysis.verbose);
    }

    #[test]
    fn test_true_k_is_stable() {
        let report = StabilityAnalysis::new(3..=3)
            .n_iterations(10)
            .random_state(42)
            .run(&grouped(5))
            .unwrap();

        let k3 = report.get(3).unwrap();
        assert_eq!(k3.scores.len(), 5);
        assert!(k3.scores.iter().all(|&s| s == 1.0));
        assert_eq!(k3.mean, 1.0);
        assert_eq!(k3.std_dev, 0.0);
        assert!(report.runs.is_none());
    }

    #[test]
    fn test_runs_kept_and_sampled() {
        let d = grouped(5);
        let report = StabilityAnalysis::new(2..=3)
            .n_iterations(4)
            .sample_fraction(0.8)
            .keep_runs(true)
            .run(&d)
            .unwrap();

        assert_eq!(report.sample_size, 12);
        let runs = report.runs.as_ref().unwrap();
        assert_eq!(runs.len(), 8);
        for run in runs {
            assert_eq!(run.indices.len(), 12);
            assert_eq!(run.labels.len(), 12);
            assert!(run.indices.windows(2).all(|w| w[0] < w[1]));
            assert!(run.labels.iter().all(|&l| l < run.k));
        }
        assert_eq!(report.per_k.iter().map(|e| e.k).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_odd_iteration_count_drops_last_run() {
        let report = StabilityAnalysis::new(2..=2)
            .n_iterations(5)
            .run(&grouped(4))
            .unwrap();
        assert_eq!(report.get(2).unwrap().scores.len(), 2);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let d = grouped(4);
        let base = StabilityAnalysis::new(2..=4)
            .n_iterations(6)
            .sample_fraction(0.75)
            .random_state(9);

        let sequential = base.clone().n_jobs(1).run(&d).unwrap();
        let parallel = base.n_jobs(4).run(&d).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_invalid_parameters() {
        let d = grouped(3);
        assert!(StabilityAnalysis::new(3..=2).run(&d).is_err());
        assert!(StabilityAnalysis::new(1..=3).run(&d).is_err());
        assert!(StabilityAnalysis::new(2..=3).n_iterations(1).run(&d).is_err());
        assert!(StabilityAnalysis::new(2..=3).sample_fraction(0.0).run(&d).is_err());
        assert!(StabilityAnalysis::new(2..=3).sample_fraction(1.5).run(&d).is_err());
        // 9 items * 0.5 rounds to 5 (round half away from zero): k = 5 is too many.
        assert!(matches!(
            StabilityAnalysis::new(2..=5).sample_fraction(0.5).run(&d),
            Err(Error::DegenerateClusterCount { requested: 5, n_items: 5 })
        ));
    }

    #[test]
    fn test_summary_statistics() {
        let summary = KStability::from_scores(4, vec![1.0, 0.5, 0.75, 0.25]);
        assert_eq!(summary.mean, 0.625);
        assert_eq!(summary.min, 0.25);
        assert_eq!(summary.max, 1.0);
        assert_eq!(summary.median, 0.625);
        assert!((summary.std_dev - (0.3125f64 / 3.0).sqrt()).abs() < 1e-12);

        let empty = KStability::from_scores(2, vec![]);
        assert!(empty.mean.is_nan());
    }

    #[test]
    fn test_derive_seed_distinguishes_tasks() {
        let a = derive_seed(0, 2, 0);
        assert_ne!(a, derive_seed(0, 2, 1));
        assert_ne!(a, derive_seed(0, 3, 0));
        assert_ne!(a, derive_seed(1, 2, 0));
        assert_eq!(a, derive_seed(0, 2, 0));
    }
}
