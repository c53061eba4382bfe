//! Per-k diagnostics for choosing the number of clusters
//!
//! Each row pairs the mean silhouette width of a full-data PAM fit with the
//! stability distribution from sub-sampling. Choosing k is left to the
//! caller; [`ModelSelection::suggest_k`] is only a starting point.

use crate::error::{Error, Result};
use crate::pam::{MedoidClustering, Pam};
use crate::silhouette::{silhouette, SilhouetteResult, SingletonPolicy};
use crate::similarity::DissimilarityMatrix;
use crate::stability::{KStability, StabilityAnalysis, StabilityReport};
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Diagnostics for one cluster count
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KDiagnostics {
    /// Number of clusters
    pub k: usize,
    /// PAM fit on the full matrix
    pub clustering: MedoidClustering,
    /// Silhouette widths of that fit
    pub silhouette: SilhouetteResult,
    /// Mean silhouette width (undefined widths skipped)
    #[cfg_attr(feature = "serde", serde(with = "crate::nan_serde::scalar"))]
    pub mean_silhouette: f64,
    /// Sub-sampled Jaccard stability
    pub stability: KStability,
}

/// Table of per-k diagnostics, ascending in k
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModelSelection {
    /// One row per k
    pub rows: Vec<KDiagnostics>,
}

impl ModelSelection {
    /// Run the stability analysis, then fit PAM and compute silhouettes for
    /// every k it covers.
    pub fn evaluate(
        dissim: &DissimilarityMatrix,
        analysis: &StabilityAnalysis,
        policy: SingletonPolicy,
    ) -> Result<Self> {
        let report = analysis.run(dissim)?;
        Self::from_report(dissim, analysis, &report, policy)
    }

    /// Build the table from an existing stability report, such as one taken
    /// from a [`crate::StabilityCache`].
    ///
    /// `analysis` supplies the PAM settings for the full-data fits; `report`
    /// must describe the same items as `dissim`.
    pub fn from_report(
        dissim: &DissimilarityMatrix,
        analysis: &StabilityAnalysis,
        report: &StabilityReport,
        policy: SingletonPolicy,
    ) -> Result<Self> {
        if report.sample_size > dissim.len() {
            return Err(Error::invalid_data(format!(
                "Stability report sampled {} items but the matrix has {}",
                report.sample_size,
                dissim.len()
            )));
        }
        let seed = analysis.random_state.unwrap_or(0);

        let mut rows = Vec::with_capacity(report.per_k.len());
        for stability in &report.per_k {
            let k = stability.k;
            let clustering = Pam::new(k)
                .init_method(analysis.init_method)
                .max_iter(analysis.max_iter)
                .random_state(seed)
                .fit(dissim)?;
            let silhouette = silhouette(dissim, &clustering.clustering, policy)?;
            let mean_silhouette = silhouette.mean_width();

            if analysis.verbose {
                info!(k, mean_silhouette, stability = stability.mean, "model selection");
            } else {
                debug!(k, mean_silhouette, stability = stability.mean, "model selection");
            }

            rows.push(KDiagnostics {
                k,
                clustering,
                silhouette,
                mean_silhouette,
                stability: stability.clone(),
            });
        }

        Ok(Self { rows })
    }

    /// Row for one k
    pub fn get(&self, k: usize) -> Option<&KDiagnostics> {
        self.rows.iter().find(|row| row.k == k)
    }

    /// `(k, mean silhouette, mean stability)` for plotting
    pub fn summary(&self) -> Vec<(usize, f64, f64)> {
        self.rows
            .iter()
            .map(|row| (row.k, row.mean_silhouette, row.stability.mean))
            .collect()
    }

    /// Smallest k whose mean silhouette is within `silhouette_tolerance` of the
    /// best mean silhouette and whose mean stability is within
    /// `stability_tolerance` of the best mean stability.
    ///
    /// Returns `None` when no row has both metrics defined.
    pub fn suggest_k(&self, silhouette_tolerance: f64, stability_tolerance: f64) -> Result<Option<usize>> {
        if !(silhouette_tolerance >= 0.0) || !(stability_tolerance >= 0.0) {
            return Err(Error::invalid_parameter("tolerances must be >= 0"));
        }

        let defined: Vec<&KDiagnostics> = self
            .rows
            .iter()
            .filter(|row| row.mean_silhouette.is_finite() && row.stability.mean.is_finite())
            .collect();

        let best_silhouette = defined
            .iter()
            .map(|row| row.mean_silhouette)
            .fold(f64::NEG_INFINITY, f64::max);
        let best_stability = defined
            .iter()
            .map(|row| row.stability.mean)
            .fold(f64::NEG_INFINITY, f64::max);

        Ok(defined
            .iter()
            .filter(|row| {
                row.mean_silhouette >= best_silhouette - silhouette_tolerance
                    && row.stability.mean >= best_stability - stability_tolerance
            })
            .map(|row| row.k)
            .min())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Three groups of four: 0.05 apart inside a group, 0.9 across groups
    fn three_groups() -> DissimilarityMatrix {
        let n = 12;
        let values = Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                0.0
            } else if i / 4 == j / 4 {
                0.05
            } else {
                0.9
            }
        });
        let names = (0..n).map(|i| format!("item{}", i)).collect();
        DissimilarityMatrix::from_matrix(names, values).unwrap()
    }

    #[test]
    fn test_evaluate_rows() {
        let selection = ModelSelection::evaluate(
            &three_groups(),
            &StabilityAnalysis::new(2..=4).n_iterations(6).random_state(1),
            SingletonPolicy::Nan,
        )
        .unwrap();

        assert_eq!(selection.rows.len(), 3);
        let k3 = selection.get(3).unwrap();
        assert_eq!(k3.clustering.medoids.len(), 3);
        assert_eq!(k3.silhouette.len(), 12);
        assert!((k3.mean_silhouette - 0.85).abs() < 1e-12);
        assert!(k3.mean_silhouette > selection.get(2).unwrap().mean_silhouette);
        assert!(k3.mean_silhouette > selection.get(4).unwrap().mean_silhouette);
        assert_eq!(k3.stability.mean, 1.0);

        let summary = selection.summary();
        assert_eq!(summary.iter().map(|s| s.0).collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn test_suggest_k() {
        let selection = ModelSelection::evaluate(
            &three_groups(),
            &StabilityAnalysis::new(2..=4).n_iterations(6).random_state(1),
            SingletonPolicy::Nan,
        )
        .unwrap();

        assert_eq!(selection.suggest_k(0.05, 0.05).unwrap(), Some(3));
        assert!(selection.suggest_k(-1.0, 0.0).is_err());
        assert_eq!(ModelSelection { rows: vec![] }.suggest_k(0.1, 0.1).unwrap(), None);
    }

    #[test]
    fn test_from_cached_report() {
        let d = three_groups();
        let analysis = StabilityAnalysis::new(2..=4).n_iterations(6).random_state(1);
        let report = analysis.run(&d).unwrap();

        let from_report = ModelSelection::from_report(&d, &analysis, &report, SingletonPolicy::Nan).unwrap();
        let evaluated = ModelSelection::evaluate(&d, &analysis, SingletonPolicy::Nan).unwrap();
        assert_eq!(from_report.summary(), evaluated.summary());
        assert_eq!(from_report.get(3).unwrap().stability, report.per_k[1]);

        let smaller = d.subset(&[0, 1, 2, 4, 5, 8]).unwrap();
        assert!(matches!(
            ModelSelection::from_report(&smaller, &analysis, &report, SingletonPolicy::Nan),
            Err(Error::InvalidData { .. })
        ));
    }
}
