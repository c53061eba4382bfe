//! Silhouette widths over an angular dissimilarity matrix
//!
//! For item `i` with label `c`:
//!
//! ```text
//! a(i) = mean d(i, j) over the other members j of c
//! b(i) = min over labels c' != c of mean d(i, j) over members j of c'
//! width(i) = b(i) - a(i)
//! ```
//!
//! With dissimilarities in `[0, 1]` the width lies in `[-1, 1]`. Positive
//! widths mean the item sits closer to its own cluster than to any other.
//!
//! `a(i)` is undefined when `i` is alone in its cluster. What happens then is
//! chosen with [`SingletonPolicy`]; the default reports `NaN` and leaves the
//! item out of every average.

use crate::clustering::Clustering;
use crate::error::{Error, Result};
use crate::similarity::DissimilarityMatrix;
use crate::utils::{densify_labels, ensure_finite, validate_cluster_count, validate_square};
use ndarray::ArrayView2;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Width reported for an item that is the only member of its cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SingletonPolicy {
    /// `NaN`, excluded from means
    #[default]
    Nan,
    /// `0.0`, included in means (Rousseeuw's convention)
    Zero,
}

/// Per-item silhouette widths
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SilhouetteResult {
    /// Item names, in dissimilarity-matrix order
    pub names: Vec<String>,
    /// Cluster label of each item
    pub labels: Vec<usize>,
    /// Silhouette width of each item
    #[cfg_attr(feature = "serde", serde(with = "crate::nan_serde::vec"))]
    pub widths: Vec<f64>,
    /// Mean dissimilarity to the item's own cluster, `a(i)`
    #[cfg_attr(feature = "serde", serde(with = "crate::nan_serde::vec"))]
    pub intra: Vec<f64>,
    /// Mean dissimilarity to the nearest other cluster, `b(i)`
    #[cfg_attr(feature = "serde", serde(with = "crate::nan_serde::vec"))]
    pub nearest: Vec<f64>,
    /// Label of the nearest other cluster
    pub neighbors: Vec<usize>,
}

impl SilhouetteResult {
    /// Number of items
    pub fn len(&self) -> usize {
        self.widths.len()
    }

    /// Whether there are no items
    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    /// Width of a named item
    pub fn width_of(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.widths[i])
    }

    /// Mean width over items with a defined width; `NaN` if there are none.
    pub fn mean_width(&self) -> f64 {
        mean_defined(self.widths.iter().copied())
    }

    /// Number of items whose width is undefined (`NaN`)
    pub fn n_undefined(&self) -> usize {
        self.widths.iter().filter(|w| w.is_nan()).count()
    }

    /// Mean width of each cluster
    pub fn cluster_means(&self) -> BTreeMap<usize, f64> {
        let mut grouped: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for (&label, &width) in self.labels.iter().zip(&self.widths) {
            grouped.entry(label).or_default().push(width);
        }
        grouped
            .into_iter()
            .map(|(label, widths)| (label, mean_defined(widths.into_iter())))
            .collect()
    }

    /// Item indices ordered by cluster, then by decreasing width (undefined last),
    /// the usual order for a silhouette bar plot
    pub fn sorted_by_cluster(&self) -> Vec<usize> {
        let key = |w: f64| if w.is_nan() { f64::NEG_INFINITY } else { w };
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&x, &y| {
            self.labels[x]
                .cmp(&self.labels[y])
                .then_with(|| key(self.widths[y]).total_cmp(&key(self.widths[x])))
                .then_with(|| x.cmp(&y))
        });
        order
    }
}

/// Silhouette widths of a named clustering.
///
/// Every item of the matrix must carry a label, and the clustering must not
/// label items outside the matrix.
pub fn silhouette(
    dissim: &DissimilarityMatrix,
    clustering: &Clustering,
    policy: SingletonPolicy,
) -> Result<SilhouetteResult> {
    if clustering.len() != dissim.len() {
        return Err(Error::dimension_mismatch(
            "clustering vs. dissimilarity matrix",
            dissim.len(),
            clustering.len(),
        ));
    }
    let labels = clustering.labels_for(dissim.names())?;
    ensure_finite(dissim.values(), dissim.names())?;

    let rows = silhouette_rows(dissim.values(), &labels, policy)?;
    let mut result = SilhouetteResult {
        names: dissim.names().to_vec(),
        labels,
        widths: Vec::with_capacity(rows.len()),
        intra: Vec::with_capacity(rows.len()),
        nearest: Vec::with_capacity(rows.len()),
        neighbors: Vec::with_capacity(rows.len()),
    };
    for row in rows {
        result.widths.push(row.width);
        result.intra.push(row.intra);
        result.nearest.push(row.nearest);
        result.neighbors.push(row.neighbor);
    }

    debug!(
        items = result.len(),
        undefined = result.n_undefined(),
        mean_width = result.mean_width(),
        "silhouette computed"
    );
    Ok(result)
}

/// Silhouette widths for a raw matrix and one label per row
pub fn silhouette_widths(
    dissim: ArrayView2<f64>,
    labels: &[usize],
    policy: SingletonPolicy,
) -> Result<Vec<f64>> {
    ensure_finite(dissim, &[])?;
    Ok(silhouette_rows(dissim, labels, policy)?
        .into_iter()
        .map(|row| row.width)
        .collect())
}

/// Mean silhouette width for a raw matrix; undefined widths are skipped
pub fn mean_silhouette_width(
    dissim: ArrayView2<f64>,
    labels: &[usize],
    policy: SingletonPolicy,
) -> Result<f64> {
    Ok(mean_defined(silhouette_widths(dissim, labels, policy)?.into_iter()))
}

struct SilhouetteRow {
    width: f64,
    intra: f64,
    nearest: f64,
    neighbor: usize,
}

fn silhouette_rows(
    dissim: ArrayView2<f64>,
    labels: &[usize],
    policy: SingletonPolicy,
) -> Result<Vec<SilhouetteRow>> {
    validate_square(dissim)?;
    let n = dissim.nrows();
    if labels.len() != n {
        return Err(Error::dimension_mismatch("cluster labels vs. matrix rows", n, labels.len()));
    }

    let (dense, originals) = densify_labels(labels);
    let k = originals.len();
    validate_cluster_count(k, n)?;

    let mut counts = vec![0usize; k];
    for &c in &dense {
        counts[c] += 1;
    }

    // One pass over row i gathers the sum to every cluster at once.
    let rows = (0..n)
        .into_par_iter()
        .map(|i| {
            let own = dense[i];
            let mut sums = vec![0.0; k];
            for (j, &d) in dissim.row(i).iter().enumerate() {
                if j != i {
                    sums[dense[j]] += d;
                }
            }

            let (neighbor, nearest) = (0..k)
                .filter(|&c| c != own)
                .map(|c| (c, sums[c] / counts[c] as f64))
                .fold((own, f64::INFINITY), |best, cand| {
                    if cand.1 < best.1 {
                        cand
                    } else {
                        best
                    }
                });

            let (intra, width) = if counts[own] > 1 {
                let a = sums[own] / (counts[own] - 1) as f64;
                (a, nearest - a)
            } else {
                match policy {
                    SingletonPolicy::Nan => (f64::NAN, f64::NAN),
                    SingletonPolicy::Zero => (f64::NAN, 0.0),
                }
            };

            SilhouetteRow {
                width,
                intra,
                nearest,
                neighbor: originals[neighbor],
            }
        })
        .collect();

    Ok(rows)
}

fn mean_defined(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
