//! Utility functions shared by the clustering and validation stages

use crate::error::{Error, Result};
use ndarray::{Array1, ArrayView2};

/// Nearest and second-nearest medoid for every item
#[derive(Debug, Clone)]
pub struct MedoidDistances {
    /// Position (in the medoid list) of each item's nearest medoid
    pub nearest: Vec<usize>,
    /// Dissimilarity to the nearest medoid
    pub nearest_dist: Vec<f64>,
    /// Dissimilarity to the second-nearest medoid (`INFINITY` when k == 1)
    pub second_dist: Vec<f64>,
}

/// Compute nearest/second-nearest medoid for every item.
///
/// A medoid is always its own nearest medoid, even if another medoid sits at
/// distance zero, so no cluster is left empty.
pub fn medoid_distances(dissim: ArrayView2<f64>, medoids: &[usize]) -> MedoidDistances {
    let n = dissim.nrows();
    let mut nearest = vec![0; n];
    let mut nearest_dist = vec![f64::INFINITY; n];
    let mut second_dist = vec![f64::INFINITY; n];

    for j in 0..n {
        for (pos, &m) in medoids.iter().enumerate() {
            let d = dissim[[j, m]];
            if d < nearest_dist[j] {
                second_dist[j] = nearest_dist[j];
                nearest_dist[j] = d;
                nearest[j] = pos;
            } else if d < second_dist[j] {
                second_dist[j] = d;
            }
        }
    }

    for (pos, &m) in medoids.iter().enumerate() {
        if nearest[m] != pos {
            second_dist[m] = nearest_dist[m];
            nearest[m] = pos;
            nearest_dist[m] = 0.0;
        }
    }

    MedoidDistances {
        nearest,
        nearest_dist,
        second_dist,
    }
}

/// Assign every item to its nearest medoid; labels are positions in `medoids`.
pub fn assign_to_medoids(dissim: ArrayView2<f64>, medoids: &[usize]) -> Array1<usize> {
    Array1::from_vec(medoid_distances(dissim, medoids).nearest)
}

/// Total dissimilarity of every item to its assigned medoid
pub fn total_cost(dissim: ArrayView2<f64>, medoids: &[usize], labels: &[usize]) -> Result<f64> {
    let mut cost = 0.0;
    for (item, &label) in labels.iter().enumerate() {
        let medoid = medoids
            .get(label)
            .ok_or_else(|| Error::invalid_data("Invalid cluster assignment"))?;
        cost += dissim[[item, *medoid]];
    }
    Ok(cost)
}

/// Map arbitrary labels onto `0..k` in order of first appearance.
///
/// Returns the dense labels and the original label of each dense id.
pub fn densify_labels(labels: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut originals: Vec<usize> = Vec::new();
    let dense = labels
        .iter()
        .map(|&label| match originals.iter().position(|&o| o == label) {
            Some(pos) => pos,
            None => {
                originals.push(label);
                originals.len() - 1
            }
        })
        .collect();
    (dense, originals)
}

/// Number of unordered pairs among `n` items
#[inline]
pub fn pair_count(n: usize) -> u64 {
    let n = n as u64;
    n * n.saturating_sub(1) / 2
}

/// Validate a cluster count against the number of items: `2 <= k < n`.
pub fn validate_cluster_count(n_clusters: usize, n_items: usize) -> Result<()> {
    if n_clusters < 2 || n_clusters >= n_items {
        return Err(Error::degenerate_cluster_count(n_clusters, n_items));
    }
    Ok(())
}

/// Validate clustering parameters
pub fn validate_parameters(max_iter: usize, tol: f64, n_init: usize) -> Result<()> {
    if max_iter == 0 {
        return Err(Error::invalid_parameter("max_iter must be > 0"));
    }

    if !(tol >= 0.0) {
        return Err(Error::invalid_parameter("tol must be >= 0"));
    }

    if n_init == 0 {
        return Err(Error::invalid_parameter("n_init must be > 0"));
    }

    Ok(())
}

/// Validate that a matrix is square and non-empty
pub fn validate_square(values: ArrayView2<f64>) -> Result<()> {
    if values.nrows() == 0 {
        return Err(Error::invalid_data("Matrix cannot be empty"));
    }
    if values.nrows() != values.ncols() {
        return Err(Error::dimension_mismatch(
            "square matrix",
            values.nrows(),
            values.ncols(),
        ));
    }
    Ok(())
}

/// Fail on the first non-finite entry, naming both items when names are given.
pub fn ensure_finite(values: ArrayView2<f64>, names: &[String]) -> Result<()> {
    let label = |i: usize| {
        names
            .get(i)
            .cloned()
            .unwrap_or_else(|| format!("#{}", i))
    };
    match values.indexed_iter().find(|(_, v)| !v.is_finite()) {
        Some(((i, j), v)) => Err(Error::invalid_data(format!(
            "Non-finite dissimilarity {} between '{}' and '{}' (zero vector?)",
            v,
            label(i),
            label(j)
        ))),
        None => Ok(()),
    }
}
