//! Initialization methods for partitioning around medoids

use crate::error::{Error, Result};
use crate::utils::validate_cluster_count;
use ndarray::ArrayView2;
use rand::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Initialization methods for choosing the starting medoids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InitMethod {
    /// Kaufman & Rousseeuw BUILD: greedy, deterministic
    Build,
    /// Randomly select k distinct items as initial medoids
    Random,
}

/// Choose `n_clusters` initial medoids (item indices) from a dissimilarity matrix
pub fn initialize_medoids<R>(
    dissim: ArrayView2<f64>,
    n_clusters: usize,
    method: InitMethod,
    rng: &mut R,
) -> Result<Vec<usize>>
where
    R: Rng,
{
    validate_cluster_count(n_clusters, dissim.nrows())?;

    match method {
        InitMethod::Build => build_init(dissim, n_clusters),
        InitMethod::Random => Ok(random_init(dissim.nrows(), n_clusters, rng)),
    }
}

/// Random initialization: k distinct items, uniformly
fn random_init<R: Rng>(n_items: usize, n_clusters: usize, rng: &mut R) -> Vec<usize> {
    rand::seq::index::sample(rng, n_items, n_clusters).into_vec()
}

/// BUILD initialization.
///
/// The first medoid minimises the total dissimilarity to all items. Each
/// further medoid is the item that most reduces the total distance of every
/// item to its nearest chosen medoid. Ties go to the lowest index.
fn build_init(dissim: ArrayView2<f64>, n_clusters: usize) -> Result<Vec<usize>> {
    let n = dissim.nrows();

    let mut first = 0;
    let mut first_cost = f64::INFINITY;
    for i in 0..n {
        let cost = dissim.row(i).sum();
        if cost < first_cost {
            first = i;
            first_cost = cost;
        }
    }

    let mut medoids = Vec::with_capacity(n_clusters);
    medoids.push(first);
    let mut is_medoid = vec![false; n];
    is_medoid[first] = true;
    let mut nearest: Vec<f64> = dissim.row(first).to_vec();

    while medoids.len() < n_clusters {
        let mut best: Option<(usize, f64)> = None;
        for candidate in (0..n).filter(|&c| !is_medoid[c]) {
            let gain: f64 = (0..n)
                .map(|j| (nearest[j] - dissim[[j, candidate]]).max(0.0))
                .sum();
            match best {
                Some((_, best_gain)) if best_gain >= gain => {}
                _ => best = Some((candidate, gain)),
            }
        }

        let (chosen, _) = best.ok_or_else(|| Error::degenerate_cluster_count(n_clusters, n))?;
        medoids.push(chosen);
        is_medoid[chosen] = true;
        for (j, d) in nearest.iter_mut().enumerate() {
            *d = d.min(dissim[[j, chosen]]);
        }
    }

    Ok(medoids)
}
