//! Jaccard similarity between two partitions of the same items
//!
//! Over all unordered item pairs, let `n11` count pairs that both partitions
//! put together, and `n10` / `n01` pairs that only one of them does:
//!
//! ```text
//! J = n11 / (n11 + n10 + n01)
//! ```
//!
//! The counts come from the contingency table of the two labelings, so the
//! cost is linear in the number of items.

use crate::error::{Error, Result};
use crate::utils::pair_count;
use std::collections::HashMap;

/// Jaccard similarity of two labelings of the same items.
///
/// When neither partition puts any pair together the partitions agree
/// completely and the result is `1.0`.
pub fn partition_jaccard(a: &[usize], b: &[usize]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::dimension_mismatch("partitions compared by Jaccard", a.len(), b.len()));
    }

    let mut joint: HashMap<(usize, usize), usize> = HashMap::new();
    let mut sizes_a: HashMap<usize, usize> = HashMap::new();
    let mut sizes_b: HashMap<usize, usize> = HashMap::new();
    for (&la, &lb) in a.iter().zip(b) {
        *joint.entry((la, lb)).or_insert(0) += 1;
        *sizes_a.entry(la).or_insert(0) += 1;
        *sizes_b.entry(lb).or_insert(0) += 1;
    }

    let together_both: u64 = joint.values().map(|&n| pair_count(n)).sum();
    let together_a: u64 = sizes_a.values().map(|&n| pair_count(n)).sum();
    let together_b: u64 = sizes_b.values().map(|&n| pair_count(n)).sum();
    let together_either = together_a + together_b - together_both;

    if together_either == 0 {
        return Ok(1.0);
    }
    Ok(together_both as f64 / together_either as f64)
}

/// Labels of the items present in both sub-samples, aligned by item.
///
/// `indices_*` are sorted original item indices and `labels_*` the labels of
/// those items in each run. Items missing from either run are skipped.
pub fn intersect_labels(
    indices_a: &[usize],
    labels_a: &[usize],
    indices_b: &[usize],
    labels_b: &[usize],
) -> Result<(Vec<usize>, Vec<usize>)> {
    if indices_a.len() != labels_a.len() {
        return Err(Error::dimension_mismatch("sub-sample indices vs. labels", indices_a.len(), labels_a.len()));
    }
    if indices_b.len() != labels_b.len() {
        return Err(Error::dimension_mismatch("sub-sample indices vs. labels", indices_b.len(), labels_b.len()));
    }

    let mut shared_a = Vec::new();
    let mut shared_b = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < indices_a.len() && j < indices_b.len() {
        match indices_a[i].cmp(&indices_b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                shared_a.push(labels_a[i]);
                shared_b.push(labels_b[j]);
                i += 1;
                j += 1;
            }
        }
    }
    Ok((shared_a, shared_b))
}

/// Jaccard similarity of two sub-sampled clusterings over the items they share
pub fn subsample_jaccard(
    indices_a: &[usize],
    labels_a: &[usize],
    indices_b: &[usize],
    labels_b: &[usize],
) -> Result<f64> {
    let (a, b) = intersect_labels(indices_a, labels_a, indices_b, labels_b)?;
    partition_jaccard(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_partitions() {
        let a = [0, 0, 1, 1, 2];
        assert_eq!(partition_jaccard(&a, &a).unwrap(), 1.0);
    }

    #[test]
    fn test_relabeled_partitions_are_identical() {
        let a = [0, 0, 1, 1];
        let b = [5, 5, 3, 3];
        assert_eq!(partition_jaccard(&a, &b).unwrap(), 1.0);
    }

    #[test]
    fn test_by_hand() {
        // a together: (0,1), (2,3); b together: (0,1), (0,2), (1,2)
        let a = [0, 0, 1, 1];
        let b = [0, 0, 0, 1];
        // both: (0,1) -> 1; either: 2 + 3 - 1 = 4
        assert!((partition_jaccard(&a, &b).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(
            partition_jaccard(&a, &b).unwrap(),
            partition_jaccard(&b, &a).unwrap()
        );
    }

    #[test]
    fn test_disjoint_partitions() {
        let a = [0, 0, 1, 1];
        let b = [0, 1, 0, 1];
        assert_eq!(partition_jaccard(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn test_all_singletons() {
        assert_eq!(partition_jaccard(&[0, 1, 2], &[2, 1, 0]).unwrap(), 1.0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(partition_jaccard(&[0, 1], &[0]).is_err());
    }

    #[test]
    fn test_intersection() {
        let (a, b) = intersect_labels(&[0, 2, 3, 5], &[0, 1, 1, 2], &[1, 2, 5, 6], &[9, 8, 7, 6]).unwrap();
        assert_eq!(a, vec![1, 2]);
        assert_eq!(b, vec![8, 7]);

        assert!(intersect_labels(&[0, 1], &[0], &[0], &[0]).is_err());
    }

    #[test]
    fn test_subsample_jaccard_uses_shared_items() {
        // Item 4 disagrees, but it is missing from run b.
        let j = subsample_jaccard(&[0, 1, 2, 3, 4], &[0, 0, 1, 1, 0], &[0, 1, 2, 3], &[1, 1, 0, 0]).unwrap();
        assert_eq!(j, 1.0);
    }
}
