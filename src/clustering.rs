//! Hard clusterings of named items

use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Assignment of every item to exactly one integer cluster label
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Clustering {
    names: Vec<String>,
    labels: Vec<usize>,
}

impl Clustering {
    /// Pair item names with labels; names must be unique.
    pub fn new(names: Vec<String>, labels: Vec<usize>) -> Result<Self> {
        if names.len() != labels.len() {
            return Err(Error::dimension_mismatch(
                "item names vs. cluster labels",
                names.len(),
                labels.len(),
            ));
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(Error::invalid_data(format!("Duplicate item name '{}'", name)));
            }
        }
        Ok(Self { names, labels })
    }

    /// Number of labelled items
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no item is labelled
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Item names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Labels, aligned with [`Clustering::names`]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Label of a named item
    pub fn label_of(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.labels[i])
    }

    /// Distinct labels in ascending order
    pub fn cluster_ids(&self) -> Vec<usize> {
        let mut ids = self.labels.clone();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Number of distinct labels
    pub fn n_clusters(&self) -> usize {
        self.cluster_ids().len()
    }

    /// Members of one cluster, in item order
    pub fn members(&self, label: usize) -> Vec<&str> {
        self.names
            .iter()
            .zip(&self.labels)
            .filter(|(_, l)| **l == label)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Size of every cluster
    pub fn cluster_sizes(&self) -> BTreeMap<usize, usize> {
        let mut sizes = BTreeMap::new();
        for &label in &self.labels {
            *sizes.entry(label).or_insert(0) += 1;
        }
        sizes
    }

    /// Labels rearranged to follow `order` (a list of item names).
    ///
    /// Fails if any name is not part of this clustering.
    pub fn labels_for<S: AsRef<str>>(&self, order: &[S]) -> Result<Vec<usize>> {
        let lookup: HashMap<&str, usize> = self
            .names
            .iter()
            .map(String::as_str)
            .zip(self.labels.iter().copied())
            .collect();
        order
            .iter()
            .map(|name| {
                let name = name.as_ref();
                lookup
                    .get(name)
                    .copied()
                    .ok_or_else(|| Error::invalid_data(format!("Item '{}' has no cluster label", name)))
            })
            .collect()
    }

    /// Per-item display labels, looked up from one display name per cluster label.
    ///
    /// This is how medoid names are shown in place of integer labels.
    pub fn display_labels<'a>(&self, label_names: &'a [String]) -> Result<Vec<&'a str>> {
        self.labels
            .iter()
            .map(|&label| {
                label_names
                    .get(label)
                    .map(String::as_str)
                    .ok_or_else(|| Error::invalid_data(format!("No display name for cluster {}", label)))
            })
            .collect()
    }
}
