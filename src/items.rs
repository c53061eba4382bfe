//! Named feature vectors (one row per item, one column per embedding dimension)

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use std::collections::HashMap;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An items-by-features table: each row is the vector of one named item
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ItemVectors {
    names: Vec<String>,
    vectors: Array2<f64>,
}

impl ItemVectors {
    /// Create a table from item names and a row-per-item matrix.
    ///
    /// Names must be unique and there must be exactly one name per row.
    pub fn new(names: Vec<String>, vectors: Array2<f64>) -> Result<Self> {
        if names.len() != vectors.nrows() {
            return Err(Error::dimension_mismatch(
                "item names vs. vector rows",
                vectors.nrows(),
                names.len(),
            ));
        }
        if vectors.nrows() == 0 {
            return Err(Error::invalid_data("Item table cannot be empty"));
        }
        if vectors.ncols() == 0 {
            return Err(Error::invalid_data("Items must have at least one feature"));
        }

        let mut seen = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if let Some(first) = seen.insert(name.as_str(), idx) {
                return Err(Error::invalid_data(format!(
                    "Duplicate item name '{}' at rows {} and {}",
                    name, first, idx
                )));
            }
        }

        Ok(Self { names, vectors })
    }

    /// Create a table from `(name, vector)` rows; all vectors must share one dimension.
    pub fn from_rows<S: Into<String>>(rows: Vec<(S, Vec<f64>)>) -> Result<Self> {
        let dim = rows
            .first()
            .map(|(_, v)| v.len())
            .ok_or_else(|| Error::invalid_data("Item table cannot be empty"))?;

        let mut names = Vec::with_capacity(rows.len());
        let mut flat = Vec::with_capacity(rows.len() * dim);
        for (name, vector) in rows {
            if vector.len() != dim {
                return Err(Error::dimension_mismatch("feature vectors", dim, vector.len()));
            }
            names.push(name.into());
            flat.extend(vector);
        }

        let vectors = Array2::from_shape_vec((names.len(), dim), flat)
            .map_err(|e| Error::invalid_data(e.to_string()))?;
        Self::new(names, vectors)
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the table has no items
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Feature dimension D
    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    /// Item names in row order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The underlying matrix
    pub fn vectors(&self) -> ArrayView2<'_, f64> {
        self.vectors.view()
    }

    /// Vector of the item at `idx`
    pub fn row(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.vectors.row(idx)
    }

    /// Row index of a named item
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Vector of a named item
    pub fn vector(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.index_of(name).map(|idx| self.vectors.row(idx))
    }

    /// Restrict the table to the given names, in the order given.
    pub fn restrict_to<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let lookup: HashMap<&str, usize> = self
            .names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();

        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let idx = lookup
                .get(name)
                .copied()
                .ok_or_else(|| Error::invalid_data(format!("Unknown item '{}'", name)))?;
            indices.push(idx);
        }

        let kept_names = indices.iter().map(|&i| self.names[i].clone()).collect();
        Self::new(kept_names, self.vectors.select(Axis(0), &indices))
    }

    /// Drop every item whose vector contains a missing (non-finite) value.
    pub fn drop_missing(&self) -> Result<Self> {
        let keep: Vec<usize> = self
            .vectors
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(|v| v.is_finite()))
            .map(|(i, _)| i)
            .collect();

        if keep.len() < self.len() {
            debug!(
                dropped = self.len() - keep.len(),
                kept = keep.len(),
                "dropping items with missing feature values"
            );
        }

        let kept_names = keep.iter().map(|&i| self.names[i].clone()).collect();
        Self::new(kept_names, self.vectors.select(Axis(0), &keep))
    }

    /// Presence flags: a feature is present for an item when it is finite and nonzero.
    ///
    /// Used with [`crate::SimilarityMatrix::from_items_masked`] for co-occurrence masking.
    pub fn nonzero_presence(&self) -> Array2<bool> {
        self.vectors.mapv(|v| v.is_finite() && v != 0.0)
    }
}
