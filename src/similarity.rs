//! Cosine similarity and the angular dissimilarity derived from it
//!
//! A zero-norm vector has no direction, so its cosine similarity with anything
//! is reported as `NaN` rather than an error. Heatmap consumers already treat
//! `NaN` as a missing cell; the clustering stages reject non-finite
//! dissimilarities and name the offending item.

use crate::error::{Error, Result};
use crate::items::ItemVectors;
use crate::utils::{ensure_finite, validate_square};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest asymmetry tolerated when importing a precomputed matrix
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// Returns `NaN` when either vector has zero norm.
pub fn cosine_similarity(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::dimension_mismatch("cosine similarity", a.len(), b.len()));
    }

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(f64::NAN);
    }

    Ok(a.dot(&b) / (norm_a * norm_b))
}

/// Cosine similarity restricted to the indices where `mask` is set.
///
/// Returns `NaN` when no index is selected or either restricted vector has zero norm.
pub fn cosine_similarity_masked(
    a: ArrayView1<f64>,
    b: ArrayView1<f64>,
    mask: ArrayView1<bool>,
) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::dimension_mismatch("cosine similarity", a.len(), b.len()));
    }
    if mask.len() != a.len() {
        return Err(Error::dimension_mismatch("similarity mask", a.len(), mask.len()));
    }

    let (mut dot, mut sq_a, mut sq_b) = (0.0, 0.0, 0.0);
    for ((&x, &y), &keep) in a.iter().zip(b.iter()).zip(mask.iter()) {
        if keep {
            dot += x * y;
            sq_a += x * x;
            sq_b += y * y;
        }
    }

    if sq_a == 0.0 || sq_b == 0.0 {
        return Ok(f64::NAN);
    }
    Ok(dot / (sq_a.sqrt() * sq_b.sqrt()))
}

/// Angular dissimilarity `arccos(clamp(s, -1, 1)) / pi`, in `[0, 1]`.
///
/// `NaN` stays `NaN`.
#[inline]
pub fn angular_dissimilarity(similarity: f64) -> f64 {
    if similarity.is_nan() {
        return f64::NAN;
    }
    similarity.clamp(-1.0, 1.0).acos() / PI
}

/// Symmetric item-by-item cosine similarity matrix
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimilarityMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl SimilarityMatrix {
    /// All-pairs cosine similarity of the items.
    ///
    /// Rows are normalised once, then the upper triangle is filled row by row
    /// in parallel and mirrored into the lower triangle.
    pub fn from_items(items: &ItemVectors) -> Self {
        let vectors = items.vectors();
        let n = vectors.nrows();

        // A zero or non-finite norm leaves the row without a direction.
        let norms: Array1<f64> = vectors.map_axis(Axis(1), |row| row.dot(&row).sqrt());
        let has_direction = |norm: f64| norm.is_finite() && norm > 0.0;
        let mut unit = vectors.to_owned();
        for (mut row, &norm) in unit.rows_mut().into_iter().zip(norms.iter()) {
            if has_direction(norm) {
                row /= norm;
            } else {
                row.fill(f64::NAN);
            }
        }

        let upper: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let ui = unit.row(i);
                (i..n)
                    .map(|j| {
                        if i == j {
                            if has_direction(norms[i]) {
                                1.0
                            } else {
                                f64::NAN
                            }
                        } else {
                            ui.dot(&unit.row(j))
                        }
                    })
                    .collect()
            })
            .collect();

        Self {
            names: items.names().to_vec(),
            values: mirror_upper(n, upper),
        }
    }

    /// All-pairs cosine similarity where each pair only uses the features
    /// present in both items.
    ///
    /// `present` has one row of flags per item, aligned with the item table.
    pub fn from_items_masked(items: &ItemVectors, present: ArrayView2<bool>) -> Result<Self> {
        if present.dim() != items.vectors().dim() {
            return Err(Error::dimension_mismatch(
                "presence flags vs. item vectors",
                items.len() * items.dim(),
                present.len(),
            ));
        }

        let vectors = items.vectors();
        let n = vectors.nrows();
        let upper: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| {
                (i..n)
                    .map(|j| {
                        let mask = &present.row(i) & &present.row(j);
                        cosine_similarity_masked(vectors.row(i), vectors.row(j), mask.view())
                    })
                    .collect::<Result<Vec<f64>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            names: items.names().to_vec(),
            values: mirror_upper(n, upper),
        })
    }

    /// Wrap a precomputed similarity matrix.
    pub fn from_matrix(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        validate_named_square(&names, values.view())?;
        Ok(Self { names, values })
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the matrix has no items
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Item names in row/column order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The raw matrix
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Similarity between items `i` and `j`
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    /// Similarity between two named items
    pub fn get_by_name(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        Some(self.values[[i, j]])
    }

    /// Copy of the matrix with the diagonal set to `NaN`, so self-similarity
    /// does not dominate a heatmap's colour scale.
    pub fn masked_diagonal(&self) -> Array2<f64> {
        let mut out = self.values.clone();
        out.diag_mut().fill(f64::NAN);
        out
    }

    /// Restrict rows and columns to the named items, in the order given.
    pub fn restrict<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let indices = resolve_names(&self.names, names)?;
        Ok(Self {
            names: indices.iter().map(|&i| self.names[i].clone()).collect(),
            values: square_subset(self.values.view(), &indices),
        })
    }

    /// Angular dissimilarity of every pair, with an exact zero diagonal.
    pub fn to_dissimilarity(&self) -> DissimilarityMatrix {
        let mut values = self.values.mapv(angular_dissimilarity);
        for (i, d) in values.diag_mut().iter_mut().enumerate() {
            if self.values[[i, i]].is_finite() {
                *d = 0.0;
            }
        }
        DissimilarityMatrix {
            names: self.names.clone(),
            values,
        }
    }
}

/// Symmetric item-by-item dissimilarity matrix, the input of PAM and silhouette
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DissimilarityMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl DissimilarityMatrix {
    /// Angular dissimilarity derived from a similarity matrix
    pub fn from_similarity(similarity: &SimilarityMatrix) -> Self {
        similarity.to_dissimilarity()
    }

    /// Wrap a precomputed dissimilarity matrix.
    ///
    /// The matrix must be square, symmetric and non-negative with a zero diagonal.
    pub fn from_matrix(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        validate_named_square(&names, values.view())?;
        for ((i, j), &v) in values.indexed_iter() {
            if v < 0.0 {
                return Err(Error::invalid_data(format!(
                    "Negative dissimilarity {} between '{}' and '{}'",
                    v, names[i], names[j]
                )));
            }
            if i == j && v != 0.0 {
                return Err(Error::invalid_data(format!(
                    "Dissimilarity of '{}' to itself must be 0, found {}",
                    names[i], v
                )));
            }
        }
        Ok(Self { names, values })
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the matrix has no items
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Item names in row/column order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The raw matrix
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Dissimilarity between items `i` and `j`
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    /// Restrict rows and columns to the items at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(Error::invalid_parameter(format!(
                "Item index {} out of bounds for {} items",
                bad,
                self.len()
            )));
        }
        Ok(Self {
            names: indices.iter().map(|&i| self.names[i].clone()).collect(),
            values: square_subset(self.values.view(), indices),
        })
    }

    /// Restrict rows and columns to the named items, in the order given.
    pub fn restrict<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        let indices = resolve_names(&self.names, names)?;
        self.subset(&indices)
    }

    /// Fail with `InvalidData` if any entry is non-finite.
    pub fn ensure_finite(&self) -> Result<()> {
        ensure_finite(self.values.view(), &self.names)
    }
}

/// Build a full symmetric matrix from per-row upper-triangle slices.
fn mirror_upper(n: usize, upper: Vec<Vec<f64>>) -> Array2<f64> {
    let mut values = Array2::zeros((n, n));
    for (i, row) in upper.into_iter().enumerate() {
        for (offset, v) in row.into_iter().enumerate() {
            let j = i + offset;
            values[[i, j]] = v;
            values[[j, i]] = v;
        }
    }
    values
}

fn square_subset(values: ArrayView2<f64>, indices: &[usize]) -> Array2<f64> {
    values.select(Axis(0), indices).select(Axis(1), indices)
}

fn resolve_names<S: AsRef<str>>(all: &[String], names: &[S]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            all.iter()
                .position(|n| n == name)
                .ok_or_else(|| Error::invalid_data(format!("Unknown item '{}'", name)))
        })
        .collect()
}

fn validate_named_square(names: &[String], values: ArrayView2<f64>) -> Result<()> {
    validate_square(values)?;
    if names.len() != values.nrows() {
        return Err(Error::dimension_mismatch(
            "item names vs. matrix rows",
            values.nrows(),
            names.len(),
        ));
    }
    let n = values.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (values[[i, j]], values[[j, i]]);
            let both_nan = a.is_nan() && b.is_nan();
            if !both_nan && !((a - b).abs() <= SYMMETRY_TOLERANCE) {
                return Err(Error::invalid_data(format!(
                    "Matrix is not symmetric at ('{}', '{}'): {} vs {}",
                    names[i], names[j], a, b
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, array};

    fn words() -> ItemVectors {
        ItemVectors::from_rows(vec![
            ("king", vec![0.9, 0.1, 0.3]),
            ("queen", vec![0.85, 0.15, 0.35]),
            ("apple", vec![0.0, 1.0, 0.1]),
            ("void", vec![0.0, 0.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_cosine_similarity() {
        let a = arr1(&[1.0, 0.0]);
        let b = arr1(&[0.0, 2.0]);
        let c = arr1(&[3.0, 0.0]);

        assert!(cosine_similarity(a.view(), b.view()).unwrap().abs() < 1e-12);
        assert!((cosine_similarity(a.view(), c.view()).unwrap() - 1.0).abs() < 1e-12);
        assert!((cosine_similarity(a.view(), (-&c).view()).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_vector_is_nan() {
        let a = arr1(&[0.0, 0.0]);
        let b = arr1(&[1.0, 1.0]);
        assert!(cosine_similarity(a.view(), b.view()).unwrap().is_nan());
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let a = arr1(&[1.0, 0.0]);
        let b = arr1(&[1.0, 0.0, 1.0]);
        assert!(matches!(
            cosine_similarity(a.view(), b.view()),
            Err(Error::DimensionMismatch { expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn test_masked_similarity() {
        let a = arr1(&[1.0, 5.0, 0.0]);
        let b = arr1(&[2.0, -5.0, 0.0]);
        let mask = arr1(&[true, false, true]);
        let sim = cosine_similarity_masked(a.view(), b.view(), mask.view()).unwrap();
        assert!((sim - 1.0).abs() < 1e-12);

        let none = arr1(&[false, false, false]);
        assert!(cosine_similarity_masked(a.view(), b.view(), none.view())
            .unwrap()
            .is_nan());
    }

    #[test]
    fn test_matrix_symmetric_with_unit_diagonal() {
        let sim = SimilarityMatrix::from_items(&words());
        for i in 0..3 {
            assert_eq!(sim.get(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(sim.get(i, j), sim.get(j, i));
            }
        }
        assert!(sim.get_by_name("king", "queen").unwrap() > 0.99);
        assert!(sim.get_by_name("void", "void").unwrap().is_nan());
        assert!(sim.get_by_name("void", "king").unwrap().is_nan());
    }

    #[test]
    fn test_matrix_matches_pairwise_function() {
        let items = words();
        let sim = SimilarityMatrix::from_items(&items);
        let direct = cosine_similarity(items.row(0), items.row(2)).unwrap();
        assert!((sim.get(0, 2) - direct).abs() < 1e-12);
    }

    #[test]
    fn test_masked_matrix() {
        let items = ItemVectors::from_rows(vec![
            ("a", vec![1.0, 0.0, 3.0]),
            ("b", vec![2.0, 7.0, 0.0]),
        ])
        .unwrap();
        let present = items.nonzero_presence();
        let sim = SimilarityMatrix::from_items_masked(&items, present.view()).unwrap();
        // Only feature 0 is shared.
        assert!((sim.get(0, 1) - 1.0).abs() < 1e-12);
        assert!((sim.get(0, 0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_masked_diagonal() {
        let sim = SimilarityMatrix::from_items(&words());
        let masked = sim.masked_diagonal();
        assert!(masked.diag().iter().all(|v| v.is_nan()));
        assert_eq!(masked[[0, 1]], sim.get(0, 1));
    }

    #[test]
    fn test_dissimilarity_transform() {
        assert_eq!(angular_dissimilarity(1.0), 0.0);
        assert!((angular_dissimilarity(0.0) - 0.5).abs() < 1e-12);
        assert!((angular_dissimilarity(-1.0) - 1.0).abs() < 1e-12);
        // Slightly above 1 from rounding must not produce NaN.
        assert_eq!(angular_dissimilarity(1.0 + 1e-15), 0.0);
        assert!(angular_dissimilarity(f64::NAN).is_nan());
    }

    #[test]
    fn test_dissimilarity_matrix() {
        let dissim = SimilarityMatrix::from_items(&words()).to_dissimilarity();
        for i in 0..3 {
            assert_eq!(dissim.get(i, i), 0.0);
            for j in 0..3 {
                assert_eq!(dissim.get(i, j), dissim.get(j, i));
                assert!((0.0..=1.0).contains(&dissim.get(i, j)));
            }
        }
        assert!(dissim.ensure_finite().is_err());
        assert!(dissim.restrict(&["king", "queen", "apple"]).unwrap().ensure_finite().is_ok());
    }

    #[test]
    fn test_from_matrix_validation() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert!(DissimilarityMatrix::from_matrix(names.clone(), array![[0.0, 0.3], [0.3, 0.0]]).is_ok());
        assert!(DissimilarityMatrix::from_matrix(names.clone(), array![[0.0, 0.3], [0.4, 0.0]]).is_err());
        assert!(DissimilarityMatrix::from_matrix(names.clone(), array![[0.1, 0.3], [0.3, 0.0]]).is_err());
        assert!(DissimilarityMatrix::from_matrix(names, array![[0.0, 0.3, 0.1], [0.3, 0.0, 0.2]]).is_err());
    }

    #[test]
    fn test_subset() {
        let dissim = SimilarityMatrix::from_items(&words()).to_dissimilarity();
        let sub = dissim.subset(&[2, 0]).unwrap();
        assert_eq!(sub.names(), &["apple".to_string(), "king".to_string()]);
        assert_eq!(sub.get(0, 1), dissim.get(2, 0));
        assert!(dissim.subset(&[7]).is_err());
    }

    #[test]
    fn test_missing_value_row_matches_pairwise_function() {
        let items = ItemVectors::from_rows(vec![
            ("king", vec![0.9, 0.1, 0.3]),
            ("blank", vec![f64::NAN, 1.0, 0.0]),
        ])
        .unwrap();
        let sim = SimilarityMatrix::from_items(&items);
        let direct = cosine_similarity(items.row(1), items.row(1)).unwrap();

        assert!(direct.is_nan());
        assert!(sim.get(1, 1).is_nan());
        assert!(sim.get(0, 1).is_nan());
        assert_eq!(sim.get(0, 0), 1.0);
        assert!(sim.to_dissimilarity().get(1, 1).is_nan());
    }
}
