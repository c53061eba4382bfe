//! # Cosine medoid clustering with stability analysis
//!
//! This crate clusters named vectors (typically word embeddings) by cosine
//! similarity and measures how trustworthy each choice of cluster count is.
//!
//! ## Features
//!
//! - **Similarity**: all-pairs cosine similarity, with optional co-occurrence masking
//! - **Dissimilarity**: angular distance `arccos(s) / pi`, clamped against rounding
//! - **PAM**: partitioning around medoids on a precomputed dissimilarity matrix
//! - **Silhouette**: per-item `b - a` widths with an explicit singleton policy
//! - **Stability**: Jaccard similarity of sub-sampled clusterings, per cluster count
//! - Parallel processing support via Rayon, reproducible from a single seed
//!
//! ## Example
//!
//! ```rust
//! use cosine_pam::{ItemVectors, Pam, SimilarityMatrix, SingletonPolicy, silhouette};
//!
//! let items = ItemVectors::from_rows(vec![
//!     ("cat", vec![0.9, 0.1, 0.0]),
//!     ("dog", vec![0.8, 0.2, 0.0]),
//!     ("car", vec![0.0, 0.1, 0.9]),
//!     ("bus", vec![0.1, 0.0, 0.8]),
//! ]).unwrap();
//!
//! let dissim = SimilarityMatrix::from_items(&items).to_dissimilarity();
//! let fit = Pam::new(2).fit(&dissim).unwrap();
//! assert_eq!(fit.clustering.label_of("cat"), fit.clustering.label_of("dog"));
//!
//! let widths = silhouette(&dissim, &fit.clustering, SingletonPolicy::Nan).unwrap();
//! assert!(widths.mean_width() > 0.3);
//! ```

#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod cache;
pub mod clustering;
pub mod error;
pub mod initialization;
pub mod items;
pub mod jaccard;
#[cfg(feature = "serde")]
mod nan_serde;
pub mod pam;
pub mod selection;
pub mod silhouette;
pub mod similarity;
pub mod stability;
pub mod utils;

pub use cache::{CacheKey, StabilityCache};
pub use clustering::Clustering;
pub use error::{Error, Result};
pub use initialization::InitMethod;
pub use items::ItemVectors;
pub use jaccard::{partition_jaccard, subsample_jaccard};
pub use pam::{MedoidClustering, Pam, PamResult};
pub use selection::{KDiagnostics, ModelSelection};
pub use silhouette::{mean_silhouette_width, silhouette, silhouette_widths, SilhouetteResult, SingletonPolicy};
pub use similarity::{
    angular_dissimilarity, cosine_similarity, cosine_similarity_masked, DissimilarityMatrix,
    SimilarityMatrix,
};
pub use stability::{KStability, StabilityAnalysis, StabilityReport, StabilityRun};

/// Re-export commonly used types from ndarray
pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
