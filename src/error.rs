//! Error types for the cosine-pam crate

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during similarity, clustering and validation
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input parameters
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Error message
        message: String,
    },

    /// Empty or invalid data
    #[error("Invalid data: {message}")]
    InvalidData {
        /// Error message
        message: String,
    },

    /// Two inputs that must agree in size do not
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// What was being compared
        context: &'static str,
        /// Expected size
        expected: usize,
        /// Size actually found
        found: usize,
    },

    /// Cluster count outside `2..n_items`
    #[error("Degenerate cluster count: requested {requested} clusters for {n_items} items (need 2 <= k < n)")]
    DegenerateClusterCount {
        /// Requested number of clusters
        requested: usize,
        /// Number of items available
        n_items: usize,
    },

    /// Cache file could not be read or written
    #[cfg(feature = "serde")]
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache file could not be (de)serialized
    #[cfg(feature = "serde")]
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new InvalidParameter error
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a new InvalidData error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new DimensionMismatch error
    pub fn dimension_mismatch(context: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context,
            expected,
            found,
        }
    }

    /// Create a new DegenerateClusterCount error
    pub fn degenerate_cluster_count(requested: usize, n_items: usize) -> Self {
        Self::DegenerateClusterCount { requested, n_items }
    }
}
