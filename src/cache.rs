//! Caching of stability reports between sessions
//!
//! A report is keyed by a SHA-256 digest of everything that determines it:
//! the matrix (names and values), the k range, the number of runs, the
//! sample fraction, the seed and the PAM settings. Changing any of them gives
//! a different key, so stale entries are never returned.

use crate::error::Result;
use crate::similarity::DissimilarityMatrix;
use crate::stability::{StabilityAnalysis, StabilityReport};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identity of a stability computation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CacheKey(String);

impl CacheKey {
    /// Digest the inputs of `analysis.run(dissim)`
    pub fn new(dissim: &DissimilarityMatrix, analysis: &StabilityAnalysis) -> Self {
        let mut hasher = Sha256::new();

        hasher.update((dissim.len() as u64).to_le_bytes());
        for name in dissim.names() {
            hasher.update((name.len() as u64).to_le_bytes());
            hasher.update(name.as_bytes());
        }
        for v in dissim.values().iter() {
            hasher.update(v.to_bits().to_le_bytes());
        }

        hasher.update((analysis.k_min as u64).to_le_bytes());
        hasher.update((analysis.k_max as u64).to_le_bytes());
        hasher.update((analysis.n_iterations as u64).to_le_bytes());
        hasher.update(analysis.sample_fraction.to_bits().to_le_bytes());
        hasher.update(analysis.random_state.unwrap_or(0).to_le_bytes());
        hasher.update(format!("{:?}", analysis.init_method).as_bytes());
        hasher.update((analysis.max_iter as u64).to_le_bytes());
        hasher.update([analysis.keep_runs as u8]);

        let digest = hasher.finalize();
        Self(digest.iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stability reports keyed by their inputs
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StabilityCache {
    entries: HashMap<CacheKey, StabilityReport>,
}

impl StabilityCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached reports
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached report for a key
    pub fn get(&self, key: &CacheKey) -> Option<&StabilityReport> {
        self.entries.get(key)
    }

    /// Store a report
    pub fn insert(&mut self, key: CacheKey, report: StabilityReport) {
        self.entries.insert(key, report);
    }

    /// Drop one report
    pub fn invalidate(&mut self, key: &CacheKey) -> Option<StabilityReport> {
        self.entries.remove(key)
    }

    /// Drop every report
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return the cached report, computing and storing it on a miss
    pub fn get_or_compute(
        &mut self,
        dissim: &DissimilarityMatrix,
        analysis: &StabilityAnalysis,
    ) -> Result<&StabilityReport> {
        let key = CacheKey::new(dissim, analysis);
        if self.entries.contains_key(&key) {
            debug!(key = %key, "stability cache hit");
        } else {
            debug!(key = %key, "stability cache miss");
            let report = analysis.run(dissim)?;
            self.entries.insert(key.clone(), report);
        }
        Ok(&self.entries[&key])
    }

    /// Write the cache as JSON
    #[cfg(feature = "serde")]
    pub fn save_json(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    /// Read a cache written by [`StabilityCache::save_json`]
    #[cfg(feature = "serde")]
    pub fn load_json(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix() -> DissimilarityMatrix {
        DissimilarityMatrix::from_matrix(
            vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
            array![
                [0.0, 0.1, 0.9, 0.9, 0.8],
                [0.1, 0.0, 0.9, 0.8, 0.9],
                [0.9, 0.9, 0.0, 0.1, 0.2],
                [0.9, 0.8, 0.1, 0.0, 0.1],
                [0.8, 0.9, 0.2, 0.1, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_key_depends_on_every_input() {
        let d = matrix();
        let analysis = StabilityAnalysis::new(2..=3).n_iterations(4).random_state(1);
        let key = CacheKey::new(&d, &analysis);

        assert_eq!(key, CacheKey::new(&d, &analysis.clone()));
        assert_eq!(key.as_str().len(), 64);
        assert_ne!(key, CacheKey::new(&d, &analysis.clone().random_state(2)));
        assert_ne!(key, CacheKey::new(&d, &analysis.clone().n_iterations(6)));
        assert_ne!(key, CacheKey::new(&d, &StabilityAnalysis::new(2..=2).n_iterations(4).random_state(1)));
        assert_ne!(key, CacheKey::new(&d, &analysis.clone().sample_fraction(0.8)));

        let other = d.restrict(&["a", "b", "c", "e", "d"]).unwrap();
        assert_ne!(key, CacheKey::new(&other, &analysis));
    }

    #[test]
    fn test_get_or_compute() {
        let d = matrix();
        let analysis = StabilityAnalysis::new(2..=2).n_iterations(2).sample_fraction(1.0);
        let mut cache = StabilityCache::new();

        let first = cache.get_or_compute(&d, &analysis).unwrap().clone();
        assert_eq!(cache.len(), 1);
        let second = cache.get_or_compute(&d, &analysis).unwrap().clone();
        assert_eq!(cache.len(), 1);
        assert_eq!(first, second);

        let key = CacheKey::new(&d, &analysis);
        assert!(cache.get(&key).is_some());
        assert!(cache.invalidate(&key).is_some());
        assert!(cache.is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_save_and_load() {
        let d = matrix();
        let analysis = StabilityAnalysis::new(2..=3).n_iterations(4).random_state(8).keep_runs(true);
        let mut cache = StabilityCache::new();
        let report = cache.get_or_compute(&d, &analysis).unwrap().clone();

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("stability.json");
        cache.save_json(&path).unwrap();

        let loaded = StabilityCache::load_json(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(&CacheKey::new(&d, &analysis)), Some(&report));
        assert!(StabilityCache::load_json(dir.path().join("missing.json")).is_err());
    }
}
