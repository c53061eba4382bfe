//! Word-vector clustering walkthrough
//!
//! Builds a cosine dissimilarity matrix for a handful of toy word vectors,
//! scans k = 2..=5 for silhouette and sub-sampling stability, and prints the
//! chosen clustering with medoid names as cluster labels.
//!
//! Run with `RUST_LOG=cosine_pam=debug` to see progress logging.

use cosine_pam::{
    ItemVectors, ModelSelection, SimilarityMatrix, SingletonPolicy, StabilityAnalysis,
    StabilityCache,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Dimensions loosely: [animal, vehicle, food, emotion]
    let items = ItemVectors::from_rows(vec![
        ("cat", vec![0.92, 0.05, 0.10, 0.20]),
        ("dog", vec![0.88, 0.10, 0.12, 0.25]),
        ("horse", vec![0.80, 0.30, 0.05, 0.10]),
        ("car", vec![0.05, 0.95, 0.02, 0.05]),
        ("bus", vec![0.02, 0.90, 0.05, 0.02]),
        ("train", vec![0.10, 0.85, 0.01, 0.05]),
        ("bread", vec![0.05, 0.02, 0.93, 0.10]),
        ("cheese", vec![0.10, 0.01, 0.90, 0.15]),
        ("apple", vec![0.08, 0.03, 0.85, 0.05]),
        ("joy", vec![0.10, 0.02, 0.10, 0.95]),
        ("anger", vec![0.05, 0.05, 0.02, 0.90]),
        ("empty", vec![0.0, 0.0, 0.0, f64::NAN]),
    ])?
    .drop_missing()?;

    let similarity = SimilarityMatrix::from_items(&items);
    println!("Items: {}", similarity.names().join(", "));
    println!(
        "cos(cat, dog) = {:.3}, cos(cat, car) = {:.3}",
        similarity.get_by_name("cat", "dog").unwrap_or(f64::NAN),
        similarity.get_by_name("cat", "car").unwrap_or(f64::NAN),
    );
    println!();

    let dissim = similarity.to_dissimilarity();
    let analysis = StabilityAnalysis::new(2..=5)
        .n_iterations(40)
        .sample_fraction(0.9)
        .random_state(42);

    // Same inputs give the same key, so the second lookup is free.
    let mut cache = StabilityCache::new();
    cache.get_or_compute(&dissim, &analysis)?;
    let report = cache.get_or_compute(&dissim, &analysis)?;
    println!("Stability (mean Jaccard over {} pairs per k):", report.n_iterations / 2);
    for entry in &report.per_k {
        println!(
            "  k = {}: mean {:.3}, median {:.3}, sd {:.3}",
            entry.k, entry.mean, entry.median, entry.std_dev
        );
    }
    println!();

    let selection = ModelSelection::from_report(&dissim, &analysis, report, SingletonPolicy::Nan)?;
    println!("k  silhouette  stability");
    for (k, sil, stab) in selection.summary() {
        println!("{}  {:>10.3}  {:>9.3}", k, sil, stab);
    }

    let Some(k) = selection.suggest_k(0.02, 0.05)? else {
        println!("No k has both metrics defined");
        return Ok(());
    };
    println!("\nSuggested k = {}", k);

    if let Some(row) = selection.get(k) {
        let labels = row.clustering.medoid_labels()?;
        for name in row.clustering.medoid_names() {
            let members: Vec<&str> = row
                .clustering
                .clustering
                .names()
                .iter()
                .zip(&labels)
                .filter(|(_, label)| **label == name)
                .map(|(member, _)| member.as_str())
                .collect();
            println!("  [{}] {}", name, members.join(", "));
        }

        println!("\nSilhouette widths:");
        for idx in row.silhouette.sorted_by_cluster() {
            println!(
                "  {:<8} cluster {}  width {:.3}",
                row.silhouette.names[idx], row.silhouette.labels[idx], row.silhouette.widths[idx]
            );
        }
    }

    Ok(())
}
