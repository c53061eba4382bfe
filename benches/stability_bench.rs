use cosine_pam::{
    DissimilarityMatrix, ItemVectors, SilhouetteResult, SimilarityMatrix, SingletonPolicy,
    StabilityAnalysis,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

fn dissimilarity(n_items: usize, dim: usize, n_topics: usize) -> DissimilarityMatrix {
    let mut rng = StdRng::seed_from_u64(7);
    let topics: Vec<Vec<f64>> = (0..n_topics)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect();
    let rows = (0..n_items)
        .map(|i| {
            let v = topics[i % n_topics]
                .iter()
                .map(|x| x + rng.gen_range(-0.4..0.4))
                .collect::<Vec<f64>>();
            (format!("w{}", i), v)
        })
        .collect();
    SimilarityMatrix::from_items(&ItemVectors::from_rows(rows).unwrap()).to_dissimilarity()
}

fn bench_stability_grid(c: &mut Criterion) {
    let dissim = dissimilarity(150, 30, 5);

    let mut group = c.benchmark_group("stability_grid");
    group.sample_size(10);

    for &n_iterations in &[10, 40] {
        group.bench_with_input(
            BenchmarkId::new("k2_to_8", n_iterations),
            &n_iterations,
            |b, &n| {
                let analysis = StabilityAnalysis::new(2..=8).n_iterations(n).random_state(42);
                b.iter(|| black_box(analysis.run(black_box(&dissim)).unwrap()))
            },
        );
    }

    group.finish();
}

fn bench_silhouette(c: &mut Criterion) {
    let mut group = c.benchmark_group("silhouette");

    for &n_items in &[200, 800] {
        let dissim = dissimilarity(n_items, 30, 6);
        let fit = cosine_pam::Pam::new(6).fit(&dissim).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n_items), &dissim, |b, dissim| {
            b.iter(|| {
                let result: SilhouetteResult =
                    cosine_pam::silhouette(black_box(dissim), &fit.clustering, SingletonPolicy::Nan)
                        .unwrap();
                black_box(result.mean_width())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_stability_grid, bench_silhouette);
criterion_main!(benches);
