use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pointgraph::geometry::{Algorithm, FarthestPointSampler, Knn, NeighborMatcher, PointSet};
use rand::prelude::*;

fn random_coords(n: usize, d: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n * d).map(|_| rng.random::<f32>()).collect()
}

fn bench_knn(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn");
    let coords = random_coords(2000, 3);
    let points = PointSet::batched(&coords, 4, 500, 3).unwrap();

    for algorithm in [
        Algorithm::BruteForce,
        Algorithm::BruteForceBlas,
        Algorithm::BruteForceSharedMem,
        Algorithm::KdTree,
    ] {
        group.bench_function(format!("{algorithm}_b4_n500_d3_k16"), |b| {
            b.iter(|| {
                Knn::new(16)
                    .with_algorithm(algorithm)
                    .build(black_box(&points))
                    .unwrap();
            })
        });
    }
    group.finish();
}

fn bench_fps(c: &mut Criterion) {
    let coords = random_coords(4000, 3);
    let points = PointSet::batched(&coords, 4, 1000, 3).unwrap();
    c.bench_function("fps_b4_n1000_m64", |b| {
        b.iter(|| {
            FarthestPointSampler::new(64)
                .with_seed(42)
                .sample(black_box(&points))
                .unwrap();
        })
    });
}

fn bench_matching(c: &mut Criterion) {
    let coords = random_coords(5000, 3);
    let points = PointSet::new(&coords, 3).unwrap();
    let g = Knn::new(8)
        .with_algorithm(Algorithm::KdTree)
        .with_exclude_self(true)
        .build(&points)
        .unwrap();
    let edges: Vec<(usize, usize)> = g.edges().collect();
    c.bench_function("neighbor_matching_n5000_k8", |b| {
        b.iter(|| {
            NeighborMatcher::new()
                .with_seed(42)
                .run(points.len(), black_box(&edges), None)
                .unwrap();
        })
    });
}

criterion_group!(benches, bench_knn, bench_fps, bench_matching);
criterion_main!(benches);
