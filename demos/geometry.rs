//! Farthest-point sampling, a kNN graph, and neighbor matching on a small 2D cloud.

use pointgraph::geometry::{Algorithm, FarthestPointSampler, Knn, Metric, NeighborMatcher, PointSet};

fn main() {
    // Two batches of six points each, (B, N, D) = (2, 6, 2).
    let coords: Vec<f32> = vec![
        // Batch 0: a small square plus two far points
        0.0, 0.0, 0.1, 0.0, 0.0, 0.1, 0.1, 0.1, 3.0, 0.0, 0.0, 3.0,
        // Batch 1: points along a line
        0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 3.0, 0.0, 4.0, 0.0, 5.0, 0.0,
    ];
    let points = PointSet::batched(&coords, 2, 6, 2).unwrap();

    // --- Farthest-point sampling (3 per batch) ---
    let samples = FarthestPointSampler::new(3)
        .with_start_idx(0)
        .sample(&points)
        .unwrap();
    println!("=== FPS (m=3, start=0) ===");
    for (b, row) in samples.rows().enumerate() {
        println!("  batch {b}: local {row:?}, global {:?}", samples.global(b));
    }

    // --- kNN graph (k=2, excluding self) ---
    let g = Knn::new(2)
        .with_algorithm(Algorithm::KdTree)
        .with_metric(Metric::Euclidean)
        .with_exclude_self(true)
        .with_output_batch(true)
        .build(&points)
        .unwrap();
    println!("\n=== kNN (k=2, exclude_self) ===");
    for v in 0..g.num_nodes() {
        println!("  node {v:2} <- {:?}", g.in_edges(v));
    }
    println!(
        "  nodes per batch {:?}, edges per batch {:?}",
        g.batch_num_nodes(),
        g.batch_num_edges()
    );

    // --- Oversized k is clamped with a warning ---
    let clamped = Knn::new(10).build(&points).unwrap();
    println!("\n=== kNN (k=10) ===");
    println!("  clamp: {:?}", clamped.clamp());

    // --- Neighbor matching on the kNN graph ---
    let edges: Vec<(usize, usize)> = g.edges().collect();
    let m = NeighborMatcher::new()
        .with_seed(42)
        .run(points.len(), &edges, None)
        .unwrap();
    println!("\n=== Neighbor matching ===");
    println!("  labels {:?} ({} clusters)", m.labels(), m.num_clusters());
}
