//! Graph construction from point clouds and graphs.
//!
//! Three independent, stateless operations. Each consumes flat numeric input
//! and returns index arrays; none keeps state between calls.
//!
//! ## Farthest-point sampling
//!
//! Greedy subsampling: start from one point, then repeatedly take the point
//! farthest from everything taken so far. The result covers the cloud evenly,
//! which makes it the usual downsampling step in point-cloud networks.
//!
//! ## k-nearest-neighbor graphs
//!
//! Every point receives an edge from each of its `k` nearest points in the
//! same segment, under Euclidean or cosine distance. Four interchangeable
//! strategies implement [`NeighborSearch`]:
//!
//! | Algorithm | Time per segment | Extra memory |
//! |---|---|---|
//! | `bruteforce` | O(n² d) | O(n) per query |
//! | `bruteforce-blas` | O(n² d) | O(n²) score matrix |
//! | `bruteforce-sharemem` | O(n² d) | O(tile · k) |
//! | `kd-tree` | ~O(n log n) in low d | O(n) |
//!
//! All return the same neighbor set per query up to ties at equal distance.
//!
//! ## Neighbor matching
//!
//! Greedy pairing of adjacent nodes into clusters of size one or two, used to
//! coarsen a graph for hierarchical pooling.
//!
//! ## Usage
//!
//! ```rust
//! use pointgraph::geometry::{Algorithm, FarthestPointSampler, Knn, NeighborMatcher, PointSet};
//!
//! let coords = vec![
//!     0.0, 0.0,
//!     0.1, 0.0,
//!     5.0, 5.0,
//!     5.1, 5.0,
//! ];
//! let points = PointSet::new(&coords, 2).unwrap();
//!
//! let samples = FarthestPointSampler::new(2).with_start_idx(0).sample(&points).unwrap();
//! assert_eq!(samples.row(0)[0], 0);
//!
//! let g = Knn::new(1)
//!     .with_algorithm(Algorithm::KdTree)
//!     .with_exclude_self(true)
//!     .build(&points)
//!     .unwrap();
//! assert_eq!(g.in_edges(0), &[1]);
//!
//! let edges: Vec<(usize, usize)> = g.edges().collect();
//! let m = NeighborMatcher::new().with_seed(7).run(points.len(), &edges, None).unwrap();
//! assert_eq!(m.num_clusters(), 2);
//! ```

mod fps;
mod knn;
mod matching;
mod points;
mod traits;
mod util;

pub use fps::{FarthestPointSampler, Samples};
pub use knn::{
    Algorithm, BruteForce, BruteForceBlas, BruteForceSharedMem, Device, KClamp, KdTreeSearch, Knn,
    KnnGraph, Metric,
};
pub use matching::{Matching, NeighborMatcher};
pub use points::{Layout, PointSet};
pub use traits::{NeighborSearch, SearchRequest};
