//! Geometric graph construction primitives.
//!
//! `pointgraph` is a small library of the graph-synthesis algorithms used by
//! point-cloud and graph-pooling networks. Inputs are flat coordinate buffers
//! or edge lists; outputs are index arrays.
//!
//! The public API is under [`geometry`], which provides:
//! - farthest-point sampling over batched or segmented point sets
//! - k-nearest-neighbor graphs (bruteforce, Gram-matrix, tiled, and kd-tree search)
//! - greedy neighbor matching for edge coarsening

#![forbid(unsafe_code)]

pub mod error;
pub mod geometry;

pub use error::{Error, Result};
pub use geometry::{
    Algorithm, Device, FarthestPointSampler, KClamp, Knn, KnnGraph, Layout, Matching, Metric,
    NeighborMatcher, NeighborSearch, PointSet, Samples,
};
