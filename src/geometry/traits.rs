use super::knn::{Device, Metric};
use crate::error::Result;

/// One nearest-neighbor query batch handed to a [`NeighborSearch`] strategy.
///
/// `reference` and `query` are row-major buffers of `dim` columns, already
/// normalized when `metric` is [`Metric::Cosine`].
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    /// Candidate rows.
    pub reference: &'a [f32],
    /// Rows to find neighbors for.
    pub query: &'a [f32],
    /// Coordinate dimensionality.
    pub dim: usize,
    /// Neighbors per query; never exceeds the available candidates.
    pub k: usize,
    /// Query row `i` and reference row `i` are the same point and must not pair.
    pub exclude_self: bool,
    /// Scoring function.
    pub metric: Metric,
    /// Execution backend.
    pub device: Device,
}

/// Common interface for k-nearest-neighbor search strategies.
///
/// Every implementation returns the same neighbor *set* per query; only the
/// order among candidates at equal distance may differ.
pub trait NeighborSearch: Sync {
    /// Return `k` reference indices per query row, nearest first, flattened
    /// row-major (`query_rows * k` entries).
    fn search(&self, req: &SearchRequest<'_>) -> Result<Vec<usize>>;

    /// Name accepted by [`Algorithm`](super::knn::Algorithm)'s `FromStr`.
    fn name(&self) -> &'static str;
}
