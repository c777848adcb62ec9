//! k-nearest-neighbor graph construction.
//!
//! Each query point receives exactly `k` incoming edges, one from each of its
//! `k` nearest candidates in the same segment. Edges are emitted grouped by
//! destination, queries in row order, neighbors nearest-first.
//!
//! ## Clamping
//!
//! When `k` exceeds the candidates available in a segment (`N`, or `N - 1`
//! when excluding self), `k` is reduced and a warning is logged. The reduced
//! value is taken from the smallest non-empty segment and applied to **every**
//! segment of the call, so a single small segment lowers `k` everywhere.
//!
//! ## Metrics
//!
//! - Euclidean: squared distance (same ordering as plain distance).
//! - Cosine: rows are scaled by `1 / (1e-5 + ||x||)`, score is `1 - a·b`.

mod bruteforce;
mod kdtree;
mod sharemem;

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use rayon::prelude::*;

use super::points::PointSet;
use super::traits::{NeighborSearch, SearchRequest};
use super::util::{self, COSINE_EPS};
use crate::error::{Error, Result};

pub use bruteforce::{BruteForce, BruteForceBlas};
pub use kdtree::KdTreeSearch;
pub use sharemem::BruteForceSharedMem;

/// Distance used to rank neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Euclidean distance.
    #[default]
    Euclidean,
    /// One minus cosine similarity.
    Cosine,
}

impl Metric {
    /// Score two prepared rows; lower is nearer.
    #[inline]
    pub(crate) fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Euclidean => util::squared_euclidean(a, b),
            Metric::Cosine => 1.0 - util::dot(a, b),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "euclidean" => Ok(Metric::Euclidean),
            "cosine" => Ok(Metric::Cosine),
            _ => Err(Error::InvalidParameter {
                name: "dist",
                message: "expected \"euclidean\" or \"cosine\"",
            }),
        }
    }
}

/// Neighbor search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Direct pairwise scoring per query.
    BruteForce,
    /// Full distance matrix via a Gram-matrix product.
    #[default]
    BruteForceBlas,
    /// Tiled bruteforce with bounded per-query heaps.
    BruteForceSharedMem,
    /// Median-split kd-tree over each segment.
    KdTree,
}

impl Algorithm {
    /// The strategy implementing this algorithm.
    pub fn strategy(self) -> &'static dyn NeighborSearch {
        match self {
            Algorithm::BruteForce => &BruteForce,
            Algorithm::BruteForceBlas => &BruteForceBlas,
            Algorithm::BruteForceSharedMem => &BruteForceSharedMem,
            Algorithm::KdTree => &KdTreeSearch,
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bruteforce" => Ok(Algorithm::BruteForce),
            "bruteforce-blas" => Ok(Algorithm::BruteForceBlas),
            "bruteforce-sharemem" => Ok(Algorithm::BruteForceSharedMem),
            "kd-tree" => Ok(Algorithm::KdTree),
            _ => Err(Error::InvalidParameter {
                name: "algorithm",
                message: "expected one of bruteforce, bruteforce-blas, bruteforce-sharemem, kd-tree",
            }),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strategy().name())
    }
}

/// Where the computation runs.
///
/// All devices produce identical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// Single thread.
    Cpu,
    /// Rayon thread pool.
    #[default]
    Threaded,
}

/// Record of `k` being reduced to fit the available candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KClamp {
    /// `k` as requested.
    pub requested: usize,
    /// `k` actually used for every segment.
    pub applied: usize,
}

/// Directed kNN edge list with per-segment count metadata.
#[derive(Debug, Clone)]
pub struct KnnGraph {
    src: Vec<usize>,
    dst: Vec<usize>,
    k: usize,
    num_nodes: usize,
    batch_num_nodes: Vec<usize>,
    batch_num_edges: Vec<usize>,
    clamp: Option<KClamp>,
}

impl KnnGraph {
    /// Source (neighbor) of each edge.
    pub fn src(&self) -> &[usize] {
        &self.src
    }

    /// Destination (query) of each edge.
    pub fn dst(&self) -> &[usize] {
        &self.dst
    }

    /// Iterate `(src, dst)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.src.iter().copied().zip(self.dst.iter().copied())
    }

    /// Effective neighbors per query.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of query nodes.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.src.len()
    }

    /// Neighbors of query `v`, nearest first.
    ///
    /// # Panics
    ///
    /// Panics if `v >= self.num_nodes()`.
    pub fn in_edges(&self, v: usize) -> &[usize] {
        &self.src[v * self.k..(v + 1) * self.k]
    }

    /// Node count per segment, or a single total when batch output is off.
    pub fn batch_num_nodes(&self) -> &[usize] {
        &self.batch_num_nodes
    }

    /// Edge count per segment, or a single total when batch output is off.
    pub fn batch_num_edges(&self) -> &[usize] {
        &self.batch_num_edges
    }

    /// Set when `k` was reduced to fit the input.
    pub fn clamp(&self) -> Option<KClamp> {
        self.clamp
    }
}

/// kNN graph builder.
#[derive(Debug, Clone)]
pub struct Knn {
    k: i64,
    algorithm: Algorithm,
    metric: Metric,
    exclude_self: bool,
    output_batch: bool,
    device: Device,
}

impl Knn {
    /// Create a builder for `k` neighbors per point.
    ///
    /// `k` is signed because `k = 0` is meaningful when excluding self; it is
    /// validated when the graph is built.
    pub fn new(k: i64) -> Self {
        Self {
            k,
            algorithm: Algorithm::default(),
            metric: Metric::default(),
            exclude_self: false,
            output_batch: false,
            device: Device::default(),
        }
    }

    /// Set the search strategy.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the distance metric.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Never pair a point with itself.
    pub fn with_exclude_self(mut self, exclude_self: bool) -> Self {
        self.exclude_self = exclude_self;
        self
    }

    /// Report counts per segment instead of one aggregate.
    pub fn with_output_batch(mut self, output_batch: bool) -> Self {
        self.output_batch = output_batch;
        self
    }

    /// Set the execution backend.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Build the kNN graph of `points`, segment by segment.
    pub fn build(&self, points: &PointSet<'_>) -> Result<KnnGraph> {
        let requested = self.requested_k()?;
        if points.is_empty() {
            return Err(Error::EmptyInput);
        }
        let available = points
            .min_segment_size()
            .unwrap_or(0)
            .saturating_sub(usize::from(self.exclude_self));
        let (k, clamp) = clamp_k(requested, available);

        let prepared = self.prepare(points)?;
        let sizes = points.segment_sizes();
        let mut graph = EdgeSink::new(points.len(), k)?;
        debug!(
            "knn: {} over {} segments, k={}, metric={:?}, device={:?}",
            self.algorithm,
            sizes.len(),
            k,
            self.metric,
            self.device
        );

        let dim = points.dim();
        let strategy = self.algorithm.strategy();
        for range in points.segments() {
            if range.is_empty() {
                continue;
            }
            let seg = &prepared[range.start * dim..range.end * dim];
            let neighbors = strategy.search(&SearchRequest {
                reference: seg,
                query: seg,
                dim,
                k,
                exclude_self: self.exclude_self,
                metric: self.metric,
                device: self.device,
            })?;
            graph.extend(&neighbors, range.start, range.start);
        }

        Ok(graph.finish(&sizes, self.output_batch, clamp))
    }

    /// For each `query` row, find the `k` nearest `reference` rows in the matching segment.
    ///
    /// Edge sources index `reference` rows and destinations index `query` rows.
    pub fn search(&self, reference: &PointSet<'_>, query: &PointSet<'_>) -> Result<KnnGraph> {
        if self.exclude_self {
            return Err(Error::InvalidParameter {
                name: "exclude_self",
                message: "only meaningful when reference and query are the same set",
            });
        }
        let requested = self.requested_k()?;
        if reference.is_empty() || query.is_empty() {
            return Err(Error::EmptyInput);
        }
        if reference.dim() != query.dim() {
            return Err(Error::DimensionMismatch {
                expected: reference.dim(),
                found: query.dim(),
            });
        }
        if reference.num_segments() != query.num_segments() {
            return Err(Error::SegmentMismatch {
                expected: reference.num_segments(),
                found: query.num_segments(),
            });
        }
        let available = reference
            .segments()
            .zip(query.segments())
            .filter(|(_, q)| !q.is_empty())
            .map(|(r, _)| r.len())
            .min()
            .unwrap_or(0);
        let (k, clamp) = clamp_k(requested, available);

        let ref_prepared = self.prepare(reference)?;
        let query_prepared = self.prepare(query)?;
        let sizes = query.segment_sizes();
        let mut graph = EdgeSink::new(query.len(), k)?;

        let dim = query.dim();
        let strategy = self.algorithm.strategy();
        for (r_range, q_range) in reference.segments().zip(query.segments()) {
            if q_range.is_empty() {
                continue;
            }
            let neighbors = strategy.search(&SearchRequest {
                reference: &ref_prepared[r_range.start * dim..r_range.end * dim],
                query: &query_prepared[q_range.start * dim..q_range.end * dim],
                dim,
                k,
                exclude_self: false,
                metric: self.metric,
                device: self.device,
            })?;
            graph.extend(&neighbors, r_range.start, q_range.start);
        }

        Ok(graph.finish(&sizes, self.output_batch, clamp))
    }

    fn requested_k(&self) -> Result<usize> {
        let effective = self.k.saturating_add(i64::from(self.exclude_self));
        if effective <= 0 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be positive (at least 0 when excluding self)",
            });
        }
        usize::try_from(self.k).map_err(|_| Error::InvalidParameter {
            name: "k",
            message: "does not fit in usize",
        })
    }

    fn prepare<'p>(&self, points: &'p PointSet<'_>) -> Result<Cow<'p, [f32]>> {
        match self.metric {
            Metric::Euclidean => Ok(Cow::Borrowed(points.coords())),
            Metric::Cosine => {
                util::normalize_rows(points.coords(), points.dim(), COSINE_EPS).map(Cow::Owned)
            }
        }
    }
}

fn clamp_k(requested: usize, available: usize) -> (usize, Option<KClamp>) {
    if requested > available {
        warn!(
            "k ({requested}) exceeds the candidates available in the smallest segment ({available}); \
             using k = {available} for all segments"
        );
        (
            available,
            Some(KClamp {
                requested,
                applied: available,
            }),
        )
    } else {
        (requested, None)
    }
}

/// Accumulates edges for a graph with `k` incoming edges per query.
struct EdgeSink {
    src: Vec<usize>,
    dst: Vec<usize>,
    k: usize,
    num_nodes: usize,
}

impl EdgeSink {
    fn new(num_nodes: usize, k: usize) -> Result<Self> {
        let total = util::checked_len(num_nodes, k, "knn edges")?;
        let mut src = Vec::new();
        let mut dst = Vec::new();
        for v in [&mut src, &mut dst] {
            v.try_reserve_exact(total)
                .map_err(|_| Error::ResourceExhausted {
                    what: "knn edges",
                    requested: total,
                })?;
        }
        Ok(Self {
            src,
            dst,
            k,
            num_nodes,
        })
    }

    fn extend(&mut self, neighbors: &[usize], src_offset: usize, dst_offset: usize) {
        if self.k == 0 {
            return;
        }
        for (q, row) in neighbors.chunks_exact(self.k).enumerate() {
            for &j in row {
                self.src.push(src_offset + j);
                self.dst.push(dst_offset + q);
            }
        }
    }

    fn finish(self, sizes: &[usize], output_batch: bool, clamp: Option<KClamp>) -> KnnGraph {
        let (batch_num_nodes, batch_num_edges) = if output_batch {
            (
                sizes.to_vec(),
                sizes.iter().map(|&n| n * self.k).collect(),
            )
        } else {
            let total: usize = sizes.iter().sum();
            (vec![total], vec![total * self.k])
        };
        KnnGraph {
            src: self.src,
            dst: self.dst,
            k: self.k,
            num_nodes: self.num_nodes,
            batch_num_nodes,
            batch_num_edges,
            clamp,
        }
    }
}

/// Fill `out` (`rows * k` slots) one query row at a time.
pub(super) fn fill_rows<F>(out: &mut [usize], k: usize, device: Device, f: F)
where
    F: Fn(usize, &mut [usize]) + Sync + Send,
{
    if k == 0 {
        return;
    }
    match device {
        Device::Cpu => out
            .chunks_exact_mut(k)
            .enumerate()
            .for_each(|(i, slot)| f(i, slot)),
        Device::Threaded => out
            .par_chunks_exact_mut(k)
            .enumerate()
            .for_each(|(i, slot)| f(i, slot)),
    }
}

/// A `(score, index)` candidate ordered nearest-first, ties by lower index.
#[derive(Debug, Clone, Copy)]
pub(super) struct Candidate(pub(super) f32, pub(super) usize);

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        util::cmp_candidate(&(self.0, self.1), &(other.0, other.1))
    }
}

/// Keeps the `k` best candidates seen so far.
pub(super) struct NeighborHeap {
    heap: BinaryHeap<Candidate>,
    k: usize,
}

impl NeighborHeap {
    pub(super) fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k + 1),
            k,
        }
    }

    pub(super) fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    /// Score of the current k-th best, or infinity while not full.
    pub(super) fn worst(&self) -> f32 {
        match self.heap.peek() {
            Some(c) if self.is_full() => c.0,
            _ => f32::INFINITY,
        }
    }

    pub(super) fn push(&mut self, score: f32, idx: usize) {
        if self.k == 0 {
            return;
        }
        let cand = Candidate(score, idx);
        if !self.is_full() {
            self.heap.push(cand);
        } else if let Some(top) = self.heap.peek() {
            if cand < *top {
                self.heap.pop();
                self.heap.push(cand);
            }
        }
    }

    /// Write indices nearest-first into `slot`.
    pub(super) fn drain_into(self, slot: &mut [usize]) {
        for (s, c) in slot.iter_mut().zip(self.heap.into_sorted_vec()) {
            *s = c.1;
        }
    }
}
