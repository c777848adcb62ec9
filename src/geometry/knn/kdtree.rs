//! kd-tree neighbor search.
//!
//! The tree is built per segment by recursive median partitioning along the
//! axis of widest spread, with small buckets at the leaves. Queries descend
//! to the nearer child first and visit the farther child only while the
//! splitting plane is no farther than the current k-th best.
//!
//! Leaves score candidates with the request's metric, so results match the
//! exhaustive strategies exactly. Cosine rows arrive with norm below one, and
//! for such rows `1 - a·b >= ||a - b||² / 2`, which bounds the score across a
//! splitting plane at distance `d` by `d² / 2`.

use super::{fill_rows, Metric, NeighborHeap};
use crate::error::Result;
use crate::geometry::traits::{NeighborSearch, SearchRequest};
use crate::geometry::util;

const LEAF_SIZE: usize = 16;

/// Median-split kd-tree over each segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct KdTreeSearch;

impl NeighborSearch for KdTreeSearch {
    fn search(&self, req: &SearchRequest<'_>) -> Result<Vec<usize>> {
        let dim = req.dim;
        let n_query = req.query.len() / dim;
        let total = util::checked_len(n_query, req.k, "neighbor indices")?;
        let mut out = util::try_filled(total, 0usize, "neighbor indices")?;
        if req.k == 0 {
            return Ok(out);
        }

        let tree = KdTree::build(req.reference, dim);
        fill_rows(&mut out, req.k, req.device, |qi, slot| {
            let q = &req.query[qi * dim..(qi + 1) * dim];
            let skip = req.exclude_self.then_some(qi);
            let mut heap = NeighborHeap::new(req.k);
            tree.nearest(q, skip, req.metric, &mut heap);
            heap.drain_into(slot);
        });
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "kd-tree"
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        axis: usize,
        value: f32,
        left: usize,
        right: usize,
    },
}

/// A kd-tree over borrowed row-major points.
#[derive(Debug)]
struct KdTree<'a> {
    points: &'a [f32],
    dim: usize,
    order: Vec<usize>,
    nodes: Vec<Node>,
}

impl<'a> KdTree<'a> {
    fn build(points: &'a [f32], dim: usize) -> Self {
        let n = points.len() / dim;
        let mut tree = Self {
            points,
            dim,
            order: (0..n).collect(),
            nodes: Vec::with_capacity(2 * n / LEAF_SIZE + 1),
        };
        if n > 0 {
            tree.build_node(0, n);
        }
        tree
    }

    #[inline]
    fn coord(&self, i: usize, axis: usize) -> f32 {
        self.points[i * self.dim + axis]
    }

    #[inline]
    fn row(&self, i: usize) -> &[f32] {
        &self.points[i * self.dim..(i + 1) * self.dim]
    }

    /// Build the subtree over `order[start..end]`; returns its node id.
    fn build_node(&mut self, start: usize, end: usize) -> usize {
        let id = self.nodes.len();
        if end - start <= LEAF_SIZE {
            self.nodes.push(Node::Leaf { start, end });
            return id;
        }

        let axis = self.widest_axis(start, end);
        let mid = start + (end - start) / 2;
        let points = self.points;
        let dim = self.dim;
        self.order[start..end].select_nth_unstable_by(mid - start, |&a, &b| {
            points[a * dim + axis].total_cmp(&points[b * dim + axis])
        });
        let value = self.coord(self.order[mid], axis);

        // Reserve the slot; children are filled in after recursion.
        self.nodes.push(Node::Leaf { start, end });
        let left = self.build_node(start, mid);
        let right = self.build_node(mid, end);
        self.nodes[id] = Node::Split {
            axis,
            value,
            left,
            right,
        };
        id
    }

    fn widest_axis(&self, start: usize, end: usize) -> usize {
        let mut best = (0usize, f32::NEG_INFINITY);
        for axis in 0..self.dim {
            let (lo, hi) = self.order[start..end].iter().fold(
                (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), &i| {
                    let v = self.coord(i, axis);
                    (lo.min(v), hi.max(v))
                },
            );
            if hi - lo > best.1 {
                best = (axis, hi - lo);
            }
        }
        best.0
    }

    fn nearest(&self, q: &[f32], skip: Option<usize>, metric: Metric, heap: &mut NeighborHeap) {
        if !self.nodes.is_empty() {
            self.visit(0, q, skip, metric, heap);
        }
    }

    /// Lowest score any point beyond a splitting plane `diff` away can have.
    fn plane_bound(&self, diff: f32, metric: Metric) -> f32 {
        match metric {
            Metric::Euclidean => diff * diff,
            // Dot products carry up to `dim` ulps of rounding error.
            Metric::Cosine => 0.5 * diff * diff - f32::EPSILON * self.dim as f32,
        }
    }

    fn visit(
        &self,
        node: usize,
        q: &[f32],
        skip: Option<usize>,
        metric: Metric,
        heap: &mut NeighborHeap,
    ) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &i in &self.order[start..end] {
                    if skip == Some(i) {
                        continue;
                    }
                    heap.push(metric.score(q, self.row(i)), i);
                }
            }
            Node::Split {
                axis,
                value,
                left,
                right,
            } => {
                let diff = q[axis] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.visit(near, q, skip, metric, heap);
                if self.plane_bound(diff, metric) <= heap.worst() {
                    self.visit(far, q, skip, metric, heap);
                }
            }
        }
    }
}
