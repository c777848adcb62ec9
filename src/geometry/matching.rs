//! Neighbor matching for graph coarsening.
//!
//! Pairs adjacent nodes greedily so that every node ends up in a cluster of
//! one or two, and clustered pairs are always joined by an input edge. This is
//! the coarsening step of hierarchical graph pooling: each cluster becomes one
//! node of the next, smaller graph.
//!
//! ## Algorithm
//!
//! Nodes are visited in a random order. An unmatched node claims one of its
//! unmatched neighbors:
//!
//! - weighted: the neighbor across the heaviest incident edge,
//! - unweighted: a neighbor chosen uniformly at random.
//!
//! Both become a pair; nodes with no unmatched neighbor left stay singletons.
//! The result is a maximal matching, so the cluster count lies in
//! `[⌈N/2⌉, N]`.
//!
//! Edges are treated as undirected; self-loops are ignored.

use log::debug;
use rand::seq::{IndexedRandom, SliceRandom};

use super::util;
use crate::error::{Error, Result};

/// Randomized greedy neighbor matcher.
#[derive(Debug, Clone)]
pub struct NeighborMatcher {
    relabel: bool,
    seed: Option<u64>,
}

/// Cluster assignment produced by [`NeighborMatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matching {
    labels: Vec<usize>,
    num_clusters: usize,
}

impl Matching {
    /// Cluster label of every node.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of distinct labels.
    pub fn num_clusters(&self) -> usize {
        self.num_clusters
    }

    /// Consume the matching, returning the labels.
    pub fn into_labels(self) -> Vec<usize> {
        self.labels
    }
}

impl Default for NeighborMatcher {
    fn default() -> Self {
        Self {
            relabel: true,
            seed: None,
        }
    }
}

impl NeighborMatcher {
    /// Create a matcher that compacts labels to `0..num_clusters`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compact labels to `0..num_clusters` (default), or keep each pair's
    /// smaller node id as its label.
    pub fn with_relabel(mut self, relabel: bool) -> Self {
        self.relabel = relabel;
        self
    }

    /// Seed for the visit order and unweighted neighbor choice.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Match the nodes of a graph with `num_nodes` nodes and the given edges.
    ///
    /// `weights`, if given, holds one non-negative weight per edge.
    pub fn run(
        &self,
        num_nodes: usize,
        edges: &[(usize, usize)],
        weights: Option<&[f32]>,
    ) -> Result<Matching> {
        if num_nodes == 0 {
            return Err(Error::EmptyInput);
        }
        if let Some(w) = weights {
            if w.len() != edges.len() {
                return Err(Error::WeightCountMismatch {
                    expected: edges.len(),
                    found: w.len(),
                });
            }
            // `!(x >= 0)` also rejects NaN.
            if let Some(index) = w.iter().position(|&x| !(x >= 0.0)) {
                return Err(Error::NegativeWeight { index });
            }
        }
        for &(u, v) in edges {
            let node = u.max(v);
            if node >= num_nodes {
                return Err(Error::NodeOutOfRange { node, num_nodes });
            }
        }

        let adj = Adjacency::new(num_nodes, edges, weights)?;
        let mut rng = util::seeded_rng(self.seed);
        let mut order = util::try_filled(num_nodes, 0usize, "visit order")?;
        for (i, slot) in order.iter_mut().enumerate() {
            *slot = i;
        }
        order.shuffle(&mut rng);

        let mut labels = util::try_filled(num_nodes, usize::MAX, "node labels")?;
        let mut open: Vec<usize> = Vec::new();
        let mut pairs = 0usize;
        for &u in &order {
            if labels[u] != usize::MAX {
                continue;
            }
            let partner = match weights {
                Some(_) => adj
                    .neighbors(u)
                    .filter(|&(v, _)| v != u && labels[v] == usize::MAX)
                    .fold(None, |best: Option<(usize, f32)>, (v, w)| match best {
                        Some((_, bw)) if bw >= w => best,
                        _ => Some((v, w)),
                    })
                    .map(|(v, _)| v),
                None => {
                    open.clear();
                    open.extend(
                        adj.neighbors(u)
                            .map(|(v, _)| v)
                            .filter(|&v| v != u && labels[v] == usize::MAX),
                    );
                    open.choose(&mut rng).copied()
                }
            };
            match partner {
                Some(v) => {
                    let id = u.min(v);
                    labels[u] = id;
                    labels[v] = id;
                    pairs += 1;
                }
                None => labels[u] = u,
            }
        }

        let num_clusters = num_nodes - pairs;
        debug!("neighbor matching: {num_nodes} nodes -> {num_clusters} clusters");
        if self.relabel {
            compact(&mut labels)?;
        }
        Ok(Matching {
            labels,
            num_clusters,
        })
    }
}

/// Map labels in `0..n` onto `0..distinct`, preserving order.
fn compact(labels: &mut [usize]) -> Result<()> {
    let mut remap = util::try_filled(labels.len(), usize::MAX, "label remap")?;
    for &l in labels.iter() {
        remap[l] = 0;
    }
    let mut next = 0usize;
    for slot in remap.iter_mut().filter(|s| **s == 0) {
        *slot = next;
        next += 1;
    }
    for l in labels.iter_mut() {
        *l = remap[*l];
    }
    Ok(())
}

/// Symmetric compressed adjacency with per-entry weights.
struct Adjacency {
    offsets: Vec<usize>,
    targets: Vec<(usize, f32)>,
}

impl Adjacency {
    fn new(num_nodes: usize, edges: &[(usize, usize)], weights: Option<&[f32]>) -> Result<Self> {
        let len = num_nodes.checked_add(1).ok_or(Error::ResourceExhausted {
            what: "adjacency offsets",
            requested: usize::MAX,
        })?;
        let mut offsets = util::try_filled(len, 0usize, "adjacency offsets")?;
        for &(u, v) in edges {
            if u != v {
                offsets[u + 1] += 1;
                offsets[v + 1] += 1;
            }
        }
        for i in 0..num_nodes {
            offsets[i + 1] += offsets[i];
        }
        let mut targets = util::try_filled(offsets[num_nodes], (0usize, 0.0f32), "adjacency")?;
        let mut cursor = util::try_filled(len, 0usize, "adjacency cursor")?;
        cursor.copy_from_slice(&offsets);
        for (e, &(u, v)) in edges.iter().enumerate() {
            if u == v {
                continue;
            }
            let w = weights.map_or(1.0, |w| w[e]);
            targets[cursor[u]] = (v, w);
            cursor[u] += 1;
            targets[cursor[v]] = (u, w);
            cursor[v] += 1;
        }
        Ok(Self { offsets, targets })
    }

    fn neighbors(&self, u: usize) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.targets[self.offsets[u]..self.offsets[u + 1]].iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn check(num_nodes: usize, edges: &[(usize, usize)], m: &Matching) {
        let labels = m.labels();
        assert_eq!(labels.len(), num_nodes);
        let adj: HashSet<(usize, usize)> = edges
            .iter()
            .flat_map(|&(u, v)| [(u, v), (v, u)])
            .collect();
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (node, &l) in labels.iter().enumerate() {
            assert!(l < num_nodes);
            groups.entry(l).or_default().push(node);
        }
        assert_eq!(groups.len(), m.num_clusters());
        assert!(m.num_clusters() >= num_nodes.div_ceil(2));
        assert!(m.num_clusters() <= num_nodes);
        for members in groups.values() {
            assert!(members.len() <= 2);
            if let &[u, v] = members.as_slice() {
                assert!(adj.contains(&(u, v)));
            }
        }
    }

    #[test]
    fn single_edge_pairs() {
        let edges = [(0, 1), (1, 0)];
        let m = NeighborMatcher::new().with_seed(1).run(2, &edges, None).unwrap();
        assert_eq!(m.labels(), &[0, 0]);
        assert_eq!(m.num_clusters(), 1);
    }

    #[test]
    fn disjoint_edges_always_pair() {
        let edges = [(0, 1), (2, 3), (4, 5)];
        for seed in 0..10 {
            let m = NeighborMatcher::new()
                .with_seed(seed)
                .run(6, &edges, None)
                .unwrap();
            assert_eq!(m.num_clusters(), 3);
            assert_eq!(m.labels(), &[0, 0, 1, 1, 2, 2]);
            check(6, &edges, &m);
        }
    }

    #[test]
    fn without_relabel_labels_are_min_node() {
        let edges = [(5, 4), (2, 3), (0, 1)];
        let m = NeighborMatcher::new()
            .with_relabel(false)
            .with_seed(3)
            .run(7, &edges, None)
            .unwrap();
        assert_eq!(m.labels(), &[0, 0, 2, 2, 4, 4, 6]);
        assert_eq!(m.num_clusters(), 4);
    }

    #[test]
    fn isolated_nodes_are_singletons() {
        let m = NeighborMatcher::new().run(4, &[], None).unwrap();
        assert_eq!(m.labels(), &[0, 1, 2, 3]);
        assert_eq!(m.num_clusters(), 4);
    }

    #[test]
    fn triangle_leaves_one_singleton() {
        let edges = [(0, 1), (1, 2), (2, 0)];
        for seed in 0..10 {
            let m = NeighborMatcher::new()
                .with_seed(seed)
                .run(3, &edges, None)
                .unwrap();
            assert_eq!(m.num_clusters(), 2);
            check(3, &edges, &m);
        }
    }

    #[test]
    fn heavy_edge_wins_from_hub() {
        // Node 0 is the only neighbor of 1, 2, 3; whoever is visited first
        // claims 0, unless 0 goes first and picks its heaviest edge.
        let edges = [(0, 1), (0, 2), (0, 3)];
        let weights = [0.1, 5.0, 0.2];
        let mut saw_heavy = false;
        for seed in 0..20 {
            let m = NeighborMatcher::new()
                .with_relabel(false)
                .with_seed(seed)
                .run(4, &edges, Some(&weights))
                .unwrap();
            check(4, &edges, &m);
            saw_heavy |= m.labels()[2] == 0;
        }
        assert!(saw_heavy);
    }

    #[test]
    fn random_graphs_satisfy_invariants() {
        use rand::prelude::*;
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..50 {
            let n = rng.random_range(1..40);
            let m = rng.random_range(0..3 * n);
            let edges: Vec<(usize, usize)> = (0..m)
                .map(|_| (rng.random_range(0..n), rng.random_range(0..n)))
                .collect();
            let weights: Vec<f32> = (0..m).map(|_| rng.random::<f32>()).collect();
            for relabel in [true, false] {
                for w in [None, Some(weights.as_slice())] {
                    let out = NeighborMatcher::new()
                        .with_relabel(relabel)
                        .with_seed(rng.random())
                        .run(n, &edges, w)
                        .unwrap();
                    check(n, &edges, &out);
                    if relabel {
                        assert!(out.labels().iter().all(|&l| l < out.num_clusters()));
                    }
                }
            }
        }
    }

    #[test]
    fn invalid_weights() {
        let edges = [(0, 1), (1, 2)];
        assert!(matches!(
            NeighborMatcher::new().run(3, &edges, Some(&[1.0])),
            Err(Error::WeightCountMismatch {
                expected: 2,
                found: 1
            })
        ));
        assert!(matches!(
            NeighborMatcher::new().run(3, &edges, Some(&[1.0, -0.5])),
            Err(Error::NegativeWeight { index: 1 })
        ));
        assert!(matches!(
            NeighborMatcher::new().run(3, &edges, Some(&[f32::NAN, 1.0])),
            Err(Error::NegativeWeight { index: 0 })
        ));
    }

    #[test]
    fn invalid_graph() {
        assert!(matches!(
            NeighborMatcher::new().run(2, &[(0, 2)], None),
            Err(Error::NodeOutOfRange {
                node: 2,
                num_nodes: 2
            })
        ));
        assert!(matches!(
            NeighborMatcher::new().run(0, &[], None),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn compact_preserves_order() {
        let mut labels = vec![4, 0, 4, 2, 0, 5];
        compact(&mut labels).unwrap();
        assert_eq!(labels, vec![2, 0, 2, 1, 0, 3]);
    }

    #[test]
    fn oversized_graph_is_resource_error() {
        assert!(matches!(
            NeighborMatcher::new().run(usize::MAX, &[], None),
            Err(Error::ResourceExhausted { .. })
        ));
        assert!(matches!(
            NeighborMatcher::new().run(usize::MAX / 2, &[(0, 1)], None),
            Err(Error::ResourceExhausted { .. })
        ));
    }
}
