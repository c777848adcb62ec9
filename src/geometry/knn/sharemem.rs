//! Tiled bruteforce search.
//!
//! Mirrors the shared-memory accelerator kernel: queries are processed in
//! tiles, and each tile sweeps the references one block at a time. A block is
//! staged into a tile-local buffer once and scored against every query of the
//! tile, with a bounded heap per query holding the running top-k. Memory use is
//! `O(tile * k)` rather than `O(queries * references)`.

use rayon::prelude::*;

use super::{Device, NeighborHeap};
use crate::error::Result;
use crate::geometry::traits::{NeighborSearch, SearchRequest};
use crate::geometry::util;

const QUERY_TILE: usize = 32;
const REF_BLOCK: usize = 128;

/// Tiled bruteforce with bounded per-query heaps.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceSharedMem;

impl NeighborSearch for BruteForceSharedMem {
    fn search(&self, req: &SearchRequest<'_>) -> Result<Vec<usize>> {
        let dim = req.dim;
        let n_query = req.query.len() / dim;
        let total = util::checked_len(n_query, req.k, "neighbor indices")?;
        let mut out = util::try_filled(total, 0usize, "neighbor indices")?;
        if req.k == 0 {
            return Ok(out);
        }

        let tile_len = QUERY_TILE * req.k;
        match req.device {
            Device::Cpu => out
                .chunks_mut(tile_len)
                .enumerate()
                .for_each(|(t, slots)| search_tile(req, t * QUERY_TILE, slots)),
            Device::Threaded => out
                .par_chunks_mut(tile_len)
                .enumerate()
                .for_each(|(t, slots)| search_tile(req, t * QUERY_TILE, slots)),
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "bruteforce-sharemem"
    }
}

/// Fill `slots` for the queries starting at `first`.
fn search_tile(req: &SearchRequest<'_>, first: usize, slots: &mut [usize]) {
    let dim = req.dim;
    let k = req.k;
    let n_tile = slots.len() / k;
    let mut heaps: Vec<NeighborHeap> = (0..n_tile).map(|_| NeighborHeap::new(k)).collect();
    let mut staged: Vec<f32> = Vec::with_capacity(REF_BLOCK * dim);

    for (b, block) in req.reference.chunks(REF_BLOCK * dim).enumerate() {
        staged.clear();
        staged.extend_from_slice(block);
        let base = b * REF_BLOCK;
        for (t, heap) in heaps.iter_mut().enumerate() {
            let qi = first + t;
            let q = &req.query[qi * dim..(qi + 1) * dim];
            for (j, r) in staged.chunks_exact(dim).enumerate() {
                let idx = base + j;
                if req.exclude_self && idx == qi {
                    continue;
                }
                heap.push(req.metric.score(q, r), idx);
            }
        }
    }

    for (heap, slot) in heaps.into_iter().zip(slots.chunks_exact_mut(k)) {
        heap.drain_into(slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::knn::{BruteForce, Metric};

    #[test]
    fn matches_bruteforce_across_tiles() {
        // More rows than one query tile and one reference block.
        let n = 300;
        let pts: Vec<f32> = (0..n * 2)
            .map(|i| ((i * 7919) % 1013) as f32 * 0.37)
            .collect();
        for exclude_self in [false, true] {
            let req = SearchRequest {
                reference: &pts,
                query: &pts,
                dim: 2,
                k: 5,
                exclude_self,
                metric: Metric::Euclidean,
                device: Device::Threaded,
            };
            let a = BruteForce.search(&req).unwrap();
            let b = BruteForceSharedMem.search(&req).unwrap();
            assert_eq!(a, b);
        }
    }
}
