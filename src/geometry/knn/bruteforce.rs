//! Exhaustive neighbor search.
//!
//! [`BruteForce`] scores every candidate directly for each query.
//! [`BruteForceBlas`] materializes the full `(queries, references)` score
//! matrix from a Gram product `Q Rᵀ`, which turns the inner loop into a
//! contiguous multiply-add over a transposed reference block:
//!
//! ```text
//! euclidean: d(i, j) = ||q_i||² + ||r_j||² - 2 q_i·r_j
//! cosine:    d(i, j) = 1 - q_i·r_j
//! ```
//!
//! The Euclidean form cancels badly when points sit far from the origin, so
//! both sides are first shifted by the reference centroid. Distances are
//! unchanged by the shift.

use std::borrow::Cow;

use rayon::prelude::*;

use super::{fill_rows, Device, Metric};
use crate::error::Result;
use crate::geometry::traits::{NeighborSearch, SearchRequest};
use crate::geometry::util::{self, select_k};

/// Direct pairwise scoring per query.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForce;

impl NeighborSearch for BruteForce {
    fn search(&self, req: &SearchRequest<'_>) -> Result<Vec<usize>> {
        let dim = req.dim;
        let n_query = req.query.len() / dim;
        let total = util::checked_len(n_query, req.k, "neighbor indices")?;
        let mut out = util::try_filled(total, 0usize, "neighbor indices")?;

        fill_rows(&mut out, req.k, req.device, |qi, slot| {
            let q = &req.query[qi * dim..(qi + 1) * dim];
            let mut cands: Vec<(f32, usize)> = req
                .reference
                .chunks_exact(dim)
                .enumerate()
                .filter(|&(j, _)| !(req.exclude_self && j == qi))
                .map(|(j, r)| (req.metric.score(q, r), j))
                .collect();
            select_k(&mut cands, req.k);
            for (s, (_, j)) in slot.iter_mut().zip(cands) {
                *s = j;
            }
        });
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "bruteforce"
    }
}

/// Full score matrix from a Gram-matrix product, then per-row top-k.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceBlas;

impl NeighborSearch for BruteForceBlas {
    fn search(&self, req: &SearchRequest<'_>) -> Result<Vec<usize>> {
        let dim = req.dim;
        let n_query = req.query.len() / dim;
        let n_ref = req.reference.len() / dim;
        if req.k == 0 {
            return Ok(Vec::new());
        }

        let (reference, query): (Cow<'_, [f32]>, Cow<'_, [f32]>) = match req.metric {
            Metric::Euclidean => {
                let mean = centroid(req.reference, dim);
                (
                    Cow::Owned(shifted(req.reference, &mean)?),
                    Cow::Owned(shifted(req.query, &mean)?),
                )
            }
            Metric::Cosine => (Cow::Borrowed(req.reference), Cow::Borrowed(req.query)),
        };

        let cells = util::checked_len(n_query, n_ref, "distance matrix")?;
        let mut scores = util::try_filled(cells, 0.0f32, "distance matrix")?;
        let ref_t = transpose(&reference, n_ref, dim)?;
        let ref_sq: Vec<f32> = reference
            .chunks_exact(dim)
            .map(|r| util::dot(r, r))
            .collect();

        let gram_row = |qi: usize, row: &mut [f32]| {
            let q = &query[qi * dim..(qi + 1) * dim];
            for (p, &a) in q.iter().enumerate() {
                let col = &ref_t[p * n_ref..(p + 1) * n_ref];
                for (g, &b) in row.iter_mut().zip(col) {
                    *g += a * b;
                }
            }
            match req.metric {
                Metric::Euclidean => {
                    let q_sq = util::dot(q, q);
                    for (g, &r_sq) in row.iter_mut().zip(&ref_sq) {
                        *g = (q_sq + r_sq - 2.0 * *g).max(0.0);
                    }
                }
                Metric::Cosine => {
                    for g in row.iter_mut() {
                        *g = 1.0 - *g;
                    }
                }
            }
        };
        match req.device {
            Device::Cpu => scores
                .chunks_exact_mut(n_ref)
                .enumerate()
                .for_each(|(qi, row)| gram_row(qi, row)),
            Device::Threaded => scores
                .par_chunks_exact_mut(n_ref)
                .enumerate()
                .for_each(|(qi, row)| gram_row(qi, row)),
        }

        let total = util::checked_len(n_query, req.k, "neighbor indices")?;
        let mut out = util::try_filled(total, 0usize, "neighbor indices")?;
        fill_rows(&mut out, req.k, req.device, |qi, slot| {
            let row = &scores[qi * n_ref..(qi + 1) * n_ref];
            let mut cands: Vec<(f32, usize)> = row
                .iter()
                .enumerate()
                .filter(|&(j, _)| !(req.exclude_self && j == qi))
                .map(|(j, &d)| (d, j))
                .collect();
            select_k(&mut cands, req.k);
            for (s, (_, j)) in slot.iter_mut().zip(cands) {
                *s = j;
            }
        });
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "bruteforce-blas"
    }
}

/// Per-coordinate mean of a row-major block, accumulated in f64.
fn centroid(m: &[f32], dim: usize) -> Vec<f32> {
    let mut sum = vec![0.0f64; dim];
    let mut rows = 0usize;
    for row in m.chunks_exact(dim) {
        for (s, &v) in sum.iter_mut().zip(row) {
            *s += f64::from(v);
        }
        rows += 1;
    }
    let rows = rows.max(1) as f64;
    sum.into_iter().map(|s| (s / rows) as f32).collect()
}

/// Copy of `m` with `shift` subtracted from every row.
fn shifted(m: &[f32], shift: &[f32]) -> Result<Vec<f32>> {
    let mut out = util::try_filled(m.len(), 0.0f32, "shifted coordinates")?;
    for (src, dst) in m.chunks_exact(shift.len()).zip(out.chunks_exact_mut(shift.len())) {
        for ((d, &v), &c) in dst.iter_mut().zip(src).zip(shift) {
            *d = v - c;
        }
    }
    Ok(out)
}

/// Column-major copy of a row-major `(rows, dim)` block.
fn transpose(m: &[f32], rows: usize, dim: usize) -> Result<Vec<f32>> {
    let mut t = util::try_filled(m.len(), 0.0f32, "transposed references")?;
    for (i, row) in m.chunks_exact(dim).enumerate() {
        for (p, &v) in row.iter().enumerate() {
            t[p * rows + i] = v;
        }
    }
    Ok(t)
}
