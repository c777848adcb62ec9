use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Error, Result};

/// Offset added to vector norms before cosine normalization.
pub(crate) const COSINE_EPS: f32 = 1e-5;

#[inline]
pub(crate) fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[inline]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale every row by `1 / (eps + ||row||)`.
pub(crate) fn normalize_rows(coords: &[f32], dim: usize, eps: f32) -> Result<Vec<f32>> {
    let mut out = try_filled(coords.len(), 0.0f32, "normalized coordinates")?;
    for (src, dst) in coords.chunks_exact(dim).zip(out.chunks_exact_mut(dim)) {
        let norm = dot(src, src).sqrt();
        let scale = 1.0 / (eps + norm);
        for (d, s) in dst.iter_mut().zip(src) {
            *d = s * scale;
        }
    }
    Ok(out)
}

/// Order two `(distance, index)` candidates: nearer first, then lower index.
#[inline]
pub(crate) fn cmp_candidate(a: &(f32, usize), b: &(f32, usize)) -> std::cmp::Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// Keep the `k` best candidates, sorted nearest-first.
pub(crate) fn select_k(cands: &mut Vec<(f32, usize)>, k: usize) {
    if k == 0 {
        cands.clear();
        return;
    }
    if k < cands.len() {
        cands.select_nth_unstable_by(k - 1, cmp_candidate);
        cands.truncate(k);
    }
    cands.sort_unstable_by(cmp_candidate);
}

/// `a * b`, or a resource error if the product overflows.
pub(crate) fn checked_len(a: usize, b: usize, what: &'static str) -> Result<usize> {
    a.checked_mul(b).ok_or(Error::ResourceExhausted {
        what,
        requested: usize::MAX,
    })
}

/// Allocate `len` copies of `fill`, reporting allocation failure instead of aborting.
pub(crate) fn try_filled<T: Clone>(len: usize, fill: T, what: &'static str) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| Error::ResourceExhausted {
            what,
            requested: len,
        })?;
    v.resize(len, fill);
    Ok(v)
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}
