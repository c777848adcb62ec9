//! Farthest-point sampling.
//!
//! # The Algorithm
//!
//! Starting from one seed point, repeatedly add the point whose distance to
//! the already-selected set is largest:
//!
//! ```text
//! s_0     = start
//! d(i)    = min_{t < m} ||x_i - x_{s_t}||²
//! s_m     = argmax_i d(i)
//! ```
//!
//! Each segment is sampled independently. Distances are kept incrementally,
//! so one segment costs `O(M · N · D)` time and `O(N)` space. Ties go to the
//! lowest index.

use log::debug;
use rand::Rng;
use rayon::prelude::*;

use super::knn::Device;
use super::points::PointSet;
use super::util;
use crate::error::{Error, Result};

/// Farthest-point sampler.
#[derive(Debug, Clone)]
pub struct FarthestPointSampler {
    num_samples: usize,
    start_idx: Option<usize>,
    seed: Option<u64>,
    device: Device,
}

/// Sample indices, `(segments, samples)` row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Samples {
    indices: Vec<usize>,
    num_samples: usize,
    offsets: Vec<usize>,
}

impl Samples {
    /// Number of sampled segments.
    pub fn num_segments(&self) -> usize {
        self.offsets.len()
    }

    /// Samples per segment.
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Segment-local indices for segment `b`, in selection order.
    ///
    /// # Panics
    ///
    /// Panics if `b >= self.num_segments()`.
    pub fn row(&self, b: usize) -> &[usize] {
        &self.indices[b * self.num_samples..(b + 1) * self.num_samples]
    }

    /// Iterate all rows.
    pub fn rows(&self) -> impl Iterator<Item = &[usize]> + '_ {
        self.indices.chunks_exact(self.num_samples)
    }

    /// Row-major segment-local indices.
    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }

    /// Indices of segment `b` as rows of the flat point buffer.
    ///
    /// # Panics
    ///
    /// Panics if `b >= self.num_segments()`.
    pub fn global(&self, b: usize) -> Vec<usize> {
        let base = self.offsets[b];
        self.row(b).iter().map(|&i| base + i).collect()
    }
}

impl FarthestPointSampler {
    /// Create a sampler selecting `num_samples` points per segment.
    pub fn new(num_samples: usize) -> Self {
        Self {
            num_samples,
            start_idx: None,
            seed: None,
            device: Device::default(),
        }
    }

    /// Start every segment from this local index instead of a random one.
    pub fn with_start_idx(mut self, start_idx: usize) -> Self {
        self.start_idx = Some(start_idx);
        self
    }

    /// Seed for the random start indices.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the execution backend.
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Sample every segment of `points`.
    pub fn sample(&self, points: &PointSet<'_>) -> Result<Samples> {
        if points.is_empty() {
            return Err(Error::EmptyInput);
        }
        if self.num_samples == 0 {
            return Err(Error::InvalidParameter {
                name: "num_samples",
                message: "must be at least 1",
            });
        }
        let smallest = points.segments().map(|r| r.len()).min().unwrap_or(0);
        if self.num_samples > smallest {
            return Err(Error::InvalidSampleCount {
                requested: self.num_samples,
                available: smallest,
            });
        }
        if let Some(start) = self.start_idx {
            if start >= smallest {
                return Err(Error::InvalidParameter {
                    name: "start_idx",
                    message: "must be less than the size of every segment",
                });
            }
        }

        let segments: Vec<_> = points.segments().collect();
        let starts: Vec<usize> = match self.start_idx {
            Some(s) => vec![s; segments.len()],
            None => {
                let mut rng = util::seeded_rng(self.seed);
                segments
                    .iter()
                    .map(|r| rng.random_range(0..r.len()))
                    .collect()
            }
        };
        debug!(
            "fps: {} samples from {} segments, device={:?}",
            self.num_samples,
            segments.len(),
            self.device
        );

        let m = self.num_samples;
        let total = util::checked_len(segments.len(), m, "sample indices")?;
        let mut indices = util::try_filled(total, 0usize, "sample indices")?;
        let dim = points.dim();
        let coords = points.coords();
        let run = |(b, out): (usize, &mut [usize])| {
            let r = &segments[b];
            let seg = &coords[r.start * dim..r.end * dim];
            farthest_points(seg, dim, starts[b], out)
        };
        match self.device {
            Device::Cpu => indices.chunks_exact_mut(m).enumerate().try_for_each(run)?,
            Device::Threaded => indices.par_chunks_exact_mut(m).enumerate().try_for_each(run)?,
        }

        Ok(Samples {
            indices,
            num_samples: m,
            offsets: segments.iter().map(|r| r.start).collect(),
        })
    }
}

/// Fill `out` with farthest-point samples from one segment.
fn farthest_points(seg: &[f32], dim: usize, start: usize, out: &mut [usize]) -> Result<()> {
    let n = seg.len() / dim;
    let mut min_dist = util::try_filled(n, f32::INFINITY, "fps distances")?;
    let mut current = start;
    for slot in out.iter_mut() {
        *slot = current;
        min_dist[current] = f32::NEG_INFINITY;
        let anchor = &seg[current * dim..(current + 1) * dim];

        let mut best = (f32::NEG_INFINITY, current);
        for (i, p) in seg.chunks_exact(dim).enumerate() {
            if min_dist[i] == f32::NEG_INFINITY {
                continue;
            }
            let d = util::squared_euclidean(anchor, p);
            if d < min_dist[i] {
                min_dist[i] = d;
            }
            if min_dist[i] > best.0 {
                best = (min_dist[i], i);
            }
        }
        current = best.1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;

    fn uniform(n: usize, dim: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n * dim).map(|_| rng.random::<f32>()).collect()
    }

    #[test]
    fn shape_and_range() {
        let x = uniform(1000, 3, 0);
        let points = PointSet::batched(&x, 5, 200, 3).unwrap();
        let res = FarthestPointSampler::new(10)
            .with_seed(42)
            .sample(&points)
            .unwrap();
        assert_eq!(res.num_segments(), 5);
        assert_eq!(res.num_samples(), 10);
        assert!(res.as_slice().iter().all(|&i| i < 200));
        assert!(res.as_slice().iter().sum::<usize>() > 0);
        for row in res.rows() {
            let mut r = row.to_vec();
            r.sort_unstable();
            r.dedup();
            assert_eq!(r.len(), 10);
        }
    }

    #[test]
    fn fixed_start_is_first_sample() {
        let x = uniform(1000, 3, 1);
        let points = PointSet::batched(&x, 5, 200, 3).unwrap();
        let res = FarthestPointSampler::new(10)
            .with_start_idx(0)
            .sample(&points)
            .unwrap();
        for row in res.rows() {
            assert_eq!(row[0], 0);
        }
        assert_eq!(res.global(2)[0], 400);
    }

    #[test]
    fn line_picks_extremes() {
        let x: Vec<f32> = (0..11).map(|i| i as f32).collect();
        let points = PointSet::new(&x, 1).unwrap();
        let res = FarthestPointSampler::new(3)
            .with_start_idx(0)
            .sample(&points)
            .unwrap();
        assert_eq!(res.row(0), &[0, 10, 5]);
    }

    #[test]
    fn ties_go_to_lowest_index() {
        // Points 1 and 2 are equally far from 0.
        let x = [0.0f32, 0.0, 1.0, 0.0, -1.0, 0.0];
        let points = PointSet::new(&x, 2).unwrap();
        let res = FarthestPointSampler::new(2)
            .with_start_idx(0)
            .sample(&points)
            .unwrap();
        assert_eq!(res.row(0), &[0, 1]);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let x = uniform(300, 2, 3);
        let points = PointSet::segmented(&x, 2, &[100, 120, 80]).unwrap();
        let a = FarthestPointSampler::new(8).with_seed(9).sample(&points).unwrap();
        let b = FarthestPointSampler::new(8)
            .with_seed(9)
            .with_device(Device::Cpu)
            .sample(&points)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn coincident_points_are_distinct_samples() {
        let x = vec![0.5f32; 10 * 3];
        let points = PointSet::new(&x, 3).unwrap();
        let res = FarthestPointSampler::new(10)
            .with_start_idx(3)
            .sample(&points)
            .unwrap();
        let mut r = res.row(0).to_vec();
        r.sort_unstable();
        assert_eq!(r, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn farthest_points_fills_every_slot() {
        let x = [0.0f32, 4.0, 1.0, 9.0];
        let mut out = [usize::MAX; 3];
        farthest_points(&x, 1, 2, &mut out).unwrap();
        assert_eq!(out, [2, 3, 1]);
    }

    #[test]
    fn too_many_samples() {
        let x = uniform(8, 3, 4);
        let points = PointSet::segmented(&x, 3, &[3, 5]).unwrap();
        assert!(matches!(
            FarthestPointSampler::new(4).sample(&points),
            Err(Error::InvalidSampleCount {
                requested: 4,
                available: 3
            })
        ));
    }

    #[test]
    fn invalid_arguments() {
        let x = uniform(8, 3, 5);
        let points = PointSet::new(&x, 3).unwrap();
        assert!(FarthestPointSampler::new(0).sample(&points).is_err());
        assert!(FarthestPointSampler::new(2)
            .with_start_idx(8)
            .sample(&points)
            .is_err());
        let empty = PointSet::segmented(&x, 3, &[8, 0]).unwrap();
        assert!(FarthestPointSampler::new(1).sample(&empty).is_err());
    }
}
