//! Point sets: flat coordinate buffers with a segment table.
//!
//! Every algorithm in this crate consumes the same representation: `N` rows of
//! `D` coordinates stored row-major, partitioned into contiguous segments. A
//! `(B, N, D)` batch is `B` segments of equal size; a plain `(N, D)` array is a
//! single segment.

use std::borrow::Cow;
use std::ops::Range;

use crate::error::{Error, Result};

/// How a [`PointSet`] was shaped by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// A single `(N, D)` array.
    Single,
    /// A `(B, N, D)` batch of equally sized point sets.
    Batched {
        /// Number of batch entries.
        batch: usize,
        /// Points per batch entry.
        n: usize,
    },
    /// A flat `(ΣN, D)` array with explicit segment sizes.
    Segmented,
}

/// A row-major point buffer partitioned into contiguous segments.
#[derive(Debug, Clone)]
pub struct PointSet<'a> {
    coords: Cow<'a, [f32]>,
    dim: usize,
    offsets: Vec<usize>,
    layout: Layout,
}

impl<'a> PointSet<'a> {
    /// A single `(N, D)` point set.
    pub fn new(coords: &'a [f32], dim: usize) -> Result<Self> {
        let rows = check_rows(coords.len(), dim)?;
        Self::build(Cow::Borrowed(coords), dim, &[rows], Layout::Single)
    }

    /// A `(B, N, D)` batch stored contiguously.
    pub fn batched(coords: &'a [f32], batch: usize, n: usize, dim: usize) -> Result<Self> {
        let rows = check_rows(coords.len(), dim)?;
        if batch == 0 || n == 0 {
            return Err(Error::EmptyInput);
        }
        let covered = batch.saturating_mul(n);
        if covered != rows {
            return Err(Error::SegmentMismatch {
                expected: rows,
                found: covered,
            });
        }
        let sizes = vec![n; batch];
        Self::build(
            Cow::Borrowed(coords),
            dim,
            &sizes,
            Layout::Batched { batch, n },
        )
    }

    /// A flat `(ΣN, D)` point set with explicit segment sizes.
    ///
    /// Zero-length segments are permitted and own no rows.
    pub fn segmented(coords: &'a [f32], dim: usize, sizes: &[usize]) -> Result<Self> {
        check_rows(coords.len(), dim)?;
        if sizes.is_empty() {
            return Err(Error::InvalidParameter {
                name: "segment_sizes",
                message: "must name at least one segment",
            });
        }
        Self::build(Cow::Borrowed(coords), dim, sizes, Layout::Segmented)
    }

    fn build(coords: Cow<'a, [f32]>, dim: usize, sizes: &[usize], layout: Layout) -> Result<Self> {
        let rows = coords.len() / dim;
        let mut offsets = Vec::with_capacity(sizes.len() + 1);
        offsets.push(0usize);
        let mut total = 0usize;
        for &s in sizes {
            total = total.saturating_add(s);
            offsets.push(total);
        }
        if total != rows {
            return Err(Error::SegmentMismatch {
                expected: rows,
                found: total,
            });
        }
        Ok(Self {
            coords,
            dim,
            offsets,
            layout,
        })
    }
}

impl PointSet<'static> {
    /// A single point set from row vectors, copying into a flat buffer.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::EmptyInput);
        }
        let dim = rows[0].len();
        if dim == 0 {
            return Err(Error::InvalidParameter {
                name: "dimension",
                message: "must be at least 1",
            });
        }
        let mut flat = Vec::with_capacity(rows.len() * dim);
        for row in rows {
            if row.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    found: row.len(),
                });
            }
            flat.extend_from_slice(row);
        }
        Self::build(Cow::Owned(flat), dim, &[rows.len()], Layout::Single)
    }
}

impl PointSet<'_> {
    /// Total number of rows across all segments.
    pub fn len(&self) -> usize {
        self.coords.len() / self.dim
    }

    /// Whether the set has no rows. Constructors reject this, so it is always `false`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinate dimensionality.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The shape the caller supplied.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Row-major coordinate buffer.
    pub fn coords(&self) -> &[f32] {
        &self.coords
    }

    /// Coordinates of row `i`.
    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.coords[i * self.dim..(i + 1) * self.dim]
    }

    /// Number of segments.
    pub fn num_segments(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Row range of segment `s`.
    pub fn segment(&self, s: usize) -> Range<usize> {
        self.offsets[s]..self.offsets[s + 1]
    }

    /// Row ranges of all segments, in order.
    pub fn segments(&self) -> impl ExactSizeIterator<Item = Range<usize>> + '_ {
        self.offsets.windows(2).map(|w| w[0]..w[1])
    }

    /// Sizes of all segments, in order.
    pub fn segment_sizes(&self) -> Vec<usize> {
        self.segments().map(|r| r.len()).collect()
    }

    /// Coordinates belonging to segment `s`.
    pub fn segment_coords(&self, s: usize) -> &[f32] {
        let r = self.segment(s);
        &self.coords[r.start * self.dim..r.end * self.dim]
    }

    /// Size of the smallest non-empty segment.
    pub fn min_segment_size(&self) -> Option<usize> {
        self.segments().map(|r| r.len()).filter(|&n| n > 0).min()
    }
}

fn check_rows(len: usize, dim: usize) -> Result<usize> {
    if len == 0 {
        return Err(Error::EmptyInput);
    }
    if dim == 0 {
        return Err(Error::InvalidParameter {
            name: "dimension",
            message: "must be at least 1",
        });
    }
    if len % dim != 0 {
        return Err(Error::InvalidParameter {
            name: "coords",
            message: "length must be a multiple of the dimension",
        });
    }
    Ok(len / dim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_is_one_segment() {
        let coords = [0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let ps = PointSet::new(&coords, 2).unwrap();
        assert_eq!(ps.len(), 3);
        assert_eq!(ps.num_segments(), 1);
        assert_eq!(ps.segment(0), 0..3);
        assert_eq!(ps.row(1), &[1.0, 1.0]);
        assert_eq!(ps.layout(), Layout::Single);
    }

    #[test]
    fn batched_splits_evenly() {
        let coords: Vec<f32> = (0..24).map(|i| i as f32).collect();
        let ps = PointSet::batched(&coords, 2, 4, 3).unwrap();
        assert_eq!(ps.segment_sizes(), vec![4, 4]);
        assert_eq!(ps.segment(1), 4..8);
        assert_eq!(ps.segment_coords(1)[0], 12.0);
    }

    #[test]
    fn batched_shape_must_cover_rows() {
        let coords = vec![0.0f32; 24];
        assert!(matches!(
            PointSet::batched(&coords, 3, 4, 3),
            Err(Error::SegmentMismatch { expected: 8, found: 12 })
        ));
    }

    #[test]
    fn segmented_sizes_must_sum_to_rows() {
        let coords = vec![0.0f32; 24];
        assert!(PointSet::segmented(&coords, 3, &[3, 5]).is_ok());
        assert!(matches!(
            PointSet::segmented(&coords, 3, &[3, 4]),
            Err(Error::SegmentMismatch { expected: 8, found: 7 })
        ));
    }

    #[test]
    fn empty_segments_are_ignored_for_min() {
        let coords = vec![0.0f32; 12];
        let ps = PointSet::segmented(&coords, 3, &[0, 3, 1]).unwrap();
        assert_eq!(ps.min_segment_size(), Some(1));
        assert_eq!(ps.segment(0), 0..0);
    }

    #[test]
    fn empty_input_rejected() {
        assert!(matches!(PointSet::new(&[], 3), Err(Error::EmptyInput)));
        assert!(matches!(
            PointSet::segmented(&[], 3, &[3, 5]),
            Err(Error::EmptyInput)
        ));
        assert!(matches!(PointSet::from_rows(&[]), Err(Error::EmptyInput)));
    }

    #[test]
    fn ragged_rows_rejected() {
        let rows = vec![vec![0.0, 1.0], vec![2.0]];
        assert!(matches!(
            PointSet::from_rows(&rows),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn length_not_multiple_of_dim() {
        let coords = [0.0f32; 5];
        assert!(PointSet::new(&coords, 2).is_err());
    }
}
