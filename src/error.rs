use thiserror::Error;

/// Errors returned by the geometry algorithms in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Input contains no points (or no edges where edges are required).
    #[error("empty input")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// Requested sample count is incompatible with a point set.
    #[error("invalid sample count: requested {requested}, but a segment has {available} points")]
    InvalidSampleCount {
        /// Requested number of samples per segment.
        requested: usize,
        /// Points available in the smallest segment.
        available: usize,
    },

    /// Points in a dataset have inconsistent dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },

    /// Segment table does not describe the point rows.
    #[error("segment mismatch: expected {expected} rows, segments cover {found}")]
    SegmentMismatch {
        /// Rows present in the coordinate buffer.
        expected: usize,
        /// Rows covered by the segment sizes.
        found: usize,
    },

    /// Edge weight vector length differs from the edge count.
    #[error("weight count mismatch: {expected} edges, {found} weights")]
    WeightCountMismatch {
        /// Number of edges.
        expected: usize,
        /// Number of weights.
        found: usize,
    },

    /// An edge weight is negative (or NaN).
    #[error("edge weight at index {index} is negative or NaN")]
    NegativeWeight {
        /// Offending edge index.
        index: usize,
    },

    /// An edge endpoint refers to a node outside the graph.
    #[error("node {node} out of range for graph with {num_nodes} nodes")]
    NodeOutOfRange {
        /// Offending node id.
        node: usize,
        /// Number of nodes in the graph.
        num_nodes: usize,
    },

    /// A buffer required by the computation could not be allocated.
    #[error("resource exhausted: cannot allocate {requested} elements for {what}")]
    ResourceExhausted {
        /// What the buffer was for.
        what: &'static str,
        /// Requested element count (saturated on overflow).
        requested: usize,
    },
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
