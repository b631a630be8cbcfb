//! Error taxonomy for table creation and conversion.

use thiserror::Error as ThisError;

/// Errors that can occur while validating a [`crate::TableConfig`] at table creation time.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum ConfigError {
    /// Input dimension `I` was outside the supported `1..=16` range.
    #[error("input dimension {0} is out of the supported range 1..=16")]
    InvalidDimension(usize),
    /// Output dimension `O` was zero.
    #[error("output dimension must be greater than zero")]
    InvalidOutputDimension,
    /// Grid side `S` was outside the supported `2..=33` range.
    #[error("grid side {0} is out of the supported range 2..=33")]
    InvalidGridSide(usize),
    /// A per-dimension input range had `lo >= hi`.
    #[error("input range for dimension {dim} is not increasing: lo={lo}, hi={hi}")]
    InvalidRange { dim: usize, lo: f64, hi: f64 },
    /// The smoothness parameter was outside `[0, 1]`.
    #[error("smoothness {0} is out of the supported range [0.0, 1.0]")]
    SmoothnessOutOfRange(f64),
    /// An explicit `cache_bits` override would encode more than 30 bits of mini-cube anchor.
    #[error(
        "cache_bits override {cache_bits} with dimension {dims} and grid side {side} would \
         need {needed_bits} anchor bits, more than the 30 available"
    )]
    CacheBitsTooLarge {
        cache_bits: u8,
        dims: usize,
        side: usize,
        needed_bits: u32,
    },
}

/// Errors that can occur while converting colors through a [`crate::Table`].
///
/// Generic over `E`, the error type of the caller's [`crate::Evaluator`] implementation, so
/// that an evaluator failure can be reported without forcing every evaluator to share one
/// concrete error type.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum TableError<E>
where
    E: std::error::Error + 'static,
{
    /// An allocation failed and the low-memory handler could not recover enough headroom.
    #[error("out of memory: failed to allocate approximately {requested_bytes} bytes")]
    OutOfMemory { requested_bytes: usize },
    /// The external evaluator reported a failure while populating or validating a grid point.
    #[error("evaluator failed: {0}")]
    EvaluatorFailed(E),
    /// The table's creation request was invalid.
    #[error("invalid table configuration: {0}")]
    ConfigError(#[from] ConfigError),
}
