//! The external reference transform that the table interpolates around.

use smallvec::SmallVec;

/// The external, expensive color transform that a [`crate::Table`] accelerates.
///
/// Implementations must be referentially transparent: calling `evaluate` twice with the same
/// input must produce the same output, since the table caches results indefinitely between
/// purges. `evaluate` may fail (e.g. the transform it wraps is itself backed by an external
/// resource); a failure propagates as [`crate::TableError::EvaluatorFailed`] and leaves the
/// corresponding grid cell unpopulated.
pub trait Evaluator {
    /// The error an evaluation can fail with.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Evaluates the true transform at `input` (length `I`, the table's input dimension),
    /// returning the output color (length `O`, the table's output dimension) as 16-bit
    /// device-level components.
    fn evaluate(&self, input: &[f64]) -> Result<SmallVec<[u16; 8]>, Self::Error>;
}
