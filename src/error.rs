use thiserror::Error;

/// Errors produced by the digit/stats/streak core.
///
/// Recoverable conditions never cross the tick-processing boundary as panics:
/// an invalid digit is a local reject with no state mutation, and extraction
/// failures are surfaced to the feed adapter, which decides whether to skip
/// the tick or drop the symbol's subscription.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed price or unusable decimal precision in digit extraction.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A value outside 0..=9 was presented to the tracker or engine.
    #[error("invalid digit: {0} (expected 0-9)")]
    InvalidDigit(i64),

    /// The external trade executor rejected or erred. The engine guard is
    /// released by the caller; there is no automatic retry.
    #[error("trade execution failed: {0}")]
    ExecutionFailure(String),
}
