//! Error kinds surfaced by the core, realizing the failure taxonomy of the
//! solve path. `SolveResult::status` (see [`crate::result`]) carries the
//! non-error terminations (infeasible, unbounded, iteration/time limits,
//! interrupted); this enum is for failures that abort an operation before
//! it can produce any status at all.

use thiserror::Error;

/// Failure returned by a fallible core operation (factorization, a
/// transform solve, or model-entry validation).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimplexError {
    /// Dimensions inconsistent, NaN in matrix/bounds/objective, or a
    /// duplicate (row, col) pair in a single bulk insertion. Detected at
    /// entry; no state is mutated before this is raised.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The basis could not be factorized within the Markowitz stability
    /// threshold, and the one-shot repair (swap the most suspect basic
    /// variable for its slack) also failed.
    #[error("singular basis: {0}")]
    SingularBasis(String),

    /// A transform solve or pivot produced a non-finite value, or the
    /// same numeric failure recurred after the single permitted repair.
    #[error("numeric error: {0}")]
    NumericError(String),

    /// Allocation of factor storage, the eta file, or a work buffer
    /// failed.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Debug-only invariant violation (basis-header/var-status desync,
    /// basic-variable count mismatch). Never constructed in release
    /// builds; `debug_assert_invariants` panics directly instead, since
    /// this is a defect in the core, not a condition a caller can act on.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),
}

pub type SimplexResult<T> = Result<T, SimplexError>;
