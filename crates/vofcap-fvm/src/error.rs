//! Error types for linear solves.

use crate::solver::SolverPerformance;

/// A linear solve that did not produce a trustworthy answer.
///
/// Both variants are recoverable: callers log them and continue with the
/// best field available, leaving the next outer iteration to catch up.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    /// A row has a zero diagonal; the unknown was left unchanged.
    #[error("singular matrix for '{field}': zero diagonal in row {row}")]
    Singular {
        /// Field being solved.
        field: String,
        /// First offending row.
        row: usize,
    },
    /// Iteration budget exhausted, or the iterate stopped being finite.
    #[error(
        "{} did not converge for '{}': residual {:.3e} after {} iterations",
        .performance.solver,
        .performance.field,
        .performance.final_residual,
        .performance.iterations
    )]
    NotConverged {
        /// Residual history of the failed solve.
        performance: SolverPerformance,
    },
}
