use thiserror::Error;

/// Hard failures raised by the solvers.
///
/// Infeasible, unbounded and limit outcomes are not errors; they are reported
/// through [`crate::SolutionStatus`] and the solution message log.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("pivot element {value:e} at row {row}, column {column} is below tolerance")]
    NumericalDegeneracy { row: usize, column: usize, value: f64 },
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("constraint has {found} coefficients but the problem has {expected} variables")]
    DimensionMismatch { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, SolverError>;
