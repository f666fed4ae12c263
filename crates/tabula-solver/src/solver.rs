use crate::error::Result;
use crate::problem::{Constraint, Problem};
use crate::solution::Solution;

/// Common contract of every solver in the crate.
pub trait Solve {
    fn solve(&mut self, problem: &Problem) -> Result<Solution>;
}

/// Incremental re-optimization on top of a previous solve.
///
/// Cloning an implementor must produce fully independent state so sibling
/// search branches never share a tableau.
pub trait Reoptimize: Solve + Clone {
    /// Adds `constraint` (over the original problem variables) to the solved
    /// tableau and re-optimizes from the current basis.
    fn add_constraint_and_resolve(&mut self, constraint: &Constraint) -> Result<Solution>;
}

/// Selects the variable to branch or cut on: among `candidates` whose value
/// is fractional, the one whose fractional part is closest to 0.5, lowest
/// index first on ties.
pub(crate) fn most_fractional(
    candidates: impl IntoIterator<Item = (usize, f64)>,
    integrality_tolerance: f64,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64, f64)> = None;
    for (index, value) in candidates {
        if (value - value.round()).abs() <= integrality_tolerance {
            continue;
        }
        let distance = (value - value.floor() - 0.5).abs();
        let better = match best {
            None => true,
            Some((best_index, _, best_distance)) => {
                distance < best_distance - f64::EPSILON
                    || ((distance - best_distance).abs() <= f64::EPSILON && index < best_index)
            }
        };
        if better {
            best = Some((index, value, distance));
        }
    }
    best.map(|(index, value, _)| (index, value))
}
