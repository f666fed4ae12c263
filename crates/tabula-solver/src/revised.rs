//! Revised simplex over an explicit basis inverse.
//!
//! Works in maximization form: minimize problems have their objective
//! negated on the way in and the optimum negated on the way out. The
//! entering column is the one with the largest positive reduced cost
//! `c_j - y . A_j`.

use log::{debug, info};

use crate::config::SolverConfig;
use crate::error::{Result, SolverError};
use crate::problem::{Problem, Sense, variable_name};
use crate::solution::{Solution, SolutionStatus, StructureCounts};
use crate::solver::Solve;
use crate::standard::StandardForm;

#[derive(Debug, Clone, Default)]
pub struct RevisedSimplex {
    config: SolverConfig,
}

/// Basis bookkeeping for one revised simplex run.
#[derive(Debug, Clone)]
struct BasisState {
    /// Constraint matrix `[A | I]`, row-major
    a: Vec<Vec<f64>>,
    b: Vec<f64>,
    /// Objective in maximization form, one entry per column
    c: Vec<f64>,
    /// Basic column of each row
    basis: Vec<usize>,
    inverse: Vec<Vec<f64>>,
    x_b: Vec<f64>,
}

impl BasisState {
    fn new(form: &StandardForm) -> Result<Self> {
        let rows = form.le_rows()?;
        let n = form.columns.num_columns();
        let m = rows.len();

        let mut a = Vec::with_capacity(m);
        let mut b = Vec::with_capacity(m);
        for (i, (coefficients, rhs)) in rows.into_iter().enumerate() {
            let mut row = coefficients;
            row.extend((0..m).map(|k| if k == i { 1.0 } else { 0.0 }));
            a.push(row);
            b.push(rhs);
        }

        let mut c = form.max_objective();
        c.resize(n + m, 0.0);

        Ok(Self {
            a,
            x_b: b.clone(),
            b,
            c,
            basis: (n..n + m).collect(),
            inverse: identity(m),
        })
    }

    fn rows(&self) -> usize {
        self.b.len()
    }

    fn cols(&self) -> usize {
        self.c.len()
    }

    /// y = c_B . B^-1
    fn multipliers(&self) -> Vec<f64> {
        let m = self.rows();
        (0..m)
            .map(|j| (0..m).map(|i| self.c[self.basis[i]] * self.inverse[i][j]).sum())
            .collect()
    }

    fn reduced_cost(&self, y: &[f64], col: usize) -> f64 {
        self.c[col] - (0..self.rows()).map(|i| y[i] * self.a[i][col]).sum::<f64>()
    }

    /// d = B^-1 . A_col
    fn direction(&self, col: usize) -> Vec<f64> {
        let m = self.rows();
        (0..m)
            .map(|i| (0..m).map(|k| self.inverse[i][k] * self.a[k][col]).sum())
            .collect()
    }

    fn refactor(&mut self, tolerance: f64) -> Result<()> {
        let m = self.rows();
        let basis_matrix: Vec<Vec<f64>> = (0..m)
            .map(|i| self.basis.iter().map(|&col| self.a[i][col]).collect())
            .collect();
        self.inverse = invert(&basis_matrix, tolerance)?;
        self.x_b = (0..m)
            .map(|i| (0..m).map(|k| self.inverse[i][k] * self.b[k]).sum())
            .collect();
        Ok(())
    }

    fn objective(&self) -> f64 {
        self.basis
            .iter()
            .zip(&self.x_b)
            .map(|(&col, x)| self.c[col] * x)
            .sum()
    }

    fn column_values(&self) -> Vec<f64> {
        let mut values = vec![0.0; self.cols()];
        for (&col, &x) in self.basis.iter().zip(&self.x_b) {
            values[col] = x;
        }
        values
    }
}

impl RevisedSimplex {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl Solve for RevisedSimplex {
    fn solve(&mut self, problem: &Problem) -> Result<Solution> {
        let tol = self.config.tolerance();
        let form = StandardForm::new(problem)?;
        let mut state = BasisState::new(&form)?;
        let n = form.columns.num_columns();
        let m = state.rows();

        let mut solution = Solution::new();
        solution.counts = StructureCounts {
            decision: n,
            slack: m,
            ..StructureCounts::default()
        };

        let mut iteration = 0;
        loop {
            if iteration >= self.config.max_phase2_iterations() {
                solution.terminate(
                    SolutionStatus::LimitReached,
                    format!("Limit exceeded: iteration limit of {} reached", iteration),
                );
                return Ok(solution);
            }
            if self.config.interrupt().is_triggered() {
                solution.terminate(
                    SolutionStatus::LimitReached,
                    format!("Limit exceeded: interrupted after {} iterations", iteration),
                );
                return Ok(solution);
            }

            let y = state.multipliers();
            let mut entering = None;
            let mut best = tol;
            for j in (0..state.cols()).filter(|j| !state.basis.contains(j)) {
                let rc = state.reduced_cost(&y, j);
                if rc > best {
                    best = rc;
                    entering = Some(j);
                }
            }
            let Some(col) = entering else {
                break;
            };

            let d = state.direction(col);
            let mut leaving = None;
            let mut min_ratio = f64::INFINITY;
            for (i, &di) in d.iter().enumerate() {
                if di > tol {
                    let ratio = state.x_b[i] / di;
                    if ratio < min_ratio {
                        min_ratio = ratio;
                        leaving = Some(i);
                    }
                }
            }
            let Some(row) = leaving else {
                solution.terminate(
                    SolutionStatus::Unbounded,
                    format!("Unbounded: column {} has no positive direction entry", col + 1),
                );
                info!("revised simplex: unbounded after {} iterations", iteration);
                return Ok(solution);
            };

            state.basis[row] = col;
            state.refactor(tol)?;
            iteration += 1;
            debug!("revised iteration {}: column {} enters at row {}", iteration, col, row + 1);
            if self.config.record_steps() {
                solution.record_text(
                    format!("Iteration {}", iteration),
                    format!(
                        "entering column {}, leaving row {}, reduced cost {:.6}, basis {:?}, xB {:?}",
                        col + 1,
                        row + 1,
                        best,
                        state.basis,
                        state.x_b
                    ),
                );
            }
        }

        let column_values = state.column_values();
        for (i, v) in form.columns.recover(&column_values[..n]).into_iter().enumerate() {
            solution.values.insert(variable_name(i), v);
        }
        for (k, v) in column_values[n..].iter().enumerate() {
            solution.values.insert(format!("s{}", k + 1), *v);
        }

        let value = match problem.sense {
            Sense::Maximize => state.objective(),
            Sense::Minimize => -state.objective(),
        };
        solution.status = SolutionStatus::Optimal;
        solution.optimal_value = Some(value);
        solution.log(format!("Optimal value: {:.6}", value));
        info!("revised simplex: optimal {} after {} iterations", value, iteration);
        Ok(solution)
    }
}

fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

/// Gauss-Jordan inversion with partial pivoting.
fn invert(matrix: &[Vec<f64>], tolerance: f64) -> Result<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut aug: Vec<Vec<f64>> = matrix
        .iter()
        .zip(identity(n))
        .map(|(row, id)| row.iter().copied().chain(id).collect())
        .collect();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| aug[i][col].abs().total_cmp(&aug[j][col].abs()))
            .unwrap_or(col);
        if aug[pivot][col].abs() <= tolerance {
            return Err(SolverError::NumericalDegeneracy {
                row: pivot,
                column: col,
                value: aug[pivot][col],
            });
        }
        aug.swap(col, pivot);

        let p = aug[col][col];
        for v in &mut aug[col] {
            *v /= p;
        }
        let pivot_row = aug[col].clone();
        for (i, row) in aug.iter_mut().enumerate() {
            if i == col {
                continue;
            }
            let factor = row[col];
            if factor != 0.0 {
                for (v, pv) in row.iter_mut().zip(&pivot_row) {
                    *v -= factor * pv;
                }
            }
        }
    }

    Ok(aug.into_iter().map(|row| row[n..].to_vec()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Interrupt;
    use crate::problem::Relation;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_textbook() {
        let mut problem = Problem::maximize(vec![3.0, 5.0]);
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 4.0).unwrap();
        problem.add_constraint(vec![0.0, 2.0], Relation::Le, 12.0).unwrap();
        problem.add_constraint(vec![3.0, 2.0], Relation::Le, 18.0).unwrap();

        let solution = RevisedSimplex::default().solve(&problem).unwrap();
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.optimal_value.unwrap() - 36.0).abs() < 1e-6);
        assert!((solution.value("x1").unwrap() - 2.0).abs() < 1e-6);
        assert!((solution.value("x2").unwrap() - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_minimize_sign_convention() {
        // min x1 - x2; x1 + x2 <= 4; x1 <= 3  ->  x2 = 4, z = -4
        let mut problem = Problem::minimize(vec![1.0, -1.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Le, 4.0).unwrap();
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 3.0).unwrap();

        let solution = RevisedSimplex::default().solve(&problem).unwrap();
        assert!((solution.optimal_value.unwrap() + 4.0).abs() < 1e-6);
        assert!((solution.value("x2").unwrap() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_nothing_to_improve() {
        // max -2x1 - 3x2 over the slack basis stays at the origin
        let mut problem = Problem::maximize(vec![-2.0, -3.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Le, 4.0).unwrap();

        let solution = RevisedSimplex::default().solve(&problem).unwrap();
        assert_eq!(solution.optimal_value, Some(0.0));
        assert!(solution.steps.is_empty());
    }

    #[test]
    fn test_unbounded() {
        let mut problem = Problem::maximize(vec![1.0, 1.0]);
        problem.add_constraint(vec![1.0, -1.0], Relation::Le, 2.0).unwrap();

        let solution = RevisedSimplex::default().solve(&problem).unwrap();
        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }

    #[test]
    fn test_invert() {
        let inv = invert(&[vec![2.0, 1.0], vec![1.0, 1.0]], 1e-12).unwrap();
        let expected = [[1.0, -1.0], [-1.0, 2.0]];
        for i in 0..2 {
            for j in 0..2 {
                assert!((inv[i][j] - expected[i][j]).abs() < 1e-12);
            }
        }
        assert!(invert(&[vec![1.0, 2.0], vec![2.0, 4.0]], 1e-12).is_err());
    }

    #[test]
    fn test_interrupted() {
        let mut problem = Problem::maximize(vec![3.0, 5.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Le, 4.0).unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let config = SolverConfig::default().with_interrupt(Interrupt::new().with_flag(flag));

        let solution = RevisedSimplex::new(config).solve(&problem).unwrap();
        assert_eq!(solution.status, SolutionStatus::LimitReached);
        assert_eq!(solution.optimal_value, None);
        assert!(solution.messages.iter().any(|m| m == "Limit exceeded: interrupted after 0 iterations"));
    }
}
