use log::{debug, info, warn};

use crate::config::SolverConfig;
use crate::error::Result;
use crate::problem::{Problem, Sense, variable_name};
use crate::solution::{Solution, SolutionStatus, StructureCounts};
use crate::solver::Solve;
use crate::standard::StandardForm;
use crate::tableau::Tableau;

/// One-phase primal simplex for problems that start feasible at the slack
/// basis (every row `a x <= b` with `b >= 0`).
#[derive(Debug, Clone, Default)]
pub struct PrimalSimplex {
    config: SolverConfig,
}

impl PrimalSimplex {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    fn build_tableau(&self, form: &StandardForm) -> Result<Tableau> {
        let rows = form.le_rows()?;
        let n = form.columns.num_columns();
        let m = rows.len();

        let mut tableau = Tableau::new(m, n + m);
        for (j, c) in form.max_objective().iter().enumerate() {
            tableau.set(0, j, -c);
        }
        let rhs_col = tableau.rhs_col();
        for (i, (coefficients, rhs)) in rows.iter().enumerate() {
            for (j, &a) in coefficients.iter().enumerate() {
                tableau.set(i + 1, j, a);
            }
            tableau.set(i + 1, n + i, 1.0);
            tableau.set(i + 1, rhs_col, *rhs);
        }
        Ok(tableau)
    }
}

impl Solve for PrimalSimplex {
    fn solve(&mut self, problem: &Problem) -> Result<Solution> {
        let tol = self.config.tolerance();
        let form = StandardForm::new(problem)?;
        let mut tableau = self.build_tableau(&form)?;
        let n = form.columns.num_columns();
        let m = tableau.num_constraints();

        let mut solution = Solution::new();
        solution.counts = StructureCounts {
            decision: n,
            slack: m,
            ..StructureCounts::default()
        };
        if self.config.record_steps() {
            solution.record_tableau("Initial tableau", &tableau);
        }

        let mut iteration = 0;
        while !tableau.is_optimal(tol) {
            if iteration >= self.config.max_phase2_iterations() {
                warn!("primal simplex stopped after {} iterations", iteration);
                solution.terminate(
                    SolutionStatus::LimitReached,
                    format!("Limit exceeded: iteration limit of {} reached", iteration),
                );
                solution.tableau = Some(tableau);
                return Ok(solution);
            }
            if self.config.interrupt().is_triggered() {
                solution.terminate(SolutionStatus::LimitReached, "Limit exceeded: interrupted");
                solution.tableau = Some(tableau);
                return Ok(solution);
            }

            let Some(col) = tableau.entering_column(tol) else {
                break;
            };
            let Some(row) = tableau.leaving_row(col, tol) else {
                solution.terminate(
                    SolutionStatus::Unbounded,
                    format!("Unbounded: column {} has no positive entry", col + 1),
                );
                solution.tableau = Some(tableau);
                info!("primal simplex: unbounded after {} iterations", iteration);
                return Ok(solution);
            };

            tableau.pivot(row, col, tol)?;
            iteration += 1;
            debug!("primal pivot {}: row {}, column {}", iteration, row, col);
            if self.config.record_steps() {
                solution.record_tableau(format!("Iteration {}: pivot row {}, column {}", iteration, row, col), &tableau);
            }
        }

        let column_values: Vec<f64> = (0..n + m).map(|c| tableau.column_value(c, tol)).collect();
        for (i, v) in form.columns.recover(&column_values[..n]).into_iter().enumerate() {
            solution.values.insert(variable_name(i), v);
        }
        for (k, v) in column_values[n..].iter().enumerate() {
            solution.values.insert(format!("s{}", k + 1), *v);
        }

        let value = match problem.sense {
            Sense::Maximize => tableau.objective_value(),
            Sense::Minimize => -tableau.objective_value(),
        };
        solution.status = SolutionStatus::Optimal;
        solution.optimal_value = Some(value);
        solution.log(format!("Optimal value: {:.6}", value));
        solution.tableau = Some(tableau);
        info!("primal simplex: optimal {} after {} iterations", value, iteration);
        Ok(solution)
    }
}
