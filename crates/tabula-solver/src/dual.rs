//! Two-phase dual simplex with incremental constraint addition.
//!
//! Phase 1 repairs negative right-hand sides with dual ratio pivots, phase 2
//! runs the primal simplex on the resulting feasible tableau. A solved
//! instance keeps its tableau so constraints can be added and re-optimized
//! from the current basis, which is what branch-and-bound and the cutting
//! plane solver build on.

use log::{debug, info, warn};

use crate::config::SolverConfig;
use crate::error::{Result, SolverError};
use crate::problem::{Constraint, Problem, Relation, Sense, variable_name};
use crate::solution::{Analysis, ReducedCost, ShadowPrice, Solution, SolutionStatus, StructureCounts};
use crate::solver::{Reoptimize, Solve};
use crate::standard::{ColumnMap, StandardForm};
use crate::tableau::Tableau;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuxKind {
    /// `+1` column of a `<=` row
    Slack,
    /// `+1` column of a negated `>=` row
    Excess,
    /// Big-M penalized column of an `=` row
    Artificial,
}

/// An auxiliary tableau column, one per constraint row.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AuxColumn {
    pub kind: AuxKind,
    pub name: String,
    /// Whether the source row was multiplied by -1 when it was added
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum PhaseResult {
    Done,
    Infeasible(String),
    Unbounded(String),
    Limit(String),
}

#[derive(Debug, Clone)]
struct Model {
    problem: Problem,
    columns: ColumnMap,
    tableau: Tableau,
    aux: Vec<AuxColumn>,
    counts: StructureCounts,
}

/// Dual simplex solver state. Cloning gives an independent copy of the
/// tableau, column bookkeeping and audit trail.
#[derive(Debug, Clone, Default)]
pub struct DualSimplex {
    config: SolverConfig,
    model: Option<Model>,
    trail: Solution,
    pivots: usize,
}

impl DualSimplex {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            model: None,
            trail: Solution::new(),
            pivots: 0,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// The most recent solution, including the audit trail so far.
    pub fn solution(&self) -> &Solution {
        &self.trail
    }

    pub fn tableau(&self) -> Option<&Tableau> {
        self.model.as_ref().map(|m| &m.tableau)
    }

    /// The problem as solved so far, including constraints added since.
    pub fn problem(&self) -> Option<&Problem> {
        self.model.as_ref().map(|m| &m.problem)
    }

    pub fn counts(&self) -> StructureCounts {
        self.model.as_ref().map(|m| m.counts).unwrap_or_default()
    }

    pub fn aux_columns(&self) -> &[AuxColumn] {
        self.model.as_ref().map(|m| m.aux.as_slice()).unwrap_or(&[])
    }

    pub fn columns(&self) -> Option<&ColumnMap> {
        self.model.as_ref().map(|m| &m.columns)
    }

    fn model_mut(&mut self) -> Result<&mut Model> {
        self.model.as_mut().ok_or_else(|| {
            SolverError::InvalidOperation("incremental re-optimization requires a prior solve".into())
        })
    }

    /// Appends the row `coefficients . columns + s = rhs` with a fresh slack
    /// column `s`. `coefficients` covers every current non-RHS column.
    pub(crate) fn append_row(&mut self, coefficients: &[f64], rhs: f64, label: &str) -> Result<()> {
        let record = self.config.record_steps();
        let model = self.model_mut()?;
        let width = model.tableau.cols() - 1;
        if coefficients.len() != width {
            return Err(SolverError::DimensionMismatch {
                expected: width,
                found: coefficients.len(),
            });
        }

        let col = model.tableau.insert_column();
        let mut row = coefficients.to_vec();
        row.push(1.0);
        row.push(rhs);
        model.tableau.push_row(row)?;

        model.counts.slack += 1;
        let name = format!("s{}", model.counts.slack);
        debug!("appended row with slack {} at column {}", name, col);
        model.aux.push(AuxColumn {
            kind: AuxKind::Slack,
            name,
            negated: false,
        });

        if record {
            let snapshot = model.tableau.clone();
            self.trail.record_tableau(label, &snapshot);
        }
        Ok(())
    }

    /// Runs phase 1 (when any RHS is negative) then phase 2 on the current
    /// tableau and extracts a fresh solution.
    pub(crate) fn reoptimize(&mut self) -> Result<Solution> {
        let mut outcome = self.phase1()?;
        if outcome == PhaseResult::Done {
            outcome = self.phase2()?;
        }
        let solution = self.finish(outcome)?;
        self.trail = solution.clone();
        Ok(solution)
    }

    fn build(&self, problem: &Problem) -> Result<Model> {
        let form = StandardForm::new(problem)?;
        let n = form.columns.num_columns();
        let m = form.rows.len();
        let big_m = self.config.big_m();

        let mut tableau = Tableau::new(m, n + m);
        for (j, c) in form.max_objective().iter().enumerate() {
            tableau.set(0, j, -c);
        }

        let mut counts = StructureCounts {
            decision: n,
            ..StructureCounts::default()
        };
        let mut aux = Vec::with_capacity(m);
        let rhs_col = tableau.rhs_col();

        for (i, row) in form.rows.iter().enumerate() {
            let r = i + 1;
            let (kind, negated) = match row.relation {
                Relation::Le => (AuxKind::Slack, false),
                Relation::Ge => (AuxKind::Excess, true),
                Relation::Eq => (AuxKind::Artificial, row.rhs < 0.0),
            };
            let sign = if negated { -1.0 } else { 1.0 };
            for (j, &a) in row.coefficients.iter().enumerate() {
                tableau.set(r, j, sign * a);
            }
            tableau.set(r, rhs_col, sign * row.rhs);
            tableau.set(r, n + i, 1.0);
            aux.push(AuxColumn {
                kind,
                name: counts.next_name(kind),
                negated,
            });
        }

        // Big-M penalty, kept canonical while the artificial is basic
        for (i, column) in aux.iter().enumerate() {
            if column.kind == AuxKind::Artificial {
                tableau.set(0, n + i, big_m);
                tableau.subtract_row(0, i + 1, big_m);
            }
        }

        Ok(Model {
            problem: problem.clone(),
            columns: form.columns,
            tableau,
            aux,
            counts,
        })
    }

    fn phase1(&mut self) -> Result<PhaseResult> {
        let tol = self.config.tolerance();
        let max_iterations = self.config.max_phase1_iterations();
        let record = self.config.record_steps();
        let interrupt = self.config.interrupt().clone();
        let Some(model) = self.model.as_mut() else {
            return Err(SolverError::InvalidOperation("no tableau to optimize".into()));
        };

        let mut iteration = 0;
        loop {
            let rhs_col = model.tableau.rhs_col();

            // Most negative RHS, first found on ties
            let mut pivot_row = None;
            let mut min_rhs = -tol;
            for i in 1..model.tableau.rows() {
                let rhs = model.tableau.get(i, rhs_col);
                if rhs < min_rhs {
                    min_rhs = rhs;
                    pivot_row = Some(i);
                }
            }
            let Some(row) = pivot_row else {
                return Ok(PhaseResult::Done);
            };

            if iteration >= max_iterations {
                warn!("dual phase 1 stopped after {} iterations", iteration);
                return Ok(PhaseResult::Limit(format!(
                    "phase 1 iteration limit of {} reached",
                    max_iterations
                )));
            }
            if interrupt.is_triggered() {
                return Ok(PhaseResult::Limit("interrupted during phase 1".into()));
            }

            // Dual ratio test over negative row entries
            let mut pivot_col = None;
            let mut min_ratio = f64::INFINITY;
            for j in 0..rhs_col {
                let a = model.tableau.get(row, j);
                if a < -tol && !model.is_artificial(j) {
                    let ratio = (model.tableau.get(0, j) / a).abs();
                    if ratio < min_ratio {
                        min_ratio = ratio;
                        pivot_col = Some(j);
                    }
                }
            }
            let Some(col) = pivot_col else {
                return Ok(PhaseResult::Infeasible(format!(
                    "row {} has negative right-hand side {:.6} and no negative coefficient to pivot on",
                    row, min_rhs
                )));
            };

            model.tableau.pivot(row, col, tol)?;
            iteration += 1;
            self.pivots += 1;
            debug!("phase 1 pivot {}: row {}, column {}", iteration, row, col);
            if record {
                self.trail
                    .record_tableau(format!("Phase 1, iteration {}: pivot row {}, column {}", iteration, row, col), &model.tableau);
            }
        }
    }

    fn phase2(&mut self) -> Result<PhaseResult> {
        let tol = self.config.tolerance();
        let max_iterations = self.config.max_phase2_iterations();
        let record = self.config.record_steps();
        let interrupt = self.config.interrupt().clone();
        let Some(model) = self.model.as_mut() else {
            return Err(SolverError::InvalidOperation("no tableau to optimize".into()));
        };

        let mut iteration = 0;
        loop {
            let Some(col) = model.tableau.entering_column_where(tol, |j| !model.is_artificial(j)) else {
                return Ok(PhaseResult::Done);
            };
            let Some(row) = model.tableau.leaving_row(col, tol) else {
                return Ok(PhaseResult::Unbounded(format!(
                    "column {} can increase without bound",
                    model.column_name(col)
                )));
            };

            if iteration >= max_iterations {
                warn!("dual phase 2 stopped after {} iterations", iteration);
                return Ok(PhaseResult::Limit(format!(
                    "phase 2 iteration limit of {} reached",
                    max_iterations
                )));
            }
            if interrupt.is_triggered() {
                return Ok(PhaseResult::Limit("interrupted during phase 2".into()));
            }

            model.tableau.pivot(row, col, tol)?;
            iteration += 1;
            self.pivots += 1;
            debug!("phase 2 pivot {}: row {}, column {}", iteration, row, col);
            if record {
                self.trail
                    .record_tableau(format!("Phase 2, iteration {}: pivot row {}, column {}", iteration, row, col), &model.tableau);
            }
        }
    }

    fn finish(&self, outcome: PhaseResult) -> Result<Solution> {
        let tol = self.config.tolerance();
        let Some(model) = self.model.as_ref() else {
            return Err(SolverError::InvalidOperation("no tableau to extract from".into()));
        };

        let mut solution = self.trail.clone();
        solution.values.clear();
        solution.analysis = None;
        solution.tableau = Some(model.tableau.clone());
        solution.counts = model.counts;

        let status = match outcome {
            PhaseResult::Done => match model.positive_artificial(tol) {
                Some(name) => {
                    solution.terminate(
                        SolutionStatus::Infeasible,
                        format!("Infeasible: artificial variable {} remains positive", name),
                    );
                    SolutionStatus::Infeasible
                }
                None => {
                    model.extract(&mut solution, &self.config);
                    SolutionStatus::Optimal
                }
            },
            PhaseResult::Infeasible(reason) => {
                solution.terminate(SolutionStatus::Infeasible, format!("Infeasible: {}", reason));
                SolutionStatus::Infeasible
            }
            PhaseResult::Unbounded(reason) => {
                solution.terminate(SolutionStatus::Unbounded, format!("Unbounded: {}", reason));
                SolutionStatus::Unbounded
            }
            PhaseResult::Limit(reason) => {
                solution.terminate(SolutionStatus::LimitReached, format!("Limit exceeded: {}", reason));
                SolutionStatus::LimitReached
            }
        };

        info!(
            "dual simplex finished: {:?} after {} pivots, objective {:?}",
            status, self.pivots, solution.optimal_value
        );
        Ok(solution)
    }
}

impl StructureCounts {
    /// Bumps the counter for `kind` and returns the new column name.
    fn next_name(&mut self, kind: AuxKind) -> String {
        match kind {
            AuxKind::Slack => {
                self.slack += 1;
                format!("s{}", self.slack)
            }
            AuxKind::Excess => {
                self.excess += 1;
                format!("e{}", self.excess)
            }
            AuxKind::Artificial => {
                self.artificial += 1;
                format!("a{}", self.artificial)
            }
        }
    }
}

impl Model {
    fn decision_columns(&self) -> usize {
        self.columns.num_columns()
    }

    fn is_artificial(&self, col: usize) -> bool {
        let n = self.decision_columns();
        col >= n && self.aux.get(col - n).is_some_and(|a| a.kind == AuxKind::Artificial)
    }

    fn column_name(&self, col: usize) -> String {
        let n = self.decision_columns();
        if col < n {
            format!("c{}", col + 1)
        } else {
            self.aux.get(col - n).map(|a| a.name.clone()).unwrap_or_default()
        }
    }

    /// Value of any column, accepting a -1 unit entry for excess columns.
    fn column_value(&self, col: usize, tol: f64) -> f64 {
        if let Some(row) = self.tableau.basic_row(col, tol) {
            return self.tableau.rhs(row);
        }
        let n = self.decision_columns();
        let is_excess = col >= n && self.aux.get(col - n).is_some_and(|a| a.kind == AuxKind::Excess);
        if is_excess {
            if let Some(row) = self.tableau.unit_row(col, -1.0, tol) {
                return -self.tableau.rhs(row);
            }
        }
        0.0
    }

    fn positive_artificial(&self, tol: f64) -> Option<String> {
        let n = self.decision_columns();
        self.aux
            .iter()
            .enumerate()
            .filter(|(_, a)| a.kind == AuxKind::Artificial)
            .find(|(k, _)| self.column_value(n + k, tol) > tol)
            .map(|(_, a)| a.name.clone())
    }

    fn extract(&self, solution: &mut Solution, config: &SolverConfig) {
        let tol = config.tolerance();
        let n = self.decision_columns();
        let clean = |v: f64| if v.abs() <= tol { 0.0 } else { v };

        let column_values: Vec<f64> = (0..n).map(|c| self.column_value(c, tol)).collect();
        let values = self.columns.recover(&column_values);
        for (i, &v) in values.iter().enumerate() {
            solution.values.insert(variable_name(i), clean(v));
        }
        for (k, aux) in self.aux.iter().enumerate() {
            solution.values.insert(aux.name.clone(), clean(self.column_value(n + k, tol)));
        }

        let objective = self.tableau.objective_value();
        let value = match self.problem.sense {
            Sense::Maximize => objective,
            Sense::Minimize => -objective,
        };
        solution.status = SolutionStatus::Optimal;
        solution.optimal_value = Some(value);
        solution.log(format!("Optimal value: {:.6}", value));
        solution.analysis = Some(self.analyze(&values, config));
    }

    fn analyze(&self, values: &[f64], config: &SolverConfig) -> Analysis {
        let tol = config.tolerance();
        let n = self.decision_columns();
        let sense_sign = match self.problem.sense {
            Sense::Maximize => 1.0,
            Sense::Minimize => -1.0,
        };

        let mut shadow_prices = Vec::with_capacity(self.aux.len());
        let mut binding_constraints = Vec::new();
        for (k, aux) in self.aux.iter().enumerate() {
            let col = n + k;
            let mut dual = self.tableau.get(0, col);
            if aux.kind == AuxKind::Artificial {
                dual -= config.big_m();
            }
            if aux.negated {
                dual = -dual;
            }
            let value = sense_sign * dual;
            shadow_prices.push(ShadowPrice {
                constraint: aux.name.clone(),
                value: if value.abs() <= tol { 0.0 } else { value },
            });
            if self.column_value(col, tol).abs() <= tol {
                binding_constraints.push(aux.name.clone());
            }
        }

        // Row 0 holds how fast the max-form objective falls per unit of the column
        let reduced_costs = (0..self.columns.num_variables())
            .map(|i| {
                let col = self.columns.first_column(i).unwrap_or(0);
                let is_basic = col < n && self.tableau.basic_row(col, tol).is_some();
                let reduced_cost = if is_basic {
                    0.0
                } else {
                    let rate = -sense_sign * self.columns.sign(i) * self.tableau.get(0, col);
                    if rate.abs() <= tol { 0.0 } else { rate }
                };
                ReducedCost {
                    variable: variable_name(i),
                    value: values.get(i).copied().unwrap_or(0.0),
                    reduced_cost,
                    is_basic,
                }
            })
            .collect();

        Analysis {
            shadow_prices,
            reduced_costs,
            binding_constraints,
        }
    }
}

impl Solve for DualSimplex {
    fn solve(&mut self, problem: &Problem) -> Result<Solution> {
        self.trail = Solution::new();
        self.pivots = 0;
        let model = self.build(problem)?;
        if self.config.record_steps() {
            self.trail.record_tableau("Initial tableau", &model.tableau);
        }
        debug!(
            "dual simplex: {} decision columns, {} constraint rows",
            model.counts.decision,
            model.tableau.num_constraints()
        );
        self.model = Some(model);
        self.reoptimize()
    }
}

impl Reoptimize for DualSimplex {
    fn add_constraint_and_resolve(&mut self, constraint: &Constraint) -> Result<Solution> {
        let tol = self.config.tolerance();
        let big_m = self.config.big_m();
        let record = self.config.record_steps();
        let model = self.model_mut()?;

        let coefficients = model.columns.translate(&constraint.coefficients)?;
        model.problem.push_constraint(constraint.clone())?;
        let n = model.decision_columns();

        // Basic rows are located before the new row exists
        let basics: Vec<Option<usize>> = (0..n).map(|c| model.tableau.basic_row(c, tol)).collect();

        let (kind, negated) = match constraint.relation {
            Relation::Le => (AuxKind::Slack, false),
            Relation::Ge => (AuxKind::Excess, true),
            Relation::Eq => (AuxKind::Artificial, constraint.rhs < 0.0),
        };
        let sign = if negated { -1.0 } else { 1.0 };

        let col = model.tableau.insert_column();
        let mut row = vec![0.0; model.tableau.cols()];
        for (j, a) in coefficients.iter().enumerate() {
            row[j] = sign * a;
        }
        row[col] = 1.0;
        let rhs_col = row.len() - 1;
        row[rhs_col] = sign * constraint.rhs;
        let r = model.tableau.push_row(row)?;

        // Re-zero the new row under every basic decision column
        for (c, basic) in basics.iter().enumerate() {
            if let Some(b) = *basic {
                let factor = model.tableau.get(r, c);
                if factor.abs() > tol {
                    model.tableau.subtract_row(r, b, factor);
                }
            }
        }
        if model.tableau.get(r, col) < 0.0 {
            model.tableau.negate_row(r);
        }
        if kind == AuxKind::Artificial {
            model.tableau.set(0, col, big_m);
            model.tableau.subtract_row(0, r, big_m);
        }

        let name = model.counts.next_name(kind);
        let description = format!(
            "Added constraint {} {} {} with {}",
            format_terms(&constraint.coefficients),
            constraint.relation.symbol(),
            constraint.rhs,
            name
        );
        model.aux.push(AuxColumn { kind, name, negated });
        debug!("{}", description);

        let snapshot = if record { Some(model.tableau.clone()) } else { None };
        self.trail.log(description.clone());
        if let Some(tableau) = snapshot {
            self.trail.record_tableau(description, &tableau);
        }
        self.reoptimize()
    }
}

/// `3x1 - x2`-style rendering of a coefficient vector.
pub(crate) fn format_terms(coefficients: &[f64]) -> String {
    let mut out = String::new();
    for (i, &a) in coefficients.iter().enumerate() {
        if a == 0.0 {
            continue;
        }
        let name = variable_name(i);
        if out.is_empty() {
            if a == 1.0 {
                out.push_str(&name);
            } else if a == -1.0 {
                out.push_str(&format!("-{}", name));
            } else {
                out.push_str(&format!("{}{}", a, name));
            }
        } else {
            let sign = if a < 0.0 { '-' } else { '+' };
            let mag = a.abs();
            if mag == 1.0 {
                out.push_str(&format!(" {} {}", sign, name));
            } else {
                out.push_str(&format!(" {} {}{}", sign, mag, name));
            }
        }
    }
    if out.is_empty() { "0".to_string() } else { out }
}
