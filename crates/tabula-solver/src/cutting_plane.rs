//! Gomory cutting planes on top of the dual simplex.
//!
//! After each optimal relaxation the most fractional integer variable's
//! tableau row is turned into a cut `sum(-g_j x_j) + s = -f_0`. When every
//! column in the row is integer-valued `g_j` is the fractional part `f_j`;
//! otherwise the mixed-integer rounding of the row is used, which stays valid
//! for continuous columns. The new row starts with a negative right-hand
//! side, so the dual simplex phase 1 restores feasibility from the current
//! basis.

use log::{debug, info, warn};

use crate::config::SolverConfig;
use crate::dual::{AuxKind, DualSimplex};
use crate::error::{Result, SolverError};
use crate::problem::{Problem, variable_name};
use crate::solution::{Solution, SolutionStatus};
use crate::solver::{Solve, most_fractional};
use crate::standard::StandardForm;
use crate::tableau::Tableau;

/// Cuts over which the relaxation bound must move before the loop is
/// considered stalled.
const STALL_WINDOW: usize = 10;

/// A cut derived from one tableau row.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GomoryCut {
    /// Tableau row the cut was read from
    pub source_row: usize,
    pub coefficients: Vec<f64>,
    pub rhs: f64,
    pub integer_parts: Vec<f64>,
    pub fractional_parts: Vec<f64>,
    pub rhs_integer: f64,
    pub rhs_fractional: f64,
    /// Per column, whether it takes integer values
    pub integer_columns: Vec<bool>,
    /// A continuous column has a non-zero entry in the source row
    pub mixed: bool,
}

impl GomoryCut {
    /// Reads row `row` of `tableau`. Columns past the end of
    /// `integer_columns` are treated as continuous.
    pub fn from_row(tableau: &Tableau, row: usize, integer_columns: &[bool], tolerance: f64) -> Self {
        let width = tableau.cols() - 1;
        let coefficients = tableau.row(row)[..width].to_vec();
        let rhs = tableau.rhs(row);
        let integer_columns: Vec<bool> = (0..width)
            .map(|j| integer_columns.get(j).copied().unwrap_or(false))
            .collect();

        let (integer_parts, fractional_parts) = coefficients.iter().map(|&a| split(a, tolerance)).unzip();
        let (rhs_integer, rhs_fractional) = split(rhs, tolerance);
        let mixed = coefficients
            .iter()
            .zip(&integer_columns)
            .any(|(&a, &integer)| !integer && a.abs() > tolerance);

        Self {
            source_row: row,
            coefficients,
            rhs,
            integer_parts,
            fractional_parts,
            rhs_integer,
            rhs_fractional,
            integer_columns,
            mixed,
        }
    }

    /// Row coefficients of the cut, `-g_j` per column.
    pub fn cut_coefficients(&self) -> Vec<f64> {
        let f0 = self.rhs_fractional;
        self.fractional_parts
            .iter()
            .zip(&self.coefficients)
            .zip(&self.integer_columns)
            .map(|((&f, &a), &integer)| {
                let g = if !self.mixed {
                    f
                } else if integer {
                    if f <= f0 { f } else { f0 * (1.0 - f) / (1.0 - f0) }
                } else if a >= 0.0 {
                    a
                } else {
                    -a * f0 / (1.0 - f0)
                };
                if g == 0.0 { 0.0 } else { -g }
            })
            .collect()
    }

    pub fn cut_rhs(&self) -> f64 {
        -self.rhs_fractional
    }
}

/// Splits `value` into an integer part and a fractional part in `[0, 1)`.
/// Fractions within `tolerance` of 0 or 1 are snapped to zero.
fn split(value: f64, tolerance: f64) -> (f64, f64) {
    let mut integer = value.trunc();
    let mut fraction = value - integer;
    if fraction < 0.0 {
        integer -= 1.0;
        fraction += 1.0;
    }
    if fraction < tolerance {
        (integer, 0.0)
    } else if fraction > 1.0 - tolerance {
        (integer + 1.0, 0.0)
    } else {
        (integer, fraction)
    }
}

/// Marks the tableau columns that are integral at every point where the
/// `candidates` are: their own columns, artificial columns, and the auxiliary
/// column of any row with integral data over integer columns only.
fn integer_columns(problem: &Problem, candidates: &[usize], dual: &DualSimplex, tolerance: f64) -> Result<Vec<bool>> {
    let map = dual
        .columns()
        .ok_or_else(|| SolverError::InvalidOperation("no column map after solve".into()))?;
    let form = StandardForm::new(problem)?;
    let aux = dual.aux_columns();
    if aux.len() != form.rows.len() {
        return Err(SolverError::DimensionMismatch {
            expected: form.rows.len(),
            found: aux.len(),
        });
    }

    let mut integer = vec![false; map.num_columns()];
    for c in candidates.iter().filter_map(|&i| map.direct_column(i)) {
        integer[c] = true;
    }

    let integral = |v: f64| (v - v.round()).abs() <= tolerance;
    let rows: Vec<bool> = form
        .rows
        .iter()
        .zip(aux)
        .map(|(row, column)| {
            column.kind == AuxKind::Artificial
                || (integral(row.rhs)
                    && row
                        .coefficients
                        .iter()
                        .zip(&integer)
                        .all(|(&a, &int)| a == 0.0 || (int && integral(a))))
        })
        .collect();
    integer.extend(rows);
    Ok(integer)
}

#[derive(Debug, Clone, Default)]
pub struct CuttingPlane {
    config: SolverConfig,
    trace: Vec<f64>,
    cuts: Vec<GomoryCut>,
}

impl CuttingPlane {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            trace: Vec::new(),
            cuts: Vec::new(),
        }
    }

    /// Relaxation optimum after the initial solve and after every cut.
    pub fn objective_trace(&self) -> &[f64] {
        &self.trace
    }

    pub fn cuts(&self) -> &[GomoryCut] {
        &self.cuts
    }

    /// The bound has moved by no more than the integrality tolerance over the
    /// last `STALL_WINDOW` cuts.
    fn stalled(&self) -> bool {
        let len = self.trace.len();
        if len <= STALL_WINDOW {
            return false;
        }
        let latest = self.trace[len - 1];
        let earlier = self.trace[len - 1 - STALL_WINDOW];
        (earlier - latest).abs() <= self.config.integrality_tolerance() * (1.0 + latest.abs())
    }
}

impl Solve for CuttingPlane {
    fn solve(&mut self, problem: &Problem) -> Result<Solution> {
        self.trace.clear();
        self.cuts.clear();
        let n = problem.num_variables();
        let tol = self.config.tolerance();
        let itol = self.config.integrality_tolerance();

        let mut dual = DualSimplex::new(self.config.clone());
        let mut solution = dual.solve(problem)?;
        if !solution.is_optimal() {
            return Ok(solution);
        }

        let typed = problem.integer_variables();
        let candidates: Vec<usize> = if typed.is_empty() { (0..n).collect() } else { typed };
        let mut integer = integer_columns(problem, &candidates, &dual, tol)?;
        let mut value = solution.optimal_value.unwrap_or_default();
        self.trace.push(value);

        loop {
            let values = solution.decision_values(n);
            let direct = dual.columns().map(|map| {
                candidates
                    .iter()
                    .filter_map(|&i| map.direct_column(i).map(|c| (i, c)))
                    .collect::<Vec<_>>()
            });
            let direct = direct.unwrap_or_default();
            let pick = most_fractional(direct.iter().map(|&(i, _)| (i, values[i])), itol);

            let Some((var, fractional)) = pick else {
                for &(i, _) in &direct {
                    if let Some(v) = solution.values.get_mut(&variable_name(i)) {
                        *v = v.round();
                    }
                }
                solution.log(format!("Integral optimum after {} cuts", self.cuts.len()));
                info!("cutting planes: integral at {:.6} after {} cuts", value, self.cuts.len());
                break;
            };

            if self.cuts.len() >= self.config.max_cuts() {
                warn!("cutting planes stopped at {} cuts, bound {:.6}", self.cuts.len(), value);
                solution.terminate(
                    SolutionStatus::LimitReached,
                    format!("Limit exceeded: maximum cuts reached ({}), bound {:.6}", self.cuts.len(), value),
                );
                break;
            }
            if self.stalled() {
                warn!("cutting planes stalled at bound {:.6} after {} cuts", value, self.cuts.len());
                solution.terminate(
                    SolutionStatus::LimitReached,
                    format!(
                        "Limit exceeded: cuts stalled, bound {:.6} unchanged over the last {} cuts",
                        value, STALL_WINDOW
                    ),
                );
                break;
            }
            if self.config.interrupt().is_triggered() {
                solution.terminate(SolutionStatus::LimitReached, "Limit exceeded: interrupted");
                break;
            }

            let column = direct
                .iter()
                .find(|&&(i, _)| i == var)
                .map(|&(_, c)| c)
                .ok_or_else(|| SolverError::InvalidOperation(format!("{} has no tableau column", variable_name(var))))?;
            let tableau = dual
                .tableau()
                .ok_or_else(|| SolverError::InvalidOperation("no tableau after solve".into()))?;
            let row = tableau.basic_row(column, tol).ok_or_else(|| {
                SolverError::InvalidOperation(format!("fractional {} is not basic", variable_name(var)))
            })?;

            let cut = GomoryCut::from_row(tableau, row, &integer, itol);
            let coefficients = cut.cut_coefficients();
            let label = format!(
                "Cut {} ({}) from row {} ({} = {:.6}), right-hand side {:.6}",
                self.cuts.len() + 1,
                if cut.mixed { "mixed-integer" } else { "fractional" },
                row,
                variable_name(var),
                fractional,
                cut.cut_rhs()
            );
            debug!("{}", label);

            dual.append_row(&coefficients, cut.cut_rhs(), &label)?;
            // The slack of a fractional cut is integral; a mixed cut's is not
            integer.push(!cut.mixed);
            self.cuts.push(cut);
            solution = dual.reoptimize()?;

            if !solution.is_optimal() {
                warn!("relaxation became {:?} after cut {}", solution.status, self.cuts.len());
                break;
            }
            value = solution.optimal_value.unwrap_or_default();
            self.trace.push(value);
        }

        solution.log(format!(
            "Objective trace: {}",
            self.trace.iter().map(|v| format!("{:.6}", v)).collect::<Vec<_>>().join(", ")
        ));
        Ok(solution)
    }
}
