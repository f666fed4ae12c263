//! Conversion of a [`Problem`] into tableau column space.
//!
//! Tableau columns are always non-negative. Non-positive variables are stored
//! negated, free variables as the difference of two columns, and binary
//! variables get an extra `x <= 1` row.

use crate::error::{Result, SolverError};
use crate::problem::{Constraint, Problem, Relation, Sense, VarType};

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnSpec {
    Direct(usize),
    Negated(usize),
    Split(usize, usize),
}

/// Maps original variables to tableau decision columns.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    specs: Vec<ColumnSpec>,
    columns: usize,
}

impl ColumnMap {
    pub fn new(problem: &Problem) -> Self {
        let mut columns = 0;
        let specs = problem
            .variables
            .iter()
            .map(|v| {
                let spec = match v.var_type {
                    VarType::NonPositive => ColumnSpec::Negated(columns),
                    VarType::Unrestricted => {
                        columns += 1;
                        ColumnSpec::Split(columns - 1, columns)
                    }
                    _ => ColumnSpec::Direct(columns),
                };
                columns += 1;
                spec
            })
            .collect();
        Self { specs, columns }
    }

    pub fn num_columns(&self) -> usize {
        self.columns
    }

    pub fn num_variables(&self) -> usize {
        self.specs.len()
    }

    /// Original-space coefficients to column-space coefficients.
    pub fn translate(&self, coefficients: &[f64]) -> Result<Vec<f64>> {
        if coefficients.len() > self.specs.len() {
            return Err(SolverError::DimensionMismatch {
                expected: self.specs.len(),
                found: coefficients.len(),
            });
        }
        let mut out = vec![0.0; self.columns];
        for (spec, &a) in self.specs.iter().zip(coefficients) {
            match *spec {
                ColumnSpec::Direct(c) => out[c] = a,
                ColumnSpec::Negated(c) => out[c] = -a,
                ColumnSpec::Split(p, n) => {
                    out[p] = a;
                    out[n] = -a;
                }
            }
        }
        Ok(out)
    }

    /// Column values back to original variable values.
    pub fn recover(&self, column_values: &[f64]) -> Vec<f64> {
        let at = |c: usize| column_values.get(c).copied().unwrap_or(0.0);
        self.specs
            .iter()
            .map(|spec| match *spec {
                ColumnSpec::Direct(c) => at(c),
                ColumnSpec::Negated(c) => -at(c),
                ColumnSpec::Split(p, n) => at(p) - at(n),
            })
            .collect()
    }

    /// First column of variable `index` (the positive part of a free variable).
    pub fn first_column(&self, index: usize) -> Option<usize> {
        self.specs.get(index).map(|spec| match *spec {
            ColumnSpec::Direct(c) | ColumnSpec::Negated(c) | ColumnSpec::Split(c, _) => c,
        })
    }

    /// `-1.0` when variable `index` is stored negated, `1.0` otherwise.
    pub fn sign(&self, index: usize) -> f64 {
        match self.specs.get(index) {
            Some(ColumnSpec::Negated(_)) => -1.0,
            _ => 1.0,
        }
    }

    /// The single column holding variable `index` unchanged, if it has one.
    pub fn direct_column(&self, index: usize) -> Option<usize> {
        match self.specs.get(index) {
            Some(ColumnSpec::Direct(c)) => Some(*c),
            _ => None,
        }
    }
}

/// One constraint row in column space.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardRow {
    pub coefficients: Vec<f64>,
    pub relation: Relation,
    pub rhs: f64,
}

/// A problem rewritten over non-negative tableau columns.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardForm {
    pub sense: Sense,
    /// Objective over columns, in the problem's own sense
    pub objective: Vec<f64>,
    /// User constraints followed by binary upper bounds
    pub rows: Vec<StandardRow>,
    pub columns: ColumnMap,
}

impl StandardForm {
    pub fn new(problem: &Problem) -> Result<Self> {
        let columns = ColumnMap::new(problem);
        let objective = columns.translate(&problem.objective_coefficients())?;

        let mut rows = problem
            .constraints
            .iter()
            .map(|c| Self::row(&columns, c))
            .collect::<Result<Vec<_>>>()?;

        for var in problem.variables.iter().filter(|v| v.var_type == VarType::Binary) {
            let bound = Constraint::bound(problem.num_variables(), var.index, Relation::Le, 1.0);
            rows.push(Self::row(&columns, &bound)?);
        }

        Ok(Self {
            sense: problem.sense,
            objective,
            rows,
            columns,
        })
    }

    fn row(columns: &ColumnMap, constraint: &Constraint) -> Result<StandardRow> {
        Ok(StandardRow {
            coefficients: columns.translate(&constraint.coefficients)?,
            relation: constraint.relation,
            rhs: constraint.rhs,
        })
    }

    /// Objective in maximization form (negated for minimize).
    pub fn max_objective(&self) -> Vec<f64> {
        match self.sense {
            Sense::Maximize => self.objective.clone(),
            Sense::Minimize => self.objective.iter().map(|c| -c).collect(),
        }
    }

    /// Rows as `a x <= b` with `b >= 0`, if every row converts.
    ///
    /// A `>=` row with non-positive RHS is negated into `<=`; anything else
    /// (equalities, `>=` with positive RHS, `<=` with negative RHS) needs an
    /// initial basis the slack columns cannot provide.
    pub fn le_rows(&self) -> Result<Vec<(Vec<f64>, f64)>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| match row.relation {
                Relation::Le if row.rhs >= 0.0 => Ok((row.coefficients.clone(), row.rhs)),
                Relation::Ge if row.rhs <= 0.0 => {
                    Ok((row.coefficients.iter().map(|a| -a).collect(), -row.rhs))
                }
                _ => Err(SolverError::InvalidOperation(format!(
                    "constraint {} ({} {}) has no slack basis; use the dual simplex",
                    i + 1,
                    row.relation.symbol(),
                    row.rhs
                ))),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_map_translate_and_recover() {
        let problem = Problem::maximize(vec![1.0, 2.0, 3.0])
            .with_types(&[VarType::NonPositive, VarType::Unrestricted, VarType::Integer])
            .unwrap();
        let map = ColumnMap::new(&problem);

        assert_eq!(map.num_columns(), 4);
        assert_eq!(map.translate(&[1.0, 2.0, 3.0]).unwrap(), vec![-1.0, 2.0, -2.0, 3.0]);
        assert_eq!(map.recover(&[4.0, 1.0, 3.0, 7.0]), vec![-4.0, -2.0, 7.0]);
        assert_eq!(map.direct_column(2), Some(3));
        assert_eq!(map.direct_column(1), None);
        assert_eq!(map.sign(0), -1.0);
        assert_eq!(map.sign(1), 1.0);
    }

    #[test]
    fn test_binary_adds_upper_bound_row() {
        let mut problem = Problem::maximize(vec![1.0, 1.0])
            .with_types(&[VarType::Binary, VarType::NonNegative])
            .unwrap();
        problem.add_constraint(vec![1.0, 1.0], Relation::Le, 3.0).unwrap();

        let form = StandardForm::new(&problem).unwrap();
        assert_eq!(form.rows.len(), 2);
        assert_eq!(form.rows[1].coefficients, vec![1.0, 0.0]);
        assert_eq!(form.rows[1].rhs, 1.0);
    }

    #[test]
    fn test_le_rows() {
        let mut problem = Problem::minimize(vec![1.0, 1.0]);
        problem.add_constraint(vec![1.0, 1.0], Relation::Le, 4.0).unwrap();
        problem.add_constraint(vec![1.0, -1.0], Relation::Ge, -2.0).unwrap();
        let form = StandardForm::new(&problem).unwrap();

        let rows = form.le_rows().unwrap();
        assert_eq!(rows[1], (vec![-1.0, 1.0], 2.0));
        assert_eq!(form.max_objective(), vec![-1.0, -1.0]);

        problem.add_constraint(vec![1.0, 0.0], Relation::Ge, 1.0).unwrap();
        let form = StandardForm::new(&problem).unwrap();
        assert!(matches!(form.le_rows(), Err(SolverError::InvalidOperation(_))));
    }
}
