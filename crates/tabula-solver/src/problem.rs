use crate::error::{Result, SolverError};

/// A linear or mixed-integer optimization problem.
///
/// Constraint coefficient vectors always have exactly one entry per variable.
/// Solvers clone the problem they are given, so branches never share one.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Whether to maximize or minimize
    pub sense: Sense,
    /// Decision variables in declaration order
    pub variables: Vec<Variable>,
    /// Constraints
    pub constraints: Vec<Constraint>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Maximize,
    Minimize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Zero-based position in the problem
    pub index: usize,
    /// Objective coefficient
    pub objective: f64,
    /// Sign / integrality restriction
    pub var_type: VarType,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    /// x >= 0
    NonNegative,
    /// x <= 0
    NonPositive,
    /// Free variable
    Unrestricted,
    /// x >= 0 and integral
    Integer,
    /// x in {0, 1}
    Binary,
    /// x >= 0, explicitly marked continuous in a mixed problem
    Continuous,
}

impl VarType {
    pub fn is_integral(self) -> bool {
        matches!(self, VarType::Integer | VarType::Binary)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub relation: Relation,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl Relation {
    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Le => "<=",
            Relation::Ge => ">=",
            Relation::Eq => "=",
        }
    }
}

/// Information about a violated constraint
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintViolation {
    /// Position of the constraint in the problem
    pub constraint: usize,
    /// Required value (from constraint RHS)
    pub required: f64,
    /// Actual left-hand side value
    pub actual: f64,
    /// How much the constraint is violated by
    pub amount: f64,
    pub description: String,
}

impl Constraint {
    pub fn new(coefficients: Vec<f64>, relation: Relation, rhs: f64) -> Self {
        Self { coefficients, relation, rhs }
    }

    /// Single-variable bound `x_index (relation) rhs` over `n` variables.
    pub fn bound(n: usize, index: usize, relation: Relation, rhs: f64) -> Self {
        let mut coefficients = vec![0.0; n];
        if index < n {
            coefficients[index] = 1.0;
        }
        Self { coefficients, relation, rhs }
    }

    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(a, x)| a * x)
            .sum()
    }

    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs(values);
        match self.relation {
            Relation::Le => lhs <= self.rhs + tolerance,
            Relation::Ge => lhs >= self.rhs - tolerance,
            Relation::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }

    fn pad_to(&mut self, n: usize) {
        if self.coefficients.len() < n {
            self.coefficients.resize(n, 0.0);
        }
    }
}

impl Problem {
    pub fn new(sense: Sense) -> Self {
        Self {
            sense,
            variables: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Maximize `objective` over non-negative variables.
    pub fn maximize(objective: Vec<f64>) -> Self {
        Self::with_objective(Sense::Maximize, objective)
    }

    /// Minimize `objective` over non-negative variables.
    pub fn minimize(objective: Vec<f64>) -> Self {
        Self::with_objective(Sense::Minimize, objective)
    }

    fn with_objective(sense: Sense, objective: Vec<f64>) -> Self {
        let mut problem = Self::new(sense);
        for coef in objective {
            problem.add_variable(coef, VarType::NonNegative);
        }
        problem
    }

    /// Appends a variable and pads every existing constraint with a zero
    /// coefficient for it. Returns the new variable's index.
    pub fn add_variable(&mut self, objective: f64, var_type: VarType) -> usize {
        let index = self.variables.len();
        self.variables.push(Variable { index, objective, var_type });
        for c in &mut self.constraints {
            c.pad_to(index + 1);
        }
        index
    }

    /// Sets the type of every variable, in declaration order.
    pub fn with_types(mut self, types: &[VarType]) -> Result<Self> {
        if types.len() != self.num_variables() {
            return Err(SolverError::DimensionMismatch {
                expected: self.num_variables(),
                found: types.len(),
            });
        }
        for (var, &t) in self.variables.iter_mut().zip(types) {
            var.var_type = t;
        }
        Ok(self)
    }

    /// Adds a constraint. Short coefficient vectors are padded with zeros;
    /// vectors longer than the variable count are rejected.
    pub fn add_constraint(&mut self, coefficients: Vec<f64>, relation: Relation, rhs: f64) -> Result<()> {
        self.push_constraint(Constraint::new(coefficients, relation, rhs))
    }

    pub fn push_constraint(&mut self, mut constraint: Constraint) -> Result<()> {
        let n = self.num_variables();
        if constraint.coefficients.len() > n {
            return Err(SolverError::DimensionMismatch {
                expected: n,
                found: constraint.coefficients.len(),
            });
        }
        constraint.pad_to(n);
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn objective_coefficients(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.objective).collect()
    }

    /// Indices of Integer and Binary variables.
    pub fn integer_variables(&self) -> Vec<usize> {
        self.variables
            .iter()
            .filter(|v| v.var_type.is_integral())
            .map(|v| v.index)
            .collect()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, x)| v.objective * x)
            .sum()
    }

    /// Constraints violated by `values`, worst first. Variable sign and
    /// integrality restrictions are not checked here.
    pub fn violations(&self, values: &[f64], tolerance: f64) -> Vec<ConstraintViolation> {
        let mut violations: Vec<ConstraintViolation> = self
            .constraints
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                if c.is_satisfied(values, tolerance) {
                    return None;
                }
                let lhs = c.lhs(values);
                let amount = match c.relation {
                    Relation::Le => lhs - c.rhs,
                    Relation::Ge => c.rhs - lhs,
                    Relation::Eq => (lhs - c.rhs).abs(),
                };
                let description = match c.relation {
                    Relation::Le => format!("constraint {} exceeds maximum of {:.4} by {:.4}", i + 1, c.rhs, amount),
                    Relation::Ge => format!("constraint {} is below minimum of {:.4} by {:.4}", i + 1, c.rhs, amount),
                    Relation::Eq => format!("constraint {} requires exactly {:.4} but got {:.4}", i + 1, c.rhs, lhs),
                };
                Some(ConstraintViolation {
                    constraint: i,
                    required: c.rhs,
                    actual: lhs,
                    amount,
                    description,
                })
            })
            .collect();

        violations.sort_by(|a, b| b.amount.partial_cmp(&a.amount).unwrap_or(std::cmp::Ordering::Equal));
        violations
    }
}

/// Display name of a decision variable, one-based (`x1`, `x2`, ...).
pub fn variable_name(index: usize) -> String {
    format!("x{}", index + 1)
}
