use std::collections::BTreeMap;

use crate::problem::variable_name;
use crate::tableau::Tableau;

/// The result of a solve, plus enough structure to resume from it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Optimal objective value, only set when `status` is `Optimal`
    pub optimal_value: Option<f64>,
    /// Values keyed by variable name (`x1`, `s1`, `e1`, `a1`, ...)
    pub values: BTreeMap<String, f64>,
    /// Labeled audit trail in the order it was produced
    pub steps: Vec<Step>,
    /// Diagnostic messages
    pub messages: Vec<String>,
    /// Final tableau, when the solver works on one
    pub tableau: Option<Tableau>,
    /// Column structure of `tableau`
    pub counts: StructureCounts,
    /// Post-optimal analysis (dual simplex only)
    pub analysis: Option<Analysis>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// Nothing has been solved yet
    NotSolved,
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// An iteration, depth or cut cap (or an interrupt) stopped the solve
    LimitReached,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub label: String,
    pub content: StepContent,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum StepContent {
    Tableau(Tableau),
    Text(String),
}

/// Number of tableau columns of each kind. Decision columns come first,
/// auxiliary columns follow in constraint order.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructureCounts {
    pub decision: usize,
    pub slack: usize,
    pub excess: usize,
    pub artificial: usize,
}

impl StructureCounts {
    pub fn auxiliary(&self) -> usize {
        self.slack + self.excess + self.artificial
    }

    pub fn total(&self) -> usize {
        self.decision + self.auxiliary()
    }
}

/// Sensitivity information for an optimal LP solve
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Objective change per unit increase of each constraint's RHS
    pub shadow_prices: Vec<ShadowPrice>,

    /// Reduced costs for each decision variable
    pub reduced_costs: Vec<ReducedCost>,

    /// Constraints whose auxiliary variable is zero at the optimum
    pub binding_constraints: Vec<String>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowPrice {
    /// Auxiliary column name of the constraint
    pub constraint: String,
    pub value: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedCost {
    pub variable: String,
    /// Current value in solution
    pub value: f64,
    /// Change in the objective per unit increase of the variable, in the
    /// problem's own sense; zero for basic variables
    pub reduced_cost: f64,
    /// Is this variable in the basis?
    pub is_basic: bool,
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl Solution {
    pub fn new() -> Self {
        Self {
            status: SolutionStatus::NotSolved,
            optimal_value: None,
            values: BTreeMap::new(),
            steps: Vec::new(),
            messages: Vec::new(),
            tableau: None,
            counts: StructureCounts::default(),
            analysis: None,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Values of `x1..xn` in index order; missing entries read as 0.
    pub fn decision_values(&self, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| self.value(&variable_name(i)).unwrap_or(0.0))
            .collect()
    }

    pub fn log(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn record_text(&mut self, label: impl Into<String>, text: impl Into<String>) {
        self.steps.push(Step {
            label: label.into(),
            content: StepContent::Text(text.into()),
        });
    }

    pub fn record_tableau(&mut self, label: impl Into<String>, tableau: &Tableau) {
        self.steps.push(Step {
            label: label.into(),
            content: StepContent::Tableau(tableau.clone()),
        });
    }

    /// Marks the solve as finished without an optimum.
    pub fn terminate(&mut self, status: SolutionStatus, message: impl Into<String>) {
        self.status = status;
        self.optimal_value = None;
        self.log(message);
    }
}
