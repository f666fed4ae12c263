mod branch_bound;
mod config;
mod cutting_plane;
mod dual;
mod error;
mod knapsack;
mod primal;
mod problem;
mod revised;
mod solution;
mod solver;
mod standard;
mod tableau;

pub use branch_bound::{BranchAndBound, SearchStats};
pub use config::{Interrupt, SolverConfig};
pub use cutting_plane::{CuttingPlane, GomoryCut};
pub use dual::{AuxColumn, AuxKind, DualSimplex};
pub use error::{Result, SolverError};
pub use knapsack::{Candidate, KnapsackSolver};
pub use primal::PrimalSimplex;
pub use problem::{Constraint, ConstraintViolation, Problem, Relation, Sense, VarType, Variable, variable_name};
pub use revised::RevisedSimplex;
pub use solution::{
    Analysis, ReducedCost, ShadowPrice, Solution, SolutionStatus, Step, StepContent, StructureCounts,
};
pub use solver::{Reoptimize, Solve};
pub use standard::{ColumnMap, StandardForm, StandardRow};
pub use tableau::Tableau;
