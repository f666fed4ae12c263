//! Breadth-first bound-and-branch for the 0/1 knapsack problem.
//!
//! The problem must maximize over exactly one `<=` constraint whose
//! coefficients are the item weights; the objective coefficients are the
//! item values. Each node's bound is the fractional knapsack relaxation.

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::config::SolverConfig;
use crate::error::{Result, SolverError};
use crate::problem::{Problem, Relation, Sense, variable_name};
use crate::solution::{Solution, SolutionStatus};
use crate::solver::Solve;

/// A complete 0/1 assignment reached by the search.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// `A`, `B`, ... in discovery order
    pub label: String,
    /// Branch path of the node that produced it
    pub path: String,
    pub value: f64,
    pub weight: f64,
    /// Chosen items as variable indices, ascending
    pub items: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Item {
    index: usize,
    value: f64,
    weight: f64,
}

impl Item {
    fn ratio(&self) -> f64 {
        if self.weight == 0.0 {
            f64::INFINITY
        } else {
            self.value / self.weight
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    /// Decision per ranked item; `None` is undecided
    decisions: Vec<Option<bool>>,
    path: String,
    depth: usize,
}

/// Fractional relaxation of one node.
#[derive(Debug, Clone)]
struct Relaxation {
    bound: f64,
    /// Fixed value plus the whole items the greedy fill took
    integral_value: f64,
    integral_weight: f64,
    /// Ranked positions taken, fixed or greedy
    taken: Vec<usize>,
    /// Ranked position of the item split by the fill
    fractional: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct KnapsackSolver {
    config: SolverConfig,
    prune: bool,
    candidates: Vec<Candidate>,
}

impl KnapsackSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            prune: false,
            candidates: Vec::new(),
        }
    }

    /// Skip nodes whose bound cannot beat the best candidate so far.
    pub fn with_bound_pruning(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    /// Candidates found by the most recent solve, in discovery order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    fn items(problem: &Problem) -> Result<(Vec<Item>, f64)> {
        if problem.sense != Sense::Maximize {
            return Err(SolverError::InvalidOperation("knapsack search requires a maximize objective".into()));
        }
        let [constraint] = problem.constraints.as_slice() else {
            return Err(SolverError::InvalidOperation(format!(
                "knapsack search requires exactly one capacity constraint, found {}",
                problem.num_constraints()
            )));
        };
        if constraint.relation != Relation::Le {
            return Err(SolverError::InvalidOperation(format!(
                "knapsack capacity constraint must be <=, found {}",
                constraint.relation.symbol()
            )));
        }

        let mut items = Vec::with_capacity(problem.num_variables());
        for (var, &weight) in problem.variables.iter().zip(&constraint.coefficients) {
            if weight < 0.0 || var.objective < 0.0 {
                return Err(SolverError::InvalidOperation(format!(
                    "knapsack item {} needs non-negative value and weight",
                    variable_name(var.index)
                )));
            }
            items.push(Item {
                index: var.index,
                value: var.objective,
                weight,
            });
        }
        items.sort_by(|a, b| b.ratio().total_cmp(&a.ratio()));
        Ok((items, constraint.rhs))
    }

    /// Greedy fractional fill; `None` when the fixed items already overflow.
    fn relax(&self, items: &[Item], capacity: f64, decisions: &[Option<bool>]) -> Option<Relaxation> {
        let tol = self.config.tolerance();
        let mut taken = Vec::new();
        let mut value = 0.0;
        let mut weight = 0.0;
        for (k, item) in items.iter().enumerate() {
            if decisions[k] == Some(true) {
                taken.push(k);
                value += item.value;
                weight += item.weight;
            }
        }
        if weight > capacity + tol {
            return None;
        }

        let mut remaining = capacity - weight;
        let mut bound = value;
        let mut fractional = None;
        for (k, item) in items.iter().enumerate() {
            if decisions[k].is_some() {
                continue;
            }
            if item.weight <= remaining + tol {
                taken.push(k);
                remaining -= item.weight;
                value += item.value;
                weight += item.weight;
                bound += item.value;
            } else {
                if remaining > tol {
                    bound += item.value * remaining / item.weight;
                    fractional = Some(k);
                }
                break;
            }
        }

        Some(Relaxation {
            bound,
            integral_value: value,
            integral_weight: weight,
            taken,
            fractional,
        })
    }

    fn child(node: &Node, item: usize, take: bool) -> Node {
        let mut decisions = node.decisions.clone();
        decisions[item] = Some(take);
        let branch = if take { 2 } else { 1 };
        Node {
            decisions,
            path: if node.path.is_empty() {
                branch.to_string()
            } else {
                format!("{}.{}", node.path, branch)
            },
            depth: node.depth + 1,
        }
    }
}

impl Solve for KnapsackSolver {
    fn solve(&mut self, problem: &Problem) -> Result<Solution> {
        self.candidates.clear();
        let (items, capacity) = Self::items(problem)?;
        let tol = self.config.tolerance();
        let record = self.config.record_steps();

        let mut solution = Solution::new();
        solution.counts.decision = items.len();
        let ranking: Vec<String> = items.iter().map(|item| variable_name(item.index)).collect();
        solution.log(format!("Items by value/weight ratio: {}", ranking.join(", ")));

        let mut queue = VecDeque::from([Node {
            decisions: vec![None; items.len()],
            path: String::new(),
            depth: 0,
        }]);
        let mut best: Option<usize> = None;
        let mut interrupted = false;

        while let Some(node) = queue.pop_front() {
            if self.config.interrupt().is_triggered() {
                warn!("knapsack search interrupted with {} open nodes", queue.len() + 1);
                solution.log("Limit exceeded: interrupted");
                interrupted = true;
                break;
            }
            let label = if node.path.is_empty() { "root".to_string() } else { node.path.clone() };

            let Some(relaxation) = self.relax(&items, capacity, &node.decisions) else {
                debug!("knapsack node {} overflows capacity", label);
                if record {
                    solution.record_text(format!("Node {}", label), "fixed items exceed capacity");
                }
                continue;
            };

            if self.prune {
                if let Some(b) = best {
                    if relaxation.bound <= self.candidates[b].value + tol {
                        debug!("knapsack node {} pruned at bound {:.6}", label, relaxation.bound);
                        if record {
                            solution.record_text(
                                format!("Node {}", label),
                                format!("bound {:.6} cannot beat incumbent, pruned", relaxation.bound),
                            );
                        }
                        continue;
                    }
                }
            }

            match relaxation.fractional {
                None => {
                    let mut chosen: Vec<usize> = relaxation.taken.iter().map(|&k| items[k].index).collect();
                    chosen.sort_unstable();
                    let candidate = Candidate {
                        label: candidate_label(self.candidates.len()),
                        path: node.path.clone(),
                        value: relaxation.integral_value,
                        weight: relaxation.integral_weight,
                        items: chosen,
                    };
                    debug!("knapsack candidate {} = {:.6}", candidate.label, candidate.value);
                    if record {
                        solution.record_text(
                            format!("Node {}", label),
                            format!("candidate {}: value {:.6}", candidate.label, candidate.value),
                        );
                    }
                    if best.is_none_or(|b| candidate.value > self.candidates[b].value + tol) {
                        best = Some(self.candidates.len());
                    }
                    self.candidates.push(candidate);
                }
                Some(k) if node.depth < items.len() => {
                    if record {
                        solution.record_text(
                            format!("Node {}", label),
                            format!(
                                "bound {:.6}, branching on {}",
                                relaxation.bound,
                                variable_name(items[k].index)
                            ),
                        );
                    }
                    queue.push_back(Self::child(&node, k, false));
                    queue.push_back(Self::child(&node, k, true));
                }
                Some(_) => {
                    warn!("knapsack node {} reached depth {}", label, node.depth);
                }
            }
        }

        for candidate in &self.candidates {
            let items: Vec<String> = candidate.items.iter().map(|&i| variable_name(i)).collect();
            solution.log(format!(
                "Candidate {}: value {:.6}, weight {:.6}, items [{}]",
                candidate.label,
                candidate.value,
                candidate.weight,
                items.join(", ")
            ));
        }

        let Some(b) = best else {
            if interrupted {
                solution.terminate(SolutionStatus::LimitReached, "No packing found before the search was interrupted");
            } else {
                solution.terminate(SolutionStatus::Infeasible, "No feasible packing: capacity is negative");
            }
            return Ok(solution);
        };

        let winner = &self.candidates[b];
        for i in 0..problem.num_variables() {
            let x = if winner.items.contains(&i) { 1.0 } else { 0.0 };
            solution.values.insert(variable_name(i), x);
        }
        solution.values.insert("s1".to_string(), capacity - winner.weight);
        solution.status = SolutionStatus::Optimal;
        solution.optimal_value = Some(winner.value);
        solution.log(format!("Best candidate {}: value {:.6}", winner.label, winner.value));
        info!(
            "knapsack search: {:.6} from {} candidates",
            winner.value,
            self.candidates.len()
        );
        Ok(solution)
    }
}

/// Spreadsheet-style labels: `A`..`Z`, then `AA`, `AB`, ...
fn candidate_label(mut n: usize) -> String {
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}
