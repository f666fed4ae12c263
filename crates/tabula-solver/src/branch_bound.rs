//! Depth-first branch-and-bound over warm-started dual simplex clones.
//!
//! Every node owns its own [`DualSimplex`] state. Branching clones the
//! parent's state and adds `x <= floor(v)` or `x >= ceil(v)` through
//! [`Reoptimize::add_constraint_and_resolve`], so children re-optimize from
//! the parent's basis instead of solving from scratch.

use log::{debug, info, warn};

use crate::config::SolverConfig;
use crate::dual::DualSimplex;
use crate::error::Result;
use crate::problem::{Constraint, Problem, Relation, Sense, variable_name};
use crate::solution::{Solution, SolutionStatus};
use crate::solver::{Reoptimize, Solve, most_fractional};

/// Counters collected during one search.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes_explored: usize,
    pub branches: usize,
    pub pruned_by_bound: usize,
    pub pruned_infeasible: usize,
    pub abandoned: usize,
    pub integral_candidates: usize,
}

/// A node on the search stack.
#[derive(Debug, Clone)]
struct SubProblem {
    state: DualSimplex,
    solution: Solution,
    /// Branch path such as `1.2` (empty at the root)
    path: String,
    depth: usize,
}

impl SubProblem {
    fn label(&self) -> &str {
        if self.path.is_empty() { "root" } else { &self.path }
    }

    fn child_path(&self, branch: usize) -> String {
        if self.path.is_empty() {
            branch.to_string()
        } else {
            format!("{}.{}", self.path, branch)
        }
    }
}

#[derive(Debug, Clone)]
struct Incumbent {
    value: f64,
    solution: Solution,
    path: String,
}

#[derive(Debug, Clone, Default)]
pub struct BranchAndBound {
    config: SolverConfig,
    stats: SearchStats,
}

impl BranchAndBound {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            stats: SearchStats::default(),
        }
    }

    /// Statistics of the most recent solve.
    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    /// Whether `candidate` strictly beats `incumbent` in the problem's sense.
    fn improves(&self, sense: Sense, candidate: f64, incumbent: f64) -> bool {
        let tol = self.config.tolerance();
        match sense {
            Sense::Maximize => candidate > incumbent + tol,
            Sense::Minimize => candidate < incumbent - tol,
        }
    }

    fn branch(&mut self, node: SubProblem, var: usize, value: f64, n: usize, stack: &mut Vec<SubProblem>) -> Result<()> {
        let floor = value.floor();
        let ceil = value.ceil();
        let depth = node.depth + 1;
        let down_path = node.child_path(1);
        let up_path = node.child_path(2);

        let mut down = node.state.clone();
        let down_solution = down.add_constraint_and_resolve(&Constraint::bound(n, var, Relation::Le, floor))?;

        let mut up = node.state;
        let up_solution = up.add_constraint_and_resolve(&Constraint::bound(n, var, Relation::Ge, ceil))?;

        self.stats.branches += 1;
        debug!(
            "branching on {} = {:.6}: {} ({:?}), {} ({:?})",
            variable_name(var),
            value,
            down_path,
            down_solution.status,
            up_path,
            up_solution.status
        );

        // Pushed last so the floor branch is popped first
        stack.push(SubProblem {
            state: up,
            solution: up_solution,
            path: up_path,
            depth,
        });
        stack.push(SubProblem {
            state: down,
            solution: down_solution,
            path: down_path,
            depth,
        });
        Ok(())
    }
}

impl Solve for BranchAndBound {
    fn solve(&mut self, problem: &Problem) -> Result<Solution> {
        self.stats = SearchStats::default();
        let n = problem.num_variables();
        let itol = self.config.integrality_tolerance();
        let record = self.config.record_steps();

        let mut integer_vars = problem.integer_variables();
        let mut search_log = Vec::new();
        if integer_vars.is_empty() {
            integer_vars = (0..n).collect();
            search_log.push("No integer restrictions declared; treating every variable as integer".to_string());
        }

        let mut root = DualSimplex::new(self.config.clone());
        let root_solution = root.solve(problem)?;
        match root_solution.status {
            SolutionStatus::Optimal => {}
            SolutionStatus::Unbounded => {
                let mut solution = root_solution;
                solution.log("LP relaxation is unbounded; branch-and-bound not started");
                return Ok(solution);
            }
            status => {
                let mut solution = root_solution;
                solution.terminate(status, "No feasible integer solution: LP relaxation has no optimum");
                return Ok(solution);
            }
        }

        let mut stack = vec![SubProblem {
            state: root,
            solution: root_solution,
            path: String::new(),
            depth: 0,
        }];
        let mut incumbent: Option<Incumbent> = None;
        let mut node_steps = Vec::new();
        let mut limited = false;

        while let Some(node) = stack.pop() {
            if self.config.interrupt().is_triggered() {
                warn!("branch-and-bound interrupted with {} open nodes", stack.len() + 1);
                search_log.push(format!("Limit exceeded: interrupted with {} open nodes", stack.len() + 1));
                limited = true;
                break;
            }
            self.stats.nodes_explored += 1;

            if node.depth > self.config.max_branch_depth() {
                warn!("abandoning node {} at depth {}", node.label(), node.depth);
                search_log.push(format!(
                    "Limit exceeded: node {} abandoned at depth {}",
                    node.label(),
                    node.depth
                ));
                self.stats.abandoned += 1;
                limited = true;
                continue;
            }

            let relaxed = match (node.solution.status, node.solution.optimal_value) {
                (SolutionStatus::Optimal, Some(value)) => value,
                (SolutionStatus::Infeasible, _) => {
                    self.stats.pruned_infeasible += 1;
                    node_steps.push((node.path.clone(), "infeasible, pruned".to_string()));
                    continue;
                }
                (status, _) => {
                    self.stats.abandoned += 1;
                    search_log.push(format!("Node {} abandoned: {:?}", node.label(), status));
                    if status == SolutionStatus::LimitReached {
                        limited = true;
                    }
                    continue;
                }
            };

            if let Some(best) = &incumbent {
                if !self.improves(problem.sense, relaxed, best.value) {
                    self.stats.pruned_by_bound += 1;
                    node_steps.push((
                        node.path.clone(),
                        format!("z = {:.6} cannot beat incumbent {:.6}, pruned", relaxed, best.value),
                    ));
                    continue;
                }
            }

            let values = node.solution.decision_values(n);
            let pick = most_fractional(integer_vars.iter().map(|&i| (i, values[i])), itol);
            match pick {
                None => {
                    self.stats.integral_candidates += 1;
                    let better = incumbent
                        .as_ref()
                        .is_none_or(|best| self.improves(problem.sense, relaxed, best.value));
                    node_steps.push((
                        node.path.clone(),
                        format!("integral, z = {:.6}{}", relaxed, if better { ", new incumbent" } else { "" }),
                    ));
                    if better {
                        info!("new incumbent {:.6} at node {}", relaxed, node.label());
                        incumbent = Some(Incumbent {
                            value: relaxed,
                            path: node.path.clone(),
                            solution: node.solution,
                        });
                    }
                }
                Some((var, value)) => {
                    node_steps.push((
                        node.path.clone(),
                        format!("z = {:.6}, branching on {} = {:.6}", relaxed, variable_name(var), value),
                    ));
                    self.branch(node, var, value, n, &mut stack)?;
                }
            }
        }

        let stats = self.stats;
        search_log.push(format!(
            "Explored {} nodes ({} branches, {} pruned by bound, {} infeasible, {} abandoned)",
            stats.nodes_explored, stats.branches, stats.pruned_by_bound, stats.pruned_infeasible, stats.abandoned
        ));
        info!("branch-and-bound finished: {:?}", stats);

        let mut solution = match incumbent {
            Some(best) => {
                let mut solution = best.solution;
                for &i in &integer_vars {
                    if let Some(v) = solution.values.get_mut(&variable_name(i)) {
                        *v = v.round();
                    }
                }
                solution.status = SolutionStatus::Optimal;
                solution.optimal_value = Some(best.value);
                let at = if best.path.is_empty() { "root".to_string() } else { best.path };
                search_log.push(format!("Best integer solution z = {:.6} found at node {}", best.value, at));
                if limited {
                    search_log.push("Search incomplete: best integer solution is not proven optimal".to_string());
                }
                solution
            }
            None => {
                let mut solution = Solution::new();
                let status = if limited {
                    SolutionStatus::LimitReached
                } else {
                    SolutionStatus::Infeasible
                };
                solution.terminate(status, "No feasible integer solution");
                solution
            }
        };

        if record {
            for (path, text) in node_steps {
                let label = if path.is_empty() { "Node root".to_string() } else { format!("Node {}", path) };
                solution.record_text(label, text);
            }
        }
        solution.messages.extend(search_log);
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Interrupt;
    use crate::problem::VarType;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::ThreadId;

    fn classic() -> Problem {
        // max 5x1 + 4x2; 6x1 + 4x2 <= 24; x1 + 2x2 <= 6; integer
        let mut problem = Problem::maximize(vec![5.0, 4.0])
            .with_types(&[VarType::Integer, VarType::Integer])
            .unwrap();
        problem.add_constraint(vec![6.0, 4.0], Relation::Le, 24.0).unwrap();
        problem.add_constraint(vec![1.0, 2.0], Relation::Le, 6.0).unwrap();
        problem
    }

    #[test]
    fn test_classic_integer_program() {
        let mut solver = BranchAndBound::default();
        let solution = solver.solve(&classic()).unwrap();

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.optimal_value.unwrap() - 20.0).abs() < 1e-6);
        assert_eq!(solution.value("x1"), Some(4.0));
        assert_eq!(solution.value("x2"), Some(0.0));
        assert!(solver.stats().branches >= 2);
    }

    #[test]
    fn test_branch_on_one_and_a_half() {
        // max x1; 2x1 <= 3 -> relaxation 1.5; children x1 <= 1 (z = 1), x1 >= 2 (infeasible)
        let mut problem = Problem::maximize(vec![1.0]).with_types(&[VarType::Integer]).unwrap();
        problem.add_constraint(vec![2.0], Relation::Le, 3.0).unwrap();

        let mut relaxed = DualSimplex::default();
        assert!((relaxed.solve(&problem).unwrap().optimal_value.unwrap() - 1.5).abs() < 1e-9);
        let down = relaxed
            .clone()
            .add_constraint_and_resolve(&Constraint::bound(1, 0, Relation::Le, 1.0))
            .unwrap();
        let up = relaxed
            .clone()
            .add_constraint_and_resolve(&Constraint::bound(1, 0, Relation::Ge, 2.0))
            .unwrap();
        assert_eq!(up.status, SolutionStatus::Infeasible);

        let mut solver = BranchAndBound::default();
        let solution = solver.solve(&problem).unwrap();
        assert_eq!(solution.optimal_value, down.optimal_value);
        assert_eq!(solution.value("x1"), Some(1.0));
        let stats = solver.stats();
        assert_eq!(stats.branches, 1);
        assert_eq!(stats.pruned_infeasible, 1);
    }

    #[test]
    fn test_minimization() {
        // min 3x1 + 2x2; 2x1 + 2x2 >= 7; x1 + 3x2 >= 5
        let mut problem = Problem::minimize(vec![3.0, 2.0])
            .with_types(&[VarType::Integer, VarType::Integer])
            .unwrap();
        problem.add_constraint(vec![2.0, 2.0], Relation::Ge, 7.0).unwrap();
        problem.add_constraint(vec![1.0, 3.0], Relation::Ge, 5.0).unwrap();

        let solution = BranchAndBound::default().solve(&problem).unwrap();
        assert!((solution.optimal_value.unwrap() - 8.0).abs() < 1e-6);
        assert_eq!(solution.decision_values(2), vec![0.0, 4.0]);
    }

    #[test]
    fn test_integral_root() {
        let mut problem = Problem::maximize(vec![3.0, 5.0]);
        problem.add_constraint(vec![1.0, 0.0], Relation::Le, 4.0).unwrap();
        problem.add_constraint(vec![0.0, 2.0], Relation::Le, 12.0).unwrap();
        problem.add_constraint(vec![3.0, 2.0], Relation::Le, 18.0).unwrap();

        let mut solver = BranchAndBound::default();
        let solution = solver.solve(&problem).unwrap();
        assert!((solution.optimal_value.unwrap() - 36.0).abs() < 1e-6);
        assert_eq!(solver.stats().nodes_explored, 1);
        assert!(solution.messages.iter().any(|m| m.starts_with("No integer restrictions")));
    }

    #[test]
    fn test_no_integer_solution() {
        // 2x1 = 1 has no integer solution
        let mut problem = Problem::maximize(vec![1.0]).with_types(&[VarType::Integer]).unwrap();
        problem.add_constraint(vec![2.0], Relation::Eq, 1.0).unwrap();

        let solution = BranchAndBound::default().solve(&problem).unwrap();
        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert_eq!(solution.optimal_value, None);
        assert!(solution.messages.iter().any(|m| m == "No feasible integer solution"));
    }

    #[test]
    fn test_depth_cap() {
        let mut solver = BranchAndBound::new(SolverConfig::default().with_max_branch_depth(0));
        let solution = solver.solve(&classic()).unwrap();

        assert_eq!(solution.status, SolutionStatus::LimitReached);
        assert!(solver.stats().abandoned > 0);
    }

    #[test]
    fn test_binary_variables() {
        // max 5x1 + 4x2 + 3x3; 2x1 + 3x2 + x3 <= 5; 4x1 + x2 + 2x3 <= 11 (binary)
        let mut problem = Problem::maximize(vec![5.0, 4.0, 3.0])
            .with_types(&[VarType::Binary, VarType::Binary, VarType::Binary])
            .unwrap();
        problem.add_constraint(vec![2.0, 3.0, 1.0], Relation::Le, 5.0).unwrap();
        problem.add_constraint(vec![4.0, 1.0, 2.0], Relation::Le, 11.0).unwrap();

        let solution = BranchAndBound::default().solve(&problem).unwrap();
        // x1 + x3 = 8 (weight 3); x1 + x2 = 9 (weight 5); all three weigh 6
        assert!((solution.optimal_value.unwrap() - 9.0).abs() < 1e-6);
        assert_eq!(solution.decision_values(3), vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_interrupted_before_root() {
        let flag = Arc::new(AtomicBool::new(true));
        let config = SolverConfig::default().with_interrupt(Interrupt::new().with_flag(flag));

        let mut solver = BranchAndBound::new(config);
        let solution = solver.solve(&classic()).unwrap();
        assert_eq!(solution.status, SolutionStatus::LimitReached);
        assert_eq!(solution.optimal_value, None);
        assert!(solution.messages.iter().any(|m| m.contains("interrupted")));
        assert_eq!(solver.stats().nodes_explored, 0);
    }

    /// Raises `flag` once the owning test thread logs a new incumbent.
    struct RaiseOnIncumbent {
        thread: ThreadId,
        flag: Arc<AtomicBool>,
    }

    impl log::Log for RaiseOnIncumbent {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            if std::thread::current().id() == self.thread && record.args().to_string().starts_with("new incumbent") {
                self.flag.store(true, Ordering::Relaxed);
            }
        }

        fn flush(&self) {}
    }

    #[test]
    fn test_interrupt_keeps_incumbent() {
        let flag = Arc::new(AtomicBool::new(false));
        let logger: &'static RaiseOnIncumbent = Box::leak(Box::new(RaiseOnIncumbent {
            thread: std::thread::current().id(),
            flag: flag.clone(),
        }));
        log::set_logger(logger).unwrap();
        log::set_max_level(log::LevelFilter::Info);

        // First integral node is 1.1 (x2 <= 1, x1 <= 3) with z = 19; 20 is never reached
        let config = SolverConfig::default().with_interrupt(Interrupt::new().with_flag(flag.clone()));
        let mut solver = BranchAndBound::new(config);
        let solution = solver.solve(&classic()).unwrap();

        assert!(flag.load(Ordering::Relaxed));
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.optimal_value.unwrap() - 19.0).abs() < 1e-6);
        assert_eq!(solution.decision_values(2), vec![3.0, 1.0]);
        assert!(solution.messages.iter().any(|m| m.starts_with("Limit exceeded: interrupted")));
        assert!(solution.messages.iter().any(|m| m.contains("not proven optimal")));
        assert!(solution.messages.iter().any(|m| m.contains("found at node 1.1")));
        assert_eq!(solver.stats().nodes_explored, 3);
    }
}
