use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Numeric tolerances, penalties and limits shared by every solver.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    tolerance: f64,
    integrality_tolerance: f64,
    big_m: f64,
    max_phase1_iterations: usize,
    max_phase2_iterations: usize,
    max_branch_depth: usize,
    max_cuts: usize,
    record_steps: bool,
    interrupt: Interrupt,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            integrality_tolerance: 1e-6,
            big_m: 1000.0,
            max_phase1_iterations: 100,
            max_phase2_iterations: 1000,
            max_branch_depth: 25,
            max_cuts: 50,
            record_steps: true,
            interrupt: Interrupt::default(),
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tolerance for pivot magnitudes, optimality and feasibility tests
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Distance from the nearest integer below which a value counts as integral
    pub fn with_integrality_tolerance(mut self, tol: f64) -> Self {
        self.integrality_tolerance = tol;
        self
    }

    /// Objective penalty on artificial columns of `=` constraints
    pub fn with_big_m(mut self, big_m: f64) -> Self {
        self.big_m = big_m;
        self
    }

    pub fn with_max_phase1_iterations(mut self, max: usize) -> Self {
        self.max_phase1_iterations = max;
        self
    }

    pub fn with_max_phase2_iterations(mut self, max: usize) -> Self {
        self.max_phase2_iterations = max;
        self
    }

    pub fn with_max_branch_depth(mut self, max: usize) -> Self {
        self.max_branch_depth = max;
        self
    }

    pub fn with_max_cuts(mut self, max: usize) -> Self {
        self.max_cuts = max;
        self
    }

    /// Whether solvers keep tableau snapshots in the solution audit trail
    pub fn with_record_steps(mut self, record: bool) -> Self {
        self.record_steps = record;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn integrality_tolerance(&self) -> f64 {
        self.integrality_tolerance
    }

    pub fn big_m(&self) -> f64 {
        self.big_m
    }

    pub fn max_phase1_iterations(&self) -> usize {
        self.max_phase1_iterations
    }

    pub fn max_phase2_iterations(&self) -> usize {
        self.max_phase2_iterations
    }

    pub fn max_branch_depth(&self) -> usize {
        self.max_branch_depth
    }

    pub fn max_cuts(&self) -> usize {
        self.max_cuts
    }

    pub fn record_steps(&self) -> bool {
        self.record_steps
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }
}

/// External stop signal: a shared flag, a deadline, or both.
///
/// Solvers poll it once per pivot, branch pop, cut or search node.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.flag = Some(flag);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn is_triggered(&self) -> bool {
        if let Some(flag) = &self.flag {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.max_phase1_iterations(), 100);
        assert_eq!(config.max_cuts(), 50);
        assert_eq!(config.big_m(), 1000.0);
        assert!(!config.interrupt().is_triggered());
    }

    #[test]
    fn test_builders() {
        let config = SolverConfig::new()
            .with_integrality_tolerance(1e-4)
            .with_big_m(50.0)
            .with_max_phase2_iterations(7);
        assert_eq!(config.integrality_tolerance(), 1e-4);
        assert_eq!(config.big_m(), 50.0);
        assert_eq!(config.max_phase2_iterations(), 7);
        assert_eq!(config.max_phase1_iterations(), 100);
    }

    #[test]
    fn test_interrupt_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let interrupt = Interrupt::new().with_flag(flag.clone());
        assert!(!interrupt.is_triggered());
        flag.store(true, Ordering::Relaxed);
        assert!(interrupt.is_triggered());
    }

    #[test]
    fn test_interrupt_deadline_in_past() {
        let interrupt = Interrupt::new().with_deadline(Instant::now());
        assert!(interrupt.is_triggered());
    }
}
