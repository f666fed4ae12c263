use tabula_solver::{
    BranchAndBound, Constraint, CuttingPlane, DualSimplex, KnapsackSolver, PrimalSimplex, Problem, Relation, Reoptimize,
    RevisedSimplex, Solution, SolutionStatus, Solve, SolverError, VarType,
};

fn textbook() -> Problem {
    let mut problem = Problem::maximize(vec![3.0, 5.0]);
    problem.add_constraint(vec![1.0, 0.0], Relation::Le, 4.0).unwrap();
    problem.add_constraint(vec![0.0, 2.0], Relation::Le, 12.0).unwrap();
    problem.add_constraint(vec![3.0, 2.0], Relation::Le, 18.0).unwrap();
    problem
}

fn assert_round_trip(problem: &Problem, solution: &Solution) {
    let values = solution.decision_values(problem.num_variables());
    let violations = problem.violations(&values, 1e-6);
    assert!(violations.is_empty(), "violated: {:?}", violations);
    let z = problem.objective_value(&values);
    let optimal = solution.optimal_value.expect("optimal value");
    assert!((z - optimal).abs() < 1e-6, "objective {} vs reported {}", z, optimal);
}

#[test]
fn test_textbook_with_every_lp_solver() {
    let problem = textbook();
    let solvers: Vec<(&str, Box<dyn Solve>)> = vec![
        ("primal", Box::new(PrimalSimplex::default())),
        ("dual", Box::new(DualSimplex::default())),
        ("revised", Box::new(RevisedSimplex::default())),
    ];

    for (name, mut solver) in solvers {
        let solution = solver.solve(&problem).unwrap();
        assert_eq!(solution.status, SolutionStatus::Optimal, "{}", name);
        assert!((solution.optimal_value.unwrap() - 36.0).abs() < 1e-6, "{}", name);
        assert!((solution.value("x1").unwrap() - 2.0).abs() < 1e-6, "{}", name);
        assert!((solution.value("x2").unwrap() - 6.0).abs() < 1e-6, "{}", name);
        assert_round_trip(&problem, &solution);
    }
}

#[test]
fn test_contradictory_bounds_are_infeasible() {
    let mut problem = Problem::maximize(vec![1.0]);
    problem.add_constraint(vec![1.0], Relation::Ge, 5.0).unwrap();
    problem.add_constraint(vec![1.0], Relation::Le, 2.0).unwrap();

    let solution = DualSimplex::default().solve(&problem).unwrap();
    assert_eq!(solution.status, SolutionStatus::Infeasible);
    assert_eq!(solution.optimal_value, None);
    assert!(solution.messages.iter().any(|m| m.starts_with("Infeasible")));
}

#[test]
fn test_mixed_relations_round_trip() {
    // min x1 + x2; x1 + 2x2 = 6; 3x1 + x2 >= 3; x1 <= 5
    let mut problem = Problem::minimize(vec![1.0, 1.0]);
    problem.add_constraint(vec![1.0, 2.0], Relation::Eq, 6.0).unwrap();
    problem.add_constraint(vec![3.0, 1.0], Relation::Ge, 3.0).unwrap();
    problem.add_constraint(vec![1.0, 0.0], Relation::Le, 5.0).unwrap();

    let solution = DualSimplex::default().solve(&problem).unwrap();
    assert!((solution.optimal_value.unwrap() - 3.0).abs() < 1e-6);
    assert_round_trip(&problem, &solution);
}

#[test]
fn test_integer_optimum_matches_better_child() {
    let mut problem = Problem::maximize(vec![1.0]).with_types(&[VarType::Integer]).unwrap();
    problem.add_constraint(vec![2.0], Relation::Le, 3.0).unwrap();

    let mut relaxation = DualSimplex::default();
    let root = relaxation.solve(&problem).unwrap();
    assert!((root.value("x1").unwrap() - 1.5).abs() < 1e-9);

    let children: Vec<f64> = [
        Constraint::bound(1, 0, Relation::Le, 1.0),
        Constraint::bound(1, 0, Relation::Ge, 2.0),
    ]
    .iter()
    .filter_map(|bound| relaxation.clone().add_constraint_and_resolve(bound).unwrap().optimal_value)
    .collect();
    let better = children.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let solution = BranchAndBound::default().solve(&problem).unwrap();
    assert!((solution.optimal_value.unwrap() - better).abs() < 1e-9);
}

#[test]
fn test_integer_solvers_agree() {
    let mut problem = Problem::maximize(vec![5.0, 4.0])
        .with_types(&[VarType::Integer, VarType::Integer])
        .unwrap();
    problem.add_constraint(vec![6.0, 4.0], Relation::Le, 24.0).unwrap();
    problem.add_constraint(vec![1.0, 2.0], Relation::Le, 6.0).unwrap();

    let branched = BranchAndBound::default().solve(&problem).unwrap();
    let cut = CuttingPlane::default().solve(&problem).unwrap();
    assert!((branched.optimal_value.unwrap() - 20.0).abs() < 1e-6);
    assert!((cut.optimal_value.unwrap() - 20.0).abs() < 1e-6);
    assert_round_trip(&problem, &branched);
}

#[test]
fn test_knapsack_scenario() {
    let mut problem = Problem::maximize(vec![60.0, 100.0, 120.0]);
    problem.add_constraint(vec![10.0, 20.0, 30.0], Relation::Le, 50.0).unwrap();

    let solution = KnapsackSolver::default().solve(&problem).unwrap();
    assert_eq!(solution.optimal_value, Some(220.0));
    assert_eq!(solution.value("x1"), Some(0.0));
    assert_eq!(solution.value("x2"), Some(1.0));
    assert_eq!(solution.value("x3"), Some(1.0));

    // branch-and-bound over binaries reaches the same packing
    let binary = problem
        .clone()
        .with_types(&[VarType::Binary, VarType::Binary, VarType::Binary])
        .unwrap();
    let branched = BranchAndBound::default().solve(&binary).unwrap();
    assert!((branched.optimal_value.unwrap() - 220.0).abs() < 1e-6);
}

#[test]
fn test_reoptimize_before_solve_fails() {
    let err = DualSimplex::default()
        .add_constraint_and_resolve(&Constraint::bound(1, 0, Relation::Le, 1.0))
        .unwrap_err();
    assert!(matches!(err, SolverError::InvalidOperation(_)));
}
