use tabula_lang::parse_problem;
use tabula_solver::{BranchAndBound, CuttingPlane, DualSimplex, KnapsackSolver, SolutionStatus, Solve, VarType};

#[test]
fn test_textbook_file() {
    let problem = parse_problem(include_str!("../../../problems/textbook.lp")).unwrap();
    let solution = DualSimplex::default().solve(&problem).unwrap();

    assert_eq!(solution.status, SolutionStatus::Optimal);
    assert!((solution.optimal_value.unwrap() - 36.0).abs() < 1e-6);
    assert!((solution.value("x1").unwrap() - 2.0).abs() < 1e-6);
    assert!((solution.value("x2").unwrap() - 6.0).abs() < 1e-6);
}

#[test]
fn test_minimize_file() {
    let problem = parse_problem(include_str!("../../../problems/diet.lp")).unwrap();
    let solution = DualSimplex::default().solve(&problem).unwrap();

    assert!((solution.optimal_value.unwrap() - 9.0).abs() < 1e-6);
    assert!((solution.value("x1").unwrap() - 3.0).abs() < 1e-6);
    assert!((solution.value("x2").unwrap() - 1.0).abs() < 1e-6);
}

#[test]
fn test_integer_file() {
    let problem = parse_problem(include_str!("../../../problems/integer.lp")).unwrap();
    assert_eq!(problem.integer_variables(), vec![0, 1]);

    let branched = BranchAndBound::default().solve(&problem).unwrap();
    let cut = CuttingPlane::default().solve(&problem).unwrap();
    assert!((branched.optimal_value.unwrap() - 20.0).abs() < 1e-6);
    assert!((cut.optimal_value.unwrap() - 20.0).abs() < 1e-6);
}

#[test]
fn test_knapsack_file() {
    let problem = parse_problem(include_str!("../../../problems/knapsack.lp")).unwrap();
    assert!(problem.variables.iter().all(|v| v.var_type == VarType::Binary));

    let solution = KnapsackSolver::default().solve(&problem).unwrap();
    assert_eq!(solution.optimal_value, Some(220.0));
    assert_eq!(solution.decision_values(3), vec![0.0, 1.0, 1.0]);
}
