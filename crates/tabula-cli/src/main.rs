use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tabula_solver::{
    BranchAndBound, CuttingPlane, DualSimplex, Interrupt, KnapsackSolver, PrimalSimplex, Problem, RevisedSimplex,
    Solution, SolutionStatus, Solve, SolverConfig, StepContent,
};

#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Tableau-based LP and MILP solvers", long_about = None)]
struct Cli {
    /// Log solver progress at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a problem file and print the result
    Solve {
        /// The problem file
        file: PathBuf,
        /// Algorithm to run
        #[arg(short, long, value_enum, default_value_t = Method::Dual)]
        method: Method,
        /// Print the solution as JSON
        #[arg(long)]
        json: bool,
        /// Print every recorded step
        #[arg(long)]
        steps: bool,
        /// Show shadow prices and reduced costs
        #[arg(short, long)]
        analysis: bool,
        /// Skip knapsack nodes whose bound cannot beat the incumbent
        #[arg(long)]
        prune: bool,
        /// Numerical tolerance
        #[arg(long)]
        tolerance: Option<f64>,
        /// Distance from an integer still accepted as integral
        #[arg(long)]
        integrality_tolerance: Option<f64>,
        /// Penalty on artificial columns of equality rows
        #[arg(long)]
        big_m: Option<f64>,
        /// Pivot cap for the simplex optimization phase
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Branch-and-bound depth cap
        #[arg(long)]
        max_depth: Option<usize>,
        /// Cutting plane cut cap
        #[arg(long)]
        max_cuts: Option<usize>,
        /// Stop searching after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Check a problem file for errors
    Check {
        /// The file to check
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    /// Two-phase dual simplex (any relations)
    Dual,
    /// Primal simplex (<= rows only)
    Primal,
    /// Revised simplex (<= rows only)
    Revised,
    /// Depth-first branch-and-bound
    BranchAndBound,
    /// Gomory cutting planes
    CuttingPlane,
    /// 0/1 knapsack search
    Knapsack,
}

fn read_problem(file: &Path) -> Problem {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            std::process::exit(1);
        }
    };

    match tabula_lang::parse_problem(&source) {
        Ok(problem) => problem,
        Err(e) => {
            eprintln!("✗ {} has errors:", file.display());
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}

fn solver_for(method: Method, config: SolverConfig, prune: bool) -> Box<dyn Solve> {
    match method {
        Method::Dual => Box::new(DualSimplex::new(config)),
        Method::Primal => Box::new(PrimalSimplex::new(config)),
        Method::Revised => Box::new(RevisedSimplex::new(config)),
        Method::BranchAndBound => Box::new(BranchAndBound::new(config)),
        Method::CuttingPlane => Box::new(CuttingPlane::new(config)),
        Method::Knapsack => Box::new(KnapsackSolver::new(config).with_bound_pruning(prune)),
    }
}

fn print_steps(solution: &Solution) {
    println!("Steps:");
    for step in &solution.steps {
        println!();
        println!("{}", step.label);
        match &step.content {
            StepContent::Tableau(tableau) => print!("{}", tableau),
            StepContent::Text(text) => println!("  {}", text),
        }
    }
    println!();
}

fn print_analysis(solution: &Solution) {
    let Some(analysis) = &solution.analysis else {
        println!("Analysis: not available for this method");
        return;
    };

    println!("Analysis:");
    println!();
    if !analysis.binding_constraints.is_empty() {
        println!("Binding constraints:");
        for name in &analysis.binding_constraints {
            println!("  - {}", name);
        }
        println!();
    }

    println!("Shadow prices:");
    for sp in &analysis.shadow_prices {
        println!("  {:10} {:12.4}", sp.constraint, sp.value);
    }
    println!();

    println!("Reduced costs:");
    for rc in &analysis.reduced_costs {
        let basis = if rc.is_basic { "basic" } else { "nonbasic" };
        println!("  {:10} {:12.4}  ({}, value {:.4})", rc.variable, rc.reduced_cost, basis, rc.value);
    }
}

fn print_solution(solution: &Solution, problem: &Problem) {
    let status = match solution.status {
        SolutionStatus::Optimal => "OPTIMAL",
        SolutionStatus::Infeasible => "INFEASIBLE",
        SolutionStatus::Unbounded => "UNBOUNDED",
        SolutionStatus::LimitReached => "LIMIT REACHED",
        SolutionStatus::NotSolved => "NOT SOLVED",
    };
    println!("Status: {}", status);

    if let Some(value) = solution.optimal_value {
        println!("Optimal value: {:.6}", value);
        println!();
        println!("Variables:");
        for (i, value) in solution.decision_values(problem.num_variables()).iter().enumerate() {
            println!("  {:10} {:12.6}", tabula_solver::variable_name(i), value);
        }
        let auxiliary: Vec<_> = solution.values.iter().filter(|(name, _)| !name.starts_with('x')).collect();
        if !auxiliary.is_empty() {
            println!();
            println!("Auxiliary:");
            for (name, value) in auxiliary {
                println!("  {:10} {:12.6}", name, value);
            }
        }
    }

    if !solution.messages.is_empty() {
        println!();
        println!("Messages:");
        for message in &solution.messages {
            println!("  {}", message);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Solve {
            file,
            method,
            json,
            steps,
            analysis,
            prune,
            tolerance,
            integrality_tolerance,
            big_m,
            max_iterations,
            max_depth,
            max_cuts,
            timeout_ms,
        } => {
            let problem = read_problem(&file);

            let mut config = SolverConfig::default().with_record_steps(steps);
            if let Some(tol) = tolerance {
                config = config.with_tolerance(tol);
            }
            if let Some(tol) = integrality_tolerance {
                config = config.with_integrality_tolerance(tol);
            }
            if let Some(big_m) = big_m {
                config = config.with_big_m(big_m);
            }
            if let Some(max) = max_iterations {
                config = config.with_max_phase2_iterations(max);
            }
            if let Some(depth) = max_depth {
                config = config.with_max_branch_depth(depth);
            }
            if let Some(cuts) = max_cuts {
                config = config.with_max_cuts(cuts);
            }
            if let Some(ms) = timeout_ms {
                config = config.with_interrupt(Interrupt::new().with_timeout(Duration::from_millis(ms)));
            }

            log::info!(
                "solving {} with {:?} ({} variables, {} constraints)",
                file.display(),
                method,
                problem.num_variables(),
                problem.num_constraints()
            );

            let mut solver = solver_for(method, config, prune);
            let solution = match solver.solve(&problem) {
                Ok(solution) => solution,
                Err(e) => {
                    eprintln!("Solver error: {}", e);
                    std::process::exit(1);
                }
            };

            if json {
                match serde_json::to_string_pretty(&solution) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        eprintln!("Error writing JSON: {}", e);
                        std::process::exit(1);
                    }
                }
            } else {
                if steps {
                    print_steps(&solution);
                }
                print_solution(&solution, &problem);
                if analysis && solution.is_optimal() {
                    println!();
                    print_analysis(&solution);
                }
            }

            if !solution.is_optimal() {
                std::process::exit(1);
            }
        }
        Commands::Check { file } => {
            let problem = read_problem(&file);
            let integer = problem.integer_variables().len();

            println!("✓ {} is valid", file.display());
            println!("  {:?}", problem.sense);
            println!("  {} variables ({} integer)", problem.num_variables(), integer);
            println!("  {} constraints", problem.num_constraints());
        }
    }
}
