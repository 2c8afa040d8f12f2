mod model;
mod report;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use certlp_solver::{LinearProgram, LpSolver, ProblemSolution, ProblemStatus, SolverParameters};
use model::ProblemFile;
use report::SolveReport;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "certlp")]
#[command(about = "Solve linear programs and certify their solutions", long_about = None)]
struct Cli {
    /// Log solver progress (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a problem file and print the certified solution
    Solve {
        /// The JSON problem file
        file: PathBuf,
        /// Show the numerical analysis of the solution
        #[arg(short, long)]
        analysis: bool,
        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,
        /// JSON file with solver parameters
        #[arg(short, long)]
        parameters: Option<PathBuf>,
        /// Also write the solution to this file, in the format read by `verify`
        #[arg(long)]
        solution_out: Option<PathBuf>,
    },
    /// Check a solution against a problem file
    Verify {
        /// The JSON problem file
        problem: PathBuf,
        /// The JSON solution file
        solution: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,
        /// JSON file with solver parameters
        #[arg(short, long)]
        parameters: Option<PathBuf>,
    },
    /// Check a problem file for errors
    Check {
        /// The JSON problem file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Solve {
            file,
            analysis,
            format,
            parameters,
            solution_out,
        } => {
            let lp = load_problem(&file);
            let mut solver = LpSolver::with_parameters(load_parameters(parameters.as_deref()));
            let status = solver.solve(&lp);
            info!(%status, iterations = solver.number_of_simplex_iterations(), "solved {}", file.display());

            if let Some(path) = solution_out {
                let json = match serde_json::to_string_pretty(&solver.solution()) {
                    Ok(json) => json,
                    Err(e) => {
                        eprintln!("Error serializing solution: {}", e);
                        std::process::exit(1);
                    }
                };
                if let Err(e) = std::fs::write(&path, json) {
                    eprintln!("Error writing {}: {}", path.display(), e);
                    std::process::exit(1);
                }
            }

            output(&SolveReport::new(&lp, &solver, analysis), format);
            exit_for(status);
        }
        Commands::Verify {
            problem,
            solution,
            format,
            parameters,
        } => {
            let lp = load_problem(&problem);
            let source = read_file(&solution);
            let candidate: ProblemSolution = match serde_json::from_str(&source) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Solution error: {}", e);
                    std::process::exit(1);
                }
            };

            let mut solver = LpSolver::with_parameters(load_parameters(parameters.as_deref()));
            let status = solver.load_and_verify_solution(&lp, &candidate);
            info!(claimed = %candidate.status, %status, "verified {}", solution.display());

            output(&SolveReport::new(&lp, &solver, true), format);
            if status != candidate.status {
                eprintln!("Claimed status {} was downgraded to {}", candidate.status, status);
                std::process::exit(1);
            }
        }
        Commands::Check { file } => {
            let lp = load_problem(&file);
            match lp.validate() {
                Ok(()) => {
                    println!("✓ {} is valid", file.display());
                    println!("  {} variables", lp.num_variables());
                    println!("  {} constraints", lp.num_constraints());
                    println!("  {} non-zero coefficients", lp.num_entries());
                    if lp.has_inverted_bounds() {
                        println!("  warning: some bounds have lower > upper");
                    }
                }
                Err(e) => {
                    eprintln!("✗ {} has errors:", file.display());
                    eprintln!("  {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_file(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn load_problem(path: &Path) -> LinearProgram {
    let source = read_file(path);
    match ProblemFile::from_json(&source).and_then(|file| file.to_linear_program()) {
        Ok(lp) => lp,
        Err(e) => {
            eprintln!("Problem error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_parameters(path: Option<&Path>) -> SolverParameters {
    let Some(path) = path else {
        return SolverParameters::default();
    };
    match serde_json::from_str(&read_file(path)) {
        Ok(parameters) => parameters,
        Err(e) => {
            eprintln!("Parameters error: {}", e);
            std::process::exit(1);
        }
    }
}

fn output(report: &SolveReport, format: Format) {
    match format {
        Format::Pretty => report.print_pretty(),
        Format::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing report: {}", e);
                std::process::exit(1);
            }
        },
    }
}

/// Exit code 1 unless a usable solution was found.
fn exit_for(status: ProblemStatus) {
    if !matches!(status, ProblemStatus::Optimal | ProblemStatus::PrimalFeasible) {
        std::process::exit(1);
    }
}
