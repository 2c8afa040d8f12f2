//! Solve results as printed by the CLI.

use certlp_solver::{
    Analysis, ConstraintStatus, LinearProgram, LpSolver, Measure, ProblemStatus, VariableStatus,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SolveReport {
    pub status: ProblemStatus,
    pub objective_value: f64,
    pub variables: Vec<VariableReport>,
    pub constraints: Vec<ConstraintReport>,
    pub may_have_multiple_optimal_solutions: bool,
    pub maximum_primal_infeasibility: f64,
    pub maximum_dual_infeasibility: f64,
    pub simplex_iterations: u64,
    pub deterministic_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

#[derive(Debug, Serialize)]
pub struct VariableReport {
    pub name: String,
    pub value: f64,
    pub reduced_cost: f64,
    pub status: VariableStatus,
}

#[derive(Debug, Serialize)]
pub struct ConstraintReport {
    pub name: String,
    pub activity: f64,
    pub dual_value: f64,
    pub status: ConstraintStatus,
}

impl SolveReport {
    /// Collects the last results of `solver` for the problem `lp` it verified.
    pub fn new(lp: &LinearProgram, solver: &LpSolver, with_analysis: bool) -> Self {
        let variables = lp
            .variables
            .iter()
            .enumerate()
            .map(|(col, v)| VariableReport {
                name: v.name.clone(),
                value: solver.variable_values()[col],
                reduced_cost: solver.reduced_costs().get(col).copied().unwrap_or(0.0),
                status: solver.variable_statuses()[col],
            })
            .collect();
        let constraints = lp
            .constraints
            .iter()
            .enumerate()
            .map(|(row, c)| ConstraintReport {
                name: c.name.clone(),
                activity: solver.constraint_activities().get(row).copied().unwrap_or(0.0),
                dual_value: solver.dual_values()[row],
                status: solver.constraint_statuses()[row],
            })
            .collect();

        Self {
            status: solver.status(),
            objective_value: solver.objective_value(),
            variables,
            constraints,
            may_have_multiple_optimal_solutions: solver.may_have_multiple_optimal_solutions(),
            maximum_primal_infeasibility: solver.maximum_primal_infeasibility(),
            maximum_dual_infeasibility: solver.maximum_dual_infeasibility(),
            simplex_iterations: solver.number_of_simplex_iterations(),
            deterministic_time: solver.deterministic_time(),
            analysis: with_analysis.then(|| solver.analysis().clone()),
        }
    }

    /// Human-readable rendering.
    pub fn print_pretty(&self) {
        println!("Status: {}", self.status);
        if !matches!(
            self.status,
            ProblemStatus::Optimal | ProblemStatus::PrimalFeasible | ProblemStatus::Imprecise
        ) {
            match self.status {
                ProblemStatus::PrimalInfeasible => {
                    println!("No solution exists that satisfies all constraints.")
                }
                ProblemStatus::Unbounded | ProblemStatus::DualInfeasible => {
                    println!("The problem has no finite optimal solution.")
                }
                ProblemStatus::Abnormal => println!("The solution could not be certified."),
                _ => println!("No solution was found."),
            }
            return;
        }

        println!("Objective: {:.6}", self.objective_value);
        if self.may_have_multiple_optimal_solutions {
            println!("Other optimal solutions may exist.");
        }
        println!();
        println!("Variables:");
        for v in &self.variables {
            println!(
                "  {:20} {:14.6}  rc {:12.6}  {:?}",
                v.name, v.value, v.reduced_cost, v.status
            );
        }
        if !self.constraints.is_empty() {
            println!();
            println!("Constraints:");
            for c in &self.constraints {
                println!(
                    "  {:20} {:14.6}  dual {:12.6}  {:?}",
                    c.name, c.activity, c.dual_value, c.status
                );
            }
        }

        let Some(analysis) = &self.analysis else {
            return;
        };
        println!();
        println!("Analysis:");
        println!("  primal objective        {:.12e}", analysis.primal_objective);
        println!("  dual objective          {:.12e}", analysis.dual_objective);
        println!("  expected error          {:.3e}", analysis.max_expected_objective_error);
        println!("  primal move             {:.3e}", analysis.primal_move);
        println!("  dual move               {:.3e}", analysis.dual_move);
        print_measure("primal value residual", &analysis.primal_value_infeasibility);
        print_measure("activity infeasibility", &analysis.activity_infeasibility);
        print_measure("dual value residual", &analysis.dual_value_infeasibility);
        print_measure("reduced cost residual", &analysis.reduced_cost_infeasibility);
        print_measure("cost perturbation", &analysis.cost_perturbation);
        print_measure("rhs perturbation", &analysis.rhs_perturbation);
        println!("  simplex iterations      {}", self.simplex_iterations);
        println!("  deterministic time      {:.3e}", self.deterministic_time);
    }
}

fn print_measure(label: &str, measure: &Measure) {
    let flag = if measure.too_large { "  (too large)" } else { "" };
    println!("  {:23} {:.3e}{}", label, measure.value, flag);
}
