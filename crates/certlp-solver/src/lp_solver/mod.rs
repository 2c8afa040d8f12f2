//! Solve orchestration and solution verification.

mod consistency;
mod diagnostics;

pub use consistency::is_problem_solution_consistent;

use tracing::{debug, warn};

use crate::parameters::SolverParameters;
use crate::preprocessor::{default_pipeline, Preprocessor};
use crate::problem::LinearProgram;
use crate::simplex::Simplex;
use crate::solution::{Analysis, ConstraintStatus, ProblemSolution, ProblemStatus, VariableStatus};
use crate::time_limit::TimeLimit;
use crate::util::are_within_absolute_tolerance;

/// Solves linear programs and certifies the solutions it reports.
///
/// Every reported status comes out of [`LpSolver::load_and_verify_solution`], which checks the
/// solution against the problem as given, independently of how it was computed. A solution
/// produced elsewhere can go through the same verification.
///
/// # Example
/// ```
/// use certlp_solver::{ConstraintOp, LinearProgram, LpSolver, ProblemStatus};
///
/// let mut lp = LinearProgram::new();
/// lp.add_variable("x", 0.0, f64::INFINITY, 1.0);
/// lp.add_variable("y", 0.0, f64::INFINITY, 1.0);
/// lp.add_constraint_op("sum", &[1.0, 1.0], ConstraintOp::Ge, 2.0);
///
/// let mut solver = LpSolver::new();
/// assert_eq!(solver.solve(&lp), ProblemStatus::Optimal);
/// assert!((solver.objective_value() - 2.0).abs() < 1e-9);
/// ```
pub struct LpSolver {
    parameters: SolverParameters,

    // Dimensions of the last problem given to `solve`.
    initial_num_rows: usize,
    initial_num_cols: usize,
    initial_num_entries: usize,

    current_linear_program: LinearProgram,
    preprocessors: Vec<Box<dyn Preprocessor>>,
    simplex: Option<Simplex>,
    num_simplex_iterations: u64,

    status: ProblemStatus,
    primal_values: Vec<f64>,
    dual_values: Vec<f64>,
    variable_statuses: Vec<VariableStatus>,
    constraint_statuses: Vec<ConstraintStatus>,
    reduced_costs: Vec<f64>,
    constraint_activities: Vec<f64>,

    problem_objective_value: f64,
    may_have_multiple_solutions: bool,
    max_absolute_primal_infeasibility: f64,
    max_absolute_dual_infeasibility: f64,
    analysis: Analysis,
    num_solves: u64,
}

impl Default for LpSolver {
    fn default() -> Self {
        Self::with_parameters(SolverParameters::default())
    }
}

impl LpSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameters(parameters: SolverParameters) -> Self {
        Self {
            parameters,
            initial_num_rows: 0,
            initial_num_cols: 0,
            initial_num_entries: 0,
            current_linear_program: LinearProgram::new(),
            preprocessors: Vec::new(),
            simplex: None,
            num_simplex_iterations: 0,
            status: ProblemStatus::Init,
            primal_values: Vec::new(),
            dual_values: Vec::new(),
            variable_statuses: Vec::new(),
            constraint_statuses: Vec::new(),
            reduced_costs: Vec::new(),
            constraint_activities: Vec::new(),
            problem_objective_value: 0.0,
            may_have_multiple_solutions: false,
            max_absolute_primal_infeasibility: 0.0,
            max_absolute_dual_infeasibility: 0.0,
            analysis: Analysis::empty(),
            num_solves: 0,
        }
    }

    pub fn parameters(&self) -> &SolverParameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: SolverParameters) {
        self.parameters = parameters;
    }

    /// Solves `lp` and returns the verified status.
    ///
    /// All the result vectors are sized to `lp` afterwards, whatever the status.
    pub fn solve(&mut self, lp: &LinearProgram) -> ProblemStatus {
        self.num_solves += 1;
        self.num_simplex_iterations = 0;
        self.initial_num_rows = lp.num_constraints();
        self.initial_num_cols = lp.num_variables();
        self.initial_num_entries = lp.num_entries();
        debug!(
            rows = self.initial_num_rows,
            cols = self.initial_num_cols,
            entries = self.initial_num_entries,
            maximize = lp.maximize,
            "solving"
        );

        if let Err(e) = lp.validate() {
            warn!(error = %e, "invalid linear program");
            self.resize_solution(lp.num_constraints(), lp.num_variables());
            self.status = ProblemStatus::Abnormal;
            return self.status;
        }

        self.current_linear_program = lp.clone();
        let mut time_limit = TimeLimit::from_parameters(&self.parameters);

        let verdict = self.run_preprocessors(&time_limit);
        let mut solution = ProblemSolution::new(
            self.current_linear_program.num_constraints(),
            self.current_linear_program.num_variables(),
        );
        solution.status = verdict;
        if verdict != ProblemStatus::PrimalInfeasible && !time_limit.is_reached() {
            self.run_simplex(&mut solution, &mut time_limit);
            if verdict == ProblemStatus::DualInfeasible
                && matches!(solution.status, ProblemStatus::Optimal | ProblemStatus::PrimalFeasible)
            {
                solution.status = ProblemStatus::Unbounded;
            }
        }

        while let Some(preprocessor) = self.preprocessors.pop() {
            preprocessor.recover(&mut solution);
        }

        let status = self.load_and_verify_solution(lp, &solution);
        debug!(%status, iterations = self.num_simplex_iterations, "solve done");
        status
    }

    /// Applies the transformations to the working copy and returns their combined verdict.
    fn run_preprocessors(&mut self, time_limit: &TimeLimit) -> ProblemStatus {
        self.preprocessors.clear();
        if !self.parameters.use_preprocessing {
            return ProblemStatus::Init;
        }

        let mut verdict = ProblemStatus::Init;
        for mut preprocessor in default_pipeline(&self.parameters) {
            if time_limit.is_reached() {
                debug!("deadline reached during preprocessing");
                break;
            }
            let changed = preprocessor.apply(&mut self.current_linear_program, time_limit);
            let status = preprocessor.status();
            debug!(preprocessor = preprocessor.name(), changed, %status, "preprocessor applied");
            if changed {
                self.preprocessors.push(preprocessor);
            }
            match status {
                ProblemStatus::Init => {}
                ProblemStatus::PrimalInfeasible => return status,
                other => verdict = other,
            }
        }
        verdict
    }

    fn run_simplex(&mut self, solution: &mut ProblemSolution, time_limit: &mut TimeLimit) {
        let lp = &self.current_linear_program;
        if lp.num_variables() == 0 {
            let tolerance = self.parameters.primal_feasibility_tolerance;
            let feasible = lp
                .constraints
                .iter()
                .all(|c| c.lower <= tolerance && c.upper >= -tolerance);
            solution.status = if feasible {
                ProblemStatus::Optimal
            } else {
                ProblemStatus::PrimalInfeasible
            };
            return;
        }

        let simplex = self.simplex.get_or_insert_with(Simplex::new);
        match simplex.solve(lp, &self.parameters, time_limit) {
            Ok(engine_solution) => {
                self.num_simplex_iterations = simplex.iterations();
                *solution = engine_solution;
            }
            Err(e) => {
                warn!(error = %e, "simplex failed");
                self.num_simplex_iterations = simplex.iterations();
                solution.status = ProblemStatus::Abnormal;
            }
        }
    }

    /// Forgets the working problem, the simplex state and the last results.
    pub fn clear(&mut self) {
        *self = Self::with_parameters(self.parameters.clone());
    }

    /// Checks `solution` against `lp`, loads it and returns its verified status.
    ///
    /// A structurally inconsistent solution is `Abnormal`. A consistent one is kept, possibly
    /// downgraded to `Imprecise` when it does not satisfy the requested tolerances.
    pub fn load_and_verify_solution(&mut self, lp: &LinearProgram, solution: &ProblemSolution) -> ProblemStatus {
        if let Err(e) = lp.validate() {
            warn!(error = %e, "invalid linear program");
            self.resize_solution(lp.num_constraints(), lp.num_variables());
            self.status = ProblemStatus::Abnormal;
            return self.status;
        }
        if !is_problem_solution_consistent(lp, solution) {
            warn!(status = %solution.status, "solution is inconsistent with the problem");
            self.resize_solution(lp.num_constraints(), lp.num_variables());
            self.status = ProblemStatus::Abnormal;
            return self.status;
        }

        self.primal_values = solution.primal_values.clone();
        self.dual_values = solution.dual_values.clone();
        self.variable_statuses = solution.variable_statuses.clone();
        self.constraint_statuses = solution.constraint_statuses.clone();
        let mut status = solution.status;

        self.compute_reduced_costs(lp);
        let primal_objective = self.compute_objective(lp);
        let dual_objective = self.compute_dual_objective(lp);
        debug!(primal_objective, dual_objective, "objective values before projection");

        let mut analysis = Analysis {
            primal_objective,
            dual_objective,
            ..Analysis::empty()
        };
        let strong_guarantee = self.parameters.provide_strong_optimal_guarantee;
        if status == ProblemStatus::Optimal && strong_guarantee {
            analysis.primal_move = self.move_primal_values_within_bounds(lp);
            analysis.dual_move = self.move_dual_values_within_bounds(lp);
        }

        self.problem_objective_value = lp.apply_objective_scaling_and_offset(self.compute_objective(lp));
        self.compute_reduced_costs(lp);
        self.compute_constraint_activities(lp);

        analysis.rhs_perturbation = self.compute_max_rhs_perturbation_to_enforce_optimality(lp);
        analysis.cost_perturbation = self.compute_max_cost_perturbation_to_enforce_optimality(lp);
        analysis.primal_value_infeasibility = self.compute_primal_value_infeasibility(lp);
        analysis.dual_value_infeasibility = self.compute_dual_value_infeasibility(lp);
        analysis.activity_infeasibility = self.compute_activity_infeasibility(lp);
        analysis.reduced_cost_infeasibility = self.compute_reduced_cost_infeasibility(lp);
        debug!(
            rhs_perturbation = analysis.rhs_perturbation.value,
            cost_perturbation = analysis.cost_perturbation.value,
            primal_residual = analysis.primal_value_infeasibility.value,
            dual_residual = analysis.dual_value_infeasibility.value,
            primal_infeasibility = analysis.activity_infeasibility.value,
            dual_infeasibility = analysis.reduced_cost_infeasibility.value,
            "solution analysis"
        );

        self.max_absolute_primal_infeasibility = analysis
            .activity_infeasibility
            .value
            .max(analysis.primal_value_infeasibility.value);
        self.max_absolute_dual_infeasibility = analysis
            .reduced_cost_infeasibility
            .value
            .max(analysis.dual_value_infeasibility.value);
        let primal_infeasibility_is_too_large =
            analysis.activity_infeasibility.too_large || analysis.primal_value_infeasibility.too_large;
        let dual_infeasibility_is_too_large =
            analysis.reduced_cost_infeasibility.too_large || analysis.dual_value_infeasibility.too_large;

        if status == ProblemStatus::Optimal
            && strong_guarantee
            && (analysis.rhs_perturbation.too_large || analysis.cost_perturbation.too_large)
        {
            debug!("perturbation needed for optimality is too large");
            status = ProblemStatus::Imprecise;
        }

        if status == ProblemStatus::Optimal {
            analysis.max_expected_objective_error = self.compute_max_expected_objective_error(lp);
            let allowed = analysis.max_expected_objective_error;
            if !are_within_absolute_tolerance(primal_objective, dual_objective, allowed) {
                debug!(primal_objective, dual_objective, allowed, "duality gap too large");
                status = ProblemStatus::Imprecise;
            }
        }

        if matches!(status, ProblemStatus::Optimal | ProblemStatus::PrimalFeasible)
            && primal_infeasibility_is_too_large
        {
            debug!("primal infeasibility too large");
            status = ProblemStatus::Imprecise;
        }
        if matches!(status, ProblemStatus::Optimal | ProblemStatus::DualFeasible)
            && dual_infeasibility_is_too_large
        {
            debug!("dual infeasibility too large");
            status = ProblemStatus::Imprecise;
        }

        self.may_have_multiple_solutions =
            status == ProblemStatus::Optimal && self.is_optimal_solution_on_facet(lp);
        self.analysis = analysis;
        self.status = status;
        status
    }

    /// Sizes the result vectors to the given dimensions and resets the derived values.
    fn resize_solution(&mut self, num_rows: usize, num_cols: usize) {
        self.primal_values = vec![0.0; num_cols];
        self.reduced_costs = vec![0.0; num_cols];
        self.variable_statuses = vec![VariableStatus::Free; num_cols];
        self.dual_values = vec![0.0; num_rows];
        self.constraint_activities = vec![0.0; num_rows];
        self.constraint_statuses = vec![ConstraintStatus::Basic; num_rows];
        self.problem_objective_value = 0.0;
        self.may_have_multiple_solutions = false;
        self.max_absolute_primal_infeasibility = 0.0;
        self.max_absolute_dual_infeasibility = 0.0;
        self.analysis = Analysis::empty();
    }

    pub fn status(&self) -> ProblemStatus {
        self.status
    }

    /// Objective of the reported solution, with offset and scaling applied.
    pub fn objective_value(&self) -> f64 {
        self.problem_objective_value
    }

    pub fn variable_values(&self) -> &[f64] {
        &self.primal_values
    }

    pub fn reduced_costs(&self) -> &[f64] {
        &self.reduced_costs
    }

    pub fn variable_statuses(&self) -> &[VariableStatus] {
        &self.variable_statuses
    }

    pub fn dual_values(&self) -> &[f64] {
        &self.dual_values
    }

    pub fn constraint_activities(&self) -> &[f64] {
        &self.constraint_activities
    }

    pub fn constraint_statuses(&self) -> &[ConstraintStatus] {
        &self.constraint_statuses
    }

    pub fn maximum_primal_infeasibility(&self) -> f64 {
        self.max_absolute_primal_infeasibility
    }

    pub fn maximum_dual_infeasibility(&self) -> f64 {
        self.max_absolute_dual_infeasibility
    }

    /// Whether an optimal solution lies on a facet of the optimal face, so that other optimal
    /// solutions probably exist.
    pub fn may_have_multiple_optimal_solutions(&self) -> bool {
        self.may_have_multiple_solutions
    }

    /// Simplex iterations of the last solve.
    pub fn number_of_simplex_iterations(&self) -> u64 {
        self.num_simplex_iterations
    }

    /// Deterministic work done by the simplex since the last `clear`.
    pub fn deterministic_time(&self) -> f64 {
        self.simplex.as_ref().map_or(0.0, Simplex::deterministic_time)
    }

    pub fn number_of_solves(&self) -> u64 {
        self.num_solves
    }

    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// The loaded solution, after the projection on the bounds.
    pub fn solution(&self) -> ProblemSolution {
        ProblemSolution {
            status: self.status,
            primal_values: self.primal_values.clone(),
            dual_values: self.dual_values.clone(),
            variable_statuses: self.variable_statuses.clone(),
            constraint_statuses: self.constraint_statuses.clone(),
        }
    }
}
