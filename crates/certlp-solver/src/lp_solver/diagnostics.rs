//! Measures computed on a loaded solution.
//!
//! All the sums are compensated, and every error is compared with the solution tolerance scaled by
//! the magnitude of the quantity it applies to.

use tracing::debug;

use super::LpSolver;
use crate::problem::LinearProgram;
use crate::solution::{ConstraintStatus, Measure, VariableStatus};
use crate::util::{allowed_error, are_within_absolute_tolerance, KahanSum};

/// Reduced costs and duals below this magnitude are considered zero by the facet detection.
const FACET_REDUCED_COST_TOLERANCE: f64 = 1e-9;
/// Distance under which a value is considered on its bound by the facet detection.
const FACET_BOUND_TOLERANCE: f64 = 1e-7;

impl LpSolver {
    fn tolerance(&self) -> f64 {
        self.parameters.solution_feasibility_tolerance
    }

    /// Clamps the primal values to their bounds and returns the largest move.
    pub(super) fn move_primal_values_within_bounds(&mut self, lp: &LinearProgram) -> f64 {
        let mut max_move = 0.0_f64;
        for (value, v) in self.primal_values.iter_mut().zip(&lp.variables) {
            let moved = value.min(v.upper).max(v.lower);
            max_move = max_move.max((moved - *value).abs());
            *value = moved;
        }
        debug!(max_move, "moved primal values within bounds");
        max_move
    }

    /// Zeroes the duals whose sign is forbidden by an infinite row bound and returns the largest move.
    pub(super) fn move_dual_values_within_bounds(&mut self, lp: &LinearProgram) -> f64 {
        let sign = lp.optimization_sign();
        let mut max_move = 0.0_f64;
        for (dual, c) in self.dual_values.iter_mut().zip(&lp.constraints) {
            let minimization_dual = sign * *dual;
            let forbidden = (c.lower == f64::NEG_INFINITY && minimization_dual > 0.0)
                || (c.upper == f64::INFINITY && minimization_dual < 0.0);
            if forbidden {
                max_move = max_move.max(minimization_dual.abs());
                *dual = 0.0;
            }
        }
        debug!(max_move, "moved dual values within bounds");
        max_move
    }

    /// `c_j - sum_i y_i a_ij` for every column.
    pub(super) fn compute_reduced_costs(&mut self, lp: &LinearProgram) {
        let mut sums: Vec<KahanSum> = lp
            .variables
            .iter()
            .map(|v| {
                let mut sum = KahanSum::new();
                sum.add(v.cost);
                sum
            })
            .collect();
        for (c, &dual) in lp.constraints.iter().zip(&self.dual_values) {
            if dual == 0.0 {
                continue;
            }
            for &(col, coef) in &c.coefficients {
                sums[col].add(-dual * coef);
            }
        }
        self.reduced_costs = sums.iter().map(KahanSum::value).collect();
    }

    pub(super) fn compute_constraint_activities(&mut self, lp: &LinearProgram) {
        self.constraint_activities = lp
            .constraints
            .iter()
            .map(|c| {
                let mut sum = KahanSum::new();
                for &(col, coef) in &c.coefficients {
                    sum.add(coef * self.primal_values[col]);
                }
                sum.value()
            })
            .collect();
    }

    /// `c.x` without the objective offset and scaling.
    pub(super) fn compute_objective(&self, lp: &LinearProgram) -> f64 {
        let mut sum = KahanSum::new();
        for (v, &value) in lp.variables.iter().zip(&self.primal_values) {
            sum.add(v.cost * value);
        }
        sum.value()
    }

    /// Objective of the dual problem evaluated at the current duals and reduced costs.
    ///
    /// Each dual picks the row bound its sign points to, and each reduced cost the column bound
    /// named by the status of its variable. Infinite bounds contribute nothing: the corresponding
    /// sign violations are reported by the dual infeasibility measures.
    pub(super) fn compute_dual_objective(&self, lp: &LinearProgram) -> f64 {
        let sign = lp.optimization_sign();
        let mut sum = KahanSum::new();

        for (c, &dual) in lp.constraints.iter().zip(&self.dual_values) {
            let bound = if c.lower == c.upper {
                c.lower
            } else {
                let minimization_dual = sign * dual;
                if minimization_dual == 0.0 {
                    continue;
                } else if minimization_dual > 0.0 {
                    c.lower
                } else {
                    c.upper
                }
            };
            if bound.is_finite() {
                sum.add(dual * bound);
            }
        }

        for (col, v) in lp.variables.iter().enumerate() {
            let reduced_cost = self.reduced_costs[col];
            let minimization_reduced_cost = sign * reduced_cost;
            if minimization_reduced_cost == 0.0 {
                continue;
            }
            let bound = match self.variable_statuses[col] {
                VariableStatus::AtLowerBound => v.lower,
                VariableStatus::AtUpperBound | VariableStatus::FixedValue => v.upper,
                _ if v.lower == v.upper => v.lower,
                _ if minimization_reduced_cost > 0.0 => v.lower,
                _ => v.upper,
            };
            if bound.is_finite() {
                sum.add(reduced_cost * bound);
            }
        }
        sum.value()
    }

    /// Bound on the objective error caused by primal values off by the allowed error.
    pub(super) fn compute_max_expected_objective_error(&self, lp: &LinearProgram) -> f64 {
        let tolerance = self.tolerance();
        let mut sum = KahanSum::new();
        for (v, &value) in lp.variables.iter().zip(&self.primal_values) {
            sum.add((v.cost * allowed_error(tolerance, value)).abs());
        }
        sum.value()
    }

    pub(super) fn compute_primal_value_infeasibility(&self, lp: &LinearProgram) -> Measure {
        let tolerance = self.tolerance();
        let mut measure = Measure::default();
        for (v, &value) in lp.variables.iter().zip(&self.primal_values) {
            record_bound_violation(&mut measure, tolerance, v.lower, v.upper, value);
        }
        measure
    }

    pub(super) fn compute_activity_infeasibility(&self, lp: &LinearProgram) -> Measure {
        let tolerance = self.tolerance();
        let mut measure = Measure::default();
        for (c, &activity) in lp.constraints.iter().zip(&self.constraint_activities) {
            record_bound_violation(&mut measure, tolerance, c.lower, c.upper, activity);
        }
        measure
    }

    /// Dual values of the wrong sign for a row with an infinite bound.
    pub(super) fn compute_dual_value_infeasibility(&self, lp: &LinearProgram) -> Measure {
        let tolerance = self.tolerance();
        let sign = lp.optimization_sign();
        let mut measure = Measure::default();
        for (c, &dual) in lp.constraints.iter().zip(&self.dual_values) {
            record_sign_violation(&mut measure, tolerance, c.lower, c.upper, sign * dual);
        }
        measure
    }

    /// Reduced costs of the wrong sign for a column with an infinite bound.
    pub(super) fn compute_reduced_cost_infeasibility(&self, lp: &LinearProgram) -> Measure {
        let tolerance = self.tolerance();
        let sign = lp.optimization_sign();
        let mut measure = Measure::default();
        for (v, &reduced_cost) in lp.variables.iter().zip(&self.reduced_costs) {
            let allowed = allowed_error(tolerance, v.cost);
            record_sign_violation(&mut measure, allowed, v.lower, v.upper, sign * reduced_cost);
        }
        measure
    }

    /// Largest cost change that would make the reduced costs agree with the variable statuses.
    pub(super) fn compute_max_cost_perturbation_to_enforce_optimality(&self, lp: &LinearProgram) -> Measure {
        let tolerance = self.tolerance();
        let sign = lp.optimization_sign();
        let mut measure = Measure::default();
        for (col, v) in lp.variables.iter().enumerate() {
            let reduced_cost = self.reduced_costs[col];
            let minimization_reduced_cost = sign * reduced_cost;
            let must_vanish = match self.variable_statuses[col] {
                VariableStatus::Basic | VariableStatus::Free => true,
                VariableStatus::AtUpperBound => minimization_reduced_cost > 0.0,
                VariableStatus::AtLowerBound => minimization_reduced_cost < 0.0,
                VariableStatus::FixedValue => false,
            };
            if must_vanish {
                measure.record(reduced_cost.abs(), allowed_error(tolerance, v.cost));
            }
        }
        measure
    }

    /// Largest right-hand side change that would put the active rows exactly on their bounds.
    pub(super) fn compute_max_rhs_perturbation_to_enforce_optimality(&self, lp: &LinearProgram) -> Measure {
        let tolerance = self.tolerance();
        let mut measure = Measure::default();
        for (row, c) in lp.constraints.iter().enumerate() {
            let activity = self.constraint_activities[row];
            let status = self.constraint_statuses[row];
            let bound = if status == ConstraintStatus::AtLowerBound || activity < c.lower {
                c.lower
            } else if status == ConstraintStatus::AtUpperBound || activity > c.upper {
                c.upper
            } else if status == ConstraintStatus::FixedValue {
                c.lower
            } else {
                continue;
            };
            measure.record((activity - bound).abs(), allowed_error(tolerance, bound));
        }
        measure
    }

    /// Whether some non-fixed variable or row sits on a bound with a zero reduced cost or dual, so
    /// that moving it along that facet keeps the objective unchanged.
    pub(super) fn is_optimal_solution_on_facet(&self, lp: &LinearProgram) -> bool {
        let on_bound = |value: f64, lower: f64, upper: f64| {
            are_within_absolute_tolerance(value, lower, FACET_BOUND_TOLERANCE)
                || are_within_absolute_tolerance(value, upper, FACET_BOUND_TOLERANCE)
        };
        let is_zero = |value: f64| are_within_absolute_tolerance(value, 0.0, FACET_REDUCED_COST_TOLERANCE);

        for (col, v) in lp.variables.iter().enumerate() {
            if v.lower == v.upper {
                continue;
            }
            if on_bound(self.primal_values[col], v.lower, v.upper) && is_zero(self.reduced_costs[col]) {
                debug!(col, "optimal solution on a facet");
                return true;
            }
        }
        for (row, c) in lp.constraints.iter().enumerate() {
            if c.lower == c.upper {
                continue;
            }
            if on_bound(self.constraint_activities[row], c.lower, c.upper) && is_zero(self.dual_values[row]) {
                debug!(row, "optimal solution on a facet");
                return true;
            }
        }
        false
    }
}

/// Records how far `value` is outside `[lower, upper]`.
fn record_bound_violation(measure: &mut Measure, tolerance: f64, lower: f64, upper: f64, value: f64) {
    if lower == upper {
        measure.record((value - upper).abs(), allowed_error(tolerance, upper));
        return;
    }
    if value > upper {
        measure.record(value - upper, allowed_error(tolerance, upper));
    }
    if value < lower {
        measure.record(lower - value, allowed_error(tolerance, lower));
    }
}

/// Records the part of a minimization dual (or reduced cost) whose sign an infinite bound forbids.
fn record_sign_violation(measure: &mut Measure, allowed: f64, lower: f64, upper: f64, minimization_value: f64) {
    if lower == f64::NEG_INFINITY {
        measure.record(minimization_value.max(0.0), allowed);
    }
    if upper == f64::INFINITY {
        measure.record((-minimization_value).max(0.0), allowed);
    }
}

#[cfg(test)]
mod tests {
    use crate::problem::LinearProgram;
    use crate::solution::{ConstraintStatus, ProblemSolution, ProblemStatus, VariableStatus};
    use crate::LpSolver;

    fn problem() -> LinearProgram {
        // Minimize x + 2y subject to x + y >= 2, x <= 1.5
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, 1.5, 1.0);
        lp.add_variable("y", 0.0, f64::INFINITY, 2.0);
        lp.add_constraint("sum", 2.0, f64::INFINITY, vec![(0, 1.0), (1, 1.0)]);
        lp
    }

    fn optimal() -> ProblemSolution {
        ProblemSolution {
            status: ProblemStatus::Optimal,
            primal_values: vec![1.5, 0.5],
            dual_values: vec![2.0],
            variable_statuses: vec![VariableStatus::AtUpperBound, VariableStatus::Basic],
            constraint_statuses: vec![ConstraintStatus::AtLowerBound],
        }
    }

    #[test]
    fn test_exact_optimum_has_no_error() {
        let lp = problem();
        let mut solver = LpSolver::new();
        solver.load_and_verify_solution(&lp, &optimal());

        assert_eq!(solver.reduced_costs(), &[-1.0, 0.0]);
        assert_eq!(solver.constraint_activities(), &[2.0]);
        let analysis = solver.analysis();
        assert_eq!(analysis.primal_objective, 2.5);
        // 2 * 2 from the row, -1 * 1.5 from x at its upper bound.
        assert_eq!(analysis.dual_objective, 2.5);
        assert_eq!(analysis.cost_perturbation.value, 0.0);
        assert_eq!(analysis.rhs_perturbation.value, 0.0);
        assert!((analysis.max_expected_objective_error - (1.5e-6 + 2e-6)).abs() < 1e-15);
    }

    #[test]
    fn test_projection_moves_values() {
        let lp = problem();
        let mut solution = optimal();
        solution.primal_values[0] = 1.5 + 1e-9;

        let mut solver = LpSolver::new();
        // The status check tolerates values slightly above the upper bound.
        assert_eq!(solver.load_and_verify_solution(&lp, &solution), ProblemStatus::Optimal);
        assert_eq!(solver.variable_values()[0], 1.5);
        assert!((solver.analysis().primal_move - 1e-9).abs() < 1e-15);
    }

    #[test]
    fn test_wrong_dual_sign_is_reported() {
        let lp = problem();
        let mut solution = optimal();
        solution.dual_values[0] = -2.0;

        let mut solver = LpSolver::new();
        assert_eq!(solver.load_and_verify_solution(&lp, &solution), ProblemStatus::Imprecise);
        // Projected to zero before the measures are taken.
        assert_eq!(solver.dual_values(), &[0.0]);
        assert_eq!(solver.analysis().dual_move, 2.0);
        assert!(solver.analysis().cost_perturbation.too_large);
    }

    #[test]
    fn test_reduced_cost_sign_violation() {
        let lp = problem();
        let mut solution = optimal();
        solution.dual_values[0] = 3.0;

        let mut solver = LpSolver::with_parameters(
            crate::SolverParameters::default().with_strong_optimal_guarantee(false),
        );
        assert_eq!(solver.load_and_verify_solution(&lp, &solution), ProblemStatus::Imprecise);
        // y has reduced cost 2 - 3 = -1 with an infinite upper bound.
        assert_eq!(solver.analysis().reduced_cost_infeasibility.value, 1.0);
        assert_eq!(solver.maximum_dual_infeasibility(), 1.0);
    }

    #[test]
    fn test_fixed_basic_column_is_not_a_facet() {
        // x in [0, 10] at its lower bound with cost 1, y fixed at 1 and basic with a zero
        // reduced cost: the optimum is unique.
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, 10.0, 1.0);
        lp.add_variable("y", 1.0, 1.0, 0.0);
        lp.add_constraint("pin", 1.0, 1.0, vec![(1, 1.0)]);
        let solution = ProblemSolution {
            status: ProblemStatus::Optimal,
            primal_values: vec![0.0, 1.0],
            dual_values: vec![0.0],
            variable_statuses: vec![VariableStatus::AtLowerBound, VariableStatus::Basic],
            constraint_statuses: vec![ConstraintStatus::FixedValue],
        };

        let mut solver = LpSolver::new();
        assert_eq!(solver.load_and_verify_solution(&lp, &solution), ProblemStatus::Optimal);
        assert_eq!(solver.reduced_costs(), &[1.0, 0.0]);
        assert!(!solver.may_have_multiple_optimal_solutions());
    }

    #[test]
    fn test_basic_equality_row_is_not_a_facet() {
        // Minimize x + y subject to x + y = 1, x >= 0, y >= 1: the only optimum is (0, 1), with
        // the equality row reported basic and a zero dual.
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, 10.0, 1.0);
        lp.add_variable("y", 1.0, 10.0, 1.0);
        lp.add_constraint("balance", 1.0, 1.0, vec![(0, 1.0), (1, 1.0)]);
        let solution = ProblemSolution {
            status: ProblemStatus::Optimal,
            primal_values: vec![0.0, 1.0],
            dual_values: vec![0.0],
            variable_statuses: vec![VariableStatus::AtLowerBound, VariableStatus::AtLowerBound],
            constraint_statuses: vec![ConstraintStatus::Basic],
        };

        let mut solver = LpSolver::new();
        assert_eq!(solver.load_and_verify_solution(&lp, &solution), ProblemStatus::Optimal);
        assert_eq!(solver.objective_value(), 1.0);
        assert!(!solver.may_have_multiple_optimal_solutions());
    }
}
