use tracing::debug;

use super::{reinsert_rows, Preprocessor};
use crate::parameters::SolverParameters;
use crate::problem::LinearProgram;
use crate::solution::{ConstraintStatus, ProblemSolution, ProblemStatus, VariableStatus};
use crate::time_limit::TimeLimit;
use crate::util::{allowed_error, KahanSum};

/// Replaces the rows with a single entry by bounds on their variable.
#[derive(Debug)]
pub struct SingletonRowPreprocessor {
    primal_tolerance: f64,
    optimization_sign: f64,
    deleted: Vec<bool>,
    removed: Vec<RemovedRow>,
    status: ProblemStatus,
}

/// A removed row `lower <= coef * x[col] <= upper` and what recovery needs to price its column.
#[derive(Debug, Clone)]
struct RemovedRow {
    row: usize,
    col: usize,
    coef: f64,
    lower: f64,
    upper: f64,
    lower_from_row: bool,
    upper_from_row: bool,
    /// Bounds of the column before the row was folded into them
    column_lower: f64,
    column_upper: f64,
    cost: f64,
    /// Entries of the column in the simplified problem
    column: Vec<(usize, f64)>,
}

impl RemovedRow {
    /// Status of the row when it is active on the side of the column bound it implied.
    fn active_status(&self, column_at_upper: bool) -> ConstraintStatus {
        if self.lower == self.upper {
            ConstraintStatus::FixedValue
        } else if column_at_upper == (self.coef > 0.0) {
            ConstraintStatus::AtUpperBound
        } else {
            ConstraintStatus::AtLowerBound
        }
    }
}

impl SingletonRowPreprocessor {
    pub fn new(parameters: &SolverParameters) -> Self {
        Self {
            primal_tolerance: parameters.primal_feasibility_tolerance,
            optimization_sign: 1.0,
            deleted: Vec::new(),
            removed: Vec::new(),
            status: ProblemStatus::Init,
        }
    }

    fn reduced_cost(&self, removed: &RemovedRow, dual_values: &[f64]) -> f64 {
        let mut sum = KahanSum::new();
        sum.add(removed.cost);
        for &(row, coef) in &removed.column {
            sum.add(-dual_values[row] * coef);
        }
        sum.value()
    }
}

impl Preprocessor for SingletonRowPreprocessor {
    fn name(&self) -> &'static str {
        "singleton-rows"
    }

    fn apply(&mut self, lp: &mut LinearProgram, time_limit: &TimeLimit) -> bool {
        if time_limit.is_reached() {
            return false;
        }
        self.optimization_sign = lp.optimization_sign();

        let mut used = vec![false; lp.num_variables()];
        let mut removed = Vec::new();
        for (row, constraint) in lp.constraints.iter().enumerate() {
            let &[(col, coef)] = constraint.coefficients.as_slice() else {
                continue;
            };
            if used[col] {
                continue;
            }

            let (implied_lower, implied_upper) = if coef > 0.0 {
                (constraint.lower / coef, constraint.upper / coef)
            } else {
                (constraint.upper / coef, constraint.lower / coef)
            };
            let variable = &lp.variables[col];
            let lower = variable.lower.max(implied_lower);
            let upper = variable.upper.min(implied_upper);
            if lower > upper {
                if lower - upper > allowed_error(self.primal_tolerance, lower) {
                    debug!(preprocessor = "singleton-rows", row, col, lower, upper, "crossing bounds");
                    self.status = ProblemStatus::PrimalInfeasible;
                    return false;
                }
                continue;
            }

            used[col] = true;
            removed.push(RemovedRow {
                row,
                col,
                coef,
                lower: constraint.lower,
                upper: constraint.upper,
                lower_from_row: implied_lower > variable.lower,
                upper_from_row: implied_upper < variable.upper,
                column_lower: variable.lower,
                column_upper: variable.upper,
                cost: variable.cost,
                column: Vec::new(),
            });
        }
        if removed.is_empty() {
            return false;
        }

        self.deleted = vec![false; lp.num_constraints()];
        for r in &removed {
            self.deleted[r.row] = true;
            let variable = &mut lp.variables[r.col];
            if r.lower_from_row {
                variable.lower = if r.coef > 0.0 { r.lower / r.coef } else { r.upper / r.coef };
            }
            if r.upper_from_row {
                variable.upper = if r.coef > 0.0 { r.upper / r.coef } else { r.lower / r.coef };
            }
        }
        lp.delete_rows(&self.deleted);

        let columns = lp.column_entries();
        for r in &mut removed {
            r.column = columns[r.col].clone();
        }
        debug!(preprocessor = self.name(), removed = removed.len(), "folded singleton rows into bounds");
        self.removed = removed;
        true
    }

    fn recover(&self, solution: &mut ProblemSolution) {
        // Reduced costs are priced on the duals of the simplified problem.
        let reduced_costs: Vec<f64> = self
            .removed
            .iter()
            .map(|r| self.reduced_cost(r, &solution.dual_values))
            .collect();

        reinsert_rows(solution, &self.deleted);
        for (r, &reduced_cost) in self.removed.iter().zip(&reduced_costs) {
            let minimization_reduced_cost = self.optimization_sign * reduced_cost;
            let column_at_upper = match solution.variable_statuses[r.col] {
                VariableStatus::AtLowerBound => Some(false),
                VariableStatus::AtUpperBound => Some(true),
                VariableStatus::FixedValue => Some(minimization_reduced_cost < 0.0),
                VariableStatus::Basic | VariableStatus::Free => None,
            };

            let row_is_active = match column_at_upper {
                Some(true) => r.upper_from_row,
                Some(false) => r.lower_from_row,
                None => false,
            };

            if let (true, Some(at_upper)) = (row_is_active, column_at_upper) {
                solution.constraint_statuses[r.row] = r.active_status(at_upper);
                solution.dual_values[r.row] = reduced_cost / r.coef;
                solution.variable_statuses[r.col] = VariableStatus::Basic;
                continue;
            }

            solution.constraint_statuses[r.row] = ConstraintStatus::Basic;
            solution.dual_values[r.row] = 0.0;
            // A fixed column whose held side is its own bound sits on that bound.
            if solution.variable_statuses[r.col] == VariableStatus::FixedValue
                && r.column_lower != r.column_upper
            {
                solution.variable_statuses[r.col] = match column_at_upper {
                    Some(true) => VariableStatus::AtUpperBound,
                    _ => VariableStatus::AtLowerBound,
                };
            }
        }
    }

    fn status(&self) -> ProblemStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn singleton_problem(coef: f64, lower: f64, upper: f64) -> LinearProgram {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, 10.0, 1.0);
        lp.add_variable("y", 0.0, 10.0, 1.0);
        lp.add_constraint("single", lower, upper, vec![(0, coef)]);
        lp.add_constraint("pair", 1.0, f64::INFINITY, vec![(0, 1.0), (1, 1.0)]);
        lp
    }

    #[test]
    fn test_row_becomes_bound() {
        let mut lp = singleton_problem(2.0, 4.0, 8.0);
        let mut preprocessor = SingletonRowPreprocessor::new(&SolverParameters::default());

        assert!(preprocessor.apply(&mut lp, &TimeLimit::infinite()));
        assert_eq!(lp.num_constraints(), 1);
        assert_eq!(lp.variables[0].lower, 2.0);
        assert_eq!(lp.variables[0].upper, 4.0);
        assert_eq!(preprocessor.status(), ProblemStatus::Init);
    }

    #[test]
    fn test_negative_coefficient_swaps_bounds() {
        let mut lp = singleton_problem(-1.0, -3.0, f64::INFINITY);
        let mut preprocessor = SingletonRowPreprocessor::new(&SolverParameters::default());

        assert!(preprocessor.apply(&mut lp, &TimeLimit::infinite()));
        assert_eq!(lp.variables[0].lower, 0.0);
        assert_eq!(lp.variables[0].upper, 3.0);
    }

    #[test]
    fn test_crossing_bounds_are_infeasible() {
        let mut lp = singleton_problem(1.0, 20.0, 30.0);
        let before = lp.clone();
        let mut preprocessor = SingletonRowPreprocessor::new(&SolverParameters::default());

        assert!(!preprocessor.apply(&mut lp, &TimeLimit::infinite()));
        assert_eq!(preprocessor.status(), ProblemStatus::PrimalInfeasible);
        assert_eq!(lp, before);
    }

    #[test]
    fn test_active_row_takes_the_reduced_cost() {
        // x >= 2 through the row 2x >= 4; x sits at that bound.
        let mut lp = singleton_problem(2.0, 4.0, f64::INFINITY);
        let mut preprocessor = SingletonRowPreprocessor::new(&SolverParameters::default());
        assert!(preprocessor.apply(&mut lp, &TimeLimit::infinite()));

        let mut solution = ProblemSolution::new(1, 2);
        solution.status = ProblemStatus::Optimal;
        solution.primal_values = vec![2.0, 0.0];
        solution.variable_statuses = vec![VariableStatus::AtLowerBound, VariableStatus::AtLowerBound];
        solution.constraint_statuses = vec![ConstraintStatus::Basic];
        preprocessor.recover(&mut solution);

        assert_eq!(solution.constraint_statuses[0], ConstraintStatus::AtLowerBound);
        assert_eq!(solution.dual_values[0], 0.5);
        assert_eq!(solution.variable_statuses[0], VariableStatus::Basic);
        assert_eq!(solution.constraint_statuses[1], ConstraintStatus::Basic);
    }

    #[test]
    fn test_inactive_row_is_basic() {
        let mut lp = singleton_problem(1.0, f64::NEG_INFINITY, 5.0);
        let mut preprocessor = SingletonRowPreprocessor::new(&SolverParameters::default());
        assert!(preprocessor.apply(&mut lp, &TimeLimit::infinite()));

        let mut solution = ProblemSolution::new(1, 2);
        solution.status = ProblemStatus::Optimal;
        solution.primal_values = vec![0.0, 1.0];
        solution.variable_statuses = vec![VariableStatus::AtLowerBound, VariableStatus::Basic];
        solution.dual_values = vec![1.0];
        solution.constraint_statuses = vec![ConstraintStatus::AtLowerBound];
        preprocessor.recover(&mut solution);

        assert_eq!(solution.constraint_statuses[0], ConstraintStatus::Basic);
        assert_eq!(solution.dual_values, vec![0.0, 1.0]);
        assert_eq!(solution.variable_statuses[0], VariableStatus::AtLowerBound);
    }
}
