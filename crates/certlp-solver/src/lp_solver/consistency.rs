use tracing::debug;

use crate::problem::LinearProgram;
use crate::solution::{ConstraintStatus, ProblemSolution, VariableStatus};

/// Distance to the upper bound accepted for a variable reported at that bound.
const AT_UPPER_BOUND_TOLERANCE: f64 = 1e-7;

/// Largest range of a row reported as `FixedValue`.
const FIXED_ROW_RANGE_TOLERANCE: f64 = 1e-12;

/// Checks that `solution` is structurally a basic solution of `lp`.
///
/// Values are only compared with the bounds their status names; how far they are from
/// feasibility or optimality is measured by the diagnostics instead.
pub fn is_problem_solution_consistent(lp: &LinearProgram, solution: &ProblemSolution) -> bool {
    if let Some(col) = lp.variables.iter().position(|v| v.lower > v.upper) {
        debug!(col, "variable has inverted bounds");
        return false;
    }
    if let Some(row) = lp.constraints.iter().position(|c| c.lower > c.upper) {
        debug!(row, "constraint has inverted bounds");
        return false;
    }

    let num_rows = lp.num_constraints();
    let num_cols = lp.num_variables();
    if solution.primal_values.len() != num_cols
        || solution.variable_statuses.len() != num_cols
        || solution.dual_values.len() != num_rows
        || solution.constraint_statuses.len() != num_rows
    {
        debug!(num_rows, num_cols, "solution vectors do not match the problem");
        return false;
    }
    if !solution.status.is_optimal_or_feasible() {
        return true;
    }

    let mut num_basic = 0;
    for (col, v) in lp.variables.iter().enumerate() {
        let value = solution.primal_values[col];
        let status = solution.variable_statuses[col];
        let consistent = match status {
            VariableStatus::Basic => {
                num_basic += 1;
                true
            }
            VariableStatus::FixedValue => v.lower == v.upper && value == v.lower,
            VariableStatus::AtLowerBound => value == v.lower && v.lower != v.upper,
            VariableStatus::AtUpperBound => {
                (value - v.upper).abs() <= AT_UPPER_BOUND_TOLERANCE && v.lower != v.upper
            }
            VariableStatus::Free => {
                v.lower == f64::NEG_INFINITY && v.upper == f64::INFINITY && value == 0.0
            }
        };
        if !consistent {
            debug!(col, ?status, value, lower = v.lower, upper = v.upper, "inconsistent variable status");
            return false;
        }
    }

    for (row, c) in lp.constraints.iter().enumerate() {
        let dual = solution.dual_values[row];
        let status = solution.constraint_statuses[row];
        let consistent = match status {
            ConstraintStatus::Basic => {
                num_basic += 1;
                dual == 0.0
            }
            ConstraintStatus::FixedValue => c.upper - c.lower <= FIXED_ROW_RANGE_TOLERANCE,
            ConstraintStatus::AtLowerBound => c.lower.is_finite(),
            ConstraintStatus::AtUpperBound => c.upper.is_finite(),
            ConstraintStatus::Free => {
                c.lower == f64::NEG_INFINITY && c.upper == f64::INFINITY && dual == 0.0
            }
        };
        if !consistent {
            debug!(row, ?status, dual, lower = c.lower, upper = c.upper, "inconsistent constraint status");
            return false;
        }
    }

    if num_basic != num_rows {
        debug!(num_basic, num_rows, "wrong number of basic variables");
        return false;
    }
    true
}
