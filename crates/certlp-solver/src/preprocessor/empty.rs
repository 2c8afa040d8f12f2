use tracing::debug;

use super::{reinsert_columns, reinsert_rows, status_at, Preprocessor};
use crate::parameters::SolverParameters;
use crate::problem::LinearProgram;
use crate::solution::{ProblemSolution, ProblemStatus, VariableStatus};
use crate::time_limit::TimeLimit;

/// Removes the rows without entries. Their activity is always zero.
#[derive(Debug)]
pub struct EmptyConstraintPreprocessor {
    primal_tolerance: f64,
    deleted: Vec<bool>,
    status: ProblemStatus,
}

impl EmptyConstraintPreprocessor {
    pub fn new(parameters: &SolverParameters) -> Self {
        Self {
            primal_tolerance: parameters.primal_feasibility_tolerance,
            deleted: Vec::new(),
            status: ProblemStatus::Init,
        }
    }
}

impl Preprocessor for EmptyConstraintPreprocessor {
    fn name(&self) -> &'static str {
        "empty-constraints"
    }

    fn apply(&mut self, lp: &mut LinearProgram, time_limit: &TimeLimit) -> bool {
        if time_limit.is_reached() {
            return false;
        }

        let deleted: Vec<bool> = lp.constraints.iter().map(|c| c.coefficients.is_empty()).collect();
        for (row, c) in lp.constraints.iter().enumerate() {
            if deleted[row] && (c.lower > self.primal_tolerance || c.upper < -self.primal_tolerance) {
                debug!(preprocessor = self.name(), row, lower = c.lower, upper = c.upper, "empty row excludes zero");
                self.status = ProblemStatus::PrimalInfeasible;
                return false;
            }
        }
        let removed = deleted.iter().filter(|&&d| d).count();
        if removed == 0 {
            return false;
        }

        lp.delete_rows(&deleted);
        self.deleted = deleted;
        debug!(preprocessor = self.name(), removed, "removed empty constraints");
        true
    }

    fn recover(&self, solution: &mut ProblemSolution) {
        // Placeholders are already basic rows with a zero dual.
        reinsert_rows(solution, &self.deleted);
    }

    fn status(&self) -> ProblemStatus {
        self.status
    }
}

/// Removes the variables that appear in no row, fixing each at the bound its cost prefers.
#[derive(Debug, Default)]
pub struct EmptyColumnPreprocessor {
    deleted: Vec<bool>,
    /// `(original column, value, status)` of each removed variable
    removed: Vec<(usize, f64, VariableStatus)>,
    status: ProblemStatus,
}

impl EmptyColumnPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Value of an unconstrained-cost variable: its lower bound, else its upper bound, else zero.
fn neutral_value(lower: f64, upper: f64) -> f64 {
    if lower.is_finite() {
        lower
    } else if upper.is_finite() {
        upper
    } else {
        0.0
    }
}

impl Preprocessor for EmptyColumnPreprocessor {
    fn name(&self) -> &'static str {
        "empty-columns"
    }

    fn apply(&mut self, lp: &mut LinearProgram, time_limit: &TimeLimit) -> bool {
        if time_limit.is_reached() {
            return false;
        }

        let mut deleted: Vec<bool> = vec![true; lp.num_variables()];
        for constraint in &lp.constraints {
            for &(col, _) in &constraint.coefficients {
                deleted[col] = false;
            }
        }
        if !deleted.contains(&true) {
            return false;
        }

        let sign = lp.optimization_sign();
        let mut removed = Vec::new();
        for (col, v) in lp.variables.iter().enumerate() {
            if !deleted[col] {
                continue;
            }
            let minimization_cost = sign * v.cost;
            let preferred = if minimization_cost > 0.0 {
                Some(v.lower)
            } else if minimization_cost < 0.0 {
                Some(v.upper)
            } else {
                None
            };
            let value = match preferred {
                Some(bound) if bound.is_finite() => bound,
                Some(_) => {
                    debug!(preprocessor = self.name(), col, "objective unbounded along an empty column");
                    self.status = ProblemStatus::DualInfeasible;
                    neutral_value(v.lower, v.upper)
                }
                None => neutral_value(v.lower, v.upper),
            };
            lp.objective_offset += v.cost * value;
            removed.push((col, value, status_at(v.lower, v.upper, value)));
        }

        lp.delete_columns(&deleted);
        debug!(preprocessor = self.name(), removed = removed.len(), "removed empty columns");
        self.deleted = deleted;
        self.removed = removed;
        true
    }

    fn recover(&self, solution: &mut ProblemSolution) {
        reinsert_columns(solution, &self.deleted);
        for &(col, value, status) in &self.removed {
            solution.primal_values[col] = value;
            solution.variable_statuses[col] = status;
        }
    }

    fn status(&self) -> ProblemStatus {
        self.status
    }
}
