use tracing::debug;

use super::{reinsert_columns, Preprocessor};
use crate::problem::LinearProgram;
use crate::solution::{ProblemSolution, VariableStatus};
use crate::time_limit::TimeLimit;

/// Removes the variables whose bounds are equal, moving their contribution to the row bounds and to
/// the objective offset.
#[derive(Debug, Default)]
pub struct FixedVariablePreprocessor {
    deleted: Vec<bool>,
    /// `(original column, value)` of each removed variable
    fixed: Vec<(usize, f64)>,
}

impl FixedVariablePreprocessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Preprocessor for FixedVariablePreprocessor {
    fn name(&self) -> &'static str {
        "fixed-variables"
    }

    fn apply(&mut self, lp: &mut LinearProgram, time_limit: &TimeLimit) -> bool {
        if time_limit.is_reached() {
            return false;
        }

        self.deleted = lp
            .variables
            .iter()
            .map(|v| v.lower == v.upper && v.lower.is_finite())
            .collect();
        self.fixed = self
            .deleted
            .iter()
            .enumerate()
            .filter(|&(_, &is_fixed)| is_fixed)
            .map(|(col, _)| (col, lp.variables[col].lower))
            .collect();
        if self.fixed.is_empty() {
            return false;
        }

        for constraint in &mut lp.constraints {
            let shift: f64 = constraint
                .coefficients
                .iter()
                .filter(|&&(col, _)| self.deleted[col])
                .map(|&(col, coef)| coef * lp.variables[col].lower)
                .sum();
            // Infinite bounds are unchanged by a finite shift.
            constraint.lower -= shift;
            constraint.upper -= shift;
        }
        for &(col, value) in &self.fixed {
            lp.objective_offset += lp.variables[col].cost * value;
        }
        lp.delete_columns(&self.deleted);

        debug!(preprocessor = self.name(), removed = self.fixed.len(), "removed fixed variables");
        true
    }

    fn recover(&self, solution: &mut ProblemSolution) {
        reinsert_columns(solution, &self.deleted);
        for &(col, value) in &self.fixed {
            solution.primal_values[col] = value;
            solution.variable_statuses[col] = VariableStatus::FixedValue;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solution::ProblemStatus;

    #[test]
    fn test_fixed_variable_is_removed_and_restored() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 2.0, 2.0, 3.0);
        lp.add_variable("y", 0.0, f64::INFINITY, 1.0);
        lp.add_constraint("c", 1.0, f64::INFINITY, vec![(0, 2.0), (1, 1.0)]);

        let mut preprocessor = FixedVariablePreprocessor::new();
        assert!(preprocessor.apply(&mut lp, &TimeLimit::infinite()));

        assert_eq!(lp.num_variables(), 1);
        assert_eq!(lp.constraints[0].lower, -3.0);
        assert_eq!(lp.constraints[0].upper, f64::INFINITY);
        assert_eq!(lp.constraints[0].coefficients, vec![(0, 1.0)]);
        assert_eq!(lp.objective_offset, 6.0);

        let mut solution = ProblemSolution::new(1, 1);
        solution.status = ProblemStatus::Optimal;
        solution.primal_values[0] = 0.5;
        solution.variable_statuses[0] = VariableStatus::AtLowerBound;
        preprocessor.recover(&mut solution);

        assert_eq!(solution.primal_values, vec![2.0, 0.5]);
        assert_eq!(solution.variable_statuses[0], VariableStatus::FixedValue);
        assert_eq!(solution.variable_statuses[1], VariableStatus::AtLowerBound);
    }

    #[test]
    fn test_nothing_to_remove() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, 1.0, 1.0);
        let before = lp.clone();

        let mut preprocessor = FixedVariablePreprocessor::new();
        assert!(!preprocessor.apply(&mut lp, &TimeLimit::infinite()));
        assert_eq!(lp, before);
    }

    #[test]
    fn test_deadline_prevents_changes() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 1.0, 1.0, 1.0);
        let before = lp.clone();

        let mut preprocessor = FixedVariablePreprocessor::new();
        assert!(!preprocessor.apply(&mut lp, &TimeLimit::new(Some(0.0), None)));
        assert_eq!(lp, before);
    }
}
