//! Reversible transformations applied to a linear program before the simplex.
//!
//! Each transformation simplifies the problem in place and remembers what it removed, so that a
//! solution of the simplified problem can be turned back into a solution of the problem it was
//! given. They are applied in a fixed order and recovered in the reverse one.

mod empty;
mod fixed;
mod scaling;
mod singleton;

pub use empty::{EmptyColumnPreprocessor, EmptyConstraintPreprocessor};
pub use fixed::FixedVariablePreprocessor;
pub use scaling::RowScalingPreprocessor;
pub use singleton::SingletonRowPreprocessor;

use crate::parameters::SolverParameters;
use crate::problem::LinearProgram;
use crate::solution::{ConstraintStatus, ProblemSolution, ProblemStatus, VariableStatus};
use crate::time_limit::TimeLimit;

pub trait Preprocessor {
    fn name(&self) -> &'static str;

    /// Simplifies `lp` in place and returns whether it changed anything.
    ///
    /// Nothing is changed when the deadline is already reached.
    fn apply(&mut self, lp: &mut LinearProgram, time_limit: &TimeLimit) -> bool;

    /// Turns a solution of the simplified problem into a solution of the problem given to `apply`.
    fn recover(&self, solution: &mut ProblemSolution);

    /// What the transformation learned about the problem, `Init` if nothing.
    fn status(&self) -> ProblemStatus {
        ProblemStatus::Init
    }
}

/// The transformations run by the solver, in application order.
pub fn default_pipeline(parameters: &SolverParameters) -> Vec<Box<dyn Preprocessor>> {
    let mut pipeline: Vec<Box<dyn Preprocessor>> = vec![
        Box::new(FixedVariablePreprocessor::new()),
        Box::new(SingletonRowPreprocessor::new(parameters)),
        Box::new(EmptyConstraintPreprocessor::new(parameters)),
        Box::new(EmptyColumnPreprocessor::new()),
    ];
    if parameters.use_scaling {
        pipeline.push(Box::new(RowScalingPreprocessor::new()));
    }
    pipeline
}

/// Non-basic status of a variable sitting at `value`.
pub(crate) fn status_at(lower: f64, upper: f64, value: f64) -> VariableStatus {
    if lower == upper {
        VariableStatus::FixedValue
    } else if value == lower {
        VariableStatus::AtLowerBound
    } else if value == upper {
        VariableStatus::AtUpperBound
    } else {
        VariableStatus::Free
    }
}

/// Expands the column vectors of `solution` to `deleted.len()` entries, leaving placeholders at the
/// deleted positions.
pub(crate) fn reinsert_columns(solution: &mut ProblemSolution, deleted: &[bool]) {
    solution.primal_values = expand(&solution.primal_values, deleted, 0.0);
    solution.variable_statuses = expand(&solution.variable_statuses, deleted, VariableStatus::Free);
}

/// Same as [`reinsert_columns`] for the row vectors.
pub(crate) fn reinsert_rows(solution: &mut ProblemSolution, deleted: &[bool]) {
    solution.dual_values = expand(&solution.dual_values, deleted, 0.0);
    solution.constraint_statuses = expand(&solution.constraint_statuses, deleted, ConstraintStatus::Basic);
}

fn expand<T: Copy>(kept: &[T], deleted: &[bool], placeholder: T) -> Vec<T> {
    let mut remaining = kept.iter();
    deleted
        .iter()
        .map(|&is_deleted| {
            if is_deleted {
                placeholder
            } else {
                remaining.next().copied().unwrap_or(placeholder)
            }
        })
        .collect()
}
