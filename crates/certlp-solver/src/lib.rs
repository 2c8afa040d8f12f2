mod lp_solver;
mod parameters;
pub mod preprocessor;
mod problem;
mod simplex;
mod solution;
mod time_limit;
mod util;

pub use lp_solver::{is_problem_solution_consistent, LpSolver};
pub use parameters::SolverParameters;
pub use preprocessor::Preprocessor;
pub use problem::{Constraint, ConstraintOp, LinearProgram, ProblemError, Variable};
pub use simplex::{Simplex, SimplexError};
pub use solution::{
    Analysis, ConstraintStatus, Measure, ProblemSolution, ProblemStatus, VariableStatus,
};
pub use time_limit::TimeLimit;
