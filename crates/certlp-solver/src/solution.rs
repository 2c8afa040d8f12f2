use std::fmt;

/// Outcome of a solve or of a solution verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ProblemStatus {
    /// Nothing is known yet (e.g. the deadline stopped the pipeline early)
    #[default]
    Init,
    /// An optimal solution was found and verified
    Optimal,
    /// The problem has no feasible point
    PrimalInfeasible,
    /// The dual problem has no feasible point
    DualInfeasible,
    /// Either infeasible or unbounded, but which one is unknown
    InfeasibleOrUnbounded,
    /// Feasible with an unbounded objective
    Unbounded,
    /// A feasible point that is not proven optimal
    PrimalFeasible,
    /// A dual feasible point that is not proven optimal
    DualFeasible,
    /// Structural inconsistency or internal engine failure
    Abnormal,
    /// Structurally sound, but outside the requested tolerances
    Imprecise,
}

impl ProblemStatus {
    /// Statuses for which the solution vectors are checked against the bounds.
    pub fn is_optimal_or_feasible(self) -> bool {
        matches!(
            self,
            ProblemStatus::Optimal | ProblemStatus::PrimalFeasible | ProblemStatus::DualFeasible
        )
    }
}

impl fmt::Display for ProblemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProblemStatus::Init => "INIT",
            ProblemStatus::Optimal => "OPTIMAL",
            ProblemStatus::PrimalInfeasible => "PRIMAL_INFEASIBLE",
            ProblemStatus::DualInfeasible => "DUAL_INFEASIBLE",
            ProblemStatus::InfeasibleOrUnbounded => "INFEASIBLE_OR_UNBOUNDED",
            ProblemStatus::Unbounded => "UNBOUNDED",
            ProblemStatus::PrimalFeasible => "PRIMAL_FEASIBLE",
            ProblemStatus::DualFeasible => "DUAL_FEASIBLE",
            ProblemStatus::Abnormal => "ABNORMAL",
            ProblemStatus::Imprecise => "IMPRECISE",
        };
        f.write_str(name)
    }
}

/// Position of a variable with respect to the basis and its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum VariableStatus {
    Basic,
    AtLowerBound,
    AtUpperBound,
    /// Non-basic with `lower == upper`
    FixedValue,
    /// Non-basic with both bounds infinite, value 0
    Free,
}

/// Position of a constraint (i.e. of its slack) with respect to the basis and its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum ConstraintStatus {
    Basic,
    AtLowerBound,
    AtUpperBound,
    FixedValue,
    Free,
}

impl From<VariableStatus> for ConstraintStatus {
    fn from(status: VariableStatus) -> Self {
        match status {
            VariableStatus::Basic => ConstraintStatus::Basic,
            VariableStatus::AtLowerBound => ConstraintStatus::AtLowerBound,
            VariableStatus::AtUpperBound => ConstraintStatus::AtUpperBound,
            VariableStatus::FixedValue => ConstraintStatus::FixedValue,
            VariableStatus::Free => ConstraintStatus::Free,
        }
    }
}

/// A candidate solution of a linear program
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProblemSolution {
    pub status: ProblemStatus,
    /// One value per variable
    pub primal_values: Vec<f64>,
    /// One dual value per constraint
    pub dual_values: Vec<f64>,
    pub variable_statuses: Vec<VariableStatus>,
    pub constraint_statuses: Vec<ConstraintStatus>,
}

impl ProblemSolution {
    /// A solution of the given dimensions filled with defaults.
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        Self {
            status: ProblemStatus::Init,
            primal_values: vec![0.0; num_cols],
            dual_values: vec![0.0; num_rows],
            variable_statuses: vec![VariableStatus::Free; num_cols],
            constraint_statuses: vec![ConstraintStatus::Basic; num_rows],
        }
    }

    pub fn num_variables(&self) -> usize {
        self.primal_values.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.dual_values.len()
    }
}

/// A diagnostic quantity and whether it exceeds its coordinate-scaled tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measure {
    pub value: f64,
    pub too_large: bool,
}

impl Measure {
    /// Folds one coordinate error into the running maximum.
    pub(crate) fn record(&mut self, error: f64, allowed: f64) {
        self.value = self.value.max(error);
        self.too_large |= error > allowed;
    }
}

/// Numerical analysis of the last verified solution
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Analysis {
    /// c.x before moving values within their bounds, without offset
    pub primal_objective: f64,
    /// Duality bound before moving values within their bounds, without offset
    pub dual_objective: f64,
    /// Upper bound on the objective error implied by the feasibility tolerance
    pub max_expected_objective_error: f64,
    /// Largest primal value move done by the bound projection
    pub primal_move: f64,
    /// Largest dual value move done by the bound projection
    pub dual_move: f64,
    pub primal_value_infeasibility: Measure,
    pub activity_infeasibility: Measure,
    pub dual_value_infeasibility: Measure,
    pub reduced_cost_infeasibility: Measure,
    /// Cost perturbation making the primal/dual pair exactly optimal
    pub cost_perturbation: Measure,
    /// Right-hand side perturbation making the primal/dual pair exactly optimal
    pub rhs_perturbation: Measure,
}

impl Analysis {
    pub fn empty() -> Self {
        Self::default()
    }
}
