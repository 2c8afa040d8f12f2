/// Parameters shared by the preprocessors, the simplex and the solution verification.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverParameters {
    /// Bound violation accepted on primal values inside the simplex and the preprocessors
    pub primal_feasibility_tolerance: f64,
    /// Reduced cost magnitude below which a column is not considered improving
    pub dual_feasibility_tolerance: f64,
    /// Tolerance of the final solution checks. Errors are scaled by `max(1, |coordinate|)`.
    pub solution_feasibility_tolerance: f64,
    /// Smallest pivot magnitude accepted by the ratio test
    pub small_pivot_threshold: f64,
    /// Move the primal and dual values within their bounds before verification, so that
    /// complementary slackness holds exactly for the reported values
    pub provide_strong_optimal_guarantee: bool,
    pub use_preprocessing: bool,
    pub use_scaling: bool,
    /// Simplex iteration cap per solve
    pub max_number_of_iterations: Option<u64>,
    /// Wall-clock deadline of a solve
    pub max_time_in_seconds: Option<f64>,
    /// Deterministic work budget of a solve
    pub max_deterministic_time: Option<f64>,
}

impl Default for SolverParameters {
    fn default() -> Self {
        Self {
            primal_feasibility_tolerance: 1e-8,
            dual_feasibility_tolerance: 1e-8,
            solution_feasibility_tolerance: 1e-6,
            small_pivot_threshold: 1e-9,
            provide_strong_optimal_guarantee: true,
            use_preprocessing: true,
            use_scaling: true,
            max_number_of_iterations: None,
            max_time_in_seconds: None,
            max_deterministic_time: None,
        }
    }
}

impl SolverParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primal_feasibility_tolerance(mut self, tol: f64) -> Self {
        self.primal_feasibility_tolerance = tol;
        self
    }

    pub fn with_dual_feasibility_tolerance(mut self, tol: f64) -> Self {
        self.dual_feasibility_tolerance = tol;
        self
    }

    pub fn with_solution_feasibility_tolerance(mut self, tol: f64) -> Self {
        self.solution_feasibility_tolerance = tol;
        self
    }

    pub fn with_strong_optimal_guarantee(mut self, enabled: bool) -> Self {
        self.provide_strong_optimal_guarantee = enabled;
        self
    }

    pub fn with_preprocessing(mut self, enabled: bool) -> Self {
        self.use_preprocessing = enabled;
        self
    }

    pub fn with_scaling(mut self, enabled: bool) -> Self {
        self.use_scaling = enabled;
        self
    }

    pub fn with_max_iterations(mut self, max: u64) -> Self {
        self.max_number_of_iterations = Some(max);
        self
    }

    pub fn with_max_time_in_seconds(mut self, seconds: f64) -> Self {
        self.max_time_in_seconds = Some(seconds);
        self
    }

    pub fn with_max_deterministic_time(mut self, limit: f64) -> Self {
        self.max_deterministic_time = Some(limit);
        self
    }
}
