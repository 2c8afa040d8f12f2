use thiserror::Error;
use tracing::debug;

use crate::parameters::SolverParameters;
use crate::problem::LinearProgram;
use crate::solution::{ProblemSolution, ProblemStatus, VariableStatus};
use crate::time_limit::TimeLimit;

/// Deterministic time charged per tableau entry touched.
const DETERMINISTIC_TIME_PER_ENTRY: f64 = 1e-9;

/// Consecutive degenerate iterations after which the pricing switches to Bland's rule.
const DEGENERATE_ITERATIONS_BEFORE_BLAND: usize = 50;

/// Smallest magnitude accepted when pivoting artificial variables out of the basis.
const MIN_DRIVE_OUT_PIVOT: f64 = 1e-12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimplexError {
    #[error("{kind} {index} has inverted bounds [{lower}, {upper}]")]
    InvertedBounds {
        kind: &'static str,
        index: usize,
        lower: f64,
        upper: f64,
    },
    #[error("No usable pivot to remove artificial variable of row {row}")]
    SingularBasis { row: usize },
    #[error("Auxiliary problem is unbounded on column {col}")]
    UnboundedAuxiliary { col: usize },
    #[error("Non-finite value for variable {0}")]
    NonFiniteValue(usize),
}

/// Dense bounded-variable primal simplex.
///
/// The problem is written as `A x - s = 0` with `l <= x <= u` and `L <= s <= U`, so that the
/// statuses of the slacks are the statuses of the constraints. A phase one with one artificial
/// variable per infeasible row finds a feasible basis. The last basis is kept and reused by the
/// next solve on a problem of the same dimensions.
#[derive(Debug, Default)]
pub struct Simplex {
    warm_basis: Option<WarmBasis>,
    iterations: u64,
    deterministic_time: f64,
}

/// Basis of the previous solve, restricted to structural and slack variables.
#[derive(Debug, Clone)]
struct WarmBasis {
    num_rows: usize,
    num_cols: usize,
    basic_vars: Vec<usize>,
    at_upper: Vec<bool>,
}

impl WarmBasis {
    fn matches(&self, lp: &LinearProgram) -> bool {
        self.num_rows == lp.num_constraints() && self.num_cols == lp.num_variables()
    }
}

enum PhaseResult {
    Optimal,
    Unbounded { col: usize },
    LimitReached,
}

enum Step {
    /// The entering variable moves to its other bound; the basis is unchanged
    BoundFlip { length: f64 },
    /// The basic variable of `row` leaves at one of its bounds
    Pivot { row: usize, length: f64, to_upper: bool },
    Unbounded,
}

impl Simplex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterations of the last solve.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Deterministic time since the creation of this engine.
    pub fn deterministic_time(&self) -> f64 {
        self.deterministic_time
    }

    /// Solves `lp` and returns a basic solution sized to it.
    ///
    /// When the deadline or the iteration cap stops the search, the status is `Init` during
    /// phase one and `PrimalFeasible` during phase two.
    pub fn solve(
        &mut self,
        lp: &LinearProgram,
        parameters: &SolverParameters,
        time_limit: &mut TimeLimit,
    ) -> Result<ProblemSolution, SimplexError> {
        self.iterations = 0;
        let primal_tolerance = parameters.primal_feasibility_tolerance;

        let mut tableau = Tableau::build(lp, primal_tolerance)?;
        self.charge(tableau.size(), time_limit);

        let mut needs_phase_one = tableau.has_basic_artificial();
        if let Some(warm) = self.warm_basis.take().filter(|w| w.matches(lp)) {
            if tableau.warm_start(&warm, parameters) {
                debug!(rows = lp.num_constraints(), cols = lp.num_variables(), "warm start accepted");
                needs_phase_one = false;
            } else {
                debug!("warm start rejected, starting from the slack basis");
                tableau = Tableau::build(lp, primal_tolerance)?;
            }
            self.charge(tableau.size(), time_limit);
        }

        let status = 'solve: {
            if needs_phase_one {
                tableau.set_phase_one_cost();
                match self.run_phase(&mut tableau, parameters, time_limit) {
                    PhaseResult::Optimal => {}
                    PhaseResult::LimitReached => break 'solve ProblemStatus::Init,
                    PhaseResult::Unbounded { col } => {
                        return Err(SimplexError::UnboundedAuxiliary { col });
                    }
                }
                tableau.recompute_basic_values();
                let infeasibility = tableau.max_artificial_value();
                debug!(infeasibility, iterations = self.iterations, "phase one done");
                if infeasibility > primal_tolerance {
                    break 'solve ProblemStatus::PrimalInfeasible;
                }
            }

            tableau.drive_out_artificials()?;
            tableau.set_phase_two_cost(lp);
            match self.run_phase(&mut tableau, parameters, time_limit) {
                PhaseResult::Optimal => ProblemStatus::Optimal,
                PhaseResult::Unbounded { col } => {
                    debug!(col, "unbounded ray found");
                    ProblemStatus::Unbounded
                }
                PhaseResult::LimitReached => ProblemStatus::PrimalFeasible,
            }
        };

        tableau.recompute_basic_values();
        let solution = tableau.extract_solution(lp, status)?;
        self.warm_basis = tableau.warm_basis();
        debug!(%status, iterations = self.iterations, "simplex done");
        Ok(solution)
    }

    fn charge(&mut self, entries: usize, time_limit: &mut TimeLimit) {
        let work = entries as f64 * DETERMINISTIC_TIME_PER_ENTRY;
        self.deterministic_time += work;
        time_limit.advance_deterministic_time(work);
    }

    fn run_phase(
        &mut self,
        tableau: &mut Tableau,
        parameters: &SolverParameters,
        time_limit: &mut TimeLimit,
    ) -> PhaseResult {
        let mut degenerate_iterations = 0;
        loop {
            if parameters
                .max_number_of_iterations
                .is_some_and(|max| self.iterations >= max)
                || time_limit.is_reached()
            {
                return PhaseResult::LimitReached;
            }

            let reduced_costs = tableau.reduced_costs();
            let bland = degenerate_iterations >= DEGENERATE_ITERATIONS_BEFORE_BLAND;
            let Some((col, direction)) =
                tableau.find_entering(&reduced_costs, parameters.dual_feasibility_tolerance, bland)
            else {
                return PhaseResult::Optimal;
            };

            let length = match tableau.ratio_test(col, direction, parameters.small_pivot_threshold, bland) {
                Step::Unbounded => return PhaseResult::Unbounded { col },
                step => tableau.advance(col, direction, step),
            };

            self.iterations += 1;
            self.charge(tableau.size(), time_limit);
            if length == 0.0 {
                degenerate_iterations += 1;
            } else {
                degenerate_iterations = 0;
            }
        }
    }
}

/// `B^-1 [A | -I | D]` with the values and bounds of every variable.
///
/// Columns are the structural variables, then one slack per row, then one artificial per row.
struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    is_basic: Vec<bool>,
    values: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    cost: Vec<f64>,
    n_vars: usize,
    n_rows: usize,
}

impl Tableau {
    fn build(lp: &LinearProgram, primal_tolerance: f64) -> Result<Self, SimplexError> {
        let n_vars = lp.num_variables();
        let n_rows = lp.num_constraints();
        let total = n_vars + 2 * n_rows;

        let mut lower = Vec::with_capacity(total);
        let mut upper = Vec::with_capacity(total);
        for (index, v) in lp.variables.iter().enumerate() {
            if v.lower > v.upper {
                return Err(SimplexError::InvertedBounds {
                    kind: "variable",
                    index,
                    lower: v.lower,
                    upper: v.upper,
                });
            }
            lower.push(v.lower);
            upper.push(v.upper);
        }
        for (index, c) in lp.constraints.iter().enumerate() {
            if c.lower > c.upper {
                return Err(SimplexError::InvertedBounds {
                    kind: "constraint",
                    index,
                    lower: c.lower,
                    upper: c.upper,
                });
            }
            lower.push(c.lower);
            upper.push(c.upper);
        }
        lower.resize(total, 0.0);
        upper.resize(total, f64::INFINITY);

        let mut values = vec![0.0; total];
        for j in 0..n_vars {
            values[j] = initial_value(lower[j], upper[j]);
        }

        let mut tableau = Tableau {
            data: vec![vec![0.0; total]; n_rows],
            basic_vars: vec![0; n_rows],
            is_basic: vec![false; total],
            values,
            lower,
            upper,
            cost: vec![0.0; total],
            n_vars,
            n_rows,
        };

        for (i, c) in lp.constraints.iter().enumerate() {
            let slack = tableau.slack(i);
            let artificial = tableau.artificial(i);

            let mut activity = 0.0;
            for &(j, coef) in &c.coefficients {
                tableau.data[i][j] = coef;
                activity += coef * tableau.values[j];
            }
            tableau.data[i][slack] = -1.0;

            // The slack starts basic when the row is satisfied, otherwise an artificial
            // variable absorbs the distance to the violated bound.
            let basic_coef = if activity >= c.lower - primal_tolerance && activity <= c.upper + primal_tolerance {
                tableau.data[i][artificial] = 1.0;
                tableau.upper[artificial] = 0.0;
                tableau.values[slack] = activity;
                tableau.basic_vars[i] = slack;
                -1.0
            } else {
                let target = if activity < c.lower { c.lower } else { c.upper };
                let sign = if target >= activity { 1.0 } else { -1.0 };
                tableau.data[i][artificial] = sign;
                tableau.values[slack] = target;
                tableau.values[artificial] = (target - activity).abs();
                tableau.basic_vars[i] = artificial;
                sign
            };
            tableau.is_basic[tableau.basic_vars[i]] = true;
            if basic_coef != 1.0 {
                for value in tableau.data[i].iter_mut() {
                    *value /= basic_coef;
                }
            }
        }

        Ok(tableau)
    }

    fn total(&self) -> usize {
        self.n_vars + 2 * self.n_rows
    }

    fn size(&self) -> usize {
        self.n_rows.max(1) * self.total()
    }

    fn slack(&self, row: usize) -> usize {
        self.n_vars + row
    }

    fn artificial(&self, row: usize) -> usize {
        self.n_vars + self.n_rows + row
    }

    fn is_artificial(&self, k: usize) -> bool {
        k >= self.n_vars + self.n_rows
    }

    fn has_basic_artificial(&self) -> bool {
        self.basic_vars.iter().any(|&k| self.is_artificial(k))
    }

    fn max_artificial_value(&self) -> f64 {
        self.basic_vars
            .iter()
            .filter(|&&k| self.is_artificial(k))
            .map(|&k| self.values[k])
            .fold(0.0, f64::max)
    }

    fn set_phase_one_cost(&mut self) {
        let first_artificial = self.artificial(0);
        for (k, cost) in self.cost.iter_mut().enumerate() {
            *cost = if k >= first_artificial { 1.0 } else { 0.0 };
        }
    }

    fn set_phase_two_cost(&mut self, lp: &LinearProgram) {
        let sign = lp.optimization_sign();
        self.cost.fill(0.0);
        for (j, v) in lp.variables.iter().enumerate() {
            self.cost[j] = sign * v.cost;
        }
    }

    /// Basic values from `B x_B + N x_N = 0`.
    fn recompute_basic_values(&mut self) {
        for i in 0..self.n_rows {
            let mut sum = 0.0;
            for k in 0..self.total() {
                if !self.is_basic[k] {
                    sum += self.data[i][k] * self.values[k];
                }
            }
            self.values[self.basic_vars[i]] = -sum;
        }
    }

    fn reduced_costs(&self) -> Vec<f64> {
        let mut reduced = self.cost.clone();
        for i in 0..self.n_rows {
            let basic_cost = self.cost[self.basic_vars[i]];
            if basic_cost == 0.0 {
                continue;
            }
            for (k, d) in reduced.iter_mut().enumerate() {
                *d -= basic_cost * self.data[i][k];
            }
        }
        for &k in &self.basic_vars {
            reduced[k] = 0.0;
        }
        reduced
    }

    /// Direction in which non-basic `k` improves the objective, if any.
    fn improving_direction(&self, k: usize, reduced_cost: f64, tolerance: f64) -> Option<f64> {
        let value = self.values[k];
        if self.upper[k].is_finite() && value == self.upper[k] {
            (reduced_cost > tolerance).then_some(-1.0)
        } else if self.lower[k].is_finite() && value == self.lower[k] {
            (reduced_cost < -tolerance).then_some(1.0)
        } else if reduced_cost.abs() > tolerance {
            Some(-reduced_cost.signum())
        } else {
            None
        }
    }

    /// Dantzig pricing (largest reduced cost), or Bland's rule (first eligible column).
    fn find_entering(&self, reduced_costs: &[f64], tolerance: f64, bland: bool) -> Option<(usize, f64)> {
        let mut best = None;
        let mut best_score = 0.0;
        for k in 0..self.total() {
            if self.is_basic[k] || self.lower[k] == self.upper[k] {
                continue;
            }
            let Some(direction) = self.improving_direction(k, reduced_costs[k], tolerance) else {
                continue;
            };
            if bland {
                return Some((k, direction));
            }
            let score = reduced_costs[k].abs();
            if score > best_score {
                best_score = score;
                best = Some((k, direction));
            }
        }
        best
    }

    fn ratio_test(&self, col: usize, direction: f64, pivot_threshold: f64, bland: bool) -> Step {
        let value = self.values[col];
        let mut max_length = if direction > 0.0 {
            self.upper[col] - value
        } else {
            value - self.lower[col]
        };
        let mut leaving: Option<(usize, bool)> = None;
        let mut leaving_alpha = 0.0;

        for i in 0..self.n_rows {
            // Rate of change of the basic variable of row i.
            let alpha = -self.data[i][col] * direction;
            if alpha.abs() <= pivot_threshold {
                continue;
            }
            let basic = self.basic_vars[i];
            let x = self.values[basic];
            let (limit, to_upper) = if alpha > 0.0 {
                if self.upper[basic].is_infinite() {
                    continue;
                }
                (((self.upper[basic] - x) / alpha).max(0.0), true)
            } else {
                if self.lower[basic].is_infinite() {
                    continue;
                }
                (((x - self.lower[basic]) / -alpha).max(0.0), false)
            };

            let better = match leaving {
                _ if limit < max_length => true,
                Some((row, _)) if limit == max_length => {
                    if bland {
                        basic < self.basic_vars[row]
                    } else {
                        alpha.abs() > leaving_alpha
                    }
                }
                _ => false,
            };
            if better {
                max_length = limit;
                leaving = Some((i, to_upper));
                leaving_alpha = alpha.abs();
            }
        }

        match leaving {
            Some((row, to_upper)) => Step::Pivot {
                row,
                length: max_length,
                to_upper,
            },
            None if max_length.is_finite() => Step::BoundFlip { length: max_length },
            None => Step::Unbounded,
        }
    }

    /// Moves the entering variable along `direction` and updates the basis. Returns the step length.
    fn advance(&mut self, col: usize, direction: f64, step: Step) -> f64 {
        let length = match step {
            Step::BoundFlip { length } | Step::Pivot { length, .. } => length,
            Step::Unbounded => return 0.0,
        };

        for i in 0..self.n_rows {
            let alpha = -self.data[i][col] * direction;
            self.values[self.basic_vars[i]] += alpha * length;
        }

        match step {
            Step::BoundFlip { .. } => {
                self.values[col] = if direction > 0.0 {
                    self.upper[col]
                } else {
                    self.lower[col]
                };
            }
            Step::Pivot { row, to_upper, .. } => {
                self.values[col] += direction * length;
                let leaving = self.basic_vars[row];
                self.values[leaving] = if to_upper {
                    self.upper[leaving]
                } else {
                    self.lower[leaving]
                };
                self.pivot(row, col);
            }
            Step::Unbounded => {}
        }
        length
    }

    fn pivot(&mut self, row: usize, col: usize) {
        let n_cols = self.total();

        // Update basic variable
        let leaving = self.basic_vars[row];
        self.is_basic[leaving] = false;
        self.is_basic[col] = true;
        self.basic_vars[row] = col;

        // Scale pivot row
        let pivot_val = self.data[row][col];
        for j in 0..n_cols {
            self.data[row][j] /= pivot_val;
        }
        self.data[row][col] = 1.0;

        // Eliminate column in other rows
        for i in 0..self.n_rows {
            if i != row {
                let factor = self.data[i][col];
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n_cols {
                    self.data[i][j] -= factor * self.data[row][j];
                }
                self.data[i][col] = 0.0;
            }
        }
    }

    /// Replaces basic artificial variables (all at zero) by structural or slack ones and fixes
    /// every artificial variable at zero.
    fn drive_out_artificials(&mut self) -> Result<(), SimplexError> {
        let first_artificial = self.artificial(0);
        for row in 0..self.n_rows {
            if !self.is_artificial(self.basic_vars[row]) {
                continue;
            }
            let mut best = None;
            let mut best_abs = MIN_DRIVE_OUT_PIVOT;
            for k in 0..first_artificial {
                let a = self.data[row][k].abs();
                if !self.is_basic[k] && a > best_abs {
                    best_abs = a;
                    best = Some(k);
                }
            }
            let Some(col) = best else {
                return Err(SimplexError::SingularBasis { row });
            };
            self.pivot(row, col);
        }
        for k in first_artificial..self.total() {
            self.lower[k] = 0.0;
            self.upper[k] = 0.0;
            self.values[k] = 0.0;
        }
        self.recompute_basic_values();
        Ok(())
    }

    /// Pivots the previous basis in and keeps it when it is primal feasible.
    fn warm_start(&mut self, warm: &WarmBasis, parameters: &SolverParameters) -> bool {
        let wanted = {
            let mut wanted = vec![false; self.total()];
            for &k in &warm.basic_vars {
                wanted[k] = true;
            }
            wanted
        };

        for &col in &warm.basic_vars {
            if self.is_basic[col] {
                continue;
            }
            let mut best = None;
            let mut best_abs = parameters.small_pivot_threshold;
            for row in 0..self.n_rows {
                let a = self.data[row][col].abs();
                if !wanted[self.basic_vars[row]] && a > best_abs {
                    best_abs = a;
                    best = Some(row);
                }
            }
            match best {
                Some(row) => self.pivot(row, col),
                None => return false,
            }
        }

        for k in 0..self.total() {
            if self.is_basic[k] {
                continue;
            }
            if self.is_artificial(k) {
                self.upper[k] = 0.0;
                self.values[k] = 0.0;
            } else if warm.at_upper[k] && self.upper[k].is_finite() {
                self.values[k] = self.upper[k];
            } else {
                self.values[k] = initial_value(self.lower[k], self.upper[k]);
            }
        }
        self.recompute_basic_values();

        let tolerance = parameters.primal_feasibility_tolerance;
        self.basic_vars.iter().all(|&k| {
            let x = self.values[k];
            if self.is_artificial(k) {
                x.abs() <= tolerance
            } else {
                x >= self.lower[k] - tolerance && x <= self.upper[k] + tolerance
            }
        })
    }

    fn warm_basis(&self) -> Option<WarmBasis> {
        if self.has_basic_artificial() {
            return None;
        }
        let first_artificial = self.artificial(0);
        let at_upper = (0..first_artificial)
            .map(|k| {
                !self.is_basic[k] && self.lower[k] != self.upper[k] && self.values[k] == self.upper[k]
            })
            .collect();
        Some(WarmBasis {
            num_rows: self.n_rows,
            num_cols: self.n_vars,
            basic_vars: self.basic_vars.clone(),
            at_upper,
        })
    }

    fn status_of(&self, k: usize) -> VariableStatus {
        let value = self.values[k];
        if self.is_basic[k] {
            VariableStatus::Basic
        } else if self.lower[k] == self.upper[k] {
            VariableStatus::FixedValue
        } else if value == self.lower[k] {
            VariableStatus::AtLowerBound
        } else if value == self.upper[k] {
            VariableStatus::AtUpperBound
        } else {
            VariableStatus::Free
        }
    }

    fn extract_solution(&self, lp: &LinearProgram, status: ProblemStatus) -> Result<ProblemSolution, SimplexError> {
        let mut solution = ProblemSolution::new(self.n_rows, self.n_vars);
        solution.status = status;

        for j in 0..self.n_vars {
            let value = self.values[j];
            if !value.is_finite() {
                return Err(SimplexError::NonFiniteValue(j));
            }
            solution.primal_values[j] = value;
            solution.variable_statuses[j] = self.status_of(j);
        }

        // The reduced cost of the slack of row i is the dual value of row i.
        let reduced_costs = self.reduced_costs();
        let sign = lp.optimization_sign();
        for i in 0..self.n_rows {
            let slack = self.slack(i);
            solution.constraint_statuses[i] = self.status_of(slack).into();
            solution.dual_values[i] = if self.is_basic[slack] {
                0.0
            } else {
                sign * reduced_costs[slack]
            };
        }
        Ok(solution)
    }
}

/// Starting value of a non-basic variable: its lower bound, else its upper bound, else zero.
fn initial_value(lower: f64, upper: f64) -> f64 {
    if lower.is_finite() {
        lower
    } else if upper.is_finite() {
        upper
    } else {
        0.0
    }
}
