use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Constraint {row} references unknown variable {col}")]
    UnknownVariable { row: usize, col: usize },
    #[error("Constraint {row} has a non-finite coefficient for variable {col}")]
    NonFiniteCoefficient { row: usize, col: usize },
    #[error("Constraint {row} lists variable {col} more than once or out of order")]
    UnsortedEntries { row: usize, col: usize },
    #[error("Invalid bounds on {kind} {index}: [{lower}, {upper}]")]
    InvalidBound {
        kind: &'static str,
        index: usize,
        lower: f64,
        upper: f64,
    },
    #[error("Non-finite objective coefficient for variable {0}")]
    NonFiniteCost(usize),
    #[error("Objective offset and scaling factor must be finite")]
    NonFiniteObjectiveTransform,
}

/// A linear program in bounded form:
///
/// ```text
/// minimize (or maximize)  c.x
/// subject to              L <= A x <= U
///                         l <=  x  <= u
/// ```
///
/// Infinite bounds are represented by `f64::INFINITY` and `f64::NEG_INFINITY`.
/// The reported objective is `objective_scaling_factor * (c.x + objective_offset)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    /// Columns of the problem
    pub variables: Vec<Variable>,
    /// Rows of the problem
    pub constraints: Vec<Constraint>,
    /// Whether to maximize instead of minimize
    pub maximize: bool,
    /// Constant added to c.x before scaling
    pub objective_offset: f64,
    /// Factor applied to the objective when it is reported
    pub objective_scaling_factor: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Name/label for the variable (for diagnostics)
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    /// Objective coefficient
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    /// Sparse row as `(variable, coefficient)` pairs, sorted by variable, without zeros
    pub coefficients: Vec<(usize, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl ConstraintOp {
    /// Range on the left-hand side expressed by `lhs op rhs`.
    pub fn bounds(self, rhs: f64) -> (f64, f64) {
        match self {
            ConstraintOp::Le => (f64::NEG_INFINITY, rhs),
            ConstraintOp::Ge => (rhs, f64::INFINITY),
            ConstraintOp::Eq => (rhs, rhs),
        }
    }
}

impl Default for LinearProgram {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            constraints: Vec::new(),
            maximize: false,
            objective_offset: 0.0,
            objective_scaling_factor: 1.0,
        }
    }
}

impl LinearProgram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column and returns its index.
    pub fn add_variable(&mut self, name: impl Into<String>, lower: f64, upper: f64, cost: f64) -> usize {
        self.variables.push(Variable {
            name: name.into(),
            lower,
            upper,
            cost,
        });
        self.variables.len() - 1
    }

    /// Adds a row `lower <= sum(coef * x) <= upper` and returns its index.
    ///
    /// Entries are sorted by variable, duplicates are summed and zeros dropped.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        lower: f64,
        upper: f64,
        mut coefficients: Vec<(usize, f64)>,
    ) -> usize {
        coefficients.sort_by_key(|&(col, _)| col);
        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(coefficients.len());
        for (col, coef) in coefficients {
            match merged.last_mut() {
                Some((last, value)) if *last == col => *value += coef,
                _ => merged.push((col, coef)),
            }
        }
        merged.retain(|&(_, coef)| coef != 0.0);

        self.constraints.push(Constraint {
            name: name.into(),
            lower,
            upper,
            coefficients: merged,
        });
        self.constraints.len() - 1
    }

    /// Adds a row from dense coefficients and a comparison operator.
    pub fn add_constraint_op(
        &mut self,
        name: impl Into<String>,
        coefficients: &[f64],
        op: ConstraintOp,
        rhs: f64,
    ) -> usize {
        let (lower, upper) = op.bounds(rhs);
        let sparse = coefficients
            .iter()
            .enumerate()
            .filter(|&(_, &coef)| coef != 0.0)
            .map(|(col, &coef)| (col, coef))
            .collect();
        self.add_constraint(name, lower, upper, sparse)
    }

    pub fn set_objective_coefficient(&mut self, col: usize, cost: f64) {
        self.variables[col].cost = cost;
    }

    pub fn set_maximization(&mut self, maximize: bool) {
        self.maximize = maximize;
    }

    pub fn set_objective_offset(&mut self, offset: f64) {
        self.objective_offset = offset;
    }

    pub fn set_objective_scaling_factor(&mut self, factor: f64) {
        self.objective_scaling_factor = factor;
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Number of non-zero coefficients.
    pub fn num_entries(&self) -> usize {
        self.constraints.iter().map(|c| c.coefficients.len()).sum()
    }

    /// -1 for maximization problems, 1 otherwise.
    pub fn optimization_sign(&self) -> f64 {
        if self.maximize { -1.0 } else { 1.0 }
    }

    pub fn apply_objective_scaling_and_offset(&self, value: f64) -> f64 {
        self.objective_scaling_factor * (value + self.objective_offset)
    }

    /// Column-wise view of the coefficients, each column listing `(row, coefficient)` by row.
    pub fn column_entries(&self) -> Vec<Vec<(usize, f64)>> {
        let mut columns = vec![Vec::new(); self.num_variables()];
        for (row, constraint) in self.constraints.iter().enumerate() {
            for &(col, coef) in &constraint.coefficients {
                columns[col].push((row, coef));
            }
        }
        columns
    }

    /// True when some variable or constraint has `lower > upper`.
    pub fn has_inverted_bounds(&self) -> bool {
        self.variables.iter().any(|v| v.lower > v.upper)
            || self.constraints.iter().any(|c| c.lower > c.upper)
    }

    /// Removes the columns flagged in `deleted` and renumbers the remaining ones.
    pub fn delete_columns(&mut self, deleted: &[bool]) {
        debug_assert_eq!(deleted.len(), self.num_variables());
        let mut new_index = vec![None; deleted.len()];
        let mut next = 0;
        for (col, &is_deleted) in deleted.iter().enumerate() {
            if !is_deleted {
                new_index[col] = Some(next);
                next += 1;
            }
        }

        let mut col = 0;
        self.variables.retain(|_| {
            let keep = !deleted[col];
            col += 1;
            keep
        });
        for constraint in &mut self.constraints {
            constraint.coefficients = constraint
                .coefficients
                .iter()
                .filter_map(|&(col, coef)| new_index[col].map(|c| (c, coef)))
                .collect();
        }
    }

    /// Removes the rows flagged in `deleted`.
    pub fn delete_rows(&mut self, deleted: &[bool]) {
        debug_assert_eq!(deleted.len(), self.num_constraints());
        let mut row = 0;
        self.constraints.retain(|_| {
            let keep = !deleted[row];
            row += 1;
            keep
        });
    }

    /// Checks that the problem is well formed.
    ///
    /// Bounds with `lower > upper` are accepted here: they describe a problem that is
    /// infeasible by construction and are reported by the solution verification instead.
    pub fn validate(&self) -> Result<(), ProblemError> {
        if !self.objective_offset.is_finite() || !self.objective_scaling_factor.is_finite() {
            return Err(ProblemError::NonFiniteObjectiveTransform);
        }
        for (index, v) in self.variables.iter().enumerate() {
            if !v.cost.is_finite() {
                return Err(ProblemError::NonFiniteCost(index));
            }
            check_bounds("variable", index, v.lower, v.upper)?;
        }
        let n = self.num_variables();
        for (row, c) in self.constraints.iter().enumerate() {
            check_bounds("constraint", row, c.lower, c.upper)?;
            let mut previous = None;
            for &(col, coef) in &c.coefficients {
                if col >= n {
                    return Err(ProblemError::UnknownVariable { row, col });
                }
                if !coef.is_finite() {
                    return Err(ProblemError::NonFiniteCoefficient { row, col });
                }
                if previous.is_some_and(|p| p >= col) {
                    return Err(ProblemError::UnsortedEntries { row, col });
                }
                previous = Some(col);
            }
        }
        Ok(())
    }
}

fn check_bounds(kind: &'static str, index: usize, lower: f64, upper: f64) -> Result<(), ProblemError> {
    if lower.is_nan() || upper.is_nan() || lower == f64::INFINITY || upper == f64::NEG_INFINITY {
        return Err(ProblemError::InvalidBound {
            kind,
            index,
            lower,
            upper,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_constraint_normalizes_entries() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, f64::INFINITY, 1.0);
        lp.add_variable("y", 0.0, f64::INFINITY, 1.0);
        lp.add_constraint("c", 1.0, 2.0, vec![(1, 2.0), (0, 1.0), (1, -2.0), (0, 0.5)]);

        assert_eq!(lp.constraints[0].coefficients, vec![(0, 1.5)]);
        assert_eq!(lp.num_entries(), 1);
        assert!(lp.validate().is_ok());
    }

    #[test]
    fn test_constraint_op_bounds() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, f64::INFINITY, 1.0);
        lp.add_constraint_op("le", &[1.0], ConstraintOp::Le, 4.0);
        lp.add_constraint_op("ge", &[1.0], ConstraintOp::Ge, 1.0);
        lp.add_constraint_op("eq", &[0.0], ConstraintOp::Eq, 0.0);

        assert_eq!((lp.constraints[0].lower, lp.constraints[0].upper), (f64::NEG_INFINITY, 4.0));
        assert_eq!((lp.constraints[1].lower, lp.constraints[1].upper), (1.0, f64::INFINITY));
        assert!(lp.constraints[2].coefficients.is_empty());
    }

    #[test]
    fn test_delete_columns_renumbers_rows() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, 1.0, 1.0);
        lp.add_variable("y", 0.0, 1.0, 2.0);
        lp.add_variable("z", 0.0, 1.0, 3.0);
        lp.add_constraint("c", 0.0, 1.0, vec![(0, 1.0), (1, 2.0), (2, 3.0)]);

        lp.delete_columns(&[false, true, false]);

        assert_eq!(lp.num_variables(), 2);
        assert_eq!(lp.variables[1].name, "z");
        assert_eq!(lp.constraints[0].coefficients, vec![(0, 1.0), (1, 3.0)]);
    }

    #[test]
    fn test_column_entries_follow_row_order() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, 1.0, 1.0);
        lp.add_variable("y", 0.0, 1.0, 1.0);
        lp.add_constraint("a", 0.0, 1.0, vec![(0, 1.0), (1, 2.0)]);
        lp.add_constraint("b", 0.0, 1.0, vec![(1, 3.0)]);

        let columns = lp.column_entries();
        assert_eq!(columns[0], vec![(0, 1.0)]);
        assert_eq!(columns[1], vec![(0, 2.0), (1, 3.0)]);
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", f64::INFINITY, f64::INFINITY, 1.0);
        assert!(matches!(lp.validate(), Err(ProblemError::InvalidBound { index: 0, .. })));

        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, 1.0, 1.0);
        lp.constraints.push(Constraint {
            name: "c".to_string(),
            lower: 0.0,
            upper: 1.0,
            coefficients: vec![(3, 1.0)],
        });
        assert_eq!(lp.validate(), Err(ProblemError::UnknownVariable { row: 0, col: 3 }));
    }

    #[test]
    fn test_inverted_bounds_are_structurally_valid() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 5.0, 3.0, 1.0);
        assert!(lp.validate().is_ok());
        assert!(lp.has_inverted_bounds());
    }
}
