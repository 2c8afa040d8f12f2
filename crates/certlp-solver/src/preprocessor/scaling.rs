use tracing::debug;

use super::Preprocessor;
use crate::problem::{Constraint, LinearProgram};
use crate::solution::ProblemSolution;
use crate::time_limit::TimeLimit;

/// Multiplies each row by a power of two so that its largest coefficient has a magnitude close to 1.
///
/// Powers of two keep the scaling exact in binary floating point.
#[derive(Debug, Default)]
pub struct RowScalingPreprocessor {
    factors: Vec<f64>,
}

impl RowScalingPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Factor of a row, or 1 when scaling it would not be exact.
fn power_of_two_factor(constraint: &Constraint) -> f64 {
    let max = constraint
        .coefficients
        .iter()
        .map(|&(_, coef)| coef.abs())
        .fold(0.0, f64::max);
    if max == 0.0 {
        return 1.0;
    }
    let exponent = max.log2().round() as i32;
    let factor = 2f64.powi(-exponent);
    if !factor.is_normal() {
        return 1.0;
    }

    // Overflow, or underflow into the subnormal range, would change the row.
    let scales_exactly = |value: f64| {
        let scaled = value * factor;
        scaled.is_finite() && scaled / factor == value
    };
    let bounds = [constraint.lower, constraint.upper];
    let exact = constraint.coefficients.iter().all(|&(_, coef)| scales_exactly(coef))
        && bounds.iter().filter(|b| b.is_finite()).all(|&b| scales_exactly(b));
    if exact { factor } else { 1.0 }
}

impl Preprocessor for RowScalingPreprocessor {
    fn name(&self) -> &'static str {
        "row-scaling"
    }

    fn apply(&mut self, lp: &mut LinearProgram, time_limit: &TimeLimit) -> bool {
        if time_limit.is_reached() {
            return false;
        }

        let factors: Vec<f64> = lp
            .constraints
            .iter()
            .map(power_of_two_factor)
            .collect();
        let scaled = factors.iter().filter(|&&f| f != 1.0).count();
        if scaled == 0 {
            return false;
        }

        for (constraint, &factor) in lp.constraints.iter_mut().zip(&factors) {
            if factor == 1.0 {
                continue;
            }
            for (_, coef) in &mut constraint.coefficients {
                *coef *= factor;
            }
            constraint.lower *= factor;
            constraint.upper *= factor;
        }
        debug!(preprocessor = self.name(), scaled, "scaled rows");
        self.factors = factors;
        true
    }

    fn recover(&self, solution: &mut ProblemSolution) {
        for (dual, &factor) in solution.dual_values.iter_mut().zip(&self.factors) {
            *dual *= factor;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_scaled_by_powers_of_two() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, 1.0, 1.0);
        lp.add_variable("y", 0.0, 1.0, 1.0);
        lp.add_constraint("big", 0.0, 64.0, vec![(0, 16.0), (1, -3.0)]);
        lp.add_constraint("unit", f64::NEG_INFINITY, 1.0, vec![(0, 1.0)]);
        lp.add_constraint("small", 0.25, 0.25, vec![(1, 0.125)]);

        let mut preprocessor = RowScalingPreprocessor::new();
        assert!(preprocessor.apply(&mut lp, &TimeLimit::infinite()));

        assert_eq!(lp.constraints[0].coefficients, vec![(0, 1.0), (1, -0.1875)]);
        assert_eq!((lp.constraints[0].lower, lp.constraints[0].upper), (0.0, 4.0));
        assert_eq!(lp.constraints[1].upper, 1.0);
        assert_eq!(lp.constraints[1].lower, f64::NEG_INFINITY);
        assert_eq!(lp.constraints[2].coefficients, vec![(1, 1.0)]);
        assert_eq!(lp.constraints[2].upper, 2.0);

        let mut solution = ProblemSolution::new(3, 2);
        solution.dual_values = vec![1.0, 1.0, 1.0];
        preprocessor.recover(&mut solution);
        assert_eq!(solution.dual_values, vec![0.0625, 1.0, 8.0]);
    }

    #[test]
    fn test_unit_rows_are_left_alone() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, 1.0, 1.0);
        lp.add_constraint("c", 0.0, 1.0, vec![(0, 1.2)]);

        let mut preprocessor = RowScalingPreprocessor::new();
        assert!(!preprocessor.apply(&mut lp, &TimeLimit::infinite()));
        assert_eq!(lp.constraints[0].coefficients, vec![(0, 1.2)]);
    }

    #[test]
    fn test_rows_that_cannot_be_scaled_exactly_are_left_alone() {
        let mut lp = LinearProgram::new();
        lp.add_variable("x", 0.0, f64::INFINITY, 1.0);
        lp.add_variable("y", 0.0, f64::INFINITY, 1.0);
        // The factor for subnormal coefficients overflows.
        lp.add_constraint("tiny", 1e-310, f64::INFINITY, vec![(0, 1e-310), (1, 1e-310)]);
        // The factor is fine but the bound would overflow.
        lp.add_constraint("wide", f64::NEG_INFINITY, 1e308, vec![(0, 1e-300)]);

        let mut preprocessor = RowScalingPreprocessor::new();
        assert!(!preprocessor.apply(&mut lp, &TimeLimit::infinite()));
        assert_eq!(lp.constraints[0].coefficients, vec![(0, 1e-310), (1, 1e-310)]);
        assert_eq!(lp.constraints[0].lower, 1e-310);
        assert_eq!(lp.constraints[1].upper, 1e308);
    }
}
