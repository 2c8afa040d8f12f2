/// Compensated summation, so that results do not depend on the magnitude mix of the terms.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct KahanSum {
    sum: f64,
    compensation: f64,
}

impl KahanSum {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, value: f64) {
        let y = value - self.compensation;
        let t = self.sum + y;
        self.compensation = (t - self.sum) - y;
        self.sum = t;
    }

    pub(crate) fn value(&self) -> f64 {
        self.sum
    }
}

/// Error accepted on a quantity of magnitude `value`.
pub(crate) fn allowed_error(tolerance: f64, value: f64) -> f64 {
    tolerance * value.abs().max(1.0)
}

pub(crate) fn are_within_absolute_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    // Covers equal infinities, whose difference is NaN.
    a == b || (a - b).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kahan_sum_recovers_small_terms() {
        let mut sum = KahanSum::new();
        sum.add(1e16);
        for _ in 0..10 {
            sum.add(1.0);
        }
        sum.add(-1e16);
        assert_eq!(sum.value(), 10.0);
    }

    #[test]
    fn test_allowed_error_scales_with_magnitude() {
        assert_eq!(allowed_error(1e-6, 0.5), 1e-6);
        assert_eq!(allowed_error(0.5, -128.0), 64.0);
        assert!((allowed_error(1e-6, -100.0) - 1e-4).abs() < 1e-18);
    }

    #[test]
    fn test_tolerance_comparison_handles_infinity() {
        assert!(are_within_absolute_tolerance(f64::INFINITY, f64::INFINITY, 1e-7));
        assert!(!are_within_absolute_tolerance(1.0, f64::INFINITY, 1e-7));
        assert!(are_within_absolute_tolerance(1.0, 1.0 + 1e-8, 1e-7));
    }
}
