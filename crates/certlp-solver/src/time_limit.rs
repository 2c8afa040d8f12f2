use std::time::{Duration, Instant};

use crate::parameters::SolverParameters;

/// Cooperative deadline of a solve.
///
/// Combines a wall-clock budget with a deterministic one. Deterministic time only
/// advances when a component reports the work it did, so it is reproducible.
#[derive(Debug, Clone)]
pub struct TimeLimit {
    start: Instant,
    max_time: Option<Duration>,
    max_deterministic_time: Option<f64>,
    elapsed_deterministic_time: f64,
}

impl TimeLimit {
    pub fn new(max_time_in_seconds: Option<f64>, max_deterministic_time: Option<f64>) -> Self {
        let max_time = max_time_in_seconds.map(|seconds| {
            if seconds > 0.0 {
                Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
            } else {
                Duration::ZERO
            }
        });
        Self {
            start: Instant::now(),
            max_time,
            max_deterministic_time,
            elapsed_deterministic_time: 0.0,
        }
    }

    pub fn infinite() -> Self {
        Self::new(None, None)
    }

    pub fn from_parameters(parameters: &SolverParameters) -> Self {
        Self::new(parameters.max_time_in_seconds, parameters.max_deterministic_time)
    }

    pub fn advance_deterministic_time(&mut self, amount: f64) {
        self.elapsed_deterministic_time += amount;
    }

    pub fn elapsed_deterministic_time(&self) -> f64 {
        self.elapsed_deterministic_time
    }

    pub fn is_reached(&self) -> bool {
        if self
            .max_deterministic_time
            .is_some_and(|max| self.elapsed_deterministic_time >= max)
        {
            return true;
        }
        self.max_time.is_some_and(|max| self.start.elapsed() >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_limit_is_never_reached() {
        let mut limit = TimeLimit::infinite();
        limit.advance_deterministic_time(1e12);
        assert!(!limit.is_reached());
    }

    #[test]
    fn test_deterministic_budget() {
        let mut limit = TimeLimit::new(None, Some(1.0));
        assert!(!limit.is_reached());
        limit.advance_deterministic_time(0.6);
        assert!(!limit.is_reached());
        limit.advance_deterministic_time(0.6);
        assert!(limit.is_reached());
        assert_eq!(limit.elapsed_deterministic_time(), 0.6 + 0.6);
    }

    #[test]
    fn test_zero_wall_clock_budget_is_reached_immediately() {
        let limit = TimeLimit::new(Some(0.0), None);
        assert!(limit.is_reached());
    }
}
