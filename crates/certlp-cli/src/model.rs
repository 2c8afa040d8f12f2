//! JSON problem files.

use std::collections::{BTreeMap, HashMap};

use certlp_solver::{ConstraintOp, LinearProgram};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Variable '{0}' is defined more than once")]
    DuplicateVariable(String),
    #[error("Constraint '{constraint}' references unknown variable '{variable}'")]
    UnknownVariable { constraint: String, variable: String },
    #[error("Constraint '{constraint}' has unknown operator '{op}' (expected <=, >= or =)")]
    UnknownOperator { constraint: String, op: String },
    #[error("Constraint '{0}' has an operator but no rhs")]
    MissingRhs(String),
    #[error("Constraint '{0}' mixes op/rhs with lower/upper")]
    ConflictingBounds(String),
}

fn zero() -> Option<f64> {
    Some(0.0)
}

/// A linear program as written in a problem file.
///
/// Missing bounds are infinite, except the lower bound of a variable which defaults to zero. An
/// explicit `null` makes any bound infinite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemFile {
    #[serde(default)]
    pub maximize: bool,
    #[serde(default)]
    pub objective_offset: f64,
    #[serde(default = "one")]
    pub objective_scaling_factor: f64,
    pub variables: Vec<VariableDef>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDef>,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    #[serde(default = "zero")]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
    #[serde(default)]
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintDef {
    pub name: String,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
    /// Shorthand for a one-sided or equality row, with `rhs`
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub rhs: Option<f64>,
    pub terms: BTreeMap<String, f64>,
}

impl ProblemFile {
    pub fn from_json(source: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Builds the linear program, resolving variable names to columns.
    pub fn to_linear_program(&self) -> Result<LinearProgram, ModelError> {
        let mut lp = LinearProgram::new();
        lp.set_maximization(self.maximize);
        lp.set_objective_offset(self.objective_offset);
        lp.set_objective_scaling_factor(self.objective_scaling_factor);

        let mut columns = HashMap::new();
        for v in &self.variables {
            let lower = v.lower.unwrap_or(f64::NEG_INFINITY);
            let upper = v.upper.unwrap_or(f64::INFINITY);
            let col = lp.add_variable(v.name.clone(), lower, upper, v.cost);
            if columns.insert(v.name.as_str(), col).is_some() {
                return Err(ModelError::DuplicateVariable(v.name.clone()));
            }
        }

        for c in &self.constraints {
            let (lower, upper) = c.bounds()?;
            let mut coefficients = Vec::with_capacity(c.terms.len());
            for (name, &coef) in &c.terms {
                let col = columns.get(name.as_str()).ok_or_else(|| ModelError::UnknownVariable {
                    constraint: c.name.clone(),
                    variable: name.clone(),
                })?;
                coefficients.push((*col, coef));
            }
            lp.add_constraint(c.name.clone(), lower, upper, coefficients);
        }
        Ok(lp)
    }
}

impl ConstraintDef {
    fn bounds(&self) -> Result<(f64, f64), ModelError> {
        let Some(op) = &self.op else {
            return Ok((
                self.lower.unwrap_or(f64::NEG_INFINITY),
                self.upper.unwrap_or(f64::INFINITY),
            ));
        };
        if self.lower.is_some() || self.upper.is_some() {
            return Err(ModelError::ConflictingBounds(self.name.clone()));
        }
        let op = match op.as_str() {
            "<=" => ConstraintOp::Le,
            ">=" => ConstraintOp::Ge,
            "=" | "==" => ConstraintOp::Eq,
            other => {
                return Err(ModelError::UnknownOperator {
                    constraint: self.name.clone(),
                    op: other.to_string(),
                });
            }
        };
        let rhs = self.rhs.ok_or_else(|| ModelError::MissingRhs(self.name.clone()))?;
        Ok(op.bounds(rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIET: &str = r#"{
        "variables": [
            { "name": "x", "cost": 2.0 },
            { "name": "y", "upper": 3.0, "cost": 3.0 },
            { "name": "z", "lower": null, "cost": 0.0 }
        ],
        "constraints": [
            { "name": "sum", "op": ">=", "rhs": 4.0, "terms": { "y": 1.0, "x": 1.0 } },
            { "name": "range", "lower": -1.0, "upper": 1.0, "terms": { "z": 1.0 } }
        ]
    }"#;

    #[test]
    fn test_parse_problem_file() {
        let lp = ProblemFile::from_json(DIET).unwrap().to_linear_program().unwrap();

        assert_eq!(lp.num_variables(), 3);
        assert_eq!((lp.variables[0].lower, lp.variables[0].upper), (0.0, f64::INFINITY));
        assert_eq!(lp.variables[1].upper, 3.0);
        assert_eq!(lp.variables[2].lower, f64::NEG_INFINITY);
        assert_eq!(lp.constraints[0].coefficients, vec![(0, 1.0), (1, 1.0)]);
        assert_eq!((lp.constraints[0].lower, lp.constraints[0].upper), (4.0, f64::INFINITY));
        assert_eq!((lp.constraints[1].lower, lp.constraints[1].upper), (-1.0, 1.0));
        assert!(!lp.maximize);
        assert_eq!(lp.objective_scaling_factor, 1.0);
    }

    #[test]
    fn test_unknown_variable() {
        let source = r#"{
            "variables": [{ "name": "x", "cost": 1.0 }],
            "constraints": [{ "name": "c", "op": "<=", "rhs": 1.0, "terms": { "w": 1.0 } }]
        }"#;
        let err = ProblemFile::from_json(source).unwrap().to_linear_program().unwrap_err();
        assert!(matches!(err, ModelError::UnknownVariable { .. }));
        assert_eq!(err.to_string(), "Constraint 'c' references unknown variable 'w'");
    }

    #[test]
    fn test_operator_errors() {
        let source = r#"{
            "variables": [{ "name": "x" }],
            "constraints": [{ "name": "c", "op": "<", "rhs": 1.0, "terms": { "x": 1.0 } }]
        }"#;
        let err = ProblemFile::from_json(source).unwrap().to_linear_program().unwrap_err();
        assert!(matches!(err, ModelError::UnknownOperator { .. }));

        let source = r#"{
            "variables": [{ "name": "x" }],
            "constraints": [{ "name": "c", "op": "=", "terms": { "x": 1.0 } }]
        }"#;
        let err = ProblemFile::from_json(source).unwrap().to_linear_program().unwrap_err();
        assert!(matches!(err, ModelError::MissingRhs(_)));
    }

    #[test]
    fn test_duplicate_variable() {
        let source = r#"{ "variables": [{ "name": "x" }, { "name": "x" }] }"#;
        let err = ProblemFile::from_json(source).unwrap().to_linear_program().unwrap_err();
        assert!(matches!(err, ModelError::DuplicateVariable(_)));
    }

    #[test]
    fn test_sample_file_solves() {
        let source = include_str!("../../../samples/blend.json");
        let lp = ProblemFile::from_json(source).unwrap().to_linear_program().unwrap();
        assert_eq!(lp.num_variables(), 4);
        assert_eq!(lp.num_constraints(), 4);
        assert_eq!(lp.num_entries(), 15);

        let mut solver = certlp_solver::LpSolver::new();
        assert_eq!(solver.solve(&lp), certlp_solver::ProblemStatus::Optimal);
        assert!((solver.constraint_activities()[0] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(ProblemFile::from_json("{"), Err(ModelError::Json(_))));
    }
}
