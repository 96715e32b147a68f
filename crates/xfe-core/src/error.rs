//! Error types for xfe-core

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeError>;

/// Outcome of a state update that may carry a non-fatal convergence diagnostic.
pub type StepResult = Result<Option<ConvergenceWarning>>;

#[derive(Error, Debug)]
pub enum FeError {
    /// The element/material definition cannot be used; reject it and keep going.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("dimension mismatch in {op}: expected {expected}, found {found}")]
    DimensionMismatch {
        op: &'static str,
        expected: String,
        found: String,
    },

    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    #[error("unsupported material type: {0}")]
    UnsupportedMaterialType(String),

    /// State machine misuse, e.g. querying an element before `update()`.
    #[error("state error: {0}")]
    State(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("unknown response id: {0}")]
    UnknownResponse(i32),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FeError {
    /// Shorthand for a dimension mismatch between two shapes.
    pub fn dims(op: &'static str, expected: (usize, usize), found: (usize, usize)) -> Self {
        FeError::DimensionMismatch {
            op,
            expected: format!("{}x{}", expected.0, expected.1),
            found: format!("{}x{}", found.0, found.1),
        }
    }

    /// Shorthand for a length mismatch between two vectors.
    pub fn len(op: &'static str, expected: usize, found: usize) -> Self {
        FeError::DimensionMismatch {
            op,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// A local iteration that hit its cap; the attached result is the last iterate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    pub context: String,
    pub iterations: usize,
    pub residual: f64,
    pub tolerance: f64,
}

impl ConvergenceWarning {
    pub fn new(context: impl Into<String>, iterations: usize, residual: f64, tolerance: f64) -> Self {
        Self {
            context: context.into(),
            iterations,
            residual,
            tolerance,
        }
    }

    /// Keep the first warning of a sequence of sub-steps.
    pub fn merge(first: Option<Self>, second: Option<Self>) -> Option<Self> {
        first.or(second)
    }
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: no convergence after {} iterations (|residual| = {:.3e}, tolerance = {:.3e})",
            self.context, self.iterations, self.residual, self.tolerance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_mismatch_message() {
        let err = FeError::dims("mat_mul", (3, 3), (2, 3));
        assert_eq!(
            err.to_string(),
            "dimension mismatch in mat_mul: expected 3x3, found 2x3"
        );
    }

    #[test]
    fn merge_keeps_first_warning() {
        let a = ConvergenceWarning::new("a", 25, 1.0, 1e-8);
        let b = ConvergenceWarning::new("b", 25, 2.0, 1e-8);
        let merged = ConvergenceWarning::merge(Some(a.clone()), Some(b.clone()));
        assert_eq!(merged, Some(a));
        assert_eq!(ConvergenceWarning::merge(None, Some(b.clone())), Some(b));
    }
}
