//! Recorder responses and sensitivity parameter handles.
//!
//! Response ids and parameter ids are small integers that external recorders and
//! sensitivity drivers hold on to, so their numeric meaning per type is fixed.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Value returned by a `get_response` query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Scalar(f64),
    Vector(DVector<f64>),
    Matrix(DMatrix<f64>),
}

impl Response {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Response::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&DVector<f64>> {
        match self {
            Response::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&DMatrix<f64>> {
        match self {
            Response::Matrix(m) => Some(m),
            _ => None,
        }
    }
}

/// Handle returned by `set_parameter`, stable for the lifetime of the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterId(pub i32);

/// Look `name` up in a `(names, id)` table.
pub(crate) fn lookup_parameter(table: &[(&[&str], i32)], name: &str) -> Option<ParameterId> {
    table
        .iter()
        .find(|(names, _)| names.contains(&name))
        .map(|(_, id)| ParameterId(*id))
}
