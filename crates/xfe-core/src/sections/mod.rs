//! Section force-deformation relationships.
//!
//! A section maps generalized deformations (axial strain, curvatures, shell
//! membrane strains...) to stress resultants. The meaning of each entry is
//! given by [`SectionForceDeformation::response_type`].
//!
//! - [`FiberSection`]: fiber aggregation for beam-columns (2D, 3D, 3D + GJ)
//! - [`ElasticMembranePlateSection`]: linear elastic shell section

use crate::error::{FeError, Result, StepResult};
use crate::numeric::invert;
use crate::response::{ParameterId, Response};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

pub mod fiber;
pub mod membrane_plate;

pub use fiber::{Fiber, FiberSection, FiberSectionKind, FiberSet, SectionKr};
pub use membrane_plate::ElasticMembranePlateSection;

/// Meaning of one entry of a section deformation/force vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ResponseCode {
    Mz = 1,
    P = 2,
    Vy = 3,
    My = 4,
    Vz = 5,
    T = 6,
    N1 = 11,
    N2 = 12,
    N12 = 13,
    M1 = 14,
    M2 = 15,
    M12 = 16,
    Q13 = 17,
    Q23 = 18,
}

impl ResponseCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Recorder name of the resultant, e.g. `"Mz"` or `"n12"`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "P" | "N" => ResponseCode::P,
            "Mz" => ResponseCode::Mz,
            "My" => ResponseCode::My,
            "Vy" => ResponseCode::Vy,
            "Vz" => ResponseCode::Vz,
            "T" | "Mx" => ResponseCode::T,
            "n1" => ResponseCode::N1,
            "n2" => ResponseCode::N2,
            "n12" => ResponseCode::N12,
            "m1" => ResponseCode::M1,
            "m2" => ResponseCode::M2,
            "m12" => ResponseCode::M12,
            "q13" => ResponseCode::Q13,
            "q23" => ResponseCode::Q23,
            _ => return None,
        })
    }
}

/// Shell section layout: n11 n22 n12 m11 m22 m12 q13 q23.
pub const SHELL_RESPONSE: [ResponseCode; 8] = [
    ResponseCode::N1,
    ResponseCode::N2,
    ResponseCode::N12,
    ResponseCode::M1,
    ResponseCode::M2,
    ResponseCode::M12,
    ResponseCode::Q13,
    ResponseCode::Q23,
];

/// Generalized stress-strain law of a cross section.
pub trait SectionForceDeformation {
    fn order(&self) -> usize {
        self.response_type().len()
    }

    fn response_type(&self) -> &[ResponseCode];

    fn set_trial_section_deformation(&mut self, deformation: &DVector<f64>) -> StepResult;

    fn section_deformation(&self) -> DVector<f64>;
    fn stress_resultant(&self) -> DVector<f64>;
    fn section_tangent(&self) -> DMatrix<f64>;
    fn initial_tangent(&self) -> DMatrix<f64>;

    fn section_flexibility(&self) -> Result<DMatrix<f64>> {
        invert(&self.section_tangent())
    }

    fn initial_flexibility(&self) -> Result<DMatrix<f64>> {
        invert(&self.initial_tangent())
    }

    fn set_initial_section_deformation(&mut self, _deformation: &DVector<f64>) -> Result<()> {
        Err(FeError::Configuration(format!(
            "{} does not support initial deformations",
            self.type_name()
        )))
    }

    fn initial_section_deformation(&self) -> DVector<f64> {
        DVector::zeros(self.order())
    }

    /// Mass per unit length (beams) or area (shells).
    fn rho(&self) -> f64 {
        0.0
    }

    fn commit_state(&mut self) -> Result<()>;
    fn revert_to_last_commit(&mut self) -> Result<()>;
    fn revert_to_start(&mut self) -> Result<()>;

    fn type_name(&self) -> &'static str;

    /// Sum of the resultants tagged `code`.
    fn stress_resultant_for(&self, code: ResponseCode) -> f64 {
        let s = self.stress_resultant();
        self.response_type()
            .iter()
            .zip(s.iter())
            .filter(|(c, _)| **c == code)
            .map(|(_, v)| *v)
            .sum()
    }

    /// Sum of the deformations tagged `code`.
    fn section_deformation_for(&self, code: ResponseCode) -> f64 {
        let e = self.section_deformation();
        self.response_type()
            .iter()
            .zip(e.iter())
            .filter(|(c, _)| **c == code)
            .map(|(_, v)| *v)
            .sum()
    }

    fn set_parameter(&self, _name: &str) -> Option<ParameterId> {
        None
    }

    fn update_parameter(&mut self, id: ParameterId, _value: f64) -> Result<()> {
        Err(FeError::UnknownParameter(format!(
            "{} has no parameter {}",
            self.type_name(),
            id.0
        )))
    }

    fn response_id(&self, name: &str) -> Option<i32> {
        match name {
            "deformations" | "deformation" => Some(1),
            "forces" | "force" => Some(2),
            "stiff" | "stiffness" => Some(3),
            "forceAndDeformation" => Some(4),
            _ => None,
        }
    }

    /// 1 deformations, 2 forces, 3 stiffness, 4 deformations followed by forces.
    fn get_response(&self, id: i32) -> Result<Response> {
        match id {
            1 => Ok(Response::Vector(self.section_deformation())),
            2 => Ok(Response::Vector(self.stress_resultant())),
            3 => Ok(Response::Matrix(self.section_tangent())),
            4 => {
                let e = self.section_deformation();
                let s = self.stress_resultant();
                Ok(Response::Vector(DVector::from_iterator(
                    e.len() + s.len(),
                    e.iter().chain(s.iter()).copied(),
                )))
            }
            other => Err(FeError::UnknownResponse(other)),
        }
    }
}
