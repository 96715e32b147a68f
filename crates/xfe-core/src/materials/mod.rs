//! Constitutive models.
//!
//! - [`UniaxialMaterial`]: scalar stress-strain laws used by fibers and zero-length springs
//! - [`nd`]: multiaxial (continuum) models used by plate fibers and solids
//!
//! Every model keeps a committed state and a trial state. `set_trial_strain`
//! only touches the trial state; `commit_state` copies trial into committed;
//! `revert_to_last_commit` copies committed into trial, bit for bit.

use crate::error::{FeError, Result};
use crate::response::{ParameterId, Response};
use serde::{Deserialize, Serialize};

pub mod bilinear;
pub mod elastic;
pub mod legacy;
pub mod nd;
pub mod steel01;

pub use bilinear::Bilinear;
pub use elastic::ElasticMaterial;
pub use legacy::LegacyMaterialKind;
pub use steel01::Steel01;

/// Uniaxial stress-strain law with committed/trial state.
pub trait UniaxialMaterial {
    /// Set the trial strain and compute the trial stress and tangent.
    fn set_trial_strain(&mut self, strain: f64, strain_rate: f64) -> Result<()>;

    /// Set the trial strain and return `(stress, tangent)`.
    fn set_trial(&mut self, strain: f64, strain_rate: f64) -> Result<(f64, f64)> {
        self.set_trial_strain(strain, strain_rate)?;
        Ok((self.stress(), self.tangent()))
    }

    fn strain(&self) -> f64;
    fn stress(&self) -> f64;
    fn tangent(&self) -> f64;
    fn initial_tangent(&self) -> f64;

    fn strain_rate(&self) -> f64 {
        0.0
    }

    /// Tangent with respect to strain rate.
    fn damp_tangent(&self) -> f64 {
        0.0
    }

    /// Impose an initial (stress free) strain.
    fn set_initial_strain(&mut self, _strain: f64) -> Result<()> {
        Err(FeError::Configuration(format!(
            "{} does not support initial strains",
            self.type_name()
        )))
    }

    fn initial_strain(&self) -> f64 {
        0.0
    }

    fn commit_state(&mut self) -> Result<()>;
    fn revert_to_last_commit(&mut self) -> Result<()>;
    fn revert_to_start(&mut self) -> Result<()>;

    fn type_name(&self) -> &'static str;

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

    /// Map a recorder keyword to a response id.
    fn response_id(&self, name: &str) -> Option<i32> {
        match name {
            "stress" | "force" => Some(1),
            "strain" | "deformation" | "defo" => Some(2),
            "tangent" | "stiffness" | "stiff" => Some(3),
            _ => None,
        }
    }

    fn get_response(&self, id: i32) -> Result<Response> {
        match id {
            1 => Ok(Response::Scalar(self.stress())),
            2 => Ok(Response::Scalar(self.strain())),
            3 => Ok(Response::Scalar(self.tangent())),
            other => Err(FeError::UnknownResponse(other)),
        }
    }
}

/// Closed set of uniaxial models, dispatched without boxing in per-fiber loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DynamicMaterial {
    Elastic(ElasticMaterial),
    Steel01(Steel01),
    Bilinear(Bilinear),
}

macro_rules! dispatch {
    ($self:ident, $m:ident => $body:expr) => {
        match $self {
            DynamicMaterial::Elastic($m) => $body,
            DynamicMaterial::Steel01($m) => $body,
            DynamicMaterial::Bilinear($m) => $body,
        }
    };
}

impl DynamicMaterial {
    /// Construct a model that exists only as a wrapper around an external
    /// subroutine library. Those are never linked, so this always fails.
    pub fn legacy(kind: LegacyMaterialKind) -> Result<Self> {
        Err(FeError::UnsupportedMaterialType(kind.to_string()))
    }

    /// Independent copy with the same parameters and state.
    pub fn get_copy(&self) -> Self {
        self.clone()
    }
}

impl From<ElasticMaterial> for DynamicMaterial {
    fn from(m: ElasticMaterial) -> Self {
        DynamicMaterial::Elastic(m)
    }
}

impl From<Steel01> for DynamicMaterial {
    fn from(m: Steel01) -> Self {
        DynamicMaterial::Steel01(m)
    }
}

impl From<Bilinear> for DynamicMaterial {
    fn from(m: Bilinear) -> Self {
        DynamicMaterial::Bilinear(m)
    }
}

impl UniaxialMaterial for DynamicMaterial {
    fn set_trial_strain(&mut self, strain: f64, strain_rate: f64) -> Result<()> {
        dispatch!(self, m => m.set_trial_strain(strain, strain_rate))
    }

    fn strain(&self) -> f64 {
        dispatch!(self, m => m.strain())
    }

    fn stress(&self) -> f64 {
        dispatch!(self, m => m.stress())
    }

    fn tangent(&self) -> f64 {
        dispatch!(self, m => m.tangent())
    }

    fn initial_tangent(&self) -> f64 {
        dispatch!(self, m => m.initial_tangent())
    }

    fn strain_rate(&self) -> f64 {
        dispatch!(self, m => m.strain_rate())
    }

    fn damp_tangent(&self) -> f64 {
        dispatch!(self, m => m.damp_tangent())
    }

    fn set_initial_strain(&mut self, strain: f64) -> Result<()> {
        dispatch!(self, m => m.set_initial_strain(strain))
    }

    fn initial_strain(&self) -> f64 {
        dispatch!(self, m => m.initial_strain())
    }

    fn commit_state(&mut self) -> Result<()> {
        dispatch!(self, m => m.commit_state())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        dispatch!(self, m => m.revert_to_last_commit())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        dispatch!(self, m => m.revert_to_start())
    }

    fn type_name(&self) -> &'static str {
        dispatch!(self, m => m.type_name())
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        dispatch!(self, m => m.set_parameter(name))
    }

    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        dispatch!(self, m => m.update_parameter(id, value))
    }

    fn response_id(&self, name: &str) -> Option<i32> {
        dispatch!(self, m => m.response_id(name))
    }

    fn get_response(&self, id: i32) -> Result<Response> {
        dispatch!(self, m => m.get_response(id))
    }
}
