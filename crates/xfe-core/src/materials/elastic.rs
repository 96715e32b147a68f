//! Linear elastic uniaxial material with optional viscous damping.

use super::UniaxialMaterial;
use crate::error::{FeError, Result};
use crate::response::{lookup_parameter, ParameterId};
use serde::{Deserialize, Serialize};

const PARAMETERS: &[(&[&str], i32)] = &[(&["E"], 1), (&["eta"], 2)];

/// `σ = E·(ε − ε₀) + η·ε̇`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticMaterial {
    pub id: i32,
    pub e: f64,
    pub eta: f64,
    /// Initial strain ε₀
    ezero: f64,
    trial_strain: f64,
    trial_strain_rate: f64,
    committed_strain: f64,
    committed_strain_rate: f64,
}

impl ElasticMaterial {
    pub fn new(id: i32, e: f64) -> Self {
        Self::with_damping(id, e, 0.0)
    }

    pub fn with_damping(id: i32, e: f64, eta: f64) -> Self {
        Self {
            id,
            e,
            eta,
            ezero: 0.0,
            trial_strain: 0.0,
            trial_strain_rate: 0.0,
            committed_strain: 0.0,
            committed_strain_rate: 0.0,
        }
    }
}

impl UniaxialMaterial for ElasticMaterial {
    fn set_trial_strain(&mut self, strain: f64, strain_rate: f64) -> Result<()> {
        self.trial_strain = strain;
        self.trial_strain_rate = strain_rate;
        Ok(())
    }

    fn strain(&self) -> f64 {
        self.trial_strain
    }

    fn stress(&self) -> f64 {
        self.e * (self.trial_strain - self.ezero) + self.eta * self.trial_strain_rate
    }

    fn tangent(&self) -> f64 {
        self.e
    }

    fn initial_tangent(&self) -> f64 {
        self.e
    }

    fn strain_rate(&self) -> f64 {
        self.trial_strain_rate
    }

    fn damp_tangent(&self) -> f64 {
        self.eta
    }

    fn set_initial_strain(&mut self, strain: f64) -> Result<()> {
        self.ezero = strain;
        Ok(())
    }

    fn initial_strain(&self) -> f64 {
        self.ezero
    }

    fn commit_state(&mut self) -> Result<()> {
        self.committed_strain = self.trial_strain;
        self.committed_strain_rate = self.trial_strain_rate;
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.trial_strain = self.committed_strain;
        self.trial_strain_rate = self.committed_strain_rate;
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.trial_strain = 0.0;
        self.trial_strain_rate = 0.0;
        self.committed_strain = 0.0;
        self.committed_strain_rate = 0.0;
        self.ezero = 0.0;
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "ElasticMaterial"
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        lookup_parameter(PARAMETERS, name)
    }

    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        match id.0 {
            1 => self.e = value,
            2 => self.eta = value,
            other => {
                return Err(FeError::UnknownParameter(format!(
                    "ElasticMaterial parameter {other}"
                )));
            }
        }
        Ok(())
    }
}
