//! Linear elastic membrane-plate (Reissner-Mindlin) section.
//!
//! Deformations are `[ε11, ε22, γ12, κ11, κ22, κ12, γ13, γ23]`. Bending
//! resultants carry a minus sign, which the shell element compensates.

use super::{ResponseCode, SectionForceDeformation, SHELL_RESPONSE};
use crate::error::{FeError, Result, StepResult};
use crate::response::{lookup_parameter, ParameterId};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

const FIVE6: f64 = 5.0 / 6.0;

const PARAMETERS: &[(&[&str], i32)] = &[(&["E"], 1), (&["nu"], 2), (&["h"], 3), (&["rho"], 4)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticMembranePlateSection {
    pub id: i32,
    pub e: f64,
    pub nu: f64,
    /// Thickness
    pub h: f64,
    /// Mass per unit area (ρ·h)
    pub rho_h: f64,
    trial: DVector<f64>,
    committed: DVector<f64>,
    initial: DVector<f64>,
}

impl ElasticMembranePlateSection {
    pub fn new(id: i32, e: f64, nu: f64, h: f64, rho: f64) -> Result<Self> {
        if h <= 0.0 {
            return Err(FeError::Configuration(format!(
                "ElasticMembranePlateSection {id}: thickness must be positive, got {h}"
            )));
        }
        if !(-1.0..0.5).contains(&nu) {
            return Err(FeError::Configuration(format!(
                "ElasticMembranePlateSection {id}: Poisson's ratio {nu} out of range"
            )));
        }
        Ok(Self {
            id,
            e,
            nu,
            h,
            rho_h: rho * h,
            trial: DVector::zeros(8),
            committed: DVector::zeros(8),
            initial: DVector::zeros(8),
        })
    }

    /// `E·h/(1 − ν²)`
    pub fn membrane_modulus(&self) -> f64 {
        self.e * self.h / (1.0 - self.nu * self.nu)
    }

    /// `0.5·E·h/(1 + ν)`
    pub fn shear_modulus(&self) -> f64 {
        0.5 * self.e * self.h / (1.0 + self.nu)
    }

    /// `E·h³/(12·(1 − ν²))`
    pub fn bending_modulus(&self) -> f64 {
        self.e * self.h.powi(3) / (12.0 * (1.0 - self.nu * self.nu))
    }

    fn tangent_matrix(&self) -> DMatrix<f64> {
        let m = self.membrane_modulus();
        let g = self.shear_modulus();
        let d = self.bending_modulus();
        let nu = self.nu;
        let mut k = DMatrix::zeros(8, 8);
        k[(0, 0)] = m;
        k[(1, 1)] = m;
        k[(0, 1)] = nu * m;
        k[(1, 0)] = nu * m;
        k[(2, 2)] = g;
        k[(3, 3)] = -d;
        k[(4, 4)] = -d;
        k[(3, 4)] = -nu * d;
        k[(4, 3)] = -nu * d;
        k[(5, 5)] = -0.5 * d * (1.0 - nu);
        k[(6, 6)] = FIVE6 * g;
        k[(7, 7)] = FIVE6 * g;
        k
    }
}

impl SectionForceDeformation for ElasticMembranePlateSection {
    fn response_type(&self) -> &[ResponseCode] {
        &SHELL_RESPONSE
    }

    fn set_trial_section_deformation(&mut self, deformation: &DVector<f64>) -> StepResult {
        if deformation.len() != 8 {
            return Err(FeError::len(
                "ElasticMembranePlateSection::set_trial_section_deformation",
                8,
                deformation.len(),
            ));
        }
        self.trial.copy_from(deformation);
        Ok(None)
    }

    /// Trial deformation minus the initial deformation.
    fn section_deformation(&self) -> DVector<f64> {
        &self.trial - &self.initial
    }

    fn stress_resultant(&self) -> DVector<f64> {
        let m = self.membrane_modulus();
        let g = self.shear_modulus();
        let d = self.bending_modulus();
        let nu = self.nu;
        let e = self.section_deformation();
        DVector::from_vec(vec![
            m * e[0] + nu * m * e[1],
            nu * m * e[0] + m * e[1],
            g * e[2],
            -(d * e[3] + nu * d * e[4]),
            -(nu * d * e[3] + d * e[4]),
            -0.5 * d * (1.0 - nu) * e[5],
            FIVE6 * g * e[6],
            FIVE6 * g * e[7],
        ])
    }

    fn section_tangent(&self) -> DMatrix<f64> {
        self.tangent_matrix()
    }

    fn initial_tangent(&self) -> DMatrix<f64> {
        self.tangent_matrix()
    }

    fn set_initial_section_deformation(&mut self, deformation: &DVector<f64>) -> Result<()> {
        if deformation.len() != 8 {
            return Err(FeError::len(
                "ElasticMembranePlateSection::set_initial_section_deformation",
                8,
                deformation.len(),
            ));
        }
        self.initial.copy_from(deformation);
        Ok(())
    }

    fn initial_section_deformation(&self) -> DVector<f64> {
        self.initial.clone()
    }

    fn rho(&self) -> f64 {
        self.rho_h
    }

    fn commit_state(&mut self) -> Result<()> {
        self.committed.copy_from(&self.trial);
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.trial.copy_from(&self.committed);
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.trial.fill(0.0);
        self.committed.fill(0.0);
        self.initial.fill(0.0);
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "ElasticMembranePlateSection"
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        lookup_parameter(PARAMETERS, name)
    }

    /// `rho` is the volumetric density; the stored value is ρ·h.
    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        match id.0 {
            1 => self.e = value,
            2 => self.nu = value,
            3 => {
                let rho = self.rho_h / self.h;
                self.h = value;
                self.rho_h = rho * value;
            }
            4 => self.rho_h = value * self.h,
            other => {
                return Err(FeError::UnknownParameter(format!(
                    "ElasticMembranePlateSection parameter {other}"
                )));
            }
        }
        Ok(())
    }
}
