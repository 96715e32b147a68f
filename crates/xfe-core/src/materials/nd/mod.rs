//! Multiaxial (continuum) material models.
//!
//! Models integrate the full 3x3 strain tensor internally; an [`NdMode`]
//! selects which components the caller exchanges (3D solid, plane strain,
//! plane stress, axisymmetric or plate fiber) and how the tangent is reduced.
//! Modes with a zero out-of-plane stress (`PlaneStress`, `PlateFiber`) solve
//! for ε33 by local iteration and statically condense the tangent.

use crate::error::{FeError, Result, StepResult};
use crate::numeric::Tensor4;
use crate::response::{ParameterId, Response};
use nalgebra::{DMatrix, DVector, Matrix3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod cyclic;
pub mod j2;

pub use cyclic::{CyclicParams, MultiaxialCyclicPlasticity};
pub use j2::{J2Params, J2Plasticity, ReturnMappingInfo};

/// Kinematic restriction of a continuum model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NdMode {
    /// `[ε11, ε22, ε33, γ12, γ23, γ31]`
    ThreeDimensional,
    /// `[ε11, ε22, γ12]` with ε33 = 0
    PlaneStrain,
    /// `[ε11, ε22, γ12]` with σ33 = 0
    PlaneStress,
    /// `[ε_rr, ε_zz, ε_θθ, γ_rz]`
    AxiSymmetric,
    /// `[ε11, ε22, γ12, γ23, γ31]` with σ33 = 0
    PlateFiber,
}

const MAP_3D: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (0, 1), (1, 2), (2, 0)];
const MAP_PLANE: [(usize, usize); 3] = [(0, 0), (1, 1), (0, 1)];
const MAP_AXI: [(usize, usize); 4] = [(0, 0), (1, 1), (2, 2), (0, 1)];
const MAP_PLATE: [(usize, usize); 5] = [(0, 0), (1, 1), (0, 1), (1, 2), (2, 0)];

impl NdMode {
    /// Tensor indices of each exchanged component.
    pub fn index_map(&self) -> &'static [(usize, usize)] {
        match self {
            NdMode::ThreeDimensional => &MAP_3D,
            NdMode::PlaneStrain | NdMode::PlaneStress => &MAP_PLANE,
            NdMode::AxiSymmetric => &MAP_AXI,
            NdMode::PlateFiber => &MAP_PLATE,
        }
    }

    pub fn order(&self) -> usize {
        self.index_map().len()
    }

    /// σ33 = 0 enforced by iteration on ε33.
    pub fn zero_normal_stress(&self) -> bool {
        matches!(self, NdMode::PlaneStress | NdMode::PlateFiber)
    }

    /// Strain tensor from engineering components. Components outside the
    /// mode are zero, except ε33 = `e33` for the σ33 = 0 modes.
    pub fn strain_tensor(&self, v: &DVector<f64>, e33: f64) -> Result<Matrix3<f64>> {
        if v.len() != self.order() {
            return Err(FeError::len("NdMode::strain_tensor", self.order(), v.len()));
        }
        let mut m = Matrix3::zeros();
        for (k, &(i, j)) in self.index_map().iter().enumerate() {
            if i == j {
                m[(i, i)] = v[k];
            } else {
                m[(i, j)] = 0.5 * v[k];
                m[(j, i)] = 0.5 * v[k];
            }
        }
        if self.zero_normal_stress() {
            m[(2, 2)] = e33;
        }
        Ok(m)
    }

    /// Engineering strain components of a tensor.
    pub fn strain_vector(&self, m: &Matrix3<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.order(),
            self.index_map()
                .iter()
                .map(|&(i, j)| if i == j { m[(i, i)] } else { 2.0 * m[(i, j)] }),
        )
    }

    pub fn stress_vector(&self, m: &Matrix3<f64>) -> DVector<f64> {
        DVector::from_iterator(self.order(), self.index_map().iter().map(|&(i, j)| m[(i, j)]))
    }

    /// Tangent matrix of the exchanged components, condensed on σ33 = 0 where
    /// the mode requires it.
    pub fn tangent_matrix(&self, c: &Tensor4) -> DMatrix<f64> {
        let map = self.index_map();
        let n = map.len();
        let c2222 = c.get(2, 2, 2, 2);
        DMatrix::from_fn(n, n, |a, b| {
            let (i, j) = map[a];
            let (k, l) = map[b];
            let full = c.get(i, j, k, l);
            if self.zero_normal_stress() && c2222 != 0.0 {
                full - c.get(i, j, 2, 2) * c.get(2, 2, k, l) / c2222
            } else {
                full
            }
        })
    }
}

impl fmt::Display for NdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NdMode::ThreeDimensional => "ThreeDimensional",
            NdMode::PlaneStrain => "PlaneStrain",
            NdMode::PlaneStress => "PlaneStress",
            NdMode::AxiSymmetric => "AxiSymmetric",
            NdMode::PlateFiber => "PlateFiber",
        };
        f.write_str(name)
    }
}

impl FromStr for NdMode {
    type Err = FeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ThreeDimensional" | "3D" => Ok(NdMode::ThreeDimensional),
            "PlaneStrain" | "PlaneStrain2D" => Ok(NdMode::PlaneStrain),
            "PlaneStress" | "PlaneStress2D" => Ok(NdMode::PlaneStress),
            "AxiSymmetric" | "AxiSymmetric2D" => Ok(NdMode::AxiSymmetric),
            "PlateFiber" => Ok(NdMode::PlateFiber),
            other => Err(FeError::Configuration(format!("unknown material mode '{other}'"))),
        }
    }
}

/// Local Newton settings for return mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnMappingConfig {
    /// Iteration cap of the consistency-parameter solve
    pub max_iterations: usize,
    /// Residual tolerance as a fraction of the initial yield stress
    pub tolerance_factor: f64,
    /// Scale applied to the converged consistency parameter
    pub gamma_scale: f64,
}

impl Default for ReturnMappingConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance_factor: 1e-8,
            gamma_scale: 1.0 - 1e-8,
        }
    }
}

/// Settings of the σ33 = 0 loop used by `PlaneStress` and `PlateFiber`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneStressConfig {
    pub max_iterations: usize,
    /// Absolute tolerance on σ33
    pub tolerance: f64,
}

impl Default for PlaneStressConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            tolerance: 1e-8,
        }
    }
}

/// Continuum model exchanging engineering strain/stress vectors.
pub trait NdMaterial {
    fn mode(&self) -> NdMode;

    fn order(&self) -> usize {
        self.mode().order()
    }

    /// Set the trial strain; `dt` is the current time step (viscous terms).
    fn set_trial_strain(&mut self, strain: &DVector<f64>, dt: f64) -> StepResult;

    fn strain(&self) -> DVector<f64>;
    fn stress(&self) -> DVector<f64>;
    fn tangent(&self) -> DMatrix<f64>;
    fn initial_tangent(&self) -> DMatrix<f64>;

    /// Mass density
    fn rho(&self) -> f64;

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

    fn response_id(&self, name: &str) -> Option<i32> {
        match name {
            "stress" | "stresses" => Some(1),
            "strain" | "strains" => Some(2),
            "tangent" => Some(3),
            _ => None,
        }
    }

    fn get_response(&self, id: i32) -> Result<Response> {
        match id {
            1 => Ok(Response::Vector(self.stress())),
            2 => Ok(Response::Vector(self.strain())),
            3 => Ok(Response::Matrix(self.tangent())),
            other => Err(FeError::UnknownResponse(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders() {
        assert_eq!(NdMode::ThreeDimensional.order(), 6);
        assert_eq!(NdMode::PlaneStrain.order(), 3);
        assert_eq!(NdMode::PlaneStress.order(), 3);
        assert_eq!(NdMode::AxiSymmetric.order(), 4);
        assert_eq!(NdMode::PlateFiber.order(), 5);
    }

    #[test]
    fn strain_vector_round_trips_engineering_shear() {
        let mode = NdMode::ThreeDimensional;
        let v = DVector::from_vec(vec![1e-3, -2e-4, 5e-5, 4e-4, -1e-4, 2e-4]);
        let m = mode.strain_tensor(&v, 0.0).unwrap();
        assert_eq!(m[(0, 1)], 2e-4);
        assert_eq!(m[(1, 0)], 2e-4);
        assert_eq!(mode.strain_vector(&m), v);
    }

    #[test]
    fn plane_stress_keeps_e33() {
        let v = DVector::from_vec(vec![1e-3, 0.0, 0.0]);
        let m = NdMode::PlaneStress.strain_tensor(&v, -3e-4).unwrap();
        assert_eq!(m[(2, 2)], -3e-4);
        let m = NdMode::PlaneStrain.strain_tensor(&v, -3e-4).unwrap();
        assert_eq!(m[(2, 2)], 0.0);
    }

    #[test]
    fn condensed_elastic_tangent_is_plane_stress_matrix() {
        let (e, nu) = (200_000.0, 0.3);
        let bulk = e / (3.0 * (1.0 - 2.0 * nu));
        let shear = e / (2.0 * (1.0 + nu));
        let mut c = Tensor4::ibun_i();
        c = {
            let mut t = Tensor4::zeros();
            t.add_scaled(bulk, &c);
            t.add_scaled(2.0 * shear, &Tensor4::ii_dev());
            t
        };
        let d = NdMode::PlaneStress.tangent_matrix(&c);
        let f = e / (1.0 - nu * nu);
        assert!((d[(0, 0)] - f).abs() / f < 1e-12);
        assert!((d[(0, 1)] - nu * f).abs() / f < 1e-12);
        assert!((d[(2, 2)] - shear).abs() / shear < 1e-12);
    }

    #[test]
    fn mode_names_parse() {
        assert_eq!("PlateFiber".parse::<NdMode>().unwrap(), NdMode::PlateFiber);
        assert!("Beam".parse::<NdMode>().is_err());
    }
}
