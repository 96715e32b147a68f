//! Bounding-surface J2 plasticity for clays under cyclic loading
//! (Borja & Amies 1994; Montáns & Borja 2002).
//!
//! The bounding surface is a von Mises cylinder of radius `R = √(8/3)·Su`
//! centred at the back stress α. Inside it the plastic modulus depends on the
//! distance κ to the conjugate (image) point:
//!
//! ```text
//! s̄ = s + κ·(s − s0),   ‖s̄ − α‖ = R,   H = h·κ^m + H0
//! ```
//!
//! where `s0` is the deviatoric stress at the last load reversal. The
//! deviatoric update is integrated with a generalized midpoint rule
//! (parameter β). Volumetric response is linear elastic.
//!
//! Two stages are supported: stage 1 is linear elastic with moduli that
//! reproduce the at-rest coefficient K0 (gravity initialisation), stage 2 is
//! the plastic model above.

use super::{NdMaterial, NdMode};
use crate::error::{ConvergenceWarning, FeError, Result, StepResult};
use crate::numeric::tensor::{deviator, tensor_norm};
use crate::numeric::Tensor4;
use crate::response::{lookup_parameter, ParameterId};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix3};
use serde::{Deserialize, Serialize};

const PARAMETERS: &[(&[&str], i32)] = &[(&["materialStage", "stage"], 1)];

const MAX_ITERATIONS: usize = 25;
const TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CyclicParams {
    pub rho: f64,
    /// Bulk modulus
    pub bulk: f64,
    /// Small-strain shear modulus
    pub shear: f64,
    /// Undrained shear strength
    pub su: f64,
    /// Kinematic hardening modulus of the bounding surface
    pub ho: f64,
    pub h: f64,
    pub m: f64,
    /// Midpoint integration parameter (0.5 usual)
    pub beta: f64,
    /// At-rest earth pressure coefficient
    pub k0: f64,
}

impl CyclicParams {
    pub fn validate(&self) -> Result<()> {
        if self.bulk <= 0.0 || self.shear <= 0.0 {
            return Err(FeError::Configuration(format!(
                "MultiaxialCyclicPlasticity: moduli must be positive (K = {}, G = {})",
                self.bulk, self.shear
            )));
        }
        if self.su <= 0.0 {
            return Err(FeError::Configuration(format!(
                "MultiaxialCyclicPlasticity: Su must be positive, got {}",
                self.su
            )));
        }
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(FeError::Configuration(format!(
                "MultiaxialCyclicPlasticity: β must lie in [0, 1], got {}",
                self.beta
            )));
        }
        if self.k0 <= 0.0 {
            return Err(FeError::Configuration(format!(
                "MultiaxialCyclicPlasticity: K0 must be positive, got {}",
                self.k0
            )));
        }
        Ok(())
    }

    /// Radius of the bounding surface.
    pub fn radius(&self) -> f64 {
        (8.0_f64 / 3.0).sqrt() * self.su
    }

    /// `(bulk, shear)` with the Young's modulus of `(K, G)` and ν = K0/(1+K0).
    pub fn k0_moduli(&self) -> (f64, f64) {
        let nu = self.k0 / (1.0 + self.k0);
        let e = 9.0 * self.bulk * self.shear / (3.0 * self.bulk + self.shear);
        (e / (3.0 * (1.0 - 2.0 * nu)), e / (2.0 * (1.0 + nu)))
    }
}

fn elastic_tensor(bulk: f64, shear: f64) -> Tensor4 {
    let mut c = Tensor4::zeros();
    c.add_scaled(bulk, &Tensor4::ibun_i());
    c.add_scaled(2.0 * shear, &Tensor4::ii_dev());
    c
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CyclicState {
    strain: Matrix3<f64>,
    stress: Matrix3<f64>,
    /// Centre of the bounding surface
    backs: Matrix3<f64>,
    /// Deviatoric stress at the last reversal
    so: Matrix3<f64>,
    /// `None` right after a reversal (κ → ∞)
    kappa: Option<f64>,
    plastic: bool,
    first_load: bool,
    tangent: Tensor4,
}

impl CyclicState {
    fn virgin(tangent: Tensor4) -> Self {
        Self {
            strain: Matrix3::zeros(),
            stress: Matrix3::zeros(),
            backs: Matrix3::zeros(),
            so: Matrix3::zeros(),
            kappa: None,
            plastic: false,
            first_load: true,
            tangent,
        }
    }
}

/// Conjugate point search: κ ≥ 0 and the unit normal at the image point.
/// `None` when the stress sits on the reversal point (κ → ∞).
fn image_point(
    s: &Matrix3<f64>,
    so: &Matrix3<f64>,
    backs: &Matrix3<f64>,
    radius: f64,
) -> Option<(f64, Matrix3<f64>)> {
    let d = s - so;
    let p = s - backs;
    let dd = d.dot(&d);
    let pp = p.dot(&p);
    if pp >= radius * radius {
        let norm = pp.sqrt();
        return Some((0.0, p / norm));
    }
    if dd <= f64::EPSILON * radius * radius {
        return None;
    }
    let pd = p.dot(&d);
    let disc = pd * pd - dd * (pp - radius * radius);
    let kappa = ((-pd + disc.sqrt()) / dd).max(0.0);
    let image = s + kappa * d;
    Some((kappa, (image - backs) / radius))
}

/// Borja–Amies bounding-surface plasticity. Field order is the archive order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiaxialCyclicPlasticity {
    pub id: i32,
    pub params: CyclicParams,
    mode: NdMode,
    /// 1 = elastic (K0 moduli), 2 = plastic
    stage: u8,
    committed: CyclicState,
    trial: CyclicState,
}

impl MultiaxialCyclicPlasticity {
    pub fn new(id: i32, mode: NdMode, params: CyclicParams) -> Result<Self> {
        params.validate()?;
        if !matches!(mode, NdMode::ThreeDimensional | NdMode::PlaneStrain) {
            return Err(FeError::Configuration(format!(
                "MultiaxialCyclicPlasticity: mode {mode} not available"
            )));
        }
        let (bulk_k0, shear_k0) = params.k0_moduli();
        let tangent = elastic_tensor(bulk_k0, shear_k0);
        Ok(Self {
            id,
            params,
            mode,
            stage: 1,
            committed: CyclicState::virgin(tangent),
            trial: CyclicState::virgin(tangent),
        })
    }

    pub fn stage(&self) -> u8 {
        self.stage
    }

    pub fn set_stage(&mut self, stage: u8) -> Result<()> {
        match stage {
            1 | 2 => {
                debug!("MultiaxialCyclicPlasticity {}: stage {} -> {stage}", self.id, self.stage);
                self.stage = stage;
                Ok(())
            }
            other => Err(FeError::Configuration(format!(
                "MultiaxialCyclicPlasticity: unknown stage {other}"
            ))),
        }
    }

    pub fn get_copy_as(&self, mode: NdMode) -> Result<Self> {
        let mut copy = Self::new(self.id, mode, self.params)?;
        copy.stage = self.stage;
        Ok(copy)
    }

    pub fn stress_tensor(&self) -> &Matrix3<f64> {
        &self.trial.stress
    }

    pub fn back_stress(&self) -> &Matrix3<f64> {
        &self.trial.backs
    }

    /// Distance parameter to the image point, `None` right after a reversal.
    pub fn kappa(&self) -> Option<f64> {
        self.trial.kappa
    }

    pub fn is_plastic(&self) -> bool {
        self.trial.plastic
    }

    fn elastic_integrator(&mut self, strain: Matrix3<f64>) {
        let (bulk, shear) = self.params.k0_moduli();
        let (dev, trace) = deviator(&strain);
        let mut stress = 2.0 * shear * dev;
        for i in 0..3 {
            stress[(i, i)] += bulk * trace;
        }
        self.trial.strain = strain;
        self.trial.stress = stress;
        self.trial.tangent = elastic_tensor(bulk, shear);
        self.trial.plastic = false;
    }

    fn plastic_integrator(&mut self, strain: Matrix3<f64>) -> Option<ConvergenceWarning> {
        let p = self.params;
        let two_g = 2.0 * p.shear;
        let radius = p.radius();
        let n = &self.committed;

        let (dev_de, d_trace) = deviator(&(strain - n.strain));
        let (s_n, trace_n) = deviator(&n.stress);

        let mut backs = n.backs;
        let mut so = n.so;
        if n.first_load {
            so = s_n;
            let norm = tensor_norm(&s_n);
            backs = if norm < radius {
                Matrix3::zeros()
            } else {
                s_n * (1.0 - radius / norm)
            };
        }
        if (two_g * dev_de).dot(&(s_n - so)) < 0.0 {
            so = s_n;
        }

        let mut s = s_n + two_g * dev_de;
        let mut kappa = None;
        let mut lambda_h = None;
        let mut warning = None;
        for iteration in 1..=MAX_ITERATIONS {
            let s_beta = (1.0 - p.beta) * s_n + p.beta * s;
            let (k, step) = match image_point(&s_beta, &so, &backs, radius) {
                Some((k, normal)) => {
                    let h_mod = p.h * k.powf(p.m) + p.ho;
                    let nde = normal.dot(&dev_de);
                    if nde > 0.0 {
                        let lambda = two_g * nde / (h_mod + two_g);
                        (Some(k), Some((lambda, h_mod, normal)))
                    } else {
                        (Some(k), None)
                    }
                }
                None => (None, None),
            };
            kappa = k;
            let s_new = match &step {
                Some((lambda, _, normal)) => s_n + two_g * (dev_de - *lambda * normal),
                None => s_n + two_g * dev_de,
            };
            let change = tensor_norm(&(s_new - s));
            s = s_new;
            lambda_h = step;
            if change <= TOLERANCE * radius {
                break;
            }
            if iteration == MAX_ITERATIONS {
                warn!(
                    "MultiaxialCyclicPlasticity {}: midpoint iteration not converged (Δs = {change:.3e})",
                    self.id
                );
                warning = Some(ConvergenceWarning::new(
                    format!("MultiaxialCyclicPlasticity {} midpoint iteration", self.id),
                    iteration,
                    change,
                    TOLERANCE * radius,
                ));
            }
        }

        // drag the bounding surface along when the stress reaches it
        let rel = s - backs;
        let rel_norm = tensor_norm(&rel);
        if rel_norm > radius {
            backs = s - rel * (radius / rel_norm);
        }

        let mut stress = s;
        for i in 0..3 {
            stress[(i, i)] += trace_n / 3.0 + p.bulk * d_trace;
        }

        let mut tangent = elastic_tensor(p.bulk, p.shear);
        if let Some((_, h_mod, normal)) = &lambda_h {
            tangent.add_scaled(-two_g * two_g / (h_mod + two_g), &Tensor4::outer(normal, normal));
        }

        self.trial = CyclicState {
            strain,
            stress,
            backs,
            so,
            kappa,
            plastic: lambda_h.is_some(),
            first_load: false,
            tangent,
        };
        warning
    }
}

impl NdMaterial for MultiaxialCyclicPlasticity {
    fn mode(&self) -> NdMode {
        self.mode
    }

    fn set_trial_strain(&mut self, strain: &DVector<f64>, _dt: f64) -> StepResult {
        let eps = self.mode.strain_tensor(strain, 0.0)?;
        if self.stage == 1 {
            self.elastic_integrator(eps);
            Ok(None)
        } else {
            Ok(self.plastic_integrator(eps))
        }
    }

    fn strain(&self) -> DVector<f64> {
        self.mode.strain_vector(&self.trial.strain)
    }

    fn stress(&self) -> DVector<f64> {
        self.mode.stress_vector(&self.trial.stress)
    }

    fn tangent(&self) -> DMatrix<f64> {
        self.mode.tangent_matrix(&self.trial.tangent)
    }

    fn initial_tangent(&self) -> DMatrix<f64> {
        let (bulk, shear) = if self.stage == 1 {
            self.params.k0_moduli()
        } else {
            (self.params.bulk, self.params.shear)
        };
        self.mode.tangent_matrix(&elastic_tensor(bulk, shear))
    }

    fn rho(&self) -> f64 {
        self.params.rho
    }

    fn commit_state(&mut self) -> Result<()> {
        self.committed = self.trial.clone();
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.trial = self.committed.clone();
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        let (bulk, shear) = self.params.k0_moduli();
        self.committed = CyclicState::virgin(elastic_tensor(bulk, shear));
        self.trial = self.committed.clone();
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "MultiaxialCyclicPlasticity"
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        lookup_parameter(PARAMETERS, name)
    }

    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        match id.0 {
            1 => self.set_stage(value.round() as u8),
            other => Err(FeError::UnknownParameter(format!(
                "MultiaxialCyclicPlasticity parameter {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clay() -> CyclicParams {
        CyclicParams {
            rho: 1.8,
            bulk: 100_000.0,
            shear: 30_000.0,
            su: 50.0,
            ho: 1000.0,
            h: 3000.0,
            m: 1.0,
            beta: 0.5,
            k0: 0.5,
        }
    }

    fn shear_strain(g: f64) -> DVector<f64> {
        DVector::from_vec(vec![0.0, 0.0, g])
    }

    #[test]
    fn stage_one_reproduces_k0() {
        let mut m = MultiaxialCyclicPlasticity::new(1, NdMode::ThreeDimensional, clay()).unwrap();
        let oedometric = DVector::from_vec(vec![0.0, 0.0, -1e-3, 0.0, 0.0, 0.0]);
        assert!(m.set_trial_strain(&oedometric, 0.0).unwrap().is_none());
        let s = m.stress();
        assert!((s[0] / s[2] - 0.5).abs() < 1e-12);
        assert!((s[1] / s[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn stage_two_softens_and_stays_inside_bounding_surface() {
        let mut m = MultiaxialCyclicPlasticity::new(1, NdMode::PlaneStrain, clay()).unwrap();
        let id = m.set_parameter("materialStage").unwrap();
        m.update_parameter(id, 2.0).unwrap();
        assert_eq!(m.stage(), 2);

        let radius = m.params.radius();
        let mut last_tangent = f64::INFINITY;
        for step in 1..=40 {
            let g = step as f64 * 2.5e-4;
            m.set_trial_strain(&shear_strain(g), 0.0).unwrap();
            m.commit_state().unwrap();
            let t = m.tangent()[(2, 2)];
            assert!(t <= 30_000.0 * (1.0 + 1e-12));
            assert!(t <= last_tangent * (1.0 + 1e-9), "tangent must decrease on monotonic loading");
            last_tangent = t;
            let (dev, _) = deviator(m.stress_tensor());
            assert!(tensor_norm(&(dev - m.back_stress())) <= radius * (1.0 + 1e-9));
        }
        assert!(m.is_plastic());
    }

    #[test]
    fn reversal_restarts_stiff() {
        let mut m = MultiaxialCyclicPlasticity::new(1, NdMode::PlaneStrain, clay()).unwrap();
        m.set_stage(2).unwrap();
        for step in 1..=10 {
            m.set_trial_strain(&shear_strain(step as f64 * 5e-4), 0.0).unwrap();
            m.commit_state().unwrap();
        }
        let loading_tangent = m.tangent()[(2, 2)];
        let tau = m.stress()[2];
        m.set_trial_strain(&shear_strain(5e-3 - 1e-5), 0.0).unwrap();
        let unloading_modulus = (tau - m.stress()[2]) / 1e-5;
        assert!(unloading_modulus > loading_tangent);
        assert!(unloading_modulus > 0.9 * 30_000.0);
    }

    #[test]
    fn revert_is_exact() {
        let mut m = MultiaxialCyclicPlasticity::new(1, NdMode::PlaneStrain, clay()).unwrap();
        m.set_stage(2).unwrap();
        m.set_trial_strain(&shear_strain(2e-3), 0.0).unwrap();
        m.commit_state().unwrap();
        let before = m.clone();
        m.set_trial_strain(&shear_strain(8e-3), 0.0).unwrap();
        m.revert_to_last_commit().unwrap();
        assert_eq!(m, {
            let mut b = before.clone();
            b.revert_to_last_commit().unwrap();
            b
        });
        assert_eq!(m.stress(), before.stress());
    }

    #[test]
    fn rejects_unsupported_mode_and_stage() {
        assert!(MultiaxialCyclicPlasticity::new(1, NdMode::PlaneStress, clay()).is_err());
        let mut m = MultiaxialCyclicPlasticity::new(1, NdMode::ThreeDimensional, clay()).unwrap();
        assert!(m.set_stage(3).is_err());
    }
}
