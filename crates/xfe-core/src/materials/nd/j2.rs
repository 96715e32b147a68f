//! J2 (von Mises) plasticity with saturation plus linear isotropic hardening
//! and optional Perzyna-type viscosity.
//!
//! Radial return in deviatoric space:
//!
//! ```text
//! q(ξ)   = σ∞ + (σ0 − σ∞)·exp(−δ·ξ) + H·ξ
//! φ      = ‖2G·(dev ε − εp_n)‖ − √(2/3)·q(ξ_n)
//! r(γ)   = ‖s_trial‖ − 2G·γ − √(2/3)·q(ξ_n + √(2/3)·γ) − (η/dt)·γ
//! ```
//!
//! The consistency parameter γ is found by a capped local Newton iteration;
//! hitting the cap yields the last iterate together with a
//! [`ConvergenceWarning`].

use super::{NdMaterial, NdMode, PlaneStressConfig, ReturnMappingConfig};
use crate::error::{ConvergenceWarning, FeError, Result, StepResult};
use crate::numeric::tensor::{deviator, root23, tensor_norm, TWO3};
use crate::numeric::Tensor4;
use crate::response::{lookup_parameter, ParameterId};
use log::{trace, warn};
use nalgebra::{DMatrix, DVector, Matrix3};
use serde::{Deserialize, Serialize};

const PARAMETERS: &[(&[&str], i32)] = &[
    (&["K", "bulk"], 1),
    (&["G", "shear"], 2),
    (&["sigma0", "sigmaY"], 3),
    (&["sigmaInf"], 4),
    (&["delta"], 5),
    (&["H"], 6),
    (&["eta"], 7),
    (&["rho"], 8),
];

/// Material constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct J2Params {
    /// Bulk modulus K
    pub bulk: f64,
    /// Shear modulus G
    pub shear: f64,
    /// Initial yield stress σ0
    pub sigma_0: f64,
    /// Saturation yield stress σ∞
    pub sigma_infty: f64,
    /// Saturation exponent δ
    pub delta: f64,
    /// Linear hardening modulus H
    pub hard: f64,
    /// Viscosity η (0 = rate independent)
    pub eta: f64,
    pub rho: f64,
}

impl J2Params {
    /// Hardening function q(ξ)
    pub fn q(&self, xi: f64) -> f64 {
        self.sigma_infty + (self.sigma_0 - self.sigma_infty) * (-self.delta * xi).exp() + self.hard * xi
    }

    /// dq/dξ
    pub fn q_prime(&self, xi: f64) -> f64 {
        -self.delta * (self.sigma_0 - self.sigma_infty) * (-self.delta * xi).exp() + self.hard
    }

    pub fn validate(&self) -> Result<()> {
        if self.bulk <= 0.0 || self.shear <= 0.0 {
            return Err(FeError::Configuration(format!(
                "J2Plasticity: moduli must be positive (K = {}, G = {})",
                self.bulk, self.shear
            )));
        }
        if self.sigma_0 <= 0.0 {
            return Err(FeError::Configuration(format!(
                "J2Plasticity: initial yield stress must be positive (σ0 = {})",
                self.sigma_0
            )));
        }
        if self.eta < 0.0 {
            return Err(FeError::Configuration("J2Plasticity: negative viscosity".into()));
        }
        Ok(())
    }

    fn elastic_tangent(&self) -> Tensor4 {
        let mut c = Tensor4::zeros();
        c.add_scaled(self.bulk, &Tensor4::ibun_i());
        c.add_scaled(2.0 * self.shear, &Tensor4::ii_dev());
        c
    }
}

/// Outcome of the last local return mapping.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReturnMappingInfo {
    /// Whether the trial state violated the yield condition
    pub plastic: bool,
    /// Consistency parameter before the final scaling
    pub gamma: f64,
    pub iterations: usize,
    /// |r(γ)| at the reported γ
    pub residual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct J2State {
    strain: Matrix3<f64>,
    stress: Matrix3<f64>,
    tangent: Tensor4,
    epsilon_p: Matrix3<f64>,
    xi: f64,
}

impl J2State {
    fn virgin(params: &J2Params) -> Self {
        Self {
            strain: Matrix3::zeros(),
            stress: Matrix3::zeros(),
            tangent: params.elastic_tangent(),
            epsilon_p: Matrix3::zeros(),
            xi: 0.0,
        }
    }
}

/// J2 plasticity in any [`NdMode`]. Field order is the archive order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct J2Plasticity {
    pub id: i32,
    pub params: J2Params,
    pub config: ReturnMappingConfig,
    pub plane_stress: PlaneStressConfig,
    mode: NdMode,
    committed: J2State,
    trial: J2State,
    info: ReturnMappingInfo,
}

impl J2Plasticity {
    pub fn new(id: i32, mode: NdMode, params: J2Params) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            id,
            params,
            config: ReturnMappingConfig::default(),
            plane_stress: PlaneStressConfig::default(),
            mode,
            committed: J2State::virgin(&params),
            trial: J2State::virgin(&params),
            info: ReturnMappingInfo::default(),
        })
    }

    /// Elastic-only variant: the yield stress is pushed out of reach.
    pub fn elastic(id: i32, mode: NdMode, bulk: f64, shear: f64) -> Result<Self> {
        let sigma_0 = 1.0e16 * shear;
        Self::new(
            id,
            mode,
            J2Params {
                bulk,
                shear,
                sigma_0,
                sigma_infty: sigma_0,
                delta: 0.0,
                hard: 0.0,
                eta: 0.0,
                rho: 0.0,
            },
        )
    }

    pub fn with_config(mut self, config: ReturnMappingConfig) -> Self {
        self.config = config;
        self
    }

    /// Fresh copy of this material in another mode.
    pub fn get_copy_as(&self, mode: NdMode) -> Self {
        let mut copy = self.clone();
        copy.mode = mode;
        copy.committed = J2State::virgin(&self.params);
        copy.trial = J2State::virgin(&self.params);
        copy.info = ReturnMappingInfo::default();
        copy
    }

    pub fn plastic_strain(&self) -> &Matrix3<f64> {
        &self.trial.epsilon_p
    }

    /// Equivalent plastic strain ξ of the trial state.
    pub fn xi(&self) -> f64 {
        self.trial.xi
    }

    pub fn stress_tensor(&self) -> &Matrix3<f64> {
        &self.trial.stress
    }

    pub fn strain_tensor(&self) -> &Matrix3<f64> {
        &self.trial.strain
    }

    pub fn tangent_tensor(&self) -> &Tensor4 {
        &self.trial.tangent
    }

    pub fn return_mapping_info(&self) -> ReturnMappingInfo {
        self.info
    }

    /// Residual tolerance of the consistency solve.
    pub fn tolerance(&self) -> f64 {
        self.config.tolerance_factor * self.params.sigma_0
    }

    /// r(γ) for a trial deviatoric norm, from the committed ξ.
    pub fn consistency_residual(&self, norm_tau: f64, gamma: f64, dt: f64) -> Result<f64> {
        let eta_dt = self.eta_over_dt(dt)?;
        let xi = self.committed.xi + root23() * gamma;
        Ok(norm_tau
            - 2.0 * self.params.shear * gamma
            - root23() * self.params.q(xi)
            - eta_dt * gamma)
    }

    fn eta_over_dt(&self, dt: f64) -> Result<f64> {
        if self.params.eta == 0.0 {
            Ok(0.0)
        } else if dt > 0.0 {
            Ok(self.params.eta / dt)
        } else {
            Err(FeError::State(format!(
                "J2Plasticity {}: viscosity η = {} needs a positive time step (dt = {dt})",
                self.id, self.params.eta
            )))
        }
    }

    /// Return mapping from the committed plastic state to `strain`.
    fn integrate(
        &self,
        strain: &Matrix3<f64>,
        dt: f64,
    ) -> Result<(J2State, ReturnMappingInfo, Option<ConvergenceWarning>)> {
        let p = &self.params;
        let two_g = 2.0 * p.shear;
        let r23 = root23();
        let tol = self.tolerance();
        let eta_dt = self.eta_over_dt(dt)?;

        let (dev_strain, trace) = deviator(strain);
        let epsilon_p_n = self.committed.epsilon_p;
        let xi_n = self.committed.xi;

        let mut dev_stress = two_g * (dev_strain - epsilon_p_n);
        let norm_tau = tensor_norm(&dev_stress);
        let (normal, inv_norm_tau) = if norm_tau > tol {
            (dev_stress / norm_tau, 1.0 / norm_tau)
        } else {
            (Matrix3::zeros(), 0.0)
        };

        let phi = norm_tau - r23 * p.q(xi_n);

        let mut info = ReturnMappingInfo::default();
        let mut warning = None;
        let (epsilon_p, xi, gamma, theta_inv) = if phi > 0.0 {
            let mut gamma = 0.0;
            let mut iterations = 0;
            loop {
                let xi_trial = xi_n + r23 * gamma;
                let resid = norm_tau - two_g * gamma - r23 * p.q(xi_trial) - eta_dt * gamma;
                let tang = -two_g - TWO3 * p.q_prime(xi_trial) - eta_dt;
                gamma -= resid / tang;
                iterations += 1;

                if resid.abs() <= tol {
                    break;
                }
                if iterations >= self.config.max_iterations {
                    warn!(
                        "J2Plasticity {}: return mapping not converged after {iterations} iterations (|r| = {:.3e})",
                        self.id,
                        resid.abs()
                    );
                    warning = Some(ConvergenceWarning::new(
                        format!("J2Plasticity {} return mapping", self.id),
                        iterations,
                        resid.abs(),
                        tol,
                    ));
                    break;
                }
            }

            let residual =
                norm_tau - two_g * gamma - r23 * p.q(xi_n + r23 * gamma) - eta_dt * gamma;
            info = ReturnMappingInfo {
                plastic: true,
                gamma,
                iterations,
                residual: residual.abs(),
            };
            trace!("J2Plasticity {}: γ = {gamma:.6e} after {iterations} iterations", self.id);

            gamma *= self.config.gamma_scale;

            let epsilon_p = epsilon_p_n + gamma * normal;
            let xi = xi_n + r23 * gamma;
            dev_stress = two_g * (dev_strain - epsilon_p);
            let theta = two_g + TWO3 * p.q_prime(xi) + eta_dt;
            (epsilon_p, xi, gamma, 1.0 / theta)
        } else {
            (epsilon_p_n, xi_n, 0.0, 0.0)
        };

        let mut stress = dev_stress;
        for i in 0..3 {
            stress[(i, i)] += p.bulk * trace;
        }

        let c1 = -4.0 * p.shear * p.shear;
        let c2 = c1 * theta_inv;
        let c3 = c1 * gamma * inv_norm_tau;
        let nn = Tensor4::outer(&normal, &normal);
        let ii_dev = Tensor4::ii_dev();
        let mut tangent = Tensor4::zeros();
        tangent.add_scaled(p.bulk, &Tensor4::ibun_i());
        tangent.add_scaled(two_g, &ii_dev);
        tangent.add_scaled(c2, &nn);
        tangent.add_scaled(c3, &ii_dev);
        tangent.add_scaled(-c3, &nn);

        Ok((
            J2State {
                strain: *strain,
                stress,
                tangent,
                epsilon_p,
                xi,
            },
            info,
            warning,
        ))
    }

    /// σ33 = 0 by Newton iteration on ε33, starting from the committed ε33.
    fn integrate_zero_normal_stress(&mut self, strain: &DVector<f64>, dt: f64) -> StepResult {
        let cfg = self.plane_stress;
        let mut e33 = self.committed.strain[(2, 2)];
        let mut warning = None;
        let mut iterations = 0;
        loop {
            let eps = self.mode.strain_tensor(strain, e33)?;
            let (state, info, w) = self.integrate(&eps, dt)?;
            warning = ConvergenceWarning::merge(warning, w);
            iterations += 1;

            let s33 = state.stress[(2, 2)];
            let c2222 = state.tangent.get(2, 2, 2, 2);
            self.trial = state;
            self.info = info;

            if s33.abs() <= cfg.tolerance {
                break;
            }
            if iterations >= cfg.max_iterations {
                warn!(
                    "J2Plasticity {} ({}): σ33 = {s33:.3e} after {iterations} iterations",
                    self.id, self.mode
                );
                warning = ConvergenceWarning::merge(
                    warning,
                    Some(ConvergenceWarning::new(
                        format!("J2Plasticity {} σ33 condensation", self.id),
                        iterations,
                        s33.abs(),
                        cfg.tolerance,
                    )),
                );
                break;
            }
            e33 -= s33 / c2222;
        }
        Ok(warning)
    }
}

impl NdMaterial for J2Plasticity {
    fn mode(&self) -> NdMode {
        self.mode
    }

    fn set_trial_strain(&mut self, strain: &DVector<f64>, dt: f64) -> StepResult {
        if self.mode.zero_normal_stress() {
            return self.integrate_zero_normal_stress(strain, dt);
        }
        let eps = self.mode.strain_tensor(strain, 0.0)?;
        let (state, info, warning) = self.integrate(&eps, dt)?;
        self.trial = state;
        self.info = info;
        Ok(warning)
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
        self.mode.tangent_matrix(&self.params.elastic_tangent())
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
        self.committed = J2State::virgin(&self.params);
        self.trial = J2State::virgin(&self.params);
        self.info = ReturnMappingInfo::default();
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "J2Plasticity"
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        lookup_parameter(PARAMETERS, name)
    }

    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        let p = &mut self.params;
        match id.0 {
            1 => p.bulk = value,
            2 => p.shear = value,
            3 => p.sigma_0 = value,
            4 => p.sigma_infty = value,
            5 => p.delta = value,
            6 => p.hard = value,
            7 => p.eta = value,
            8 => p.rho = value,
            other => {
                return Err(FeError::UnknownParameter(format!("J2Plasticity parameter {other}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const E: f64 = 200_000.0;
    const NU: f64 = 0.3;

    fn params() -> J2Params {
        J2Params {
            bulk: E / (3.0 * (1.0 - 2.0 * NU)),
            shear: E / (2.0 * (1.0 + NU)),
            sigma_0: 250.0,
            sigma_infty: 350.0,
            delta: 10.0,
            hard: 1000.0,
            eta: 0.0,
            rho: 7.85e-9,
        }
    }

    fn uniaxial(e: f64) -> DVector<f64> {
        DVector::from_vec(vec![e, -NU * e, -NU * e, 0.0, 0.0, 0.0])
    }

    #[test]
    fn elastic_step_leaves_plastic_state_untouched() {
        let mut m = J2Plasticity::new(1, NdMode::ThreeDimensional, params()).unwrap();
        let w = m.set_trial_strain(&uniaxial(5e-4), 0.0).unwrap();
        assert!(w.is_none());
        assert_eq!(*m.plastic_strain(), Matrix3::zeros());
        assert_eq!(m.xi(), 0.0);
        assert!(!m.return_mapping_info().plastic);
        assert!((m.stress()[0] - E * 5e-4).abs() < 1e-6);
        assert!(m.stress()[1].abs() < 1e-6);
    }

    #[test]
    fn plastic_step_converges_below_tolerance() {
        let mut m = J2Plasticity::new(1, NdMode::ThreeDimensional, params()).unwrap();
        let w = m.set_trial_strain(&uniaxial(5e-3), 0.0).unwrap();
        assert!(w.is_none());
        let info = m.return_mapping_info();
        assert!(info.plastic);
        assert!(info.gamma > 0.0);
        assert!(info.residual < m.tolerance(), "residual {}", info.residual);
        assert!(m.xi() > 0.0);

        // final state sits on the yield surface
        let (dev, _) = deviator(m.stress_tensor());
        let yield_radius = root23() * m.params.q(m.xi());
        assert!((tensor_norm(&dev) - yield_radius).abs() / yield_radius < 1e-6);
    }

    #[test]
    fn consistent_tangent_matches_finite_difference() {
        let base = J2Plasticity::new(1, NdMode::ThreeDimensional, params()).unwrap();
        let eps = DVector::from_vec(vec![4e-3, -1e-3, -5e-4, 1e-3, 0.0, 2e-4]);
        let mut m = base.clone();
        m.set_trial_strain(&eps, 0.0).unwrap();
        let d = m.tangent();
        let h = 1e-9;
        for col in 0..6 {
            let mut plus = eps.clone();
            plus[col] += h;
            let mut minus = eps.clone();
            minus[col] -= h;
            let mut a = base.clone();
            a.set_trial_strain(&plus, 0.0).unwrap();
            let mut b = base.clone();
            b.set_trial_strain(&minus, 0.0).unwrap();
            let fd = (a.stress() - b.stress()) / (2.0 * h);
            for row in 0..6 {
                let scale = d[(0, 0)];
                assert!(
                    (fd[row] - d[(row, col)]).abs() / scale < 1e-4,
                    "C[{row}][{col}]: fd {} vs {}",
                    fd[row],
                    d[(row, col)]
                );
            }
        }
    }

    #[test]
    fn revert_restores_committed_state_exactly() {
        let mut m = J2Plasticity::new(1, NdMode::ThreeDimensional, params()).unwrap();
        m.set_trial_strain(&uniaxial(3e-3), 0.0).unwrap();
        m.commit_state().unwrap();
        let committed = m.clone();
        m.set_trial_strain(&uniaxial(9e-3), 0.0).unwrap();
        m.revert_to_last_commit().unwrap();
        assert_eq!(m.committed, committed.committed);
        assert_eq!(m.trial, committed.committed);
    }

    #[test]
    fn iteration_cap_returns_warning_with_last_iterate() {
        let mut m = J2Plasticity::new(1, NdMode::ThreeDimensional, params())
            .unwrap()
            .with_config(ReturnMappingConfig {
                max_iterations: 1,
                ..ReturnMappingConfig::default()
            });
        let w = m.set_trial_strain(&uniaxial(1e-2), 0.0).unwrap();
        let w = w.expect("capped iteration must warn");
        assert_eq!(w.iterations, 1);
        assert!(w.residual > w.tolerance);
        assert!(m.xi() > 0.0);
    }

    #[test]
    fn viscosity_needs_positive_dt() {
        let mut p = params();
        p.eta = 10.0;
        let mut m = J2Plasticity::new(1, NdMode::ThreeDimensional, p).unwrap();
        assert!(matches!(
            m.set_trial_strain(&uniaxial(1e-2), 0.0),
            Err(FeError::State(_))
        ));
        assert!(m.set_trial_strain(&uniaxial(1e-2), 0.01).unwrap().is_none());
        let viscous = m.stress()[0];
        let mut rate_independent = J2Plasticity::new(2, NdMode::ThreeDimensional, params()).unwrap();
        rate_independent.set_trial_strain(&uniaxial(1e-2), 0.01).unwrap();
        assert!(viscous > rate_independent.stress()[0]);
    }

    #[test]
    fn plane_stress_drives_sigma33_to_zero() {
        let mut m = J2Plasticity::new(1, NdMode::PlaneStress, params()).unwrap();
        m.set_trial_strain(&DVector::from_vec(vec![4e-4, 1e-4, 0.0]), 0.0)
            .unwrap();
        assert!(m.stress_tensor()[(2, 2)].abs() <= 1e-8);
        let f = E / (1.0 - NU * NU);
        assert!((m.stress()[0] - f * (4e-4 + NU * 1e-4)).abs() < 1e-6);

        m.set_trial_strain(&DVector::from_vec(vec![5e-3, 0.0, 1e-3]), 0.0)
            .unwrap();
        assert!(m.return_mapping_info().plastic);
        assert!(m.stress_tensor()[(2, 2)].abs() <= 1e-8);
    }

    #[test]
    fn elastic_only_never_yields() {
        let p = params();
        let mut m = J2Plasticity::elastic(1, NdMode::PlaneStrain, p.bulk, p.shear).unwrap();
        m.set_trial_strain(&DVector::from_vec(vec![0.5, -0.2, 0.1]), 0.0)
            .unwrap();
        assert!(!m.return_mapping_info().plastic);
        assert_eq!(m.tangent(), m.initial_tangent());
    }

    #[test]
    fn copy_in_other_mode_is_virgin() {
        let mut m = J2Plasticity::new(1, NdMode::ThreeDimensional, params()).unwrap();
        m.set_trial_strain(&uniaxial(1e-2), 0.0).unwrap();
        m.commit_state().unwrap();
        let plate = m.get_copy_as(NdMode::PlateFiber);
        assert_eq!(plate.order(), 5);
        assert_eq!(plate.xi(), 0.0);
        assert_eq!(plate.params, m.params);
    }

    #[test]
    fn rejects_wrong_strain_length() {
        let mut m = J2Plasticity::new(1, NdMode::AxiSymmetric, params()).unwrap();
        assert!(matches!(
            m.set_trial_strain(&DVector::zeros(3), 0.0),
            Err(FeError::DimensionMismatch { .. })
        ));
    }
}
