//! Steel01: bilinear steel with kinematic and optional isotropic hardening.
//!
//! The trial stress is the median of the elastic predictor and the two yield
//! asymptotes of slope `Esh = b·E0`:
//!
//! ```text
//! σ = max(Esh·ε − shiftN·fy(1−b), min(Esh·ε + shiftP·fy(1−b), σc + E0·Δε))
//! ```
//!
//! On a load reversal the asymptote shifts grow with the plastic excursion
//! range according to `a1..a4` (isotropic hardening); with `a1 = a3 = 0` the
//! law is purely kinematic.

use super::UniaxialMaterial;
use crate::error::{FeError, Result};
use crate::response::{lookup_parameter, ParameterId};
use log::warn;
use serde::{Deserialize, Serialize};

pub const DEFAULT_A1: f64 = 0.0;
pub const DEFAULT_A2: f64 = 55.0;
pub const DEFAULT_A3: f64 = 0.0;
pub const DEFAULT_A4: f64 = 55.0;

const PARAMETERS: &[(&[&str], i32)] = &[
    (&["sigmaY", "fy"], 1),
    (&["E"], 2),
    (&["b"], 3),
    (&["a1"], 4),
    (&["a2"], 5),
    (&["a3"], 6),
    (&["a4"], 7),
];

/// Bilinear steel. Field order below is the archive order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Steel01 {
    pub id: i32,
    /// Yield stress
    pub fy: f64,
    /// Initial elastic modulus
    pub e0: f64,
    /// Strain hardening ratio
    pub b: f64,
    pub a1: f64,
    pub a2: f64,
    pub a3: f64,
    pub a4: f64,

    c_strain: f64,
    c_stress: f64,
    c_tangent: f64,
    t_strain: f64,
    t_stress: f64,
    t_tangent: f64,

    c_min_strain: f64,
    c_max_strain: f64,
    c_shift_p: f64,
    c_shift_n: f64,

    /// Loading direction: 0 virgin, 1 loading, -1 unloading
    c_loading: i32,
    t_loading: i32,

    t_min_strain: f64,
    t_max_strain: f64,
    t_shift_p: f64,
    t_shift_n: f64,
}

impl Steel01 {
    /// Kinematic hardening only (`a1..a4` at their defaults).
    pub fn new(id: i32, fy: f64, e0: f64, b: f64) -> Self {
        Self::with_isotropic_hardening(id, fy, e0, b, DEFAULT_A1, DEFAULT_A2, DEFAULT_A3, DEFAULT_A4)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_isotropic_hardening(
        id: i32,
        fy: f64,
        e0: f64,
        b: f64,
        a1: f64,
        a2: f64,
        a3: f64,
        a4: f64,
    ) -> Self {
        let mut steel = Self {
            id,
            fy,
            e0,
            b,
            a1,
            a2,
            a3,
            a4,
            c_strain: 0.0,
            c_stress: 0.0,
            c_tangent: e0,
            t_strain: 0.0,
            t_stress: 0.0,
            t_tangent: e0,
            c_min_strain: 0.0,
            c_max_strain: 0.0,
            c_shift_p: 1.0,
            c_shift_n: 1.0,
            c_loading: 0,
            t_loading: 0,
            t_min_strain: 0.0,
            t_max_strain: 0.0,
            t_shift_p: 1.0,
            t_shift_n: 1.0,
        };
        steel.setup_parameters();
        steel
    }

    /// Hardening modulus `b·E0`
    pub fn esh(&self) -> f64 {
        self.b * self.e0
    }

    /// Yield strain `fy/E0`
    pub fn epsy(&self) -> f64 {
        self.fy / self.e0
    }

    fn setup_parameters(&mut self) {
        self.c_min_strain = 0.0;
        self.c_max_strain = 0.0;
        self.c_shift_p = 1.0;
        self.c_shift_n = 1.0;
        self.c_loading = 0;
        self.t_min_strain = 0.0;
        self.t_max_strain = 0.0;
        self.t_shift_p = 1.0;
        self.t_shift_n = 1.0;
        self.t_loading = 0;
        self.c_strain = 0.0;
        self.c_stress = 0.0;
        self.c_tangent = self.e0;
        self.t_strain = 0.0;
        self.t_stress = 0.0;
        self.t_tangent = self.e0;
    }

    fn determine_trial_state(&mut self, d_strain: f64) {
        let fy_one_minus_b = self.fy * (1.0 - self.b);
        let esh = self.esh();
        let epsy = self.epsy();

        let c1 = esh * self.t_strain;
        let c2 = self.t_shift_n * fy_one_minus_b;
        let c3 = self.t_shift_p * fy_one_minus_b;
        let c = self.c_stress + self.e0 * d_strain;

        self.t_stress = (c1 - c2).max((c1 + c3).min(c));
        self.t_tangent = if (self.t_stress - c).abs() < f64::EPSILON {
            self.e0
        } else {
            esh
        };

        self.detect_load_reversal(d_strain, epsy);
    }

    fn detect_load_reversal(&mut self, d_strain: f64, epsy: f64) {
        if self.t_loading == 0 && d_strain != 0.0 {
            self.t_loading = if d_strain > 0.0 { 1 } else { -1 };
        }

        if self.t_loading == 1 && d_strain < 0.0 {
            self.t_loading = -1;
            if self.c_strain > self.t_max_strain {
                self.t_max_strain = self.c_strain;
            }
            self.t_shift_n = 1.0
                + self.a1
                    * ((self.t_max_strain - self.t_min_strain) / (2.0 * self.a2 * epsy)).powf(0.8);
        }

        if self.t_loading == -1 && d_strain > 0.0 {
            self.t_loading = 1;
            if self.c_strain < self.t_min_strain {
                self.t_min_strain = self.c_strain;
            }
            self.t_shift_p = 1.0
                + self.a3
                    * ((self.t_max_strain - self.t_min_strain) / (2.0 * self.a4 * epsy)).powf(0.8);
        }
    }

    fn reset_trial_history(&mut self) {
        self.t_min_strain = self.c_min_strain;
        self.t_max_strain = self.c_max_strain;
        self.t_shift_p = self.c_shift_p;
        self.t_shift_n = self.c_shift_n;
        self.t_loading = self.c_loading;
        self.t_strain = self.c_strain;
        self.t_stress = self.c_stress;
        self.t_tangent = self.c_tangent;
    }
}

impl UniaxialMaterial for Steel01 {
    fn set_trial_strain(&mut self, strain: f64, _strain_rate: f64) -> Result<()> {
        if strain.abs() > (10.0 * self.epsy()).abs() {
            warn!(
                "Steel01 {}: strain {strain:.6e} exceeds ten times the yield strain",
                self.id
            );
        }
        self.reset_trial_history();

        let d_strain = strain - self.c_strain;
        if d_strain.abs() > f64::EPSILON {
            self.t_strain = strain;
            self.determine_trial_state(d_strain);
        }
        Ok(())
    }

    fn strain(&self) -> f64 {
        self.t_strain
    }

    fn stress(&self) -> f64 {
        self.t_stress
    }

    fn tangent(&self) -> f64 {
        self.t_tangent
    }

    fn initial_tangent(&self) -> f64 {
        self.e0
    }

    fn commit_state(&mut self) -> Result<()> {
        self.c_min_strain = self.t_min_strain;
        self.c_max_strain = self.t_max_strain;
        self.c_shift_p = self.t_shift_p;
        self.c_shift_n = self.t_shift_n;
        self.c_loading = self.t_loading;
        self.c_strain = self.t_strain;
        self.c_stress = self.t_stress;
        self.c_tangent = self.t_tangent;
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.reset_trial_history();
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.setup_parameters();
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "Steel01"
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        lookup_parameter(PARAMETERS, name)
    }

    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        match id.0 {
            1 => self.fy = value,
            2 => self.e0 = value,
            3 => self.b = value,
            4 => self.a1 = value,
            5 => self.a2 = value,
            6 => self.a3 = value,
            7 => self.a4 = value,
            other => {
                return Err(FeError::UnknownParameter(format!("Steel01 parameter {other}")));
            }
        }
        self.t_tangent = self.e0;
        Ok(())
    }
}
