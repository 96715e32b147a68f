//! Bilinear hysteretic model with capping (snap library).
//!
//! The state lives in a 17-entry history array:
//!
//! | idx | meaning                     | idx | meaning            |
//! |-----|-----------------------------|-----|--------------------|
//! | 0   | deformation `d`             | 9   | cap slope          |
//! | 1   | force `f`                   | 10  | max deformation    |
//! | 2   | tangent                     | 11  | min deformation    |
//! | 3   | excursion (unloading) slope | 12  | positive cap force |
//! | 4   | positive yield force        | 13  | negative cap force |
//! | 5   | negative yield force        | 14  | total energy       |
//! | 6   | hardening slope             | 15  | cyclic energy      |
//! | 7   | positive cap deformation    | 16  | reserved           |
//! | 8   | negative cap deformation    |     |                    |
//!
//! Damage models for strength, stiffness and cap degradation are not linked,
//! so the degradation branch of an excursion is a no-op.

use super::UniaxialMaterial;
use crate::error::{FeError, Result};
use crate::response::{lookup_parameter, ParameterId, Response};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

const HISTORY_LEN: usize = 17;

const PARAMETERS: &[(&[&str], i32)] = &[
    (&["elstk"], 1),
    (&["fyieldPos"], 2),
    (&["fyieldNeg"], 3),
    (&["alfa"], 4),
    (&["alfaCap"], 5),
    (&["capDispPos"], 6),
    (&["capDispNeg"], 7),
    (&["Resfac"], 8),
    (&["flagCapenv"], 9),
];

/// Input parameters of the bilinear model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BilinearParams {
    /// Elastic stiffness
    pub elstk: f64,
    pub fyield_pos: f64,
    pub fyield_neg: f64,
    /// Hardening ratio
    pub alfa: f64,
    /// Cap slope ratio (negative)
    pub alfa_cap: f64,
    pub cap_disp_pos: f64,
    pub cap_disp_neg: f64,
    /// 1 limits the force to the cap force reached so far
    pub flag_capenv: i32,
    /// Residual strength as a fraction of the yield force
    pub resfac: f64,
}

impl BilinearParams {
    fn validate(&self) -> Result<()> {
        let bad = |msg: &str| Err(FeError::Configuration(format!("Bilinear: {msg}")));
        if self.fyield_pos <= 0.0 {
            return bad("positive yield force must be > 0");
        }
        if self.fyield_neg >= 0.0 {
            return bad("negative yield force must be < 0");
        }
        if self.elstk <= 0.0 {
            return bad("elastic stiffness must be > 0");
        }
        if self.alfa_cap >= 0.0 || self.alfa_cap == self.alfa {
            return bad("cap slope ratio must be negative and differ from the hardening ratio");
        }
        if self.cap_disp_pos < self.fyield_pos / self.elstk {
            return bad("positive cap deformation is smaller than the yield deformation");
        }
        if self.cap_disp_neg > self.fyield_neg / self.elstk {
            return bad("negative cap deformation is larger than the yield deformation");
        }
        if !(0.0..=1.0).contains(&self.resfac) {
            return bad("residual strength factor must lie in [0, 1]");
        }
        Ok(())
    }
}

/// Result of an envelope evaluation.
#[derive(Debug, Clone, Copy)]
struct Envelope {
    force: f64,
    tangent: f64,
    cap_force: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bilinear {
    pub id: i32,
    params: BilinearParams,
    hs_trial: [f64; HISTORY_LEN],
    hs_commit: [f64; HISTORY_LEN],
}

impl Bilinear {
    pub fn new(id: i32, params: BilinearParams) -> Result<Self> {
        params.validate()?;
        let mut m = Self {
            id,
            params,
            hs_trial: [0.0; HISTORY_LEN],
            hs_commit: [0.0; HISTORY_LEN],
        };
        m.reset_history();
        Ok(m)
    }

    pub fn params(&self) -> &BilinearParams {
        &self.params
    }

    fn reset_history(&mut self) {
        let p = &self.params;
        let mut hs = [0.0; HISTORY_LEN];
        hs[2] = p.elstk;
        hs[3] = p.elstk;
        hs[4] = p.fyield_pos;
        hs[5] = p.fyield_neg;
        hs[6] = p.alfa * p.elstk;
        hs[7] = p.cap_disp_pos;
        hs[8] = p.cap_disp_neg;
        hs[9] = p.alfa_cap * p.elstk;
        hs[12] = p.fyield_pos + p.alfa * p.elstk * (p.cap_disp_pos - p.fyield_pos / p.elstk);
        hs[13] = p.fyield_neg + p.alfa * p.elstk * (p.cap_disp_neg - p.fyield_neg / p.elstk);
        self.hs_commit = hs;
        self.hs_trial = hs;
    }

    /// Positive backbone: hardening branch, descending cap branch, residual plateau.
    #[allow(clippy::too_many_arguments)]
    fn envel_pos_cap(
        ekelstk: f64,
        fy: f64,
        ekhard: f64,
        dcap: f64,
        ekcap: f64,
        f_res: f64,
        fu_pos: f64,
        d: f64,
    ) -> Envelope {
        let dy = fy / ekelstk;
        let dmin = dy - (fy - f_res) / ekhard;
        let fucap = f_res + (dcap - dmin) * ekhard;
        let d_res = dcap + (f_res - fucap) / ekcap;

        if d < dmin {
            Envelope { force: f_res, tangent: 0.0, cap_force: fu_pos }
        } else if d < dcap {
            Envelope { force: ekhard * (d - dmin) + f_res, tangent: ekhard, cap_force: fu_pos }
        } else if d < d_res {
            let force = fucap + ekcap * (d - dcap);
            Envelope { force, tangent: ekcap, cap_force: fu_pos.min(force) }
        } else {
            Envelope { force: f_res, tangent: 0.0, cap_force: f_res }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn envel_neg_cap(
        ekelstk: f64,
        fy: f64,
        ekhard: f64,
        dcap: f64,
        ekcap: f64,
        f_res: f64,
        fu_neg: f64,
        d: f64,
    ) -> Result<Envelope> {
        if fy > 0.0 || f_res > 0.0 {
            return Err(FeError::Configuration(
                "Bilinear: negative envelope called with positive yield or residual force".into(),
            ));
        }
        let dy = fy / ekelstk;
        let dmax = dy - (fy - f_res) / ekhard;
        let fucap = f_res + (dcap - dmax) * ekhard;
        let d_res = dcap + (f_res - fucap) / ekcap;

        Ok(if d > dmax {
            Envelope { force: f_res, tangent: 0.0, cap_force: fu_neg }
        } else if d > dcap {
            Envelope { force: ekhard * (d - dmax) + f_res, tangent: ekhard, cap_force: fu_neg }
        } else if d > d_res {
            let force = fucap + ekcap * (d - dcap);
            Envelope { force, tangent: ekcap, cap_force: fu_neg.max(force) }
        } else {
            Envelope { force: f_res, tangent: 0.0, cap_force: f_res }
        })
    }

    /// Plastic deformation `d − f/k_unload`.
    pub fn plastic_deformation(&self) -> f64 {
        self.hs_trial[0] - self.hs_trial[1] / self.hs_trial[3]
    }

    /// Unloading stiffness of the current excursion.
    pub fn unloading_stiffness(&self) -> f64 {
        self.hs_trial[3]
    }
}

impl UniaxialMaterial for Bilinear {
    fn set_trial_strain(&mut self, d: f64, _strain_rate: f64) -> Result<()> {
        let p = self.params;
        let hs = &self.hs_commit;
        let d_p = hs[0];
        let f_p = hs[1];
        let ekexcurs = hs[3];
        let fy_pos = hs[4];
        let fy_neg = hs[5];
        let ekhard = hs[6];
        let cp_pos = hs[7];
        let cp_neg = hs[8];
        let ekcap = hs[9];
        let mut dmax = hs[10];
        let mut dmin = hs[11];
        let mut fu_pos = hs[12];
        let mut fu_neg = hs[13];
        let enrgtot = hs[14];
        let enrgc = hs[15];

        let delta_d = d - d_p;
        if d > dmax {
            dmax = d;
        }
        if d < dmin {
            dmin = d;
        }

        // Predictor on the excursion slope, corrected by the backbone.
        let mut f = f_p + ekexcurs * delta_d;
        let mut ek = ekexcurs;
        let (fenv_pos, fenv_neg) = if f >= 0.0 {
            let env = Self::envel_pos_cap(
                ekexcurs,
                fy_pos,
                ekhard,
                cp_pos,
                ekcap,
                p.resfac * p.fyield_pos,
                fu_pos,
                d,
            );
            fu_pos = env.cap_force;
            (env.force, 0.0)
        } else {
            let env = Self::envel_neg_cap(
                ekexcurs,
                fy_neg,
                ekhard,
                cp_neg,
                ekcap,
                p.resfac * p.fyield_neg,
                fu_neg,
                d,
            )?;
            fu_neg = env.cap_force;
            (0.0, env.force)
        };

        if f > fenv_pos {
            f = fenv_pos;
        } else if f < fenv_neg {
            f = fenv_neg;
        }

        if p.flag_capenv == 1 {
            if f > fu_pos {
                f = fu_pos;
            } else if f < fu_neg {
                f = fu_neg;
            }
        }

        if delta_d != 0.0 {
            ek = (f - f_p) / delta_d;
        }

        self.hs_trial = [
            d, f, ek, ekexcurs, fy_pos, fy_neg, ekhard, cp_pos, cp_neg, ekcap, dmax, dmin, fu_pos,
            fu_neg, enrgtot, enrgc, 0.0,
        ];
        Ok(())
    }

    fn strain(&self) -> f64 {
        self.hs_trial[0]
    }

    fn stress(&self) -> f64 {
        self.hs_trial[1]
    }

    fn tangent(&self) -> f64 {
        self.hs_trial[2]
    }

    fn initial_tangent(&self) -> f64 {
        self.params.elstk
    }

    fn commit_state(&mut self) -> Result<()> {
        self.hs_commit = self.hs_trial;
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.hs_trial = self.hs_commit;
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.reset_history();
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "Bilinear"
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        lookup_parameter(PARAMETERS, name)
    }

    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        let p = &mut self.params;
        match id.0 {
            1 => p.elstk = value,
            2 => p.fyield_pos = value,
            3 => p.fyield_neg = value,
            4 => p.alfa = value,
            5 => p.alfa_cap = value,
            6 => p.cap_disp_pos = value,
            7 => p.cap_disp_neg = value,
            8 => p.resfac = value,
            9 => p.flag_capenv = value as i32,
            other => {
                return Err(FeError::UnknownParameter(format!("Bilinear parameter {other}")));
            }
        }
        Ok(())
    }

    fn response_id(&self, name: &str) -> Option<i32> {
        match name {
            "force" | "stress" => Some(1),
            "defo" | "deformation" | "strain" => Some(2),
            "plastic" | "plasticdefo" | "plasticdeformation" | "plasticstrain" => Some(3),
            "stiff" | "stiffness" => Some(4),
            "unloading" | "unloadingstiffness" | "unloadingstiff" => Some(5),
            "damage" | "damages" | "Damage" | "Damages" => Some(6),
            _ => None,
        }
    }

    fn get_response(&self, id: i32) -> Result<Response> {
        match id {
            1 => Ok(Response::Scalar(self.hs_trial[1])),
            2 => Ok(Response::Scalar(self.hs_trial[0])),
            3 => Ok(Response::Scalar(self.plastic_deformation())),
            4 => Ok(Response::Scalar(self.hs_trial[2])),
            5 => Ok(Response::Scalar(self.hs_trial[3])),
            6 => Ok(Response::Vector(DVector::zeros(3))),
            other => Err(FeError::UnknownResponse(other)),
        }
    }
}
