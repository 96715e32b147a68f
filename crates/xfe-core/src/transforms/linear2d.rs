//! Small-displacement 2D beam transformation, with an optional P-Delta term.
//!
//! Basic system: `[axial elongation, rotation at i, rotation at j]`, rotations
//! measured from the chord.

use super::{CrdTransf, CrdTransfBase, local_from_global};
use crate::domain::Node;
use crate::error::{FeError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearCrdTransf2d {
    pub base: CrdTransfBase,
    /// Add the leaning column (P-Delta) geometric terms
    pub p_delta: bool,
}

impl LinearCrdTransf2d {
    pub fn new(tag: i32) -> Self {
        Self {
            base: CrdTransfBase::new(tag),
            p_delta: false,
        }
    }

    pub fn p_delta(tag: i32) -> Self {
        Self {
            base: CrdTransfBase::new(tag),
            p_delta: true,
        }
    }

    pub fn with_rigid_joint_offsets(mut self, offset_i: Option<&[f64]>, offset_j: Option<&[f64]>) -> Result<Self> {
        self.base.set_rigid_joint_offsets(2, offset_i, offset_j)?;
        Ok(self)
    }

    /// `(cos θ, sin θ)` of the chord.
    pub fn direction(&self) -> (f64, f64) {
        let axes = self.base.axes();
        if axes.nrows() < 2 {
            return (1.0, 0.0);
        }
        (axes[(0, 0)], axes[(0, 1)])
    }

    /// `q0/L·(ul1 − ul4)`, the leaning column shear.
    fn p_delta_shear(&self, axial: f64) -> Result<f64> {
        let ul = self.base.local_trial_disp()?;
        Ok(axial * (ul[1] - ul[4]) / self.base.initial_length())
    }
}

impl CrdTransf for LinearCrdTransf2d {
    fn base(&self) -> &CrdTransfBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CrdTransfBase {
        &mut self.base
    }

    fn initialize(&mut self, ni: &Node, nj: &Node) -> Result<()> {
        let dx = self.base.bind_chord(ni, nj, 2, 3)?;
        let l = dx.norm();
        self.base.set_length(l)?;
        let (c, s) = (dx[0] / l, dx[1] / l);
        let axes = DMatrix::from_row_slice(2, 2, &[c, s, -s, c]);
        let t_lg = local_from_global(2, &axes, &self.base);
        let ol = 1.0 / l;
        #[rustfmt::skip]
        let t_bl = DMatrix::from_row_slice(3, 6, &[
            -1.0, 0.0, 0.0, 1.0, 0.0, 0.0,
             0.0,  ol, 1.0, 0.0, -ol, 0.0,
             0.0,  ol, 0.0, 0.0, -ol, 1.0,
        ]);
        self.base.finish_binding(axes, t_lg, t_bl);
        Ok(())
    }

    fn dimension(&self) -> usize {
        2
    }

    /// # Arguments
    /// * `q` - basic forces `[N, M_i, M_j]`
    /// * `p0` - fixed-end forces `[N_i, V_i, V_j]`, or empty
    fn global_resisting_force(&self, q: &DVector<f64>, p0: &DVector<f64>) -> Result<DVector<f64>> {
        if q.len() != 3 {
            return Err(FeError::len("LinearCrdTransf2d::global_resisting_force", 3, q.len()));
        }
        let mut pl = self.base.local_force(q)?;
        match p0.len() {
            0 => {}
            3 => {
                pl[0] += p0[0];
                pl[1] += p0[1];
                pl[4] += p0[2];
            }
            n => return Err(FeError::len("LinearCrdTransf2d::global_resisting_force", 3, n)),
        }
        if self.p_delta {
            let v = self.p_delta_shear(q[0])?;
            pl[1] += v;
            pl[4] -= v;
        }
        self.base.global_from_local_force(&pl)
    }

    fn global_stiff_matrix(&mut self, kb: &DMatrix<f64>, q: &DVector<f64>) -> Result<DMatrix<f64>> {
        if !self.p_delta {
            return self.base.global_stiffness(kb, None);
        }
        if q.len() != 3 {
            return Err(FeError::len("LinearCrdTransf2d::global_stiff_matrix", 3, q.len()));
        }
        let n_over_l = q[0] / self.base.initial_length();
        let mut kl = DMatrix::zeros(6, 6);
        kl[(1, 1)] = n_over_l;
        kl[(4, 4)] = n_over_l;
        kl[(1, 4)] = -n_over_l;
        kl[(4, 1)] = -n_over_l;
        self.base.global_stiffness(kb, Some(&kl))
    }

    fn type_name(&self) -> &'static str {
        if self.p_delta {
            "PDeltaCrdTransf2d"
        } else {
            "LinearCrdTransf2d"
        }
    }
}
