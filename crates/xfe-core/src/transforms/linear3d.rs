//! Small-displacement 3D beam transformation.
//!
//! The local x axis runs from joint i to joint j; `vecxz` is any vector in the
//! local x-z plane, giving `y = vecxz × x` and `z = x × y`. Basic system:
//! `[N, θz_i, θz_j, θy_i, θy_j, twist]`.

use super::{CrdTransf, CrdTransfBase, local_from_global};
use crate::domain::Node;
use crate::error::{FeError, Result};
use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearCrdTransf3d {
    pub base: CrdTransfBase,
    pub vecxz: [f64; 3],
}

impl LinearCrdTransf3d {
    pub fn new(tag: i32, vecxz: [f64; 3]) -> Self {
        Self {
            base: CrdTransfBase::new(tag),
            vecxz,
        }
    }

    pub fn with_rigid_joint_offsets(mut self, offset_i: Option<&[f64]>, offset_j: Option<&[f64]>) -> Result<Self> {
        self.base.set_rigid_joint_offsets(3, offset_i, offset_j)?;
        Ok(self)
    }
}

impl CrdTransf for LinearCrdTransf3d {
    fn base(&self) -> &CrdTransfBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut CrdTransfBase {
        &mut self.base
    }

    fn initialize(&mut self, ni: &Node, nj: &Node) -> Result<()> {
        let dx = self.base.bind_chord(ni, nj, 3, 6)?;
        let l = dx.norm();
        self.base.set_length(l)?;
        let x = Vector3::new(dx[0], dx[1], dx[2]) / l;
        let v = Vector3::from(self.vecxz);
        let y = v.cross(&x);
        let ny = y.norm();
        if ny == 0.0 {
            return Err(FeError::Configuration(format!(
                "crdTransf {}: vecxz {:?} is parallel to the element axis",
                self.base.tag, self.vecxz
            )));
        }
        let y = y / ny;
        let z = x.cross(&y);
        let axes = DMatrix::from_row_slice(3, 3, &[x[0], x[1], x[2], y[0], y[1], y[2], z[0], z[1], z[2]]);
        let t_lg = local_from_global(3, &axes, &self.base);

        let ol = 1.0 / l;
        let mut t_bl = DMatrix::zeros(6, 12);
        t_bl[(0, 0)] = -1.0;
        t_bl[(0, 6)] = 1.0;
        for (row, rot) in [(1, 5), (2, 11)] {
            t_bl[(row, 1)] = ol;
            t_bl[(row, 7)] = -ol;
            t_bl[(row, rot)] = 1.0;
        }
        for (row, rot) in [(3, 4), (4, 10)] {
            t_bl[(row, 8)] = ol;
            t_bl[(row, 2)] = -ol;
            t_bl[(row, rot)] = 1.0;
        }
        t_bl[(5, 3)] = -1.0;
        t_bl[(5, 9)] = 1.0;

        self.base.finish_binding(axes, t_lg, t_bl);
        Ok(())
    }

    fn dimension(&self) -> usize {
        3
    }

    /// `p0` holds `[N_i, Vy_i, Vy_j, Vz_i, Vz_j]` or is empty.
    fn global_resisting_force(&self, q: &DVector<f64>, p0: &DVector<f64>) -> Result<DVector<f64>> {
        if q.len() != 6 {
            return Err(FeError::len("LinearCrdTransf3d::global_resisting_force", 6, q.len()));
        }
        let mut pl = self.base.local_force(q)?;
        match p0.len() {
            0 => {}
            5 => {
                pl[0] += p0[0];
                pl[1] += p0[1];
                pl[7] += p0[2];
                pl[2] += p0[3];
                pl[8] += p0[4];
            }
            n => return Err(FeError::len("LinearCrdTransf3d::global_resisting_force", 5, n)),
        }
        self.base.global_from_local_force(&pl)
    }

    fn global_stiff_matrix(&mut self, kb: &DMatrix<f64>, _q: &DVector<f64>) -> Result<DMatrix<f64>> {
        self.base.global_stiffness(kb, None)
    }

    fn type_name(&self) -> &'static str {
        "LinearCrdTransf3d"
    }
}
