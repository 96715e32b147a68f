//! Coordinate transformations between global, local and basic systems.
//!
//! - **global**: structure DOFs as stored on the nodes
//! - **local**: element-aligned axes, rigid joint offsets folded in
//! - **basic**: deformation-only DOFs with the rigid body modes removed
//!
//! Beam transformations keep the two operators explicitly, `T_lg` (global →
//! local) and `T_bl` (local → basic), and transform stiffness with a
//! per-instance [`TripleProduct`] scratch.
//!
//! - [`LinearCrdTransf2d`]: small-displacement 2D transformation, optionally P-Delta
//! - [`LinearCrdTransf3d`]: small-displacement 3D transformation oriented by `vecxz`
//! - [`ShellLinearCrdTransf3d`]: flat shell frame from four corner nodes

use crate::domain::Node;
use crate::error::{FeError, Result};
use crate::numeric::{TripleProduct, mat_vec, transpose_mat_vec};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

pub mod linear2d;
pub mod linear3d;
pub mod shell;

pub use linear2d::LinearCrdTransf2d;
pub use linear3d::LinearCrdTransf3d;
pub use shell::ShellLinearCrdTransf3d;

/// State shared by the two-node beam transformations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrdTransfBase {
    pub tag: i32,
    /// Reference length, frozen by `initialize`
    l: f64,
    node_i_offset: Option<DVector<f64>>,
    node_j_offset: Option<DVector<f64>>,
    node_i_initial_disp: Option<DVector<f64>>,
    node_j_initial_disp: Option<DVector<f64>>,
    initial_disp_checked: bool,
    /// Coordinates of node i (space dimension)
    crd_i: DVector<f64>,
    /// Rows are the local axes expressed in global components
    axes: DMatrix<f64>,
    t_lg: DMatrix<f64>,
    t_bl: DMatrix<f64>,
    ug_trial: DVector<f64>,
    ug_commit: DVector<f64>,
    vg_trial: DVector<f64>,
    ag_trial: DVector<f64>,
    bound: bool,
    #[serde(skip)]
    scratch_bl: TripleProduct,
    #[serde(skip)]
    scratch_lg: TripleProduct,
}

impl PartialEq for CrdTransfBase {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.l == other.l
            && self.node_i_offset == other.node_i_offset
            && self.node_j_offset == other.node_j_offset
            && self.node_i_initial_disp == other.node_i_initial_disp
            && self.node_j_initial_disp == other.node_j_initial_disp
            && self.initial_disp_checked == other.initial_disp_checked
            && self.crd_i == other.crd_i
            && self.axes == other.axes
            && self.t_lg == other.t_lg
            && self.t_bl == other.t_bl
            && self.ug_trial == other.ug_trial
            && self.ug_commit == other.ug_commit
            && self.vg_trial == other.vg_trial
            && self.ag_trial == other.ag_trial
            && self.bound == other.bound
    }
}

impl CrdTransfBase {
    pub fn new(tag: i32) -> Self {
        Self {
            tag,
            ..Default::default()
        }
    }

    /// Set rigid joint offsets; `None` clears an offset.
    pub fn set_rigid_joint_offsets(
        &mut self,
        dim: usize,
        offset_i: Option<&[f64]>,
        offset_j: Option<&[f64]>,
    ) -> Result<()> {
        let check = |o: Option<&[f64]>| -> Result<Option<DVector<f64>>> {
            match o {
                None => Ok(None),
                Some(v) if v.len() == dim => Ok(Some(DVector::from_column_slice(v))),
                Some(v) => Err(FeError::Configuration(format!(
                    "crdTransf {}: rigid joint offset needs {dim} components, got {}",
                    self.tag,
                    v.len()
                ))),
            }
        };
        let oi = check(offset_i)?;
        let oj = check(offset_j)?;
        self.node_i_offset = oi;
        self.node_j_offset = oj;
        Ok(())
    }

    pub fn node_i_offset(&self) -> Option<&DVector<f64>> {
        self.node_i_offset.as_ref()
    }

    pub fn node_j_offset(&self) -> Option<&DVector<f64>> {
        self.node_j_offset.as_ref()
    }

    pub fn initial_length(&self) -> f64 {
        self.l
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn t_lg(&self) -> &DMatrix<f64> {
        &self.t_lg
    }

    pub fn t_bl(&self) -> &DMatrix<f64> {
        &self.t_bl
    }

    /// Rows are the local x, y (and z) axes.
    pub fn axes(&self) -> &DMatrix<f64> {
        &self.axes
    }

    /// Check DOF counts, record nonzero initial displacements once and return
    /// the chord vector from joint i to joint j in global components.
    fn bind_chord(&mut self, ni: &Node, nj: &Node, dim: usize, ndof: usize) -> Result<DVector<f64>> {
        for n in [ni, nj] {
            if n.ndof() != ndof {
                return Err(FeError::Configuration(format!(
                    "crdTransf {}: node {} has {} DOFs, expected {ndof}",
                    self.tag,
                    n.tag,
                    n.ndof()
                )));
            }
            if n.crds().len() < dim {
                return Err(FeError::Configuration(format!(
                    "crdTransf {}: node {} needs {dim} coordinates",
                    self.tag, n.tag
                )));
            }
        }
        if !self.initial_disp_checked {
            let nonzero = |n: &Node| {
                let d = n.trial_disp();
                (d.norm() > 0.0).then(|| d.clone())
            };
            self.node_i_initial_disp = nonzero(ni);
            self.node_j_initial_disp = nonzero(nj);
            self.initial_disp_checked = true;
        }

        let crd_i = ni.crds().rows(0, dim).into_owned();
        let mut dx = nj.crds().rows(0, dim) - &crd_i;
        if let Some(d) = &self.node_j_initial_disp {
            dx += d.rows(0, dim);
        }
        if let Some(d) = &self.node_i_initial_disp {
            dx -= d.rows(0, dim);
        }
        if let Some(o) = &self.node_j_offset {
            dx += o;
        }
        if let Some(o) = &self.node_i_offset {
            dx -= o;
        }
        self.crd_i = crd_i;
        Ok(dx)
    }

    fn set_length(&mut self, l: f64) -> Result<()> {
        if l == 0.0 {
            return Err(FeError::Configuration(format!(
                "crdTransf {}: element has zero length",
                self.tag
            )));
        }
        self.l = l;
        Ok(())
    }

    /// Pull the nodal kinematics the basic queries work from.
    fn gather(&mut self, ni: &Node, nj: &Node) -> Result<()> {
        if !self.bound {
            return Err(FeError::State(format!(
                "crdTransf {}: update before initialize",
                self.tag
            )));
        }
        let stack = |a: &DVector<f64>, b: &DVector<f64>| {
            DVector::from_iterator(a.len() + b.len(), a.iter().chain(b.iter()).copied())
        };
        let n = self.t_lg.ncols();
        let ug = stack(ni.trial_disp(), nj.trial_disp());
        if ug.len() != n {
            return Err(FeError::len("CrdTransf::update", n, ug.len()));
        }
        let mut u0 = DVector::zeros(n);
        let half = n / 2;
        if let Some(d) = &self.node_i_initial_disp {
            u0.rows_mut(0, half).copy_from(d);
        }
        if let Some(d) = &self.node_j_initial_disp {
            u0.rows_mut(half, half).copy_from(d);
        }
        self.ug_trial = &ug - &u0;
        self.ug_commit = stack(ni.commit_disp(), nj.commit_disp()) - &u0;
        self.vg_trial = stack(ni.trial_vel(), nj.trial_vel());
        self.ag_trial = stack(ni.trial_accel(), nj.trial_accel());
        Ok(())
    }

    fn to_basic(&self, ug: &DVector<f64>) -> Result<DVector<f64>> {
        mat_vec(&self.t_bl, &mat_vec(&self.t_lg, ug)?)
    }

    /// Local displacements from the last update.
    pub fn local_trial_disp(&self) -> Result<DVector<f64>> {
        mat_vec(&self.t_lg, &self.ug_trial)
    }

    /// `p_l = T_blᵗ·q`, before fixed-end forces are added.
    pub fn local_force(&self, q: &DVector<f64>) -> Result<DVector<f64>> {
        transpose_mat_vec(&self.t_bl, q)
    }

    /// `p_g = T_lgᵗ·p_l`
    pub fn global_from_local_force(&self, pl: &DVector<f64>) -> Result<DVector<f64>> {
        transpose_mat_vec(&self.t_lg, pl)
    }

    /// `T_lgᵗ·(T_blᵗ·kb·T_bl + kl)·T_lg`; `kl` is an extra local contribution.
    pub fn global_stiffness(&mut self, kb: &DMatrix<f64>, kl: Option<&DMatrix<f64>>) -> Result<DMatrix<f64>> {
        let nl = self.t_bl.ncols();
        let mut local = match kl {
            Some(kl) if kl.shape() == (nl, nl) => kl.clone(),
            Some(kl) => return Err(FeError::dims("CrdTransf::global_stiffness", (nl, nl), kl.shape())),
            None => DMatrix::zeros(nl, nl),
        };
        self.scratch_bl.add_to(&mut local, 1.0, &self.t_bl, kb, 1.0)?;
        let n = self.t_lg.ncols();
        let mut kg = DMatrix::zeros(n, n);
        self.scratch_lg.add_to(&mut kg, 0.0, &self.t_lg, &local, 1.0)?;
        Ok(kg)
    }

    pub fn point_global_coord_from_local(&self, xl: &DVector<f64>) -> Result<DVector<f64>> {
        let mut xg = transpose_mat_vec(&self.axes, xl)?;
        xg += &self.crd_i;
        if let Some(o) = &self.node_i_offset {
            xg += o;
        }
        Ok(xg)
    }

    pub fn point_local_coord_from_global(&self, xg: &DVector<f64>) -> Result<DVector<f64>> {
        if xg.len() != self.crd_i.len() {
            return Err(FeError::len(
                "CrdTransf::point_local_coord_from_global",
                self.crd_i.len(),
                xg.len(),
            ));
        }
        let mut d = xg - &self.crd_i;
        if let Some(o) = &self.node_i_offset {
            d -= o;
        }
        mat_vec(&self.axes, &d)
    }

    fn finish_binding(&mut self, axes: DMatrix<f64>, t_lg: DMatrix<f64>, t_bl: DMatrix<f64>) {
        let n = t_lg.ncols();
        self.scratch_bl = TripleProduct::with_dims(t_bl.nrows(), t_bl.ncols());
        self.scratch_lg = TripleProduct::with_dims(n, n);
        self.axes = axes;
        self.t_lg = t_lg;
        self.t_bl = t_bl;
        self.ug_trial = DVector::zeros(n);
        self.ug_commit = DVector::zeros(n);
        self.vg_trial = DVector::zeros(n);
        self.ag_trial = DVector::zeros(n);
        self.bound = true;
        debug!("crdTransf {}: bound, L = {}", self.tag, self.l);
    }
}

/// Two-node beam coordinate transformation.
pub trait CrdTransf {
    fn base(&self) -> &CrdTransfBase;
    fn base_mut(&mut self) -> &mut CrdTransfBase;

    /// Bind to the element end nodes and freeze the reference length.
    ///
    /// # Errors
    /// `Configuration` on DOF mismatch, zero length or a degenerate orientation.
    fn initialize(&mut self, ni: &Node, nj: &Node) -> Result<()>;

    /// Pull the current trial nodal kinematics.
    fn update(&mut self, ni: &Node, nj: &Node) -> Result<()> {
        self.base_mut().gather(ni, nj)
    }

    /// Space dimension (2 or 3).
    fn dimension(&self) -> usize;

    fn num_basic_dof(&self) -> usize {
        self.base().t_bl.nrows()
    }

    fn num_global_dof(&self) -> usize {
        self.base().t_lg.ncols()
    }

    fn initial_length(&self) -> f64 {
        self.base().initial_length()
    }

    /// Equal to the initial length for small-displacement transformations.
    fn deformed_length(&self) -> f64 {
        self.initial_length()
    }

    fn basic_trial_disp(&self) -> Result<DVector<f64>> {
        let b = self.base();
        b.to_basic(&b.ug_trial)
    }

    /// Basic displacement increment since the last nodal commit.
    fn basic_incr_disp(&self) -> Result<DVector<f64>> {
        let b = self.base();
        if b.ug_commit.len() != b.ug_trial.len() {
            return Err(FeError::len("CrdTransf::basic_incr_disp", b.ug_trial.len(), b.ug_commit.len()));
        }
        b.to_basic(&(&b.ug_trial - &b.ug_commit))
    }

    fn basic_trial_vel(&self) -> Result<DVector<f64>> {
        let b = self.base();
        b.to_basic(&b.vg_trial)
    }

    fn basic_trial_accel(&self) -> Result<DVector<f64>> {
        let b = self.base();
        b.to_basic(&b.ag_trial)
    }

    /// Global end forces from basic forces `q` and fixed-end forces `p0`.
    fn global_resisting_force(&self, q: &DVector<f64>, p0: &DVector<f64>) -> Result<DVector<f64>>;

    fn global_stiff_matrix(&mut self, kb: &DMatrix<f64>, q: &DVector<f64>) -> Result<DMatrix<f64>>;

    fn initial_global_stiff_matrix(&mut self, kb: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        self.base_mut().global_stiffness(kb, None)
    }

    /// Local axes as matrix rows.
    fn local_axes(&self) -> DMatrix<f64> {
        self.base().axes.clone()
    }

    fn point_global_coord_from_local(&self, xl: &DVector<f64>) -> Result<DVector<f64>> {
        self.base().point_global_coord_from_local(xl)
    }

    fn point_local_coord_from_global(&self, xg: &DVector<f64>) -> Result<DVector<f64>> {
        self.base().point_local_coord_from_global(xg)
    }

    /// Point at basic coordinate `xi ∈ [0, 1]` along the chord.
    fn point_global_coord_from_basic(&self, xi: f64) -> Result<DVector<f64>> {
        let mut xl = DVector::zeros(self.dimension());
        xl[0] = xi * self.initial_length();
        self.point_global_coord_from_local(&xl)
    }

    /// `x_local / L`
    fn point_basic_coord_from_global(&self, xg: &DVector<f64>) -> Result<f64> {
        let xl = self.point_local_coord_from_global(xg)?;
        Ok(xl[0] / self.initial_length())
    }

    fn vector_global_coord_from_local(&self, v: &DVector<f64>) -> Result<DVector<f64>> {
        transpose_mat_vec(&self.base().axes, v)
    }

    fn vector_local_coord_from_global(&self, v: &DVector<f64>) -> Result<DVector<f64>> {
        mat_vec(&self.base().axes, v)
    }

    fn commit_state(&mut self) -> Result<()> {
        let b = self.base_mut();
        b.ug_commit.copy_from(&b.ug_trial);
        Ok(())
    }

    /// Restore the trial displacements to the last committed ones.
    fn revert_to_last_commit(&mut self) -> Result<()> {
        let b = self.base_mut();
        b.ug_trial.copy_from(&b.ug_commit);
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        let b = self.base_mut();
        b.ug_trial.fill(0.0);
        b.ug_commit.fill(0.0);
        b.vg_trial.fill(0.0);
        b.ag_trial.fill(0.0);
        Ok(())
    }

    fn type_name(&self) -> &'static str;
}

/// Rigid link block `u_joint = u_node + θ × o` for one node.
fn offset_block(dim: usize, offset: Option<&DVector<f64>>) -> DMatrix<f64> {
    let ndof = if dim == 2 { 3 } else { 6 };
    let mut t = DMatrix::identity(ndof, ndof);
    if let Some(o) = offset {
        if dim == 2 {
            t[(0, 2)] = -o[1];
            t[(1, 2)] = o[0];
        } else {
            t[(0, 4)] = o[2];
            t[(0, 5)] = -o[1];
            t[(1, 3)] = -o[2];
            t[(1, 5)] = o[0];
            t[(2, 3)] = o[1];
            t[(2, 4)] = -o[0];
        }
    }
    t
}

/// `T_lg` for a two-node element: rotate each translational and rotational
/// block by `axes` after applying the joint offsets.
fn local_from_global(dim: usize, axes: &DMatrix<f64>, base: &CrdTransfBase) -> DMatrix<f64> {
    let ndof = if dim == 2 { 3 } else { 6 };
    let mut rot = DMatrix::zeros(ndof, ndof);
    if dim == 2 {
        rot.view_mut((0, 0), (2, 2)).copy_from(axes);
        rot[(2, 2)] = 1.0;
    } else {
        rot.view_mut((0, 0), (3, 3)).copy_from(axes);
        rot.view_mut((3, 3), (3, 3)).copy_from(axes);
    }
    let mut t = DMatrix::zeros(2 * ndof, 2 * ndof);
    let ti = &rot * offset_block(dim, base.node_i_offset.as_ref());
    let tj = &rot * offset_block(dim, base.node_j_offset.as_ref());
    t.view_mut((0, 0), (ndof, ndof)).copy_from(&ti);
    t.view_mut((ndof, ndof), (ndof, ndof)).copy_from(&tj);
    t
}
