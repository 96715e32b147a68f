//! Zero-length element: uniaxial springs between two (usually coincident) nodes.
//!
//! Each spring acts along one local direction (0-2 translations, 3-5
//! rotations) of the frame defined by `x` and `yprime`. The element type is
//! picked at `set_domain` from the space dimension and the node DOF count.

use super::{Element, ElementBase};
use crate::domain::Domain;
use crate::error::{FeError, Result, StepResult};
use crate::materials::{DynamicMaterial, UniaxialMaterial};
use crate::response::Response;
use log::debug;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Dimension / DOF layout of a zero-length element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZeroLengthKind {
    /// 1D, one DOF per node
    D1N2,
    /// 2D, two translations per node
    D2N4,
    /// 2D, two translations and a rotation per node
    D2N6,
    /// 3D, three translations per node
    D3N6,
    /// 3D, six DOFs per node
    D3N12,
}

impl ZeroLengthKind {
    pub fn from_layout(dimension: usize, ndof: usize) -> Option<Self> {
        match (dimension, ndof) {
            (1, 1) => Some(Self::D1N2),
            (2, 2) => Some(Self::D2N4),
            (2, 3) => Some(Self::D2N6),
            (3, 3) => Some(Self::D3N6),
            (3, 6) => Some(Self::D3N12),
            _ => None,
        }
    }

    pub fn num_dof(self) -> usize {
        match self {
            Self::D1N2 => 2,
            Self::D2N4 => 4,
            Self::D2N6 | Self::D3N6 => 6,
            Self::D3N12 => 12,
        }
    }

    fn has_rotations(self) -> bool {
        matches!(self, Self::D2N6 | Self::D3N12)
    }
}

/// A uniaxial material acting along one local direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub material: DynamicMaterial,
    /// 0, 1, 2: translation along x, y, z; 3, 4, 5: rotation about x, y, z
    pub direction: usize,
}

impl Spring {
    pub fn new(material: impl Into<DynamicMaterial>, direction: usize) -> Self {
        Self {
            material: material.into(),
            direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZeroLength {
    pub base: ElementBase,
    pub dimension: usize,
    pub springs: Vec<Spring>,
    /// Rows: local x, y, z in global components
    axes: Matrix3<f64>,
    kind: Option<ZeroLengthKind>,
    /// One row per spring, `num_dof` columns
    t1d: DMatrix<f64>,
    u_trial: DVector<f64>,
    v_trial: DVector<f64>,
    u_commit: DVector<f64>,
    v_commit: DVector<f64>,
}

impl ZeroLength {
    /// # Arguments
    /// * `dimension` - space dimension, 1 to 3
    /// * `x` - local x axis
    /// * `yprime` - vector in the local x-y plane
    ///
    /// # Errors
    /// `Configuration` for a bad dimension, a direction outside 0..=5 or
    /// degenerate orientation vectors.
    pub fn new(
        tag: i32,
        dimension: usize,
        nodes: [i32; 2],
        x: [f64; 3],
        yprime: [f64; 3],
        springs: Vec<Spring>,
    ) -> Result<Self> {
        if !(1..=3).contains(&dimension) {
            return Err(FeError::Configuration(format!(
                "ZeroLength {tag}: dimension must be 1, 2 or 3, got {dimension}"
            )));
        }
        if springs.is_empty() {
            return Err(FeError::Configuration(format!("ZeroLength {tag}: no materials")));
        }
        if let Some(s) = springs.iter().find(|s| s.direction > 5) {
            return Err(FeError::Configuration(format!(
                "ZeroLength {tag}: direction {} out of range 0-5",
                s.direction
            )));
        }
        let mut el = Self {
            base: ElementBase::new(tag, nodes.to_vec(), 0),
            dimension,
            springs,
            axes: Matrix3::identity(),
            kind: None,
            t1d: DMatrix::zeros(0, 0),
            u_trial: DVector::zeros(0),
            v_trial: DVector::zeros(0),
            u_commit: DVector::zeros(0),
            v_commit: DVector::zeros(0),
        };
        el.update_dir(x, yprime)?;
        Ok(el)
    }

    /// Springs along the global axes.
    pub fn aligned(tag: i32, dimension: usize, nodes: [i32; 2], springs: Vec<Spring>) -> Result<Self> {
        Self::new(tag, dimension, nodes, [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], springs)
    }

    /// Reorient the local frame: `z = x × yprime`, `y = z × x`.
    pub fn update_dir(&mut self, x: [f64; 3], yprime: [f64; 3]) -> Result<()> {
        let x = Vector3::from(x);
        let yp = Vector3::from(yprime);
        let z = x.cross(&yp);
        let y = z.cross(&x);
        let (xn, yn, zn) = (x.norm(), y.norm(), z.norm());
        if xn == 0.0 || yn == 0.0 || zn == 0.0 {
            return Err(FeError::Configuration(format!(
                "ZeroLength {}: x and yprime must be nonzero and not parallel",
                self.base.tag
            )));
        }
        self.axes = Matrix3::from_rows(&[
            (x / xn).transpose(),
            (y / yn).transpose(),
            (z / zn).transpose(),
        ]);
        if let Some(kind) = self.kind {
            self.t1d = self.transformation(kind);
        }
        Ok(())
    }

    pub fn kind(&self) -> Option<ZeroLengthKind> {
        self.kind
    }

    /// Row `i` maps the element displacements to the deformation of spring `i`.
    fn transformation(&self, kind: ZeroLengthKind) -> DMatrix<f64> {
        let n = kind.num_dof();
        let half = n / 2;
        let mut t = DMatrix::zeros(self.springs.len(), n);
        for (i, s) in self.springs.iter().enumerate() {
            let dir = s.direction;
            let idx = dir % 3;
            let trans = dir < 3;
            let a = &self.axes;
            match kind {
                ZeroLengthKind::D1N2 => {
                    if trans {
                        t[(i, 1)] = a[(idx, 0)];
                    }
                }
                ZeroLengthKind::D2N4 => {
                    if trans {
                        t[(i, 2)] = a[(idx, 0)];
                        t[(i, 3)] = a[(idx, 1)];
                    }
                }
                ZeroLengthKind::D2N6 => {
                    if trans {
                        t[(i, 3)] = a[(idx, 0)];
                        t[(i, 4)] = a[(idx, 1)];
                    } else {
                        t[(i, 5)] = a[(idx, 2)];
                    }
                }
                ZeroLengthKind::D3N6 => {
                    if trans {
                        for k in 0..3 {
                            t[(i, 3 + k)] = a[(idx, k)];
                        }
                    }
                }
                ZeroLengthKind::D3N12 => {
                    let c0 = if trans { 6 } else { 9 };
                    for k in 0..3 {
                        t[(i, c0 + k)] = a[(idx, k)];
                    }
                }
            }
            for j in 0..half {
                t[(i, j)] = -t[(i, j + half)];
            }
        }
        t
    }

    /// Spring deformations `t1d·u`.
    pub fn deformations(&self) -> DVector<f64> {
        &self.t1d * &self.u_trial
    }

    fn assemble_matrix(&self, stiffness: impl Fn(&DynamicMaterial) -> f64) -> DMatrix<f64> {
        let n = self.t1d.ncols();
        let mut k = DMatrix::zeros(n, n);
        for (i, s) in self.springs.iter().enumerate() {
            let e = stiffness(&s.material);
            if e == 0.0 {
                continue;
            }
            let row = self.t1d.row(i);
            k += row.transpose() * row * e;
        }
        k * self.base.factor()
    }

    fn material_values(&self, f: impl Fn(&DynamicMaterial) -> f64) -> DVector<f64> {
        DVector::from_iterator(self.springs.len(), self.springs.iter().map(|s| f(&s.material)))
    }

    fn for_each_material(&mut self, f: impl Fn(&mut DynamicMaterial) -> Result<()>) -> Result<()> {
        self.springs.iter_mut().try_for_each(|s| f(&mut s.material))
    }
}

impl Element for ZeroLength {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn num_dof(&self) -> usize {
        self.kind.map_or(0, ZeroLengthKind::num_dof)
    }

    fn set_domain(&mut self, domain: &Domain) -> Result<()> {
        let nodes = self.base.lookup(domain)?;
        let ndof = nodes[0].ndof();
        if nodes[1].ndof() != ndof {
            return Err(FeError::Configuration(format!(
                "ZeroLength {}: nodes {} and {} have different DOF counts",
                self.base.tag, nodes[0].tag, nodes[1].tag
            )));
        }
        let kind = ZeroLengthKind::from_layout(self.dimension, ndof).ok_or_else(|| {
            FeError::Configuration(format!(
                "ZeroLength {}: {ndof} DOFs per node unsupported in {}D",
                self.base.tag, self.dimension
            ))
        })?;
        if !kind.has_rotations() {
            if let Some(s) = self.springs.iter().find(|s| s.direction > 2) {
                return Err(FeError::Configuration(format!(
                    "ZeroLength {}: rotational direction {} on nodes without rotations",
                    self.base.tag, s.direction
                )));
            }
        }
        let (ci, cj) = (nodes[0].crds(), nodes[1].crds());
        if ci.len() != cj.len() {
            return Err(FeError::len("ZeroLength::set_domain", ci.len(), cj.len()));
        }
        let l = (cj - ci).norm();
        if l > f64::EPSILON {
            debug!("ZeroLength {}: nodes are {l} apart", self.base.tag);
        }
        self.kind = Some(kind);
        self.t1d = self.transformation(kind);
        let n = kind.num_dof();
        self.u_trial = DVector::zeros(n);
        self.v_trial = DVector::zeros(n);
        self.u_commit = DVector::zeros(n);
        self.v_commit = DVector::zeros(n);
        *self.base.load_mut() = DVector::zeros(n);
        self.base.mark_bound();
        Ok(())
    }

    fn update(&mut self, domain: &Domain) -> StepResult {
        self.base.require_bound("update")?;
        let nodes = self.base.lookup(domain)?;
        let n = self.t1d.ncols();
        let half = n / 2;
        let mut u = DVector::zeros(n);
        let mut v = DVector::zeros(n);
        for (k, node) in nodes.iter().enumerate() {
            if node.ndof() != half {
                return Err(FeError::len("ZeroLength::update", half, node.ndof()));
            }
            u.rows_mut(k * half, half).copy_from(node.trial_disp());
            v.rows_mut(k * half, half).copy_from(node.trial_vel());
        }
        let strain = &self.t1d * &u;
        let rate = &self.t1d * &v;
        for (i, s) in self.springs.iter_mut().enumerate() {
            s.material.set_trial_strain(strain[i], rate[i])?;
        }
        self.u_trial = u;
        self.v_trial = v;
        self.base.mark_updated()?;
        Ok(None)
    }

    fn tangent_stiff(&mut self) -> Result<DMatrix<f64>> {
        self.base.require_updated("tangent_stiff")?;
        Ok(self.assemble_matrix(|m| m.tangent()))
    }

    fn initial_stiff(&mut self) -> Result<DMatrix<f64>> {
        self.base.require_bound("initial_stiff")?;
        Ok(self.assemble_matrix(|m| m.initial_tangent()))
    }

    fn damp(&self) -> Result<DMatrix<f64>> {
        self.base.require_bound("damp")?;
        Ok(self.assemble_matrix(|m| m.damp_tangent()))
    }

    fn resisting_force(&self) -> Result<DVector<f64>> {
        self.base.require_updated("resisting_force")?;
        let stress = self.material_values(|m| m.stress());
        let p = self.t1d.tr_mul(&stress) - self.base.load();
        Ok(p * self.base.factor())
    }

    fn commit_state(&mut self) -> Result<()> {
        self.base.mark_committed()?;
        self.for_each_material(|m| m.commit_state())?;
        self.u_commit.copy_from(&self.u_trial);
        self.v_commit.copy_from(&self.v_trial);
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.base.mark_reverted()?;
        self.for_each_material(|m| m.revert_to_last_commit())?;
        self.u_trial.copy_from(&self.u_commit);
        self.v_trial.copy_from(&self.v_commit);
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.base.mark_reset();
        self.u_trial.fill(0.0);
        self.v_trial.fill(0.0);
        self.u_commit.fill(0.0);
        self.v_commit.fill(0.0);
        self.for_each_material(|m| m.revert_to_start())
    }

    fn type_name(&self) -> &'static str {
        "ZeroLength"
    }

    fn response_id(&self, name: &str) -> Option<i32> {
        match name {
            "force" | "forces" => Some(1),
            "deformation" | "deformations" => Some(2),
            "stiff" | "stiffness" => Some(3),
            _ => None,
        }
    }

    /// Per spring: 1 = force, 2 = deformation, 3 = tangent.
    fn get_response(&mut self, id: i32) -> Result<Response> {
        self.base.require_updated("get_response")?;
        match id {
            1 => Ok(Response::Vector(self.material_values(|m| m.stress()))),
            2 => Ok(Response::Vector(self.material_values(|m| m.strain()))),
            3 => Ok(Response::Vector(self.material_values(|m| m.tangent()))),
            other => Err(FeError::UnknownResponse(other)),
        }
    }
}
