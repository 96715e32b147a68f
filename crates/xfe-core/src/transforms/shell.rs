//! Flat four-node shell frame.
//!
//! `g1` follows the mean direction of edges 0→1 and 3→2, `g2` the mean of
//! edges 0→3 and 1→2 orthogonalized against `g1`, and `g3 = g1 × g2`. Node
//! coordinates are projected onto `(g1, g2)` for the in-plane geometry.

use crate::domain::Node;
use crate::error::{FeError, Result};
use crate::numeric::TripleProduct;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Six DOFs per node, four nodes.
pub const SHELL_DOF: usize = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellLinearCrdTransf3d {
    pub tag: i32,
    centroid: Vector3<f64>,
    g1: Vector3<f64>,
    g2: Vector3<f64>,
    g3: Vector3<f64>,
    /// In-plane nodal coordinates, `xl[0]` along g1 and `xl[1]` along g2
    xl: [[f64; 4]; 2],
    ug_trial: Vec<f64>,
    vg_trial: Vec<f64>,
    ag_trial: Vec<f64>,
    bound: bool,
    #[serde(skip)]
    scratch: TripleProduct,
}

impl PartialEq for ShellLinearCrdTransf3d {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.centroid == other.centroid
            && self.g1 == other.g1
            && self.g2 == other.g2
            && self.g3 == other.g3
            && self.xl == other.xl
            && self.ug_trial == other.ug_trial
            && self.vg_trial == other.vg_trial
            && self.ag_trial == other.ag_trial
            && self.bound == other.bound
    }
}

impl ShellLinearCrdTransf3d {
    pub fn new(tag: i32) -> Self {
        Self {
            tag,
            centroid: Vector3::zeros(),
            g1: Vector3::zeros(),
            g2: Vector3::zeros(),
            g3: Vector3::zeros(),
            xl: [[0.0; 4]; 2],
            ug_trial: vec![0.0; SHELL_DOF],
            vg_trial: vec![0.0; SHELL_DOF],
            ag_trial: vec![0.0; SHELL_DOF],
            bound: false,
            scratch: TripleProduct::default(),
        }
    }

    /// Compute the local frame from the corner nodes (counterclockwise order).
    pub fn initialize(&mut self, nodes: [&Node; 4]) -> Result<()> {
        let mut c = [Vector3::zeros(); 4];
        for (i, n) in nodes.iter().enumerate() {
            if n.ndof() != 6 || n.crds().len() != 3 {
                return Err(FeError::Configuration(format!(
                    "shell crdTransf {}: node {} must have 3 coordinates and 6 DOFs",
                    self.tag, n.tag
                )));
            }
            let x = n.crds();
            c[i] = Vector3::new(x[0], x[1], x[2]);
        }
        self.centroid = (c[0] + c[1] + c[2] + c[3]) / 4.0;

        let v1 = 0.5 * (c[2] + c[1] - c[3] - c[0]);
        let mut v2 = 0.5 * (c[3] + c[2] - c[1] - c[0]);
        let n1 = v1.norm();
        if n1 == 0.0 {
            return Err(self.degenerate());
        }
        let g1 = v1 / n1;
        v2 -= g1 * v2.dot(&g1);
        let n2 = v2.norm();
        if n2 == 0.0 {
            return Err(self.degenerate());
        }
        let g2 = v2 / n2;
        self.g1 = g1;
        self.g2 = g2;
        self.g3 = g1.cross(&g2);
        for (i, ci) in c.iter().enumerate() {
            self.xl[0][i] = ci.dot(&self.g1);
            self.xl[1][i] = ci.dot(&self.g2);
        }
        self.ug_trial = vec![0.0; SHELL_DOF];
        self.vg_trial = vec![0.0; SHELL_DOF];
        self.ag_trial = vec![0.0; SHELL_DOF];
        self.scratch = TripleProduct::with_dims(SHELL_DOF, SHELL_DOF);
        self.bound = true;
        Ok(())
    }

    fn degenerate(&self) -> FeError {
        FeError::Configuration(format!("shell crdTransf {}: degenerate quadrilateral", self.tag))
    }

    /// Cache the nodal kinematics used by the basic queries.
    pub fn update(&mut self, nodes: [&Node; 4]) -> Result<()> {
        if !self.bound {
            return Err(FeError::State(format!(
                "shell crdTransf {}: update before initialize",
                self.tag
            )));
        }
        for (i, n) in nodes.iter().enumerate() {
            if n.ndof() != 6 {
                return Err(FeError::len("ShellLinearCrdTransf3d::update", 6, n.ndof()));
            }
            let r = 6 * i..6 * i + 6;
            self.ug_trial[r.clone()].copy_from_slice(n.trial_disp().as_slice());
            self.vg_trial[r.clone()].copy_from_slice(n.trial_vel().as_slice());
            self.ag_trial[r].copy_from_slice(n.trial_accel().as_slice());
        }
        Ok(())
    }

    pub fn g1(&self) -> &Vector3<f64> {
        &self.g1
    }

    pub fn g2(&self) -> &Vector3<f64> {
        &self.g2
    }

    pub fn g3(&self) -> &Vector3<f64> {
        &self.g3
    }

    pub fn centroid(&self) -> &Vector3<f64> {
        &self.centroid
    }

    /// In-plane nodal coordinates.
    pub fn nodal_local_coordinates(&self) -> [[f64; 4]; 2] {
        self.xl
    }

    /// Rows g1, g2, g3.
    pub fn trf_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_rows(&[self.g1.transpose(), self.g2.transpose(), self.g3.transpose()])
    }

    /// Coordinates of `p` in the `(g1, g2)` frame.
    pub fn local_coordinates(&self, p: &Vector3<f64>) -> (f64, f64) {
        (p.dot(&self.g1), p.dot(&self.g2))
    }

    /// Orthogonal projection of `p` onto the mid-plane.
    pub fn project(&self, p: &Vector3<f64>) -> Vector3<f64> {
        p - self.g3 * (p - self.centroid).dot(&self.g3)
    }

    /// Closed-form inverse of the bilinear isoparametric map: natural `(r, s)`
    /// of a point in the plane of the shell.
    pub fn natural_coordinates(&self, p: &Vector3<f64>) -> (f64, f64) {
        let [x1, x2, x3, x4] = self.xl[0];
        let [y1, y2, y3, y4] = self.xl[1];
        let xb = x1 - x2 + x3 - x4;
        let yb = y1 - y2 + y3 - y4;
        let xc_chi = x1 + x2 - x3 - x4;
        let yc_chi = y1 + y2 - y3 - y4;
        let xc_eta = x1 - x2 - x3 + x4;
        let yc_eta = y1 - y2 - y3 + y4;
        let x0 = (x1 + x2 + x3 + x4) / 4.0;
        let y0 = (y1 + y2 + y3 + y4) / 4.0;
        let j0 = (x3 - x1) * (y4 - y2) - (x4 - x2) * (y3 - y1);
        let a = j0 / 2.0;
        let j1 = (x3 - x4) * (y1 - y2) - (x1 - x2) * (y3 - y4);
        let j2 = (x2 - x3) * (y1 - y4) - (x1 - x4) * (y2 - y3);

        let (px, py) = self.local_coordinates(p);
        let dx = px - x0;
        let dy = py - y0;
        let b_chi = a - dx * yb + dy * xb;
        let b_eta = -a - dx * yb + dy * xb;
        let c_chi = dx * yc_chi - dy * xc_chi;
        let c_eta = dx * yc_eta - dy * xc_eta;
        let r = 2.0 * c_chi / (-(b_chi * b_chi - 2.0 * j1 * c_chi).sqrt() - b_chi);
        let s = 2.0 * c_eta / ((b_eta * b_eta + 2.0 * j2 * c_eta).sqrt() - b_eta);
        (r, s)
    }

    fn rotate_node(&self, v: &[f64], node: usize) -> DVector<f64> {
        let r = self.trf_matrix();
        let u = Vector3::new(v[6 * node], v[6 * node + 1], v[6 * node + 2]);
        let t = Vector3::new(v[6 * node + 3], v[6 * node + 4], v[6 * node + 5]);
        let (u, t) = (r * u, r * t);
        DVector::from_column_slice(&[u[0], u[1], u[2], t[0], t[1], t[2]])
    }

    /// Local `[u1, u2, u3, θ1, θ2, θ3]` of node `node`.
    pub fn basic_trial_disp(&self, node: usize) -> DVector<f64> {
        self.rotate_node(&self.ug_trial, node)
    }

    pub fn basic_trial_vel(&self, node: usize) -> DVector<f64> {
        self.rotate_node(&self.vg_trial, node)
    }

    pub fn basic_trial_accel(&self, node: usize) -> DVector<f64> {
        self.rotate_node(&self.ag_trial, node)
    }

    /// Block diagonal `T_lg` (24 × 24).
    pub fn local_from_global(&self) -> DMatrix<f64> {
        let r = self.trf_matrix();
        let mut t = DMatrix::zeros(SHELL_DOF, SHELL_DOF);
        for b in 0..8 {
            t.view_mut((3 * b, 3 * b), (3, 3)).copy_from(&r);
        }
        t
    }

    pub fn local_to_global_force(&self, pl: &DVector<f64>) -> Result<DVector<f64>> {
        if pl.len() != SHELL_DOF {
            return Err(FeError::len("ShellLinearCrdTransf3d::local_to_global_force", SHELL_DOF, pl.len()));
        }
        let rt = self.trf_matrix().transpose();
        let mut pg = DVector::zeros(SHELL_DOF);
        for b in 0..8 {
            let v = rt * Vector3::new(pl[3 * b], pl[3 * b + 1], pl[3 * b + 2]);
            pg.rows_mut(3 * b, 3).copy_from(&v);
        }
        Ok(pg)
    }

    /// `T_lgᵗ·kl·T_lg`
    pub fn local_to_global_stiff(&mut self, kl: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let t = self.local_from_global();
        let mut kg = DMatrix::zeros(SHELL_DOF, SHELL_DOF);
        self.scratch.add_to(&mut kg, 0.0, &t, kl, 1.0)?;
        Ok(kg)
    }

    pub fn vector_global_coord_from_local(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.trf_matrix().transpose() * v
    }

    pub fn vector_local_coord_from_global(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.trf_matrix() * v
    }

    pub fn type_name(&self) -> &'static str {
        "ShellLinearCrdTransf3d"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad(coords: [[f64; 3]; 4]) -> [Node; 4] {
        let mut tag = 0;
        coords.map(|c| {
            tag += 1;
            Node::new(tag, 6, &c)
        })
    }

    fn refs(n: &[Node; 4]) -> [&Node; 4] {
        [&n[0], &n[1], &n[2], &n[3]]
    }

    #[test]
    fn frame_of_a_tilted_square() {
        // unit square rotated about global x by 90 degrees: lies in the x-z plane
        let n = quad([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]]);
        let mut t = ShellLinearCrdTransf3d::new(1);
        t.initialize(refs(&n)).unwrap();
        assert_relative_eq!(*t.g1(), Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(*t.g2(), Vector3::new(0.0, 0.0, 1.0));
        assert_relative_eq!(*t.g3(), Vector3::new(0.0, -1.0, 0.0));
        assert_relative_eq!(*t.centroid(), Vector3::new(0.5, 0.0, 0.5));
    }

    #[test]
    fn natural_coordinates_invert_the_bilinear_map() {
        let xy = [[0.0, 0.0], [4.0, 0.5], [3.5, 3.0], [0.3, 2.5]];
        let n = quad(xy.map(|p| [p[0], p[1], 0.0]));
        let mut t = ShellLinearCrdTransf3d::new(1);
        t.initialize(refs(&n)).unwrap();
        for (r, s) in [(0.3, -0.4), (-0.7, 0.2), (0.9, 0.9), (0.0, 0.0)] {
            let shp = [
                0.25 * (1.0 - r) * (1.0 - s),
                0.25 * (1.0 + r) * (1.0 - s),
                0.25 * (1.0 + r) * (1.0 + s),
                0.25 * (1.0 - r) * (1.0 + s),
            ];
            let x: f64 = (0..4).map(|i| shp[i] * xy[i][0]).sum();
            let y: f64 = (0..4).map(|i| shp[i] * xy[i][1]).sum();
            let (rr, ss) = t.natural_coordinates(&Vector3::new(x, y, 0.0));
            assert_relative_eq!(rr, r, epsilon = 1e-12);
            assert_relative_eq!(ss, s, epsilon = 1e-12);
        }
    }

    #[test]
    fn local_displacements_and_stiffness() {
        let mut n = quad([[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]]);
        let mut t = ShellLinearCrdTransf3d::new(1);
        t.initialize(refs(&n)).unwrap();
        n[2].set_trial_disp(&DVector::from_vec(vec![0.0, 0.2, 0.0, 0.0, 0.0, 0.0])).unwrap();
        t.update(refs(&n)).unwrap();
        // global y is the negative normal
        assert_relative_eq!(t.basic_trial_disp(2)[2], -0.2);

        let kl = DMatrix::from_fn(SHELL_DOF, SHELL_DOF, |i, j| if i == j { 1.0 + i as f64 } else { 0.0 });
        let kg = t.local_to_global_stiff(&kl).unwrap();
        let tl = t.local_from_global();
        assert_relative_eq!(kg, tl.transpose() * &kl * &tl, epsilon = 1e-12);
        let pl = DVector::from_fn(SHELL_DOF, |i, _| i as f64);
        assert_relative_eq!(t.local_to_global_force(&pl).unwrap(), tl.transpose() * pl, epsilon = 1e-12);
    }

    #[test]
    fn projection_and_degenerate_input() {
        let n = quad([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 2.0, 0.0], [0.0, 2.0, 0.0]]);
        let mut t = ShellLinearCrdTransf3d::new(1);
        t.initialize(refs(&n)).unwrap();
        let p = t.project(&Vector3::new(0.5, 0.5, 3.0));
        assert_relative_eq!(p, Vector3::new(0.5, 0.5, 0.0));

        let flat = quad([[0.0; 3]; 4]);
        assert!(ShellLinearCrdTransf3d::new(2).initialize(refs(&flat)).is_err());
        assert!(ShellLinearCrdTransf3d::new(3).update(refs(&flat)).is_err());
    }
}
