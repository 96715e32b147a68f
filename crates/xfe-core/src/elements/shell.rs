//! Flat four-node Mindlin shell.
//!
//! Membrane and bending terms are integrated with 2×2 Gauss points, the
//! transverse shear strains are sampled at the element centre (one-point
//! shear) and the drilling rotation is tied to the in-plane rotation by a
//! penalty `Ktt = G·h`. Local DOFs per node: `[u, v, w, θx, θy, θz]`.
//!
//! Curvatures are `κ11 = −θy,x`, `κ22 = θx,y`, `κ12 = θx,x − θy,y`; the section
//! returns bending resultants with the opposite sign, which is undone here.

use super::{add_lumped_inertia, lumped_inertia_force, Element, ElementBase};
use crate::domain::{Domain, Node};
use crate::error::{ConvergenceWarning, FeError, Result, StepResult};
use crate::response::{ParameterId, Response};
use crate::sections::{ElasticMembranePlateSection, SectionForceDeformation};
use crate::transforms::shell::SHELL_DOF;
use crate::transforms::ShellLinearCrdTransf3d;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

const GP: f64 = 0.577_350_269_189_625_8;
const GAUSS: [(f64, f64); 4] = [(-GP, -GP), (GP, -GP), (GP, GP), (-GP, GP)];
const XI: [f64; 4] = [-1.0, 1.0, 1.0, -1.0];
const ETA: [f64; 4] = [-1.0, -1.0, 1.0, 1.0];

/// Section strain sign flip for the bending rows.
const BENDING_SIGN: [f64; 8] = [1.0, 1.0, 1.0, -1.0, -1.0, -1.0, 1.0, 1.0];

/// Shape functions and their Cartesian derivatives at one point.
struct Shape {
    n: [f64; 4],
    dx: [f64; 4],
    dy: [f64; 4],
    det_j: f64,
}

fn shape(xl: &[[f64; 4]; 2], xi: f64, eta: f64) -> Shape {
    let mut n = [0.0; 4];
    let mut dxi = [0.0; 4];
    let mut deta = [0.0; 4];
    for a in 0..4 {
        n[a] = 0.25 * (1.0 + xi * XI[a]) * (1.0 + eta * ETA[a]);
        dxi[a] = 0.25 * XI[a] * (1.0 + eta * ETA[a]);
        deta[a] = 0.25 * ETA[a] * (1.0 + xi * XI[a]);
    }
    let (mut j11, mut j12, mut j21, mut j22) = (0.0, 0.0, 0.0, 0.0);
    for a in 0..4 {
        j11 += dxi[a] * xl[0][a];
        j12 += dxi[a] * xl[1][a];
        j21 += deta[a] * xl[0][a];
        j22 += deta[a] * xl[1][a];
    }
    let det_j = j11 * j22 - j12 * j21;
    let mut dx = [0.0; 4];
    let mut dy = [0.0; 4];
    if det_j != 0.0 {
        for a in 0..4 {
            dx[a] = (j22 * dxi[a] - j12 * deta[a]) / det_j;
            dy[a] = (-j21 * dxi[a] + j11 * deta[a]) / det_j;
        }
    }
    Shape { n, dx, dy, det_j }
}

/// Membrane and bending rows from `s`, shear rows from the centre `c`.
fn strain_matrix(s: &Shape, c: &Shape) -> DMatrix<f64> {
    let mut b = DMatrix::zeros(8, SHELL_DOF);
    for a in 0..4 {
        let k = 6 * a;
        b[(0, k)] = s.dx[a];
        b[(1, k + 1)] = s.dy[a];
        b[(2, k)] = s.dy[a];
        b[(2, k + 1)] = s.dx[a];

        b[(3, k + 4)] = -s.dx[a];
        b[(4, k + 3)] = s.dy[a];
        b[(5, k + 3)] = s.dx[a];
        b[(5, k + 4)] = -s.dy[a];

        b[(6, k + 2)] = c.dx[a];
        b[(6, k + 4)] = c.n[a];
        b[(7, k + 2)] = c.dy[a];
        b[(7, k + 3)] = -c.n[a];
    }
    b
}

/// `½(v,x − u,y) − θz`
fn drilling_row(s: &Shape) -> DVector<f64> {
    let mut b = DVector::zeros(SHELL_DOF);
    for a in 0..4 {
        let k = 6 * a;
        b[k] = -0.5 * s.dy[a];
        b[k + 1] = 0.5 * s.dx[a];
        b[k + 5] = -s.n[a];
    }
    b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellQuad4 {
    pub base: ElementBase,
    sections: Vec<ElasticMembranePlateSection>,
    pub transf: ShellLinearCrdTransf3d,
    /// Drilling penalty stiffness
    ktt: f64,
    u_trial: DVector<f64>,
    u_commit: DVector<f64>,
}

impl ShellQuad4 {
    /// Nodes in counterclockwise order; every Gauss point gets its own copy
    /// of `section`.
    pub fn new(tag: i32, nodes: [i32; 4], section: &ElasticMembranePlateSection) -> Self {
        Self {
            base: ElementBase::new(tag, nodes.to_vec(), SHELL_DOF),
            sections: vec![section.clone(); 4],
            transf: ShellLinearCrdTransf3d::new(tag),
            ktt: 0.0,
            u_trial: DVector::zeros(SHELL_DOF),
            u_commit: DVector::zeros(SHELL_DOF),
        }
    }

    pub fn sections(&self) -> &[ElasticMembranePlateSection] {
        &self.sections
    }

    fn nodes<'a>(&self, domain: &'a Domain) -> Result<[&'a Node; 4]> {
        let v = self.base.lookup(domain)?;
        Ok([v[0], v[1], v[2], v[3]])
    }

    fn xl(&self) -> [[f64; 4]; 2] {
        self.transf.nodal_local_coordinates()
    }

    /// Mid-surface area.
    pub fn area(&self) -> f64 {
        let xl = self.xl();
        GAUSS.iter().map(|&(xi, eta)| shape(&xl, xi, eta).det_j).sum()
    }

    fn drilling_stiffness(&self) -> f64 {
        self.sections[0].initial_tangent()[(2, 2)]
    }

    /// Stiffness (and internal force when `with_force`) in local axes.
    fn local_response(&self, tangent: bool, with_force: bool) -> (DMatrix<f64>, DVector<f64>) {
        let xl = self.xl();
        let centre = shape(&xl, 0.0, 0.0);
        let mut k = DMatrix::zeros(SHELL_DOF, SHELL_DOF);
        let mut f = DVector::zeros(SHELL_DOF);
        for (g, &(xi, eta)) in GAUSS.iter().enumerate() {
            let s = shape(&xl, xi, eta);
            let dv = s.det_j;
            let b = strain_matrix(&s, &centre);
            let section = &self.sections[g];
            let mut d = if tangent {
                section.section_tangent()
            } else {
                section.initial_tangent()
            };
            for (r, sign) in BENDING_SIGN.iter().enumerate() {
                if *sign < 0.0 {
                    d.row_mut(r).neg_mut();
                }
            }
            k += b.transpose() * d * &b * dv;

            let bd = drilling_row(&s);
            k += &bd * bd.transpose() * (self.ktt * dv);

            if with_force {
                let mut stress = section.stress_resultant();
                for (r, sign) in BENDING_SIGN.iter().enumerate() {
                    stress[r] *= sign;
                }
                f += b.tr_mul(&stress) * dv;
                f += &bd * (self.ktt * bd.dot(&self.u_trial) * dv);
            }
        }
        (k, f)
    }

    /// Row-sum lumped translational mass per node.
    fn nodal_masses(&self) -> [f64; 4] {
        let xl = self.xl();
        let mut m = [0.0; 4];
        for (g, &(xi, eta)) in GAUSS.iter().enumerate() {
            let s = shape(&xl, xi, eta);
            let rho_h = self.sections[g].rho();
            for a in 0..4 {
                m[a] += s.n[a] * rho_h * s.det_j;
            }
        }
        m
    }

    fn section_vectors(&self, f: impl Fn(&ElasticMembranePlateSection) -> DVector<f64>) -> DVector<f64> {
        let parts: Vec<DVector<f64>> = self.sections.iter().map(f).collect();
        super::stack(parts.iter())
    }
}

impl Element for ShellQuad4 {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn num_dof(&self) -> usize {
        SHELL_DOF
    }

    fn set_domain(&mut self, domain: &Domain) -> Result<()> {
        let nodes = self.nodes(domain)?;
        self.base.check_dofs(&nodes, 6, self.type_name())?;
        self.transf.initialize(nodes)?;
        let xl = self.xl();
        let distorted = GAUSS
            .iter()
            .chain(std::iter::once(&(0.0, 0.0)))
            .any(|&(xi, eta)| shape(&xl, xi, eta).det_j <= 0.0);
        if distorted {
            return Err(FeError::Configuration(format!(
                "ShellQuad4 {}: nonpositive Jacobian, element too distorted",
                self.base.tag
            )));
        }
        self.ktt = self.drilling_stiffness();
        self.base.mark_bound();
        Ok(())
    }

    fn update(&mut self, domain: &Domain) -> StepResult {
        self.base.require_bound("update")?;
        let nodes = self.nodes(domain)?;
        self.transf.update(nodes)?;
        for a in 0..4 {
            let ua = self.transf.basic_trial_disp(a);
            self.u_trial.rows_mut(6 * a, 6).copy_from(&ua);
        }
        let xl = self.xl();
        let centre = shape(&xl, 0.0, 0.0);
        let mut warning: Option<ConvergenceWarning> = None;
        for (g, &(xi, eta)) in GAUSS.iter().enumerate() {
            let b = strain_matrix(&shape(&xl, xi, eta), &centre);
            let e = b * &self.u_trial;
            let w = self.sections[g].set_trial_section_deformation(&e)?;
            warning = ConvergenceWarning::merge(warning, w);
        }
        self.base.mark_updated()?;
        Ok(warning)
    }

    fn tangent_stiff(&mut self) -> Result<DMatrix<f64>> {
        self.base.require_updated("tangent_stiff")?;
        let (kl, _) = self.local_response(true, false);
        Ok(self.transf.local_to_global_stiff(&kl)? * self.base.factor())
    }

    fn initial_stiff(&mut self) -> Result<DMatrix<f64>> {
        self.base.require_bound("initial_stiff")?;
        let (kl, _) = self.local_response(false, false);
        Ok(self.transf.local_to_global_stiff(&kl)? * self.base.factor())
    }

    fn mass(&self) -> Result<DMatrix<f64>> {
        self.base.require_bound("mass")?;
        let mut m = DMatrix::zeros(SHELL_DOF, SHELL_DOF);
        let factor = self.base.factor();
        for (a, ma) in self.nodal_masses().iter().enumerate() {
            for k in 0..3 {
                m[(6 * a + k, 6 * a + k)] = ma * factor;
            }
        }
        Ok(m)
    }

    fn resisting_force(&self) -> Result<DVector<f64>> {
        self.base.require_updated("resisting_force")?;
        let (_, fl) = self.local_response(true, true);
        let p = self.transf.local_to_global_force(&fl)? - self.base.load();
        Ok(p * self.base.factor())
    }

    fn resisting_force_inc_inertia(&self, domain: &Domain) -> Result<DVector<f64>> {
        let mut p = self.resisting_force()?;
        let nodes = self.nodes(domain)?;
        let factor = self.base.factor();
        let m = self.nodal_masses().map(|m| m * factor);
        p += lumped_inertia_force(&nodes, &m, 3);
        Ok(p)
    }

    fn add_inertia_load_to_unbalance(&mut self, domain: &Domain, accel: &DVector<f64>) -> Result<()> {
        self.base.require_bound("add_inertia_load_to_unbalance")?;
        let nodes = self.nodes(domain)?;
        let m = self.nodal_masses();
        add_lumped_inertia(self.base.load_mut(), &nodes, &m, 3, accel)
    }

    fn commit_state(&mut self) -> Result<()> {
        self.base.mark_committed()?;
        self.u_commit.copy_from(&self.u_trial);
        self.sections.iter_mut().try_for_each(|s| s.commit_state())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.base.mark_reverted()?;
        self.u_trial.copy_from(&self.u_commit);
        self.sections.iter_mut().try_for_each(|s| s.revert_to_last_commit())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.base.mark_reset();
        self.u_trial.fill(0.0);
        self.u_commit.fill(0.0);
        self.sections.iter_mut().try_for_each(|s| s.revert_to_start())
    }

    fn type_name(&self) -> &'static str {
        "ShellQuad4"
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        self.sections[0].set_parameter(name)
    }

    /// Applied to every Gauss point section.
    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        for s in &mut self.sections {
            s.update_parameter(id, value)?;
        }
        if self.base.state() != super::ElementState::Constructed {
            self.ktt = self.drilling_stiffness();
        }
        Ok(())
    }

    fn response_id(&self, name: &str) -> Option<i32> {
        match name {
            "force" | "forces" | "globalForce" | "globalForces" => Some(1),
            "stresses" => Some(2),
            "strains" | "deformations" => Some(3),
            _ => None,
        }
    }

    /// 2 and 3 concatenate the eight section values of each Gauss point.
    fn get_response(&mut self, id: i32) -> Result<Response> {
        match id {
            1 => Ok(Response::Vector(self.resisting_force()?)),
            2 => {
                self.base.require_updated("get_response")?;
                Ok(Response::Vector(self.section_vectors(|s| s.stress_resultant())))
            }
            3 => {
                self.base.require_updated("get_response")?;
                Ok(Response::Vector(self.section_vectors(|s| s.section_deformation())))
            }
            other => Err(FeError::UnknownResponse(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn section() -> ElasticMembranePlateSection {
        ElasticMembranePlateSection::new(1, 210e9, 0.3, 0.01, 7850.0).unwrap()
    }

    fn square(side: f64, z: f64) -> Domain {
        let mut d = Domain::new();
        let crd = [[0.0, 0.0], [side, 0.0], [side, side], [0.0, side]];
        for (i, c) in crd.iter().enumerate() {
            d.add_node(Node::new(i as i32 + 1, 6, &[c[0], c[1], z])).unwrap();
        }
        d
    }

    fn shell(d: &Domain) -> ShellQuad4 {
        let mut el = ShellQuad4::new(1, [1, 2, 3, 4], &section());
        el.set_domain(d).unwrap();
        el
    }

    #[test]
    fn shape_functions_partition_unity() {
        let xl = [[0.0, 2.0, 2.5, -0.5], [0.0, 0.0, 1.5, 1.0]];
        let s = shape(&xl, 0.3, -0.2);
        assert_relative_eq!(s.n.iter().sum::<f64>(), 1.0, epsilon = 1e-15);
        assert!(s.dx.iter().sum::<f64>().abs() < 1e-14);
        assert!(s.dy.iter().sum::<f64>().abs() < 1e-14);
    }

    #[test]
    fn distorted_quadrilaterals_are_rejected() {
        let mut d = Domain::new();
        let crd = [[0.0, 0.0], [2.0, 0.0], [0.3, 0.3], [0.0, 2.0]];
        for (i, c) in crd.iter().enumerate() {
            d.add_node(Node::new(i as i32 + 1, 6, &[c[0], c[1], 0.0])).unwrap();
        }
        let mut concave = ShellQuad4::new(1, [1, 2, 3, 4], &section());
        assert!(matches!(concave.set_domain(&d), Err(FeError::Configuration(_))));

        let d = square(1.0, 0.0);
        let mut crossed = ShellQuad4::new(2, [1, 3, 2, 4], &section());
        assert!(matches!(crossed.set_domain(&d), Err(FeError::Configuration(_))));
    }

    #[test]
    fn stiffness_is_symmetric() {
        let d = square(2.0, 0.0);
        let mut el = shell(&d);
        el.update(&d).unwrap();
        let k = el.tangent_stiff().unwrap();
        let scale = k.amax();
        assert!((&k - k.transpose()).amax() < 1e-12 * scale);
        assert_eq!(k, el.initial_stiff().unwrap());
    }

    #[test]
    fn rigid_body_motion_is_stress_free() {
        let mut d = square(2.0, 1.0);
        let th = [1e-3, -2e-3, 5e-4];
        for tag in 1..=4 {
            let x = d.node(tag).unwrap().crds().clone();
            // u = t + θ × x
            let u = [
                0.1 + th[1] * x[2] - th[2] * x[1],
                -0.2 + th[2] * x[0] - th[0] * x[2],
                0.3 + th[0] * x[1] - th[1] * x[0],
            ];
            d.set_trial_disp(tag, &[u[0], u[1], u[2], th[0], th[1], th[2]]).unwrap();
        }
        let mut el = shell(&d);
        el.update(&d).unwrap();
        let p = el.resisting_force().unwrap();
        let k = el.tangent_stiff().unwrap();
        assert!(p.amax() < 1e-6 * k.amax() * 1e-3, "rigid body force {}", p.amax());
    }

    #[test]
    fn uniform_membrane_stretch() {
        let mut d = square(2.0, 0.0);
        let eps = 1e-4;
        for tag in [2, 3] {
            d.set_trial_disp(tag, &[2.0 * eps, 0.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        }
        let mut el = shell(&d);
        el.update(&d).unwrap();
        let strains = el.get_response(3).unwrap();
        let strains = strains.as_vector().unwrap();
        for g in 0..4 {
            assert_relative_eq!(strains[8 * g], eps, max_relative = 1e-12);
            assert!(strains[8 * g + 1].abs() < 1e-18);
        }
        // total axial force = n11 · width
        let p = el.resisting_force().unwrap();
        let n11 = el.sections()[0].stress_resultant()[0];
        assert_relative_eq!(p[6] + p[12], n11 * 2.0, max_relative = 1e-10);
    }

    #[test]
    fn bending_resisting_force_is_positive_work() {
        let mut d = square(1.0, 0.0);
        // constant curvature: θy = −κ·x gives κ11 = κ
        let kappa = 1e-3;
        for tag in 1..=4 {
            let x = d.node(tag).unwrap().crds()[0];
            let w = 0.5 * kappa * x * x;
            d.set_trial_disp(tag, &[0.0, 0.0, w, 0.0, -kappa * x, 0.0]).unwrap();
        }
        let mut el = shell(&d);
        el.update(&d).unwrap();
        let u = DVector::from_fn(24, |i, _| {
            let n = d.node(i as i32 / 6 + 1).unwrap();
            n.trial_disp()[i % 6]
        });
        let p = el.resisting_force().unwrap();
        assert!(p.dot(&u) > 0.0);
        let stresses = el.get_response(2).unwrap();
        // the section reports m11 with its own sign convention
        assert!(stresses.as_vector().unwrap()[3] < 0.0);
    }

    #[test]
    fn lumped_mass_totals_the_plate() {
        let d = square(2.0, 0.0);
        let el = shell(&d);
        let m = el.mass().unwrap();
        let total: f64 = (0..4).map(|a| m[(6 * a, 6 * a)]).sum();
        assert_relative_eq!(total, 7850.0 * 0.01 * 4.0, max_relative = 1e-12);
        assert_relative_eq!(el.area(), 4.0, max_relative = 1e-12);
    }

    #[test]
    fn commit_revert_restores_forces() {
        let mut d = square(1.0, 0.0);
        d.set_trial_disp(3, &[1e-4, 0.0, 1e-3, 0.0, 0.0, 0.0]).unwrap();
        let mut el = shell(&d);
        el.update(&d).unwrap();
        d.commit();
        el.commit_state().unwrap();
        let committed = el.resisting_force().unwrap();
        d.set_trial_disp(3, &[5e-4, 1e-4, 0.0, 1e-3, 0.0, 2e-3]).unwrap();
        el.update(&d).unwrap();
        el.revert_to_last_commit().unwrap();
        assert_eq!(el.resisting_force().unwrap(), committed);
    }

    #[test]
    fn thickness_parameter_reaches_every_section() {
        let d = square(1.0, 0.0);
        let mut el = shell(&d);
        let id = el.set_parameter("h").unwrap();
        el.update_parameter(id, 0.02).unwrap();
        assert!(el.sections().iter().all(|s| s.h == 0.02));
        assert_relative_eq!(el.ktt, el.sections()[0].shear_modulus(), max_relative = 1e-12);
    }
}
