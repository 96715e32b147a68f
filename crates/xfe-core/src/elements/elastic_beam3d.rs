//! Linear elastic 3D beam-column.

use super::{add_lumped_inertia, lumped_inertia_force, Element, ElementBase, ElementLoad};
use crate::domain::Domain;
use crate::error::{FeError, Result, StepResult};
use crate::response::{lookup_parameter, ParameterId, Response};
use crate::transforms::{CrdTransf, LinearCrdTransf3d};
use log::warn;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

const PARAMETERS: &[(&[&str], i32)] = &[
    (&["E"], 1),
    (&["A"], 2),
    (&["Iz"], 3),
    (&["Iy"], 4),
    (&["G"], 5),
    (&["J"], 6),
];

/// Cross-section properties of an elastic 3D beam.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticSection3d {
    pub a: f64,
    pub e: f64,
    pub g: f64,
    /// Torsional constant
    pub j: f64,
    pub iy: f64,
    pub iz: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticBeam3d {
    pub base: ElementBase,
    pub section: ElasticSection3d,
    /// Mass per unit length
    pub rho: f64,
    /// Imposed `[ε, κz, κy]`
    e_inic: [f64; 3],
    q0: [f64; 5],
    p0: [f64; 5],
    pub transf: LinearCrdTransf3d,
}

impl ElasticBeam3d {
    pub fn new(tag: i32, nodes: [i32; 2], section: ElasticSection3d, transf: LinearCrdTransf3d) -> Self {
        Self {
            base: ElementBase::new(tag, nodes.to_vec(), 12),
            section,
            rho: 0.0,
            e_inic: [0.0; 3],
            q0: [0.0; 5],
            p0: [0.0; 5],
            transf,
        }
    }

    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    pub fn set_initial_section_deformation(&mut self, e: [f64; 3]) {
        self.e_inic = e;
    }

    pub fn initial_section_deformation(&self) -> [f64; 3] {
        self.e_inic
    }

    /// `ub/L` with the imposed deformations removed from the flexural terms.
    pub fn section_deformation(&self) -> Result<DVector<f64>> {
        let l = self.transf.initial_length();
        let ub = self.transf.basic_trial_disp()?;
        let e = &self.e_inic;
        Ok(DVector::from_vec(vec![
            ub[0] / l - e[0],
            ub[1] / l - e[1],
            ub[2] / l - e[1],
            ub[3] / l - e[2],
            ub[4] / l - e[2],
            ub[5] / l,
        ]))
    }

    fn basic_stiffness(&self) -> DMatrix<f64> {
        let s = &self.section;
        let ol = 1.0 / self.transf.initial_length();
        let eiz = s.e * s.iz * ol;
        let eiy = s.e * s.iy * ol;
        let mut kb = DMatrix::zeros(6, 6);
        kb[(0, 0)] = s.e * s.a * ol;
        kb[(1, 1)] = 4.0 * eiz;
        kb[(2, 2)] = 4.0 * eiz;
        kb[(1, 2)] = 2.0 * eiz;
        kb[(2, 1)] = 2.0 * eiz;
        kb[(3, 3)] = 4.0 * eiy;
        kb[(4, 4)] = 4.0 * eiy;
        kb[(3, 4)] = 2.0 * eiy;
        kb[(4, 3)] = 2.0 * eiy;
        kb[(5, 5)] = s.g * s.j * ol;
        kb
    }

    /// `[N, Mz_i, Mz_j, My_i, My_j, T]`
    pub fn basic_forces(&self) -> Result<DVector<f64>> {
        self.base.require_updated("basic_forces")?;
        let s = &self.section;
        let v = self.section_deformation()?;
        let (eiz, eiy) = (s.e * s.iz, s.e * s.iy);
        Ok(DVector::from_vec(vec![
            s.e * s.a * v[0] + self.q0[0],
            eiz * (4.0 * v[1] + 2.0 * v[2]) + self.q0[1],
            eiz * (2.0 * v[1] + 4.0 * v[2]) + self.q0[2],
            eiy * (4.0 * v[3] + 2.0 * v[4]) + self.q0[3],
            eiy * (2.0 * v[3] + 4.0 * v[4]) + self.q0[4],
            s.g * s.j * v[5],
        ]))
    }

    /// Twelve local end forces, node i then node j.
    pub fn local_forces(&self) -> Result<DVector<f64>> {
        let q = self.basic_forces()?;
        let l = self.transf.initial_length();
        let p0 = &self.p0;
        let mut p = DVector::zeros(12);
        let n = q[0];
        p[6] = n;
        p[0] = -n + p0[0];

        let t = q[5];
        p[9] = t;
        p[3] = -t;

        let (mz1, mz2) = (q[1], q[2]);
        p[5] = mz1;
        p[11] = mz2;
        let vy = (mz1 + mz2) / l;
        p[1] = vy + p0[1];
        p[7] = -vy + p0[2];

        let (my1, my2) = (q[3], q[4]);
        p[4] = my1;
        p[10] = my2;
        let vz = (my1 + my2) / l;
        p[2] = -vz + p0[3];
        p[8] = vz + p0[4];
        Ok(p)
    }

    fn lumped_mass(&self) -> f64 {
        0.5 * self.rho * self.transf.initial_length()
    }
}

impl Element for ElasticBeam3d {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn num_dof(&self) -> usize {
        12
    }

    fn set_domain(&mut self, domain: &Domain) -> Result<()> {
        let nodes = self.base.lookup(domain)?;
        self.base.check_dofs(&nodes, 6, self.type_name())?;
        self.transf.initialize(nodes[0], nodes[1])?;
        self.base.mark_bound();
        Ok(())
    }

    fn update(&mut self, domain: &Domain) -> StepResult {
        self.base.require_bound("update")?;
        let nodes = self.base.lookup(domain)?;
        self.transf.update(nodes[0], nodes[1])?;
        self.base.mark_updated()?;
        Ok(None)
    }

    fn tangent_stiff(&mut self) -> Result<DMatrix<f64>> {
        let q = self.basic_forces()?;
        let kb = self.basic_stiffness();
        Ok(self.transf.global_stiff_matrix(&kb, &q)? * self.base.factor())
    }

    fn initial_stiff(&mut self) -> Result<DMatrix<f64>> {
        self.base.require_bound("initial_stiff")?;
        let kb = self.basic_stiffness();
        Ok(self.transf.initial_global_stiff_matrix(&kb)? * self.base.factor())
    }

    fn mass(&self) -> Result<DMatrix<f64>> {
        self.base.require_bound("mass")?;
        let mut m = DMatrix::zeros(12, 12);
        let ml = self.lumped_mass() * self.base.factor();
        for k in [0, 1, 2, 6, 7, 8] {
            m[(k, k)] = ml;
        }
        Ok(m)
    }

    fn resisting_force(&self) -> Result<DVector<f64>> {
        let q = self.basic_forces()?;
        let p0 = DVector::from_column_slice(&self.p0);
        let p = self.transf.global_resisting_force(&q, &p0)? - self.base.load();
        Ok(p * self.base.factor())
    }

    fn resisting_force_inc_inertia(&self, domain: &Domain) -> Result<DVector<f64>> {
        let mut p = self.resisting_force()?;
        if self.rho != 0.0 {
            let nodes = self.base.lookup(domain)?;
            let m = self.lumped_mass() * self.base.factor();
            p += lumped_inertia_force(&nodes, &[m, m], 3);
        }
        Ok(p)
    }

    fn zero_load(&mut self) {
        self.base.zero_load();
        self.q0 = [0.0; 5];
        self.p0 = [0.0; 5];
        self.e_inic = [0.0; 3];
    }

    fn add_load(&mut self, load: &ElementLoad, factor: f64) -> Result<()> {
        self.base.require_bound("add_load")?;
        if !self.base.is_alive() {
            warn!("{} {}: load on a killed element ignored", self.type_name(), self.base.tag);
            return Ok(());
        }
        let l = self.transf.initial_length();
        if load.add_fixed_end_3d(l, factor, &mut self.p0, &mut self.q0) {
            return Ok(());
        }
        if let Some(e) = load.mean_strain(3, factor) {
            for (acc, de) in self.e_inic.iter_mut().zip(e) {
                *acc += de;
            }
            return Ok(());
        }
        Err(FeError::Configuration(format!(
            "{} {}: load type {} unknown",
            self.type_name(),
            self.base.tag,
            load.name()
        )))
    }

    fn add_inertia_load_to_unbalance(&mut self, domain: &Domain, accel: &DVector<f64>) -> Result<()> {
        self.base.require_bound("add_inertia_load_to_unbalance")?;
        if self.rho == 0.0 {
            return Ok(());
        }
        let nodes = self.base.lookup(domain)?;
        let m = self.lumped_mass();
        add_lumped_inertia(self.base.load_mut(), &nodes, &[m, m], 3, accel)
    }

    fn commit_state(&mut self) -> Result<()> {
        self.base.mark_committed()?;
        self.transf.commit_state()
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.base.mark_reverted()?;
        self.transf.revert_to_last_commit()
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.base.mark_reset();
        self.transf.revert_to_start()
    }

    fn type_name(&self) -> &'static str {
        "ElasticBeam3d"
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        lookup_parameter(PARAMETERS, name)
    }

    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        let s = &mut self.section;
        match id.0 {
            1 => s.e = value,
            2 => s.a = value,
            3 => s.iz = value,
            4 => s.iy = value,
            5 => s.g = value,
            6 => s.j = value,
            other => {
                return Err(FeError::UnknownParameter(format!("ElasticBeam3d parameter {other}")));
            }
        }
        Ok(())
    }

    fn response_id(&self, name: &str) -> Option<i32> {
        match name {
            "stiffness" => Some(1),
            "force" | "forces" | "globalForce" | "globalForces" => Some(2),
            "localForce" | "localForces" => Some(3),
            _ => None,
        }
    }

    fn get_response(&mut self, id: i32) -> Result<Response> {
        match id {
            1 => Ok(Response::Matrix(self.tangent_stiff()?)),
            2 => Ok(Response::Vector(self.resisting_force()?)),
            3 => Ok(Response::Vector(self.local_forces()?)),
            other => Err(FeError::UnknownResponse(other)),
        }
    }
}
