//! Linear elastic 2D beam-column.
//!
//! Basic forces `q = kb·(ub/L − eInic)·L + q0`, where `eInic` is an imposed
//! section deformation and `q0` holds the fixed-end forces of span loads.

use super::{add_lumped_inertia, lumped_inertia_force, Element, ElementBase, ElementLoad};
use crate::domain::Domain;
use crate::error::{FeError, Result, StepResult};
use crate::response::{lookup_parameter, ParameterId, Response};
use crate::transforms::{CrdTransf, LinearCrdTransf2d};
use log::warn;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

const PARAMETERS: &[(&[&str], i32)] = &[(&["E"], 1), (&["A"], 2), (&["I", "Iz"], 3)];

/// Rotational mass factor relative to the translational lumped mass.
const ROTATIONAL_MASS: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticBeam2d {
    pub base: ElementBase,
    pub a: f64,
    pub e: f64,
    pub i: f64,
    /// Mass per unit length
    pub rho: f64,
    /// Imposed `[ε, κ]`
    e_inic: [f64; 2],
    q0: [f64; 3],
    p0: [f64; 3],
    pub transf: LinearCrdTransf2d,
}

impl ElasticBeam2d {
    pub fn new(tag: i32, nodes: [i32; 2], a: f64, e: f64, i: f64, transf: LinearCrdTransf2d) -> Self {
        Self {
            base: ElementBase::new(tag, nodes.to_vec(), 6),
            a,
            e,
            i,
            rho: 0.0,
            e_inic: [0.0; 2],
            q0: [0.0; 3],
            p0: [0.0; 3],
            transf,
        }
    }

    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    pub fn initial_section_deformation(&self) -> [f64; 2] {
        self.e_inic
    }

    pub fn set_initial_section_deformation(&mut self, e: [f64; 2]) {
        self.e_inic = e;
    }

    /// Fixed-end basic forces from span loads.
    pub fn q0(&self) -> [f64; 3] {
        self.q0
    }

    /// Simply supported end reactions from span loads.
    pub fn p0(&self) -> [f64; 3] {
        self.p0
    }

    /// `[ε, κ_i, κ_j]`: chord strain and end curvatures, imposed strains removed.
    pub fn section_deformation(&self) -> Result<DVector<f64>> {
        let l = self.transf.initial_length();
        let ub = self.transf.basic_trial_disp()?;
        Ok(DVector::from_vec(vec![
            ub[0] / l - self.e_inic[0],
            ub[1] / l - self.e_inic[1],
            ub[2] / l - self.e_inic[1],
        ]))
    }

    fn basic_stiffness(&self) -> DMatrix<f64> {
        let l = self.transf.initial_length();
        let ea = self.e * self.a / l;
        let ei = self.e * self.i / l;
        DMatrix::from_row_slice(3, 3, &[ea, 0.0, 0.0, 0.0, 4.0 * ei, 2.0 * ei, 0.0, 2.0 * ei, 4.0 * ei])
    }

    /// Basic forces `[N, M_i, M_j]` including the fixed-end contribution.
    pub fn basic_forces(&self) -> Result<DVector<f64>> {
        self.base.require_updated("basic_forces")?;
        let v = self.section_deformation()?;
        let ea = self.e * self.a;
        let ei = self.e * self.i;
        Ok(DVector::from_vec(vec![
            ea * v[0] + self.q0[0],
            4.0 * ei * v[1] + 2.0 * ei * v[2] + self.q0[1],
            2.0 * ei * v[1] + 4.0 * ei * v[2] + self.q0[2],
        ]))
    }

    /// End forces in local axes `[N_i, V_i, M_i, N_j, V_j, M_j]`.
    pub fn local_forces(&self) -> Result<DVector<f64>> {
        let q = self.basic_forces()?;
        let l = self.transf.initial_length();
        let (n, m1, m2) = (q[0], q[1], q[2]);
        let v = (m1 + m2) / l;
        Ok(DVector::from_vec(vec![
            -n + self.p0[0],
            v + self.p0[1],
            m1,
            n,
            -v + self.p0[2],
            m2,
        ]))
    }

    fn lumped_mass(&self) -> f64 {
        0.5 * self.rho * self.transf.initial_length()
    }
}

impl Element for ElasticBeam2d {
    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }

    fn num_dof(&self) -> usize {
        6
    }

    fn set_domain(&mut self, domain: &Domain) -> Result<()> {
        let nodes = self.base.lookup(domain)?;
        self.base.check_dofs(&nodes, 3, self.type_name())?;
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
        let mut m = DMatrix::zeros(6, 6);
        if self.rho != 0.0 {
            let ml = self.lumped_mass() * self.base.factor();
            for k in [0, 1, 3, 4] {
                m[(k, k)] = ml;
            }
            m[(2, 2)] = ml * ROTATIONAL_MASS;
            m[(5, 5)] = ml * ROTATIONAL_MASS;
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
            p += lumped_inertia_force(&nodes, &[m, m], 2);
        }
        Ok(p)
    }

    fn zero_load(&mut self) {
        self.base.zero_load();
        self.q0 = [0.0; 3];
        self.p0 = [0.0; 3];
        self.e_inic = [0.0; 2];
    }

    fn add_load(&mut self, load: &ElementLoad, factor: f64) -> Result<()> {
        self.base.require_bound("add_load")?;
        if !self.base.is_alive() {
            warn!("{} {}: load on a killed element ignored", self.type_name(), self.base.tag);
            return Ok(());
        }
        let l = self.transf.initial_length();
        if load.add_fixed_end_2d(l, factor, &mut self.p0, &mut self.q0) {
            return Ok(());
        }
        if let Some(e) = load.mean_strain(2, factor) {
            self.e_inic[0] += e[0];
            self.e_inic[1] += e[1];
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
        add_lumped_inertia(self.base.load_mut(), &nodes, &[m, m], 2, accel)
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
        "ElasticBeam2d"
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        lookup_parameter(PARAMETERS, name)
    }

    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        match id.0 {
            1 => self.e = value,
            2 => self.a = value,
            3 => self.i = value,
            other => {
                return Err(FeError::UnknownParameter(format!("ElasticBeam2d parameter {other}")));
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
