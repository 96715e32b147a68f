//! Elastic 2D beam with consistent basic stiffness and lumped mass.
//!
//! Same kinematics as [`ElasticBeam2d`](super::ElasticBeam2d) but no span
//! loads or imposed strains; rotational DOFs carry no mass.

use super::{add_lumped_inertia, lumped_inertia_force, Element, ElementBase};
use crate::domain::Domain;
use crate::error::{FeError, Result, StepResult};
use crate::response::{lookup_parameter, ParameterId, Response};
use crate::transforms::{CrdTransf, LinearCrdTransf2d};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

const PARAMETERS: &[(&[&str], i32)] = &[(&["E"], 1), (&["A"], 2), (&["I"], 3)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beam2d02 {
    pub base: ElementBase,
    pub a: f64,
    pub e: f64,
    pub i: f64,
    /// Mass density (per unit volume)
    pub rho: f64,
    pub transf: LinearCrdTransf2d,
}

impl Beam2d02 {
    pub fn new(tag: i32, nodes: [i32; 2], a: f64, e: f64, i: f64, transf: LinearCrdTransf2d) -> Self {
        Self {
            base: ElementBase::new(tag, nodes.to_vec(), 6),
            a,
            e,
            i,
            rho: 0.0,
            transf,
        }
    }

    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    /// `Kd`
    fn basic_stiffness(&self) -> DMatrix<f64> {
        let l = self.transf.initial_length();
        let ea = self.e * self.a / l;
        let ei = self.e * self.i / l;
        DMatrix::from_row_slice(3, 3, &[ea, 0.0, 0.0, 0.0, 4.0 * ei, 2.0 * ei, 0.0, 2.0 * ei, 4.0 * ei])
    }

    /// `q = Kd·v`
    pub fn basic_forces(&self) -> Result<DVector<f64>> {
        self.base.require_updated("basic_forces")?;
        Ok(self.basic_stiffness() * self.transf.basic_trial_disp()?)
    }

    fn lumped_mass(&self) -> f64 {
        0.5 * self.rho * self.a * self.transf.initial_length()
    }
}

impl Element for Beam2d02 {
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
        let kd = self.basic_stiffness();
        Ok(self.transf.global_stiff_matrix(&kd, &q)? * self.base.factor())
    }

    /// Equal to the tangent; a linear element has no other state.
    fn initial_stiff(&mut self) -> Result<DMatrix<f64>> {
        self.base.require_bound("initial_stiff")?;
        let kd = self.basic_stiffness();
        Ok(self.transf.initial_global_stiff_matrix(&kd)? * self.base.factor())
    }

    fn mass(&self) -> Result<DMatrix<f64>> {
        self.base.require_bound("mass")?;
        let mut m = DMatrix::zeros(6, 6);
        let ml = self.lumped_mass() * self.base.factor();
        for k in [0, 1, 3, 4] {
            m[(k, k)] = ml;
        }
        Ok(m)
    }

    fn resisting_force(&self) -> Result<DVector<f64>> {
        let q = self.basic_forces()?;
        let p = self.transf.global_resisting_force(&q, &DVector::zeros(0))? - self.base.load();
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
        "beam2d02"
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        lookup_parameter(PARAMETERS, name)
    }

    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        match id.0 {
            1 => self.e = value,
            2 => self.a = value,
            3 => self.i = value,
            other => return Err(FeError::UnknownParameter(format!("beam2d02 parameter {other}"))),
        }
        Ok(())
    }

    fn response_id(&self, name: &str) -> Option<i32> {
        match name {
            "stiffness" => Some(1),
            "force" | "forces" => Some(2),
            _ => None,
        }
    }

    fn get_response(&mut self, id: i32) -> Result<Response> {
        match id {
            1 => Ok(Response::Matrix(self.tangent_stiff()?)),
            2 => Ok(Response::Vector(self.resisting_force()?)),
            other => Err(FeError::UnknownResponse(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Node;
    use crate::elements::{ElasticBeam2d, ElementLoad};
    use approx::assert_relative_eq;

    fn domain() -> Domain {
        let mut d = Domain::new();
        d.add_node(Node::new(1, 3, &[0.0, 0.0])).unwrap();
        d.add_node(Node::new(2, 3, &[3.0, 4.0])).unwrap();
        d
    }

    #[test]
    fn matches_the_elastic_beam() {
        let mut d = domain();
        let mut b = Beam2d02::new(1, [1, 2], 0.02, 30e9, 2e-4, LinearCrdTransf2d::new(1));
        let mut e = ElasticBeam2d::new(2, [1, 2], 0.02, 30e9, 2e-4, LinearCrdTransf2d::new(2));
        b.set_domain(&d).unwrap();
        e.set_domain(&d).unwrap();
        d.set_trial_disp(2, &[1e-3, -2e-3, 4e-4]).unwrap();
        b.update(&d).unwrap();
        e.update(&d).unwrap();
        assert_relative_eq!(b.resisting_force().unwrap(), e.resisting_force().unwrap(), max_relative = 1e-12);
        assert_relative_eq!(b.tangent_stiff().unwrap(), e.tangent_stiff().unwrap(), max_relative = 1e-12);
        assert_eq!(b.initial_stiff().unwrap(), b.tangent_stiff().unwrap());
    }

    #[test]
    fn element_loads_are_refused() {
        let d = domain();
        let mut b = Beam2d02::new(1, [1, 2], 1.0, 1.0, 1.0, LinearCrdTransf2d::new(1));
        b.set_domain(&d).unwrap();
        let err = b.add_load(&ElementLoad::BeamUniform2d { wt: 1.0, wa: 0.0 }, 1.0);
        assert!(matches!(err, Err(FeError::Configuration(_))));
    }

    #[test]
    fn lumped_mass_uses_density_and_area() {
        let d = domain();
        let mut b = Beam2d02::new(1, [1, 2], 0.5, 1.0, 1.0, LinearCrdTransf2d::new(1)).with_rho(4.0);
        assert!(b.mass().is_err());
        b.set_domain(&d).unwrap();
        let m = b.mass().unwrap();
        // 0.5·ρ·A·L = 0.5·4·0.5·5
        assert_relative_eq!(m[(1, 1)], 5.0);
        assert_eq!(m[(2, 2)], 0.0);
    }
}
