//! Finite elements and their state determination.
//!
//! Every element follows the same lifecycle:
//!
//! ```text
//! Constructed --set_domain--> DomainBound --update--> Trial <--update/commit/revert--> Committed
//! ```
//!
//! Force and stiffness queries are only answered once `update` has run at
//! least once; asking earlier is a [`FeError::State`].
//!
//! - [`ElasticBeam2d`], [`ElasticBeam3d`]: linear elastic beam-columns with element loads
//! - [`Beam2d02`]: elastic 2D beam without element loads
//! - [`ZeroLength`]: springs between coincident nodes built from uniaxial materials
//! - [`ShellQuad4`]: flat four-node Mindlin shell

use crate::domain::{Domain, Node};
use crate::error::{FeError, Result, StepResult};
use crate::response::{ParameterId, Response};
use log::trace;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

pub mod beam2d02;
pub mod elastic_beam2d;
pub mod elastic_beam3d;
pub mod factory;
pub mod load;
pub mod shell;
pub mod zero_length;

pub use beam2d02::Beam2d02;
pub use elastic_beam2d::ElasticBeam2d;
pub use elastic_beam3d::{ElasticBeam3d, ElasticSection3d};
pub use factory::DynamicElement;
pub use load::ElementLoad;
pub use shell::ShellQuad4;
pub use zero_length::{Spring, ZeroLength, ZeroLengthKind};

/// Stiffness reduction factor applied to killed elements.
pub const DEAD_SRF: f64 = 1e-6;

/// Position of an element in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementState {
    Constructed,
    DomainBound,
    Trial,
    Committed,
}

/// Bookkeeping shared by all elements: connectivity, lifecycle state,
/// unbalanced (inertia) load and activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBase {
    pub tag: i32,
    pub nodes: Vec<i32>,
    state: ElementState,
    load: DVector<f64>,
    dead: bool,
}

impl ElementBase {
    pub fn new(tag: i32, nodes: Vec<i32>, num_dof: usize) -> Self {
        Self {
            tag,
            nodes,
            state: ElementState::Constructed,
            load: DVector::zeros(num_dof),
            dead: false,
        }
    }

    pub fn state(&self) -> ElementState {
        self.state
    }

    /// Look up the connected nodes in `domain`, in connectivity order.
    pub fn lookup<'a>(&self, domain: &'a Domain) -> Result<Vec<&'a Node>> {
        self.nodes
            .iter()
            .map(|&t| {
                domain.node(t).ok_or_else(|| {
                    FeError::Configuration(format!("element {}: node {t} not in domain", self.tag))
                })
            })
            .collect()
    }

    /// Every connected node must carry `ndof` DOFs.
    pub fn check_dofs(&self, nodes: &[&Node], ndof: usize, type_name: &str) -> Result<()> {
        for n in nodes {
            if n.ndof() != ndof {
                return Err(FeError::Configuration(format!(
                    "{type_name} {}: node {} has {} DOFs, expected {ndof}",
                    self.tag,
                    n.tag,
                    n.ndof()
                )));
            }
        }
        Ok(())
    }

    pub fn mark_bound(&mut self) {
        self.state = ElementState::DomainBound;
    }

    pub fn require_bound(&self, op: &str) -> Result<()> {
        if self.state == ElementState::Constructed {
            return Err(FeError::State(format!(
                "element {}: {op} before set_domain",
                self.tag
            )));
        }
        Ok(())
    }

    /// Queries against the trial state need a prior `update`.
    pub fn require_updated(&self, op: &str) -> Result<()> {
        match self.state {
            ElementState::Trial | ElementState::Committed => Ok(()),
            ElementState::DomainBound => Err(FeError::State(format!(
                "element {}: {op} before update",
                self.tag
            ))),
            ElementState::Constructed => Err(FeError::State(format!(
                "element {}: {op} before set_domain",
                self.tag
            ))),
        }
    }

    pub fn mark_updated(&mut self) -> Result<()> {
        self.require_bound("update")?;
        self.state = ElementState::Trial;
        Ok(())
    }

    pub fn mark_committed(&mut self) -> Result<()> {
        self.require_bound("commit_state")?;
        trace!("element {}: commit", self.tag);
        self.state = ElementState::Committed;
        Ok(())
    }

    /// After a revert the element answers with its committed state.
    pub fn mark_reverted(&mut self) -> Result<()> {
        self.require_bound("revert_to_last_commit")?;
        if self.state == ElementState::Trial {
            self.state = ElementState::Committed;
        }
        Ok(())
    }

    pub fn mark_reset(&mut self) {
        if self.state != ElementState::Constructed {
            self.state = ElementState::Committed;
        }
    }

    /// Unbalanced load accumulated by `add_inertia_load_to_unbalance`.
    pub fn load(&self) -> &DVector<f64> {
        &self.load
    }

    pub fn load_mut(&mut self) -> &mut DVector<f64> {
        &mut self.load
    }

    pub fn zero_load(&mut self) {
        self.load.fill(0.0);
    }

    pub fn kill(&mut self) {
        self.dead = true;
    }

    pub fn revive(&mut self) {
        self.dead = false;
    }

    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    /// `1` for active elements, [`DEAD_SRF`] for killed ones.
    pub fn factor(&self) -> f64 {
        if self.dead { DEAD_SRF } else { 1.0 }
    }
}

/// Element state determination interface.
pub trait Element {
    fn base(&self) -> &ElementBase;
    fn base_mut(&mut self) -> &mut ElementBase;

    fn tag(&self) -> i32 {
        self.base().tag
    }

    fn external_nodes(&self) -> &[i32] {
        &self.base().nodes
    }

    fn state(&self) -> ElementState {
        self.base().state()
    }

    fn num_dof(&self) -> usize;

    /// Bind to the domain: check node DOFs, initialize the transformation.
    ///
    /// # Errors
    /// `Configuration` for missing nodes, wrong DOF counts or bad geometry.
    fn set_domain(&mut self, domain: &Domain) -> Result<()>;

    /// Push the current trial nodal displacements into the element.
    fn update(&mut self, domain: &Domain) -> StepResult;

    fn tangent_stiff(&mut self) -> Result<DMatrix<f64>>;
    fn initial_stiff(&mut self) -> Result<DMatrix<f64>>;

    fn mass(&self) -> Result<DMatrix<f64>> {
        self.base().require_bound("mass")?;
        Ok(DMatrix::zeros(self.num_dof(), self.num_dof()))
    }

    fn damp(&self) -> Result<DMatrix<f64>> {
        self.base().require_bound("damp")?;
        Ok(DMatrix::zeros(self.num_dof(), self.num_dof()))
    }

    fn resisting_force(&self) -> Result<DVector<f64>>;

    /// Resisting force plus `M·a` from the nodal trial accelerations.
    fn resisting_force_inc_inertia(&self, domain: &Domain) -> Result<DVector<f64>> {
        let _ = domain;
        self.resisting_force()
    }

    fn zero_load(&mut self) {
        self.base_mut().zero_load();
    }

    fn add_load(&mut self, load: &ElementLoad, factor: f64) -> Result<()> {
        let _ = (load, factor);
        Err(FeError::Configuration(format!(
            "{} {}: element loads are not supported",
            self.type_name(),
            self.tag()
        )))
    }

    /// Add `−M·R·accel` to the unbalanced load.
    fn add_inertia_load_to_unbalance(&mut self, domain: &Domain, accel: &DVector<f64>) -> Result<()> {
        let _ = (domain, accel);
        Ok(())
    }

    fn commit_state(&mut self) -> Result<()>;
    fn revert_to_last_commit(&mut self) -> Result<()>;
    fn revert_to_start(&mut self) -> Result<()>;

    fn type_name(&self) -> &'static str;

    fn kill(&mut self) {
        self.base_mut().kill();
    }

    fn revive(&mut self) {
        self.base_mut().revive();
    }

    fn is_alive(&self) -> bool {
        self.base().is_alive()
    }

    fn set_parameter(&self, _name: &str) -> Option<ParameterId> {
        None
    }

    fn update_parameter(&mut self, id: ParameterId, _value: f64) -> Result<()> {
        Err(FeError::UnknownParameter(format!(
            "{} has no parameter {}",
            self.type_name(),
            id.0
        )))
    }

    fn response_id(&self, _name: &str) -> Option<i32> {
        None
    }

    fn get_response(&mut self, id: i32) -> Result<Response> {
        Err(FeError::UnknownResponse(id))
    }
}

/// Stack per-node vectors into one element vector.
pub(crate) fn stack<'a>(parts: impl IntoIterator<Item = &'a DVector<f64>>) -> DVector<f64> {
    let v: Vec<f64> = parts.into_iter().flat_map(|p| p.iter().copied()).collect();
    DVector::from_vec(v)
}

/// `load −= m_n·(R·accel)` on the first `ntrans` DOFs of every node `n`.
pub(crate) fn add_lumped_inertia(
    load: &mut DVector<f64>,
    nodes: &[&Node],
    masses: &[f64],
    ntrans: usize,
    accel: &DVector<f64>,
) -> Result<()> {
    let mut offset = 0;
    for (node, &m) in nodes.iter().zip(masses) {
        let ndof = node.ndof();
        if m != 0.0 {
            let ra = node.get_rv(accel)?;
            for k in 0..ntrans.min(ndof) {
                load[offset + k] -= m * ra[k];
            }
        }
        offset += ndof;
    }
    Ok(())
}

/// `m_n·a` on the first `ntrans` DOFs of every node, from the trial accelerations.
pub(crate) fn lumped_inertia_force(nodes: &[&Node], masses: &[f64], ntrans: usize) -> DVector<f64> {
    let n: usize = nodes.iter().map(|n| n.ndof()).sum();
    let mut f = DVector::zeros(n);
    let mut offset = 0;
    for (node, &m) in nodes.iter().zip(masses) {
        let a = node.trial_accel();
        for k in 0..ntrans.min(node.ndof()) {
            f[offset + k] = m * a[k];
        }
        offset += node.ndof();
    }
    f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_guards() {
        let mut b = ElementBase::new(3, vec![1, 2], 6);
        assert_eq!(b.state(), ElementState::Constructed);
        assert!(b.require_updated("resisting_force").is_err());
        assert!(b.mark_committed().is_err());
        b.mark_bound();
        assert!(matches!(b.require_updated("tangent_stiff"), Err(FeError::State(_))));
        b.mark_updated().unwrap();
        assert!(b.require_updated("tangent_stiff").is_ok());
        b.mark_reverted().unwrap();
        assert_eq!(b.state(), ElementState::Committed);
    }

    #[test]
    fn killed_elements_are_scaled() {
        let mut b = ElementBase::new(1, vec![1, 2], 6);
        assert_eq!(b.factor(), 1.0);
        b.kill();
        assert_eq!(b.factor(), DEAD_SRF);
        b.revive();
        assert!(b.is_alive());
    }

    #[test]
    fn missing_nodes_are_reported() {
        let mut d = Domain::new();
        d.add_node(Node::new(1, 3, &[0.0, 0.0])).unwrap();
        let b = ElementBase::new(1, vec![1, 9], 6);
        assert!(matches!(b.lookup(&d), Err(FeError::Configuration(_))));
    }
}
