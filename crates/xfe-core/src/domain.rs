//! Nodes and the node container elements are bound to.
//!
//! Elements never hold references to nodes; they keep node tags and read
//! coordinates and trial kinematics from a [`Domain`] when asked to update.

use crate::error::{FeError, Result};
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A mesh node with committed and trial kinematics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub tag: i32,
    crd: DVector<f64>,
    ndof: usize,
    commit_disp: DVector<f64>,
    commit_vel: DVector<f64>,
    commit_accel: DVector<f64>,
    trial_disp: DVector<f64>,
    trial_vel: DVector<f64>,
    trial_accel: DVector<f64>,
    unbalanced_load: DVector<f64>,
    /// Influence matrix for uniform excitation (`ndof × n_excitations`)
    r: Option<DMatrix<f64>>,
}

impl Node {
    pub fn new(tag: i32, ndof: usize, crd: &[f64]) -> Self {
        Self {
            tag,
            crd: DVector::from_column_slice(crd),
            ndof,
            commit_disp: DVector::zeros(ndof),
            commit_vel: DVector::zeros(ndof),
            commit_accel: DVector::zeros(ndof),
            trial_disp: DVector::zeros(ndof),
            trial_vel: DVector::zeros(ndof),
            trial_accel: DVector::zeros(ndof),
            unbalanced_load: DVector::zeros(ndof),
            r: None,
        }
    }

    pub fn crds(&self) -> &DVector<f64> {
        &self.crd
    }

    pub fn ndof(&self) -> usize {
        self.ndof
    }

    pub fn trial_disp(&self) -> &DVector<f64> {
        &self.trial_disp
    }

    pub fn trial_vel(&self) -> &DVector<f64> {
        &self.trial_vel
    }

    pub fn trial_accel(&self) -> &DVector<f64> {
        &self.trial_accel
    }

    pub fn commit_disp(&self) -> &DVector<f64> {
        &self.commit_disp
    }

    pub fn commit_vel(&self) -> &DVector<f64> {
        &self.commit_vel
    }

    pub fn commit_accel(&self) -> &DVector<f64> {
        &self.commit_accel
    }

    fn check(&self, op: &'static str, v: &DVector<f64>) -> Result<()> {
        if v.len() != self.ndof {
            return Err(FeError::len(op, self.ndof, v.len()));
        }
        Ok(())
    }

    pub fn set_trial_disp(&mut self, disp: &DVector<f64>) -> Result<()> {
        self.check("Node::set_trial_disp", disp)?;
        self.trial_disp.copy_from(disp);
        Ok(())
    }

    pub fn set_trial_vel(&mut self, vel: &DVector<f64>) -> Result<()> {
        self.check("Node::set_trial_vel", vel)?;
        self.trial_vel.copy_from(vel);
        Ok(())
    }

    pub fn set_trial_accel(&mut self, accel: &DVector<f64>) -> Result<()> {
        self.check("Node::set_trial_accel", accel)?;
        self.trial_accel.copy_from(accel);
        Ok(())
    }

    /// `unbalanced += factor·load`
    pub fn add_unbalanced_load(&mut self, load: &DVector<f64>, factor: f64) -> Result<()> {
        self.check("Node::add_unbalanced_load", load)?;
        self.unbalanced_load.axpy(factor, load, 1.0);
        Ok(())
    }

    pub fn unbalanced_load(&self) -> &DVector<f64> {
        &self.unbalanced_load
    }

    pub fn zero_unbalanced_load(&mut self) {
        self.unbalanced_load.fill(0.0);
    }

    /// Set the excitation influence matrix; it must have `ndof` rows.
    pub fn set_r(&mut self, r: DMatrix<f64>) -> Result<()> {
        if r.nrows() != self.ndof {
            return Err(FeError::dims("Node::set_r", (self.ndof, r.ncols()), (r.nrows(), r.ncols())));
        }
        self.r = Some(r);
        Ok(())
    }

    /// `R·accel`, the nodal acceleration produced by ground accelerations.
    pub fn get_rv(&self, accel: &DVector<f64>) -> Result<DVector<f64>> {
        match &self.r {
            Some(r) => crate::numeric::mat_vec(r, accel),
            None => Err(FeError::State(format!(
                "node {}: no excitation influence matrix",
                self.tag
            ))),
        }
    }

    pub fn commit_state(&mut self) {
        self.commit_disp.copy_from(&self.trial_disp);
        self.commit_vel.copy_from(&self.trial_vel);
        self.commit_accel.copy_from(&self.trial_accel);
    }

    pub fn revert_to_last_commit(&mut self) {
        self.trial_disp.copy_from(&self.commit_disp);
        self.trial_vel.copy_from(&self.commit_vel);
        self.trial_accel.copy_from(&self.commit_accel);
    }

    pub fn revert_to_start(&mut self) {
        for v in [
            &mut self.commit_disp,
            &mut self.commit_vel,
            &mut self.commit_accel,
            &mut self.trial_disp,
            &mut self.trial_vel,
            &mut self.trial_accel,
            &mut self.unbalanced_load,
        ] {
            v.fill(0.0);
        }
    }
}

/// Tag → node lookup plus the current time step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    nodes: BTreeMap<i32, Node>,
    /// Time step of the current analysis step (0 for static analysis)
    pub dt: f64,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.tag) {
            return Err(FeError::Configuration(format!("duplicate node tag {}", node.tag)));
        }
        debug!("domain: node {} ({} dof)", node.tag, node.ndof);
        self.nodes.insert(node.tag, node);
        Ok(())
    }

    pub fn node(&self, tag: i32) -> Option<&Node> {
        self.nodes.get(&tag)
    }

    pub fn node_mut(&mut self, tag: i32) -> Option<&mut Node> {
        self.nodes.get_mut(&tag)
    }

    /// Node lookup that reports a missing tag as a configuration error.
    pub fn require_node(&self, tag: i32) -> Result<&Node> {
        self.node(tag)
            .ok_or_else(|| FeError::Configuration(format!("node {tag} not in domain")))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Convenience for drivers and tests.
    pub fn set_trial_disp(&mut self, tag: i32, disp: &[f64]) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&tag)
            .ok_or_else(|| FeError::Configuration(format!("node {tag} not in domain")))?;
        node.set_trial_disp(&DVector::from_column_slice(disp))
    }

    pub fn commit(&mut self) {
        self.nodes.values_mut().for_each(Node::commit_state);
    }

    pub fn revert_to_last_commit(&mut self) {
        self.nodes.values_mut().for_each(Node::revert_to_last_commit);
    }

    pub fn revert_to_start(&mut self) {
        self.nodes.values_mut().for_each(Node::revert_to_start);
    }
}
