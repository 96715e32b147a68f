//! Closed set of element implementations.
//!
//! Element containers hold a `Vec<DynamicElement>` so the state
//! determination loop can hand out `&mut` elements to worker threads
//! without trait objects; job files name the variant with a `type` tag.

use super::{Beam2d02, ElasticBeam2d, ElasticBeam3d, Element, ElementBase, ElementLoad, ShellQuad4, ZeroLength};
use crate::domain::Domain;
use crate::error::{Result, StepResult};
use crate::response::{ParameterId, Response};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Dynamic element wrapper that can hold any element type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DynamicElement {
    ElasticBeam2d(ElasticBeam2d),
    ElasticBeam3d(ElasticBeam3d),
    Beam2d02(Beam2d02),
    ZeroLength(ZeroLength),
    ShellQuad4(ShellQuad4),
}

macro_rules! dispatch {
    ($self:ident, $e:ident => $body:expr) => {
        match $self {
            DynamicElement::ElasticBeam2d($e) => $body,
            DynamicElement::ElasticBeam3d($e) => $body,
            DynamicElement::Beam2d02($e) => $body,
            DynamicElement::ZeroLength($e) => $body,
            DynamicElement::ShellQuad4($e) => $body,
        }
    };
}

macro_rules! impl_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for DynamicElement {
                fn from(e: $variant) -> Self {
                    DynamicElement::$variant(e)
                }
            }
        )*
    };
}

impl_from!(ElasticBeam2d, ElasticBeam3d, Beam2d02, ZeroLength, ShellQuad4);

impl Element for DynamicElement {
    fn base(&self) -> &ElementBase {
        dispatch!(self, e => e.base())
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        dispatch!(self, e => e.base_mut())
    }

    fn num_dof(&self) -> usize {
        dispatch!(self, e => e.num_dof())
    }

    fn set_domain(&mut self, domain: &Domain) -> Result<()> {
        dispatch!(self, e => e.set_domain(domain))
    }

    fn update(&mut self, domain: &Domain) -> StepResult {
        dispatch!(self, e => e.update(domain))
    }

    fn tangent_stiff(&mut self) -> Result<DMatrix<f64>> {
        dispatch!(self, e => e.tangent_stiff())
    }

    fn initial_stiff(&mut self) -> Result<DMatrix<f64>> {
        dispatch!(self, e => e.initial_stiff())
    }

    fn mass(&self) -> Result<DMatrix<f64>> {
        dispatch!(self, e => e.mass())
    }

    fn damp(&self) -> Result<DMatrix<f64>> {
        dispatch!(self, e => e.damp())
    }

    fn resisting_force(&self) -> Result<DVector<f64>> {
        dispatch!(self, e => e.resisting_force())
    }

    fn resisting_force_inc_inertia(&self, domain: &Domain) -> Result<DVector<f64>> {
        dispatch!(self, e => e.resisting_force_inc_inertia(domain))
    }

    fn zero_load(&mut self) {
        dispatch!(self, e => e.zero_load())
    }

    fn add_load(&mut self, load: &ElementLoad, factor: f64) -> Result<()> {
        dispatch!(self, e => e.add_load(load, factor))
    }

    fn add_inertia_load_to_unbalance(&mut self, domain: &Domain, accel: &DVector<f64>) -> Result<()> {
        dispatch!(self, e => e.add_inertia_load_to_unbalance(domain, accel))
    }

    fn commit_state(&mut self) -> Result<()> {
        dispatch!(self, e => e.commit_state())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        dispatch!(self, e => e.revert_to_last_commit())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        dispatch!(self, e => e.revert_to_start())
    }

    fn type_name(&self) -> &'static str {
        dispatch!(self, e => e.type_name())
    }

    fn kill(&mut self) {
        dispatch!(self, e => e.kill())
    }

    fn revive(&mut self) {
        dispatch!(self, e => e.revive())
    }

    fn is_alive(&self) -> bool {
        dispatch!(self, e => e.is_alive())
    }

    fn set_parameter(&self, name: &str) -> Option<ParameterId> {
        dispatch!(self, e => e.set_parameter(name))
    }

    fn update_parameter(&mut self, id: ParameterId, value: f64) -> Result<()> {
        dispatch!(self, e => e.update_parameter(id, value))
    }

    fn response_id(&self, name: &str) -> Option<i32> {
        dispatch!(self, e => e.response_id(name))
    }

    fn get_response(&mut self, id: i32) -> Result<Response> {
        dispatch!(self, e => e.get_response(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Node;
    use crate::elements::zero_length::Spring;
    use crate::error::FeError;
    use crate::materials::ElasticMaterial;
    use crate::transforms::LinearCrdTransf2d;
    use approx::assert_relative_eq;

    fn domain() -> Domain {
        let mut d = Domain::new();
        d.add_node(Node::new(1, 3, &[0.0, 0.0])).unwrap();
        d.add_node(Node::new(2, 3, &[2.0, 0.0])).unwrap();
        d.add_node(Node::new(3, 3, &[2.0, 0.0])).unwrap();
        d
    }

    fn elements() -> Vec<DynamicElement> {
        let spring = Spring::new(ElasticMaterial::new(1, 100.0), 0);
        vec![
            ElasticBeam2d::new(1, [1, 2], 0.01, 200e9, 1e-5, LinearCrdTransf2d::new(1)).into(),
            Beam2d02::new(2, [1, 2], 0.01, 200e9, 1e-5, LinearCrdTransf2d::new(2)).into(),
            ZeroLength::aligned(3, 2, [2, 3], vec![spring]).unwrap().into(),
        ]
    }

    #[test]
    fn dispatches_to_the_wrapped_element() {
        let mut d = domain();
        let mut elems = elements();
        for e in elems.iter_mut() {
            e.set_domain(&d).unwrap();
        }
        let names: Vec<_> = elems.iter().map(|e| e.type_name()).collect();
        println!("element types: {names:?}");
        assert_eq!(names, ["ElasticBeam2d", "beam2d02", "ZeroLength"]);
        assert_eq!(elems[2].num_dof(), 6);

        d.set_trial_disp(3, &[0.01, 0.0, 0.0]).unwrap();
        for e in elems.iter_mut() {
            e.update(&d).unwrap();
        }
        let p = elems[2].resisting_force().unwrap();
        assert_relative_eq!(p[3], 1.0, epsilon = 1e-12);
        assert_relative_eq!(p[0], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn overridden_defaults_are_forwarded() {
        let d = domain();
        let mut e: DynamicElement = Beam2d02::new(2, [1, 2], 0.01, 200e9, 1e-5, LinearCrdTransf2d::new(2)).into();
        e.set_domain(&d).unwrap();
        let load = ElementLoad::BeamUniform2d { wt: 1.0, wa: 0.0 };
        assert!(matches!(e.add_load(&load, 1.0), Err(FeError::Configuration(_))));
        assert!(e.set_parameter("E").is_some());
        assert_eq!(e.response_id("stiffness"), Some(1));
        assert!(matches!(e.get_response(99), Err(FeError::UnknownResponse(99))));
    }

    #[test]
    fn job_files_name_the_variant() {
        let elems = elements();
        let e = &elems[1];
        let json = serde_json::to_string(e).unwrap();
        assert!(json.starts_with(r#"{"type":"Beam2d02""#), "{json}");
        let back: DynamicElement = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, e);
    }
}
