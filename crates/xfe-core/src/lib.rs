//! Element state determination core for structural finite element analysis.
//!
//! This crate provides the pieces an analysis driver needs to ask elements for
//! resisting forces and stiffness at a trial displacement state:
//! - [`numeric`]: checked dense linear algebra, triple products, rank-4 tensors
//! - [`materials`]: uniaxial and multiaxial constitutive models
//! - [`sections`]: fiber and membrane-plate section force-deformation laws
//! - [`transforms`]: global/local/basic coordinate transformations
//! - [`elements`]: beams, zero-length springs and a flat shell
//! - [`state`]: parallel update/commit/revert over an element list
//!
//! Every stateful object keeps a committed and a trial state and derives
//! serde traits; [`Snapshot`] turns that into a JSON save/restore.

pub mod domain;
pub mod elements;
pub mod error;
pub mod materials;
pub mod numeric;
pub mod response;
pub mod sections;
pub mod state;
pub mod transforms;

pub use domain::{Domain, Node};
pub use elements::{
    Beam2d02, DynamicElement, ElasticBeam2d, ElasticBeam3d, Element, ElementLoad, ElementState, ShellQuad4,
    ZeroLength, DEAD_SRF,
};
pub use error::{ConvergenceWarning, FeError, Result, StepResult};
pub use materials::nd::{J2Params, J2Plasticity, MultiaxialCyclicPlasticity, NdMaterial, NdMode};
pub use materials::{Bilinear, DynamicMaterial, ElasticMaterial, Steel01, UniaxialMaterial};
pub use response::{ParameterId, Response};
pub use sections::{ElasticMembranePlateSection, FiberSection, SectionForceDeformation};
pub use state::{commit_elements, revert_elements, update_elements, StateDeterminationConfig};
pub use transforms::{CrdTransf, LinearCrdTransf2d, LinearCrdTransf3d, ShellLinearCrdTransf3d};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// JSON save/restore of the complete committed and trial state.
pub trait Snapshot: Sized {
    fn to_json(&self) -> Result<String>;
    fn from_json(json: &str) -> Result<Self>;
}

impl<T: Serialize + DeserializeOwned> Snapshot for T {
    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
