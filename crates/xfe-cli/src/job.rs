//! JSON job files: input descriptions, model construction and the step loop.
//!
//! A job names either a single material point driven through a strain
//! history or a small element model driven through nodal displacement
//! steps. Every step is committed after it is evaluated.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use xfe_core::elements::{ElasticSection3d, Spring};
use xfe_core::materials::bilinear::BilinearParams;
use xfe_core::materials::nd::CyclicParams;
use xfe_core::materials::LegacyMaterialKind;
use xfe_core::state::set_domain_elements;
use xfe_core::{
    commit_elements, update_elements, Beam2d02, Bilinear, ConvergenceWarning, Domain, DynamicElement,
    DynamicMaterial, ElasticBeam2d, ElasticBeam3d, ElasticMaterial, ElasticMembranePlateSection, Element,
    ElementLoad, FeError, J2Params, J2Plasticity, LinearCrdTransf2d, LinearCrdTransf3d,
    MultiaxialCyclicPlasticity, NdMaterial, NdMode, Node, Result, ShellQuad4, StateDeterminationConfig,
    Steel01, UniaxialMaterial, ZeroLength,
};

#[derive(Debug, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(flatten)]
    pub kind: JobKind,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum JobKind {
    Uniaxial {
        material: UniaxialInput,
        strains: Vec<f64>,
    },
    Multiaxial {
        material: NdInput,
        strains: Vec<Vec<f64>>,
        #[serde(default)]
        dt: f64,
    },
    Elements {
        nodes: Vec<NodeInput>,
        elements: Vec<ElementInput>,
        #[serde(default)]
        loads: Vec<LoadInput>,
        steps: Vec<Vec<DispInput>>,
        #[serde(default)]
        config: StateDeterminationConfig,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum UniaxialInput {
    Elastic {
        id: i32,
        e: f64,
        #[serde(default)]
        eta: f64,
    },
    Steel01 {
        id: i32,
        fy: f64,
        e0: f64,
        b: f64,
        /// Isotropic hardening `[a1, a2, a3, a4]`
        #[serde(default)]
        hardening: Option<[f64; 4]>,
    },
    Bilinear {
        id: i32,
        #[serde(flatten)]
        params: BilinearParams,
    },
    /// Any of the Drain/Fedeas kinds; always rejected.
    Legacy { kind: LegacyMaterialKind },
}

impl UniaxialInput {
    pub fn build(&self) -> Result<DynamicMaterial> {
        Ok(match *self {
            UniaxialInput::Elastic { id, e, eta } => ElasticMaterial::with_damping(id, e, eta).into(),
            UniaxialInput::Steel01 {
                id,
                fy,
                e0,
                b,
                hardening,
            } => match hardening {
                Some([a1, a2, a3, a4]) => Steel01::with_isotropic_hardening(id, fy, e0, b, a1, a2, a3, a4).into(),
                None => Steel01::new(id, fy, e0, b).into(),
            },
            UniaxialInput::Bilinear { id, params } => Bilinear::new(id, params)?.into(),
            UniaxialInput::Legacy { kind } => DynamicMaterial::legacy(kind)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum NdInput {
    J2Plasticity {
        id: i32,
        mode: NdMode,
        #[serde(flatten)]
        params: J2Params,
    },
    MultiaxialCyclicPlasticity {
        id: i32,
        mode: NdMode,
        #[serde(default = "default_stage")]
        stage: u8,
        #[serde(flatten)]
        params: CyclicParams,
    },
}

fn default_stage() -> u8 {
    2
}

/// The two continuum models behind one set of calls.
#[derive(Debug, Clone)]
pub enum NdModel {
    J2(J2Plasticity),
    Cyclic(MultiaxialCyclicPlasticity),
}

impl NdModel {
    fn material(&mut self) -> &mut dyn NdMaterial {
        match self {
            NdModel::J2(m) => m,
            NdModel::Cyclic(m) => m,
        }
    }
}

impl NdInput {
    pub fn build(&self) -> Result<NdModel> {
        Ok(match *self {
            NdInput::J2Plasticity { id, mode, params } => NdModel::J2(J2Plasticity::new(id, mode, params)?),
            NdInput::MultiaxialCyclicPlasticity {
                id,
                mode,
                stage,
                params,
            } => {
                let mut m = MultiaxialCyclicPlasticity::new(id, mode, params)?;
                m.set_stage(stage)?;
                NdModel::Cyclic(m)
            }
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeInput {
    pub tag: i32,
    pub ndof: usize,
    pub crd: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispInput {
    pub node: i32,
    pub disp: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadInput {
    /// Element tag
    pub element: i32,
    pub load: ElementLoad,
    #[serde(default = "unit_factor")]
    pub factor: f64,
}

fn unit_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpringInput {
    pub material: UniaxialInput,
    pub direction: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ElementInput {
    ElasticBeam2d {
        tag: i32,
        nodes: [i32; 2],
        a: f64,
        e: f64,
        i: f64,
        #[serde(default)]
        rho: f64,
        #[serde(default)]
        p_delta: bool,
    },
    Beam2d02 {
        tag: i32,
        nodes: [i32; 2],
        a: f64,
        e: f64,
        i: f64,
        #[serde(default)]
        rho: f64,
        #[serde(default)]
        p_delta: bool,
    },
    ElasticBeam3d {
        tag: i32,
        nodes: [i32; 2],
        section: ElasticSection3d,
        vecxz: [f64; 3],
        #[serde(default)]
        rho: f64,
    },
    ZeroLength {
        tag: i32,
        dimension: usize,
        nodes: [i32; 2],
        #[serde(default = "default_x")]
        x: [f64; 3],
        #[serde(default = "default_yp")]
        yp: [f64; 3],
        springs: Vec<SpringInput>,
    },
    ShellQuad4 {
        tag: i32,
        nodes: [i32; 4],
        e: f64,
        nu: f64,
        h: f64,
        #[serde(default)]
        rho: f64,
    },
}

fn default_x() -> [f64; 3] {
    [1.0, 0.0, 0.0]
}

fn default_yp() -> [f64; 3] {
    [0.0, 1.0, 0.0]
}

fn transf_2d(tag: i32, p_delta: bool) -> LinearCrdTransf2d {
    if p_delta {
        LinearCrdTransf2d::p_delta(tag)
    } else {
        LinearCrdTransf2d::new(tag)
    }
}

impl ElementInput {
    pub fn build(&self) -> Result<DynamicElement> {
        Ok(match self {
            &ElementInput::ElasticBeam2d {
                tag,
                nodes,
                a,
                e,
                i,
                rho,
                p_delta,
            } => ElasticBeam2d::new(tag, nodes, a, e, i, transf_2d(tag, p_delta))
                .with_rho(rho)
                .into(),
            &ElementInput::Beam2d02 {
                tag,
                nodes,
                a,
                e,
                i,
                rho,
                p_delta,
            } => Beam2d02::new(tag, nodes, a, e, i, transf_2d(tag, p_delta))
                .with_rho(rho)
                .into(),
            &ElementInput::ElasticBeam3d {
                tag,
                nodes,
                section,
                vecxz,
                rho,
            } => ElasticBeam3d::new(tag, nodes, section, LinearCrdTransf3d::new(tag, vecxz))
                .with_rho(rho)
                .into(),
            ElementInput::ZeroLength {
                tag,
                dimension,
                nodes,
                x,
                yp,
                springs,
            } => {
                let springs = springs
                    .iter()
                    .map(|s| Ok(Spring::new(s.material.build()?, s.direction)))
                    .collect::<Result<Vec<_>>>()?;
                ZeroLength::new(*tag, *dimension, *nodes, *x, *yp, springs)?.into()
            }
            &ElementInput::ShellQuad4 {
                tag,
                nodes,
                e,
                nu,
                h,
                rho,
            } => {
                let section = ElasticMembranePlateSection::new(tag, e, nu, h, rho)?;
                ShellQuad4::new(tag, nodes, &section).into()
            }
        })
    }
}

/// One committed step of a material-point history.
#[derive(Debug, Serialize)]
pub struct MaterialStep {
    pub step: usize,
    pub strain: Vec<f64>,
    pub stress: Vec<f64>,
    pub tangent: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ConvergenceWarning>,
}

#[derive(Debug, Serialize)]
pub struct ElementForces {
    pub tag: i32,
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub resisting_force: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct ElementStep {
    pub step: usize,
    pub elements: Vec<ElementForces>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ConvergenceWarning>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum History {
    Material(Vec<MaterialStep>),
    Elements(Vec<ElementStep>),
}

impl Job {
    pub fn run(&self) -> Result<History> {
        match &self.kind {
            JobKind::Uniaxial { material, strains } => run_uniaxial(material, strains).map(History::Material),
            JobKind::Multiaxial { material, strains, dt } => {
                run_multiaxial(material, strains, *dt).map(History::Material)
            }
            JobKind::Elements {
                nodes,
                elements,
                loads,
                steps,
                config,
            } => run_elements(nodes, elements, loads, steps, config).map(History::Elements),
        }
    }
}

fn run_uniaxial(input: &UniaxialInput, strains: &[f64]) -> Result<Vec<MaterialStep>> {
    let mut m = input.build()?;
    log::info!("{}: {} strain steps", m.type_name(), strains.len());
    let mut history = Vec::with_capacity(strains.len());
    for (step, &e) in strains.iter().enumerate() {
        m.set_trial_strain(e, 0.0)?;
        m.commit_state()?;
        history.push(MaterialStep {
            step: step + 1,
            strain: vec![m.strain()],
            stress: vec![m.stress()],
            tangent: vec![m.tangent()],
            warning: None,
        });
    }
    Ok(history)
}

fn run_multiaxial(input: &NdInput, strains: &[Vec<f64>], dt: f64) -> Result<Vec<MaterialStep>> {
    let mut model = input.build()?;
    let m = model.material();
    log::info!("{} ({}): {} strain steps", m.type_name(), m.mode(), strains.len());
    let mut history = Vec::with_capacity(strains.len());
    for (step, e) in strains.iter().enumerate() {
        if e.len() != m.order() {
            return Err(FeError::len("strain step", m.order(), e.len()));
        }
        let warning = m.set_trial_strain(&DVector::from_column_slice(e), dt)?;
        if let Some(w) = &warning {
            log::warn!("step {}: {w}", step + 1);
        }
        m.commit_state()?;
        history.push(MaterialStep {
            step: step + 1,
            strain: m.strain().as_slice().to_vec(),
            stress: m.stress().as_slice().to_vec(),
            tangent: m.tangent().as_slice().to_vec(),
            warning,
        });
    }
    Ok(history)
}

fn run_elements(
    nodes: &[NodeInput],
    inputs: &[ElementInput],
    loads: &[LoadInput],
    steps: &[Vec<DispInput>],
    config: &StateDeterminationConfig,
) -> Result<Vec<ElementStep>> {
    let mut domain = Domain::new();
    for n in nodes {
        domain.add_node(Node::new(n.tag, n.ndof, &n.crd))?;
    }
    let mut elements = inputs.iter().map(ElementInput::build).collect::<Result<Vec<_>>>()?;
    set_domain_elements(&mut elements, &domain)?;
    log::info!("{} nodes, {} elements, {} steps", domain.num_nodes(), elements.len(), steps.len());

    for l in loads {
        let e = elements
            .iter_mut()
            .find(|e| e.tag() == l.element)
            .ok_or_else(|| FeError::Configuration(format!("load on unknown element {}", l.element)))?;
        e.add_load(&l.load, l.factor)?;
    }

    let mut history = Vec::with_capacity(steps.len());
    for (step, disps) in steps.iter().enumerate() {
        for d in disps {
            domain.set_trial_disp(d.node, &d.disp)?;
        }
        let warnings = update_elements(&mut elements, &domain, config)?;
        let forces = elements
            .iter()
            .map(|e| {
                Ok(ElementForces {
                    tag: e.tag(),
                    type_name: e.type_name(),
                    resisting_force: e.resisting_force()?.as_slice().to_vec(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        commit_elements(&mut elements, config)?;
        domain.commit();
        history.push(ElementStep {
            step: step + 1,
            elements: forces,
            warnings,
        });
    }
    Ok(history)
}
