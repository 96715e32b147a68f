//! Fiber sections.
//!
//! The cross section is discretized into fibers, each a point `(y, z)` with
//! an area and its own uniaxial material. Plane sections remain plane:
//!
//! ```text
//! ε(y, z) = ε0 − y·κz + z·κy
//! N  =  Σ σ·A
//! Mz = −Σ σ·A·y
//! My =  Σ σ·A·z
//! ```
//!
//! The tangent is assembled with the same sign convention, so it is the exact
//! derivative of the resultants. Fibers with zero area or killed fibers are
//! skipped.

use super::{ResponseCode, SectionForceDeformation};
use crate::error::{FeError, Result, StepResult};
use crate::materials::{DynamicMaterial, UniaxialMaterial};
use log::trace;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// A material point of a cross section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fiber {
    pub tag: i32,
    pub y: f64,
    pub z: f64,
    pub area: f64,
    pub material: DynamicMaterial,
    dead: bool,
}

impl Fiber {
    pub fn new(tag: i32, y: f64, z: f64, area: f64, material: impl Into<DynamicMaterial>) -> Self {
        Self {
            tag,
            y,
            z,
            area,
            material: material.into(),
            dead: false,
        }
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

    /// Fibers that take part in the section response.
    fn is_active(&self) -> bool {
        !self.dead && self.area != 0.0
    }

    /// Axial force carried by the fiber (zero once killed).
    pub fn force(&self) -> f64 {
        if self.is_alive() {
            self.area * self.material.stress()
        } else {
            0.0
        }
    }

    pub fn strain(&self) -> f64 {
        self.material.strain()
    }

    pub fn stress(&self) -> f64 {
        self.material.stress()
    }
}

/// Section stiffness and resultant accumulators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionKr {
    pub k: DMatrix<f64>,
    pub r: DVector<f64>,
}

impl SectionKr {
    pub fn zeros(order: usize) -> Self {
        Self {
            k: DMatrix::zeros(order, order),
            r: DVector::zeros(order),
        }
    }

    pub fn zero(&mut self) {
        self.k.fill(0.0);
        self.r.fill(0.0);
    }

    /// Upper triangle of the (P, Mz) block.
    fn update_k2d(&mut self, area: f64, y: f64, tangent: f64) {
        let ea = tangent * area;
        self.k[(0, 0)] += ea;
        self.k[(0, 1)] -= ea * y;
        self.k[(1, 1)] += ea * y * y;
    }

    /// Upper triangle of the (P, Mz, My) block.
    fn update_k3d(&mut self, area: f64, y: f64, z: f64, tangent: f64) {
        self.update_k2d(area, y, tangent);
        let ea = tangent * area;
        self.k[(0, 2)] += ea * z;
        self.k[(1, 2)] -= ea * y * z;
        self.k[(2, 2)] += ea * z * z;
    }

    fn update_n_mz(&mut self, force: f64, y: f64) {
        self.r[0] += force;
        self.r[1] -= force * y;
    }

    fn update_n_mz_my(&mut self, force: f64, y: f64, z: f64) {
        self.update_n_mz(force, y);
        self.r[2] += force * z;
    }

    fn mirror(&mut self) {
        let n = self.k.nrows();
        for i in 0..n {
            for j in (i + 1)..n {
                self.k[(j, i)] = self.k[(i, j)];
            }
        }
    }
}

/// Ordered fiber container with the section-level statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FiberSet {
    fibers: Vec<Fiber>,
    y_cdg: f64,
    z_cdg: f64,
}

impl FiberSet {
    pub fn new(fibers: Vec<Fiber>) -> Self {
        let mut set = Self {
            fibers,
            y_cdg: 0.0,
            z_cdg: 0.0,
        };
        set.update_cdg();
        set
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fiber> {
        self.fibers.iter()
    }

    pub fn find(&self, tag: i32) -> Option<&Fiber> {
        self.fibers.iter().find(|f| f.tag == tag)
    }

    pub fn find_mut(&mut self, tag: i32) -> Option<&mut Fiber> {
        self.fibers.iter_mut().find(|f| f.tag == tag)
    }

    fn push(&mut self, fiber: Fiber) {
        self.fibers.push(fiber);
        self.update_cdg();
    }

    /// Recompute the centroid from the fibers that take part in the response.
    pub fn update_cdg(&mut self) {
        let (mut atot, mut qy, mut qz) = (0.0, 0.0, 0.0);
        for f in self.fibers.iter().filter(|f| f.is_active()) {
            atot += f.area;
            qz += -f.y * f.area;
            qy += f.z * f.area;
        }
        if atot != 0.0 {
            self.y_cdg = -qz / atot;
            self.z_cdg = qy / atot;
        } else {
            self.y_cdg = 0.0;
            self.z_cdg = 0.0;
        }
    }

    /// `(y, z)` of the centroid of the active fibers.
    pub fn centroid(&self) -> (f64, f64) {
        (self.y_cdg, self.z_cdg)
    }

    fn active(&self) -> impl Iterator<Item = &Fiber> {
        self.fibers.iter().filter(|f| f.is_active())
    }

    pub fn total_area(&self) -> f64 {
        self.active().map(|f| f.area).sum()
    }

    /// Second moment of area about the z axis through the centroid.
    pub fn iz(&self) -> f64 {
        self.active().map(|f| f.area * (f.y - self.y_cdg).powi(2)).sum()
    }

    /// Second moment of area about the y axis through the centroid.
    pub fn iy(&self) -> f64 {
        self.active().map(|f| f.area * (f.z - self.z_cdg).powi(2)).sum()
    }

    /// Product of inertia about the centroid.
    pub fn pyz(&self) -> f64 {
        self.active()
            .map(|f| f.area * (f.y - self.y_cdg) * (f.z - self.z_cdg))
            .sum()
    }

    pub fn strain_min(&self) -> f64 {
        self.active().map(Fiber::strain).fold(f64::INFINITY, f64::min)
    }

    pub fn strain_max(&self) -> f64 {
        self.active().map(Fiber::strain).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Area-weighted mean strain.
    pub fn strain_mean(&self) -> f64 {
        self.weighted_mean(Fiber::strain)
    }

    pub fn stress_min(&self) -> f64 {
        self.active().map(Fiber::stress).fold(f64::INFINITY, f64::min)
    }

    pub fn stress_max(&self) -> f64 {
        self.active().map(Fiber::stress).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Area-weighted mean stress.
    pub fn stress_mean(&self) -> f64 {
        self.weighted_mean(Fiber::stress)
    }

    fn weighted_mean(&self, value: impl Fn(&Fiber) -> f64) -> f64 {
        let area = self.total_area();
        if area == 0.0 {
            return 0.0;
        }
        self.active().map(|f| value(f) * f.area).sum::<f64>() / area
    }

    /// Sum of fiber forces.
    pub fn resultant(&self) -> f64 {
        self.fibers.iter().map(Fiber::force).sum()
    }

    /// Moment of the fiber forces about the axis `y = y0` (lever arm `y − y0`).
    pub fn moment_z(&self, y0: f64) -> f64 {
        self.fibers.iter().map(|f| f.force() * (f.y - y0)).sum()
    }

    /// Moment of the fiber forces about the axis `z = z0` (lever arm `z − z0`).
    pub fn moment_y(&self, z0: f64) -> f64 {
        self.fibers.iter().map(|f| f.force() * (f.z - z0)).sum()
    }

    fn commit_state(&mut self) -> Result<()> {
        self.fibers
            .iter_mut()
            .try_for_each(|f| f.material.commit_state())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.fibers
            .iter_mut()
            .try_for_each(|f| f.material.revert_to_last_commit())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.fibers
            .iter_mut()
            .try_for_each(|f| f.material.revert_to_start())
    }
}

/// Kinematics of a fiber section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FiberSectionKind {
    /// `(ε0, κz)` → `(N, Mz)`
    Plane,
    /// `(ε0, κz, κy)` → `(N, Mz, My)`
    Spatial,
    /// Spatial plus uncoupled elastic torsion `T = GJ·θ`
    Torsion { gj: f64 },
}

const RESPONSE_2D: [ResponseCode; 2] = [ResponseCode::P, ResponseCode::Mz];
const RESPONSE_3D: [ResponseCode; 3] = [ResponseCode::P, ResponseCode::Mz, ResponseCode::My];
const RESPONSE_GJ: [ResponseCode; 4] = [
    ResponseCode::P,
    ResponseCode::Mz,
    ResponseCode::My,
    ResponseCode::T,
];

impl FiberSectionKind {
    pub fn response(&self) -> &'static [ResponseCode] {
        match self {
            FiberSectionKind::Plane => &RESPONSE_2D,
            FiberSectionKind::Spatial => &RESPONSE_3D,
            FiberSectionKind::Torsion { .. } => &RESPONSE_GJ,
        }
    }

    pub fn order(&self) -> usize {
        self.response().len()
    }
}

/// Fiber section in any of the three kinematics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiberSection {
    pub id: i32,
    kind: FiberSectionKind,
    fibers: FiberSet,
    e_trial: DVector<f64>,
    e_committed: DVector<f64>,
    e_initial: DVector<f64>,
    kr: SectionKr,
}

impl FiberSection {
    pub fn new(id: i32, kind: FiberSectionKind, fibers: Vec<Fiber>) -> Result<Self> {
        if let FiberSectionKind::Torsion { gj } = kind {
            if gj < 0.0 {
                return Err(FeError::Configuration(format!(
                    "FiberSectionGJ {id}: negative torsional stiffness {gj}"
                )));
            }
        }
        let order = kind.order();
        let mut section = Self {
            id,
            kind,
            fibers: FiberSet::new(fibers),
            e_trial: DVector::zeros(order),
            e_committed: DVector::zeros(order),
            e_initial: DVector::zeros(order),
            kr: SectionKr::zeros(order),
        };
        section.update_kr_cdg();
        Ok(section)
    }

    /// Fiber section for plane frames.
    pub fn plane(id: i32, fibers: Vec<Fiber>) -> Result<Self> {
        Self::new(id, FiberSectionKind::Plane, fibers)
    }

    pub fn spatial(id: i32, fibers: Vec<Fiber>) -> Result<Self> {
        Self::new(id, FiberSectionKind::Spatial, fibers)
    }

    pub fn with_torsion(id: i32, fibers: Vec<Fiber>, gj: f64) -> Result<Self> {
        Self::new(id, FiberSectionKind::Torsion { gj }, fibers)
    }

    pub fn kind(&self) -> FiberSectionKind {
        self.kind
    }

    pub fn fibers(&self) -> &FiberSet {
        &self.fibers
    }

    pub fn add_fiber(&mut self, fiber: Fiber) {
        self.fibers.push(fiber);
        self.update_kr_cdg();
    }

    /// Kill (`alive = false`) or revive a fiber by tag.
    pub fn set_fiber_alive(&mut self, tag: i32, alive: bool) -> Result<()> {
        let fiber = self
            .fibers
            .find_mut(tag)
            .ok_or_else(|| FeError::Configuration(format!("section {}: no fiber {tag}", self.id)))?;
        if alive {
            fiber.revive();
        } else {
            fiber.kill();
        }
        self.fibers.update_cdg();
        self.update_kr_cdg();
        Ok(())
    }

    /// Strain at `(y, z)` for deformation `e`.
    pub fn strain_at(&self, e: &DVector<f64>, y: f64, z: f64) -> f64 {
        match self.kind {
            FiberSectionKind::Plane => e[0] - y * e[1],
            _ => e[0] - y * e[1] + z * e[2],
        }
    }

    fn gj(&self) -> f64 {
        match self.kind {
            FiberSectionKind::Torsion { gj } => gj,
            _ => 0.0,
        }
    }

    fn accumulate(kind: FiberSectionKind, kr: &mut SectionKr, f: &Fiber, stress: f64, tangent: f64) {
        let force = stress * f.area;
        match kind {
            FiberSectionKind::Plane => {
                kr.update_k2d(f.area, f.y, tangent);
                kr.update_n_mz(force, f.y);
            }
            _ => {
                kr.update_k3d(f.area, f.y, f.z, tangent);
                kr.update_n_mz_my(force, f.y, f.z);
            }
        }
    }

    fn finish_kr(&mut self) {
        self.kr.mirror();
        if let FiberSectionKind::Torsion { gj } = self.kind {
            self.kr.k[(3, 3)] = gj;
            self.kr.r[3] = gj * self.e_trial[3];
        }
    }

    /// Rebuild stiffness, resultants and centroid from the current material
    /// states without touching them.
    fn update_kr_cdg(&mut self) {
        self.fibers.update_cdg();
        self.kr.zero();
        let kind = self.kind;
        for f in self.fibers.active() {
            Self::accumulate(kind, &mut self.kr, f, f.material.stress(), f.material.tangent());
        }
        self.finish_kr();
    }
}

impl SectionForceDeformation for FiberSection {
    fn response_type(&self) -> &[ResponseCode] {
        self.kind.response()
    }

    fn set_trial_section_deformation(&mut self, deformation: &DVector<f64>) -> StepResult {
        if deformation.len() != self.order() {
            return Err(FeError::len(
                "FiberSection::set_trial_section_deformation",
                self.order(),
                deformation.len(),
            ));
        }
        let kind = self.kind;
        let mut kr = SectionKr::zeros(self.order());
        for f in self.fibers.fibers.iter_mut().filter(|f| f.is_active()) {
            let strain = match kind {
                FiberSectionKind::Plane => deformation[0] - f.y * deformation[1],
                _ => deformation[0] - f.y * deformation[1] + f.z * deformation[2],
            };
            let (stress, tangent) = f.material.set_trial(strain, 0.0)?;
            Self::accumulate(kind, &mut kr, f, stress, tangent);
        }
        self.e_trial.copy_from(deformation);
        self.kr = kr;
        self.finish_kr();
        trace!("FiberSection {}: N = {:.6e}", self.id, self.kr.r[0]);
        Ok(None)
    }

    fn section_deformation(&self) -> DVector<f64> {
        self.e_trial.clone()
    }

    fn stress_resultant(&self) -> DVector<f64> {
        self.kr.r.clone()
    }

    fn section_tangent(&self) -> DMatrix<f64> {
        self.kr.k.clone()
    }

    fn initial_tangent(&self) -> DMatrix<f64> {
        let mut kr = SectionKr::zeros(self.order());
        for f in self.fibers.active() {
            Self::accumulate(self.kind, &mut kr, f, 0.0, f.material.initial_tangent());
        }
        kr.mirror();
        if let FiberSectionKind::Torsion { gj } = self.kind {
            kr.k[(3, 3)] = gj;
        }
        kr.k
    }

    /// Pushes the strain of the plane `deformation` into every fiber material
    /// as its initial strain. Fails if a material does not take initial strains.
    fn set_initial_section_deformation(&mut self, deformation: &DVector<f64>) -> Result<()> {
        if deformation.len() != self.order() {
            return Err(FeError::len(
                "FiberSection::set_initial_section_deformation",
                self.order(),
                deformation.len(),
            ));
        }
        let strains: Vec<f64> = self
            .fibers
            .iter()
            .map(|f| self.strain_at(deformation, f.y, f.z))
            .collect();
        for (f, strain) in self.fibers.fibers.iter_mut().zip(strains) {
            f.material.set_initial_strain(strain)?;
        }
        self.e_initial.copy_from(deformation);
        Ok(())
    }

    fn initial_section_deformation(&self) -> DVector<f64> {
        self.e_initial.clone()
    }

    fn rho(&self) -> f64 {
        0.0
    }

    fn commit_state(&mut self) -> Result<()> {
        self.fibers.commit_state()?;
        self.e_committed.copy_from(&self.e_trial);
        Ok(())
    }

    fn revert_to_last_commit(&mut self) -> Result<()> {
        self.fibers.revert_to_last_commit()?;
        self.e_trial.copy_from(&self.e_committed);
        self.update_kr_cdg();
        Ok(())
    }

    fn revert_to_start(&mut self) -> Result<()> {
        self.fibers.revert_to_start()?;
        self.e_trial.fill(0.0);
        self.e_committed.fill(0.0);
        self.e_initial.fill(0.0);
        self.update_kr_cdg();
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        match self.kind {
            FiberSectionKind::Plane => "FiberSection2d",
            FiberSectionKind::Spatial => "FiberSection3d",
            FiberSectionKind::Torsion { .. } => "FiberSectionGJ",
        }
    }
}

impl FiberSection {
    /// Torsional stiffness (zero without torsion).
    pub fn torsional_stiffness(&self) -> f64 {
        self.gj()
    }
}
