//! Material kinds that only existed as wrappers around external Fortran
//! subroutine libraries (Drain-2DX and FEDEAS).
//!
//! The numerical routines are not part of this crate, so every kind is
//! rejected when a model is built, never at the first state update.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegacyMaterialKind {
    DrainHardening,
    DrainBilinear,
    DrainClough1,
    DrainClough2,
    DrainPinch1,
    FedeasHardening,
    FedeasBond1,
    FedeasBond2,
    FedeasConcrete1,
    FedeasConcrete2,
    FedeasConcrete3,
    FedeasHysteretic1,
    FedeasHysteretic2,
    FedeasSteel1,
    FedeasSteel2,
}

impl LegacyMaterialKind {
    pub const ALL: [LegacyMaterialKind; 15] = [
        Self::DrainHardening,
        Self::DrainBilinear,
        Self::DrainClough1,
        Self::DrainClough2,
        Self::DrainPinch1,
        Self::FedeasHardening,
        Self::FedeasBond1,
        Self::FedeasBond2,
        Self::FedeasConcrete1,
        Self::FedeasConcrete2,
        Self::FedeasConcrete3,
        Self::FedeasHysteretic1,
        Self::FedeasHysteretic2,
        Self::FedeasSteel1,
        Self::FedeasSteel2,
    ];

    /// Library the subroutine would come from.
    pub fn library(&self) -> &'static str {
        match self {
            Self::DrainHardening
            | Self::DrainBilinear
            | Self::DrainClough1
            | Self::DrainClough2
            | Self::DrainPinch1 => "Drain",
            _ => "Fedeas",
        }
    }

    /// Model name within its library.
    pub fn model(&self) -> &'static str {
        match self {
            Self::DrainHardening | Self::FedeasHardening => "Hardening",
            Self::DrainBilinear => "Bilinear",
            Self::DrainClough1 => "Clough1",
            Self::DrainClough2 => "Clough2",
            Self::DrainPinch1 => "Pinch1",
            Self::FedeasBond1 => "Bond1",
            Self::FedeasBond2 => "Bond2",
            Self::FedeasConcrete1 => "Concrete1",
            Self::FedeasConcrete2 => "Concrete2",
            Self::FedeasConcrete3 => "Concrete3",
            Self::FedeasHysteretic1 => "Hysteretic1",
            Self::FedeasHysteretic2 => "Hysteretic2",
            Self::FedeasSteel1 => "Steel1",
            Self::FedeasSteel2 => "Steel2",
        }
    }
}

impl fmt::Display for LegacyMaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} (external subroutine not linked)", self.library(), self.model())
    }
}

impl FromStr for LegacyMaterialKind {
    type Err = FeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| format!("{}{}", k.library(), k.model()) == s)
            .ok_or_else(|| FeError::Configuration(format!("unknown material type '{s}'")))
    }
}
