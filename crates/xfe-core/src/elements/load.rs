//! Element loads and their fixed-end effects on beam-columns.
//!
//! A span load contributes two vectors in the basic system:
//!
//! - `p0`: end reactions of the simply supported span, added to the local
//!   end shears and axial force (`[N_i, V_i, V_j]` in 2D, `[N_i, Vy_i, Vy_j,
//!   Vz_i, Vz_j]` in 3D)
//! - `q0`: fixed-end basic forces, added to the section forces
//!
//! Loads are given in local axes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementLoad {
    /// Uniform transverse `wt` and axial `wa` load per unit length.
    BeamUniform2d { wt: f64, wa: f64 },
    /// Transverse `p` and axial `n` point load at `a_over_l·L` from node i.
    BeamPoint2d { p: f64, n: f64, a_over_l: f64 },
    BeamUniform3d { wy: f64, wz: f64, wx: f64 },
    BeamPoint3d { py: f64, pz: f64, n: f64, a_over_l: f64 },
    /// Imposed section deformations at both ends, `[ε, κz(, κy)]`.
    BeamStrain { e1: Vec<f64>, e2: Vec<f64> },
}

impl ElementLoad {
    pub fn name(&self) -> &'static str {
        match self {
            ElementLoad::BeamUniform2d { .. } => "BeamUniform2d",
            ElementLoad::BeamPoint2d { .. } => "BeamPoint2d",
            ElementLoad::BeamUniform3d { .. } => "BeamUniform3d",
            ElementLoad::BeamPoint3d { .. } => "BeamPoint3d",
            ElementLoad::BeamStrain { .. } => "BeamStrain",
        }
    }

    /// Accumulate the 2D span load effects into `p0` and `q0`.
    ///
    /// Returns `false` when the load is not a 2D span load.
    pub fn add_fixed_end_2d(&self, l: f64, factor: f64, p0: &mut [f64; 3], q0: &mut [f64; 3]) -> bool {
        match *self {
            ElementLoad::BeamUniform2d { wt, wa } => {
                let wt = wt * factor;
                let wa = wa * factor;
                let v = 0.5 * wt * l;
                let m = v * l / 6.0;
                let p = wa * l;

                p0[0] -= p;
                p0[1] -= v;
                p0[2] -= v;

                q0[0] -= 0.5 * p;
                q0[1] -= m;
                q0[2] += m;
                true
            }
            ElementLoad::BeamPoint2d { p, n, a_over_l } => {
                let p = p * factor;
                let n = n * factor;
                let a = a_over_l * l;
                let b = l - a;
                let l2 = l * l;

                p0[0] -= n;
                p0[1] -= p * (1.0 - a_over_l);
                p0[2] -= p * a_over_l;

                q0[0] -= n * a_over_l;
                q0[1] += -a * b * b * p / l2;
                q0[2] += a * a * b * p / l2;
                true
            }
            _ => false,
        }
    }

    /// Accumulate the 3D span load effects into `p0` and `q0`.
    ///
    /// `q0` follows the basic order `[N, Mz_i, Mz_j, My_i, My_j]`.
    pub fn add_fixed_end_3d(&self, l: f64, factor: f64, p0: &mut [f64; 5], q0: &mut [f64; 5]) -> bool {
        match *self {
            ElementLoad::BeamUniform3d { wy, wz, wx } => {
                let (wy, wz, wx) = (wy * factor, wz * factor, wx * factor);
                let vy = 0.5 * wy * l;
                let mz = vy * l / 6.0;
                let vz = 0.5 * wz * l;
                let my = vz * l / 6.0;
                let p = wx * l;

                p0[0] -= p;
                p0[1] -= vy;
                p0[2] -= vy;
                p0[3] -= vz;
                p0[4] -= vz;

                q0[0] -= 0.5 * p;
                q0[1] -= mz;
                q0[2] += mz;
                q0[3] += my;
                q0[4] -= my;
                true
            }
            ElementLoad::BeamPoint3d { py, pz, n, a_over_l } => {
                let (py, pz, n) = (py * factor, pz * factor, n * factor);
                let a = a_over_l * l;
                let b = l - a;
                let l2 = l * l;

                p0[0] -= n;
                p0[1] -= py * (1.0 - a_over_l);
                p0[2] -= py * a_over_l;
                p0[3] -= pz * (1.0 - a_over_l);
                p0[4] -= pz * a_over_l;

                let m1y = -a * b * b * py / l2;
                let m2y = a * a * b * py / l2;
                let m1z = -a * b * b * pz / l2;
                let m2z = a * a * b * pz / l2;
                q0[0] -= n * a_over_l;
                q0[1] += m1y;
                q0[2] += m2y;
                q0[3] -= m1z;
                q0[4] -= m2z;
                true
            }
            _ => false,
        }
    }

    /// Mean imposed deformation `factor·(e1 + e2)/2`, padded to `n` components.
    pub fn mean_strain(&self, n: usize, factor: f64) -> Option<Vec<f64>> {
        match self {
            ElementLoad::BeamStrain { e1, e2 } => Some(
                (0..n)
                    .map(|i| {
                        let a = e1.get(i).copied().unwrap_or(0.0);
                        let b = e2.get(i).copied().unwrap_or(0.0);
                        factor * 0.5 * (a + b)
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_load_fixed_end_moments() {
        let mut p0 = [0.0; 3];
        let mut q0 = [0.0; 3];
        let load = ElementLoad::BeamUniform2d { wt: -12.0, wa: 0.0 };
        assert!(load.add_fixed_end_2d(6.0, 1.0, &mut p0, &mut q0));
        // wL²/12 = 36
        assert_relative_eq!(q0[1], 36.0);
        assert_relative_eq!(q0[2], -36.0);
        assert_relative_eq!(p0[1] + p0[2], 72.0);
    }

    #[test]
    fn midspan_point_load_matches_uniform_formulae() {
        let mut p0 = [0.0; 3];
        let mut q0 = [0.0; 3];
        let load = ElementLoad::BeamPoint2d { p: -10.0, n: 4.0, a_over_l: 0.5 };
        assert!(load.add_fixed_end_2d(4.0, 2.0, &mut p0, &mut q0));
        // PL/8 with P = -20, L = 4
        assert_relative_eq!(q0[1], 10.0);
        assert_relative_eq!(q0[2], -10.0);
        assert_relative_eq!(p0[0], -8.0);
        assert_relative_eq!(q0[0], -4.0);
    }

    #[test]
    fn three_dimensional_uniform_load() {
        let mut p0 = [0.0; 5];
        let mut q0 = [0.0; 5];
        let load = ElementLoad::BeamUniform3d { wy: 0.0, wz: 12.0, wx: 1.0 };
        assert!(load.add_fixed_end_3d(2.0, 1.0, &mut p0, &mut q0));
        assert_relative_eq!(q0[3], 4.0);
        assert_relative_eq!(q0[4], -4.0);
        assert_relative_eq!(p0[3], -12.0);
        assert_relative_eq!(p0[0], -2.0);
        assert!(!load.add_fixed_end_2d(2.0, 1.0, &mut [0.0; 3], &mut [0.0; 3]));
    }

    #[test]
    fn strain_load_is_averaged() {
        let load = ElementLoad::BeamStrain {
            e1: vec![1e-3, 2e-3],
            e2: vec![3e-3],
        };
        let e = load.mean_strain(3, 2.0).unwrap();
        assert_relative_eq!(e[0], 4e-3);
        assert_relative_eq!(e[1], 2e-3);
        assert_eq!(e[2], 0.0);
    }
}
