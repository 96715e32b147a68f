//! Rank-2 and rank-4 tensor helpers for small-strain continuum plasticity.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Voigt position → tensor indices: 11, 22, 33, 12, 23, 31.
pub const VOIGT_INDEX: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (0, 1), (1, 2), (2, 0)];

pub const ONE3: f64 = 1.0 / 3.0;
pub const TWO3: f64 = 2.0 / 3.0;
pub const FOUR3: f64 = 4.0 / 3.0;

/// √(2/3)
pub fn root23() -> f64 {
    TWO3.sqrt()
}

fn delta(i: usize, j: usize) -> f64 {
    if i == j { 1.0 } else { 0.0 }
}

/// Fourth order tensor stored as `c[i][j][k][l]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tensor4(pub [[[[f64; 3]; 3]; 3]; 3]);

impl Default for Tensor4 {
    fn default() -> Self {
        Self::zeros()
    }
}

impl Tensor4 {
    pub fn zeros() -> Self {
        Tensor4([[[[0.0; 3]; 3]; 3]; 3])
    }

    fn from_fn(f: impl Fn(usize, usize, usize, usize) -> f64) -> Self {
        let mut t = Self::zeros();
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..3 {
                    for l in 0..3 {
                        t.0[i][j][k][l] = f(i, j, k, l);
                    }
                }
            }
        }
        t
    }

    /// Symmetric deviatoric projector `½(δik δjl + δil δjk) − ⅓ δij δkl`.
    pub fn ii_dev() -> Self {
        Self::from_fn(|i, j, k, l| {
            0.5 * (delta(i, k) * delta(j, l) + delta(i, l) * delta(j, k))
                - ONE3 * delta(i, j) * delta(k, l)
        })
    }

    /// `I ⊗ I`
    pub fn ibun_i() -> Self {
        Self::from_fn(|i, j, k, l| delta(i, j) * delta(k, l))
    }

    /// `a ⊗ b`
    pub fn outer(a: &Matrix3<f64>, b: &Matrix3<f64>) -> Self {
        Self::from_fn(|i, j, k, l| a[(i, j)] * b[(k, l)])
    }

    /// `self = self + f·other`
    pub fn add_scaled(&mut self, f: f64, other: &Tensor4) {
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..3 {
                    for l in 0..3 {
                        self.0[i][j][k][l] += f * other.0[i][j][k][l];
                    }
                }
            }
        }
    }

    pub fn get(&self, i: usize, j: usize, k: usize, l: usize) -> f64 {
        self.0[i][j][k][l]
    }

    /// Entry at Voigt positions `(a, b)`.
    pub fn voigt(&self, a: usize, b: usize) -> f64 {
        let (i, j) = VOIGT_INDEX[a];
        let (k, l) = VOIGT_INDEX[b];
        self.0[i][j][k][l]
    }
}

/// Deviatoric part and trace of a symmetric tensor.
pub fn deviator(m: &Matrix3<f64>) -> (Matrix3<f64>, f64) {
    let trace = m.trace();
    let mut dev = *m;
    for i in 0..3 {
        dev[(i, i)] -= ONE3 * trace;
    }
    (dev, trace)
}

/// Euclidean (Frobenius) norm `√(a : a)`.
pub fn tensor_norm(m: &Matrix3<f64>) -> f64 {
    m.dot(m).sqrt()
}
