//! Dense numeric containers.
//!
//! The element and section code works on `nalgebra` dense matrices and vectors.
//! This module adds what the structural code needs on top of them:
//! - checked arithmetic that reports `DimensionMismatch` instead of panicking
//! - LU based solves and inversion that report `SingularMatrix`
//! - the `Tᵗ·B·T` triple product with a per-instance scratch buffer
//! - rank-4 tensors used by the continuum plasticity integrators

pub mod dense;
pub mod tensor;

pub use dense::{
    add_scaled, invert, mat_mul, mat_vec, solve, solve_matrix, transpose_mat_vec,
    triple_product, TripleProduct,
};
pub use tensor::{Tensor4, VOIGT_INDEX};
