//! Checked dense linear algebra over `DMatrix`/`DVector`.
//!
//! Every routine validates shapes before touching its output, so a failed call
//! leaves the destination exactly as it was.

use crate::error::{FeError, Result};
use nalgebra::{DMatrix, DVector};

fn shape(m: &DMatrix<f64>) -> (usize, usize) {
    (m.nrows(), m.ncols())
}

/// `this = this_fact * this + other_fact * other`
pub fn add_scaled(
    this: &mut DMatrix<f64>,
    this_fact: f64,
    other: &DMatrix<f64>,
    other_fact: f64,
) -> Result<()> {
    if shape(this) != shape(other) {
        return Err(FeError::dims("add_scaled", shape(this), shape(other)));
    }
    if this_fact == 1.0 && other_fact == 0.0 {
        return Ok(());
    }
    this.zip_apply(other, |a, b| *a = this_fact * *a + other_fact * b);
    Ok(())
}

pub fn mat_mul(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if a.ncols() != b.nrows() {
        return Err(FeError::dims("mat_mul", (a.ncols(), b.ncols()), shape(b)));
    }
    Ok(a * b)
}

pub fn mat_vec(a: &DMatrix<f64>, x: &DVector<f64>) -> Result<DVector<f64>> {
    if a.ncols() != x.len() {
        return Err(FeError::len("mat_vec", a.ncols(), x.len()));
    }
    Ok(a * x)
}

/// `aᵗ·x` without forming the transpose.
pub fn transpose_mat_vec(a: &DMatrix<f64>, x: &DVector<f64>) -> Result<DVector<f64>> {
    if a.nrows() != x.len() {
        return Err(FeError::len("transpose_mat_vec", a.nrows(), x.len()));
    }
    Ok(a.tr_mul(x))
}

/// Solve `a·x = b` by LU factorization with partial pivoting.
pub fn solve(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>> {
    if !a.is_square() {
        return Err(FeError::dims("solve", (a.nrows(), a.nrows()), shape(a)));
    }
    if a.nrows() != b.len() {
        return Err(FeError::len("solve", a.nrows(), b.len()));
    }
    a.clone()
        .lu()
        .solve(b)
        .ok_or_else(|| FeError::SingularMatrix(format!("{}x{} system", a.nrows(), a.ncols())))
}

/// Solve `a·X = B` for several right-hand sides.
pub fn solve_matrix(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if !a.is_square() {
        return Err(FeError::dims("solve_matrix", (a.nrows(), a.nrows()), shape(a)));
    }
    if a.nrows() != b.nrows() {
        return Err(FeError::dims("solve_matrix", (a.nrows(), b.ncols()), shape(b)));
    }
    a.clone()
        .lu()
        .solve(b)
        .ok_or_else(|| FeError::SingularMatrix(format!("{}x{} system", a.nrows(), a.ncols())))
}

/// Inverse of a square matrix. 1x1, 2x2 and 3x3 use closed forms, larger sizes LU.
pub fn invert(a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    if !a.is_square() {
        return Err(FeError::dims("invert", (a.nrows(), a.nrows()), shape(a)));
    }
    let n = a.nrows();
    let singular = || FeError::SingularMatrix(format!("{n}x{n} inverse"));
    match n {
        0 => Ok(DMatrix::zeros(0, 0)),
        1 => {
            if a[(0, 0)] == 0.0 {
                return Err(singular());
            }
            Ok(DMatrix::from_element(1, 1, 1.0 / a[(0, 0)]))
        }
        2 => {
            let det = a[(0, 0)] * a[(1, 1)] - a[(0, 1)] * a[(1, 0)];
            if det == 0.0 {
                return Err(singular());
            }
            let inv_det = 1.0 / det;
            Ok(DMatrix::from_row_slice(
                2,
                2,
                &[
                    a[(1, 1)] * inv_det,
                    -a[(0, 1)] * inv_det,
                    -a[(1, 0)] * inv_det,
                    a[(0, 0)] * inv_det,
                ],
            ))
        }
        3 => {
            let m = nalgebra::Matrix3::from_iterator(a.iter().copied());
            m.try_inverse()
                .map(|inv| DMatrix::from_iterator(3, 3, inv.iter().copied()))
                .ok_or_else(singular)
        }
        _ => solve_matrix(a, &DMatrix::identity(n, n)),
    }
}

/// `tᵗ·b·t` as a fresh matrix.
pub fn triple_product(t: &DMatrix<f64>, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let mut out = DMatrix::zeros(t.ncols(), t.ncols());
    TripleProduct::default().add_to(&mut out, 0.0, t, b, 1.0)?;
    Ok(out)
}

/// Scratch space for `this = this_fact·this + other_fact·(Tᵗ·B·T)`.
///
/// Each owner (element, transformation) keeps its own instance, so repeated
/// stiffness transformations reuse one allocation without any shared state.
#[derive(Debug, Clone, Default)]
pub struct TripleProduct {
    work: DMatrix<f64>,
}

impl TripleProduct {
    /// Pre-size the scratch for a `B` of order `dim_b` and a result of order `n`.
    pub fn with_dims(dim_b: usize, n: usize) -> Self {
        Self {
            work: DMatrix::zeros(dim_b, n),
        }
    }

    /// Accumulate the triple product into `this`.
    ///
    /// # Arguments
    /// * `this` - square destination of order `n`
    /// * `t` - transformation, `dim_b × n`
    /// * `b` - square matrix of order `dim_b`
    ///
    /// # Errors
    /// `DimensionMismatch` if the shapes are not conformable; `this` is untouched.
    pub fn add_to(
        &mut self,
        this: &mut DMatrix<f64>,
        this_fact: f64,
        t: &DMatrix<f64>,
        b: &DMatrix<f64>,
        other_fact: f64,
    ) -> Result<()> {
        if !this.is_square() {
            return Err(FeError::dims(
                "triple_product",
                (this.nrows(), this.nrows()),
                shape(this),
            ));
        }
        if !b.is_square() {
            return Err(FeError::dims("triple_product", (b.nrows(), b.nrows()), shape(b)));
        }
        if t.ncols() != this.nrows() || t.nrows() != b.ncols() {
            return Err(FeError::dims(
                "triple_product",
                (b.ncols(), this.nrows()),
                shape(t),
            ));
        }
        if this_fact == 1.0 && other_fact == 0.0 {
            return Ok(());
        }

        let dim_b = b.nrows();
        let n = this.nrows();
        if shape(&self.work) != (dim_b, n) {
            self.work = DMatrix::zeros(dim_b, n);
        }

        // work = other_fact * B * T
        self.work.gemm(other_fact, b, t, 0.0);
        // this = this_fact * this + Tᵗ * work
        if this_fact == 0.0 {
            this.fill(0.0);
        }
        this.gemm_tr(1.0, t, &self.work, this_fact);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_t() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 4, &[
            1.0, 2.0, 0.5, -1.0,
            0.0, 3.0, -2.0, 4.0,
            1.5, 0.0, 1.0, 2.0,
        ])
    }

    fn sample_b() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[
            4.0, 1.0, 0.5,
            1.0, 3.0, -1.0,
            0.5, -1.0, 2.0,
        ])
    }

    #[test]
    fn triple_product_matches_naive() {
        let t = sample_t();
        let b = sample_b();
        let naive = t.transpose() * &b * &t;
        let result = triple_product(&t, &b).unwrap();
        for (x, y) in result.iter().zip(naive.iter()) {
            assert_relative_eq!(*x, *y, max_relative = 1e-10, epsilon = 1e-12);
        }
    }

    #[test]
    fn triple_product_accumulates_with_factors() {
        let t = sample_t();
        let b = sample_b();
        let mut this = DMatrix::identity(4, 4);
        let mut tp = TripleProduct::with_dims(3, 4);
        tp.add_to(&mut this, 2.0, &t, &b, 0.5).unwrap();
        let expected = DMatrix::identity(4, 4) * 2.0 + (t.transpose() * &b * &t) * 0.5;
        assert_relative_eq!(this, expected, epsilon = 1e-12);
    }

    #[test]
    fn triple_product_rejects_bad_shapes_without_mutation() {
        let t = sample_t();
        let b = DMatrix::identity(2, 2);
        let mut this = DMatrix::from_element(4, 4, 7.0);
        let err = TripleProduct::default().add_to(&mut this, 0.0, &t, &b, 1.0);
        assert!(matches!(err, Err(FeError::DimensionMismatch { .. })));
        assert!(this.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn solve_and_singular() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 2.0, 3.0]);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let x = solve(&a, &b).unwrap();
        assert_relative_eq!(&a * &x, b, epsilon = 1e-12);

        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(matches!(solve(&singular, &b), Err(FeError::SingularMatrix(_))));
    }

    #[test]
    fn invert_small_and_general() {
        for n in 1..=5 {
            let mut a = DMatrix::<f64>::identity(n, n) * 4.0;
            for i in 0..n {
                for j in 0..n {
                    if i != j {
                        a[(i, j)] = 1.0 / (1.0 + i as f64 + j as f64);
                    }
                }
            }
            let inv = invert(&a).unwrap();
            assert_relative_eq!(&a * inv, DMatrix::identity(n, n), epsilon = 1e-12);
        }
    }

    #[test]
    fn mismatched_products_fail() {
        let a = DMatrix::<f64>::zeros(2, 3);
        let x = DVector::<f64>::zeros(2);
        assert!(mat_vec(&a, &x).is_err());
        assert!(mat_mul(&a, &a).is_err());
        assert!(transpose_mat_vec(&a, &x).is_ok());
        let mut m = DMatrix::<f64>::zeros(2, 2);
        assert!(add_scaled(&mut m, 1.0, &a, 1.0).is_err());
    }
}
