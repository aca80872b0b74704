//! Dense vector and matrix primitives used by the solvers.
//!
//! These are thin, shape-unchecked helpers over `nalgebra`'s dynamically
//! sized types. Mismatched shapes panic inside `nalgebra`; the solvers always
//! derive their shapes from the Jacobian, so no validation is done here.
use nalgebra::{DMatrix, DVector};
use num_traits::Float;

/// Euclidean norm `$\|v\|$`.
#[inline]
pub fn norm(v: &DVector<f64>) -> f64 {
    v.norm()
}

/// Squared Euclidean norm `$\|v\|^2$`.
#[inline]
pub fn norm2(v: &DVector<f64>) -> f64 {
    v.norm_squared()
}

/// Maximum norm `$\|v\|_\infty$`, `0` for an empty vector.
///
/// `NaN` if any entry is `NaN`.
pub fn norm_inf(v: &DVector<f64>) -> f64 {
    v.iter().fold(0., |acc: f64, x| {
        if acc.is_nan() || x.is_nan() {
            f64::NAN
        } else {
            Float::max(acc, Float::abs(*x))
        }
    })
}

#[inline]
pub fn dot_product(a: &DVector<f64>, b: &DVector<f64>) -> f64 {
    a.dot(b)
}

#[inline]
pub fn add_vectors(a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
    a + b
}

#[inline]
pub fn subtract_vectors(a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
    a - b
}

#[inline]
pub fn scale_vector(v: &DVector<f64>, factor: f64) -> DVector<f64> {
    v * factor
}

#[inline]
pub fn identity_matrix(n: usize) -> DMatrix<f64> {
    DMatrix::identity(n, n)
}

#[inline]
pub fn multiply_matrix_vector(a: &DMatrix<f64>, v: &DVector<f64>) -> DVector<f64> {
    a * v
}

#[inline]
pub fn multiply_matrices(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    a * b
}

#[inline]
pub fn transpose_matrix(a: &DMatrix<f64>) -> DMatrix<f64> {
    a.transpose()
}

#[inline]
pub fn add_matrices(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    a + b
}

#[inline]
pub fn subtract_matrices(a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    a - b
}

#[inline]
pub fn scale_matrix(a: &DMatrix<f64>, factor: f64) -> DMatrix<f64> {
    a * factor
}

/// `$a b^\top$`.
#[inline]
pub fn outer_product(a: &DVector<f64>, b: &DVector<f64>) -> DMatrix<f64> {
    a * b.transpose()
}

/// Solve the dense square system `$\mathbf{A}\vec{x} = \vec{b}$`.
///
/// Uses an LU decomposition with partial pivoting. Returns `None` when `a`
/// is singular. The result is not checked for `NaN`.
pub fn lu_solve(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    a.lu().solve(b)
}
