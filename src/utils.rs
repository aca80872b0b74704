use nalgebra::{DMatrix, DVector};
use num_traits::Float;

use crate::LeastSquaresProblem;

/// Relative step of the central difference quotient, `$\sqrt[3]{\epsilon}$`.
fn step(x: f64) -> f64 {
    Float::cbrt(f64::EPSILON) * Float::max(Float::abs(x), 1.)
}

/// Central difference approximation of `f'(x)`.
pub fn derivative(x: f64, f: impl Fn(f64) -> f64) -> f64 {
    let h = step(x);
    (f(x + h) - f(x - h)) / (2. * h)
}

/// Compute a [numerical approximation](https://en.wikipedia.org/wiki/Numerical_differentiation)
/// to the Jacobian for testing.
///
/// The function is intended to be used for debugging or testing.
/// You can try to check your derivative implementation of an
/// [`LeastSquaresProblem`](trait.LeastSquaresProblem.html) with this.
///
/// Only the residuals of [`val_ders`](LeastSquaresProblem::val_ders) are used,
/// so the result approximates exactly the Jacobian returned next to them.
///
/// Computing the derivatives numerically is unstable: You can construct
/// functions where the computed result is catastrophically wrong. If you
/// observe large differences between the derivative computed by this function
/// and your implementation the reason _might_ be due to instabilty.
pub fn differentiate_numerically<P>(problem: &P, x: &DVector<f64>) -> DMatrix<f64>
where
    P: LeastSquaresProblem + ?Sized,
{
    let m = problem.val_ders(x).vals.len();
    let mut jacobian = DMatrix::zeros(m, x.len());
    let mut probe = x.clone();
    for j in 0..x.len() {
        let h = step(x[j]);
        probe[j] = x[j] + h;
        let forward = problem.val_ders(&probe).vals;
        probe[j] = x[j] - h;
        let backward = problem.val_ders(&probe).vals;
        probe[j] = x[j];
        jacobian.set_column(j, &((forward - backward) / (2. * h)));
    }
    jacobian
}
