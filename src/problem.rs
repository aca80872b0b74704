use nalgebra::{DMatrix, DVector};

use crate::matrix::{multiply_matrices, multiply_matrix_vector, norm2, transpose_matrix};

/// Residuals together with their Jacobian at one parameter vector.
///
/// `jacobian` has one row per entry of `vals` and one column per parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ValDers {
    pub vals: DVector<f64>,
    pub jacobian: DMatrix<f64>,
}

impl ValDers {
    pub fn new(vals: DVector<f64>, jacobian: DMatrix<f64>) -> Self {
        debug_assert_eq!(vals.len(), jacobian.nrows());
        Self { vals, jacobian }
    }

    /// No residuals over `n` parameters.
    pub fn empty(n: usize) -> Self {
        Self {
            vals: DVector::zeros(0),
            jacobian: DMatrix::zeros(0, n),
        }
    }
}

/// A least squares minimization problem.
///
/// This is what [`LevenbergMarquardt`](crate::LevenbergMarquardt) and
/// [`DogLeg`](crate::DogLeg) need to compute the residuals and the Jacobian.
/// Closures `Fn(&DVector<f64>) -> ValDers` implement it directly; compiled
/// expressions are usually wrapped in a
/// [`ConstraintSystem`](crate::ConstraintSystem).
pub trait LeastSquaresProblem {
    /// Residuals and Jacobian at `x`.
    fn val_ders(&self, x: &DVector<f64>) -> ValDers;

    /// Residuals at `x` only.
    ///
    /// Used where the Jacobian would be thrown away. Implementations may use
    /// a cheaper evaluation path here.
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        self.val_ders(x).vals
    }
}

impl<F> LeastSquaresProblem for F
where
    F: Fn(&DVector<f64>) -> ValDers,
{
    fn val_ders(&self, x: &DVector<f64>) -> ValDers {
        self(x)
    }
}

/// Helper counting how often the problem was evaluated.
pub(crate) struct CountedProblem<'a, P: ?Sized> {
    problem: &'a P,
    pub evaluations: usize,
}

impl<'a, P: LeastSquaresProblem + ?Sized> CountedProblem<'a, P> {
    pub fn new(problem: &'a P) -> Self {
        Self {
            problem,
            evaluations: 0,
        }
    }

    pub fn val_ders(&mut self, x: &DVector<f64>) -> ValDers {
        self.evaluations += 1;
        self.problem.val_ders(x)
    }

    pub fn residuals(&mut self, x: &DVector<f64>) -> DVector<f64> {
        self.evaluations += 1;
        self.problem.residuals(x)
    }
}

/// Gauss-Newton quantities derived from one [`ValDers`].
pub(crate) struct Linearization {
    pub residuals: DVector<f64>,
    pub jacobian: DMatrix<f64>,
    /// `$\mathbf{J}^\top\mathbf{J}$`
    pub hessian: DMatrix<f64>,
    /// `$\mathbf{J}^\top\vec{r}$`
    pub gradient: DVector<f64>,
    /// `$\sum_i r_i^2$`
    pub error: f64,
}

impl Linearization {
    pub fn new(val_ders: ValDers) -> Self {
        let ValDers { vals, jacobian } = val_ders;
        let transposed = transpose_matrix(&jacobian);
        let hessian = multiply_matrices(&transposed, &jacobian);
        let gradient = multiply_matrix_vector(&transposed, &vals);
        let error = norm2(&vals);
        Self {
            residuals: vals,
            jacobian,
            hessian,
            gradient,
            error,
        }
    }
}
