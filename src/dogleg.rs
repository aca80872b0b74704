//! Powell's dogleg trust-region method.
use log::{debug, warn};
use nalgebra::DVector;
use num_traits::Float;

use crate::lm::{Failure, MinimizationReport};
use crate::matrix::{
    add_matrices, add_vectors, dot_product, identity_matrix, lu_solve, multiply_matrix_vector,
    norm, norm2, norm_inf, scale_matrix, scale_vector, subtract_vectors,
};
use crate::problem::{CountedProblem, Linearization};
use crate::LeastSquaresProblem;

/// Tikhonov term added to the diagonal of `$\mathbf{J}^\top\mathbf{J}$`.
const REGULARIZATION: f64 = 1e-8;

/// Powell's dogleg trust-region algorithm.
///
/// Each step combines the Gauss-Newton step `$\vec{h}_{gn}$` with the
/// steepest descent direction `$\vec{h}_{sd} = -\vec{g}$`, where
/// `$\vec{g} = \mathbf{J}^\top\vec{f}$`, so that the step stays inside a
/// ball of radius `$\Delta$`. The radius adapts to the gain ratio
/// ```math
///   \rho = \frac{F(\vec{x}) - F(\vec{x} + \vec{h})}{L(\vec{0}) - L(\vec{h})},
///   \quad F(\vec{x}) = \tfrac{1}{2}\|\vec{f}(\vec{x})\|^2,
///   \quad L(\vec{h}) = \tfrac{1}{2}\|\vec{f} + \mathbf{J}\vec{h}\|^2.
/// ```
///
/// # Reference
///
/// > K. Madsen, H. B. Nielsen, O. Tingleff. Methods for Non-Linear Least
/// > Squares Problems, 2nd ed., 2004, section 3.3.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DogLeg {
    delta0: Option<f64>,
    epsilon: f64,
    max_steps: usize,
}

impl DogLeg {
    pub fn new() -> Self {
        Self {
            delta0: None,
            epsilon: 1e-8,
            max_steps: 1000,
        }
    }

    /// Set the initial trust-region radius.
    ///
    /// Defaults to `$\frac{1}{2}\|\vec{g}\|_\infty$` at the initial point.
    ///
    /// # Panics
    ///
    /// Panics if `$\Delta_0 \leq 0$`.
    pub fn with_delta0(self, delta0: f64) -> Self {
        assert!(delta0 > 0., "delta0 must be > 0");
        Self {
            delta0: Some(delta0),
            ..self
        }
    }

    /// Set the threshold shared by the three stopping criteria
    /// `$\|\vec{g}\|_\infty \leq \epsilon$`, `$\|\vec{f}\|_\infty \leq \epsilon$`
    /// and `$\|\vec{h}\| \leq \epsilon(\|\vec{x}\| + \epsilon)$`.
    ///
    /// # Panics
    ///
    /// Panics if `$\epsilon < 0$`.
    pub fn with_epsilon(self, epsilon: f64) -> Self {
        assert!(epsilon >= 0., "epsilon must be >= 0");
        Self { epsilon, ..self }
    }

    /// Set the maximal number of steps.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{max\_steps} = 0$`.
    pub fn with_max_steps(self, max_steps: usize) -> Self {
        assert!(max_steps > 0, "max_steps must be > 0");
        Self { max_steps, ..self }
    }

    /// Try to solve the given least-squares problem starting at `initial_x`.
    ///
    /// Always returns the current iterate; check the report for failures.
    /// A problem without residuals returns `initial_x` unchanged.
    pub fn minimize<P>(&self, problem: &P, initial_x: DVector<f64>) -> (DVector<f64>, MinimizationReport)
    where
        P: LeastSquaresProblem + ?Sized,
    {
        let mut target = CountedProblem::new(problem);
        let mut report = MinimizationReport::new();

        let mut current = Linearization::new(target.val_ders(&initial_x));
        report.number_of_evaluations = target.evaluations;
        if current.residuals.is_empty() {
            report.objective_function = 0.;
            return (initial_x, report);
        }

        let (eps1, eps2, eps3) = (self.epsilon, self.epsilon, self.epsilon);
        let identity = identity_matrix(initial_x.len());
        let mut x = initial_x;
        if !is_finite(&current) {
            warn!("dogleg gave up, residuals or gradient at the initial point are not finite");
            report.failure = Some(Failure::Numerical);
            report.objective_function = 0.5 * current.error;
            return (x, report);
        }
        let mut delta = self
            .delta0
            .unwrap_or_else(|| 0.5 * norm_inf(&current.gradient));
        let mut found = norm_inf(&current.residuals) <= eps3 || norm_inf(&current.gradient) <= eps1;

        while !found && report.number_of_steps < self.max_steps {
            report.number_of_steps += 1;

            let g = &current.gradient;
            let normal = add_matrices(&current.hessian, &scale_matrix(&identity, REGULARIZATION));
            let h_gn = if let Some(h_gn) = lu_solve(normal, &scale_vector(g, -1.)) {
                h_gn
            } else {
                warn!("dogleg gave up, Gauss-Newton step {} is singular", report.number_of_steps);
                report.failure = Some(Failure::Numerical);
                break;
            };
            let jg_norm2 = norm2(&multiply_matrix_vector(&current.jacobian, g));
            let alpha = if jg_norm2 > 0. { norm2(g) / jg_norm2 } else { 0. };
            let h_sd = scale_vector(g, -1.);
            let h_dl = dogleg_step(&h_gn, &h_sd, alpha, delta);

            let h_norm = norm(&h_dl);
            if h_norm <= eps2 * (norm(&x) + eps2) {
                found = true;
                break;
            }

            let x_new = add_vectors(&x, &h_dl);
            let f_new = target.residuals(&x_new);
            let actual_gain = 0.5 * current.error - 0.5 * norm2(&f_new);
            let predicted_gain = -dot_product(&h_dl, g)
                - 0.5 * norm2(&multiply_matrix_vector(&current.jacobian, &h_dl));
            let rho = if predicted_gain > 0. {
                actual_gain / predicted_gain
            } else {
                0.
            };

            debug!(
                "dogleg step {}: delta = {:e}, |h| = {:e}, rho = {:e}",
                report.number_of_steps, delta, h_norm, rho
            );

            if rho > 0. {
                x = x_new;
                current = Linearization::new(target.val_ders(&x));
                if !is_finite(&current) {
                    warn!(
                        "dogleg gave up, residuals or gradient after step {} are not finite",
                        report.number_of_steps
                    );
                    report.failure = Some(Failure::Numerical);
                    break;
                }
                found = norm_inf(&current.residuals) <= eps3 || norm_inf(&current.gradient) <= eps1;
            }
            if rho > 0.75 {
                delta = Float::max(delta, 3. * h_norm);
            } else if rho < 0.25 {
                delta /= 2.;
                found = found || delta <= eps2 * (norm(&x) + eps2);
            }
        }

        if !found && report.failure.is_none() {
            warn!(
                "dogleg took too many steps ({}), error = {:e}",
                report.number_of_steps, current.error
            );
            report.failure = Some(Failure::LostPatience);
        }
        report.number_of_evaluations = target.evaluations;
        report.objective_function = 0.5 * current.error;
        (x, report)
    }
}

impl Default for DogLeg {
    fn default() -> Self {
        Self::new()
    }
}

fn is_finite(linearization: &Linearization) -> bool {
    linearization.residuals.iter().all(|r| r.is_finite())
        && linearization.gradient.iter().all(|g| g.is_finite())
}

/// Pick the step along the dogleg path with length at most `delta`.
///
/// `alpha * h_sd` is the Cauchy point, the minimizer of the linear model
/// along the steepest descent direction.
fn dogleg_step(h_gn: &DVector<f64>, h_sd: &DVector<f64>, alpha: f64, delta: f64) -> DVector<f64> {
    if norm(h_gn) <= delta {
        return h_gn.clone();
    }
    let a = scale_vector(h_sd, alpha);
    if norm(&a) >= delta {
        return scale_vector(h_sd, delta / norm(h_sd));
    }
    // find beta with ||a + beta (h_gn - a)|| = delta
    let b_minus_a = subtract_vectors(h_gn, &a);
    let c = dot_product(&a, &b_minus_a);
    let bma2 = norm2(&b_minus_a);
    let rest = delta * delta - norm2(&a);
    let root = Float::sqrt(c * c + bma2 * rest);
    let beta = if c <= 0. {
        (root - c) / bma2
    } else {
        rest / (c + root)
    };
    add_vectors(&a, &scale_vector(&b_minus_a, beta))
}
