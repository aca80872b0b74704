use log::{debug, warn};
use nalgebra::DVector;
use num_traits::Float;

use crate::matrix::{add_matrices, identity_matrix, lu_solve, norm2, scale_matrix, subtract_vectors};
use crate::problem::{CountedProblem, Linearization};
use crate::LeastSquaresProblem;

#[cfg(test)]
mod test_examples;
#[cfg(test)]
pub(crate) mod test_helpers;
#[cfg(test)]
mod test_step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Reasons for failure of the minimization.
pub enum Failure {
    /// The step could not be computed, it contained `NaN` or the linear
    /// system was singular.
    Numerical,
    /// The maximum number of steps was hit before convergence.
    LostPatience,
}

#[derive(Debug, Clone, PartialEq)]
/// Information about the minimization.
///
/// Use this to inspect the minimization process. Most importantly
/// you may want to check if there was a failure.
pub struct MinimizationReport {
    pub failure: Option<Failure>,
    pub number_of_evaluations: usize,
    pub number_of_steps: usize,
    /// Contains `$\frac{1}{2}\|\vec{r}\|^2$` at the returned parameters,
    /// `NaN` if none were returned.
    pub objective_function: f64,
}

impl MinimizationReport {
    pub(crate) fn new() -> Self {
        Self {
            failure: None,
            number_of_evaluations: 0,
            number_of_steps: 0,
            objective_function: f64::NAN,
        }
    }

    pub fn converged(&self) -> bool {
        self.failure.is_none()
    }
}

/// Levenberg-Marquardt optimization algorithm.
///
/// Each step solves the damped normal equations
/// ```math
///   (\mathbf{J}^\top\mathbf{J} + \lambda\mathbf{I})\,\vec{\delta} = \mathbf{J}^\top\vec{r}
/// ```
/// and tries `$\vec{x} - \vec{\delta}$`. A trial which lowers
/// `$\sum_i r_i^2$` is accepted and `$\lambda$` shrinks towards Gauss-Newton;
/// otherwise `$\lambda$` grows towards gradient descent.
///
/// The runtime and termination behavior can be controlled by various hyperparameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LevenbergMarquardt {
    initial_lambda: f64,
    lambda_up: f64,
    lambda_down: f64,
    epsilon: f64,
    max_steps: usize,
}

impl LevenbergMarquardt {
    pub fn new() -> Self {
        Self {
            initial_lambda: 10.,
            lambda_up: 10.,
            lambda_down: 10.,
            epsilon: 1e-8,
            max_steps: usize::MAX,
        }
    }

    /// Set the damping factor `$\lambda$` of the first step.
    ///
    /// # Panics
    ///
    /// Panics if `$\lambda \leq 0$`.
    pub fn with_initial_lambda(self, initial_lambda: f64) -> Self {
        assert!(initial_lambda > 0., "initial_lambda must be > 0");
        Self {
            initial_lambda,
            ..self
        }
    }

    /// Set the factor `$\lambda$` is multiplied with after a rejected step.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{lambda\_up} \leq 0$`.
    pub fn with_lambda_up(self, lambda_up: f64) -> Self {
        assert!(lambda_up > 0., "lambda_up must be > 0");
        Self { lambda_up, ..self }
    }

    /// Set the factor `$\lambda$` is divided by after an accepted step.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{lambda\_down} \leq 0$`.
    pub fn with_lambda_down(self, lambda_down: f64) -> Self {
        assert!(lambda_down > 0., "lambda_down must be > 0");
        Self {
            lambda_down,
            ..self
        }
    }

    /// Set the convergence threshold.
    ///
    /// The iteration stops after a step whose trial point has
    /// `$\sum_i r_i^2 < \epsilon$`, whose Jacobian entries are all below
    /// `$\epsilon$` in magnitude, or whose error differs from the current one
    /// by less than `$\epsilon$`.
    ///
    /// # Panics
    ///
    /// Panics if `$\epsilon < 0$`.
    pub fn with_epsilon(self, epsilon: f64) -> Self {
        assert!(epsilon >= 0., "epsilon must be >= 0");
        Self { epsilon, ..self }
    }

    /// Set the maximal number of steps. Unbounded by default.
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
    /// Returns the last trial point, which is not necessarily the best one
    /// seen, also when the step budget ran out. Returns `None` if a step
    /// could not be computed.
    ///
    /// A problem without residuals returns `initial_x` unchanged.
    pub fn minimize<P>(
        &self,
        problem: &P,
        initial_x: DVector<f64>,
    ) -> (Option<DVector<f64>>, MinimizationReport)
    where
        P: LeastSquaresProblem + ?Sized,
    {
        let mut target = CountedProblem::new(problem);
        let mut report = MinimizationReport::new();

        let initial = target.val_ders(&initial_x);
        report.number_of_evaluations = target.evaluations;
        if initial.vals.is_empty() {
            report.objective_function = 0.;
            return (Some(initial_x), report);
        }

        let identity = identity_matrix(initial_x.len());
        let mut current = Linearization::new(initial);
        let mut lambda = self.initial_lambda;
        let mut x = initial_x;
        let mut trial_x = x.clone();
        let mut trial_error = current.error;
        let mut converged = false;

        while !converged && report.number_of_steps < self.max_steps {
            let damped = add_matrices(&current.hessian, &scale_matrix(&identity, lambda));
            let delta = match lu_solve(damped, &current.gradient) {
                Some(delta) if !delta.iter().any(|d| d.is_nan()) => delta,
                _ => {
                    warn!(
                        "Levenberg-Marquardt gave up, step {} has no solution (lambda = {})",
                        report.number_of_steps, lambda
                    );
                    report.number_of_evaluations = target.evaluations;
                    report.failure = Some(Failure::Numerical);
                    return (None, report);
                }
            };

            trial_x = subtract_vectors(&x, &delta);
            let trial = target.val_ders(&trial_x);
            trial_error = norm2(&trial.vals);

            let epsilon = self.epsilon;
            converged = trial_error < epsilon
                || trial.jacobian.iter().all(|d| Float::abs(*d) < epsilon)
                || Float::abs(current.error - trial_error) < epsilon;

            debug!(
                "lm step {}: lambda = {:e}, error = {:e}, trial error = {:e}",
                report.number_of_steps, lambda, current.error, trial_error
            );

            if trial_error < current.error {
                x.copy_from(&trial_x);
                current = Linearization::new(trial);
                lambda /= self.lambda_down;
            } else {
                lambda *= self.lambda_up;
            }
            report.number_of_steps += 1;
        }

        if !converged {
            warn!(
                "Levenberg-Marquardt took too many steps ({}), error = {:e}",
                report.number_of_steps, trial_error
            );
            report.failure = Some(Failure::LostPatience);
        }
        report.number_of_evaluations = target.evaluations;
        report.objective_function = trial_error * 0.5;
        (Some(trial_x), report)
    }
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new()
    }
}
