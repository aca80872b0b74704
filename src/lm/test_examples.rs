//! Tests with example functions.
use alloc::vec;
use approx::assert_relative_eq;
use nalgebra::*;

use super::test_helpers::{MockCall, MockProblem};
use crate::utils::differentiate_numerically;
use crate::{ConstraintSystem, LeastSquaresProblem, LevenbergMarquardt, ValDers};

/// Linear function with full rank, `$m \geq 5$` residuals over five parameters.
///
/// The minimum is at `$x_j = -1$` with `$\sum_i r_i^2 = m - 5$`.
pub struct LinearFullRank {
    pub m: usize,
}

impl LeastSquaresProblem for LinearFullRank {
    fn val_ders(&self, x: &DVector<f64>) -> ValDers {
        let m = self.m as f64;
        let mut vals = DVector::from_element(self.m, -2. * x.sum() / m - 1.);
        for (el, p) in vals.rows_range_mut(..5).iter_mut().zip(x.iter()) {
            *el += p;
        }
        let mut jacobian = DMatrix::from_element(self.m, 5, -2. / m);
        for i in 0..5 {
            jacobian[(i, i)] += 1.;
        }
        ValDers::new(vals, jacobian)
    }
}

fn rosenbrock(x: &DVector<f64>) -> ValDers {
    ValDers::new(
        dvector![10. * (x[1] - x[0] * x[0]), 1. - x[0]],
        dmatrix![-20. * x[0], 10.; -1., 0.],
    )
}

#[test]
fn test_linear_full_rank() {
    let problem = LinearFullRank { m: 10 };
    let probe = dvector![0.1, -0.4, 2.3, 0.7, -1.1];
    assert_relative_eq!(
        differentiate_numerically(&problem, &probe),
        problem.val_ders(&probe).jacobian,
        epsilon = 1e-8
    );

    let mut problem = MockProblem::new(problem);
    let (x, report) = LevenbergMarquardt::new().minimize(&problem, DVector::from_element(5, 1.));
    let x = x.unwrap();
    assert!(report.converged());
    assert_relative_eq!(x, DVector::from_element(5, -1.), epsilon = 1e-6);
    assert_relative_eq!(report.objective_function, 2.5, epsilon = 1e-6);

    let calls = problem.calls();
    assert_eq!(report.number_of_evaluations, calls.len());
    assert_eq!(calls.len(), report.number_of_steps + 1);
    assert!(calls.iter().all(|c| *c == MockCall::ValDers));
}

#[test]
fn test_rosenbrock() {
    let probe = dvector![0.5, -0.3];
    assert_relative_eq!(
        differentiate_numerically(&rosenbrock, &probe),
        rosenbrock(&probe).jacobian,
        epsilon = 1e-8
    );

    let (x, report) = LevenbergMarquardt::new().minimize(&rosenbrock, dvector![-1.2, 1.]);
    assert!(report.converged());
    assert_relative_eq!(x.unwrap(), dvector![1., 1.], epsilon = 1e-3);
    assert!(report.objective_function < 1e-8);
}

#[test]
fn test_compiled_rosenbrock() {
    let system =
        ConstraintSystem::with_constraints(&["x", "y"], &["y x 2 ^ - 10 *", "1 x -"]).unwrap();
    let probe = dvector![0.5, -0.3];
    let compiled = system.val_ders(&probe);
    let hand_written = rosenbrock(&probe);
    assert_relative_eq!(compiled.vals, hand_written.vals, epsilon = 1e-12);
    assert_relative_eq!(compiled.jacobian, hand_written.jacobian, epsilon = 1e-12);

    let (x, report) = LevenbergMarquardt::new().minimize(&system, dvector![-1.2, 1.]);
    assert!(report.converged());
    assert_relative_eq!(x.unwrap(), dvector![1., 1.], epsilon = 1e-3);
}

#[test]
fn test_himmelblau() {
    let problem = |x: &DVector<f64>| {
        ValDers::new(
            dvector![x[0] * x[0] + x[1] - 11., x[0] + x[1] * x[1] - 7.],
            dmatrix![2. * x[0], 1.; 1., 2. * x[1]],
        )
    };
    let (x, report) = LevenbergMarquardt::new().minimize(&problem, dvector![1., 1.]);
    assert!(report.converged());
    assert_relative_eq!(x.unwrap(), dvector![3., 2.], epsilon = 1e-3);
}

#[test]
fn test_no_residuals() {
    let mut problem = MockProblem::new(|x: &DVector<f64>| ValDers::empty(x.len()));
    let x0 = dvector![4., -2., 0.5];
    let (x, report) = LevenbergMarquardt::new().minimize(&problem, x0.clone());
    assert_eq!(x, Some(x0));
    assert!(report.converged());
    assert_eq!(report.number_of_steps, 0);
    assert_eq!(report.objective_function, 0.);
    assert_eq!(problem.calls(), &[MockCall::ValDers]);
}
