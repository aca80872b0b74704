use alloc::vec;
use approx::assert_relative_eq;
use nalgebra::{dmatrix, dvector, DVector};

use super::test_helpers::MockProblem;
use crate::{Failure, LevenbergMarquardt, ValDers};

fn shifted(x: &DVector<f64>) -> ValDers {
    ValDers::new(dvector![x[0] - 5.], dmatrix![1.])
}

#[test]
fn single_damped_step() {
    // (1 + 10) delta = 1 * (0 - 5)
    let (x, report) = LevenbergMarquardt::new()
        .with_max_steps(1)
        .minimize(&shifted, dvector![0.]);
    assert_relative_eq!(x.unwrap(), dvector![5. / 11.]);
    assert_eq!(report.failure, Some(Failure::LostPatience));
    assert_eq!(report.number_of_steps, 1);
    assert_eq!(report.number_of_evaluations, 2);
}

#[test]
fn initial_lambda_scales_first_step() {
    let (x, _) = LevenbergMarquardt::new()
        .with_initial_lambda(1.)
        .with_max_steps(1)
        .minimize(&shifted, dvector![0.]);
    assert_relative_eq!(x.unwrap(), dvector![2.5]);
}

#[test]
fn lambda_shrinks_after_accepted_step() {
    // second step uses lambda = 1: 5/11 + (5 - 5/11) / 2
    let mut problem = MockProblem::new(shifted);
    let (x, _) = LevenbergMarquardt::new()
        .with_max_steps(2)
        .minimize(&problem, dvector![0.]);
    let expected = 5. / 11. + (5. - 5. / 11.) / 2.;
    assert_relative_eq!(x.unwrap(), dvector![expected], epsilon = 1e-12);
    let params = problem.params();
    assert_eq!(params.len(), 3);
    assert_relative_eq!(params[1], dvector![5. / 11.]);
}

#[test]
fn rejected_trial_is_returned() {
    // the residual jumps away from zero, so the only trial is rejected
    let problem = |x: &DVector<f64>| {
        let r = if x[0] == 0. { 1. } else { 10. };
        ValDers::new(dvector![r], dmatrix![1.])
    };
    let (x, report) = LevenbergMarquardt::new()
        .with_max_steps(1)
        .minimize(&problem, dvector![0.]);
    assert_relative_eq!(x.unwrap(), dvector![-1. / 11.]);
    assert_eq!(report.failure, Some(Failure::LostPatience));
    assert_relative_eq!(report.objective_function, 50.);
}

#[test]
fn lambda_grows_after_rejected_step() {
    // lambda = 100 after the first rejection: x = -1 / 101
    let problem = |x: &DVector<f64>| {
        let r = if x[0] == 0. { 1. } else { 10. };
        ValDers::new(dvector![r], dmatrix![1.])
    };
    let (x, _) = LevenbergMarquardt::new()
        .with_max_steps(2)
        .minimize(&problem, dvector![0.]);
    assert_relative_eq!(x.unwrap(), dvector![-1. / 101.]);
}

#[test]
fn nan_jacobian() {
    let problem = |x: &DVector<f64>| ValDers::new(dvector![x[0]], dmatrix![f64::NAN]);
    let (x, report) = LevenbergMarquardt::new().minimize(&problem, dvector![1.]);
    assert!(x.is_none());
    assert_eq!(report.failure, Some(Failure::Numerical));
    assert_eq!(report.number_of_steps, 0);
}

#[test]
fn converges_on_small_residual() {
    let (x, report) = LevenbergMarquardt::new().minimize(&shifted, dvector![0.]);
    assert!(report.converged());
    assert_relative_eq!(x.unwrap(), dvector![5.], epsilon = 1e-4);
    assert!(report.objective_function < 1e-8);
}

#[test]
#[should_panic(expected = "max_steps must be > 0")]
fn zero_steps_rejected() {
    let _ = LevenbergMarquardt::new().with_max_steps(0);
}
