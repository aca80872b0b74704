//! Nonlinear least squares over postfix expressions, using forward-mode
//! automatic differentiation and [nalgebra](https://nalgebra.org).
//!
//! Every residual `$r_i\!:\R^n\to\R$` is written as a whitespace separated
//! postfix expression over named parameters, e.g. `x 2 ^ y 2 ^ + 1 -` for
//! `$x^2 + y^2 - 1$`. [`compile()`] turns an expression into a [`Tape`], which
//! evaluates to a value together with its gradient (see [`Value`]).
//! Two solvers then minimize
//! ```math
//! \min_{\vec{x}\in\R^n}\frac{1}{2}\sum_{i=1}^m \bigl(r_i(\vec{x})\bigr)^2:
//! ```
//!
//! - [`LevenbergMarquardt`], a damped Gauss-Newton method, and
//! - [`DogLeg`], Powell's trust-region method.
//!
//! Both accept any [`LeastSquaresProblem`], so hand-written residuals with
//! a Jacobian work as well as a [`ConstraintSystem`] of compiled expressions.
//!
//! # Usage Example
//!
//! Intersect the unit circle with the line `$y = 2x$`:
//!
//! ```
//! # use nalgebra::dvector;
//! # use rpn_solver::{ConstraintSystem, DogLeg, LevenbergMarquardt};
//! let system = ConstraintSystem::with_constraints(
//!     &["x", "y"],
//!     &["x x * y y * + 1 -", "y 2 x * -"],
//! )?;
//!
//! let (x, report) = LevenbergMarquardt::new().minimize(&system, dvector![1., 1.]);
//! assert!(report.converged());
//! let x = x.unwrap();
//! assert!((x[1] - 2. * x[0]).abs() < 1e-4);
//!
//! let (x, report) = DogLeg::new().minimize(&system, dvector![1., 1.]);
//! assert!(report.converged());
//! assert!((x[0] * x[0] + x[1] * x[1] - 1.).abs() < 1e-4);
//! # Ok::<(), rpn_solver::CompileError>(())
//! ```
//!
//! # Derivative checking
//!
//! Jacobians of hand-written problems can be compared against
//! [`differentiate_numerically`].
#![no_std]

extern crate alloc;

mod compile;
mod dogleg;
mod lm;
pub mod matrix;
mod problem;
mod system;
mod tape;
mod utils;
pub mod valder;

pub use compile::{compile, CompileError};
pub use dogleg::DogLeg;
pub use lm::{Failure, LevenbergMarquardt, MinimizationReport};
pub use problem::{LeastSquaresProblem, ValDers};
pub use system::ConstraintSystem;
pub use tape::{BinaryOp, Builtin, Instruction, Tape, VALUE_DIV_EPSILON};
pub use valder::{Value, DUAL_DIV_EPSILON};

pub use utils::{derivative, differentiate_numerically};
