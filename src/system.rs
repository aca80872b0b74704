use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use nalgebra::{DMatrix, DVector};

use crate::{compile, CompileError, LeastSquaresProblem, Tape, ValDers};

/// A set of constraint expressions over one shared parameter list.
///
/// Each constraint is one residual. [`val_ders`](LeastSquaresProblem::val_ders)
/// stacks the dual-mode evaluations of all tapes into a residual vector and a
/// Jacobian; [`residuals`](LeastSquaresProblem::residuals) uses the cheaper
/// value-only mode.
///
/// ```
/// # use nalgebra::dvector;
/// # use rpn_solver::{ConstraintSystem, LevenbergMarquardt};
/// // a point (x, y) on the unit circle with x = y
/// let system = ConstraintSystem::with_constraints(
///     &["x", "y"],
///     &["x 2 ^ y 2 ^ + 1 -", "x y -"],
/// ).unwrap();
/// let (x, report) = LevenbergMarquardt::new().minimize(&system, dvector![1., 0.]);
/// let x = x.unwrap();
/// assert!(report.converged());
/// assert!((x[0] - 0.5f64.sqrt()).abs() < 1e-4);
/// assert!((x[1] - 0.5f64.sqrt()).abs() < 1e-4);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintSystem {
    params: Vec<String>,
    tapes: Vec<Tape>,
}

impl ConstraintSystem {
    /// A system without constraints over `params`.
    pub fn new<S: AsRef<str>>(params: &[S]) -> Self {
        Self {
            params: params.iter().map(|p| p.as_ref().to_string()).collect(),
            tapes: Vec::new(),
        }
    }

    /// Compile all `expressions` over `params`.
    ///
    /// # Errors
    ///
    /// Returns the first [`CompileError`].
    pub fn with_constraints<S, E>(params: &[S], expressions: &[E]) -> Result<Self, CompileError>
    where
        S: AsRef<str>,
        E: AsRef<str>,
    {
        let mut system = Self::new(params);
        for expression in expressions {
            system.add_constraint(expression.as_ref())?;
        }
        Ok(system)
    }

    /// Compile `expression` and append it as the next residual.
    ///
    /// Returns the residual's row index.
    pub fn add_constraint(&mut self, expression: &str) -> Result<usize, CompileError> {
        let tape = compile(&self.params, expression)?;
        self.tapes.push(tape);
        Ok(self.tapes.len() - 1)
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn tapes(&self) -> &[Tape] {
        &self.tapes
    }

    /// Number of constraints.
    pub fn len(&self) -> usize {
        self.tapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tapes.is_empty()
    }
}

impl LeastSquaresProblem for ConstraintSystem {
    fn val_ders(&self, x: &DVector<f64>) -> ValDers {
        let n = self.params.len();
        let mut vals = DVector::zeros(self.tapes.len());
        let mut jacobian = DMatrix::zeros(self.tapes.len(), n);
        for (i, tape) in self.tapes.iter().enumerate() {
            let (val, row) = tape.gradient_row(x.as_slice());
            vals[i] = val;
            for (entry, d) in jacobian.row_mut(i).iter_mut().zip(row) {
                *entry = d;
            }
        }
        ValDers::new(vals, jacobian)
    }

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.tapes.len(),
            self.tapes.iter().map(|tape| tape.evaluate_value(x.as_slice())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differentiate_numerically;
    use alloc::{string::ToString, vec};
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn stacks_rows() {
        let system =
            ConstraintSystem::with_constraints(&["x", "y"], &["x y *", "y 3 -", "7"]).unwrap();
        assert_eq!(system.len(), 3);
        let val_ders = system.val_ders(&dvector![2., 5.]);
        assert_eq!(val_ders.vals, dvector![10., 2., 7.]);
        assert_eq!(val_ders.jacobian, dmatrix![5., 2.; 0., 1.; 0., 0.]);
        assert_eq!(system.residuals(&dvector![2., 5.]), dvector![10., 2., 7.]);
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let system = ConstraintSystem::with_constraints(
            &["a", "b", "c"],
            &["a b * sin c +", "a exp b / c 2 ^ -", "a b c max min"],
        )
        .unwrap();
        let x = dvector![0.3, 1.7, -0.4];
        let analytic = system.val_ders(&x).jacobian;
        let numeric = differentiate_numerically(&system, &x);
        assert_relative_eq!(analytic, numeric, epsilon = 1e-8);
    }

    #[test]
    fn first_error_is_reported() {
        let err = ConstraintSystem::with_constraints(&["x"], &["x 1 +", "x y +"]).unwrap_err();
        assert_eq!(err, CompileError::UnsupportedNodeType("y".to_string()));

        let mut system = ConstraintSystem::new(&["x"]);
        assert!(system.is_empty());
        assert_eq!(system.add_constraint("x 1 -"), Ok(0));
        assert_eq!(system.add_constraint("x 2 -"), Ok(1));
        assert!(system.add_constraint("x -").is_err());
        assert_eq!(system.len(), 2);
    }
}
