use alloc::{vec, vec::Vec};
use core::cell::RefCell;

use nalgebra::DVector;

use crate::{LeastSquaresProblem, ValDers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ValDers,
    Residuals,
}

/// Records every evaluation of the wrapped problem.
pub struct MockProblem<P> {
    inner: P,
    call_history: RefCell<Vec<MockCall>>,
    params: RefCell<Vec<DVector<f64>>>,
}

impl<P: LeastSquaresProblem> MockProblem<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            call_history: RefCell::new(vec![]),
            params: RefCell::new(vec![]),
        }
    }

    pub fn calls(&mut self) -> &[MockCall] {
        self.call_history.get_mut().as_slice()
    }

    /// Parameters of every evaluation, in order.
    pub fn params(&mut self) -> &[DVector<f64>] {
        self.params.get_mut().as_slice()
    }
}

impl<P: LeastSquaresProblem> LeastSquaresProblem for MockProblem<P> {
    fn val_ders(&self, x: &DVector<f64>) -> ValDers {
        self.call_history.borrow_mut().push(MockCall::ValDers);
        self.params.borrow_mut().push(x.clone());
        self.inner.val_ders(x)
    }

    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        self.call_history.borrow_mut().push(MockCall::Residuals);
        self.params.borrow_mut().push(x.clone());
        self.inner.residuals(x)
    }
}
