//! Dual values ("valders") for forward-mode differentiation.
//!
//! A [`Value`] is either a plain number or a number carried together with its
//! gradient with respect to every parameter of a tape. Every operation in this
//! module accepts any mix of the two variants and only allocates a gradient
//! when at least one operand has one, so constant sub-expressions stay cheap.
//!
//! Divisions (including the ones hidden in the derivatives of `tan` and the
//! inverse trigonometric functions) never produce an infinity from an exact
//! zero denominator: the denominator is replaced by [`DUAL_DIV_EPSILON`].
use alloc::{vec, vec::Vec};
use core::ops::{Add, Div, Mul, Neg, Sub};

use num_traits::Float;

/// Replacement for a denominator that is exactly `0.0` in dual arithmetic.
pub const DUAL_DIV_EPSILON: f64 = 1e-15;

/// Temperature used by the tape for `max` and `min`.
pub const DEFAULT_TAU: f64 = 1.0;

/// A plain number or a value with its gradient.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A constant. Its gradient is implicitly zero.
    Scalar(f64),
    /// A value and `$\partial\,\mathrm{val}/\partial x_i$` for every parameter `$x_i$`.
    Dual { val: f64, grad: Vec<f64> },
}

impl Value {
    /// The `index`-th of `len` parameters, seeded with a one-hot gradient.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn variable(val: f64, index: usize, len: usize) -> Self {
        let mut grad = vec![0.; len];
        grad[index] = 1.;
        Value::Dual { val, grad }
    }

    /// The primal value.
    #[inline]
    pub fn value(&self) -> f64 {
        match self {
            Value::Scalar(val) | Value::Dual { val, .. } => *val,
        }
    }

    /// The gradient, or `None` for a plain number.
    #[inline]
    pub fn gradient(&self) -> Option<&[f64]> {
        match self {
            Value::Scalar(_) => None,
            Value::Dual { grad, .. } => Some(grad),
        }
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    /// Split into value and a dense gradient of length `len`.
    ///
    /// Plain numbers get an all-zero gradient.
    pub fn into_parts(self, len: usize) -> (f64, Vec<f64>) {
        match self {
            Value::Scalar(val) => (val, vec![0.; len]),
            Value::Dual { val, grad } => (val, grad),
        }
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(val: f64) -> Self {
        Value::Scalar(val)
    }
}

/// `num / den`, with an exactly zero `den` replaced by [`DUAL_DIV_EPSILON`].
#[inline]
pub fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0. {
        num / DUAL_DIV_EPSILON
    } else {
        num / den
    }
}

#[inline]
fn scaled(grad: &[f64], factor: f64) -> Vec<f64> {
    grad.iter().map(|d| d * factor).collect()
}

#[inline]
fn zip_with(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    a.iter().zip(b).map(|(&a, &b)| f(a, b)).collect()
}

/// Chain rule for a unary function whose result is `val` and whose
/// derivative channel `d` maps to `dmap(d)`.
#[inline]
fn unary(x: &Value, val: f64, dmap: impl Fn(f64) -> f64) -> Value {
    match x {
        Value::Scalar(_) => Value::Scalar(val),
        Value::Dual { grad, .. } => Value::Dual {
            val,
            grad: grad.iter().map(|&d| dmap(d)).collect(),
        },
    }
}

pub fn plus(x0: &Value, x1: &Value) -> Value {
    match (x0, x1) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(a + b),
        (Value::Dual { val, grad }, Value::Scalar(b)) => Value::Dual {
            val: val + b,
            grad: grad.clone(),
        },
        (Value::Scalar(a), Value::Dual { val, grad }) => Value::Dual {
            val: a + val,
            grad: grad.clone(),
        },
        (Value::Dual { val: u, grad: du }, Value::Dual { val: v, grad: dv }) => Value::Dual {
            val: u + v,
            grad: zip_with(du, dv, |a, b| a + b),
        },
    }
}

pub fn minus(x0: &Value, x1: &Value) -> Value {
    match (x0, x1) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(a - b),
        (Value::Dual { val, grad }, Value::Scalar(b)) => Value::Dual {
            val: val - b,
            grad: grad.clone(),
        },
        (Value::Scalar(a), Value::Dual { val, grad }) => Value::Dual {
            val: a - val,
            grad: scaled(grad, -1.),
        },
        (Value::Dual { val: u, grad: du }, Value::Dual { val: v, grad: dv }) => Value::Dual {
            val: u - v,
            grad: zip_with(du, dv, |a, b| a - b),
        },
    }
}

pub fn mul(x0: &Value, x1: &Value) -> Value {
    match (x0, x1) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(a * b),
        (Value::Dual { val, grad }, Value::Scalar(c)) | (Value::Scalar(c), Value::Dual { val, grad }) => {
            Value::Dual {
                val: val * c,
                grad: scaled(grad, *c),
            }
        }
        (Value::Dual { val: u, grad: du }, Value::Dual { val: v, grad: dv }) => Value::Dual {
            val: u * v,
            grad: zip_with(du, dv, |du, dv| u * dv + v * du),
        },
    }
}

/// Quotient rule. An exactly zero denominator is replaced by
/// [`DUAL_DIV_EPSILON`] in the value and in every derivative channel.
pub fn div(x0: &Value, x1: &Value) -> Value {
    match (x0, x1) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(safe_div(*a, *b)),
        (Value::Dual { val: u, grad: du }, Value::Scalar(c)) => Value::Dual {
            val: safe_div(*u, *c),
            grad: du.iter().map(|&d| safe_div(d, *c)).collect(),
        },
        (Value::Scalar(a), Value::Dual { val: v, grad: dv }) => {
            let den = v * v;
            Value::Dual {
                val: safe_div(*a, *v),
                grad: dv.iter().map(|&d| safe_div(-a * d, den)).collect(),
            }
        }
        (Value::Dual { val: u, grad: du }, Value::Dual { val: v, grad: dv }) => {
            let den = v * v;
            Value::Dual {
                val: safe_div(*u, *v),
                grad: zip_with(du, dv, |du, dv| safe_div(du * v - u * dv, den)),
            }
        }
    }
}

/// `x0` raised to `x1`.
///
/// When both operands carry gradients the two partial derivatives are
/// combined inside a single zero-safe division,
/// `$u^v \cdot \mathrm{safe\_div}(v\,du + u\ln(u)\,dv,\; u)$`.
pub fn power(x0: &Value, x1: &Value) -> Value {
    match (x0, x1) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(Float::powf(*a, *b)),
        (Value::Dual { val: u, grad: du }, Value::Scalar(c)) => Value::Dual {
            val: Float::powf(*u, *c),
            grad: scaled(du, c * Float::powf(*u, c - 1.)),
        },
        (Value::Scalar(a), Value::Dual { val: v, grad: dv }) => {
            let val = Float::powf(*a, *v);
            Value::Dual {
                val,
                grad: scaled(dv, Float::ln(*a) * val),
            }
        }
        (Value::Dual { val: u, grad: du }, Value::Dual { val: v, grad: dv }) => {
            let val = Float::powf(*u, *v);
            let u_ln_u = u * Float::ln(*u);
            Value::Dual {
                val,
                grad: zip_with(du, dv, |du, dv| val * safe_div(v * du + u_ln_u * dv, *u)),
            }
        }
    }
}

pub fn neg(x: &Value) -> Value {
    unary(x, -x.value(), |d| -d)
}

pub fn sin(x: &Value) -> Value {
    let u = x.value();
    let cos = Float::cos(u);
    unary(x, Float::sin(u), |d| cos * d)
}

pub fn cos(x: &Value) -> Value {
    let u = x.value();
    let sin = Float::sin(u);
    unary(x, Float::cos(u), |d| -sin * d)
}

pub fn tan(x: &Value) -> Value {
    let u = x.value();
    let cos = Float::cos(u);
    unary(x, Float::tan(u), |d| safe_div(d, cos * cos))
}

pub fn asin(x: &Value) -> Value {
    let u = x.value();
    let den = Float::sqrt(1. - u * u);
    unary(x, Float::asin(u), |d| safe_div(d, den))
}

pub fn acos(x: &Value) -> Value {
    let u = x.value();
    let den = Float::sqrt(1. - u * u);
    unary(x, Float::acos(u), |d| -safe_div(d, den))
}

pub fn atan(x: &Value) -> Value {
    let u = x.value();
    let den = 1. + u * u;
    unary(x, Float::atan(u), |d| safe_div(d, den))
}

pub fn exp(x: &Value) -> Value {
    let e = Float::exp(x.value());
    unary(x, e, |d| e * d)
}

pub fn sqrt(x: &Value) -> Value {
    let s = Float::sqrt(x.value());
    unary(x, s, |d| d / (2. * s))
}

/// Natural logarithm.
pub fn log(x: &Value) -> Value {
    let u = x.value();
    unary(x, Float::ln(u), |d| d / u)
}

/// Blend the operand gradients with softmax weights `w0` and `w1`.
fn softmax_blend(x0: &Value, x1: &Value, val: f64, w0: f64, w1: f64) -> Value {
    match (x0, x1) {
        (Value::Scalar(_), Value::Scalar(_)) => Value::Scalar(val),
        (Value::Dual { grad, .. }, Value::Scalar(_)) => Value::Dual {
            val,
            grad: scaled(grad, w0),
        },
        (Value::Scalar(_), Value::Dual { grad, .. }) => Value::Dual {
            val,
            grad: scaled(grad, w1),
        },
        (Value::Dual { grad: d0, .. }, Value::Dual { grad: d1, .. }) => Value::Dual {
            val,
            grad: zip_with(d0, d1, |d0, d1| w0 * d0 + w1 * d1),
        },
    }
}

/// Log-sum-exp of `a` and `b`, returned with the softmax weights of both.
///
/// Shifted by the larger argument so large operands do not overflow.
fn log_sum_exp(a: f64, b: f64) -> (f64, f64, f64) {
    let m = Float::max(a, b);
    let e0 = Float::exp(a - m);
    let e1 = Float::exp(b - m);
    let sum = e0 + e1;
    (m + Float::ln(sum), e0 / sum, e1 / sum)
}

/// Differentiable maximum, `$\tau\ln(e^{x_0/\tau} + e^{x_1/\tau})$`.
///
/// Always at least `max(x0, x1)` and at most `tau * ln 2` above it.
pub fn smooth_max(x0: &Value, x1: &Value, tau: f64) -> Value {
    let (lse, w0, w1) = log_sum_exp(x0.value() / tau, x1.value() / tau);
    softmax_blend(x0, x1, tau * lse, w0, w1)
}

/// Differentiable minimum, `$-\tau\ln(e^{-x_0/\tau} + e^{-x_1/\tau})$`.
pub fn smooth_min(x0: &Value, x1: &Value, tau: f64) -> Value {
    let (lse, w0, w1) = log_sum_exp(-x0.value() / tau, -x1.value() / tau);
    softmax_blend(x0, x1, -tau * lse, w0, w1)
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:path) => {
        impl<'a> $trait<&'a Value> for &'a Value {
            type Output = Value;
            #[inline]
            fn $method(self, rhs: &'a Value) -> Value {
                $op(self, rhs)
            }
        }

        impl $trait for Value {
            type Output = Value;
            #[inline]
            fn $method(self, rhs: Value) -> Value {
                $op(&self, &rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, plus);
impl_binary_op!(Sub, sub, minus);
impl_binary_op!(Mul, mul, mul);
impl_binary_op!(Div, div, div);

impl Neg for &Value {
    type Output = Value;
    #[inline]
    fn neg(self) -> Value {
        neg(self)
    }
}

impl Neg for Value {
    type Output = Value;
    #[inline]
    fn neg(self) -> Value {
        neg(&self)
    }
}
