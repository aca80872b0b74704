//! Instruction tapes and the stack machine that replays them.
//!
//! A [`Tape`] is produced once by [`compile`](crate::compile()) and evaluated
//! any number of times afterwards. It is never modified by evaluation, so a
//! single tape can be shared between threads and solver runs.
//!
//! There are two evaluation modes over the same instructions:
//!
//! - [`Tape::evaluate`] propagates [`Value`]s and yields the gradient with
//!   respect to every parameter. `max` and `min` are replaced by their smooth
//!   counterparts so the result stays differentiable.
//! - [`Tape::evaluate_value`] works on plain `f64` only. `max` and `min` are
//!   exact, and a zero denominator is replaced by [`VALUE_DIV_EPSILON`].
use alloc::{string::String, vec::Vec};
use core::fmt;

use num_traits::Float;

use crate::valder::{self, Value, DEFAULT_TAU};

/// Replacement for a denominator that is exactly `0.0` in value-only mode.
///
/// Looser than [`DUAL_DIV_EPSILON`](crate::valder::DUAL_DIV_EPSILON).
pub const VALUE_DIV_EPSILON: f64 = 1e-10;

/// Binary operators of the postfix language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "+" => Some(BinaryOp::Add),
            "-" => Some(BinaryOp::Sub),
            "*" => Some(BinaryOp::Mul),
            "/" => Some(BinaryOp::Div),
            "^" => Some(BinaryOp::Pow),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }

    fn apply(self, left: &Value, right: &Value) -> Value {
        match self {
            BinaryOp::Add => valder::plus(left, right),
            BinaryOp::Sub => valder::minus(left, right),
            BinaryOp::Mul => valder::mul(left, right),
            BinaryOp::Div => valder::div(left, right),
            BinaryOp::Pow => valder::power(left, right),
        }
    }

    fn apply_value(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div if right == 0. => left / VALUE_DIV_EPSILON,
            BinaryOp::Div => left / right,
            BinaryOp::Pow => Float::powf(left, right),
        }
    }
}

/// Named functions of the postfix language.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Builtin {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Exp,
    Sqrt,
    /// Natural logarithm.
    Log,
    Neg,
    Max,
    Min,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "tan" => Builtin::Tan,
            "asin" => Builtin::Asin,
            "acos" => Builtin::Acos,
            "atan" => Builtin::Atan,
            "exp" => Builtin::Exp,
            "sqrt" => Builtin::Sqrt,
            "log" => Builtin::Log,
            "neg" => Builtin::Neg,
            "max" => Builtin::Max,
            "min" => Builtin::Min,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Tan => "tan",
            Builtin::Asin => "asin",
            Builtin::Acos => "acos",
            Builtin::Atan => "atan",
            Builtin::Exp => "exp",
            Builtin::Sqrt => "sqrt",
            Builtin::Log => "log",
            Builtin::Neg => "neg",
            Builtin::Max => "max",
            Builtin::Min => "min",
        }
    }

    /// Number of operands popped from the stack.
    pub fn arity(self) -> usize {
        match self {
            Builtin::Max | Builtin::Min => 2,
            _ => 1,
        }
    }

    /// `args` are in source order.
    fn apply(self, args: &[Value]) -> Value {
        match self {
            Builtin::Sin => valder::sin(&args[0]),
            Builtin::Cos => valder::cos(&args[0]),
            Builtin::Tan => valder::tan(&args[0]),
            Builtin::Asin => valder::asin(&args[0]),
            Builtin::Acos => valder::acos(&args[0]),
            Builtin::Atan => valder::atan(&args[0]),
            Builtin::Exp => valder::exp(&args[0]),
            Builtin::Sqrt => valder::sqrt(&args[0]),
            Builtin::Log => valder::log(&args[0]),
            Builtin::Neg => valder::neg(&args[0]),
            Builtin::Max => valder::smooth_max(&args[0], &args[1], DEFAULT_TAU),
            Builtin::Min => valder::smooth_min(&args[0], &args[1], DEFAULT_TAU),
        }
    }

    fn apply_value(self, args: &[f64]) -> f64 {
        let x = args[0];
        match self {
            Builtin::Sin => Float::sin(x),
            Builtin::Cos => Float::cos(x),
            Builtin::Tan => Float::tan(x),
            Builtin::Asin => Float::asin(x),
            Builtin::Acos => Float::acos(x),
            Builtin::Atan => Float::atan(x),
            Builtin::Exp => Float::exp(x),
            Builtin::Sqrt => Float::sqrt(x),
            Builtin::Log => Float::ln(x),
            Builtin::Neg => -x,
            Builtin::Max => Float::max(x, args[1]),
            Builtin::Min => Float::min(x, args[1]),
        }
    }
}

/// A single step of a tape.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// Push a numeric literal.
    PushValue { raw: String, value: f64 },
    /// Push the parameter at `index`, seeded with the one-hot `jacobian`.
    PushSymbol {
        raw: String,
        index: usize,
        jacobian: Vec<f64>,
    },
    /// Pop the right then the left operand and push `left op right`.
    EvaluateBinary(BinaryOp),
    /// Pop `arg_count` operands and push the result of `func`.
    EvaluateCall { func: Builtin, arg_count: usize },
}

impl Instruction {
    /// Number of operands popped and pushed.
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Instruction::PushValue { .. } | Instruction::PushSymbol { .. } => (0, 1),
            Instruction::EvaluateBinary(_) => (2, 1),
            Instruction::EvaluateCall { arg_count, .. } => (*arg_count, 1),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::PushValue { raw, .. } | Instruction::PushSymbol { raw, .. } => {
                f.write_str(raw)
            }
            Instruction::EvaluateBinary(op) => f.write_str(op.symbol()),
            Instruction::EvaluateCall { func, .. } => f.write_str(func.name()),
        }
    }
}

/// A compiled postfix expression over a fixed list of parameters.
///
/// Every instruction sequence stored in a `Tape` leaves exactly one value on
/// the stack and never pops from an empty one; [`compile`](crate::compile())
/// rejects everything else.
#[derive(Clone, Debug, PartialEq)]
pub struct Tape {
    params: Vec<String>,
    instructions: Vec<Instruction>,
}

#[inline]
fn pop<T>(stack: &mut Vec<T>) -> T {
    stack
        .pop()
        .expect("operand counts are checked when the tape is compiled")
}

impl Tape {
    pub(crate) fn from_parts(params: Vec<String>, instructions: Vec<Instruction>) -> Self {
        Self {
            params,
            instructions,
        }
    }

    /// Parameter names; position `i` corresponds to `args[i]` on evaluation.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Evaluate the value together with its gradient.
    ///
    /// The result is a [`Value::Scalar`] when the expression does not
    /// reference any parameter.
    pub fn evaluate(&self, args: &[f64]) -> Value {
        debug_assert_eq!(args.len(), self.params.len());
        let mut stack: Vec<Value> = Vec::with_capacity(self.instructions.len());
        for instruction in &self.instructions {
            let result = match instruction {
                Instruction::PushValue { value, .. } => Value::Scalar(*value),
                Instruction::PushSymbol {
                    index, jacobian, ..
                } => Value::Dual {
                    val: args[*index],
                    grad: jacobian.clone(),
                },
                Instruction::EvaluateBinary(op) => {
                    let right = pop(&mut stack);
                    let left = pop(&mut stack);
                    op.apply(&left, &right)
                }
                Instruction::EvaluateCall { func, arg_count } => {
                    let operands = stack.split_off(stack.len() - arg_count);
                    func.apply(&operands)
                }
            };
            stack.push(result);
        }
        debug_assert_eq!(stack.len(), 1);
        pop(&mut stack)
    }

    /// Evaluate the value only, without any derivative bookkeeping.
    pub fn evaluate_value(&self, args: &[f64]) -> f64 {
        debug_assert_eq!(args.len(), self.params.len());
        let mut stack: Vec<f64> = Vec::with_capacity(self.instructions.len());
        for instruction in &self.instructions {
            let result = match instruction {
                Instruction::PushValue { value, .. } => *value,
                Instruction::PushSymbol { index, .. } => args[*index],
                Instruction::EvaluateBinary(op) => {
                    let right = pop(&mut stack);
                    let left = pop(&mut stack);
                    op.apply_value(left, right)
                }
                Instruction::EvaluateCall { func, arg_count } => {
                    let at = stack.len() - arg_count;
                    let result = func.apply_value(&stack[at..]);
                    stack.truncate(at);
                    result
                }
            };
            stack.push(result);
        }
        debug_assert_eq!(stack.len(), 1);
        pop(&mut stack)
    }

    /// The value and a dense gradient row with one entry per parameter.
    pub fn gradient_row(&self, args: &[f64]) -> (f64, Vec<f64>) {
        self.evaluate(args).into_parts(self.params.len())
    }
}

/// Writes the expression back in postfix form.
impl fmt::Display for Tape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instruction) in self.instructions.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", instruction)?;
        }
        Ok(())
    }
}
