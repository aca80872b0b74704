//! Compilation of postfix expressions into [`Tape`]s.
use alloc::{
    string::{String, ToString},
    vec,
    vec::Vec,
};

use thiserror::Error;

use crate::tape::{BinaryOp, Builtin, Instruction, Tape};

/// Reasons an expression cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The token is neither a number, a parameter, an operator nor a builtin.
    #[error("unsupported node type: {0:?}")]
    UnsupportedNodeType(String),
    /// The token at `position` needs more operands than are on the stack.
    #[error("not enough operands for {token:?} at token {position}")]
    StackUnderflow { token: String, position: usize },
    /// The expression does not leave exactly one value on the stack.
    #[error("expression leaves {depth} values on the stack instead of one")]
    Unbalanced { depth: usize },
}

/// Compile a whitespace separated postfix `expression` over `params`.
///
/// Tokens are tried in this order: signed decimal literal, parameter name,
/// binary operator (`+ - * / ^`), builtin (`sin cos tan asin acos atan exp
/// sqrt log neg` taking one operand, `max min` taking two).
///
/// ```
/// # use rpn_solver::compile;
/// let tape = compile(&["x1", "x2"], "x1 x2 +").unwrap();
/// let sum = tape.evaluate(&[3., 4.]);
/// assert_eq!(sum.value(), 7.);
/// assert_eq!(sum.gradient(), Some(&[1., 1.][..]));
/// ```
///
/// # Errors
///
/// Fails on the first unknown token and on expressions that would underflow
/// the stack or leave anything other than a single result on it.
pub fn compile<S: AsRef<str>>(params: &[S], expression: &str) -> Result<Tape, CompileError> {
    let params: Vec<String> = params.iter().map(|p| p.as_ref().to_string()).collect();
    let mut instructions = Vec::new();
    let mut depth = 0usize;
    for (position, token) in expression.split_whitespace().enumerate() {
        let instruction = classify(&params, token)?;
        let (pops, pushes) = instruction.stack_effect();
        if depth < pops {
            return Err(CompileError::StackUnderflow {
                token: token.to_string(),
                position,
            });
        }
        depth = depth - pops + pushes;
        instructions.push(instruction);
    }
    if depth != 1 {
        return Err(CompileError::Unbalanced { depth });
    }
    Ok(Tape::from_parts(params, instructions))
}

fn classify(params: &[String], token: &str) -> Result<Instruction, CompileError> {
    if is_numeric_literal(token) {
        if let Ok(value) = token.parse::<f64>() {
            return Ok(Instruction::PushValue {
                raw: token.to_string(),
                value,
            });
        }
    }
    if let Some(index) = params.iter().position(|p| p == token) {
        let mut jacobian = vec![0.; params.len()];
        jacobian[index] = 1.;
        return Ok(Instruction::PushSymbol {
            raw: token.to_string(),
            index,
            jacobian,
        });
    }
    if let Some(op) = BinaryOp::from_token(token) {
        return Ok(Instruction::EvaluateBinary(op));
    }
    if let Some(func) = Builtin::from_name(token) {
        return Ok(Instruction::EvaluateCall {
            func,
            arg_count: func.arity(),
        });
    }
    Err(CompileError::UnsupportedNodeType(token.to_string()))
}

/// `[+-]?(\d+\.?\d*|\.\d+)`
fn is_numeric_literal(token: &str) -> bool {
    let unsigned = token.strip_prefix(|c| c == '+' || c == '-').unwrap_or(token);
    let mut seen_digit = false;
    let mut seen_point = false;
    for c in unsigned.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_point => seen_point = true,
            _ => return false,
        }
    }
    seen_digit
}
