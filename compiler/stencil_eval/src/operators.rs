//! Binary and unary operator implementations for the evaluator.
//!
//! Operators work on already-evaluated operands; short-circuiting (`&&`,
//! `||`) and string/markup concatenation need the environment and live in
//! `exec::expr`.
//!
//! Integer arithmetic is checked. An overflowing integer result is computed
//! in floating point instead, and integer division stays integral only when
//! it is exact.

use std::cmp::Ordering;

use stencil_ir::{BinaryOp, Number};
use stencil_values::{division_by_zero, modulo_by_zero, unsupported_operation, EvalError, Value};

/// Apply an arithmetic operator (`+ - * / %`) to two numbers.
pub fn arithmetic(op: BinaryOp, left: Number, right: Number) -> Result<Number, EvalError> {
    match (left, right) {
        (Number::Int(a), Number::Int(b)) => int_arithmetic(op, a, b),
        _ => float_arithmetic(op, left.as_f64(), right.as_f64()),
    }
}

#[inline]
fn or_float(result: Option<i64>, fallback: impl FnOnce() -> f64) -> Number {
    result.map_or_else(|| Number::Float(fallback()), Number::Int)
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> Result<Number, EvalError> {
    let (fa, fb) = (Number::Int(a).as_f64(), Number::Int(b).as_f64());
    match op {
        BinaryOp::Add => Ok(or_float(a.checked_add(b), || fa + fb)),
        BinaryOp::Subtract => Ok(or_float(a.checked_sub(b), || fa - fb)),
        BinaryOp::Multiply => Ok(or_float(a.checked_mul(b), || fa * fb)),
        BinaryOp::Divide => {
            if b == 0 {
                return Err(division_by_zero());
            }
            match a.checked_rem(b) {
                Some(0) => Ok(or_float(a.checked_div(b), || fa / fb)),
                _ => Ok(Number::Float(fa / fb)),
            }
        }
        BinaryOp::Modulo => {
            if b == 0 {
                return Err(modulo_by_zero());
            }
            // i64::MIN % -1 overflows; the mathematical result is 0.
            Ok(Number::Int(a.checked_rem(b).unwrap_or(0)))
        }
        other => Err(not_arithmetic(other)),
    }
}

fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> Result<Number, EvalError> {
    match op {
        BinaryOp::Add => Ok(Number::Float(a + b)),
        BinaryOp::Subtract => Ok(Number::Float(a - b)),
        BinaryOp::Multiply => Ok(Number::Float(a * b)),
        BinaryOp::Divide if b == 0.0 => Err(division_by_zero()),
        BinaryOp::Divide => Ok(Number::Float(a / b)),
        BinaryOp::Modulo if b == 0.0 => Err(modulo_by_zero()),
        BinaryOp::Modulo => Ok(Number::Float(a % b)),
        other => Err(not_arithmetic(other)),
    }
}

#[cold]
fn not_arithmetic(op: BinaryOp) -> EvalError {
    unsupported_operation(op.as_symbol(), "arithmetic on numbers")
}

/// Unary minus.
pub fn negate(n: Number) -> Number {
    match n {
        Number::Int(i) => or_float(i.checked_neg(), || -Number::Int(i).as_f64()),
        Number::Float(f) => Number::Float(-f),
    }
}

/// Evaluate a comparison operator (`== != < <= > >=`).
///
/// Equality is defined between values of the same kind: numbers, strings
/// (including host scalars), booleans, dates and markup of one format.
/// Ordering is defined for numbers and dates only. Any other pairing is an
/// error rather than `false`, so typos in templates surface.
pub fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        // NaN compares unequal and unordered to everything.
        return Ok(match a.compare(b) {
            Some(ord) => ordering_satisfies(op, ord),
            None => op == BinaryOp::NotEqual,
        });
    }
    let ordering = match (left, right) {
        (Value::Date(a), Value::Date(b)) => a.epoch_millis.cmp(&b.epoch_millis),
        (Value::Markup(a), Value::Markup(b)) if !op.is_ordering() && a.format() == b.format() => {
            bool_ordering(a.markup() == b.markup())
        }
        _ if op.is_ordering() => {
            match (left.as_date(), right.as_date()) {
                (Some(a), Some(b)) => a.epoch_millis.cmp(&b.epoch_millis),
                _ => return Err(incomparable(op, left, right)),
            }
        }
        _ => {
            if let (Some(a), Some(b)) = (left.to_scalar(), right.to_scalar()) {
                bool_ordering(a == b)
            } else if let (Some(a), Some(b)) = (left.as_bool(), right.as_bool()) {
                bool_ordering(a == b)
            } else if let (Some(a), Some(b)) = (left.as_date(), right.as_date()) {
                a.epoch_millis.cmp(&b.epoch_millis)
            } else {
                return Err(incomparable(op, left, right));
            }
        }
    };
    Ok(ordering_satisfies(op, ordering))
}

/// Equality results are folded into `Ordering::Equal` / `Ordering::Less` so
/// one table serves both kinds of comparison.
#[inline]
fn bool_ordering(equal: bool) -> Ordering {
    if equal {
        Ordering::Equal
    } else {
        Ordering::Less
    }
}

fn ordering_satisfies(op: BinaryOp, ord: Ordering) -> bool {
    match op {
        BinaryOp::Equal => ord == Ordering::Equal,
        BinaryOp::NotEqual => ord != Ordering::Equal,
        BinaryOp::Less => ord == Ordering::Less,
        BinaryOp::LessOrEqual => ord != Ordering::Greater,
        BinaryOp::Greater => ord == Ordering::Greater,
        BinaryOp::GreaterOrEqual => ord != Ordering::Less,
        _ => false,
    }
}

#[cold]
fn incomparable(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    unsupported_operation(
        &format!("comparison with {}", op.as_symbol()),
        &format!("{} and {}", left.type_name(), right.type_name()),
    )
}
