//! Numeric and constant literal representations.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A template number.
///
/// Integers stay exact until an operation cannot represent its result as
/// `i64` (overflow, inexact division); the result then widens to `Float`.
#[derive(Clone, Copy, Debug)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[inline]
    #[expect(
        clippy::cast_precision_loss,
        reason = "template numbers widen to f64 by definition"
    )]
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    /// Integer view, only when the value is integral and in range.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "range and integrality are checked first"
    )]
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::Int(n) => Some(n),
            Number::Float(f)
                if f.fract() == 0.0 && f >= -9_007_199_254_740_992.0 && f <= 9_007_199_254_740_992.0 =>
            {
                Some(f as i64)
            }
            Number::Float(_) => None,
        }
    }

    /// Numeric comparison; `None` only when a NaN is involved.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.compare(*other) == Some(Ordering::Equal)
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::Int(n)
    }
}

impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Number::Float(f)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(x) => write!(f, "{x}"),
        }
    }
}

/// A literal value that needs no environment to produce.
///
/// Also the payload of an expression's constant-folding cache.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Str(Arc<str>),
    Number(Number),
    Bool(bool),
}

impl Constant {
    pub fn string(s: impl AsRef<str>) -> Self {
        Constant::Str(Arc::from(s.as_ref()))
    }
}

impl fmt::Display for Constant {
    /// Renders the constant as template source.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '$' => f.write_str("\\$")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            Constant::Number(n) => write!(f, "{n}"),
            Constant::Bool(b) => write!(f, "{b}"),
        }
    }
}
