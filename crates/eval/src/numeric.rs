//! Aggregates, arithmetic and rounding over `f64` values.
//!
//! Empty inputs aggregate to 0. Division and modulo by zero yield 0 rather
//! than an error, so a filter over a merchant with no data stays false
//! instead of failing.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use tally_core::BinaryOp;

use crate::types::{EvalError, Value};

// ──────────────────────────────────────────────
// Aggregates
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Count,
    Avg,
    Max,
    Min,
    Stddev,
}

impl Aggregate {
    pub fn name(self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Count => "count",
            Aggregate::Avg => "avg",
            Aggregate::Max => "max",
            Aggregate::Min => "min",
            Aggregate::Stddev => "stddev",
        }
    }

    pub fn apply(self, values: &[f64]) -> f64 {
        match self {
            Aggregate::Sum => values.iter().sum(),
            Aggregate::Count => values.len() as f64,
            Aggregate::Avg => mean(values),
            Aggregate::Max => values.iter().copied().reduce(f64::max).unwrap_or(0.0),
            Aggregate::Min => values.iter().copied().reduce(f64::min).unwrap_or(0.0),
            Aggregate::Stddev => sample_stddev(values),
        }
    }

    /// Apply to a runtime value. A list whose elements are all lists is
    /// aggregated element-wise and yields a list.
    pub fn apply_value(self, value: &Value) -> Result<Value, EvalError> {
        let items = match value {
            Value::List(items) => items,
            Value::Set(items) if self == Aggregate::Count => {
                return Ok(Value::Number(items.len() as f64));
            }
            other => {
                return Err(EvalError::type_error(format!(
                    "{}() expects a list, got {}",
                    self.name(),
                    other.type_name()
                )))
            }
        };

        if !items.is_empty() && items.iter().all(|v| matches!(v, Value::List(_))) {
            let mapped = items
                .iter()
                .map(|inner| self.apply_value(inner))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Value::List(mapped));
        }

        if self == Aggregate::Count {
            return Ok(Value::Number(items.len() as f64));
        }

        let numbers = items
            .iter()
            .map(|v| v.expect_number(&format!("{}()", self.name())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Number(self.apply(&numbers)))
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1 denominator); 0 below two values.
pub fn sample_stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sq / (values.len() - 1) as f64).sqrt()
}

/// Population standard deviation; 0 for an empty slice.
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sq / values.len() as f64).sqrt()
}

// ──────────────────────────────────────────────
// Arithmetic
// ──────────────────────────────────────────────

/// Apply a binary arithmetic operator.
///
/// `+` also joins two strings or two lists. Everything else is numeric.
pub fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    if op == BinaryOp::Add {
        match (left, right) {
            (Value::Text(a), Value::Text(b)) => return Ok(Value::Text(format!("{}{}", a, b))),
            (Value::List(a), Value::List(b)) => {
                return Ok(Value::List(a.iter().chain(b).cloned().collect()))
            }
            _ => {}
        }
    }

    let (a, b) = match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(EvalError::type_error(format!(
                "unsupported operand types for {}: {} and {}",
                op,
                left.type_name(),
                right.type_name()
            )))
        }
    };

    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }
        BinaryOp::Mod => floor_mod(a, b),
    };
    Ok(Value::Number(result))
}

/// Modulo whose result takes the sign of the divisor.
fn floor_mod(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return 0.0;
    }
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

// ──────────────────────────────────────────────
// Rounding
// ──────────────────────────────────────────────

/// Most negative digit count at which a finite `f64` can round to anything
/// but zero.
const MIN_ROUND_DIGITS: i32 = -308;

/// Most decimal places a `Decimal` can carry.
const MAX_ROUND_DIGITS: i32 = 28;

/// Round half to even at `digits` decimal places. Negative `digits` round
/// to tens, hundreds and so on.
pub fn round_half_even(value: f64, digits: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    if digits < MIN_ROUND_DIGITS {
        return 0.0f64.copysign(value);
    }
    if digits <= 0 {
        let scale = 10f64.powi(-digits);
        let rounded = (value / scale).round_ties_even() * scale;
        return if rounded.is_finite() { rounded } else { value };
    }
    let dp = digits.min(MAX_ROUND_DIGITS) as u32;
    match Decimal::from_f64(value) {
        Some(d) => d
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
            .to_f64()
            .unwrap_or(value),
        None => value,
    }
}
