//! The fixed set of names and functions an expression may use.

use std::collections::{BTreeMap, BTreeSet};

use crate::context::EvalContext;
use crate::numeric::{round_half_even, Aggregate};
use crate::types::{EvalError, Value};

// ──────────────────────────────────────────────
// Primitives
// ──────────────────────────────────────────────

/// Names bound to data derived from the merchant's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Every transaction amount, in input order.
    Payments,
    /// Distinct calendar months with activity, at least 1.
    Months,
    Category,
    Subcategory,
    /// Union of all transaction tags, lowercased.
    Tags,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "payments" => Some(Primitive::Payments),
            "months" => Some(Primitive::Months),
            "category" => Some(Primitive::Category),
            "subcategory" => Some(Primitive::Subcategory),
            "tags" => Some(Primitive::Tags),
            _ => None,
        }
    }

    pub fn resolve(self, ctx: &EvalContext<'_>) -> Value {
        let txns = ctx.transactions();
        match self {
            Primitive::Payments => Value::List(txns.iter().map(|t| Value::Number(t.amount)).collect()),
            Primitive::Months => {
                let months: BTreeSet<(i32, u8)> = txns.iter().map(|t| t.month_key()).collect();
                Value::Number(months.len().max(1) as f64)
            }
            Primitive::Category => {
                Value::Text(txns.first().map(|t| t.category.clone()).unwrap_or_default())
            }
            Primitive::Subcategory => {
                Value::Text(txns.first().map(|t| t.subcategory.clone()).unwrap_or_default())
            }
            Primitive::Tags => Value::Set(
                txns.iter()
                    .flat_map(|t| t.tags.iter().map(|tag| tag.to_lowercase()))
                    .collect(),
            ),
        }
    }
}

// ──────────────────────────────────────────────
// Functions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Aggregate(Aggregate),
    Abs,
    Round,
    By,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let f = match name {
            "sum" => Function::Aggregate(Aggregate::Sum),
            "count" => Function::Aggregate(Aggregate::Count),
            "avg" => Function::Aggregate(Aggregate::Avg),
            "max" => Function::Aggregate(Aggregate::Max),
            "min" => Function::Aggregate(Aggregate::Min),
            "stddev" => Function::Aggregate(Aggregate::Stddev),
            "abs" => Function::Abs,
            "round" => Function::Round,
            "by" => Function::By,
            _ => return None,
        };
        Some(f)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Aggregate(agg) => agg.name(),
            Function::Abs => "abs",
            Function::Round => "round",
            Function::By => "by",
        }
    }

    /// Call the function on already-evaluated arguments.
    pub fn call(self, args: &[Value], ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
        match self {
            Function::Aggregate(agg) => call_aggregate(agg, args),
            Function::Abs => match args {
                [v] => Ok(Value::Number(v.expect_number("abs()")?.abs())),
                _ => Err(EvalError::arity("abs", "1", args.len())),
            },
            Function::Round => {
                let (value, digits) = match args {
                    [v] => (v, None),
                    [v, d] => (v, Some(d)),
                    _ => return Err(EvalError::arity("round", "1 or 2", args.len())),
                };
                let x = value.expect_number("round()")?;
                let digits = match digits {
                    None => 0,
                    Some(d) => {
                        let d = d.expect_number("round() digits")?;
                        if d.fract() != 0.0 {
                            return Err(EvalError::type_error(
                                "round() digits must be an integer",
                            ));
                        }
                        d as i32
                    }
                };
                Ok(Value::Number(round_half_even(x, digits)))
            }
            Function::By => match args {
                [arg] => {
                    let name = arg.as_text().ok_or_else(|| {
                        EvalError::type_error(format!(
                            "by() expects a field name, got {}",
                            arg.type_name()
                        ))
                    })?;
                    Ok(group_payments(ctx, GroupField::from_name(name)?))
                }
                _ => Err(EvalError::arity("by", "1", args.len())),
            },
        }
    }
}

/// One list argument aggregates it. `max` and `min` also accept two or
/// more scalars.
fn call_aggregate(agg: Aggregate, args: &[Value]) -> Result<Value, EvalError> {
    match args {
        [single] => agg.apply_value(single),
        [_, _, ..] if matches!(agg, Aggregate::Max | Aggregate::Min) => {
            let numbers = args
                .iter()
                .map(|v| v.expect_number(&format!("{}()", agg.name())))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Number(agg.apply(&numbers)))
        }
        _ => {
            let expected = if matches!(agg, Aggregate::Max | Aggregate::Min) {
                "1 or more"
            } else {
                "1"
            };
            Err(EvalError::arity(agg.name(), expected, args.len()))
        }
    }
}

// ──────────────────────────────────────────────
// Grouping
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Month,
}

impl GroupField {
    pub fn from_name(name: &str) -> Result<Self, EvalError> {
        match name {
            "month" => Ok(GroupField::Month),
            other => Err(EvalError::UnknownGroupingField {
                field: other.to_string(),
            }),
        }
    }
}

/// Payments bucketed by `field`, one inner list per group in
/// chronological order.
pub fn group_payments(ctx: &EvalContext<'_>, field: GroupField) -> Value {
    match field {
        GroupField::Month => {
            let mut groups: BTreeMap<(i32, u8), Vec<f64>> = BTreeMap::new();
            for txn in ctx.transactions() {
                groups.entry(txn.month_key()).or_default().push(txn.amount);
            }
            Value::List(groups.into_values().map(Value::from).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;
    use time::macros::date;

    fn txns() -> Vec<Transaction> {
        vec![
            Transaction::new("M", 10.0, date!(2024 - 02 - 03))
                .categorized("Food", "Grocery")
                .tagged(["Weekly"]),
            Transaction::new("M", 20.0, date!(2024 - 01 - 09)).tagged(["bulk"]),
            Transaction::new("M", 30.0, date!(2024 - 02 - 20)),
        ]
    }

    #[test]
    fn primitives_resolve() {
        let data = txns();
        let ctx = EvalContext::new(&data, 12);
        assert_eq!(
            Primitive::Payments.resolve(&ctx),
            Value::from(vec![10.0, 20.0, 30.0])
        );
        assert_eq!(Primitive::Months.resolve(&ctx), Value::Number(2.0));
        assert_eq!(Primitive::Category.resolve(&ctx), Value::from("Food"));
        assert_eq!(
            Primitive::Tags.resolve(&ctx),
            Value::Set(BTreeSet::from(["weekly".to_string(), "bulk".to_string()]))
        );
    }

    #[test]
    fn primitives_on_empty_data() {
        let ctx = EvalContext::empty();
        assert_eq!(Primitive::Months.resolve(&ctx), Value::Number(1.0));
        assert_eq!(Primitive::Category.resolve(&ctx), Value::from(""));
        assert_eq!(Primitive::Payments.resolve(&ctx), Value::List(vec![]));
    }

    #[test]
    fn by_month_is_chronological() {
        let data = txns();
        let ctx = EvalContext::new(&data, 12);
        let grouped = group_payments(&ctx, GroupField::Month);
        assert_eq!(
            grouped,
            Value::List(vec![Value::from(vec![20.0]), Value::from(vec![10.0, 30.0])])
        );
    }

    #[test]
    fn unknown_group_field() {
        let err = GroupField::from_name("weekday").unwrap_err();
        assert!(matches!(err, EvalError::UnknownGroupingField { .. }));
    }

    #[test]
    fn by_needs_a_text_field_name() {
        let ctx = EvalContext::empty();
        let err = Function::By.call(&[Value::Number(1.0)], &ctx).unwrap_err();
        assert!(matches!(err, EvalError::TypeError { .. }));
        assert!(err.to_string().contains("field name"));
        assert_eq!(
            Function::By.call(&[Value::from("month")], &ctx).unwrap(),
            Value::List(vec![])
        );
    }

    #[test]
    fn max_of_scalars() {
        let ctx = EvalContext::empty();
        let max = Function::from_name("max").unwrap();
        let v = max
            .call(&[Value::Number(3.0), Value::Number(9.0), Value::Number(4.0)], &ctx)
            .unwrap();
        assert_eq!(v, Value::Number(9.0));
    }

    #[test]
    fn arity_errors() {
        let ctx = EvalContext::empty();
        let sum = Function::from_name("sum").unwrap();
        assert!(matches!(
            sum.call(&[], &ctx),
            Err(EvalError::Arity { .. })
        ));
        let abs = Function::from_name("abs").unwrap();
        assert!(matches!(
            abs.call(&[Value::Number(1.0), Value::Number(2.0)], &ctx),
            Err(EvalError::Arity { .. })
        ));
    }

    #[test]
    fn round_with_digits() {
        let ctx = EvalContext::empty();
        let round = Function::Round;
        assert_eq!(
            round.call(&[Value::Number(2.71828), Value::Number(2.0)], &ctx).unwrap(),
            Value::Number(2.72)
        );
        assert!(round
            .call(&[Value::Number(3.1), Value::Number(0.5)], &ctx)
            .is_err());
    }

    #[test]
    fn round_with_extreme_digits() {
        let ctx = EvalContext::empty();
        let round = Function::Round;
        for digits in [-400.0, -3_000_000_000.0] {
            assert_eq!(
                round.call(&[Value::Number(5.0), Value::Number(digits)], &ctx).unwrap(),
                Value::Number(0.0),
                "{digits}"
            );
        }
        assert_eq!(
            round.call(&[Value::Number(2.5), Value::Number(3_000_000_000.0)], &ctx).unwrap(),
            Value::Number(2.5)
        );
    }
}
