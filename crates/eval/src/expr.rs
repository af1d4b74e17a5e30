//! Expression evaluator.
//!
//! Walks a [`tally_core::Expr`] against an [`EvalContext`]. Logical
//! operators, the ternary and comparison chains all short-circuit: an
//! operand that does not affect the result is never evaluated, so it
//! cannot raise.

use tally_core::{CompareOp, Expr, Literal, UnaryOp};

use crate::builtins::{Function, Primitive};
use crate::context::{EvalContext, Variables};
use crate::numeric;
use crate::types::{EvalError, Transaction, Value};

/// Parse `text` and evaluate it.
pub fn evaluate(text: &str, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
    let expr = tally_core::parse(text)?;
    eval_expr(&expr, ctx)
}

/// Parse and evaluate `text` over `transactions`, returning its truthiness.
pub fn evaluate_filter(
    text: &str,
    transactions: &[Transaction],
    num_months: u32,
    variables: &Variables,
) -> Result<bool, EvalError> {
    let ctx = EvalContext::new(transactions, num_months).with_variables(variables);
    Ok(evaluate(text, &ctx)?.truthy())
}

/// Evaluate a parsed expression.
pub fn eval_expr(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(lit) => Ok(match lit {
            Literal::Number(n) => Value::Number(*n),
            Literal::Str(s) => Value::Text(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::None => Value::Null,
        }),

        Expr::Name(name) => resolve_name(name, ctx),

        Expr::Unary { op, operand } => {
            let v = eval_expr(operand, ctx)?;
            let n = v.as_number().ok_or_else(|| {
                EvalError::type_error(format!("bad operand type for unary sign: {}", v.type_name()))
            })?;
            Ok(Value::Number(match op {
                UnaryOp::Neg => -n,
                UnaryOp::Pos => n,
            }))
        }

        Expr::Binary { op, left, right } => {
            let l = eval_expr(left, ctx)?;
            let r = eval_expr(right, ctx)?;
            numeric::eval_binary(*op, &l, &r)
        }

        Expr::Compare { left, links } => {
            let mut lhs = eval_expr(left, ctx)?;
            for (op, operand) in links {
                let rhs = eval_expr(operand, ctx)?;
                if !compare(*op, &lhs, &rhs)? {
                    return Ok(Value::Bool(false));
                }
                lhs = rhs;
            }
            Ok(Value::Bool(true))
        }

        Expr::And(left, right) => {
            if !eval_expr(left, ctx)?.truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval_expr(right, ctx)?.truthy()))
        }

        Expr::Or(left, right) => {
            if eval_expr(left, ctx)?.truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval_expr(right, ctx)?.truthy()))
        }

        Expr::Not(inner) => Ok(Value::Bool(!eval_expr(inner, ctx)?.truthy())),

        Expr::IfElse {
            condition,
            then,
            otherwise,
        } => {
            if eval_expr(condition, ctx)?.truthy() {
                eval_expr(then, ctx)
            } else {
                eval_expr(otherwise, ctx)
            }
        }

        Expr::Call { function, args } => {
            let func = Function::from_name(function).ok_or_else(|| EvalError::UnknownFunction {
                name: function.clone(),
            })?;
            let values = args
                .iter()
                .map(|a| eval_expr(a, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            func.call(&values, ctx)
        }

        Expr::Membership {
            element,
            collection,
            negated,
        } => {
            let elem = eval_expr(element, ctx)?;
            let coll = eval_expr(collection, ctx)?;
            let found = contains(&coll, &elem)?;
            Ok(Value::Bool(found != *negated))
        }
    }
}

/// User variables first, then builtin primitives.
fn resolve_name(name: &str, ctx: &EvalContext<'_>) -> Result<Value, EvalError> {
    if let Some(v) = ctx.variable(name) {
        return Ok(v.clone());
    }
    Primitive::from_name(name)
        .map(|p| p.resolve(ctx))
        .ok_or_else(|| EvalError::UnknownVariable {
            name: name.to_string(),
        })
}

// ──────────────────────────────────────────────
// Comparison and membership
// ──────────────────────────────────────────────

/// Equality across runtime values. Text compares case-insensitively;
/// booleans compare as numbers.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.to_lowercase() == y.to_lowercase(),
        (Value::Null, Value::Null) => true,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Set(x), Value::Set(y)) => x == y,
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn compare(op: CompareOp, a: &Value, b: &Value) -> Result<bool, EvalError> {
    match op {
        CompareOp::Eq => return Ok(values_equal(a, b)),
        CompareOp::NotEq => return Ok(!values_equal(a, b)),
        _ => {}
    }

    let ordering = match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.to_lowercase().partial_cmp(&y.to_lowercase()),
        _ => match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => {
                return Err(EvalError::type_error(format!(
                    "'{}' not supported between {} and {}",
                    op.symbol(),
                    a.type_name(),
                    b.type_name()
                )))
            }
        },
    };

    // NaN compares false on every ordering.
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::LtE => ordering.is_le(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::GtE => ordering.is_ge(),
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::NotEq => ordering.is_ne(),
    })
}

fn contains(collection: &Value, element: &Value) -> Result<bool, EvalError> {
    match collection {
        Value::Set(items) => Ok(match element {
            Value::Text(s) => items.contains(&s.to_lowercase()),
            _ => false,
        }),
        Value::List(items) => Ok(items.iter().any(|item| values_equal(item, element))),
        Value::Text(haystack) => match element {
            Value::Text(needle) => Ok(haystack.to_lowercase().contains(&needle.to_lowercase())),
            other => Err(EvalError::type_error(format!(
                "'in <Text>' requires Text as left operand, not {}",
                other.type_name()
            ))),
        },
        other => Err(EvalError::type_error(format!(
            "argument of type {} is not a collection",
            other.type_name()
        ))),
    }
}
