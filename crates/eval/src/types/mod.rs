//! Runtime types shared by the evaluator, the rule engine and the
//! section engine.

pub mod transaction;
pub mod values;

use std::fmt;

use tally_core::ParseError;

pub use transaction::Transaction;
pub use values::Value;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// The expression text did not parse.
    Parse(ParseError),
    /// A name is neither a user variable nor a builtin primitive.
    UnknownVariable { name: String },
    /// A call names something outside the builtin function table.
    UnknownFunction { name: String },
    /// `by()` was asked to group on an unsupported field.
    UnknownGroupingField { field: String },
    /// A builtin was called with the wrong number of arguments.
    Arity {
        function: String,
        expected: String,
        got: usize,
    },
    /// An operand or argument has the wrong runtime type.
    TypeError { message: String },
}

impl EvalError {
    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        EvalError::TypeError {
            message: message.into(),
        }
    }

    pub(crate) fn arity(function: &str, expected: &str, got: usize) -> Self {
        EvalError::Arity {
            function: function.to_string(),
            expected: expected.to_string(),
            got,
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Parse(e) => write!(f, "{}", e),
            EvalError::UnknownVariable { name } => {
                write!(f, "unknown variable: {}", name)
            }
            EvalError::UnknownFunction { name } => {
                write!(f, "unknown function: {}", name)
            }
            EvalError::UnknownGroupingField { field } => {
                write!(
                    f,
                    "unknown grouping field: '{}' (supported: 'month')",
                    field
                )
            }
            EvalError::Arity {
                function,
                expected,
                got,
            } => {
                write!(
                    f,
                    "{}() expects {} argument(s), got {}",
                    function, expected, got
                )
            }
            EvalError::TypeError { message } => {
                write!(f, "type error: {}", message)
            }
        }
    }
}

impl std::error::Error for EvalError {}

impl From<ParseError> for EvalError {
    fn from(e: ParseError) -> Self {
        EvalError::Parse(e)
    }
}

// ──────────────────────────────────────────────
// Comparison operators
// ──────────────────────────────────────────────

/// Numeric comparison used by rule conditions and amount modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl Comparison {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(Comparison::Gt),
            ">=" => Some(Comparison::Gte),
            "<" => Some(Comparison::Lt),
            "<=" => Some(Comparison::Lte),
            "=" => Some(Comparison::Eq),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Eq => "=",
        }
    }

    /// `Eq` holds when the two sides differ by less than `tolerance`.
    pub fn holds(self, value: f64, threshold: f64, tolerance: f64) -> bool {
        match self {
            Comparison::Gt => value > threshold,
            Comparison::Gte => value >= threshold,
            Comparison::Lt => value < threshold,
            Comparison::Lte => value <= threshold,
            Comparison::Eq => (value - threshold).abs() < tolerance,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_offender() {
        let e = EvalError::UnknownVariable {
            name: "foo".into(),
        };
        assert_eq!(e.to_string(), "unknown variable: foo");

        let e = EvalError::UnknownGroupingField {
            field: "weekday".into(),
        };
        assert!(e.to_string().contains("'weekday'"));

        let e = EvalError::arity("abs", "1", 2);
        assert_eq!(e.to_string(), "abs() expects 1 argument(s), got 2");
    }

    #[test]
    fn parse_errors_pass_through() {
        let parse = tally_core::parse("1 +").unwrap_err();
        let e: EvalError = parse.clone().into();
        assert_eq!(e.to_string(), parse.to_string());
    }

    #[test]
    fn comparison_symbols() {
        for sym in [">", ">=", "<", "<=", "="] {
            let op = Comparison::from_symbol(sym).unwrap();
            assert_eq!(op.symbol(), sym);
        }
        assert!(Comparison::from_symbol("==").is_none());
    }

    #[test]
    fn equality_uses_tolerance() {
        assert!(Comparison::Eq.holds(3.0005, 3.0, 0.001));
        assert!(!Comparison::Eq.holds(3.01, 3.0, 0.001));
        assert!(Comparison::Gte.holds(3.0, 3.0, 0.0));
        assert!(!Comparison::Gt.holds(3.0, 3.0, 0.0));
    }
}
