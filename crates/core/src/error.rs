use crate::ast::Construct;

/// An expression parse error.
///
/// Columns are 1-based character offsets into the expression text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The text is not a well-formed expression.
    #[error("Syntax error at column {column}: {message}")]
    Syntax { column: usize, message: String },

    /// The text is well-formed but uses a construct outside the sandbox.
    #[error("Unsafe construct at column {column}: {construct} is not allowed")]
    Unsafe { column: usize, construct: Construct },
}

impl ParseError {
    pub fn syntax(column: usize, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            column,
            message: message.into(),
        }
    }

    pub fn unsafe_construct(column: usize, construct: Construct) -> Self {
        ParseError::Unsafe { column, construct }
    }

    pub fn column(&self) -> usize {
        match self {
            ParseError::Syntax { column, .. } | ParseError::Unsafe { column, .. } => *column,
        }
    }

    pub fn is_unsafe(&self) -> bool {
        matches!(self, ParseError::Unsafe { .. })
    }

    /// Serialize to a JSON diagnostic object.
    /// Always includes every field (null for the ones that do not apply).
    pub fn to_json_value(&self) -> serde_json::Value {
        let (kind, construct) = match self {
            ParseError::Syntax { .. } => ("syntax", None),
            ParseError::Unsafe { construct, .. } => ("unsafe", Some(construct.to_string())),
        };
        serde_json::json!({
            "kind":      kind,
            "column":    self.column(),
            "construct": construct,
            "message":   self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_message_names_column() {
        let err = ParseError::syntax(4, "unexpected end of expression");
        assert_eq!(
            err.to_string(),
            "Syntax error at column 4: unexpected end of expression"
        );
        assert!(!err.is_unsafe());
    }

    #[test]
    fn unsafe_error_json_carries_construct() {
        let err = ParseError::unsafe_construct(1, Construct::Lambda);
        let json = err.to_json_value();
        assert_eq!(json["kind"], "unsafe");
        assert_eq!(json["construct"], "lambda expression");
        assert_eq!(json["column"], 1);
    }
}
