//! Expression tree produced by the parser.
//!
//! The node set is closed: every variant here is safe to evaluate. Anything
//! the parser recognises but refuses to build is listed in [`Construct`].

use std::fmt;

// ──────────────────────────────────────────────
// Literals
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// All numeric literals are double precision.
    Number(f64),
    Str(String),
    Bool(bool),
    /// `None`, the absent value.
    None,
}

// ──────────────────────────────────────────────
// Operators
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtE => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtE => ">=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
        };
        f.write_str(s)
    }
}

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

/// A parsed expression. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Name(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a < b <= c` -- every link must hold; operands are evaluated at most once.
    Compare {
        left: Box<Expr>,
        links: Vec<(CompareOp, Expr)>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// `then if condition else otherwise`
    IfElse {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Calls are by name only; the callee is never an arbitrary expression.
    Call {
        function: String,
        args: Vec<Expr>,
    },
    /// `element in collection` / `element not in collection`
    Membership {
        element: Box<Expr>,
        collection: Box<Expr>,
        negated: bool,
    },
}

// ──────────────────────────────────────────────
// Disallowed constructs
// ──────────────────────────────────────────────

/// Constructs the parser recognises and rejects. Expressions come from
/// user-edited files, so none of these ever reach the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    ListLiteral,
    TupleLiteral,
    SetLiteral,
    DictLiteral,
    Comprehension,
    Lambda,
    AttributeAccess,
    Subscript,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Construct::ListLiteral => "list literal",
            Construct::TupleLiteral => "tuple literal",
            Construct::SetLiteral => "set literal",
            Construct::DictLiteral => "dict literal",
            Construct::Comprehension => "comprehension",
            Construct::Lambda => "lambda expression",
            Construct::AttributeAccess => "attribute access",
            Construct::Subscript => "subscript",
        };
        f.write_str(s)
    }
}
