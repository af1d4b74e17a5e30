//! tally-core: the sandboxed expression language shared by the section
//! engine and any other consumer of user-written filters.
//!
//! # Public API
//!
//! - [`parse()`] -- text to [`Expr`], or a [`ParseError`]
//! - AST types: [`Expr`], [`Literal`], [`UnaryOp`], [`BinaryOp`], [`CompareOp`]
//! - [`Construct`] -- the constructs the parser refuses to build
//!
//! Parsing never evaluates anything. Unknown names and functions are
//! syntactically valid and only fail once an evaluator resolves them.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;

// ── Convenience re-exports ───────────────────────────────────────────

pub use ast::{BinaryOp, CompareOp, Construct, Expr, Literal, UnaryOp};
pub use error::ParseError;
pub use parser::{parse, MAX_DEPTH};
