//! Recursive-descent parser for the expression language.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr       := or_expr [ 'if' or_expr 'else' expr ]
//! or_expr    := and_expr ( 'or' and_expr )*
//! and_expr   := not_expr ( 'and' not_expr )*
//! not_expr   := 'not' not_expr | comparison
//! comparison := arith ( cmp_op arith )*  |  arith [ 'not' ] 'in' arith
//! arith      := term ( ('+' | '-') term )*
//! term       := unary ( ('*' | '/' | '%') unary )*
//! unary      := ('-' | '+') unary | postfix
//! postfix    := atom [ '(' args ')' ]          -- atom must be a name
//! atom       := NUMBER | STRING | True | False | None | NAME | '(' expr ')'
//! ```
//!
//! Brackets, braces, `lambda`, `for`, tuples, `.` and subscripts are
//! recognised only so they can be rejected as [`Construct`]s.

use crate::ast::{BinaryOp, CompareOp, Construct, Expr, Literal, UnaryOp};
use crate::error::ParseError;
use crate::lexer::{self, Spanned, Token};

/// Words that can never be used as identifiers.
const KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "for", "lambda", "True", "False", "None",
];

/// Deepest nesting of parentheses, operators and calls accepted.
pub const MAX_DEPTH: usize = 100;

/// Parse expression text into a tree, rejecting anything outside the sandbox.
pub fn parse(src: &str) -> Result<Expr, ParseError> {
    let tokens = lexer::lex(src)?;
    let mut parser = Parser::new(&tokens);
    if parser.peek() == &Token::Eof {
        return Err(parser.err("empty expression"));
    }
    let expr = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn cur_column(&self) -> usize {
        self.cur().column
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x == w)
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError::syntax(self.cur_column(), msg)
    }

    fn rejected(&self, construct: Construct) -> ParseError {
        ParseError::unsafe_construct(self.cur_column(), construct)
    }

    fn unexpected(&self) -> ParseError {
        self.err(format!("unexpected {}", describe(self.peek())))
    }

    fn expect_word(&mut self, expected: &str) -> Result<(), ParseError> {
        if self.is_word(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!(
                "expected '{}', got {}",
                expected,
                describe(self.peek())
            )))
        }
    }

    fn expect_rparen(&mut self) -> Result<(), ParseError> {
        if self.peek() == &Token::RParen {
            self.advance();
            Ok(())
        } else if self.peek() == &Token::Eof {
            Err(self.err("'(' was never closed"))
        } else {
            Err(self.err(format!("expected ')', got {}", describe(self.peek()))))
        }
    }

    /// Go one level deeper into the tree. The caller restores `depth`.
    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.err("expression nested too deeply"));
        }
        Ok(())
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        match self.peek() {
            Token::Eof => Ok(()),
            Token::Word(w) if w == "for" => Err(self.rejected(Construct::Comprehension)),
            _ => Err(self.unexpected()),
        }
    }

    // -- Expression levels ---------------------------------------

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.descend()?;
        let expr = self.parse_ternary();
        self.depth -= 1;
        expr
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        if self.is_word("lambda") {
            return Err(self.rejected(Construct::Lambda));
        }
        let then = self.parse_or_expr()?;
        if self.is_word("if") {
            self.advance();
            let condition = self.parse_or_expr()?;
            self.expect_word("else")?;
            let otherwise = self.parse_expr()?;
            return Ok(Expr::IfElse {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        if self.is_word("for") {
            return Err(self.rejected(Construct::Comprehension));
        }
        Ok(then)
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_and_expr()?;
        while self.is_word("or") {
            self.descend()?;
            self.advance();
            let right = self.parse_and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_not_expr()?;
        while self.is_word("and") {
            self.descend()?;
            self.advance();
            let right = self.parse_not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_not_expr(&mut self) -> Result<Expr, ParseError> {
        if self.is_word("not") {
            self.descend()?;
            self.advance();
            let operand = self.parse_not_expr()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn membership_ahead(&self) -> Option<bool> {
        if self.is_word("in") {
            return Some(false);
        }
        if self.is_word("not") && matches!(self.peek_at(1), Token::Word(w) if w == "in") {
            return Some(true);
        }
        None
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_arith()?;

        if let Some(negated) = self.membership_ahead() {
            self.advance();
            if negated {
                self.advance();
            }
            let collection = self.parse_arith()?;
            if compare_op(self.peek()).is_some() || self.membership_ahead().is_some() {
                return Err(self.err("membership tests cannot be chained"));
            }
            return Ok(Expr::Membership {
                element: Box::new(left),
                collection: Box::new(collection),
                negated,
            });
        }

        let mut links = Vec::new();
        while let Some(op) = compare_op(self.peek()) {
            self.advance();
            links.push((op, self.parse_arith()?));
        }
        if self.membership_ahead().is_some() && !links.is_empty() {
            return Err(self.err("membership tests cannot be chained"));
        }
        if self.is_word("is") {
            return Err(self.err("'is' is not supported; use '==' or '!='"));
        }

        if links.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                links,
            })
        }
    }

    fn parse_arith(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.descend()?;
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let base = self.depth;
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.descend()?;
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth = base;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Pos,
            _ => return self.parse_postfix(),
        };
        self.descend()?;
        self.advance();
        let operand = self.parse_unary()?;
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let atom = self.parse_atom()?;
        let expr = if self.peek() == &Token::LParen {
            let function = match atom {
                Expr::Name(name) => name,
                _ => return Err(self.err("only named functions can be called")),
            };
            self.advance();
            let args = self.parse_args()?;
            Expr::Call { function, args }
        } else {
            atom
        };
        match self.peek() {
            Token::Dot => Err(self.rejected(Construct::AttributeAccess)),
            Token::LBracket => Err(self.rejected(Construct::Subscript)),
            Token::LParen => Err(self.err("only named functions can be called")),
            _ => Ok(expr),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.peek() == &Token::RParen {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.peek() {
                Token::Comma => {
                    self.advance();
                    // Trailing comma before ')'.
                    if self.peek() == &Token::RParen {
                        self.advance();
                        return Ok(args);
                    }
                }
                Token::RParen => {
                    self.advance();
                    return Ok(args);
                }
                Token::Assign => return Err(self.err("keyword arguments are not supported")),
                Token::Eof => return Err(self.err("'(' was never closed")),
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::Str(s)))
            }
            Token::Word(w) => {
                let lit = match w.as_str() {
                    "True" => Some(Literal::Bool(true)),
                    "False" => Some(Literal::Bool(false)),
                    "None" => Some(Literal::None),
                    "lambda" => return Err(self.rejected(Construct::Lambda)),
                    kw if KEYWORDS.contains(&kw) => return Err(self.unexpected()),
                    _ => None,
                };
                self.advance();
                Ok(match lit {
                    Some(lit) => Expr::Literal(lit),
                    None => Expr::Name(w),
                })
            }
            Token::LParen => {
                let open = self.pos;
                self.advance();
                if self.peek() == &Token::RParen {
                    self.pos = open;
                    return Err(self.rejected(Construct::TupleLiteral));
                }
                let inner = self.parse_expr()?;
                if self.peek() == &Token::Comma {
                    self.pos = open;
                    return Err(self.rejected(Construct::TupleLiteral));
                }
                self.expect_rparen()?;
                Ok(inner)
            }
            Token::LBracket => {
                if self.group_contains(|t| matches!(t, Token::Word(w) if w == "for")) {
                    Err(self.rejected(Construct::Comprehension))
                } else {
                    Err(self.rejected(Construct::ListLiteral))
                }
            }
            Token::LBrace => {
                if self.group_contains(|t| matches!(t, Token::Word(w) if w == "for")) {
                    Err(self.rejected(Construct::Comprehension))
                } else if self.peek_at(1) == &Token::RBrace
                    || self.group_contains(|t| t == &Token::Colon)
                {
                    Err(self.rejected(Construct::DictLiteral))
                } else {
                    Err(self.rejected(Construct::SetLiteral))
                }
            }
            Token::Eof => Err(self.err("unexpected end of expression")),
            _ => Err(self.unexpected()),
        }
    }

    /// Scan the bracket group opened at the current token and report whether
    /// any token directly inside it (depth 1) satisfies `pred`.
    fn group_contains(&self, pred: impl Fn(&Token) -> bool) -> bool {
        let mut depth = 0usize;
        for spanned in &self.tokens[self.pos..] {
            match spanned.token {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return false;
                    }
                }
                Token::Eof => return false,
                _ => {}
            }
            if depth == 1 && pred(&spanned.token) {
                return true;
            }
        }
        false
    }
}

fn compare_op(token: &Token) -> Option<CompareOp> {
    match token {
        Token::Eq => Some(CompareOp::Eq),
        Token::Neq => Some(CompareOp::NotEq),
        Token::Lt => Some(CompareOp::Lt),
        Token::Lte => Some(CompareOp::LtE),
        Token::Gt => Some(CompareOp::Gt),
        Token::Gte => Some(CompareOp::GtE),
        _ => None,
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Word(w) => format!("'{}'", w),
        Token::Str(_) => "string literal".to_owned(),
        Token::Number(n) => format!("number {}", n),
        Token::Assign => "'=' (use '==' for comparison)".to_owned(),
        Token::Eof => "end of expression".to_owned(),
        other => {
            let s = match other {
                Token::LParen => "(",
                Token::RParen => ")",
                Token::LBracket => "[",
                Token::RBracket => "]",
                Token::LBrace => "{",
                Token::RBrace => "}",
                Token::Comma => ",",
                Token::Dot => ".",
                Token::Colon => ":",
                Token::Eq => "==",
                Token::Neq => "!=",
                Token::Lt => "<",
                Token::Lte => "<=",
                Token::Gt => ">",
                Token::Gte => ">=",
                Token::Plus => "+",
                Token::Minus => "-",
                Token::Star => "*",
                Token::Slash => "/",
                _ => "%",
            };
            format!("'{}'", s)
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
