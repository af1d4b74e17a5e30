use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers and keywords; the parser tells them apart
    Word(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    /// Numeric literal, integer or decimal
    Number(f64),
    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    // Comparison operators
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// A lone `=`; never valid, kept so the parser can explain it
    Assign,
    // Arithmetic operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    // End of input
    Eof,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    /// 1-based character column of the token start.
    pub column: usize,
}

pub fn lex(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut pos = 0usize;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        let column = pos + 1;

        // String literal, either quote style
        if c == '"' || c == '\'' {
            let quote = c;
            pos += 1;
            let mut s = String::new();
            loop {
                if pos >= chars.len() {
                    return Err(ParseError::syntax(column, "unterminated string literal"));
                }
                let sc = chars[pos];
                if sc == quote {
                    pos += 1;
                    break;
                }
                if sc == '\\' {
                    pos += 1;
                    if pos >= chars.len() {
                        return Err(ParseError::syntax(column, "unterminated escape in string"));
                    }
                    match chars[pos] {
                        '"' => s.push('"'),
                        '\'' => s.push('\''),
                        '\\' => s.push('\\'),
                        'n' => s.push('\n'),
                        't' => s.push('\t'),
                        other => {
                            s.push('\\');
                            s.push(other);
                        }
                    }
                    pos += 1;
                    continue;
                }
                s.push(sc);
                pos += 1;
            }
            tokens.push(Spanned {
                token: Token::Str(s),
                column,
            });
            continue;
        }

        // Number: `12`, `3.14`, `.5`
        if c.is_ascii_digit()
            || (c == '.' && pos + 1 < chars.len() && chars[pos + 1].is_ascii_digit())
        {
            let start = pos;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos < chars.len() && chars[pos] == '.' {
                pos += 1; // consume '.'
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            if pos < chars.len() && (chars[pos].is_alphabetic() || chars[pos] == '_') {
                return Err(ParseError::syntax(
                    column,
                    format!("invalid number literal near '{}'", chars[pos]),
                ));
            }
            let s: String = chars[start..pos].iter().collect();
            let n: f64 = s
                .parse()
                .map_err(|_| ParseError::syntax(column, format!("invalid number '{}'", s)))?;
            tokens.push(Spanned {
                token: Token::Number(n),
                column,
            });
            continue;
        }

        let next = chars.get(pos + 1).copied();
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('=', _) => (Token::Assign, 1),
            ('!', Some('=')) => (Token::Neq, 2),
            ('<', Some('=')) => (Token::Lte, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', Some('=')) => (Token::Gte, 2),
            ('>', _) => (Token::Gt, 1),
            ('*', Some('*')) | ('/', Some('/')) => {
                return Err(ParseError::syntax(
                    column,
                    format!("operator '{}{}' is not supported", c, c),
                ));
            }
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            (':', _) => (Token::Colon, 1),
            _ if c.is_alphabetic() || c == '_' => {
                let start = pos;
                while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                tokens.push(Spanned {
                    token: Token::Word(word),
                    column,
                });
                continue;
            }
            _ => {
                return Err(ParseError::syntax(
                    column,
                    format!("unexpected character '{}'", c),
                ));
            }
        };
        tokens.push(Spanned { token, column });
        pos += width;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        column: chars.len() + 1,
    });
    Ok(tokens)
}
