//! Parser error type.

use crate::lexer::{Span, TokenKind};

/// A parse error.
///
/// Parsing follows a single-error model: the first error aborts the parse
/// and carries one diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// The location of the error.
    pub span: Span,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// Creates the diagnostic for an unexpected token.
    ///
    /// An `Illegal` token reports the scanner's `unrecognized token`
    /// diagnostic instead.
    #[must_use]
    pub fn unexpected(expected: &str, found: &TokenKind, span: Span) -> Self {
        let message = match found {
            TokenKind::Illegal(text) => format!("unrecognized token: \"{text}\""),
            other => format!(
                "unexpected token: expected {expected}, found {}",
                describe(other)
            ),
        };
        Self { message, span }
    }
}

/// A short human-readable description of a token kind.
fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(r) => format!("number {r}"),
        TokenKind::String(s) => format!("string \"{s}\""),
        TokenKind::Identifier(name) => format!("identifier \"{name}\""),
        TokenKind::Keyword(kw) => format!("{kw:?}").to_uppercase(),
        TokenKind::FlattenOp(op) => op.as_str().to_string(),
        TokenKind::Eof => String::from("end of input"),
        TokenKind::Illegal(text) => format!("\"{text}\""),
        other => format!("{other:?}"),
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at byte {}..{}",
            self.message, self.span.start, self.span.end
        )
    }
}

impl std::error::Error for ParseError {}
