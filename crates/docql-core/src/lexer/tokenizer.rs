//! Query-language tokenizer.

use super::{FlattenOp, Keyword, Span, Token, TokenKind};

/// Returns true for characters that may appear in an identifier.
///
/// Identifiers are alphanumerics, `_`, and any non-ASCII character.
fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii()
}

/// Returns true for characters that may start an identifier.
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

/// A lexer that tokenizes query-language input.
pub struct Lexer<'a> {
    /// The input source text.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    /// Returns the byte offset of the next unconsumed character.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.pos
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the character after the current one without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skips whitespace, `--` line comments and `/* ... */` block comments.
    ///
    /// An unterminated block comment consumes the rest of the input.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }

            if self.peek() == Some('-') && self.peek_next() == Some('-') {
                self.advance();
                self.advance();
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            if self.peek() == Some('/') && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
                continue;
            }

            break;
        }
    }

    /// Creates a token spanning the current token text.
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, Span::new(self.start, self.pos))
    }

    /// Creates an `Illegal` token carrying the current token text.
    fn illegal(&self) -> Token {
        self.make_token(TokenKind::Illegal(
            self.input[self.start..self.pos].to_string(),
        ))
    }

    /// Scans an identifier, keyword, or flatten operator.
    fn scan_identifier(&mut self) -> Token {
        while self.peek().is_some_and(is_ident_char) {
            self.advance();
        }
        let text = &self.input[self.start..self.pos];
        match text {
            "FLATTEN" => self.make_token(TokenKind::FlattenOp(FlattenOp::Flatten)),
            "EACH" => self.make_token(TokenKind::FlattenOp(FlattenOp::Each)),
            _ => match Keyword::lookup(text) {
                Some(kw) => self.make_token(TokenKind::Keyword(kw)),
                None => self.make_token(TokenKind::Identifier(text.to_string())),
            },
        }
    }

    /// Scans a numeric literal.
    ///
    /// Integers and floats both scan to a real. A number immediately
    /// followed by an identifier character is illegal.
    fn scan_number(&mut self) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if self.peek().is_some_and(|c| c == 'e' || c == 'E') {
            let has_exp = match self.peek_next() {
                Some(d) if d.is_ascii_digit() => true,
                Some('+' | '-') => {
                    let mut chars = self.input[self.pos..].chars();
                    chars.next();
                    chars.next();
                    chars.next().is_some_and(|c| c.is_ascii_digit())
                }
                _ => false,
            };
            if has_exp {
                self.advance();
                self.advance();
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        if self.peek().is_some_and(is_ident_char) {
            while self.peek().is_some_and(is_ident_char) {
                self.advance();
            }
            return self.illegal();
        }

        let text = &self.input[self.start..self.pos];
        match text.parse::<f64>() {
            Ok(r) => self.make_token(TokenKind::Number(r)),
            Err(_) => self.illegal(),
        }
    }

    /// Scans a string literal delimited by `"`, with `""` as the escaped
    /// quote. An unterminated string is an illegal token.
    fn scan_string(&mut self) -> Token {
        self.advance();
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    if self.peek_next() == Some('"') {
                        value.push('"');
                        self.advance();
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => return self.illegal(),
            }
        }
        self.advance();
        self.make_token(TokenKind::String(value))
    }

    /// Scans the next token.
    #[must_use]
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start = self.pos;

        let c = match self.peek() {
            Some(c) => c,
            None => return self.make_token(TokenKind::Eof),
        };

        if c == '"' {
            return self.scan_string();
        }
        if c.is_ascii_digit() {
            return self.scan_number();
        }
        if c == '.' && self.peek_next().is_some_and(|n| n.is_ascii_digit()) {
            return self.scan_number();
        }
        if is_ident_start(c) {
            return self.scan_identifier();
        }

        self.advance();
        match c {
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            '[' => self.make_token(TokenKind::LeftBracket),
            ']' => self.make_token(TokenKind::RightBracket),
            '{' => self.make_token(TokenKind::LeftBrace),
            '}' => self.make_token(TokenKind::RightBrace),
            ',' => self.make_token(TokenKind::Comma),
            ';' => self.make_token(TokenKind::Semicolon),
            '.' => self.make_token(TokenKind::Dot),
            ':' => self.make_token(TokenKind::Colon),
            '?' => self.make_token(TokenKind::Question),
            '+' => self.make_token(TokenKind::Plus),
            '-' => self.make_token(TokenKind::Minus),
            '*' => self.make_token(TokenKind::Star),
            '/' => self.make_token(TokenKind::Slash),
            '%' => self.make_token(TokenKind::Percent),
            '~' => self.make_token(TokenKind::BitNot),
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::EqEq)
                } else {
                    self.make_token(TokenKind::Eq)
                }
            }
            '<' => match self.peek() {
                Some('=') => {
                    self.advance();
                    self.make_token(TokenKind::LtEq)
                }
                Some('>') => {
                    self.advance();
                    self.make_token(TokenKind::NotEq)
                }
                Some('<') => {
                    self.advance();
                    self.make_token(TokenKind::LeftShift)
                }
                _ => self.make_token(TokenKind::Lt),
            },
            '>' => match self.peek() {
                Some('=') => {
                    self.advance();
                    self.make_token(TokenKind::GtEq)
                }
                Some('>') => {
                    self.advance();
                    self.make_token(TokenKind::RightShift)
                }
                _ => self.make_token(TokenKind::Gt),
            },
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::NotEq)
                } else {
                    self.make_token(TokenKind::Bang)
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    self.make_token(TokenKind::AndAnd)
                } else {
                    self.make_token(TokenKind::BitAnd)
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    self.make_token(TokenKind::OrOr)
                } else {
                    self.make_token(TokenKind::BitOr)
                }
            }
            _ => self.illegal(),
        }
    }

    /// Tokenizes the entire input.
    #[must_use]
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}
