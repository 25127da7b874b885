//! JSON text parsing.

use std::rc::Rc;

use super::{Json, JsonValue, StructElem};

/// Parses a single JSON value from `text`.
///
/// Returns `None` on any structural error or on trailing non-whitespace
/// after the value; no partial value is ever produced. Escapes `\b \f \n
/// \r \t \\ \" \/` are interpreted; `\uXXXX` is reserved and left
/// uninterpreted.
#[must_use]
pub fn parse(text: &str) -> Option<Json> {
    let mut p = JsonParser {
        bytes: text.as_bytes(),
        pos: 0,
    };
    p.skip_whitespace();
    let value = p.parse_value()?;
    p.skip_whitespace();
    if p.pos == p.bytes.len() {
        Some(value)
    } else {
        None
    }
}

struct JsonParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl JsonParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self
            .peek()
            .is_some_and(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c'))
        {
            self.pos += 1;
        }
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_word(&mut self, word: &str) -> Option<()> {
        let end = self.pos + word.len();
        if self.bytes.get(self.pos..end) == Some(word.as_bytes()) {
            self.pos = end;
            Some(())
        } else {
            None
        }
    }

    fn parse_value(&mut self) -> Option<Json> {
        match self.peek()? {
            b'{' => self.parse_struct(),
            b'[' => self.parse_array(),
            b'"' => Some(Rc::new(JsonValue::Str(self.parse_string()?))),
            b't' => {
                self.expect_word("true")?;
                Some(Rc::new(JsonValue::True))
            }
            b'f' => {
                self.expect_word("false")?;
                Some(Rc::new(JsonValue::False))
            }
            b'n' => {
                self.expect_word("null")?;
                Some(JsonValue::null())
            }
            b'-' | b'0'..=b'9' => self.parse_number(),
            _ => None,
        }
    }

    fn parse_struct(&mut self) -> Option<Json> {
        self.pos += 1;
        let mut elems = Vec::new();
        self.skip_whitespace();
        if self.eat(b'}') {
            return Some(Rc::new(JsonValue::Struct(elems)));
        }
        loop {
            self.skip_whitespace();
            let label = self.parse_string()?;
            self.skip_whitespace();
            if !self.eat(b':') {
                return None;
            }
            self.skip_whitespace();
            let value = self.parse_value()?;
            elems.push(StructElem { label, value });
            self.skip_whitespace();
            if self.eat(b',') {
                continue;
            }
            if self.eat(b'}') {
                return Some(Rc::new(JsonValue::Struct(elems)));
            }
            return None;
        }
    }

    fn parse_array(&mut self) -> Option<Json> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.eat(b']') {
            return Some(Rc::new(JsonValue::Array(items)));
        }
        loop {
            self.skip_whitespace();
            items.push(self.parse_value()?);
            self.skip_whitespace();
            if self.eat(b',') {
                continue;
            }
            if self.eat(b']') {
                return Some(Rc::new(JsonValue::Array(items)));
            }
            return None;
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        if !self.eat(b'"') {
            return None;
        }
        let mut out = Vec::new();
        loop {
            match self.peek()? {
                b'"' => {
                    self.pos += 1;
                    return String::from_utf8(out).ok();
                }
                b'\\' => {
                    self.pos += 1;
                    let c = self.peek()?;
                    self.pos += 1;
                    match c {
                        b'b' => out.push(b'\x08'),
                        b'f' => out.push(b'\x0c'),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        other => out.push(other),
                    }
                }
                other => {
                    self.pos += 1;
                    out.push(other);
                }
            }
        }
    }

    fn parse_number(&mut self) -> Option<Json> {
        let start = self.pos;
        if self.eat(b'-') && !self.peek().is_some_and(|b| b.is_ascii_digit()) {
            return None;
        }
        if self.eat(b'0') {
            // A leading zero is not followed by more digits.
        } else {
            if !self.peek().is_some_and(|b| b.is_ascii_digit()) {
                return None;
            }
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if self.peek() == Some(b'.') {
            if !self.bytes.get(self.pos + 1).is_some_and(u8::is_ascii_digit) {
                return None;
            }
            self.pos += 1;
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if !self.peek().is_some_and(|b| b.is_ascii_digit()) {
                return None;
            }
            while self.peek().is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?;
        text.parse::<f64>().ok().map(JsonValue::real)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{compare, render};
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(*parse("null").unwrap(), JsonValue::Null);
        assert_eq!(*parse("true").unwrap(), JsonValue::True);
        assert_eq!(*parse("false").unwrap(), JsonValue::False);
        assert_eq!(*parse("42").unwrap(), JsonValue::Real(42.0));
        assert_eq!(*parse("-1.5e2").unwrap(), JsonValue::Real(-150.0));
        assert_eq!(*parse("\"hi\"").unwrap(), JsonValue::Str("hi".into()));
    }

    #[test]
    fn test_parse_containers() {
        let v = parse(r#"{"a":1,"b":[true,null]}"#).unwrap();
        assert_eq!(*v.property("a").unwrap(), JsonValue::Real(1.0));
        match &*v.property("b").unwrap() {
            JsonValue::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_empty_containers() {
        assert_eq!(*parse("[]").unwrap(), JsonValue::Array(vec![]));
        assert_eq!(*parse("{}").unwrap(), JsonValue::Struct(vec![]));
        assert_eq!(*parse(" { } ").unwrap(), JsonValue::Struct(vec![]));
    }

    #[test]
    fn test_parse_escapes() {
        assert_eq!(
            *parse(r#""a\nb\t\"\\\/""#).unwrap(),
            JsonValue::Str("a\nb\t\"\\/".into())
        );
    }

    #[test]
    fn test_trailing_garbage_fails() {
        assert!(parse("1 2").is_none());
        assert!(parse("{} x").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn test_structural_errors_fail() {
        assert!(parse("{").is_none());
        assert!(parse("[1,").is_none());
        assert!(parse("{\"a\" 1}").is_none());
        assert!(parse("\"unterminated").is_none());
        assert!(parse("01").is_none());
        assert!(parse("-").is_none());
        assert!(parse("1.").is_none());
        assert!(parse("1e").is_none());
    }

    #[test]
    fn test_duplicate_labels_kept_in_order() {
        let v = parse(r#"{"a":1,"a":2}"#).unwrap();
        assert_eq!(*v.property("a").unwrap(), JsonValue::Real(1.0));
    }

    #[test]
    fn test_round_trip() {
        for text in [
            "null",
            "true",
            "false",
            "4",
            "0.5",
            "-150",
            r#""a\"b""#,
            r#"[1,"x",[true,{}]]"#,
            r#"{"a":1,"b":{"c":[]}}"#,
        ] {
            let v = parse(text).unwrap();
            let mut out = String::new();
            render(&mut out, &v);
            let back = parse(&out).unwrap();
            assert_eq!(compare(&v, &back), Ordering::Equal, "round trip of {text}");
        }
    }
}
