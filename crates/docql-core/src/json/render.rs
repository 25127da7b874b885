//! Deterministic JSON rendering.

use super::JsonValue;

/// Appends a real in shortest round-trip form.
///
/// Integral reals render without a fractional part. Non-finite values
/// render as `null`, keeping stored documents parseable.
pub(crate) fn append_real(out: &mut String, r: f64) {
    use std::fmt::Write;
    if r.is_finite() {
        let _ = write!(out, "{r}");
    } else {
        out.push_str("null");
    }
}

/// Appends a string as a quoted literal, escaping `"` and `\`.
fn append_quoted(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

/// Appends the canonical text for a JSON value to `out`.
///
/// Empty arrays and structs render as `[]` and `{}`.
pub fn render(out: &mut String, value: &JsonValue) {
    match value {
        JsonValue::False => out.push_str("false"),
        JsonValue::True => out.push_str("true"),
        JsonValue::Null => out.push_str("null"),
        JsonValue::Real(r) => append_real(out, *r),
        JsonValue::Str(s) => append_quoted(out, s),
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                render(out, item);
            }
            out.push(']');
        }
        JsonValue::Struct(elems) => {
            out.push('{');
            for (i, elem) in elems.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                append_quoted(out, &elem.label);
                out.push(':');
                render(out, &elem.value);
            }
            out.push('}');
        }
    }
}

/// Renders a JSON value to a fresh string.
#[must_use]
pub fn to_text(value: &JsonValue) -> String {
    let mut out = String::new();
    render(&mut out, value);
    out
}

#[cfg(test)]
mod tests {
    use super::super::StructElem;
    use super::*;
    use std::rc::Rc;

    fn text(v: &JsonValue) -> String {
        to_text(v)
    }

    #[test]
    fn test_render_primitives() {
        assert_eq!(text(&JsonValue::Null), "null");
        assert_eq!(text(&JsonValue::True), "true");
        assert_eq!(text(&JsonValue::False), "false");
        assert_eq!(text(&JsonValue::Real(4.0)), "4");
        assert_eq!(text(&JsonValue::Real(0.5)), "0.5");
        assert_eq!(text(&JsonValue::Real(-3.0)), "-3");
        assert_eq!(text(&JsonValue::Real(f64::NAN)), "null");
    }

    #[test]
    fn test_render_string_escapes() {
        assert_eq!(text(&JsonValue::Str("a\"b\\c".into())), r#""a\"b\\c""#);
    }

    #[test]
    fn test_render_containers() {
        let arr = JsonValue::Array(vec![JsonValue::real(1.0), JsonValue::string("x")]);
        assert_eq!(text(&arr), r#"[1,"x"]"#);

        let obj = JsonValue::Struct(vec![
            StructElem {
                label: "a".into(),
                value: JsonValue::real(1.0),
            },
            StructElem {
                label: "b".into(),
                value: Rc::new(JsonValue::Array(vec![])),
            },
        ]);
        assert_eq!(text(&obj), r#"{"a":1,"b":[]}"#);
    }

    #[test]
    fn test_render_empty_containers_canonical() {
        assert_eq!(text(&JsonValue::Array(vec![])), "[]");
        assert_eq!(text(&JsonValue::Struct(vec![])), "{}");
    }
}
