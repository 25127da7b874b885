//! Statement-completeness test for interactive readers.

/// Returns true if `text` is a complete statement: it ends with a `;` that
/// is not inside a string, with only whitespace and comments after it.
///
/// Comment text counts as whitespace. An unterminated block comment or
/// string makes the text incomplete. The empty string is complete.
#[must_use]
pub fn complete(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut is_complete = true;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b';' => {
                is_complete = true;
                i += 1;
            }
            b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' => {
                i += 1;
            }
            b'/' => {
                if bytes.get(i + 1) != Some(&b'*') {
                    is_complete = false;
                    i += 1;
                    continue;
                }
                i += 2;
                loop {
                    match bytes.get(i) {
                        None => return false,
                        Some(b'*') if bytes.get(i + 1) == Some(&b'/') => {
                            i += 2;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
            }
            b'-' => {
                if bytes.get(i + 1) != Some(&b'-') {
                    is_complete = false;
                    i += 1;
                    continue;
                }
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'"' => {
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return false,
                        Some(b'"') => {
                            i += 1;
                            break;
                        }
                        Some(b'\\') => i += 2,
                        Some(_) => i += 1,
                    }
                }
                is_complete = false;
            }
            _ => {
                is_complete = false;
                i += 1;
            }
        }
    }
    is_complete
}

#[cfg(test)]
mod tests {
    use super::complete;

    #[test]
    fn test_empty_is_complete() {
        assert!(complete(""));
        assert!(complete("   \n"));
    }

    #[test]
    fn test_simple_statements() {
        assert!(complete("SELECT t.a FROM t;"));
        assert!(!complete("SELECT t.a FROM t"));
        assert!(complete("SELECT t.a FROM t;  \n"));
    }

    #[test]
    fn test_comments_count_as_whitespace() {
        assert!(complete("/* ; */"));
        assert!(complete("SELECT 1; -- trailing comment"));
        assert!(complete("SELECT 1; /* trailing */"));
        assert!(!complete("SELECT 1 -- comment\n"));
    }

    #[test]
    fn test_unterminated_comment_is_incomplete() {
        assert!(!complete("SELECT 1; /* never ends"));
    }

    #[test]
    fn test_strings() {
        assert!(!complete("\"a;b\""));
        assert!(!complete("SELECT \"a;"));
        assert!(complete("SELECT \"a;b\" FROM t;"));
    }

    #[test]
    fn test_semicolon_inside_string_does_not_complete() {
        assert!(!complete("INSERT INTO t VALUE \";\""));
    }
}
