//! The JSON value model: a tagged value with reference-counted sharing and
//! copy-on-write editing, plus the parser, renderer and comparator.

mod parse;
mod render;

pub use parse::parse;
pub use render::{render, to_text};

use std::cmp::Ordering;
use std::rc::Rc;

/// A shared, reference-counted JSON value.
///
/// `Rc::clone` is the cheap reference; `Rc::make_mut` is the edit path: a
/// value is editable in place when its count is 1, otherwise the top node is
/// cloned and children are acquired by reference-increment.
pub type Json = Rc<JsonValue>;

/// One element of a struct: a label and its value.
///
/// Structs are insertion-ordered and may carry duplicate labels; lookup
/// returns the first match.
#[derive(Debug, Clone, PartialEq)]
pub struct StructElem {
    /// The element label.
    pub label: String,
    /// The element value.
    pub value: Json,
}

/// A JSON value.
///
/// The variant order is the tag ordinal used for cross-type comparison:
/// `FALSE < TRUE < REAL < NULL < STRING < ARRAY < STRUCT`.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    /// The literal `false`.
    False,
    /// The literal `true`.
    True,
    /// An IEEE-754 double.
    Real(f64),
    /// The literal `null`.
    Null,
    /// A string.
    Str(String),
    /// An ordered sequence of values.
    Array(Vec<Json>),
    /// An insertion-ordered label/value mapping.
    Struct(Vec<StructElem>),
}

impl JsonValue {
    /// Returns a shared `null` value.
    #[must_use]
    pub fn null() -> Json {
        Rc::new(Self::Null)
    }

    /// Returns a shared boolean value.
    #[must_use]
    pub fn boolean(b: bool) -> Json {
        Rc::new(if b { Self::True } else { Self::False })
    }

    /// Returns a shared real value.
    #[must_use]
    pub fn real(r: f64) -> Json {
        Rc::new(Self::Real(r))
    }

    /// Returns a shared string value.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Json {
        Rc::new(Self::Str(s.into()))
    }

    /// The position of this value's tag in the cross-type total order.
    #[must_use]
    pub const fn tag_rank(&self) -> u8 {
        match self {
            Self::False => 0,
            Self::True => 1,
            Self::Real(_) => 2,
            Self::Null => 3,
            Self::Str(_) => 4,
            Self::Array(_) => 5,
            Self::Struct(_) => 6,
        }
    }

    /// Truthiness under the JavaScript rule: arrays, structs and `true` are
    /// true; a string is true iff non-empty; a number is true iff non-zero;
    /// `null` and `false` are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Real(r) => *r != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Array(_) | Self::Struct(_) | Self::True => true,
            Self::False | Self::Null => false,
        }
    }

    /// Attempts a numeric coercion.
    ///
    /// `false` is 0, `true` is 1, a real is itself, and a string converts
    /// only if the whole string (with no leading whitespace) parses as a
    /// number. Everything else fails; callers treat failure as NaN.
    #[must_use]
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::False => Some(0.0),
            Self::True => Some(1.0),
            Self::Real(r) => Some(*r),
            Self::Str(s) => {
                if s.is_empty() || s.starts_with(char::is_whitespace) {
                    None
                } else {
                    s.parse::<f64>().ok()
                }
            }
            _ => None,
        }
    }

    /// Numeric coercion with NaN on failure.
    #[must_use]
    pub fn to_real_or_nan(&self) -> f64 {
        self.as_real().unwrap_or(f64::NAN)
    }

    /// Appends the stringification of this value to `out`.
    ///
    /// Primitives stringify bare; arrays and structs stringify via
    /// [`render`].
    pub fn append_string(&self, out: &mut String) {
        match self {
            Self::False => out.push_str("false"),
            Self::True => out.push_str("true"),
            Self::Null => out.push_str("null"),
            Self::Real(r) => render::append_real(out, *r),
            Self::Str(s) => out.push_str(s),
            Self::Array(_) | Self::Struct(_) => render(out, self),
        }
    }

    /// The stringification of this value.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        let mut out = String::new();
        self.append_string(&mut out);
        out
    }

    /// If this value is a struct, the value of its first element with the
    /// given label.
    #[must_use]
    pub fn property(&self, label: &str) -> Option<Json> {
        match self {
            Self::Struct(elems) => elems
                .iter()
                .find(|e| e.label == label)
                .map(|e| Rc::clone(&e.value)),
            _ => None,
        }
    }
}

/// Appends `(label, value)` to a struct value, editing in place when the
/// reference count allows and cloning the top node otherwise.
///
/// A non-struct target is replaced by a fresh struct holding only the new
/// element.
pub fn struct_insert(target: &mut Json, label: impl Into<String>, value: Json) {
    let label = label.into();
    if matches!(**target, JsonValue::Struct(_)) {
        if let JsonValue::Struct(elems) = Rc::make_mut(target) {
            elems.push(StructElem { label, value });
        }
    } else {
        *target = Rc::new(JsonValue::Struct(vec![StructElem { label, value }]));
    }
}

/// Compares two JSON values under the engine's total order: first by tag
/// ordinal, then structurally.
///
/// Numbers compare as reals (NaN compares equal to everything, as neither
/// `<` nor `>` holds); strings byte-lexicographically; arrays element-wise
/// with shorter-is-less; structs element-wise in insertion order, label
/// before value, with shorter-is-less.
#[must_use]
pub fn compare(left: &JsonValue, right: &JsonValue) -> Ordering {
    let rank = left.tag_rank().cmp(&right.tag_rank());
    if rank != Ordering::Equal {
        return rank;
    }
    match (left, right) {
        (JsonValue::Real(a), JsonValue::Real(b)) => {
            if a < b {
                Ordering::Less
            } else if a > b {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        (JsonValue::Str(a), JsonValue::Str(b)) => a.as_bytes().cmp(b.as_bytes()),
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let c = compare(x, y);
                if c != Ordering::Equal {
                    return c;
                }
            }
            a.len().cmp(&b.len())
        }
        (JsonValue::Struct(a), JsonValue::Struct(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                let c = x.label.as_bytes().cmp(y.label.as_bytes());
                if c != Ordering::Equal {
                    return c;
                }
                let c = compare(&x.value, &y.value);
                if c != Ordering::Equal {
                    return c;
                }
            }
            a.len().cmp(&b.len())
        }
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(items: Vec<Json>) -> Json {
        Rc::new(JsonValue::Array(items))
    }

    fn obj(elems: Vec<(&str, Json)>) -> Json {
        Rc::new(JsonValue::Struct(
            elems
                .into_iter()
                .map(|(label, value)| StructElem {
                    label: label.to_string(),
                    value,
                })
                .collect(),
        ))
    }

    #[test]
    fn test_tag_order() {
        let values = [
            Rc::new(JsonValue::False),
            Rc::new(JsonValue::True),
            JsonValue::real(0.0),
            JsonValue::null(),
            JsonValue::string(""),
            arr(vec![]),
            obj(vec![]),
        ];
        for pair in values.windows(2) {
            assert_eq!(compare(&pair[0], &pair[1]), Ordering::Less);
        }
    }

    #[test]
    fn test_compare_numbers_and_strings() {
        assert_eq!(
            compare(&JsonValue::Real(1.0), &JsonValue::Real(2.0)),
            Ordering::Less
        );
        assert_eq!(
            compare(&JsonValue::Str("abc".into()), &JsonValue::Str("abd".into())),
            Ordering::Less
        );
        assert_eq!(
            compare(&JsonValue::Str("ab".into()), &JsonValue::Str("ab".into())),
            Ordering::Equal
        );
    }

    #[test]
    fn test_compare_arrays_shorter_is_less() {
        let a = arr(vec![JsonValue::real(1.0)]);
        let b = arr(vec![JsonValue::real(1.0), JsonValue::real(2.0)]);
        assert_eq!(compare(&a, &b), Ordering::Less);
        assert_eq!(compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_compare_structs_label_first() {
        let a = obj(vec![("a", JsonValue::real(9.0))]);
        let b = obj(vec![("b", JsonValue::real(1.0))]);
        assert_eq!(compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn test_truthiness() {
        assert!(JsonValue::True.is_truthy());
        assert!(!JsonValue::False.is_truthy());
        assert!(!JsonValue::Null.is_truthy());
        assert!(!JsonValue::Real(0.0).is_truthy());
        assert!(JsonValue::Real(0.5).is_truthy());
        assert!(!JsonValue::Str(String::new()).is_truthy());
        assert!(JsonValue::Str("0".into()).is_truthy());
        assert!(JsonValue::Array(vec![]).is_truthy());
        assert!(JsonValue::Struct(vec![]).is_truthy());
    }

    #[test]
    fn test_as_real() {
        assert_eq!(JsonValue::False.as_real(), Some(0.0));
        assert_eq!(JsonValue::True.as_real(), Some(1.0));
        assert_eq!(JsonValue::Real(2.5).as_real(), Some(2.5));
        assert_eq!(JsonValue::Str("42".into()).as_real(), Some(42.0));
        assert_eq!(JsonValue::Str(" 42".into()).as_real(), None);
        assert_eq!(JsonValue::Str("42x".into()).as_real(), None);
        assert_eq!(JsonValue::Null.as_real(), None);
        assert_eq!(JsonValue::Array(vec![]).as_real(), None);
    }

    #[test]
    fn test_property_first_match_wins() {
        let v = obj(vec![
            ("a", JsonValue::real(1.0)),
            ("a", JsonValue::real(2.0)),
        ]);
        assert_eq!(*v.property("a").unwrap(), JsonValue::Real(1.0));
        assert!(v.property("b").is_none());
    }

    #[test]
    fn test_struct_insert_copy_on_write() {
        let shared = obj(vec![("a", JsonValue::real(1.0))]);
        let mut edited = Rc::clone(&shared);
        struct_insert(&mut edited, "b", JsonValue::real(2.0));
        // The original is untouched; the clone re-shares the child value.
        assert!(shared.property("b").is_none());
        assert!(edited.property("b").is_some());
        assert!(Rc::ptr_eq(
            &shared.property("a").unwrap(),
            &edited.property("a").unwrap()
        ));
    }

    #[test]
    fn test_struct_insert_replaces_non_struct() {
        let mut v = JsonValue::string("scalar");
        struct_insert(&mut v, "k", JsonValue::real(1.0));
        assert!(v.property("k").is_some());
    }
}
