//! The UPDATE executor and the field-revision primitive.

use std::rc::Rc;

use tracing::debug;

use crate::ast::Expr;
use crate::error::{Error, Result};
use crate::eval::{eval, eval_true, Env, StmtBinding};
use crate::json::{self, Json, JsonValue, StructElem};
use crate::store::Store;

/// Runs an UPDATE: scan the collection, revise matching documents in
/// place, and fall back to the ELSE INSERT document when nothing matched.
///
/// The upsert form runs inside a backend transaction.
pub(crate) fn execute(
    store: &dyn Store,
    collection: &str,
    assignments: &[(Expr, Expr)],
    where_clause: Option<&Expr>,
    upsert: Option<&Expr>,
) -> Result<()> {
    if upsert.is_some() {
        store.begin()?;
    }
    let result = run(store, collection, assignments, where_clause, upsert);
    if upsert.is_some() {
        if result.is_ok() {
            store.commit()?;
        } else {
            let _ = store.rollback();
        }
    }
    result
}

fn run(
    store: &dyn Store,
    collection: &str,
    assignments: &[(Expr, Expr)],
    where_clause: Option<&Expr>,
    upsert: Option<&Expr>,
) -> Result<()> {
    let mut n_updated = 0u64;
    let mut scan = store.scan(collection)?;
    while let Some((rowid, text)) = scan.next_row() {
        let doc = json::parse(&text).ok_or(Error::MalformedJson)?;
        let binding = StmtBinding {
            collection,
            doc: Rc::clone(&doc),
        };
        let env = Env {
            store,
            scope: None,
            stmt: Some(&binding),
        };
        if !eval_true(where_clause, env)? {
            continue;
        }

        // Every SET expression sees the document as it was before this
        // row's revisions.
        let mut revised = doc;
        for (lvalue, expr) in assignments {
            let value = eval(expr, env)?;
            let path = lvalue_path(lvalue, collection, env)?;
            revised = revise_one_field(revised, &path, value);
        }
        store.update_row(collection, rowid, &json::to_text(&revised))?;
        n_updated += 1;
    }
    debug!(collection = %collection, n_updated, "update pass complete");

    if let Some(expr) = upsert {
        if n_updated == 0 {
            let doc = eval(expr, Env::new(store))?;
            store.insert(collection, &json::to_text(&doc))?;
        }
    }
    Ok(())
}

/// Resolves a SET target into a path of struct labels.
///
/// The root identifier addresses the whole document when it names the
/// scanned collection, and a top-level field otherwise. Subscript keys are
/// evaluated and stringified. Any other shape is an error.
fn lvalue_path(lvalue: &Expr, collection: &str, env: Env<'_>) -> Result<Vec<String>> {
    match lvalue {
        Expr::Ident(name) => {
            if name == collection {
                Ok(vec![])
            } else {
                Ok(vec![name.clone()])
            }
        }
        Expr::Dot { base, label } => {
            let mut path = lvalue_path(base, collection, env)?;
            path.push(label.clone());
            Ok(path)
        }
        Expr::Index { base, key } => {
            let mut path = lvalue_path(base, collection, env)?;
            path.push(eval(key, env)?.to_display_string());
            Ok(path)
        }
        _ => Err(Error::InvalidSetTarget),
    }
}

/// Applies one field revision, creating missing struct components along
/// the path. An empty path replaces the whole document.
fn revise_one_field(doc: Json, path: &[String], value: Json) -> Json {
    let mut doc = doc;
    set_path(&mut doc, path, value);
    doc
}

fn set_path(target: &mut Json, path: &[String], value: Json) {
    let Some((label, rest)) = path.split_first() else {
        *target = value;
        return;
    };
    if !matches!(**target, JsonValue::Struct(_)) {
        *target = Rc::new(JsonValue::Struct(vec![]));
    }
    let JsonValue::Struct(elems) = Rc::make_mut(target) else {
        return;
    };
    if let Some(elem) = elems.iter_mut().find(|e| e.label == *label) {
        set_path(&mut elem.value, rest, value);
    } else {
        elems.push(StructElem {
            label: label.clone(),
            value: nest(rest, value),
        });
    }
}

/// Builds the nested structs for the missing tail of a path.
fn nest(path: &[String], value: Json) -> Json {
    path.iter().rev().fold(value, |inner, label| {
        Rc::new(JsonValue::Struct(vec![StructElem {
            label: label.clone(),
            value: inner,
        }]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Json {
        json::parse(text).unwrap()
    }

    fn rendered(value: &Json) -> String {
        json::to_text(value)
    }

    #[test]
    fn test_set_existing_field() {
        let d = doc(r#"{"a":1,"b":2}"#);
        let out = revise_one_field(d, &["a".into()], JsonValue::real(9.0));
        assert_eq!(rendered(&out), r#"{"a":9,"b":2}"#);
    }

    #[test]
    fn test_set_creates_missing_path() {
        let d = doc(r#"{"a":1}"#);
        let out = revise_one_field(
            d,
            &["b".into(), "c".into()],
            JsonValue::real(3.0),
        );
        assert_eq!(rendered(&out), r#"{"a":1,"b":{"c":3}}"#);
    }

    #[test]
    fn test_set_through_scalar_replaces_it() {
        let d = doc(r#"{"a":5}"#);
        let out = revise_one_field(
            d,
            &["a".into(), "b".into()],
            JsonValue::real(1.0),
        );
        assert_eq!(rendered(&out), r#"{"a":{"b":1}}"#);
    }

    #[test]
    fn test_empty_path_replaces_document() {
        let d = doc(r#"{"a":1}"#);
        let out = revise_one_field(d, &[], JsonValue::real(7.0));
        assert_eq!(rendered(&out), "7");
    }

    #[test]
    fn test_revision_does_not_disturb_shared_reference() {
        let original = doc(r#"{"a":1,"b":{"c":2}}"#);
        let out = revise_one_field(Rc::clone(&original), &["a".into()], JsonValue::real(9.0));
        assert_eq!(rendered(&original), r#"{"a":1,"b":{"c":2}}"#);
        assert_eq!(rendered(&out), r#"{"a":9,"b":{"c":2}}"#);
        // The untouched subtree is shared, not copied.
        assert!(Rc::ptr_eq(
            &original.property("b").unwrap(),
            &out.property("b").unwrap()
        ));
    }
}
