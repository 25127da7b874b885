//! Runtime iteration over FROM-clause terms: collection scan, comma-join,
//! subquery, and FLATTEN/EACH.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::ast::{DataSrc, FlattenArg};
use crate::error::{Error, Result, StepResult};
use crate::eval::{eval, Env, ScopeKind, ScopeNode};
use crate::exec::QueryExec;
use crate::json::{self, struct_insert, Json, JsonValue, StructElem};
use crate::store::Scan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinPhase {
    Fresh,
    Running,
    Eof,
}

/// Runtime state for one FROM-clause term.
///
/// Every `step` that returns `Row` leaves exactly one current document in
/// every leaf; `doc_named` and `composite` read those documents without
/// touching backend state.
pub enum SrcExec {
    /// A collection scan.
    Collection {
        /// The collection name.
        name: String,
        /// The AS label, if one was written; it replaces the collection
        /// name as the binding.
        alias: Option<String>,
        /// The open scan, populated lazily on the first step.
        scan: Option<Scan>,
        /// The current document.
        doc: Option<Json>,
    },
    /// A Cartesian product with the left side as the outer loop.
    Join {
        left: Box<SrcExec>,
        right: Box<SrcExec>,
        phase: JoinPhaseState,
    },
    /// A subquery term; the current document is the inner query's result
    /// document.
    Subquery {
        exec: Box<QueryExec>,
        alias: String,
        doc: Option<Json>,
    },
    /// FLATTEN/EACH over an inner source.
    Flatten {
        inner: Box<SrcExec>,
        args: Vec<FlattenArg>,
        /// Enhanced rows queued for the current inner row.
        queue: VecDeque<Json>,
        /// The current enhanced document.
        current: Option<Json>,
    },
}

/// Wrapper keeping the join phase private to this module.
pub struct JoinPhaseState(JoinPhase);

impl SrcExec {
    /// Builds the runtime tree for a bound FROM clause.
    #[must_use]
    pub fn new(ast: &DataSrc) -> Self {
        match ast {
            DataSrc::Collection { name, alias } => Self::Collection {
                name: name.clone(),
                alias: alias.clone(),
                scan: None,
                doc: None,
            },
            DataSrc::Join { left, right } => Self::Join {
                left: Box::new(Self::new(left)),
                right: Box::new(Self::new(right)),
                phase: JoinPhaseState(JoinPhase::Fresh),
            },
            DataSrc::Subquery { query, alias } => Self::Subquery {
                exec: Box::new(QueryExec::new(query)),
                alias: alias.clone(),
                doc: None,
            },
            DataSrc::Flatten { inner, args, .. } => Self::Flatten {
                inner: Box::new(Self::new(inner)),
                args: args.clone(),
                queue: VecDeque::new(),
                current: None,
            },
        }
    }

    /// Advances to the next row.
    pub fn step(&mut self, env: Env<'_>) -> Result<StepResult> {
        match self {
            Self::Collection {
                name, scan, doc, ..
            } => {
                if scan.is_none() {
                    *scan = Some(env.store.scan(name)?);
                }
                match scan.as_mut().and_then(Scan::next_row) {
                    Some((_, text)) => {
                        *doc = Some(json::parse(&text).ok_or(Error::MalformedJson)?);
                        Ok(StepResult::Row)
                    }
                    None => {
                        *doc = None;
                        Ok(StepResult::Done)
                    }
                }
            }

            Self::Join { left, right, phase } => {
                match phase.0 {
                    JoinPhase::Eof => return Ok(StepResult::Done),
                    JoinPhase::Fresh => {
                        phase.0 = JoinPhase::Running;
                        if left.step(env)? == StepResult::Done {
                            phase.0 = JoinPhase::Eof;
                            return Ok(StepResult::Done);
                        }
                    }
                    JoinPhase::Running => {}
                }
                loop {
                    if right.step(env)? == StepResult::Row {
                        return Ok(StepResult::Row);
                    }
                    if left.step(env)? == StepResult::Done {
                        phase.0 = JoinPhase::Eof;
                        return Ok(StepResult::Done);
                    }
                    right.rewind();
                }
            }

            Self::Subquery { exec, doc, .. } => match exec.step(env)? {
                StepResult::Row => {
                    *doc = Some(exec.doc(env, None)?);
                    Ok(StepResult::Row)
                }
                StepResult::Done => {
                    *doc = None;
                    Ok(StepResult::Done)
                }
            },

            Self::Flatten {
                inner,
                args,
                queue,
                current,
            } => loop {
                if let Some(doc) = queue.pop_front() {
                    *current = Some(doc);
                    return Ok(StepResult::Row);
                }
                if inner.step(env)? == StepResult::Done {
                    *current = None;
                    return Ok(StepResult::Done);
                }

                // Evaluate each flatten expression against the inner row.
                let expansions = {
                    let scope = ScopeNode {
                        kind: ScopeKind::Src(&**inner),
                        parent: env.scope,
                    };
                    let inner_env = Env {
                        scope: Some(&scope),
                        ..env
                    };
                    let mut expansions = Vec::with_capacity(args.len());
                    for arg in args.iter() {
                        let value = eval(&arg.expr, inner_env)?;
                        expansions.push(expand(&value));
                    }
                    expansions
                };

                let base = inner.composite();
                push_enhanced_rows(queue, &base, args, &expansions, 0);
            },
        }
    }

    /// Resets the source so that the next step produces the first row.
    pub fn rewind(&mut self) {
        match self {
            Self::Collection { scan, doc, .. } => {
                *scan = None;
                *doc = None;
            }
            Self::Join { left, right, phase } => {
                left.rewind();
                right.rewind();
                phase.0 = JoinPhase::Fresh;
            }
            Self::Subquery { exec, doc, .. } => {
                exec.rewind();
                *doc = None;
            }
            Self::Flatten {
                inner,
                queue,
                current,
                ..
            } => {
                inner.rewind();
                queue.clear();
                *current = None;
            }
        }
    }

    /// The document currently bound to `name`, if this subtree binds it.
    #[must_use]
    pub fn doc_named(&self, name: &str) -> Option<Json> {
        match self {
            Self::Collection {
                name: coll,
                alias,
                doc,
                ..
            } => {
                let binding = alias.as_deref().unwrap_or(coll);
                if binding == name {
                    Some(doc.clone().unwrap_or_else(JsonValue::null))
                } else {
                    None
                }
            }
            Self::Join { left, right, .. } => {
                left.doc_named(name).or_else(|| right.doc_named(name))
            }
            Self::Subquery { alias, doc, .. } => {
                if alias == name {
                    Some(doc.clone().unwrap_or_else(JsonValue::null))
                } else {
                    None
                }
            }
            Self::Flatten {
                inner,
                args,
                current,
                ..
            } => {
                if args.iter().any(|a| a.alias == name) {
                    let doc = current.clone().unwrap_or_else(JsonValue::null);
                    Some(doc.property(name).unwrap_or_else(JsonValue::null))
                } else {
                    inner.doc_named(name)
                }
            }
        }
    }

    /// The composite current document: the leaf value for a leaf, the
    /// leftmost leaf for a join, and the enhanced document for a flatten.
    #[must_use]
    pub fn composite(&self) -> Json {
        match self {
            Self::Collection { doc, .. } | Self::Subquery { doc, .. } => {
                doc.clone().unwrap_or_else(JsonValue::null)
            }
            Self::Join { left, .. } => left.composite(),
            Self::Flatten { current, .. } => current.clone().unwrap_or_else(JsonValue::null),
        }
    }

    /// The number of document-holding nodes in this subtree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Collection { .. } | Self::Subquery { .. } => 1,
            Self::Join { left, right, .. } => left.leaf_count() + right.leaf_count(),
            Self::Flatten { inner, .. } => inner.leaf_count() + 1,
        }
    }

    /// Snapshots every current document, in leaf order, into `out`.
    pub fn cache_save(&self, out: &mut Vec<Json>) {
        match self {
            Self::Collection { doc, .. } | Self::Subquery { doc, .. } => {
                out.push(doc.clone().unwrap_or_else(JsonValue::null));
            }
            Self::Join { left, right, .. } => {
                left.cache_save(out);
                right.cache_save(out);
            }
            Self::Flatten { inner, current, .. } => {
                inner.cache_save(out);
                out.push(current.clone().unwrap_or_else(JsonValue::null));
            }
        }
    }

    /// Reads the document bound to `name` from a snapshot produced by
    /// [`SrcExec::cache_save`].
    #[must_use]
    pub fn read_cached(&self, tuple: &[Json], name: &str) -> Option<Json> {
        let mut idx = 0;
        self.read_cached_inner(tuple, name, &mut idx)
    }

    fn read_cached_inner(&self, tuple: &[Json], name: &str, idx: &mut usize) -> Option<Json> {
        match self {
            Self::Collection {
                name: coll, alias, ..
            } => {
                let binding = alias.as_deref().unwrap_or(coll);
                let slot = *idx;
                *idx += 1;
                if binding == name {
                    tuple.get(slot).cloned()
                } else {
                    None
                }
            }
            Self::Subquery { alias, .. } => {
                let slot = *idx;
                *idx += 1;
                if alias == name {
                    tuple.get(slot).cloned()
                } else {
                    None
                }
            }
            Self::Join { left, right, .. } => left
                .read_cached_inner(tuple, name, idx)
                .or_else(|| right.read_cached_inner(tuple, name, idx)),
            Self::Flatten { inner, args, .. } => {
                if let Some(found) = inner.read_cached_inner(tuple, name, idx) {
                    return Some(found);
                }
                let slot = *idx;
                *idx += 1;
                if args.iter().any(|a| a.alias == name) {
                    tuple
                        .get(slot)
                        .map(|doc| doc.property(name).unwrap_or_else(JsonValue::null))
                } else {
                    None
                }
            }
        }
    }
}

/// Expands a flatten value into `(key, element)` pairs.
///
/// Arrays expand per element with the index as a number; structs expand per
/// field with the label as a string; empty containers and nulls expand to
/// nothing; any other scalar passes through as a single element with a
/// null key.
#[allow(clippy::cast_precision_loss)]
fn expand(value: &Json) -> Vec<(Json, Json)> {
    match &**value {
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (JsonValue::real(i as f64), Rc::clone(item)))
            .collect(),
        JsonValue::Struct(elems) => elems
            .iter()
            .map(|e| (JsonValue::string(e.label.clone()), Rc::clone(&e.value)))
            .collect(),
        JsonValue::Null => vec![],
        _ => vec![(JsonValue::null(), Rc::clone(value))],
    }
}

/// Queues one enhanced row per combination of expansion elements, first
/// argument outermost.
fn push_enhanced_rows(
    queue: &mut VecDeque<Json>,
    base: &Json,
    args: &[FlattenArg],
    expansions: &[Vec<(Json, Json)>],
    depth: usize,
) {
    if depth == args.len() {
        queue.push_back(Rc::clone(base));
        return;
    }
    for (key, value) in &expansions[depth] {
        let field = Rc::new(JsonValue::Struct(vec![
            StructElem {
                label: "k".to_string(),
                value: Rc::clone(key),
            },
            StructElem {
                label: "v".to_string(),
                value: Rc::clone(value),
            },
        ]));
        let mut doc = Rc::clone(base);
        struct_insert(&mut doc, args[depth].alias.clone(), field);
        push_enhanced_rows(queue, &doc, args, expansions, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_array() {
        let v = json::parse("[10,20]").unwrap();
        let pairs = expand(&v);
        assert_eq!(pairs.len(), 2);
        assert_eq!(*pairs[0].0, JsonValue::Real(0.0));
        assert_eq!(*pairs[1].1, JsonValue::Real(20.0));
    }

    #[test]
    fn test_expand_struct() {
        let v = json::parse(r#"{"a":1,"b":2}"#).unwrap();
        let pairs = expand(&v);
        assert_eq!(pairs.len(), 2);
        assert_eq!(*pairs[0].0, JsonValue::Str("a".into()));
    }

    #[test]
    fn test_expand_scalar_and_empty() {
        assert_eq!(expand(&JsonValue::string("x")).len(), 1);
        assert!(matches!(
            &*expand(&JsonValue::string("x"))[0].0,
            JsonValue::Null
        ));
        assert!(expand(&JsonValue::null()).is_empty());
        assert!(expand(&json::parse("[]").unwrap()).is_empty());
        assert!(expand(&json::parse("{}").unwrap()).is_empty());
    }
}
