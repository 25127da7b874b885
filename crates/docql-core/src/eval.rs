//! Expression evaluation and statement binding.
//!
//! Evaluation is a pure recursion from AST plus binding context to a fresh
//! JSON value. The binding walk runs once at prepare time: it validates
//! function names and arities and rewrites aggregate calls into slot
//! references on their owning query.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::{
    AggSpec, BinaryOp, Command, DataSrc, Expr, Query, SimpleQuery, UnaryOp,
};
use crate::datasrc::SrcExec;
use crate::error::{Error, Result, StepResult};
use crate::exec::{query_agg_value, query_doc_named, QueryCfg, QueryExec, RunState};
use crate::func::{lookup_aggregate, lookup_scalar};
use crate::json::{compare, Json, JsonValue, StructElem};
use crate::store::Store;

/// The statement-level document binding, active during UPDATE and DELETE
/// row scans.
pub struct StmtBinding<'a> {
    /// The collection being scanned; this name resolves to the whole
    /// current document.
    pub collection: &'a str,
    /// The current document.
    pub doc: Json,
}

/// What a scope-chain node resolves against.
pub enum ScopeKind<'a> {
    /// A simple query's bindings.
    Query {
        cfg: &'a QueryCfg,
        state: &'a RunState,
    },
    /// A bare data-source tree (used while evaluating flatten arguments).
    Src(&'a SrcExec),
}

/// One node of the lexical scope chain, innermost first.
pub struct ScopeNode<'a> {
    pub kind: ScopeKind<'a>,
    pub parent: Option<&'a ScopeNode<'a>>,
}

/// Evaluation context: the storage handle, the scope chain, and the
/// statement binding.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    /// Storage access, needed to run subqueries.
    pub store: &'a dyn Store,
    /// The innermost scope, or `None` outside any query.
    pub scope: Option<&'a ScopeNode<'a>>,
    /// The statement binding, or `None` outside UPDATE/DELETE scans.
    pub stmt: Option<&'a StmtBinding<'a>>,
}

impl<'a> Env<'a> {
    /// An environment with no bindings.
    #[must_use]
    pub fn new(store: &'a dyn Store) -> Self {
        Self {
            store,
            scope: None,
            stmt: None,
        }
    }
}

/// Resolves an identifier: the active query's bindings first, then
/// enclosing queries outward, then the statement binding; unresolved
/// identifiers are NULL.
fn resolve_ident(name: &str, env: Env<'_>) -> Json {
    let mut node = env.scope;
    while let Some(n) = node {
        let found = match &n.kind {
            ScopeKind::Query { cfg, state } => query_doc_named(cfg, state, name),
            ScopeKind::Src(src) => src.doc_named(name),
        };
        if let Some(doc) = found {
            return doc;
        }
        node = n.parent;
    }
    if let Some(stmt) = env.stmt {
        if name == stmt.collection {
            return Rc::clone(&stmt.doc);
        }
        return stmt.doc.property(name).unwrap_or_else(JsonValue::null);
    }
    JsonValue::null()
}

/// The finalized value of the aggregate in `slot` of the innermost
/// enclosing query.
fn aggregate_value(slot: usize, env: Env<'_>) -> Json {
    let mut node = env.scope;
    while let Some(n) = node {
        if let ScopeKind::Query { state, .. } = &n.kind {
            return query_agg_value(state, slot);
        }
        node = n.parent;
    }
    JsonValue::null()
}

/// Saturating 32-bit integer conversion, as used by the bitwise, shift,
/// and modulo operators.
#[allow(clippy::cast_possible_truncation)]
fn to_i32(value: &JsonValue) -> i32 {
    value.to_real_or_nan() as i32
}

/// True for values whose `+` means concatenation: strings, arrays, and
/// structs.
fn is_stringy(value: &JsonValue) -> bool {
    matches!(
        value,
        JsonValue::Str(_) | JsonValue::Array(_) | JsonValue::Struct(_)
    )
}

/// Evaluates an expression to a JSON value.
pub fn eval(expr: &Expr, env: Env<'_>) -> Result<Json> {
    match expr {
        Expr::Literal(value) => Ok(Rc::clone(value)),

        Expr::Ident(name) => Ok(resolve_ident(name, env)),

        Expr::Dot { base, label } => {
            let base = eval(base, env)?;
            Ok(base.property(label).unwrap_or_else(JsonValue::null))
        }

        // Subscripting a struct stringifies the key and reads that
        // property. Array and string subscripts are reserved and NULL.
        Expr::Index { base, key } => {
            let base = eval(base, env)?;
            let key = eval(key, env)?;
            match &*base {
                JsonValue::Struct(_) => {
                    let label = key.to_display_string();
                    Ok(base.property(&label).unwrap_or_else(JsonValue::null))
                }
                _ => Ok(JsonValue::null()),
            }
        }

        Expr::Unary { op, operand } => match op {
            UnaryOp::Neg => {
                let v = eval(operand, env)?;
                Ok(JsonValue::real(-v.to_real_or_nan()))
            }
            UnaryOp::Not => {
                let v = eval(operand, env)?;
                Ok(JsonValue::boolean(!v.is_truthy()))
            }
            UnaryOp::BitNot => {
                let v = eval(operand, env)?;
                Ok(JsonValue::real(f64::from(!to_i32(&v))))
            }
        },

        Expr::Binary { left, op, right } => eval_binary(left, *op, right, env),

        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => {
            if eval(test, env)?.is_truthy() {
                eval(if_true, env)
            } else {
                eval(if_false, env)
            }
        }

        Expr::Call { name, args } => {
            let func = lookup_scalar(name, args.len())
                .ok_or_else(|| Error::NoSuchFunction(name.clone()))?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, env)?);
            }
            Ok(func(&values))
        }

        Expr::Aggregate { slot, .. } => Ok(aggregate_value(*slot, env)),

        Expr::Subquery(query) => eval_subquery(query, env),

        // Parsed but unspecified operators evaluate to NULL.
        Expr::In { .. } | Expr::Between { .. } => Ok(JsonValue::null()),

        Expr::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, env)?);
            }
            Ok(Rc::new(JsonValue::Array(values)))
        }

        Expr::Struct(elems) => {
            let mut out = Vec::with_capacity(elems.len());
            for (label, value) in elems {
                out.push(StructElem {
                    label: label.clone(),
                    value: eval(value, env)?,
                });
            }
            Ok(Rc::new(JsonValue::Struct(out)))
        }
    }
}

fn eval_binary(left: &Expr, op: BinaryOp, right: &Expr, env: Env<'_>) -> Result<Json> {
    match op {
        // JavaScript-style value-returning logic: "x AND y" is
        // "x ? y : x"; "x OR y" is "x ? x : y".
        BinaryOp::And | BinaryOp::Or => {
            let l = eval(left, env)?;
            if l.is_truthy() == (op == BinaryOp::Or) {
                Ok(l)
            } else {
                eval(right, env)
            }
        }

        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::LtEq
        | BinaryOp::Gt
        | BinaryOp::GtEq => {
            let l = eval(left, env)?;
            let r = eval(right, env)?;
            let c = compare(&l, &r);
            let truth = match op {
                BinaryOp::Eq => c == Ordering::Equal,
                BinaryOp::NotEq => c != Ordering::Equal,
                BinaryOp::Lt => c == Ordering::Less,
                BinaryOp::LtEq => c != Ordering::Greater,
                BinaryOp::Gt => c == Ordering::Greater,
                BinaryOp::GtEq => c != Ordering::Less,
                _ => unreachable!(),
            };
            Ok(JsonValue::boolean(truth))
        }

        BinaryOp::Add => {
            let l = eval(left, env)?;
            let r = eval(right, env)?;
            if is_stringy(&l) || is_stringy(&r) {
                let mut out = String::new();
                l.append_string(&mut out);
                r.append_string(&mut out);
                Ok(JsonValue::string(out))
            } else {
                Ok(JsonValue::real(l.to_real_or_nan() + r.to_real_or_nan()))
            }
        }

        BinaryOp::Sub | BinaryOp::Mul => {
            let l = eval(left, env)?.to_real_or_nan();
            let r = eval(right, env)?.to_real_or_nan();
            Ok(JsonValue::real(match op {
                BinaryOp::Sub => l - r,
                _ => l * r,
            }))
        }

        // Division by zero yields NULL.
        BinaryOp::Div => {
            let l = eval(left, env)?.to_real_or_nan();
            let r = eval(right, env)?.to_real_or_nan();
            if r == 0.0 {
                Ok(JsonValue::null())
            } else {
                Ok(JsonValue::real(l / r))
            }
        }

        BinaryOp::Mod => {
            let l = to_i32(eval(left, env)?.as_ref());
            let r = to_i32(eval(right, env)?.as_ref());
            if r == 0 {
                Ok(JsonValue::null())
            } else {
                Ok(JsonValue::real(f64::from(l.wrapping_rem(r))))
            }
        }

        // Bitwise and shift operators work on 32-bit signed conversions
        // and return reals. Shift counts of 32 or more clamp: arithmetic
        // for right shift, zero for left shift.
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::LeftShift | BinaryOp::RightShift => {
            let l = to_i32(eval(left, env)?.as_ref());
            let r = to_i32(eval(right, env)?.as_ref());
            let result = match op {
                BinaryOp::BitAnd => l & r,
                BinaryOp::BitOr => l | r,
                BinaryOp::LeftShift => {
                    if r >= 32 {
                        0
                    } else if r < 0 {
                        l
                    } else {
                        l.wrapping_shl(r.unsigned_abs())
                    }
                }
                BinaryOp::RightShift => {
                    if r >= 32 {
                        if l < 0 {
                            -1
                        } else {
                            0
                        }
                    } else if r < 0 {
                        l
                    } else {
                        l.wrapping_shr(r.unsigned_abs())
                    }
                }
                _ => unreachable!(),
            };
            Ok(JsonValue::real(f64::from(result)))
        }

        // Parsed but unspecified operators evaluate to NULL.
        BinaryOp::Like | BinaryOp::NotLike | BinaryOp::Is | BinaryOp::IsNot => {
            Ok(JsonValue::null())
        }
    }
}

/// Runs a subquery used as an expression: NULL for zero rows, the result
/// document for one row, an error for more.
fn eval_subquery(query: &Query, env: Env<'_>) -> Result<Json> {
    let mut exec = QueryExec::new(query);
    if exec.step(env)? == StepResult::Done {
        return Ok(JsonValue::null());
    }
    let doc = exec.doc(env, None)?;
    if exec.step(env)? == StepResult::Row {
        return Err(Error::SubqueryNotScalar);
    }
    Ok(doc)
}

/// Evaluates an expression for truthiness; an absent expression is true.
pub fn eval_true(expr: Option<&Expr>, env: Env<'_>) -> Result<bool> {
    match expr {
        Some(expr) => Ok(eval(expr, env)?.is_truthy()),
        None => Ok(true),
    }
}

// --- Binding ---

struct BindCtx<'a> {
    /// The owning query's aggregate list, present where aggregate calls
    /// are legal.
    aggs: Option<&'a mut Vec<AggSpec>>,
}

/// Walks a parsed command once: validates every function call and collects
/// aggregate calls onto their owning query.
pub fn bind_command(cmd: &mut Command) -> Result<()> {
    match cmd {
        Command::Select(query) => bind_query(query),
        Command::Insert { value, query, .. } => {
            if let Some(value) = value {
                bind_expr(value, &mut BindCtx { aggs: None })?;
            }
            if let Some(query) = query {
                bind_query(query)?;
            }
            Ok(())
        }
        Command::Delete { where_clause, .. } => {
            bind_opt(where_clause.as_mut(), &mut BindCtx { aggs: None })
        }
        Command::Update {
            assignments,
            where_clause,
            upsert,
            ..
        } => {
            for (lvalue, value) in assignments.iter_mut() {
                bind_expr(lvalue, &mut BindCtx { aggs: None })?;
                bind_expr(value, &mut BindCtx { aggs: None })?;
            }
            bind_opt(where_clause.as_mut(), &mut BindCtx { aggs: None })?;
            bind_opt(upsert.as_mut(), &mut BindCtx { aggs: None })
        }
        Command::Pragma { arg, .. } => bind_opt(arg.as_mut(), &mut BindCtx { aggs: None }),
        _ => Ok(()),
    }
}

fn bind_opt(expr: Option<&mut Expr>, cx: &mut BindCtx<'_>) -> Result<()> {
    match expr {
        Some(expr) => bind_expr(expr, cx),
        None => Ok(()),
    }
}

fn bind_query(query: &mut Query) -> Result<()> {
    match query {
        Query::Compound { left, right, .. } => {
            bind_query(left)?;
            bind_query(right)
        }
        Query::Simple(sq) => bind_simple(sq),
    }
}

fn bind_simple(sq: &mut SimpleQuery) -> Result<()> {
    let mut aggs = std::mem::take(&mut sq.aggs);

    // Aggregates are legal in the result expression, HAVING, and ORDER BY.
    bind_opt(sq.result.as_mut(), &mut BindCtx { aggs: Some(&mut aggs) })?;
    bind_opt(sq.having.as_mut(), &mut BindCtx { aggs: Some(&mut aggs) })?;
    for item in &mut sq.order_by {
        bind_expr(&mut item.expr, &mut BindCtx { aggs: Some(&mut aggs) })?;
    }

    bind_opt(sq.where_clause.as_mut(), &mut BindCtx { aggs: None })?;
    for item in &mut sq.group_by {
        bind_expr(&mut item.expr, &mut BindCtx { aggs: None })?;
    }
    bind_opt(sq.limit.as_mut(), &mut BindCtx { aggs: None })?;
    bind_opt(sq.offset.as_mut(), &mut BindCtx { aggs: None })?;
    if let Some(from) = sq.from.as_mut() {
        bind_data_src(from)?;
    }

    sq.aggs = aggs;
    Ok(())
}

fn bind_data_src(src: &mut DataSrc) -> Result<()> {
    match src {
        DataSrc::Collection { .. } => Ok(()),
        DataSrc::Join { left, right } => {
            bind_data_src(left)?;
            bind_data_src(right)
        }
        DataSrc::Subquery { query, .. } => bind_query(query),
        DataSrc::Flatten { inner, args, .. } => {
            bind_data_src(inner)?;
            for arg in args {
                bind_expr(&mut arg.expr, &mut BindCtx { aggs: None })?;
            }
            Ok(())
        }
    }
}

fn bind_expr(expr: &mut Expr, cx: &mut BindCtx<'_>) -> Result<()> {
    match expr {
        Expr::Literal(_) | Expr::Ident(_) | Expr::Aggregate { .. } => Ok(()),

        Expr::Dot { base, .. } => bind_expr(base, cx),

        Expr::Index { base, key } => {
            bind_expr(base, cx)?;
            bind_expr(key, cx)
        }

        Expr::Unary { operand, .. } => bind_expr(operand, cx),

        Expr::Binary { left, right, .. } => {
            bind_expr(left, cx)?;
            bind_expr(right, cx)
        }

        Expr::Conditional {
            test,
            if_true,
            if_false,
        } => {
            bind_expr(test, cx)?;
            bind_expr(if_true, cx)?;
            bind_expr(if_false, cx)
        }

        Expr::Call { name, args } => {
            if let Some(func) = lookup_aggregate(name, args.len()) {
                let Some(list) = cx.aggs.as_deref_mut() else {
                    return Err(Error::MisuseOfAggregate);
                };
                // No nested aggregates inside aggregate arguments.
                for arg in args.iter_mut() {
                    bind_expr(arg, &mut BindCtx { aggs: None })?;
                }
                let slot = list.len();
                let args = std::mem::take(args);
                list.push(AggSpec {
                    func,
                    args: args.clone(),
                });
                *expr = Expr::Aggregate { func, args, slot };
                Ok(())
            } else if lookup_scalar(name, args.len()).is_some() {
                for arg in args.iter_mut() {
                    bind_expr(arg, cx)?;
                }
                Ok(())
            } else {
                Err(Error::NoSuchFunction(name.clone()))
            }
        }

        Expr::Subquery(query) => bind_query(query),

        Expr::In { expr, list, .. } => {
            bind_expr(expr, cx)?;
            for item in list {
                bind_expr(item, cx)?;
            }
            Ok(())
        }

        Expr::Between {
            expr, low, high, ..
        } => {
            bind_expr(expr, cx)?;
            bind_expr(low, cx)?;
            bind_expr(high, cx)
        }

        Expr::Array(items) => {
            for item in items {
                bind_expr(item, cx)?;
            }
            Ok(())
        }

        Expr::Struct(elems) => {
            for (_, value) in elems {
                bind_expr(value, cx)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::store::MemStore;

    fn eval_text(text: &str) -> Json {
        let mut cmd = Parser::new(&format!("SELECT {text};"))
            .parse_statement()
            .unwrap_or_else(|e| panic!("parse of {text:?} failed: {e}"));
        bind_command(&mut cmd).unwrap();
        let Command::Select(Query::Simple(sq)) = cmd else {
            panic!("expected simple select");
        };
        let store = MemStore::new();
        let env = Env::new(&store);
        eval(sq.result.as_ref().unwrap(), env).unwrap()
    }

    fn eval_real(text: &str) -> f64 {
        match &*eval_text(text) {
            JsonValue::Real(r) => *r,
            other => panic!("expected real from {text:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_real("1+2*3"), 7.0);
        assert_eq!(eval_real("7-2"), 5.0);
        assert_eq!(eval_real("10/4"), 2.5);
        assert_eq!(eval_real("7%3"), 1.0);
        assert_eq!(eval_real("-(3+4)"), -7.0);
    }

    #[test]
    fn test_division_by_zero_is_null() {
        assert_eq!(*eval_text("1/0"), JsonValue::Null);
        assert_eq!(*eval_text("5%0"), JsonValue::Null);
    }

    #[test]
    fn test_plus_concatenates_stringy_values() {
        assert_eq!(*eval_text(r#""a"+"b""#), JsonValue::Str("ab".into()));
        assert_eq!(*eval_text(r#""n="+4"#), JsonValue::Str("n=4".into()));
        assert_eq!(*eval_text("[1]+2"), JsonValue::Str("[1]2".into()));
    }

    #[test]
    fn test_numeric_coercion_failure_is_nan() {
        // null + 1 coerces null to NaN; NaN renders as null downstream.
        assert!(matches!(&*eval_text("null+1"), JsonValue::Real(r) if r.is_nan()));
    }

    #[test]
    fn test_comparisons_use_json_order() {
        assert_eq!(*eval_text("1<2"), JsonValue::True);
        assert_eq!(*eval_text(r#""a"<"b""#), JsonValue::True);
        // Every number sorts below every string in the tag order.
        assert_eq!(*eval_text(r#"99<"a""#), JsonValue::True);
        assert_eq!(*eval_text("1==1"), JsonValue::True);
        assert_eq!(*eval_text("1!=1"), JsonValue::False);
    }

    #[test]
    fn test_logic_returns_operand_values() {
        assert_eq!(*eval_text("1 && 2"), JsonValue::Real(2.0));
        assert_eq!(*eval_text("0 && 2"), JsonValue::Real(0.0));
        assert_eq!(*eval_text("0 || 3"), JsonValue::Real(3.0));
        assert_eq!(*eval_text(r#""x" || 3"#), JsonValue::Str("x".into()));
        assert_eq!(*eval_text("!0"), JsonValue::True);
        assert_eq!(*eval_text(r#"!"""#), JsonValue::True);
        assert_eq!(*eval_text(r#"!"x""#), JsonValue::False);
    }

    #[test]
    fn test_bitwise_and_shifts() {
        assert_eq!(eval_real("6&3"), 2.0);
        assert_eq!(eval_real("6|3"), 7.0);
        assert_eq!(eval_real("1<<4"), 16.0);
        assert_eq!(eval_real("256>>4"), 16.0);
        assert_eq!(eval_real("~0"), -1.0);
        // Shift counts of 32 or more clamp.
        assert_eq!(eval_real("1<<32"), 0.0);
        assert_eq!(eval_real("-8>>32"), -1.0);
        assert_eq!(eval_real("8>>32"), 0.0);
    }

    #[test]
    fn test_conditional() {
        assert_eq!(*eval_text("1 ? 2 : 3"), JsonValue::Real(2.0));
        assert_eq!(*eval_text("0 ? 2 : 3"), JsonValue::Real(3.0));
        // Division by zero in the unselected branch never evaluates.
        assert_eq!(*eval_text("1 ? 2 : 1/0"), JsonValue::Real(2.0));
    }

    #[test]
    fn test_dot_and_index_on_literals() {
        assert_eq!(*eval_text("{a:1,b:2}.b"), JsonValue::Real(2.0));
        assert_eq!(*eval_text("{a:1}.missing"), JsonValue::Null);
        assert_eq!(*eval_text(r#"{a:1}["a"]"#), JsonValue::Real(1.0));
        // Struct subscripts stringify the key.
        assert_eq!(*eval_text("{\"1\":5}[1]"), JsonValue::Real(5.0));
        // Array and string subscripts are reserved.
        assert_eq!(*eval_text("[1,2][0]"), JsonValue::Null);
    }

    #[test]
    fn test_scalar_function() {
        assert_eq!(eval_real(r#"length("abcd")"#), 4.0);
    }

    #[test]
    fn test_unknown_function_fails_at_bind() {
        let mut cmd = Parser::new("SELECT nosuch(1);").parse_statement().unwrap();
        match bind_command(&mut cmd) {
            Err(Error::NoSuchFunction(name)) => assert_eq!(name, "nosuch"),
            other => panic!("expected NoSuchFunction, got {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_in_where_is_rejected() {
        let mut cmd = Parser::new("SELECT t.a FROM t WHERE count()>0;")
            .parse_statement()
            .unwrap();
        assert!(matches!(
            bind_command(&mut cmd),
            Err(Error::MisuseOfAggregate)
        ));
    }

    #[test]
    fn test_aggregate_in_delete_is_rejected() {
        let mut cmd = Parser::new("DELETE FROM t WHERE count()>0;")
            .parse_statement()
            .unwrap();
        assert!(matches!(
            bind_command(&mut cmd),
            Err(Error::MisuseOfAggregate)
        ));
    }

    #[test]
    fn test_bind_collects_aggregates() {
        let mut cmd = Parser::new("SELECT count() FROM t GROUP BY t.a HAVING sum(t.a)>1;")
            .parse_statement()
            .unwrap();
        bind_command(&mut cmd).unwrap();
        let Command::Select(Query::Simple(sq)) = cmd else {
            panic!("expected simple select");
        };
        assert_eq!(sq.aggs.len(), 2);
        assert!(matches!(
            sq.result,
            Some(Expr::Aggregate { slot: 0, .. })
        ));
    }

    #[test]
    fn test_unspecified_operators_are_null() {
        assert_eq!(*eval_text(r#""abc" LIKE "a%""#), JsonValue::Null);
        assert_eq!(*eval_text("1 IN (1,2)"), JsonValue::Null);
        assert_eq!(*eval_text("2 BETWEEN 1 AND 3"), JsonValue::Null);
        assert_eq!(*eval_text("1 IS null"), JsonValue::Null);
    }
}
