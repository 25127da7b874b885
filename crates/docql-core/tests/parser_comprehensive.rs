//! Comprehensive parser integration tests.
//!
//! Covers every statement form and operator of the query language.

use docql_core::ast::{
    BinaryOp, Command, CompoundOp, DataSrc, Direction, Expr, Query, SimpleQuery, UnaryOp,
};
use docql_core::json::JsonValue;
use docql_core::{ParseError, Parser};

// ===================================================================
// Helper functions
// ===================================================================

fn parse(text: &str) -> Command {
    Parser::new(text)
        .parse_statement()
        .unwrap_or_else(|e| panic!("failed to parse: {text}\nerror: {e}"))
}

fn parse_err(text: &str) -> ParseError {
    Parser::new(text)
        .parse_statement()
        .expect_err(&format!("expected parse error for: {text}"))
}

fn parse_select(text: &str) -> SimpleQuery {
    match parse(text) {
        Command::Select(Query::Simple(q)) => q,
        other => panic!("expected simple SELECT, got {other:?}"),
    }
}

fn result_expr(text: &str) -> Expr {
    parse_select(text).result.expect("result expression")
}

// ===================================================================
// 1. Statements
// ===================================================================

#[test]
fn test_all_statement_kinds_parse() {
    for text in [
        "CREATE COLLECTION abc;",
        "CREATE COLLECTION IF NOT EXISTS abc;",
        "DROP COLLECTION abc;",
        "DROP COLLECTION IF EXISTS abc;",
        "INSERT INTO abc VALUE {a:1};",
        "INSERT INTO abc SELECT x.a FROM x;",
        "DELETE FROM abc;",
        "DELETE FROM abc WHERE a==1;",
        "UPDATE abc SET a=1;",
        "UPDATE abc SET a=1, b=2 WHERE c==3 ELSE INSERT {a:1};",
        "SELECT x.a FROM x;",
        "BEGIN;",
        "COMMIT;",
        "ROLLBACK;",
        "PRAGMA parser_trace;",
        "PRAGMA parser_trace(1);",
    ] {
        parse(text);
    }
}

#[test]
fn test_statement_requires_terminator_or_eof() {
    parse("BEGIN");
    parse_err("BEGIN COMMIT;");
}

#[test]
fn test_garbage_statement_is_rejected() {
    parse_err("FETCH ALL;");
    parse_err("== 1;");
}

// ===================================================================
// 2. SELECT clause shapes
// ===================================================================

#[test]
fn test_minimal_select() {
    let q = parse_select("SELECT 1;");
    assert!(q.from.is_none());
    assert!(q.where_clause.is_none());
    assert!(!q.distinct);
}

#[test]
fn test_full_select_shape() {
    let q = parse_select(
        "SELECT DISTINCT t.a FROM t WHERE t.a>0 GROUP BY t.b DESC \
         HAVING count()>1 ORDER BY t.a ASCENDING, t.b DESCENDING \
         LIMIT 10 OFFSET 5;",
    );
    assert!(q.distinct);
    assert_eq!(q.group_by.len(), 1);
    assert_eq!(q.group_by[0].direction, Some(Direction::Descending));
    assert_eq!(q.order_by.len(), 2);
    assert_eq!(q.order_by[0].direction, Some(Direction::Ascending));
    assert_eq!(q.order_by[1].direction, Some(Direction::Descending));
    assert!(q.having.is_some());
    assert!(q.limit.is_some());
    assert!(q.offset.is_some());
}

#[test]
fn test_clause_order_is_fixed() {
    // WHERE cannot follow GROUP BY.
    parse_err("SELECT t.a FROM t GROUP BY t.a WHERE t.a==1;");
}

#[test]
fn test_long_spelling_keywords() {
    let q = parse_select("SELECT t.a FROM t ORDER BY t.a ASCENDING;");
    assert_eq!(q.order_by[0].direction, Some(Direction::Ascending));
    let q = parse_select("SELECT t.a FROM t ORDER BY t.a DESCENDING;");
    assert_eq!(q.order_by[0].direction, Some(Direction::Descending));
}

// ===================================================================
// 3. FROM terms
// ===================================================================

#[test]
fn test_collection_alias() {
    let q = parse_select("SELECT x.a FROM abc AS x;");
    assert_eq!(
        q.from.unwrap(),
        DataSrc::Collection {
            name: "abc".into(),
            alias: Some("x".into())
        }
    );
}

#[test]
fn test_nested_joins_and_flatten() {
    let q = parse_select("SELECT a.x FROM a, b EACH(b.list) AS e, c;");
    // ((a , b) EACH(...)) , c
    match q.from.unwrap() {
        DataSrc::Join { left, right } => {
            assert!(matches!(*right, DataSrc::Collection { ref name, .. } if name == "c"));
            assert!(matches!(*left, DataSrc::Flatten { .. }));
        }
        other => panic!("expected join, got {other:?}"),
    }
}

#[test]
fn test_flatten_multiple_arguments() {
    let q = parse_select("SELECT a.x FROM a FLATTEN(a.p AS p, a.q AS q);");
    match q.from.unwrap() {
        DataSrc::Flatten { args, .. } => {
            assert_eq!(args.len(), 2);
            assert_eq!(args[0].alias, "p");
            assert_eq!(args[1].alias, "q");
        }
        other => panic!("expected flatten, got {other:?}"),
    }
}

#[test]
fn test_subquery_source_nested() {
    let q = parse_select("SELECT s.a FROM (SELECT r.a FROM (SELECT t.a FROM t) AS r) AS s;");
    match q.from.unwrap() {
        DataSrc::Subquery { query, alias } => {
            assert_eq!(alias, "s");
            match *query {
                Query::Simple(inner) => {
                    assert!(matches!(inner.from, Some(DataSrc::Subquery { .. })));
                }
                Query::Compound { .. } => panic!("expected simple inner query"),
            }
        }
        other => panic!("expected subquery, got {other:?}"),
    }
}

// ===================================================================
// 4. Compound queries
// ===================================================================

#[test]
fn test_compound_is_left_associative() {
    match parse("SELECT a.x FROM a UNION SELECT b.x FROM b EXCEPT SELECT c.x FROM c;") {
        Command::Select(Query::Compound { op, left, .. }) => {
            assert_eq!(op, CompoundOp::Except);
            assert!(matches!(
                *left,
                Query::Compound {
                    op: CompoundOp::Union,
                    ..
                }
            ));
        }
        other => panic!("expected compound, got {other:?}"),
    }
}

#[test]
fn test_union_all_vs_union() {
    match parse("SELECT a.x FROM a UNION ALL SELECT b.x FROM b;") {
        Command::Select(Query::Compound { op, .. }) => assert_eq!(op, CompoundOp::UnionAll),
        other => panic!("expected compound, got {other:?}"),
    }
    match parse("SELECT a.x FROM a INTERSECT SELECT b.x FROM b;") {
        Command::Select(Query::Compound { op, .. }) => assert_eq!(op, CompoundOp::Intersect),
        other => panic!("expected compound, got {other:?}"),
    }
}

// ===================================================================
// 5. Operator precedence and associativity
// ===================================================================

fn binary_op(expr: &Expr) -> BinaryOp {
    match expr {
        Expr::Binary { op, .. } => *op,
        other => panic!("expected binary expression, got {other:?}"),
    }
}

#[test]
fn test_or_is_loosest() {
    assert_eq!(binary_op(&result_expr("SELECT 1 && 2 || 3;")), BinaryOp::Or);
    assert_eq!(
        binary_op(&result_expr("SELECT 1 OR 2 AND 3;")),
        BinaryOp::Or
    );
}

#[test]
fn test_comparison_over_bitwise() {
    // a == b | c parses as a == (b | c).
    let expr = result_expr("SELECT 1 == 2 | 3;");
    assert_eq!(binary_op(&expr), BinaryOp::Eq);
    if let Expr::Binary { right, .. } = expr {
        assert_eq!(binary_op(&right), BinaryOp::BitOr);
    }
}

#[test]
fn test_bitand_over_bitor() {
    let expr = result_expr("SELECT 1 | 2 & 3;");
    assert_eq!(binary_op(&expr), BinaryOp::BitOr);
}

#[test]
fn test_shift_over_additive_over_multiplicative() {
    let expr = result_expr("SELECT 1 << 2 + 3 * 4;");
    assert_eq!(binary_op(&expr), BinaryOp::LeftShift);
    if let Expr::Binary { right, .. } = expr {
        assert_eq!(binary_op(&right), BinaryOp::Add);
    }
}

#[test]
fn test_left_associative_subtraction() {
    // 10 - 2 - 3 parses as (10 - 2) - 3.
    let expr = result_expr("SELECT 10 - 2 - 3;");
    assert_eq!(binary_op(&expr), BinaryOp::Sub);
    if let Expr::Binary { left, .. } = expr {
        assert_eq!(binary_op(&left), BinaryOp::Sub);
    }
}

#[test]
fn test_unary_operators() {
    assert!(matches!(
        result_expr("SELECT !t.a FROM t;"),
        Expr::Unary {
            op: UnaryOp::Not,
            ..
        }
    ));
    assert!(matches!(
        result_expr("SELECT ~5;"),
        Expr::Unary {
            op: UnaryOp::BitNot,
            ..
        }
    ));
    assert!(matches!(
        result_expr("SELECT -t.a FROM t;"),
        Expr::Unary {
            op: UnaryOp::Neg,
            ..
        }
    ));
}

#[test]
fn test_negative_literal_folds() {
    assert!(matches!(
        result_expr("SELECT -5;"),
        Expr::Literal(v) if *v == JsonValue::Real(-5.0)
    ));
}

#[test]
fn test_not_binds_looser_than_comparison() {
    // NOT a == b parses as NOT (a == b).
    match result_expr("SELECT NOT 1 == 2;") {
        Expr::Unary {
            op: UnaryOp::Not,
            operand,
        } => assert_eq!(binary_op(&operand), BinaryOp::Eq),
        other => panic!("expected NOT, got {other:?}"),
    }
}

#[test]
fn test_paren_overrides_precedence() {
    let expr = result_expr("SELECT (1 + 2) * 3;");
    assert_eq!(binary_op(&expr), BinaryOp::Mul);
}

#[test]
fn test_keyword_and_symbol_logic_are_equivalent() {
    assert_eq!(binary_op(&result_expr("SELECT 1 AND 2;")), BinaryOp::And);
    assert_eq!(binary_op(&result_expr("SELECT 1 && 2;")), BinaryOp::And);
    assert_eq!(binary_op(&result_expr("SELECT 1 OR 2;")), BinaryOp::Or);
    assert_eq!(binary_op(&result_expr("SELECT 1 || 2;")), BinaryOp::Or);
}

#[test]
fn test_comparison_operators() {
    for (text, op) in [
        ("SELECT 1 == 2;", BinaryOp::Eq),
        ("SELECT 1 != 2;", BinaryOp::NotEq),
        ("SELECT 1 <> 2;", BinaryOp::NotEq),
        ("SELECT 1 < 2;", BinaryOp::Lt),
        ("SELECT 1 <= 2;", BinaryOp::LtEq),
        ("SELECT 1 > 2;", BinaryOp::Gt),
        ("SELECT 1 >= 2;", BinaryOp::GtEq),
    ] {
        assert_eq!(binary_op(&result_expr(text)), op, "for {text}");
    }
}

// ===================================================================
// 6. Postfix operators and literals
// ===================================================================

#[test]
fn test_deep_postfix_chain() {
    let expr = result_expr(r#"SELECT t.a.b.c[0]["d"] FROM t;"#);
    // Outermost is the ["d"] subscript.
    assert!(matches!(expr, Expr::Index { .. }));
}

#[test]
fn test_literals() {
    assert!(matches!(
        result_expr("SELECT 3.25;"),
        Expr::Literal(v) if *v == JsonValue::Real(3.25)
    ));
    assert!(matches!(
        result_expr("SELECT TRUE;"),
        Expr::Literal(v) if *v == JsonValue::True
    ));
    assert!(matches!(
        result_expr("SELECT FALSE;"),
        Expr::Literal(v) if *v == JsonValue::False
    ));
    assert!(matches!(
        result_expr("SELECT NULL;"),
        Expr::Literal(v) if *v == JsonValue::Null
    ));
    assert!(matches!(
        result_expr(r#"SELECT "it""s";"#),
        Expr::Literal(v) if *v == JsonValue::Str("it\"s".into())
    ));
}

#[test]
fn test_json_literals_fold_eagerly() {
    match result_expr(r#"SELECT {a:[1,2,{b:"x"}], c:NULL};"#) {
        Expr::Literal(v) => {
            assert!(v.property("a").is_some());
            assert_eq!(*v.property("c").unwrap(), JsonValue::Null);
        }
        other => panic!("expected folded literal, got {other:?}"),
    }
}

#[test]
fn test_string_labels_in_constructors() {
    match result_expr(r#"SELECT {"odd label": 1};"#) {
        Expr::Literal(v) => assert!(v.property("odd label").is_some()),
        other => panic!("expected folded literal, got {other:?}"),
    }
}

#[test]
fn test_function_calls() {
    match result_expr(r#"SELECT length("abc");"#) {
        Expr::Call { name, args } => {
            assert_eq!(name, "length");
            assert_eq!(args.len(), 1);
        }
        other => panic!("expected call, got {other:?}"),
    }
    // Zero-argument calls parse too.
    assert!(matches!(
        result_expr("SELECT count() FROM t;"),
        // Not yet bound: still a plain call at parse time.
        Expr::Call { .. }
    ));
}

#[test]
fn test_reserved_operator_forms_parse() {
    assert!(matches!(
        result_expr("SELECT t.a IS NOT NULL FROM t;"),
        Expr::Binary {
            op: BinaryOp::IsNot,
            ..
        }
    ));
    assert!(matches!(
        result_expr(r#"SELECT t.a LIKE "x%" FROM t;"#),
        Expr::Binary {
            op: BinaryOp::Like,
            ..
        }
    ));
    assert!(matches!(
        result_expr(r#"SELECT t.a NOT LIKE "x%" FROM t;"#),
        Expr::Binary {
            op: BinaryOp::NotLike,
            ..
        }
    ));
    assert!(matches!(
        result_expr("SELECT t.a NOT IN (1,2,3) FROM t;"),
        Expr::In { negated: true, .. }
    ));
    assert!(matches!(
        result_expr("SELECT t.a BETWEEN 1 AND 9 FROM t;"),
        Expr::Between { negated: false, .. }
    ));
}

#[test]
fn test_glob_folds_to_like() {
    assert!(matches!(
        result_expr(r#"SELECT t.a GLOB "x*" FROM t;"#),
        Expr::Binary {
            op: BinaryOp::Like,
            ..
        }
    ));
}

// ===================================================================
// 7. Errors
// ===================================================================

#[test]
fn test_error_spans_point_at_offender() {
    let err = parse_err("SELECT @;");
    assert_eq!(err.span.start, 7);
}

#[test]
fn test_unterminated_string_is_unrecognized() {
    let err = parse_err("SELECT \"abc;");
    assert!(err.message.starts_with("unrecognized token"));
}

#[test]
fn test_missing_paren_is_reported() {
    parse_err("SELECT length(1 FROM t;");
    parse_err("SELECT (1 + 2 FROM t;");
}

#[test]
fn test_lowercase_keywords_are_identifiers() {
    // "select" is an identifier, so this is not a statement.
    parse_err("select t.a FROM t;");
}
