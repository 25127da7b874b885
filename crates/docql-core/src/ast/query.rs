//! Query and FROM-clause AST types.

use crate::lexer::FlattenOp;

use super::{AggFunc, Expr, ExprItem};

/// A compound-query operator.
///
/// Execution runs the left branch to completion and then the right; no
/// de-duplication or subtraction is performed (UNION ALL baseline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundOp {
    Union,
    UnionAll,
    Except,
    Intersect,
}

impl CompoundOp {
    /// The operator as written.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::UnionAll => "UNION ALL",
            Self::Except => "EXCEPT",
            Self::Intersect => "INTERSECT",
        }
    }
}

/// An aggregate call collected from a simple query at bind time: the
/// function plus clones of its argument expressions, indexed by slot.
#[derive(Debug, Clone, PartialEq)]
pub struct AggSpec {
    /// The aggregate function.
    pub func: AggFunc,
    /// The argument expressions.
    pub args: Vec<Expr>,
}

/// A simple (non-compound) SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleQuery {
    /// Whether DISTINCT was specified.
    pub distinct: bool,
    /// The result expression; absent means the composite current document.
    pub result: Option<Expr>,
    /// The FROM clause; absent yields exactly one row.
    pub from: Option<DataSrc>,
    /// The WHERE clause; absent is treated as true.
    pub where_clause: Option<Expr>,
    /// GROUP BY keys with optional per-key direction.
    pub group_by: Vec<ExprItem>,
    /// The HAVING clause, filtered after aggregate finalization.
    pub having: Option<Expr>,
    /// ORDER BY keys with optional per-key direction.
    pub order_by: Vec<ExprItem>,
    /// The LIMIT expression, evaluated once on the first step.
    pub limit: Option<Expr>,
    /// The OFFSET expression, evaluated once on the first step.
    pub offset: Option<Expr>,
    /// Aggregate calls found in this query's result/HAVING/ORDER BY,
    /// collected at bind time.
    pub aggs: Vec<AggSpec>,
}

/// A query: a simple SELECT or a compound of two queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// A simple SELECT.
    Simple(SimpleQuery),
    /// A compound query.
    Compound {
        /// The compound operator.
        op: CompoundOp,
        /// The left branch.
        left: Box<Query>,
        /// The right branch.
        right: Box<Query>,
    },
}

/// One flatten argument: the expression whose value is expanded and the
/// name of the enhanced field, resolved at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenArg {
    /// The expression evaluated against each inner row.
    pub expr: Expr,
    /// The field name the enhanced `{"k":…, "v":…}` value is stored under.
    pub alias: String,
}

/// A term of the FROM clause.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSrc {
    /// A named collection scan.
    Collection {
        /// The collection name.
        name: String,
        /// The AS label, if one was written.
        alias: Option<String>,
    },
    /// A comma-join: the Cartesian product with the left side as the outer
    /// loop.
    Join {
        /// The outer side.
        left: Box<DataSrc>,
        /// The inner side.
        right: Box<DataSrc>,
    },
    /// A parenthesized subquery.
    Subquery {
        /// The inner query.
        query: Box<Query>,
        /// The AS label.
        alias: String,
    },
    /// `inner FLATTEN(args)` or `inner EACH(args)`.
    Flatten {
        /// The wrapped source.
        inner: Box<DataSrc>,
        /// Which operator name the user wrote.
        op: FlattenOp,
        /// The flatten expressions with their field names.
        args: Vec<FlattenArg>,
    },
}
