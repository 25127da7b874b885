//! Expression AST types.

use crate::json::Json;

use super::Query;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical (JavaScript-style value-returning)
    And,
    Or,

    // Bitwise
    BitAnd,
    BitOr,
    LeftShift,
    RightShift,

    // Parsed but evaluating to NULL
    Like,
    NotLike,
    Is,
    IsNot,
}

impl BinaryOp {
    /// The operator as written in the language.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::LeftShift => "<<",
            Self::RightShift => ">>",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation (`-`).
    Neg,
    /// Truthiness negation (`!` or `NOT`).
    Not,
    /// Bitwise complement (`~`).
    BitNot,
}

impl UnaryOp {
    /// The operator as written in the language.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
            Self::BitNot => "~",
        }
    }
}

/// Built-in aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    /// The function name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// Sort direction for ORDER BY and GROUP BY items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// One item of an expression list: the expression plus the AS-or-direction
/// slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprItem {
    /// The expression.
    pub expr: Expr,
    /// AS label, if one was written.
    pub alias: Option<String>,
    /// ASC/DESC direction, if one was written.
    pub direction: Option<Direction>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A JSON literal, parsed eagerly at parse time.
    Literal(Json),

    /// An identifier naming a document binding.
    Ident(String),

    /// Property access `base.label`.
    Dot {
        /// The base expression.
        base: Box<Expr>,
        /// The property label.
        label: String,
    },

    /// Subscript `base[key]`.
    Index {
        /// The base expression.
        base: Box<Expr>,
        /// The key expression.
        key: Box<Expr>,
    },

    /// A unary expression.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },

    /// A binary expression.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
    },

    /// The conditional `test ? if_true : if_false`.
    Conditional {
        /// The test expression.
        test: Box<Expr>,
        /// Evaluated when the test is truthy.
        if_true: Box<Expr>,
        /// Evaluated when the test is falsy.
        if_false: Box<Expr>,
    },

    /// A scalar function call.
    Call {
        /// The function name.
        name: String,
        /// Arguments, evaluated left to right.
        args: Vec<Expr>,
    },

    /// An aggregate function call, rewritten from `Call` at bind time.
    Aggregate {
        /// The aggregate function.
        func: AggFunc,
        /// Arguments, evaluated per accumulated row.
        args: Vec<Expr>,
        /// Index of this aggregate's accumulator in its owning query.
        slot: usize,
    },

    /// A subquery used as an expression.
    Subquery(Box<Query>),

    /// `expr [NOT] IN (list)`.
    In {
        /// The tested expression.
        expr: Box<Expr>,
        /// The candidate list.
        list: Vec<Expr>,
        /// Whether NOT was written.
        negated: bool,
    },

    /// `expr [NOT] BETWEEN low AND high`.
    Between {
        /// The tested expression.
        expr: Box<Expr>,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
        /// Whether NOT was written.
        negated: bool,
    },

    /// An array constructor `[e1, e2, …]`.
    Array(Vec<Expr>),

    /// A struct constructor `{label: e1, …}`.
    Struct(Vec<(String, Expr)>),
}
