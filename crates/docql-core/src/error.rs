//! Error types for the query engine.

use thiserror::Error;

use crate::parser::ParseError;

/// Errors produced while preparing or stepping a statement.
#[derive(Debug, Error)]
pub enum Error {
    /// The statement text failed to parse.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// A function call named a function that does not exist.
    #[error("no such function: {0}")]
    NoSuchFunction(String),

    /// An aggregate function appeared where aggregates are not allowed.
    #[error("illegal use of aggregate function")]
    MisuseOfAggregate,

    /// A stored or literal document was not valid JSON.
    #[error("malformed JSON")]
    MalformedJson,

    /// A subquery used as an expression produced more than one row.
    #[error("subquery returned more than one row")]
    SubqueryNotScalar,

    /// An UPDATE SET target was not an assignable path.
    #[error("invalid SET target")]
    InvalidSetTarget,

    /// A PRAGMA named an unknown pragma.
    #[error("no such pragma: {0}")]
    NoSuchPragma(String),

    /// The operation is declared by the grammar but not implemented.
    #[error("{0} not yet implemented")]
    NotImplemented(&'static str),

    /// An error reported by the storage backend.
    #[error("storage error: {0}")]
    Storage(String),

    /// The statement was used in a way its current state does not allow.
    #[error("statement misuse")]
    Misuse,
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of stepping a statement or query: a row is available, or the
/// statement has run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// A row of output is available.
    Row,
    /// Execution is complete.
    Done,
}

impl StepResult {
    /// Returns true if this is `Row`.
    #[must_use]
    pub const fn is_row(&self) -> bool {
        matches!(self, Self::Row)
    }
}
