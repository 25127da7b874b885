//! Statement-level AST types.

use super::{Expr, Query};

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `CREATE COLLECTION [IF NOT EXISTS] name`
    CreateCollection {
        /// The collection name.
        name: String,
        /// Whether IF NOT EXISTS was written.
        if_not_exists: bool,
    },

    /// `DROP COLLECTION [IF EXISTS] name`
    DropCollection {
        /// The collection name.
        name: String,
        /// Whether IF EXISTS was written.
        if_exists: bool,
    },

    /// `INSERT INTO name VALUE expr` or `INSERT INTO name SELECT …`
    Insert {
        /// The target collection.
        collection: String,
        /// The VALUE expression, for the literal form.
        value: Option<Expr>,
        /// The source query, for the SELECT form.
        query: Option<Query>,
    },

    /// `DELETE FROM name [WHERE expr]`
    Delete {
        /// The target collection.
        collection: String,
        /// The WHERE clause; absent deletes every document.
        where_clause: Option<Expr>,
    },

    /// `UPDATE name SET lvalue=expr, … [WHERE expr] [ELSE INSERT expr]`
    Update {
        /// The target collection.
        collection: String,
        /// `(lvalue, new value)` pairs, applied left to right.
        assignments: Vec<(Expr, Expr)>,
        /// The WHERE clause; absent updates every document.
        where_clause: Option<Expr>,
        /// The ELSE INSERT expression of the upsert form.
        upsert: Option<Expr>,
    },

    /// A SELECT statement.
    Select(Query),

    /// `PRAGMA name [(expr)]`
    Pragma {
        /// The pragma name.
        name: String,
        /// The parenthesized argument, if any.
        arg: Option<Expr>,
    },

    /// `BEGIN`
    Begin,
    /// `COMMIT`
    Commit,
    /// `ROLLBACK`
    Rollback,
}
