//! # docql-core
//!
//! An embedded query engine for collections of JSON documents. Collections
//! are declared with `CREATE COLLECTION`, populated with `INSERT`, and
//! queried or mutated with a SELECT / UPDATE / DELETE language whose
//! expressions traverse JSON structure and whose FROM clause composes
//! joins, subqueries, and array/object flattening.
//!
//! The engine is embedded into a host program; persistence is delegated to
//! a pluggable storage backend (the [`store::Store`] trait). The built-in
//! [`store::MemStore`] keeps everything in memory; the `docql-sqlite`
//! crate provides a SQLite-backed store.
//!
//! ## Example
//!
//! ```
//! use docql_core::{Connection, StepResult};
//!
//! let conn = Connection::in_memory();
//! for sql in [
//!     "CREATE COLLECTION t;",
//!     "INSERT INTO t VALUE {a:1};",
//!     "INSERT INTO t VALUE {a:2};",
//! ] {
//!     let (mut stmt, _) = conn.prepare(sql)?;
//!     while stmt.step()? == StepResult::Row {}
//! }
//!
//! let (mut stmt, _) = conn.prepare("SELECT t.a FROM t ORDER BY t.a DESC;")?;
//! let mut rows = Vec::new();
//! while stmt.step()? == StepResult::Row {
//!     rows.push(stmt.value().unwrap().to_string());
//! }
//! assert_eq!(rows, ["2", "1"]);
//! # Ok::<(), docql_core::Error>(())
//! ```

pub mod ast;
mod complete;
mod conn;
mod datasrc;
mod error;
mod eval;
mod exec;
mod func;
pub mod json;
pub mod lexer;
pub mod parser;
mod stmt;
pub mod store;
pub mod trace;
mod update;

pub use complete::complete;
pub use conn::{Connection, Context};
pub use error::{Error, Result, StepResult};
pub use json::{Json, JsonValue};
pub use parser::{ParseError, Parser};
pub use stmt::Statement;
pub use store::{MemStore, Scan, Store};
