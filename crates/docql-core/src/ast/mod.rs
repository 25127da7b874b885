//! Abstract syntax tree for the query language.
//!
//! Every node family is a closed sum type owned by the statement that parsed
//! it; dropping the statement frees the whole tree.

mod command;
mod expr;
mod query;

pub use command::Command;
pub use expr::{AggFunc, BinaryOp, Direction, Expr, ExprItem, UnaryOp};
pub use query::{AggSpec, CompoundOp, DataSrc, FlattenArg, Query, SimpleQuery};
