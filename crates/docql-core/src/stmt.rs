//! Prepared statements: parse, bind, step, rewind.

use tracing::debug;

use crate::ast::{Command, Query};
use crate::conn::Connection;
use crate::error::{Error, Result, StepResult};
use crate::eval::{bind_command, eval, eval_true, Env, StmtBinding};
use crate::exec::QueryExec;
use crate::json::{self, JsonValue};
use crate::parser::Parser;
use crate::trace;
use crate::update;

/// A prepared statement.
///
/// Created by [`Connection::prepare`]; holds the parsed command tree and
/// all execution state. Dropping the statement releases everything.
pub struct Statement<'conn> {
    conn: &'conn Connection,
    cmd: Option<Command>,
    exec: Option<QueryExec>,
    value: Option<String>,
    executed: bool,
}

impl<'conn> Statement<'conn> {
    /// Parses and binds at most one statement from `text`.
    ///
    /// Returns the statement and the byte offset of the first unconsumed
    /// character.
    pub(crate) fn new(conn: &'conn Connection, text: &str) -> Result<(Self, usize)> {
        let (mut cmd, consumed) = Parser::new(text).parse_one().map_err(Error::Parse)?;
        if let Some(cmd) = cmd.as_mut() {
            bind_command(cmd)?;
        }
        if conn.parser_trace() {
            if let Some(cmd) = cmd.as_ref() {
                eprintln!("{}", trace::command_listing(cmd));
            }
        }
        let exec = match cmd.as_ref() {
            Some(Command::Select(query)) => Some(QueryExec::new(query)),
            _ => None,
        };
        debug!(consumed, has_command = cmd.is_some(), "prepared statement");
        Ok((
            Self {
                conn,
                cmd,
                exec,
                value: None,
                executed: false,
            },
            consumed,
        ))
    }

    /// Executes the statement up to its next row or to completion.
    ///
    /// Errors are also recorded on the connection for
    /// [`Connection::last_error`].
    pub fn step(&mut self) -> Result<StepResult> {
        match self.step_inner() {
            Ok(r) => Ok(r),
            Err(e) => {
                self.conn.record_error(&e);
                Err(e)
            }
        }
    }

    fn step_inner(&mut self) -> Result<StepResult> {
        let Some(cmd) = self.cmd.as_ref() else {
            return Ok(StepResult::Done);
        };
        let store = self.conn.store();
        match cmd {
            Command::Select(_) => {
                let env = Env::new(store);
                let exec = self.exec.as_mut().ok_or(Error::Misuse)?;
                match exec.step(env)? {
                    StepResult::Row => {
                        let doc = exec.doc(env, None)?;
                        self.value = Some(json::to_text(&doc));
                        Ok(StepResult::Row)
                    }
                    StepResult::Done => Ok(StepResult::Done),
                }
            }

            Command::CreateCollection {
                name,
                if_not_exists,
            } => {
                if !self.executed {
                    self.executed = true;
                    debug!(collection = %name, "create collection");
                    store.create_collection(name, *if_not_exists)?;
                }
                Ok(StepResult::Done)
            }

            Command::DropCollection { name, if_exists } => {
                if !self.executed {
                    self.executed = true;
                    debug!(collection = %name, "drop collection");
                    store.drop_collection(name, *if_exists)?;
                }
                Ok(StepResult::Done)
            }

            Command::Insert {
                collection,
                value,
                query,
            } => {
                if self.executed {
                    return Ok(StepResult::Done);
                }
                self.executed = true;
                if query.is_some() {
                    return Err(Error::NotImplemented("INSERT INTO ... SELECT"));
                }
                let expr = value.as_ref().ok_or(Error::Misuse)?;
                let doc = eval(expr, Env::new(store))?;
                store.insert(collection, &json::to_text(&doc))?;
                Ok(StepResult::Done)
            }

            Command::Delete {
                collection,
                where_clause,
            } => {
                if self.executed {
                    return Ok(StepResult::Done);
                }
                self.executed = true;
                let mut scan = store.scan(collection)?;
                while let Some((rowid, text)) = scan.next_row() {
                    let doc = json::parse(&text).ok_or(Error::MalformedJson)?;
                    let binding = StmtBinding {
                        collection,
                        doc,
                    };
                    let env = Env {
                        store,
                        scope: None,
                        stmt: Some(&binding),
                    };
                    if eval_true(where_clause.as_ref(), env)? {
                        store.delete_row(collection, rowid)?;
                    }
                }
                Ok(StepResult::Done)
            }

            Command::Update {
                collection,
                assignments,
                where_clause,
                upsert,
            } => {
                if self.executed {
                    return Ok(StepResult::Done);
                }
                self.executed = true;
                update::execute(
                    store,
                    collection,
                    assignments,
                    where_clause.as_ref(),
                    upsert.as_ref(),
                )?;
                Ok(StepResult::Done)
            }

            Command::Pragma { name, arg } => {
                if self.executed {
                    return Ok(StepResult::Done);
                }
                self.executed = true;
                if name != "parser_trace" {
                    return Err(Error::NoSuchPragma(name.clone()));
                }
                match arg {
                    Some(expr) => {
                        let on = eval(expr, Env::new(store))?.is_truthy();
                        self.conn.set_parser_trace(on);
                        Ok(StepResult::Done)
                    }
                    None => {
                        let on = self.conn.parser_trace();
                        self.value = Some(json::to_text(&JsonValue::boolean(on)));
                        Ok(StepResult::Row)
                    }
                }
            }

            Command::Begin => {
                if !self.executed {
                    self.executed = true;
                    store.begin()?;
                }
                Ok(StepResult::Done)
            }
            Command::Commit => {
                if !self.executed {
                    self.executed = true;
                    store.commit()?;
                }
                Ok(StepResult::Done)
            }
            Command::Rollback => {
                if !self.executed {
                    self.executed = true;
                    store.rollback()?;
                }
                Ok(StepResult::Done)
            }
        }
    }

    /// The most recent result, as rendered JSON text.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Resets the statement to the start, preserving the parsed tree.
    pub fn rewind(&mut self) {
        if let Some(exec) = self.exec.as_mut() {
            exec.rewind();
        }
        self.executed = false;
        self.value = None;
    }

    /// True if this statement is a query that produces rows.
    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self.cmd, Some(Command::Select(_)))
    }

    /// The parsed query, if this statement is a SELECT.
    #[must_use]
    pub fn query(&self) -> Option<&Query> {
        match self.cmd.as_ref() {
            Some(Command::Select(query)) => Some(query),
            _ => None,
        }
    }

    /// An indented human-readable dump of the command tree.
    #[must_use]
    pub fn debug_listing(&self) -> String {
        self.cmd
            .as_ref()
            .map(trace::command_listing)
            .unwrap_or_default()
    }
}
