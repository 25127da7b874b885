//! Execution context and database connections.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::stmt::Statement;
use crate::store::{MemStore, Store};

/// Callback receiving error messages routed to a context.
pub type LogFn = Box<dyn Fn(&str)>;

/// A process-level execution context.
///
/// Holds the configurable error-log sink shared by the connections opened
/// under it.
#[derive(Default)]
pub struct Context {
    log: RefCell<Option<LogFn>>,
}

impl Context {
    /// Creates a context with no log sink.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Installs the error-log callback.
    pub fn set_log(&self, f: impl Fn(&str) + 'static) {
        *self.log.borrow_mut() = Some(Box::new(f));
    }

    fn log(&self, message: &str) {
        if let Some(f) = self.log.borrow().as_ref() {
            f(message);
        }
    }
}

/// An open database connection: one storage backend plus the statements
/// prepared against it.
pub struct Connection {
    store: Box<dyn Store>,
    context: Option<Rc<Context>>,
    last_error: RefCell<Option<String>>,
    parser_trace: Cell<bool>,
}

impl Connection {
    /// Opens a connection over the given storage backend.
    #[must_use]
    pub fn new(store: Box<dyn Store>) -> Self {
        Self {
            store,
            context: None,
            last_error: RefCell::new(None),
            parser_trace: Cell::new(false),
        }
    }

    /// Opens a connection over the given backend under a context.
    #[must_use]
    pub fn with_context(store: Box<dyn Store>, context: Rc<Context>) -> Self {
        Self {
            context: Some(context),
            ..Self::new(store)
        }
    }

    /// Opens a connection with no persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemStore::new()))
    }

    /// Parses and binds at most one statement from `text`.
    ///
    /// Returns the prepared statement and the byte offset of the first
    /// unconsumed character, for callers feeding multi-statement input.
    pub fn prepare<'conn>(&'conn self, text: &str) -> Result<(Statement<'conn>, usize)> {
        match Statement::new(self, text) {
            Ok(prepared) => Ok(prepared),
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// The message of the most recent error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Enables or disables the parser trace dump emitted at prepare time.
    pub fn set_parser_trace(&self, on: bool) {
        self.parser_trace.set(on);
    }

    /// Whether the parser trace dump is enabled.
    #[must_use]
    pub fn parser_trace(&self) -> bool {
        self.parser_trace.get()
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub(crate) fn record_error(&self, e: &Error) {
        let message = e.to_string();
        debug!(error = %message, "statement error");
        if let Some(context) = self.context.as_ref() {
            context.log(&message);
        }
        *self.last_error.borrow_mut() = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn test_last_error_is_recorded() {
        let conn = Connection::in_memory();
        assert!(conn.last_error().is_none());
        assert!(conn.prepare("SELECT 12abc;").is_err());
        let msg = conn.last_error().unwrap();
        assert!(msg.contains("unrecognized token"), "got: {msg}");
    }

    #[test]
    fn test_context_log_sink_receives_errors() {
        let seen: Rc<StdRefCell<Vec<String>>> = Rc::new(StdRefCell::new(Vec::new()));
        let context = Context::new();
        let sink = Rc::clone(&seen);
        context.set_log(move |msg| sink.borrow_mut().push(msg.to_string()));

        let conn = Connection::with_context(Box::new(MemStore::new()), context);
        assert!(conn.prepare("SELECT nosuch();").is_err());
        assert_eq!(seen.borrow().len(), 1);
        assert!(seen.borrow()[0].contains("no such function: nosuch"));
    }

    #[test]
    fn test_parser_trace_flag() {
        let conn = Connection::in_memory();
        assert!(!conn.parser_trace());
        conn.set_parser_trace(true);
        assert!(conn.parser_trace());
    }
}
