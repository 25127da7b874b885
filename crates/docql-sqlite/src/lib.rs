//! # docql-sqlite
//!
//! SQLite storage backend for the docql query engine.
//!
//! Each collection maps to a table `"<name>" (x TEXT)` holding one rendered
//! JSON document per row; row identity is SQLite's implicit rowid.
//!
//! ## Example
//!
//! ```
//! use docql_core::StepResult;
//!
//! let conn = docql_sqlite::open_in_memory()?;
//! let (mut stmt, _) = conn.prepare("CREATE COLLECTION t;")?;
//! stmt.step()?;
//! let (mut stmt, _) = conn.prepare("INSERT INTO t VALUE {a:1};")?;
//! stmt.step()?;
//! let (mut stmt, _) = conn.prepare("SELECT t.a FROM t;")?;
//! assert_eq!(stmt.step()?, StepResult::Row);
//! assert_eq!(stmt.value(), Some("1"));
//! # Ok::<(), docql_core::Error>(())
//! ```

use std::path::Path;

use tracing::debug;

use docql_core::store::{quote_ident, Scan, Store};
use docql_core::{Connection, Error, Result};

/// A [`Store`] over a SQLite database.
pub struct SqliteStore {
    db: rusqlite::Connection,
}

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

impl SqliteStore {
    /// Opens (creating if necessary) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = rusqlite::Connection::open(path).map_err(storage_err)?;
        Ok(Self { db })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let db = rusqlite::Connection::open_in_memory().map_err(storage_err)?;
        Ok(Self { db })
    }
}

impl Store for SqliteStore {
    fn create_collection(&self, name: &str, if_not_exists: bool) -> Result<()> {
        let sql = format!(
            "CREATE TABLE {}{}(x TEXT)",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            quote_ident(name)
        );
        debug!(%sql, "backend ddl");
        self.db.execute(&sql, []).map_err(storage_err)?;
        Ok(())
    }

    fn drop_collection(&self, name: &str, if_exists: bool) -> Result<()> {
        let sql = format!(
            "DROP TABLE {}{}",
            if if_exists { "IF EXISTS " } else { "" },
            quote_ident(name)
        );
        debug!(%sql, "backend ddl");
        self.db.execute(&sql, []).map_err(storage_err)?;
        Ok(())
    }

    fn insert(&self, name: &str, json: &str) -> Result<()> {
        let sql = format!("INSERT INTO {} VALUES(?1)", quote_ident(name));
        self.db
            .execute(&sql, rusqlite::params![json])
            .map_err(storage_err)?;
        Ok(())
    }

    fn scan(&self, name: &str) -> Result<Scan> {
        let sql = format!("SELECT rowid, x FROM {}", quote_ident(name));
        let mut stmt = self.db.prepare(&sql).map_err(storage_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(storage_err)?
            .collect::<rusqlite::Result<Vec<(i64, String)>>>()
            .map_err(storage_err)?;
        Ok(Scan::new(rows))
    }

    fn update_row(&self, name: &str, rowid: i64, json: &str) -> Result<()> {
        let sql = format!("UPDATE {} SET x=?1 WHERE rowid=?2", quote_ident(name));
        self.db
            .execute(&sql, rusqlite::params![json, rowid])
            .map_err(storage_err)?;
        Ok(())
    }

    fn delete_row(&self, name: &str, rowid: i64) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE rowid=?1", quote_ident(name));
        self.db
            .execute(&sql, rusqlite::params![rowid])
            .map_err(storage_err)?;
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        self.db.execute_batch("BEGIN").map_err(storage_err)
    }

    fn commit(&self) -> Result<()> {
        self.db.execute_batch("COMMIT").map_err(storage_err)
    }

    fn rollback(&self) -> Result<()> {
        self.db.execute_batch("ROLLBACK").map_err(storage_err)
    }
}

/// Opens a connection over a SQLite database file.
pub fn open(path: impl AsRef<Path>) -> Result<Connection> {
    Ok(Connection::new(Box::new(SqliteStore::open(path)?)))
}

/// Opens a connection over a private in-memory SQLite database.
pub fn open_in_memory() -> Result<Connection> {
    Ok(Connection::new(Box::new(SqliteStore::open_in_memory()?)))
}
