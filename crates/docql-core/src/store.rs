//! The storage-backend contract and the built-in in-memory backend.
//!
//! Each collection maps to one table with a single text column holding one
//! rendered JSON document per row; row identity is the backend's rowid.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// A buffered scan over one collection.
///
/// The cursor snapshots `(rowid, text)` pairs when it is opened; cursor
/// stability across concurrent writes is out of scope, and the snapshot
/// lets an UPDATE hold a scan and a write path on one connection.
#[derive(Debug)]
pub struct Scan {
    rows: std::vec::IntoIter<(i64, String)>,
}

impl Scan {
    /// Creates a scan over the given rows.
    #[must_use]
    pub fn new(rows: Vec<(i64, String)>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// Advances the scan, returning the next `(rowid, document text)` pair.
    pub fn next_row(&mut self) -> Option<(i64, String)> {
        self.rows.next()
    }
}

/// The relational storage contract the engine drives.
pub trait Store {
    /// Creates the table backing a collection.
    fn create_collection(&self, name: &str, if_not_exists: bool) -> Result<()>;

    /// Drops the table backing a collection.
    fn drop_collection(&self, name: &str, if_exists: bool) -> Result<()>;

    /// Appends one rendered document.
    fn insert(&self, name: &str, json: &str) -> Result<()>;

    /// Opens a scan over a collection's `(rowid, text)` rows.
    fn scan(&self, name: &str) -> Result<Scan>;

    /// Replaces the document stored under `rowid`.
    fn update_row(&self, name: &str, rowid: i64, json: &str) -> Result<()>;

    /// Deletes the document stored under `rowid`.
    fn delete_row(&self, name: &str, rowid: i64) -> Result<()>;

    /// Begins a transaction.
    fn begin(&self) -> Result<()>;

    /// Commits the open transaction.
    fn commit(&self) -> Result<()>;

    /// Rolls back the open transaction.
    fn rollback(&self) -> Result<()>;
}

/// Quotes an identifier for embedding in backend SQL, doubling embedded
/// quote characters.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[derive(Debug, Default)]
struct MemCollection {
    next_rowid: i64,
    rows: BTreeMap<i64, String>,
}

/// An in-memory storage backend.
///
/// Useful for embedding without persistence and for engine tests. The
/// transaction operations are accepted and ignored.
#[derive(Debug, Default)]
pub struct MemStore {
    collections: RefCell<BTreeMap<String, MemCollection>>,
}

impl MemStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(name: &str) -> Error {
        Error::Storage(format!("no such collection: {name}"))
    }
}

impl Store for MemStore {
    fn create_collection(&self, name: &str, if_not_exists: bool) -> Result<()> {
        let mut collections = self.collections.borrow_mut();
        if collections.contains_key(name) {
            if if_not_exists {
                return Ok(());
            }
            return Err(Error::Storage(format!(
                "collection already exists: {name}"
            )));
        }
        collections.insert(name.to_string(), MemCollection::default());
        Ok(())
    }

    fn drop_collection(&self, name: &str, if_exists: bool) -> Result<()> {
        let mut collections = self.collections.borrow_mut();
        if collections.remove(name).is_none() && !if_exists {
            return Err(Self::missing(name));
        }
        Ok(())
    }

    fn insert(&self, name: &str, json: &str) -> Result<()> {
        let mut collections = self.collections.borrow_mut();
        let coll = collections.get_mut(name).ok_or_else(|| Self::missing(name))?;
        coll.next_rowid += 1;
        coll.rows.insert(coll.next_rowid, json.to_string());
        Ok(())
    }

    fn scan(&self, name: &str) -> Result<Scan> {
        let collections = self.collections.borrow();
        let coll = collections.get(name).ok_or_else(|| Self::missing(name))?;
        Ok(Scan::new(
            coll.rows
                .iter()
                .map(|(rowid, text)| (*rowid, text.clone()))
                .collect(),
        ))
    }

    fn update_row(&self, name: &str, rowid: i64, json: &str) -> Result<()> {
        let mut collections = self.collections.borrow_mut();
        let coll = collections.get_mut(name).ok_or_else(|| Self::missing(name))?;
        if let Some(slot) = coll.rows.get_mut(&rowid) {
            *slot = json.to_string();
        }
        Ok(())
    }

    fn delete_row(&self, name: &str, rowid: i64) -> Result<()> {
        let mut collections = self.collections.borrow_mut();
        let coll = collections.get_mut(name).ok_or_else(|| Self::missing(name))?;
        coll.rows.remove(&rowid);
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }
}
