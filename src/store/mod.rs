//! SQLite persistence.
//!
//! Every entity module exposes free functions over `&Connection`. Handlers
//! compose them inside [`Store::write`], which runs the closure in one SQL
//! transaction: an `Err` anywhere rolls back every write the closure made.

pub mod accounts;
pub mod activity;
pub mod catalog;
pub mod rentals;
pub mod reports;
pub mod services;
pub mod transactions;

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use log::info;
use rusqlite::types::Type;
use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::core::error::AppError;

const SCHEMA: &str = include_str!("schema.sql");
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shared handle to the rental database
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database file and apply the schema
    pub fn open(path: &str) -> Result<Self, AppError> {
        info!("Opening rental database at {}", path);
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run read-only statements
    pub async fn read<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, AppError>,
    {
        let conn = self.conn.lock().await;
        f(&conn)
    }

    /// Run statements inside one transaction, committing on `Ok`
    pub async fn write<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, AppError>,
    {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let out = f(&*tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Format a timestamp the way the schema stores it
pub fn timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp column
pub fn parse_timestamp(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Run `f` inside a named savepoint; an `Err` undoes only the writes `f` made
pub fn with_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce(&Connection) -> Result<T, AppError>,
) -> Result<T, AppError> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))?;
    match f(conn) {
        Ok(out) => {
            conn.execute_batch(&format!("RELEASE {name}"))?;
            Ok(out)
        }
        Err(e) => {
            conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))?;
            Err(e)
        }
    }
}

/// Column named by a UNIQUE constraint violation, e.g. `customer.email`
pub fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(message))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            message.strip_prefix("UNIQUE constraint failed: ")
        }
        _ => None,
    }
}
