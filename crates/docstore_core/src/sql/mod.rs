//! Table-oriented query layer over SQLite.
//!
//! # Responsibility
//! - Describe single-table reads and writes as `TableQuery` values.
//! - Execute them inside scoped sessions and explicit transactions.
//! - Classify driver failures into not-found, data and conflict errors.
//!
//! # Invariants
//! - Table and column names are compile-time constants; only values are bound.
//! - A `TableSession` releases its connection on every exit path (drop).
//! - A `TableTransaction` rolls back unless `commit` is called.

use crate::db::DbError;
use rusqlite::types::Value;
use rusqlite::ErrorCode;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod query;
mod session;

pub use query::{Comparison, Condition, RelatedRows, TableQuery};
pub use session::{TableOperations, TableSession, TableTransaction};

pub type SqlResult<T> = Result<T, SqlError>;

/// Failure reported by the table layer.
#[derive(Debug)]
pub enum SqlError {
    /// No row matched, or the queried table does not exist.
    NotFound(String),
    /// The result shape was not what the operation expected.
    DataError(String),
    /// A unique or primary key constraint rejected a write.
    Conflict(rusqlite::Error),
    /// A session could not be opened.
    Connect(DbError),
    Sqlite(rusqlite::Error),
}

impl Display for SqlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::DataError(message) => write!(f, "data error: {message}"),
            Self::Conflict(err) => write!(f, "conflict: {err}"),
            Self::Connect(err) => write!(f, "could not open session: {err}"),
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SqlError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) | Self::DataError(_) => None,
            Self::Conflict(err) | Self::Sqlite(err) => Some(err),
            Self::Connect(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for SqlError {
    fn from(value: rusqlite::Error) -> Self {
        if is_unique_violation(&value) {
            return Self::Conflict(value);
        }
        if let Some(message) = missing_table_message(&value) {
            return Self::NotFound(message);
        }
        Self::Sqlite(value)
    }
}

impl From<DbError> for SqlError {
    fn from(value: DbError) -> Self {
        Self::Connect(value)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

fn missing_table_message(err: &rusqlite::Error) -> Option<String> {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) if message.starts_with("no such table") => {
            Some(message.clone())
        }
        _ => None,
    }
}

/// One materialized result row, addressed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    pub(crate) fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// Returns the raw value of `column`, if the row has it.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Returns the text value of `column`.
    ///
    /// # Errors
    /// - `SqlError::DataError` when the column is missing or not text.
    pub fn text(&self, column: &str) -> SqlResult<&str> {
        match self.value(column) {
            Some(Value::Text(value)) => Ok(value.as_str()),
            Some(other) => Err(SqlError::DataError(format!(
                "column `{column}` holds {:?}, expected text",
                other.data_type()
            ))),
            None => Err(SqlError::DataError(format!("column `{column}` missing from row"))),
        }
    }
}
