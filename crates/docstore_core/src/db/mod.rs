//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure SQLite databases backing the record storage.
//! - Apply schema migrations in deterministic order.
//! - Hand out scoped connections to the table-session layer.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No record/term/link data is read or written before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;
pub mod schema;

pub use open::Database;
pub(crate) use open::SessionConnection;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// The database file could not be opened or created.
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    Sqlite(rusqlite::Error),
    /// The database was migrated by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Open { .. } => "db_open_failed",
            Self::Sqlite(_) => "db_bootstrap_failed",
            Self::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "cannot open database `{}`: {source}", path.display())
            }
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
