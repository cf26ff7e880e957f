//! Database handle and connection bootstrap for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory databases and migrate them once.
//! - Produce one scoped connection per table session.
//!
//! # Invariants
//! - A `Database` is only constructed after migrations fully applied.
//! - File databases open a fresh connection per session; in-memory databases
//!   share one connection that is locked for the session lifetime.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{debug, error, info};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Migrated SQLite database that acts as the session factory for storage.
pub struct Database {
    backing: Backing,
}

enum Backing {
    File(PathBuf),
    Memory(Mutex<Connection>),
}

/// Connection owned by a single table session.
///
/// Dropping it closes the per-session file connection or releases the lock on
/// the shared in-memory connection.
pub(crate) enum SessionConnection<'db> {
    Owned(Connection),
    Shared(MutexGuard<'db, Connection>),
}

impl Deref for SessionConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            Self::Owned(conn) => conn,
            Self::Shared(guard) => guard,
        }
    }
}

impl DerefMut for SessionConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        match self {
            Self::Owned(conn) => conn,
            Self::Shared(guard) => guard,
        }
    }
}

impl Database {
    /// Opens a SQLite database file and applies all pending migrations.
    ///
    /// # Side effects
    /// - Creates the file when missing.
    /// - Emits `db_open` logging events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        logged_open("file", || {
            let mut conn = open_file(&path)?;
            bootstrap_connection(&mut conn)?;
            Ok(Self {
                backing: Backing::File(path.clone()),
            })
        })
    }

    /// Opens a private in-memory database and applies all pending migrations.
    pub fn open_in_memory() -> DbResult<Self> {
        logged_open("memory", || {
            let mut conn = Connection::open_in_memory()?;
            bootstrap_connection(&mut conn)?;
            Ok(Self {
                backing: Backing::Memory(Mutex::new(conn)),
            })
        })
    }

    /// Returns `file` or `memory`, used in log lines.
    pub fn mode(&self) -> &'static str {
        match self.backing {
            Backing::File(_) => "file",
            Backing::Memory(_) => "memory",
        }
    }

    /// Returns the database file path, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File(path) => Some(path.as_path()),
            Backing::Memory(_) => None,
        }
    }

    pub(crate) fn connect(&self) -> DbResult<SessionConnection<'_>> {
        match &self.backing {
            Backing::File(path) => {
                let conn = open_file(path)?;
                configure_connection(&conn)?;
                debug!("event=db_connect module=db status=ok mode=file");
                Ok(SessionConnection::Owned(conn))
            }
            Backing::Memory(shared) => Ok(SessionConnection::Shared(shared.lock())),
        }
    }
}

fn logged_open(mode: &str, open: impl FnOnce() -> DbResult<Database>) -> DbResult<Database> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = open();
    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code={} error={}",
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
    result
}

fn open_file(path: &Path) -> DbResult<Connection> {
    Connection::open(path).map_err(|source| DbError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    configure_connection(conn)?;
    apply_migrations(conn)?;
    Ok(())
}

fn configure_connection(conn: &Connection) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
