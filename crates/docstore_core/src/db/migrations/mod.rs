//! Versioned schema scripts for the record, term and link tables.
//!
//! # Invariants
//! - Script versions start at 1 and increase by one.
//! - `PRAGMA user_version` holds the version of the last applied script.
//! - Pending scripts run in one transaction; a failing script leaves the
//!   schema untouched.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;
use std::time::Instant;

struct SchemaScript {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCRIPTS: &[SchemaScript] = &[
    SchemaScript {
        version: 1,
        name: "records",
        sql: include_str!("0001_records.sql"),
    },
    SchemaScript {
        version: 2,
        name: "side_data_indexes",
        sql: include_str!("0002_side_data_indexes.sql"),
    },
];

/// Schema version this build migrates databases to.
pub fn latest_version() -> u32 {
    SCRIPTS.last().map_or(0, |script| script.version)
}

/// Brings the schema behind `conn` up to `latest_version`.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the database was written by a
///   newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let started_at = Instant::now();
    let from_version = read_user_version(conn)?;
    let latest = latest_version();

    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }
    if from_version == latest {
        debug!("event=db_migrate module=db status=skipped version={from_version}");
        return Ok(());
    }

    let tx = conn.transaction()?;
    for script in SCRIPTS.iter().filter(|script| script.version > from_version) {
        tx.execute_batch(script.sql)?;
        tx.pragma_update(None, "user_version", script.version)?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} script={}",
            script.version, script.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={from_version} to_version={latest} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(())
}

fn read_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
