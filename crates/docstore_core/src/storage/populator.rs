//! One-time hydration of a record store from the SQLite tables.
//!
//! # Responsibility
//! - Read every storage term, link and record row, in that order, inside one
//!   read transaction.
//! - Re-create each record with its grouped terms and outbound links in the
//!   target store.
//!
//! # Invariants
//! - Records without side data are created with empty term and link sets.
//! - The database session is released before the target is written.
//! - Any failure aborts hydration; the caller must discard the target.

use super::{RecordStorage, StoreError, StoreResult};
use crate::codec::DocumentCodec;
use crate::db::schema::{
    LINK_FROM_ID, LINK_FROM_TYPE, LINK_TABLE, LINK_TO_ID, LINK_TO_TYPE, RECORD_DATA,
    RECORD_DATA_DIVIDER, RECORD_ID, RECORD_TABLE, RECORD_TYPE, STORAGE_TERM_TABLE, TERM_ID,
    TERM_KEY, TERM_RECORD_ID, TERM_RECORD_TYPE, TERM_VALUE,
};
use crate::db::Database;
use crate::model::record::{Link, RecordKey, StorageTerm, StoredRecord};
use crate::sql::{Row, SqlError, SqlResult, TableOperations, TableQuery};
use log::{error, info};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

/// Row counts loaded by one hydration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    pub records: usize,
    pub terms: usize,
    pub links: usize,
}

struct TableSnapshot {
    terms: Vec<Row>,
    links: Vec<Row>,
    records: Vec<Row>,
}

/// Loads every record of `database` into `target`.
///
/// # Side effects
/// - Calls `target.create` once per record row.
/// - Emits `storage_populate` logging events with counts and duration.
pub fn populate(
    database: &Database,
    codec: &dyn DocumentCodec,
    target: &dyn RecordStorage,
) -> StoreResult<PopulateSummary> {
    let started_at = Instant::now();
    info!(
        "event=storage_populate module=storage status=start mode={}",
        database.mode()
    );

    let result = read_snapshot(database).and_then(|snapshot| load(&snapshot, codec, target));
    match &result {
        Ok(summary) => info!(
            "event=storage_populate module=storage status=ok records={} terms={} links={} duration_ms={}",
            summary.records,
            summary.terms,
            summary.links,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=storage_populate module=storage status=error duration_ms={} error_code={} error={err}",
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
    result
}

fn read_snapshot(database: &Database) -> StoreResult<TableSnapshot> {
    let mut session = database
        .session()
        .map_err(|err| table_failure(RECORD_TABLE, err))?;
    let tx = session
        .transaction()
        .map_err(|err| table_failure(RECORD_TABLE, err))?;

    let read_all = |table: &'static str| {
        tx.read_rows(&TableQuery::new(table))
            .map_err(|err| table_failure(table, err))
    };
    let terms = read_all(STORAGE_TERM_TABLE)?;
    let links = read_all(LINK_TABLE)?;
    let records = read_all(RECORD_TABLE)?;

    Ok(TableSnapshot {
        terms,
        links,
        records,
    })
}

fn load(
    snapshot: &TableSnapshot,
    codec: &dyn DocumentCodec,
    target: &dyn RecordStorage,
) -> StoreResult<PopulateSummary> {
    let mut terms = group_terms(&snapshot.terms)
        .map_err(|err| table_failure(STORAGE_TERM_TABLE, err))?;
    let mut links =
        group_links(&snapshot.links).map_err(|err| table_failure(LINK_TABLE, err))?;

    for row in &snapshot.records {
        let (key, data_divider, data) =
            record_columns(row).map_err(|err| table_failure(RECORD_TABLE, err))?;
        let document = codec.decode(data).map_err(|err| {
            StoreError::storage(format!(
                "Could not decode document of record with recordType: {} and id: {}.",
                key.record_type, key.id
            ))
            .caused_by(err)
        })?;

        let record = StoredRecord {
            terms: terms.remove(&key).unwrap_or_default(),
            links: links.remove(&key).unwrap_or_default(),
            key,
            data_divider: data_divider.to_string(),
            document,
        };
        target.create(&record)?;
    }

    Ok(PopulateSummary {
        records: snapshot.records.len(),
        terms: snapshot.terms.len(),
        links: snapshot.links.len(),
    })
}

fn group_terms(rows: &[Row]) -> SqlResult<HashMap<RecordKey, BTreeSet<StorageTerm>>> {
    let mut grouped: HashMap<RecordKey, BTreeSet<StorageTerm>> = HashMap::new();
    for row in rows {
        grouped
            .entry(RecordKey::new(
                row.text(TERM_RECORD_TYPE)?,
                row.text(TERM_RECORD_ID)?,
            ))
            .or_default()
            .insert(StorageTerm::new(
                row.text(TERM_ID)?,
                row.text(TERM_KEY)?,
                row.text(TERM_VALUE)?,
            ));
    }
    Ok(grouped)
}

fn group_links(rows: &[Row]) -> SqlResult<HashMap<RecordKey, BTreeSet<Link>>> {
    let mut grouped: HashMap<RecordKey, BTreeSet<Link>> = HashMap::new();
    for row in rows {
        grouped
            .entry(RecordKey::new(row.text(LINK_FROM_TYPE)?, row.text(LINK_FROM_ID)?))
            .or_default()
            .insert(Link::new(row.text(LINK_TO_TYPE)?, row.text(LINK_TO_ID)?));
    }
    Ok(grouped)
}

fn record_columns(row: &Row) -> SqlResult<(RecordKey, &str, &str)> {
    Ok((
        RecordKey::new(row.text(RECORD_TYPE)?, row.text(RECORD_ID)?),
        row.text(RECORD_DATA_DIVIDER)?,
        row.text(RECORD_DATA)?,
    ))
}

fn table_failure(table: &str, err: SqlError) -> StoreError {
    StoreError::storage(format!(
        "Storage exception when reading table: {table} during hydration."
    ))
    .caused_by(err)
}
