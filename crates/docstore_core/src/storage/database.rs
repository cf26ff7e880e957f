//! SQLite-backed `RecordStorage`.
//!
//! # Responsibility
//! - Map records, storage terms and links onto the `record`, `storageterm`
//!   and `link` tables.
//! - Translate list filters into correlated sub-queries on `storageterm`.
//!
//! # Invariants
//! - Every operation runs on one `TableSession`, released on every exit path.
//! - Multi-table writes run in one `TableTransaction`; a missing record row on
//!   update or delete rolls the whole transaction back.
//! - Lists are ordered `id DESC, type DESC`.

use super::{describe_types, list_types, log_outcome, RecordStorage, StoreError, StoreResult};
use crate::codec::{DocumentCodec, JsonDocumentCodec};
use crate::db::schema::{
    LINK_FROM_ID, LINK_FROM_TYPE, LINK_TABLE, LINK_TO_ID, LINK_TO_TYPE, RECORD_DATA,
    RECORD_DATA_DIVIDER, RECORD_ID, RECORD_TABLE, RECORD_TYPE, STORAGE_TERM_TABLE, TERM_ID,
    TERM_KEY, TERM_RECORD_ID, TERM_RECORD_TYPE, TERM_VALUE,
};
use crate::db::Database;
use crate::model::filter::{Filter, FilterCondition, RelationalOperator};
use crate::model::record::{Document, Link, StorageReadResult, StoredRecord};
use crate::sql::{
    Comparison, Condition, RelatedRows, Row, SqlError, SqlResult, TableOperations, TableQuery,
};
use std::collections::BTreeSet;
use std::time::Instant;

const STORE: &str = "database";

/// Record storage on a migrated SQLite database.
pub struct DatabaseRecordStorage<C = JsonDocumentCodec> {
    database: Database,
    codec: C,
}

impl DatabaseRecordStorage {
    /// Creates a store that keeps documents as JSON text.
    pub fn new(database: Database) -> Self {
        Self::with_codec(database, JsonDocumentCodec)
    }
}

impl<C: DocumentCodec> DatabaseRecordStorage<C> {
    pub fn with_codec(database: Database, codec: C) -> Self {
        Self { database, codec }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn read_document(&self, types: &[&str], id: &str) -> StoreResult<Document> {
        let session = self
            .database
            .session()
            .map_err(|err| read_failure(types, id, err))?;
        let mut query = TableQuery::new(RECORD_TABLE);
        match types {
            [single] => query.add_condition(RECORD_TYPE, *single),
            _ => query.add_membership_condition(RECORD_TYPE, types.iter().copied()),
        };
        query.add_condition(RECORD_ID, id);

        let row = session
            .read_one_row(&query)
            .map_err(|err| read_failure(types, id, err))?;
        self.decode_row(&row)
    }

    fn decode_row(&self, row: &Row) -> StoreResult<Document> {
        let data = row.text(RECORD_DATA).map_err(|err| {
            StoreError::storage("Could not read data column of record row.").caused_by(err)
        })?;
        self.codec.decode(data).map_err(|err| {
            StoreError::storage(format!(
                "Could not decode document of record with recordType: {} and id: {}.",
                row.text(RECORD_TYPE).unwrap_or_default(),
                row.text(RECORD_ID).unwrap_or_default()
            ))
            .caused_by(err)
        })
    }

    fn encode_document(&self, record: &StoredRecord, action: &str) -> StoreResult<String> {
        self.codec.encode(&record.document).map_err(|err| {
            write_storage_failure(action, record.record_type(), record.id()).caused_by(err)
        })
    }

    fn insert_record(&self, record: &StoredRecord, data: &str) -> SqlResult<()> {
        let mut session = self.database.session()?;
        let tx = session.transaction()?;

        let mut query = TableQuery::new(RECORD_TABLE);
        query
            .add_parameter(RECORD_TYPE, record.record_type())
            .add_parameter(RECORD_ID, record.id())
            .add_parameter(RECORD_DATA_DIVIDER, record.data_divider.as_str())
            .add_parameter(RECORD_DATA, data);
        tx.insert_row(&query)?;
        insert_side_data(&tx, record)?;

        tx.commit()
    }

    /// Returns the number of record rows updated; the transaction is only
    /// committed when it is non-zero.
    fn replace_record(&self, record: &StoredRecord, data: &str) -> SqlResult<usize> {
        let mut session = self.database.session()?;
        let tx = session.transaction()?;

        delete_side_data(&tx, record.record_type(), record.id())?;
        insert_side_data(&tx, record)?;

        let mut query = TableQuery::new(RECORD_TABLE);
        query
            .add_parameter(RECORD_DATA_DIVIDER, record.data_divider.as_str())
            .add_parameter(RECORD_DATA, data)
            .add_condition(RECORD_TYPE, record.record_type())
            .add_condition(RECORD_ID, record.id());
        let updated = tx.update_rows(&query)?;
        if updated == 0 {
            return Ok(0);
        }

        tx.commit()?;
        Ok(updated)
    }

    fn remove_record(&self, record_type: &str, id: &str) -> SqlResult<usize> {
        let mut session = self.database.session()?;
        let tx = session.transaction()?;

        delete_side_data(&tx, record_type, id)?;

        let mut query = TableQuery::new(RECORD_TABLE);
        query
            .add_condition(RECORD_TYPE, record_type)
            .add_condition(RECORD_ID, id);
        let deleted = tx.delete_rows(&query)?;
        if deleted == 0 {
            return Ok(0);
        }

        tx.commit()?;
        Ok(deleted)
    }

    /// Reads the page and the total inside one transaction so both see the
    /// same snapshot.
    fn list_records(&self, types: &[&str], filter: &Filter) -> StoreResult<StorageReadResult> {
        let mut session = self
            .database
            .session()
            .map_err(|err| list_failure(types, err))?;
        let tx = session
            .transaction()
            .map_err(|err| list_failure(types, err))?;
        let query = list_query(types, filter);

        let mut page = query.clone();
        page.add_order_by_desc(RECORD_ID).add_order_by_desc(RECORD_TYPE);
        if let Some(from) = filter.from_row_number {
            page.set_from_row_number(from);
        }
        if let Some(to) = filter.to_row_number {
            page.set_to_row_number(to);
        }

        let rows = tx
            .read_rows(&page)
            .map_err(|err| list_failure(types, err))?;
        let total_number_of_matches = tx
            .read_number_of_rows(&query)
            .map_err(|err| list_failure(types, err))?;

        let records = rows
            .iter()
            .map(|row| self.decode_row(row))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(StorageReadResult {
            records,
            total_number_of_matches,
        })
    }

    fn count_records(&self, types: &[&str], filter: &Filter) -> StoreResult<u64> {
        let session = self
            .database
            .session()
            .map_err(|err| list_failure(types, err))?;
        session
            .read_number_of_rows(&list_query(types, filter))
            .map_err(|err| list_failure(types, err))
    }

    fn count_per_type(&self, types: &[&str], id: &str) -> SqlResult<bool> {
        let session = self.database.session()?;
        for record_type in types {
            let mut query = TableQuery::new(RECORD_TABLE);
            query
                .add_condition(RECORD_TYPE, *record_type)
                .add_condition(RECORD_ID, id);
            if session.read_number_of_rows(&query)? > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn count_incoming_links(&self, record_type: &str, id: &str) -> SqlResult<u64> {
        let session = self.database.session()?;
        session.read_number_of_rows(&incoming_links_query(record_type, id))
    }

    fn read_incoming_links(&self, record_type: &str, id: &str) -> SqlResult<BTreeSet<Link>> {
        let session = self.database.session()?;
        let rows = session.read_rows(&incoming_links_query(record_type, id))?;
        rows.iter()
            .map(|row| -> SqlResult<Link> {
                Ok(Link::new(row.text(LINK_FROM_TYPE)?, row.text(LINK_FROM_ID)?))
            })
            .collect()
    }
}

impl<C: DocumentCodec> RecordStorage for DatabaseRecordStorage<C> {
    fn read(&self, record_type: &str, id: &str) -> StoreResult<Document> {
        let started_at = Instant::now();
        let result = self.read_document(&[record_type], id);
        log_outcome(
            "record_read",
            STORE,
            &format!("type={record_type} id={id}"),
            started_at,
            &result,
        );
        result
    }

    fn read_one_of(&self, types: &[&str], id: &str) -> StoreResult<Document> {
        let started_at = Instant::now();
        let result = self.read_document(types, id);
        log_outcome(
            "record_read",
            STORE,
            &format!("types={} id={id}", list_types(types)),
            started_at,
            &result,
        );
        result
    }

    fn create(&self, record: &StoredRecord) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.encode_document(record, "creating").and_then(|data| {
            self.insert_record(record, &data).map_err(|err| match err {
                SqlError::Conflict(_) => StoreError::conflict(format!(
                    "Record with type: {}, and id: {} already exists in storage.",
                    record.record_type(),
                    record.id()
                ))
                .caused_by(err),
                _ => write_storage_failure("creating", record.record_type(), record.id())
                    .caused_by(err),
            })
        });
        log_outcome(
            "record_create",
            STORE,
            &format!("type={} id={}", record.record_type(), record.id()),
            started_at,
            &result,
        );
        result
    }

    fn update(&self, record: &StoredRecord) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.encode_document(record, "updating").and_then(|data| {
            match self.replace_record(record, &data) {
                Ok(0) => Err(write_not_found("updating", record.record_type(), record.id())),
                Ok(_) => Ok(()),
                Err(err) => Err(
                    write_storage_failure("updating", record.record_type(), record.id())
                        .caused_by(err),
                ),
            }
        });
        log_outcome(
            "record_update",
            STORE,
            &format!("type={} id={}", record.record_type(), record.id()),
            started_at,
            &result,
        );
        result
    }

    fn delete_by_type_and_id(&self, record_type: &str, id: &str) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = match self.remove_record(record_type, id) {
            Ok(0) => Err(write_not_found("deleting", record_type, id)),
            Ok(_) => Ok(()),
            Err(err) => Err(write_storage_failure("deleting", record_type, id).caused_by(err)),
        };
        log_outcome(
            "record_delete",
            STORE,
            &format!("type={record_type} id={id}"),
            started_at,
            &result,
        );
        result
    }

    fn read_list(&self, types: &[&str], filter: &Filter) -> StoreResult<StorageReadResult> {
        let started_at = Instant::now();
        let result = self.list_records(types, filter);
        log_outcome(
            "record_list",
            STORE,
            &format!("types={}", list_types(types)),
            started_at,
            &result,
        );
        result
    }

    fn record_exists(&self, types: &[&str], id: &str) -> StoreResult<bool> {
        let started_at = Instant::now();
        let result = self.count_per_type(types, id).map_err(|err| {
            StoreError::not_found(format!(
                "RecordType: {} with id: {id}, not found in storage.",
                list_types(types)
            ))
            .caused_by(err)
        });
        log_outcome(
            "record_exists",
            STORE,
            &format!("types={} id={id}", list_types(types)),
            started_at,
            &result,
        );
        result
    }

    fn links_exist_for_record(&self, record_type: &str, id: &str) -> StoreResult<bool> {
        let started_at = Instant::now();
        let result = self
            .count_incoming_links(record_type, id)
            .map(|count| count > 0)
            .map_err(|err| {
                StoreError::storage(format!(
                    "Could not determine if links exist for type: {record_type} and id: {id}."
                ))
                .caused_by(err)
            });
        log_outcome(
            "record_links_exist",
            STORE,
            &format!("type={record_type} id={id}"),
            started_at,
            &result,
        );
        result
    }

    fn get_links_to_record(&self, record_type: &str, id: &str) -> StoreResult<BTreeSet<Link>> {
        let started_at = Instant::now();
        let result = self.read_incoming_links(record_type, id).map_err(|err| {
            StoreError::storage(format!(
                "Could not get links for type: {record_type} and id: {id}."
            ))
            .caused_by(err)
        });
        log_outcome(
            "record_links",
            STORE,
            &format!("type={record_type} id={id}"),
            started_at,
            &result,
        );
        result
    }

    fn get_total_number_of_records_for_types(
        &self,
        types: &[&str],
        filter: &Filter,
    ) -> StoreResult<u64> {
        let started_at = Instant::now();
        let result = self.count_records(types, filter);
        log_outcome(
            "record_count",
            STORE,
            &format!("types={}", list_types(types)),
            started_at,
            &result,
        );
        result
    }
}

fn insert_side_data(tx: &impl TableOperations, record: &StoredRecord) -> SqlResult<()> {
    for term in &record.terms {
        let mut query = TableQuery::new(STORAGE_TERM_TABLE);
        query
            .add_parameter(TERM_RECORD_TYPE, record.record_type())
            .add_parameter(TERM_RECORD_ID, record.id())
            .add_parameter(TERM_ID, term.term_id.as_str())
            .add_parameter(TERM_KEY, term.key.as_str())
            .add_parameter(TERM_VALUE, term.value.as_str());
        tx.insert_row(&query)?;
    }
    for link in &record.links {
        let mut query = TableQuery::new(LINK_TABLE);
        query
            .add_parameter(LINK_FROM_TYPE, record.record_type())
            .add_parameter(LINK_FROM_ID, record.id())
            .add_parameter(LINK_TO_TYPE, link.record_type.as_str())
            .add_parameter(LINK_TO_ID, link.id.as_str());
        tx.insert_row(&query)?;
    }
    Ok(())
}

/// Deletes owned terms first, then outbound links.
fn delete_side_data(tx: &impl TableOperations, record_type: &str, id: &str) -> SqlResult<()> {
    let mut terms = TableQuery::new(STORAGE_TERM_TABLE);
    terms
        .add_condition(TERM_RECORD_TYPE, record_type)
        .add_condition(TERM_RECORD_ID, id);
    tx.delete_rows(&terms)?;

    let mut links = TableQuery::new(LINK_TABLE);
    links
        .add_condition(LINK_FROM_TYPE, record_type)
        .add_condition(LINK_FROM_ID, id);
    tx.delete_rows(&links)?;
    Ok(())
}

fn list_query(types: &[&str], filter: &Filter) -> TableQuery {
    let mut query = TableQuery::new(RECORD_TABLE);
    query.add_membership_condition(RECORD_TYPE, types.iter().copied());
    match filter.include_parts.as_slice() {
        [] => {}
        [part] => {
            for condition in &part.conditions {
                query.add_exists(matching_terms(condition));
            }
        }
        parts => {
            let groups = parts
                .iter()
                .map(|part| {
                    part.conditions
                        .iter()
                        .map(|condition| Condition::Exists(matching_terms(condition)))
                        .collect()
                })
                .collect();
            query.add_any_of(groups);
        }
    }
    query
}

/// Term rows of the outer record that satisfy `condition`.
fn matching_terms(condition: &FilterCondition) -> RelatedRows {
    RelatedRows::in_table(STORAGE_TERM_TABLE)
        .correlate(TERM_RECORD_TYPE, RECORD_TYPE)
        .correlate(TERM_RECORD_ID, RECORD_ID)
        .with_condition(Condition::Compare {
            column: TERM_KEY,
            comparison: Comparison::Equal,
            value: condition.key.clone(),
        })
        .with_condition(Condition::Compare {
            column: TERM_VALUE,
            comparison: comparison_for(condition.operator),
            value: condition.value.clone(),
        })
}

fn comparison_for(operator: RelationalOperator) -> Comparison {
    match operator {
        RelationalOperator::EqualTo => Comparison::Equal,
        RelationalOperator::NotEqualTo => Comparison::NotEqual,
        RelationalOperator::LessThan => Comparison::Less,
        RelationalOperator::LessThanOrEqualTo => Comparison::LessOrEqual,
        RelationalOperator::GreaterThan => Comparison::Greater,
        RelationalOperator::GreaterThanOrEqualTo => Comparison::GreaterOrEqual,
    }
}

fn incoming_links_query(record_type: &str, id: &str) -> TableQuery {
    let mut query = TableQuery::new(LINK_TABLE);
    query
        .add_condition(LINK_TO_TYPE, record_type)
        .add_condition(LINK_TO_ID, id);
    query
}

fn read_failure(types: &[&str], id: &str, err: SqlError) -> StoreError {
    let types = describe_types(types);
    let error = match err {
        SqlError::NotFound(_) => StoreError::not_found(format!(
            "No record found for recordType(s): {types}, with id: {id}."
        )),
        SqlError::DataError(_) => StoreError::data_integrity(format!(
            "Read did not generate a single result for recordType(s): {types}, with id: {id}."
        )),
        _ => StoreError::storage(format!(
            "Storage exception when reading record with recordType(s): {types} and id: {id}."
        )),
    };
    error.caused_by(err)
}

fn list_failure(types: &[&str], err: SqlError) -> StoreError {
    let types = list_types(types);
    let error = match err {
        SqlError::NotFound(_) => {
            StoreError::not_found(format!("RecordType: {types} not found in storage."))
        }
        _ => StoreError::storage(format!(
            "Storage exception when reading list of records with recordType: {types}."
        )),
    };
    error.caused_by(err)
}

fn write_storage_failure(action: &str, record_type: &str, id: &str) -> StoreError {
    StoreError::storage(format!(
        "Storage exception when {action} record with recordType: {record_type} and id: {id}."
    ))
}

fn write_not_found(action: &str, record_type: &str, id: &str) -> StoreError {
    StoreError::not_found(format!(
        "Record not found when {action} record with recordType: {record_type} and id: {id}."
    ))
}
