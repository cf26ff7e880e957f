//! In-memory `RecordStorage` used as the read replica of the write-through
//! cache.
//!
//! # Invariants
//! - `incoming_links` always mirrors the outbound links of stored records:
//!   for every record `r` and link `l` in `r.links`, the entry for `l`'s
//!   target contains `r` as a `Link`.
//! - Listing, filtering, paging and totals behave exactly as in the SQLite
//!   store, including `id DESC, type DESC` ordering on byte-wise text.

use super::{describe_types, list_types, log_outcome, RecordStorage, StoreError, StoreResult};
use crate::model::filter::Filter;
use crate::model::record::{Document, Link, RecordKey, StorageReadResult, StoredRecord};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

const STORE: &str = "memory";

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<RecordKey, StoredRecord>,
    /// Target record -> records linking to it.
    incoming_links: HashMap<RecordKey, BTreeSet<Link>>,
}

impl MemoryState {
    fn index_links(&mut self, record: &StoredRecord) {
        let source = Link::new(record.record_type(), record.id());
        for link in &record.links {
            self.incoming_links
                .entry(RecordKey::new(link.record_type.as_str(), link.id.as_str()))
                .or_default()
                .insert(source.clone());
        }
    }

    fn unindex_links(&mut self, record: &StoredRecord) {
        let source = Link::new(record.record_type(), record.id());
        for link in &record.links {
            let target = RecordKey::new(link.record_type.as_str(), link.id.as_str());
            if let Some(sources) = self.incoming_links.get_mut(&target) {
                sources.remove(&source);
                if sources.is_empty() {
                    self.incoming_links.remove(&target);
                }
            }
        }
    }

    /// Matching records in list order.
    fn matching<'a>(&'a self, types: &[&str], filter: &Filter) -> Vec<&'a StoredRecord> {
        let mut matches = self
            .records
            .values()
            .filter(|record| types.contains(&record.record_type()))
            .filter(|record| filter.matches(&record.terms))
            .collect::<Vec<_>>();
        matches.sort_by(|left, right| {
            right
                .id()
                .cmp(left.id())
                .then_with(|| right.record_type().cmp(left.record_type()))
        });
        matches
    }
}

/// Record storage kept entirely in process memory.
#[derive(Default)]
pub struct InMemoryRecordStorage {
    state: RwLock<MemoryState>,
}

impl InMemoryRecordStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    fn insert(&self, record: &StoredRecord) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.records.contains_key(&record.key) {
            return Err(StoreError::conflict(format!(
                "Record with type: {}, and id: {} already exists in storage.",
                record.record_type(),
                record.id()
            )));
        }
        state.index_links(record);
        state.records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn replace(&self, record: &StoredRecord) -> StoreResult<()> {
        let mut state = self.state.write();
        let previous = state.records.remove(&record.key).ok_or_else(|| {
            not_found_when("updating", record.record_type(), record.id())
        })?;
        state.unindex_links(&previous);
        state.index_links(record);
        state.records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, record_type: &str, id: &str) -> StoreResult<()> {
        let mut state = self.state.write();
        let removed = state
            .records
            .remove(&RecordKey::new(record_type, id))
            .ok_or_else(|| not_found_when("deleting", record_type, id))?;
        state.unindex_links(&removed);
        Ok(())
    }
}

impl RecordStorage for InMemoryRecordStorage {
    fn read(&self, record_type: &str, id: &str) -> StoreResult<Document> {
        logged("record_read", format!("type={record_type} id={id}"), || {
            self.state
                .read()
                .records
                .get(&RecordKey::new(record_type, id))
                .map(|record| record.document.clone())
                .ok_or_else(|| no_record_found(&[record_type], id))
        })
    }

    fn read_one_of(&self, types: &[&str], id: &str) -> StoreResult<Document> {
        logged(
            "record_read",
            format!("types={} id={id}", list_types(types)),
            || {
                let state = self.state.read();
                let distinct_types = types.iter().copied().collect::<BTreeSet<_>>();
                let mut found = distinct_types
                    .into_iter()
                    .filter_map(|record_type| state.records.get(&RecordKey::new(record_type, id)));

                match (found.next(), found.next()) {
                    (Some(record), None) => Ok(record.document.clone()),
                    (None, _) => Err(no_record_found(types, id)),
                    (Some(_), Some(_)) => Err(StoreError::data_integrity(format!(
                        "Read did not generate a single result for recordType(s): {}, with id: {id}.",
                        describe_types(types)
                    ))),
                }
            },
        )
    }

    fn create(&self, record: &StoredRecord) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.insert(record);
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
        let result = self.replace(record);
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
        let result = self.remove(record_type, id);
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
        logged("record_list", format!("types={}", list_types(types)), || {
            let state = self.state.read();
            let matches = state.matching(types, filter);
            let window = filter.row_window(matches.len());
            Ok(StorageReadResult {
                total_number_of_matches: matches.len() as u64,
                records: matches[window]
                    .iter()
                    .map(|record| record.document.clone())
                    .collect(),
            })
        })
    }

    fn record_exists(&self, types: &[&str], id: &str) -> StoreResult<bool> {
        logged(
            "record_exists",
            format!("types={} id={id}", list_types(types)),
            || {
                let state = self.state.read();
                Ok(types.iter().any(|record_type| {
                    state
                        .records
                        .contains_key(&RecordKey::new(*record_type, id))
                }))
            },
        )
    }

    fn links_exist_for_record(&self, record_type: &str, id: &str) -> StoreResult<bool> {
        logged(
            "record_links_exist",
            format!("type={record_type} id={id}"),
            || {
                Ok(self
                    .state
                    .read()
                    .incoming_links
                    .get(&RecordKey::new(record_type, id))
                    .is_some_and(|sources| !sources.is_empty()))
            },
        )
    }

    fn get_links_to_record(&self, record_type: &str, id: &str) -> StoreResult<BTreeSet<Link>> {
        logged("record_links", format!("type={record_type} id={id}"), || {
            Ok(self
                .state
                .read()
                .incoming_links
                .get(&RecordKey::new(record_type, id))
                .cloned()
                .unwrap_or_default())
        })
    }

    fn get_total_number_of_records_for_types(
        &self,
        types: &[&str],
        filter: &Filter,
    ) -> StoreResult<u64> {
        logged("record_count", format!("types={}", list_types(types)), || {
            Ok(self.state.read().matching(types, filter).len() as u64)
        })
    }
}

/// Runs one read and logs its outcome.
fn logged<T>(
    event: &str,
    target: String,
    read: impl FnOnce() -> StoreResult<T>,
) -> StoreResult<T> {
    let started_at = Instant::now();
    let result = read();
    log_outcome(event, STORE, &target, started_at, &result);
    result
}

fn no_record_found(types: &[&str], id: &str) -> StoreError {
    StoreError::not_found(format!(
        "No record found for recordType(s): {}, with id: {id}.",
        describe_types(types)
    ))
}

fn not_found_when(action: &str, record_type: &str, id: &str) -> StoreError {
    StoreError::not_found(format!(
        "Record not found when {action} record with recordType: {record_type} and id: {id}."
    ))
}
