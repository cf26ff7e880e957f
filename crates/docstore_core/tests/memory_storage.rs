mod common;

use docstore_core::{Capability, InMemoryRecordStorage, RecordStorage, StoreError, StoredRecord};
use serde_json::json;
use std::sync::Arc;
use std::thread;

#[test]
fn create_read_delete_round_trip() {
    common::assert_create_read_delete_round_trip(&InMemoryRecordStorage::new());
}

#[test]
fn duplicate_create_conflicts() {
    common::assert_duplicate_create_conflicts(&InMemoryRecordStorage::new());
}

#[test]
fn update_replaces_document_terms_and_links() {
    common::assert_update_replaces_document_terms_and_links(&InMemoryRecordStorage::new());
}

#[test]
fn missing_records_are_not_found_on_write() {
    common::assert_missing_records_are_not_found_on_write(&InMemoryRecordStorage::new());
}

#[test]
fn read_one_of_rejects_ambiguous_ids() {
    common::assert_read_one_of_rejects_ambiguous_ids(&InMemoryRecordStorage::new());
}

#[test]
fn list_orders_by_id_then_type_descending() {
    common::assert_list_orders_by_id_then_type_descending(&InMemoryRecordStorage::new());
}

#[test]
fn list_filters_with_or_of_and_parts() {
    common::assert_list_filters_with_or_of_and_parts(&InMemoryRecordStorage::new());
}

#[test]
fn list_pages_with_inclusive_row_numbers() {
    common::assert_list_pages_with_inclusive_row_numbers(&InMemoryRecordStorage::new());
}

#[test]
fn links_are_queried_by_target() {
    common::assert_links_are_queried_by_target(&InMemoryRecordStorage::new());
}

#[test]
fn person_scenario() {
    common::assert_person_scenario(&InMemoryRecordStorage::new());
}

#[test]
fn supports_every_capability() {
    let storage = InMemoryRecordStorage::new();
    assert!(Capability::ALL
        .into_iter()
        .all(|capability| storage.supports(capability)));
}

#[test]
fn stored_record_is_a_snapshot_of_the_caller_value() {
    let storage = InMemoryRecordStorage::new();
    let mut record = StoredRecord::new("person", "1", "d", json!({ "v": 1 }));
    storage.create(&record).unwrap();

    record.document = json!({ "v": 2 });
    assert_eq!(storage.read("person", "1").unwrap(), json!({ "v": 1 }));
}

#[test]
fn concurrent_creates_of_the_same_key_admit_one_winner() {
    let storage = Arc::new(InMemoryRecordStorage::new());
    let handles = (0..8)
        .map(|attempt| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || {
                storage.create(&StoredRecord::new(
                    "person",
                    "1",
                    "d",
                    json!({ "attempt": attempt }),
                ))
            })
        })
        .collect::<Vec<_>>();

    let results = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, StoreError::Conflict { .. })));
    assert_eq!(storage.len(), 1);
}
