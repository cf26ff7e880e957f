//! Behaviour shared by every `RecordStorage` implementation.
#![allow(dead_code)]

use docstore_core::{
    Document, Filter, FilterCondition, FilterPart, Link, RecordStorage, RelationalOperator,
    StorageTerm, StoreError, StoredRecord,
};
use serde_json::json;
use std::collections::BTreeSet;

pub fn document(record_type: &str, id: &str) -> Document {
    json!({ "type": record_type, "id": id })
}

pub fn person(id: &str, lastname: &str, age: &str) -> StoredRecord {
    StoredRecord::new("person", id, "testSystem", document("person", id)).with_terms([
        StorageTerm::new("lastnameTerm", "lastname", lastname),
        StorageTerm::new("ageTerm", "age", age),
    ])
}

pub fn equal(key: &str, value: &str) -> FilterCondition {
    FilterCondition::new(key, RelationalOperator::EqualTo, value)
}

/// `(type, id)` pairs of listed documents, in result order.
pub fn listed(
    storage: &dyn RecordStorage,
    types: &[&str],
    filter: &Filter,
) -> Vec<(String, String)> {
    storage
        .read_list(types, filter)
        .unwrap()
        .records
        .iter()
        .map(|doc| {
            (
                doc["type"].as_str().unwrap().to_string(),
                doc["id"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

fn pair(record_type: &str, id: &str) -> (String, String) {
    (record_type.to_string(), id.to_string())
}

pub fn assert_create_read_delete_round_trip(storage: &dyn RecordStorage) {
    let record = StoredRecord::new(
        "person",
        "42",
        "testSystem",
        json!({ "name": "Ann", "children": [{ "name": "Bo" }] }),
    )
    .with_terms([StorageTerm::new("nameTerm", "name", "Ann")])
    .with_links([Link::new("place", "7")]);

    storage.create(&record).unwrap();
    assert_eq!(storage.read("person", "42").unwrap(), record.document);
    assert_eq!(
        storage.read_one_of(&["place", "person"], "42").unwrap(),
        record.document
    );
    assert!(storage.record_exists(&["place", "person"], "42").unwrap());

    storage.delete_by_type_and_id("person", "42").unwrap();
    let err = storage.read("person", "42").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert_eq!(
        err.to_string(),
        "No record found for recordType(s): person, with id: 42."
    );
    assert!(!storage.record_exists(&["person"], "42").unwrap());
    assert!(!storage.links_exist_for_record("place", "7").unwrap());
}

pub fn assert_duplicate_create_conflicts(storage: &dyn RecordStorage) {
    let first = person("1", "Ann", "30");
    storage.create(&first).unwrap();

    let mut second = person("1", "Bo", "40");
    second.document = json!({ "replacement": true });
    let err = storage.create(&second).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
    assert_eq!(
        err.to_string(),
        "Record with type: person, and id: 1 already exists in storage."
    );

    assert_eq!(storage.read("person", "1").unwrap(), first.document);
    let filter = Filter::all().include(FilterPart::new([equal("lastname", "Bo")]));
    assert!(listed(storage, &["person"], &filter).is_empty());
}

pub fn assert_update_replaces_document_terms_and_links(storage: &dyn RecordStorage) {
    let original = person("1", "Ann", "30").with_links([Link::new("place", "7")]);
    storage.create(&original).unwrap();

    let updated = StoredRecord::new("person", "1", "otherSystem", json!({ "v": 2 }))
        .with_terms([StorageTerm::new("lastnameTerm", "lastname", "Bo")]);
    storage.update(&updated).unwrap();

    assert_eq!(storage.read("person", "1").unwrap(), json!({ "v": 2 }));
    let ann = Filter::all().include(FilterPart::new([equal("lastname", "Ann")]));
    let bo = Filter::all().include(FilterPart::new([equal("lastname", "Bo")]));
    let age = Filter::all().include(FilterPart::new([equal("age", "30")]));
    assert_eq!(
        storage
            .get_total_number_of_records_for_types(&["person"], &ann)
            .unwrap(),
        0
    );
    assert_eq!(
        storage
            .get_total_number_of_records_for_types(&["person"], &bo)
            .unwrap(),
        1
    );
    assert_eq!(
        storage
            .get_total_number_of_records_for_types(&["person"], &age)
            .unwrap(),
        0
    );
    assert!(!storage.links_exist_for_record("place", "7").unwrap());
}

pub fn assert_missing_records_are_not_found_on_write(storage: &dyn RecordStorage) {
    let err = storage.update(&person("404", "Ann", "30")).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert_eq!(
        err.to_string(),
        "Record not found when updating record with recordType: person and id: 404."
    );

    let err = storage.delete_by_type_and_id("person", "404").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert_eq!(
        err.to_string(),
        "Record not found when deleting record with recordType: person and id: 404."
    );

    let ann = Filter::all().include(FilterPart::new([equal("lastname", "Ann")]));
    assert_eq!(
        storage
            .get_total_number_of_records_for_types(&["person"], &ann)
            .unwrap(),
        0
    );
}

pub fn assert_read_one_of_rejects_ambiguous_ids(storage: &dyn RecordStorage) {
    storage
        .create(&StoredRecord::new("person", "1", "d", document("person", "1")))
        .unwrap();
    storage
        .create(&StoredRecord::new("place", "1", "d", document("place", "1")))
        .unwrap();

    let err = storage.read_one_of(&["person", "place"], "1").unwrap_err();
    assert!(matches!(err, StoreError::DataIntegrity { .. }));
    assert_eq!(
        err.to_string(),
        "Read did not generate a single result for recordType(s): [person, place], with id: 1."
    );

    let err = storage.read_one_of(&["person", "place"], "2").unwrap_err();
    assert_eq!(
        err.to_string(),
        "No record found for recordType(s): [person, place], with id: 2."
    );
}

fn seed_list_fixture(storage: &dyn RecordStorage) {
    storage.create(&person("1", "Ann", "30")).unwrap();
    storage.create(&person("2", "Bo", "40")).unwrap();
    storage.create(&person("3", "Ann", "50")).unwrap();
    storage
        .create(&StoredRecord::new("place", "2", "d", document("place", "2")))
        .unwrap();
    storage
        .create(&StoredRecord::new(
            "organisation",
            "9",
            "d",
            document("organisation", "9"),
        ))
        .unwrap();
}

pub fn assert_list_orders_by_id_then_type_descending(storage: &dyn RecordStorage) {
    seed_list_fixture(storage);

    assert_eq!(
        listed(storage, &["person"], &Filter::all()),
        vec![pair("person", "3"), pair("person", "2"), pair("person", "1")]
    );
    assert_eq!(
        listed(storage, &["person", "place"], &Filter::all()),
        vec![
            pair("person", "3"),
            pair("place", "2"),
            pair("person", "2"),
            pair("person", "1"),
        ]
    );
    let result = storage.read_list(&[], &Filter::all()).unwrap();
    assert!(result.records.is_empty());
    assert_eq!(result.total_number_of_matches, 0);
}

pub fn assert_list_filters_with_or_of_and_parts(storage: &dyn RecordStorage) {
    seed_list_fixture(storage);

    let ann = Filter::all().include(FilterPart::new([equal("lastname", "Ann")]));
    assert_eq!(
        listed(storage, &["person"], &ann),
        vec![pair("person", "3"), pair("person", "1")]
    );

    let old_ann_or_bo = Filter::all()
        .include(FilterPart::new([
            equal("lastname", "Ann"),
            FilterCondition::new("age", RelationalOperator::GreaterThan, "40"),
        ]))
        .include(FilterPart::new([equal("lastname", "Bo")]));
    assert_eq!(
        listed(storage, &["person"], &old_ann_or_bo),
        vec![pair("person", "3"), pair("person", "2")]
    );

    let not_ann = Filter::all().include(FilterPart::new([FilterCondition::new(
        "lastname",
        RelationalOperator::NotEqualTo,
        "Ann",
    )]));
    assert_eq!(listed(storage, &["person"], &not_ann), vec![pair("person", "2")]);

    let up_to_forty = Filter::all().include(FilterPart::new([FilterCondition::new(
        "age",
        RelationalOperator::LessThanOrEqualTo,
        "40",
    )]));
    assert_eq!(
        listed(storage, &["person"], &up_to_forty),
        vec![pair("person", "2"), pair("person", "1")]
    );

    let empty_part = Filter::all().include(FilterPart::default());
    assert_eq!(listed(storage, &["person"], &empty_part).len(), 3);

    let no_term_matches = Filter::all().include(FilterPart::new([equal("lastname", "Ann")]));
    assert!(listed(storage, &["place"], &no_term_matches).is_empty());
}

pub fn assert_list_pages_with_inclusive_row_numbers(storage: &dyn RecordStorage) {
    seed_list_fixture(storage);

    let page = Filter::all().with_row_range(Some(2), Some(3));
    let result = storage.read_list(&["person"], &page).unwrap();
    assert_eq!(result.total_number_of_matches, 3);
    assert_eq!(
        listed(storage, &["person"], &page),
        vec![pair("person", "2"), pair("person", "1")]
    );

    assert_eq!(
        listed(storage, &["person"], &Filter::all().with_row_range(Some(0), Some(1))),
        vec![pair("person", "3")]
    );
    assert_eq!(
        listed(storage, &["person"], &Filter::all().with_row_range(Some(3), None)),
        vec![pair("person", "1")]
    );

    let inverted = Filter::all().with_row_range(Some(3), Some(2));
    let result = storage.read_list(&["person"], &inverted).unwrap();
    assert!(result.records.is_empty());
    assert_eq!(result.total_number_of_matches, 3);

    let first_ann = Filter::all()
        .with_row_range(Some(1), Some(1))
        .include(FilterPart::new([equal("lastname", "Ann")]));
    assert_eq!(
        storage
            .get_total_number_of_records_for_types(&["person"], &first_ann)
            .unwrap(),
        2
    );
}

pub fn assert_links_are_queried_by_target(storage: &dyn RecordStorage) {
    storage
        .create(
            &StoredRecord::new("book", "b1", "d", document("book", "b1"))
                .with_links([Link::new("person", "42"), Link::new("person", "7")]),
        )
        .unwrap();
    storage
        .create(
            &StoredRecord::new("book", "b2", "d", document("book", "b2"))
                .with_links([Link::new("person", "42")]),
        )
        .unwrap();

    assert_eq!(
        storage.get_links_to_record("person", "42").unwrap(),
        [Link::new("book", "b1"), Link::new("book", "b2")]
            .into_iter()
            .collect::<BTreeSet<_>>()
    );
    assert!(storage.links_exist_for_record("person", "7").unwrap());
    assert!(!storage.links_exist_for_record("person", "99").unwrap());
    assert!(storage.get_links_to_record("person", "99").unwrap().is_empty());
    assert!(!storage.links_exist_for_record("book", "b1").unwrap());

    storage.delete_by_type_and_id("book", "b1").unwrap();
    assert!(!storage.links_exist_for_record("person", "7").unwrap());
    assert_eq!(
        storage.get_links_to_record("person", "42").unwrap(),
        [Link::new("book", "b2")].into_iter().collect::<BTreeSet<_>>()
    );
}

/// Create `person/42`, list by `lastname = Ann`, delete.
pub fn assert_person_scenario(storage: &dyn RecordStorage) {
    let record = person("42", "Ann", "30");
    storage.create(&record).unwrap();

    let filter = Filter::all().include(FilterPart::new([equal("lastname", "Ann")]));
    let result = storage.read_list(&["person"], &filter).unwrap();
    assert_eq!(result.records, vec![record.document.clone()]);
    assert_eq!(result.total_number_of_matches, 1);

    storage.delete_by_type_and_id("person", "42").unwrap();
    assert!(matches!(
        storage.read("person", "42"),
        Err(StoreError::NotFound { .. })
    ));
    let result = storage.read_list(&["person"], &filter).unwrap();
    assert_eq!(result.total_number_of_matches, 0);
}
