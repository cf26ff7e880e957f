//! Stored record and its denormalized side data.
//!
//! # Invariants
//! - `StoredRecord::terms` and `StoredRecord::links` are replaced as a whole on
//!   update, never merged.
//! - A `Link` names the other end of a reference; its direction comes from
//!   the operation that produced it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Opaque structured payload of a record.
pub type Document = serde_json::Value;

/// Identity of a record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    #[serde(rename = "type")]
    pub record_type: String,
    pub id: String,
}

impl RecordKey {
    pub fn new(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            id: id.into(),
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.record_type, self.id)
    }
}

/// One indexed attribute extracted from a record's document.
///
/// `term_id` names the term definition and is not unique across owners.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageTerm {
    pub term_id: String,
    pub key: String,
    pub value: String,
}

impl StorageTerm {
    pub fn new(
        term_id: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            term_id: term_id.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Reference to another record by `(type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "type")]
    pub record_type: String,
    pub id: String,
}

impl Link {
    pub fn new(record_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            id: id.into(),
        }
    }
}

/// Everything written by `create` and `update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: RecordKey,
    /// Tenant/partition tag.
    pub data_divider: String,
    pub document: Document,
    #[serde(default)]
    pub terms: BTreeSet<StorageTerm>,
    /// Outbound links from this record.
    #[serde(default)]
    pub links: BTreeSet<Link>,
}

impl StoredRecord {
    /// Creates a record without terms or links.
    pub fn new(
        record_type: impl Into<String>,
        id: impl Into<String>,
        data_divider: impl Into<String>,
        document: Document,
    ) -> Self {
        Self {
            key: RecordKey::new(record_type, id),
            data_divider: data_divider.into(),
            document,
            terms: BTreeSet::new(),
            links: BTreeSet::new(),
        }
    }

    pub fn with_terms(mut self, terms: impl IntoIterator<Item = StorageTerm>) -> Self {
        self.terms = terms.into_iter().collect();
        self
    }

    pub fn with_links(mut self, links: impl IntoIterator<Item = Link>) -> Self {
        self.links = links.into_iter().collect();
        self
    }

    pub fn record_type(&self) -> &str {
        &self.key.record_type
    }

    pub fn id(&self) -> &str {
        &self.key.id
    }
}

/// Result page of a list query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StorageReadResult {
    pub records: Vec<Document>,
    /// Matches regardless of the requested row range.
    pub total_number_of_matches: u64,
}
