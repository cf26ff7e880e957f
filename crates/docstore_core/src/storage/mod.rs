//! Record storage contract and its implementations.
//!
//! # Responsibility
//! - Define the `RecordStorage` contract keyed by `(type, id)`.
//! - Provide the SQLite store, the in-memory store, the write-through facade
//!   and the one-time hydration from database into memory.
//!
//! # Invariants
//! - Storage APIs return semantic errors (`NotFound`, `Conflict`) next to
//!   integrity and transport failures; nothing is retried or swallowed.
//! - Error messages name the operation, record type(s) and id.

use crate::model::filter::Filter;
use crate::model::record::{Document, Link, StorageReadResult, StoredRecord};
use log::{debug, error};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub mod cached;
pub mod database;
pub mod memory;
pub mod populator;
pub mod provider;

pub type StoreResult<T> = Result<T, StoreError>;

type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Operation group a store may or may not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `read`, `read_one_of`, `record_exists`.
    Read,
    /// `read_list`, `get_total_number_of_records_for_types`.
    List,
    /// `links_exist_for_record`, `get_links_to_record`.
    LinkQueries,
    /// `create`, `update`, `delete_by_type_and_id`.
    Write,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Read,
        Capability::List,
        Capability::LinkQueries,
        Capability::Write,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::List => "list",
            Self::LinkQueries => "link_queries",
            Self::Write => "write",
        }
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure returned by every `RecordStorage` operation.
#[derive(Debug)]
pub enum StoreError {
    /// The targeted record (or record type) does not exist.
    NotFound {
        message: String,
        source: Option<BoxError>,
    },
    /// A create collided with an existing `(type, id)`.
    Conflict {
        message: String,
        source: Option<BoxError>,
    },
    /// A single-row read found an anomalous number of rows.
    DataIntegrity {
        message: String,
        source: Option<BoxError>,
    },
    /// Any other failure of the underlying storage.
    Storage {
        message: String,
        source: Option<BoxError>,
    },
    /// The store does not implement the operation group.
    Unsupported { capability: Capability },
}

impl StoreError {
    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the lower-level cause.
    pub(crate) fn caused_by(mut self, cause: impl Into<BoxError>) -> Self {
        match &mut self {
            Self::NotFound { source, .. }
            | Self::Conflict { source, .. }
            | Self::DataIntegrity { source, .. }
            | Self::Storage { source, .. } => *source = Some(cause.into()),
            Self::Unsupported { .. } => {}
        }
        self
    }

    /// Stable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::DataIntegrity { .. } => "data_integrity",
            Self::Storage { .. } => "storage_error",
            Self::Unsupported { .. } => "unsupported",
        }
    }

    /// `NotFound` and `Conflict` are ordinary outcomes for callers; the rest
    /// are faults.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Conflict { .. })
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { message, .. }
            | Self::Conflict { message, .. }
            | Self::DataIntegrity { message, .. }
            | Self::Storage { message, .. } => f.write_str(message),
            Self::Unsupported { capability } => {
                write!(f, "storage does not support {capability} operations")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound { source, .. }
            | Self::Conflict { source, .. }
            | Self::DataIntegrity { source, .. }
            | Self::Storage { source, .. } => source
                .as_deref()
                .map(|err| err as &(dyn Error + 'static)),
            Self::Unsupported { .. } => None,
        }
    }
}

/// Storage of documents with term and link side data, keyed by `(type, id)`.
///
/// Implementations must be safe to share between threads.
pub trait RecordStorage: Send + Sync {
    /// Reads the document of one record.
    fn read(&self, record_type: &str, id: &str) -> StoreResult<Document>;

    /// Reads the document of the single record with `id` among `types`.
    ///
    /// # Errors
    /// - `DataIntegrity` when more than one of the types holds `id`.
    fn read_one_of(&self, types: &[&str], id: &str) -> StoreResult<Document>;

    /// Stores a new record with its terms and links as one unit.
    fn create(&self, record: &StoredRecord) -> StoreResult<()>;

    /// Replaces document, data divider, terms and links of an existing record.
    fn update(&self, record: &StoredRecord) -> StoreResult<()>;

    /// Removes a record together with its terms and outbound links.
    fn delete_by_type_and_id(&self, record_type: &str, id: &str) -> StoreResult<()>;

    /// Lists documents of `types` matching `filter`, ordered by id descending.
    fn read_list(&self, types: &[&str], filter: &Filter) -> StoreResult<StorageReadResult>;

    fn record_exists(&self, types: &[&str], id: &str) -> StoreResult<bool>;

    /// True when any record links to `(record_type, id)`.
    fn links_exist_for_record(&self, record_type: &str, id: &str) -> StoreResult<bool>;

    /// Returns the records linking to `(record_type, id)`, as links.
    fn get_links_to_record(&self, record_type: &str, id: &str) -> StoreResult<BTreeSet<Link>>;

    /// Counts records of `types` matching `filter`, ignoring its row range.
    fn get_total_number_of_records_for_types(
        &self,
        types: &[&str],
        filter: &Filter,
    ) -> StoreResult<u64>;

    fn supports(&self, _capability: Capability) -> bool {
        true
    }
}

/// `a` for one type, `[a, b]` for several.
pub(crate) fn describe_types(types: &[&str]) -> String {
    match types {
        [single] => (*single).to_string(),
        _ => list_types(types),
    }
}

pub(crate) fn list_types(types: &[&str]) -> String {
    format!("[{}]", types.join(", "))
}

/// Emits one `event=... module=storage` line for a finished operation.
///
/// Expected outcomes (`NotFound`, `Conflict`) stay at debug level.
pub(crate) fn log_outcome<T>(
    event: &str,
    store: &str,
    target: &str,
    started_at: Instant,
    result: &StoreResult<T>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => debug!(
            "event={event} module=storage store={store} status=ok {target} duration_ms={duration_ms}"
        ),
        Err(err) if err.is_expected() => debug!(
            "event={event} module=storage store={store} status=error {target} duration_ms={duration_ms} error_code={}",
            err.code()
        ),
        Err(err) => error!(
            "event={event} module=storage store={store} status=error {target} duration_ms={duration_ms} error_code={} error={err}",
            err.code()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{describe_types, list_types, Capability, StoreError};
    use std::error::Error;

    #[test]
    fn describe_types_brackets_only_multiple_types() {
        assert_eq!(describe_types(&["person"]), "person");
        assert_eq!(describe_types(&["person", "place"]), "[person, place]");
        assert_eq!(list_types(&["person"]), "[person]");
    }

    #[test]
    fn caused_by_exposes_source_and_keeps_message() {
        let cause = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = StoreError::storage("Storage exception when creating record").caused_by(cause);
        assert_eq!(err.to_string(), "Storage exception when creating record");
        assert_eq!(err.source().unwrap().to_string(), "disk gone");
        assert_eq!(err.code(), "storage_error");
        assert!(!err.is_expected());
    }

    #[test]
    fn unsupported_names_capability() {
        let err = StoreError::Unsupported {
            capability: Capability::LinkQueries,
        };
        assert_eq!(
            err.to_string(),
            "storage does not support link_queries operations"
        );
        assert!(err.source().is_none());
    }
}
