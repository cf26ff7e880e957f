//! Relational document store with a write-through in-memory replica.
//!
//! Records are keyed by `(type, id)` and carry storage terms (indexed
//! key/value attributes) and outbound links next to their document.

pub mod codec;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod sql;
pub mod storage;

pub use codec::{CodecError, DocumentCodec, JsonDocumentCodec};
pub use config::{load_config, parse_config, ConfigError, StorageConfig};
pub use db::{Database, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::filter::{Filter, FilterCondition, FilterPart, RelationalOperator};
pub use model::record::{Document, Link, RecordKey, StorageReadResult, StorageTerm, StoredRecord};
pub use storage::cached::CachedRecordStorage;
pub use storage::database::DatabaseRecordStorage;
pub use storage::memory::InMemoryRecordStorage;
pub use storage::populator::{populate, PopulateSummary};
pub use storage::provider::StorageProvider;
pub use storage::{Capability, RecordStorage, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
