//! Write-through facade over a database store and its in-memory replica.
//!
//! # Responsibility
//! - Serve every read from the memory store.
//! - Apply every write to the memory store first, then to the database store.
//!
//! # Invariants
//! - A rejected memory write never reaches the database.
//! - A database failure after a successful memory write is returned as is;
//!   the memory mutation is kept and both stores diverge until the next
//!   hydration.

use super::{Capability, RecordStorage, StoreError, StoreResult};
use crate::model::filter::Filter;
use crate::model::record::{Document, Link, RecordKey, StorageReadResult, StoredRecord};
use log::warn;
use std::collections::BTreeSet;

/// Storage facade that mirrors writes into `memory` and `database`.
pub struct CachedRecordStorage<D, M> {
    database: D,
    memory: M,
}

impl<D: RecordStorage, M: RecordStorage> CachedRecordStorage<D, M> {
    /// Wraps a hydrated memory store and its backing database store.
    ///
    /// # Errors
    /// - `StoreError::Unsupported` when `memory` lacks any capability or
    ///   `database` cannot write.
    pub fn try_new(database: D, memory: M) -> StoreResult<Self> {
        if let Some(capability) = Capability::ALL
            .into_iter()
            .find(|capability| !memory.supports(*capability))
        {
            return Err(StoreError::Unsupported { capability });
        }
        if !database.supports(Capability::Write) {
            return Err(StoreError::Unsupported {
                capability: Capability::Write,
            });
        }
        Ok(Self { database, memory })
    }

    pub fn database(&self) -> &D {
        &self.database
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }
}

fn diverged(event: &str, key: &RecordKey, err: StoreError) -> StoreError {
    warn!(
        "event={event} module=storage store=cached status=diverged key={key} error_code={} error={err}",
        err.code()
    );
    err
}

impl<D: RecordStorage, M: RecordStorage> RecordStorage for CachedRecordStorage<D, M> {
    fn read(&self, record_type: &str, id: &str) -> StoreResult<Document> {
        self.memory.read(record_type, id)
    }

    fn read_one_of(&self, types: &[&str], id: &str) -> StoreResult<Document> {
        self.memory.read_one_of(types, id)
    }

    fn create(&self, record: &StoredRecord) -> StoreResult<()> {
        self.memory.create(record)?;
        self.database
            .create(record)
            .map_err(|err| diverged("record_create", &record.key, err))
    }

    fn update(&self, record: &StoredRecord) -> StoreResult<()> {
        self.memory.update(record)?;
        self.database
            .update(record)
            .map_err(|err| diverged("record_update", &record.key, err))
    }

    fn delete_by_type_and_id(&self, record_type: &str, id: &str) -> StoreResult<()> {
        self.memory.delete_by_type_and_id(record_type, id)?;
        self.database
            .delete_by_type_and_id(record_type, id)
            .map_err(|err| diverged("record_delete", &RecordKey::new(record_type, id), err))
    }

    fn read_list(&self, types: &[&str], filter: &Filter) -> StoreResult<StorageReadResult> {
        self.memory.read_list(types, filter)
    }

    fn record_exists(&self, types: &[&str], id: &str) -> StoreResult<bool> {
        self.memory.record_exists(types, id)
    }

    fn links_exist_for_record(&self, record_type: &str, id: &str) -> StoreResult<bool> {
        self.memory.links_exist_for_record(record_type, id)
    }

    fn get_links_to_record(&self, record_type: &str, id: &str) -> StoreResult<BTreeSet<Link>> {
        self.memory.get_links_to_record(record_type, id)
    }

    fn get_total_number_of_records_for_types(
        &self,
        types: &[&str],
        filter: &Filter,
    ) -> StoreResult<u64> {
        self.memory
            .get_total_number_of_records_for_types(types, filter)
    }
}
