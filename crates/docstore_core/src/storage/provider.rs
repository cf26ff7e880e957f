//! Start-once wiring of the record storage from `StorageConfig`.
//!
//! # Responsibility
//! - Open the configured database and build the store exposed to callers.
//! - Hydrate the in-memory replica before the cached facade is handed out.
//!
//! # Invariants
//! - Storage is started at most once per provider; later calls return the
//!   same instance.
//! - A failed start exposes nothing; the next call retries from scratch.

use super::cached::CachedRecordStorage;
use super::database::DatabaseRecordStorage;
use super::memory::InMemoryRecordStorage;
use super::populator::{populate, PopulateSummary};
use super::{RecordStorage, StoreError, StoreResult};
use crate::config::StorageConfig;
use crate::db::Database;
use log::{error, info};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Instant;

struct StartedStorage {
    storage: Arc<dyn RecordStorage>,
    summary: Option<PopulateSummary>,
}

/// Owns the process-wide record storage built from one configuration.
pub struct StorageProvider {
    config: StorageConfig,
    started: OnceCell<StartedStorage>,
}

impl StorageProvider {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            started: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the started storage, starting it on first use.
    ///
    /// # Errors
    /// - `StoreError::Storage` when the database cannot be opened.
    /// - Any error raised while hydrating the in-memory replica.
    pub fn record_storage(&self) -> StoreResult<Arc<dyn RecordStorage>> {
        self.started
            .get_or_try_init(|| start(&self.config))
            .map(|started| Arc::clone(&started.storage))
    }

    /// Counts loaded by hydration; `None` before start or when uncached.
    pub fn populate_summary(&self) -> Option<PopulateSummary> {
        self.started.get().and_then(|started| started.summary)
    }
}

fn start(config: &StorageConfig) -> StoreResult<StartedStorage> {
    let started_at = Instant::now();
    let mode = storage_mode(config);
    info!("event=storage_start module=storage status=start mode={mode}");

    let result = build(config);
    match &result {
        Ok(_) => info!(
            "event=storage_start module=storage status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=storage_start module=storage status=error mode={mode} duration_ms={} error_code={} error={err}",
            started_at.elapsed().as_millis(),
            err.code()
        ),
    }
    result
}

fn build(config: &StorageConfig) -> StoreResult<StartedStorage> {
    let database = match &config.database_path {
        Some(path) => Database::open(path),
        None => Database::open_in_memory(),
    }
    .map_err(|err| {
        StoreError::storage("Could not open database for record storage.").caused_by(err)
    })?;
    let database_storage = DatabaseRecordStorage::new(database);

    if config.do_not_cache {
        return Ok(StartedStorage {
            storage: Arc::new(database_storage),
            summary: None,
        });
    }

    let memory = InMemoryRecordStorage::new();
    let summary = populate(database_storage.database(), database_storage.codec(), &memory)?;
    let cached = CachedRecordStorage::try_new(database_storage, memory)?;
    Ok(StartedStorage {
        storage: Arc::new(cached),
        summary: Some(summary),
    })
}

fn storage_mode(config: &StorageConfig) -> &'static str {
    if config.do_not_cache {
        "database"
    } else {
        "cached"
    }
}
