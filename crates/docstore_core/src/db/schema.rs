//! Fixed table and column names of the record schema.
//!
//! Must stay in sync with `migrations/*.sql`.

/// One row per record, primary key `(type, id)`.
pub const RECORD_TABLE: &str = "record";
pub const RECORD_TYPE: &str = "type";
pub const RECORD_ID: &str = "id";
pub const RECORD_DATA_DIVIDER: &str = "datadivider";
pub const RECORD_DATA: &str = "data";

/// Denormalized storage terms, owned by `(recordtype, recordid)`.
pub const STORAGE_TERM_TABLE: &str = "storageterm";
pub const TERM_RECORD_TYPE: &str = "recordtype";
pub const TERM_RECORD_ID: &str = "recordid";
pub const TERM_ID: &str = "storagetermid";
pub const TERM_KEY: &str = "storagekey";
pub const TERM_VALUE: &str = "value";

/// Outbound links, owned by `(fromtype, fromid)`.
pub const LINK_TABLE: &str = "link";
pub const LINK_FROM_TYPE: &str = "fromtype";
pub const LINK_FROM_ID: &str = "fromid";
pub const LINK_TO_TYPE: &str = "totype";
pub const LINK_TO_ID: &str = "toid";
