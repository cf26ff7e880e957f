//! Record, side-data and query model shared by every storage implementation.
//!
//! # Responsibility
//! - Define the values passed through the `RecordStorage` contract.
//! - Keep storage-agnostic matching rules (filters, row ranges) in one place.
//!
//! # Invariants
//! - A record is identified by `(type, id)`; no two records share a key.
//! - Terms and links are sets; duplicates collapse by structural equality.

pub mod filter;
pub mod record;
