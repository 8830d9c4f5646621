//! Catalog store contracts and backend implementations.
//!
//! # Responsibility
//! - Define one store interface over authors and books.
//! - Keep SQL and document-database details behind that interface.
//!
//! # Invariants
//! - Write paths validate input before any mutation.
//! - Missing records surface as `false`/`None`/empty results, never errors.
//! - A closed store rejects every operation with `StoreError::Closed`.

pub mod catalog_store;
#[cfg(feature = "mongo")]
pub mod mongo_store;
pub mod sqlite_store;
