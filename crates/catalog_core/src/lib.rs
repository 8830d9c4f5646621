//! Core catalog logic: authors, books and the stores that persist them.
//! Every binary goes through `CatalogService` over a `CatalogStore`.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use model::author::{Author, AuthorBooks};
pub use model::book::{Book, BookSummary, BookUpdate, BookWithAuthor, NewBook};
pub use model::record_id::RecordId;
pub use model::ModelValidationError;
#[cfg(feature = "mongo")]
pub use store::mongo_store::MongoCatalogStore;
pub use service::catalog_service::{CatalogService, DemoReport};
pub use store::catalog_store::{CatalogStore, StoreError, StoreResult};
pub use store::sqlite_store::SqliteCatalogStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
