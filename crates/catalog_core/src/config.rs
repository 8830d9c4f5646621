//! Store selection from a single connection string.
//!
//! # Responsibility
//! - Parse `sqlite::memory:`, `sqlite:<path>`, bare database paths and
//!   `mongodb://` URIs into a `StoreConfig`.
//! - Open the selected backend with its schema ensured.
//!
//! # Invariants
//! - Parsing never touches the filesystem or the network.
//! - `StoreConfig::open` returns a store whose `create_schema` already ran.

use crate::store::catalog_store::{CatalogStore, StoreResult};
use crate::store::sqlite_store::SqliteCatalogStore;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Store string used when none is configured.
pub const DEFAULT_STORE: &str = "sqlite::memory:";

/// Store string for tools that need data to outlive one invocation.
pub const DEFAULT_FILE_STORE: &str = "sqlite:catalog.db";

const SQLITE_MEMORY: &str = "sqlite::memory:";
const SQLITE_PREFIX: &str = "sqlite:";
const SQLITE_EXTENSIONS: [&str; 3] = ["db", "sqlite", "sqlite3"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Empty,
    UnsupportedScheme(String),
    BackendDisabled(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "store string cannot be empty"),
            Self::UnsupportedScheme(value) => write!(
                f,
                "unsupported store `{value}`; expected sqlite::memory:, sqlite:<path>, <file>.db or mongodb://"
            ),
            Self::BackendDisabled(backend) => {
                write!(f, "store backend `{backend}` is not compiled into this build")
            }
        }
    }
}

impl Error for ConfigError {}

/// Backend selection for a catalog store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    SqliteMemory,
    SqliteFile(PathBuf),
    Mongo { uri: String, database: String },
}

impl StoreConfig {
    /// Parses a store string.
    ///
    /// # Errors
    /// - `ConfigError::Empty` for blank input.
    /// - `ConfigError::UnsupportedScheme` for anything that is not a SQLite
    ///   target or a MongoDB URI.
    /// - `ConfigError::BackendDisabled` for a MongoDB URI when the `mongo`
    ///   feature is off.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Empty);
        }

        if trimmed == SQLITE_MEMORY {
            return Ok(Self::SqliteMemory);
        }

        if trimmed.starts_with("mongodb://") || trimmed.starts_with("mongodb+srv://") {
            return mongo_config(trimmed);
        }

        if let Some(path) = trimmed.strip_prefix(SQLITE_PREFIX) {
            let path = path.trim_start_matches("//");
            if path.is_empty() {
                return Err(ConfigError::UnsupportedScheme(trimmed.to_string()));
            }
            return Ok(Self::SqliteFile(PathBuf::from(path)));
        }

        let path = PathBuf::from(trimmed);
        let has_db_extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| SQLITE_EXTENSIONS.contains(&extension));
        if has_db_extension && !trimmed.contains("://") {
            return Ok(Self::SqliteFile(path));
        }

        Err(ConfigError::UnsupportedScheme(trimmed.to_string()))
    }

    /// Overrides the MongoDB database name. No effect on SQLite targets.
    pub fn with_database(self, name: impl Into<String>) -> Self {
        match self {
            Self::Mongo { uri, .. } => Self::Mongo {
                uri,
                database: name.into(),
            },
            other => other,
        }
    }

    /// Backend name matching `CatalogStore::backend`.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::SqliteMemory | Self::SqliteFile(_) => "sqlite",
            Self::Mongo { .. } => "mongo",
        }
    }

    /// Opens the configured store and ensures its schema.
    pub fn open(&self) -> StoreResult<Box<dyn CatalogStore + Send>> {
        let store: Box<dyn CatalogStore + Send> = match self {
            Self::SqliteMemory => Box::new(SqliteCatalogStore::open_in_memory()?),
            Self::SqliteFile(path) => Box::new(SqliteCatalogStore::open(path)?),
            Self::Mongo { uri, database } => open_mongo(uri, database)?,
        };
        store.create_schema()?;
        Ok(store)
    }

    /// Rejects configurations whose backend is not compiled in.
    pub fn ensure_supported(&self) -> Result<(), ConfigError> {
        if matches!(self, Self::Mongo { .. }) && !cfg!(feature = "mongo") {
            return Err(ConfigError::BackendDisabled("mongo"));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::SqliteMemory
    }
}

#[cfg(feature = "mongo")]
fn mongo_config(uri: &str) -> Result<StoreConfig, ConfigError> {
    Ok(StoreConfig::Mongo {
        uri: uri.to_string(),
        database: crate::store::mongo_store::DEFAULT_DATABASE.to_string(),
    })
}

#[cfg(not(feature = "mongo"))]
fn mongo_config(_uri: &str) -> Result<StoreConfig, ConfigError> {
    Err(ConfigError::BackendDisabled("mongo"))
}

#[cfg(feature = "mongo")]
fn open_mongo(uri: &str, database: &str) -> StoreResult<Box<dyn CatalogStore + Send>> {
    let store = crate::store::mongo_store::MongoCatalogStore::connect(uri, database)?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "mongo"))]
fn open_mongo(_uri: &str, _database: &str) -> StoreResult<Box<dyn CatalogStore + Send>> {
    Err(crate::store::catalog_store::StoreError::InvalidData(
        ConfigError::BackendDisabled("mongo").to_string(),
    ))
}
