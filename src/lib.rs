//! # Rowsmith - JSON documents into relational rows
//!
//! Declarative, schema-driven persistence of nested JSON into SQLite.
//!
//! Rowsmith provides:
//! - Entity and field declarations (builder API or TOML schema files)
//! - A metadata resolver with memoized field lookups across base declarations
//! - A recursive persistence engine with upsert-by-identity, foreign
//!   references and one-to-many / many-to-many synchronization
//! - One transaction per top-level call, rolled back on any failure

pub mod identity;
pub mod schema;
pub mod metadata;
pub mod query;
pub mod storage;
pub mod persist;
pub mod document;
pub mod config;
pub mod ui;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use identity::Identity;
pub use schema::{EntityDef, FieldDef, Registry, ValueType};
pub use metadata::MetadataResolver;
pub use storage::SqliteStore;
pub use persist::{PersistOptions, Persister};

/// Result type alias for Rowsmith operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Rowsmith operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Write to {table} failed: {reason}")]
    StorageWrite { table: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON path error: {0}")]
    JsonPath(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
