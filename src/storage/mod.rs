//! Storage Layer - SQLite primitives the persistence engine writes through
//!
//! - existence checks by column value
//! - inserts (explicit values or defaults), updates and deletes with
//!   caller-supplied where clauses
//! - immediate transactions that roll back on drop

pub mod sqlite;

pub use sqlite::{ColumnValues, DbStats, SqliteStore};
