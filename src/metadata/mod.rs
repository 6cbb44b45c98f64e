//! Metadata layer - cached descriptor lookups
//!
//! Pure lookup and caching over a `Registry`, no I/O.

pub mod resolver;

pub use resolver::MetadataResolver;
