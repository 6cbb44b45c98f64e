//! Persistence Engine - recursive document-to-row writes
//!
//! One transaction per top-level call. Nested objects, references and
//! collections are written recursively inside that transaction; any failure
//! rolls the whole call back.

pub mod engine;
pub mod options;
pub mod thread;

pub use engine::Persister;
pub use options::PersistOptions;
pub use thread::{is_ui_thread, mark_ui_thread};
