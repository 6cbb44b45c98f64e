//! Schema metadata - entity and field declarations
//!
//! Entities are declared once (builder API or TOML schema file) and
//! registered in a `Registry`:
//! - `EntityDef`: table mapping, ordered base declarations, fields
//! - `FieldDef`: column, rename mapping and kind of one field
//!
//! The `MetadataResolver` turns declarations into cached descriptors.

pub mod ddl;
pub mod entity;
pub mod field;
pub mod file;

pub use entity::{EntityDef, EntityDescriptor, Layer, Registry, TableMapping};
pub use field::{FieldDef, FieldDescriptor, FieldKind, Relation, ValueType};
pub use file::{load_schema, parse_schema};
