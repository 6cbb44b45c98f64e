//! Table definitions rendered from entity descriptors
//!
//! Schema creation is a caller-side step run before any persistence call;
//! the persistence engine itself never issues these statements.

use crate::Result;
use crate::metadata::MetadataResolver;
use crate::query::quote_identifier;
use super::entity::EntityDescriptor;
use super::field::{FieldKind, ValueType};

/// Render `CREATE TABLE IF NOT EXISTS` for one entity.
///
/// Integer identities become `INTEGER PRIMARY KEY` so that a bare insert
/// generates them. Foreign references take the affinity of the referenced
/// identity.
pub fn create_table_statement(resolver: &MetadataResolver, descriptor: &EntityDescriptor) -> Result<String> {
    let mut columns = Vec::new();

    for field in descriptor.columns() {
        let column = quote_identifier(field.column_or_err()?);
        let definition = match &field.kind {
            FieldKind::Identity(value_type) => {
                format!("{} {} PRIMARY KEY", column, value_type.sql_affinity())
            }
            FieldKind::Scalar(value_type) => column_with_affinity(column, *value_type),
            FieldKind::ForeignReference { target } => {
                let target_id = resolver.identity_field(target)?;
                let value_type = match target_id.kind {
                    FieldKind::Identity(value_type) => value_type,
                    _ => ValueType::Any,
                };
                column_with_affinity(column, value_type)
            }
            FieldKind::ForeignCollection { .. } => continue,
        };
        columns.push(definition);
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_identifier(&descriptor.table),
        columns.join(",\n    ")
    ))
}

fn column_with_affinity(column: String, value_type: ValueType) -> String {
    match value_type.sql_affinity() {
        "" => column,
        affinity => format!("{} {}", column, affinity),
    }
}

/// Statements for every mapped entity in the registry, in registration order
pub fn all_schema_statements(resolver: &MetadataResolver) -> Result<Vec<String>> {
    let mut stmts = Vec::new();
    for def in resolver.registry().entities() {
        if def.table_name().is_none() {
            continue;
        }
        let descriptor = resolver.describe(&def.name)?;
        stmts.push(create_table_statement(resolver, &descriptor)?);
    }
    Ok(stmts)
}
