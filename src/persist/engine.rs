//! Persistence engine implementation
//!
//! Writes a document tree into rows:
//! - Scalars and foreign references become columns of the owning row
//! - Nested objects are persisted first and referenced by identity
//! - Many-to-many collections replace the owner's junction rows
//! - One-to-many collections point their members at the owner and, unless
//!   disabled, delete members that disappeared from the document

use std::sync::Arc;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};
use crate::{Error, Result};
use crate::identity::Identity;
use crate::metadata::MetadataResolver;
use crate::query::{identity_literal, in_clause_of, quote_identifier};
use crate::schema::field::json_kind;
use crate::schema::{FieldDescriptor, FieldKind, Relation, ValueType};
use crate::storage::{ColumnValues, SqliteStore};
use super::options::PersistOptions;
use super::thread::warn_if_on_ui_thread;

/// Persists documents through a store, using the resolver's metadata
pub struct Persister<'a> {
    store: &'a SqliteStore,
    resolver: &'a MetadataResolver,
    options: PersistOptions,
}

/// Identity value seen while walking a document
struct StagedIdentity {
    field: Arc<FieldDescriptor>,
    value: SqlValue,
}

impl<'a> Persister<'a> {
    /// Create a persister with default options
    pub fn new(store: &'a SqliteStore, resolver: &'a MetadataResolver) -> Self {
        Self::with_options(store, resolver, PersistOptions::default())
    }

    pub fn with_options(
        store: &'a SqliteStore,
        resolver: &'a MetadataResolver,
        options: PersistOptions,
    ) -> Self {
        Self { store, resolver, options }
    }

    pub fn options(&self) -> PersistOptions {
        self.options
    }

    /// Persist one object and its nested subgraph in a single transaction.
    ///
    /// Returns the identity of the top-level row. On any error nothing from
    /// this call is left in the database.
    pub fn persist_object(&self, type_name: &str, document: &Value) -> Result<Identity> {
        warn_if_on_ui_thread("persist_object");
        let object = as_object(type_name, document)?;

        let tx = self.store.begin()?;
        let identity = self.persist_object_internal(type_name, object)?;
        tx.commit()?;

        tracing::info!("persisted {} {}", type_name, identity);
        Ok(identity)
    }

    /// Persist every object of an array in a single transaction.
    ///
    /// Identities are returned in input order.
    pub fn persist_array(&self, type_name: &str, documents: &Value) -> Result<Vec<Identity>> {
        warn_if_on_ui_thread("persist_array");
        let items = documents.as_array().ok_or_else(|| {
            Error::MalformedDocument(format!(
                "expected an array of {} but found {}",
                type_name,
                json_kind(documents)
            ))
        })?;

        let tx = self.store.begin()?;
        let ids = self.persist_objects(type_name, items)?;
        tx.commit()?;

        tracing::info!("persisted {} {} rows", ids.len(), type_name);
        Ok(ids)
    }

    fn persist_objects(&self, type_name: &str, items: &[Value]) -> Result<Vec<Identity>> {
        items
            .iter()
            .map(|item| self.persist_object_internal(type_name, as_object(type_name, item)?))
            .collect()
    }

    fn persist_object_internal(&self, type_name: &str, object: &Map<String, Value>) -> Result<Identity> {
        let descriptor = self.resolver.describe(type_name)?;

        let mut identity: Option<StagedIdentity> = None;
        let mut columns: ColumnValues = Vec::new();
        let mut collections: Vec<(Arc<FieldDescriptor>, &Value)> = Vec::new();

        for (key, value) in object {
            let Some(field) = self.resolver.field_for(type_name, key)? else {
                if self.options.warn_unmapped_keys {
                    tracing::warn!("no field found in {} for key '{}', skipping", type_name, key);
                }
                continue;
            };

            match &field.kind {
                FieldKind::Identity(value_type) => {
                    if let Some(previous) = &identity {
                        return Err(Error::MalformedDocument(format!(
                            "{} sets identity '{}' twice (key '{}')",
                            type_name, previous.field.name, key
                        )));
                    }
                    let value = value_type.coerce(value)?;
                    identity = Some(StagedIdentity { field: field.clone(), value });
                }
                FieldKind::Scalar(value_type) => {
                    let column = field.column_or_err()?.to_string();
                    columns.push((column, value_type.coerce(value)?));
                }
                FieldKind::ForeignReference { target } => {
                    let column = field.column_or_err()?.to_string();
                    let reference = self.resolve_reference(target, value)?;
                    columns.push((column, reference));
                }
                FieldKind::ForeignCollection { .. } => {
                    if !value.is_array() && !value.is_null() {
                        return Err(Error::MalformedDocument(format!(
                            "expected an array for {}.{} but found {}",
                            type_name,
                            field.name,
                            json_kind(value)
                        )));
                    }
                    collections.push((field.clone(), value));
                }
            }
        }

        let id = self.resolve_identity(&descriptor.table, type_name, identity)?;

        if !columns.is_empty() {
            let id_field = self.resolver.identity_field(type_name)?;
            let where_clause = format!("{} = ?", quote_identifier(id_field.column_or_err()?));
            self.store
                .update_where(&descriptor.table, &columns, &where_clause, &[id.to_sql_value()])?;
        }
        tracing::debug!("imported {} {} ({} columns)", type_name, id, columns.len());

        for (field, value) in collections {
            let Some(items) = value.as_array() else {
                tracing::warn!(
                    "{}.{} is null, leaving existing links of {} untouched",
                    type_name, field.name, id
                );
                continue;
            };
            match &field.kind {
                FieldKind::ForeignCollection { element, relation: Relation::ManyToMany { target } } => {
                    self.sync_many_to_many(type_name, &id, element, target, items)?;
                }
                FieldKind::ForeignCollection { element, relation: Relation::OneToMany { value_column } } => {
                    self.sync_one_to_many(type_name, &id, element, value_column.as_deref(), items)?;
                }
                _ => {}
            }
        }

        Ok(id)
    }

    /// Find or create the row for a staged identity.
    ///
    /// An absent or null identity inserts a bare row and reads the generated
    /// identity back. Existing rows are never modified here.
    fn resolve_identity(
        &self,
        table: &str,
        type_name: &str,
        staged: Option<StagedIdentity>,
    ) -> Result<Identity> {
        if let Some(StagedIdentity { field, value }) = staged.filter(|s| s.value != SqlValue::Null) {
            let column = field.column_or_err()?;
            if !self.store.row_exists(table, column, &value)? {
                self.store.insert_row(table, &[(column.to_string(), value.clone())])?;
            }
            return Identity::from_sql(value, identity_type(&field));
        }

        let field = self.resolver.identity_field(type_name)?;
        let rowid = self.store.insert_row(table, &[])?;
        self.generated_identity(table, &field, rowid)
    }

    /// Read back the identity of a freshly inserted row
    fn generated_identity(&self, table: &str, id_field: &FieldDescriptor, rowid: i64) -> Result<Identity> {
        let column = id_field.column_or_err()?;
        match self.store.read_column_by_rowid(table, column, rowid)? {
            SqlValue::Null => Err(Error::StorageWrite {
                table: table.to_string(),
                reason: format!("insert produced no value for identity column '{}'", column),
            }),
            value => Identity::from_sql(value, identity_type(id_field)),
        }
    }

    /// Value stored in a foreign reference column
    fn resolve_reference(&self, target: &str, value: &Value) -> Result<SqlValue> {
        match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Object(nested) => Ok(self.persist_object_internal(target, nested)?.to_sql_value()),
            Value::Array(_) => Err(Error::MalformedDocument(format!(
                "expected an object or identity for a {} reference but found an array",
                target
            ))),
            bare => {
                let id_field = self.resolver.identity_field(target)?;
                identity_type(&id_field).coerce(bare)
            }
        }
    }

    /// Replace the owner's junction rows with one row per persisted target
    fn sync_many_to_many(
        &self,
        owner_type: &str,
        owner: &Identity,
        junction: &str,
        target: &str,
        items: &[Value],
    ) -> Result<()> {
        let junction_table = self.resolver.describe(junction)?.table.clone();
        let owner_field = self.resolver.foreign_field(junction, owner_type)?.ok_or_else(|| {
            Error::Schema(format!("no {} reference found in junction {}", owner_type, junction))
        })?;
        let target_field = self.resolver.first_field_of_type(junction, target)?.ok_or_else(|| {
            Error::Schema(format!("no {} reference found in junction {}", target, junction))
        })?;
        let owner_column = owner_field.column_or_err()?;
        let target_column = target_field.column_or_err()?;

        let targets = self.persist_objects(target, items)?;

        let removed = self.store.delete_where(
            &junction_table,
            &format!("{} = {}", quote_identifier(owner_column), identity_literal(owner)?),
            &[],
        )?;
        for target_id in &targets {
            self.store.insert_row(
                &junction_table,
                &[
                    (owner_column.to_string(), owner.to_sql_value()),
                    (target_column.to_string(), target_id.to_sql_value()),
                ],
            )?;
        }

        tracing::debug!(
            "linked {} {} to {} {} (replaced {})",
            owner_type, owner, targets.len(), target, removed
        );
        Ok(())
    }

    /// Point persisted members at the owner and drop members no longer listed
    fn sync_one_to_many(
        &self,
        owner_type: &str,
        owner: &Identity,
        element: &str,
        value_column: Option<&str>,
        items: &[Value],
    ) -> Result<()> {
        let element_table = self.resolver.describe(element)?.table.clone();
        let id_field = self.resolver.identity_field(element)?;
        let owner_field = self.resolver.foreign_field(element, owner_type)?.ok_or_else(|| {
            Error::Schema(format!("no {} reference found in {}", owner_type, element))
        })?;
        let id_column = id_field.column_or_err()?;
        let owner_column = owner_field.column_or_err()?;

        let ids = match value_column {
            Some(value_column) => self.persist_scalars(&element_table, &id_field, value_column, items)?,
            None => self.persist_objects(element, items)?,
        };

        let clause = in_clause_of(&ids);
        if !clause.is_empty() {
            self.store.update_where(
                &element_table,
                &[(owner_column.to_string(), owner.to_sql_value())],
                &clause.matching(id_column),
                &clause.values,
            )?;
        }

        if self.options.foreign_collection_cleanup {
            let stale = format!(
                "{} AND {} = {}",
                clause.excluding(id_column),
                quote_identifier(owner_column),
                identity_literal(owner)?
            );
            let removed = self.store.delete_where(&element_table, &stale, &clause.values)?;
            if removed > 0 {
                tracing::debug!("removed {} stale {} rows of {} {}", removed, element, owner_type, owner);
            }
        }
        Ok(())
    }

    /// Insert one fresh row per scalar and return the generated identities
    fn persist_scalars(
        &self,
        table: &str,
        id_field: &FieldDescriptor,
        value_column: &str,
        items: &[Value],
    ) -> Result<Vec<Identity>> {
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let value = scalar_element(item)?;
            let rowid = self.store.insert_row(table, &[(value_column.to_string(), value)])?;
            ids.push(self.generated_identity(table, id_field, rowid)?);
        }
        Ok(ids)
    }
}

fn as_object<'v>(type_name: &str, value: &'v Value) -> Result<&'v Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        Error::MalformedDocument(format!(
            "expected an object for {} but found {}",
            type_name,
            json_kind(value)
        ))
    })
}

fn identity_type(field: &FieldDescriptor) -> ValueType {
    match field.kind {
        FieldKind::Identity(value_type) => value_type,
        _ => ValueType::Any,
    }
}

/// Stored form of one scalar collection element
fn scalar_element(item: &Value) -> Result<SqlValue> {
    match item {
        Value::Null => Ok(SqlValue::Null),
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Bool(_) | Value::Number(_) => Ok(SqlValue::Text(item.to_string())),
        nested => Err(Error::MalformedDocument(format!(
            "expected a scalar collection element but found {}",
            json_kind(nested)
        ))),
    }
}
