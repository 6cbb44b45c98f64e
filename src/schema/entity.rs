//! Entity declarations and the registry that holds them

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use crate::{Error, Result};
use super::field::{FieldDef, FieldDescriptor, FieldKind, ValueType};

/// How an entity maps onto a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableMapping {
    /// Base-only declaration: contributes fields, is never persisted itself
    Unmapped,
    /// Table named after the type
    Default,
    Named(String),
}

/// Declaration of one entity type, as written by the metadata source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    pub name: String,
    pub table: TableMapping,
    /// Base declarations, consulted in order after this entity's own fields
    pub bases: Vec<String>,
    pub fields: Vec<FieldDef>,
}

impl EntityDef {
    /// A persisted entity whose table is named after the type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: TableMapping::Default,
            bases: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// A base-only declaration without table mapping
    pub fn base(name: impl Into<String>) -> Self {
        Self {
            table: TableMapping::Unmapped,
            ..Self::new(name)
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = TableMapping::Named(table.into());
        self
    }

    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Resolved table name, `None` for base-only declarations
    pub fn table_name(&self) -> Option<&str> {
        match &self.table {
            TableMapping::Unmapped => None,
            TableMapping::Default => Some(&self.name),
            TableMapping::Named(name) => Some(name),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Schema("entity name must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        let mut identities = 0;
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Schema(format!(
                    "{} declares field '{}' twice",
                    self.name, field.name
                )));
            }
            if let FieldKind::Identity(value_type) = field.kind {
                identities += 1;
                if !matches!(value_type, ValueType::Integer | ValueType::Text) {
                    return Err(Error::Schema(format!(
                        "identity '{}' of {} must be integer or text, not {}",
                        field.name, self.name, value_type
                    )));
                }
            }
        }

        if identities > 1 {
            return Err(Error::Schema(format!("{} declares more than one identity", self.name)));
        }
        Ok(())
    }
}

/// The fields one declaration contributes to a descriptor.
#[derive(Debug, Clone)]
pub struct Layer {
    pub owner: String,
    pub fields: Vec<Arc<FieldDescriptor>>,
}

/// Resolved metadata for one persisted type.
///
/// Layers are ordered: the type's own fields first, then each base in
/// declaration order (depth first).
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub type_name: String,
    pub table: String,
    pub layers: Vec<Layer>,
}

impl EntityDescriptor {
    /// All fields in lookup order
    pub fn fields(&self) -> impl Iterator<Item = &Arc<FieldDescriptor>> {
        self.layers.iter().flat_map(|layer| layer.fields.iter())
    }

    /// The first identity field in lookup order
    pub fn identity(&self) -> Option<&Arc<FieldDescriptor>> {
        self.fields().find(|field| field.is_identity())
    }

    /// Fields that own a storage column
    pub fn columns(&self) -> impl Iterator<Item = &Arc<FieldDescriptor>> {
        self.fields().filter(|field| field.column.is_some())
    }
}

/// All declared entities, keyed by type name.
///
/// The registry is the collaborator metadata source: it is populated once
/// (through the builder API or a schema file) and then handed to a
/// `MetadataResolver`.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    entities: HashMap<String, EntityDef>,
    order: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration, rejecting duplicates and invalid field sets
    pub fn register(&mut self, def: EntityDef) -> Result<()> {
        def.validate()?;
        if self.entities.contains_key(&def.name) {
            return Err(Error::Schema(format!("entity {} is registered twice", def.name)));
        }
        self.order.push(def.name.clone());
        self.entities.insert(def.name.clone(), def);
        Ok(())
    }

    /// Builder-style registration
    pub fn with(mut self, def: EntityDef) -> Result<Self> {
        self.register(def)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Declarations in registration order
    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.order.iter().filter_map(|name| self.entities.get(name))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Flatten a type and its bases into layers.
    ///
    /// Fails on unknown types, unknown bases and cyclic base chains.
    pub fn layers_of(&self, name: &str) -> Result<Vec<Layer>> {
        let mut layers = Vec::new();
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        self.collect_layers(name, &mut path, &mut visited, &mut layers)?;
        Ok(layers)
    }

    fn collect_layers(
        &self,
        name: &str,
        path: &mut Vec<String>,
        visited: &mut HashSet<String>,
        layers: &mut Vec<Layer>,
    ) -> Result<()> {
        if path.iter().any(|p| p == name) {
            path.push(name.to_string());
            return Err(Error::Schema(format!("cyclic base chain: {}", path.join(" -> "))));
        }
        // A diamond contributes a shared base only once
        if !visited.insert(name.to_string()) {
            return Ok(());
        }

        let def = self.entities.get(name).ok_or_else(|| match path.last() {
            Some(child) => Error::Schema(format!("{} extends unknown base {}", child, name)),
            None => Error::Schema(format!("no entity registered for {}", name)),
        })?;

        layers.push(Layer {
            owner: def.name.clone(),
            fields: def
                .fields
                .iter()
                .map(|field| Arc::new(field.to_descriptor(&def.name)))
                .collect(),
        });

        path.push(name.to_string());
        for base in &def.bases {
            self.collect_layers(base, path, visited, layers)?;
        }
        path.pop();
        Ok(())
    }

    /// Whether `name` is `ancestor` or has it somewhere in its base chain
    pub fn is_a(&self, name: &str, ancestor: &str) -> bool {
        if name == ancestor {
            return true;
        }
        let mut stack = vec![name];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(def) = self.entities.get(current) {
                for base in &def.bases {
                    if base == ancestor {
                        return true;
                    }
                    stack.push(base.as_str());
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new()
            .with(EntityDef::base("Model").field(FieldDef::identity("id", ValueType::Integer)))
            .unwrap()
            .with(
                EntityDef::new("Article")
                    .table("articles")
                    .extends("Model")
                    .field(FieldDef::scalar("title", ValueType::Text)),
            )
            .unwrap()
    }

    #[test]
    fn test_layers_follow_base_order() {
        let layers = registry().layers_of("Article").unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].owner, "Article");
        assert_eq!(layers[1].owner, "Model");
        assert_eq!(layers[1].fields[0].declared_in, "Model");
    }

    #[test]
    fn test_table_names() {
        let reg = registry();
        assert_eq!(reg.get("Article").unwrap().table_name(), Some("articles"));
        assert_eq!(reg.get("Model").unwrap().table_name(), None);
        assert_eq!(EntityDef::new("Group").table_name(), Some("Group"));
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut reg = registry();
        assert!(matches!(reg.register(EntityDef::new("Article")), Err(Error::Schema(_))));

        let dup_field = EntityDef::new("Dup")
            .field(FieldDef::scalar("a", ValueType::Any))
            .field(FieldDef::scalar("a", ValueType::Any));
        assert!(reg.register(dup_field).is_err());

        let two_ids = EntityDef::new("TwoIds")
            .field(FieldDef::identity("a", ValueType::Integer))
            .field(FieldDef::identity("b", ValueType::Integer));
        assert!(reg.register(two_ids).is_err());

        let bool_id = EntityDef::new("BoolId").field(FieldDef::identity("a", ValueType::Boolean));
        assert!(reg.register(bool_id).is_err());
    }

    #[test]
    fn test_cyclic_bases_fail() {
        let reg = Registry::new()
            .with(EntityDef::base("A").extends("B"))
            .unwrap()
            .with(EntityDef::base("B").extends("A"))
            .unwrap();
        let err = reg.layers_of("A").unwrap_err();
        assert!(err.to_string().contains("cyclic"));
    }

    #[test]
    fn test_unknown_base_fails() {
        let reg = Registry::new().with(EntityDef::new("A").extends("Missing")).unwrap();
        assert!(matches!(reg.layers_of("A"), Err(Error::Schema(_))));
    }

    #[test]
    fn test_is_a() {
        let reg = registry();
        assert!(reg.is_a("Article", "Model"));
        assert!(reg.is_a("Article", "Article"));
        assert!(!reg.is_a("Model", "Article"));
    }
}
