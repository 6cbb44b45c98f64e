//! TOML schema files
//!
//! ```toml
//! [[entities]]
//! name = "User"
//!
//! [[entities.fields]]
//! name = "id"
//! kind = "identity"
//! value_type = "integer"
//!
//! [[entities.fields]]
//! name = "tags"
//! kind = "one_to_many"
//! element = "UserTag"
//! value_column = "value"
//! ```

use std::path::Path;
use serde::Deserialize;
use crate::{Error, Result};
use super::entity::{EntityDef, Registry, TableMapping};
use super::field::{FieldDef, FieldKind, Relation, ValueType};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntitySpec {
    pub name: String,
    pub table: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKindName {
    Identity,
    Scalar,
    Foreign,
    OneToMany,
    ManyToMany,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKindName,
    pub column: Option<String>,
    pub map_from: Option<String>,
    pub value_type: Option<ValueType>,
    pub target: Option<String>,
    pub element: Option<String>,
    pub value_column: Option<String>,
}

impl FieldSpec {
    fn require<'a>(&self, value: &'a Option<String>, key: &str) -> Result<&'a str> {
        value.as_deref().ok_or_else(|| {
            Error::Schema(format!("field '{}' ({:?}) requires `{}`", self.name, self.kind, key))
        })
    }

    fn into_def(self) -> Result<FieldDef> {
        let kind = match self.kind {
            FieldKindName::Identity => {
                FieldKind::Identity(self.value_type.unwrap_or(ValueType::Integer))
            }
            FieldKindName::Scalar => FieldKind::Scalar(self.value_type.unwrap_or_default()),
            FieldKindName::Foreign => FieldKind::ForeignReference {
                target: self.require(&self.target, "target")?.to_string(),
            },
            FieldKindName::OneToMany => FieldKind::ForeignCollection {
                element: self.require(&self.element, "element")?.to_string(),
                relation: Relation::OneToMany { value_column: self.value_column.clone() },
            },
            FieldKindName::ManyToMany => FieldKind::ForeignCollection {
                element: self.require(&self.element, "element")?.to_string(),
                relation: Relation::ManyToMany {
                    target: self.require(&self.target, "target")?.to_string(),
                },
            },
        };

        Ok(FieldDef {
            name: self.name,
            column: self.column,
            map_from: self.map_from,
            kind,
        })
    }
}

impl EntitySpec {
    fn into_def(self) -> Result<EntityDef> {
        let table = match (self.is_abstract, self.table) {
            (true, Some(_)) => {
                return Err(Error::Schema(format!(
                    "abstract entity {} cannot declare a table",
                    self.name
                )));
            }
            (true, None) => TableMapping::Unmapped,
            (false, Some(table)) => TableMapping::Named(table),
            (false, None) => TableMapping::Default,
        };

        let fields = self
            .fields
            .into_iter()
            .map(FieldSpec::into_def)
            .collect::<Result<Vec<_>>>()?;

        Ok(EntityDef {
            name: self.name,
            table,
            bases: self.bases,
            fields,
        })
    }
}

/// Parse a schema document into a registry
pub fn parse_schema(contents: &str) -> Result<Registry> {
    let file: SchemaFile = toml::from_str(contents)
        .map_err(|e| Error::Config(format!("invalid schema file: {}", e)))?;

    let mut registry = Registry::new();
    for spec in file.entities {
        registry.register(spec.into_def()?)?;
    }
    Ok(registry)
}

/// Read and parse a schema file
pub fn load_schema(path: &Path) -> Result<Registry> {
    let contents = std::fs::read_to_string(path)?;
    parse_schema(&contents)
}
