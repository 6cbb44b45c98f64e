//! Field descriptors - how one document key maps onto storage
//!
//! Every declared field is one of four kinds:
//! - `Identity`: the row's unique key, used for upsert
//! - `Scalar`: a plain column
//! - `ForeignReference`: a column holding another entity's identity
//! - `ForeignCollection`: a one-to-many or many-to-many relation (no column)

use crate::{Error, Result};
use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Column suffix for foreign references without an explicit column name
pub const FOREIGN_ID_SUFFIX: &str = "_id";

/// Declared value type of a scalar or identity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Integer,
    Real,
    Text,
    Boolean,
    /// Stored by the document value's run-time type
    #[default]
    Any,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Integer => "integer",
            ValueType::Real => "real",
            ValueType::Text => "text",
            ValueType::Boolean => "boolean",
            ValueType::Any => "any",
        }
    }

    /// SQLite column affinity used when rendering table definitions
    pub fn sql_affinity(&self) -> &'static str {
        match self {
            ValueType::Integer | ValueType::Boolean => "INTEGER",
            ValueType::Real => "REAL",
            ValueType::Text => "TEXT",
            ValueType::Any => "",
        }
    }

    /// Convert a document value into a storable value of this type.
    ///
    /// `null` always converts to SQL NULL. Objects and arrays are never
    /// scalars and fail with `MalformedDocument`.
    pub fn coerce(&self, value: &Value) -> Result<SqlValue> {
        if value.is_object() || value.is_array() {
            return Err(Error::MalformedDocument(format!(
                "expected a {} scalar but found {}",
                self.as_str(),
                json_kind(value)
            )));
        }
        if value.is_null() {
            return Ok(SqlValue::Null);
        }

        let converted = match self {
            ValueType::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().filter(|f| fits_i64(*f)).map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            }
            .map(SqlValue::Integer),
            ValueType::Real => match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .map(SqlValue::Real),
            ValueType::Text => value.as_str().map(|s| SqlValue::Text(s.to_string())),
            ValueType::Boolean => match value {
                Value::Bool(b) => Some(*b),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
                Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
                _ => None,
            }
            .map(|b| SqlValue::Integer(b as i64)),
            ValueType::Any => Some(match value {
                Value::Bool(b) => SqlValue::Integer(*b as i64),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => SqlValue::Integer(i),
                    None => SqlValue::Real(n.as_f64().unwrap_or_default()),
                },
                Value::String(s) => SqlValue::Text(s.clone()),
                _ => SqlValue::Null,
            }),
        };

        converted.ok_or_else(|| {
            Error::TypeMismatch(format!(
                "cannot store {} value {} as {}",
                json_kind(value),
                value,
                self.as_str()
            ))
        })
    }
}

impl FromStr for ValueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "integer" | "int" | "long" => Ok(ValueType::Integer),
            "real" | "float" | "double" => Ok(ValueType::Real),
            "text" | "string" => Ok(ValueType::Text),
            "boolean" | "bool" => Ok(ValueType::Boolean),
            "any" => Ok(ValueType::Any),
            _ => Err(Error::Schema(format!("Unknown value type: {}", s))),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relation realized by a foreign collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Elements point back at the owner. With a value column, the document
    /// array holds bare scalars and every element becomes a fresh row.
    OneToMany { value_column: Option<String> },
    /// Elements are junction rows; `target` is the type the junction links to.
    ManyToMany { target: String },
}

/// What a field is and what it points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Identity(ValueType),
    Scalar(ValueType),
    ForeignReference { target: String },
    ForeignCollection { element: String, relation: Relation },
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Identity(_) => "identity",
            FieldKind::Scalar(_) => "scalar",
            FieldKind::ForeignReference { .. } => "foreign",
            FieldKind::ForeignCollection { relation: Relation::OneToMany { .. }, .. } => "one_to_many",
            FieldKind::ForeignCollection { relation: Relation::ManyToMany { .. }, .. } => "many_to_many",
        }
    }
}

/// Resolved metadata for one declared field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    /// Field name, also the document key it maps from by default
    pub name: String,
    /// Storage column; `None` for foreign collections
    pub column: Option<String>,
    /// Alternative document key that maps onto this field
    pub map_from: Option<String>,
    pub kind: FieldKind,
    /// Type that declared this field (differs from the described type for
    /// fields inherited from a base)
    pub declared_in: String,
}

impl FieldDescriptor {
    pub fn is_identity(&self) -> bool {
        matches!(self.kind, FieldKind::Identity(_))
    }

    pub fn is_foreign_collection(&self) -> bool {
        matches!(self.kind, FieldKind::ForeignCollection { .. })
    }

    /// Target type of a foreign reference
    pub fn reference_target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::ForeignReference { target } => Some(target),
            _ => None,
        }
    }

    /// Whether a document key addresses this field by name
    pub fn matches_name(&self, key: &str) -> bool {
        self.name == key
    }

    /// Whether a document key addresses this field through its rename mapping
    pub fn matches_mapping(&self, key: &str) -> bool {
        self.map_from.as_deref() == Some(key)
    }

    /// Column name, or a `Schema` error for fields that have none
    pub fn column_or_err(&self) -> Result<&str> {
        self.column.as_deref().ok_or_else(|| {
            Error::Schema(format!(
                "field '{}' of {} has no storage column",
                self.name, self.declared_in
            ))
        })
    }
}

/// Declaration of a field, as written by the metadata source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub column: Option<String>,
    pub map_from: Option<String>,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn identity(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, FieldKind::Identity(value_type))
    }

    pub fn scalar(name: impl Into<String>, value_type: ValueType) -> Self {
        Self::new(name, FieldKind::Scalar(value_type))
    }

    pub fn foreign(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldKind::ForeignReference { target: target.into() })
    }

    pub fn one_to_many(name: impl Into<String>, element: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::ForeignCollection {
                element: element.into(),
                relation: Relation::OneToMany { value_column: None },
            },
        )
    }

    /// One-to-many over bare scalars stored in `value_column` of `element`
    pub fn scalar_collection(
        name: impl Into<String>,
        element: impl Into<String>,
        value_column: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            FieldKind::ForeignCollection {
                element: element.into(),
                relation: Relation::OneToMany { value_column: Some(value_column.into()) },
            },
        )
    }

    pub fn many_to_many(
        name: impl Into<String>,
        junction: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            FieldKind::ForeignCollection {
                element: junction.into(),
                relation: Relation::ManyToMany { target: target.into() },
            },
        )
    }

    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            column: None,
            map_from: None,
            kind,
        }
    }

    /// Set the storage column name
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Map an alternative document key onto this field
    pub fn map_from(mut self, key: impl Into<String>) -> Self {
        self.map_from = Some(key.into());
        self
    }

    /// Resolve the declaration into a descriptor owned by `declared_in`
    pub(crate) fn to_descriptor(&self, declared_in: &str) -> FieldDescriptor {
        let column = match &self.kind {
            FieldKind::ForeignCollection { .. } => None,
            FieldKind::ForeignReference { .. } => Some(
                self.column
                    .clone()
                    .unwrap_or_else(|| format!("{}{}", self.name, FOREIGN_ID_SUFFIX)),
            ),
            _ => Some(self.column.clone().unwrap_or_else(|| self.name.clone())),
        };

        FieldDescriptor {
            name: self.name.clone(),
            column,
            map_from: self.map_from.clone(),
            kind: self.kind.clone(),
            declared_in: declared_in.to_string(),
        }
    }
}

/// Whole floats inside `i64` range; `i64::MAX as f64` rounds up to 2^63
fn fits_i64(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Short description of a document value's kind for error messages
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_type_aliases() {
        assert_eq!(ValueType::from_str("long").unwrap(), ValueType::Integer);
        assert_eq!(ValueType::from_str("String").unwrap(), ValueType::Text);
        assert_eq!(ValueType::from_str("double").unwrap(), ValueType::Real);
        assert!(ValueType::from_str("blob").is_err());
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(ValueType::Integer.coerce(&json!(5)).unwrap(), SqlValue::Integer(5));
        assert_eq!(ValueType::Integer.coerce(&json!("12")).unwrap(), SqlValue::Integer(12));
        assert_eq!(ValueType::Integer.coerce(&json!(3.0)).unwrap(), SqlValue::Integer(3));
        assert!(matches!(
            ValueType::Integer.coerce(&json!("abc")),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            ValueType::Integer.coerce(&json!(true)),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_coerce_integer_rejects_out_of_range() {
        for value in [json!(1e19), json!(-1e19), json!(u64::MAX), json!(9223372036854775808.0)] {
            assert!(
                matches!(ValueType::Integer.coerce(&value), Err(Error::TypeMismatch(_))),
                "{} should not fit",
                value
            );
        }
        assert_eq!(
            ValueType::Integer.coerce(&json!(-9223372036854775808.0)).unwrap(),
            SqlValue::Integer(i64::MIN)
        );
        assert_eq!(ValueType::Integer.coerce(&json!(i64::MAX)).unwrap(), SqlValue::Integer(i64::MAX));
    }

    #[test]
    fn test_coerce_text_and_boolean() {
        assert_eq!(
            ValueType::Text.coerce(&json!("John")).unwrap(),
            SqlValue::Text("John".to_string())
        );
        assert!(matches!(ValueType::Text.coerce(&json!(1)), Err(Error::TypeMismatch(_))));
        assert_eq!(ValueType::Boolean.coerce(&json!(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(ValueType::Boolean.coerce(&json!("false")).unwrap(), SqlValue::Integer(0));
    }

    #[test]
    fn test_coerce_null_and_structures() {
        assert_eq!(ValueType::Text.coerce(&json!(null)).unwrap(), SqlValue::Null);
        assert!(matches!(
            ValueType::Any.coerce(&json!([1, 2])),
            Err(Error::MalformedDocument(_))
        ));
        assert!(matches!(
            ValueType::Integer.coerce(&json!({"a": 1})),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_coerce_any_uses_runtime_type() {
        assert_eq!(ValueType::Any.coerce(&json!(2.5)).unwrap(), SqlValue::Real(2.5));
        assert_eq!(ValueType::Any.coerce(&json!(false)).unwrap(), SqlValue::Integer(0));
        assert_eq!(ValueType::Any.coerce(&json!("x")).unwrap(), SqlValue::Text("x".into()));
    }

    #[test]
    fn test_default_column_names() {
        let plain = FieldDef::scalar("name", ValueType::Text).to_descriptor("User");
        assert_eq!(plain.column.as_deref(), Some("name"));

        let foreign = FieldDef::foreign("author", "User").to_descriptor("Post");
        assert_eq!(foreign.column.as_deref(), Some("author_id"));

        let renamed = FieldDef::foreign("author", "User").column("writer").to_descriptor("Post");
        assert_eq!(renamed.column.as_deref(), Some("writer"));

        let tags = FieldDef::scalar_collection("tags", "UserTag", "value").to_descriptor("User");
        assert_eq!(tags.column, None);
        assert_eq!(tags.kind.as_str(), "one_to_many");
    }
}
