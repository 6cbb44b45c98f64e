//! Row identity - the value that uniquely identifies a persisted row
//!
//! Identities are typed after the identity field's declared value type:
//! - `integer` identities become `Identity::Integer`
//! - `text` identities become `Identity::Text`
//!
//! They are never the SQLite rowid unless the identity column aliases it.

use crate::{Error, Result};
use crate::schema::ValueType;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity value of a persisted row.
///
/// This is what `persist_object` returns and what foreign references,
/// junction rows and one-to-many owner pointers store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identity {
    Integer(i64),
    Text(String),
}

impl Identity {
    /// Convert a stored column value into an identity of the declared type
    pub fn from_sql(value: SqlValue, declared: ValueType) -> Result<Self> {
        match (declared, value) {
            (ValueType::Text, SqlValue::Text(s)) => Ok(Identity::Text(s)),
            (ValueType::Text, SqlValue::Integer(i)) => Ok(Identity::Text(i.to_string())),
            (_, SqlValue::Integer(i)) => Ok(Identity::Integer(i)),
            (_, SqlValue::Text(s)) => s
                .parse::<i64>()
                .map(Identity::Integer)
                .map_err(|_| Error::TypeMismatch(format!("stored identity '{}' is not an integer", s))),
            (_, SqlValue::Null) => Err(Error::TypeMismatch("stored identity is NULL".to_string())),
            (_, other) => Err(Error::TypeMismatch(format!(
                "stored identity {:?} is not an integer or text",
                other
            ))),
        }
    }

    /// The identity as a bindable SQL value
    pub fn to_sql_value(&self) -> SqlValue {
        match self {
            Identity::Integer(i) => SqlValue::Integer(*i),
            Identity::Text(s) => SqlValue::Text(s.clone()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Identity::Integer(i) => Some(*i),
            Identity::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Identity::Integer(_) => None,
            Identity::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Integer(i) => write!(f, "{}", i),
            Identity::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        Identity::Integer(value)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Identity::Text(value.to_string())
    }
}

impl From<String> for Identity {
    fn from(value: String) -> Self {
        Identity::Text(value)
    }
}

impl ToSql for Identity {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Identity::Integer(i) => Ok(ToSqlOutput::from(*i)),
            Identity::Text(s) => Ok(ToSqlOutput::from(s.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_sql_follows_declared_type() {
        let id = Identity::from_sql(SqlValue::Integer(7), ValueType::Integer).unwrap();
        assert_eq!(id, Identity::Integer(7));

        let id = Identity::from_sql(SqlValue::Integer(7), ValueType::Text).unwrap();
        assert_eq!(id, Identity::Text("7".to_string()));

        let id = Identity::from_sql(SqlValue::Text("42".into()), ValueType::Integer).unwrap();
        assert_eq!(id, Identity::Integer(42));
    }

    #[test]
    fn test_from_sql_rejects_null() {
        let err = Identity::from_sql(SqlValue::Null, ValueType::Integer).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }

    #[test]
    fn test_binds_as_parameter() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let echoed: String = conn
            .query_row("SELECT ?1 || ?2", (Identity::Integer(4), Identity::from("b")), |row| row.get(0))
            .unwrap();
        assert_eq!(echoed, "4b");
    }

    #[test]
    fn test_serializes_untagged() {
        let ids = vec![Identity::Integer(1), Identity::from("abc")];
        assert_eq!(serde_json::to_string(&ids).unwrap(), r#"[1,"abc"]"#);
    }
}
