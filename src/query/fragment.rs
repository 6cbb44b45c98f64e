//! Query fragment builder
//!
//! Stateless helpers that render the SQL fragments used when synchronizing
//! relations: quoted identifiers, inline literals and `IN (...)` clauses.

use crate::{Error, Result};
use crate::identity::Identity;
use rusqlite::types::Value as SqlValue;

/// Quote a table or column name, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render a scalar as an inline SQL literal.
///
/// Text is single-quoted with embedded quotes doubled, blobs become `X'..'`.
/// Non-finite reals have no literal form and fail with `TypeMismatch`.
pub fn sql_literal(value: &SqlValue) -> Result<String> {
    match value {
        SqlValue::Null => Ok("NULL".to_string()),
        SqlValue::Integer(i) => Ok(i.to_string()),
        SqlValue::Real(f) if f.is_finite() => Ok(format!("{:?}", f)),
        SqlValue::Real(f) => Err(Error::TypeMismatch(format!("{} has no SQL literal form", f))),
        SqlValue::Text(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        SqlValue::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
            Ok(format!("X'{}'", hex))
        }
    }
}

/// Inline literal for an identity value
pub fn identity_literal(identity: &Identity) -> Result<String> {
    sql_literal(&identity.to_sql_value())
}

/// An `IN (...)` selector and the parameters bound to its placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct InClause {
    /// `IN (?,?,?)`, or `IN ()` for an empty set
    pub selector: String,
    pub values: Vec<SqlValue>,
}

impl InClause {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `<column> IN (...)`
    pub fn matching(&self, column: &str) -> String {
        format!("{} {}", quote_identifier(column), self.selector)
    }

    /// `<column> NOT IN (...)`
    pub fn excluding(&self, column: &str) -> String {
        format!("{} NOT {}", quote_identifier(column), self.selector)
    }
}

/// Build an `IN` clause over identity values.
///
/// SQLite accepts `IN ()` as the empty set: `x IN ()` matches nothing and
/// `x NOT IN ()` matches everything, which is what relation cleanup relies on
/// when a document carries an empty collection.
pub fn in_clause_of(ids: &[Identity]) -> InClause {
    let placeholders = vec!["?"; ids.len()].join(",");
    InClause {
        selector: format!("IN ({})", placeholders),
        values: ids.iter().map(Identity::to_sql_value).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::{params_from_iter, Connection};

    #[test]
    fn test_literals() {
        assert_eq!(sql_literal(&SqlValue::Null).unwrap(), "NULL");
        assert_eq!(sql_literal(&SqlValue::Integer(-4)).unwrap(), "-4");
        assert_eq!(sql_literal(&SqlValue::Real(1.5)).unwrap(), "1.5");
        assert_eq!(sql_literal(&SqlValue::Real(2.0)).unwrap(), "2.0");
        assert_eq!(sql_literal(&SqlValue::Text("O'Brien".into())).unwrap(), "'O''Brien'");
        assert_eq!(sql_literal(&SqlValue::Blob(vec![0xca, 0xfe])).unwrap(), "X'CAFE'");
        assert!(sql_literal(&SqlValue::Real(f64::NAN)).is_err());
    }

    #[test]
    fn test_identity_literal() {
        assert_eq!(identity_literal(&Identity::Integer(12)).unwrap(), "12");
        assert_eq!(identity_literal(&Identity::from("it's")).unwrap(), "'it''s'");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("user_id"), "\"user_id\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_in_clause() {
        let clause = in_clause_of(&[Identity::Integer(1), Identity::Integer(2), Identity::from("x")]);
        assert_eq!(clause.selector, "IN (?,?,?)");
        assert_eq!(clause.values.len(), 3);
        assert_eq!(clause.matching("id"), "\"id\" IN (?,?,?)");
        assert_eq!(clause.excluding("id"), "\"id\" NOT IN (?,?,?)");
    }

    #[test]
    fn test_empty_in_clause_is_valid_sql() {
        let clause = in_clause_of(&[]);
        assert!(clause.is_empty());
        assert_eq!(clause.selector, "IN ()");

        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1), (2);")
            .unwrap();

        let matched: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM t WHERE {}", clause.matching("id")),
                params_from_iter(clause.values.iter()),
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(matched, 0);

        let excluded: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM t WHERE {}", clause.excluding("id")),
                params_from_iter(clause.values.iter()),
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(excluded, 2);
    }
}
