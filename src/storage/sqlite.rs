//! SQLite storage implementation

use std::path::Path;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};
use crate::{Error, Result};
use crate::metadata::MetadataResolver;
use crate::query::quote_identifier;
use crate::schema::ddl;

/// Ordered column/value pairs staged for an insert or update
pub type ColumnValues = Vec<(String, SqlValue)>;

/// SQLite-backed store the persistence engine writes through
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.enable_write_ahead_logging_safely();
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Switch to write-ahead logging unless a transaction is open.
    ///
    /// Failure only costs concurrency, so it is logged and ignored.
    fn enable_write_ahead_logging_safely(&self) {
        if !self.conn.is_autocommit() {
            tracing::warn!("write-ahead logging not enabled because a transaction was active");
            return;
        }
        match self
            .conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        {
            Ok(mode) => tracing::debug!("journal_mode = {}", mode),
            Err(e) => tracing::warn!("failed to enable write-ahead logging: {}", e),
        }
    }

    /// Create a table for every mapped entity known to the resolver
    pub fn create_tables(&self, resolver: &MetadataResolver) -> Result<usize> {
        let stmts = ddl::all_schema_statements(resolver)?;
        for stmt in &stmts {
            tracing::debug!("{}", stmt);
            self.conn.execute(stmt, [])?;
        }
        Ok(stmts.len())
    }

    // ========== Transactions ==========

    /// Begin an immediate transaction.
    ///
    /// Statements issued through this store while the guard is alive run
    /// inside the transaction. Dropping the guard without committing rolls
    /// everything back.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        tracing::debug!("begin transaction");
        Ok(Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?)
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    // ========== Row Operations ==========

    /// Check whether any row has `column = value`
    pub fn row_exists(&self, table: &str, column: &str, value: &SqlValue) -> Result<bool> {
        tracing::debug!("exists('{}', {} = {:?})", table, column, value);
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
            quote_identifier(table),
            quote_identifier(column)
        );
        let found: Option<i64> = self
            .conn
            .query_row(&sql, [value], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert a row and return its rowid.
    ///
    /// An empty value list inserts a row of defaults.
    pub fn insert_row(&self, table: &str, values: &[(String, SqlValue)]) -> Result<i64> {
        tracing::debug!("insert('{}', {:?})", table, values);
        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_identifier(table))
        } else {
            let columns: Vec<String> = values.iter().map(|(c, _)| quote_identifier(c)).collect();
            let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_identifier(table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        self.conn
            .execute(&sql, params_from_iter(values.iter().map(|(_, v)| v)))
            .map_err(|source| write_error(table, source))?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Read one column of the row with the given rowid
    pub fn read_column_by_rowid(&self, table: &str, column: &str, rowid: i64) -> Result<SqlValue> {
        let sql = format!(
            "SELECT {} FROM {} WHERE rowid = ?1",
            quote_identifier(column),
            quote_identifier(table)
        );
        let value = self
            .conn
            .query_row(&sql, [rowid], |row| row.get::<_, SqlValue>(0))
            .optional()?;
        value.ok_or_else(|| Error::StorageWrite {
            table: table.to_string(),
            reason: format!("no row with rowid {}", rowid),
        })
    }

    /// `UPDATE table SET ... WHERE <where_clause>`; returns affected rows
    pub fn update_where(
        &self,
        table: &str,
        values: &[(String, SqlValue)],
        where_clause: &str,
        args: &[SqlValue],
    ) -> Result<usize> {
        tracing::debug!("update('{}', {:?}, '{}', {:?})", table, values, where_clause, args);
        if values.is_empty() {
            return Ok(0);
        }

        let assignments: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("{} = ?{}", quote_identifier(c), i + 1))
            .collect();
        // Positional placeholders in the where clause follow the assignments
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            quote_identifier(table),
            assignments.join(", "),
            where_clause
        );

        let params = values.iter().map(|(_, v)| v).chain(args.iter());
        self.conn
            .execute(&sql, params_from_iter(params))
            .map_err(|source| write_error(table, source))
    }

    /// `DELETE FROM table WHERE <where_clause>`; returns affected rows
    pub fn delete_where(&self, table: &str, where_clause: &str, args: &[SqlValue]) -> Result<usize> {
        tracing::debug!("delete('{}', '{}', {:?})", table, where_clause, args);
        let sql = format!("DELETE FROM {} WHERE {}", quote_identifier(table), where_clause);
        self.conn
            .execute(&sql, params_from_iter(args.iter()))
            .map_err(|source| write_error(table, source))
    }

    /// Count rows in a table
    pub fn count_rows(&self, table: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Row counts for every mapped entity
    pub fn stats(&self, resolver: &MetadataResolver) -> Result<DbStats> {
        let mut tables = Vec::new();
        for def in resolver.registry().entities() {
            if let Some(table) = def.table_name() {
                tables.push((table.to_string(), self.count_rows(table)?));
            }
        }
        Ok(DbStats { tables })
    }
}

fn write_error(table: &str, source: rusqlite::Error) -> Error {
    Error::StorageWrite {
        table: table.to_string(),
        reason: source.to_string(),
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DbStats {
    pub tables: Vec<(String, usize)>,
}

impl DbStats {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|(_, n)| n).sum()
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        for (table, rows) in &self.tables {
            writeln!(f, "  {}: {}", table, rows)?;
        }
        write!(f, "  Total: {}", self.total_rows())
    }
}
