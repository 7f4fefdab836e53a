use std::path::PathBuf;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::types::{Result, Table, Value};

use super::QueryExecutor;

/// SQLite-backed query executor.
///
/// Opens a read-only connection per query and closes it when the query
/// returns, whether it succeeded or not.
pub struct SqliteExecutor {
    path: PathBuf,
    fingerprint: String,
}

impl SqliteExecutor {
    /// Create an executor from a connection descriptor: a database path,
    /// optionally prefixed with `sqlite:` or `sqlite://` and wrapped in quotes
    pub fn new(descriptor: &str) -> Self {
        let trimmed = descriptor.trim().trim_matches('"');
        let path = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);
        Self {
            path: PathBuf::from(path),
            fingerprint: fingerprint(descriptor),
        }
    }

    #[cfg(test)]
    pub fn from_path(path: &std::path::Path) -> Self {
        Self {
            path: path.to_path_buf(),
            fingerprint: fingerprint(&path.to_string_lossy()),
        }
    }

    /// Short digest identifying the database in logs without exposing the
    /// descriptor
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&mut self, sql: &str) -> Result<Table> {
        debug!(db = %self.fingerprint, sql, "Executing query");

        let conn = self.open()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let num_cols = columns.len();

        let mut table = Table::new(columns);
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(num_cols);
            for idx in 0..num_cols {
                cells.push(convert(row.get_ref(idx)?));
            }
            table.rows.push(cells);
        }

        debug!(db = %self.fingerprint, rows = table.rows.len(), "Query returned");
        Ok(table)
    }
}

fn convert(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn fingerprint(descriptor: &str) -> String {
    let digest = Sha256::digest(descriptor.as_bytes());
    format!("{:x}", digest)[..12].to_string()
}
