// SQLite Store
//
// File-backed store in WAL mode. Each connection carries a busy timeout
// so concurrent writers to disjoint tables queue on the database write
// lock instead of failing outright.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::{Store, StoreConnection, StoreError};
use crate::dataset::Row;
use crate::schema::{self, TableName};

const NO_SUCH_TABLE: &str = "no such table";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

    /// Open (creating if needed) the database file and switch it to WAL.
    ///
    /// In-memory and temporary databases are rejected: each worker opens
    /// its own connection and must see what the others wrote.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StoreError> {
        if is_private_database(path.as_ref()) {
            return Err(StoreError::UnsharedDatabase(
                path.as_ref().display().to_string(),
            ));
        }

        let store = Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        };

        let conn = store.open_connection()?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %store.path.display(), journal_mode = %mode, "opened sqlite store");

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows currently stored for a partition.
    pub fn row_count(&self, table: &TableName) -> Result<u64, StoreError> {
        let conn = self.open_connection()?;
        let count: i64 = conn
            .query_row(&schema::count_statement(table), [], |row| row.get(0))
            .map_err(classify)?;
        Ok(count as u64)
    }

    fn open_connection(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl Store for SqliteStore {
    type Connection = SqliteConnection;

    fn connect(&self) -> Result<SqliteConnection, StoreError> {
        Ok(SqliteConnection {
            conn: self.open_connection()?,
        })
    }
}

pub struct SqliteConnection {
    conn: Connection,
}

impl StoreConnection for SqliteConnection {
    fn execute_ddl(&mut self, statement: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(statement)?;
        Ok(())
    }

    fn query_scalar(&mut self, statement: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(statement, [], |row| row.get::<_, Option<String>>(0))
            .optional()
            .map_err(classify)?;
        Ok(value.flatten())
    }

    fn append_rows(&mut self, table: &TableName, rows: &[Row]) -> Result<usize, StoreError> {
        // Dropping the transaction without commit rolls it back.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut insert = tx
                .prepare(&schema::insert_statement(table))
                .map_err(classify)?;

            for (idx, row) in rows.iter().enumerate() {
                let counts = integer_columns(row)
                    .map_err(|reason| StoreError::SchemaViolation { row: idx, reason })?;

                insert.execute(params![
                    row.date_key.to_string(),
                    counts[0],
                    counts[1],
                    counts[2],
                    counts[3],
                    row.load_timestamp.to_string(),
                ])?;
            }
        }
        tx.commit()?;

        Ok(rows.len())
    }
}

/// Paths SQLite opens as a fresh database per connection.
fn is_private_database(path: &Path) -> bool {
    let raw = path.to_string_lossy();
    let raw = raw.trim();
    if raw.is_empty() || raw == ":memory:" {
        return true;
    }
    match raw.strip_prefix("file:") {
        Some(uri) => {
            let (name, query) = uri.split_once('?').unwrap_or((uri, ""));
            name.is_empty() || name == ":memory:" || query.split('&').any(|p| p == "mode=memory")
        }
        None => false,
    }
}

/// The four count columns as SQLite integers.
fn integer_columns(row: &Row) -> Result<[i64; 4], String> {
    let columns = [
        ("new_count", row.new_count),
        ("cumulative_positive", row.cumulative_positive),
        ("total_tests", row.total_tests),
        ("cumulative_tests", row.cumulative_tests),
    ];

    let mut out = [0i64; 4];
    for (slot, (name, value)) in out.iter_mut().zip(columns) {
        *slot = i64::try_from(value)
            .map_err(|_| format!("{name} value {value} exceeds the INTEGER range"))?;
    }
    Ok(out)
}

fn classify(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with(NO_SUCH_TABLE) => {
            StoreError::MissingTable(msg.clone())
        }
        _ => StoreError::Sqlite(err),
    }
}
