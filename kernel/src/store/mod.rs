// Relational Store Abstraction
//
// Defines the contract the load engine needs from the backing store.
// Every worker opens its own connection; connections are never shared
// across threads.

pub mod sqlite;

use crate::dataset::Row;
use crate::schema::TableName;

pub use sqlite::{SqliteConnection, SqliteStore};

/// Errors raised by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("`{0}` would give every connection a private database")]
    UnsharedDatabase(String),

    #[error("missing table ({0})")]
    MissingTable(String),

    #[error("row {row} does not fit the table schema: {reason}")]
    SchemaViolation { row: usize, reason: String },

    #[error("stored value `{value}` in `{table}` is not a valid date")]
    CorruptValue { table: String, value: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Factory for independent store connections.
///
/// Implementations must support many connections being open at once
/// from different threads.
pub trait Store: Send + Sync {
    type Connection: StoreConnection;

    /// Open a fresh connection owned by the caller.
    fn connect(&self) -> Result<Self::Connection, StoreError>;
}

/// Operations a single worker performs against the store.
pub trait StoreConnection {
    /// Execute a schema statement.
    fn execute_ddl(&mut self, statement: &str) -> Result<(), StoreError>;

    /// Run a query returning at most one value.
    ///
    /// Returns `Ok(None)` for SQL NULL or no row, and
    /// `StoreError::MissingTable` when the queried table does not exist.
    fn query_scalar(&mut self, statement: &str) -> Result<Option<String>, StoreError>;

    /// Append rows to `table` as a single atomic unit.
    ///
    /// Either every row is committed or none is.
    fn append_rows(&mut self, table: &TableName, rows: &[Row]) -> Result<usize, StoreError>;
}
