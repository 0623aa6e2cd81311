// Partition Writer
//
// Appends a partition's filtered rows in one atomic unit. Existing rows
// are never updated or deleted.

use crate::dataset::Row;
use crate::schema::TableName;
use crate::store::{StoreConnection, StoreError};

/// Append `rows` to `table` and return how many were written.
///
/// An empty slice succeeds without touching the store.
pub fn write_partition<C: StoreConnection>(
    conn: &mut C,
    table: &TableName,
    rows: &[Row],
) -> Result<usize, StoreError> {
    if rows.is_empty() {
        return Ok(0);
    }
    conn.append_rows(table, rows)
}
