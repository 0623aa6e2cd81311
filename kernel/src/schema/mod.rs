// Table Schema Registry
//
// Owns the fixed column layout of a county table and every SQL
// statement built against it. Table names are validated before they
// are ever rendered into SQL.

use std::fmt;

/// Longest accepted table identifier, in bytes.
pub const MAX_TABLE_NAME_LEN: usize = 64;

const RESERVED_PREFIX: &str = "sqlite_";

/// Column name and SQL type, in storage order.
pub const COLUMNS: [(&str, &str); 6] = [
    ("date_key", "TEXT"),
    ("new_count", "INTEGER"),
    ("cumulative_positive", "INTEGER"),
    ("total_tests", "INTEGER"),
    ("cumulative_tests", "INTEGER"),
    ("load_timestamp", "TEXT"),
];

/// Returned when a partition key cannot be used as a table identifier.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("partition key `{key}` is not a valid table name: {reason}")]
pub struct InvalidPartitionKey {
    pub key: String,
    pub reason: &'static str,
}

/// A partition key that is safe to embed as a SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName(String);

impl TableName {
    /// Validate a normalized partition key as a table name.
    ///
    /// Accepts `[a-z_][a-z0-9_]*` only. No further mangling happens here,
    /// so two distinct keys can never map onto the same table.
    pub fn for_partition(key: &str) -> Result<Self, InvalidPartitionKey> {
        let invalid = |reason| InvalidPartitionKey {
            key: key.to_owned(),
            reason,
        };

        let first = key.chars().next().ok_or_else(|| invalid("empty key"))?;
        if key.len() > MAX_TABLE_NAME_LEN {
            return Err(invalid("longer than 64 bytes"));
        }
        if !(first.is_ascii_lowercase() || first == '_') {
            return Err(invalid("must start with a lowercase letter or underscore"));
        }
        if !key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(invalid("only lowercase letters, digits and underscores are allowed"));
        }
        if key.starts_with(RESERVED_PREFIX) {
            return Err(invalid("the sqlite_ prefix is reserved"));
        }

        Ok(Self(key.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `CREATE TABLE IF NOT EXISTS` for a county table.
pub fn create_table_statement(table: &TableName) -> String {
    let columns = COLUMNS
        .iter()
        .map(|(name, ty)| format!("    {name} {ty}"))
        .collect::<Vec<_>>()
        .join(",\n");

    format!("CREATE TABLE IF NOT EXISTS {} (\n{columns}\n);", table.quoted())
}

/// Query returning the latest stored `date_key`, or NULL for an empty table.
pub fn max_date_statement(table: &TableName) -> String {
    format!("SELECT MAX(date_key) FROM {}", table.quoted())
}

pub fn count_statement(table: &TableName) -> String {
    format!("SELECT COUNT(*) FROM {}", table.quoted())
}

/// Parameterized insert with one placeholder per column.
pub fn insert_statement(table: &TableName) -> String {
    let names = COLUMNS.iter().map(|(name, _)| *name).collect::<Vec<_>>();
    let placeholders = (1..=COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.quoted(),
        names.join(", "),
        placeholders.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_normalized_county_names() {
        for key in ["erie", "st_lawrence", "new_york", "_x1"] {
            assert_eq!(TableName::for_partition(key).unwrap().as_str(), key);
        }
    }

    #[test]
    fn rejects_unsafe_keys() {
        for key in ["", "Erie", "st.lawrence", "erie\"; drop table x; --", "1st", "sqlite_master", "montréal"] {
            let err = TableName::for_partition(key).unwrap_err();
            assert_eq!(err.key, key);
        }
        assert!(TableName::for_partition(&"a".repeat(65)).is_err());
    }

    #[test]
    fn create_statement_is_idempotent_and_complete() {
        let table = TableName::for_partition("erie").unwrap();
        let stmt = create_table_statement(&table);

        assert!(stmt.starts_with("CREATE TABLE IF NOT EXISTS \"erie\""));
        for (name, ty) in COLUMNS {
            assert!(stmt.contains(&format!("{name} {ty}")), "missing {name}");
        }
    }

    #[test]
    fn insert_has_one_placeholder_per_column() {
        let table = TableName::for_partition("erie").unwrap();
        let stmt = insert_statement(&table);
        assert!(stmt.contains("?6"));
        assert!(!stmt.contains("?7"));
    }
}
