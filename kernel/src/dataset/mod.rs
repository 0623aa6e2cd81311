// Dataset Model
//
// Fixed-shape rows produced by the transformer and consumed by the
// load coordinator. Rows are grouped by partition (county) before load.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One county/day observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Normalized county name; also the table name.
    pub partition_key: String,
    pub date_key: NaiveDate,
    pub new_count: u64,
    pub cumulative_positive: u64,
    pub total_tests: u64,
    pub cumulative_tests: u64,
    /// Day this row was ingested.
    pub load_timestamp: NaiveDate,
}

/// Ordered sequence of rows from a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct partition keys present in the dataset.
    pub fn partition_keys(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.partition_key.as_str()).collect()
    }

    /// Group rows by partition key.
    ///
    /// Rows keep their input order inside each partition.
    pub fn into_partitions(self) -> BTreeMap<String, Vec<Row>> {
        let mut partitions: BTreeMap<String, Vec<Row>> = BTreeMap::new();
        for row in self.rows {
            partitions
                .entry(row.partition_key.clone())
                .or_default()
                .push(row);
        }
        partitions
    }
}

impl FromIterator<Row> for Dataset {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Normalize a raw county name into a partition key.
///
/// Lowercases, turns spaces into underscores and drops periods, so
/// `"St. Lawrence"` becomes `"st_lawrence"`.
pub fn normalize_partition_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace('.', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, day: u32) -> Row {
        let date = NaiveDate::from_ymd_opt(2021, 1, day).unwrap();
        Row {
            partition_key: key.into(),
            date_key: date,
            new_count: 1,
            cumulative_positive: day as u64,
            total_tests: 10,
            cumulative_tests: 10 * day as u64,
            load_timestamp: date,
        }
    }

    #[test]
    fn normalizes_county_names() {
        assert_eq!(normalize_partition_key("St. Lawrence"), "st_lawrence");
        assert_eq!(normalize_partition_key("New York"), "new_york");
        assert_eq!(normalize_partition_key("Erie"), "erie");
    }

    #[test]
    fn grouping_preserves_order_within_partition() {
        let dataset: Dataset = vec![row("erie", 3), row("kings", 1), row("erie", 1), row("erie", 2)]
            .into_iter()
            .collect();

        assert!(!dataset.is_empty());
        assert!(Dataset::default().is_empty());
        assert_eq!(dataset.partition_keys().len(), 2);

        let partitions = dataset.into_partitions();
        let days: Vec<_> = partitions["erie"].iter().map(|r| r.cumulative_positive).collect();
        assert_eq!(days, vec![3, 1, 2]);
        assert_eq!(partitions["kings"].len(), 1);
    }
}
