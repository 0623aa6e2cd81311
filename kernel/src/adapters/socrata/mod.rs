// Socrata rows.json Transformer
//
// Turns a Socrata "rows.json" export into a typed Dataset. Column
// positions are discovered from the view metadata; every cell the
// loader needs is coerced here so malformed values never reach the
// store.

use std::collections::HashMap;

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::adapters::fetch::RawDocument;
use crate::dataset::{normalize_partition_key, Dataset, Row};

const COUNTY: &str = "county";
const TEST_DATE: &str = "test_date";
const NEW_POSITIVES: &str = "new_positives";
const CUMULATIVE_POSITIVES: &str = "cumulative_number_of_positives";
const TOTAL_TESTS: &str = "total_number_of_tests";
const CUMULATIVE_TESTS: &str = "cumulative_number_of_tests";

/// Subset of the Socrata export we read.
///
/// Everything else in `meta` (owner, grants, approvals) is ignored.
#[derive(Debug, Deserialize)]
pub struct SocrataDocument {
    pub meta: SocrataMeta,
    pub data: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct SocrataMeta {
    pub view: SocrataView,
}

#[derive(Debug, Deserialize)]
pub struct SocrataView {
    pub columns: Vec<SocrataColumn>,
}

#[derive(Debug, Deserialize)]
pub struct SocrataColumn {
    #[serde(rename = "fieldName")]
    pub field_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("required column `{0}` not found in view metadata")]
    MissingColumn(&'static str),

    #[error("row {row} has {actual} cells, expected {expected}")]
    ColumnCountMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("row {row}: `{column}` is not a non-negative integer: {value}")]
    NotNumeric {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: `{value}` is not a recognizable date")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: county is missing")]
    MissingCounty { row: usize },

    #[error("expected {expected} partitions, found {actual}")]
    PartitionCountMismatch { expected: usize, actual: usize },
}

/// Turns a raw document into a typed dataset.
pub trait Transformer {
    fn transform(&self, raw: &RawDocument) -> Result<Dataset, TransformError>;
}

#[derive(Debug, Clone)]
pub struct SocrataTransformer {
    load_date: NaiveDate,
}

impl SocrataTransformer {
    /// Stamp rows with `load_date`.
    pub fn new(load_date: NaiveDate) -> Self {
        Self { load_date }
    }

    /// Stamp rows with today's local date.
    pub fn today() -> Self {
        Self::new(Local::now().date_naive())
    }
}

impl Transformer for SocrataTransformer {
    fn transform(&self, raw: &RawDocument) -> Result<Dataset, TransformError> {
        let doc: SocrataDocument = serde_json::from_slice(raw.as_bytes())?;
        info!(
            columns = doc.meta.view.columns.len(),
            rows = doc.data.len(),
            "parsed source document"
        );

        let layout = ColumnLayout::discover(&doc.meta.view.columns)?;

        doc.data
            .iter()
            .enumerate()
            .map(|(idx, cells)| layout.row(idx, cells, self.load_date))
            .collect::<Result<Vec<_>, _>>()
            .map(Dataset::new)
    }
}

/// Cell positions of the fields the loader needs.
struct ColumnLayout {
    width: usize,
    county: usize,
    test_date: usize,
    new_positives: usize,
    cumulative_positives: usize,
    total_tests: usize,
    cumulative_tests: usize,
}

impl ColumnLayout {
    fn discover(columns: &[SocrataColumn]) -> Result<Self, TransformError> {
        // System columns are named like `:sid`; strip the colon.
        let positions: HashMap<String, usize> = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.field_name.replace(':', ""), idx))
            .collect();

        let find = |name: &'static str| {
            positions
                .get(name)
                .copied()
                .ok_or(TransformError::MissingColumn(name))
        };

        Ok(Self {
            width: columns.len(),
            county: find(COUNTY)?,
            test_date: find(TEST_DATE)?,
            new_positives: find(NEW_POSITIVES)?,
            cumulative_positives: find(CUMULATIVE_POSITIVES)?,
            total_tests: find(TOTAL_TESTS)?,
            cumulative_tests: find(CUMULATIVE_TESTS)?,
        })
    }

    fn row(&self, idx: usize, cells: &[Value], load_date: NaiveDate) -> Result<Row, TransformError> {
        if cells.len() != self.width {
            return Err(TransformError::ColumnCountMismatch {
                row: idx,
                expected: self.width,
                actual: cells.len(),
            });
        }

        let county = cells[self.county]
            .as_str()
            .map(normalize_partition_key)
            .filter(|key| !key.is_empty())
            .ok_or(TransformError::MissingCounty { row: idx })?;

        Ok(Row {
            partition_key: county,
            date_key: parse_date(idx, &cells[self.test_date])?,
            new_count: parse_count(idx, NEW_POSITIVES, &cells[self.new_positives])?,
            cumulative_positive: parse_count(
                idx,
                CUMULATIVE_POSITIVES,
                &cells[self.cumulative_positives],
            )?,
            total_tests: parse_count(idx, TOTAL_TESTS, &cells[self.total_tests])?,
            cumulative_tests: parse_count(idx, CUMULATIVE_TESTS, &cells[self.cumulative_tests])?,
            load_timestamp: load_date,
        })
    }
}

/// Socrata serializes numbers as strings; accept both.
fn parse_count(row: usize, column: &'static str, value: &Value) -> Result<u64, TransformError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| TransformError::NotNumeric {
        row,
        column,
        value: value.to_string(),
    })
}

/// Floating timestamps (`2020-03-01T00:00:00.000`) or plain dates.
fn parse_date(row: usize, value: &Value) -> Result<NaiveDate, TransformError> {
    let invalid = || TransformError::InvalidDate {
        row,
        value: value.to_string(),
    };
    let raw = value.as_str().map(str::trim).ok_or_else(invalid)?;

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|ts| ts.date())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(data: Value) -> RawDocument {
        let doc = json!({
            "meta": { "view": { "columns": [
                { "fieldName": ":sid" },
                { "fieldName": ":id" },
                { "fieldName": "test_date" },
                { "fieldName": "county" },
                { "fieldName": "new_positives" },
                { "fieldName": "cumulative_number_of_positives" },
                { "fieldName": "total_number_of_tests" },
                { "fieldName": "cumulative_number_of_tests" }
            ]}},
            "data": data
        });
        RawDocument(serde_json::to_vec(&doc).unwrap())
    }

    fn load_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 28).unwrap()
    }

    #[test]
    fn transforms_socrata_rows() {
        let raw = document(json!([
            ["row-1", "00000000-0000", "2020-03-01T00:00:00.000", "St. Lawrence", "0", "0", "3", "3"],
            ["row-2", "00000000-0001", "2020-03-02T00:00:00", "New York", 12, "40", "100", "250"]
        ]));

        let dataset = SocrataTransformer::new(load_date()).transform(&raw).unwrap();
        let rows = dataset.rows();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].partition_key, "st_lawrence");
        assert_eq!(rows[0].date_key, NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
        assert_eq!(rows[0].total_tests, 3);
        assert_eq!(rows[1].partition_key, "new_york");
        assert_eq!(rows[1].new_count, 12);
        assert_eq!(rows[1].cumulative_tests, 250);
        assert!(rows.iter().all(|r| r.load_timestamp == load_date()));
    }

    #[test]
    fn missing_column_is_fatal() {
        let raw = RawDocument(
            serde_json::to_vec(&json!({
                "meta": { "view": { "columns": [{ "fieldName": "county" }] } },
                "data": []
            }))
            .unwrap(),
        );

        let err = SocrataTransformer::new(load_date()).transform(&raw).unwrap_err();
        assert!(matches!(err, TransformError::MissingColumn("test_date")));
    }

    #[test]
    fn short_row_is_rejected() {
        let raw = document(json!([["row-1", "2020-03-01", "Erie"]]));

        let err = SocrataTransformer::new(load_date()).transform(&raw).unwrap_err();
        assert!(matches!(
            err,
            TransformError::ColumnCountMismatch { row: 0, expected: 8, actual: 3 }
        ));
    }

    #[test]
    fn non_numeric_counts_are_rejected() {
        for bad in [json!("n/a"), json!(-4), json!(null), json!("1.5")] {
            let raw = document(json!([[
                "row-1", "id", "2020-03-01T00:00:00.000", "Erie", bad, "0", "0", "0"
            ]]));

            let err = SocrataTransformer::new(load_date()).transform(&raw).unwrap_err();
            assert!(
                matches!(err, TransformError::NotNumeric { column: "new_positives", .. }),
                "unexpected error: {err}"
            );
        }
    }

    #[test]
    fn bad_dates_are_rejected() {
        let raw = document(json!([["row-1", "id", "March 1st", "Erie", "0", "0", "0", "0"]]));

        let err = SocrataTransformer::new(load_date()).transform(&raw).unwrap_err();
        assert!(matches!(err, TransformError::InvalidDate { row: 0, .. }));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = SocrataTransformer::new(load_date())
            .transform(&RawDocument(b"{ not json".to_vec()))
            .unwrap_err();
        assert!(matches!(err, TransformError::Json(_)));
    }
}
