// Watermark Reader
//
// The watermark is the latest date already stored for a partition.
// It is always derived live from table contents and never cached.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schema::{self, TableName};
use crate::store::{StoreConnection, StoreError};

/// Incremental-load boundary for one partition.
///
/// `Absent` orders below every date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Watermark {
    /// Partition has no stored rows, or no table yet.
    Absent,

    /// Latest stored `date_key`.
    At(NaiveDate),
}

impl Watermark {
    /// Whether a row dated `date` lies beyond this watermark.
    pub fn admits(&self, date: NaiveDate) -> bool {
        match self {
            Watermark::Absent => true,
            Watermark::At(latest) => date > *latest,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Watermark::Absent => None,
            Watermark::At(date) => Some(*date),
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watermark::Absent => f.write_str("absent"),
            Watermark::At(date) => write!(f, "{date}"),
        }
    }
}

/// Read the current watermark of `table`.
///
/// A missing table is treated exactly like an empty one.
pub fn read_watermark<C: StoreConnection>(
    conn: &mut C,
    table: &TableName,
) -> Result<Watermark, StoreError> {
    let value = match conn.query_scalar(&schema::max_date_statement(table)) {
        Ok(value) => value,
        Err(StoreError::MissingTable(_)) => None,
        Err(e) => return Err(e),
    };

    match value {
        None => Ok(Watermark::Absent),
        Some(raw) => raw
            .parse::<NaiveDate>()
            .map(Watermark::At)
            .map_err(|_| StoreError::CorruptValue {
                table: table.to_string(),
                value: raw,
            }),
    }
}
