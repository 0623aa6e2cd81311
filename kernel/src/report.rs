// Load Results & Aggregate Report
//
// One LoadResult per partition, folded into a run-level summary.
// Nothing here is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::watermark::Watermark;

/// Why a partition failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Partition key is not a safe table identifier.
    InvalidPartitionKey,

    /// Connection, query or write failure.
    Store,

    /// Run deadline passed before the partition was started.
    DeadlineExceeded,

    /// Worker panicked while loading the partition.
    Panicked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded {
        rows_written: usize,
        watermark_before: Watermark,
        watermark_after: Watermark,
        completed_at: DateTime<Utc>,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

/// Outcome of one partition's ingestion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    pub partition_key: String,
    #[serde(flatten)]
    pub outcome: LoadOutcome,
}

impl LoadResult {
    pub fn failed(partition_key: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            outcome: LoadOutcome::Failed {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, LoadOutcome::Loaded { .. })
    }

    pub fn rows_written(&self) -> usize {
        match self.outcome {
            LoadOutcome::Loaded { rows_written, .. } => rows_written,
            LoadOutcome::Failed { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionFailure {
    pub partition_key: String,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Run-level summary of a load.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub partitions_processed: usize,
    pub partitions_succeeded: usize,
    pub rows_written: usize,
    pub failed: Vec<PartitionFailure>,
    pub results: Vec<LoadResult>,
}

impl AggregateReport {
    /// Fold per-partition results, kept in the order they arrived.
    pub fn from_results(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        results: Vec<LoadResult>,
    ) -> Self {
        let failed = results
            .iter()
            .filter_map(|r| match &r.outcome {
                LoadOutcome::Failed { kind, message } => Some(PartitionFailure {
                    partition_key: r.partition_key.clone(),
                    kind: *kind,
                    reason: message.clone(),
                }),
                LoadOutcome::Loaded { .. } => None,
            })
            .collect::<Vec<_>>();

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            partitions_processed: results.len(),
            partitions_succeeded: results.len() - failed.len(),
            rows_written: results.iter().map(LoadResult::rows_written).sum(),
            failed,
            results,
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn result_for(&self, partition_key: &str) -> Option<&LoadResult> {
        self.results.iter().find(|r| r.partition_key == partition_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(key: &str, rows_written: usize) -> LoadResult {
        LoadResult {
            partition_key: key.into(),
            outcome: LoadOutcome::Loaded {
                rows_written,
                watermark_before: Watermark::Absent,
                watermark_after: Watermark::Absent,
                completed_at: Utc::now(),
            },
        }
    }

    #[test]
    fn aggregates_rows_and_failures() {
        let report = AggregateReport::from_results(
            Uuid::new_v4(),
            Utc::now(),
            vec![
                loaded("erie", 3),
                LoadResult::failed("kings", ErrorKind::Store, "disk I/O error"),
                loaded("queens", 2),
            ],
        );

        assert_eq!(report.partitions_processed, 3);
        assert_eq!(report.partitions_succeeded, 2);
        assert_eq!(report.rows_written, 5);
        assert!(report.has_failures());
        assert_eq!(report.failed[0].partition_key, "kings");
        assert_eq!(report.failed[0].kind, ErrorKind::Store);
    }

    #[test]
    fn serializes_outcome_inline() {
        let json = serde_json::to_value(LoadResult::failed(
            "st.x",
            ErrorKind::InvalidPartitionKey,
            "bad key",
        ))
        .unwrap();

        assert_eq!(json["partition_key"], "st.x");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "invalid_partition_key");
    }
}
