// Ingestion Worker
//
// Runs the full pipeline for a single partition:
// ensure table → read watermark → filter → write → LoadResult.
// Every failure is captured here and never reaches sibling partitions.

use chrono::Utc;
use tracing::{info, warn};

use crate::dataset::Row;
use crate::filter::filter_new_rows;
use crate::report::{ErrorKind, LoadOutcome, LoadResult};
use crate::schema::{self, InvalidPartitionKey, TableName};
use crate::store::{Store, StoreConnection, StoreError};
use crate::watermark::{read_watermark, Watermark};
use crate::writer::write_partition;

/// Errors that abort one partition's ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    InvalidPartitionKey(#[from] InvalidPartitionKey),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::InvalidPartitionKey(_) => ErrorKind::InvalidPartitionKey,
            IngestError::Store(_) => ErrorKind::Store,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ingested {
    rows_written: usize,
    watermark_before: Watermark,
    watermark_after: Watermark,
}

/// Load one partition on a connection of its own.
pub fn ingest_partition<S: Store>(store: &S, partition_key: &str, rows: &[Row]) -> LoadResult {
    match try_ingest(store, partition_key, rows) {
        Ok(done) => {
            info!(
                partition = partition_key,
                rows_written = done.rows_written,
                watermark = %done.watermark_after,
                "partition updated"
            );
            LoadResult {
                partition_key: partition_key.to_owned(),
                outcome: LoadOutcome::Loaded {
                    rows_written: done.rows_written,
                    watermark_before: done.watermark_before,
                    watermark_after: done.watermark_after,
                    completed_at: Utc::now(),
                },
            }
        }
        Err(e) => {
            warn!(partition = partition_key, error = %e, "partition load failed");
            LoadResult::failed(partition_key, e.kind(), e.to_string())
        }
    }
}

fn try_ingest<S: Store>(
    store: &S,
    partition_key: &str,
    rows: &[Row],
) -> Result<Ingested, IngestError> {
    let table = TableName::for_partition(partition_key)?;
    let mut conn = store.connect()?;

    conn.execute_ddl(&schema::create_table_statement(&table))?;

    let watermark_before = read_watermark(&mut conn, &table)?;
    let fresh = filter_new_rows(rows, &watermark_before);
    let rows_written = write_partition(&mut conn, &table, &fresh)?;

    let watermark_after = if rows_written == 0 {
        watermark_before
    } else {
        read_watermark(&mut conn, &table)?
    };

    Ok(Ingested {
        rows_written,
        watermark_before,
        watermark_after,
    })
}
