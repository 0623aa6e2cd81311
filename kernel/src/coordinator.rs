// Load Coordinator
//
// Fans a dataset out into one ingestion task per partition on a bounded
// pool of scoped threads, then folds the results into an AggregateReport.
//
// Partitions never share a table or a connection, so no cross-partition
// locking happens here. Failures stay inside their partition.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::unbounded;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::dataset::{Dataset, Row};
use crate::report::{AggregateReport, ErrorKind, LoadResult};
use crate::store::Store;
use crate::worker::ingest_partition;

/// Knobs for a single `run_load` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Pool size; `None` uses the available parallelism.
    pub max_workers: Option<usize>,

    /// Wall-clock budget for the run. Partitions not started when it
    /// elapses are reported as failed; started ones run to completion.
    pub deadline: Option<Duration>,
}

impl LoadOptions {
    fn pool_size(&self, partitions: usize) -> usize {
        let wanted = self
            .max_workers
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1)
            });
        wanted.min(partitions).max(1)
    }
}

pub struct LoadCoordinator<S: Store> {
    store: S,
    options: LoadOptions,
}

impl<S: Store> LoadCoordinator<S> {
    pub fn new(store: S, options: LoadOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load every partition of `dataset`, blocking until each one has a result.
    ///
    /// Every partition yields exactly one `LoadResult`. Results appear in
    /// completion order.
    pub fn run_load(&self, dataset: Dataset) -> AggregateReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let deadline = self.options.deadline.map(|budget| Instant::now() + budget);

        let partitions = dataset.into_partitions();
        let total = partitions.len();
        let workers = self.options.pool_size(total);

        let span = info_span!("load", %run_id);
        let _entered = span.enter();
        info!(partitions = total, workers, "starting load");

        let (job_tx, job_rx) = unbounded::<(String, Vec<Row>)>();
        for job in partitions {
            // The receiver is held right here, so the queue cannot be disconnected.
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded::<LoadResult>();
        let mut results = Vec::with_capacity(total);
        let store = &self.store;

        thread::scope(|scope| {
            for _ in 0..workers {
                let jobs = job_rx.clone();
                let out = result_tx.clone();
                let span = span.clone();

                scope.spawn(move || {
                    let _entered = span.enter();
                    for (key, rows) in jobs.iter() {
                        let result = if deadline.is_some_and(|d| Instant::now() >= d) {
                            warn!(partition = %key, "deadline passed, partition not started");
                            LoadResult::failed(
                                key,
                                ErrorKind::DeadlineExceeded,
                                "run deadline passed before the partition was started",
                            )
                        } else {
                            ingest_isolated(store, &key, &rows)
                        };

                        if out.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            results.extend(result_rx.iter());
        });

        let report = AggregateReport::from_results(run_id, started_at, results);
        info!(
            partitions = report.partitions_processed,
            succeeded = report.partitions_succeeded,
            failed = report.failed.len(),
            rows_written = report.rows_written,
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "load finished"
        );
        report
    }
}

/// Run one partition, turning a panic into a failed result for that partition only.
fn ingest_isolated<S: Store>(store: &S, key: &str, rows: &[Row]) -> LoadResult {
    panic::catch_unwind(AssertUnwindSafe(|| ingest_partition(store, key, rows))).unwrap_or_else(
        |payload| {
            let message = panic_message(payload.as_ref());
            warn!(partition = key, %message, "partition worker panicked");
            LoadResult::failed(key, ErrorKind::Panicked, message)
        },
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_owned()
    }
}
