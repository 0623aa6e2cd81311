// End-to-End ETL Run
//
// fetch → transform → partition-count check → incremental load
//
// Fetch and transform failures abort the run before the store is touched.

use tracing::{info, warn};

use crate::adapters::fetch::{FetchError, Fetcher, SourceLocator};
use crate::adapters::socrata::{TransformError, Transformer};
use crate::config::{LoadConfig, PartitionCountPolicy};
use crate::coordinator::LoadCoordinator;
use crate::dataset::Dataset;
use crate::report::AggregateReport;
use crate::store::Store;

/// Errors that stop a run before any partition is loaded.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),
}

/// Compare the discovered partition count against the expectation.
pub fn check_partition_count(dataset: &Dataset, load: &LoadConfig) -> Result<(), TransformError> {
    let Some(expected) = load.expected_partitions else {
        return Ok(());
    };
    let actual = dataset.partition_keys().len();
    if actual == expected {
        return Ok(());
    }

    match load.partition_count_policy {
        PartitionCountPolicy::Warn => {
            warn!(expected, actual, "partition count mismatch, loading anyway");
            Ok(())
        }
        PartitionCountPolicy::Fail => {
            Err(TransformError::PartitionCountMismatch { expected, actual })
        }
    }
}

/// Run one full ETL cycle against `coordinator`'s store.
pub fn run_pipeline<F, T, S>(
    fetcher: &F,
    transformer: &T,
    coordinator: &LoadCoordinator<S>,
    source: &SourceLocator,
    load: &LoadConfig,
) -> Result<AggregateReport, PipelineError>
where
    F: Fetcher,
    T: Transformer,
    S: Store,
{
    let raw = fetcher.fetch(source)?;
    let dataset = transformer.transform(&raw)?;
    check_partition_count(&dataset, load)?;

    info!(
        rows = dataset.len(),
        partitions = dataset.partition_keys().len(),
        "dataset ready"
    );

    Ok(coordinator.run_load(dataset))
}
