// County Ingest Kernel
//
// Incremental, partition-per-county load engine for daily public-health
// datasets, plus the adapters that feed it.

pub mod adapters;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod filter;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod store;
pub mod watermark;
pub mod worker;
pub mod writer;

pub use coordinator::{LoadCoordinator, LoadOptions};
pub use dataset::{Dataset, Row};
pub use report::{AggregateReport, ErrorKind, LoadOutcome, LoadResult};
