use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use county_ingest_kernel::adapters::fetch::{SourceFetcher, SourceLocator};
use county_ingest_kernel::adapters::socrata::SocrataTransformer;
use county_ingest_kernel::config::{EtlConfig, PartitionCountPolicy};
use county_ingest_kernel::pipeline::run_pipeline;
use county_ingest_kernel::store::SqliteStore;
use county_ingest_kernel::LoadCoordinator;

/// Incremental county health-data loader
#[derive(Parser, Debug)]
#[command(name = "county-ingest")]
#[command(about = "Load the daily county testing dataset into per-county SQLite tables", long_about = None)]
struct Cli {
    /// Path to config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source URL or local rows.json path
    #[arg(long)]
    source: Option<String>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,

    /// Worker pool size (defaults to available parallelism)
    #[arg(long)]
    workers: Option<usize>,

    /// Stop starting new partitions after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Expected number of distinct counties
    #[arg(long)]
    expected_partitions: Option<usize>,

    /// Abort when the county count differs from the expectation
    #[arg(long)]
    strict_partition_count: bool,

    /// Load date stamped on every row (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    load_date: Option<NaiveDate>,

    /// Exit non-zero if any partition failed
    #[arg(long)]
    fail_on_partition_error: bool,
}

impl Cli {
    /// Flags win over the config file, which wins over defaults.
    fn apply_to(&self, mut config: EtlConfig) -> EtlConfig {
        if let Some(source) = &self.source {
            config.source = source.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(workers) = self.workers {
            config.load.max_workers = Some(workers);
        }
        if let Some(secs) = self.deadline_secs {
            config.load.deadline_secs = Some(secs);
        }
        if let Some(expected) = self.expected_partitions {
            config.load.expected_partitions = Some(expected);
        }
        if self.strict_partition_count {
            config.load.partition_count_policy = PartitionCountPolicy::Fail;
        }
        config
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ----------------------------
    // Load config
    // ----------------------------
    let config = match &cli.config {
        Some(path) => EtlConfig::from_json_file(path)?,
        None => EtlConfig::default(),
    };
    let config = cli.apply_to(config);

    // ----------------------------
    // Collaborators
    // ----------------------------
    let fetcher = SourceFetcher::new(config.fetch.http_options())?;
    let transformer = match cli.load_date {
        Some(date) => SocrataTransformer::new(date),
        None => SocrataTransformer::today(),
    };
    let store = SqliteStore::open(&config.database, config.load.busy_timeout())
        .with_context(|| format!("opening database {}", config.database.display()))?;
    let coordinator = LoadCoordinator::new(store, config.load.load_options());

    // ----------------------------
    // Run
    // ----------------------------
    let source = SourceLocator::parse(&config.source);
    info!(%source, database = %config.database.display(), "starting run");
    let report = run_pipeline(&fetcher, &transformer, &coordinator, &source, &config.load)?;

    // ----------------------------
    // Output
    // ----------------------------
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.has_failures() {
        warn!(failed = report.failed.len(), "some partitions failed to load");
        if cli.fail_on_partition_error {
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_values() {
        let cli = Cli::parse_from([
            "county-ingest",
            "--database",
            "ny.db",
            "--workers",
            "3",
            "--strict-partition-count",
            "--load-date",
            "2021-01-28",
        ]);
        let base = EtlConfig {
            source: "rows.json".into(),
            ..EtlConfig::default()
        };

        let config = cli.apply_to(base);

        assert_eq!(config.source, "rows.json");
        assert_eq!(config.database, PathBuf::from("ny.db"));
        assert_eq!(config.load.max_workers, Some(3));
        assert_eq!(config.load.partition_count_policy, PartitionCountPolicy::Fail);
        assert_eq!(cli.load_date, NaiveDate::from_ymd_opt(2021, 1, 28));
    }
}
