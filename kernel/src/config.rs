// ETL Configuration
//
// Explicit configuration value handed to the fetcher, store and
// coordinator. Loaded from JSON; every field has a default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::fetch::HttpOptions;
use crate::coordinator::LoadOptions;

/// NY State Department of Health county testing dataset.
pub const DEFAULT_SOURCE: &str =
    "https://health.data.ny.gov/api/views/xdss-u53e/rows.json?accessType=DOWNLOAD";

pub const DEFAULT_DATABASE: &str = "covid.db";

/// Number of counties in New York State.
pub const DEFAULT_EXPECTED_PARTITIONS: usize = 62;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// What to do when the number of partitions differs from the expectation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionCountPolicy {
    /// Log the mismatch and load anyway.
    #[default]
    Warn,

    /// Abort before anything is written.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// URL or local path of the source document.
    pub source: String,

    /// SQLite database file.
    pub database: PathBuf,

    pub fetch: FetchConfig,
    pub load: LoadConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Worker pool size; unset means available parallelism.
    pub max_workers: Option<usize>,

    /// Run deadline in seconds; unset means no deadline.
    pub deadline_secs: Option<u64>,

    /// How long a connection waits on a locked database.
    pub busy_timeout_ms: u64,

    pub expected_partitions: Option<usize>,
    pub partition_count_policy: PartitionCountPolicy,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.into(),
            database: PathBuf::from(DEFAULT_DATABASE),
            fetch: FetchConfig::default(),
            load: LoadConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        let http = HttpOptions::default();
        Self {
            timeout_secs: http.timeout.as_secs(),
            attempts: http.attempts,
            retry_delay_ms: http.retry_delay.as_millis() as u64,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_workers: None,
            deadline_secs: None,
            busy_timeout_ms: 5_000,
            expected_partitions: Some(DEFAULT_EXPECTED_PARTITIONS),
            partition_count_policy: PartitionCountPolicy::Warn,
        }
    }
}

impl EtlConfig {
    /// Read a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl FetchConfig {
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            attempts: self.attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

impl LoadConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            max_workers: self.max_workers,
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.json");
        std::fs::write(
            &path,
            r#"{ "database": "/tmp/ny.db", "load": { "max_workers": 4, "partition_count_policy": "fail" } }"#,
        )
        .unwrap();

        let config = EtlConfig::from_json_file(&path).unwrap();

        assert_eq!(config.source, DEFAULT_SOURCE);
        assert_eq!(config.database, PathBuf::from("/tmp/ny.db"));
        assert_eq!(config.load.max_workers, Some(4));
        assert_eq!(config.load.partition_count_policy, PartitionCountPolicy::Fail);
        assert_eq!(config.load.busy_timeout_ms, 5_000);
        assert_eq!(config.load.expected_partitions, Some(62));
        assert_eq!(config.fetch, FetchConfig::default());
    }

    #[test]
    fn converts_to_runtime_options() {
        let load = LoadConfig {
            deadline_secs: Some(30),
            ..LoadConfig::default()
        };

        assert_eq!(load.load_options().deadline, Some(Duration::from_secs(30)));
        assert_eq!(load.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.json");
        std::fs::write(&path, r#"{ "load": { "partition_count_policy": "panic" } }"#).unwrap();

        assert!(matches!(
            EtlConfig::from_json_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
