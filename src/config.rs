//! Option structs consumed by the snapshot, diff, fetch and verify stages.
//!
//! These are plain values with defaults matching the command line; the
//! binary maps its flags onto them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the snapshot builder collects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// File name suffixes to digest. Empty means no files are collected.
    pub extensions: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: vec![".js".to_string(), ".json".to_string()],
        }
    }
}

impl ScanOptions {
    pub fn without_files() -> Self {
        Self { extensions: vec![] }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn should_digest(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|ext| file_name.ends_with(ext.as_str()))
    }
}

/// Which discrepancy categories the diff engine reports.
///
/// Name changes are always reported and have no toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonPolicy {
    pub version: bool,
    pub file_hash: bool,
    pub file_missing: bool,
    pub source_link: bool,
    pub submodules: bool,
}

impl Default for ComparisonPolicy {
    fn default() -> Self {
        Self {
            version: true,
            file_hash: true,
            file_missing: true,
            source_link: true,
            submodules: true,
        }
    }
}

impl ComparisonPolicy {
    /// Only name changes are reported.
    pub fn none() -> Self {
        Self {
            version: false,
            file_hash: false,
            file_missing: false,
            source_link: false,
            submodules: false,
        }
    }
}

/// Retry and timeout settings for the resilient fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Upper bound on each attempt, independent of retries
    pub attempt_timeout: Duration,

    /// Number of backoff steps before giving up; step `n` waits `n * backoff_unit`
    pub max_backoff_steps: u32,

    pub backoff_unit: Duration,

    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            max_backoff_steps: 5,
            backoff_unit: Duration::from_secs(1),
            user_agent: format!("npm-verify/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl FetchConfig {
    pub fn with_backoff(mut self, unit: Duration, max_steps: u32) -> Self {
        self.backoff_unit = unit;
        self.max_backoff_steps = max_steps;
        self
    }

    /// Total time spent sleeping if every attempt fails.
    pub fn cumulative_backoff(&self) -> Duration {
        let steps: u32 = (1..=self.max_backoff_steps).sum();
        self.backoff_unit * steps
    }
}

/// Settings for upstream verification runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// Timeout for each blocking stage (extraction, analysis)
    pub stage_timeout: Duration,

    /// Maximum number of packages verified at the same time
    pub concurrency: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(300), // 5 minutes
            concurrency: 4,
        }
    }
}
