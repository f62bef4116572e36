//! Outcome and error types for upstream verification.

use crate::fetch::{CandidateError, FetchError};
use crate::model::Discrepancy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Outcomes
// ============================================================================

/// Result of verifying one package against its upstream source.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// Upstream copy was fetched, extracted and compared
    Verified(VerifyReport),

    /// Comparison was skipped; not an error
    Abstained(Abstention),
}

impl VerifyOutcome {
    pub fn discrepancies(&self) -> &[Discrepancy] {
        match self {
            Self::Verified(report) => &report.discrepancies,
            Self::Abstained(_) => &[],
        }
    }
}

/// Why a package was not compared with upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Abstention {
    /// No GitHub project could be determined
    NoSourceLink,

    /// No version-shaped version was recorded
    NoVersion,

    /// Every candidate archive URL returned 404
    NoTaggedRelease { version: String },

    /// The archive did not unpack to exactly one top-level directory
    AmbiguousArchive { entries: Vec<String> },

    /// The unpacked copy has no readable manifest
    UnreadableUpstream,
}

#[derive(Debug)]
pub struct VerifyReport {
    /// Differences between the local package and the upstream copy
    pub discrepancies: Vec<Discrepancy>,

    pub stats: VerifyStats,
}

/// Statistics about one verification.
#[derive(Debug, Default, Clone)]
pub struct VerifyStats {
    /// Archive URL that was downloaded
    pub archive_url: String,

    /// Time spent downloading (milliseconds)
    pub fetch_duration_ms: u64,

    /// Time spent unpacking (milliseconds)
    pub extraction_duration_ms: u64,

    /// Time spent snapshotting the unpacked copy (milliseconds)
    pub analysis_duration_ms: u64,

    /// Number of files digested in the upstream copy
    pub files_processed: usize,

    pub total_duration_ms: u64,
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while unpacking an archive.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Failed to create or write into the extraction directory
    #[error("I/O error during extraction: {0}")]
    Io(#[from] std::io::Error),

    /// Archive is corrupted or not a zip file
    #[error("Corrupted archive: {0}")]
    CorruptedArchive(#[from] zip::result::ZipError),

    /// An entry would escape the extraction root
    #[error("Path traversal attempt rejected: '{attempted}'")]
    PathTraversal { attempted: String },
}

/// Fatal errors for one package's verification.
///
/// Soft outcomes (no source link, no tagged release, ambiguous archive)
/// are reported as [`VerifyOutcome::Abstained`] instead.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Cannot derive archive URLs for '{package}': {source}")]
    Candidate {
        package: String,
        #[source]
        source: CandidateError,
    },

    #[error("Failed to download upstream copy of '{package}': {source}")]
    Fetch {
        package: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to extract upstream copy of '{package}': {source}")]
    Extraction {
        package: String,
        #[source]
        source: ExtractionError,
    },

    /// Stage execution exceeded timeout
    #[error("Stage '{stage}' timed out after {timeout_secs}s for '{package}'")]
    StageTimeout {
        package: String,
        stage: String,
        timeout_secs: u64,
    },

    #[error("Task failed for '{package}': {message}")]
    Task { package: String, message: String },
}
