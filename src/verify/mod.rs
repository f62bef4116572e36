//! Verify module - comparing installed packages against a reference.
//!
//! Two references are supported:
//! - **Upstream**: the tagged source archive a package's manifest points
//!   to, via [`UpstreamVerifier`]
//! - **Baseline**: a snapshot captured by an earlier run, via
//!   [`compare_to_baseline`] (no network)

pub mod extract;
pub mod pipeline;
pub mod traits;

pub use pipeline::{SourceInfo, TempExtraction, UpstreamVerifier};
pub use traits::{
    Abstention, ExtractionError, VerifyError, VerifyOutcome, VerifyReport, VerifyStats,
};

use crate::config::ComparisonPolicy;
use crate::diff;
use crate::model::{Discrepancy, PackageSnapshot};
use crate::traits::SnapshotCodec;
use crate::warnings::Warnings;

/// Compares the current tree with a baseline persisted by an earlier run.
///
/// Returns `None` (with a warning) if the baseline cannot be decoded.
pub fn compare_to_baseline(
    codec: &dyn SnapshotCodec,
    baseline: &str,
    current: &PackageSnapshot,
    policy: &ComparisonPolicy,
    warnings: &mut Warnings,
) -> Option<Vec<Discrepancy>> {
    match codec.decode(baseline) {
        Ok(previous) => Some(diff::compare(&previous, current, policy)),
        Err(e) => {
            warnings.warn(format!(
                "Could not parse input file ({e}). Will not compare to current output for discrepancies."
            ));
            None
        }
    }
}
