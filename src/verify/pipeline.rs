//! Upstream verification pipeline.
//!
//! This module provides the [`UpstreamVerifier`] coordinator that executes
//! sequential stages (Fetch → Extract → Snapshot → Diff) for one package:
//! - Async execution via `tokio`, blocking stages on `spawn_blocking`
//! - Configurable timeouts per blocking stage
//! - Structured logging via `tracing`
//! - Automatic cleanup of temporary resources via RAII (`Drop` on
//!   `TempExtraction` and the downloaded `TempArtifact`)

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use crate::config::{ComparisonPolicy, VerifyConfig};
use crate::diff;
use crate::fetch::{candidates, Fetcher, TempArtifact};
use crate::model::PackageSnapshot;
use crate::snapshot::SnapshotBuilder;
use crate::verify::extract::{extract_zip, top_level_entries};
use crate::verify::traits::{
    Abstention, ExtractionError, VerifyError, VerifyOutcome, VerifyReport, VerifyStats,
};
use crate::warnings::Warnings;

// ============================================================================
// Temporary extraction
// ============================================================================

/// Directory an upstream archive is unpacked into.
///
/// # RAII Cleanup
///
/// `TempExtraction` implements [`Drop`] so the directory is removed on every
/// exit path, including early returns and timeouts. It does not implement
/// `Clone`; clone `path` as a `PathBuf` if it needs to be shared.
///
/// # Security
///
/// Use [`TempExtraction::safe_child`] to resolve archive entry paths. It
/// rejects any path that would escape the root via `..` or absolute
/// components.
#[derive(Debug)]
pub struct TempExtraction {
    /// Directory containing extracted files
    pub path: PathBuf,

    /// Where the archive came from
    pub source_info: SourceInfo,

    /// Owning handle; `None` once kept or for directories not created here
    dir: Option<TempDir>,
}

impl TempExtraction {
    /// Creates a fresh `npm-verify-*` directory under `root`, or under the
    /// system temp dir when `root` is `None`.
    ///
    /// With `cleanup_on_drop` unset the directory is left behind for
    /// inspection.
    pub fn create(
        root: Option<&Path>,
        source_info: SourceInfo,
        cleanup_on_drop: bool,
    ) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("npm-verify-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let (path, dir) = if cleanup_on_drop {
            (dir.path().to_path_buf(), Some(dir))
        } else {
            (dir.keep(), None)
        };

        Ok(Self {
            path,
            source_info,
            dir,
        })
    }

    /// Resolves `relative` against the extraction root, rejecting any path
    /// that escapes the root.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `relative` contains `..` or is absolute.
    pub fn safe_child(&self, relative: &Path) -> Result<PathBuf, ExtractionError> {
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });

        if escapes {
            return Err(ExtractionError::PathTraversal {
                attempted: relative.display().to_string(),
            });
        }

        Ok(self.path.join(relative))
    }
}

impl Drop for TempExtraction {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!(
                    path = %self.path.display(),
                    archive = %self.source_info.archive_url,
                    error = %e,
                    "Failed to remove temporary extraction directory"
                );
            }
        }
    }
}

/// Source archive information.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// URL the archive was downloaded from
    pub archive_url: String,

    /// Archive size in bytes
    pub size_bytes: u64,
}

// ============================================================================
// Verifier
// ============================================================================

/// Compares installed packages against the source archive their manifest
/// points to.
///
/// The upstream copy is snapshotted with the same [`SnapshotBuilder`]
/// settings as the local tree. Building never touches the network, so the
/// upstream copy's own dependencies are never fetched in turn.
///
/// # Example
///
/// ```ignore
/// let verifier = UpstreamVerifier::new(
///     HttpFetcher::with_defaults()?,
///     SnapshotBuilder::npm(ScanOptions::default()),
///     ComparisonPolicy::default(),
/// )
/// .with_timeout(Duration::from_secs(60));
///
/// let mut warnings = Warnings::new();
/// let outcome = verifier.verify(&snapshot, &mut warnings).await?;
/// ```
pub struct UpstreamVerifier<F: Fetcher> {
    fetcher: F,

    builder: SnapshotBuilder,

    policy: ComparisonPolicy,

    /// Timeout for each blocking stage (default: 5 minutes)
    stage_timeout: Duration,

    /// Whether to remove extraction directories when done
    auto_cleanup: bool,

    /// Parent of extraction directories (default: system temp dir)
    extraction_root: Option<PathBuf>,
}

impl<F: Fetcher> UpstreamVerifier<F> {
    pub fn new(fetcher: F, builder: SnapshotBuilder, policy: ComparisonPolicy) -> Self {
        Self {
            fetcher,
            builder,
            policy,
            stage_timeout: VerifyConfig::default().stage_timeout,
            auto_cleanup: true,
            extraction_root: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// If `false`, extraction directories are left behind for inspection.
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.auto_cleanup = cleanup;
        self
    }

    /// Unpacks archives under `root` instead of the system temp dir.
    pub fn with_extraction_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.extraction_root = Some(root.into());
        self
    }

    /// Verifies `local` against its upstream source archive.
    ///
    /// Tries each archive candidate in order; a 404 moves on to the next.
    /// Soft failures are recorded in `warnings` and returned as
    /// [`VerifyOutcome::Abstained`].
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] if a download fails for any reason other
    /// than 404 (after retries), the archive cannot be unpacked, or a
    /// stage times out.
    #[instrument(skip_all, fields(package = %local.name_or_location()))]
    pub async fn verify(
        &self,
        local: &PackageSnapshot,
        warnings: &mut Warnings,
    ) -> Result<VerifyOutcome, VerifyError> {
        let start = Instant::now();
        let package = local.name_or_location().to_string();
        let mut stats = VerifyStats::default();

        if !local.has_source_link() {
            info!("No source link for '{}'; skipping upstream comparison", package);
            return Ok(VerifyOutcome::Abstained(Abstention::NoSourceLink));
        }
        let Some(version) = local.version.as_deref() else {
            info!("No version for '{}'; skipping upstream comparison", package);
            return Ok(VerifyOutcome::Abstained(Abstention::NoVersion));
        };

        // ====================================================================
        // Stage 1: Fetch
        // ====================================================================

        let fetch_start = Instant::now();
        let Some(artifact) = self.fetch_archive(local, version, &package).await? else {
            warnings.warn(format!(
                "Could not resolve GitHub link for '{package}'; maybe this project does not \
                 have a tagged release for version '{version}'? Skipping comparison to GitHub project."
            ));
            return Ok(VerifyOutcome::Abstained(Abstention::NoTaggedRelease {
                version: version.to_string(),
            }));
        };
        stats.fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
        stats.archive_url = artifact.url().to_string();

        // ====================================================================
        // Stage 2: Extraction
        // ====================================================================

        let extraction_start = Instant::now();
        let source_info = SourceInfo {
            archive_url: artifact.url().to_string(),
            size_bytes: artifact.size_bytes(),
        };
        let archive_path = artifact.path().to_path_buf();
        let auto_cleanup = self.auto_cleanup;
        let extraction_root = self.extraction_root.clone();

        let extracted = timeout(
            self.stage_timeout,
            tokio::task::spawn_blocking(move || -> Result<_, ExtractionError> {
                let temp =
                    TempExtraction::create(extraction_root.as_deref(), source_info, auto_cleanup)?;
                extract_zip(&archive_path, &temp)?;
                let entries = top_level_entries(&temp.path)?;
                Ok((temp, entries))
            }),
        )
        .await
        .map_err(|_| self.stage_timeout_error(&package, "extraction"))?
        .map_err(|e| VerifyError::Task {
            package: package.clone(),
            message: e.to_string(),
        })?;

        // The downloaded archive is no longer needed once unpacked.
        drop(artifact);

        let (temp, entries) = extracted.map_err(|source| VerifyError::Extraction {
            package: package.clone(),
            source,
        })?;
        stats.extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
        debug!(
            duration_ms = stats.extraction_duration_ms,
            archive = %temp.source_info.archive_url,
            archive_bytes = temp.source_info.size_bytes,
            path = %temp.path.display(),
            "Extraction completed"
        );

        // A GitHub archive unpacks to a single `<repo>-<tag>/` directory.
        if entries.len() != 1 {
            warnings.warn(format!(
                "Failed to extract zip file for '{package}'; expected 1 sub-directory but found these: {entries:?}"
            ));
            return Ok(VerifyOutcome::Abstained(Abstention::AmbiguousArchive { entries }));
        }

        // ====================================================================
        // Stage 3: Snapshot of the upstream copy
        // ====================================================================
        //
        // `temp` moves into the blocking task and is dropped there, which
        // removes the directory whether or not the snapshot succeeds.

        let analysis_start = Instant::now();
        let builder = self.builder.clone();
        let location = local.location.clone();
        let package_dir = temp.path.join(&entries[0]);

        let (upstream, upstream_warnings) = timeout(
            self.stage_timeout,
            tokio::task::spawn_blocking(move || {
                let mut task_warnings = Warnings::new();
                let snapshot = builder.build_at(&package_dir, &location, &mut task_warnings);
                drop(temp);
                (snapshot, task_warnings)
            }),
        )
        .await
        .map_err(|_| self.stage_timeout_error(&package, "analysis"))?
        .map_err(|e| VerifyError::Task {
            package: package.clone(),
            message: e.to_string(),
        })?;
        warnings.merge(upstream_warnings);

        let Some(upstream) = upstream else {
            warnings.warn(format!(
                "Could not read the upstream copy of '{package}'. Skipping comparison to GitHub project."
            ));
            return Ok(VerifyOutcome::Abstained(Abstention::UnreadableUpstream));
        };
        stats.analysis_duration_ms = analysis_start.elapsed().as_millis() as u64;
        stats.files_processed = upstream.file_records().len();

        // ====================================================================
        // Stage 4: Diff
        // ====================================================================

        let discrepancies = diff::compare(local, &upstream, &self.policy);
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        if discrepancies.is_empty() {
            info!("No discrepancies found compared to GitHub copy of {}", package);
        } else {
            info!(
                "Encountered {} discrepancies comparing {} to copy downloaded from GitHub",
                discrepancies.len(),
                package
            );
        }

        Ok(VerifyOutcome::Verified(VerifyReport {
            discrepancies,
            stats,
        }))
    }

    /// Downloads the first archive candidate that exists.
    ///
    /// Returns `Ok(None)` when every candidate is a 404.
    async fn fetch_archive(
        &self,
        local: &PackageSnapshot,
        version: &str,
        package: &str,
    ) -> Result<Option<TempArtifact>, VerifyError> {
        let urls = candidates(&local.source_link, version).map_err(|source| {
            VerifyError::Candidate {
                package: package.to_string(),
                source,
            }
        })?;

        for url in &urls {
            debug!(url = %url, "Trying to download source archive");
            match self.fetcher.fetch_to_temp(url).await {
                Ok(artifact) => {
                    info!(url = %url, bytes = artifact.size_bytes(), "Downloaded source archive");
                    return Ok(Some(artifact));
                }
                Err(e) if e.is_not_found() => {
                    debug!(url = %url, "No archive at candidate URL");
                }
                Err(source) => {
                    return Err(VerifyError::Fetch {
                        package: package.to_string(),
                        source,
                    })
                }
            }
        }

        Ok(None)
    }

    fn stage_timeout_error(&self, package: &str, stage: &str) -> VerifyError {
        VerifyError::StageTimeout {
            package: package.to_string(),
            stage: stage.to_string(),
            timeout_secs: self.stage_timeout.as_secs(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
