//! npm-verify: snapshot an installed npm dependency tree and check it
//! against an earlier run and against upstream GitHub releases.

use anyhow::{bail, Context, Result};
use clap::Parser;
use npm_verify::{
    fetch::HttpFetcher,
    snapshot::{JsonCodec, SnapshotBuilder},
    verify::{compare_to_baseline, UpstreamVerifier},
    record_results, ComparisonPolicy, ScanOptions, SnapshotCodec, VerificationExecutor,
    VerifyConfig, Warnings,
};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "npm-verify")]
#[command(version, about = "Snapshot an npm dependency tree and verify it", long_about = None)]
#[command(after_help = "EXIT CODES:
    0  No warnings produced
    1  Warnings produced (discrepancies or skipped checks)
    2  Error occurred (including packages that could not be verified)")]
struct Cli {
    /// Directory of the installed npm project to inspect
    target_dir: PathBuf,

    /// Snapshot from an earlier run to compare against
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where to write the snapshot of this run
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Record a digest for every matching file (default)
    #[arg(long, overrides_with = "exclude_file_hash")]
    include_file_hash: bool,

    /// Do not collect file digests
    #[arg(long, overrides_with = "include_file_hash")]
    exclude_file_hash: bool,

    /// Comma-separated file suffixes to digest
    #[arg(long, value_delimiter = ',', default_value = ".js,.json")]
    hashed_extensions: Vec<String>,

    /// Report version changes (default)
    #[arg(long, overrides_with = "no_report_version_mismatch")]
    report_version_mismatch: bool,
    /// Do not report version changes
    #[arg(long, overrides_with = "report_version_mismatch")]
    no_report_version_mismatch: bool,

    /// Report changed file digests (default)
    #[arg(long, overrides_with = "no_report_hash_mismatch")]
    report_hash_mismatch: bool,
    /// Do not report changed file digests
    #[arg(long, overrides_with = "report_hash_mismatch")]
    no_report_hash_mismatch: bool,

    /// Report vanished files (default)
    #[arg(long, overrides_with = "no_report_missing_file")]
    report_missing_file: bool,
    /// Do not report vanished files
    #[arg(long, overrides_with = "report_missing_file")]
    no_report_missing_file: bool,

    /// Report changed source links (default)
    #[arg(long, overrides_with = "no_report_github_changed")]
    report_github_changed: bool,
    /// Do not report changed source links
    #[arg(long, overrides_with = "report_github_changed")]
    no_report_github_changed: bool,

    /// Compare dependencies of packages (default)
    #[arg(long, overrides_with = "no_report_submodules")]
    report_submodules: bool,
    /// Do not compare dependencies of packages
    #[arg(long, overrides_with = "report_submodules")]
    no_report_submodules: bool,

    /// Skip the comparison against upstream GitHub releases
    #[arg(long)]
    skip_upstream: bool,

    /// Maximum number of packages verified against upstream at once
    #[arg(long, default_value_t = VerifyConfig::default().concurrency)]
    concurrency: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Resolves a `--flag` / `--no-flag` pair; the flag is on unless the
/// negative form was given last.
fn enabled(positive: bool, negative: bool) -> bool {
    positive || !negative
}

impl Cli {
    fn hashes_files(&self) -> bool {
        enabled(self.include_file_hash, self.exclude_file_hash)
    }

    fn scan_options(&self) -> ScanOptions {
        if !self.hashes_files() {
            ScanOptions::without_files()
        } else {
            ScanOptions::default().with_extensions(self.hashed_extensions.iter().cloned())
        }
    }

    fn policy(&self) -> ComparisonPolicy {
        ComparisonPolicy {
            version: enabled(self.report_version_mismatch, self.no_report_version_mismatch),
            file_hash: enabled(self.report_hash_mismatch, self.no_report_hash_mismatch),
            file_missing: enabled(self.report_missing_file, self.no_report_missing_file),
            source_link: enabled(self.report_github_changed, self.no_report_github_changed),
            submodules: enabled(self.report_submodules, self.no_report_submodules),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.target_dir.is_dir() {
            bail!("'{}' is not a directory", self.target_dir.display());
        }
        fs::read_dir(&self.target_dir)
            .with_context(|| format!("'{}' is not readable", self.target_dir.display()))?;

        if self.hashes_files() && self.hashed_extensions.iter().any(|ext| ext.is_empty()) {
            bail!("--hashed-extensions must not contain empty entries");
        }
        if self.concurrency == 0 {
            bail!("--concurrency must be at least 1");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli).await {
        Ok(summary) if summary.warnings.is_empty() => {
            println!("No changes detected between npm installations.");
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            println!(
                "ATTENTION: Execution produced {} warning(s).",
                summary.warnings.count()
            );
            if summary.unverified > 0 {
                error!("{} package(s) could not be verified", summary.unverified);
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

struct RunSummary {
    warnings: Warnings,

    /// Packages whose upstream verification failed fatally
    unverified: usize,
}

async fn run(cli: Cli) -> Result<RunSummary> {
    cli.validate()?;

    let mut warnings = Warnings::new();
    let mut unverified = 0;
    let builder = SnapshotBuilder::npm(cli.scan_options());
    let policy = cli.policy();
    let codec = JsonCodec::pretty();

    // ========================================================================
    // Local snapshot
    // ========================================================================

    let target = cli.target_dir.clone();
    let local_builder = builder.clone();
    let (snapshot, build_warnings) = tokio::task::spawn_blocking(move || {
        let mut task_warnings = Warnings::new();
        let snapshot = local_builder.build(&target, &mut task_warnings);
        (snapshot, task_warnings)
    })
    .await
    .context("Snapshot task failed")?;
    warnings.merge(build_warnings);

    let Some(snapshot) = snapshot else {
        bail!(
            "No readable package.json in '{}'",
            cli.target_dir.display()
        );
    };
    info!(
        "Captured {} package(s) under '{}'",
        snapshot.iter().count(),
        cli.target_dir.display()
    );

    if let Some(output) = &cli.output {
        let text = codec.encode(&snapshot)?;
        fs::write(output, text)
            .with_context(|| format!("Failed to write snapshot to '{}'", output.display()))?;
        info!("Wrote snapshot to '{}'", output.display());
    }

    // ========================================================================
    // Upstream verification
    // ========================================================================

    if !cli.skip_upstream {
        let config = VerifyConfig {
            concurrency: cli.concurrency,
            ..VerifyConfig::default()
        };
        let verifier = Arc::new(
            UpstreamVerifier::new(HttpFetcher::with_defaults()?, builder, policy)
                .with_timeout(config.stage_timeout),
        );

        let results = VerificationExecutor::new(config.concurrency)
            .verify_tree(verifier, &snapshot)
            .await;
        unverified = record_results(results, &mut warnings);
    }

    // ========================================================================
    // Baseline comparison
    // ========================================================================

    if let Some(input) = &cli.input {
        match fs::read_to_string(input) {
            Ok(baseline) => {
                if let Some(discrepancies) =
                    compare_to_baseline(&codec, &baseline, &snapshot, &policy, &mut warnings)
                {
                    warnings.record_discrepancies(&discrepancies);
                }
            }
            Err(e) => warnings.warn(format!(
                "Could not read input file '{}' ({e}). Will not compare to current output for discrepancies.",
                input.display()
            )),
        }
    }

    Ok(RunSummary {
        warnings,
        unverified,
    })
}
