use crate::fetch::Fetcher;
use crate::model::PackageSnapshot;
use crate::verify::{UpstreamVerifier, VerifyError, VerifyOutcome};
use crate::warnings::Warnings;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, instrument};

/// Upstream verification result for one node of the tree.
#[derive(Debug)]
pub struct PackageVerification {
    pub location: String,
    pub package: String,
    pub result: Result<VerifyOutcome, VerifyError>,
    pub warnings: Warnings,
}

/// Runs upstream verification for every package in a tree, a bounded
/// number at a time.
pub struct VerificationExecutor {
    semaphore: Arc<Semaphore>,
}

impl VerificationExecutor {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }

    /// Verifies every node of `root` that has a source link.
    ///
    /// Results come back in pre-order tree order whatever order the
    /// verifications finish in. A failure in one package does not cancel
    /// the others.
    #[instrument(skip_all, fields(root = %root.name_or_location()))]
    pub async fn verify_tree<F>(
        &self,
        verifier: Arc<UpstreamVerifier<F>>,
        root: &PackageSnapshot,
    ) -> Vec<PackageVerification>
    where
        F: Fetcher + 'static,
    {
        let targets: Vec<&PackageSnapshot> = root.iter().filter(|n| n.has_source_link()).collect();
        info!("Verifying {} package(s) against upstream sources", targets.len());

        let handles: Vec<_> = targets
            .iter()
            .map(|node| {
                let node = (*node).clone();
                let verifier = Arc::clone(&verifier);
                let semaphore = Arc::clone(&self.semaphore);

                tokio::spawn(async move {
                    let mut warnings = Warnings::new();
                    let package = node.name_or_location().to_string();
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => verifier.verify(&node, &mut warnings).await,
                        Err(e) => Err(VerifyError::Task {
                            package: package.clone(),
                            message: format!("Semaphore error: {e}"),
                        }),
                    };

                    PackageVerification {
                        location: node.location,
                        package,
                        result,
                        warnings,
                    }
                })
            })
            .collect();

        futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(targets)
            .map(|(joined, node)| {
                joined.unwrap_or_else(|e| PackageVerification {
                    location: node.location.clone(),
                    package: node.name_or_location().to_string(),
                    result: Err(VerifyError::Task {
                        package: node.name_or_location().to_string(),
                        message: e.to_string(),
                    }),
                    warnings: Warnings::new(),
                })
            })
            .collect()
    }
}

/// Folds per-package results into `warnings`, in order.
///
/// Discrepancies and fatal errors are both recorded as warnings. Returns
/// the number of packages whose verification failed fatally.
pub fn record_results(results: Vec<PackageVerification>, warnings: &mut Warnings) -> usize {
    let mut fatal = 0;
    for verification in results {
        warnings.merge(verification.warnings);
        match verification.result {
            Ok(outcome) => warnings.record_discrepancies(outcome.discrepancies()),
            Err(e) => {
                fatal += 1;
                warnings.warn(e.to_string());
            }
        }
    }
    fatal
}
