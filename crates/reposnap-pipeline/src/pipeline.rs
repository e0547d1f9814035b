//! Export pipeline
//!
//! Drives the archiver over a batch of repositories into a staging
//! directory. Each repository gets a bounded number of attempts with a fixed
//! delay between them; exhausting them fails the whole batch, since a
//! partial snapshot must never be rotated in.

use crate::error::{ExportError, UnsafeName};
use crate::guard::validate_descriptor;
use futures::{StreamExt, TryStreamExt};
use reposnap_core::{Archiver, RepositoryDescriptor, RetryPolicy, ShutdownSignal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of a successful batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    /// Exported repositories and their archive paths
    pub exported: Vec<(RepositoryDescriptor, PathBuf)>,
    /// Repositories refused by the name guard
    pub rejected: Vec<(RepositoryDescriptor, UnsafeName)>,
    /// Archiver invocations across the batch
    pub attempts: u32,
}

/// Retry-bounded batch exporter
pub struct ExportPipeline {
    archiver: Arc<dyn Archiver>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl ExportPipeline {
    /// Sequential pipeline
    #[must_use]
    pub fn new(archiver: Arc<dyn Archiver>, retry: RetryPolicy) -> Self {
        Self {
            archiver,
            retry,
            concurrency: 1,
        }
    }

    /// Run up to `concurrency` exports at once (at least one)
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Export every repository into `dest_root`.
    ///
    /// Unsafe names are reported in `ExportReport::rejected` and skipped.
    ///
    /// # Errors
    /// - `EmptyInput` for an empty batch, before touching the filesystem
    /// - `Exhausted` as soon as one repository runs out of attempts; other
    ///   in-flight exports are dropped (and their processes killed)
    /// - `Cleanup` if a previous attempt's leftovers cannot be removed
    /// - `Cancelled` when `shutdown` fires first
    pub async fn export_all(
        &self,
        repos: &[RepositoryDescriptor],
        dest_root: &Path,
        shutdown: &ShutdownSignal,
    ) -> Result<ExportReport, ExportError> {
        if repos.is_empty() {
            return Err(ExportError::EmptyInput);
        }

        let mut report = ExportReport::default();
        let mut accepted = Vec::with_capacity(repos.len());
        for repo in repos {
            match validate_descriptor(repo) {
                Ok(()) => accepted.push(repo),
                Err(reason) => {
                    tracing::error!(repository = %repo, %reason, "refusing unsafe repository name");
                    metrics::counter!("reposnap_rejected_repositories_total").increment(1);
                    report.rejected.push((repo.clone(), reason));
                }
            }
        }

        tracing::info!(
            repositories = accepted.len(),
            rejected = report.rejected.len(),
            concurrency = self.concurrency,
            "exporting"
        );

        let batch = futures::stream::iter(accepted)
            .map(|repo| self.export_one(repo, dest_root))
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<_>>();

        let results = tokio::select! {
            biased;
            () = shutdown.triggered() => {
                tracing::warn!("shutdown requested, abandoning export batch");
                return Err(ExportError::Cancelled);
            }
            results = batch => results?,
        };

        for (repo, path, attempts) in results {
            report.attempts += attempts;
            report.exported.push((repo, path));
        }
        report.exported.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(report)
    }

    async fn export_one(
        &self,
        repo: &RepositoryDescriptor,
        dest_root: &Path,
    ) -> Result<(RepositoryDescriptor, PathBuf, u32), ExportError> {
        let total = self.retry.total_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.remove_stale_artifacts(repo, dest_root)?;
            metrics::counter!("reposnap_export_attempts_total").increment(1);

            match self.archiver.export(repo, dest_root).await {
                Ok(path) => {
                    tracing::info!(repository = %repo, attempt, path = %path.display(), "exported");
                    metrics::counter!("reposnap_exported_repositories_total").increment(1);
                    return Ok((repo.clone(), path, attempt));
                }
                Err(error) if attempt < total => {
                    tracing::warn!(
                        repository = %repo,
                        attempt,
                        of = total,
                        %error,
                        delay_secs = self.retry.delay.as_secs(),
                        "export failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(source) => {
                    tracing::error!(repository = %repo, attempts = attempt, error = %source, "export attempts exhausted");
                    return Err(ExportError::Exhausted {
                        repository: repo.full_name.clone(),
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }

    fn remove_stale_artifacts(&self, repo: &RepositoryDescriptor, dest_root: &Path) -> Result<(), ExportError> {
        for path in self.archiver.artifact_paths(repo, dest_root) {
            let result = match std::fs::symlink_metadata(&path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => Err(e),
                Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&path),
                Ok(_) => std::fs::remove_file(&path),
            };
            result.map_err(|source| ExportError::Cleanup {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(repository = %repo, path = %path.display(), "removed stale artifact");
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("retry", &self.retry)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}
