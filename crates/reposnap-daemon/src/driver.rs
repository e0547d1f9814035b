//! Cycle driver
//!
//! One cycle: discover → filter changed → export into a fresh staging
//! directory → rotate → persist fingerprints. Fingerprints are only written
//! after the rotation succeeded, so a failed or cancelled cycle leaves every
//! repository eligible again next time.

use crate::error::CycleError;
use reposnap_core::{
    discover_repositories, Archiver, CycleId, RepositoryApi, RepositoryDescriptor, Settings,
    ShutdownSignal,
};
use reposnap_pipeline::{ChangeTracker, ExportPipeline, FingerprintStore};
use reposnap_rotation::{RotationEngine, RotationReport};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Staging directory name prefix under the scratch root
pub const STAGING_PREFIX: &str = "reposnap-staging-";

/// What one cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub id: CycleId,
    /// Non-empty repositories found
    pub discovered: usize,
    /// Repositories whose fingerprint changed
    pub changed: usize,
    /// Repositories exported into staging
    pub exported: usize,
    /// Repositories refused by the name guard
    pub rejected: Vec<RepositoryDescriptor>,
    /// Present when a new generation was installed
    pub rotation: Option<RotationReport>,
}

impl CycleSummary {
    fn new(id: CycleId, discovered: usize) -> Self {
        Self {
            id,
            discovered,
            changed: 0,
            exported: 0,
            rejected: Vec::new(),
            rotation: None,
        }
    }
}

/// Backup control loop
pub struct Driver {
    api: Arc<dyn RepositoryApi>,
    tracker: ChangeTracker,
    pipeline: ExportPipeline,
    rotation: RotationEngine,
    fingerprint_path: PathBuf,
    scratch_root: PathBuf,
    poll_interval: Duration,
    shutdown: ShutdownSignal,
}

impl Driver {
    /// Wire the stages together from settings
    #[must_use]
    pub fn new(
        settings: &Settings,
        api: Arc<dyn RepositoryApi>,
        archiver: Arc<dyn Archiver>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let fingerprint_path = settings.fingerprint_store_path();
        Self {
            tracker: ChangeTracker::new(api.clone(), FingerprintStore::load(&fingerprint_path)),
            api,
            pipeline: ExportPipeline::new(archiver, settings.retry)
                .with_concurrency(settings.export_concurrency),
            rotation: RotationEngine::new(&settings.backup_root, settings.retention_limit),
            fingerprint_path,
            scratch_root: settings.scratch_root.clone(),
            poll_interval: settings.poll_interval,
            shutdown,
        }
    }

    /// Finish a rotation interrupted by a previous crash
    ///
    /// # Errors
    /// `CycleError::Rotation` if the journal is unreadable or a step fails
    pub async fn recover(&self) -> Result<Option<RotationReport>, CycleError> {
        let engine = self.rotation.clone();
        Ok(tokio::task::spawn_blocking(move || engine.recover()).await??)
    }

    /// Run cycles until shutdown, sleeping `poll_interval` between them.
    /// Cycle failures are logged and do not stop the loop.
    pub async fn run(mut self) {
        loop {
            match self.run_cycle().await {
                Ok(summary) => tracing::info!(
                    cycle = %summary.id,
                    discovered = summary.discovered,
                    changed = summary.changed,
                    exported = summary.exported,
                    rotated = summary.rotation.is_some(),
                    "cycle finished"
                ),
                Err(e) if e.is_cancelled() => break,
                Err(error) => {
                    metrics::counter!("reposnap_cycles_failed_total").increment(1);
                    tracing::error!(%error, "cycle failed");
                }
            }

            tokio::select! {
                () = self.shutdown.triggered() => break,
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        tracing::info!("shutting down");
    }

    /// Run one cycle.
    ///
    /// On any error the in-memory fingerprints are reloaded from disk.
    ///
    /// # Errors
    /// `CycleError` for the stage that failed
    pub async fn run_cycle(&mut self) -> Result<CycleSummary, CycleError> {
        let id = CycleId::new();
        let span = tracing::info_span!("cycle", id = %id);
        metrics::counter!("reposnap_cycles_total").increment(1);

        let result = self.cycle(id).instrument(span).await;
        if result.is_err() {
            self.tracker = ChangeTracker::new(self.api.clone(), FingerprintStore::load(&self.fingerprint_path));
        }
        result
    }

    async fn cycle(&mut self, id: CycleId) -> Result<CycleSummary, CycleError> {
        let discovered = cancellable(&self.shutdown, discover_repositories(self.api.as_ref()))
            .await?
            .map_err(CycleError::Discovery)?;
        tracing::info!(count = discovered.len(), "discovered repositories");
        let mut summary = CycleSummary::new(id, discovered.len());

        let changed = cancellable(&self.shutdown, self.tracker.filter_changed(&discovered))
            .await?
            .map_err(CycleError::ChangeDetection)?;
        summary.changed = changed.len();
        self.tracker.retain_only(&discovered);

        if changed.is_empty() {
            tracing::info!("no repository changed, skipping export");
            self.tracker.persist()?;
            return Ok(summary);
        }

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.scratch_root)
            .map_err(|source| CycleError::Staging {
                path: self.scratch_root.clone(),
                source,
            })?;
        tracing::debug!(path = %staging.path().display(), "staging directory created");

        let report = self
            .pipeline
            .export_all(&changed, staging.path(), &self.shutdown)
            .await?;
        for (repo, _) in &report.rejected {
            self.tracker.forget(repo);
        }
        summary.exported = report.exported.len();
        summary.rejected = report.rejected.into_iter().map(|(repo, _)| repo).collect();

        if summary.exported == 0 {
            tracing::warn!("nothing exported, keeping current generations");
            self.tracker.persist()?;
            return Ok(summary);
        }
        if self.shutdown.is_triggered() {
            return Err(CycleError::Cancelled);
        }

        let engine = self.rotation.clone();
        let staging_path = staging.path().to_path_buf();
        let rotation = tokio::task::spawn_blocking(move || engine.rotate(&staging_path)).await??;
        summary.rotation = Some(rotation);

        self.tracker.persist()?;
        Ok(summary)
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("rotation", &self.rotation)
            .field("scratch_root", &self.scratch_root)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

/// Race `work` against shutdown
async fn cancellable<F: Future>(shutdown: &ShutdownSignal, work: F) -> Result<F::Output, CycleError> {
    tokio::select! {
        biased;
        () = shutdown.triggered() => Err(CycleError::Cancelled),
        output = work => Ok(output),
    }
}
