//! Rotation engine
//!
//! Folds a freshly exported staging directory into the generation history:
//!
//! 1. **Shift** every existing `T-n` to `T-(n+1)`, highest first, so no
//!    generation is overwritten before it moved itself.
//! 2. **Install** the staging contents as `T-0` (copy, then delete source).
//! 3. **Merge** from the oldest pair down: a repository entry missing from
//!    the next newer existing generation is moved into it. Entries present in
//!    both stay put as the older generation's historical version. The newest
//!    version of every repository therefore ends up in `T-0`.
//! 4. **Prune** owner directories the merge emptied.
//! 5. **Evict** every generation above the retention limit.
//!
//! Each phase is recorded in the rotation journal before it starts. A crash
//! leaves the journal behind and `RotationEngine::recover` finishes the
//! rotation; every phase is safe to re-run.

use crate::error::RotationError;
use crate::fsops::{entry_exists, move_dir_contents, remove_dir_if_empty, sorted_entries};
use crate::journal::{Phase, RotationJournal};
use crate::layout::{generation_dir, list_generations};
use std::fs;
use std::path::{Path, PathBuf};

/// What a rotation (or recovery) did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    /// Generations shifted, by their pre-shift index (descending)
    pub shifted: Vec<u32>,
    /// Non-directory entries installed into `T-0`
    pub installed: u64,
    /// Repository entries moved into a newer generation
    pub merged: usize,
    /// Owner directories removed after merging
    pub pruned: usize,
    /// Generations deleted for exceeding the limit
    pub evicted: Vec<u32>,
    /// Whether this report comes from resuming an interrupted rotation
    pub resumed: bool,
}

/// Rotation engine bound to one backup root
#[derive(Debug, Clone)]
pub struct RotationEngine {
    backup_root: PathBuf,
    retention_limit: u32,
}

impl RotationEngine {
    /// Create engine
    #[inline]
    #[must_use]
    pub fn new(backup_root: impl Into<PathBuf>, retention_limit: u32) -> Self {
        Self {
            backup_root: backup_root.into(),
            retention_limit,
        }
    }

    /// Backup root
    #[inline]
    #[must_use]
    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Highest generation index kept
    #[inline]
    #[must_use]
    pub fn retention_limit(&self) -> u32 {
        self.retention_limit
    }

    /// Rotate `staging` into the history
    ///
    /// An interrupted rotation found on disk is finished first.
    ///
    /// # Errors
    /// `RotationError` for the first failing step. The backup root may be
    /// left mid-rotation; the journal stays behind for `recover`.
    pub fn rotate(&self, staging: &Path) -> Result<RotationReport, RotationError> {
        if !staging.is_dir() {
            return Err(RotationError::MissingStaging(staging.to_path_buf()));
        }
        if self.recover()?.is_some() {
            tracing::warn!("finished an interrupted rotation before rotating");
        }

        let root = self.backup_root.as_path();
        fs::create_dir_all(root).map_err(|e| RotationError::io("create backup root", root, e))?;

        let plan: Vec<u32> = list_generations(root)?.into_iter().rev().collect();
        let mut journal = RotationJournal::begin(self.retention_limit, plan);
        journal.save(root)?;
        tracing::info!(plan = ?journal.plan, limit = self.retention_limit, "rotation started");

        let mut report = RotationReport {
            shifted: shift(root, &journal.plan)?,
            ..RotationReport::default()
        };

        journal.advance(Phase::Installing, root)?;
        report.installed = self.install(staging)?;

        journal.advance(Phase::Merging, root)?;
        (report.merged, report.pruned) = merge(root)?;

        journal.advance(Phase::Evicting, root)?;
        report.evicted = evict(root, self.retention_limit)?;

        RotationJournal::clear(root)?;
        tracing::info!(
            shifted = report.shifted.len(),
            installed = report.installed,
            merged = report.merged,
            evicted = ?report.evicted,
            "rotation complete"
        );
        Ok(report)
    }

    /// Finish a rotation interrupted by a crash. See [`recover`].
    ///
    /// # Errors
    /// `RotationError` if the journal is unreadable or a step fails
    pub fn recover(&self) -> Result<Option<RotationReport>, RotationError> {
        recover(&self.backup_root)
    }

    fn install(&self, staging: &Path) -> Result<u64, RotationError> {
        let newest = generation_dir(&self.backup_root, 0);
        fs::create_dir(&newest).map_err(|e| RotationError::io("create generation", &newest, e))?;
        let installed = move_dir_contents(staging, &newest)?;
        tracing::debug!(entries = installed, "installed new generation");
        Ok(installed)
    }
}

/// Rotate `staging` into `backup_root`, keeping generations `0..=retention_limit`
///
/// # Errors
/// See [`RotationEngine::rotate`]
pub fn rotate(
    staging: &Path,
    backup_root: &Path,
    retention_limit: u32,
) -> Result<RotationReport, RotationError> {
    RotationEngine::new(backup_root, retention_limit).rotate(staging)
}

/// Finish a rotation interrupted by a crash, if the journal says so.
///
/// - `shifting`: completes the shift; this cycle's export is lost
/// - `installing`: discards the partially installed `T-0`
/// - then merge and eviction are re-run with the journal's limit
///
/// Returns `None` when there was nothing to resume.
///
/// # Errors
/// `RotationError` if the journal is unreadable or a step fails
pub fn recover(root: &Path) -> Result<Option<RotationReport>, RotationError> {
    let Some(mut journal) = RotationJournal::load(root)? else {
        return Ok(None);
    };
    tracing::warn!(
        phase = ?journal.phase,
        started_at = %journal.started_at,
        "resuming interrupted rotation"
    );

    let mut report = RotationReport {
        resumed: true,
        ..RotationReport::default()
    };

    if journal.phase == Phase::Shifting {
        report.shifted = shift(root, &journal.plan)?;
    }
    if journal.phase <= Phase::Installing {
        discard_partial_install(root)?;
        journal.advance(Phase::Merging, root)?;
    }
    if journal.phase == Phase::Merging {
        (report.merged, report.pruned) = merge(root)?;
        journal.advance(Phase::Evicting, root)?;
    }
    report.evicted = evict(root, journal.retention_limit)?;

    RotationJournal::clear(root)?;
    tracing::info!(evicted = ?report.evicted, "interrupted rotation finished");
    Ok(Some(report))
}

/// Shift each planned generation up by one, highest first.
///
/// Re-running after a partial shift is safe: a planned generation whose
/// slot is already vacated, or whose target is already occupied by its
/// shifted self, is skipped.
fn shift(backup_root: &Path, plan: &[u32]) -> Result<Vec<u32>, RotationError> {
    debug_assert!(plan.windows(2).all(|w| w[0] > w[1]), "shift plan must be descending");
    let mut shifted = Vec::with_capacity(plan.len());

    for &n in plan {
        let from = generation_dir(backup_root, n);
        let to = generation_dir(backup_root, n + 1);
        if !entry_exists(&from) || entry_exists(&to) {
            tracing::debug!(generation = n, "already shifted");
            continue;
        }
        fs::rename(&from, &to).map_err(|e| RotationError::rename(&from, &to, e))?;
        tracing::debug!(from = n, to = n + 1, "shifted generation");
        shifted.push(n);
    }

    Ok(shifted)
}

/// Merge every adjacent pair of existing generations, oldest pair first.
/// Returns (entries moved, owner directories pruned).
fn merge(backup_root: &Path) -> Result<(usize, usize), RotationError> {
    let generations = list_generations(backup_root)?;
    let mut merged = 0;
    let mut pruned = 0;

    for pair in generations.windows(2).rev() {
        let newer = generation_dir(backup_root, pair[0]);
        let older = generation_dir(backup_root, pair[1]);
        let (moved, removed) = merge_into(&older, &newer)?;
        if moved > 0 {
            tracing::debug!(from = pair[1], to = pair[0], moved, "carried entries forward");
        }
        merged += moved;
        pruned += removed;
    }

    Ok((merged, pruned))
}

/// Move every `<owner>/<entry>` of `older` that `newer` lacks into `newer`,
/// then remove owner directories left empty. Top-level non-directories are
/// not repository content and are left alone.
fn merge_into(older: &Path, newer: &Path) -> Result<(usize, usize), RotationError> {
    let mut moved = 0;
    let mut pruned = 0;

    for owner in sorted_entries(older)? {
        let is_dir = owner
            .file_type()
            .map_err(|e| RotationError::io("stat", owner.path(), e))?
            .is_dir();
        if !is_dir {
            continue;
        }
        let older_owner = owner.path();
        let newer_owner = newer.join(owner.file_name());

        for entry in sorted_entries(&older_owner)? {
            let target = newer_owner.join(entry.file_name());
            if entry_exists(&target) {
                continue;
            }
            fs::create_dir_all(&newer_owner)
                .map_err(|e| RotationError::io("create owner directory", &newer_owner, e))?;
            let source = entry.path();
            fs::rename(&source, &target).map_err(|e| RotationError::rename(&source, &target, e))?;
            moved += 1;
        }

        if remove_dir_if_empty(&older_owner)? {
            pruned += 1;
        }
    }

    Ok((moved, pruned))
}

fn evict(backup_root: &Path, retention_limit: u32) -> Result<Vec<u32>, RotationError> {
    let mut evicted = Vec::new();
    for n in list_generations(backup_root)?.into_iter().rev() {
        if n <= retention_limit {
            break;
        }
        let dir = generation_dir(backup_root, n);
        fs::remove_dir_all(&dir).map_err(|e| RotationError::io("evict generation", &dir, e))?;
        tracing::info!(generation = n, "evicted generation");
        evicted.push(n);
    }
    Ok(evicted)
}

fn discard_partial_install(backup_root: &Path) -> Result<(), RotationError> {
    let newest = generation_dir(backup_root, 0);
    if entry_exists(&newest) {
        tracing::warn!(path = %newest.display(), "discarding partially installed generation");
        fs::remove_dir_all(&newest)
            .map_err(|e| RotationError::io("discard partial generation", &newest, e))?;
    }
    Ok(())
}
