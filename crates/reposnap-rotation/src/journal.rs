//! Rotation journal
//!
//! A small JSON file under the backup root that exists only while a
//! rotation is in flight. It records the shift plan and the phase reached,
//! which is enough to finish an interrupted rotation idempotently.

use chrono::{DateTime, Utc};
use reposnap_core::persist::{read_json, remove_if_exists, write_json_atomic};
use reposnap_core::PersistError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Journal file name under the backup root
pub const JOURNAL_FILE_NAME: &str = ".rotation-journal.json";

/// Rotation phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Renaming `T-n` to `T-(n+1)`, highest first
    Shifting,
    /// Copying staging into `T-0`
    Installing,
    /// Moving entries missing from newer generations
    Merging,
    /// Deleting generations above the limit
    Evicting,
}

/// Persisted state of an in-flight rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationJournal {
    /// Limit the rotation was started with
    pub retention_limit: u32,
    /// Generations present before the shift, descending
    pub plan: Vec<u32>,
    /// Last phase entered
    pub phase: Phase,
    /// When the rotation started
    pub started_at: DateTime<Utc>,
}

impl RotationJournal {
    /// Start a journal in the `Shifting` phase
    #[must_use]
    pub fn begin(retention_limit: u32, plan: Vec<u32>) -> Self {
        Self {
            retention_limit,
            plan,
            phase: Phase::Shifting,
            started_at: Utc::now(),
        }
    }

    /// Journal location for a backup root
    #[inline]
    #[must_use]
    pub fn path(backup_root: &Path) -> PathBuf {
        backup_root.join(JOURNAL_FILE_NAME)
    }

    /// Load the journal, if a rotation was interrupted
    ///
    /// # Errors
    /// `PersistError` if the file exists but cannot be read or decoded
    pub fn load(backup_root: &Path) -> Result<Option<Self>, PersistError> {
        read_json(&Self::path(backup_root))
    }

    /// Persist the journal atomically
    ///
    /// # Errors
    /// `PersistError` if the write fails
    pub fn save(&self, backup_root: &Path) -> Result<(), PersistError> {
        write_json_atomic(&Self::path(backup_root), self)
    }

    /// Enter `phase` and persist
    ///
    /// # Errors
    /// `PersistError` if the write fails
    pub fn advance(&mut self, phase: Phase, backup_root: &Path) -> Result<(), PersistError> {
        self.phase = phase;
        self.save(backup_root)
    }

    /// Remove the journal once rotation completed
    ///
    /// # Errors
    /// `PersistError` if the file exists and cannot be removed
    pub fn clear(backup_root: &Path) -> Result<(), PersistError> {
        remove_if_exists(&Self::path(backup_root))
    }
}
