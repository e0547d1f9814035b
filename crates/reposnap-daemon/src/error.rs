//! Cycle-level errors

use reposnap_core::ApiError;
use reposnap_pipeline::{ExportError, StoreError};
use reposnap_rotation::RotationError;
use std::path::PathBuf;

/// Why a backup cycle stopped. None of these end the daemon; the loop logs
/// the error and tries again after the poll interval.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// Listing repositories failed
    #[error("repository discovery failed: {0}")]
    Discovery(#[source] ApiError),

    /// Fetching activity fingerprints failed
    #[error("change detection failed: {0}")]
    ChangeDetection(#[source] ApiError),

    /// Staging directory could not be created
    #[error("failed to create staging directory under {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Blocking rotation task panicked or was aborted
    #[error("rotation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Shutdown requested
    #[error("cycle cancelled by shutdown")]
    Cancelled,
}

impl CycleError {
    /// Check if the cycle stopped because of shutdown
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Export(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
