//! Error types for change tracking and export

use reposnap_core::{ArchiveError, PersistError};
use std::path::PathBuf;

/// Fingerprint store could not be written
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Atomic write failed
    #[error("failed to save fingerprint store: {0}")]
    Save(#[from] PersistError),
}

/// Repository name that must never reach the archiver
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsafeName {
    /// Shell metacharacter or path separator
    #[error("{field} of '{repository}' contains forbidden character '{character}'")]
    ForbiddenCharacter {
        repository: String,
        field: &'static str,
        character: char,
    },

    /// Owner or name missing
    #[error("{field} of '{repository}' is empty")]
    Empty {
        repository: String,
        field: &'static str,
    },

    /// `.` or `..`
    #[error("{field} of '{repository}' is a relative path component '{value}'")]
    RelativeComponent {
        repository: String,
        field: &'static str,
        value: String,
    },
}

/// Batch export errors. Any of these means the cycle must not rotate.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Nothing to export
    #[error("no repositories to export")]
    EmptyInput,

    /// Every attempt for one repository failed
    #[error("export of {repository} failed after {attempts} attempts: {source}")]
    Exhausted {
        repository: String,
        attempts: u32,
        #[source]
        source: ArchiveError,
    },

    /// Leftovers of a previous attempt could not be removed
    #[error("failed to remove stale artifact {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Shutdown requested mid-batch
    #[error("export cancelled by shutdown")]
    Cancelled,
}

impl ExportError {
    /// Check if the batch stopped because of shutdown
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
