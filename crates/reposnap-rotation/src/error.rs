//! Error types for the rotation engine

use reposnap_core::PersistError;
use std::path::PathBuf;

/// Errors while shifting, installing, merging or evicting generations.
///
/// Any of these can leave the backup root mid-rotation; the journal records
/// how far it got so `RotationEngine::recover` can finish the job.
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    /// Filesystem operation failed
    #[error("{operation} failed at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rename of a generation or repository entry failed
    #[error("failed to move {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Staging directory missing
    #[error("staging directory {0} does not exist")]
    MissingStaging(PathBuf),

    /// Rotation journal could not be read or written
    #[error("rotation journal error: {0}")]
    Journal(#[from] PersistError),
}

impl RotationError {
    /// Create IO error for an operation on path
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Create rename error
    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Rename {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}
