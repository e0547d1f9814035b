//! Error types shared across the workspace
//!
//! Provides error handling for:
//! - Startup configuration
//! - Remote API access
//! - Single-repository archiving
//! - Atomic JSON persistence

use std::path::PathBuf;

/// Invalid `owner/name` string
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Not of the form `owner/name`
    #[error("invalid repository name '{0}': expected owner/name")]
    InvalidFullName(String),
}

/// Startup configuration errors (fatal: the daemon never enters its loop)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required variable absent or empty
    #[error("missing required setting {var}")]
    Missing { var: &'static str },

    /// Variable present but unusable
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// Directory could not be created or written
    #[error("directory {path} is not writable: {source}")]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Create invalid-value error
    pub fn invalid(var: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Remote repository API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request never produced a response
    #[error("{operation} failed: {message}")]
    Transport { operation: String, message: String },

    /// Non-success HTTP status
    #[error("{operation} returned HTTP {status}: {message}")]
    Status {
        operation: String,
        status: u16,
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("{operation} returned a malformed response: {message}")]
    Decode { operation: String, message: String },
}

impl ApiError {
    /// Check if the remote reported the resource as missing
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Errors from producing one repository archive
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// External command could not be started
    #[error("failed to spawn {command} for {repository}: {source}")]
    Spawn {
        repository: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// External command exited unsuccessfully
    #[error("{command} failed for {repository} ({status}): {output}")]
    CommandFailed {
        repository: String,
        command: String,
        status: String,
        output: String,
    },

    /// Filesystem error around the archive
    #[error("io error at {path} while exporting {repository}: {source}")]
    Io {
        repository: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    /// Create IO error for path
    pub fn io(repository: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            repository: repository.into(),
            path: path.into(),
            source,
        }
    }
}

/// Errors reading or atomically writing JSON state files
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// IO error on the target or its temp file
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Value could not be encoded
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// File exists but does not parse
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
