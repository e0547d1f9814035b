//! Collaborator interfaces
//!
//! The remote hosting API and the archiver are external systems. The rest of
//! the workspace only sees them through these traits, so the change tracker,
//! export pipeline and rotation engine never depend on HTTP or on the `git`
//! binary directly.

use crate::error::{ApiError, ArchiveError};
use crate::types::RepositoryDescriptor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Remote repository hosting API
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait RepositoryApi: Send + Sync {
    /// Logins of every organization the credential can access
    async fn list_organizations(&self) -> Result<Vec<String>, ApiError>;

    /// Repositories the credential can access directly
    async fn list_repositories(&self) -> Result<Vec<RepositoryDescriptor>, ApiError>;

    /// Repositories of one organization
    async fn list_organization_repositories(
        &self,
        organization: &str,
    ) -> Result<Vec<RepositoryDescriptor>, ApiError>;

    /// Whether the repository has any files at its root.
    ///
    /// A not-found response means "empty" and yields `Ok(false)`.
    async fn has_contents(&self, repo: &RepositoryDescriptor) -> Result<bool, ApiError>;

    /// Recent activity records, newest first, each as an opaque string
    async fn recent_events(&self, repo: &RepositoryDescriptor) -> Result<Vec<String>, ApiError>;
}

/// Produces one self-contained archive per repository
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Export `repo` under `dest_root/<owner>/`, returning the archive path
    async fn export(
        &self,
        repo: &RepositoryDescriptor,
        dest_root: &Path,
    ) -> Result<PathBuf, ArchiveError>;

    /// Every path an attempt for `repo` may leave behind (complete or partial).
    ///
    /// The pipeline removes these before each attempt.
    fn artifact_paths(&self, repo: &RepositoryDescriptor, dest_root: &Path) -> Vec<PathBuf>;
}
