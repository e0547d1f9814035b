//! Repository discovery
//!
//! Collects every repository the credential can reach (direct and through
//! organizations), deduplicated by full name, and drops repositories with no
//! files since they cannot be bundled.

use crate::api::RepositoryApi;
use crate::error::ApiError;
use crate::types::RepositoryDescriptor;
use std::collections::BTreeMap;

/// Discover all non-empty accessible repositories, ordered by full name
///
/// # Errors
/// The first `ApiError` from any listing or contents check; a partial listing
/// is never returned.
pub async fn discover_repositories(
    api: &dyn RepositoryApi,
) -> Result<Vec<RepositoryDescriptor>, ApiError> {
    let mut found: BTreeMap<String, RepositoryDescriptor> = BTreeMap::new();

    for repo in api.list_repositories().await? {
        found.entry(repo.full_name.clone()).or_insert(repo);
    }

    let organizations = api.list_organizations().await?;
    tracing::debug!(count = organizations.len(), "listing organization repositories");
    for organization in &organizations {
        for repo in api.list_organization_repositories(organization).await? {
            found.entry(repo.full_name.clone()).or_insert(repo);
        }
    }

    let mut repositories = Vec::with_capacity(found.len());
    for repo in found.into_values() {
        if api.has_contents(&repo).await? {
            repositories.push(repo);
        } else {
            tracing::debug!(repository = %repo, "skipping empty repository");
        }
    }

    Ok(repositories)
}
