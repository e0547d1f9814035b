//! Change tracker
//!
//! Decides which repositories changed since the last completed cycle by
//! comparing activity fingerprints with the persisted store.

use crate::error::StoreError;
use crate::store::FingerprintStore;
use reposnap_core::{ApiError, Fingerprint, RepositoryApi, RepositoryDescriptor};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Fingerprint-based change detection
pub struct ChangeTracker {
    api: Arc<dyn RepositoryApi>,
    store: FingerprintStore,
}

impl ChangeTracker {
    /// Create tracker over a loaded store
    #[must_use]
    pub fn new(api: Arc<dyn RepositoryApi>, store: FingerprintStore) -> Self {
        Self { api, store }
    }

    /// Current in-memory fingerprints
    #[inline]
    #[must_use]
    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    /// SHA-256 over the repository's recent activity records
    ///
    /// # Errors
    /// `ApiError` if the event feed cannot be fetched
    pub async fn fingerprint_of(&self, repo: &RepositoryDescriptor) -> Result<Fingerprint, ApiError> {
        let records = self.api.recent_events(repo).await?;
        Ok(Fingerprint::from_records(&records))
    }

    /// Repositories whose fingerprint is new or differs from the stored one,
    /// in input order.
    ///
    /// Every repository's fingerprint is recorded in memory, changed or not.
    /// Nothing is recorded unless all fingerprints were obtained.
    ///
    /// # Errors
    /// The first `ApiError`; the store is left untouched
    pub async fn filter_changed(
        &mut self,
        repos: &[RepositoryDescriptor],
    ) -> Result<Vec<RepositoryDescriptor>, ApiError> {
        let mut fingerprints = Vec::with_capacity(repos.len());
        for repo in repos {
            fingerprints.push(self.fingerprint_of(repo).await?);
        }

        let mut changed = Vec::new();
        for (repo, fingerprint) in repos.iter().zip(fingerprints) {
            let previous = self.store.insert(repo.full_name.clone(), fingerprint.clone());
            if previous.as_ref() == Some(&fingerprint) {
                tracing::debug!(repository = %repo, "unchanged");
            } else {
                tracing::debug!(repository = %repo, new = previous.is_none(), "changed");
                changed.push(repo.clone());
            }
        }

        tracing::info!(checked = repos.len(), changed = changed.len(), "change detection done");
        Ok(changed)
    }

    /// Drop the stored fingerprint of `repo` so it counts as changed next time
    pub fn forget(&mut self, repo: &RepositoryDescriptor) {
        self.store.remove(&repo.full_name);
    }

    /// Drop fingerprints of repositories not in `seen`
    pub fn retain_only(&mut self, seen: &[RepositoryDescriptor]) {
        let seen: BTreeSet<&str> = seen.iter().map(|repo| repo.full_name.as_str()).collect();
        let before = self.store.len();
        self.store.retain(|key| seen.contains(key));
        let dropped = before - self.store.len();
        if dropped > 0 {
            tracing::info!(dropped, "forgot repositories that are no longer reachable");
        }
    }

    /// Write the in-memory fingerprints
    ///
    /// # Errors
    /// `StoreError` if the atomic write fails
    pub fn persist(&self) -> Result<(), StoreError> {
        self.store.save()
    }
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use reposnap_core::MockRepositoryApi;
    use reposnap_test_utils::StaticApi;

    fn repo(full: &str) -> RepositoryDescriptor {
        full.parse().unwrap()
    }

    fn tracker(api: StaticApi, dir: &tempfile::TempDir) -> ChangeTracker {
        let store = FingerprintStore::load(dir.path().join("fingerprints.json"));
        ChangeTracker::new(Arc::new(api), store)
    }

    #[tokio::test]
    async fn unchanged_repositories_are_filtered_on_second_pass() {
        let dir = tempfile::tempdir().unwrap();
        let api = StaticApi::new();
        api.set_events("acme/widgets", &["push", "create"]);
        api.set_events("me/notes", &["push"]);
        let mut tracker = tracker(api, &dir);
        let repos = [repo("acme/widgets"), repo("me/notes")];

        assert_eq!(tracker.filter_changed(&repos).await.unwrap(), repos.to_vec());
        assert!(tracker.filter_changed(&repos).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_activity_marks_repository_changed() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(StaticApi::new());
        api.set_events("acme/widgets", &["push"]);
        let mut tracker = ChangeTracker::new(api.clone(), FingerprintStore::empty(dir.path().join("f.json")));
        let repos = [repo("acme/widgets"), repo("me/notes")];
        tracker.filter_changed(&repos).await.unwrap();

        api.push_event("acme/widgets", "issue_comment");

        assert_eq!(tracker.filter_changed(&repos).await.unwrap(), vec![repo("acme/widgets")]);
    }

    #[tokio::test]
    async fn corrupt_store_treats_everything_as_changed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fingerprints.json"), b"\x00garbage").unwrap();
        let mut tracker = tracker(StaticApi::new(), &dir);
        let repos = [repo("acme/widgets"), repo("me/notes")];

        assert_eq!(tracker.filter_changed(&repos).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn persisted_fingerprints_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(StaticApi::new());
        api.set_events("acme/widgets", &["push"]);
        let path = dir.path().join("fingerprints.json");
        let repos = [repo("acme/widgets")];

        let mut first = ChangeTracker::new(api.clone(), FingerprintStore::load(&path));
        first.filter_changed(&repos).await.unwrap();
        first.persist().unwrap();

        let mut second = ChangeTracker::new(api, FingerprintStore::load(&path));
        assert!(second.filter_changed(&repos).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_failure_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut api = MockRepositoryApi::new();
        api.expect_recent_events().returning(|repo| {
            if repo.name == "broken" {
                Err(ApiError::Status {
                    operation: format!("list events of {repo}"),
                    status: 500,
                    message: "Internal Server Error".to_string(),
                })
            } else {
                Ok(vec!["push".to_string()])
            }
        });
        let mut tracker = ChangeTracker::new(Arc::new(api), FingerprintStore::empty(dir.path().join("f.json")));

        let result = tracker
            .filter_changed(&[repo("acme/widgets"), repo("acme/broken")])
            .await;

        assert!(matches!(result, Err(ApiError::Status { status: 500, .. })));
        assert!(tracker.store().is_empty());
    }

    #[tokio::test]
    async fn forget_and_retain_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = tracker(StaticApi::new(), &dir);
        let repos = [repo("acme/widgets"), repo("acme/gone"), repo("me/notes")];
        tracker.filter_changed(&repos).await.unwrap();

        tracker.forget(&repo("me/notes"));
        tracker.retain_only(&[repo("acme/widgets"), repo("me/notes")]);

        assert!(tracker.store().get("acme/widgets").is_some());
        assert!(tracker.store().get("acme/gone").is_none());
        assert!(tracker.store().get("me/notes").is_none());
        assert_eq!(
            tracker.filter_changed(&[repo("me/notes")]).await.unwrap(),
            vec![repo("me/notes")]
        );
    }

    #[tokio::test]
    async fn fingerprint_matches_event_concatenation() {
        let dir = tempfile::tempdir().unwrap();
        let api = StaticApi::new();
        api.set_events("acme/widgets", &["{\"id\":\"2\"}", "{\"id\":\"1\"}"]);
        let tracker = tracker(api, &dir);

        assert_eq!(
            tracker.fingerprint_of(&repo("acme/widgets")).await.unwrap(),
            Fingerprint::from_records(["{\"id\":\"2\"}{\"id\":\"1\"}"])
        );
    }
}
