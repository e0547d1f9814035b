//! In-memory collaborators

use async_trait::async_trait;
use reposnap_core::{ApiError, ArchiveError, Archiver, RepositoryApi, RepositoryDescriptor};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Archiver that writes `<owner>/<name>.bundle` text files.
///
/// Failures are scripted per repository; a failing attempt leaves a partial
/// `<owner>/<name>.git/` directory behind, like an interrupted clone.
#[derive(Debug, Default)]
pub struct FakeArchiver {
    failures: Mutex<HashMap<String, u32>>,
    hanging: Mutex<BTreeSet<String>>,
    contents: Mutex<HashMap<String, String>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl FakeArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` exports of `full_name`
    pub fn failing(self, full_name: &str, times: u32) -> Self {
        self.failures.lock().unwrap().insert(full_name.to_string(), times);
        self
    }

    /// Never finish exporting `full_name`
    pub fn hanging(self, full_name: &str) -> Self {
        self.hanging.lock().unwrap().insert(full_name.to_string());
        self
    }

    /// Bundle contents written for `full_name` from now on
    pub fn set_contents(&self, full_name: &str, contents: &str) {
        self.contents
            .lock()
            .unwrap()
            .insert(full_name.to_string(), contents.to_string());
    }

    /// Export attempts made for `full_name`
    pub fn calls(&self, full_name: &str) -> u32 {
        self.calls.lock().unwrap().get(full_name).copied().unwrap_or(0)
    }

    /// Export attempts across all repositories
    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn bundle_path(repo: &RepositoryDescriptor, dest_root: &Path) -> PathBuf {
        dest_root.join(&repo.owner).join(format!("{}.bundle", repo.name))
    }

    pub fn partial_path(repo: &RepositoryDescriptor, dest_root: &Path) -> PathBuf {
        dest_root.join(&repo.owner).join(format!("{}.git", repo.name))
    }
}

#[async_trait]
impl Archiver for FakeArchiver {
    async fn export(
        &self,
        repo: &RepositoryDescriptor,
        dest_root: &Path,
    ) -> Result<PathBuf, ArchiveError> {
        *self.calls.lock().unwrap().entry(repo.full_name.clone()).or_default() += 1;

        let hang = self.hanging.lock().unwrap().contains(&repo.full_name);
        if hang {
            std::future::pending::<()>().await;
        }

        let owner_dir = dest_root.join(&repo.owner);
        std::fs::create_dir_all(&owner_dir)
            .map_err(|e| ArchiveError::io(&repo.full_name, &owner_dir, e))?;

        let should_fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&repo.full_name) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            }
        };
        if should_fail {
            let partial = Self::partial_path(repo, dest_root);
            std::fs::create_dir_all(&partial).unwrap();
            std::fs::write(partial.join("HEAD"), "partial").unwrap();
            return Err(ArchiveError::CommandFailed {
                repository: repo.full_name.clone(),
                command: "git clone --mirror".to_string(),
                status: "exit status: 128".to_string(),
                output: "fatal: scripted failure".to_string(),
            });
        }

        let contents = self
            .contents
            .lock()
            .unwrap()
            .get(&repo.full_name)
            .cloned()
            .unwrap_or_else(|| format!("bundle of {}", repo.full_name));
        let bundle = Self::bundle_path(repo, dest_root);
        std::fs::write(&bundle, contents).map_err(|e| ArchiveError::io(&repo.full_name, &bundle, e))?;
        Ok(bundle)
    }

    fn artifact_paths(&self, repo: &RepositoryDescriptor, dest_root: &Path) -> Vec<PathBuf> {
        vec![
            Self::bundle_path(repo, dest_root),
            Self::partial_path(repo, dest_root),
        ]
    }
}

/// Remote API backed by in-memory listings and event feeds
#[derive(Debug, Default)]
pub struct StaticApi {
    organizations: Vec<String>,
    user_repos: Vec<RepositoryDescriptor>,
    org_repos: HashMap<String, Vec<RepositoryDescriptor>>,
    empty: BTreeSet<String>,
    events: Mutex<HashMap<String, Vec<String>>>,
    failing_events: Mutex<BTreeSet<String>>,
}

impl StaticApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository reachable through the user listing
    pub fn with_user_repo(mut self, owner: &str, name: &str) -> Self {
        self.user_repos.push(RepositoryDescriptor::new(owner, name));
        self
    }

    /// Repository reachable through an organization listing
    pub fn with_org_repo(mut self, org: &str, name: &str) -> Self {
        if !self.organizations.iter().any(|o| o == org) {
            self.organizations.push(org.to_string());
        }
        self.org_repos
            .entry(org.to_string())
            .or_default()
            .push(RepositoryDescriptor::new(org, name));
        self
    }

    /// Listed, but without contents
    pub fn with_empty_repo(mut self, owner: &str, name: &str) -> Self {
        self.user_repos.push(RepositoryDescriptor::new(owner, name));
        self.empty.insert(format!("{owner}/{name}"));
        self
    }

    /// Replace the event feed of `full_name`
    pub fn set_events(&self, full_name: &str, records: &[&str]) {
        self.events.lock().unwrap().insert(
            full_name.to_string(),
            records.iter().map(|r| (*r).to_string()).collect(),
        );
    }

    /// Prepend a new event to the feed of `full_name`
    pub fn push_event(&self, full_name: &str, record: &str) {
        self.events
            .lock()
            .unwrap()
            .entry(full_name.to_string())
            .or_default()
            .insert(0, record.to_string());
    }

    /// Make the event feed of `full_name` error
    pub fn fail_events(&self, full_name: &str) {
        self.failing_events.lock().unwrap().insert(full_name.to_string());
    }
}

#[async_trait]
impl RepositoryApi for StaticApi {
    async fn list_organizations(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.organizations.clone())
    }

    async fn list_repositories(&self) -> Result<Vec<RepositoryDescriptor>, ApiError> {
        Ok(self.user_repos.clone())
    }

    async fn list_organization_repositories(
        &self,
        organization: &str,
    ) -> Result<Vec<RepositoryDescriptor>, ApiError> {
        Ok(self.org_repos.get(organization).cloned().unwrap_or_default())
    }

    async fn has_contents(&self, repo: &RepositoryDescriptor) -> Result<bool, ApiError> {
        Ok(!self.empty.contains(&repo.full_name))
    }

    async fn recent_events(&self, repo: &RepositoryDescriptor) -> Result<Vec<String>, ApiError> {
        if self.failing_events.lock().unwrap().contains(&repo.full_name) {
            return Err(ApiError::Status {
                operation: format!("list events of {}", repo.full_name),
                status: 502,
                message: "Bad Gateway".to_string(),
            });
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .get(&repo.full_name)
            .cloned()
            .unwrap_or_default())
    }
}
