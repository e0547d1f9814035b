//! Persisted fingerprint map
//!
//! `{ "<owner>/<repo>": "<fingerprint>" }` in one JSON file under the backup
//! root. A missing or unreadable file is an empty store: every repository
//! then looks changed and gets exported, which is the safe direction.

use crate::error::StoreError;
use reposnap_core::persist::{read_json, write_json_atomic};
use reposnap_core::Fingerprint;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fingerprints keyed by repository full name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintStore {
    path: PathBuf,
    entries: BTreeMap<String, Fingerprint>,
}

impl FingerprintStore {
    /// Empty store that will be saved to `path`
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load from `path`, falling back to an empty store
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match read_json::<BTreeMap<String, Fingerprint>>(&path) {
            Ok(Some(entries)) => {
                tracing::debug!(path = %path.display(), count = entries.len(), "loaded fingerprints");
                Self { path, entries }
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "no fingerprint store yet, exporting everything");
                Self::empty(path)
            }
            Err(error) => {
                tracing::warn!(%error, "fingerprint store unreadable, exporting everything");
                Self::empty(path)
            }
        }
    }

    /// Store location
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn get(&self, full_name: &str) -> Option<&Fingerprint> {
        self.entries.get(full_name)
    }

    /// Set a fingerprint, returning the previous one
    pub fn insert(&mut self, full_name: impl Into<String>, fingerprint: Fingerprint) -> Option<Fingerprint> {
        self.entries.insert(full_name.into(), fingerprint)
    }

    pub fn remove(&mut self, full_name: &str) -> Option<Fingerprint> {
        self.entries.remove(full_name)
    }

    /// Keep only entries whose key satisfies `keep`
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite the whole file atomically
    ///
    /// # Errors
    /// `StoreError` if the write fails; the previous file stays intact
    pub fn save(&self) -> Result<(), StoreError> {
        write_json_atomic(&self.path, &self.entries)?;
        tracing::debug!(path = %self.path.display(), count = self.entries.len(), "saved fingerprints");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FingerprintStore::load(tmp.path().join("fingerprints.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fingerprints.json");
        std::fs::write(&path, b"{\"acme/widgets\": ").unwrap();
        assert!(FingerprintStore::load(&path).is_empty());

        std::fs::write(&path, b"[1, 2, 3]").unwrap();
        assert!(FingerprintStore::load(&path).is_empty());
    }

    #[test]
    fn saves_flat_object() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fingerprints.json");
        let mut store = FingerprintStore::empty(&path);
        store.insert("acme/widgets", Fingerprint::new("aa"));
        store.insert("me/notes", Fingerprint::new("bb"));
        store.save().unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({ "acme/widgets": "aa", "me/notes": "bb" }));
        assert_eq!(FingerprintStore::load(&path), store);
    }

    #[test]
    fn retain_drops_unlisted_keys() {
        let mut store = FingerprintStore::empty("unused.json");
        store.insert("acme/widgets", Fingerprint::new("aa"));
        store.insert("acme/deleted", Fingerprint::new("bb"));
        store.retain(|key| key != "acme/deleted");
        assert_eq!(store.len(), 1);
        assert!(store.get("acme/deleted").is_none());
    }
}
