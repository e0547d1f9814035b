//! On-disk generation layout
//!
//! `<backup_root>/T-<n>/<owner>/<repo>.bundle`, `n = 0` newest.

use crate::error::RotationError;
use std::path::{Path, PathBuf};

/// Directory name prefix of a generation
pub const GENERATION_PREFIX: &str = "T-";

/// Path of generation `n`
#[inline]
#[must_use]
pub fn generation_dir(backup_root: &Path, n: u32) -> PathBuf {
    backup_root.join(format!("{GENERATION_PREFIX}{n}"))
}

/// Parse a generation directory name. Leading zeros are not generations.
#[must_use]
pub fn parse_generation(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(GENERATION_PREFIX)?;
    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return None;
    }
    digits.parse().ok()
}

/// Existing generation indices, ascending. Anything else under the root
/// (the fingerprint store, the journal, stray files) is ignored.
///
/// # Errors
/// `RotationError::Io` if the root cannot be listed
pub fn list_generations(backup_root: &Path) -> Result<Vec<u32>, RotationError> {
    let entries = match std::fs::read_dir(backup_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RotationError::io("list generations", backup_root, e)),
    };

    let mut generations = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RotationError::io("list generations", backup_root, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| RotationError::io("stat", entry.path(), e))?
            .is_dir();
        if !is_dir {
            continue;
        }
        if let Some(n) = entry.file_name().to_str().and_then(parse_generation) {
            generations.push(n);
        }
    }
    generations.sort_unstable();
    Ok(generations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generation_names() {
        assert_eq!(parse_generation("T-0"), Some(0));
        assert_eq!(parse_generation("T-12"), Some(12));
        assert_eq!(parse_generation("T-"), None);
        assert_eq!(parse_generation("T-01"), None);
        assert_eq!(parse_generation("T--1"), None);
        assert_eq!(parse_generation("T-1a"), None);
        assert_eq!(parse_generation("backT-1"), None);
        assert_eq!(parse_generation("fingerprints.json"), None);
    }

    #[test]
    fn lists_only_generation_directories() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["T-3", "T-0", "T-10", "T-x", "scratch"] {
            std::fs::create_dir(tmp.path().join(name)).unwrap();
        }
        std::fs::write(tmp.path().join("T-7"), b"not a directory").unwrap();
        std::fs::write(tmp.path().join("fingerprints.json"), b"{}").unwrap();

        assert_eq!(list_generations(tmp.path()).unwrap(), vec![0, 3, 10]);
    }

    #[test]
    fn missing_root_has_no_generations() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_generations(&tmp.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn generation_dir_naming() {
        assert_eq!(
            generation_dir(Path::new("/srv/backups"), 4),
            PathBuf::from("/srv/backups/T-4")
        );
    }
}
