//! Atomic JSON state files
//!
//! State is written to a temp file in the target's directory, synced, and
//! renamed over the target, so readers see either the old or the new
//! contents and never a torn write.

use crate::error::PersistError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Serialize `value` to `path` atomically
///
/// # Errors
/// `PersistError` if encoding, writing, syncing or the final rename fails
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| PersistError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| PersistError::io(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".reposnap-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| PersistError::io(dir, e))?;
    tmp.write_all(&bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| PersistError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| PersistError::io(path, e.error))?;
    Ok(())
}

/// Read and decode `path`
///
/// Returns `Ok(None)` when the file does not exist.
///
/// # Errors
/// `PersistError::Io` for read failures, `PersistError::Decode` for
/// contents that do not parse as `T`
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PersistError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| PersistError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Remove `path`, treating an already-missing file as success
///
/// # Errors
/// `PersistError::Io` for any other failure
pub fn remove_if_exists(path: &Path) -> Result<(), PersistError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PersistError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn write_then_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");

        let mut value = BTreeMap::new();
        value.insert("acme/widgets".to_string(), "abc".to_string());
        write_json_atomic(&path, &value).unwrap();

        let read: Option<BTreeMap<String, String>> = read_json(&path).unwrap();
        assert_eq!(read, Some(value));
    }

    #[test]
    fn overwrite_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");

        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();

        let entries: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("state.json")]);
        assert_eq!(read_json::<Vec<i32>>(&path).unwrap(), Some(vec![4]));
    }

    #[test]
    fn missing_file_reads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let read: Option<Vec<i32>> = read_json(&tmp.path().join("absent.json")).unwrap();
        assert!(read.is_none());
    }

    #[test]
    fn garbage_reports_decode_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            read_json::<Vec<i32>>(&path),
            Err(PersistError::Decode { .. })
        ));
    }

    #[test]
    fn remove_missing_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        remove_if_exists(&tmp.path().join("absent.json")).unwrap();
    }
}
