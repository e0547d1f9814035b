//! Directory copy and move primitives
//!
//! Copies are exact and fail fast: regular files are copied, symbolic links
//! are recreated as links (never followed), subdirectories are created as
//! needed, and owner/group plus permission bits follow the source.

use crate::error::RotationError;
use std::fs;
use std::path::Path;

/// Check whether anything (including a dangling symlink) exists at `path`
#[inline]
#[must_use]
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Recursively copy the contents of `src` into the existing directory `dest`
///
/// Returns the number of non-directory entries copied.
///
/// # Errors
/// The first IO error, with the failing path; nothing is skipped
pub fn copy_dir_contents(src: &Path, dest: &Path) -> Result<u64, RotationError> {
    let mut copied = 0;
    let entries = fs::read_dir(src).map_err(|e| RotationError::io("read directory", src, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| RotationError::io("read directory", src, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());

        let meta = fs::symlink_metadata(&from).map_err(|e| RotationError::io("stat", &from, e))?;
        let file_type = meta.file_type();

        if file_type.is_dir() {
            if !entry_exists(&to) {
                fs::create_dir(&to).map_err(|e| RotationError::io("create directory", &to, e))?;
            }
            copied += copy_dir_contents(&from, &to)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(&from).map_err(|e| RotationError::io("read link", &from, e))?;
            make_symlink(&target, &to)?;
            copied += 1;
        } else {
            fs::copy(&from, &to).map_err(|e| RotationError::io("copy file", &to, e))?;
            copied += 1;
        }

        preserve_ownership(&meta, &to)?;
        if !file_type.is_symlink() {
            fs::set_permissions(&to, meta.permissions())
                .map_err(|e| RotationError::io("set permissions", &to, e))?;
        }
    }

    Ok(copied)
}

/// Move every entry of `src` into the existing directory `dest` by copying
/// and then deleting the source entries. Works across filesystems.
///
/// # Errors
/// Any copy or delete failure; on a copy failure the source is untouched
pub fn move_dir_contents(src: &Path, dest: &Path) -> Result<u64, RotationError> {
    let copied = copy_dir_contents(src, dest)?;
    clear_dir(src)?;
    Ok(copied)
}

/// Delete every entry of `dir`, keeping `dir` itself
///
/// # Errors
/// `RotationError::Io` for the first entry that cannot be removed
pub fn clear_dir(dir: &Path) -> Result<(), RotationError> {
    let entries = fs::read_dir(dir).map_err(|e| RotationError::io("read directory", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RotationError::io("read directory", dir, e))?;
        remove_entry(&entry.path())?;
    }
    Ok(())
}

/// Remove a file, symlink or whole directory tree
///
/// # Errors
/// `RotationError::Io` if removal fails
pub fn remove_entry(path: &Path) -> Result<(), RotationError> {
    let meta = fs::symlink_metadata(path).map_err(|e| RotationError::io("stat", path, e))?;
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| RotationError::io("remove", path, e))
}

/// Remove `dir` if it has no entries. Returns whether it was removed.
///
/// # Errors
/// `RotationError::Io` if the directory cannot be listed or removed
pub fn remove_dir_if_empty(dir: &Path) -> Result<bool, RotationError> {
    let mut entries = fs::read_dir(dir).map_err(|e| RotationError::io("read directory", dir, e))?;
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir).map_err(|e| RotationError::io("remove directory", dir, e))?;
    Ok(true)
}

/// Sorted entry names of a directory (deterministic processing order)
pub(crate) fn sorted_entries(dir: &Path) -> Result<Vec<fs::DirEntry>, RotationError> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| RotationError::io("read directory", dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RotationError::io("read directory", dir, e))?;
    entries.sort_by_key(fs::DirEntry::file_name);
    Ok(entries)
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> Result<(), RotationError> {
    std::os::unix::fs::symlink(target, link).map_err(|e| RotationError::io("create symlink", link, e))
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, link: &Path) -> Result<(), RotationError> {
    Err(RotationError::io(
        "create symlink",
        link,
        std::io::Error::new(std::io::ErrorKind::Unsupported, "symlinks require a unix target"),
    ))
}

#[cfg(unix)]
fn preserve_ownership(meta: &fs::Metadata, path: &Path) -> Result<(), RotationError> {
    use std::os::unix::fs::MetadataExt;
    std::os::unix::fs::lchown(path, Some(meta.uid()), Some(meta.gid()))
        .map_err(|e| RotationError::io("change owner", path, e))
}

#[cfg(not(unix))]
fn preserve_ownership(_meta: &fs::Metadata, _path: &Path) -> Result<(), RotationError> {
    Ok(())
}
