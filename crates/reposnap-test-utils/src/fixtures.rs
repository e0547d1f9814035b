//! Filesystem fixtures

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Write `(relative path, contents)` pairs under `dir`, creating parents
pub fn write_tree(dir: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    for (rel, contents) in files {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
}

/// Create `T-<n>` under `root` holding `files` (possibly none)
pub fn write_generation(root: &Path, n: u32, files: &[(&str, &str)]) {
    write_tree(&root.join(format!("T-{n}")), files);
}

/// Every file under `dir` as `relative/path -> contents`. Empty directories
/// are not represented.
pub fn read_tree(dir: &Path) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    collect(dir, "", &mut out);
    out
}

fn collect(dir: &Path, prefix: &str, out: &mut BTreeMap<String, String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let name = entry.file_name().to_string_lossy().into_owned();
        let rel = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if entry.file_type().unwrap().is_dir() {
            collect(&entry.path(), &rel, out);
        } else {
            out.insert(rel, fs::read_to_string(entry.path()).unwrap());
        }
    }
}

/// Expected-tree literal for comparing against [`read_tree`]
pub fn tree(files: &[(&str, &str)]) -> BTreeMap<String, String> {
    files
        .iter()
        .map(|(path, contents)| ((*path).to_string(), (*contents).to_string()))
        .collect()
}
