use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Modification times of a package's files, captured at load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStamps {
    stamps: BTreeMap<PathBuf, SystemTime>,
}

impl FileStamps {
    /// Files whose metadata cannot be read are left out.
    pub fn capture<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Self {
        let stamps = paths
            .into_iter()
            .filter_map(|path| modified_time(path).map(|t| (path.clone(), t)))
            .collect();
        Self { stamps }
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<SystemTime> {
        self.stamps.get(path).copied()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.stamps.keys().map(PathBuf::as_path)
    }

    /// Compare the captured stamps with the files present now.
    pub fn diff(&self, package: &str, current: &[PathBuf]) -> DriftReport {
        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut removed = Vec::new();

        for path in current {
            match self.stamps.get(path) {
                None => added.push(path.display().to_string()),
                Some(&then) => match modified_time(path) {
                    Some(now) if now == then => {}
                    Some(_) => modified.push(path.display().to_string()),
                    None => removed.push(path.display().to_string()),
                },
            }
        }
        for path in self.stamps.keys() {
            if !current.contains(path) {
                removed.push(path.display().to_string());
            }
        }

        added.sort();
        modified.sort();
        removed.sort();

        let has_drift = !added.is_empty() || !modified.is_empty() || !removed.is_empty();
        DriftReport {
            package: package.to_owned(),
            added,
            modified,
            removed,
            has_drift,
        }
    }
}

/// Files of a loaded package that changed on disk since it was loaded.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DriftReport {
    pub package: String,
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
    pub has_drift: bool,
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Every file under `dir` with the given extension, recursively, sorted.
/// A missing directory yields nothing.
pub fn content_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if dir.is_dir() {
        collect_files(dir, extension, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn collect_files(current: &Path, extension: &str, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, extension, files)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            files.push(path);
        }
    }
    Ok(())
}
