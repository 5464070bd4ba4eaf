use crate::types::{PackageId, NAMESPACE_SEPARATOR};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// File name of the manifest expected at every package root.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("manifest not found: {0}")]
    NotFound(PathBuf),
    #[error("manifest Id must not be empty")]
    EmptyId,
    #[error("invalid manifest Id '{0}': must not contain ':', '/' or '\\'")]
    InvalidId(String),
    #[error("invalid content path '{path}' in '{id}': must stay inside the package")]
    InvalidContentPath { id: String, path: String },
    #[error("duplicate manifest Id '{id}': {first} and {second}")]
    DuplicateId {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Package metadata as read from `manifest.json`.
///
/// `root_path` and `load_order` never come from disk: the first is stamped by
/// [`load_manifest`], the second by the dependency resolver.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    pub id: PackageId,
    #[serde(rename = "Name", default)]
    pub display_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<PackageId>,
    #[serde(default)]
    pub conflicts: Vec<PackageId>,
    #[serde(rename = "GameVersion", default)]
    pub compatible_host_version: String,
    #[serde(default = "default_content_paths")]
    pub content_paths: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(skip)]
    pub root_path: PathBuf,
    #[serde(skip)]
    pub load_order: usize,
}

fn default_content_paths() -> Vec<String> {
    vec!["content".to_owned()]
}

fn default_enabled() -> bool {
    true
}

impl Manifest {
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.id.is_empty() {
            return Err(ManifestError::EmptyId);
        }
        if self
            .id
            .chars()
            .any(|c| c == NAMESPACE_SEPARATOR || c == '/' || c == '\\')
        {
            return Err(ManifestError::InvalidId(self.id.to_string()));
        }
        for path in &self.content_paths {
            let escapes = Path::new(path).components().any(|c| {
                matches!(
                    c,
                    Component::ParentDir | Component::RootDir | Component::Prefix(_)
                )
            });
            if path.is_empty() || escapes {
                return Err(ManifestError::InvalidContentPath {
                    id: self.id.to_string(),
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Absolute directories named by `ContentPaths`.
    pub fn content_dirs(&self) -> Vec<PathBuf> {
        self.content_paths
            .iter()
            .map(|p| self.root_path.join(p))
            .collect()
    }
}

pub fn parse_manifest_str(input: &str) -> Result<Manifest, ManifestError> {
    let manifest: Manifest = serde_json::from_str(input)?;
    manifest.validate()?;
    Ok(manifest)
}

/// Parse one manifest file and stamp `root_path` with its parent directory.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    let mut manifest = parse_manifest_str(&content)?;
    let parent = path.parent().unwrap_or(Path::new("."));
    manifest.root_path = fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
    Ok(manifest)
}

/// Manifests found by [`discover`], plus the entries that were skipped.
#[derive(Debug, Default)]
pub struct Discovery {
    pub manifests: Vec<Manifest>,
    pub skipped: Vec<(PathBuf, ManifestError)>,
}

/// Scan the immediate subdirectories of `root` for `manifest.json` files.
///
/// Subdirectories are visited in name order so repeated scans of the same
/// layout produce the same sequence. A broken or missing manifest skips that
/// entry only; the first package to claim an id keeps it.
pub fn discover(root: impl AsRef<Path>) -> Result<Discovery, ManifestError> {
    discover_with(root, MANIFEST_FILE_NAME)
}

pub fn discover_with(
    root: impl AsRef<Path>,
    manifest_file: &str,
) -> Result<Discovery, ManifestError> {
    let root = root.as_ref();
    let mut discovery = Discovery::default();
    if !root.is_dir() {
        warn!("mods directory does not exist: {}", root.display());
        return Ok(discovery);
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut seen: HashMap<PackageId, PathBuf> = HashMap::new();
    for dir in dirs {
        let manifest_path = dir.join(manifest_file);
        let manifest = match load_manifest(&manifest_path) {
            Ok(m) => m,
            Err(e) => {
                warn!("skipping package at {}: {e}", dir.display());
                discovery.skipped.push((manifest_path, e));
                continue;
            }
        };
        if let Some(first) = seen.get(&manifest.id) {
            let err = ManifestError::DuplicateId {
                id: manifest.id.to_string(),
                first: first.clone(),
                second: dir.clone(),
            };
            warn!("skipping package at {}: {err}", dir.display());
            discovery.skipped.push((manifest_path, err));
            continue;
        }
        debug!("discovered package '{}' at {}", manifest.id, dir.display());
        seen.insert(manifest.id.clone(), dir);
        discovery.manifests.push(manifest);
    }

    Ok(discovery)
}
