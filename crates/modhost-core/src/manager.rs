use crate::config::ModHostConfig;
use crate::drift::{content_files, DriftReport, FileStamps};
use crate::events::{EventBus, ModEvent};
use crate::lifecycle::{validate_transition, LifecycleOp, PackageState};
use crate::parser::{ContentParser, PackageContext, ParsedAsset};
use crate::resolver::resolve;
use crate::CoreError;
use chrono::{DateTime, Utc};
use modhost_registry::{AssetRegistry, Content, MediaLoader, TypeRegistry};
use modhost_schema::{discover_with, load_manifest, AssetKey, Discovery, Manifest, PackageId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Runtime record of one loaded package. Replaced wholesale on reload.
#[derive(Debug, Clone)]
pub struct LoadedPackage {
    pub manifest: Manifest,
    pub loaded_at: DateTime<Utc>,
    /// Keys this package registered, in registration order.
    pub asset_keys: Vec<AssetKey>,
    /// Content files that failed to parse; still tracked for changes.
    pub failed_files: Vec<PathBuf>,
    stamps: FileStamps,
    sequence: u64,
}

impl LoadedPackage {
    pub fn file_stamps(&self) -> &FileStamps {
        &self.stamps
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailedPackage {
    pub id: PackageId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedEntry {
    pub path: String,
    pub error: String,
}

/// Outcome of [`ModManager::load_all`].
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct LoadSummary {
    /// Resolved order of every discovered package, enabled or not.
    pub order: Vec<PackageId>,
    pub loaded: Vec<PackageId>,
    pub failed: Vec<FailedPackage>,
    pub skipped_disabled: Vec<PackageId>,
    pub already_loaded: Vec<PackageId>,
    pub discovery_errors: Vec<SkippedEntry>,
}

impl LoadSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.discovery_errors.is_empty()
    }
}

/// Owns the loaded-package set and drives discovery, resolution, load,
/// unload and reload against the host's registries.
///
/// Construct one per host and pass it where needed; nothing here is global.
pub struct ModManager {
    config: ModHostConfig,
    types: Box<dyn TypeRegistry>,
    assets: Box<dyn AssetRegistry>,
    parser: ContentParser,
    loaded: BTreeMap<PackageId, LoadedPackage>,
    events: EventBus,
    next_sequence: u64,
}

impl std::fmt::Debug for ModManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModManager")
            .field("config", &self.config)
            .field("loaded", &self.loaded.keys().collect::<Vec<_>>())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl ModManager {
    pub fn new(
        config: ModHostConfig,
        types: impl TypeRegistry + 'static,
        assets: impl AssetRegistry + 'static,
    ) -> Self {
        let parser = ContentParser::new(config.content_extension.clone());
        Self {
            config,
            types: Box::new(types),
            assets: Box::new(assets),
            parser,
            loaded: BTreeMap::new(),
            events: EventBus::new(),
            next_sequence: 0,
        }
    }

    #[must_use]
    pub fn with_media_loader(mut self, media: impl MediaLoader + 'static) -> Self {
        self.parser = ContentParser::new(self.config.content_extension.clone())
            .with_media_loader(media);
        self
    }

    pub fn config(&self) -> &ModHostConfig {
        &self.config
    }

    pub fn types(&self) -> &dyn TypeRegistry {
        self.types.as_ref()
    }

    pub fn types_mut(&mut self) -> &mut dyn TypeRegistry {
        self.types.as_mut()
    }

    pub fn assets(&self) -> &dyn AssetRegistry {
        self.assets.as_ref()
    }

    /// Typed lookup of a registered asset.
    pub fn asset<T: Content>(&self, key: &str) -> Option<&T> {
        self.assets.get(key)?.downcast_ref::<T>()
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn discover(&self) -> Result<Discovery, CoreError> {
        Ok(discover_with(
            &self.config.mods_root,
            &self.config.manifest_file,
        )?)
    }

    /// Discover, resolve and load every enabled package.
    ///
    /// Only a dependency cycle (or an unreadable mods root) fails the call;
    /// per-package failures land in the summary and as `LoadError` events.
    pub fn load_all(&mut self) -> Result<LoadSummary, CoreError> {
        let discovery = self.discover()?;
        let mut summary = LoadSummary {
            discovery_errors: discovery
                .skipped
                .iter()
                .map(|(path, e)| SkippedEntry {
                    path: path.display().to_string(),
                    error: e.to_string(),
                })
                .collect(),
            ..LoadSummary::default()
        };

        let ordered = resolve(discovery.manifests)?;
        summary.order = ordered.iter().map(|m| m.id.clone()).collect();
        info!(
            "loading {} packages from {}",
            ordered.len(),
            self.config.mods_root.display()
        );

        for manifest in ordered {
            let id = manifest.id.clone();
            if !manifest.enabled {
                debug!("package '{id}' is disabled");
                summary.skipped_disabled.push(id);
                continue;
            }
            if self.is_loaded(&id) {
                summary.already_loaded.push(id);
                continue;
            }
            match self.load_one(manifest) {
                Ok(()) => summary.loaded.push(id),
                Err(e) => summary.failed.push(FailedPackage {
                    id,
                    error: e.to_string(),
                }),
            }
        }

        info!(
            "loaded {} packages, {} failed",
            summary.loaded.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    /// Load one package. Every declared dependency must already be loaded
    /// and no conflicting package may be.
    pub fn load_one(&mut self, manifest: Manifest) -> Result<(), CoreError> {
        let id = manifest.id.clone();
        if self.is_loaded(&id) {
            return Err(CoreError::AlreadyLoaded(id));
        }
        let sequence = self.next_sequence;
        match self.load_package(manifest, sequence) {
            Ok(()) => {
                self.next_sequence += 1;
                self.events.emit(&ModEvent::Loaded(id));
                Ok(())
            }
            Err(e) => {
                self.report_load_error(&id, &e);
                Err(e)
            }
        }
    }

    /// Load a package from a directory that arrived outside discovery, such
    /// as one a download client just unpacked.
    pub fn load_from_path(&mut self, dir: &Path) -> Result<PackageId, CoreError> {
        let mut manifest = load_manifest(dir.join(&self.config.manifest_file))?;
        manifest.load_order = self
            .loaded
            .values()
            .map(|p| p.manifest.load_order + 1)
            .max()
            .unwrap_or(0);
        let id = manifest.id.clone();
        self.load_one(manifest)?;
        Ok(id)
    }

    /// Unload a package no other loaded package depends on.
    pub fn unload(&mut self, id: &str) -> Result<(), CoreError> {
        let state = self.state_of(id);
        validate_transition(id, state, LifecycleOp::Unload)?;

        let dependents = self.dependents_of(id);
        if !dependents.is_empty() {
            return Err(CoreError::DependentStillLoaded {
                package: PackageId::from(id),
                dependents,
            });
        }

        let removed = self.evict(id);
        if let Some(package) = self.loaded.remove(id) {
            info!(
                "unloaded '{id}' ({removed} assets, loaded at {})",
                package.loaded_at.to_rfc3339()
            );
            self.events.emit(&ModEvent::Unloaded(package.manifest.id));
        }
        Ok(())
    }

    /// Unload everything, dependents before their dependencies. Since every
    /// package goes, the dependents check of [`ModManager::unload`] is not
    /// applied and the teardown always completes.
    pub fn unload_all(&mut self) -> Vec<PackageId> {
        let mut ids = self.loaded_ids();
        ids.reverse();
        for id in &ids {
            let removed = self.evict(id);
            if self.loaded.remove(id.as_str()).is_some() {
                info!("unloaded '{id}' ({removed} assets)");
                self.events.emit(&ModEvent::Unloaded(id.clone()));
            }
        }
        ids
    }

    /// Re-read the package's manifest from its root and load it again.
    ///
    /// The manifest is read before anything is evicted, so a broken manifest
    /// leaves the old package loaded. Once eviction has happened a failed
    /// load leaves the package unloaded.
    pub fn reload(&mut self, id: &str) -> Result<(), CoreError> {
        let state = self.state_of(id);
        validate_transition(id, state, LifecycleOp::Reload)?;
        let Some(current) = self.loaded.get(id) else {
            return Err(CoreError::NotLoaded(PackageId::from(id)));
        };
        let manifest_path = current.manifest.root_path.join(&self.config.manifest_file);
        let load_order = current.manifest.load_order;
        let sequence = current.sequence;
        let package_id = current.manifest.id.clone();

        let mut manifest = match load_manifest(&manifest_path) {
            Ok(m) => m,
            Err(e) => {
                let e = CoreError::from(e);
                self.keep_after_failed_reload(&package_id, &e);
                return Err(e);
            }
        };
        if manifest.id != package_id {
            let e = CoreError::IdChanged {
                expected: package_id.clone(),
                found: manifest.id,
                path: manifest_path.display().to_string(),
            };
            self.keep_after_failed_reload(&package_id, &e);
            return Err(e);
        }
        manifest.load_order = load_order;

        self.evict(id);
        self.loaded.remove(id);

        match self.load_package(manifest, sequence) {
            Ok(()) => {
                info!("reloaded '{id}'");
                self.events.emit(&ModEvent::Reloaded(package_id));
                Ok(())
            }
            Err(e) => {
                let orphans = self.dependents_of(id);
                if !orphans.is_empty() {
                    warn!(
                        "'{id}' failed to reload; dependents left without it: {}",
                        orphans
                            .iter()
                            .map(PackageId::as_str)
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
                self.report_load_error(&package_id, &e);
                Err(e)
            }
        }
    }

    /// Ids of loaded packages with at least one changed, added or removed
    /// file since they were loaded. Does not modify anything.
    pub fn detect_changed_packages(&self) -> BTreeSet<PackageId> {
        self.loaded
            .values()
            .filter(|package| self.drift_of(package).has_drift)
            .map(|package| package.manifest.id.clone())
            .collect()
    }

    pub fn package_drift(&self, id: &str) -> Result<DriftReport, CoreError> {
        let package = self
            .loaded
            .get(id)
            .ok_or_else(|| CoreError::NotLoaded(PackageId::from(id)))?;
        Ok(self.drift_of(package))
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.loaded.contains_key(id)
    }

    pub fn state_of(&self, id: &str) -> PackageState {
        if self.is_loaded(id) {
            PackageState::Loaded
        } else {
            PackageState::Unloaded
        }
    }

    /// Loaded ids, every package after the loaded packages its current
    /// manifest depends on; otherwise in the order they were loaded.
    pub fn loaded_ids(&self) -> Vec<PackageId> {
        let mut packages: Vec<&LoadedPackage> = self.loaded.values().collect();
        packages.sort_by_key(|p| p.sequence);
        let mut visited = HashSet::new();
        let mut order = Vec::with_capacity(packages.len());
        for package in packages {
            self.visit_loaded(package, &mut visited, &mut order);
        }
        order
    }

    fn visit_loaded<'a>(
        &'a self,
        package: &'a LoadedPackage,
        visited: &mut HashSet<&'a str>,
        order: &mut Vec<PackageId>,
    ) {
        // Marked before recursing, so a cycle introduced by a reload ends here.
        if !visited.insert(package.manifest.id.as_str()) {
            return;
        }
        for dependency in &package.manifest.dependencies {
            if let Some(loaded) = self.loaded.get(dependency.as_str()) {
                self.visit_loaded(loaded, visited, order);
            }
        }
        order.push(package.manifest.id.clone());
    }

    pub fn loaded_package(&self, id: &str) -> Option<&LoadedPackage> {
        self.loaded.get(id)
    }

    pub fn asset_keys(&self, id: &str) -> Option<&[AssetKey]> {
        self.loaded.get(id).map(|p| p.asset_keys.as_slice())
    }

    fn load_package(&mut self, manifest: Manifest, sequence: u64) -> Result<(), CoreError> {
        let id = manifest.id.clone();
        validate_transition(&id, self.state_of(&id), LifecycleOp::Load)?;

        for dependency in &manifest.dependencies {
            if !self.is_loaded(dependency) {
                return Err(CoreError::MissingDependency {
                    package: id,
                    dependency: dependency.clone(),
                });
            }
        }
        if let Some(conflict) = self.conflicting_package(&manifest) {
            return Err(CoreError::Conflict {
                package: id,
                conflict,
            });
        }

        let mut assets: Vec<ParsedAsset> = Vec::new();
        let mut tracked: Vec<PathBuf> = vec![manifest.root_path.join(&self.config.manifest_file)];
        let mut failed_files = Vec::new();
        let context = PackageContext {
            id: &id,
            root: &manifest.root_path,
        };
        for dir in manifest.content_dirs() {
            let report = self
                .parser
                .parse_directory(&dir, &context, self.types.as_ref());
            assets.extend(report.assets);
            tracked.extend(report.files);
            failed_files.extend(report.failures.into_iter().map(|(path, _)| path));
        }

        // All parsing is done before anything is registered.
        let mut seen = HashSet::new();
        let mut asset_keys = Vec::with_capacity(assets.len());
        for asset in assets {
            if !seen.insert(asset.key.clone()) {
                warn!(
                    "'{}' is defined more than once in '{id}'; {} wins",
                    asset.key,
                    asset.source.display()
                );
            } else {
                asset_keys.push(asset.key.clone());
            }
            self.assets.register(asset.key, asset.value);
        }

        info!(
            "loaded '{id}' {} ({} assets, {} failed files)",
            manifest.version,
            asset_keys.len(),
            failed_files.len()
        );
        let package = LoadedPackage {
            manifest,
            loaded_at: Utc::now(),
            asset_keys,
            failed_files,
            stamps: FileStamps::capture(&tracked),
            sequence,
        };
        self.loaded.insert(id, package);
        Ok(())
    }

    /// A loaded package this one declares as a conflict, or one that
    /// declares this one.
    fn conflicting_package(&self, manifest: &Manifest) -> Option<PackageId> {
        if let Some(conflict) = manifest.conflicts.iter().find(|c| self.is_loaded(c)) {
            return Some(conflict.clone());
        }
        self.loaded
            .values()
            .find(|p| p.manifest.conflicts.contains(&manifest.id))
            .map(|p| p.manifest.id.clone())
    }

    fn dependents_of(&self, id: &str) -> Vec<PackageId> {
        self.loaded
            .values()
            .filter(|p| p.manifest.id != *id && p.manifest.dependencies.iter().any(|d| d == id))
            .map(|p| p.manifest.id.clone())
            .collect()
    }

    fn evict(&mut self, id: &str) -> usize {
        let prefix = PackageId::from(id).namespace_prefix();
        self.assets.unregister_by_prefix(&prefix)
    }

    /// Manifest plus content files of a package as they are on disk now.
    fn current_files(&self, manifest: &Manifest) -> Vec<PathBuf> {
        let mut current = vec![manifest.root_path.join(&self.config.manifest_file)];
        current.retain(|p| p.is_file());
        for dir in manifest.content_dirs() {
            match content_files(&dir, self.parser.extension()) {
                Ok(files) => current.extend(files),
                Err(e) => warn!("cannot scan {}: {e}", dir.display()),
            }
        }
        current
    }

    fn drift_of(&self, package: &LoadedPackage) -> DriftReport {
        let current = self.current_files(&package.manifest);
        package.stamps.diff(&package.manifest.id, &current)
    }

    /// The old package stays loaded, but the files that failed to load are
    /// re-stamped so the same edit is not reported as a change again.
    fn keep_after_failed_reload(&mut self, id: &PackageId, error: &CoreError) {
        if let Some(package) = self.loaded.get(id.as_str()) {
            let stamps = FileStamps::capture(&self.current_files(&package.manifest));
            if let Some(package) = self.loaded.get_mut(id.as_str()) {
                package.stamps = stamps;
            }
        }
        self.report_load_error(id, error);
    }

    fn report_load_error(&mut self, id: &PackageId, error: &CoreError) {
        warn!("failed to load '{id}': {error}");
        self.events.emit(&ModEvent::LoadError {
            package: id.clone(),
            error: error.to_string(),
        });
    }
}
