//! Package orchestration for modhost.
//!
//! This crate turns discovered manifests into loaded packages: it orders them
//! by dependency (`resolve`), binds their content through the host's type
//! registry (`ContentParser`), tracks what each package registered so it can
//! be evicted again (`ModManager`), and reloads packages whose files changed
//! on disk (`HotReloadTracker`).

pub mod config;
pub mod drift;
pub mod events;
pub mod hot_reload;
pub mod lifecycle;
pub mod manager;
pub mod parser;
pub mod resolver;
pub mod signal;

pub use config::{ModHostConfig, CONFIG_FILE_NAME};
pub use drift::{content_files, DriftReport, FileStamps};
pub use events::{EventBus, EventKind, ModEvent};
pub use hot_reload::{HotReloadTracker, TickReport};
pub use lifecycle::{validate_transition, LifecycleOp, PackageState};
pub use manager::{FailedPackage, LoadSummary, LoadedPackage, ModManager, SkippedEntry};
pub use parser::{ContentParser, PackageContext, ParseReport, ParsedAsset};
pub use resolver::{resolve, ResolveError};
pub use signal::{install_signal_handler, shutdown_requested};

use modhost_schema::PackageId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] modhost_schema::ManifestError),
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("package '{0}' is already loaded")]
    AlreadyLoaded(PackageId),
    #[error("package '{0}' is not loaded")]
    NotLoaded(PackageId),
    #[error("package '{package}' requires '{dependency}', which is not loaded")]
    MissingDependency {
        package: PackageId,
        dependency: PackageId,
    },
    #[error("package '{package}' conflicts with loaded package '{conflict}'")]
    Conflict {
        package: PackageId,
        conflict: PackageId,
    },
    #[error("cannot unload '{package}': still required by {}", join_ids(.dependents))]
    DependentStillLoaded {
        package: PackageId,
        dependents: Vec<PackageId>,
    },
    #[error("manifest at {path} now declares Id '{found}', expected '{expected}'")]
    IdChanged {
        expected: PackageId,
        found: PackageId,
        path: String,
    },
    #[error("config error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_ids(ids: &[PackageId]) -> String {
    ids.iter()
        .map(|id| format!("'{id}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
