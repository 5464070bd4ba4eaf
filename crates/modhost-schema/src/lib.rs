//! Manifest parsing, discovery and declarative content records for modhost.
//!
//! This crate defines the on-disk schema layer: the `manifest.json` record
//! every package ships (`Manifest`), directory discovery (`discover`), the
//! `$type`-tagged content record (`ContentRecord`) and the identifier types
//! shared by the rest of the workspace.

pub mod content;
pub mod manifest;
pub mod types;

pub use content::{parse_content_file, parse_content_str, ContentError, ContentRecord, TYPE_TAG};
pub use manifest::{
    discover, discover_with, load_manifest, parse_manifest_str, Discovery, Manifest,
    ManifestError, MANIFEST_FILE_NAME,
};
pub use types::{AssetKey, PackageId, NAMESPACE_SEPARATOR};
