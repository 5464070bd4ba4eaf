//! Content parser: reads `$type`-tagged records from a package's content
//! directories and binds them onto instances created by the type registry.
//!
//! Failures are contained at the smallest unit that can be skipped: a bad
//! file skips that file, a bad field skips that field, a bad list element
//! skips that element.

use crate::drift::content_files;
use modhost_registry::{
    BindError, Content, FieldKind, ImageLoader, MediaLoader, TypeDescriptor, TypeRegistry, Value,
};
use modhost_schema::{parse_content_file, AssetKey, ContentError, ContentRecord, PackageId};
use serde_json::{Map, Value as Json};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The package a record belongs to.
#[derive(Debug, Clone, Copy)]
pub struct PackageContext<'a> {
    pub id: &'a PackageId,
    /// Base for relative media paths.
    pub root: &'a Path,
}

/// A bound instance waiting to be registered.
#[derive(Debug)]
pub struct ParsedAsset {
    pub key: AssetKey,
    pub value: Box<dyn Content>,
    pub source: PathBuf,
}

#[derive(Debug, Default)]
pub struct ParseReport {
    pub assets: Vec<ParsedAsset>,
    /// Every content file seen, parsed or not.
    pub files: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, ContentError)>,
}

pub struct ContentParser {
    media: Box<dyn MediaLoader>,
    extension: String,
}

impl Default for ContentParser {
    fn default() -> Self {
        Self::new("json")
    }
}

impl std::fmt::Debug for ContentParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentParser")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl ContentParser {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            media: Box::new(ImageLoader),
            extension: extension.into(),
        }
    }

    #[must_use]
    pub fn with_media_loader(mut self, media: impl MediaLoader + 'static) -> Self {
        self.media = Box::new(media);
        self
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Parse every content file under `dir`. Never fails as a whole: broken
    /// files are logged and listed in [`ParseReport::failures`].
    pub fn parse_directory(
        &self,
        dir: &Path,
        package: &PackageContext<'_>,
        types: &dyn TypeRegistry,
    ) -> ParseReport {
        let mut report = ParseReport::default();
        if !dir.is_dir() {
            debug!(
                "package '{}' has no content directory at {}",
                package.id,
                dir.display()
            );
            return report;
        }

        let files = match content_files(dir, &self.extension) {
            Ok(files) => files,
            Err(e) => {
                warn!("cannot scan {}: {e}", dir.display());
                report.failures.push((dir.to_path_buf(), ContentError::Io(e)));
                return report;
            }
        };

        for path in files {
            match self.parse_file(&path, package, types) {
                Ok(asset) => report.assets.push(asset),
                Err(e) => {
                    warn!("skipping content file {}: {e}", path.display());
                    report.failures.push((path.clone(), e));
                }
            }
            report.files.push(path);
        }
        report
    }

    /// Parse and bind one file. The asset is keyed by the file name without
    /// its extension.
    pub fn parse_file(
        &self,
        path: &Path,
        package: &PackageContext<'_>,
        types: &dyn TypeRegistry,
    ) -> Result<ParsedAsset, ContentError> {
        let record = parse_content_file(path)?;
        let value = self.bind_record(record, package, types)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let key = AssetKey::new(package.id.clone(), name);
        debug!("bound {} from {}", key, path.display());
        Ok(ParsedAsset {
            key,
            value,
            source: path.to_path_buf(),
        })
    }

    /// Create the record's type and bind its fields onto it.
    pub fn bind_record(
        &self,
        record: ContentRecord,
        package: &PackageContext<'_>,
        types: &dyn TypeRegistry,
    ) -> Result<Box<dyn Content>, ContentError> {
        let descriptor = types
            .resolve_type(&record.type_name)
            .ok_or_else(|| ContentError::UnknownType(record.type_name.clone()))?;
        Ok(self.instantiate(&record.type_name, descriptor, record.fields, package, types))
    }

    fn instantiate(
        &self,
        type_name: &str,
        descriptor: &TypeDescriptor,
        fields: Map<String, Json>,
        package: &PackageContext<'_>,
        types: &dyn TypeRegistry,
    ) -> Box<dyn Content> {
        let mut instance = descriptor.instantiate();
        for (name, raw) in fields {
            let Some(spec) = descriptor.field(&name) else {
                debug!("{type_name}: ignoring undeclared field '{name}'");
                continue;
            };
            let bound = match self.convert(&spec.kind, raw, package, types) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    warn!("{type_name}.{name}: {e}; keeping default");
                    continue;
                }
            };
            if let Err(e) = spec.assign(&mut *instance, bound) {
                warn!("{type_name}.{name}: {e}; keeping default");
            }
        }
        instance
    }

    /// Convert a raw JSON value to the kind a field declares. `None` leaves
    /// the field unset.
    fn convert(
        &self,
        kind: &FieldKind,
        raw: Json,
        package: &PackageContext<'_>,
        types: &dyn TypeRegistry,
    ) -> Result<Option<Value>, BindError> {
        if raw.is_null() {
            return Ok(None);
        }
        let value = match (kind, raw) {
            (FieldKind::Bool, Json::Bool(b)) => Value::Bool(b),
            (FieldKind::Int, Json::Number(n)) if n.is_i64() || n.is_u64() => {
                let int = n.as_i64().ok_or_else(|| BindError::WrongKind {
                    expected: "int".to_owned(),
                    found: format!("out-of-range number {n}"),
                })?;
                Value::Int(int)
            }
            (FieldKind::Float, Json::Number(n)) => match n.as_f64() {
                Some(f) => Value::Float(f),
                None => return Err(wrong_kind(kind, &Json::Number(n))),
            },
            (FieldKind::String, Json::String(s)) => Value::String(s),
            (FieldKind::Enum(variants), Json::String(s)) => {
                let variant = variants
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(&s))
                    .ok_or_else(|| BindError::UnknownVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })?;
                Value::Enum(variant.clone())
            }
            (FieldKind::Object { default_type }, raw @ Json::Object(_)) => {
                let record = ContentRecord::from_value(raw, default_type.as_deref())
                    .map_err(|_| BindError::MissingTypeTag)?;
                let descriptor = types
                    .resolve_type(&record.type_name)
                    .ok_or_else(|| BindError::UnknownType(record.type_name.clone()))?;
                Value::Object(self.instantiate(
                    &record.type_name,
                    descriptor,
                    record.fields,
                    package,
                    types,
                ))
            }
            (FieldKind::List(element), Json::Array(items)) => {
                let mut bound = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    match self.convert(element, item, package, types) {
                        Ok(Some(value)) => bound.push(value),
                        Ok(None) => {}
                        Err(e) => warn!("list element {i}: {e}; skipping element"),
                    }
                }
                Value::List(bound)
            }
            (FieldKind::Image, Json::String(rel)) => {
                let path = media_path(package.root, &rel)?;
                let texture = self.media.load_image(&path)?;
                Value::Image(Arc::new(texture))
            }
            (FieldKind::Audio, Json::String(rel)) => {
                info!(
                    "audio '{rel}' in package '{}' requires async loading; field left unset",
                    package.id
                );
                return Ok(None);
            }
            (kind, raw) => return Err(wrong_kind(kind, &raw)),
        };
        Ok(Some(value))
    }
}

/// Resolve a media reference against the package root. Only plain relative
/// paths are accepted.
fn media_path(root: &Path, rel: &str) -> Result<PathBuf, BindError> {
    let path = Path::new(rel);
    let inside = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if rel.is_empty() || !inside {
        return Err(BindError::Rejected(format!(
            "media path '{rel}' must stay inside the package"
        )));
    }
    Ok(root.join(path))
}

fn wrong_kind(kind: &FieldKind, raw: &Json) -> BindError {
    let found = match raw {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    };
    BindError::WrongKind {
        expected: kind.to_string(),
        found: found.to_owned(),
    }
}
