//! Type registry, asset registry and binding value model for modhost.
//!
//! The host application supplies the concrete content types through
//! [`TypeRegistry`]: each type is registered with a [`TypeDescriptor`] naming
//! its fields, their [`FieldKind`] and a setter. Bound instances end up in an
//! [`AssetRegistry`] under `"<packageId>:<name>"` keys. [`MediaLoader`] turns
//! image references into decoded [`Texture`]s.

pub mod assets;
pub mod media;
pub mod types;
pub mod value;

pub use assets::{AssetRegistry, AssetStore};
pub use media::{ImageLoader, MediaError, MediaLoader, Texture};
pub use types::{FieldKind, FieldSpec, TypeBuilder, TypeCatalog, TypeDescriptor, TypeRegistry};
pub use value::{Content, Value};

use thiserror::Error;

/// Why one field (or one list element) could not be bound.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("expected {expected}, found {found}")]
    WrongKind { expected: String, found: String },
    #[error("unknown variant '{value}', expected one of {expected:?}")]
    UnknownVariant { value: String, expected: Vec<String> },
    #[error("unknown content type '{0}'")]
    UnknownType(String),
    #[error("nested object has no '$type' and the field declares no default type")]
    MissingTypeTag,
    #[error("setter expects a {0}")]
    TargetMismatch(String),
    #[error("media error: {0}")]
    Media(#[from] MediaError),
    #[error("{0}")]
    Rejected(String),
}
