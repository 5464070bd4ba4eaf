//! Declarative content records: a JSON object tagged with `$type`.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Discriminator field naming the type a record binds to.
pub const TYPE_TAG: &str = "$type";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read content file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse content file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("content record must be a JSON object")]
    NotAnObject,
    #[error("content record has no '$type' string")]
    MissingTypeTag,
    #[error("unknown content type '{0}'")]
    UnknownType(String),
}

/// One parsed record. The type tag is split off; every other field is kept
/// for binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub type_name: String,
    pub fields: Map<String, Value>,
}

impl ContentRecord {
    /// Split a JSON object into its type tag and remaining fields.
    ///
    /// `fallback_type` is used when the object carries no `$type`.
    pub fn from_value(value: Value, fallback_type: Option<&str>) -> Result<Self, ContentError> {
        let Value::Object(mut fields) = value else {
            return Err(ContentError::NotAnObject);
        };
        let type_name = match fields.remove(TYPE_TAG) {
            Some(Value::String(tag)) if !tag.is_empty() => tag,
            Some(_) => return Err(ContentError::MissingTypeTag),
            None => fallback_type
                .map(str::to_owned)
                .ok_or(ContentError::MissingTypeTag)?,
        };
        Ok(Self { type_name, fields })
    }
}

pub fn parse_content_str(input: &str) -> Result<ContentRecord, ContentError> {
    let value: Value = serde_json::from_str(input)?;
    ContentRecord::from_value(value, None)
}

pub fn parse_content_file(path: impl AsRef<Path>) -> Result<ContentRecord, ContentError> {
    let content = fs::read_to_string(path)?;
    parse_content_str(&content)
}
