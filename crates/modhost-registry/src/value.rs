use crate::media::Texture;
use crate::BindError;
use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

/// A live object produced from a content record.
///
/// Implemented for every `'static` type that is `Debug + Send + Sync`; host
/// content types need no extra code.
pub trait Content: Any + fmt::Debug + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any + fmt::Debug + Send + Sync> Content for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl dyn Content {
    pub fn is<T: Content>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Content>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Content>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// A record field converted to the kind its schema declares, ready to be
/// handed to the field's setter.
#[derive(Debug)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Enum variant name, in the spelling the schema declares.
    Enum(String),
    Object(Box<dyn Content>),
    List(Vec<Value>),
    Image(Arc<Texture>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Enum(_) => "enum",
            Value::Object(_) => "object",
            Value::List(_) => "list",
            Value::Image(_) => "image",
        }
    }

    fn mismatch(&self, expected: &str) -> BindError {
        BindError::WrongKind {
            expected: expected.to_owned(),
            found: self.kind_name().to_owned(),
        }
    }

    pub fn into_bool(self) -> Result<bool, BindError> {
        match self {
            Value::Bool(b) => Ok(b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn into_i64(self) -> Result<i64, BindError> {
        match self {
            Value::Int(i) => Ok(i),
            other => Err(other.mismatch("int")),
        }
    }

    /// Integers widen to floats.
    pub fn into_f64(self) -> Result<f64, BindError> {
        match self {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn into_string(self) -> Result<String, BindError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn into_enum(self) -> Result<String, BindError> {
        match self {
            Value::Enum(s) => Ok(s),
            other => Err(other.mismatch("enum")),
        }
    }

    /// Parse the variant name into a host enum.
    pub fn parse_enum<E: std::str::FromStr>(self) -> Result<E, BindError> {
        let name = self.into_enum()?;
        name.parse::<E>().map_err(|_| {
            BindError::Rejected(format!(
                "'{name}' is not a valid {}",
                any::type_name::<E>()
            ))
        })
    }

    pub fn into_object<T: Content>(self) -> Result<T, BindError> {
        match self {
            Value::Object(obj) => obj
                .into_any()
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(|_| BindError::WrongKind {
                    expected: any::type_name::<T>().to_owned(),
                    found: "object of another type".to_owned(),
                }),
            other => Err(other.mismatch("object")),
        }
    }

    pub fn into_list(self) -> Result<Vec<Value>, BindError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.mismatch("list")),
        }
    }

    /// Convert every element of a list with `f`.
    pub fn into_list_of<T>(
        self,
        f: impl Fn(Value) -> Result<T, BindError>,
    ) -> Result<Vec<T>, BindError> {
        self.into_list()?.into_iter().map(f).collect()
    }

    pub fn into_image(self) -> Result<Arc<Texture>, BindError> {
        match self {
            Value::Image(texture) => Ok(texture),
            other => Err(other.mismatch("image")),
        }
    }
}
