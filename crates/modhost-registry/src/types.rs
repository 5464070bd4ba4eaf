use crate::value::{Content, Value};
use crate::BindError;
use std::any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Shape a record field must have before its setter runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    String,
    /// Accepted variant names.
    Enum(Vec<String>),
    /// Nested record. `default_type` applies when the value has no `$type`.
    Object { default_type: Option<String> },
    List(Box<FieldKind>),
    /// Path relative to the package root, decoded by the media loader.
    Image,
    /// Path relative to the package root; decoding is left to the host.
    Audio,
}

impl FieldKind {
    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::Enum(variants.into_iter().map(Into::into).collect())
    }

    pub fn object() -> Self {
        FieldKind::Object { default_type: None }
    }

    pub fn object_of(type_name: impl Into<String>) -> Self {
        FieldKind::Object {
            default_type: Some(type_name.into()),
        }
    }

    pub fn list_of(element: FieldKind) -> Self {
        FieldKind::List(Box::new(element))
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Int => write!(f, "int"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::String => write!(f, "string"),
            FieldKind::Enum(_) => write!(f, "enum"),
            FieldKind::Object { .. } => write!(f, "object"),
            FieldKind::List(inner) => write!(f, "list<{inner}>"),
            FieldKind::Image => write!(f, "image"),
            FieldKind::Audio => write!(f, "audio"),
        }
    }
}

type Constructor = Arc<dyn Fn() -> Box<dyn Content> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut dyn Content, Value) -> Result<(), BindError> + Send + Sync>;

#[derive(Clone)]
pub struct FieldSpec {
    pub kind: FieldKind,
    setter: Setter,
}

impl FieldSpec {
    pub fn assign(&self, target: &mut dyn Content, value: Value) -> Result<(), BindError> {
        (self.setter)(target, value)
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec").field("kind", &self.kind).finish()
    }
}

/// Constructor plus field schema for one content type.
#[derive(Clone)]
pub struct TypeDescriptor {
    rust_type: &'static str,
    construct: Constructor,
    fields: BTreeMap<String, FieldSpec>,
}

impl TypeDescriptor {
    pub fn builder<T: Content + Default>() -> TypeBuilder<T> {
        TypeBuilder {
            descriptor: TypeDescriptor {
                rust_type: any::type_name::<T>(),
                construct: Arc::new(|| Box::new(T::default()) as Box<dyn Content>),
                fields: BTreeMap::new(),
            },
            _marker: PhantomData,
        }
    }

    pub fn rust_type(&self) -> &'static str {
        self.rust_type
    }

    pub fn instantiate(&self) -> Box<dyn Content> {
        (self.construct)()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("rust_type", &self.rust_type)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

pub struct TypeBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Content> TypeBuilder<T> {
    /// Declare a field and the setter that stores a bound value into `T`.
    #[must_use]
    pub fn field<F>(mut self, name: impl Into<String>, kind: FieldKind, set: F) -> Self
    where
        F: Fn(&mut T, Value) -> Result<(), BindError> + Send + Sync + 'static,
    {
        let rust_type = self.descriptor.rust_type;
        let setter: Setter = Arc::new(move |target: &mut dyn Content, value: Value| {
            let target = target
                .downcast_mut::<T>()
                .ok_or_else(|| BindError::TargetMismatch(rust_type.to_owned()))?;
            set(target, value)
        });
        self.descriptor
            .fields
            .insert(name.into(), FieldSpec { kind, setter });
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

/// Host-supplied mapping from a `$type` name to a constructible type.
pub trait TypeRegistry {
    fn register(&mut self, type_name: &str, descriptor: TypeDescriptor);

    fn resolve_type(&self, type_name: &str) -> Option<&TypeDescriptor>;

    fn has(&self, type_name: &str) -> bool {
        self.resolve_type(type_name).is_some()
    }

    /// A fresh default instance, or `None` for an unknown type.
    fn create(&self, type_name: &str) -> Option<Box<dyn Content>> {
        self.resolve_type(type_name)
            .map(TypeDescriptor::instantiate)
    }
}

/// In-memory [`TypeRegistry`].
#[derive(Debug, Default, Clone)]
pub struct TypeCatalog {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl TypeRegistry for TypeCatalog {
    fn register(&mut self, type_name: &str, descriptor: TypeDescriptor) {
        if self
            .types
            .insert(type_name.to_owned(), descriptor)
            .is_some()
        {
            debug!("replaced content type '{type_name}'");
        }
    }

    fn resolve_type(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }
}
