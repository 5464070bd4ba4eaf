//! Identifier types shared across the workspace.
//!
//! `PackageId` serializes as a plain string; `AssetKey` renders as
//! `"<packageId>:<localName>"`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Separator between the package namespace and the local asset name.
pub const NAMESPACE_SEPARATOR: char = ':';

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Globally unique package identifier, e.g. `author.packagename`.
    PackageId
);

impl PackageId {
    /// Prefix shared by every asset key this package registers.
    pub fn namespace_prefix(&self) -> String {
        format!("{}{NAMESPACE_SEPARATOR}", self.0)
    }
}

/// Namespaced key of a registered asset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetKey {
    package: PackageId,
    name: String,
}

impl AssetKey {
    pub fn new(package: PackageId, name: impl Into<String>) -> Self {
        Self {
            package,
            name: name.into(),
        }
    }

    pub fn package(&self) -> &PackageId {
        &self.package
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{NAMESPACE_SEPARATOR}{}", self.package, self.name)
    }
}
