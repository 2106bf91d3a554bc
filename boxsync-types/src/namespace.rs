//! Per-user namespace roots.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable per-user identifier prefixing every remote key owned by that user.
///
/// Never empty and never contains the key separator, so `root/` is always an
/// unambiguous prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespaceRoot(String);

impl NamespaceRoot {
    /// Validates and wraps a namespace identifier.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.contains('/') {
            return Err(Error::InvalidNamespace(id));
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NamespaceRoot {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for NamespaceRoot {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<NamespaceRoot> for String {
    fn from(value: NamespaceRoot) -> Self {
        value.0
    }
}

impl AsRef<str> for NamespaceRoot {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
