//! # Resource Keys
//!
//! Stable, human-readable content identifiers of the form `namespace:name`.
//!
//! Keys are the authoritative identity of blocks, entity kinds and packet
//! types. Unlike raw IDs they survive across processes, builds and
//! content-pack reloads, which is why save data and sync frames carry keys.

use std::fmt;
use std::str::FromStr;

use crate::codec::{WireReader, WireWriter};
use crate::error::{CodecResult, CoreError};

/// Namespace used by built-in content.
pub const CORE_NAMESPACE: &str = "core";

/// Immutable `(namespace, name)` pair with value equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    namespace: String,
    name: String,
}

impl ResourceKey {
    /// Creates a key from its two halves.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Creates a key in the `core` namespace.
    #[must_use]
    pub fn core(name: impl Into<String>) -> Self {
        Self::new(CORE_NAMESPACE, name)
    }

    /// Returns the namespace half.
    #[inline]
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the name half.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes the key as a single `namespace:name` string.
    ///
    /// # Errors
    ///
    /// Fails if the key does not fit a wire string.
    pub fn write(&self, writer: &mut WireWriter) -> CodecResult<()> {
        writer.write_string(&self.to_string())
    }

    /// Reads a key written by [`ResourceKey::write`].
    ///
    /// # Errors
    ///
    /// Fails on truncated input or a string that is not `namespace:name`.
    pub fn read(reader: &mut WireReader) -> Result<Self, CoreError> {
        let text = reader.read_string()?;
        text.parse()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

impl FromStr for ResourceKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains(':') =>
            {
                Ok(Self::new(namespace, name))
            }
            _ => Err(CoreError::InvalidKey(s.to_owned())),
        }
    }
}
