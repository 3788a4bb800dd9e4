//! # Core Error Types
//!
//! Errors raised by registries and by the wire codec.

use thiserror::Error;

use crate::key::ResourceKey;

/// Errors that can occur while decoding or encoding wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Attempted to read past the end of the loaded data.
    #[error("buffer underrun: needed {needed} bytes, {remaining} remaining")]
    Underrun {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// Zero-length strings are never written; seeing one means corrupt data.
    #[error("refusing to encode an empty string")]
    EmptyString,

    /// A string payload was not valid UTF-8.
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    /// A var-int ran past five bytes.
    #[error("var-int longer than 5 bytes")]
    VarIntTooLong,

    /// A length prefix was negative or does not fit in the buffer.
    #[error("length prefix {0} out of range")]
    LengthOutOfRange(i64),

    /// The LZ4 block could not be expanded.
    #[error("decompression failed: {0}")]
    Decompress(String),
}

/// Errors that can occur in registries and content finalization.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The same key was registered twice in one registry.
    #[error("duplicate key {key} in registry {registry}")]
    DuplicateKey {
        /// Registry name.
        registry: String,
        /// Offending key.
        key: ResourceKey,
    },

    /// Registration attempted after raw IDs were generated.
    #[error("registry {0} is frozen; clear it before registering")]
    RegistryFrozen(String),

    /// Raw ID lookup attempted before `generate_ids`.
    #[error("registry {0} has no raw IDs yet")]
    RegistryNotFrozen(String),

    /// A raw ID has no entry in this generation.
    #[error("unknown raw id {raw} in registry {registry}")]
    UnknownRawId {
        /// Registry name.
        registry: String,
        /// The raw ID that failed to resolve.
        raw: u32,
    },

    /// A key is not registered.
    #[error("unknown key {key} in registry {registry}")]
    UnknownKey {
        /// Registry name.
        registry: String,
        /// The key that failed to resolve.
        key: ResourceKey,
    },

    /// A string could not be parsed as `namespace:name`.
    #[error("invalid resource key: {0:?}")]
    InvalidKey(String),

    /// The block registry has no `core:air`, so void storage has no meaning.
    #[error("block registry {0} does not register core:air")]
    MissingAir(String),

    /// A sync frame named a registry this side does not have.
    #[error("unknown registry in sync frame: {0}")]
    UnknownRegistry(String),

    /// Wire data was malformed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
