//! # World Error Types

use thiserror::Error;
use voxlink_core::{CodecError, CoreError, RawId};

/// Errors raised while decoding or mutating chunk data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The storage type tag is not one this build knows.
    #[error("unknown chunk storage tag {0}")]
    UnknownStorageTag(i32),

    /// A raw block ID read from the wire has no local block.
    #[error("raw block id {0} is not valid in the local registry")]
    InvalidRawId(RawId),

    /// A paletted payload is internally inconsistent.
    #[error("invalid palette: {0}")]
    InvalidPalette(String),

    /// Registry failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The payload was truncated or malformed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
