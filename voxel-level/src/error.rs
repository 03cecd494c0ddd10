//! Unified error taxonomy for the level core, mirrored on the wire-visible
//! identities a host language binding would need.

use thiserror::Error;

/// Errors surfaced by the compression layer used by [`crate::region`].
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("compression scheme not recognised")]
    UnknownCompression,
    #[error("gzip error: {0}")]
    GZip(std::io::Error),
    #[error("zlib error: {0}")]
    ZLib(std::io::Error),
    #[error("lz4 error: {0}")]
    Lz4(std::io::Error),
}

/// The single error type returned across this crate's public API.
///
/// Argument errors are raised before any mutation; absence errors
/// (`RegionDoesNotExist`, `ChunkDoesNotExist`) are expected, recoverable
/// control flow; corruption errors mark the affected region read-only.
#[derive(Error, Debug)]
pub enum VoxelError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("component not loaded: {0}")]
    ComponentNotLoaded(String),

    #[error("unknown chunk id: {0}")]
    UnknownChunkId(String),

    #[error("unknown key: {0}")]
    UnknownKey(String),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("no valid level loader")]
    NoValidLevelLoader,

    #[error("region does not exist")]
    RegionDoesNotExist,

    #[error("chunk does not exist")]
    ChunkDoesNotExist,

    #[error("corrupt region header: {0}")]
    CorruptRegionHeader(String),

    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled,
}

pub type VoxelResult<T> = Result<T, VoxelError>;
