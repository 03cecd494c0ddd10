//! Core subsystems of a voxel-world level-editing library: a bit-packed
//! long-array codec, the Anvil region file format, a chunk variant
//! registry, and a multi-layer undo/redo history manager tying them
//! together behind a per-chunk handle.
//!
//! Out of scope: rendering, world simulation, network protocol, GUI,
//! cross-edition format conversion, multiplayer sync, and the
//! language-binding glue that would sit above this crate.

pub mod cancel;
pub mod chunk;
pub mod codec;
pub mod config;
pub mod dimension;
pub mod error;
pub mod handle;
pub mod history;
pub mod region;

pub use cancel::CancellationToken;
pub use chunk::{Chunk, RawChunk};
pub use codec::LongArrayCodec;
pub use config::{CodecConfig, DimensionConfig};
pub use dimension::Dimension;
pub use error::{CompressionError, VoxelError, VoxelResult};
pub use handle::{ChunkGuard, ChunkHandle, ChunkKey};
pub use history::{HistoryManager, InitMode, Layer, ResourceView};
pub use region::{AnvilRegion, Compression, RegionConfig};
