//! Chunk variant registry: maps `(edition, data_version)` and `chunk_id` to
//! concrete chunk variants.
//!
//! Java edition is the only dispatch table implemented; other editions are
//! out of scope beyond the version-identifier shape itself.

use voxel_util::{VersionNumber, VersionRange};

use super::component::{BiomeId, BlockId};
use super::{Chunk, JavaChunk0, JavaChunk1444, JavaChunk1466, JavaChunk2203, JavaChunkNa};
use crate::error::{VoxelError, VoxelResult};

pub const JAVA_EDITION: &str = "java";

/// The five Java data-version bands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JavaBand {
    Na,
    V0,
    V1444,
    V1466,
    V2203,
}

impl JavaBand {
    pub fn for_data_version(data_version: i64) -> VoxelResult<Self> {
        match data_version {
            -1 => Ok(Self::Na),
            0..=1443 => Ok(Self::V0),
            1444..=1465 => Ok(Self::V1444),
            1466..=2202 => Ok(Self::V1466),
            v if v >= 2203 => Ok(Self::V2203),
            v => Err(VoxelError::InvalidArgument(format!(
                "data_version {v} has no Java chunk band (must be -1 or >= 0)"
            ))),
        }
    }

    pub fn chunk_id(self) -> &'static str {
        match self {
            Self::Na => JavaChunkNa::CHUNK_ID,
            Self::V0 => JavaChunk0::CHUNK_ID,
            Self::V1444 => JavaChunk1444::CHUNK_ID,
            Self::V1466 => JavaChunk1466::CHUNK_ID,
            Self::V2203 => JavaChunk2203::CHUNK_ID,
        }
    }

    /// The closed `VersionRange` this band covers. A chunk's declared
    /// version must lie inside every component's `VersionRange`. `V2203` is
    /// open-ended on the source's data-version axis; `i64::MAX` stands in
    /// for "infinity" since `VersionRange` itself requires a concrete upper
    /// bound.
    pub fn version_range(self) -> VersionRange {
        let (min, max) = match self {
            Self::Na => (-1, -1),
            Self::V0 => (0, 1443),
            Self::V1444 => (1444, 1465),
            Self::V1466 => (1466, 2202),
            Self::V2203 => (2203, i64::MAX),
        };
        VersionRange::new(JAVA_EDITION, VersionNumber::from(min), VersionNumber::from(max))
    }

    /// Re-checks `data_version` against this band's own `VersionRange`,
    /// enforcing the chunk/component version invariant through the same
    /// type the rest of the crate uses for version membership, rather than
    /// trusting the dispatch match in [`Self::for_data_version`] alone.
    fn validate(self, data_version: i64) -> VoxelResult<()> {
        let version = VersionNumber::from(data_version);
        if self.version_range().contains(JAVA_EDITION, &version) {
            Ok(())
        } else {
            Err(VoxelError::InvalidArgument(format!(
                "data_version {data_version} does not lie in the {self:?} band's version range"
            )))
        }
    }
}

/// Resolves the Java chunk id for `data_version`, without constructing a chunk.
pub fn chunk_id_for_java(data_version: i64) -> VoxelResult<&'static str> {
    Ok(JavaBand::for_data_version(data_version)?.chunk_id())
}

/// Constructs a fully-populated Java chunk variant for `data_version`,
/// validating the version against its band and failing with an argument
/// error otherwise.
pub fn construct_java(
    data_version: i64,
    section_count: usize,
    default_block: BlockId,
    default_biome: BiomeId,
) -> VoxelResult<Chunk> {
    let band = JavaBand::for_data_version(data_version)?;
    band.validate(data_version)?;
    Ok(match band {
        JavaBand::Na => Chunk::JavaChunkNa(JavaChunkNa::populated(
            data_version,
            section_count,
            default_block,
            default_biome,
        )),
        JavaBand::V0 => Chunk::JavaChunk0(JavaChunk0::populated(
            data_version,
            section_count,
            default_block,
            default_biome,
        )),
        JavaBand::V1444 => Chunk::JavaChunk1444(JavaChunk1444::populated(
            data_version,
            section_count,
            default_block,
            default_biome,
        )),
        JavaBand::V1466 => Chunk::JavaChunk1466(JavaChunk1466::populated(
            data_version,
            section_count,
            default_block,
            default_biome,
        )),
        JavaBand::V2203 => Chunk::JavaChunk2203(JavaChunk2203::populated(
            data_version,
            section_count,
            default_block,
            default_biome,
        )),
    })
}

/// Constructs an unpopulated shell for `chunk_id`, for use during
/// deserialization before the real data is loaded from disk. Every
/// component reads as `ComponentNotLoaded` until filled.
pub fn construct_null(chunk_id: &str) -> VoxelResult<Chunk> {
    Ok(match chunk_id {
        id if id == JavaChunkNa::CHUNK_ID => Chunk::JavaChunkNa(JavaChunkNa::default()),
        id if id == JavaChunk0::CHUNK_ID => Chunk::JavaChunk0(JavaChunk0::default()),
        id if id == JavaChunk1444::CHUNK_ID => Chunk::JavaChunk1444(JavaChunk1444::default()),
        id if id == JavaChunk1466::CHUNK_ID => Chunk::JavaChunk1466(JavaChunk1466::default()),
        id if id == JavaChunk2203::CHUNK_ID => Chunk::JavaChunk2203(JavaChunk2203::default()),
        other => return Err(VoxelError::UnknownChunkId(other.to_string())),
    })
}
