//! Chunk components: the typed sub-records a [`super::Chunk`] variant
//! embeds. Content semantics beyond versioning are out of scope (block/biome
//! *value* types are assumed external); components here hold opaque
//! registry ids so the history/codec/registry machinery has something
//! concrete to operate on without reimplementing the game registry.

use indexmap::IndexMap;
use voxel_nbt::compound::NbtCompound;

use crate::error::{VoxelError, VoxelResult};

pub type BlockId = u32;
pub type BiomeId = u32;

/// A component that may not yet be populated, constructed via a variant's
/// null constructor during deserialization, before the real data is loaded
/// from disk. Operating on an `Unloaded` component fails with
/// `ComponentNotLoaded`.
#[derive(Clone, Debug, Default)]
pub enum Loadable<T> {
    Loaded(T),
    #[default]
    Unloaded,
}

impl<T> Loadable<T> {
    pub fn loaded(value: T) -> Self {
        Self::Loaded(value)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn get(&self, component_name: &str) -> VoxelResult<&T> {
        match self {
            Self::Loaded(v) => Ok(v),
            Self::Unloaded => Err(VoxelError::ComponentNotLoaded(component_name.to_string())),
        }
    }

    pub fn get_mut(&mut self, component_name: &str) -> VoxelResult<&mut T> {
        match self {
            Self::Loaded(v) => Ok(v),
            Self::Unloaded => Err(VoxelError::ComponentNotLoaded(component_name.to_string())),
        }
    }
}

/// Identifies a component slot within a chunk variant, for
/// `ChunkHandle::get_chunk(component_ids)` filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentId {
    RawNbt,
    DataVersion,
    BlockPalette,
    BiomePalette,
    Heightmaps,
}

/// The raw-NBT component: the authoritative on-disk form before decoding to
/// the other, typed components. An empty compound on fresh construction.
#[derive(Clone, Debug, Default)]
pub struct RawNbtComponent {
    pub compound: NbtCompound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataVersionComponent(pub i64);

/// One 16x16x16 vertical slice of the block palette.
#[derive(Clone, Debug)]
pub struct BlockSection {
    pub blocks: Box<[BlockId; 4096]>,
}

impl BlockSection {
    pub fn filled(default_block: BlockId) -> Self {
        Self {
            blocks: Box::new([default_block; 4096]),
        }
    }

    #[inline]
    fn index(x: usize, y: usize, z: usize) -> usize {
        (y * 16 + z) * 16 + x
    }

    pub fn get(&self, x: usize, y: usize, z: usize) -> BlockId {
        self.blocks[Self::index(x, y, z)]
    }

    pub fn set(&mut self, x: usize, y: usize, z: usize, value: BlockId) {
        self.blocks[Self::index(x, y, z)] = value;
    }
}

#[derive(Clone, Debug)]
pub struct BlockPaletteComponent {
    pub sections: Vec<BlockSection>,
}

impl BlockPaletteComponent {
    pub fn filled(section_count: usize, default_block: BlockId) -> Self {
        Self {
            sections: (0..section_count)
                .map(|_| BlockSection::filled(default_block))
                .collect(),
        }
    }
}

/// Pre-2203 legacy biome layout: one biome id per 4x4 horizontal column,
/// no vertical subdivision (16 entries total).
#[derive(Clone, Debug)]
pub struct BiomePalette2D {
    pub biomes: Box<[BiomeId; 16]>,
}

impl BiomePalette2D {
    pub fn filled(default_biome: BiomeId) -> Self {
        Self {
            biomes: Box::new([default_biome; 16]),
        }
    }

    pub fn ids(&self) -> &[BiomeId] {
        &*self.biomes
    }

    pub fn set_ids(&mut self, ids: &[BiomeId]) {
        for (slot, value) in self.biomes.iter_mut().zip(ids) {
            *slot = *value;
        }
    }
}

/// 2203+ layout: one 4x4x4 biome section per block section.
#[derive(Clone, Debug)]
pub struct BiomeSection3D {
    pub biomes: Box<[BiomeId; 64]>,
}

impl BiomeSection3D {
    pub fn filled(default_biome: BiomeId) -> Self {
        Self {
            biomes: Box::new([default_biome; 64]),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BiomePalette3D {
    pub sections: Vec<BiomeSection3D>,
}

impl BiomePalette3D {
    pub fn filled(section_count: usize, default_biome: BiomeId) -> Self {
        Self {
            sections: (0..section_count)
                .map(|_| BiomeSection3D::filled(default_biome))
                .collect(),
        }
    }

    pub fn ids(&self) -> Vec<BiomeId> {
        self.sections.iter().flat_map(|s| s.biomes.iter().copied()).collect()
    }

    pub fn set_ids(&mut self, ids: &[BiomeId]) {
        for (section, chunk) in self.sections.iter_mut().zip(ids.chunks(64)) {
            for (slot, value) in section.biomes.iter_mut().zip(chunk) {
                *slot = *value;
            }
        }
    }
}

/// Named heightmaps (`MOTION_BLOCKING`, `WORLD_SURFACE`, ...), present from
/// data version 1466 onward. Each map holds one height per column (256
/// entries for a 16x16 chunk), decoded from its on-disk long-array form.
#[derive(Clone, Debug, Default)]
pub struct HeightmapComponent {
    pub maps: IndexMap<String, Vec<i32>>,
}

impl HeightmapComponent {
    pub const COLUMNS: usize = 256;

    pub fn empty(names: &[&str]) -> Self {
        let mut maps = IndexMap::new();
        for name in names {
            maps.insert((*name).to_string(), vec![0i32; Self::COLUMNS]);
        }
        Self { maps }
    }
}
