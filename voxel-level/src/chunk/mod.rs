//! The chunk data model and variant registry.
//!
//! A [`Chunk`] is a tagged sum over the data-version bands Java edition
//! defines; each arm embeds its own component set by structural embedding
//! rather than dynamic dispatch.

pub mod component;
pub mod registry;

use indexmap::IndexMap;
use voxel_nbt::compound::NbtCompound;
use voxel_nbt::tag::NbtTag;

use crate::codec;
use crate::config::CodecConfig;
use crate::error::{VoxelError, VoxelResult};
use component::{
    BiomeId, BiomePalette2D, BiomePalette3D, BlockId, BlockPaletteComponent, BlockSection,
    ComponentId, DataVersionComponent, HeightmapComponent, Loadable, RawNbtComponent,
};

pub const HEIGHTMAP_NAMES: &[&str] = &["MOTION_BLOCKING", "WORLD_SURFACE"];

/// The untyped, on-disk form of a chunk: a mapping from string key to a
/// named NBT tag. The well-known `"root"` key carries the primary compound;
/// any other key is an opaque sidecar payload the region layer could not
/// classify (oversized/external pieces) and preserves verbatim rather than
/// dropping.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawChunk {
    entries: IndexMap<String, NbtTag>,
}

pub const RAW_CHUNK_ROOT_KEY: &str = "root";

impl RawChunk {
    pub fn from_root(compound: NbtCompound) -> Self {
        let mut entries = IndexMap::new();
        entries.insert(RAW_CHUNK_ROOT_KEY.to_string(), NbtTag::Compound(compound));
        Self { entries }
    }

    pub fn root(&self) -> Option<&NbtCompound> {
        match self.entries.get(RAW_CHUNK_ROOT_KEY) {
            Some(NbtTag::Compound(c)) => Some(c),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&NbtTag> {
        self.entries.get(key)
    }

    /// Stores an opaque sidecar payload under `key`, preserved verbatim
    /// across load/save round trips even though this layer does not
    /// interpret it.
    pub fn put_sidecar(&mut self, key: impl Into<String>, tag: NbtTag) {
        self.entries.insert(key.into(), tag);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }
}

/// Components shared by every Java chunk variant: a raw-NBT component, a
/// data-version component, and a block component.
#[derive(Clone, Debug, Default)]
pub struct CoreComponents {
    pub raw: Loadable<RawNbtComponent>,
    pub data_version: Loadable<DataVersionComponent>,
    pub blocks: Loadable<BlockPaletteComponent>,
}

impl CoreComponents {
    fn populated(data_version: i64, section_count: usize, default_block: BlockId) -> Self {
        Self {
            raw: Loadable::loaded(RawNbtComponent::default()),
            data_version: Loadable::loaded(DataVersionComponent(data_version)),
            blocks: Loadable::loaded(BlockPaletteComponent::filled(section_count, default_block)),
        }
    }
}

macro_rules! legacy_variant {
    ($name:ident, $id:expr) => {
        #[derive(Clone, Debug, Default)]
        pub struct $name {
            pub core: CoreComponents,
            pub biomes: Loadable<BiomePalette2D>,
        }

        impl $name {
            pub const CHUNK_ID: &'static str = $id;

            fn populated(
                data_version: i64,
                section_count: usize,
                default_block: BlockId,
                default_biome: component::BiomeId,
            ) -> Self {
                Self {
                    core: CoreComponents::populated(data_version, section_count, default_block),
                    biomes: Loadable::loaded(BiomePalette2D::filled(default_biome)),
                }
            }

            fn component_ids() -> &'static [ComponentId] {
                &[
                    ComponentId::RawNbt,
                    ComponentId::DataVersion,
                    ComponentId::BlockPalette,
                    ComponentId::BiomePalette,
                ]
            }
        }
    };
}

legacy_variant!(JavaChunkNa, "voxel:java_chunk_na");
legacy_variant!(JavaChunk0, "voxel:java_chunk_0");
legacy_variant!(JavaChunk1444, "voxel:java_chunk_1444");

#[derive(Clone, Debug, Default)]
pub struct JavaChunk1466 {
    pub core: CoreComponents,
    pub biomes: Loadable<BiomePalette2D>,
    pub heightmaps: Loadable<HeightmapComponent>,
}

impl JavaChunk1466 {
    pub const CHUNK_ID: &'static str = "voxel:java_chunk_1466";

    fn populated(
        data_version: i64,
        section_count: usize,
        default_block: BlockId,
        default_biome: component::BiomeId,
    ) -> Self {
        Self {
            core: CoreComponents::populated(data_version, section_count, default_block),
            biomes: Loadable::loaded(BiomePalette2D::filled(default_biome)),
            heightmaps: Loadable::loaded(HeightmapComponent::empty(HEIGHTMAP_NAMES)),
        }
    }

    fn component_ids() -> &'static [ComponentId] {
        &[
            ComponentId::RawNbt,
            ComponentId::DataVersion,
            ComponentId::BlockPalette,
            ComponentId::BiomePalette,
            ComponentId::Heightmaps,
        ]
    }
}

#[derive(Clone, Debug, Default)]
pub struct JavaChunk2203 {
    pub core: CoreComponents,
    pub biomes: Loadable<BiomePalette3D>,
    pub heightmaps: Loadable<HeightmapComponent>,
}

impl JavaChunk2203 {
    pub const CHUNK_ID: &'static str = "voxel:java_chunk_2203";

    fn populated(
        data_version: i64,
        section_count: usize,
        default_block: BlockId,
        default_biome: component::BiomeId,
    ) -> Self {
        Self {
            core: CoreComponents::populated(data_version, section_count, default_block),
            biomes: Loadable::loaded(BiomePalette3D::filled(section_count, default_biome)),
            heightmaps: Loadable::loaded(HeightmapComponent::empty(HEIGHTMAP_NAMES)),
        }
    }

    fn component_ids() -> &'static [ComponentId] {
        &[
            ComponentId::RawNbt,
            ComponentId::DataVersion,
            ComponentId::BlockPalette,
            ComponentId::BiomePalette,
            ComponentId::Heightmaps,
        ]
    }
}

/// A value-typed chunk aggregate, tagged by its data-version band.
#[derive(Clone, Debug)]
pub enum Chunk {
    JavaChunkNa(JavaChunkNa),
    JavaChunk0(JavaChunk0),
    JavaChunk1444(JavaChunk1444),
    JavaChunk1466(JavaChunk1466),
    JavaChunk2203(JavaChunk2203),
}

impl Chunk {
    pub fn chunk_id(&self) -> &'static str {
        match self {
            Self::JavaChunkNa(_) => JavaChunkNa::CHUNK_ID,
            Self::JavaChunk0(_) => JavaChunk0::CHUNK_ID,
            Self::JavaChunk1444(_) => JavaChunk1444::CHUNK_ID,
            Self::JavaChunk1466(_) => JavaChunk1466::CHUNK_ID,
            Self::JavaChunk2203(_) => JavaChunk2203::CHUNK_ID,
        }
    }

    pub fn component_ids(&self) -> &'static [ComponentId] {
        match self {
            Self::JavaChunkNa(_) => JavaChunkNa::component_ids(),
            Self::JavaChunk0(_) => JavaChunk0::component_ids(),
            Self::JavaChunk1444(_) => JavaChunk1444::component_ids(),
            Self::JavaChunk1466(_) => JavaChunk1466::component_ids(),
            Self::JavaChunk2203(_) => JavaChunk2203::component_ids(),
        }
    }

    pub fn data_version(&self) -> VoxelResult<i64> {
        let dv = match self {
            Self::JavaChunkNa(c) => &c.core.data_version,
            Self::JavaChunk0(c) => &c.core.data_version,
            Self::JavaChunk1444(c) => &c.core.data_version,
            Self::JavaChunk1466(c) => &c.core.data_version,
            Self::JavaChunk2203(c) => &c.core.data_version,
        };
        Ok(dv.get("data_version")?.0)
    }

    /// Block component accessor, present on every variant.
    pub fn blocks(&self) -> VoxelResult<&BlockPaletteComponent> {
        let blocks = match self {
            Self::JavaChunkNa(c) => &c.core.blocks,
            Self::JavaChunk0(c) => &c.core.blocks,
            Self::JavaChunk1444(c) => &c.core.blocks,
            Self::JavaChunk1466(c) => &c.core.blocks,
            Self::JavaChunk2203(c) => &c.core.blocks,
        };
        blocks.get("blocks")
    }

    pub fn blocks_mut(&mut self) -> VoxelResult<&mut BlockPaletteComponent> {
        let blocks = match self {
            Self::JavaChunkNa(c) => &mut c.core.blocks,
            Self::JavaChunk0(c) => &mut c.core.blocks,
            Self::JavaChunk1444(c) => &mut c.core.blocks,
            Self::JavaChunk1466(c) => &mut c.core.blocks,
            Self::JavaChunk2203(c) => &mut c.core.blocks,
        };
        blocks.get_mut("blocks")
    }

    pub fn raw(&self) -> VoxelResult<&RawNbtComponent> {
        let raw = match self {
            Self::JavaChunkNa(c) => &c.core.raw,
            Self::JavaChunk0(c) => &c.core.raw,
            Self::JavaChunk1444(c) => &c.core.raw,
            Self::JavaChunk1466(c) => &c.core.raw,
            Self::JavaChunk2203(c) => &c.core.raw,
        };
        raw.get("raw")
    }

    /// The biome palette flattened to a plain id array, regardless of
    /// whether this variant's layout is 2D (one id per column) or 3D (one id
    /// per 4x4x4 section), so callers and the raw-chunk round trip don't
    /// need to special-case the band.
    pub fn biome_ids(&self) -> VoxelResult<Vec<BiomeId>> {
        Ok(match self {
            Self::JavaChunkNa(c) => c.biomes.get("biomes")?.ids().to_vec(),
            Self::JavaChunk0(c) => c.biomes.get("biomes")?.ids().to_vec(),
            Self::JavaChunk1444(c) => c.biomes.get("biomes")?.ids().to_vec(),
            Self::JavaChunk1466(c) => c.biomes.get("biomes")?.ids().to_vec(),
            Self::JavaChunk2203(c) => c.biomes.get("biomes")?.ids(),
        })
    }

    pub fn set_biome_ids(&mut self, ids: &[BiomeId]) -> VoxelResult<()> {
        match self {
            Self::JavaChunkNa(c) => c.biomes.get_mut("biomes")?.set_ids(ids),
            Self::JavaChunk0(c) => c.biomes.get_mut("biomes")?.set_ids(ids),
            Self::JavaChunk1444(c) => c.biomes.get_mut("biomes")?.set_ids(ids),
            Self::JavaChunk1466(c) => c.biomes.get_mut("biomes")?.set_ids(ids),
            Self::JavaChunk2203(c) => c.biomes.get_mut("biomes")?.set_ids(ids),
        }
        Ok(())
    }

    /// Named heightmaps, present on variants from data version 1466 onward.
    /// Absent on earlier bands, which have no heightmap component at all.
    pub fn heightmaps(&self) -> VoxelResult<&HeightmapComponent> {
        match self {
            Self::JavaChunk1466(c) => c.heightmaps.get("heightmaps"),
            Self::JavaChunk2203(c) => c.heightmaps.get("heightmaps"),
            _ => Err(VoxelError::ComponentNotLoaded("heightmaps".to_string())),
        }
    }

    pub fn heightmaps_mut(&mut self) -> VoxelResult<&mut HeightmapComponent> {
        match self {
            Self::JavaChunk1466(c) => c.heightmaps.get_mut("heightmaps"),
            Self::JavaChunk2203(c) => c.heightmaps.get_mut("heightmaps"),
            _ => Err(VoxelError::ComponentNotLoaded("heightmaps".to_string())),
        }
    }

    /// Serializes this chunk's loaded components into a [`RawChunk`] for
    /// persistence through the region layer, packing the block palette,
    /// biome palette, and heightmaps with the long-array codec. `codec`
    /// supplies the bit-width floor applied to the block palette when its
    /// computed width would otherwise undercut the on-disk convention.
    pub fn to_raw(&self, codec: &CodecConfig) -> VoxelResult<RawChunk> {
        let mut root = NbtCompound::new();
        root.put_long("DataVersion", self.data_version()?);
        root.put("chunk_id", NbtTag::String(self.chunk_id().to_string()));

        let blocks = self.blocks()?;
        let mut sections = Vec::with_capacity(blocks.sections.len());
        for section in &blocks.sections {
            sections.push(encode_block_section(section, codec.min_bits_per_entry));
        }
        root.put(
            "sections",
            NbtTag::List(sections.into_iter().map(NbtTag::Compound).collect()),
        );

        if let Ok(biome_ids) = self.biome_ids() {
            root.put_component("biomes", encode_biome_palette(&biome_ids));
        }

        if let Ok(heightmaps) = self.heightmaps() {
            let mut maps_compound = NbtCompound::new();
            for (name, heights) in &heightmaps.maps {
                maps_compound.put_component(name, encode_heightmap(heights));
            }
            root.put_component("Heightmaps", maps_compound);
        }

        Ok(RawChunk::from_root(root))
    }

    /// Rebuilds a populated chunk from its raw on-disk form. `data_version`
    /// and `section_count` are taken from the caller (resolved from the
    /// registry) rather than re-derived, since the raw form may be partial.
    pub fn from_raw(
        raw: &RawChunk,
        data_version: i64,
        section_count: usize,
        default_block: BlockId,
        default_biome: component::BiomeId,
    ) -> VoxelResult<Self> {
        let mut chunk = registry::construct_java(data_version, section_count, default_block, default_biome)?;

        if let Some(root) = raw.root() {
            if let Some(sections_tag) = root.get_list("sections") {
                let blocks = chunk.blocks_mut()?;
                for (section, tag) in blocks.sections.iter_mut().zip(sections_tag.iter()) {
                    if let NbtTag::Compound(compound) = tag {
                        decode_block_section(compound, section)?;
                    }
                }
            }

            if let Some(biomes_compound) = root.get_compound("biomes") {
                let expected = chunk.biome_ids()?.len();
                let ids = decode_biome_palette(biomes_compound, expected)?;
                chunk.set_biome_ids(&ids)?;
            }

            if let Some(maps_compound) = root.get_compound("Heightmaps") {
                if let Ok(heightmaps) = chunk.heightmaps_mut() {
                    let names: Vec<String> = heightmaps.maps.keys().cloned().collect();
                    for name in names {
                        if let Some(NbtTag::Compound(map_compound)) = maps_compound.get(&name) {
                            let heights = decode_heightmap(map_compound)?;
                            heightmaps.maps.insert(name, heights);
                        }
                    }
                }
            }
        }

        Ok(chunk)
    }

    /// Clones this chunk, marking every component not named in `ids` as
    /// `Unloaded`: a deep-copied snapshot restricted to the requested
    /// component IDs. A `None` selection keeps every component.
    pub fn restrict_to(&self, ids: Option<&[ComponentId]>) -> Self {
        let Some(ids) = ids else {
            return self.clone();
        };
        let mut copy = self.clone();
        copy.retain_components(ids);
        copy
    }

    fn retain_components(&mut self, ids: &[ComponentId]) {
        let keep = |id: ComponentId| ids.contains(&id);
        macro_rules! strip_core {
            ($core:expr) => {{
                if !keep(ComponentId::RawNbt) {
                    $core.raw = Loadable::Unloaded;
                }
                if !keep(ComponentId::DataVersion) {
                    $core.data_version = Loadable::Unloaded;
                }
                if !keep(ComponentId::BlockPalette) {
                    $core.blocks = Loadable::Unloaded;
                }
            }};
        }
        match self {
            Self::JavaChunkNa(c) => {
                strip_core!(c.core);
                if !keep(ComponentId::BiomePalette) {
                    c.biomes = Loadable::Unloaded;
                }
            }
            Self::JavaChunk0(c) => {
                strip_core!(c.core);
                if !keep(ComponentId::BiomePalette) {
                    c.biomes = Loadable::Unloaded;
                }
            }
            Self::JavaChunk1444(c) => {
                strip_core!(c.core);
                if !keep(ComponentId::BiomePalette) {
                    c.biomes = Loadable::Unloaded;
                }
            }
            Self::JavaChunk1466(c) => {
                strip_core!(c.core);
                if !keep(ComponentId::BiomePalette) {
                    c.biomes = Loadable::Unloaded;
                }
                if !keep(ComponentId::Heightmaps) {
                    c.heightmaps = Loadable::Unloaded;
                }
            }
            Self::JavaChunk2203(c) => {
                strip_core!(c.core);
                if !keep(ComponentId::BiomePalette) {
                    c.biomes = Loadable::Unloaded;
                }
                if !keep(ComponentId::Heightmaps) {
                    c.heightmaps = Loadable::Unloaded;
                }
            }
        }
    }
}

fn encode_block_section(section: &BlockSection, min_bits_per_entry: u8) -> NbtCompound {
    let mut compound = NbtCompound::new();
    let values: Vec<u64> = section.blocks.iter().map(|&id| id as u64).collect();
    let bits = component_bits_for(&values, min_bits_per_entry);
    let packed = codec::encode(&values, Some(bits), true, 1).unwrap_or_default();
    compound.put_byte("bits_per_entry", bits as i8);
    compound.put(
        "block_states",
        NbtTag::LongArray(packed.into_iter().map(|w| w as i64).collect()),
    );
    compound
}

fn decode_block_section(compound: &NbtCompound, section: &mut BlockSection) -> VoxelResult<()> {
    let bits = compound
        .get_byte("bits_per_entry")
        .ok_or_else(|| VoxelError::InvalidArgument("missing bits_per_entry".to_string()))?
        as u8;
    let packed = compound
        .get_long_array("block_states")
        .ok_or_else(|| VoxelError::InvalidArgument("missing block_states".to_string()))?;
    let words: Vec<u64> = packed.iter().map(|&w| w as u64).collect();
    let decoded = codec::decode(&words, 4096, bits, true)?;
    for (slot, value) in section.blocks.iter_mut().zip(decoded) {
        *slot = value as BlockId;
    }
    Ok(())
}

/// Packs a flattened biome id array with the long-array codec. Unlike block
/// sections, biomes carry no minimum bit floor on disk.
fn encode_biome_palette(ids: &[BiomeId]) -> NbtCompound {
    let mut compound = NbtCompound::new();
    let values: Vec<u64> = ids.iter().map(|&id| id as u64).collect();
    let bits = voxel_util::encompassing_bits(values.iter().copied().max().unwrap_or(0) as usize + 1);
    let packed = codec::encode(&values, Some(bits), true, 0).unwrap_or_default();
    compound.put_byte("bits_per_entry", bits as i8);
    compound.put(
        "palette",
        NbtTag::LongArray(packed.into_iter().map(|w| w as i64).collect()),
    );
    compound
}

fn decode_biome_palette(compound: &NbtCompound, size: usize) -> VoxelResult<Vec<BiomeId>> {
    let bits = compound
        .get_byte("bits_per_entry")
        .ok_or_else(|| VoxelError::InvalidArgument("missing bits_per_entry".to_string()))?
        as u8;
    let packed = compound
        .get_long_array("palette")
        .ok_or_else(|| VoxelError::InvalidArgument("missing biome palette".to_string()))?;
    let words: Vec<u64> = packed.iter().map(|&w| w as u64).collect();
    let decoded = codec::decode(&words, size, bits, true)?;
    Ok(decoded.into_iter().map(|v| v as BiomeId).collect())
}

/// Packs one named heightmap (one height per column) densely, sized to the
/// largest value actually present rather than a fixed world-height floor.
fn encode_heightmap(heights: &[i32]) -> NbtCompound {
    let mut compound = NbtCompound::new();
    let values: Vec<u64> = heights.iter().map(|&h| h.max(0) as u64).collect();
    let bits = voxel_util::encompassing_bits(values.iter().copied().max().unwrap_or(0) as usize + 1).max(1);
    let packed = codec::encode(&values, Some(bits), true, 1).unwrap_or_default();
    compound.put_byte("bits_per_entry", bits as i8);
    compound.put(
        "data",
        NbtTag::LongArray(packed.into_iter().map(|w| w as i64).collect()),
    );
    compound
}

fn decode_heightmap(compound: &NbtCompound) -> VoxelResult<Vec<i32>> {
    let bits = compound
        .get_byte("bits_per_entry")
        .ok_or_else(|| VoxelError::InvalidArgument("missing bits_per_entry".to_string()))?
        as u8;
    let packed = compound
        .get_long_array("data")
        .ok_or_else(|| VoxelError::InvalidArgument("missing heightmap data".to_string()))?;
    let words: Vec<u64> = packed.iter().map(|&w| w as u64).collect();
    let decoded = codec::decode(&words, HeightmapComponent::COLUMNS, bits, true)?;
    Ok(decoded.into_iter().map(|v| v as i32).collect())
}

fn component_bits_for(values: &[u64], floor: u8) -> u8 {
    let max = values.iter().copied().max().unwrap_or(0);
    voxel_util::encompassing_bits(max as usize + 1).max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_chunk_preserves_unknown_sidecar_keys() {
        let mut raw = RawChunk::from_root(NbtCompound::new());
        raw.put_sidecar("external_blob", NbtTag::ByteArray(vec![1, 2, 3].into()));
        assert!(matches!(raw.get("external_blob"), Some(NbtTag::ByteArray(_))));
        assert_eq!(raw.keys().count(), 2);
    }

    #[test]
    fn chunk_round_trips_block_palette_through_raw() {
        let mut chunk =
            registry::construct_java(2300, 1, 7, 3).expect("2203+ band should construct");
        chunk.blocks_mut().unwrap().sections[0].set(0, 0, 0, 42);
        chunk.blocks_mut().unwrap().sections[0].set(15, 15, 15, 99);

        let raw = chunk.to_raw(&CodecConfig::default()).unwrap();
        let restored = Chunk::from_raw(&raw, 2300, 1, 0, 0).unwrap();

        assert_eq!(restored.blocks().unwrap().sections[0].get(0, 0, 0), 42);
        assert_eq!(restored.blocks().unwrap().sections[0].get(15, 15, 15), 99);
        assert_eq!(restored.blocks().unwrap().sections[0].get(1, 1, 1), 7);
    }

    #[test]
    fn chunk_round_trips_3d_biomes_and_heightmaps_through_raw() {
        let mut chunk =
            registry::construct_java(2300, 2, 0, 1).expect("2203+ band should construct");

        let mut ids = chunk.biome_ids().unwrap();
        ids[0] = 5;
        ids[ids.len() - 1] = 9;
        chunk.set_biome_ids(&ids).unwrap();

        chunk.heightmaps_mut().unwrap().maps.get_mut("MOTION_BLOCKING").unwrap()[10] = 64;

        let raw = chunk.to_raw(&CodecConfig::default()).unwrap();
        let restored = Chunk::from_raw(&raw, 2300, 2, 0, 1).unwrap();

        let restored_ids = restored.biome_ids().unwrap();
        assert_eq!(restored_ids[0], 5);
        assert_eq!(restored_ids[restored_ids.len() - 1], 9);
        assert_eq!(restored_ids[1], 1);

        assert_eq!(
            restored.heightmaps().unwrap().maps.get("MOTION_BLOCKING").unwrap()[10],
            64
        );
        assert_eq!(
            restored.heightmaps().unwrap().maps.get("MOTION_BLOCKING").unwrap()[0],
            0
        );
    }

    #[test]
    fn chunk_round_trips_2d_biomes_through_raw() {
        let mut chunk = registry::construct_java(1500, 1, 0, 2).expect("1466 band should construct");

        let mut ids = chunk.biome_ids().unwrap();
        ids[3] = 7;
        chunk.set_biome_ids(&ids).unwrap();

        let raw = chunk.to_raw(&CodecConfig::default()).unwrap();
        let restored = Chunk::from_raw(&raw, 1500, 1, 0, 2).unwrap();

        let restored_ids = restored.biome_ids().unwrap();
        assert_eq!(restored_ids[3], 7);
        assert_eq!(restored_ids[0], 2);
    }

    #[test]
    fn heightmaps_are_absent_before_1466() {
        let chunk = registry::construct_java(1000, 1, 0, 0).unwrap();
        assert!(matches!(
            chunk.heightmaps(),
            Err(VoxelError::ComponentNotLoaded(_))
        ));
    }
}
