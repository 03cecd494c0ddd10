//! Tunables the caller supplies rather than a process-wide singleton.
//!
//! Shaped like an advanced-config pattern for compression scheme/level and a
//! codec bit floor, reshaped into plain `Default`-able, `serde`-derived
//! structs a host application can load from its own config file, since this
//! crate is a library with no process lifecycle of its own to own a static
//! config.

use serde::{Deserialize, Serialize};

use crate::chunk::component::{BiomeId, BlockId};
pub use crate::region::{Compression, RegionConfig};

/// Tunables for [`crate::codec`] when the caller omits an explicit
/// `bits_per_entry` on encode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Floor applied to the computed bit width. Block (`4`) and biome (`0`)
    /// palettes serialized to disk conventionally use different floors;
    /// exposed here as a knob rather than hardcoded so callers can match
    /// either convention.
    pub min_bits_per_entry: u8,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            min_bits_per_entry: 4,
        }
    }
}

/// Everything a [`crate::dimension::Dimension`] needs to construct chunks
/// that are absent from disk and to tune its region I/O.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DimensionConfig {
    pub region: RegionConfig,
    pub codec: CodecConfig,
    /// Data version stamped on freshly constructed chunks (never read from
    /// disk for this purpose; existing chunks keep their own).
    pub default_data_version: i64,
    pub default_block: BlockId,
    pub default_biome: BiomeId,
    /// Vertical section count for freshly constructed chunks.
    pub section_count: usize,
    /// Capacity of the in-memory LRU chunk-handle cache.
    pub chunk_cache_capacity: usize,
}

impl Default for DimensionConfig {
    fn default() -> Self {
        Self {
            region: RegionConfig::default(),
            codec: CodecConfig::default(),
            default_data_version: 3700,
            default_block: 0,
            default_biome: 0,
            section_count: 24,
            chunk_cache_capacity: 512,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dimension_config_round_trips_through_json() {
        let config = DimensionConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: DimensionConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.default_data_version, config.default_data_version);
        assert_eq!(restored.codec.min_bits_per_entry, config.codec.min_bits_per_entry);
        assert_eq!(restored.chunk_cache_capacity, config.chunk_cache_capacity);
    }

    #[test]
    fn a_host_can_override_the_codec_floor_from_a_config_file() {
        let json = r#"{
            "region": {"compression": "ZLib", "compression_level": 6},
            "codec": {"min_bits_per_entry": 2},
            "default_data_version": 3700,
            "default_block": 0,
            "default_biome": 0,
            "section_count": 24,
            "chunk_cache_capacity": 512
        }"#;
        let config: DimensionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.codec.min_bits_per_entry, 2);
    }
}
