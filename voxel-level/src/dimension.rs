//! Dimension: the top of the stack that ties the region store, the variant
//! registry, and the history machinery to a directory of `.mca` files.
//!
//! Shaped like a `region` subdirectory under a root folder, with a bounded
//! in-memory chunk cache in front of disk. Caches are `RefCell`-guarded
//! maps/LRU rather than a concurrent map since `ChunkHandle`'s layer is
//! `Rc`-based and therefore single-threaded (see DESIGN.md); the cache is a
//! bounded `lru::LruCache` rather than an unbounded map. Region/local
//! coordinate derivation uses `voxel_util::Vector2::region`/`local` rather
//! than re-deriving that bit-shift arithmetic here.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use lru::LruCache;
use voxel_util::Vector2;

use crate::chunk::RawChunk;
use crate::config::DimensionConfig;
use crate::error::VoxelResult;
use crate::handle::{ChunkHandle, ChunkKey, NewChunkParams};
use crate::history::{HistoryManager, Layer};
use crate::region::AnvilRegion;

/// A directory of Anvil region files plus the shared history and cache that
/// make its chunks editable with undo/redo. Callers obtain a `ChunkHandle`
/// from a dimension rather than constructing one directly.
pub struct Dimension {
    root: PathBuf,
    config: DimensionConfig,
    history: HistoryManager,
    layer: Layer<ChunkKey, RawChunk>,
    regions: RefCell<HashMap<(i32, i32), Rc<AnvilRegion>>>,
    handles: RefCell<LruCache<ChunkKey, Rc<ChunkHandle>>>,
}

impl Dimension {
    pub fn new(root_folder: impl Into<PathBuf>, config: DimensionConfig) -> Self {
        let history = HistoryManager::new();
        let layer = history.new_layer();
        let capacity = std::num::NonZeroUsize::new(config.chunk_cache_capacity.max(1)).unwrap();
        Self {
            root: root_folder.into(),
            config,
            history,
            layer,
            regions: RefCell::new(HashMap::new()),
            handles: RefCell::new(LruCache::new(capacity)),
        }
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    fn region_path(&self, rx: i32, rz: i32) -> PathBuf {
        self.root.join("region").join(format!("r.{rx}.{rz}.mca"))
    }

    fn region_for(&self, rx: i32, rz: i32) -> Rc<AnvilRegion> {
        if let Some(region) = self.regions.borrow().get(&(rx, rz)) {
            return region.clone();
        }
        let region = Rc::new(AnvilRegion::with_config(
            self.region_path(rx, rz),
            self.config.region,
        ));
        self.regions.borrow_mut().insert((rx, rz), region.clone());
        region
    }

    /// Returns the handle for `(chunk_x, chunk_z)`, constructing and
    /// caching it on first access.
    pub fn get_handle(&self, chunk_x: i32, chunk_z: i32) -> VoxelResult<Rc<ChunkHandle>> {
        let key = ChunkKey::new(chunk_x, chunk_z);
        if let Some(handle) = self.handles.borrow_mut().get(&key) {
            return Ok(handle.clone());
        }

        let pos = Vector2::new(chunk_x, chunk_z);
        let region_pos = pos.region();
        let local = pos.local();
        let region = self.region_for(region_pos.x, region_pos.z);
        let handle = Rc::new(ChunkHandle::new(
            key,
            (local.x, local.z),
            region,
            self.layer.clone(),
            NewChunkParams {
                data_version: self.config.default_data_version,
                section_count: self.config.section_count,
                default_block: self.config.default_block,
                default_biome: self.config.default_biome,
                codec: self.config.codec,
            },
        ));
        self.handles.borrow_mut().put(key, handle.clone());
        Ok(handle)
    }

    pub fn root_folder(&self) -> &Path {
        &self.root
    }
}
