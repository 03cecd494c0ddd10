//! Chunk handle: serializes access to one chunk's in-memory representation
//! and mediates between the history layer and the region file.
//!
//! Shaped like a `FileReadGuard`/`FileWriteGuard` RAII pattern: a guard type
//! whose `Drop` is the only release path, so a panic partway through an
//! edit still unlocks. Generalized from a path-keyed concurrent-map lock
//! registry to a single cell per chunk, since `Layer`/`HistoryManager` are
//! already `Rc`-based and therefore confined to one owning thread (see
//! DESIGN.md).
//!
//! The handle caches the last decode of the `Layer<ChunkKey, RawChunk>`
//! value it read, keyed on that raw value itself: a read compares the
//! layer's current `RawChunk` against the cached one and only pays for
//! `Chunk::from_raw` again when they differ. An `undo()`/`redo()` issued
//! through the dimension's `HistoryManager` changes what the layer hands
//! back, so it falls out of the cache on its own without any explicit
//! invalidation hook.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use voxel_util::Vector2;

use crate::cancel::CancellationToken;
use crate::chunk::component::{BiomeId, BlockId, ComponentId};
use crate::chunk::registry;
use crate::chunk::{Chunk, RawChunk};
use crate::config::CodecConfig;
use crate::error::{VoxelError, VoxelResult};
use crate::history::{InitMode, Layer};
use crate::region::AnvilRegion;

/// Global chunk coordinate, the key type for the shared raw-snapshot layer.
/// A thin wrapper over `voxel_util::Vector2<i32>` so `Dimension` can derive
/// a chunk's owning region and its local-in-region position via
/// `Vector2::region`/`local` instead of re-deriving that arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkKey(pub Vector2<i32>);

impl ChunkKey {
    pub fn new(x: i32, z: i32) -> Self {
        Self(Vector2::new(x, z))
    }

    pub fn x(&self) -> i32 {
        self.0.x
    }

    pub fn z(&self) -> i32 {
        self.0.z
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.0.x, self.0.z)
    }
}

/// Parameters used to construct a chunk absent from disk, supplied once per
/// handle by the owning `Dimension`.
#[derive(Clone, Copy, Debug)]
pub struct NewChunkParams {
    pub data_version: i64,
    pub section_count: usize,
    pub default_block: BlockId,
    pub default_biome: BiomeId,
    pub codec: CodecConfig,
}

/// RAII guard over a [`ChunkHandle`]'s exclusive lock. Releases on drop,
/// covering panics and early returns alike: `edit(fn)` guarantees release
/// on every exit path.
pub struct ChunkGuard<'a> {
    handle: &'a ChunkHandle,
}

impl Drop for ChunkGuard<'_> {
    fn drop(&mut self) {
        self.handle.locked.set(false);
    }
}

/// Serializes access to one chunk and lazily bridges it to the region file
/// through a revisioned [`Layer`].
///
/// Not `Send`/`Sync`: its layer shares the enclosing `HistoryManager`'s
/// `Rc`-based state, so a `ChunkHandle` (like the `Dimension` that owns it)
/// is confined to the thread that created it.
pub struct ChunkHandle {
    key: ChunkKey,
    local: (u8, u8),
    region: Rc<AnvilRegion>,
    layer: Layer<ChunkKey, RawChunk>,
    new_chunk: NewChunkParams,
    locked: Cell<bool>,
    decoded: RefCell<Option<(RawChunk, Chunk)>>,
}

impl ChunkHandle {
    pub(crate) fn new(
        key: ChunkKey,
        local: (u8, u8),
        region: Rc<AnvilRegion>,
        layer: Layer<ChunkKey, RawChunk>,
        new_chunk: NewChunkParams,
    ) -> Self {
        Self {
            key,
            local,
            region,
            layer,
            new_chunk,
            locked: Cell::new(false),
            decoded: RefCell::new(None),
        }
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    /// Acquires the handle's exclusive lock. Fails rather than blocking if
    /// already held, since within one thread a second acquisition can never
    /// be released by anyone else (a real blocking wait would deadlock).
    pub fn lock(&self) -> VoxelResult<ChunkGuard<'_>> {
        if self.locked.replace(true) {
            return Err(VoxelError::InvalidArgument(format!(
                "chunk ({}, {}) is already locked",
                self.key.x(), self.key.z()
            )));
        }
        Ok(ChunkGuard { handle: self })
    }

    /// Explicit release counterpart to [`Self::lock`], for callers that
    /// acquired a guard and want to release before it goes out of scope.
    pub fn unlock(&self, guard: ChunkGuard<'_>) {
        drop(guard);
    }

    /// Ensures the shared layer knows this key, loading from the region
    /// file (or constructing a fresh default chunk) on first access.
    fn ensure_baseline(&self, cancel: &CancellationToken) -> VoxelResult<()> {
        match self.layer.get_value(&self.key) {
            Ok(_) => Ok(()),
            Err(VoxelError::UnknownKey(_)) => {
                cancel.check()?;
                let raw = self.load_from_region_or_default(cancel)?;
                match self.layer.set_initial_value(self.key, raw) {
                    Ok(()) | Err(VoxelError::InvalidArgument(_)) => Ok(()),
                    Err(other) => Err(other),
                }
            }
            Err(other) => Err(other),
        }
    }

    fn load_from_region_or_default(&self, cancel: &CancellationToken) -> VoxelResult<RawChunk> {
        let (lx, lz) = self.local;
        match self.region.get_chunk_cancellable(lx, lz, cancel) {
            Ok(raw) => Ok(raw),
            Err(VoxelError::RegionDoesNotExist) | Err(VoxelError::ChunkDoesNotExist) => {
                let chunk = registry::construct_java(
                    self.new_chunk.data_version,
                    self.new_chunk.section_count,
                    self.new_chunk.default_block,
                    self.new_chunk.default_biome,
                )?;
                chunk.to_raw(&self.new_chunk.codec)
            }
            Err(other) => Err(other),
        }
    }

    fn decode(&self, raw: &RawChunk) -> VoxelResult<Chunk> {
        Chunk::from_raw(
            raw,
            self.new_chunk.data_version,
            self.new_chunk.section_count,
            self.new_chunk.default_block,
            self.new_chunk.default_biome,
        )
    }

    /// Like [`Self::decode`], but reuses the previous decode when `raw`
    /// matches what produced it, so a hot chunk read repeatedly between
    /// writes decodes once.
    fn decode_cached(&self, raw: &RawChunk) -> VoxelResult<Chunk> {
        if let Some((cached_raw, cached_chunk)) = self.decoded.borrow().as_ref() {
            if cached_raw == raw {
                return Ok(cached_chunk.clone());
            }
        }
        let chunk = self.decode(raw)?;
        *self.decoded.borrow_mut() = Some((raw.clone(), chunk.clone()));
        Ok(chunk)
    }

    /// Returns a deep-copied snapshot, optionally restricted to
    /// `component_ids`. Suspendable on region I/O; holds no lock across the
    /// return.
    pub fn get_chunk(&self, component_ids: Option<&[ComponentId]>) -> VoxelResult<Chunk> {
        self.get_chunk_cancellable(component_ids, &CancellationToken::new())
    }

    pub fn get_chunk_cancellable(
        &self,
        component_ids: Option<&[ComponentId]>,
        cancel: &CancellationToken,
    ) -> VoxelResult<Chunk> {
        self.ensure_baseline(cancel)?;
        let raw = self.layer.get_value(&self.key)?;
        let chunk = self.decode_cached(&raw)?;
        Ok(chunk.restrict_to(component_ids))
    }

    /// Overwrites the in-memory chunk and enqueues a revision. Requires the
    /// caller to already hold `guard` from [`Self::lock`].
    pub fn set_chunk(&self, _guard: &ChunkGuard<'_>, chunk: Chunk) -> VoxelResult<()> {
        self.ensure_baseline(&CancellationToken::new())?;
        let raw = chunk.to_raw(&self.new_chunk.codec)?;
        self.layer.set_value(self.key, raw, InitMode::Default)
    }

    /// Scoped edit: acquires the exclusive lock, hands `f` a working copy,
    /// writes the result back on success, releases the lock on every exit
    /// path.
    pub fn edit(&self, f: impl FnOnce(&mut Chunk) -> VoxelResult<()>) -> VoxelResult<()> {
        let guard = self.lock()?;
        self.ensure_baseline(&CancellationToken::new())?;
        let raw = self.layer.get_value(&self.key)?;
        let mut working = self.decode_cached(&raw)?;
        f(&mut working)?;
        self.set_chunk(&guard, working)
    }

    /// Flushes the current layer-resident chunk to the region file.
    pub fn save(&self) -> VoxelResult<()> {
        self.save_cancellable(&CancellationToken::new())
    }

    pub fn save_cancellable(&self, cancel: &CancellationToken) -> VoxelResult<()> {
        self.ensure_baseline(cancel)?;
        let raw = self.layer.get_value(&self.key)?;
        let (lx, lz) = self.local;
        self.region.set_chunk_cancellable(lx, lz, &raw, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryManager;

    fn fresh_handle(dir: &std::path::Path) -> ChunkHandle {
        let region = Rc::new(AnvilRegion::new(dir.join("r.0.0.mca")));
        let manager = HistoryManager::new();
        let layer: Layer<ChunkKey, RawChunk> = manager.new_layer();
        ChunkHandle::new(
            ChunkKey::new(0, 0),
            (0, 0),
            region,
            layer,
            NewChunkParams {
                data_version: 3700,
                section_count: 2,
                default_block: 0,
                default_biome: 0,
                codec: CodecConfig::default(),
            },
        )
    }

    #[test]
    fn get_chunk_constructs_a_default_when_region_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let handle = fresh_handle(dir.path());
        let chunk = handle.get_chunk(None).unwrap();
        assert_eq!(chunk.data_version().unwrap(), 3700);
    }

    #[test]
    fn set_chunk_requires_the_lock() {
        let dir = tempfile::tempdir().unwrap();
        let handle = fresh_handle(dir.path());
        let chunk = handle.get_chunk(None).unwrap();
        let guard = handle.lock().unwrap();
        assert!(handle.set_chunk(&guard, chunk).is_ok());
    }

    #[test]
    fn locking_twice_fails_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let handle = fresh_handle(dir.path());
        let guard = handle.lock().unwrap();
        assert!(handle.lock().is_err());
        handle.unlock(guard);
        assert!(handle.lock().is_ok());
    }

    #[test]
    fn edit_persists_mutation_and_releases_lock_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let handle = fresh_handle(dir.path());

        let result = handle.edit(|chunk| {
            chunk.blocks_mut()?.sections[0].set(0, 0, 0, 5);
            Ok(())
        });
        assert!(result.is_ok());
        assert_eq!(handle.get_chunk(None).unwrap().blocks().unwrap().sections[0].get(0, 0, 0), 5);

        let failing = handle.edit(|_| Err(VoxelError::InvalidArgument("boom".to_string())));
        assert!(failing.is_err());
        // Lock was released despite the failure.
        assert!(handle.lock().is_ok());
    }

    #[test]
    fn repeated_get_chunk_reuses_the_decode_until_a_write_lands() {
        let dir = tempfile::tempdir().unwrap();
        let handle = fresh_handle(dir.path());

        let first = handle.get_chunk(None).unwrap();
        let second = handle.get_chunk(None).unwrap();
        assert_eq!(first.blocks().unwrap().sections[0].get(0, 0, 0), 0);
        assert_eq!(second.blocks().unwrap().sections[0].get(0, 0, 0), 0);
        assert!(handle.decoded.borrow().is_some());

        handle
            .edit(|chunk| {
                chunk.blocks_mut()?.sections[0].set(0, 0, 0, 7);
                Ok(())
            })
            .unwrap();
        let third = handle.get_chunk(None).unwrap();
        assert_eq!(third.blocks().unwrap().sections[0].get(0, 0, 0), 7);
    }

    #[test]
    fn get_chunk_restricts_to_requested_components() {
        let dir = tempfile::tempdir().unwrap();
        let handle = fresh_handle(dir.path());
        let chunk = handle
            .get_chunk(Some(&[ComponentId::DataVersion]))
            .unwrap();
        assert!(chunk.data_version().is_ok());
        assert!(chunk.blocks().is_err());
    }

    #[test]
    fn save_round_trips_through_the_region_file() {
        let dir = tempfile::tempdir().unwrap();
        let handle = fresh_handle(dir.path());
        handle
            .edit(|chunk| {
                chunk.blocks_mut()?.sections[0].set(1, 1, 1, 9);
                Ok(())
            })
            .unwrap();
        handle.save().unwrap();

        let raw = handle.region.get_chunk(0, 0).unwrap();
        let restored = Chunk::from_raw(&raw, 3700, 2, 0, 0).unwrap();
        assert_eq!(restored.blocks().unwrap().sections[0].get(1, 1, 1), 9);
    }
}
