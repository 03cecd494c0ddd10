//! Undo/redo history manager: bins of `(layer, key)` touches over a cursor,
//! replayed against type-erased layer handles.
//!
//! Shaped like a registry the rest of the crate reaches through by opaque
//! key rather than holding typed references directly. Layers are stored as
//! `Rc<dyn LayerHandle>` keyed by a generated index, manipulated only via
//! `(layer_index, key_id)` pairs, so the manager never needs to know a
//! layer's value type.

pub mod resource;

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use indexmap::IndexSet;

pub use resource::{InitMode, Layer, ResourceView};

use crate::error::{VoxelError, VoxelResult};

/// The vtable each [`Layer`] exposes to the manager without revealing its
/// value type `V`. Driven purely by `(layer_index, key_id)` pairs recorded
/// in [`Bin::touched`].
pub(crate) trait LayerHandle {
    fn undo_key(&self, key_id: &str);
    fn redo_key(&self, key_id: &str);
    fn mark_saved_all(&self);
    fn reset(&self);
}

/// Whether a write falls before any bin exists, opens a new revision in the
/// currently-open bin, or folds into a revision that bin already recorded
/// for this key.
pub(crate) enum TouchKind {
    PreBin,
    FirstInBin,
    RepeatInBin,
}

/// A transactional group of history revisions: the set of
/// `(layer_index, key_id)` pairs touched between two `create_undo_bin`
/// calls, in first-touch order.
#[derive(Default)]
struct Bin {
    touched: IndexSet<(usize, String)>,
}

pub(crate) struct HistoryCore {
    bins: Vec<Bin>,
    cursor: usize,
    layers: Vec<Rc<dyn LayerHandle>>,
}

impl HistoryCore {
    /// Records that `layer_index` wrote to `key_id`, opening or reusing a
    /// bin, and reports which revision-recording path the caller should
    /// take.
    pub(crate) fn touch(&mut self, layer_index: usize, key_id: &str) -> TouchKind {
        if self.bins.is_empty() {
            return TouchKind::PreBin;
        }
        if self.cursor < self.bins.len() {
            // Cursor isn't at the newest bin: the pending future is no
            // longer reachable, so fold it away and open a fresh bin here.
            self.bins.truncate(self.cursor);
            self.bins.push(Bin::default());
            self.cursor = self.bins.len();
        }
        let bin = self.bins.last_mut().expect("just ensured at least one bin");
        let key = (layer_index, key_id.to_string());
        if bin.touched.contains(&key) {
            TouchKind::RepeatInBin
        } else {
            bin.touched.insert(key);
            TouchKind::FirstInBin
        }
    }
}

/// Multi-layer, multi-resource undo/redo coordinator.
///
/// Not thread-safe with itself; callers serialize access externally, and in
/// this crate that serialization is provided by `ChunkHandle`.
pub struct HistoryManager {
    core: Rc<RefCell<HistoryCore>>,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryManager {
    pub fn new() -> Self {
        Self {
            core: Rc::new(RefCell::new(HistoryCore {
                bins: Vec::new(),
                cursor: 0,
                layers: Vec::new(),
            })),
        }
    }

    /// Registers and returns a fresh, empty layer over key type `K` and
    /// value type `V`.
    pub fn new_layer<K, V>(&self) -> Layer<K, V>
    where
        K: Clone + Display,
        V: Clone + PartialEq + Default,
    {
        let mut core = self.core.borrow_mut();
        let index = core.layers.len();
        let (layer, handle) = Layer::new(index, Rc::downgrade(&self.core));
        core.layers.push(handle);
        layer
    }

    /// Truncates any bins after the cursor, opens a fresh bin, and advances
    /// the cursor onto it.
    pub fn create_undo_bin(&self) {
        let mut core = self.core.borrow_mut();
        core.bins.truncate(core.cursor);
        core.bins.push(Bin::default());
        core.cursor = core.bins.len();
    }

    /// Reverts the bin at the cursor and moves the cursor back one step.
    pub fn undo(&self) -> VoxelResult<()> {
        let mut core = self.core.borrow_mut();
        if core.cursor == 0 {
            return Err(VoxelError::NothingToUndo);
        }
        let bin_index = core.cursor - 1;
        // Touches replay in reverse insertion order within the bin.
        let touched: Vec<(usize, String)> = core.bins[bin_index].touched.iter().cloned().rev().collect();
        for (layer_index, key_id) in touched {
            core.layers[layer_index].undo_key(&key_id);
        }
        core.cursor = bin_index;
        Ok(())
    }

    /// Replays the bin now at the cursor and advances past it.
    pub fn redo(&self) -> VoxelResult<()> {
        let mut core = self.core.borrow_mut();
        if core.cursor >= core.bins.len() {
            return Err(VoxelError::NothingToRedo);
        }
        let bin_index = core.cursor;
        let touched: Vec<(usize, String)> = core.bins[bin_index].touched.iter().cloned().collect();
        for (layer_index, key_id) in touched {
            core.layers[layer_index].redo_key(&key_id);
        }
        core.cursor = bin_index + 1;
        Ok(())
    }

    pub fn get_undo_count(&self) -> usize {
        self.core.borrow().cursor
    }

    pub fn get_redo_count(&self) -> usize {
        let core = self.core.borrow();
        core.bins.len() - core.cursor
    }

    /// Collapses every resource's chain so its current value becomes the
    /// new save-point baseline. Bins are left intact for navigation.
    pub fn mark_saved(&self) {
        let core = self.core.borrow();
        for layer in &core.layers {
            layer.mark_saved_all();
        }
    }

    /// Clears every layer's resources, drops all bins, and resets the
    /// cursor to zero.
    pub fn reset(&self) {
        let mut core = self.core.borrow_mut();
        core.bins.clear();
        core.cursor = 0;
        for layer in &core.layers {
            layer.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_redo_and_save_tracking_across_two_layers() {
        let manager = HistoryManager::new();
        let layer_a: Layer<String, String> = manager.new_layer();
        let layer_b: Layer<String, String> = manager.new_layer();

        layer_a.set_initial_value("key_1".into(), "a0".into()).unwrap();
        layer_a.set_initial_value("key_2".into(), "a1".into()).unwrap();
        layer_b.set_initial_value("key_1".into(), "b0".into()).unwrap();
        layer_b.set_initial_value("key_2".into(), "b1".into()).unwrap();

        manager.create_undo_bin();
        layer_a
            .set_value("key_2".into(), "a1-new".into(), InitMode::Default)
            .unwrap();
        layer_b
            .set_value("key_2".into(), "b1-new".into(), InitMode::Default)
            .unwrap();
        layer_a.set_initial_value("key_3".into(), "a2".into()).unwrap();

        assert!(layer_a.get_resource(&"key_2".to_string()).unwrap().has_changed);
        assert!(!layer_a.get_resource(&"key_3".to_string()).unwrap().has_changed);

        manager.undo().unwrap();
        assert_eq!(layer_a.get_value(&"key_2".to_string()).unwrap(), "a1");
        assert_eq!(layer_b.get_value(&"key_2".to_string()).unwrap(), "b1");

        manager.redo().unwrap();
        assert_eq!(layer_a.get_value(&"key_2".to_string()).unwrap(), "a1-new");
        assert_eq!(layer_b.get_value(&"key_2".to_string()).unwrap(), "b1-new");

        manager.mark_saved();
        for (_, view) in layer_a.get_resources() {
            assert!(!view.has_changed);
        }
        for (_, view) in layer_b.get_resources() {
            assert!(!view.has_changed);
        }

        manager.undo().unwrap();
        assert!(layer_a.get_resource(&"key_2".to_string()).unwrap().has_changed);
        assert!(!layer_a.get_resource(&"key_3".to_string()).unwrap().has_changed);
        assert!(layer_b.get_resource(&"key_2".to_string()).unwrap().has_changed);
    }

    #[test]
    fn writing_after_an_undo_discards_the_stale_redo_chain() {
        let manager = HistoryManager::new();
        let layer: Layer<String, String> = manager.new_layer();

        layer.set_initial_value("key".into(), "val0".into()).unwrap();
        manager.create_undo_bin();
        layer
            .set_value("key".into(), "val1".into(), InitMode::Default)
            .unwrap();
        manager.create_undo_bin();
        layer
            .set_value("key".into(), "val2".into(), InitMode::Default)
            .unwrap();

        manager.undo().unwrap();
        assert_eq!(layer.get_value(&"key".to_string()).unwrap(), "val1");

        layer
            .set_value("key".into(), "val3".into(), InitMode::Default)
            .unwrap();
        assert_eq!(layer.get_value(&"key".to_string()).unwrap(), "val3");
        assert_eq!(manager.get_redo_count(), 0);

        manager.undo().unwrap();
        assert_eq!(layer.get_value(&"key".to_string()).unwrap(), "val1");
        manager.undo().unwrap();
        assert_eq!(layer.get_value(&"key".to_string()).unwrap(), "val0");
    }

    #[test]
    fn undo_fails_when_nothing_to_undo() {
        let manager = HistoryManager::new();
        assert!(matches!(manager.undo(), Err(VoxelError::NothingToUndo)));
    }

    #[test]
    fn redo_fails_when_nothing_to_redo() {
        let manager = HistoryManager::new();
        manager.create_undo_bin();
        assert!(matches!(manager.redo(), Err(VoxelError::NothingToRedo)));
    }

    #[test]
    fn reset_clears_history_and_prevents_ghost_revisions() {
        let manager = HistoryManager::new();
        let layer: Layer<String, i32> = manager.new_layer();

        layer.set_initial_value("key".into(), 1).unwrap();
        manager.create_undo_bin();
        layer.set_value("key".into(), 2, InitMode::Default).unwrap();

        manager.reset();
        assert_eq!(manager.get_undo_count(), 0);
        assert_eq!(manager.get_redo_count(), 0);

        layer.set_initial_value("key".into(), 42).unwrap();
        assert_eq!(layer.get_value(&"key".to_string()).unwrap(), 42);
        manager.create_undo_bin();
        layer.set_value("key".into(), 43, InitMode::Default).unwrap();
        manager.undo().unwrap();
        assert_eq!(layer.get_value(&"key".to_string()).unwrap(), 42);
    }

    #[test]
    fn batch_atomicity_leaves_layer_untouched_on_failure() {
        let manager = HistoryManager::new();
        let layer: Layer<String, i32> = manager.new_layer();
        layer.set_initial_value("a".into(), 10).unwrap();
        manager.create_undo_bin();

        let result = layer.set_values(
            vec![("a".into(), 11), ("missing".into(), 99)],
            InitMode::Default,
        );
        assert!(result.is_err());
        assert_eq!(layer.get_value(&"a".to_string()).unwrap(), 10);
        assert_eq!(manager.get_undo_count(), 1);
    }
}
