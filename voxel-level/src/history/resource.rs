//! Resource layer: a single-value-type keyed store whose writes are grouped
//! into undo bins by the enclosing [`super::HistoryManager`].
//!
//! Shaped like a `FileLocksManager`-style "shared cell behind a handle",
//! generalized from a path-keyed lock registry to a string-keyed revision
//! store. `indexmap` (already a workspace dependency for chunk palettes)
//! keeps keys in insertion order, which undo/redo replay depends on and a
//! plain `HashMap` cannot provide.

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::{HistoryCore, LayerHandle, TouchKind};
use crate::error::{VoxelError, VoxelResult};

/// How `set_value`/`set_values` should behave when the key has never been seen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitMode {
    /// The key must already exist; otherwise fail.
    Default,
    /// Same precondition as `Default`, kept as a distinct name for callers
    /// that want to read intent off the call site.
    Error,
    /// Install a default-constructed `V` as the baseline before applying.
    Empty,
    /// Treat the supplied value as its own baseline.
    Value,
}

/// A read-only snapshot of a [`Resource`], returned by `Layer::get_resource`.
#[derive(Clone, Debug)]
pub struct ResourceView<V> {
    pub initial: Option<V>,
    pub current: Option<V>,
    pub has_changed: bool,
}

/// The per-key versioned record inside a [`Layer`].
///
/// `segments` holds one entry per bin that has touched this key, in bin
/// order; `redo_segments` holds entries popped by `undo_key`, available to
/// `redo_key`. `initial` is the value from the key's very first write and
/// never changes after that; `save_value`, once set by `mark_saved`, is the
/// baseline `has_changed` compares against instead.
#[derive(Clone, Debug, Default)]
struct Resource<V> {
    initial: Option<V>,
    save_value: Option<V>,
    segments: Vec<V>,
    redo_segments: Vec<V>,
}

impl<V: Clone + PartialEq> Resource<V> {
    fn current(&self) -> Option<&V> {
        self.segments.last().or(self.initial.as_ref())
    }

    fn has_changed(&self) -> bool {
        let baseline = self.save_value.as_ref().or(self.initial.as_ref());
        self.current() != baseline
    }

    fn record_pre_bin(&mut self, value: V) {
        self.initial = Some(value);
    }

    /// First touch of this key within the currently open bin: pushes a new
    /// revision and drops any stale redo entries a prior undo left behind.
    fn record_first_in_bin(&mut self, value: V) {
        self.redo_segments.clear();
        self.segments.push(value);
    }

    /// A later write to a key already touched in the still-open bin: folds
    /// into that bin's single revision rather than creating another one.
    fn record_repeat_in_bin(&mut self, value: V) {
        match self.segments.last_mut() {
            Some(last) => *last = value,
            None => self.segments.push(value),
        }
    }

    /// Used by `set_initial_value` when a bin is already open: establishes
    /// the baseline *and* records a revision, since once a bin is open every
    /// write, including the very first one for a key, becomes part of it.
    fn record_initial_in_bin(&mut self, value: V) {
        self.initial = Some(value.clone());
        self.redo_segments.clear();
        self.segments.push(value);
    }

    fn undo(&mut self) {
        if let Some(v) = self.segments.pop() {
            self.redo_segments.push(v);
        }
    }

    fn redo(&mut self) {
        if let Some(v) = self.redo_segments.pop() {
            self.segments.push(v);
        }
    }

    fn mark_saved(&mut self) {
        self.save_value = self.current().cloned();
    }

    fn view(&self) -> ResourceView<V> {
        ResourceView {
            initial: self.initial.clone(),
            current: self.current().cloned(),
            has_changed: self.has_changed(),
        }
    }
}

struct LayerInner<K, V> {
    index: usize,
    core: Weak<RefCell<HistoryCore>>,
    resources: RefCell<IndexMap<String, (K, Resource<V>)>>,
}

impl<K, V> LayerHandle for LayerInner<K, V>
where
    V: Clone + PartialEq,
{
    fn undo_key(&self, key_id: &str) {
        if let Some((_, resource)) = self.resources.borrow_mut().get_mut(key_id) {
            resource.undo();
        }
    }

    fn redo_key(&self, key_id: &str) {
        if let Some((_, resource)) = self.resources.borrow_mut().get_mut(key_id) {
            resource.redo();
        }
    }

    fn mark_saved_all(&self) {
        for (_, resource) in self.resources.borrow_mut().values_mut() {
            resource.mark_saved();
        }
    }

    fn reset(&self) {
        self.resources.borrow_mut().clear();
    }
}

/// A mapping from key-type `K` to `Resource<V>`, handed out by
/// [`super::HistoryManager::new_layer`]. Cheaply cloneable: every clone
/// shares the same underlying store and reports to the same manager.
pub struct Layer<K, V> {
    inner: Rc<LayerInner<K, V>>,
}

impl<K, V> Clone for Layer<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> Layer<K, V>
where
    K: Clone + Display,
    V: Clone + PartialEq + Default,
{
    pub(super) fn new(index: usize, core: Weak<RefCell<HistoryCore>>) -> (Self, Rc<dyn LayerHandle>) {
        let inner = Rc::new(LayerInner {
            index,
            core,
            resources: RefCell::new(IndexMap::new()),
        });
        let handle: Rc<dyn LayerHandle> = inner.clone();
        (Self { inner }, handle)
    }

    fn touch(&self, key_id: &str) -> TouchKind {
        match self.inner.core.upgrade() {
            Some(core) => core.borrow_mut().touch(self.inner.index, key_id),
            None => TouchKind::PreBin,
        }
    }

    /// Installs `value` as `key`'s baseline. Fails if `key` is already known.
    pub fn set_initial_value(&self, key: K, value: V) -> VoxelResult<()> {
        let key_id = key.to_string();
        if self.inner.resources.borrow().contains_key(&key_id) {
            return Err(VoxelError::InvalidArgument(format!(
                "key '{key_id}' is already known to this layer"
            )));
        }
        self.inner
            .resources
            .borrow_mut()
            .insert(key_id.clone(), (key, Resource::default()));

        let touch = self.touch(&key_id);
        let mut resources = self.inner.resources.borrow_mut();
        let (_, resource) = resources.get_mut(&key_id).expect("just inserted");
        match touch {
            TouchKind::PreBin => resource.record_pre_bin(value),
            TouchKind::FirstInBin | TouchKind::RepeatInBin => resource.record_initial_in_bin(value),
        }
        Ok(())
    }

    /// Writes `value` for `key` under `mode`'s initialisation rule.
    pub fn set_value(&self, key: K, value: V, mode: InitMode) -> VoxelResult<()> {
        let key_id = key.to_string();
        let exists = self.inner.resources.borrow().contains_key(&key_id);
        if !exists {
            match mode {
                InitMode::Default | InitMode::Error => {
                    return Err(VoxelError::UnknownKey(key_id));
                }
                InitMode::Empty => {
                    let mut resource = Resource::default();
                    resource.initial = Some(V::default());
                    self.inner
                        .resources
                        .borrow_mut()
                        .insert(key_id.clone(), (key, resource));
                }
                InitMode::Value => {
                    let mut resource = Resource::default();
                    resource.initial = Some(value.clone());
                    self.inner
                        .resources
                        .borrow_mut()
                        .insert(key_id.clone(), (key, resource));
                }
            }
        }

        let touch = self.touch(&key_id);
        let mut resources = self.inner.resources.borrow_mut();
        let (_, resource) = resources.get_mut(&key_id).expect("present or just inserted");
        match touch {
            TouchKind::PreBin => resource.record_pre_bin(value),
            TouchKind::FirstInBin => resource.record_first_in_bin(value),
            TouchKind::RepeatInBin => resource.record_repeat_in_bin(value),
        }
        Ok(())
    }

    /// Batch write with an all-or-nothing precondition under
    /// `Default`/`Error`: if any key is missing, nothing in the batch is
    /// applied.
    pub fn set_values(&self, batch: Vec<(K, V)>, mode: InitMode) -> VoxelResult<()> {
        if matches!(mode, InitMode::Default | InitMode::Error) {
            let resources = self.inner.resources.borrow();
            for (key, _) in &batch {
                let key_id = key.to_string();
                if !resources.contains_key(&key_id) {
                    return Err(VoxelError::UnknownKey(key_id));
                }
            }
        }
        for (key, value) in batch {
            self.set_value(key, value, mode)?;
        }
        Ok(())
    }

    pub fn get_value(&self, key: &K) -> VoxelResult<V> {
        let key_id = key.to_string();
        let resources = self.inner.resources.borrow();
        let (_, resource) = resources
            .get(&key_id)
            .ok_or_else(|| VoxelError::UnknownKey(key_id.clone()))?;
        resource
            .current()
            .cloned()
            .ok_or(VoxelError::UnknownKey(key_id))
    }

    pub fn get_resource(&self, key: &K) -> VoxelResult<ResourceView<V>> {
        let key_id = key.to_string();
        let resources = self.inner.resources.borrow();
        let (_, resource) = resources
            .get(&key_id)
            .ok_or(VoxelError::UnknownKey(key_id))?;
        Ok(resource.view())
    }

    pub fn get_resources(&self) -> Vec<(K, ResourceView<V>)> {
        self.inner
            .resources
            .borrow()
            .values()
            .map(|(key, resource)| (key.clone(), resource.view()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryManager;

    #[test]
    fn set_initial_value_rejects_duplicate_key() {
        let manager = HistoryManager::new();
        let layer: Layer<String, String> = manager.new_layer();
        layer.set_initial_value("a".to_string(), "x".to_string()).unwrap();
        assert!(layer.set_initial_value("a".to_string(), "y".to_string()).is_err());
    }

    #[test]
    fn init_mode_variants_govern_writes_to_unknown_keys() {
        let manager = HistoryManager::new();
        let layer: Layer<String, String> = manager.new_layer();
        manager.create_undo_bin();

        assert!(matches!(
            layer.set_value("missing".to_string(), "v".to_string(), InitMode::Default),
            Err(VoxelError::UnknownKey(_))
        ));

        layer
            .set_value("empty_key".to_string(), "hello".to_string(), InitMode::Empty)
            .unwrap();
        assert_eq!(layer.get_value(&"empty_key".to_string()).unwrap(), "hello");
        manager.undo().unwrap();
        assert_eq!(layer.get_value(&"empty_key".to_string()).unwrap(), "");

        manager.redo().unwrap();
        layer
            .set_value("value_key".to_string(), "first".to_string(), InitMode::Value)
            .unwrap();
        let view = layer.get_resource(&"value_key".to_string()).unwrap();
        assert_eq!(view.initial, Some("first".to_string()));
        assert!(!view.has_changed);
    }

    #[test]
    fn batch_set_values_is_all_or_nothing_under_default_mode() {
        let manager = HistoryManager::new();
        let layer: Layer<String, i32> = manager.new_layer();
        layer.set_initial_value("a".to_string(), 1).unwrap();

        let before = layer.get_resources().len();
        let result = layer.set_values(
            vec![("a".to_string(), 2), ("b".to_string(), 3)],
            InitMode::Default,
        );
        assert!(result.is_err());
        assert_eq!(layer.get_resources().len(), before);
        assert_eq!(layer.get_value(&"a".to_string()).unwrap(), 1);
    }
}
