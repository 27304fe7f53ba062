//! Storage maps keyed by normalized entity id.
//!
//! A [`StorageMap`] keeps entities in insertion order: every new key gets the
//! next sequence number, replacing a value keeps its slot, and iteration walks
//! the sequence. `get_all` relies on this to replay insertion order rather
//! than key order.
//!
//! A session holds one map per entity model. The maps have different value
//! types, so the session stores them behind the [`ModelStore`] trait object
//! and downcasts on access.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use crate::entity::{Entity, EntityKey, EntityModel};
use crate::error::{DatabaseError, DatabaseResult};

/// Insertion-ordered map from entity key to entity.
#[derive(Debug, Clone)]
pub struct StorageMap<T> {
    /// Key to sequence number.
    index: HashMap<EntityKey, u64>,
    /// Sequence number to entry, ordered by insertion.
    entries: BTreeMap<u64, (EntityKey, T)>,
    next_seq: u64,
}

impl<T> StorageMap<T> {
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        let seq = self.index.get(key)?;
        self.entries.get(seq).map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        let seq = self.index.get(key)?;
        self.entries.get_mut(seq).map(|(_, value)| value)
    }

    /// Insert or replace a value.
    ///
    /// A replaced value keeps its original position. Returns the previous
    /// value, if any.
    pub fn insert(&mut self, key: EntityKey, value: T) -> Option<T> {
        if let Some(seq) = self.index.get(key.as_str()) {
            if let Some(entry) = self.entries.get_mut(seq) {
                return Some(std::mem::replace(&mut entry.1, value));
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(key.clone(), seq);
        self.entries.insert(seq, (key, value));
        None
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        let seq = self.index.remove(key)?;
        self.entries.remove(&seq).map(|(_, value)| value)
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.clear();
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &T)> + '_ {
        self.entries.values().map(|(key, value)| (key, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> + '_ {
        self.entries.values().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.values().map(|(_, value)| value)
    }
}

impl<T> Default for StorageMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(EntityKey, T)> for StorageMap<T> {
    fn from_iter<I: IntoIterator<Item = (EntityKey, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<T> Extend<(EntityKey, T)> for StorageMap<T> {
    fn extend<I: IntoIterator<Item = (EntityKey, T)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// Type-erased storage for one entity model.
pub(crate) trait ModelStore: Any + Send + Sync {
    /// Deep copy of the store and every entity in it.
    fn clone_store(&self) -> Box<dyn ModelStore>;

    fn len(&self) -> usize;

    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Entity> ModelStore for StorageMap<T> {
    fn clone_store(&self) -> Box<dyn ModelStore> {
        Box::new(self.clone())
    }

    fn len(&self) -> usize {
        StorageMap::len(self)
    }

    fn clear(&mut self) {
        StorageMap::clear(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Clone for Box<dyn ModelStore> {
    fn clone(&self) -> Self {
        self.clone_store()
    }
}

/// Every model's storage map, keyed by model.
pub(crate) type Storage = HashMap<EntityModel, Box<dyn ModelStore>>;

/// Typed access to a model's map, creating it empty on first reference.
pub(crate) fn store_mut<T: Entity>(
    storage: &mut Storage,
    model: EntityModel,
) -> DatabaseResult<&mut StorageMap<T>> {
    if !model.is_type::<T>() {
        return Err(DatabaseError::model_mismatch(
            model.name(),
            EntityModel::of::<T>().name(),
        ));
    }

    storage
        .entry(model)
        .or_insert_with(|| Box::new(StorageMap::<T>::new()))
        .as_any_mut()
        .downcast_mut::<StorageMap<T>>()
        .ok_or_else(|| DatabaseError::model_mismatch(model.name(), EntityModel::of::<T>().name()))
}

/// Total number of entities across all models.
pub(crate) fn entity_count(storage: &Storage) -> usize {
    storage.values().map(|store| store.len()).sum()
}
