//! Keyed entity storage.

use shared::EntityId;
use std::collections::BTreeMap;

/// Anything stored in an [`EntityRegistry`].
pub trait Identified {
    fn id(&self) -> EntityId;
}

/// Owns entities keyed by their identifier.
///
/// Iteration is by ascending id. [`EntityRegistry::ids`] returns a snapshot
/// so callers can remove or insert members while walking it.
#[derive(Debug)]
pub struct EntityRegistry<T: Identified> {
    entities: BTreeMap<EntityId, T>,
}

impl<T: Identified> Default for EntityRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Identified> EntityRegistry<T> {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }

    /// Inserts `entity` unless its id is already present.
    /// Returns whether it was inserted; a duplicate is left untouched.
    pub fn add(&mut self, entity: T) -> bool {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return false;
        }
        self.entities.insert(id, entity);
        true
    }

    pub fn remove(&mut self, id: EntityId) -> Option<T> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Snapshot of the current member ids.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entities.values_mut()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
