//! Change tracking between replication passes.
//!
//! An entity is either partially dirty (only fast-changing state such as
//! position or health changed, an incremental patch suffices) or fully dirty
//! (it needs a complete snapshot). Before payloads are built, entities in
//! both sets are dropped from the partial set so the two never overlap.

use shared::EntityId;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct DirtyTracker {
    partial: BTreeSet<EntityId>,
    full: BTreeSet<EntityId>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_partial(&mut self, id: EntityId) {
        self.partial.insert(id);
    }

    pub fn mark_full(&mut self, id: EntityId) {
        self.full.insert(id);
    }

    pub fn is_partial(&self, id: EntityId) -> bool {
        self.partial.contains(&id)
    }

    pub fn is_full(&self, id: EntityId) -> bool {
        self.full.contains(&id)
    }

    /// Snapshot of the partially dirty ids.
    pub fn partial_ids(&self) -> Vec<EntityId> {
        self.partial.iter().copied().collect()
    }

    pub fn full_ids(&self) -> Vec<EntityId> {
        self.full.iter().copied().collect()
    }

    pub fn drop_partial(&mut self, id: EntityId) {
        self.partial.remove(&id);
    }

    /// Drops `id` from both sets, used when an entity leaves the world.
    pub fn forget(&mut self, id: EntityId) {
        self.partial.remove(&id);
        self.full.remove(&id);
    }

    pub fn is_disjoint(&self) -> bool {
        self.partial.is_disjoint(&self.full)
    }

    pub fn is_empty(&self) -> bool {
        self.partial.is_empty() && self.full.is_empty()
    }

    pub fn clear(&mut self) {
        self.partial.clear();
        self.full.clear();
    }
}
