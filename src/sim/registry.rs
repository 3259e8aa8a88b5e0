//! Thread-safe entity store
//!
//! The tick driver mutates entities in place under the write lock; other
//! threads (input handling, rendering) add, remove and snapshot concurrently.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::entity::{Entity, EntityId, EntityKind};

/// Owns every live entity
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: RwLock<Vec<Entity>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic in another holder leaves the Vec itself intact, so keep going.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Entity>> {
        self.entities.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Entity>> {
        self.entities.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entity (IDs are unique by construction, so no duplicate check)
    pub fn add(&self, entity: Entity) {
        self.write().push(entity);
    }

    /// Append only while fewer than `limit` entities exist; count and insert are atomic
    pub fn add_bounded(&self, entity: Entity, limit: usize) -> bool {
        let mut entities = self.write();
        if entities.len() >= limit {
            return false;
        }
        entities.push(entity);
        true
    }

    /// Remove by ID; `false` if no such entity
    pub fn remove(&self, id: EntityId) -> bool {
        let mut entities = self.write();
        match entities.iter().position(|e| e.id() == id) {
            Some(index) => {
                entities.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: EntityId) -> Option<Entity> {
        self.read().iter().find(|e| e.id() == id).cloned()
    }

    /// Independent snapshot of every entity, in insertion order
    pub fn all(&self) -> Vec<Entity> {
        self.read().clone()
    }

    pub fn by_kind(&self, kind: EntityKind) -> Vec<Entity> {
        self.read()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn count_by_kind(&self, kind: EntityKind) -> usize {
        self.read().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    /// Run `f` with exclusive access to every entity
    pub fn update<T>(&self, f: impl FnOnce(&mut [Entity]) -> T) -> T {
        f(self.write().as_mut_slice())
    }

    /// Run `f` on one entity; `false` if it does not exist
    pub fn update_entity(&self, id: EntityId, f: impl FnOnce(&mut Entity)) -> bool {
        let mut entities = self.write();
        match entities.iter_mut().find(|e| e.id() == id) {
            Some(entity) => {
                f(entity);
                true
            }
            None => false,
        }
    }
}
