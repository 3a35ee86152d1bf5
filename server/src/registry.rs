//! Entity lifecycle and observer membership for replication fan-out
//!
//! The registry tracks which entities are live, where they are, and which
//! observers are entitled to their replication traffic. It also answers the
//! radius queries that drive proximity propagation. Positions are owned by
//! movement logic outside the core and pushed in; a radius query is a
//! snapshot at call time with no staleness guarantee beyond the last tick.

use log::info;
use shared::{EntityId, EntityRole, ObserverId, Vec3};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("entity {0} is already registered")]
    DuplicateId(EntityId),
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
}

/// One live entity: identity, role tag, external position, observer set.
#[derive(Debug, Clone)]
pub struct EntityEntry {
    pub id: EntityId,
    pub role: EntityRole,
    pub position: Vec3,
    observers: HashSet<ObserverId>,
}

impl EntityEntry {
    fn new(id: EntityId, role: EntityRole, position: Vec3) -> Self {
        Self {
            id,
            role,
            position,
            observers: HashSet::new(),
        }
    }

    pub fn observers(&self) -> &HashSet<ObserverId> {
        &self.observers
    }
}

/// Tracks live entities and their observer sets.
pub struct EntityRegistry {
    entities: HashMap<EntityId, EntityEntry>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
        }
    }

    /// Registers a new entity; fails with `DuplicateId` on collision.
    pub fn register(
        &mut self,
        id: EntityId,
        role: EntityRole,
        position: Vec3,
    ) -> Result<EntityId, RegistryError> {
        if self.entities.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        info!("Registered entity {} ({:?})", id, role);
        self.entities.insert(id, EntityEntry::new(id, role, position));
        Ok(id)
    }

    /// Removes an entity. Idempotent; unknown ids are a no-op.
    pub fn unregister(&mut self, id: EntityId) {
        if self.entities.remove(&id).is_some() {
            info!("Unregistered entity {}", id);
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn role_of(&self, id: EntityId) -> Result<EntityRole, RegistryError> {
        self.entities
            .get(&id)
            .map(|e| e.role)
            .ok_or(RegistryError::UnknownEntity(id))
    }

    pub fn position_of(&self, id: EntityId) -> Result<Vec3, RegistryError> {
        self.entities
            .get(&id)
            .map(|e| e.position)
            .ok_or(RegistryError::UnknownEntity(id))
    }

    /// Pushes an externally-owned position update into the registry.
    pub fn set_position(&mut self, id: EntityId, position: Vec3) -> Result<(), RegistryError> {
        let entry = self
            .entities
            .get_mut(&id)
            .ok_or(RegistryError::UnknownEntity(id))?;
        entry.position = position;
        Ok(())
    }

    /// Current observer set for an entity; empty is valid.
    pub fn observers_of(&self, id: EntityId) -> Result<&HashSet<ObserverId>, RegistryError> {
        self.entities
            .get(&id)
            .map(|e| &e.observers)
            .ok_or(RegistryError::UnknownEntity(id))
    }

    /// Subscribes an observer to one entity. Returns false if already present.
    pub fn add_observer(
        &mut self,
        id: EntityId,
        observer: ObserverId,
    ) -> Result<bool, RegistryError> {
        let entry = self
            .entities
            .get_mut(&id)
            .ok_or(RegistryError::UnknownEntity(id))?;
        Ok(entry.observers.insert(observer))
    }

    /// Unsubscribes an observer from one entity. Idempotent.
    pub fn remove_observer(
        &mut self,
        id: EntityId,
        observer: ObserverId,
    ) -> Result<bool, RegistryError> {
        let entry = self
            .entities
            .get_mut(&id)
            .ok_or(RegistryError::UnknownEntity(id))?;
        Ok(entry.observers.remove(&observer))
    }

    /// Subscribes an observer to every live entity (new connection).
    pub fn subscribe_all(&mut self, observer: ObserverId) {
        for entry in self.entities.values_mut() {
            entry.observers.insert(observer);
        }
    }

    /// Drops an observer from every entity (disconnect or timeout).
    pub fn unsubscribe_all(&mut self, observer: ObserverId) {
        for entry in self.entities.values_mut() {
            entry.observers.remove(&observer);
        }
    }

    /// Entities within `radius` of `position`, with their distances.
    ///
    /// Non-lazy snapshot at call time, sorted by id so callers iterate in a
    /// stable order. `role_filter` keeps only entities with the given role.
    pub fn entities_in_radius(
        &self,
        position: &Vec3,
        radius: f32,
        role_filter: Option<EntityRole>,
    ) -> Vec<(EntityId, f32)> {
        let radius_sq = radius * radius;
        let mut hits: Vec<(EntityId, f32)> = self
            .entities
            .values()
            .filter(|e| role_filter.map_or(true, |role| e.role == role))
            .filter_map(|e| {
                let dist_sq = position.distance_squared(&e.position);
                if dist_sq <= radius_sq {
                    Some((e.id, dist_sq.sqrt()))
                } else {
                    None
                }
            })
            .collect();
        hits.sort_by_key(|(id, _)| *id);
        hits
    }

    pub fn entries(&self) -> impl Iterator<Item = &EntityEntry> {
        self.entities.values()
    }

    /// Live entity ids, sorted for deterministic iteration.
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(entities: &[(EntityId, EntityRole, Vec3)]) -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        for (id, role, pos) in entities {
            registry.register(*id, *role, *pos).unwrap();
        }
        registry
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry_with(&[(1, EntityRole::Player, Vec3::new(1.0, 0.0, 0.0))]);

        assert!(registry.contains(1));
        assert_eq!(registry.role_of(1), Ok(EntityRole::Player));
        assert_eq!(registry.position_of(1), Ok(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = registry_with(&[(1, EntityRole::Player, Vec3::ZERO)]);

        let result = registry.register(1, EntityRole::Enemy, Vec3::ZERO);
        assert_eq!(result, Err(RegistryError::DuplicateId(1)));
        // Original registration untouched.
        assert_eq!(registry.role_of(1), Ok(EntityRole::Player));
    }

    #[test]
    fn test_unregister_idempotent() {
        let mut registry = registry_with(&[(1, EntityRole::Prop, Vec3::ZERO)]);

        registry.unregister(1);
        assert!(!registry.contains(1));
        // Second removal is a silent no-op.
        registry.unregister(1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_entity_lookup_fails() {
        let registry = EntityRegistry::new();
        assert_eq!(registry.position_of(99), Err(RegistryError::UnknownEntity(99)));
        assert_eq!(registry.role_of(99), Err(RegistryError::UnknownEntity(99)));
    }

    #[test]
    fn test_observer_membership() {
        let mut registry = registry_with(&[(1, EntityRole::Enemy, Vec3::ZERO)]);

        assert!(registry.observers_of(1).unwrap().is_empty());
        assert_eq!(registry.add_observer(1, 10), Ok(true));
        assert_eq!(registry.add_observer(1, 10), Ok(false));
        assert!(registry.observers_of(1).unwrap().contains(&10));

        assert_eq!(registry.remove_observer(1, 10), Ok(true));
        assert_eq!(registry.remove_observer(1, 10), Ok(false));
    }

    #[test]
    fn test_subscribe_and_unsubscribe_all() {
        let mut registry = registry_with(&[
            (1, EntityRole::Player, Vec3::ZERO),
            (2, EntityRole::Enemy, Vec3::ZERO),
        ]);

        registry.subscribe_all(7);
        assert!(registry.observers_of(1).unwrap().contains(&7));
        assert!(registry.observers_of(2).unwrap().contains(&7));

        registry.unsubscribe_all(7);
        assert!(registry.observers_of(1).unwrap().is_empty());
        assert!(registry.observers_of(2).unwrap().is_empty());
    }

    #[test]
    fn test_entities_in_radius() {
        let registry = registry_with(&[
            (1, EntityRole::Player, Vec3::new(0.0, 0.0, 0.0)),
            (2, EntityRole::Player, Vec3::new(10.0, 0.0, 0.0)),
            (3, EntityRole::Player, Vec3::new(15.0, 0.0, 0.0)),
        ]);

        let hits = registry.entities_in_radius(&Vec3::ZERO, 10.0, None);
        let ids: Vec<EntityId> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
        // Entity exactly at the rim is included.
        assert_eq!(hits[1].1, 10.0);
    }

    #[test]
    fn test_entities_in_radius_role_filter() {
        let registry = registry_with(&[
            (1, EntityRole::Player, Vec3::new(1.0, 0.0, 0.0)),
            (2, EntityRole::Enemy, Vec3::new(2.0, 0.0, 0.0)),
            (3, EntityRole::Prop, Vec3::new(3.0, 0.0, 0.0)),
        ]);

        let hits = registry.entities_in_radius(&Vec3::ZERO, 10.0, Some(EntityRole::Player));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 1);
    }

    #[test]
    fn test_set_position() {
        let mut registry = registry_with(&[(1, EntityRole::Enemy, Vec3::ZERO)]);

        registry.set_position(1, Vec3::new(5.0, 0.0, 5.0)).unwrap();
        assert_eq!(registry.position_of(1), Ok(Vec3::new(5.0, 0.0, 5.0)));

        assert_eq!(
            registry.set_position(9, Vec3::ZERO),
            Err(RegistryError::UnknownEntity(9))
        );
    }
}
