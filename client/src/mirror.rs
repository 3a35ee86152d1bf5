//! Read-only mirrors of server-owned entity state
//!
//! The mirror store is the client side of the replication boundary: it holds
//! the last applied snapshot per (entity, field) and nothing else. Applying
//! a snapshot never fails; stale deliveries are filtered by the per-value
//! sequence number, so the transport is free to duplicate or reorder within
//! a field without corrupting the mirror.

use shared::{EntityId, EntityRole, FieldId, Snapshot, Vec3, WireValue};
use std::collections::HashMap;

/// Last applied snapshot for one replicated field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorField {
    pub value: WireValue,
    pub sequence: u32,
}

/// Client-side view of one entity.
#[derive(Debug, Clone)]
pub struct MirrorEntity {
    /// Filled in by the spawn notice; snapshots can arrive first.
    pub role: Option<EntityRole>,
    pub position: Vec3,
    fields: HashMap<FieldId, MirrorField>,
}

impl MirrorEntity {
    fn new() -> Self {
        Self {
            role: None,
            position: Vec3::ZERO,
            fields: HashMap::new(),
        }
    }

    pub fn field(&self, field: FieldId) -> Option<&MirrorField> {
        self.fields.get(&field)
    }
}

/// All mirrored entities known to this observer.
#[derive(Debug, Default)]
pub struct MirrorStore {
    entities: HashMap<EntityId, MirrorEntity>,
}

impl MirrorStore {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
        }
    }

    /// Records a spawn notice. An entry created earlier by an out-of-order
    /// snapshot is kept and just gains its role and position.
    pub fn spawn(&mut self, entity: EntityId, role: EntityRole, position: Vec3) {
        let entry = self.entities.entry(entity).or_insert_with(MirrorEntity::new);
        entry.role = Some(role);
        entry.position = position;
    }

    /// Drops an entity and all its mirrored fields. Idempotent.
    pub fn despawn(&mut self, entity: EntityId) {
        self.entities.remove(&entity);
    }

    /// Applies a snapshot, last-snapshot-wins.
    ///
    /// Returns true if the snapshot was applied, false if it was dropped as
    /// stale (sequence not newer than the last applied one). Re-applying the
    /// same snapshot is a no-op, which makes at-least-once delivery safe.
    pub fn apply(&mut self, entity: EntityId, snapshot: Snapshot) -> bool {
        let entry = self.entities.entry(entity).or_insert_with(MirrorEntity::new);
        match entry.fields.get(&snapshot.field) {
            Some(existing) if existing.sequence >= snapshot.sequence => false,
            _ => {
                entry.fields.insert(
                    snapshot.field,
                    MirrorField {
                        value: snapshot.value,
                        sequence: snapshot.sequence,
                    },
                );
                true
            }
        }
    }

    pub fn entity(&self, entity: EntityId) -> Option<&MirrorEntity> {
        self.entities.get(&entity)
    }

    pub fn value_of(&self, entity: EntityId, field: FieldId) -> Option<WireValue> {
        self.entities
            .get(&entity)
            .and_then(|e| e.field(field))
            .map(|f| f.value)
    }

    /// Convenience accessor for scalar fields like health and stress.
    pub fn scalar_of(&self, entity: EntityId, field: FieldId) -> Option<f32> {
        match self.value_of(entity, field) {
            Some(WireValue::Scalar(v)) => Some(v),
            _ => None,
        }
    }

    pub fn entities(&self) -> impl Iterator<Item = (&EntityId, &MirrorEntity)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
