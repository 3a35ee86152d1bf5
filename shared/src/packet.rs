//! Packet types for server-to-observer replication traffic.

use crate::value::Snapshot;
use crate::{EntityId, EntityRole, ObserverId, Vec3};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a timed ability.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Preparing,
    Active,
    Cooldown,
}

/// Closed set of ability variants; behavior is selected by tag, not subclass.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbilityKind {
    Charge,
    Scream,
}

/// Notification that an ability entered a new phase.
///
/// `interrupted` is only meaningful on a `Cooldown` entry: it distinguishes a
/// cancelled or obstructed ability from one that ran its full active phase,
/// so observers can suppress impact presentation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PhaseEvent {
    pub ability: AbilityKind,
    pub phase: Phase,
    pub interrupted: bool,
}

// Packet types for observer-server communication
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Connection management
    Connect {
        client_version: u32,
    },
    Connected {
        observer_id: ObserverId,
    },
    Heartbeat {
        timestamp: u64,
    },
    Disconnect,
    Disconnected {
        reason: String,
    },

    // Replication
    EntitySpawned {
        entity: EntityId,
        role: EntityRole,
        position: Vec3,
    },
    EntityDespawned {
        entity: EntityId,
    },
    FieldSnapshot {
        entity: EntityId,
        snapshot: Snapshot,
    },
    AbilityEvent {
        entity: EntityId,
        event: PhaseEvent,
    },
}
