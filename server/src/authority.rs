//! Authoritative state containers for replicated entity fields
//!
//! An [`AuthValue`] is the single source of truth for one scalar or enum field
//! on one entity. Mutation is gated on the server role, every change marks the
//! container dirty and bumps its snapshot sequence, and the tick driver turns
//! dirty containers into one snapshot per observer. Client roles never touch
//! these containers; they hold read-only mirrors fed by the snapshots.

use log::warn;
use shared::{FieldId, FieldValue, Snapshot};
use std::ops::Add;
use thiserror::Error;

/// Which side of the replication boundary this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

/// Explicit role context injected into the simulation at construction.
///
/// Every mutating call on an authoritative container takes the context; there
/// is no process-wide role lookup.
#[derive(Debug, Clone, Copy)]
pub struct RoleCtx {
    role: Role,
}

impl RoleCtx {
    pub fn server() -> Self {
        Self { role: Role::Server }
    }

    pub fn client() -> Self {
        Self { role: Role::Client }
    }

    pub fn is_server(&self) -> bool {
        self.role == Role::Server
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// Mutation attempted off the server role. The call is a rejected no-op.
    #[error("mutation attempted outside the server role")]
    NotAuthoritative,
}

/// Result of a write to an [`AuthValue`].
///
/// `depleted` fires exactly once when a ranged value first reaches its
/// minimum; it rearms only after the value leaves the minimum again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetOutcome<T> {
    pub previous: T,
    pub value: T,
    pub changed: bool,
    pub depleted: bool,
}

/// Server-owned authoritative value with optional range clamping.
#[derive(Debug, Clone)]
pub struct AuthValue<T: FieldValue> {
    field: FieldId,
    value: T,
    range: Option<(T, T)>,
    dirty: bool,
    sequence: u32,
    at_minimum: bool,
}

impl<T: FieldValue> AuthValue<T> {
    pub fn new(field: FieldId, initial: T) -> Self {
        Self {
            field,
            value: initial,
            range: None,
            dirty: false,
            sequence: 0,
            at_minimum: false,
        }
    }

    /// Range-clamped container. The initial value is clamped too.
    pub fn with_range(field: FieldId, initial: T, min: T, max: T) -> Self {
        let value = Self::clamp_to(initial, min, max);
        Self {
            field,
            value,
            range: Some((min, max)),
            dirty: false,
            sequence: 0,
            at_minimum: value == min,
        }
    }

    pub fn field(&self) -> FieldId {
        self.field
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    fn clamp_to(v: T, min: T, max: T) -> T {
        if v < min {
            min
        } else if v > max {
            max
        } else {
            v
        }
    }

    /// Writes a new value under the server role.
    ///
    /// Clamps to the configured range first. A write that lands on the current
    /// value is a no-op: no dirty flag, no sequence bump, no replication.
    pub fn set(&mut self, ctx: &RoleCtx, new_value: T) -> Result<SetOutcome<T>, StateError> {
        if !ctx.is_server() {
            warn!("rejected non-authoritative write to field {}", self.field);
            return Err(StateError::NotAuthoritative);
        }

        let clamped = match self.range {
            Some((min, max)) => Self::clamp_to(new_value, min, max),
            None => new_value,
        };

        let previous = self.value;
        if clamped == previous {
            return Ok(SetOutcome {
                previous,
                value: previous,
                changed: false,
                depleted: false,
            });
        }

        self.value = clamped;
        self.dirty = true;
        self.sequence = self.sequence.wrapping_add(1);

        let mut depleted = false;
        if let Some((min, _)) = self.range {
            let now_at_minimum = clamped == min;
            depleted = now_at_minimum && !self.at_minimum;
            self.at_minimum = now_at_minimum;
        }

        Ok(SetOutcome {
            previous,
            value: clamped,
            changed: true,
            depleted,
        })
    }

    /// Read-only snapshot of the current value and sequence.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            field: self.field,
            sequence: self.sequence,
            value: self.value.to_wire(),
        }
    }

    /// Returns the current snapshot and clears the dirty flag.
    ///
    /// Flushing a clean container returns the identical snapshot again; the
    /// tick driver only sends snapshots for containers that were dirty.
    pub fn flush(&mut self, ctx: &RoleCtx) -> Result<Snapshot, StateError> {
        if !ctx.is_server() {
            warn!("rejected non-authoritative flush of field {}", self.field);
            return Err(StateError::NotAuthoritative);
        }
        self.dirty = false;
        Ok(self.snapshot())
    }
}

impl<T: FieldValue + Add<Output = T>> AuthValue<T> {
    /// Applies a delta before clamping; damage and heals come through here.
    pub fn add(&mut self, ctx: &RoleCtx, delta: T) -> Result<SetOutcome<T>, StateError> {
        let target = self.value + delta;
        self.set(ctx, target)
    }
}
