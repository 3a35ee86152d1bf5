//! Wire representation of replicated field values and snapshots.

use serde::{Deserialize, Serialize};

/// Identifies one replicated field on an entity (health, stress, ...).
pub type FieldId = u16;

pub const FIELD_HEALTH: FieldId = 1;
pub const FIELD_STRESS: FieldId = 2;

/// Type-erased field value as it travels over the wire.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum WireValue {
    Scalar(f32),
    Int(i32),
    Flag(bool),
    Mode(u16),
}

/// Types that can live inside an authoritative container and be replicated.
///
/// `PartialOrd` gives range clamping for the numeric implementations; enum
/// modes go through their `u16` representation.
pub trait FieldValue: Copy + PartialEq + PartialOrd + std::fmt::Debug {
    fn to_wire(self) -> WireValue;
    fn from_wire(wire: WireValue) -> Option<Self>;
}

impl FieldValue for f32 {
    fn to_wire(self) -> WireValue {
        WireValue::Scalar(self)
    }

    fn from_wire(wire: WireValue) -> Option<Self> {
        match wire {
            WireValue::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldValue for i32 {
    fn to_wire(self) -> WireValue {
        WireValue::Int(self)
    }

    fn from_wire(wire: WireValue) -> Option<Self> {
        match wire {
            WireValue::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldValue for bool {
    fn to_wire(self) -> WireValue {
        WireValue::Flag(self)
    }

    fn from_wire(wire: WireValue) -> Option<Self> {
        match wire {
            WireValue::Flag(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldValue for u16 {
    fn to_wire(self) -> WireValue {
        WireValue::Mode(self)
    }

    fn from_wire(wire: WireValue) -> Option<Self> {
        match wire {
            WireValue::Mode(v) => Some(v),
            _ => None,
        }
    }
}

/// Immutable copy of an authoritative value at the moment of flush.
///
/// The sequence number is monotonic per (entity, field); clients drop any
/// snapshot whose sequence is not newer than the last one they applied, so
/// duplicated or reordered delivery is safe.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub field: FieldId,
    pub sequence: u32,
    pub value: WireValue,
}
