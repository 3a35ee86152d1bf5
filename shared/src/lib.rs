use serde::{Deserialize, Serialize};

pub mod curve;
pub mod packet;
pub mod value;

pub use curve::FalloffCurve;
pub use packet::{AbilityKind, Packet, Phase, PhaseEvent};
pub use value::{FieldId, FieldValue, Snapshot, WireValue, FIELD_HEALTH, FIELD_STRESS};

pub const PROTOCOL_VERSION: u32 = 1;
pub const BASE_HEALTH: f32 = 100.0;
pub const BASE_STRESS: f32 = 0.0;
pub const MAX_STRESS: f32 = 100.0;

/// Identifier for a server-spawned entity.
pub type EntityId = u32;
/// Identifier for a connected observer (a client entitled to replication).
pub type ObserverId = u32;

/// Coarse role tag used for spawn bookkeeping and radial role filters.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EntityRole {
    Player,
    Enemy,
    Prop,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Unit vector pointing from `self` towards `other`; zero when coincident.
    pub fn direction_to(&self, other: &Vec3) -> Vec3 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        let magnitude = (dx * dx + dy * dy + dz * dz).sqrt();
        if magnitude > 0.0 {
            Vec3::new(dx / magnitude, dy / magnitude, dz / magnitude)
        } else {
            Vec3::ZERO
        }
    }

    /// Moves `step` units towards `other` without overshooting it.
    pub fn step_towards(&self, other: &Vec3, step: f32) -> Vec3 {
        let dist = self.distance(other);
        if dist <= step {
            return *other;
        }
        let dir = self.direction_to(other);
        Vec3::new(
            self.x + dir.x * step,
            self.y + dir.y * step,
            self.z + dir.z * step,
        )
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert_approx_eq!(a.distance(&b), 5.0, 0.001);
        assert_approx_eq!(a.distance_squared(&b), 25.0, 0.001);
    }

    #[test]
    fn test_direction_to() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(5.0, 0.0, 0.0);
        let dir = a.direction_to(&b);
        assert_approx_eq!(dir.x, 1.0, 0.001);
        assert_approx_eq!(dir.y, 0.0, 0.001);
        assert_approx_eq!(dir.z, 0.0, 0.001);
    }

    #[test]
    fn test_direction_to_same_position() {
        let a = Vec3::new(2.0, 2.0, 2.0);
        let dir = a.direction_to(&a);
        assert_eq!(dir, Vec3::ZERO);
    }

    #[test]
    fn test_step_towards_overshoot_clamps_to_target() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.0, 0.0, 0.0);
        let stepped = a.step_towards(&b, 10.0);
        assert_eq!(stepped, b);
    }

    #[test]
    fn test_step_towards_partial() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(10.0, 0.0, 0.0);
        let stepped = a.step_towards(&b, 4.0);
        assert_approx_eq!(stepped.x, 4.0, 0.001);
    }

    #[test]
    fn test_lerp() {
        assert_approx_eq!(lerp(10.0, 30.0, 0.0), 10.0, 0.001);
        assert_approx_eq!(lerp(10.0, 30.0, 1.0), 30.0, 0.001);
        assert_approx_eq!(lerp(10.0, 30.0, 0.5), 20.0, 0.001);
    }
}
