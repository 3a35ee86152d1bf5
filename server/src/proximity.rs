//! Radial falloff propagation for stress and damage pulses
//!
//! A radial effect is transient: built at the moment an ability fires a
//! pulse, applied to every qualifying entity inside the radius, then dropped.
//! For a fixed entity set and positions the applied magnitudes are a pure
//! function of distance, so results are reproducible.

use crate::authority::{RoleCtx, StateError};
use crate::registry::EntityRegistry;
use crate::sim::EntityState;
use shared::{lerp, EntityId, EntityRole, FalloffCurve, FieldId, Vec3, FIELD_HEALTH, FIELD_STRESS};
use std::collections::HashMap;

/// One falloff-weighted pulse around a source entity.
///
/// `magnitude` is (rim, source): the applied delta is
/// `lerp(rim, source, curve(distance / radius)) * intensity`, so a curve
/// mapping 0 to 1 and 1 to 0 gives the source-end magnitude at distance zero.
/// Negative magnitudes damage, positive ones add stress or heal.
#[derive(Debug, Clone)]
pub struct RadialEffect {
    pub source: EntityId,
    pub field: FieldId,
    pub radius: f32,
    pub curve: FalloffCurve,
    pub min_magnitude: f32,
    pub max_magnitude: f32,
    pub intensity: f32,
    /// Numeric resolution applied deltas are rounded to; 0 disables rounding.
    pub resolution: f32,
    pub role_filter: Option<EntityRole>,
}

/// One entity touched by a radial pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialHit {
    pub entity: EntityId,
    pub applied: f32,
    pub depleted: bool,
}

fn round_to_resolution(value: f32, resolution: f32) -> f32 {
    if resolution > 0.0 {
        (value / resolution).round() * resolution
    } else {
        value
    }
}

/// Applies a radial effect from the source's current position.
///
/// Entities outside the radius or failing the role filter are skipped, as is
/// the source itself. Replication is not triggered here; the mutated values
/// are flushed by the normal tick cycle.
pub fn apply_radial(
    ctx: &RoleCtx,
    registry: &EntityRegistry,
    states: &mut HashMap<EntityId, EntityState>,
    effect: &RadialEffect,
) -> Result<Vec<RadialHit>, StateError> {
    let origin = match registry.position_of(effect.source) {
        Ok(pos) => pos,
        // Source already despawned: the pulse lands on nobody.
        Err(_) => return Ok(Vec::new()),
    };
    apply_radial_from(ctx, registry, states, &origin, effect)
}

/// Same as [`apply_radial`] but with an explicit origin (environmental
/// triggers that are not entities).
pub fn apply_radial_from(
    ctx: &RoleCtx,
    registry: &EntityRegistry,
    states: &mut HashMap<EntityId, EntityState>,
    origin: &Vec3,
    effect: &RadialEffect,
) -> Result<Vec<RadialHit>, StateError> {
    if effect.radius <= 0.0 {
        return Ok(Vec::new());
    }

    let mut hits = Vec::new();
    for (id, distance) in registry.entities_in_radius(origin, effect.radius, effect.role_filter) {
        if id == effect.source {
            continue;
        }
        let state = match states.get_mut(&id) {
            Some(state) => state,
            None => continue,
        };
        let value = match effect.field {
            FIELD_HEALTH => &mut state.health,
            FIELD_STRESS => &mut state.stress,
            _ => continue,
        };

        let factor = effect.curve.evaluate(distance / effect.radius);
        let raw = lerp(effect.min_magnitude, effect.max_magnitude, factor) * effect.intensity;
        let delta = round_to_resolution(raw, effect.resolution);
        if delta == 0.0 {
            continue;
        }

        let outcome = value.add(ctx, delta)?;
        hits.push(RadialHit {
            entity: id,
            applied: delta,
            depleted: outcome.depleted,
        });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::EntityState;
    use assert_approx_eq::assert_approx_eq;
    use shared::EntityRole;

    fn world(positions: &[(EntityId, Vec3)]) -> (EntityRegistry, HashMap<EntityId, EntityState>) {
        let mut registry = EntityRegistry::new();
        let mut states = HashMap::new();
        for (id, pos) in positions {
            registry.register(*id, EntityRole::Player, *pos).unwrap();
            states.insert(*id, EntityState::new());
        }
        (registry, states)
    }

    fn stress_effect(source: EntityId, radius: f32) -> RadialEffect {
        RadialEffect {
            source,
            field: FIELD_STRESS,
            radius,
            curve: FalloffCurve::linear(),
            min_magnitude: 10.0,
            max_magnitude: 30.0,
            intensity: 1.0,
            resolution: 0.0,
            role_filter: None,
        }
    }

    #[test]
    fn test_falloff_boundary_values() {
        let (mut registry, mut states) = world(&[
            (1, Vec3::new(0.0, 0.0, 0.0)),
            (2, Vec3::new(10.0, 0.0, 0.0)),
            (3, Vec3::new(15.0, 0.0, 0.0)),
        ]);
        registry.register(99, EntityRole::Enemy, Vec3::ZERO).unwrap();
        states.insert(99, EntityState::new());

        let ctx = RoleCtx::server();
        let hits = apply_radial(&ctx, &registry, &mut states, &stress_effect(99, 10.0)).unwrap();

        // Entity at distance 0 gets the full 30, at the rim 10, outside nothing.
        assert_eq!(hits.len(), 2);
        assert_approx_eq!(states[&1].stress.value(), 30.0, 0.001);
        assert_approx_eq!(states[&2].stress.value(), 10.0, 0.001);
        assert_approx_eq!(states[&3].stress.value(), 0.0, 0.001);
    }

    #[test]
    fn test_source_entity_skipped() {
        let (registry, mut states) = world(&[(1, Vec3::ZERO), (2, Vec3::new(1.0, 0.0, 0.0))]);

        let ctx = RoleCtx::server();
        apply_radial(&ctx, &registry, &mut states, &stress_effect(1, 10.0)).unwrap();

        assert_approx_eq!(states[&1].stress.value(), 0.0, 0.001);
        assert!(states[&2].stress.value() > 0.0);
    }

    #[test]
    fn test_role_filter_skips_non_matching() {
        let mut registry = EntityRegistry::new();
        let mut states = HashMap::new();
        registry.register(1, EntityRole::Player, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        registry.register(2, EntityRole::Prop, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        registry.register(9, EntityRole::Enemy, Vec3::ZERO).unwrap();
        states.insert(1, EntityState::new());
        states.insert(2, EntityState::new());
        states.insert(9, EntityState::new());

        let mut effect = stress_effect(9, 10.0);
        effect.role_filter = Some(EntityRole::Player);

        let ctx = RoleCtx::server();
        let hits = apply_radial(&ctx, &registry, &mut states, &effect).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity, 1);
        assert_approx_eq!(states[&2].stress.value(), 0.0, 0.001);
    }

    #[test]
    fn test_intensity_and_resolution() {
        let (mut registry, mut states) = world(&[(1, Vec3::new(5.0, 0.0, 0.0))]);
        registry.register(9, EntityRole::Enemy, Vec3::ZERO).unwrap();
        states.insert(9, EntityState::new());

        let mut effect = stress_effect(9, 10.0);
        effect.intensity = 0.5;
        effect.resolution = 1.0;

        let ctx = RoleCtx::server();
        let hits = apply_radial(&ctx, &registry, &mut states, &effect).unwrap();
        // lerp(10, 30, 0.5) * 0.5 = 10, already on the resolution grid.
        assert_eq!(hits.len(), 1);
        assert_approx_eq!(hits[0].applied, 10.0, 0.001);
    }

    #[test]
    fn test_damage_pulse_reports_depletion() {
        let (mut registry, mut states) = world(&[(1, Vec3::new(0.5, 0.0, 0.0))]);
        registry.register(9, EntityRole::Enemy, Vec3::ZERO).unwrap();
        states.insert(9, EntityState::new());

        let effect = RadialEffect {
            source: 9,
            field: FIELD_HEALTH,
            radius: 10.0,
            curve: FalloffCurve::constant(1.0),
            min_magnitude: -150.0,
            max_magnitude: -150.0,
            intensity: 1.0,
            resolution: 0.0,
            role_filter: None,
        };

        let ctx = RoleCtx::server();
        let hits = apply_radial(&ctx, &registry, &mut states, &effect).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].depleted);
        assert_approx_eq!(states[&1].health.value(), 0.0, 0.001);
    }

    #[test]
    fn test_despawned_source_is_silent() {
        let (registry, mut states) = world(&[(1, Vec3::ZERO)]);
        let ctx = RoleCtx::server();
        let hits = apply_radial(&ctx, &registry, &mut states, &stress_effect(42, 10.0)).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_deterministic_for_fixed_positions() {
        let (mut registry, mut states_a) = world(&[
            (1, Vec3::new(3.0, 0.0, 0.0)),
            (2, Vec3::new(7.0, 0.0, 0.0)),
        ]);
        registry.register(9, EntityRole::Enemy, Vec3::ZERO).unwrap();
        states_a.insert(9, EntityState::new());
        let mut states_b: HashMap<EntityId, EntityState> = states_a
            .keys()
            .map(|id| (*id, EntityState::new()))
            .collect();

        let ctx = RoleCtx::server();
        let effect = stress_effect(9, 10.0);
        let hits_a = apply_radial(&ctx, &registry, &mut states_a, &effect).unwrap();
        let hits_b = apply_radial(&ctx, &registry, &mut states_b, &effect).unwrap();
        assert_eq!(hits_a, hits_b);
    }
}
