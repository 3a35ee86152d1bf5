//! Authoritative simulation driver
//!
//! The [`Simulation`] owns everything mutable: the entity registry, each
//! entity's authoritative values, and its ability machines. All mutation
//! happens on the single server tick; observers only ever receive snapshots
//! and phase events through the [`Transport`] seam. The role context,
//! obstruction checker, and transport are all injected, so there is no
//! process-wide state to reach for.

use crate::ability::{AbilityError, AbilityKindExt, AbilityMachine, EffectOutcome};
use crate::authority::{AuthValue, RoleCtx, SetOutcome, StateError};
use crate::proximity::{apply_radial, RadialEffect};
use crate::registry::{EntityRegistry, RegistryError};
use log::{info, warn};
use shared::{
    AbilityKind, EntityId, EntityRole, FalloffCurve, FieldId, ObserverId, Packet, PhaseEvent,
    Phase, Snapshot, Vec3, BASE_HEALTH, BASE_STRESS, FIELD_HEALTH, FIELD_STRESS, MAX_STRESS,
};
use std::collections::HashMap;
use thiserror::Error;

// Charge: pursuit movement with an impact pulse on contact.
pub const CHARGE_SPEED: f32 = 8.0;
pub const CHARGE_IMPACT_RADIUS: f32 = 1.5;
pub const CHARGE_DAMAGE: f32 = 35.0;

// Scream: periodic radial stress pulses while active.
pub const SCREAM_RADIUS: f32 = 12.0;
pub const SCREAM_PULSE_INTERVAL: f32 = 0.5;
pub const SCREAM_STRESS_MIN: f32 = 4.0;
pub const SCREAM_STRESS_MAX: f32 = 12.0;

/// Stress values replicate at half-point resolution.
pub const STRESS_RESOLUTION: f32 = 0.5;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Ability(#[from] AbilityError),
}

/// Domain notifications surfaced from a tick or a direct mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    /// A ranged value hit its minimum; fires once per depletion.
    Depleted { entity: EntityId, field: FieldId },
    PhaseChanged { entity: EntityId, event: PhaseEvent },
    Spawned {
        entity: EntityId,
        role: EntityRole,
        position: Vec3,
    },
    Despawned { entity: EntityId },
}

/// Outgoing replication seam. The transport is expected to deliver reliably
/// and in order per (entity, field); duplicates are safe because mirrors
/// filter on the snapshot sequence.
pub trait Transport {
    fn send_snapshot(&mut self, observer: ObserverId, entity: EntityId, snapshot: Snapshot);
    fn send_event(&mut self, observers: &[ObserverId], entity: EntityId, event: PhaseEvent);
}

/// Transport that drops everything; for tests and offline simulation.
pub struct NullTransport;

impl Transport for NullTransport {
    fn send_snapshot(&mut self, _: ObserverId, _: EntityId, _: Snapshot) {}
    fn send_event(&mut self, _: &[ObserverId], _: EntityId, _: PhaseEvent) {}
}

/// Obstruction query supplied by the engine layer (walls, geometry).
pub trait ObstructionCheck {
    fn blocked(&self, from: &Vec3, to: &Vec3) -> bool;
}

/// Open world: nothing ever blocks a charge.
pub struct NoObstructions;

impl ObstructionCheck for NoObstructions {
    fn blocked(&self, _: &Vec3, _: &Vec3) -> bool {
        false
    }
}

/// Per-entity authoritative state: values plus ability machines.
pub struct EntityState {
    pub health: AuthValue<f32>,
    pub stress: AuthValue<f32>,
    pub abilities: HashMap<AbilityKind, AbilityMachine>,
    /// Countdown to the next scream stress pulse while active.
    pub scream_accum: f32,
}

impl EntityState {
    pub fn new() -> Self {
        Self {
            health: AuthValue::with_range(FIELD_HEALTH, BASE_HEALTH, 0.0, BASE_HEALTH),
            stress: AuthValue::with_range(FIELD_STRESS, BASE_STRESS, 0.0, MAX_STRESS),
            abilities: HashMap::new(),
            scream_accum: 0.0,
        }
    }
}

impl Default for EntityState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Simulation {
    ctx: RoleCtx,
    registry: EntityRegistry,
    states: HashMap<EntityId, EntityState>,
    obstruction: Box<dyn ObstructionCheck + Send>,
    events: Vec<SimEvent>,
}

impl Simulation {
    pub fn new() -> Self {
        Self::with_obstruction(Box::new(NoObstructions))
    }

    pub fn with_obstruction(obstruction: Box<dyn ObstructionCheck + Send>) -> Self {
        Self {
            ctx: RoleCtx::server(),
            registry: EntityRegistry::new(),
            states: HashMap::new(),
            obstruction,
            events: Vec::new(),
        }
    }

    pub fn ctx(&self) -> &RoleCtx {
        &self.ctx
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    // --- lifecycle -------------------------------------------------------

    pub fn spawn(
        &mut self,
        id: EntityId,
        role: EntityRole,
        position: Vec3,
    ) -> Result<EntityId, RegistryError> {
        self.registry.register(id, role, position)?;
        self.states.insert(id, EntityState::new());
        self.events.push(SimEvent::Spawned {
            entity: id,
            role,
            position,
        });
        Ok(id)
    }

    /// Idempotent; despawning an unknown entity is a no-op.
    pub fn despawn(&mut self, id: EntityId) {
        if self.states.remove(&id).is_some() {
            self.registry.unregister(id);
            self.events.push(SimEvent::Despawned { entity: id });
        }
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec3) -> Result<(), RegistryError> {
        self.registry.set_position(id, position)
    }

    pub fn position_of(&self, id: EntityId) -> Result<Vec3, RegistryError> {
        self.registry.position_of(id)
    }

    pub fn add_observer(&mut self, id: EntityId, observer: ObserverId) -> Result<bool, RegistryError> {
        self.registry.add_observer(id, observer)
    }

    pub fn remove_observer(
        &mut self,
        id: EntityId,
        observer: ObserverId,
    ) -> Result<bool, RegistryError> {
        self.registry.remove_observer(id, observer)
    }

    pub fn subscribe_all(&mut self, observer: ObserverId) {
        self.registry.subscribe_all(observer)
    }

    pub fn unsubscribe_all(&mut self, observer: ObserverId) {
        self.registry.unsubscribe_all(observer)
    }

    // --- authoritative value ops ----------------------------------------

    pub fn health_of(&self, id: EntityId) -> Option<f32> {
        self.states.get(&id).map(|s| s.health.value())
    }

    pub fn stress_of(&self, id: EntityId) -> Option<f32> {
        self.states.get(&id).map(|s| s.stress.value())
    }

    pub fn damage(&mut self, id: EntityId, amount: f32) -> Result<SetOutcome<f32>, SimError> {
        let ctx = self.ctx;
        let state = self
            .states
            .get_mut(&id)
            .ok_or(RegistryError::UnknownEntity(id))?;
        let outcome = state.health.add(&ctx, -amount)?;
        if outcome.depleted {
            info!("Entity {} health depleted", id);
            self.events.push(SimEvent::Depleted {
                entity: id,
                field: FIELD_HEALTH,
            });
        }
        Ok(outcome)
    }

    pub fn heal(&mut self, id: EntityId, amount: f32) -> Result<SetOutcome<f32>, SimError> {
        self.damage(id, -amount)
    }

    pub fn add_stress(&mut self, id: EntityId, amount: f32) -> Result<SetOutcome<f32>, SimError> {
        let ctx = self.ctx;
        let state = self
            .states
            .get_mut(&id)
            .ok_or(RegistryError::UnknownEntity(id))?;
        Ok(state.stress.add(&ctx, amount)?)
    }

    // --- abilities -------------------------------------------------------

    pub fn ability_phase(&self, id: EntityId, kind: AbilityKind) -> Option<Phase> {
        self.states
            .get(&id)
            .and_then(|s| s.abilities.get(&kind))
            .map(|m| m.phase())
    }

    pub fn can_start_ability(&self, id: EntityId, kind: AbilityKind) -> bool {
        self.states
            .get(&id)
            .and_then(|s| s.abilities.get(&kind))
            .map_or(true, |m| m.can_start())
    }

    /// Triggers an ability; the machine is created on first use, so there is
    /// at most one machine per (entity, kind).
    pub fn try_start_ability(
        &mut self,
        id: EntityId,
        kind: AbilityKind,
        target: Option<EntityId>,
    ) -> Result<PhaseEvent, SimError> {
        if !self.registry.contains(id) {
            return Err(RegistryError::UnknownEntity(id).into());
        }
        if kind.requires_target() && target.is_none() {
            return Err(AbilityError::InvalidTarget.into());
        }
        if let Some(t) = target {
            if !self.registry.contains(t) {
                return Err(AbilityError::InvalidTarget.into());
            }
        }

        let ctx = self.ctx;
        let state = self
            .states
            .get_mut(&id)
            .ok_or(RegistryError::UnknownEntity(id))?;
        let machine = state
            .abilities
            .entry(kind)
            .or_insert_with(|| AbilityMachine::new(kind));
        let event = machine.try_start(&ctx, target)?;
        if kind == AbilityKind::Scream {
            // First pulse lands on the first active tick.
            state.scream_accum = 0.0;
        }
        self.events.push(SimEvent::PhaseChanged { entity: id, event });
        Ok(event)
    }

    /// Synchronous cancellation; no active effect fires after this returns.
    pub fn cancel_ability(
        &mut self,
        id: EntityId,
        kind: AbilityKind,
    ) -> Result<Option<PhaseEvent>, SimError> {
        let state = self
            .states
            .get_mut(&id)
            .ok_or(RegistryError::UnknownEntity(id))?;
        let cancelled = state.abilities.get_mut(&kind).and_then(|m| m.cancel());
        if let Some(event) = cancelled {
            self.events.push(SimEvent::PhaseChanged { entity: id, event });
        }
        Ok(cancelled)
    }

    // --- tick ------------------------------------------------------------

    /// Advances every ability machine, flushes every dirty value to its
    /// observers, sends queued phase events, and returns the drained domain
    /// events for the caller.
    pub fn tick(&mut self, dt: f32, transport: &mut dyn Transport) -> Vec<SimEvent> {
        self.tick_abilities(dt);
        self.flush_values(transport);
        self.dispatch_events(transport)
    }

    fn tick_abilities(&mut self, dt: f32) {
        for id in self.registry.ids() {
            let kinds: Vec<AbilityKind> = match self.states.get(&id) {
                Some(state) => {
                    let mut kinds: Vec<AbilityKind> =
                        state.abilities.keys().copied().collect();
                    kinds.sort_by_key(|k| *k as u8);
                    kinds
                }
                None => continue,
            };

            for kind in kinds {
                // The machine is taken out of the map so the effect can
                // mutate the rest of the simulation while it runs.
                let mut machine = match self
                    .states
                    .get_mut(&id)
                    .and_then(|s| s.abilities.remove(&kind))
                {
                    Some(machine) => machine,
                    None => continue,
                };

                let Simulation {
                    ctx,
                    registry,
                    states,
                    obstruction,
                    events,
                } = self;
                let transition = machine.tick(dt, |target| {
                    run_effect(
                        ctx,
                        registry,
                        states,
                        obstruction.as_ref(),
                        events,
                        id,
                        kind,
                        target,
                        dt,
                    )
                });

                if let Some(event) = transition {
                    self.events.push(SimEvent::PhaseChanged { entity: id, event });
                }
                if let Some(state) = self.states.get_mut(&id) {
                    state.abilities.insert(kind, machine);
                }
            }
        }
    }

    fn flush_values(&mut self, transport: &mut dyn Transport) {
        let ctx = self.ctx;
        for id in self.registry.ids() {
            let observers = self.sorted_observers(id);
            let state = match self.states.get_mut(&id) {
                Some(state) => state,
                None => continue,
            };

            if state.health.is_dirty() {
                if let Ok(snapshot) = state.health.flush(&ctx) {
                    for &observer in &observers {
                        transport.send_snapshot(observer, id, snapshot);
                    }
                }
            }
            if state.stress.is_dirty() {
                if let Ok(snapshot) = state.stress.flush(&ctx) {
                    for &observer in &observers {
                        transport.send_snapshot(observer, id, snapshot);
                    }
                }
            }
        }
    }

    fn dispatch_events(&mut self, transport: &mut dyn Transport) -> Vec<SimEvent> {
        let drained: Vec<SimEvent> = self.events.drain(..).collect();
        for event in &drained {
            if let SimEvent::PhaseChanged { entity, event } = event {
                let observers = self.sorted_observers(*entity);
                transport.send_event(&observers, *entity, *event);
            }
        }
        drained
    }

    fn sorted_observers(&self, id: EntityId) -> Vec<ObserverId> {
        let mut observers: Vec<ObserverId> = self
            .registry
            .observers_of(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        observers.sort_unstable();
        observers
    }

    /// Current snapshots for one entity, without touching dirty flags.
    pub fn entity_snapshots(&self, id: EntityId) -> Vec<Snapshot> {
        match self.states.get(&id) {
            Some(state) => vec![state.health.snapshot(), state.stress.snapshot()],
            None => Vec::new(),
        }
    }

    /// Full-state packets for a newly connected observer: one spawn notice
    /// and the current snapshots per entity.
    pub fn baseline(&self) -> Vec<Packet> {
        let mut packets = Vec::new();
        for id in self.registry.ids() {
            let (role, position) = match (self.registry.role_of(id), self.registry.position_of(id))
            {
                (Ok(role), Ok(position)) => (role, position),
                _ => continue,
            };
            packets.push(Packet::EntitySpawned {
                entity: id,
                role,
                position,
            });
            if let Some(state) = self.states.get(&id) {
                packets.push(Packet::FieldSnapshot {
                    entity: id,
                    snapshot: state.health.snapshot(),
                });
                packets.push(Packet::FieldSnapshot {
                    entity: id,
                    snapshot: state.stress.snapshot(),
                });
            }
        }
        packets
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-variant active-phase effect, selected by tag.
#[allow(clippy::too_many_arguments)]
fn run_effect(
    ctx: &RoleCtx,
    registry: &mut EntityRegistry,
    states: &mut HashMap<EntityId, EntityState>,
    obstruction: &dyn ObstructionCheck,
    events: &mut Vec<SimEvent>,
    source: EntityId,
    kind: AbilityKind,
    target: Option<EntityId>,
    dt: f32,
) -> EffectOutcome {
    match kind {
        AbilityKind::Charge => {
            // A despawned target means no effect this tick; the phase still
            // completes on its timer so observers see a matching cooldown.
            let target_id = match target {
                Some(t) => t,
                None => return EffectOutcome::proceed(),
            };
            let target_pos = match registry.position_of(target_id) {
                Ok(pos) => pos,
                Err(_) => return EffectOutcome::proceed(),
            };
            let from = match registry.position_of(source) {
                Ok(pos) => pos,
                Err(_) => return EffectOutcome::proceed(),
            };

            let to = from.step_towards(&target_pos, CHARGE_SPEED * dt);
            if obstruction.blocked(&from, &to) {
                return EffectOutcome::stop(true);
            }
            let _ = registry.set_position(source, to);

            if to.distance(&target_pos) <= CHARGE_IMPACT_RADIUS {
                let effect = RadialEffect {
                    source,
                    field: FIELD_HEALTH,
                    radius: CHARGE_IMPACT_RADIUS,
                    curve: FalloffCurve::constant(1.0),
                    min_magnitude: -CHARGE_DAMAGE,
                    max_magnitude: -CHARGE_DAMAGE,
                    intensity: 1.0,
                    resolution: STRESS_RESOLUTION,
                    role_filter: None,
                };
                match apply_radial(ctx, registry, states, &effect) {
                    Ok(hits) => {
                        for hit in hits {
                            if hit.depleted {
                                events.push(SimEvent::Depleted {
                                    entity: hit.entity,
                                    field: FIELD_HEALTH,
                                });
                            }
                        }
                    }
                    Err(err) => warn!("charge impact rejected: {}", err),
                }
                return EffectOutcome::stop(false);
            }
            EffectOutcome::proceed()
        }
        AbilityKind::Scream => {
            match states.get_mut(&source) {
                Some(state) => {
                    state.scream_accum -= dt;
                    if state.scream_accum > 0.0 {
                        return EffectOutcome::proceed();
                    }
                    state.scream_accum += SCREAM_PULSE_INTERVAL;
                }
                None => return EffectOutcome::proceed(),
            }

            let effect = RadialEffect {
                source,
                field: FIELD_STRESS,
                radius: SCREAM_RADIUS,
                curve: FalloffCurve::linear(),
                min_magnitude: SCREAM_STRESS_MIN,
                max_magnitude: SCREAM_STRESS_MAX,
                intensity: 1.0,
                resolution: STRESS_RESOLUTION,
                role_filter: Some(EntityRole::Player),
            };
            if let Err(err) = apply_radial(ctx, registry, states, &effect) {
                warn!("scream pulse rejected: {}", err);
            }
            EffectOutcome::proceed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    /// Transport that records every delivery for assertions.
    #[derive(Default)]
    struct RecordingTransport {
        snapshots: Vec<(ObserverId, EntityId, Snapshot)>,
        events: Vec<(Vec<ObserverId>, EntityId, PhaseEvent)>,
    }

    impl Transport for RecordingTransport {
        fn send_snapshot(&mut self, observer: ObserverId, entity: EntityId, snapshot: Snapshot) {
            self.snapshots.push((observer, entity, snapshot));
        }

        fn send_event(&mut self, observers: &[ObserverId], entity: EntityId, event: PhaseEvent) {
            self.events.push((observers.to_vec(), entity, event));
        }
    }

    struct WallAt {
        x: f32,
    }

    impl ObstructionCheck for WallAt {
        fn blocked(&self, _from: &Vec3, to: &Vec3) -> bool {
            to.x >= self.x
        }
    }

    fn demo_sim() -> Simulation {
        let mut sim = Simulation::new();
        sim.spawn(1, EntityRole::Player, Vec3::new(5.0, 0.0, 0.0)).unwrap();
        sim.spawn(2, EntityRole::Enemy, Vec3::ZERO).unwrap();
        sim
    }

    #[test]
    fn test_spawn_duplicate_rejected() {
        let mut sim = demo_sim();
        assert_eq!(
            sim.spawn(1, EntityRole::Prop, Vec3::ZERO),
            Err(RegistryError::DuplicateId(1))
        );
    }

    #[test]
    fn test_despawn_idempotent() {
        let mut sim = demo_sim();
        sim.despawn(1);
        sim.despawn(1);
        assert_eq!(sim.len(), 1);
        assert!(sim.health_of(1).is_none());
    }

    #[test]
    fn test_damage_and_one_shot_depletion() {
        let mut sim = demo_sim();

        let outcome = sim.damage(1, 120.0).unwrap();
        assert_eq!(outcome.value, 0.0);
        assert!(outcome.depleted);

        // Further damage at the floor: unchanged, silent.
        let outcome = sim.damage(1, 10.0).unwrap();
        assert!(!outcome.changed);
        assert!(!outcome.depleted);

        let mut transport = NullTransport;
        let events = sim.tick(0.016, &mut transport);
        let depletions: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SimEvent::Depleted { .. }))
            .collect();
        assert_eq!(depletions.len(), 1);
    }

    #[test]
    fn test_damage_unknown_entity() {
        let mut sim = demo_sim();
        assert_eq!(
            sim.damage(99, 5.0),
            Err(SimError::Registry(RegistryError::UnknownEntity(99)))
        );
    }

    #[test]
    fn test_try_start_requires_live_target() {
        let mut sim = demo_sim();

        assert_eq!(
            sim.try_start_ability(2, AbilityKind::Charge, None),
            Err(SimError::Ability(AbilityError::InvalidTarget))
        );
        assert_eq!(
            sim.try_start_ability(2, AbilityKind::Charge, Some(99)),
            Err(SimError::Ability(AbilityError::InvalidTarget))
        );
        // Machine stays idle after a failed start.
        assert!(sim.can_start_ability(2, AbilityKind::Charge));

        sim.try_start_ability(2, AbilityKind::Charge, Some(1)).unwrap();
        assert_eq!(
            sim.ability_phase(2, AbilityKind::Charge),
            Some(Phase::Preparing)
        );
    }

    #[test]
    fn test_try_start_busy() {
        let mut sim = demo_sim();
        sim.try_start_ability(2, AbilityKind::Charge, Some(1)).unwrap();
        assert_eq!(
            sim.try_start_ability(2, AbilityKind::Charge, Some(1)),
            Err(SimError::Ability(AbilityError::Busy))
        );
    }

    #[test]
    fn test_charge_moves_and_impacts() {
        let mut sim = demo_sim();
        sim.try_start_ability(2, AbilityKind::Charge, Some(1)).unwrap();

        let mut transport = NullTransport;
        // Finish the prepare phase (0.9s).
        sim.tick(1.0, &mut transport);
        assert_eq!(sim.ability_phase(2, AbilityKind::Charge), Some(Phase::Active));

        // One active tick at 8 units/s covers 4 units; 5 - 4 = 1 unit left,
        // inside the impact radius, so the charge lands this tick.
        sim.tick(0.5, &mut transport);
        assert_eq!(
            sim.ability_phase(2, AbilityKind::Charge),
            Some(Phase::Cooldown)
        );
        assert!(sim.health_of(1).unwrap() < BASE_HEALTH);
        assert!(sim.position_of(2).unwrap().x > 0.0);
    }

    #[test]
    fn test_charge_obstruction_interrupts() {
        let mut sim = Simulation::with_obstruction(Box::new(WallAt { x: 2.0 }));
        sim.spawn(1, EntityRole::Player, Vec3::new(10.0, 0.0, 0.0)).unwrap();
        sim.spawn(2, EntityRole::Enemy, Vec3::ZERO).unwrap();
        sim.try_start_ability(2, AbilityKind::Charge, Some(1)).unwrap();

        let mut transport = NullTransport;
        sim.tick(1.0, &mut transport); // -> Active
        let events = sim.tick(0.5, &mut transport); // hits the wall

        assert_eq!(
            sim.ability_phase(2, AbilityKind::Charge),
            Some(Phase::Cooldown)
        );
        let interrupted = events.iter().any(|e| {
            matches!(
                e,
                SimEvent::PhaseChanged { event, .. }
                    if event.phase == Phase::Cooldown && event.interrupted
            )
        });
        assert!(interrupted);
        // Target untouched by an interrupted charge.
        assert_eq!(sim.health_of(1), Some(BASE_HEALTH));
    }

    #[test]
    fn test_scream_pulses_stress_with_falloff() {
        let mut sim = Simulation::new();
        sim.spawn(1, EntityRole::Player, Vec3::new(0.0, 0.0, 0.0)).unwrap();
        sim.spawn(2, EntityRole::Player, Vec3::new(6.0, 0.0, 0.0)).unwrap();
        sim.spawn(3, EntityRole::Prop, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        sim.spawn(9, EntityRole::Enemy, Vec3::ZERO).unwrap();
        sim.try_start_ability(9, AbilityKind::Scream, None).unwrap();

        let mut transport = NullTransport;
        sim.tick(1.5, &mut transport); // -> Active (prepare is 1.2s)
        sim.tick(0.25, &mut transport); // first pulse

        let near = sim.stress_of(1).unwrap();
        let far = sim.stress_of(2).unwrap();
        assert!(near > far);
        assert!(far > 0.0);
        // Props fail the role filter, and the screamer never stresses itself.
        assert_approx_eq!(sim.stress_of(3).unwrap(), 0.0, 0.001);
        assert_approx_eq!(sim.stress_of(9).unwrap(), 0.0, 0.001);
    }

    #[test]
    fn test_cancel_mid_active_stops_effects() {
        let mut sim = demo_sim();
        sim.try_start_ability(2, AbilityKind::Charge, Some(1)).unwrap();

        let mut transport = NullTransport;
        sim.tick(1.0, &mut transport); // -> Active
        let position_before = sim.position_of(2).unwrap();

        let event = sim.cancel_ability(2, AbilityKind::Charge).unwrap().unwrap();
        assert_eq!(event.phase, Phase::Cooldown);
        assert!(event.interrupted);

        // Subsequent ticks run no charge movement.
        sim.tick(0.1, &mut transport);
        assert_eq!(sim.position_of(2).unwrap(), position_before);
    }

    #[test]
    fn test_flush_sends_one_snapshot_per_observer() {
        let mut sim = demo_sim();
        sim.subscribe_all(10);
        sim.subscribe_all(11);
        sim.damage(1, 25.0).unwrap();

        let mut transport = RecordingTransport::default();
        sim.tick(0.016, &mut transport);

        // One dirty value, two observers.
        assert_eq!(transport.snapshots.len(), 2);
        let observers: Vec<ObserverId> =
            transport.snapshots.iter().map(|(o, _, _)| *o).collect();
        assert_eq!(observers, vec![10, 11]);
        assert_eq!(transport.snapshots[0].1, 1);
        assert_eq!(transport.snapshots[0].2.field, FIELD_HEALTH);

        // Nothing dirty on the next tick: no re-send of unchanged values.
        transport.snapshots.clear();
        sim.tick(0.016, &mut transport);
        assert!(transport.snapshots.is_empty());
    }

    #[test]
    fn test_phase_events_reach_observers() {
        let mut sim = demo_sim();
        sim.subscribe_all(10);
        sim.try_start_ability(2, AbilityKind::Charge, Some(1)).unwrap();

        let mut transport = RecordingTransport::default();
        sim.tick(0.016, &mut transport);

        assert_eq!(transport.events.len(), 1);
        let (observers, entity, event) = &transport.events[0];
        assert_eq!(observers.as_slice(), &[10]);
        assert_eq!(*entity, 2);
        assert_eq!(event.phase, Phase::Preparing);
    }

    #[test]
    fn test_baseline_covers_all_entities() {
        let mut sim = demo_sim();
        sim.damage(1, 30.0).unwrap();

        let baseline = sim.baseline();
        // Two entities: spawn + health + stress each.
        assert_eq!(baseline.len(), 6);
        let has_current_health = baseline.iter().any(|p| {
            matches!(
                p,
                Packet::FieldSnapshot { entity: 1, snapshot }
                    if snapshot.field == FIELD_HEALTH
                        && snapshot.value == shared::WireValue::Scalar(70.0)
            )
        });
        assert!(has_current_health);
    }
}
