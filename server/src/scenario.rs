//! Demo scenario driving the simulation when no game layer is attached
//!
//! The director stands in for the AI/gameplay layer: it spawns a small hunt
//! (two players, one enemy), wanders the players, and triggers the enemy's
//! abilities at jittered intervals so connected observers see live
//! replication traffic.

use crate::sim::Simulation;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{AbilityKind, EntityId, EntityRole, Vec3};

/// Domain logic hook invoked once per server tick, before the simulation
/// advances.
pub trait Director {
    fn tick(&mut self, sim: &mut Simulation, dt: f32);
}

const PLAYER_IDS: [EntityId; 2] = [1, 2];
const ENEMY_ID: EntityId = 10;
const PLAYER_WANDER_SPEED: f32 = 2.0;

pub struct HuntDirector {
    rng: StdRng,
    spawned: bool,
    next_scream: f32,
    next_charge: f32,
}

impl HuntDirector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            spawned: false,
            next_scream: 4.0,
            next_charge: 9.0,
        }
    }

    fn spawn_world(&mut self, sim: &mut Simulation) {
        let _ = sim.spawn(PLAYER_IDS[0], EntityRole::Player, Vec3::new(6.0, 0.0, 2.0));
        let _ = sim.spawn(PLAYER_IDS[1], EntityRole::Player, Vec3::new(-4.0, 0.0, 7.0));
        let _ = sim.spawn(ENEMY_ID, EntityRole::Enemy, Vec3::ZERO);
        self.spawned = true;
    }

    fn wander_players(&mut self, sim: &mut Simulation, dt: f32) {
        for id in PLAYER_IDS {
            if let Ok(pos) = sim.position_of(id) {
                let dx: f32 = self.rng.gen_range(-1.0..1.0);
                let dz: f32 = self.rng.gen_range(-1.0..1.0);
                let next = Vec3::new(
                    pos.x + dx * PLAYER_WANDER_SPEED * dt,
                    pos.y,
                    pos.z + dz * PLAYER_WANDER_SPEED * dt,
                );
                let _ = sim.set_position(id, next);
            }
        }
    }

    fn pick_target(&mut self, sim: &Simulation) -> Option<EntityId> {
        // Nearest player inside a generous hunt radius.
        let enemy_pos = sim.position_of(ENEMY_ID).ok()?;
        sim.registry()
            .entities_in_radius(&enemy_pos, 50.0, Some(EntityRole::Player))
            .into_iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, _)| id)
    }
}

impl Director for HuntDirector {
    fn tick(&mut self, sim: &mut Simulation, dt: f32) {
        if !self.spawned {
            self.spawn_world(sim);
            return;
        }

        self.wander_players(sim, dt);

        self.next_scream -= dt;
        if self.next_scream <= 0.0 {
            self.next_scream = self.rng.gen_range(6.0..12.0);
            if sim.can_start_ability(ENEMY_ID, AbilityKind::Scream) {
                if let Err(e) = sim.try_start_ability(ENEMY_ID, AbilityKind::Scream, None) {
                    debug!("scream not started: {}", e);
                }
            }
        }

        self.next_charge -= dt;
        if self.next_charge <= 0.0 {
            self.next_charge = self.rng.gen_range(8.0..16.0);
            if sim.can_start_ability(ENEMY_ID, AbilityKind::Charge) {
                let target = self.pick_target(sim);
                if let Err(e) = sim.try_start_ability(ENEMY_ID, AbilityKind::Charge, target) {
                    debug!("charge not started: {}", e);
                }
            }
        }
    }
}
