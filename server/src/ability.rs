//! Timed ability state machines
//!
//! Multi-phase abilities (prepare, active, cooldown) are driven by explicit
//! phase and timer state advanced through discrete `tick` calls. There is no
//! suspension anywhere: cancellation is a synchronous transition, and every
//! `Preparing`/`Active` pair is guaranteed a matching `Cooldown` so observers
//! always see balanced phase traffic.
//!
//! Ability variants are a closed set of tags; each tag maps to its phase
//! durations through a static table and to a per-variant effect supplied by
//! the simulation layer. No subclassing, no reflection.

use crate::authority::RoleCtx;
use shared::{AbilityKind, EntityId, Phase, PhaseEvent};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AbilityError {
    /// Start attempted while the machine is not idle.
    #[error("ability is already running")]
    Busy,
    /// Start attempted with a missing or despawned target.
    #[error("missing or invalid ability target")]
    InvalidTarget,
    #[error("mutation attempted outside the server role")]
    NotAuthoritative,
}

/// Phase durations in seconds. One cooldown duration covers both completed
/// and interrupted endings; the interrupted flag is the only distinction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilityConfig {
    pub prepare: f32,
    pub active: f32,
    pub cooldown: f32,
}

/// Extension methods for [`AbilityKind`]; an inherent impl is forbidden here
/// because the enum is defined in `shared` (orphan rule).
pub trait AbilityKindExt {
    /// Static tag-to-configuration table.
    fn config(self) -> AbilityConfig;
    /// Whether `try_start` demands a live target entity.
    fn requires_target(self) -> bool;
}

impl AbilityKindExt for AbilityKind {
    fn config(self) -> AbilityConfig {
        match self {
            AbilityKind::Charge => AbilityConfig {
                prepare: 0.9,
                active: 2.5,
                cooldown: 3.0,
            },
            AbilityKind::Scream => AbilityConfig {
                prepare: 1.2,
                active: 2.0,
                cooldown: 8.0,
            },
        }
    }

    fn requires_target(self) -> bool {
        match self {
            AbilityKind::Charge => true,
            AbilityKind::Scream => false,
        }
    }
}

/// What the per-tick active-phase effect asks the machine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectOutcome {
    /// Keep the active phase running.
    pub proceed: bool,
    /// When stopping, whether the ability was cut short (obstruction) rather
    /// than finishing its work.
    pub interrupted: bool,
}

impl EffectOutcome {
    pub fn proceed() -> Self {
        Self {
            proceed: true,
            interrupted: false,
        }
    }

    pub fn stop(interrupted: bool) -> Self {
        Self {
            proceed: false,
            interrupted,
        }
    }
}

/// One ability instance on one entity.
#[derive(Debug, Clone)]
pub struct AbilityMachine {
    kind: AbilityKind,
    config: AbilityConfig,
    phase: Phase,
    /// Remaining seconds in the current phase.
    timer: f32,
    target: Option<EntityId>,
    interrupted: bool,
}

impl AbilityMachine {
    pub fn new(kind: AbilityKind) -> Self {
        Self::with_config(kind, kind.config())
    }

    pub fn with_config(kind: AbilityKind, config: AbilityConfig) -> Self {
        Self {
            kind,
            config,
            phase: Phase::Idle,
            timer: 0.0,
            target: None,
            interrupted: false,
        }
    }

    pub fn kind(&self) -> AbilityKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn remaining(&self) -> f32 {
        self.timer
    }

    /// True only in `Idle`; the one state `try_start` succeeds from.
    pub fn can_start(&self) -> bool {
        self.phase == Phase::Idle
    }

    fn event(&self, phase: Phase, interrupted: bool) -> PhaseEvent {
        PhaseEvent {
            ability: self.kind,
            phase,
            interrupted,
        }
    }

    fn enter_cooldown(&mut self, interrupted: bool) -> PhaseEvent {
        self.phase = Phase::Cooldown;
        self.timer = self.config.cooldown;
        self.interrupted = interrupted;
        self.event(Phase::Cooldown, interrupted)
    }

    /// Arms the prepare phase. Target validity is the caller's concern; the
    /// simulation layer checks the registry before handing the target in.
    pub fn try_start(
        &mut self,
        ctx: &RoleCtx,
        target: Option<EntityId>,
    ) -> Result<PhaseEvent, AbilityError> {
        if !ctx.is_server() {
            return Err(AbilityError::NotAuthoritative);
        }
        if self.phase != Phase::Idle {
            return Err(AbilityError::Busy);
        }

        self.target = target;
        self.timer = self.config.prepare;
        self.interrupted = false;
        self.phase = Phase::Preparing;
        Ok(self.event(Phase::Preparing, false))
    }

    /// Advances the phase timer by `dt`, running the active-phase effect.
    ///
    /// At most one transition happens per call; leftover time is not carried
    /// into the next phase. Returns the transition event when one fired.
    pub fn tick<F>(&mut self, dt: f32, mut effect: F) -> Option<PhaseEvent>
    where
        F: FnMut(Option<EntityId>) -> EffectOutcome,
    {
        match self.phase {
            Phase::Idle => None,
            Phase::Preparing => {
                self.timer -= dt;
                if self.timer <= 0.0 {
                    self.phase = Phase::Active;
                    self.timer = self.config.active;
                    Some(self.event(Phase::Active, false))
                } else {
                    None
                }
            }
            Phase::Active => {
                let outcome = effect(self.target);
                if !outcome.proceed {
                    return Some(self.enter_cooldown(outcome.interrupted));
                }
                self.timer -= dt;
                if self.timer <= 0.0 {
                    Some(self.enter_cooldown(false))
                } else {
                    None
                }
            }
            Phase::Cooldown => {
                self.timer -= dt;
                if self.timer <= 0.0 {
                    self.phase = Phase::Idle;
                    self.timer = 0.0;
                    self.target = None;
                    self.interrupted = false;
                    Some(self.event(Phase::Idle, false))
                } else {
                    None
                }
            }
        }
    }

    /// Forces `Preparing`/`Active` straight into `Cooldown`, flagged
    /// interrupted. Takes effect immediately: no effect callback fires after
    /// this returns. No-op from `Idle` or `Cooldown`.
    pub fn cancel(&mut self) -> Option<PhaseEvent> {
        match self.phase {
            Phase::Preparing | Phase::Active => Some(self.enter_cooldown(true)),
            Phase::Idle | Phase::Cooldown => None,
        }
    }
}
