//! # Replicated Entity State Server Library
//!
//! This library provides the authoritative half of the replicated entity
//! state engine. It owns the canonical mutable state for every entity —
//! health, stress, ability phases — mutates it only inside the single server
//! tick, and multicasts immutable snapshots to observing clients.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the definitive version of all entity state. Every mutation
//! goes through a role-checked authoritative container; clients receive and
//! conform to the server's snapshots and never write back.
//!
//! ### Timed Abilities
//! Multi-phase abilities (prepare, active, cooldown) are explicit state
//! machines advanced by discrete tick calls. Cancellation is synchronous and
//! first-class: once an ability is cancelled, no further active-phase effect
//! runs, and observers always see a matching cooldown for every start.
//!
//! ### Replication Fan-out
//! Dirty values are flushed once per tick into one snapshot per observer,
//! tagged with a per-value monotonic sequence so late or duplicated delivery
//! is harmless. Phase transitions are broadcast as events to the owning
//! entity's observer set.
//!
//! ## Architecture Design
//!
//! ### Single-Writer Tick Loop
//! All mutation happens sequentially inside one tick loop on the server role.
//! There are no concurrent writers and therefore no locks around entity
//! state; the async networking tasks communicate with the loop over channels.
//!
//! ### Injected Collaborators
//! The role context, the obstruction check used by charge movement, the
//! outgoing [`sim::Transport`], and the scenario [`scenario::Director`] are
//! all passed in at construction. Nothing in the crate reaches for global
//! state.
//!
//! ## Module Organization
//!
//! - [`registry`] — entity lifecycle, observer membership, radius queries
//! - [`authority`] — role-gated authoritative value containers
//! - [`ability`] — the timed ability state machine and its variant table
//! - [`proximity`] — radial falloff propagation for stress and damage
//! - [`sim`] — the simulation driver tying the above together per tick
//! - [`observers`] — connected observer roster with heartbeat timeouts
//! - [`network`] — UDP replication fan-out and the main server loop
//! - [`scenario`] — demo director standing in for the gameplay layer
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::scenario::HuntDirector;
//! use server::sim::Simulation;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sim = Simulation::new();
//!     let director = Box::new(HuntDirector::new(42));
//!
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(33), // 30Hz tick
//!         32,
//!         sim,
//!         Some(director),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod ability;
pub mod authority;
pub mod network;
pub mod observers;
pub mod proximity;
pub mod registry;
pub mod scenario;
pub mod sim;
