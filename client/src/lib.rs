//! # Observer Client Library
//!
//! Client-side implementation for the replicated entity state engine. The
//! client is a pure observer: it connects to an authoritative server, receives
//! spawn notices and field snapshots over UDP, and maintains read-only mirrors
//! of the server-owned state. It never mutates replicated values and never
//! sends gameplay traffic, only the connection handshake and heartbeats.
//!
//! ## Module Organization
//!
//! ### Mirror Module (`mirror`)
//! The [`mirror::MirrorStore`] holds the last applied snapshot per
//! (entity, field) pair. Per-value sequence numbers filter stale and
//! duplicate deliveries, so applying a snapshot is always safe.
//!
//! ### Network Module (`network`)
//! The [`network::Client`] owns the UDP socket and the async event loop:
//! connection handshake with protocol version check, periodic heartbeats to
//! stay out of the server's timeout sweep, and packet dispatch into the
//! mirror store.

pub mod mirror;
pub mod network;
