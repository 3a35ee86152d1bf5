//! Observer connection management for the replication server
//!
//! This module handles the server-side roster of connected observers:
//! - Observer connection lifecycle (connect, disconnect, timeout)
//! - Connection health monitoring via heartbeats and automatic cleanup
//! - Capacity enforcement and address tracking for packet routing
//!
//! Observers are read-only consumers of replication traffic; they never send
//! inputs, so the roster tracks nothing beyond identity, address, and
//! liveness.

use log::info;
use shared::ObserverId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected observer and its liveness state.
#[derive(Debug)]
pub struct Observer {
    /// Unique observer identifier assigned by the server
    pub id: ObserverId,
    /// Network address for routing replication packets
    pub addr: SocketAddr,
    /// Last time we received any packet from this observer
    pub last_seen: Instant,
}

impl Observer {
    pub fn new(id: ObserverId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Marks the observer as recently active.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if no packets have arrived within the timeout window,
    /// indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected observers.
///
/// Provides centralized control over connections, enforces server capacity,
/// and drives timeout cleanup so replication traffic never fans out to dead
/// addresses.
pub struct ObserverManager {
    /// Connected observers indexed by their unique ID
    observers: HashMap<ObserverId, Observer>,
    /// Next available observer ID for new connections
    next_observer_id: ObserverId,
    /// Maximum number of concurrent observers allowed
    max_observers: usize,
    /// Inactivity window before an observer is dropped
    timeout: Duration,
}

impl ObserverManager {
    /// Creates a roster with the given capacity. Observer IDs start from 1
    /// and increment for each new connection.
    pub fn new(max_observers: usize) -> Self {
        Self {
            observers: HashMap::new(),
            next_observer_id: 1,
            max_observers,
            timeout: Duration::from_secs(5),
        }
    }

    /// Attempts to admit a new observer.
    ///
    /// Returns Some(observer_id) if successful, None if the server is at
    /// capacity. Logs the new connection for server monitoring.
    pub fn add_observer(&mut self, addr: SocketAddr) -> Option<ObserverId> {
        if self.observers.len() >= self.max_observers {
            return None;
        }

        let observer_id = self.next_observer_id;
        self.next_observer_id += 1;

        info!("Observer {} connected from {}", observer_id, addr);
        self.observers.insert(observer_id, Observer::new(observer_id, addr));

        Some(observer_id)
    }

    /// Removes an observer from the roster.
    ///
    /// Returns true if the observer was found and removed, false if they were
    /// already gone. Handles both explicit disconnects and timeout cleanup.
    pub fn remove_observer(&mut self, observer_id: &ObserverId) -> bool {
        if let Some(observer) = self.observers.remove(observer_id) {
            info!("Observer {} disconnected", observer.id);
            true
        } else {
            false
        }
    }

    /// Finds an observer ID by network address.
    ///
    /// Used to associate incoming packets with existing connections. Returns
    /// None if nobody is connected from the given address.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<ObserverId> {
        self.observers
            .iter()
            .find(|(_, observer)| observer.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes an observer's liveness timestamp (heartbeat received).
    pub fn touch(&mut self, observer_id: ObserverId) -> bool {
        if let Some(observer) = self.observers.get_mut(&observer_id) {
            observer.touch();
            true
        } else {
            false
        }
    }

    /// Checks for and removes timed-out observers.
    ///
    /// Returns the removed IDs so other systems (entity observer sets) can
    /// clean up their side.
    pub fn check_timeouts(&mut self) -> Vec<ObserverId> {
        let timeout = self.timeout;
        let timed_out: Vec<ObserverId> = self
            .observers
            .iter()
            .filter(|(_, observer)| observer.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for observer_id in &timed_out {
            self.remove_observer(observer_id);
        }

        timed_out
    }

    /// All observer IDs and their addresses, for broadcast fan-out.
    pub fn addrs(&self) -> Vec<(ObserverId, SocketAddr)> {
        self.observers
            .iter()
            .map(|(id, observer)| (*id, observer.addr))
            .collect()
    }

    pub fn addr_of(&self, observer_id: ObserverId) -> Option<SocketAddr> {
        self.observers.get(&observer_id).map(|o| o.addr)
    }

    /// Returns the number of currently connected observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true if no observers are currently connected.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
