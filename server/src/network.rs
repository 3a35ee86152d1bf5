//! Server network layer handling UDP replication fan-out and the tick loop

use crate::observers::ObserverManager;
use crate::scenario::Director;
use crate::sim::{SimEvent, Simulation, Transport};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{EntityId, ObserverId, Packet, PhaseEvent, Snapshot, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Instant};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ObserverTimeout {
        observer_id: ObserverId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the tick loop to the network sender task
#[derive(Debug)]
pub enum NetMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ObserverId>,
    },
}

/// [`Transport`] implementation that routes snapshots and phase events to
/// observer addresses through the sender task's queue.
pub struct UdpFanout<'a> {
    pub net_tx: &'a mpsc::UnboundedSender<NetMessage>,
    pub addrs: &'a HashMap<ObserverId, SocketAddr>,
}

impl Transport for UdpFanout<'_> {
    fn send_snapshot(&mut self, observer: ObserverId, entity: EntityId, snapshot: Snapshot) {
        if let Some(&addr) = self.addrs.get(&observer) {
            let message = NetMessage::SendPacket {
                packet: Packet::FieldSnapshot { entity, snapshot },
                addr,
            };
            if let Err(e) = self.net_tx.send(message) {
                error!("Failed to queue snapshot for observer {}: {}", observer, e);
            }
        }
    }

    fn send_event(&mut self, observers: &[ObserverId], entity: EntityId, event: PhaseEvent) {
        for observer in observers {
            if let Some(&addr) = self.addrs.get(observer) {
                let message = NetMessage::SendPacket {
                    packet: Packet::AbilityEvent { entity, event },
                    addr,
                };
                if let Err(e) = self.net_tx.send(message) {
                    error!("Failed to queue event for observer {}: {}", observer, e);
                }
            }
        }
    }
}

/// Main server coordinating networking and the authoritative simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    observers: Arc<RwLock<ObserverManager>>,
    sim: Simulation,
    director: Option<Box<dyn Director + Send>>,
    tick_duration: Duration,
    tick_count: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    net_tx: mpsc::UnboundedSender<NetMessage>,
    net_rx: mpsc::UnboundedReceiver<NetMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_observers: usize,
        sim: Simulation,
        director: Option<Box<dyn Director + Send>>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (net_tx, net_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            observers: Arc::new(RwLock::new(ObserverManager::new(max_observers))),
            sim,
            director,
            tick_duration,
            tick_count: 0,
            server_tx,
            server_rx,
            net_tx,
            net_rx,
        })
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let observers = Arc::clone(&self.observers);
        let mut net_rx = std::mem::replace(&mut self.net_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = net_rx.recv().await {
                match message {
                    NetMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    NetMessage::BroadcastPacket { packet, exclude } => {
                        let observer_addrs = {
                            let observers_guard = observers.read().await;
                            observers_guard.addrs()
                        };

                        for (observer_id, addr) in observer_addrs {
                            if Some(observer_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to observer {}: {}", observer_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors observer timeouts
    async fn spawn_timeout_checker(&self) {
        let observers = Arc::clone(&self.observers);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut observers_guard = observers.write().await;
                    observers_guard.check_timeouts()
                };

                for observer_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ObserverTimeout { observer_id })
                    {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.net_tx.send(NetMessage::SendPacket {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    async fn broadcast_packet(&self, packet: &Packet, exclude: Option<ObserverId>) {
        if let Err(e) = self.net_tx.send(NetMessage::BroadcastPacket {
            packet: packet.clone(),
            exclude,
        }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Processes incoming packets and updates the observer roster
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Observer connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Disconnected {
                        reason: format!("Unsupported protocol version {}", client_version),
                    };
                    self.send_packet(&response, addr).await;
                    return;
                }

                // Remove existing connection if present
                let existing_id = {
                    let observers = self.observers.read().await;
                    observers.find_by_addr(addr)
                };

                if let Some(existing_id) = existing_id {
                    info!("Removing existing observer {} from {}", existing_id, addr);
                    let mut observers = self.observers.write().await;
                    observers.remove_observer(&existing_id);
                    self.sim.unsubscribe_all(existing_id);
                }

                // Try to admit the new observer
                let observer_id = {
                    let mut observers = self.observers.write().await;
                    observers.add_observer(addr)
                };

                if let Some(observer_id) = observer_id {
                    self.sim.subscribe_all(observer_id);
                    let response = Packet::Connected { observer_id };
                    self.send_packet(&response, addr).await;

                    // Full-state baseline so the mirror starts consistent.
                    for packet in self.sim.baseline() {
                        self.send_packet(&packet, addr).await;
                    }
                } else {
                    let response = Packet::Disconnected {
                        reason: "Server full".to_string(),
                    };
                    self.send_packet(&response, addr).await;
                }
            }

            Packet::Heartbeat { .. } => {
                let observer_id = {
                    let observers = self.observers.read().await;
                    observers.find_by_addr(addr)
                };

                if let Some(observer_id) = observer_id {
                    let mut observers = self.observers.write().await;
                    observers.touch(observer_id);
                }
            }

            Packet::Disconnect => {
                let observer_id = {
                    let observers = self.observers.read().await;
                    observers.find_by_addr(addr)
                };

                if let Some(observer_id) = observer_id {
                    let mut observers = self.observers.write().await;
                    observers.remove_observer(&observer_id);
                    self.sim.unsubscribe_all(observer_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from observer at {}", addr);
            }
        }
    }

    /// Advances the simulation one tick and fans replication out
    async fn run_tick(&mut self, dt: f32) {
        if let Some(director) = self.director.as_mut() {
            director.tick(&mut self.sim, dt);
        }

        let addrs: HashMap<ObserverId, SocketAddr> = {
            let observers = self.observers.read().await;
            observers.addrs().into_iter().collect()
        };

        let events = {
            let mut fanout = UdpFanout {
                net_tx: &self.net_tx,
                addrs: &addrs,
            };
            self.sim.tick(dt, &mut fanout)
        };

        for event in events {
            match event {
                SimEvent::Spawned {
                    entity,
                    role,
                    position,
                } => {
                    // Mid-session spawns join every live observer's set and
                    // get announced with their current snapshots.
                    for observer_id in addrs.keys() {
                        let _ = self.sim.add_observer(entity, *observer_id);
                    }
                    self.broadcast_packet(
                        &Packet::EntitySpawned {
                            entity,
                            role,
                            position,
                        },
                        None,
                    )
                    .await;
                    for snapshot in self.sim.entity_snapshots(entity) {
                        self.broadcast_packet(&Packet::FieldSnapshot { entity, snapshot }, None)
                            .await;
                    }
                }
                SimEvent::Despawned { entity } => {
                    self.broadcast_packet(&Packet::EntityDespawned { entity }, None)
                        .await;
                }
                SimEvent::Depleted { entity, field } => {
                    info!("Entity {} field {} depleted", entity, field);
                }
                // Already fanned out through the transport.
                SimEvent::PhaseChanged { .. } => {}
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ObserverTimeout { observer_id }) => {
                            info!("Observer {} timed out", observer_id);
                            self.sim.unsubscribe_all(observer_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    self.run_tick(dt).await;
                    self.tick_count += 1;

                    // Periodic health monitoring
                    if self.tick_count % 60 == 0 {
                        let observer_count = {
                            let observers = self.observers.read().await;
                            observers.len()
                        };

                        if observer_count > 0 {
                            debug!("Tick {}: {} entities, {} observers, {:.1}Hz",
                                   self.tick_count, self.sim.len(), observer_count, 1.0 / dt);
                        }
                    }
                },
            }
        }

        Ok(())
    }
}
