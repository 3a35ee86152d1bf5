use crate::mirror::MirrorStore;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, FIELD_HEALTH, FIELD_STRESS, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
const STATUS_INTERVAL: Duration = Duration::from_secs(2);

/// Headless observer: connects, heartbeats, and keeps a [`MirrorStore`]
/// up to date from server packets. It never sends state of its own.
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    observer_id: Option<u32>,
    connected: bool,

    mirror: MirrorStore,
}

impl Client {
    pub async fn new(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            observer_id: None,
            connected: false,
            mirror: MirrorStore::new(),
        })
    }

    pub fn mirror(&self) -> &MirrorStore {
        &self.mirror
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to {}...", self.server_addr);

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Returns false when the connection should be torn down.
    fn handle_packet(&mut self, packet: Packet) -> bool {
        match packet {
            Packet::Connected { observer_id } => {
                info!("Connected! Observer ID: {}", observer_id);
                self.observer_id = Some(observer_id);
                self.connected = true;
            }

            Packet::EntitySpawned {
                entity,
                role,
                position,
            } => {
                debug!("Entity {} spawned as {:?} at {:?}", entity, role, position);
                self.mirror.spawn(entity, role, position);
            }

            Packet::EntityDespawned { entity } => {
                debug!("Entity {} despawned", entity);
                self.mirror.despawn(entity);
            }

            Packet::FieldSnapshot { entity, snapshot } => {
                if !self.mirror.apply(entity, snapshot) {
                    debug!(
                        "Dropped stale snapshot for entity {} field {} (seq {})",
                        entity, snapshot.field, snapshot.sequence
                    );
                }
            }

            Packet::AbilityEvent { entity, event } => {
                if event.interrupted {
                    info!(
                        "Entity {} ability {:?} interrupted, now {:?}",
                        entity, event.ability, event.phase
                    );
                } else {
                    info!(
                        "Entity {} ability {:?} entered {:?}",
                        entity, event.ability, event.phase
                    );
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.observer_id = None;
                return false;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }

        true
    }

    fn log_status(&self) {
        if !self.connected {
            return;
        }

        for (id, entity) in self.mirror.entities() {
            let health = self.mirror.scalar_of(*id, FIELD_HEALTH);
            let stress = self.mirror.scalar_of(*id, FIELD_STRESS);
            info!(
                "Entity {} ({:?}): health {:?}, stress {:?}",
                id, entity.role, health, stress
            );
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        let mut status_interval = interval(STATUS_INTERVAL);

        let mut buffer = [0u8; 2048];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                if !self.handle_packet(packet) {
                                    break;
                                }
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        let timestamp = std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or(Duration::from_secs(0))
                            .as_millis() as u64;

                        if let Err(e) = self.send_packet(&Packet::Heartbeat { timestamp }).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },

                _ = status_interval.tick() => {
                    self.log_status();
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
