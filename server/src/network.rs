//! Server network layer handling UDP communications and game loop coordination
//!
//! Socket I/O runs on two helper tasks. The receiver forwards raw datagrams to
//! the main loop and the sender encodes and writes outgoing packets. The main
//! loop owns the [`GameState`] outright and `select!`s between incoming
//! datagrams, the tick interval and a once-a-second timeout sweep, so every
//! world mutation happens on that one task.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::game::{GameState, Outbound, WorldConfig};
use log::{debug, error, info, warn};
use shared::packets::{decode_client_packet, encode_server_packet};
use shared::{ClientPacket, ServerPacket};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Largest datagram read from the socket
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Largest payload a single UDP datagram can carry
const MAX_UDP_PAYLOAD: usize = 65_507;

const TIMEOUT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    DatagramReceived { data: Vec<u8>, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: ServerPacket,
        addr: SocketAddr,
    },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: ClientManager,
    game_state: GameState,
    config: ServerConfig,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig, world: WorldConfig) -> ServerResult<Self> {
        let game_state = GameState::new(world)?;
        let socket = Arc::new(UdpSocket::bind(config.address()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: ClientManager::new(config.max_clients),
            game_state,
            config,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle for stopping a running server from another task
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming datagrams
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let message = ServerMessage::DatagramReceived {
                            data: buffer[..len].to_vec(),
                            addr,
                        };
                        if server_tx.send(message).is_err() {
                            debug!("Main loop gone, stopping receiver");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &ServerPacket,
        addr: SocketAddr,
    ) -> ServerResult<()> {
        let data = encode_server_packet(packet)?;
        if data.len() > MAX_UDP_PAYLOAD {
            warn!(
                "Dropping {} byte packet to {}: too large for one datagram",
                data.len(),
                addr
            );
            return Ok(());
        }
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: ServerPacket, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Decodes a datagram and hands it to the world. Malformed datagrams
    /// and traffic from unknown addresses are dropped without a reply; only
    /// a join admits a new address.
    fn handle_datagram(&mut self, data: &[u8], addr: SocketAddr) {
        let Some(packet) = decode_client_packet(data) else {
            debug!("Dropping malformed datagram ({} bytes) from {}", data.len(), addr);
            return;
        };

        match packet {
            ClientPacket::Join { .. } => {
                if !self.clients.admit(addr) {
                    warn!("Rejecting {}: server full", addr);
                    self.send_packet(
                        ServerPacket::Disconnected {
                            reason: "Server full".to_string(),
                        },
                        addr,
                    );
                    return;
                }
            }
            _ => {
                if !self.clients.touch(addr) {
                    debug!("Dropping packet from unknown address {}", addr);
                    return;
                }
            }
        }

        let leaving = matches!(packet, ClientPacket::Leave);
        self.game_state.handle_packet(packet, addr);
        if leaving {
            self.clients.remove_client(&addr);
        }
    }

    fn run_tick(&mut self) {
        let outbound = self.game_state.tick(Instant::now());
        for Outbound { addr, packet } in outbound {
            self.send_packet(packet, addr);
        }
    }

    fn check_timeouts(&mut self) {
        for addr in self.clients.check_timeouts(self.config.client_timeout()) {
            self.game_state.remove_player(addr);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> ServerResult<()> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut tick_interval = interval(self.config.tick_interval());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timeout_interval = interval(TIMEOUT_SWEEP_INTERVAL);

        info!(
            "Server started at {} Hz ({:?} per tick)",
            self.config.tick_rate,
            self.config.tick_interval()
        );

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::DatagramReceived { data, addr }) => {
                            self.handle_datagram(&data, addr);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => self.run_tick(),

                _ = timeout_interval.tick() => self.check_timeouts(),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::packets::{decode_server_packet, encode_client_packet};
    use shared::Zone;
    use tokio::time::timeout;

    fn test_config(max_clients: usize) -> ServerConfig {
        ServerConfig {
            port: 0,
            max_clients,
            ..ServerConfig::default()
        }
    }

    fn quiet_world() -> WorldConfig {
        WorldConfig::with_zones(vec![Zone::new("Test", 0.0, 100.0, 0.0, 1)]).seeded(3)
    }

    async fn recv_packet(socket: &UdpSocket) -> ServerPacket {
        let mut buffer = vec![0u8; MAX_UDP_PAYLOAD];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("timed out waiting for the server")
            .unwrap();
        decode_server_packet(&buffer[..len]).expect("undecodable packet")
    }

    #[tokio::test]
    async fn test_full_server_rejects_new_connections() {
        let mut server = Server::new(test_config(1), quiet_world()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move { server.run().await });

        let join = encode_client_packet(&ClientPacket::Join { name: "first".into() }).unwrap();
        let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        first.send_to(&join, addr).await.unwrap();
        assert!(matches!(recv_packet(&first).await, ServerPacket::Update(_)));

        let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        second.send_to(&join, addr).await.unwrap();
        match recv_packet(&second).await {
            ServerPacket::Disconnected { reason } => assert_eq!(reason, "Server full"),
            other => panic!("expected rejection, got {:?}", other),
        }

        shutdown.send(ServerMessage::Shutdown).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn join_bytes(name: &str) -> Vec<u8> {
        encode_client_packet(&ClientPacket::Join { name: name.into() }).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_datagrams_take_no_slot() {
        let mut server = Server::new(test_config(1), quiet_world()).await.unwrap();

        server.handle_datagram(&[1, 2, 3], peer(5001));
        assert!(server.clients.is_empty());
        assert!(server.game_rx.try_recv().is_err());

        server.handle_datagram(&join_bytes("legit"), peer(5002));
        assert!(server.clients.contains(&peer(5002)));
        assert_eq!(server.game_state.player_count(), 1);
        assert!(server.game_rx.try_recv().is_err());

        // Full now, junk still gets no reply
        server.handle_datagram(&[9, 9, 9], peer(5003));
        assert!(server.game_rx.try_recv().is_err());
        assert_eq!(server.clients.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_address_cannot_skip_join() {
        let mut server = Server::new(test_config(1), quiet_world()).await.unwrap();
        let chat = encode_client_packet(&ClientPacket::Chat {
            content: "hi".into(),
        })
        .unwrap();

        server.handle_datagram(&chat, peer(5010));
        assert!(server.clients.is_empty());
        assert!(server.game_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_leave_frees_connection_slot() {
        let mut server = Server::new(test_config(1), quiet_world()).await.unwrap();
        let leave = encode_client_packet(&ClientPacket::Leave).unwrap();

        server.handle_datagram(&join_bytes("first"), peer(5020));
        server.handle_datagram(&leave, peer(5020));
        assert!(server.clients.is_empty());
        assert_eq!(server.game_state.player_count(), 0);

        server.handle_datagram(&join_bytes("second"), peer(5021));
        assert!(server.clients.contains(&peer(5021)));
        assert_eq!(server.game_state.player_count(), 1);
        assert!(server.game_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_world_fails_construction() {
        let result = Server::new(test_config(4), WorldConfig::with_zones(Vec::new())).await;
        assert!(result.is_err());
    }
}
