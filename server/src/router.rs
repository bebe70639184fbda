//! Inbound client messages.
//!
//! Raw datagrams are decoded here and applied to the world between ticks.
//! Anything malformed, or any non-join message from a connection without a
//! session, is dropped without a reply.

use crate::entity::ServerEntity;
use crate::game::GameState;
use crate::player::PlayerData;
use log::{debug, error, info};
use rand::Rng;
use shared::packets::{decode_client_packet, ChatData};
use shared::{ClientPacket, EntityId, Vec2, Zone, MAX_CHAT_LENGTH, PLAYER_RADIUS};
use std::net::SocketAddr;

const CHAT_COLOR: u32 = 0xffffff;

impl GameState {
    /// Decodes and applies one datagram received from `addr`.
    pub fn handle_message(&mut self, data: &[u8], addr: SocketAddr) {
        let Some(packet) = decode_client_packet(data) else {
            debug!("Dropping malformed packet ({} bytes) from {}", data.len(), addr);
            return;
        };
        self.handle_packet(packet, addr);
    }

    /// Applies one decoded packet received from `addr`.
    pub fn handle_packet(&mut self, packet: ClientPacket, addr: SocketAddr) {
        if let ClientPacket::Join { name } = packet {
            self.join(addr, &name);
            return;
        }

        let Some(id) = self.player_id(&addr) else {
            debug!("Dropping {:?} from {} which has no session", packet, addr);
            return;
        };

        match packet {
            ClientPacket::Input {
                direction,
                movement,
                attacking,
            } => {
                if let Some(player) = self.player_mut(id) {
                    player.set_input(direction, movement, attacking);
                }
            }
            ClientPacket::Chat { content } => self.chat(id, &content),
            ClientPacket::Leave => {
                self.remove_player(addr);
            }
            ClientPacket::Join { .. } => {}
        }
    }

    /// Starts a session on `addr`. A session already open on the same
    /// connection is closed first; its inventory and experience carry over.
    pub fn join(&mut self, addr: SocketAddr, name: &str) -> Option<EntityId> {
        let carried = self
            .player_id(&addr)
            .and_then(|id| self.player(id))
            .map(|previous| (previous.inventory.clone(), previous.exp()));
        self.remove_player(addr);

        let id = match self.ids.allocate() {
            Ok(id) => id,
            Err(err) => {
                error!("Cannot admit {}: {}", addr, err);
                return None;
            }
        };

        let mut player = PlayerData::new(addr, name);
        if let Some((inventory, exp)) = carried {
            player.set_inventory(inventory);
            player.add_exp(exp);
        }

        let level = player.level();
        let zone_index = self.spawn_zone_index(level);
        let position = self.random_position_in(zone_index, PLAYER_RADIUS);
        info!(
            "\"{}\" ({}) joined as entity {} at level {} in the {}",
            player.name, addr, id, level, self.zones[zone_index].name
        );

        let mut entity = ServerEntity::player(id, position, player);
        entity.set_position(position, &self.bounds);
        self.add_entity(entity);
        self.connections.insert(addr, id);
        self.leaderboard_dirty = true;
        Some(id)
    }

    /// The zone with the highest entry level not above `level`. Ties go
    /// to the zone declared last.
    pub fn spawn_zone_for(&self, level: u32) -> Option<&Zone> {
        spawn_zone_index(&self.zones, level).map(|index| &self.zones[index])
    }

    fn spawn_zone_index(&self, level: u32) -> usize {
        spawn_zone_index(&self.zones, level).unwrap_or(0)
    }

    fn random_position_in(&mut self, zone_index: usize, radius: f32) -> Vec2 {
        let zone = &self.zones[zone_index];
        let sample = Vec2::new(
            self.rng.gen_range(zone.x..zone.end()),
            self.rng.gen_range(0.0..self.bounds.height),
        );
        self.bounds.clamp(sample, radius)
    }

    fn chat(&mut self, id: EntityId, content: &str) {
        let content = sanitize_chat(content);
        if content.is_empty() {
            return;
        }
        let Some(player) = self.player(id) else {
            return;
        };

        let line = format!("{}: {}", player.name, content);
        info!("[chat] {}", line);
        self.broadcast_chat(ChatData {
            content: line,
            color: CHAT_COLOR,
        });
    }
}

fn spawn_zone_index(zones: &[Zone], level: u32) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, zone) in zones.iter().enumerate() {
        if zone.level_at_lowest > level {
            continue;
        }
        match best {
            Some(current) if zones[current].level_at_lowest > zone.level_at_lowest => {}
            _ => best = Some(index),
        }
    }
    best
}

fn sanitize_chat(content: &str) -> String {
    content
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_CHAT_LENGTH)
        .collect::<String>()
        .trim()
        .to_string()
}
