//! Wire packets exchanged between clients and the server.
//!
//! Packets are serde types encoded with bincode. The server core only reads
//! the discriminant and a handful of fields; per-entity state travels as
//! opaque byte payloads ([`EntityPayload`]) that each entity produces itself
//! and that clients decode into [`EntityPartial`] / [`EntityFull`].

use crate::math::Vec2;
use crate::EntityId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientPacket {
    /// Starts (or restarts) a session on this connection.
    Join { name: String },
    Input {
        /// Desired heading; normalised by the server.
        direction: Vec2,
        /// Fraction of full speed in `[0, 1]`.
        movement: f32,
        attacking: bool,
    },
    Chat { content: String },
    Leave,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerPacket {
    Update(UpdateData),
    Disconnected { reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateData {
    pub tick: u32,
    pub deleted_entities: Vec<EntityId>,
    /// Entities the client must (re)create: carries both payload forms.
    pub full_entities: Vec<EntityPayload>,
    /// Entities the client already knows about: partial payload only.
    pub partial_entities: Vec<EntityPayload>,
    pub player: Option<PlayerUpdate>,
    pub chat: Vec<ChatData>,
    pub map: Option<MapData>,
    pub leaderboard: Option<Vec<LeaderboardEntry>>,
}

impl UpdateData {
    pub fn is_empty(&self) -> bool {
        self.deleted_entities.is_empty()
            && self.full_entities.is_empty()
            && self.partial_entities.is_empty()
            && self.player.is_none()
            && self.chat.is_empty()
            && self.map.is_none()
            && self.leaderboard.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPayload {
    pub id: EntityId,
    pub partial: Vec<u8>,
    pub full: Option<Vec<u8>>,
}

/// State that changes often: sent whenever an entity moves or is hurt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPartial {
    pub position: Vec2,
    pub direction: Vec2,
    pub health_ratio: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKindTag {
    Player,
    Mob,
    Projectile,
}

/// State that rarely changes: sent on first sight and on full refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFull {
    pub kind: EntityKindTag,
    pub radius: f32,
    /// Definition id string for mobs and projectiles.
    pub definition: Option<String>,
    /// Display name for players.
    pub name: Option<String>,
    pub dead: bool,
}

/// Per-session player fields. Only fields that changed this tick are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub id: Option<EntityId>,
    pub inventory: Option<Vec<String>>,
    pub exp: Option<u32>,
    pub level: Option<u32>,
    pub dead: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatData {
    pub content: String,
    /// Packed `0xRRGGBB` colour.
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneBand {
    pub name: String,
    pub x: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapData {
    pub width: f32,
    pub height: f32,
    pub zones: Vec<ZoneBand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: EntityId,
    pub name: String,
    pub exp: u32,
}

/// Decodes one client packet; anything malformed yields `None`.
pub fn decode_client_packet(data: &[u8]) -> Option<ClientPacket> {
    bincode::deserialize(data).ok()
}

pub fn encode_client_packet(packet: &ClientPacket) -> bincode::Result<Vec<u8>> {
    bincode::serialize(packet)
}

pub fn decode_server_packet(data: &[u8]) -> Option<ServerPacket> {
    bincode::deserialize(data).ok()
}

pub fn encode_server_packet(packet: &ServerPacket) -> bincode::Result<Vec<u8>> {
    bincode::serialize(packet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_packet_decodes() {
        let data = encode_client_packet(&ClientPacket::Join {
            name: "tester".to_string(),
        })
        .unwrap();

        match decode_client_packet(&data) {
            Some(ClientPacket::Join { name }) => assert_eq!(name, "tester"),
            other => panic!("Unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_packets_are_rejected() {
        assert!(decode_client_packet(&[]).is_none());
        assert!(decode_client_packet(&[0xff, 0xff, 0xff, 0xff]).is_none());

        let data = encode_client_packet(&ClientPacket::Chat {
            content: "hello there".to_string(),
        })
        .unwrap();
        assert!(decode_client_packet(&data[..data.len() / 2]).is_none());
    }

    #[test]
    fn test_entity_payload_decodes_on_client_side() {
        let partial = EntityPartial {
            position: Vec2::new(4.0, 2.0),
            direction: Vec2::new(0.0, 1.0),
            health_ratio: 0.5,
        };
        let payload = EntityPayload {
            id: 7,
            partial: bincode::serialize(&partial).unwrap(),
            full: None,
        };

        let decoded: EntityPartial = bincode::deserialize(&payload.partial).unwrap();
        assert_eq!(decoded, partial);
    }

    #[test]
    fn test_empty_update() {
        let mut update = UpdateData::default();
        assert!(update.is_empty());
        update.deleted_entities.push(3);
        assert!(!update.is_empty());
    }
}
