//! Per-player update building.
//!
//! Each player sees the entities whose bounds overlap a fixed rectangle
//! around it. Entities new to that view, and entities fully dirty this tick,
//! go out with both cached payloads. Already-known entities that changed go
//! out with their partial payload only, and entities that left the view
//! (or the world) are listed as deleted.

use crate::game::{GameState, Outbound};
use crate::player::PlayerField;
use shared::packets::{LeaderboardEntry, MapData, PlayerUpdate, UpdateData};
use shared::{EntityId, Rect, ServerPacket, VIEW_HALF_HEIGHT, VIEW_HALF_WIDTH};
use std::collections::BTreeSet;

impl GameState {
    pub(crate) fn replicate(&mut self) -> Vec<Outbound> {
        let leaderboard = self.leaderboard_dirty.then(|| self.leaderboard());
        let map = self.map_data();
        let sessions: Vec<_> = self
            .connections
            .iter()
            .map(|(addr, id)| (*addr, *id))
            .collect();

        let mut outbound = Vec::with_capacity(sessions.len());
        for (addr, id) in sessions {
            if let Some(update) = self.build_update(id, &map, leaderboard.as_ref()) {
                outbound.push(Outbound {
                    addr,
                    packet: ServerPacket::Update(update),
                });
            }
        }
        outbound
    }

    fn build_update(
        &mut self,
        id: EntityId,
        map: &MapData,
        leaderboard: Option<&Vec<LeaderboardEntry>>,
    ) -> Option<UpdateData> {
        let entity = self.entities.get(id)?;
        let player = entity.as_player()?;

        let view = Rect::around(entity.position, VIEW_HALF_WIDTH, VIEW_HALF_HEIGHT);
        let visible: BTreeSet<EntityId> = self.grid.query_rect(&view);

        let mut update = UpdateData {
            tick: self.tick,
            deleted_entities: player.visible.difference(&visible).copied().collect(),
            ..UpdateData::default()
        };

        for &other in &visible {
            let Some(seen) = self.entities.get(other) else {
                continue;
            };
            if !player.visible.contains(&other) || self.dirty.is_full(other) {
                update.full_entities.push(seen.payload(true));
            } else if self.dirty.is_partial(other) {
                update.partial_entities.push(seen.payload(false));
            }
        }

        if player.first_update || player.dirty.any() {
            let mut fields = PlayerUpdate::default();
            for field in PlayerField::ALL {
                if !player.first_update && !player.dirty.is_set(field) {
                    continue;
                }
                match field {
                    PlayerField::Id => fields.id = Some(id),
                    PlayerField::Inventory => {
                        fields.inventory = Some(
                            player
                                .inventory
                                .iter()
                                .map(|petal| petal.id_string.to_string())
                                .collect(),
                        )
                    }
                    PlayerField::Exp => {
                        fields.exp = Some(player.exp());
                        fields.level = Some(player.level());
                    }
                    PlayerField::Dead => fields.dead = Some(player.dead),
                }
            }
            update.player = Some(fields);
        }

        if self.map_dirty || player.first_update {
            update.map = Some(map.clone());
        }
        update.leaderboard = leaderboard.cloned();

        let player = self.player_mut(id)?;
        player.visible = visible;
        player.first_update = false;
        update.chat = std::mem::take(&mut player.chat_queue);
        Some(update)
    }
}

#[cfg(test)]
mod tests {
    use crate::game::{GameState, Outbound, WorldConfig};
    use shared::definitions::LADYBUG;
    use shared::packets::{encode_client_packet, EntityPartial, UpdateData};
    use shared::{ClientPacket, EntityId, ServerPacket, Vec2, Zone};
    use std::net::SocketAddr;
    use std::time::{Duration, Instant};

    fn setup() -> (GameState, SocketAddr, EntityId) {
        let zones = vec![Zone::new("Field", 0.0, 200.0, 0.0, 1)];
        let mut state = GameState::new(WorldConfig::with_zones(zones).seeded(5)).unwrap();
        let addr: SocketAddr = "127.0.0.1:6000".parse().unwrap();
        let join = encode_client_packet(&ClientPacket::Join { name: "viewer".into() }).unwrap();
        state.handle_message(&join, addr);
        let id = state.player_id(&addr).unwrap();
        state.teleport(id, Vec2::new(50.0, 20.0));
        (state, addr, id)
    }

    fn update_for(outbound: Vec<Outbound>, addr: SocketAddr) -> UpdateData {
        outbound
            .into_iter()
            .find(|out| out.addr == addr)
            .map(|out| match out.packet {
                ServerPacket::Update(update) => update,
                other => panic!("unexpected packet {:?}", other),
            })
            .expect("no update for player")
    }

    #[test]
    fn test_first_update_carries_everything() {
        let (mut state, addr, id) = setup();
        let update = update_for(state.tick(Instant::now()), addr);

        assert_eq!(update.tick, 1);
        assert!(update.map.is_some());
        assert!(update.leaderboard.is_some());
        let player = update.player.unwrap();
        assert_eq!(player.id, Some(id));
        assert_eq!(player.inventory.unwrap().len(), 5);
        assert_eq!(player.dead, Some(false));

        // Sees itself in full
        assert_eq!(update.full_entities.len(), 1);
        assert_eq!(update.full_entities[0].id, id);
        assert!(update.full_entities[0].full.is_some());
    }

    #[test]
    fn test_entity_lifecycle_in_view() {
        let (mut state, addr, _) = setup();
        let start = Instant::now();
        state.tick(start);

        let mob = state
            .spawn_mob(&LADYBUG, Vec2::new(60.0, 20.0), Vec2::new(1.0, 0.0))
            .unwrap();
        let update = update_for(state.tick(start + Duration::from_millis(50)), addr);
        assert!(update.map.is_none());
        assert!(update.player.is_none());
        assert!(update.leaderboard.is_none());
        let full = update.full_entities.iter().find(|payload| payload.id == mob).unwrap();
        assert!(full.full.is_some());

        // Known and moving: partial payload only
        let update = update_for(state.tick(start + Duration::from_millis(100)), addr);
        assert!(update.full_entities.iter().all(|payload| payload.id != mob));
        let partial = update
            .partial_entities
            .iter()
            .find(|payload| payload.id == mob)
            .unwrap();
        assert!(partial.full.is_none());
        let decoded: EntityPartial = bincode::deserialize(&partial.partial).unwrap();
        assert_eq!(decoded.position, state.entity(mob).unwrap().position);

        state.remove_entity(mob);
        let update = update_for(state.tick(start + Duration::from_millis(150)), addr);
        assert_eq!(update.deleted_entities, vec![mob]);
    }

    #[test]
    fn test_out_of_view_entities_are_not_sent() {
        let (mut state, addr, _) = setup();
        let far = state
            .spawn_mob(&LADYBUG, Vec2::new(180.0, 20.0), Vec2::new(1.0, 0.0))
            .unwrap();

        let update = update_for(state.tick(Instant::now()), addr);
        assert!(update.full_entities.iter().all(|payload| payload.id != far));
        assert!(update.partial_entities.iter().all(|payload| payload.id != far));
    }

    #[test]
    fn test_chat_is_delivered_once() {
        let (mut state, addr, _) = setup();
        let chat = encode_client_packet(&ClientPacket::Chat { content: "gg".into() }).unwrap();
        state.handle_message(&chat, addr);

        let start = Instant::now();
        let update = update_for(state.tick(start), addr);
        assert_eq!(update.chat.len(), 1);
        assert_eq!(update.chat[0].content, "viewer: gg");

        let update = update_for(state.tick(start + Duration::from_millis(50)), addr);
        assert!(update.chat.is_empty());
    }
}
