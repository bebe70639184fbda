//! Authoritative world state and the fixed-step tick pipeline.
//!
//! Everything here runs on a single task: the network layer feeds decoded
//! client messages in between ticks and collects the outgoing updates each
//! tick produces. A tick runs, in order:
//!
//! 1. collect the active set
//! 2. collision detection (damage applied, pushes deferred)
//! 3. collision resolution
//! 4. per-entity update, then removal of destroyed entities
//! 5. payload caching for dirty entities
//! 6. per-player replication
//! 7. dirty state reset
//! 8. zone population control
//!
//! Message handling, replication and population control live in their own
//! modules as further `impl GameState` blocks.

use crate::collision;
use crate::dirty::DirtyTracker;
use crate::entity::{ServerEntity, SpawnRequest, UpdateContext, WorldBounds};
use crate::error::{ServerError, ServerResult};
use crate::grid::SpatialGrid;
use crate::id_allocator::IdAllocator;
use crate::mob::{MobData, SEGMENT_SPACING};
use crate::player::PlayerData;
use crate::registry::EntityRegistry;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::definitions::MobDefinition;
use shared::packets::{ChatData, LeaderboardEntry, MapData, ZoneBand};
use shared::zones::default_zones;
use shared::{EntityId, ServerPacket, Vec2, Zone, ENTITY_ID_BITS, GRID_CELL_SIZE, WORLD_HEIGHT};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;

/// Upper bound on the simulated time step, in seconds.
pub const MAX_DELTA_TIME: f32 = 0.25;

pub const LEADERBOARD_SIZE: usize = 10;

const STATS_INTERVAL: u32 = 300;
const ZONE_EDGE_TOLERANCE: f32 = 1e-3;

/// Static shape of the world a [`GameState`] simulates.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Contiguous bands, left to right, starting at `x = 0`.
    pub zones: Vec<Zone>,
    pub height: f32,
    pub cell_size: f32,
    pub id_bits: u32,
    /// Fixed RNG seed, for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            zones: default_zones(),
            height: WORLD_HEIGHT,
            cell_size: GRID_CELL_SIZE,
            id_bits: ENTITY_ID_BITS,
            seed: None,
        }
    }
}

impl WorldConfig {
    pub fn with_zones(zones: Vec<Zone>) -> Self {
        Self {
            zones,
            ..Self::default()
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// A packet addressed to one connection.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub addr: SocketAddr,
    pub packet: ServerPacket,
}

#[derive(Debug)]
pub struct GameState {
    pub tick: u32,
    pub(crate) bounds: WorldBounds,
    pub(crate) zones: Vec<Zone>,
    pub(crate) entities: EntityRegistry<ServerEntity>,
    pub(crate) grid: SpatialGrid,
    pub(crate) dirty: DirtyTracker,
    pub(crate) ids: IdAllocator,
    /// Live sessions by connection.
    pub(crate) connections: BTreeMap<SocketAddr, EntityId>,
    pub(crate) map_dirty: bool,
    pub(crate) leaderboard_dirty: bool,
    pub(crate) rng: StdRng,
    last_tick: Option<Instant>,
    dt: f32,
}

impl GameState {
    pub fn new(world: WorldConfig) -> ServerResult<Self> {
        let width = validate_zones(&world.zones)?;
        if !(world.height > 0.0 && world.height.is_finite()) {
            return Err(ServerError::InvalidZones(format!(
                "world height must be positive, got {}",
                world.height
            )));
        }

        let rng = match world.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            "World is {}x{} with {} zones",
            width,
            world.height,
            world.zones.len()
        );

        Ok(Self {
            tick: 0,
            bounds: WorldBounds {
                width,
                height: world.height,
            },
            grid: SpatialGrid::new(width, world.height, world.cell_size),
            zones: world.zones,
            entities: EntityRegistry::new(),
            dirty: DirtyTracker::new(),
            ids: IdAllocator::new(world.id_bits),
            connections: BTreeMap::new(),
            map_dirty: true,
            leaderboard_dirty: false,
            rng,
            last_tick: None,
            dt: 0.0,
        })
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Time step used by the most recent tick.
    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn entities(&self) -> &EntityRegistry<ServerEntity> {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&ServerEntity> {
        self.entities.get(id)
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn player_id(&self, addr: &SocketAddr) -> Option<EntityId> {
        self.connections.get(addr).copied()
    }

    pub fn player_count(&self) -> usize {
        self.connections.len()
    }

    pub fn player(&self, id: EntityId) -> Option<&PlayerData> {
        self.entities.get(id).and_then(ServerEntity::as_player)
    }

    pub fn player_mut(&mut self, id: EntityId) -> Option<&mut PlayerData> {
        self.entities.get_mut(id).and_then(ServerEntity::as_player_mut)
    }

    /// Index of the zone whose band contains `x`, or the first zone if none does.
    pub fn zone_index_at(&self, x: f32) -> usize {
        self.zones
            .iter()
            .position(|zone| zone.contains_x(x))
            .unwrap_or(0)
    }

    pub fn zone_at(&self, x: f32) -> &Zone {
        &self.zones[self.zone_index_at(x)]
    }

    /// Moves an entity, keeping the grid and dirty sets in step.
    pub fn teleport(&mut self, id: EntityId, position: Vec2) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        entity.set_position(position, &self.bounds);
        self.grid.update(id, entity.hitbox.bounds());
        self.dirty.mark_partial(id);
        true
    }

    /// Registers a freshly built entity with every index.
    pub(crate) fn add_entity(&mut self, entity: ServerEntity) -> EntityId {
        let id = entity.id;
        let bounds = entity.hitbox.bounds();
        if !self.entities.add(entity) {
            warn!("Entity {} is already registered", id);
            return id;
        }
        self.grid.insert(id, bounds);
        self.dirty.mark_full(id);
        id
    }

    /// Drops an entity from every index and frees its id.
    pub(crate) fn remove_entity(&mut self, id: EntityId) -> Option<ServerEntity> {
        let entity = self.entities.remove(id)?;
        self.grid.remove(id);
        self.dirty.forget(id);
        self.ids.release(id);

        // Unlink the chain on both sides so a recycled id is never followed
        if let Some(mob) = entity.as_mob() {
            if let Some(follower) = mob.follower {
                self.unlink(follower, |mob| &mut mob.leader, id);
            }
            if let Some(leader) = mob.leader {
                self.unlink(leader, |mob| &mut mob.follower, id);
            }
        }
        Some(entity)
    }

    fn unlink(
        &mut self,
        id: EntityId,
        link: impl FnOnce(&mut MobData) -> &mut Option<EntityId>,
        removed: EntityId,
    ) {
        if let Some(mob) = self.entities.get_mut(id).and_then(ServerEntity::as_mob_mut) {
            let link = link(mob);
            if *link == Some(removed) {
                *link = None;
            }
        }
    }

    /// Spawns a mob, or a whole chain for segmented definitions. Returns the
    /// id of the head.
    pub fn spawn_mob(
        &mut self,
        definition: &'static MobDefinition,
        position: Vec2,
        direction: Vec2,
    ) -> ServerResult<EntityId> {
        let direction = if direction.length_squared() > 0.0 {
            direction.normalize()
        } else {
            Vec2::new(1.0, 0.0)
        };
        let segments = if definition.has_segments() {
            definition.segments.unwrap_or(1)
        } else {
            1
        };
        let spacing = definition.hitbox_radius * SEGMENT_SPACING;
        // All or nothing: a chain never spawns partially
        self.ids.ensure_available(u64::from(segments))?;

        let head = self.spawn_segment(definition, position, direction, None)?;
        let mut leader = head;
        let mut tail = position;
        for _ in 1..segments {
            tail = tail.sub(&direction.scale(spacing));
            let segment = self.spawn_segment(definition, tail, direction, Some(leader))?;
            if let Some(mob) = self.entities.get_mut(leader).and_then(ServerEntity::as_mob_mut) {
                mob.follower = Some(segment);
            }
            leader = segment;
        }

        let rarity = definition.rarity.definition();
        if rarity.global_message {
            let content = format!(
                "A {} {} has spawned somewhere in the {}!",
                rarity.display_name,
                definition.display_name,
                self.zone_at(position.x).name
            );
            self.broadcast_chat(ChatData {
                content,
                color: definition.rarity.color_value(),
            });
        }
        debug!(
            "Spawned {} ({} segment(s)) at ({:.1}, {:.1})",
            definition.id_string, segments, position.x, position.y
        );
        Ok(head)
    }

    fn spawn_segment(
        &mut self,
        definition: &'static MobDefinition,
        position: Vec2,
        direction: Vec2,
        leader: Option<EntityId>,
    ) -> ServerResult<EntityId> {
        let id = self.ids.allocate()?;
        let mut mob = ServerEntity::mob(id, position, direction, definition, leader);
        mob.set_position(position, &self.bounds);
        Ok(self.add_entity(mob))
    }

    /// Ends the session on `addr`, if any.
    pub fn remove_player(&mut self, addr: SocketAddr) -> bool {
        let Some(id) = self.connections.remove(&addr) else {
            return false;
        };
        if let Some(entity) = self.remove_entity(id) {
            if let Some(player) = entity.as_player() {
                info!("\"{}\" ({}) left the game", player.name, addr);
            }
        }
        self.leaderboard_dirty = true;
        true
    }

    /// Queues a chat line for every connected player.
    pub fn broadcast_chat(&mut self, message: ChatData) {
        for id in self.connections.values() {
            if let Some(player) = self.entities.get_mut(*id).and_then(ServerEntity::as_player_mut) {
                player.chat_queue.push(message.clone());
            }
        }
    }

    /// Top living players by experience, ties broken by id.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .entities
            .iter()
            .filter_map(|entity| {
                entity
                    .as_player()
                    .filter(|player| !player.dead)
                    .map(|player| LeaderboardEntry {
                        id: entity.id,
                        name: player.name.clone(),
                        exp: player.exp(),
                    })
            })
            .collect();
        entries.sort_by(|a, b| b.exp.cmp(&a.exp).then(a.id.cmp(&b.id)));
        entries.truncate(LEADERBOARD_SIZE);
        entries
    }

    pub fn map_data(&self) -> MapData {
        MapData {
            width: self.bounds.width,
            height: self.bounds.height,
            zones: self
                .zones
                .iter()
                .map(|zone| ZoneBand {
                    name: zone.name.clone(),
                    x: zone.x,
                    width: zone.width,
                })
                .collect(),
        }
    }

    /// Runs one simulation step and returns the updates to send.
    pub fn tick(&mut self, now: Instant) -> Vec<Outbound> {
        self.dt = self.measure_dt(now);
        self.tick = self.tick.wrapping_add(1);

        let active = collision::active_set(&self.entities);
        let report = collision::detect(&mut self.entities, &self.grid, &active, &mut self.dirty);
        collision::resolve(
            &mut self.entities,
            &mut self.grid,
            &mut self.dirty,
            &report.tasks,
            &self.bounds,
        );
        for id in report.deaths() {
            if let Some(player) = self.player(id) {
                info!("\"{}\" was killed", player.name);
                self.leaderboard_dirty = true;
            }
        }

        self.update_entities();
        self.cache_payloads();
        let outbound = self.replicate();
        self.reset_dirty();
        self.populate_zones();

        if self.tick % STATS_INTERVAL == 0 {
            debug!(
                "Tick {}: {} entities, {} players, {} ids in use",
                self.tick,
                self.entities.len(),
                self.connections.len(),
                self.ids.allocated_count()
            );
        }

        outbound
    }

    fn measure_dt(&mut self, now: Instant) -> f32 {
        let Some(previous) = self.last_tick.replace(now) else {
            return 0.0;
        };
        let elapsed = now.saturating_duration_since(previous).as_secs_f32();
        if elapsed > MAX_DELTA_TIME {
            warn!(
                "Tick {} ran {:.3}s after the previous one, clamping to {}s",
                self.tick, elapsed, MAX_DELTA_TIME
            );
            return MAX_DELTA_TIME;
        }
        elapsed
    }

    fn update_entities(&mut self) {
        let mut spawns = Vec::new();

        for id in self.entities.ids() {
            let leader = self
                .entities
                .get(id)
                .and_then(ServerEntity::as_mob)
                .and_then(|mob| mob.leader);
            let leader_position = leader
                .and_then(|leader| self.entities.get(leader))
                .filter(|leader| !leader.destroyed)
                .map(|leader| leader.position);

            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            if leader.is_some() && leader_position.is_none() {
                if let Some(mob) = entity.as_mob_mut() {
                    mob.leader = None;
                }
            }

            let mut ctx = UpdateContext {
                dt: self.dt,
                bounds: self.bounds,
                rng: &mut self.rng,
                leader_position,
                spawns: &mut spawns,
            };
            match entity.update(&mut ctx) {
                Ok(outcome) => {
                    if outcome.moved {
                        self.grid.update(id, entity.hitbox.bounds());
                    }
                    if outcome.moved || outcome.changed {
                        self.dirty.mark_partial(id);
                    }
                }
                Err(err) => warn!("Skipping update of entity {}: {}", id, err),
            }
        }

        for request in spawns {
            self.fulfil_spawn(request);
        }
        self.remove_destroyed();
    }

    fn fulfil_spawn(&mut self, request: SpawnRequest) {
        match request {
            SpawnRequest::Projectile {
                owner,
                definition,
                position,
                direction,
            } => {
                let id = match self.ids.allocate() {
                    Ok(id) => id,
                    Err(err) => {
                        warn!("Dropping projectile fired by {}: {}", owner, err);
                        return;
                    }
                };
                let mut projectile = ServerEntity::projectile(id, owner, position, direction, definition);
                projectile.set_position(position, &self.bounds);
                self.add_entity(projectile);
            }
        }
    }

    fn remove_destroyed(&mut self) {
        for id in self.entities.ids() {
            let destroyed = self.entities.get(id).map_or(false, |entity| entity.destroyed);
            if !destroyed {
                continue;
            }
            if let Some(entity) = self.remove_entity(id) {
                self.reward_kill(&entity);
            }
        }
    }

    fn reward_kill(&mut self, victim: &ServerEntity) {
        let (Some(mob), Some(killer)) = (victim.as_mob(), victim.last_attacker) else {
            return;
        };
        if victim.health > 0.0 {
            return;
        }
        if let Some(player) = self.player_mut(killer) {
            player.add_exp(mob.definition.exp);
            debug!(
                "\"{}\" killed {} for {} exp",
                player.name, mob.definition.id_string, mob.definition.exp
            );
            self.leaderboard_dirty = true;
        }
    }

    /// Refreshes cached payloads. Fully dirty entities drop out of the
    /// partial set first, so each entity is serialized at most once.
    fn cache_payloads(&mut self) {
        for id in self.dirty.full_ids() {
            self.dirty.drop_partial(id);
            if let Some(entity) = self.entities.get_mut(id) {
                if let Err(err) = entity.serialize_full() {
                    error!("Failed to serialize entity {}: {}", id, err);
                }
            }
        }
        for id in self.dirty.partial_ids() {
            if let Some(entity) = self.entities.get_mut(id) {
                if let Err(err) = entity.serialize_partial() {
                    error!("Failed to serialize entity {}: {}", id, err);
                }
            }
        }
    }

    fn reset_dirty(&mut self) {
        self.dirty.clear();
        for entity in self.entities.iter_mut() {
            if let Some(player) = entity.as_player_mut() {
                player.dirty.clear();
            }
        }
        self.map_dirty = false;
        self.leaderboard_dirty = false;
    }
}

/// Checks the zones tile `[0, width)` left to right and returns the width.
fn validate_zones(zones: &[Zone]) -> ServerResult<f32> {
    let Some(first) = zones.first() else {
        return Err(ServerError::InvalidZones("no zones declared".to_string()));
    };
    if first.x.abs() > ZONE_EDGE_TOLERANCE {
        return Err(ServerError::InvalidZones(format!(
            "first zone \"{}\" starts at {} instead of 0",
            first.name, first.x
        )));
    }

    let mut end = 0.0;
    for zone in zones {
        if !(zone.width > 0.0 && zone.width.is_finite()) {
            return Err(ServerError::InvalidZones(format!(
                "zone \"{}\" has non-positive width {}",
                zone.name, zone.width
            )));
        }
        if (zone.x - end).abs() > ZONE_EDGE_TOLERANCE {
            return Err(ServerError::InvalidZones(format!(
                "zone \"{}\" starts at {} but the previous zone ends at {}",
                zone.name, zone.x, end
            )));
        }
        if zone.density < 0.0 {
            return Err(ServerError::InvalidZones(format!(
                "zone \"{}\" has negative density",
                zone.name
            )));
        }
        end = zone.end();
    }
    Ok(end)
}
