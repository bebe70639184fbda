use crate::error::EntityError;
use crate::mob::MobData;
use crate::player::PlayerData;
use crate::registry::Identified;
use rand::rngs::StdRng;
use serde::Serialize;
use shared::definitions::{MobDefinition, PetalDefinition};
use shared::packets::{EntityFull, EntityKindTag, EntityPartial, EntityPayload};
use shared::{CollisionResponse, EntityId, Hitbox, Vec2, PLAYER_DAMAGE, PLAYER_HEALTH, PLAYER_RADIUS};

/// Behaviour an entity kind may opt into during the collision pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Deals and receives contact damage.
    Damage,
    /// Gets pushed apart from other colliding entities.
    CollisionResponse,
}

/// Damage only flows between different teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Team {
    Players,
    Mobs,
}

/// World rectangle `[0, width] x [0, height]` entities are kept inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub width: f32,
    pub height: f32,
}

impl WorldBounds {
    /// Clamps a circle center so the whole circle stays inside the world.
    pub fn clamp(&self, position: Vec2, radius: f32) -> Vec2 {
        let radius = radius.min(self.width / 2.0).min(self.height / 2.0);
        position.clamp(
            &Vec2::new(radius, radius),
            &Vec2::new(self.width - radius, self.height - radius),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProjectileData {
    pub definition: &'static PetalDefinition,
    /// Player credited with anything this projectile hits.
    pub owner: EntityId,
    pub velocity: Vec2,
    pub lifetime: f32,
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    Player(PlayerData),
    Mob(MobData),
    Projectile(ProjectileData),
}

/// Something an entity wants created once the update pass is over.
#[derive(Debug, Clone)]
pub enum SpawnRequest {
    Projectile {
        owner: EntityId,
        definition: &'static PetalDefinition,
        position: Vec2,
        direction: Vec2,
    },
}

/// Everything an entity can see of the world while it updates.
pub struct UpdateContext<'a> {
    pub dt: f32,
    pub bounds: WorldBounds,
    pub rng: &'a mut StdRng,
    /// Current position of the segment this one follows, if any.
    pub leader_position: Option<Vec2>,
    pub spawns: &'a mut Vec<SpawnRequest>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Position changed; the spatial index needs refreshing.
    pub moved: bool,
    /// Replicated state other than position changed.
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageOutcome {
    pub applied: bool,
    pub died: bool,
}

#[derive(Debug, Clone, Default)]
struct PayloadCache {
    partial: Vec<u8>,
    full: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ServerEntity {
    pub id: EntityId,
    pub position: Vec2,
    /// Facing direction, unit length.
    pub direction: Vec2,
    pub hitbox: Hitbox,
    pub health: f32,
    pub max_health: f32,
    /// Contact damage dealt per tick of overlap.
    pub damage: f32,
    /// Resistance to being pushed during collision response.
    pub weight: f32,
    /// Owner of whatever dealt the most recent damage.
    pub last_attacker: Option<EntityId>,
    /// Marked for removal at the end of the update step.
    pub destroyed: bool,
    pub kind: EntityKind,
    payloads: PayloadCache,
}

impl Identified for ServerEntity {
    fn id(&self) -> EntityId {
        self.id
    }
}

impl ServerEntity {
    fn new(id: EntityId, position: Vec2, direction: Vec2, radius: f32, kind: EntityKind) -> Self {
        Self {
            id,
            position,
            direction,
            hitbox: Hitbox::circle(position, radius),
            health: 1.0,
            max_health: 1.0,
            damage: 0.0,
            weight: 1.0,
            last_attacker: None,
            destroyed: false,
            kind,
            payloads: PayloadCache::default(),
        }
    }

    pub fn player(id: EntityId, position: Vec2, data: PlayerData) -> Self {
        let mut entity = Self::new(
            id,
            position,
            Vec2::new(1.0, 0.0),
            PLAYER_RADIUS,
            EntityKind::Player(data),
        );
        entity.health = PLAYER_HEALTH;
        entity.max_health = PLAYER_HEALTH;
        entity.damage = PLAYER_DAMAGE;
        entity
    }

    pub fn mob(
        id: EntityId,
        position: Vec2,
        direction: Vec2,
        definition: &'static MobDefinition,
        leader: Option<EntityId>,
    ) -> Self {
        let radius = definition.hitbox_radius;
        let mut entity = Self::new(
            id,
            position,
            direction,
            radius,
            EntityKind::Mob(MobData::new(definition, leader)),
        );
        entity.health = definition.health;
        entity.max_health = definition.health;
        entity.damage = definition.damage;
        // Stationary mobs barely budge when bumped into
        entity.weight = if definition.speed == 0.0 {
            100.0 * radius * radius
        } else {
            radius * radius
        };
        entity
    }

    pub fn projectile(
        id: EntityId,
        owner: EntityId,
        position: Vec2,
        direction: Vec2,
        definition: &'static PetalDefinition,
    ) -> Self {
        let direction = direction.normalize();
        let mut entity = Self::new(
            id,
            position,
            direction,
            definition.radius,
            EntityKind::Projectile(ProjectileData {
                definition,
                owner,
                velocity: direction.scale(definition.speed),
                lifetime: definition.lifetime,
            }),
        );
        entity.health = definition.health;
        entity.max_health = definition.health;
        entity.damage = definition.damage;
        entity
    }

    pub fn tag(&self) -> EntityKindTag {
        match self.kind {
            EntityKind::Player(_) => EntityKindTag::Player,
            EntityKind::Mob(_) => EntityKindTag::Mob,
            EntityKind::Projectile(_) => EntityKindTag::Projectile,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match (&self.kind, capability) {
            (EntityKind::Player(_), _) => true,
            (EntityKind::Mob(_), _) => true,
            (EntityKind::Projectile(_), Capability::Damage) => true,
            (EntityKind::Projectile(_), Capability::CollisionResponse) => false,
        }
    }

    pub fn team(&self) -> Team {
        match self.kind {
            EntityKind::Player(_) | EntityKind::Projectile(_) => Team::Players,
            EntityKind::Mob(_) => Team::Mobs,
        }
    }

    /// The entity credited for damage this one deals.
    pub fn owner(&self) -> EntityId {
        match &self.kind {
            EntityKind::Projectile(projectile) => projectile.owner,
            _ => self.id,
        }
    }

    /// Whether the entity takes part in the collision pass this tick.
    pub fn is_active(&self) -> bool {
        if self.destroyed {
            return false;
        }
        match &self.kind {
            EntityKind::Player(player) => !player.dead,
            EntityKind::Mob(_) | EntityKind::Projectile(_) => true,
        }
    }

    pub fn radius(&self) -> f32 {
        match self.hitbox {
            Hitbox::Circle { radius, .. } => radius,
            Hitbox::Rect(rect) => (rect.max.x - rect.min.x).max(rect.max.y - rect.min.y) / 2.0,
        }
    }

    pub fn as_player(&self) -> Option<&PlayerData> {
        match &self.kind {
            EntityKind::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.kind {
            EntityKind::Player(player) => Some(player),
            _ => None,
        }
    }

    pub fn as_mob(&self) -> Option<&MobData> {
        match &self.kind {
            EntityKind::Mob(mob) => Some(mob),
            _ => None,
        }
    }

    pub fn as_mob_mut(&mut self) -> Option<&mut MobData> {
        match &mut self.kind {
            EntityKind::Mob(mob) => Some(mob),
            _ => None,
        }
    }

    /// Moves the entity, keeping it inside the world and its hitbox in step.
    pub fn set_position(&mut self, position: Vec2, bounds: &WorldBounds) {
        self.position = bounds.clamp(position, self.radius());
        self.hitbox.set_center(self.position);
    }

    /// Applies contact damage. Returns whether it landed and whether it was fatal.
    pub fn receive_damage(&mut self, amount: f32, attacker: EntityId) -> DamageOutcome {
        if !self.is_active() || amount <= 0.0 {
            return DamageOutcome::default();
        }

        self.health -= amount;
        self.last_attacker = Some(attacker);
        if self.health > 0.0 {
            return DamageOutcome {
                applied: true,
                died: false,
            };
        }

        self.health = 0.0;
        match &mut self.kind {
            EntityKind::Player(player) => player.kill(),
            _ => self.destroyed = true,
        }
        DamageOutcome {
            applied: true,
            died: true,
        }
    }

    /// Pushes this entity out of `target` along the collision normal. The
    /// share of the overlap it resolves depends on the two weights, so the
    /// mirrored response on the target completes the separation.
    pub fn collide_with(
        &mut self,
        collision: &CollisionResponse,
        target_weight: f32,
        bounds: &WorldBounds,
    ) -> bool {
        let total = self.weight + target_weight;
        let share = if total > 0.0 { target_weight / total } else { 0.5 };
        let push = collision.direction.scale(-collision.depth * share);
        if push.length_squared() == 0.0 {
            return false;
        }

        let before = self.position;
        self.set_position(self.position.add(&push), bounds);
        self.position != before
    }

    /// Advances the entity by `ctx.dt` seconds.
    pub fn update(&mut self, ctx: &mut UpdateContext) -> Result<UpdateOutcome, EntityError> {
        if self.destroyed {
            return Ok(UpdateOutcome::default());
        }

        let id = self.id;
        let position = self.position;
        let radius = self.radius();
        let mut outcome = UpdateOutcome::default();

        let (target, heading) = match &mut self.kind {
            EntityKind::Player(player) => {
                if player.dead {
                    return Ok(outcome);
                }
                if self.health < self.max_health {
                    self.health = (self.health + player.regen(ctx.dt)).min(self.max_health);
                    outcome.changed = true;
                }
                if let Some((shot, aim)) = player.fire(ctx.dt, self.direction) {
                    ctx.spawns.push(SpawnRequest::Projectile {
                        owner: id,
                        definition: shot,
                        position: position.add(&aim.scale(radius + shot.radius)),
                        direction: aim,
                    });
                }
                player.step(position, self.direction, ctx.dt)
            }
            EntityKind::Mob(mob) => {
                mob.step(position, self.direction, ctx.dt, ctx.leader_position, ctx.rng)
            }
            EntityKind::Projectile(projectile) => {
                projectile.lifetime -= ctx.dt;
                if projectile.lifetime <= 0.0 {
                    self.destroyed = true;
                    return Ok(outcome);
                }
                (
                    position.add(&projectile.velocity.scale(ctx.dt)),
                    self.direction,
                )
            }
        };

        if !target.is_finite() || !heading.is_finite() {
            return Err(EntityError::NonFinitePosition { id });
        }

        if heading != self.direction {
            self.direction = heading;
            outcome.changed = true;
        }
        if target != position {
            self.set_position(target, &ctx.bounds);
            outcome.moved = self.position != position;
        }
        Ok(outcome)
    }

    fn partial_state(&self) -> EntityPartial {
        EntityPartial {
            position: self.position,
            direction: self.direction,
            health_ratio: if self.max_health > 0.0 {
                (self.health / self.max_health).clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    fn full_state(&self) -> EntityFull {
        let (definition, name, dead) = match &self.kind {
            EntityKind::Player(player) => (None, Some(player.name.clone()), player.dead),
            EntityKind::Mob(mob) => (Some(mob.definition.id_string.to_string()), None, false),
            EntityKind::Projectile(projectile) => {
                (Some(projectile.definition.id_string.to_string()), None, false)
            }
        };
        EntityFull {
            kind: self.tag(),
            radius: self.radius(),
            definition,
            name,
            dead,
        }
    }

    /// Recomputes the cached incremental patch.
    pub fn serialize_partial(&mut self) -> bincode::Result<()> {
        self.payloads.partial = encode(&self.partial_state())?;
        Ok(())
    }

    /// Recomputes the cached snapshot. A snapshot always goes out together
    /// with the patch, so the patch is refreshed as well.
    pub fn serialize_full(&mut self) -> bincode::Result<()> {
        self.serialize_partial()?;
        self.payloads.full = encode(&self.full_state())?;
        Ok(())
    }

    pub fn payload(&self, include_full: bool) -> EntityPayload {
        EntityPayload {
            id: self.id,
            partial: self.payloads.partial.clone(),
            full: include_full.then(|| self.payloads.full.clone()),
        }
    }
}

fn encode<T: Serialize>(value: &T) -> bincode::Result<Vec<u8>> {
    bincode::serialize(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use shared::definitions::{BASIC, LADYBUG, ROCK};
    use std::net::SocketAddr;

    const BOUNDS: WorldBounds = WorldBounds {
        width: 100.0,
        height: 40.0,
    };

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_player(id: EntityId, x: f32, y: f32) -> ServerEntity {
        ServerEntity::player(id, Vec2::new(x, y), PlayerData::new(test_addr(), "tester"))
    }

    fn run_update(entity: &mut ServerEntity, dt: f32) -> (UpdateOutcome, Vec<SpawnRequest>) {
        let mut rng = StdRng::seed_from_u64(1);
        let mut spawns = Vec::new();
        let outcome = {
            let mut ctx = UpdateContext {
                dt,
                bounds: BOUNDS,
                rng: &mut rng,
                leader_position: None,
                spawns: &mut spawns,
            };
            entity.update(&mut ctx).unwrap()
        };
        (outcome, spawns)
    }

    #[test]
    fn test_capabilities_per_kind() {
        let player = test_player(1, 10.0, 10.0);
        let mob = ServerEntity::mob(2, Vec2::new(5.0, 5.0), Vec2::new(1.0, 0.0), &LADYBUG, None);
        let shot = ServerEntity::projectile(3, 1, Vec2::new(5.0, 5.0), Vec2::new(1.0, 0.0), &BASIC);

        assert!(player.supports(Capability::Damage));
        assert!(player.supports(Capability::CollisionResponse));
        assert!(mob.supports(Capability::CollisionResponse));
        assert!(shot.supports(Capability::Damage));
        assert!(!shot.supports(Capability::CollisionResponse));

        assert_eq!(shot.team(), player.team());
        assert_ne!(mob.team(), player.team());
        assert_eq!(shot.owner(), 1);
    }

    #[test]
    fn test_player_death_makes_inactive() {
        let mut player = test_player(1, 10.0, 10.0);
        assert!(player.is_active());

        let outcome = player.receive_damage(PLAYER_HEALTH + 1.0, 9);
        assert!(outcome.died);
        assert!(!player.is_active());
        assert!(!player.destroyed);
        assert_eq!(player.health, 0.0);

        // Dead entities ignore further damage
        assert!(!player.receive_damage(5.0, 9).applied);
    }

    #[test]
    fn test_mob_death_marks_destroyed() {
        let mut mob = ServerEntity::mob(2, Vec2::new(5.0, 5.0), Vec2::new(1.0, 0.0), &LADYBUG, None);
        let outcome = mob.receive_damage(LADYBUG.health, 1);
        assert!(outcome.died);
        assert!(mob.destroyed);
        assert_eq!(mob.last_attacker, Some(1));
    }

    #[test]
    fn test_collision_push_respects_weights() {
        let mut light = test_player(1, 50.0, 20.0);
        let collision = CollisionResponse {
            direction: Vec2::new(1.0, 0.0),
            depth: 1.0,
        };

        assert!(light.collide_with(&collision, 1.0, &BOUNDS));
        assert_approx_eq!(light.position.x, 49.5, 1e-5);
        assert_eq!(light.hitbox.center(), light.position);

        let mut rock = ServerEntity::mob(2, Vec2::new(50.0, 20.0), Vec2::new(1.0, 0.0), &ROCK, None);
        rock.collide_with(&collision, 1.0, &BOUNDS);
        assert!(rock.position.x > 49.99);
    }

    #[test]
    fn test_player_moves_from_input() {
        let mut player = test_player(1, 50.0, 20.0);
        player
            .as_player_mut()
            .unwrap()
            .set_input(Vec2::new(0.0, 2.0), 1.0, false);

        let (outcome, spawns) = run_update(&mut player, 0.5);
        assert!(outcome.moved);
        assert!(spawns.is_empty());
        assert_approx_eq!(player.position.y, 20.0 + shared::PLAYER_SPEED * 0.5, 1e-4);
        assert_eq!(player.direction, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_player_stays_inside_world() {
        let mut player = test_player(1, 1.5, 20.0);
        player
            .as_player_mut()
            .unwrap()
            .set_input(Vec2::new(-1.0, 0.0), 1.0, false);

        run_update(&mut player, 1.0);
        assert_approx_eq!(player.position.x, PLAYER_RADIUS, 1e-5);
    }

    #[test]
    fn test_attacking_player_fires_projectile() {
        let mut player = test_player(1, 50.0, 20.0);
        player
            .as_player_mut()
            .unwrap()
            .set_input(Vec2::new(1.0, 0.0), 0.0, true);

        let (_, spawns) = run_update(&mut player, 0.1);
        assert_eq!(spawns.len(), 1);
        match &spawns[0] {
            SpawnRequest::Projectile {
                owner, direction, ..
            } => {
                assert_eq!(*owner, 1);
                assert_eq!(*direction, Vec2::new(1.0, 0.0));
            }
        }

        // Reloading
        let (_, spawns) = run_update(&mut player, 0.1);
        assert!(spawns.is_empty());
    }

    #[test]
    fn test_projectile_expires() {
        let mut shot = ServerEntity::projectile(3, 1, Vec2::new(50.0, 20.0), Vec2::new(1.0, 0.0), &BASIC);

        let (outcome, _) = run_update(&mut shot, 0.5);
        assert!(outcome.moved);
        assert!(!shot.destroyed);

        run_update(&mut shot, BASIC.lifetime);
        assert!(shot.destroyed);
    }

    #[test]
    fn test_non_finite_update_is_reported() {
        let mut player = test_player(4, 50.0, 20.0);
        player
            .as_player_mut()
            .unwrap()
            .set_input(Vec2::new(1.0, 0.0), 1.0, false);

        let mut rng = StdRng::seed_from_u64(1);
        let mut spawns = Vec::new();
        let mut ctx = UpdateContext {
            dt: f32::NAN,
            bounds: BOUNDS,
            rng: &mut rng,
            leader_position: None,
            spawns: &mut spawns,
        };
        assert_eq!(
            player.update(&mut ctx),
            Err(EntityError::NonFinitePosition { id: 4 })
        );
        assert_eq!(player.position, Vec2::new(50.0, 20.0));
    }

    #[test]
    fn test_payloads_decode() {
        let mut mob = ServerEntity::mob(2, Vec2::new(5.0, 6.0), Vec2::new(0.0, 1.0), &LADYBUG, None);
        mob.serialize_full().unwrap();

        let payload = mob.payload(true);
        let partial: EntityPartial = bincode::deserialize(&payload.partial).unwrap();
        let full: EntityFull = bincode::deserialize(payload.full.as_ref().unwrap()).unwrap();

        assert_eq!(partial.position, Vec2::new(5.0, 6.0));
        assert_eq!(partial.health_ratio, 1.0);
        assert_eq!(full.kind, EntityKindTag::Mob);
        assert_eq!(full.definition.as_deref(), Some("ladybug"));
        assert!(mob.payload(false).full.is_none());
    }
}
