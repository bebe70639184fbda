pub mod definitions;
pub mod hitbox;
pub mod math;
pub mod packets;
pub mod zones;

pub use hitbox::{CollisionResponse, Hitbox, Rect};
pub use math::Vec2;
pub use packets::{ClientPacket, ServerPacket};
pub use zones::Zone;

/// Identifier of a live entity. Unique while the entity exists.
pub type EntityId = u32;

pub const WORLD_HEIGHT: f32 = 40.0;
pub const GRID_CELL_SIZE: f32 = 4.0;
/// Bit width of the entity id space.
pub const ENTITY_ID_BITS: u32 = 16;

pub const PLAYER_RADIUS: f32 = 1.25;
pub const PLAYER_HEALTH: f32 = 100.0;
pub const PLAYER_DAMAGE: f32 = 2.0;
/// World units per second at full movement.
pub const PLAYER_SPEED: f32 = 8.0;
/// Health regained per second while alive.
pub const PLAYER_REGEN: f32 = 1.0;
/// Half extents of the rectangle a player can see.
pub const VIEW_HALF_WIDTH: f32 = 30.0;
pub const VIEW_HALF_HEIGHT: f32 = 20.0;

pub const MAX_NAME_LENGTH: usize = 20;
pub const MAX_CHAT_LENGTH: usize = 128;
