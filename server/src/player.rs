//! Per-session player state carried by player entities.

use shared::definitions::{starting_inventory, PetalDefinition};
use shared::packets::ChatData;
use shared::zones::level_for_exp;
use shared::{EntityId, Vec2, MAX_NAME_LENGTH, PLAYER_REGEN, PLAYER_SPEED};
use std::collections::BTreeSet;
use std::net::SocketAddr;

/// Player fields replicated only to the owning client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerField {
    Id,
    Inventory,
    Exp,
    Dead,
}

impl PlayerField {
    pub const ALL: [PlayerField; 4] = [
        PlayerField::Id,
        PlayerField::Inventory,
        PlayerField::Exp,
        PlayerField::Dead,
    ];

    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Set of [`PlayerField`]s changed since the last update was sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerDirty(u8);

impl PlayerDirty {
    pub fn all() -> Self {
        let mut dirty = Self::default();
        for field in PlayerField::ALL {
            dirty.mark(field);
        }
        dirty
    }

    pub fn mark(&mut self, field: PlayerField) {
        self.0 |= field.bit();
    }

    pub fn is_set(&self, field: PlayerField) -> bool {
        self.0 & field.bit() != 0
    }

    pub fn any(&self) -> bool {
        self.0 != 0
    }

    /// Resets every field, including ones added to [`PlayerField::ALL`] later.
    pub fn clear(&mut self) {
        for field in PlayerField::ALL {
            self.0 &= !field.bit();
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput {
    /// Unit heading or zero.
    pub direction: Vec2,
    pub movement: f32,
    pub attacking: bool,
}

#[derive(Debug, Clone)]
pub struct PlayerData {
    /// Connection the session belongs to.
    pub addr: SocketAddr,
    pub name: String,
    pub inventory: Vec<&'static PetalDefinition>,
    exp: u32,
    pub dead: bool,
    pub input: PlayerInput,
    pub dirty: PlayerDirty,
    pub chat_queue: Vec<ChatData>,
    /// Entities this client was last told about.
    pub visible: BTreeSet<EntityId>,
    /// No update has been sent yet on this session.
    pub first_update: bool,
    reload_timer: f32,
    next_slot: usize,
}

impl PlayerData {
    pub fn new(addr: SocketAddr, name: &str) -> Self {
        Self {
            addr,
            name: sanitize_name(name),
            inventory: starting_inventory(),
            exp: 0,
            dead: false,
            input: PlayerInput::default(),
            dirty: PlayerDirty::all(),
            chat_queue: Vec::new(),
            visible: BTreeSet::new(),
            first_update: true,
            reload_timer: 0.0,
            next_slot: 0,
        }
    }

    pub fn exp(&self) -> u32 {
        self.exp
    }

    pub fn level(&self) -> u32 {
        level_for_exp(self.exp)
    }

    pub fn add_exp(&mut self, amount: u32) {
        if amount == 0 {
            return;
        }
        self.exp = self.exp.saturating_add(amount);
        self.dirty.mark(PlayerField::Exp);
    }

    pub fn set_inventory(&mut self, inventory: Vec<&'static PetalDefinition>) {
        self.inventory = inventory;
        self.next_slot = 0;
        self.dirty.mark(PlayerField::Inventory);
    }

    pub fn set_input(&mut self, direction: Vec2, movement: f32, attacking: bool) {
        let movement = if movement.is_finite() {
            movement.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let direction = if direction.is_finite() {
            direction.normalize()
        } else {
            Vec2::ZERO
        };
        self.input = PlayerInput {
            direction,
            movement,
            attacking,
        };
    }

    pub(crate) fn kill(&mut self) {
        self.dead = true;
        self.input = PlayerInput::default();
        self.dirty.mark(PlayerField::Dead);
    }

    pub(crate) fn regen(&self, dt: f32) -> f32 {
        PLAYER_REGEN * dt
    }

    /// Next petal to fire, if attacking and reloaded, with the direction to fire it in.
    pub(crate) fn fire(
        &mut self,
        dt: f32,
        facing: Vec2,
    ) -> Option<(&'static PetalDefinition, Vec2)> {
        self.reload_timer = (self.reload_timer - dt).max(0.0);
        if !self.input.attacking || self.reload_timer > 0.0 || self.inventory.is_empty() {
            return None;
        }

        let petal = self.inventory[self.next_slot % self.inventory.len()];
        self.next_slot = (self.next_slot + 1) % self.inventory.len();
        self.reload_timer = petal.reload;

        let aim = if self.input.direction == Vec2::ZERO {
            facing
        } else {
            self.input.direction
        };
        Some((petal, aim))
    }

    /// Target position and facing after moving for `dt` seconds.
    pub(crate) fn step(&self, position: Vec2, facing: Vec2, dt: f32) -> (Vec2, Vec2) {
        let velocity = self
            .input
            .direction
            .scale(PLAYER_SPEED * self.input.movement);
        let heading = if self.input.direction == Vec2::ZERO {
            facing
        } else {
            self.input.direction
        };
        (position.add(&velocity.scale(dt)), heading)
    }
}

/// Trims control characters and surrounding whitespace and caps the length.
/// Falls back to a placeholder when nothing printable is left.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .chars()
        .take(MAX_NAME_LENGTH)
        .collect();

    if cleaned.is_empty() {
        "Unnamed".to_string()
    } else {
        cleaned
    }
}
