//! Static game content: rarity tiers, mob definitions and petal definitions.
//!
//! These tables are loaded once and never change while the server runs.
//! Entities hold `&'static` references into them; packets carry the
//! `id_string` so clients can look the same definition up on their side.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Unusual,
    Rare,
    Epic,
    Legendary,
    Mythic,
    Super,
    Ultra,
    Unique,
    Omega,
}

#[derive(Debug)]
pub struct RarityDefinition {
    pub display_name: &'static str,
    /// Hex colour without the leading `#`.
    pub color: &'static str,
    pub exp_when_absorbed: u32,
    pub level: u32,
    /// Spawning a mob of this tier is announced to every player.
    pub global_message: bool,
}

impl Rarity {
    pub const ALL: [Rarity; 10] = [
        Rarity::Common,
        Rarity::Unusual,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythic,
        Rarity::Super,
        Rarity::Ultra,
        Rarity::Unique,
        Rarity::Omega,
    ];

    pub fn definition(&self) -> &'static RarityDefinition {
        match self {
            Rarity::Common => &RarityDefinition {
                display_name: "Common",
                color: "7eef6d",
                exp_when_absorbed: 2,
                level: 1,
                global_message: false,
            },
            Rarity::Unusual => &RarityDefinition {
                display_name: "Unusual",
                color: "ffe65d",
                exp_when_absorbed: 10,
                level: 2,
                global_message: false,
            },
            Rarity::Rare => &RarityDefinition {
                display_name: "Rare",
                color: "4d52e3",
                exp_when_absorbed: 50,
                level: 3,
                global_message: false,
            },
            Rarity::Epic => &RarityDefinition {
                display_name: "Epic",
                color: "861fde",
                exp_when_absorbed: 200,
                level: 4,
                global_message: false,
            },
            Rarity::Legendary => &RarityDefinition {
                display_name: "Legendary",
                color: "de1f1f",
                exp_when_absorbed: 1000,
                level: 5,
                global_message: false,
            },
            Rarity::Mythic => &RarityDefinition {
                display_name: "Mythic",
                color: "1fdbde",
                exp_when_absorbed: 5000,
                level: 6,
                global_message: true,
            },
            Rarity::Super => &RarityDefinition {
                display_name: "Super",
                color: "2bffa3",
                exp_when_absorbed: 10000,
                level: 7,
                global_message: true,
            },
            Rarity::Ultra => &RarityDefinition {
                display_name: "Ultra",
                color: "ff2b75",
                exp_when_absorbed: 15000,
                level: 8,
                global_message: true,
            },
            Rarity::Unique => &RarityDefinition {
                display_name: "Unique",
                color: "565656",
                exp_when_absorbed: 20000,
                level: 9,
                global_message: true,
            },
            Rarity::Omega => &RarityDefinition {
                display_name: "Omega",
                color: "f329d9",
                exp_when_absorbed: 30000,
                level: 10,
                global_message: true,
            },
        }
    }

    /// Colour as a packed `0xRRGGBB` value, white if the table entry is malformed.
    pub fn color_value(&self) -> u32 {
        u32::from_str_radix(self.definition().color, 16).unwrap_or(0xffffff)
    }
}

#[derive(Debug, PartialEq)]
pub struct MobDefinition {
    pub id_string: &'static str,
    pub display_name: &'static str,
    pub rarity: Rarity,
    pub hitbox_radius: f32,
    pub health: f32,
    /// Damage dealt to each opposing entity touched during a tick.
    pub damage: f32,
    /// Wander speed in world units per second. Zero means stationary.
    pub speed: f32,
    pub exp: u32,
    /// Number of body segments spawned as a chain, head included.
    pub segments: Option<u8>,
}

impl MobDefinition {
    pub fn has_segments(&self) -> bool {
        self.segments.map_or(false, |count| count > 1)
    }
}

pub static LADYBUG: MobDefinition = MobDefinition {
    id_string: "ladybug",
    display_name: "Ladybug",
    rarity: Rarity::Common,
    hitbox_radius: 1.0,
    health: 25.0,
    damage: 1.0,
    speed: 2.0,
    exp: 2,
    segments: None,
};

pub static ROCK: MobDefinition = MobDefinition {
    id_string: "rock",
    display_name: "Rock",
    rarity: Rarity::Common,
    hitbox_radius: 1.2,
    health: 40.0,
    damage: 1.0,
    speed: 0.0,
    exp: 1,
    segments: None,
};

pub static BEE: MobDefinition = MobDefinition {
    id_string: "bee",
    display_name: "Bee",
    rarity: Rarity::Unusual,
    hitbox_radius: 0.9,
    health: 20.0,
    damage: 3.0,
    speed: 3.0,
    exp: 6,
    segments: None,
};

pub static CENTIPEDE: MobDefinition = MobDefinition {
    id_string: "centipede",
    display_name: "Centipede",
    rarity: Rarity::Unusual,
    hitbox_radius: 0.8,
    health: 15.0,
    damage: 2.0,
    speed: 2.5,
    exp: 3,
    segments: Some(6),
};

pub static HORNET: MobDefinition = MobDefinition {
    id_string: "hornet",
    display_name: "Hornet",
    rarity: Rarity::Rare,
    hitbox_radius: 1.1,
    health: 60.0,
    damage: 5.0,
    speed: 3.5,
    exp: 20,
    segments: None,
};

pub static SPIDER: MobDefinition = MobDefinition {
    id_string: "spider",
    display_name: "Spider",
    rarity: Rarity::Epic,
    hitbox_radius: 1.3,
    health: 120.0,
    damage: 6.0,
    speed: 4.0,
    exp: 60,
    segments: None,
};

pub static DESERT_CENTIPEDE: MobDefinition = MobDefinition {
    id_string: "desert_centipede",
    display_name: "Desert Centipede",
    rarity: Rarity::Legendary,
    hitbox_radius: 1.0,
    health: 80.0,
    damage: 6.0,
    speed: 4.5,
    exp: 90,
    segments: Some(8),
};

pub static MYTHIC_LADYBUG: MobDefinition = MobDefinition {
    id_string: "mythic_ladybug",
    display_name: "Ladybug",
    rarity: Rarity::Mythic,
    hitbox_radius: 2.5,
    health: 2000.0,
    damage: 12.0,
    speed: 2.0,
    exp: 2500,
    segments: None,
};

pub static MOBS: [&MobDefinition; 8] = [
    &LADYBUG,
    &ROCK,
    &BEE,
    &CENTIPEDE,
    &HORNET,
    &SPIDER,
    &DESERT_CENTIPEDE,
    &MYTHIC_LADYBUG,
];

pub fn mob_by_id(id_string: &str) -> Option<&'static MobDefinition> {
    MOBS.iter().copied().find(|mob| mob.id_string == id_string)
}

/// Equip-able item a player fires as a projectile.
#[derive(Debug, PartialEq)]
pub struct PetalDefinition {
    pub id_string: &'static str,
    pub display_name: &'static str,
    pub rarity: Rarity,
    pub damage: f32,
    pub health: f32,
    pub radius: f32,
    pub speed: f32,
    /// Seconds a fired petal stays in the world.
    pub lifetime: f32,
    /// Seconds between two shots of this petal.
    pub reload: f32,
}

pub static BASIC: PetalDefinition = PetalDefinition {
    id_string: "basic",
    display_name: "Basic",
    rarity: Rarity::Common,
    damage: 10.0,
    health: 10.0,
    radius: 0.4,
    speed: 12.0,
    lifetime: 1.5,
    reload: 0.5,
};

pub static STINGER: PetalDefinition = PetalDefinition {
    id_string: "stinger",
    display_name: "Stinger",
    rarity: Rarity::Unusual,
    damage: 35.0,
    health: 2.0,
    radius: 0.3,
    speed: 14.0,
    lifetime: 1.0,
    reload: 1.5,
};

pub static ROSE: PetalDefinition = PetalDefinition {
    id_string: "rose",
    display_name: "Rose",
    rarity: Rarity::Unusual,
    damage: 5.0,
    health: 5.0,
    radius: 0.4,
    speed: 10.0,
    lifetime: 1.2,
    reload: 0.8,
};

pub static PETALS: [&PetalDefinition; 3] = [&BASIC, &STINGER, &ROSE];

pub fn petal_by_id(id_string: &str) -> Option<&'static PetalDefinition> {
    PETALS.iter().copied().find(|petal| petal.id_string == id_string)
}

/// Inventory every new session starts with.
pub fn starting_inventory() -> Vec<&'static PetalDefinition> {
    vec![&BASIC; 5]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_message_starts_at_mythic() {
        for rarity in Rarity::ALL {
            assert_eq!(rarity.definition().global_message, rarity >= Rarity::Mythic);
        }
    }

    #[test]
    fn test_color_value() {
        assert_eq!(Rarity::Common.color_value(), 0x7eef6d);
        assert_eq!(Rarity::Mythic.color_value(), 0x1fdbde);
    }

    #[test]
    fn test_lookups() {
        assert_eq!(mob_by_id("centipede"), Some(&CENTIPEDE));
        assert!(mob_by_id("dragon").is_none());
        assert_eq!(petal_by_id("stinger"), Some(&STINGER));
    }

    #[test]
    fn test_segment_flag() {
        assert!(CENTIPEDE.has_segments());
        assert!(!LADYBUG.has_segments());
    }
}
