//! Declared world zones and the experience curve that gates them.
//!
//! Zones are horizontal bands spanning the whole world height. The default
//! table is declared left to right and its order is significant: population
//! control walks zones in declaration order, and spawn-zone selection breaks
//! threshold ties in favour of the zone declared last.

use crate::definitions::{
    MobDefinition, BEE, CENTIPEDE, DESERT_CENTIPEDE, HORNET, LADYBUG, MYTHIC_LADYBUG, ROCK,
    SPIDER,
};

#[derive(Debug, Clone)]
pub struct Zone {
    pub name: String,
    pub x: f32,
    pub width: f32,
    /// Mob density target; see `max_mob_count` for how it maps to a cap.
    pub density: f32,
    /// Lowest player level that spawns into this zone.
    pub level_at_lowest: u32,
    /// Spawn weights. Order only matters for reproducible weighted draws.
    pub spawning: Vec<(&'static MobDefinition, f32)>,
}

impl Zone {
    pub fn new(name: &str, x: f32, width: f32, density: f32, level_at_lowest: u32) -> Self {
        Self {
            name: name.to_string(),
            x,
            width,
            density,
            level_at_lowest,
            spawning: Vec::new(),
        }
    }

    pub fn spawns(mut self, definition: &'static MobDefinition, weight: f32) -> Self {
        self.spawning.push((definition, weight));
        self
    }

    pub fn end(&self) -> f32 {
        self.x + self.width
    }

    pub fn contains_x(&self, x: f32) -> bool {
        x >= self.x && x < self.end()
    }

    /// Mob cap for this zone in a world of the given height.
    pub fn max_mob_count(&self, world_height: f32) -> f32 {
        self.density / 15.0 * self.width * world_height / 20.0
    }
}

/// The zone table every server starts with.
pub fn default_zones() -> Vec<Zone> {
    vec![
        Zone::new("Garden", 0.0, 200.0, 1.0, 1)
            .spawns(&LADYBUG, 10.0)
            .spawns(&ROCK, 6.0)
            .spawns(&BEE, 3.0)
            .spawns(&CENTIPEDE, 1.0),
        Zone::new("Desert", 200.0, 200.0, 1.25, 15)
            .spawns(&ROCK, 4.0)
            .spawns(&BEE, 6.0)
            .spawns(&HORNET, 4.0)
            .spawns(&CENTIPEDE, 2.0),
        Zone::new("Jungle", 400.0, 200.0, 1.5, 30)
            .spawns(&HORNET, 6.0)
            .spawns(&SPIDER, 3.0)
            .spawns(&DESERT_CENTIPEDE, 1.0),
        Zone::new("Hell", 600.0, 200.0, 1.5, 45)
            .spawns(&SPIDER, 6.0)
            .spawns(&DESERT_CENTIPEDE, 3.0)
            .spawns(&MYTHIC_LADYBUG, 0.05),
    ]
}

/// Total width covered by the default zone table.
pub fn default_world_width() -> f32 {
    default_zones().iter().map(|zone| zone.width).sum()
}

/// Player level for a cumulative experience value. Level 1 at zero exp,
/// each further level costs a little more than the last.
pub fn level_for_exp(exp: u32) -> u32 {
    let mut level = 1;
    let mut remaining = exp as u64;
    loop {
        let cost = exp_to_next_level(level);
        if remaining < cost {
            return level;
        }
        remaining -= cost;
        level += 1;
    }
}

pub fn exp_to_next_level(level: u32) -> u64 {
    (10.0 * 1.1f64.powi(level as i32 - 1)).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_default_zones_are_contiguous() {
        let zones = default_zones();
        let mut cursor = 0.0;
        for zone in &zones {
            assert_eq!(zone.x, cursor);
            assert!(zone.width > 0.0);
            cursor = zone.end();
        }
        assert_eq!(cursor, default_world_width());
    }

    #[test]
    fn test_max_mob_count_formula() {
        let zone = Zone::new("Test", 0.0, 100.0, 15.0, 1);
        assert_approx_eq!(zone.max_mob_count(20.0), 100.0, 1e-4);
    }

    #[test]
    fn test_contains_x_is_half_open() {
        let zone = Zone::new("Test", 100.0, 50.0, 1.0, 1);
        assert!(zone.contains_x(100.0));
        assert!(zone.contains_x(149.9));
        assert!(!zone.contains_x(150.0));
    }

    #[test]
    fn test_level_curve() {
        assert_eq!(level_for_exp(0), 1);
        assert_eq!(level_for_exp(9), 1);
        assert_eq!(level_for_exp(10), 2);
        // 10 + 11 to reach level 3
        assert_eq!(level_for_exp(20), 2);
        assert_eq!(level_for_exp(21), 3);
        assert!(level_for_exp(100_000) > level_for_exp(10_000));
    }
}
