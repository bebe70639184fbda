//! Per-zone mob population control.
//!
//! Once per tick every zone, in declaration order, gets one chance to spawn:
//! a weighted draw picks a definition, a free spot is searched for, and the
//! spawn goes ahead while the zone is below its cap. Segmented mobs only
//! spawn when the whole chain fits under the cap.

use crate::error::ServerResult;
use crate::game::GameState;
use log::{error, trace};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use shared::definitions::MobDefinition;
use shared::{Hitbox, Rect, Vec2};
use std::f32::consts::TAU;

/// Random positions tried per zone and tick before giving up.
pub const MAX_PLACEMENT_ATTEMPTS: usize = 32;

/// Extra free space required around a new mob's hitbox.
pub const SPAWN_CLEARANCE: f32 = 2.0;

impl GameState {
    pub(crate) fn populate_zones(&mut self) {
        for index in 0..self.zones.len() {
            if let Err(err) = self.populate_zone(index) {
                error!("Population control stopped: {}", err);
                break;
            }
        }
    }

    fn populate_zone(&mut self, index: usize) -> ServerResult<()> {
        let Some(definition) = self.pick_definition(index) else {
            return Ok(());
        };
        let Some(position) = self.find_spawn_position(index, definition.hitbox_radius) else {
            trace!(
                "No room for {} in the {}",
                definition.id_string,
                self.zones[index].name
            );
            return Ok(());
        };

        let count = self.mob_count(index) as f32;
        let max = self.zones[index].max_mob_count(self.bounds.height);
        let fits = if definition.has_segments() {
            // The whole chain has to fit under the cap
            count + f32::from(definition.segments.unwrap_or(1)) <= max
        } else {
            count < max
        };
        if !fits {
            return Ok(());
        }

        let direction = Vec2::from_angle(self.rng.gen_range(0.0..TAU));
        self.spawn_mob(definition, position, direction)?;
        Ok(())
    }

    fn pick_definition(&mut self, index: usize) -> Option<&'static MobDefinition> {
        let spawning = &self.zones[index].spawning;
        let weights = WeightedIndex::new(spawning.iter().map(|(_, weight)| *weight)).ok()?;
        Some(spawning[weights.sample(&mut self.rng)].0)
    }

    /// A uniformly sampled spot in the zone whose surroundings are free.
    fn find_spawn_position(&mut self, index: usize, radius: f32) -> Option<Vec2> {
        let (start, end) = (self.zones[index].x, self.zones[index].end());

        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let sample = Vec2::new(
                self.rng.gen_range(start..end),
                self.rng.gen_range(0.0..self.bounds.height),
            );
            let position = self.bounds.clamp(sample, radius);
            let probe = Hitbox::circle(position, radius + SPAWN_CLEARANCE);

            let blocked = self.grid.query(&probe).into_iter().any(|id| {
                self.entities
                    .get(id)
                    .map_or(false, |entity| entity.hitbox.collides_with(&probe))
            });
            if !blocked {
                return Some(position);
            }
        }
        None
    }

    /// Mobs currently positioned inside the zone's band.
    pub fn mob_count(&self, index: usize) -> usize {
        let Some(zone) = self.zones.get(index) else {
            return 0;
        };
        let band = Rect::new(
            Vec2::new(zone.x, 0.0),
            Vec2::new(zone.end(), self.bounds.height),
        );

        self.grid
            .query_rect(&band)
            .into_iter()
            .filter_map(|id| self.entities.get(id))
            .filter(|entity| entity.as_mob().is_some())
            .filter(|entity| self.zone_index_at(entity.position.x) == index)
            .count()
    }
}
