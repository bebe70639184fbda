//! Mob behaviour: free wandering, or trailing the segment ahead in a chain.

use rand::rngs::StdRng;
use rand::Rng;
use shared::definitions::MobDefinition;
use shared::{EntityId, Vec2};
use std::f32::consts::TAU;
use std::ops::Range;

/// Seconds a wandering mob keeps its heading before picking a new one.
pub const WANDER_INTERVAL: Range<f32> = 2.0..5.0;

/// Center distance between consecutive chain segments, in radii.
pub const SEGMENT_SPACING: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct MobData {
    pub definition: &'static MobDefinition,
    /// Segment this one trails behind. `None` for heads and solo mobs.
    pub leader: Option<EntityId>,
    /// Segment trailing this one, if any.
    pub follower: Option<EntityId>,
    wander_timer: f32,
}

impl MobData {
    pub fn new(definition: &'static MobDefinition, leader: Option<EntityId>) -> Self {
        Self {
            definition,
            leader,
            follower: None,
            wander_timer: 0.0,
        }
    }

    pub fn segment_spacing(&self) -> f32 {
        self.definition.hitbox_radius * SEGMENT_SPACING
    }

    /// Target position and facing after `dt` seconds.
    pub(crate) fn step(
        &mut self,
        position: Vec2,
        facing: Vec2,
        dt: f32,
        leader_position: Option<Vec2>,
        rng: &mut StdRng,
    ) -> (Vec2, Vec2) {
        if let Some(leader) = leader_position {
            return self.follow(position, facing, leader);
        }

        if self.definition.speed == 0.0 {
            return (position, facing);
        }

        self.wander_timer -= dt;
        let heading = if self.wander_timer <= 0.0 {
            self.wander_timer = rng.gen_range(WANDER_INTERVAL);
            Vec2::from_angle(rng.gen_range(0.0..TAU))
        } else {
            facing
        };
        (position.add(&heading.scale(self.definition.speed * dt)), heading)
    }

    fn follow(&self, position: Vec2, facing: Vec2, leader: Vec2) -> (Vec2, Vec2) {
        let offset = leader.sub(&position);
        let distance = offset.length();
        if distance == 0.0 {
            return (position, facing);
        }

        let heading = offset.scale(1.0 / distance);
        let slack = distance - self.segment_spacing();
        if slack <= 0.0 {
            return (position, heading);
        }
        (position.add(&heading.scale(slack)), heading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use shared::definitions::{CENTIPEDE, LADYBUG, ROCK};

    #[test]
    fn test_wandering_moves_at_definition_speed() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut mob = MobData::new(&LADYBUG, None);
        let start = Vec2::new(10.0, 10.0);

        let (target, heading) = mob.step(start, Vec2::new(1.0, 0.0), 0.5, None, &mut rng);
        assert_approx_eq!(target.distance(&start), LADYBUG.speed * 0.5, 1e-4);
        assert_approx_eq!(heading.length(), 1.0, 1e-5);
        assert!(WANDER_INTERVAL.contains(&mob.wander_timer));

        // Keeps its heading until the timer runs out
        let (_, next) = mob.step(target, heading, 0.5, None, &mut rng);
        assert_eq!(next, heading);
    }

    #[test]
    fn test_stationary_mob_stays_put() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut mob = MobData::new(&ROCK, None);
        let start = Vec2::new(4.0, 4.0);
        let (target, _) = mob.step(start, Vec2::new(0.0, 1.0), 1.0, None, &mut rng);
        assert_eq!(target, start);
    }

    #[test]
    fn test_segment_closes_gap_to_leader() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut segment = MobData::new(&CENTIPEDE, Some(1));
        let spacing = segment.segment_spacing();

        let leader = Vec2::new(20.0, 10.0);
        let (target, heading) = segment.step(
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 1.0),
            0.1,
            Some(leader),
            &mut rng,
        );
        assert_approx_eq!(target.distance(&leader), spacing, 1e-4);
        assert_eq!(heading, Vec2::new(1.0, 0.0));

        // Already close enough: only turns to face the leader
        let close = Vec2::new(leader.x - spacing / 2.0, leader.y);
        let (target, _) = segment.step(close, Vec2::new(0.0, 1.0), 0.1, Some(leader), &mut rng);
        assert_eq!(target, close);
    }
}
