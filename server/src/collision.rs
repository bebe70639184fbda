//! Narrow-phase collision over the active entity set.
//!
//! Detection and resolution are separate passes. During detection every
//! active entity queries the grid for candidates, runs the exact shape test
//! and applies contact damage right away. Position corrections are only
//! recorded as [`CollisionTask`]s, so every test of the tick sees the
//! geometry as it was when the active set was collected. Each overlapping
//! pair shows up twice (once from each side) and each side resolves only
//! its own share of the push.

use crate::dirty::DirtyTracker;
use crate::entity::{Capability, ServerEntity, WorldBounds};
use crate::grid::SpatialGrid;
use crate::registry::EntityRegistry;
use log::trace;
use shared::{CollisionResponse, EntityId};
use std::collections::BTreeSet;

/// Deferred push of `source` out of `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionTask {
    pub source: EntityId,
    pub target: EntityId,
    pub collision: CollisionResponse,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageEvent {
    pub source: EntityId,
    pub target: EntityId,
    pub amount: f32,
    pub fatal: bool,
}

#[derive(Debug, Default)]
pub struct CollisionReport {
    pub tasks: Vec<CollisionTask>,
    pub damage: Vec<DamageEvent>,
}

impl CollisionReport {
    /// Entities killed by contact damage this pass.
    pub fn deaths(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.damage
            .iter()
            .filter(|event| event.fatal)
            .map(|event| event.target)
    }
}

/// Snapshot of the entities taking part in this tick's collision pass.
pub fn active_set(entities: &EntityRegistry<ServerEntity>) -> BTreeSet<EntityId> {
    entities
        .iter()
        .filter(|entity| entity.is_active())
        .map(|entity| entity.id)
        .collect()
}

/// Runs the exact tests for every active entity against its grid candidates.
///
/// Candidates outside `active` are skipped. Damage is applied immediately
/// and marks the target partially dirty, or fully dirty when it kills a player.
pub fn detect(
    entities: &mut EntityRegistry<ServerEntity>,
    grid: &SpatialGrid,
    active: &BTreeSet<EntityId>,
    dirty: &mut DirtyTracker,
) -> CollisionReport {
    let mut report = CollisionReport::default();

    for &source_id in active {
        let Some(source) = entities.get(source_id) else {
            continue;
        };
        let hitbox = source.hitbox;
        let team = source.team();
        let damage = source.damage;
        let attacker = source.owner();
        let deals_damage = source.supports(Capability::Damage);
        let responds = source.supports(Capability::CollisionResponse);

        for target_id in grid.query(&hitbox) {
            if target_id == source_id || !active.contains(&target_id) {
                continue;
            }
            let Some(target) = entities.get(target_id) else {
                continue;
            };
            let Some(collision) = hitbox.intersection(&target.hitbox) else {
                continue;
            };

            if deals_damage && target.supports(Capability::Damage) && target.team() != team {
                apply_damage(entities, dirty, &mut report, source_id, target_id, damage, attacker);
            }

            let Some(target) = entities.get(target_id) else {
                continue;
            };
            if responds && target.supports(Capability::CollisionResponse) {
                report.tasks.push(CollisionTask {
                    source: source_id,
                    target: target_id,
                    collision,
                });
            }
        }
    }

    report
}

fn apply_damage(
    entities: &mut EntityRegistry<ServerEntity>,
    dirty: &mut DirtyTracker,
    report: &mut CollisionReport,
    source: EntityId,
    target: EntityId,
    amount: f32,
    attacker: EntityId,
) {
    let Some(entity) = entities.get_mut(target) else {
        return;
    };
    let outcome = entity.receive_damage(amount, attacker);
    if !outcome.applied {
        return;
    }

    trace!("Entity {} dealt {} damage to {}", source, amount, target);
    dirty.mark_partial(target);
    if outcome.died && entity.as_player().is_some() {
        dirty.mark_full(target);
    }
    report.damage.push(DamageEvent {
        source,
        target,
        amount,
        fatal: outcome.died,
    });
}

/// Applies the deferred pushes, keeping the grid and dirty sets in step.
pub fn resolve(
    entities: &mut EntityRegistry<ServerEntity>,
    grid: &mut SpatialGrid,
    dirty: &mut DirtyTracker,
    tasks: &[CollisionTask],
    bounds: &WorldBounds,
) {
    for task in tasks {
        let Some(target_weight) = entities.get(task.target).map(|target| target.weight) else {
            continue;
        };
        let Some(source) = entities.get_mut(task.source) else {
            continue;
        };
        if source.destroyed {
            continue;
        }

        if source.collide_with(&task.collision, target_weight, bounds) {
            grid.update(task.source, source.hitbox.bounds());
            dirty.mark_partial(task.source);
        }
    }
}
