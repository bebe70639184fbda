//! Collision shapes shared by the simulation and the client.
//!
//! Every shape can report its axis-aligned bounding box, which is what the
//! server's spatial grid indexes. Exact overlap is answered by
//! [`Hitbox::intersection`], which also yields the push direction and depth
//! used for physical collision response.

use crate::math::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle given by its inclusive corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Rectangle of the given half extents around `center`.
    pub fn around(center: Vec2, half_width: f32, half_height: f32) -> Self {
        Self {
            min: Vec2::new(center.x - half_width, center.y - half_height),
            max: Vec2::new(center.x + half_width, center.y + half_height),
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Inclusive overlap test; rectangles sharing an edge overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains(&self, point: &Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

/// Result of an exact intersection test.
///
/// `direction` is the unit vector pointing from the tested shape towards the
/// other shape and `depth` is how far they interpenetrate along it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionResponse {
    pub direction: Vec2,
    pub depth: f32,
}

impl CollisionResponse {
    fn flipped(self) -> Self {
        Self {
            direction: self.direction.scale(-1.0),
            depth: self.depth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Hitbox {
    Circle { center: Vec2, radius: f32 },
    Rect(Rect),
}

impl Hitbox {
    pub fn circle(center: Vec2, radius: f32) -> Self {
        Hitbox::Circle { center, radius }
    }

    pub fn rect(min: Vec2, max: Vec2) -> Self {
        Hitbox::Rect(Rect::new(min, max))
    }

    pub fn center(&self) -> Vec2 {
        match self {
            Hitbox::Circle { center, .. } => *center,
            Hitbox::Rect(rect) => rect.center(),
        }
    }

    /// Moves the shape so that its center lands on `position`.
    pub fn set_center(&mut self, position: Vec2) {
        match self {
            Hitbox::Circle { center, .. } => *center = position,
            Hitbox::Rect(rect) => {
                let offset = position.sub(&rect.center());
                rect.min = rect.min.add(&offset);
                rect.max = rect.max.add(&offset);
            }
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Hitbox::Circle { center, radius } => Rect::around(*center, *radius, *radius),
            Hitbox::Rect(rect) => *rect,
        }
    }

    pub fn collides_with(&self, other: &Hitbox) -> bool {
        self.intersection(other).is_some()
    }

    /// Exact overlap test. Touching shapes do not intersect.
    pub fn intersection(&self, other: &Hitbox) -> Option<CollisionResponse> {
        match (self, other) {
            (
                Hitbox::Circle { center: a, radius: ra },
                Hitbox::Circle { center: b, radius: rb },
            ) => circle_circle(*a, *ra, *b, *rb),
            (Hitbox::Circle { center, radius }, Hitbox::Rect(rect)) => {
                circle_rect(*center, *radius, rect)
            }
            (Hitbox::Rect(rect), Hitbox::Circle { center, radius }) => {
                circle_rect(*center, *radius, rect).map(CollisionResponse::flipped)
            }
            (Hitbox::Rect(a), Hitbox::Rect(b)) => rect_rect(a, b),
        }
    }
}

fn circle_circle(a: Vec2, ra: f32, b: Vec2, rb: f32) -> Option<CollisionResponse> {
    let delta = b.sub(&a);
    let distance = delta.length();
    let reach = ra + rb;
    if distance >= reach {
        return None;
    }

    // Coincident centers have no defined normal; push along +x.
    let direction = if distance > 0.0 {
        delta.scale(1.0 / distance)
    } else {
        Vec2::new(1.0, 0.0)
    };

    Some(CollisionResponse {
        direction,
        depth: reach - distance,
    })
}

fn circle_rect(center: Vec2, radius: f32, rect: &Rect) -> Option<CollisionResponse> {
    if rect.contains(&center) {
        // Push out through the nearest edge.
        let edges = [
            (center.x - rect.min.x, Vec2::new(1.0, 0.0)),
            (rect.max.x - center.x, Vec2::new(-1.0, 0.0)),
            (center.y - rect.min.y, Vec2::new(0.0, 1.0)),
            (rect.max.y - center.y, Vec2::new(0.0, -1.0)),
        ];
        let (distance, direction) = edges
            .iter()
            .copied()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .unwrap_or((0.0, Vec2::new(1.0, 0.0)));

        return Some(CollisionResponse {
            direction,
            depth: radius + distance,
        });
    }

    let closest = center.clamp(&rect.min, &rect.max);
    let delta = closest.sub(&center);
    let distance = delta.length();
    if distance >= radius {
        return None;
    }

    Some(CollisionResponse {
        direction: delta.scale(1.0 / distance),
        depth: radius - distance,
    })
}

fn rect_rect(a: &Rect, b: &Rect) -> Option<CollisionResponse> {
    let overlap_x = a.max.x.min(b.max.x) - a.min.x.max(b.min.x);
    let overlap_y = a.max.y.min(b.max.y) - a.min.y.max(b.min.y);
    if overlap_x <= 0.0 || overlap_y <= 0.0 {
        return None;
    }

    let (ca, cb) = (a.center(), b.center());
    // Resolve along the axis of shallowest penetration
    if overlap_x < overlap_y {
        let sign = if cb.x >= ca.x { 1.0 } else { -1.0 };
        Some(CollisionResponse {
            direction: Vec2::new(sign, 0.0),
            depth: overlap_x,
        })
    } else {
        let sign = if cb.y >= ca.y { 1.0 } else { -1.0 };
        Some(CollisionResponse {
            direction: Vec2::new(0.0, sign),
            depth: overlap_y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_circle_bounds() {
        let hitbox = Hitbox::circle(Vec2::new(10.0, 5.0), 2.0);
        let bounds = hitbox.bounds();
        assert_eq!(bounds.min, Vec2::new(8.0, 3.0));
        assert_eq!(bounds.max, Vec2::new(12.0, 7.0));
    }

    #[test]
    fn test_circle_circle_intersection() {
        let a = Hitbox::circle(Vec2::new(0.0, 0.0), 1.0);
        let b = Hitbox::circle(Vec2::new(1.5, 0.0), 1.0);

        let hit = a.intersection(&b).unwrap();
        assert_approx_eq!(hit.depth, 0.5, 1e-6);
        assert_eq!(hit.direction, Vec2::new(1.0, 0.0));

        let back = b.intersection(&a).unwrap();
        assert_eq!(back.direction, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_touching_circles_do_not_collide() {
        let a = Hitbox::circle(Vec2::new(0.0, 0.0), 1.0);
        let b = Hitbox::circle(Vec2::new(2.0, 0.0), 1.0);
        assert!(!a.collides_with(&b));
    }

    #[test]
    fn test_coincident_circles_push_along_x() {
        let a = Hitbox::circle(Vec2::new(3.0, 3.0), 1.0);
        let hit = a.intersection(&a).unwrap();
        assert_eq!(hit.direction, Vec2::new(1.0, 0.0));
        assert_approx_eq!(hit.depth, 2.0, 1e-6);
    }

    #[test]
    fn test_circle_rect_outside_corner() {
        let circle = Hitbox::circle(Vec2::new(0.0, 0.0), 1.0);
        let rect = Hitbox::rect(Vec2::new(0.5, 0.5), Vec2::new(3.0, 3.0));
        assert!(circle.collides_with(&rect));

        let far = Hitbox::rect(Vec2::new(0.8, 0.8), Vec2::new(3.0, 3.0));
        assert!(!circle.collides_with(&far));
    }

    #[test]
    fn test_circle_inside_rect_pushes_to_nearest_edge() {
        let circle = Hitbox::circle(Vec2::new(1.0, 5.0), 0.5);
        let rect = Hitbox::rect(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));

        let hit = circle.intersection(&rect).unwrap();
        assert_eq!(hit.direction, Vec2::new(1.0, 0.0));
        assert_approx_eq!(hit.depth, 1.5, 1e-6);

        let flipped = rect.intersection(&circle).unwrap();
        assert_eq!(flipped.direction, Vec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_rect_rect_shallow_axis() {
        let a = Hitbox::rect(Vec2::new(0.0, 0.0), Vec2::new(4.0, 4.0));
        let b = Hitbox::rect(Vec2::new(3.5, 1.0), Vec2::new(8.0, 3.0));

        let hit = a.intersection(&b).unwrap();
        assert_eq!(hit.direction, Vec2::new(1.0, 0.0));
        assert_approx_eq!(hit.depth, 0.5, 1e-6);
    }

    #[test]
    fn test_rect_overlap_is_inclusive() {
        let a = Rect::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0));
        let b = Rect::new(Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0));
        let c = Rect::new(Vec2::new(1.1, 0.0), Vec2::new(2.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_set_center_moves_rect() {
        let mut hitbox = Hitbox::rect(Vec2::new(0.0, 0.0), Vec2::new(2.0, 4.0));
        hitbox.set_center(Vec2::new(10.0, 10.0));
        assert_eq!(hitbox.bounds().min, Vec2::new(9.0, 8.0));
        assert_eq!(hitbox.bounds().max, Vec2::new(11.0, 12.0));
    }
}
