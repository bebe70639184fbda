use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

///Represents a vector in 2D world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    ///Value along the x-axis.
    /// Positive direction is to the right.
    pub x: f32,
    ///Value along the y-axis.
    /// Positive direction is down, matching the world grid rows.
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Returns the unit vector pointing at the given angle in radians.
    pub fn from_angle(radians: f32) -> Vec2 {
        Vec2 {
            x: radians.cos(),
            y: radians.sin(),
        }
    }

    ///Returns the angle of the vector in radians, in `[0, TAU)`.
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x).rem_euclid(TAU)
    }

    ///Returns the magnitude of the vector.
    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    ///Returns the normalized vector, or zero for a zero-length input.
    pub fn normalize(&self) -> Vec2 {
        let mag = self.length();
        if mag == 0.0 {
            Vec2::ZERO
        } else {
            Vec2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vec2) -> Vec2 {
        Vec2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    ///Returns the difference `self - other`.
    pub fn sub(&self, other: &Vec2) -> Vec2 {
        Vec2 {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn distance(&self, other: &Vec2) -> f32 {
        self.sub(other).length()
    }

    ///Clamps each component into `[min, max]`.
    pub fn clamp(&self, min: &Vec2, max: &Vec2) -> Vec2 {
        Vec2 {
            x: self.x.max(min.x).min(max.x),
            y: self.y.max(min.y).min(max.y),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}
