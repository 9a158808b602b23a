//! Axis-aligned rectangles on the integer city grid.
//!
//! Every placed thing in the simulation (buildings, road nodes, query areas)
//! is described by a [`GridPosition`]. Rectangles are half-open: a rectangle
//! at `x` with `width` covers columns `x..x + width`, so two rectangles that
//! only share an edge do not overlap.

use bevy_ecs::prelude::Component;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{CityError, Result};

/// Rectangle in grid units, anchored at its top-left corner.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl GridPosition {
    /// Creates a rectangle, rejecting a width or height below 1.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Result<Self> {
        if width < 1 || height < 1 {
            return Err(CityError::InvalidDimensions { width, height });
        }
        Ok(Self { x, y, width, height })
    }

    /// A single 1x1 cell.
    pub fn cell(x: i32, y: i32) -> Self {
        Self { x, y, width: 1, height: 1 }
    }

    /// Exclusive right edge.
    ///
    /// Widened to `i64`: a rectangle at `i32::MAX` ends one past it.
    #[inline]
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// True when `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &GridPosition) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True when the two rectangles share interior area.
    pub fn overlaps(&self, other: &GridPosition) -> bool {
        !(i64::from(other.x) >= self.right()
            || other.right() <= i64::from(self.x)
            || i64::from(other.y) >= self.bottom()
            || other.bottom() <= i64::from(self.y))
    }

    /// Geometric midpoint.
    pub fn center(&self) -> DVec2 {
        DVec2::new(
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// Euclidean distance between centers.
    pub fn distance_to(&self, other: &GridPosition) -> f64 {
        self.center().distance(other.center())
    }

    /// Top-left corner as a float vector.
    pub fn origin(&self) -> DVec2 {
        DVec2::new(self.x as f64, self.y as f64)
    }

    /// Euclidean distance between top-left corners.
    ///
    /// Road nodes are 1x1, so the corner is what routing measures against.
    pub fn origin_distance_to(&self, other: &GridPosition) -> f64 {
        self.origin().distance(other.origin())
    }
}
