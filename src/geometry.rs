//! Placement geometry for components and wires.

use serde::{Deserialize, Serialize};

/// A grid location in a circuit's coordinate space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    /// Creates a new location.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offsets this location by `(dx, dy)`.
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }

    /// Treats `offset` as a relative location and adds it.
    pub fn offset_by(&self, offset: Location) -> Self {
        self.translate(offset.x, offset.y)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    /// Creates a new rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Moves the rectangle by `(dx, dy)`.
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..*self }
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Bounds) -> Self {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// True if `loc` lies inside or on the border.
    pub fn contains(&self, loc: Location) -> bool {
        loc.x >= self.x
            && loc.x <= self.x + self.width
            && loc.y >= self.y
            && loc.y <= self.y + self.height
    }
}
