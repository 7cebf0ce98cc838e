//! Core type definitions for the QUESTZ quest system.
//!
//! Identity and voxel-space primitives shared by every component. All
//! coordinates are integer block positions; all boxes are inclusive.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for any entity (agent or player) in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a claimed build area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimId(pub Uuid);

impl ClaimId {
    /// Create a new random claim ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClaimId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// An integer voxel coordinate. `y` is the vertical axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y (vertical) coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Create a block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Translate by the given deltas.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The block directly above.
    #[must_use]
    pub const fn above(self, n: i32) -> Self {
        self.offset(0, n, 0)
    }

    /// The six face-adjacent neighbours (up, down, north, south, east, west).
    #[must_use]
    pub const fn neighbors(self) -> [Self; 6] {
        [
            self.offset(0, 1, 0),
            self.offset(0, -1, 0),
            self.offset(0, 0, -1),
            self.offset(0, 0, 1),
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
        ]
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Straight-line distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        let dz = f64::from(self.z) - f64::from(other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// An inclusive, axis-aligned box of blocks. `min <= max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum corner (inclusive).
    pub min: BlockPos,
    /// Maximum corner (inclusive).
    pub max: BlockPos,
}

impl Bounds {
    /// Build a box from two arbitrary corners, normalising them into min/max.
    #[must_use]
    pub fn from_corners(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// A single-block box.
    #[must_use]
    pub const fn point(pos: BlockPos) -> Self {
        Self { min: pos, max: pos }
    }

    /// Grow the box by `margin` blocks on every side.
    #[must_use]
    pub const fn expand(self, margin: i32) -> Self {
        Self {
            min: self.min.offset(-margin, -margin, -margin),
            max: self.max.offset(margin, margin, margin),
        }
    }

    /// Whether `pos` lies inside the box.
    #[must_use]
    pub const fn contains(&self, pos: BlockPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    /// Separating-axis test: the boxes share at least one block.
    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        !(other.max.x < self.min.x
            || other.min.x > self.max.x
            || other.max.y < self.min.y
            || other.min.y > self.max.y
            || other.max.z < self.min.z
            || other.min.z > self.max.z)
    }

    /// Extent along x.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.max.x - self.min.x + 1
    }

    /// Extent along y.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.max.y - self.min.y + 1
    }

    /// Extent along z.
    #[must_use]
    pub const fn length(&self) -> i32 {
        self.max.z - self.min.z + 1
    }

    /// Number of blocks in the box.
    #[must_use]
    pub fn volume(&self) -> u64 {
        let w = u64::try_from(self.width()).unwrap_or(0);
        let h = u64::try_from(self.height()).unwrap_or(0);
        let l = u64::try_from(self.length()).unwrap_or(0);
        w * h * l
    }

    /// Iterate every position in the box, x-major then y then z.
    pub fn iter(&self) -> impl Iterator<Item = BlockPos> + '_ {
        let (min, max) = (self.min, self.max);
        (min.x..=max.x).flat_map(move |x| {
            (min.y..=max.y).flat_map(move |y| (min.z..=max.z).map(move |z| BlockPos::new(x, y, z)))
        })
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}
