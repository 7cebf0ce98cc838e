//! The world as the quest engine sees it.
//!
//! The engine never owns terrain. It reads blocks through [`WorldView`],
//! asks movement questions through [`Reachability`], and receives agents as
//! plain [`Agent`] snapshots.

use crate::material::Material;
use crate::roles::Role;
use crate::types::{BlockPos, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Read-only access to the voxel world.
pub trait WorldView {
    /// The material occupying `pos`.
    fn material_at(&self, pos: BlockPos) -> Material;

    /// The first open block above the highest non-air block in column
    /// `(x, z)`: the position something standing on the ground would occupy.
    fn surface_at(&self, x: i32, z: i32) -> BlockPos;
}

/// Pathfinding capability used after structural validation.
pub trait Reachability {
    /// Whether an agent can walk from `from` to `to`.
    fn can_reach(&self, from: BlockPos, to: BlockPos) -> bool;
}

/// Any closure `Fn(BlockPos, BlockPos) -> bool` is a reachability oracle.
impl<F> Reachability for F
where
    F: Fn(BlockPos, BlockPos) -> bool,
{
    fn can_reach(&self, from: BlockPos, to: BlockPos) -> bool {
        self(from, to)
    }
}

/// A snapshot of a quest-issuing agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable identity.
    pub id: EntityId,
    /// Current block position.
    pub position: BlockPos,
    /// Profession.
    pub role: Role,
}

impl Agent {
    /// Create an agent snapshot.
    #[must_use]
    pub const fn new(id: EntityId, position: BlockPos, role: Role) -> Self {
        Self { id, position, role }
    }
}

// ---------------------------------------------------------------------------
// SparseWorld
// ---------------------------------------------------------------------------

/// An in-memory world: flat ground at `ground_level`, plus explicitly placed
/// blocks. Blocks at or below ground level default to the ground material.
#[derive(Debug, Clone)]
pub struct SparseWorld {
    blocks: HashMap<BlockPos, Material>,
    /// Heights of placed non-air blocks, per `(x, z)` column.
    columns: HashMap<(i32, i32), BTreeSet<i32>>,
    ground_level: i32,
    ground: Material,
}

impl SparseWorld {
    /// Flat grass world with its top solid layer at `ground_level`.
    #[must_use]
    pub fn flat(ground_level: i32) -> Self {
        Self {
            blocks: HashMap::new(),
            columns: HashMap::new(),
            ground_level,
            ground: Material::Grass,
        }
    }

    /// Place (or overwrite) a block.
    pub fn set(&mut self, pos: BlockPos, material: Material) {
        let column = self.columns.entry((pos.x, pos.z)).or_default();
        if material.is_air() {
            column.remove(&pos.y);
        } else {
            column.insert(pos.y);
        }
        self.blocks.insert(pos, material);
    }

    /// Fill every position in the inclusive box.
    pub fn fill(&mut self, bounds: crate::types::Bounds, material: &Material) {
        for pos in bounds.iter() {
            self.set(pos, material.clone());
        }
    }

    /// Build a hollow box: walls, floor and roof of `wall`, air inside.
    pub fn hollow_box(&mut self, bounds: crate::types::Bounds, wall: &Material) {
        for pos in bounds.iter() {
            let on_shell = pos.x == bounds.min.x
                || pos.x == bounds.max.x
                || pos.y == bounds.min.y
                || pos.y == bounds.max.y
                || pos.z == bounds.min.z
                || pos.z == bounds.max.z;
            let m = if on_shell { wall.clone() } else { Material::Air };
            self.set(pos, m);
        }
    }

    /// Top solid layer of the default terrain.
    #[must_use]
    pub const fn ground_level(&self) -> i32 {
        self.ground_level
    }

    /// Number of explicitly placed blocks.
    #[must_use]
    pub fn placed(&self) -> usize {
        self.blocks.len()
    }
}

impl WorldView for SparseWorld {
    fn material_at(&self, pos: BlockPos) -> Material {
        if let Some(m) = self.blocks.get(&pos) {
            return m.clone();
        }
        if pos.y <= self.ground_level {
            self.ground.clone()
        } else {
            Material::Air
        }
    }

    fn surface_at(&self, x: i32, z: i32) -> BlockPos {
        let top = self
            .columns
            .get(&(x, z))
            .and_then(|ys| ys.last().copied())
            .map_or(self.ground_level, |y| y.max(self.ground_level));
        BlockPos::new(x, top + 1, z)
    }
}
