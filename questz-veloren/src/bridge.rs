//! Bridge module — maps between Veloren and QUESTZ type systems.
//!
//! Veloren identifies things its own way:
//! - `common::rtsim::Profession` for what an NPC does
//! - `BlockKind` / `SpriteKind` for what occupies a voxel
//! - `Vec3<f32>` world positions with **z** as the vertical axis
//! - `NpcId` / `CharacterId` for identity
//!
//! QUESTZ uses [`Role`], [`Material`], integer [`BlockPos`] with **y** up,
//! and UUID-backed [`EntityId`]s. This module converts between the two so the
//! quest engine never sees Veloren types.

use std::collections::HashMap;

use questz_core::{BlockPos, EntityId, Material, Role};

// ---------------------------------------------------------------------------
// Profession Mapping
// ---------------------------------------------------------------------------

/// Map a Veloren profession (or a QUESTZ role name) to a [`Role`].
///
/// Matching is case-insensitive. Unknown professions are [`Role::None`],
/// which still gets residence quests.
#[must_use]
pub fn role_from_profession(name: &str) -> Role {
    match name.trim().to_ascii_lowercase().as_str() {
        "farmer" | "cultivator" => Role::Farmer,
        "fisherman" | "fisher" => Role::Fisherman,
        "shepherd" => Role::Shepherd,
        "fletcher" => Role::Fletcher,
        "mason" => Role::Mason,
        "cleric" | "alchemist" | "herbalist" => Role::Cleric,
        "librarian" => Role::Librarian,
        "armorer" | "guard" => Role::Armorer,
        "butcher" | "chef" => Role::Butcher,
        "cartographer" | "merchant" | "captain" => Role::Cartographer,
        "leatherworker" | "hunter" => Role::Leatherworker,
        "toolsmith" => Role::Toolsmith,
        "weaponsmith" | "blacksmith" => Role::Weaponsmith,
        "nitwit" | "adventurer" => Role::Nitwit,
        _ => Role::None,
    }
}

// ---------------------------------------------------------------------------
// Block Mapping
// ---------------------------------------------------------------------------

/// Map a Veloren `BlockKind` or `SpriteKind` name to a [`Material`].
///
/// Sprites take precedence: a block carrying a bed sprite is a bed. Anything
/// without a dedicated mapping goes through [`Material::from_registry_name`]
/// on the snake-cased name, so mod-added blocks still round-trip.
#[must_use]
pub fn material_from_veloren(block_kind: &str, sprite: Option<&str>) -> Material {
    if let Some(sprite) = sprite {
        if let Some(m) = sprite_material(sprite) {
            return m;
        }
    }
    match block_kind {
        "Air" | "Empty" => Material::Air,
        "Water" => Material::Water,
        "Lava" => Material::Lava,
        "Grass" => Material::Grass,
        "Earth" => Material::Dirt,
        "Sand" => Material::Sand,
        "Rock" | "WeakRock" => Material::Stone,
        "Wood" => Material::OakPlanks,
        "GlowingRock" => Material::Glowstone,
        "Glass" => Material::Glass,
        other => Material::from_registry_name(&snake_case(other)),
    }
}

fn sprite_material(sprite: &str) -> Option<Material> {
    let m = match sprite {
        "Bed" | "BedWoodWoodlandHead" => Material::RedBed,
        "CraftingBench" => Material::CraftingTable,
        "Forge" => Material::BlastFurnace,
        "Anvil" => Material::SmithingTable,
        "Cauldron" => Material::Cauldron,
        "Loom" | "SpinningWheel" => Material::Loom,
        "DismantlingBench" => Material::Grindstone,
        "RepairBench" => Material::Stonecutter,
        "Bookshelf" => Material::Bookshelf,
        "Door" | "DoorWide" => Material::OakDoor,
        "DoorDark" => Material::IronDoor,
        "Hatch" => Material::OakTrapdoor,
        "WallLamp" | "WallLampSmall" | "WallSconce" => Material::WallTorch,
        "Lantern" | "StreetLamp" => Material::Torch,
        "Sign" => Material::OakSign,
        "Banner" => Material::WhiteBanner,
        "Carpet" | "Rug" => Material::WhiteCarpet,
        _ => return None,
    };
    Some(m)
}

/// `"WeakRock"` → `"weak_rock"`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Position Mapping
// ---------------------------------------------------------------------------

/// Convert a Veloren world position (z up) to the containing [`BlockPos`] (y up).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn block_pos_from_world(x: f32, y: f32, z: f32) -> BlockPos {
    BlockPos::new(x.floor() as i32, z.floor() as i32, y.floor() as i32)
}

/// Centre of a [`BlockPos`] as a Veloren world position `[x, y, z]` (z up).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn world_from_block_pos(pos: BlockPos) -> [f32; 3] {
    [
        pos.x as f32 + 0.5,
        pos.z as f32 + 0.5,
        pos.y as f32 + 0.5,
    ]
}

// ---------------------------------------------------------------------------
// Entity ID Registry
// ---------------------------------------------------------------------------

/// Stable mapping between Veloren identities and QUESTZ [`EntityId`]s.
///
/// NPCs are keyed by their rtsim UID, players by character ID.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    npc_to_entity: HashMap<u64, EntityId>,
    entity_to_npc: HashMap<EntityId, u64>,
    character_to_entity: HashMap<i64, EntityId>,
    entity_to_character: HashMap<EntityId, i64>,
}

impl EntityRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the [`EntityId`] for a Veloren NPC.
    pub fn npc_entity(&mut self, npc_uid: u64) -> EntityId {
        *self.npc_to_entity.entry(npc_uid).or_insert_with(|| {
            let id = EntityId::new();
            self.entity_to_npc.insert(id, npc_uid);
            id
        })
    }

    /// Get or create the [`EntityId`] for a player character.
    pub fn character_entity(&mut self, character_id: i64) -> EntityId {
        *self
            .character_to_entity
            .entry(character_id)
            .or_insert_with(|| {
                let id = EntityId::new();
                self.entity_to_character.insert(id, character_id);
                id
            })
    }

    /// Veloren NPC UID behind an [`EntityId`].
    #[must_use]
    pub fn lookup_npc(&self, entity: EntityId) -> Option<u64> {
        self.entity_to_npc.get(&entity).copied()
    }

    /// Character ID behind an [`EntityId`].
    #[must_use]
    pub fn lookup_character(&self, entity: EntityId) -> Option<i64> {
        self.entity_to_character.get(&entity).copied()
    }

    /// Drop a despawned NPC. Returns its [`EntityId`] if it was known.
    pub fn forget_npc(&mut self, npc_uid: u64) -> Option<EntityId> {
        let id = self.npc_to_entity.remove(&npc_uid)?;
        self.entity_to_npc.remove(&id);
        Some(id)
    }

    /// Total registered entities.
    #[must_use]
    pub fn count(&self) -> usize {
        self.npc_to_entity.len() + self.character_to_entity.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use questz_core::material::MaterialClass;

    #[test]
    fn professions_map_to_roles() {
        assert_eq!(role_from_profession("Farmer"), Role::Farmer);
        assert_eq!(role_from_profession("blacksmith"), Role::Weaponsmith);
        assert_eq!(role_from_profession(" Librarian "), Role::Librarian);
        assert_eq!(role_from_profession("Pirate"), Role::None);
    }

    #[test]
    fn sprites_win_over_blocks() {
        assert_eq!(material_from_veloren("Air", Some("Bed")), Material::RedBed);
        assert_eq!(material_from_veloren("Air", Some("Flower")), Material::Air);
        assert_eq!(
            material_from_veloren("Wood", Some("Door")).class(),
            MaterialClass::Door
        );
        assert_eq!(
            material_from_veloren("Air", Some("WallLamp")).class(),
            MaterialClass::ThinDecoration
        );
    }

    #[test]
    fn unknown_blocks_keep_their_name() {
        assert_eq!(material_from_veloren("Rock", None), Material::Stone);
        assert_eq!(
            material_from_veloren("ArtLeaves", None),
            Material::Other("art_leaves".to_string())
        );
    }

    #[test]
    fn vertical_axis_is_swapped() {
        let pos = block_pos_from_world(3.7, -1.2, 64.0);
        assert_eq!(pos, BlockPos::new(3, 64, -2));
        assert_eq!(world_from_block_pos(pos), [3.5, -1.5, 64.5]);
    }

    #[test]
    fn entity_registry_is_stable() {
        let mut reg = EntityRegistry::new();
        let id1 = reg.npc_entity(42);
        assert_eq!(reg.npc_entity(42), id1);
        assert_ne!(reg.npc_entity(99), id1);
        assert_eq!(reg.lookup_npc(id1), Some(42));

        let player = reg.character_entity(1001);
        assert_eq!(reg.lookup_character(player), Some(1001));
        assert_eq!(reg.count(), 3);

        assert_eq!(reg.forget_npc(42), Some(id1));
        assert_eq!(reg.lookup_npc(id1), None);
        assert_eq!(reg.count(), 2);
    }
}
