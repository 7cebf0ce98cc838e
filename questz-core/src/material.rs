//! Block and item materials.
//!
//! A [`Material`] is both what occupies a voxel and what a player hands over
//! in a delivery. The validator only cares about a material's
//! [`MaterialClass`]: whether air can flow through it, whether it is a bed or
//! a workstation, and so on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A block / item kind.
///
/// Serialises as its registry name (`"oak_planks"`), so it can key JSON maps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Material {
    /// Empty space.
    Air,
    /// Water (fluid).
    Water,
    /// Lava (fluid).
    Lava,

    // -- terrain --
    /// Grass-topped dirt.
    Grass,
    /// Dirt.
    Dirt,
    /// Natural stone.
    Stone,
    /// Sand.
    Sand,

    // -- building materials --
    /// Oak planks.
    OakPlanks,
    /// Spruce planks.
    SprucePlanks,
    /// Dark oak planks.
    DarkOakPlanks,
    /// Stone bricks.
    StoneBricks,
    /// Cobblestone.
    Cobblestone,
    /// Clay bricks.
    Bricks,
    /// Glass.
    Glass,
    /// Andesite.
    Andesite,
    /// Diorite.
    Diorite,

    // -- delivery goods --
    /// Wheat.
    Wheat,
    /// Carrots.
    Carrots,
    /// Potatoes.
    Potatoes,
    /// Beetroots.
    Beetroots,
    /// Dried kelp block.
    DriedKelpBlock,
    /// White wool.
    WhiteWool,
    /// Brown wool.
    BrownWool,
    /// Light gray wool.
    LightGrayWool,
    /// Gray wool.
    GrayWool,
    /// Oak log.
    OakLog,
    /// Glowstone.
    Glowstone,
    /// Bookshelf.
    Bookshelf,

    // -- furniture --
    /// Red bed.
    RedBed,
    /// Crafting table.
    CraftingTable,
    /// Blast furnace.
    BlastFurnace,
    /// Smoker.
    Smoker,
    /// Cartography table.
    CartographyTable,
    /// Brewing stand.
    BrewingStand,
    /// Composter.
    Composter,
    /// Barrel.
    Barrel,
    /// Fletching table.
    FletchingTable,
    /// Cauldron.
    Cauldron,
    /// Lectern.
    Lectern,
    /// Stonecutter.
    Stonecutter,
    /// Loom.
    Loom,
    /// Smithing table.
    SmithingTable,
    /// Grindstone.
    Grindstone,

    // -- openings --
    /// Wooden door.
    OakDoor,
    /// Iron door.
    IronDoor,
    /// Wooden trapdoor.
    OakTrapdoor,

    // -- thin decorations --
    /// Standing torch.
    Torch,
    /// Wall-mounted torch.
    WallTorch,
    /// Redstone torch.
    RedstoneTorch,
    /// Soul torch.
    SoulTorch,
    /// Stone pressure plate.
    StonePressurePlate,
    /// Wooden button.
    OakButton,
    /// Wooden sign.
    OakSign,
    /// White banner.
    WhiteBanner,
    /// White carpet.
    WhiteCarpet,

    /// Anything else, by registry name (e.g. `"mossy_cobblestone"`).
    Other(String),
}

/// How the validator treats a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialClass {
    /// Empty space.
    Air,
    /// Liquid; ignored when discovering a structure.
    Fluid,
    /// Sleeping furniture for personal residences.
    Bed,
    /// Profession workstation for workplaces.
    Workstation,
    /// Door; counts as wall.
    Door,
    /// Trapdoor; counts as wall.
    Trapdoor,
    /// Thin decoration that air flows around (torches, plates, signs...).
    ThinDecoration,
    /// Any full block.
    Solid,
}

impl Material {
    /// Classify this material.
    #[must_use]
    pub fn class(&self) -> MaterialClass {
        match self {
            Self::Air => MaterialClass::Air,
            Self::Water | Self::Lava => MaterialClass::Fluid,
            Self::RedBed => MaterialClass::Bed,
            Self::CraftingTable
            | Self::BlastFurnace
            | Self::Smoker
            | Self::CartographyTable
            | Self::BrewingStand
            | Self::Composter
            | Self::Barrel
            | Self::FletchingTable
            | Self::Cauldron
            | Self::Lectern
            | Self::Stonecutter
            | Self::Loom
            | Self::SmithingTable
            | Self::Grindstone => MaterialClass::Workstation,
            Self::OakDoor | Self::IronDoor => MaterialClass::Door,
            Self::OakTrapdoor => MaterialClass::Trapdoor,
            Self::Torch
            | Self::WallTorch
            | Self::RedstoneTorch
            | Self::SoulTorch
            | Self::StonePressurePlate
            | Self::OakButton
            | Self::OakSign
            | Self::WhiteBanner
            | Self::WhiteCarpet => MaterialClass::ThinDecoration,
            Self::Other(name) => classify_by_name(name),
            _ => MaterialClass::Solid,
        }
    }

    /// Whether this is empty space.
    #[must_use]
    pub fn is_air(&self) -> bool {
        matches!(self, Self::Air)
    }

    /// Whether this is a liquid.
    #[must_use]
    pub fn is_fluid(&self) -> bool {
        self.class() == MaterialClass::Fluid
    }

    /// Whether air can flow through this block during an enclosure check.
    ///
    /// Doors and trapdoors are walls here even though entities can pass them.
    #[must_use]
    pub fn is_passable_for_air(&self) -> bool {
        matches!(
            self.class(),
            MaterialClass::Air | MaterialClass::ThinDecoration
        )
    }

    /// Human-readable name, as shown in failure reasons.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = match self {
            Self::Air => "Air",
            Self::Water => "Water",
            Self::Lava => "Lava",
            Self::Grass => "Grass Block",
            Self::Dirt => "Dirt",
            Self::Stone => "Stone",
            Self::Sand => "Sand",
            Self::OakPlanks => "Oak Planks",
            Self::SprucePlanks => "Spruce Planks",
            Self::DarkOakPlanks => "Dark Oak Planks",
            Self::StoneBricks => "Stone Bricks",
            Self::Cobblestone => "Cobblestone",
            Self::Bricks => "Bricks",
            Self::Glass => "Glass",
            Self::Andesite => "Andesite",
            Self::Diorite => "Diorite",
            Self::Wheat => "Wheat",
            Self::Carrots => "Carrots",
            Self::Potatoes => "Potatoes",
            Self::Beetroots => "Beetroots",
            Self::DriedKelpBlock => "Dried Kelp Block",
            Self::WhiteWool => "White Wool",
            Self::BrownWool => "Brown Wool",
            Self::LightGrayWool => "Light Gray Wool",
            Self::GrayWool => "Gray Wool",
            Self::OakLog => "Oak Log",
            Self::Glowstone => "Glowstone",
            Self::Bookshelf => "Bookshelf",
            Self::RedBed => "Red Bed",
            Self::CraftingTable => "Crafting Table",
            Self::BlastFurnace => "Blast Furnace",
            Self::Smoker => "Smoker",
            Self::CartographyTable => "Cartography Table",
            Self::BrewingStand => "Brewing Stand",
            Self::Composter => "Composter",
            Self::Barrel => "Barrel",
            Self::FletchingTable => "Fletching Table",
            Self::Cauldron => "Cauldron",
            Self::Lectern => "Lectern",
            Self::Stonecutter => "Stonecutter",
            Self::Loom => "Loom",
            Self::SmithingTable => "Smithing Table",
            Self::Grindstone => "Grindstone",
            Self::OakDoor => "Oak Door",
            Self::IronDoor => "Iron Door",
            Self::OakTrapdoor => "Oak Trapdoor",
            Self::Torch => "Torch",
            Self::WallTorch => "Wall Torch",
            Self::RedstoneTorch => "Redstone Torch",
            Self::SoulTorch => "Soul Torch",
            Self::StonePressurePlate => "Stone Pressure Plate",
            Self::OakButton => "Oak Button",
            Self::OakSign => "Oak Sign",
            Self::WhiteBanner => "White Banner",
            Self::WhiteCarpet => "White Carpet",
            Self::Other(name) => return title_case(name),
        };
        name.to_string()
    }
}

/// Every named variant, used to resolve registry names.
const KNOWN: &[Material] = &[
    Material::Air,
    Material::Water,
    Material::Lava,
    Material::Grass,
    Material::Dirt,
    Material::Stone,
    Material::Sand,
    Material::OakPlanks,
    Material::SprucePlanks,
    Material::DarkOakPlanks,
    Material::StoneBricks,
    Material::Cobblestone,
    Material::Bricks,
    Material::Glass,
    Material::Andesite,
    Material::Diorite,
    Material::Wheat,
    Material::Carrots,
    Material::Potatoes,
    Material::Beetroots,
    Material::DriedKelpBlock,
    Material::WhiteWool,
    Material::BrownWool,
    Material::LightGrayWool,
    Material::GrayWool,
    Material::OakLog,
    Material::Glowstone,
    Material::Bookshelf,
    Material::RedBed,
    Material::CraftingTable,
    Material::BlastFurnace,
    Material::Smoker,
    Material::CartographyTable,
    Material::BrewingStand,
    Material::Composter,
    Material::Barrel,
    Material::FletchingTable,
    Material::Cauldron,
    Material::Lectern,
    Material::Stonecutter,
    Material::Loom,
    Material::SmithingTable,
    Material::Grindstone,
    Material::OakDoor,
    Material::IronDoor,
    Material::OakTrapdoor,
    Material::Torch,
    Material::WallTorch,
    Material::RedstoneTorch,
    Material::SoulTorch,
    Material::StonePressurePlate,
    Material::OakButton,
    Material::OakSign,
    Material::WhiteBanner,
    Material::WhiteCarpet,
];

impl Material {
    /// Lower snake-case registry name, e.g. `"dark_oak_planks"`.
    #[must_use]
    pub fn registry_name(&self) -> String {
        match self {
            Self::Other(name) => name.clone(),
            named => named.display_name().to_ascii_lowercase().replace(' ', "_"),
        }
    }

    /// Resolve a registry name. Unknown names become [`Material::Other`].
    #[must_use]
    pub fn from_registry_name(name: &str) -> Self {
        let wanted = name.trim().to_ascii_lowercase();
        KNOWN
            .iter()
            .find(|m| m.registry_name() == wanted)
            .cloned()
            .unwrap_or(Self::Other(wanted))
    }
}

impl From<Material> for String {
    fn from(m: Material) -> Self {
        m.registry_name()
    }
}

impl From<String> for Material {
    fn from(name: String) -> Self {
        Self::from_registry_name(&name)
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Fallback classification for registry names we have no variant for.
fn classify_by_name(name: &str) -> MaterialClass {
    let name = name.to_ascii_lowercase();
    let has = |needle: &str| name.contains(needle);
    let segment = |word: &str| name.split('_').any(|part| part == word);

    if has("trapdoor") {
        MaterialClass::Trapdoor
    } else if has("door") {
        MaterialClass::Door
    } else if name.ends_with("_bed") || name == "bed" {
        MaterialClass::Bed
    } else if has("torch")
        || has("pressure_plate")
        || has("button")
        || segment("sign")
        || has("banner")
        || has("carpet")
    {
        MaterialClass::ThinDecoration
    } else if has("water") || has("lava") {
        MaterialClass::Fluid
    } else if name == "air" || name == "cave_air" || name == "void_air" {
        MaterialClass::Air
    } else {
        MaterialClass::Solid
    }
}

/// `"mossy_cobblestone"` → `"Mossy Cobblestone"`.
fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            chars.next().map_or_else(String::new, |c| {
                c.to_uppercase().chain(chars).collect::<String>()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}
