//! Agent professions and the fixed tables keyed by them.
//!
//! Two lookups drive generation: which workstation a [`Role`] needs in a
//! workplace, and which goods (and how many) it asks for in a delivery.

use crate::material::Material;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// An agent's profession.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// No profession yet.
    #[default]
    None,
    /// Cannot take a profession.
    Nitwit,
    /// Farmer.
    Farmer,
    /// Fisherman.
    Fisherman,
    /// Shepherd.
    Shepherd,
    /// Fletcher.
    Fletcher,
    /// Mason.
    Mason,
    /// Cleric.
    Cleric,
    /// Librarian.
    Librarian,
    /// Armorer.
    Armorer,
    /// Butcher.
    Butcher,
    /// Cartographer.
    Cartographer,
    /// Leatherworker.
    Leatherworker,
    /// Toolsmith.
    Toolsmith,
    /// Weaponsmith.
    Weaponsmith,
}

/// A role's delivery request: one good is picked from `choices`, with a
/// quantity rolled uniformly in `amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTemplate {
    /// Goods the agent may ask for.
    pub choices: &'static [Material],
    /// Inclusive quantity range.
    pub amount: RangeInclusive<u32>,
}

const CROPS: &[Material] = &[
    Material::Wheat,
    Material::Carrots,
    Material::Potatoes,
    Material::Beetroots,
];
const WOOL: &[Material] = &[
    Material::WhiteWool,
    Material::BrownWool,
    Material::LightGrayWool,
    Material::GrayWool,
];
const MASONRY: &[Material] = &[
    Material::Stone,
    Material::Cobblestone,
    Material::Andesite,
    Material::Diorite,
];
const KELP: &[Material] = &[Material::DriedKelpBlock];
const LOGS: &[Material] = &[Material::OakLog];
const GLOWSTONE: &[Material] = &[Material::Glowstone];
const BOOKSHELVES: &[Material] = &[Material::Bookshelf];

impl Role {
    /// Whether the agent works a profession (and so can ask for a workplace).
    #[must_use]
    pub const fn is_employed(self) -> bool {
        !matches!(self, Self::None | Self::Nitwit)
    }

    /// The workstation a workplace for this role must contain.
    #[must_use]
    pub const fn workstation(self) -> Material {
        match self {
            Self::Armorer => Material::BlastFurnace,
            Self::Butcher => Material::Smoker,
            Self::Cartographer => Material::CartographyTable,
            Self::Cleric => Material::BrewingStand,
            Self::Farmer => Material::Composter,
            Self::Fisherman => Material::Barrel,
            Self::Fletcher => Material::FletchingTable,
            Self::Leatherworker => Material::Cauldron,
            Self::Librarian => Material::Lectern,
            Self::Mason => Material::Stonecutter,
            Self::Shepherd => Material::Loom,
            Self::Toolsmith => Material::SmithingTable,
            Self::Weaponsmith => Material::Grindstone,
            Self::None | Self::Nitwit => Material::CraftingTable,
        }
    }

    /// What this role asks for in a delivery quest.
    #[must_use]
    pub fn delivery_template(self) -> DeliveryTemplate {
        let (choices, amount): (&'static [Material], RangeInclusive<u32>) = match self {
            Self::Farmer => (CROPS, 16..=48),
            Self::Fisherman => (KELP, 8..=24),
            Self::Shepherd => (WOOL, 16..=48),
            Self::Fletcher => (LOGS, 16..=32),
            Self::Mason => (MASONRY, 32..=64),
            Self::Cleric => (GLOWSTONE, 8..=16),
            Self::Librarian => (BOOKSHELVES, 4..=8),
            _ => (LOGS, 8..=24),
        };
        DeliveryTemplate { choices, amount }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
