//! # QUESTZ Core Library
//!
//! Game-agnostic quest engine for villagers in block-based voxel worlds.
//!
//! Villagers hand out two kinds of quests:
//!
//! - **Building** — construct an enclosed structure inside a claimed site,
//!   furnished with a bed (residence) or the villager's workstation (workplace)
//! - **Delivery** — bring the villager a bundle of role-specific goods
//!
//! A [`QuestShard`] ties the pieces together for one world:
//!
//! - [`registry`] — one quest per issuing villager
//! - [`allocator`] — non-overlapping build-site claims with a buffer zone
//! - [`party`] — which player works which quest, and quest sharing
//! - [`cooldown`] — per-villager offer cooldowns and marker flags
//! - [`generator`] — site search, material lists and rewards
//! - [`validator`] — structure detection, material counts and the
//!   flood-fill enclosure test
//! - [`persistence`] — SQLite-backed state that survives restarts
//!
//! The host game supplies block lookups through [`WorldView`] and
//! pathfinding through [`Reachability`].

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allocator;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod generator;
pub mod material;
pub mod party;
pub mod persistence;
pub mod quest;
pub mod registry;
pub mod roles;
pub mod shard;
pub mod types;
pub mod validator;
pub mod world;

pub use config::QuestzConfig;
pub use error::QuestzError;
pub use material::Material;
pub use quest::{Quest, QuestType};
pub use roles::Role;
pub use shard::QuestShard;
pub use types::*;
pub use world::{Agent, Reachability, WorldView};
