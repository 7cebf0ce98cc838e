//! Procedural quest generation.
//!
//! Picks a quest family, then either derives a delivery order from the
//! agent's role or searches the terrain near the agent for a flat, clear,
//! unclaimed build site and sizes a building to it.

use crate::allocator::BuildingAreas;
use crate::config::{GenerationConfig, RewardConfig};
use crate::material::Material;
use crate::quest::{Quest, QuestType};
use crate::roles::Role;
use crate::types::{BlockPos, Bounds};
use crate::world::{Agent, WorldView};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Materials a building quest may ask for.
pub const BUILDING_MATERIALS: &[Material] = &[
    Material::OakPlanks,
    Material::SprucePlanks,
    Material::StoneBricks,
    Material::Cobblestone,
    Material::Bricks,
    Material::DarkOakPlanks,
];

/// Building reward: `volume / 10 + total_required / 20`, clamped.
#[must_use]
pub fn building_reward(volume: u64, total_required: u32, rewards: &RewardConfig) -> u32 {
    let raw = volume / 10 + u64::from(total_required) / 20;
    let raw = u32::try_from(raw).unwrap_or(u32::MAX);
    raw.clamp(rewards.building_min, rewards.building_max)
}

/// Delivery reward: `total_items / 4`, clamped.
#[must_use]
pub fn delivery_reward(total_items: u32, rewards: &RewardConfig) -> u32 {
    (total_items / 4).clamp(rewards.delivery_min, rewards.delivery_max)
}

/// Produces quests for agents.
#[derive(Debug, Clone, Default)]
pub struct QuestGenerator {
    generation: GenerationConfig,
    rewards: RewardConfig,
}

impl QuestGenerator {
    /// Generator with the given tuning.
    #[must_use]
    pub const fn new(generation: GenerationConfig, rewards: RewardConfig) -> Self {
        Self {
            generation,
            rewards,
        }
    }

    /// Generation tuning.
    #[must_use]
    pub const fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    /// Generate a quest for `agent`, claiming a build site in `areas` when
    /// a building quest is produced. `None` means nothing suitable was found
    /// this time; callers may simply try again later.
    pub fn generate<W, R>(
        &self,
        agent: &Agent,
        world: &W,
        areas: &mut BuildingAreas,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Option<Quest>
    where
        W: WorldView + ?Sized,
        R: Rng + ?Sized,
    {
        let g = &self.generation;
        let delivery = match (g.enable_building_quests, g.enable_delivery_quests) {
            (false, false) => return None,
            (true, true) => rng.gen_bool(g.delivery_quest_chance),
            (false, true) => true,
            (true, false) => false,
        };

        let quest = if delivery {
            self.generate_delivery(agent, rng)
        } else {
            self.generate_building(agent, world, areas, rng, now)
        };

        match &quest {
            Some(q) => info!(
                issuer = %agent.id,
                quest_type = %q.quest_type,
                reward = q.reward,
                "Generated quest"
            ),
            None => debug!(issuer = %agent.id, delivery, "No quest generated"),
        }
        quest
    }

    // -----------------------------------------------------------------------
    // Delivery
    // -----------------------------------------------------------------------

    /// A delivery order drawn from the agent's role table.
    pub fn generate_delivery<R: Rng + ?Sized>(&self, agent: &Agent, rng: &mut R) -> Option<Quest> {
        let items = delivery_items(agent.role, rng);
        if items.is_empty() {
            return None;
        }
        let total: u32 = items.values().sum();
        let reward = delivery_reward(total, &self.rewards);
        Some(Quest::delivery(agent.id, agent.position, items, reward))
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// A building quest on a freshly claimed site near the agent.
    pub fn generate_building<W, R>(
        &self,
        agent: &Agent,
        world: &W,
        areas: &mut BuildingAreas,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Option<Quest>
    where
        W: WorldView + ?Sized,
        R: Rng + ?Sized,
    {
        let quest_type = if agent.role.is_employed() && rng.gen_bool(0.5) {
            QuestType::Workplace
        } else {
            QuestType::PersonalResidence
        };

        let site = self.claim_site(agent, world, areas, rng, now)?;
        let required = self.building_materials(quest_type, agent.role, rng);
        let total: u32 = required.values().sum();
        let reward = building_reward(site.volume(), total, &self.rewards);
        Some(Quest::building(agent.id, quest_type, site, required, reward))
    }

    /// Try up to `search_attempts` random spots around the agent. The first
    /// suitable spot whose rolled footprint can be claimed wins.
    fn claim_site<W, R>(
        &self,
        agent: &Agent,
        world: &W,
        areas: &mut BuildingAreas,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Option<Bounds>
    where
        W: WorldView + ?Sized,
        R: Rng + ?Sized,
    {
        let g = &self.generation;
        let r = g.search_radius.max(1);
        let probe = g.min_build_width + 5;

        for attempt in 0..g.search_attempts {
            let dx = rng.gen_range(-r..r);
            let dz = rng.gen_range(-r..r);
            let corner = world.surface_at(agent.position.x + dx, agent.position.z + dz);

            if !self.is_site_suitable(world, corner, probe, probe) {
                debug!(attempt, %corner, "Site rejected: uneven or obstructed");
                continue;
            }

            let (w, h, l) = self.roll_dimensions(rng);
            let far = corner.offset(w - 1, h - 1, l - 1);
            if areas.try_claim(corner, far, agent.id, now).is_some() {
                return Some(Bounds::from_corners(corner, far));
            }
            debug!(attempt, %corner, "Site rejected: overlaps a claim");
        }
        None
    }

    /// Flat (surface within `max_height_deviation` of `corner`) and mostly
    /// clear (obstructed fraction of the clearance volume under the limit).
    #[must_use]
    pub fn is_site_suitable<W: WorldView + ?Sized>(
        &self,
        world: &W,
        corner: BlockPos,
        width: i32,
        length: i32,
    ) -> bool {
        let g = &self.generation;
        let mut obstructed = 0_u32;
        for x in 0..width {
            for z in 0..length {
                let column = corner.offset(x, 0, z);
                let ground = world.surface_at(column.x, column.z);
                if (ground.y - corner.y).abs() > g.max_height_deviation {
                    return false;
                }
                for dy in 1..=g.clearance_height {
                    if !world.material_at(column.above(dy)).is_air() {
                        obstructed += 1;
                    }
                }
            }
        }
        let capacity = f64::from(width) * f64::from(length) * f64::from(g.clearance_height);
        f64::from(obstructed) < capacity * g.max_obstruction_ratio
    }

    fn roll_dimensions<R: Rng + ?Sized>(&self, rng: &mut R) -> (i32, i32, i32) {
        let g = &self.generation;
        let (min, max) = (g.min_build_width, g.max_build_width);
        let width = rng.gen_range(min..=max);
        let length = rng.gen_range(min..=max).max((min + 1).min(max));
        let height = rng.gen_range(g.min_build_height..=g.max_build_height);
        (width, height, length)
    }

    /// One or two distinct building materials summing to a random total,
    /// plus the bed or workstation the quest type calls for.
    fn building_materials<R: Rng + ?Sized>(
        &self,
        quest_type: QuestType,
        role: Role,
        rng: &mut R,
    ) -> BTreeMap<Material, u32> {
        let g = &self.generation;
        let kinds = rng.gen_range(1..=2_usize);
        let total = rng.gen_range(g.min_required_blocks..=g.max_required_blocks);
        let chosen: Vec<&Material> = BUILDING_MATERIALS.choose_multiple(rng, kinds).collect();

        let mut required = BTreeMap::new();
        let per_kind = total / u32::try_from(chosen.len()).unwrap_or(1).max(1);
        let mut remaining = total;
        for (i, material) in chosen.iter().enumerate() {
            let amount = if i + 1 == chosen.len() { remaining } else { per_kind };
            if amount > 0 {
                required.insert((*material).clone(), amount);
            }
            remaining -= amount;
        }

        match quest_type {
            QuestType::PersonalResidence => {
                required.insert(Material::RedBed, 1);
            }
            QuestType::Workplace => {
                required.insert(role.workstation(), 1);
            }
            QuestType::Delivery => {}
        }
        required
    }
}

/// Goods the role asks for: one choice from its table, amount rolled in range.
pub fn delivery_items<R: Rng + ?Sized>(role: Role, rng: &mut R) -> BTreeMap<Material, u32> {
    let template = role.delivery_template();
    let mut items = BTreeMap::new();
    if let Some(material) = template.choices.choose(rng) {
        let amount = rng.gen_range(template.amount);
        if amount > 0 {
            items.insert(material.clone(), amount);
        }
    }
    items
}
