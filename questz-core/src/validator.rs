//! Structure validation.
//!
//! Decides whether what players built on a quest site satisfies the quest:
//!
//! 1. **Discovery**: the tight box around every non-air, non-fluid block
//!    inside the site is the "actual structure".
//! 2. **Furniture**: a bed (residences) or the required workstation
//!    (workplaces) must be inside it. This is the flood fill seed.
//! 3. **Enclosure**: breadth-first flood through air-passable blocks from
//!    the furniture. Reaching a block outside the structure box grown by
//!    `outer_margin` is a leak.
//! 4. **Materials**: every required material must be present in at least
//!    the required count.
//!
//! Every failing check contributes a reason, so a player sees all problems
//! at once. Only a missing structure or missing furniture stops early.

use crate::config::ValidationConfig;
use crate::material::{Material, MaterialClass};
use crate::quest::{Quest, QuestType};
use crate::types::{BlockPos, Bounds};
use crate::world::WorldView;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Instant;
use tracing::{debug, warn};

/// Reason given when the site holds nothing.
pub const NO_STRUCTURE: &str = "No structure found in the quest area";
/// Reason given when a residence has no bed.
pub const MISSING_BED: &str = "Missing required bed";
/// Reason given when a workplace has no workstation.
pub const MISSING_WORKSTATION: &str = "Missing required workstation";
/// Reason given when interior air reaches the outside.
pub const AIR_LEAK: &str = "Structure is not fully enclosed - air leaks to outside";

/// Outcome of the enclosure flood fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enclosure {
    /// The flood ran out of passable blocks inside the outer box.
    Sealed {
        /// Blocks visited.
        visited: usize,
    },
    /// The flood reached `escape`, outside the outer box.
    Leaks {
        /// First block found outside.
        escape: BlockPos,
    },
    /// The visit cap was hit before either happened. Treated as sealed.
    Inconclusive {
        /// Blocks visited.
        visited: usize,
    },
}

impl Enclosure {
    /// Whether the structure counts as enclosed.
    #[must_use]
    pub const fn is_enclosed(&self) -> bool {
        !matches!(self, Self::Leaks { .. })
    }
}

/// Verdict for one quest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// All checks passed.
    pub valid: bool,
    /// One entry per failing check.
    pub reasons: Vec<String>,
    /// Tight box around the built blocks.
    pub structure: Option<Bounds>,
    /// Where the bed or workstation was found.
    pub furniture: Option<BlockPos>,
    /// Enclosure result, when the flood fill ran.
    pub enclosure: Option<Enclosure>,
}

impl ValidationReport {
    fn fail(reason: &str, structure: Option<Bounds>) -> Self {
        Self {
            valid: false,
            reasons: vec![reason.to_string()],
            structure,
            furniture: None,
            enclosure: None,
        }
    }
}

/// Inspects the live world for a quest's structure.
#[derive(Debug, Clone)]
pub struct StructureValidator {
    outer_margin: i32,
    max_flood_nodes: usize,
    require_full_enclosure: bool,
}

impl Default for StructureValidator {
    fn default() -> Self {
        Self::new(&ValidationConfig::default())
    }
}

impl StructureValidator {
    /// Validator with the given tuning.
    #[must_use]
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            outer_margin: config.outer_margin,
            max_flood_nodes: config.max_flood_nodes.max(1),
            require_full_enclosure: config.require_full_enclosure,
        }
    }

    /// Run every check for a building quest.
    pub fn validate<W: WorldView + ?Sized>(&self, quest: &Quest, world: &W) -> ValidationReport {
        let start = Instant::now();

        let Some(structure) = find_structure(world, quest.site()) else {
            return ValidationReport::fail(NO_STRUCTURE, None);
        };

        let Some(furniture) = find_furniture(quest, world, structure) else {
            let reason = if quest.quest_type == QuestType::PersonalResidence {
                MISSING_BED
            } else {
                MISSING_WORKSTATION
            };
            return ValidationReport::fail(reason, Some(structure));
        };

        let mut reasons = Vec::new();

        let enclosure = self
            .require_full_enclosure
            .then(|| self.flood_fill(world, furniture, structure));
        if let Some(Enclosure::Leaks { escape }) = enclosure {
            debug!(issuer = %quest.issuer, %escape, "Air leak found");
            reasons.push(AIR_LEAK.to_string());
        }

        let found = count_materials(world, structure);
        reasons.extend(material_shortfall(&quest.required_materials, &found));

        debug!(
            issuer = %quest.issuer,
            %structure,
            reasons = reasons.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Validated structure"
        );

        ValidationReport {
            valid: reasons.is_empty(),
            reasons,
            structure: Some(structure),
            furniture: Some(furniture),
            enclosure,
        }
    }

    /// Breadth-first flood from `start` through air-passable blocks.
    ///
    /// The start block itself is always entered (it is usually the bed or
    /// workstation). A dequeued block outside `structure` grown by the outer
    /// margin ends the search as a leak.
    pub fn flood_fill<W: WorldView + ?Sized>(
        &self,
        world: &W,
        start: BlockPos,
        structure: Bounds,
    ) -> Enclosure {
        let outer = structure.expand(self.outer_margin);
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut iterations = 0;

        while let Some(current) = queue.pop_front() {
            if iterations >= self.max_flood_nodes {
                warn!(
                    %start,
                    visited = visited.len(),
                    cap = self.max_flood_nodes,
                    "Flood fill hit its visit cap; treating as enclosed"
                );
                return Enclosure::Inconclusive {
                    visited: visited.len(),
                };
            }
            iterations += 1;

            if !outer.contains(current) {
                return Enclosure::Leaks { escape: current };
            }

            for next in current.neighbors() {
                if visited.contains(&next) {
                    continue;
                }
                if world.material_at(next).is_passable_for_air() {
                    visited.insert(next);
                    queue.push_back(next);
                }
            }
        }

        Enclosure::Sealed {
            visited: visited.len(),
        }
    }
}

/// Tight box around every non-air, non-fluid block in `site`.
pub fn find_structure<W: WorldView + ?Sized>(world: &W, site: Bounds) -> Option<Bounds> {
    site.iter()
        .filter(|pos| {
            let m = world.material_at(*pos);
            !m.is_air() && !m.is_fluid()
        })
        .fold(None, |acc: Option<Bounds>, pos| {
            Some(acc.map_or_else(
                || Bounds::point(pos),
                |b| Bounds {
                    min: b.min.min(pos),
                    max: b.max.max(pos),
                },
            ))
        })
}

/// Position of the bed (residence) or the first required workstation found
/// (anything else) within `structure`.
pub fn find_furniture<W: WorldView + ?Sized>(
    quest: &Quest,
    world: &W,
    structure: Bounds,
) -> Option<BlockPos> {
    if quest.quest_type == QuestType::PersonalResidence {
        return structure
            .iter()
            .find(|pos| world.material_at(*pos).class() == MaterialClass::Bed);
    }

    quest
        .required_materials
        .keys()
        .filter(|m| m.class() == MaterialClass::Workstation)
        .find_map(|wanted| {
            structure
                .iter()
                .find(|pos| &world.material_at(*pos) == wanted)
        })
}

/// Count every non-air block in `bounds` by material.
pub fn count_materials<W: WorldView + ?Sized>(world: &W, bounds: Bounds) -> HashMap<Material, u32> {
    let mut found = HashMap::new();
    for pos in bounds.iter() {
        let m = world.material_at(pos);
        if !m.is_air() {
            *found.entry(m).or_insert(0) += 1;
        }
    }
    found
}

/// `"Missing <n>x <Material>"` for every requirement not met by `found`.
#[must_use]
pub fn material_shortfall(
    required: &BTreeMap<Material, u32>,
    found: &HashMap<Material, u32>,
) -> Vec<String> {
    required
        .iter()
        .filter_map(|(material, &need)| {
            let have = found.get(material).copied().unwrap_or(0);
            (have < need).then(|| format!("Missing {}x {}", need - have, material.display_name()))
        })
        .collect()
}

/// `"<n>x <Material>"` for every required good not covered by the delivered
/// stacks. Stacks of the same material are summed.
#[must_use]
pub fn delivery_shortfall(
    required: &BTreeMap<Material, u32>,
    delivered: &[(Material, u32)],
) -> Vec<String> {
    let mut have: HashMap<&Material, u32> = HashMap::new();
    for (material, count) in delivered {
        *have.entry(material).or_insert(0) += count;
    }
    required
        .iter()
        .filter_map(|(material, &need)| {
            let got = have.get(material).copied().unwrap_or(0);
            (got < need).then(|| format!("{}x {}", need - got, material.display_name()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityId;
    use crate::world::SparseWorld;

    fn residence(site: Bounds, planks: u32) -> Quest {
        let mut mats = BTreeMap::new();
        mats.insert(Material::OakPlanks, planks);
        mats.insert(Material::RedBed, 1);
        Quest::building(EntityId::new(), QuestType::PersonalResidence, site, mats, 10)
    }

    /// 5×5×5 oak box on flat ground at y=0, bed in the middle of the floor.
    fn boxed_world() -> (SparseWorld, Bounds) {
        let mut world = SparseWorld::flat(0);
        let shell = Bounds::from_corners(BlockPos::new(0, 1, 0), BlockPos::new(4, 5, 4));
        world.hollow_box(shell, &Material::OakPlanks);
        world.set(BlockPos::new(2, 2, 2), Material::RedBed);
        (world, shell)
    }

    #[test]
    fn empty_site_has_no_structure() {
        let world = SparseWorld::flat(0);
        let site = Bounds::from_corners(BlockPos::new(0, 1, 0), BlockPos::new(4, 5, 4));
        let report = StructureValidator::default().validate(&residence(site, 1), &world);
        assert!(!report.valid);
        assert_eq!(report.reasons, vec![NO_STRUCTURE.to_string()]);
    }

    #[test]
    fn fluids_are_not_structure() {
        let mut world = SparseWorld::flat(0);
        let site = Bounds::from_corners(BlockPos::new(0, 1, 0), BlockPos::new(4, 5, 4));
        world.set(BlockPos::new(1, 1, 1), Material::Water);
        assert!(find_structure(&world, site).is_none());
    }

    #[test]
    fn missing_bed_stops_early() {
        let (mut world, shell) = boxed_world();
        world.set(BlockPos::new(2, 2, 2), Material::Air);
        let report = StructureValidator::default().validate(&residence(shell, 500), &world);
        assert_eq!(report.reasons, vec![MISSING_BED.to_string()]);
        assert!(report.enclosure.is_none());
    }

    #[test]
    fn sealed_box_passes() {
        let (world, shell) = boxed_world();
        let report = StructureValidator::default().validate(&residence(shell, 10), &world);
        assert!(report.valid, "{:?}", report.reasons);
        assert_eq!(report.structure, Some(shell));
        assert_eq!(report.furniture, Some(BlockPos::new(2, 2, 2)));
        assert!(matches!(report.enclosure, Some(Enclosure::Sealed { .. })));
    }

    #[test]
    fn hole_in_wall_leaks() {
        let (mut world, shell) = boxed_world();
        world.set(BlockPos::new(0, 3, 2), Material::Air);
        let report = StructureValidator::default().validate(&residence(shell, 10), &world);
        assert!(!report.valid);
        assert!(report.reasons.contains(&AIR_LEAK.to_string()));
    }

    #[test]
    fn torch_in_the_hole_still_leaks() {
        let (mut world, shell) = boxed_world();
        world.set(BlockPos::new(0, 3, 2), Material::WallTorch);
        let v = StructureValidator::default();
        let e = v.flood_fill(&world, BlockPos::new(2, 2, 2), shell);
        assert!(!e.is_enclosed());
    }

    #[test]
    fn doors_and_trapdoors_count_as_wall() {
        let (mut world, shell) = boxed_world();
        world.set(BlockPos::new(0, 2, 2), Material::OakDoor);
        world.set(BlockPos::new(2, 5, 2), Material::OakTrapdoor);
        let e = StructureValidator::default().flood_fill(&world, BlockPos::new(2, 2, 2), shell);
        assert!(e.is_enclosed());
    }

    #[test]
    fn enclosure_check_can_be_disabled() {
        let (mut world, shell) = boxed_world();
        world.set(BlockPos::new(0, 3, 2), Material::Air);
        let v = StructureValidator::new(&ValidationConfig {
            require_full_enclosure: false,
            ..ValidationConfig::default()
        });
        let report = v.validate(&residence(shell, 10), &world);
        assert!(report.valid, "{:?}", report.reasons);
        assert!(report.enclosure.is_none());
    }

    #[test]
    fn visit_cap_is_inconclusive_not_a_leak() {
        let (mut world, shell) = boxed_world();
        world.set(BlockPos::new(0, 3, 2), Material::Air);
        let v = StructureValidator::new(&ValidationConfig {
            max_flood_nodes: 2,
            ..ValidationConfig::default()
        });
        let e = v.flood_fill(&world, BlockPos::new(2, 2, 2), shell);
        assert!(matches!(e, Enclosure::Inconclusive { .. }));
        assert!(e.is_enclosed());
    }

    #[test]
    fn workplace_seeds_from_its_workstation() {
        let (mut world, shell) = boxed_world();
        world.set(BlockPos::new(2, 2, 2), Material::Lectern);
        let mut mats = BTreeMap::new();
        mats.insert(Material::Lectern, 1);
        let q = Quest::building(EntityId::new(), QuestType::Workplace, shell, mats, 10);
        assert_eq!(find_furniture(&q, &world, shell), Some(BlockPos::new(2, 2, 2)));

        world.set(BlockPos::new(2, 2, 2), Material::Air);
        let report = StructureValidator::default().validate(&q, &world);
        assert_eq!(report.reasons, vec![MISSING_WORKSTATION.to_string()]);
    }

    #[test]
    fn shortfall_lists_each_missing_material() {
        let mut required = BTreeMap::new();
        required.insert(Material::OakPlanks, 10);
        required.insert(Material::Cobblestone, 4);
        let mut found = HashMap::new();
        found.insert(Material::OakPlanks, 7);
        found.insert(Material::Cobblestone, 9);
        assert_eq!(
            material_shortfall(&required, &found),
            vec!["Missing 3x Oak Planks".to_string()]
        );
    }

    #[test]
    fn delivery_stacks_are_summed() {
        let mut required = BTreeMap::new();
        required.insert(Material::Wheat, 20);
        let delivered = [(Material::Wheat, 12), (Material::Wheat, 5), (Material::Carrots, 64)];
        assert_eq!(delivery_shortfall(&required, &delivered), vec!["3x Wheat".to_string()]);
        let enough = [(Material::Wheat, 20)];
        assert!(delivery_shortfall(&required, &enough).is_empty());
    }
}
