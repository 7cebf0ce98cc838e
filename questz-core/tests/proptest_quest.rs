//! Property-Based Tests for QUESTZ Core
//!
//! Uses `proptest` to check the quest engine's structural guarantees under
//! random inputs: claims never crowd each other, rewards stay inside their
//! configured range, sharing only ever adds free players, registry state
//! stays consistent, and generation is reproducible from a seed.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use chrono::Utc;
use questz_core::allocator::BuildingAreas;
use questz_core::config::RewardConfig;
use questz_core::generator::{building_reward, delivery_reward, QuestGenerator};
use questz_core::party::PartyTracker;
use questz_core::registry::QuestRegistry;
use questz_core::validator::delivery_shortfall;
use questz_core::world::SparseWorld;
use questz_core::{Agent, BlockPos, Bounds, EntityId, Material, Quest, Role};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_pos() -> impl Strategy<Value = BlockPos> {
    (-64..64i32, 0..32i32, -64..64i32).prop_map(|(x, y, z)| BlockPos::new(x, y, z))
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::None),
        Just(Role::Nitwit),
        Just(Role::Farmer),
        Just(Role::Fisherman),
        Just(Role::Shepherd),
        Just(Role::Mason),
        Just(Role::Librarian),
        Just(Role::Cleric),
        Just(Role::Toolsmith),
    ]
}

// ---------------------------------------------------------------------------
// Property: corners normalise and stay inside the box
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn bounds_contain_their_corners(a in arb_pos(), b in arb_pos()) {
        let bounds = Bounds::from_corners(a, b);
        prop_assert!(bounds.contains(a));
        prop_assert!(bounds.contains(b));
        prop_assert!(bounds.min.x <= bounds.max.x);
        prop_assert!(bounds.min.y <= bounds.max.y);
        prop_assert!(bounds.min.z <= bounds.max.z);
        prop_assert_eq!(bounds, Bounds::from_corners(b, a));
    }
}

// ---------------------------------------------------------------------------
// Property: accepted claims always keep the buffer between them
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn claims_never_crowd_each_other(
        requests in prop::collection::vec((arb_pos(), arb_pos()), 1..40),
        buffer in 0..5i32,
    ) {
        let mut areas = BuildingAreas::new(buffer);
        let now = Utc::now();
        for (a, b) in &requests {
            let before = areas.len();
            let id = areas.try_claim(*a, *b, EntityId::new(), now);
            prop_assert_eq!(id.is_some(), areas.len() == before + 1);
        }

        let claims = areas.areas();
        for (i, first) in claims.iter().enumerate() {
            for second in &claims[i + 1..] {
                prop_assert!(!first.bounds.expand(buffer).intersects(&second.bounds));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property: overlap is symmetric and a box can only be claimed once
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn overlap_is_symmetric(
        a in (arb_pos(), arb_pos()),
        b in (arb_pos(), arb_pos()),
        buffer in 0..5i32,
    ) {
        let first = Bounds::from_corners(a.0, a.1);
        let second = Bounds::from_corners(b.0, b.1);
        let now = Utc::now();

        let mut holding_first = BuildingAreas::new(buffer);
        prop_assert!(holding_first.try_claim(a.0, a.1, EntityId::new(), now).is_some());
        let mut holding_second = BuildingAreas::new(buffer);
        prop_assert!(holding_second.try_claim(b.0, b.1, EntityId::new(), now).is_some());

        prop_assert_eq!(
            holding_first.would_overlap(second),
            holding_second.would_overlap(first)
        );
    }

    #[test]
    fn same_box_cannot_be_claimed_twice(a in arb_pos(), b in arb_pos(), buffer in 0..5i32) {
        let mut areas = BuildingAreas::new(buffer);
        let now = Utc::now();
        prop_assert!(areas.try_claim(a, b, EntityId::new(), now).is_some());
        prop_assert!(areas.try_claim(a, b, EntityId::new(), now).is_none());
        prop_assert!(areas.try_claim(b, a, EntityId::new(), now).is_none());
        prop_assert_eq!(areas.len(), 1);
    }
}

// ---------------------------------------------------------------------------
// Property: rewards are clamped to the configured range
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn rewards_stay_in_range(volume in 0..100_000u64, total in 0..10_000u32) {
        let rewards = RewardConfig::default();
        let b = building_reward(volume, total, &rewards);
        prop_assert!(b >= rewards.building_min && b <= rewards.building_max);
        let d = delivery_reward(total, &rewards);
        prop_assert!(d >= rewards.delivery_min && d <= rewards.delivery_max);
    }
}

// ---------------------------------------------------------------------------
// Property: a delivery covering every requirement has no shortfall
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn covered_delivery_has_no_shortfall(
        wheat in 1..64u32,
        carrots in 1..64u32,
        extra in 0..16u32,
        split in 1..8u32,
    ) {
        let required: std::collections::BTreeMap<Material, u32> =
            [(Material::Wheat, wheat), (Material::Carrots, carrots)]
                .into_iter()
                .collect();
        let first = wheat.min(split);
        let delivered = vec![
            (Material::Wheat, first),
            (Material::Carrots, carrots + extra),
            (Material::Wheat, wheat - first),
        ];
        prop_assert!(delivery_shortfall(&required, &delivered).is_empty());

        let short = vec![(Material::Wheat, wheat - 1), (Material::Carrots, carrots)];
        prop_assert_eq!(
            delivery_shortfall(&required, &short),
            vec![format!("1x {}", Material::Wheat.display_name())]
        );
    }
}

// ---------------------------------------------------------------------------
// Property: the same seed generates the same quest
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn generation_is_reproducible(seed in any::<u64>(), role in arb_role()) {
        let generator = QuestGenerator::default();
        let world = SparseWorld::flat(0);
        let agent = Agent::new(EntityId::new(), BlockPos::new(0, 1, 0), role);
        let now = Utc::now();

        let mut first_areas = BuildingAreas::default();
        let mut second_areas = BuildingAreas::default();
        let first = generator.generate(&agent, &world, &mut first_areas, &mut StdRng::seed_from_u64(seed), now);
        let second = generator.generate(&agent, &world, &mut second_areas, &mut StdRng::seed_from_u64(seed), now);

        prop_assert_eq!(&first, &second);
        if let Some(quest) = first {
            prop_assert!(quest.reward > 0);
            prop_assert!(!quest.required_materials.is_empty());
            prop_assert_eq!(first_areas.len(), usize::from(quest.quest_type.is_building()));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: a completed quest is never active, whatever the call order
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn completed_quests_stay_inactive(ops in prop::collection::vec(any::<bool>(), 0..20)) {
        let mut quest = Quest::delivery(
            EntityId::new(),
            BlockPos::new(0, 1, 0),
            [(Material::Wheat, 10)].into_iter().collect(),
            3,
        );
        for activate in ops {
            if activate {
                quest.activate();
            } else {
                quest.complete();
            }
            prop_assert!(!(quest.completed && quest.active));
        }
    }
}

// ---------------------------------------------------------------------------
// Property: registry mutations never leave a quest completed and active
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum RegistryOp {
    Add(usize),
    Activate(usize),
    Complete(usize),
    Remove(usize),
    Validating(usize, bool),
}

fn arb_registry_op() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        (0..4usize).prop_map(RegistryOp::Add),
        (0..4usize).prop_map(RegistryOp::Activate),
        (0..4usize).prop_map(RegistryOp::Complete),
        (0..4usize).prop_map(RegistryOp::Remove),
        (0..4usize, any::<bool>()).prop_map(|(i, v)| RegistryOp::Validating(i, v)),
    ]
}

proptest! {
    #[test]
    fn registry_never_holds_a_completed_active_quest(
        ops in prop::collection::vec(arb_registry_op(), 0..40),
    ) {
        let issuers: Vec<EntityId> = (0..4).map(|_| EntityId::new()).collect();
        let mut registry = QuestRegistry::new();

        for op in ops {
            match op {
                RegistryOp::Add(i) => {
                    registry.add(Quest::delivery(
                        issuers[i],
                        BlockPos::new(0, 1, 0),
                        [(Material::Wheat, 10)].into_iter().collect(),
                        3,
                    ));
                }
                RegistryOp::Activate(i) => {
                    let found = registry.activate(issuers[i]);
                    prop_assert_eq!(found, registry.get_by_issuer(issuers[i]).is_some());
                }
                RegistryOp::Complete(i) => {
                    registry.complete(issuers[i]);
                    prop_assert!(!registry.has_active(issuers[i]));
                }
                RegistryOp::Remove(i) => {
                    registry.remove(issuers[i]);
                    prop_assert!(registry.get_by_issuer(issuers[i]).is_none());
                }
                RegistryOp::Validating(i, value) => {
                    registry.set_validation_in_progress(issuers[i], value);
                }
            }
            for quest in registry.iter() {
                prop_assert!(!(quest.completed && quest.active));
                prop_assert_eq!(registry.has_active(quest.issuer), quest.active);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property: sharing puts every joined player on the owner's quest
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn sharing_joins_only_free_players(busy_mask in prop::collection::vec(any::<bool>(), 1..12)) {
        let mut parties = PartyTracker::new();
        let owner = EntityId::new();
        let issuer = EntityId::new();
        parties.assign(owner, issuer);

        let candidates: Vec<(EntityId, bool)> =
            busy_mask.iter().map(|busy| (EntityId::new(), *busy)).collect();
        for (player, busy) in &candidates {
            if *busy {
                parties.assign(*player, EntityId::new());
            }
        }

        for (player, busy) in &candidates {
            prop_assert_eq!(parties.share(owner, *player), !*busy);
        }

        let on_quest = parties.players_on_quest(issuer);
        let expected = 1 + candidates.iter().filter(|(_, busy)| !busy).count();
        prop_assert_eq!(on_quest.len(), expected);
        prop_assert_eq!(parties.party_of(owner), on_quest);
        prop_assert!(!parties.share(owner, owner));
    }
}
