//! QUESTZ Benchmark Suite
//!
//! Hot paths a server hits while players are building:
//!   enclosure_flood_fill_13x8x13 ..... interior flood of a large house
//!   validate_sealed_house ............ full validation pass
//!   claim_overlap_200_areas .......... overlap test against a busy village
//!   generate_building_quest .......... site search + material roll

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use chrono::Utc;
use questz_core::allocator::BuildingAreas;
use questz_core::generator::QuestGenerator;
use questz_core::validator::StructureValidator;
use questz_core::world::SparseWorld;
use questz_core::{Agent, BlockPos, Bounds, EntityId, Material, Quest, QuestType, Role};

/// A 15×10×15 stone-brick house on flat ground with a bed inside.
fn large_house() -> (SparseWorld, Quest) {
    let mut world = SparseWorld::flat(0);
    let shell = Bounds::from_corners(BlockPos::new(0, 1, 0), BlockPos::new(14, 10, 14));
    world.hollow_box(shell, &Material::StoneBricks);
    world.set(BlockPos::new(7, 2, 7), Material::RedBed);

    let mut mats = std::collections::BTreeMap::new();
    mats.insert(Material::StoneBricks, 50);
    mats.insert(Material::RedBed, 1);
    let quest = Quest::building(EntityId::new(), QuestType::PersonalResidence, shell, mats, 30);
    (world, quest)
}

fn bench_flood_fill(c: &mut Criterion) {
    let (world, quest) = large_house();
    let validator = StructureValidator::default();
    let site = quest.site();
    c.bench_function("enclosure_flood_fill_13x8x13", |b| {
        b.iter(|| {
            let e = validator.flood_fill(&world, black_box(BlockPos::new(7, 2, 7)), site);
            black_box(e);
        });
    });
}

fn bench_validate(c: &mut Criterion) {
    let (world, quest) = large_house();
    let validator = StructureValidator::default();
    c.bench_function("validate_sealed_house", |b| {
        b.iter(|| black_box(validator.validate(black_box(&quest), &world)));
    });
}

fn bench_overlap(c: &mut Criterion) {
    let mut areas = BuildingAreas::new(3);
    let now = Utc::now();
    for i in 0..200 {
        let x = (i % 20) * 25;
        let z = (i / 20) * 25;
        areas.try_claim(
            BlockPos::new(x, 1, z),
            BlockPos::new(x + 14, 10, z + 14),
            EntityId::new(),
            now,
        );
    }
    let probe = Bounds::from_corners(BlockPos::new(1000, 1, 1000), BlockPos::new(1010, 8, 1010));
    c.bench_function("claim_overlap_200_areas", |b| {
        b.iter(|| black_box(areas.would_overlap(black_box(probe))));
    });
}

fn bench_generation(c: &mut Criterion) {
    let generator = QuestGenerator::default();
    let world = SparseWorld::flat(0);
    let agent = Agent::new(EntityId::new(), BlockPos::new(0, 1, 0), Role::Mason);
    let mut rng = StdRng::seed_from_u64(42);
    let now = Utc::now();
    c.bench_function("generate_building_quest", |b| {
        b.iter(|| {
            let mut areas = BuildingAreas::default();
            let q = generator.generate_building(&agent, &world, &mut areas, &mut rng, now);
            black_box(q);
        });
    });
}

criterion_group!(
    benches,
    bench_flood_fill,
    bench_validate,
    bench_overlap,
    bench_generation,
);
criterion_main!(benches);
