//! Criterion benchmarks for the farm planner.
//!
//! Two benchmark groups:
//! - `small_catalogue`: 30 items, 12 activities, 8 formulas -- the size of a
//!   single-subject plan
//! - `large_catalogue`: 200 items, 80 activities, 60 formulas -- a full
//!   roster-worth of requirements in one program

use criterion::{criterion_group, criterion_main, Criterion};
use std::collections::{BTreeMap, BTreeSet};
use stockpile_core::catalogue::{Catalogue, CatalogueBuilder, CostEntry, DropRow};
use stockpile_core::id::ItemId;
use stockpile_core::inventory::Inventory;
use stockpile_farm::{plan, PlanBudget};

// ===========================================================================
// Catalogue builders
// ===========================================================================

/// Build a synthetic catalogue. Each activity drops three consecutive items
/// at staggered rates; each formula upgrades three of one item into one of
/// the next, so the planner always has a farm-vs-craft tradeoff.
fn build_catalogue(items: usize, activities: usize, formulas: usize) -> Catalogue {
    let mut b = CatalogueBuilder::new();
    let ids: Vec<ItemId> = (0..items)
        .map(|i| b.register_item(&format!("item_{i}"), &format!("Item {i}"), Some(i as f64)))
        .collect();

    for a in 0..activities {
        let base = (a * 3) % items;
        let drops = (0..3)
            .map(|off| DropRow {
                item: ids[(base + off) % items],
                observed: 50.0 + (off as f64) * 17.0,
                samples: Some(100.0),
            })
            .collect();
        b.register_activity(
            &format!("stage_{a}"),
            &format!("Stage {a}"),
            6.0 + (a % 5) as f64 * 3.0,
            drops,
        );
    }

    for f in 0..formulas {
        let input = ids[f % items];
        let output = ids[(f + 1) % items];
        b.register_formula(
            &format!("craft_{f}"),
            output,
            1.0,
            vec![CostEntry::new(input, 3.0)],
            vec![],
        );
    }

    b.build().unwrap()
}

fn requirements(catalogue: &Catalogue, count: usize) -> BTreeMap<ItemId, f64> {
    (0..count)
        .map(|i| (ItemId((i * 2) as u32 % catalogue.item_count() as u32), 40.0 + i as f64))
        .collect()
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_small_catalogue(c: &mut Criterion) {
    let mut group = c.benchmark_group("small_catalogue");
    group.sample_size(50);

    let catalogue = build_catalogue(30, 12, 8);
    let reqs = requirements(&catalogue, 10);
    let inventory = Inventory::new();

    group.bench_function("30_items_12_activities", |b| {
        b.iter(|| {
            plan(
                &catalogue,
                &BTreeSet::new(),
                &BTreeSet::new(),
                &reqs,
                &inventory,
                &PlanBudget::default(),
            )
            .unwrap();
        });
    });

    group.finish();
}

fn bench_large_catalogue(c: &mut Criterion) {
    let mut group = c.benchmark_group("large_catalogue");
    group.sample_size(20);

    let catalogue = build_catalogue(200, 80, 60);
    let reqs = requirements(&catalogue, 50);
    let inventory = Inventory::from_entries((0..40).map(|i| (ItemId(i), 15.0)));

    group.bench_function("200_items_80_activities", |b| {
        b.iter(|| {
            plan(
                &catalogue,
                &BTreeSet::new(),
                &BTreeSet::new(),
                &reqs,
                &inventory,
                &PlanBudget::default(),
            )
            .unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_small_catalogue, bench_large_catalogue);
criterion_main!(benches);
