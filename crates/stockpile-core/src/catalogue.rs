//! The catalogue: immutable game-data registry consumed by the planning engine.
//!
//! Items, crafting formulas, farmable activities, fungible value pools, and
//! per-subject progression tables are registered through [`CatalogueBuilder`]
//! and frozen into a [`Catalogue`] by `build()`. The build step validates every
//! cross-reference and precomputes the formula-by-output index so lookups
//! during resolution stay cheap. A built catalogue is read-only and safe to
//! share across threads for the lifetime of a session.

use crate::id::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// An item definition. `value` is a cost-equivalent unit (e.g. "AP-equivalent")
/// used only for reporting, never for correctness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub key: String,
    pub name: String,
    pub value: Option<f64>,
}

/// One `(item, quantity)` entry in a cost list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub item: ItemId,
    pub quantity: f64,
}

impl CostEntry {
    pub fn new(item: ItemId, quantity: f64) -> Self {
        Self { item, quantity }
    }
}

/// A crafting formula: produces `quantity` units of `output` from `costs`.
///
/// Tags are opaque strings used for exclusion filtering; a formula is
/// applicable only if none of its tags are in the caller's forbidden set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaDef {
    pub key: String,
    pub output: ItemId,
    pub quantity: f64,
    pub costs: Vec<CostEntry>,
    pub tags: Vec<String>,
}

/// One row of an activity's drop table.
///
/// `samples == None` denotes a fixed, deterministic per-run yield rather than
/// a statistically observed rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DropRow {
    pub item: ItemId,
    pub observed: f64,
    pub samples: Option<f64>,
}

impl DropRow {
    /// Expected yield of this item per single run.
    pub fn yield_per_run(&self) -> f64 {
        match self.samples {
            Some(n) => self.observed / n,
            None => self.observed,
        }
    }
}

/// A repeatable farmable activity with an AP price and a drop table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDef {
    pub key: String,
    pub name: String,
    pub ap_cost: f64,
    pub drops: Vec<DropRow>,
}

/// A fungible value pool: an abstract resource (e.g. "experience") redeemable
/// from several discrete item denominations. Denominations are stored sorted
/// by per-unit value, largest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePool {
    pub pool: ItemId,
    pub denominations: Vec<(ItemId, f64)>,
}

/// Per-track progression tables for one subject: the minimum tier each step
/// requires and the material cost of each step. Step `i` raises the track
/// from level `i` to `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackProfile {
    pub min_tier: Vec<u32>,
    pub step_costs: Vec<Vec<CostEntry>>,
}

impl TrackProfile {
    /// Highest level this track can reach.
    pub fn cap(&self) -> u32 {
        self.step_costs.len() as u32
    }
}

/// Progression limits and cost tables for one subject.
///
/// Levels are 1-based within a tier. `level_costs[t][l - 1]` is the cost of
/// going from level `l` to `l + 1` while at tier `t`, so each inner table has
/// `level_caps[t] - 1` rows. `tier_costs[t]` is the cost of the unlock step
/// from tier `t` into tier `t + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub key: String,
    pub name: String,
    pub max_tier: u32,
    pub level_caps: Vec<u32>,
    pub tier_costs: Vec<Vec<CostEntry>>,
    pub level_costs: Vec<Vec<Vec<CostEntry>>>,
    pub tracks: Vec<(String, TrackProfile)>,
}

impl SubjectProfile {
    pub fn track(&self, key: &str) -> Option<&TrackProfile> {
        self.tracks
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, t)| t)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Catalogue construction errors. All of these are configuration errors:
/// the catalogue data itself is inconsistent and the build is aborted.
#[derive(Debug, thiserror::Error)]
pub enum CatalogueError {
    #[error("duplicate {kind} key: {key}")]
    DuplicateKey { kind: &'static str, key: String },

    #[error("invalid item reference {item:?} in {context}")]
    InvalidItemRef { item: ItemId, context: &'static str },

    #[error("formula '{key}' must produce a positive quantity")]
    NonPositiveOutput { key: String },

    #[error("drop table of '{key}' has a non-positive sample size")]
    InvalidSampleSize { key: String },

    #[error("value pool for {pool:?} has no usable denominations")]
    EmptyPool { pool: ItemId },

    #[error("subject '{subject}' has inconsistent tables: {detail}")]
    InconsistentSubject { subject: String, detail: String },
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable [`Catalogue`].
/// Registration happens up front; `build()` validates and freezes.
#[derive(Debug, Default)]
pub struct CatalogueBuilder {
    items: Vec<ItemDef>,
    formulas: Vec<FormulaDef>,
    activities: Vec<ActivityDef>,
    pools: Vec<ValuePool>,
    subjects: Vec<SubjectProfile>,
}

impl CatalogueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item. Returns its ID.
    pub fn register_item(&mut self, key: &str, name: &str, value: Option<f64>) -> ItemId {
        let id = ItemId(self.items.len() as u32);
        self.items.push(ItemDef {
            key: key.to_string(),
            name: name.to_string(),
            value,
        });
        id
    }

    /// Register a crafting formula. Returns its ID.
    ///
    /// When several registered formulas produce the same output item, the
    /// resolver uses the first applicable one in registration order.
    /// Catalogues should avoid that ambiguity per exclusion set.
    pub fn register_formula(
        &mut self,
        key: &str,
        output: ItemId,
        quantity: f64,
        costs: Vec<CostEntry>,
        tags: Vec<String>,
    ) -> FormulaId {
        let id = FormulaId(self.formulas.len() as u32);
        self.formulas.push(FormulaDef {
            key: key.to_string(),
            output,
            quantity,
            costs,
            tags,
        });
        id
    }

    /// Register a farmable activity. Returns its ID.
    pub fn register_activity(
        &mut self,
        key: &str,
        name: &str,
        ap_cost: f64,
        drops: Vec<DropRow>,
    ) -> ActivityId {
        let id = ActivityId(self.activities.len() as u32);
        self.activities.push(ActivityDef {
            key: key.to_string(),
            name: name.to_string(),
            ap_cost,
            drops,
        });
        id
    }

    /// Register a fungible value pool redeemable from item denominations.
    pub fn register_value_pool(&mut self, pool: ItemId, denominations: Vec<(ItemId, f64)>) {
        self.pools.push(ValuePool {
            pool,
            denominations,
        });
    }

    /// Register a subject's progression limits and cost tables. Returns its ID.
    pub fn register_subject(&mut self, profile: SubjectProfile) -> SubjectId {
        let id = SubjectId(self.subjects.len() as u32);
        self.subjects.push(profile);
        id
    }

    /// Validate all cross-references and freeze into an immutable catalogue.
    pub fn build(self) -> Result<Catalogue, CatalogueError> {
        let item_count = self.items.len() as u32;
        let check = |item: ItemId, context: &'static str| {
            if item.0 < item_count {
                Ok(())
            } else {
                Err(CatalogueError::InvalidItemRef { item, context })
            }
        };

        let mut item_key_to_id = HashMap::new();
        for (i, item) in self.items.iter().enumerate() {
            if item_key_to_id
                .insert(item.key.clone(), ItemId(i as u32))
                .is_some()
            {
                return Err(CatalogueError::DuplicateKey {
                    kind: "item",
                    key: item.key.clone(),
                });
            }
        }

        let mut formula_key_to_id = HashMap::new();
        let mut formulas_by_output: HashMap<ItemId, Vec<FormulaId>> = HashMap::new();
        for (i, f) in self.formulas.iter().enumerate() {
            let id = FormulaId(i as u32);
            if formula_key_to_id.insert(f.key.clone(), id).is_some() {
                return Err(CatalogueError::DuplicateKey {
                    kind: "formula",
                    key: f.key.clone(),
                });
            }
            if f.quantity <= 0.0 {
                return Err(CatalogueError::NonPositiveOutput { key: f.key.clone() });
            }
            check(f.output, "formula output")?;
            for c in &f.costs {
                check(c.item, "formula cost")?;
            }
            formulas_by_output.entry(f.output).or_default().push(id);
        }

        let mut activity_key_to_id = HashMap::new();
        for (i, a) in self.activities.iter().enumerate() {
            if activity_key_to_id
                .insert(a.key.clone(), ActivityId(i as u32))
                .is_some()
            {
                return Err(CatalogueError::DuplicateKey {
                    kind: "activity",
                    key: a.key.clone(),
                });
            }
            for d in &a.drops {
                check(d.item, "drop table")?;
                if matches!(d.samples, Some(n) if n <= 0.0) {
                    return Err(CatalogueError::InvalidSampleSize { key: a.key.clone() });
                }
            }
        }

        let mut pools: HashMap<ItemId, ValuePool> = HashMap::new();
        for mut pool in self.pools {
            check(pool.pool, "value pool")?;
            pool.denominations.retain(|(_, v)| *v > 0.0);
            if pool.denominations.is_empty() {
                return Err(CatalogueError::EmptyPool { pool: pool.pool });
            }
            for &(item, _) in &pool.denominations {
                check(item, "pool denomination")?;
            }
            // Largest denomination first; redemption is greedy in this order.
            pool.denominations
                .sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            pools.insert(pool.pool, pool);
        }

        let mut subject_key_to_id = HashMap::new();
        for (i, s) in self.subjects.iter().enumerate() {
            if subject_key_to_id
                .insert(s.key.clone(), SubjectId(i as u32))
                .is_some()
            {
                return Err(CatalogueError::DuplicateKey {
                    kind: "subject",
                    key: s.key.clone(),
                });
            }
            validate_subject(s, &check)?;
        }

        Ok(Catalogue {
            items: self.items,
            item_key_to_id,
            formulas: self.formulas,
            formula_key_to_id,
            formulas_by_output,
            activities: self.activities,
            activity_key_to_id,
            pools,
            subjects: self.subjects,
            subject_key_to_id,
        })
    }
}

fn validate_subject(
    s: &SubjectProfile,
    check: &impl Fn(ItemId, &'static str) -> Result<(), CatalogueError>,
) -> Result<(), CatalogueError> {
    let tiers = s.max_tier as usize + 1;
    let fail = |detail: String| CatalogueError::InconsistentSubject {
        subject: s.key.clone(),
        detail,
    };

    if s.level_caps.len() != tiers {
        return Err(fail(format!(
            "expected {tiers} level caps, found {}",
            s.level_caps.len()
        )));
    }
    if s.tier_costs.len() != s.max_tier as usize {
        return Err(fail(format!(
            "expected {} tier cost rows, found {}",
            s.max_tier,
            s.tier_costs.len()
        )));
    }
    if s.level_costs.len() != tiers {
        return Err(fail(format!(
            "expected {tiers} level cost tables, found {}",
            s.level_costs.len()
        )));
    }
    for (t, (cap, table)) in s.level_caps.iter().zip(&s.level_costs).enumerate() {
        if *cap < 1 {
            return Err(fail(format!("tier {t} has a level cap below 1")));
        }
        if table.len() != (*cap - 1) as usize {
            return Err(fail(format!(
                "tier {t} needs {} level cost rows, found {}",
                cap - 1,
                table.len()
            )));
        }
        for row in table {
            for c in row {
                check(c.item, "level cost")?;
            }
        }
    }
    for row in &s.tier_costs {
        for c in row {
            check(c.item, "tier cost")?;
        }
    }
    for (key, track) in &s.tracks {
        if track.min_tier.len() != track.step_costs.len() {
            return Err(fail(format!(
                "track '{key}' has {} tier requirements for {} steps",
                track.min_tier.len(),
                track.step_costs.len()
            )));
        }
        if track.min_tier.iter().any(|t| *t > s.max_tier) {
            return Err(fail(format!(
                "track '{key}' requires a tier above the subject cap"
            )));
        }
        for row in &track.step_costs {
            for c in row {
                check(c.item, "track cost")?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

/// Immutable catalogue. Frozen after `build()`. Thread-safe to share.
#[derive(Debug)]
pub struct Catalogue {
    items: Vec<ItemDef>,
    item_key_to_id: HashMap<String, ItemId>,
    formulas: Vec<FormulaDef>,
    formula_key_to_id: HashMap<String, FormulaId>,
    formulas_by_output: HashMap<ItemId, Vec<FormulaId>>,
    activities: Vec<ActivityDef>,
    activity_key_to_id: HashMap<String, ActivityId>,
    pools: HashMap<ItemId, ValuePool>,
    subjects: Vec<SubjectProfile>,
    subject_key_to_id: HashMap<String, SubjectId>,
}

impl Catalogue {
    pub fn item(&self, id: ItemId) -> Option<&ItemDef> {
        self.items.get(id.0 as usize)
    }

    pub fn item_id(&self, key: &str) -> Option<ItemId> {
        self.item_key_to_id.get(key).copied()
    }

    /// Report-only valuation of an item; zero when the item carries no value.
    pub fn item_value(&self, id: ItemId) -> f64 {
        self.item(id).and_then(|i| i.value).unwrap_or(0.0)
    }

    pub fn formula(&self, id: FormulaId) -> Option<&FormulaDef> {
        self.formulas.get(id.0 as usize)
    }

    pub fn formula_id(&self, key: &str) -> Option<FormulaId> {
        self.formula_key_to_id.get(key).copied()
    }

    /// All formulas producing `item`, in registration order.
    pub fn formulas_for(&self, item: ItemId) -> &[FormulaId] {
        self.formulas_by_output
            .get(&item)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First formula producing `item` whose tags are disjoint from
    /// `forbidden_tags`, if any.
    pub fn applicable_formula(
        &self,
        item: ItemId,
        forbidden_tags: &BTreeSet<String>,
    ) -> Option<(FormulaId, &FormulaDef)> {
        self.formulas_for(item).iter().find_map(|&id| {
            let f = &self.formulas[id.0 as usize];
            let allowed = !f.tags.iter().any(|t| forbidden_tags.contains(t));
            allowed.then_some((id, f))
        })
    }

    pub fn activity(&self, id: ActivityId) -> Option<&ActivityDef> {
        self.activities.get(id.0 as usize)
    }

    pub fn activity_id(&self, key: &str) -> Option<ActivityId> {
        self.activity_key_to_id.get(key).copied()
    }

    pub fn activities(&self) -> impl Iterator<Item = (ActivityId, &ActivityDef)> {
        self.activities
            .iter()
            .enumerate()
            .map(|(i, a)| (ActivityId(i as u32), a))
    }

    pub fn formulas(&self) -> impl Iterator<Item = (FormulaId, &FormulaDef)> {
        self.formulas
            .iter()
            .enumerate()
            .map(|(i, f)| (FormulaId(i as u32), f))
    }

    pub fn value_pool(&self, pool: ItemId) -> Option<&ValuePool> {
        self.pools.get(&pool)
    }

    pub fn subject(&self, id: SubjectId) -> Option<&SubjectProfile> {
        self.subjects.get(id.0 as usize)
    }

    pub fn subject_id(&self, key: &str) -> Option<SubjectId> {
        self.subject_key_to_id.get(key).copied()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }

    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }
}
