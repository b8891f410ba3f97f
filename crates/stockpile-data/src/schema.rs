//! Serde data file structs for catalogue content.
//!
//! These structs define the on-disk format for items, formulas, activities,
//! value pools, and subject progression tables. They reference items by
//! string key; the loader resolves keys into engine ids.

use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// An item definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
}

// ===========================================================================
// Costs
// ===========================================================================

/// A cost entry, supporting both short tuple form and full form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CostData {
    /// Short form: `("item_key", quantity)`.
    Short(String, f64),
    /// Full form with explicit fields.
    Full { item: String, quantity: f64 },
}

impl CostData {
    pub fn item(&self) -> &str {
        match self {
            CostData::Short(item, _) => item,
            CostData::Full { item, .. } => item,
        }
    }

    pub fn quantity(&self) -> f64 {
        match self {
            CostData::Short(_, qty) => *qty,
            CostData::Full { quantity, .. } => *quantity,
        }
    }
}

// ===========================================================================
// Formulas
// ===========================================================================

/// A crafting formula definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct FormulaData {
    pub key: String,
    pub output: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    pub costs: Vec<CostData>,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_quantity() -> f64 {
    1.0
}

// ===========================================================================
// Activities
// ===========================================================================

/// One drop table row in a data file. `samples` absent means a fixed
/// deterministic yield.
#[derive(Debug, Clone, Deserialize)]
pub struct DropData {
    pub item: String,
    pub observed: f64,
    #[serde(default)]
    pub samples: Option<f64>,
}

/// A farmable activity definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityData {
    pub key: String,
    pub name: String,
    pub ap_cost: f64,
    #[serde(default)]
    pub drops: Vec<DropData>,
}

// ===========================================================================
// Value pools
// ===========================================================================

/// A fungible value pool definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolData {
    pub pool: String,
    pub denominations: Vec<(String, f64)>,
}

// ===========================================================================
// Subjects
// ===========================================================================

/// Per-track progression tables in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackData {
    pub key: String,
    pub min_tier: Vec<u32>,
    pub step_costs: Vec<Vec<CostData>>,
}

/// A subject's progression limits and cost tables in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectData {
    pub key: String,
    pub name: String,
    pub max_tier: u32,
    pub level_caps: Vec<u32>,
    pub tier_costs: Vec<Vec<CostData>>,
    pub level_costs: Vec<Vec<Vec<CostData>>>,
    #[serde(default)]
    pub tracks: Vec<TrackData>,
}

// ===========================================================================
// Top-level catalogue file
// ===========================================================================

/// The whole catalogue file. Every section is optional so small test
/// catalogues stay small.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogueData {
    #[serde(default)]
    pub items: Vec<ItemData>,
    #[serde(default)]
    pub formulas: Vec<FormulaData>,
    #[serde(default)]
    pub activities: Vec<ActivityData>,
    #[serde(default)]
    pub pools: Vec<PoolData>,
    #[serde(default)]
    pub subjects: Vec<SubjectData>,
}

// ===========================================================================
// Tests
// ===========================================================================
