//! Inventory snapshot: item id to quantity on hand.
//!
//! Quantities are conceptually non-negative integers but stored as `f64`
//! because resolution legally produces fractional intermediate amounts
//! (partial experience pools, overproduction credit). Rounding happens only
//! at the reporting boundary, never here.

use crate::id::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value-semantics inventory map. The engine clones and threads it through
/// resolution; callers keep their own snapshot untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    quantities: BTreeMap<ItemId, f64>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(item, quantity)` pairs, summing duplicates.
    pub fn from_entries(entries: impl IntoIterator<Item = (ItemId, f64)>) -> Self {
        let mut inv = Self::new();
        for (item, qty) in entries {
            inv.add(item, qty);
        }
        inv
    }

    /// Quantity on hand, zero when absent.
    pub fn quantity(&self, item: ItemId) -> f64 {
        self.quantities.get(&item).copied().unwrap_or(0.0)
    }

    /// Add quantity. Non-positive amounts are ignored.
    pub fn add(&mut self, item: ItemId, qty: f64) {
        if qty > 0.0 {
            *self.quantities.entry(item).or_insert(0.0) += qty;
        }
    }

    /// Debit up to `qty`, returning the amount actually taken.
    #[must_use = "returns the quantity actually taken, which may be less than requested"]
    pub fn take(&mut self, item: ItemId, qty: f64) -> f64 {
        if qty <= 0.0 {
            return 0.0;
        }
        let Some(have) = self.quantities.get_mut(&item) else {
            return 0.0;
        };
        let taken = qty.min(*have);
        *have -= taken;
        if *have <= 0.0 {
            self.quantities.remove(&item);
        }
        taken
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, f64)> + '_ {
        self.quantities.iter().map(|(&item, &qty)| (item, qty))
    }
}
