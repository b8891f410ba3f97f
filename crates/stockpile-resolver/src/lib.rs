//! Requirement Resolver for the stockpile planning engine.
//!
//! Given a batch of tasks (or raw item requirements), an inventory snapshot,
//! and a set of forbidden formula tags, classifies each requirement against
//! inventory, expanding shortfalls through crafting formulas recursively and
//! redeeming fungible value pools, and reports consumption and valuation
//! metrics.
//!
//! The core primitive is [`consume`]: a work queue over `(item, quantity)`
//! entries rather than plain recursion, so expansion depth never grows the
//! call stack. Quantities are real numbers throughout; fractional
//! consumption is legal and rounding happens only at the reporting boundary
//! ([`ConsumptionOutcome::unmet_totals`]), never mid-computation, where it
//! would compound across chained formula expansions.
//!
//! Unmet requirements are normal, reportable outcomes, not errors. The only
//! hard failures are a formula cycle in the catalogue (guarded by an
//! expansion-depth limit) -- catalogues are expected to be acyclic by
//! construction.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use stockpile_core::catalogue::{Catalogue, CostEntry, ValuePool};
use stockpile_core::id::{ItemId, TaskId};
use stockpile_core::inventory::Inventory;
use stockpile_core::task::Task;

const EPS: f64 = 1e-9;

/// Formula chains deeper than this are treated as cyclic. Real catalogues
/// nest three or four formulas at most.
const MAX_EXPANSION_DEPTH: u32 = 64;

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// How a single requirement was covered. Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CostStatus {
    /// Fully covered from inventory, no crafting needed.
    Completable,
    /// Covered, but only by expanding at least one formula.
    Synthesizable,
    /// Some part of the requirement had no route at all.
    AllUnmet,
}

/// Consumption record for one root requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootOutcome {
    pub item: ItemId,
    pub required: f64,
    pub status: CostStatus,
    /// Root item quantity debited directly from inventory.
    pub consumed: f64,
    /// Report-only valuation of everything this root demanded.
    pub value_total: f64,
    /// Valuation of the share actually covered by inventory.
    pub value_fulfilled: f64,
    /// Leaf shortfalls attributed to this root, by item.
    pub unmet: BTreeMap<ItemId, f64>,
}

/// Outcome of one [`consume`] call: one record per root requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionOutcome {
    pub roots: Vec<RootOutcome>,
}

impl ConsumptionOutcome {
    /// Worst status across all roots; `Completable` for an empty cost list.
    pub fn status(&self) -> CostStatus {
        self.roots
            .iter()
            .map(|r| r.status)
            .max()
            .unwrap_or(CostStatus::Completable)
    }

    /// Aggregate unmet quantities across roots, ceiled for display.
    pub fn unmet_totals(&self) -> BTreeMap<ItemId, u64> {
        let mut totals: BTreeMap<ItemId, f64> = BTreeMap::new();
        for root in &self.roots {
            for (&item, &qty) in &root.unmet {
                *totals.entry(item).or_insert(0.0) += qty;
            }
        }
        totals
            .into_iter()
            .filter(|(_, qty)| *qty > EPS)
            .map(|(item, qty)| (item, qty.ceil() as u64))
            .collect()
    }

    pub fn value_total(&self) -> f64 {
        self.roots.iter().map(|r| r.value_total).sum()
    }

    pub fn value_fulfilled(&self) -> f64 {
        self.roots.iter().map(|r| r.value_fulfilled).sum()
    }
}

/// Display status of one task, derived from its costs outcome and its
/// prerequisite tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// A step with no material cost (e.g. first acquisition).
    Manual,
    Completable,
    Synthesizable,
    AllUnmet,
    /// A prerequisite task resolved to `AllUnmet` or `DependencyUnmet`;
    /// this task is not actionable regardless of its own costs.
    DependencyUnmet,
}

/// Resolution of one task in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResolution {
    pub id: TaskId,
    pub status: TaskStatus,
    pub outcome: ConsumptionOutcome,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Formula expansion exceeded the depth guard; the catalogue contains a
    /// formula cycle (item A requires B requires A).
    #[error("formula cycle detected while expanding {item:?}")]
    CyclicFormula { item: ItemId },
}

// ---------------------------------------------------------------------------
// consume -- the core primitive
// ---------------------------------------------------------------------------

struct QueueEntry {
    item: ItemId,
    qty: f64,
    /// Index of the root requirement this entry descends from.
    source: usize,
    depth: u32,
}

/// Consume `costs` from `inventory`, expanding shortfalls through applicable
/// formulas and redeeming value pools. Debits the inventory in place;
/// callers wanting a pristine snapshot pass a clone.
pub fn consume(
    costs: &[CostEntry],
    inventory: &mut Inventory,
    forbidden_tags: &BTreeSet<String>,
    catalogue: &Catalogue,
) -> Result<ConsumptionOutcome, ResolveError> {
    let mut roots: Vec<RootOutcome> = costs
        .iter()
        .map(|c| RootOutcome {
            item: c.item,
            required: c.quantity,
            status: CostStatus::Completable,
            consumed: 0.0,
            value_total: 0.0,
            value_fulfilled: 0.0,
            unmet: BTreeMap::new(),
        })
        .collect();

    let mut queue: VecDeque<QueueEntry> = costs
        .iter()
        .enumerate()
        .map(|(i, c)| QueueEntry {
            item: c.item,
            qty: c.quantity,
            source: i,
            depth: 0,
        })
        .collect();

    while let Some(entry) = queue.pop_front() {
        if entry.qty <= EPS {
            continue;
        }
        let value = catalogue.item_value(entry.item);
        let taken = inventory.take(entry.item, entry.qty);
        let out = &mut roots[entry.source];
        if taken > 0.0 {
            out.value_total += value * taken;
            out.value_fulfilled += value * taken;
            if entry.depth == 0 {
                out.consumed += taken;
            }
        }
        let shortfall = entry.qty - taken;
        if shortfall <= EPS {
            continue;
        }

        if let Some((_, formula)) = catalogue.applicable_formula(entry.item, forbidden_tags) {
            if entry.depth >= MAX_EXPANSION_DEPTH {
                return Err(ResolveError::CyclicFormula { item: entry.item });
            }
            out.status = out.status.max(CostStatus::Synthesizable);
            let times = (shortfall / formula.quantity).ceil();
            let overproduced = formula.quantity * times - shortfall;
            if overproduced > EPS {
                inventory.add(entry.item, overproduced);
            }
            for cost in &formula.costs {
                queue.push_back(QueueEntry {
                    item: cost.item,
                    qty: cost.quantity * times,
                    source: entry.source,
                    depth: entry.depth + 1,
                });
            }
        } else if let Some(pool) = catalogue.value_pool(entry.item) {
            let remaining = redeem_pool(pool, shortfall, inventory, catalogue, out);
            if remaining > EPS {
                out.status = CostStatus::AllUnmet;
                out.value_total += value * remaining;
                *out.unmet.entry(entry.item).or_insert(0.0) += remaining;
            }
        } else {
            // No route for this item: a normal, reportable outcome.
            out.status = CostStatus::AllUnmet;
            out.value_total += value * shortfall;
            *out.unmet.entry(entry.item).or_insert(0.0) += shortfall;
        }
    }

    Ok(ConsumptionOutcome { roots })
}

/// Redeem a value-pool shortfall from denomination items, largest first to
/// minimize waste. A remainder smaller than the smallest available
/// denomination redeems one extra unit, crediting the overage back to the
/// pool. Returns the amount still uncovered.
fn redeem_pool(
    pool: &ValuePool,
    shortfall: f64,
    inventory: &mut Inventory,
    catalogue: &Catalogue,
    out: &mut RootOutcome,
) -> f64 {
    let mut remaining = shortfall;
    for &(denom, unit) in &pool.denominations {
        if remaining <= EPS {
            break;
        }
        // Denominations are discrete items; redeem whole units only.
        let available = inventory.quantity(denom).floor();
        let wanted = (remaining / unit).floor();
        let units = wanted.min(available);
        if units >= 1.0 {
            let _ = inventory.take(denom, units);
            remaining -= units * unit;
            let value = catalogue.item_value(denom) * units;
            out.value_total += value;
            out.value_fulfilled += value;
        }
    }
    if remaining > EPS {
        // Denominations are sorted descending, so the reverse scan finds the
        // smallest one still in stock.
        let smallest = pool
            .denominations
            .iter()
            .rev()
            .find(|(denom, _)| inventory.quantity(*denom) >= 1.0)
            .copied();
        if let Some((denom, unit)) = smallest {
            let _ = inventory.take(denom, 1.0);
            let overage = unit - remaining;
            if overage > EPS {
                inventory.add(pool.pool, overage);
            }
            let value = catalogue.item_value(denom);
            out.value_total += value;
            out.value_fulfilled += value;
            remaining = 0.0;
        }
    }
    remaining
}

// ---------------------------------------------------------------------------
// Batch entry points
// ---------------------------------------------------------------------------

/// Resolve a task batch in declaration order, carrying inventory state
/// forward across tasks.
///
/// The batch must be ordered consistently with its dependency DAG (the task
/// builder's emission order already is), so prerequisite statuses are always
/// available when a task is classified. Dependencies outside the batch are
/// treated as satisfied.
pub fn resolve_tasks(
    tasks: &[Task],
    inventory: &Inventory,
    forbidden_tags: &BTreeSet<String>,
    catalogue: &Catalogue,
) -> Result<Vec<TaskResolution>, ResolveError> {
    let mut inv = inventory.clone();
    let mut statuses: HashMap<TaskId, TaskStatus> = HashMap::new();
    let mut results = Vec::with_capacity(tasks.len());

    for task in tasks {
        // Inventory is consumed in task order even for blocked tasks, so the
        // per-task numbers reflect doing everything in sequence.
        let outcome = consume(&task.costs, &mut inv, forbidden_tags, catalogue)?;
        let base = if task.costs.is_empty() {
            TaskStatus::Manual
        } else {
            match outcome.status() {
                CostStatus::Completable => TaskStatus::Completable,
                CostStatus::Synthesizable => TaskStatus::Synthesizable,
                CostStatus::AllUnmet => TaskStatus::AllUnmet,
            }
        };
        let blocked = task.deps.iter().any(|dep| {
            matches!(
                statuses.get(dep),
                Some(TaskStatus::AllUnmet | TaskStatus::DependencyUnmet)
            )
        });
        let status = if blocked {
            TaskStatus::DependencyUnmet
        } else {
            base
        };
        statuses.insert(task.id.clone(), status);
        results.push(TaskResolution {
            id: task.id.clone(),
            status,
            outcome,
        });
    }

    Ok(results)
}

/// Resolve a raw requirement map against an inventory snapshot.
pub fn resolve_requirements(
    requirements: &BTreeMap<ItemId, f64>,
    inventory: &Inventory,
    forbidden_tags: &BTreeSet<String>,
    catalogue: &Catalogue,
) -> Result<ConsumptionOutcome, ResolveError> {
    let costs: Vec<CostEntry> = requirements
        .iter()
        .filter(|(_, qty)| **qty > 0.0)
        .map(|(&item, &quantity)| CostEntry { item, quantity })
        .collect();
    let mut inv = inventory.clone();
    consume(&costs, &mut inv, forbidden_tags, catalogue)
}

// ===========================================================================
// Tests
// ===========================================================================
