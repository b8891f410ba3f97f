//! Farm Planner -- AP-optimal activity scheduling for the stockpile engine.
//!
//! Given a catalogue, exclusion sets, a requirement map, and an inventory
//! snapshot, [`plan`] builds a linear program whose variables are activity
//! run counts and formula application counts, minimizes total AP spent, and
//! decodes the solution into whole-number run recommendations.
//!
//! Items nothing in the allowed catalogue can produce are split off before
//! the solve: each gets a zero-cost slack variable so the program stays
//! solvable, and whatever the slack absorbs is reported as a shortfall
//! instead of failing the whole plan. Because the slack is free, demand for
//! a producible item may legitimately route through a formula whose inputs
//! have no source; the uncovered inputs then surface as the shortfall.
//!
//! Run counts are continuous inside the program and ceiled only when the
//! solution is decoded; reported AP totals are computed from the ceiled
//! counts, so they are what the player will actually spend.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use stockpile_core::catalogue::Catalogue;
use stockpile_core::id::{ActivityId, FormulaId, ItemId};
use stockpile_core::inventory::Inventory;

pub mod simplex;

use simplex::{Constraint, LinearProgram, Relation, SolveOutcome};

const EPS: f64 = 1e-9;

/// Threshold for treating a solved variable as nonzero during decoding.
/// Coarser than the pivot epsilon so simplex rounding noise never decodes
/// into a phantom run or shortfall.
const DECODE_EPS: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Solve budget. The deadline is wall-clock; an overrunning solve is
/// reported as [`PlanReason::TimedOut`], never a hang.
#[derive(Debug, Clone)]
pub struct PlanBudget {
    pub time_limit: Duration,
}

impl Default for PlanBudget {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(2),
        }
    }
}

/// Recommended run count for one activity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityRuns {
    pub activity: ActivityId,
    pub runs: u64,
    pub ap_cost: f64,
}

/// Recommended application count for one crafting formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormulaApplications {
    pub formula: FormulaId,
    pub times: u64,
}

/// Why the plan came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanReason {
    Optimal,
    Infeasible,
    TimedOut,
}

/// The decoded plan. `feasible` is true only for an optimal solve with no
/// shortfalls; a plan with shortfalls still carries the best schedule for
/// the coverable part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub feasible: bool,
    pub reason: PlanReason,
    pub runs: Vec<ActivityRuns>,
    pub crafts: Vec<FormulaApplications>,
    /// Items the allowed catalogue cannot produce, with the uncovered
    /// quantity, ceiled.
    pub shortfalls: Vec<(ItemId, u64)>,
    /// Total AP of the ceiled run counts.
    pub total_ap: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("requirement references unknown item {0:?}")]
    UnknownItem(ItemId),

    /// The program had no finite optimum. Only a malformed catalogue (e.g.
    /// a negative AP cost) can cause this.
    #[error("planning program is unbounded; catalogue data is malformed")]
    Unbounded,
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum VarKind {
    Activity(ActivityId),
    Formula(FormulaId),
    Have,
    Slack(ItemId),
}

/// Plan the AP-cheapest combination of activity runs and formula
/// applications that covers `requirements`, net of `inventory`.
pub fn plan(
    catalogue: &Catalogue,
    forbidden_tags: &BTreeSet<String>,
    forbidden_activities: &BTreeSet<ActivityId>,
    requirements: &BTreeMap<ItemId, f64>,
    inventory: &Inventory,
    budget: &PlanBudget,
) -> Result<PlanResult, PlanError> {
    for &item in requirements.keys() {
        if catalogue.item(item).is_none() {
            return Err(PlanError::UnknownItem(item));
        }
    }

    let mut kinds: Vec<VarKind> = Vec::new();
    let mut objective: Vec<f64> = Vec::new();
    // Per-item coefficient column: positive supplies, negative consumes.
    let mut item_coeffs: BTreeMap<ItemId, Vec<(usize, f64)>> = BTreeMap::new();

    for (id, activity) in catalogue.activities() {
        if forbidden_activities.contains(&id) {
            continue;
        }
        let var = kinds.len();
        kinds.push(VarKind::Activity(id));
        objective.push(activity.ap_cost);
        for drop in &activity.drops {
            let per_run = drop.yield_per_run();
            if per_run > EPS {
                item_coeffs.entry(drop.item).or_default().push((var, per_run));
            }
        }
    }

    for (id, formula) in catalogue.formulas() {
        if formula.tags.iter().any(|t| forbidden_tags.contains(t)) {
            continue;
        }
        let var = kinds.len();
        kinds.push(VarKind::Formula(id));
        objective.push(0.0);
        item_coeffs
            .entry(formula.output)
            .or_default()
            .push((var, formula.quantity));
        for cost in &formula.costs {
            item_coeffs
                .entry(cost.item)
                .or_default()
                .push((var, -cost.quantity));
        }
    }

    // Feasibility partition: an item is producible if some allowed activity
    // or formula supplies it. Everything else that is demanded -- by the
    // requirements or as a formula input -- gets a free slack variable.
    // Only unproducible items carry slack, so producible demand still has
    // to be covered by runs or crafts.
    let producible: BTreeSet<ItemId> = item_coeffs
        .iter()
        .filter(|(_, cols)| cols.iter().any(|&(_, c)| c > EPS))
        .map(|(&item, _)| item)
        .collect();
    let mut demanded: BTreeSet<ItemId> = requirements
        .iter()
        .filter(|(_, qty)| **qty > EPS)
        .map(|(&item, _)| item)
        .collect();
    for (&item, cols) in &item_coeffs {
        if cols.iter().any(|&(_, c)| c < -EPS) {
            demanded.insert(item);
        }
    }
    for &item in demanded.difference(&producible) {
        let var = kinds.len();
        kinds.push(VarKind::Slack(item));
        objective.push(0.0);
        item_coeffs.entry(item).or_default().push((var, 1.0));
    }

    // Inventory enters through a single variable pinned to 1, contributing
    // each held quantity to its item's balance row.
    let have_var = kinds.len();
    kinds.push(VarKind::Have);
    objective.push(0.0);
    for (item, qty) in inventory.iter() {
        if qty > EPS {
            item_coeffs.entry(item).or_default().push((have_var, qty));
        }
    }

    let mut constraints: Vec<Constraint> = Vec::new();
    for (&item, cols) in &item_coeffs {
        let rhs = requirements.get(&item).copied().unwrap_or(0.0).max(0.0);
        let consumed = cols.iter().any(|&(_, c)| c < -EPS);
        // A balance row with nothing demanded and nothing consumed is vacuous.
        if rhs <= EPS && !consumed {
            continue;
        }
        constraints.push(Constraint {
            coeffs: cols.clone(),
            relation: Relation::Ge,
            rhs,
        });
    }
    constraints.push(Constraint {
        coeffs: vec![(have_var, 1.0)],
        relation: Relation::Eq,
        rhs: 1.0,
    });

    let lp = LinearProgram {
        num_vars: kinds.len(),
        objective,
        constraints,
    };
    let deadline = Instant::now() + budget.time_limit;

    match simplex::solve(&lp, Some(deadline)) {
        SolveOutcome::Optimal { values, .. } => Ok(decode(catalogue, &kinds, &values)),
        SolveOutcome::Infeasible => Ok(PlanResult {
            feasible: false,
            reason: PlanReason::Infeasible,
            runs: Vec::new(),
            crafts: Vec::new(),
            shortfalls: Vec::new(),
            total_ap: 0.0,
        }),
        SolveOutcome::TimedOut => Ok(PlanResult {
            feasible: false,
            reason: PlanReason::TimedOut,
            runs: Vec::new(),
            crafts: Vec::new(),
            shortfalls: Vec::new(),
            total_ap: 0.0,
        }),
        SolveOutcome::Unbounded => Err(PlanError::Unbounded),
    }
}

/// Decode a solved variable vector into whole-number recommendations.
fn decode(catalogue: &Catalogue, kinds: &[VarKind], values: &[f64]) -> PlanResult {
    let mut runs: Vec<ActivityRuns> = Vec::new();
    let mut crafts: Vec<FormulaApplications> = Vec::new();
    let mut shortfalls: Vec<(ItemId, u64)> = Vec::new();

    for (&kind, &value) in kinds.iter().zip(values) {
        if value <= DECODE_EPS {
            continue;
        }
        match kind {
            VarKind::Activity(id) => {
                // Ceil with a tolerance so 39.999999... runs decodes as 40.
                let count = (value - DECODE_EPS).ceil().max(1.0) as u64;
                let ap_cost = catalogue
                    .activity(id)
                    .map(|a| a.ap_cost)
                    .unwrap_or_default();
                runs.push(ActivityRuns {
                    activity: id,
                    runs: count,
                    ap_cost,
                });
            }
            VarKind::Formula(id) => {
                crafts.push(FormulaApplications {
                    formula: id,
                    times: (value - DECODE_EPS).ceil().max(1.0) as u64,
                });
            }
            VarKind::Slack(item) => {
                shortfalls.push((item, (value - DECODE_EPS).ceil().max(1.0) as u64));
            }
            VarKind::Have => {}
        }
    }

    // Most expensive lines first; stable on activity id for determinism.
    runs.sort_by(|a, b| {
        let ca = a.ap_cost * a.runs as f64;
        let cb = b.ap_cost * b.runs as f64;
        cb.total_cmp(&ca).then(a.activity.cmp(&b.activity))
    });
    shortfalls.sort_by_key(|&(item, _)| item);

    let total_ap = runs.iter().map(|r| r.ap_cost * r.runs as f64).sum();
    PlanResult {
        feasible: shortfalls.is_empty(),
        reason: PlanReason::Optimal,
        runs,
        crafts,
        shortfalls,
        total_ap,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
