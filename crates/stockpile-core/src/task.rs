//! Tasks: atomic upgrade steps with material costs and prerequisite edges.

use crate::catalogue::CostEntry;
use crate::id::{ItemId, SubjectId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a task does. A closed sum type so resolvers and UIs can switch
/// exhaustively over it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// First acquisition: the subject goes from unowned to owned. Zero cost.
    Acquire,
    /// Unlock tier `to` from tier `to - 1`.
    AdvanceTier { to: u32 },
    /// Raise the level from `from` to `to` while at `tier`. Costs are summed
    /// over the half-open level range, never one task per level.
    AdvanceLevel { tier: u32, from: u32, to: u32 },
    /// Raise sub-track `key` to level `to` (from `to - 1`).
    RaiseTrack { key: String, to: u32 },
}

impl Step {
    /// Stable, human-readable slug used to derive the task id.
    pub fn slug(&self) -> String {
        match self {
            Step::Acquire => "acquire".to_string(),
            Step::AdvanceTier { to } => format!("tier-{to}"),
            Step::AdvanceLevel { tier, from, to } => format!("level-{tier}-{from}-{to}"),
            Step::RaiseTrack { key, to } => format!("track-{key}-{to}"),
        }
    }
}

/// One atomic upgrade step. Prerequisite edges reference earlier tasks only,
/// so any list built in emission order is already topologically sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub subject: SubjectId,
    pub step: Step,
    pub costs: Vec<CostEntry>,
    pub deps: Vec<TaskId>,
}

impl Task {
    pub fn new(
        subject: SubjectId,
        subject_key: &str,
        step: Step,
        costs: Vec<CostEntry>,
        deps: Vec<TaskId>,
    ) -> Self {
        let id = TaskId::new(subject_key, &step.slug());
        Self {
            id,
            subject,
            step,
            costs,
            deps,
        }
    }
}

/// Aggregate the material costs of a task batch into per-item totals,
/// ready to feed into the farm planner.
pub fn total_costs(tasks: &[Task]) -> BTreeMap<ItemId, f64> {
    let mut totals = BTreeMap::new();
    for task in tasks {
        for cost in &task.costs {
            *totals.entry(cost.item).or_insert(0.0) += cost.quantity;
        }
    }
    totals
}
