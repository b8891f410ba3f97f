//! Task Graph Builder for the stockpile planning engine.
//!
//! Converts a subject's (current, goal) progression pair into an ordered,
//! dependency-aware list of atomic [`Task`]s with their material costs.
//!
//! # Algorithm
//!
//! Each progression dimension is walked independently, but cross-dimension
//! prerequisites thread tasks from other dimensions first: a sub-track step
//! that requires a minimum tier inserts the tier-advancement ladder before it
//! and records the reached tier task as a dependency. Per dimension the
//! builder keeps a "last emitted task" cursor; every new task records that
//! cursor (plus any cross-dimension cursor it needed) as its dependencies and
//! then becomes the cursor itself. Tasks are only ever created in
//! non-decreasing progression order, so the result is acyclic by construction
//! and the emission order is already a valid topological order.
//!
//! Tier/level advancement is emitted in strictly increasing steps: reaching
//! tier `T` first synthesizes the max-level task for every intermediate tier
//! (cost = sum over the half-open level range, never one task per level),
//! then the tier-unlock task, before continuing at level 1.
//!
//! Inventory is never consulted here; feasibility is the resolver's job.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use stockpile_core::catalogue::{Catalogue, CostEntry, SubjectProfile};
use stockpile_core::id::{ItemId, SubjectId, TaskId};
use stockpile_core::progression::{ProgressionRules, ProgressionState};
use stockpile_core::task::{Step, Task};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("unknown subject: {0:?}")]
    UnknownSubject(SubjectId),
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Build the upgrade task list taking `subject` from `current` to `goal`.
///
/// Both states are normalized through `rules` first, so a goal beyond the
/// subject's hard caps is clamped rather than rejected. Returns an empty list
/// when the goal is already covered by the current state.
pub fn build_tasks(
    subject: SubjectId,
    current: &ProgressionState,
    goal: &ProgressionState,
    catalogue: &Catalogue,
    rules: &dyn ProgressionRules,
) -> Result<Vec<Task>, TaskError> {
    let profile = catalogue
        .subject(subject)
        .ok_or(TaskError::UnknownSubject(subject))?;
    let current = rules.normalize(subject, current);
    let goal = rules.normalize(subject, goal);
    if rules.is_covered_by(&goal, &current) {
        return Ok(Vec::new());
    }

    let mut emitter = Emitter::new(subject, profile, &current);

    let mut acquire = None;
    if !current.owned {
        // First acquisition: zero cost, exactly once.
        acquire = Some(emitter.emit_main(Step::Acquire, Vec::new()));
    }

    if (goal.tier, goal.level) > (emitter.tier, emitter.level) {
        emitter.advance_to_tier(goal.tier);
        emitter.advance_level_to(goal.level);
    }

    for (key, track) in &profile.tracks {
        let target = goal.track(key);
        let have = if current.owned { current.track(key) } else { 0 };
        let mut track_cursor = acquire.clone();
        for step in have..target {
            let mut deps = Vec::new();
            if let Some(prev) = track_cursor.take() {
                deps.push(prev);
            }
            let need = track.min_tier[step as usize];
            if need > emitter.tier {
                emitter.advance_to_tier(need);
            }
            if let Some(reached) = emitter.tier_reached.get(&need) {
                deps.push(reached.clone());
            }
            let costs = merge_costs(track.step_costs[step as usize].iter().copied());
            let id = emitter.emit(
                Step::RaiseTrack {
                    key: key.clone(),
                    to: step + 1,
                },
                costs,
                deps,
            );
            track_cursor = Some(id);
        }
    }

    Ok(emitter.tasks)
}

/// One roster entry: where a subject is and where the player wants it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterGoal {
    pub subject: SubjectId,
    pub current: ProgressionState,
    pub goal: ProgressionState,
}

/// Build task lists for a whole roster, one list per entry.
///
/// With the `parallel` feature enabled the entries are processed on the rayon
/// pool; the engine itself is pure, so entries never share state.
pub fn build_tasks_for_roster(
    roster: &[RosterGoal],
    catalogue: &Catalogue,
    rules: &(dyn ProgressionRules + Sync),
) -> Result<Vec<Vec<Task>>, TaskError> {
    #[cfg(feature = "parallel")]
    {
        roster
            .par_iter()
            .map(|g| build_tasks(g.subject, &g.current, &g.goal, catalogue, rules))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        roster
            .iter()
            .map(|g| build_tasks(g.subject, &g.current, &g.goal, catalogue, rules))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Emitter -- walking state for one build
// ---------------------------------------------------------------------------

struct Emitter<'a> {
    subject: SubjectId,
    profile: &'a SubjectProfile,
    tasks: Vec<Task>,
    /// Cursor for the tier/level dimension.
    main_cursor: Option<TaskId>,
    /// Tier-unlock tasks emitted during this build, for cross-dimension deps.
    tier_reached: HashMap<u32, TaskId>,
    tier: u32,
    level: u32,
}

impl<'a> Emitter<'a> {
    fn new(subject: SubjectId, profile: &'a SubjectProfile, current: &ProgressionState) -> Self {
        let (tier, level) = if current.owned {
            (current.tier, current.level)
        } else {
            (0, 1)
        };
        Self {
            subject,
            profile,
            tasks: Vec::new(),
            main_cursor: None,
            tier_reached: HashMap::new(),
            tier,
            level,
        }
    }

    fn emit(&mut self, step: Step, costs: Vec<CostEntry>, deps: Vec<TaskId>) -> TaskId {
        let task = Task::new(self.subject, &self.profile.key, step, costs, deps);
        let id = task.id.clone();
        self.tasks.push(task);
        id
    }

    /// Emit a task in the tier/level dimension, chained off the main cursor.
    fn emit_main(&mut self, step: Step, costs: Vec<CostEntry>) -> TaskId {
        let deps = self.main_cursor.take().into_iter().collect();
        let id = self.emit(step, costs, deps);
        self.main_cursor = Some(id.clone());
        id
    }

    /// Emit the level-up/tier-unlock ladder until `target` tier is reached.
    fn advance_to_tier(&mut self, target: u32) {
        while self.tier < target {
            let cap = self.profile.level_caps[self.tier as usize];
            self.advance_level_to(cap);

            let to = self.tier + 1;
            let costs = merge_costs(self.profile.tier_costs[self.tier as usize].iter().copied());
            let id = self.emit_main(Step::AdvanceTier { to }, costs);
            self.tier_reached.insert(to, id);
            self.tier = to;
            self.level = 1;
        }
    }

    /// Emit a single ranged level-up task within the current tier, if needed.
    fn advance_level_to(&mut self, to: u32) {
        if to <= self.level {
            return;
        }
        let table = &self.profile.level_costs[self.tier as usize];
        let from = self.level;
        let costs = merge_costs(
            table[(from - 1) as usize..(to - 1) as usize]
                .iter()
                .flatten()
                .copied(),
        );
        self.emit_main(
            Step::AdvanceLevel {
                tier: self.tier,
                from,
                to,
            },
            costs,
        );
        self.level = to;
    }
}

/// Sum cost entries per item, in item-id order.
fn merge_costs(entries: impl Iterator<Item = CostEntry>) -> Vec<CostEntry> {
    let mut totals: BTreeMap<ItemId, f64> = BTreeMap::new();
    for e in entries {
        *totals.entry(e.item).or_insert(0.0) += e.quantity;
    }
    totals
        .into_iter()
        .filter(|(_, qty)| *qty > 0.0)
        .map(|(item, quantity)| CostEntry { item, quantity })
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use stockpile_core::catalogue::{CatalogueBuilder, SubjectProfile, TrackProfile};
    use stockpile_core::progression::TableRules;

    fn gold() -> ItemId {
        ItemId(0)
    }

    fn chip() -> ItemId {
        ItemId(1)
    }

    /// Subject with tier caps [30, 55, 80]: 100 gold per level step, one chip
    /// plus flat gold per tier unlock, and one three-step sub-track gated on
    /// tiers [1, 2, 2].
    fn setup_catalogue() -> Catalogue {
        let mut b = CatalogueBuilder::new();
        let gold = b.register_item("gold", "Gold", Some(0.004));
        let chip = b.register_item("chip", "Chip", Some(18.0));

        let level_table = |steps: u32| -> Vec<Vec<CostEntry>> {
            (0..steps).map(|_| vec![CostEntry::new(gold, 100.0)]).collect()
        };
        b.register_subject(SubjectProfile {
            key: "amiya".into(),
            name: "Amiya".into(),
            max_tier: 2,
            level_caps: vec![30, 55, 80],
            tier_costs: vec![
                vec![CostEntry::new(gold, 10_000.0)],
                vec![CostEntry::new(gold, 60_000.0), CostEntry::new(chip, 1.0)],
            ],
            level_costs: vec![level_table(29), level_table(54), level_table(79)],
            tracks: vec![(
                "skill_1".into(),
                TrackProfile {
                    min_tier: vec![1, 2, 2],
                    step_costs: vec![
                        vec![CostEntry::new(chip, 2.0)],
                        vec![CostEntry::new(chip, 4.0)],
                        vec![CostEntry::new(chip, 6.0)],
                    ],
                },
            )],
        });
        b.build().unwrap()
    }

    fn build(
        cat: &Catalogue,
        current: &ProgressionState,
        goal: &ProgressionState,
    ) -> Vec<Task> {
        let rules = TableRules::new(cat);
        let subject = cat.subject_id("amiya").unwrap();
        build_tasks(subject, current, goal, cat, &rules).unwrap()
    }

    // -----------------------------------------------------------------------
    // Test: equal states produce no tasks
    // -----------------------------------------------------------------------
    #[test]
    fn equal_states_produce_no_tasks() {
        let cat = setup_catalogue();
        let state = ProgressionState::at(1, 40).with_track("skill_1", 1);
        assert!(build(&cat, &state, &state).is_empty());
        assert!(build(&cat, &ProgressionState::empty(), &ProgressionState::empty()).is_empty());
    }

    // -----------------------------------------------------------------------
    // Test: goal below current produces no tasks
    // -----------------------------------------------------------------------
    #[test]
    fn covered_goal_produces_no_tasks() {
        let cat = setup_catalogue();
        let tasks = build(&cat, &ProgressionState::at(2, 10), &ProgressionState::at(1, 55));
        assert!(tasks.is_empty());
    }

    // -----------------------------------------------------------------------
    // Test: tier ladder emits the exact four-step chain
    // -----------------------------------------------------------------------
    #[test]
    fn tier_ladder_emits_exact_chain() {
        let cat = setup_catalogue();
        let tasks = build(&cat, &ProgressionState::at(0, 1), &ProgressionState::at(2, 1));

        let steps: Vec<&Step> = tasks.iter().map(|t| &t.step).collect();
        assert_eq!(
            steps,
            vec![
                &Step::AdvanceLevel { tier: 0, from: 1, to: 30 },
                &Step::AdvanceTier { to: 1 },
                &Step::AdvanceLevel { tier: 1, from: 1, to: 55 },
                &Step::AdvanceTier { to: 2 },
            ]
        );
        // Each task depends exactly on the previous one.
        assert!(tasks[0].deps.is_empty());
        for i in 1..tasks.len() {
            assert_eq!(tasks[i].deps, vec![tasks[i - 1].id.clone()]);
        }
    }

    // -----------------------------------------------------------------------
    // Test: multi-level jump sums the half-open range, one task only
    // -----------------------------------------------------------------------
    #[test]
    fn level_jump_sums_range() {
        let cat = setup_catalogue();
        let tasks = build(&cat, &ProgressionState::at(0, 5), &ProgressionState::at(0, 25));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].step, Step::AdvanceLevel { tier: 0, from: 5, to: 25 });
        // 20 level steps at 100 gold each.
        assert_eq!(tasks[0].costs, vec![CostEntry::new(gold(), 2000.0)]);
    }

    // -----------------------------------------------------------------------
    // Test: unowned subject gets a zero-cost acquire step first
    // -----------------------------------------------------------------------
    #[test]
    fn acquire_inserted_once_for_unowned() {
        let cat = setup_catalogue();
        let tasks = build(&cat, &ProgressionState::empty(), &ProgressionState::at(0, 10));

        assert_eq!(tasks[0].step, Step::Acquire);
        assert!(tasks[0].costs.is_empty());
        assert_eq!(
            tasks.iter().filter(|t| t.step == Step::Acquire).count(),
            1
        );
        // The level task chains off the acquire.
        assert_eq!(tasks[1].deps, vec![tasks[0].id.clone()]);
    }

    // -----------------------------------------------------------------------
    // Test: over-cap goal is clamped, not an error
    // -----------------------------------------------------------------------
    #[test]
    fn goal_beyond_caps_is_clamped() {
        let cat = setup_catalogue();
        let tasks = build(&cat, &ProgressionState::at(2, 79), &ProgressionState::at(9, 999));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].step, Step::AdvanceLevel { tier: 2, from: 79, to: 80 });
    }

    // -----------------------------------------------------------------------
    // Test: sub-track steps thread the tier ladder they require
    // -----------------------------------------------------------------------
    #[test]
    fn track_threads_tier_prerequisites() {
        let cat = setup_catalogue();
        let goal = ProgressionState::at(0, 1).with_track("skill_1", 1);
        let tasks = build(&cat, &ProgressionState::at(0, 1), &goal);

        // Track step 1 needs tier 1: level-up, tier-unlock, then the track step.
        let steps: Vec<&Step> = tasks.iter().map(|t| &t.step).collect();
        assert_eq!(
            steps,
            vec![
                &Step::AdvanceLevel { tier: 0, from: 1, to: 30 },
                &Step::AdvanceTier { to: 1 },
                &Step::RaiseTrack { key: "skill_1".into(), to: 1 },
            ]
        );
        // The track step depends on the tier task it threaded, not on the
        // level task.
        assert_eq!(tasks[2].deps, vec![tasks[1].id.clone()]);
    }

    // -----------------------------------------------------------------------
    // Test: track steps chain within their own dimension
    // -----------------------------------------------------------------------
    #[test]
    fn track_steps_chain_in_order() {
        let cat = setup_catalogue();
        let goal = ProgressionState::at(2, 1).with_track("skill_1", 3);
        let tasks = build(&cat, &ProgressionState::at(2, 1), &goal);

        // Already at tier 2: no threading needed, three chained track steps.
        assert_eq!(tasks.len(), 3);
        assert!(tasks[0].deps.is_empty());
        assert_eq!(tasks[1].deps, vec![tasks[0].id.clone()]);
        assert_eq!(tasks[2].deps, vec![tasks[1].id.clone()]);
        assert_eq!(tasks[2].costs, vec![CostEntry::new(chip(), 6.0)]);
    }

    // -----------------------------------------------------------------------
    // Test: emission order is a topological order of the dependency DAG
    // -----------------------------------------------------------------------
    #[test]
    fn emission_order_is_topological() {
        let cat = setup_catalogue();
        let goal = ProgressionState::at(2, 60).with_track("skill_1", 3);
        let tasks = build(&cat, &ProgressionState::empty(), &goal);

        let mut seen = HashSet::new();
        for task in &tasks {
            for dep in &task.deps {
                assert!(seen.contains(dep), "dep {dep:?} not yet emitted");
            }
            assert!(seen.insert(task.id.clone()), "duplicate task id");
        }
    }

    // -----------------------------------------------------------------------
    // Test: rebuilding the same inputs yields identical ids
    // -----------------------------------------------------------------------
    #[test]
    fn builder_is_deterministic() {
        let cat = setup_catalogue();
        let goal = ProgressionState::at(2, 60).with_track("skill_1", 2);
        let a = build(&cat, &ProgressionState::empty(), &goal);
        let b = build(&cat, &ProgressionState::empty(), &goal);
        assert_eq!(a, b);
    }

    // -----------------------------------------------------------------------
    // Test: unknown subject is an error
    // -----------------------------------------------------------------------
    #[test]
    fn unknown_subject_fails() {
        let cat = setup_catalogue();
        let rules = TableRules::new(&cat);
        let result = build_tasks(
            SubjectId(99),
            &ProgressionState::empty(),
            &ProgressionState::at(0, 2),
            &cat,
            &rules,
        );
        assert!(matches!(result, Err(TaskError::UnknownSubject(_))));
    }

    // -----------------------------------------------------------------------
    // Test: roster helper builds one list per entry
    // -----------------------------------------------------------------------
    #[test]
    fn roster_builds_all_entries() {
        let cat = setup_catalogue();
        let rules = TableRules::new(&cat);
        let subject = cat.subject_id("amiya").unwrap();
        let roster = vec![
            RosterGoal {
                subject,
                current: ProgressionState::at(0, 1),
                goal: ProgressionState::at(1, 1),
            },
            RosterGoal {
                subject,
                current: ProgressionState::at(1, 1),
                goal: ProgressionState::at(1, 1),
            },
        ];
        let lists = build_tasks_for_roster(&roster, &cat, &rules).unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].len(), 2);
        assert!(lists[1].is_empty());
    }
}
