//! Progression state and the rule seam the engine depends on.
//!
//! A [`ProgressionState`] is a snapshot of one subject's advancement: whether
//! the subject is owned, its tier and level, and any number of keyed
//! sub-tracks (skill masteries, module levels). How states are clamped and
//! ordered is game-specific, so the engine consumes it through the
//! [`ProgressionRules`] trait; [`TableRules`] implements it over the
//! catalogue's own tables and is the implementation game adapters get for
//! free.

use crate::catalogue::Catalogue;
use crate::id::SubjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// ProgressionState
// ---------------------------------------------------------------------------

/// Immutable snapshot of a subject's advancement along its dimensions.
///
/// Levels are 1-based; an unowned subject has no meaningful tier or level.
/// Sub-tracks absent from the map default to 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    pub owned: bool,
    pub tier: u32,
    pub level: u32,
    pub tracks: BTreeMap<String, u32>,
}

impl ProgressionState {
    /// The empty, unowned state.
    pub fn empty() -> Self {
        Self {
            owned: false,
            tier: 0,
            level: 0,
            tracks: BTreeMap::new(),
        }
    }

    /// An owned state at the given tier and level with no sub-tracks raised.
    pub fn at(tier: u32, level: u32) -> Self {
        Self {
            owned: true,
            tier,
            level,
            tracks: BTreeMap::new(),
        }
    }

    /// Builder-style sub-track setter.
    pub fn with_track(mut self, key: &str, level: u32) -> Self {
        self.tracks.insert(key.to_string(), level);
        self
    }

    /// Sub-track level, defaulting to 0 when absent.
    pub fn track(&self, key: &str) -> u32 {
        self.tracks.get(key).copied().unwrap_or(0)
    }
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// Rules seam
// ---------------------------------------------------------------------------

/// Game-specific progression semantics, injected into the engine rather than
/// branched on internally. Implement once per game title.
pub trait ProgressionRules {
    /// Clamp a state to the subject's hard caps and repair any out-of-range
    /// dimension. Never fails; unknown subjects pass through unchanged.
    fn normalize(&self, subject: SubjectId, state: &ProgressionState) -> ProgressionState;

    /// Whether `goal` is already covered by `current`: every dimension of
    /// `current` is at least as advanced under the game's monotonicity rules.
    fn is_covered_by(&self, goal: &ProgressionState, current: &ProgressionState) -> bool;
}

/// [`ProgressionRules`] driven by the catalogue's subject tables.
#[derive(Debug, Clone, Copy)]
pub struct TableRules<'a> {
    catalogue: &'a Catalogue,
}

impl<'a> TableRules<'a> {
    pub fn new(catalogue: &'a Catalogue) -> Self {
        Self { catalogue }
    }
}

impl ProgressionRules for TableRules<'_> {
    fn normalize(&self, subject: SubjectId, state: &ProgressionState) -> ProgressionState {
        let Some(profile) = self.catalogue.subject(subject) else {
            return state.clone();
        };
        if !state.owned {
            return ProgressionState::empty();
        }

        let tier = state.tier.min(profile.max_tier);
        let cap = profile.level_caps[tier as usize];
        let level = state.level.clamp(1, cap);

        // Unknown track keys are dropped; known ones are clamped to their cap.
        let tracks = state
            .tracks
            .iter()
            .filter_map(|(key, lvl)| {
                let track = profile.track(key)?;
                Some((key.clone(), (*lvl).min(track.cap())))
            })
            .filter(|(_, lvl)| *lvl > 0)
            .collect();

        ProgressionState {
            owned: true,
            tier,
            level,
            tracks,
        }
    }

    fn is_covered_by(&self, goal: &ProgressionState, current: &ProgressionState) -> bool {
        if !goal.owned {
            return true;
        }
        if !current.owned {
            return false;
        }
        // Tier advancement resets level to 1, so tier dominates level.
        if (goal.tier, goal.level) > (current.tier, current.level) {
            return false;
        }
        goal.tracks
            .iter()
            .all(|(key, lvl)| current.track(key) >= *lvl)
    }
}
