use serde::{Deserialize, Serialize};

/// Identifies an item in the catalogue. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Identifies a crafting formula in the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FormulaId(pub u32);

/// Identifies a farmable activity (stage) in the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivityId(pub u32);

/// Identifies a subject (the character/unit being progressed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub u32);

/// Identifies an upgrade task. Derived deterministically from the subject key
/// and the step it performs, so rebuilding the same (current, goal) pair
/// yields identical ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(subject_key: &str, step_slug: &str) -> Self {
        Self(format!("{subject_key}:{step_slug}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
