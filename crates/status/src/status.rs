//! Node statuses and rollup precedence

use serde::{Deserialize, Serialize};
use tandem_core::UnitState;

/// Status of a tree node
///
/// Variants are declared in ascending rollup precedence, so `Ord` picks the
/// status that wins when children are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Empty,
    Source,
    /// Not classifiable, e.g. a target unit with no paired source unit
    Unknown,
    Translated,
    NeedsReview,
    NeedsRevision,
    NeedsTranslation,
    Error,
}

impl From<&UnitState> for Status {
    fn from(state: &UnitState) -> Self {
        match state {
            UnitState::Source => Status::Source,
            UnitState::Empty => Status::Empty,
            UnitState::NeedsTranslation => Status::NeedsTranslation,
            UnitState::NeedsRevision { .. } => Status::NeedsRevision,
            UnitState::NeedsReview => Status::NeedsReview,
            UnitState::Translated => Status::Translated,
            UnitState::Error { .. } => Status::Error,
        }
    }
}

/// What observers render: a status with the transient translating tier folded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Empty,
    Source,
    Unknown,
    Translated,
    NeedsReview,
    NeedsRevision,
    NeedsTranslation,
    Translating,
    Error,
}

impl DisplayStatus {
    /// `Error` always wins; otherwise an in-flight translation outranks every
    /// other status
    pub fn of(status: Status, is_translating: bool) -> Self {
        match (status, is_translating) {
            (Status::Error, _) => DisplayStatus::Error,
            (_, true) => DisplayStatus::Translating,
            (Status::Empty, false) => DisplayStatus::Empty,
            (Status::Source, false) => DisplayStatus::Source,
            (Status::Unknown, false) => DisplayStatus::Unknown,
            (Status::Translated, false) => DisplayStatus::Translated,
            (Status::NeedsReview, false) => DisplayStatus::NeedsReview,
            (Status::NeedsRevision, false) => DisplayStatus::NeedsRevision,
            (Status::NeedsTranslation, false) => DisplayStatus::NeedsTranslation,
        }
    }
}

/// Rollup rank of a node; higher wins
pub fn rank(status: Status, is_translating: bool) -> u8 {
    DisplayStatus::of(status, is_translating) as u8
}
