//! Unit state machine
//!
//! A unit's state is never stored; it is derived from its marker, its live
//! content and the hash of the paired source unit every time it is asked for.

use crate::hash::{hash_text, ContentHash};
use crate::marker::{Marker, NeedFlag};
use serde::{Deserialize, Serialize};

/// Which side of a source/target pair a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Source,
    Target,
}

/// Derived translation state of a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum UnitState {
    /// Source-language unit; never transitions
    Source,
    /// Empty or whitespace-only content; excluded from translation
    Empty,
    /// Never translated, explicitly flagged, or edited since the last commit
    NeedsTranslation,
    /// Translated from `old_hash`, which is no longer the current source
    NeedsRevision { old_hash: ContentHash },
    /// Translated, but a quality check flagged it
    NeedsReview,
    /// In sync with the paired source unit
    Translated,
    /// The last operation on this unit failed
    Error { message: String },
}

/// Inputs to [`classify`]
#[derive(Debug, Clone, Copy)]
pub struct UnitFacts<'a> {
    pub side: Side,
    pub content: &'a str,
    pub marker: Option<&'a Marker>,
    /// Hash of the paired source unit, when one is known
    pub source_hash: Option<ContentHash>,
}

impl<'a> UnitFacts<'a> {
    pub fn source(content: &'a str, marker: Option<&'a Marker>) -> Self {
        Self {
            side: Side::Source,
            content,
            marker,
            source_hash: None,
        }
    }

    pub fn target(
        content: &'a str,
        marker: Option<&'a Marker>,
        source_hash: Option<ContentHash>,
    ) -> Self {
        Self {
            side: Side::Target,
            content,
            marker,
            source_hash,
        }
    }
}

/// Compute the state of a unit
///
/// Checks apply in this order: source side, empty content, missing marker,
/// stored hash vs live content, need flag, lineage against the paired source.
/// A marker whose `from` no longer matches the paired source is stale and is
/// reported as a revision from that `from` hash.
pub fn classify(facts: &UnitFacts<'_>) -> UnitState {
    if facts.side == Side::Source {
        return UnitState::Source;
    }
    if facts.content.trim().is_empty() {
        return UnitState::Empty;
    }

    let marker = match facts.marker {
        Some(marker) => marker,
        None => return UnitState::NeedsTranslation,
    };
    if marker.hash != hash_text(facts.content) {
        // Edited outside a committing write: the marker can no longer be trusted.
        return UnitState::NeedsTranslation;
    }

    match marker.need {
        Some(NeedFlag::Translate) => return UnitState::NeedsTranslation,
        Some(NeedFlag::Revise(old_hash)) => return UnitState::NeedsRevision { old_hash },
        Some(NeedFlag::Review) => return UnitState::NeedsReview,
        None => {}
    }

    match (marker.from, facts.source_hash) {
        (None, _) => UnitState::NeedsTranslation,
        (Some(_), None) => UnitState::Translated,
        (Some(from), Some(source)) if from == source => UnitState::Translated,
        (Some(from), Some(_)) => UnitState::NeedsRevision { old_hash: from },
    }
}
