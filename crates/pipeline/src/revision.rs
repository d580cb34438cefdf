//! Revision protocol: decide between a diff/patch update and a full
//! translation, and apply returned target patches

use crate::error::Result;
use serde::{Deserialize, Serialize};
use tandem_core::{apply_patch, compute_diff, has_changed, ContentHash, ParsedPatch};
use tandem_snapshots::SnapshotStore;
use tracing::{debug, warn};

/// Why a revision degraded to a full translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullReason {
    /// No snapshot of the source version last translated from
    SnapshotMissing,
    /// The old source text equals the current one; nothing to diff
    SourceUnchanged,
    /// The translator's patch did not apply to the previous translation
    PatchRejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionPlan {
    /// Ask the translator for a patch against the previous translation
    Patch {
        old_source: String,
        source_diff: String,
    },
    /// Translate the current source from scratch
    Full { reason: FullReason },
}

/// Look up the source text at `old_hash` and diff it against the current
/// source. Store errors propagate; a missing snapshot does not.
pub fn plan_revision(
    store: &dyn SnapshotStore,
    old_hash: &ContentHash,
    current_source: &str,
    context_lines: usize,
) -> Result<RevisionPlan> {
    let old_source = match store.get(old_hash)? {
        Some(text) => text,
        None => {
            debug!(old = %old_hash.short(), "no snapshot for previous source");
            return Ok(RevisionPlan::Full {
                reason: FullReason::SnapshotMissing,
            });
        }
    };

    if !has_changed(&old_source, current_source) {
        return Ok(RevisionPlan::Full {
            reason: FullReason::SourceUnchanged,
        });
    }

    let source_diff = compute_diff(&old_source, current_source, context_lines);
    Ok(RevisionPlan::Patch {
        old_source,
        source_diff,
    })
}

/// Apply a target-language patch to the previous translation. `None` means
/// the caller must fall back to a full translation.
pub fn apply_revision(previous_translation: &str, target_patch: &str, label: &str) -> Option<String> {
    let patched = apply_patch(previous_translation, target_patch, Some(label));
    if patched.is_none() {
        let parsed = ParsedPatch::parse(target_patch);
        warn!(
            unit = label,
            hunks = parsed.as_ref().map_or(0, ParsedPatch::hunk_count),
            changed = parsed.as_ref().map_or(0, ParsedPatch::changed_lines),
            "target patch rejected, falling back to full translation"
        );
    }
    patched
}
