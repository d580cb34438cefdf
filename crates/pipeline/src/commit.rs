//! Committing source edits and propagating them to target markers

use crate::document::{Document, Unit};
use crate::error::Result;
use ahash::AHashMap;
use tandem_core::{hash_text, ContentHash, Marker, NeedFlag};
use tandem_snapshots::SnapshotStore;
use tandem_status::UnitSlot;
use tracing::debug;

/// Re-hash every source unit and frontmatter block, snapshot its text and
/// bring its marker up to date
///
/// Returns `new hash -> previous hash` for every unit whose content changed
/// since its last commit. Untracked units get a fresh marker and do not
/// appear in the map. Blank units are left alone.
pub fn commit_source(
    document: &mut Document,
    store: &dyn SnapshotStore,
) -> Result<AHashMap<ContentHash, ContentHash>> {
    let mut changed = AHashMap::new();

    for slot in document.slots() {
        let Some((content, marker)) = document.slot_mut(slot) else {
            continue;
        };
        if content.trim().is_empty() {
            continue;
        }

        let hash = store.put(content)?;
        match marker {
            Some(existing) => {
                if existing.hash != hash {
                    let previous = existing.commit(content);
                    debug!(unit = %hash.short(), previous = %previous.short(), "source unit changed");
                    changed.insert(hash, previous);
                }
            }
            None => *marker = Some(Marker::for_content(content)),
        }
    }

    Ok(changed)
}

/// Mark target units whose lineage no longer matches their paired source
/// unit with `need:revise@<old from>`
///
/// Pairs are aligned by position. Units that already carry a need flag, or
/// have no lineage, are left alone. Returns the number of units flagged.
pub fn flag_stale_targets(source: &Document, target: &mut Document) -> usize {
    let mut flagged = 0;

    for slot in source.slots() {
        let Some((source_content, _)) = source.slot(slot) else {
            continue;
        };
        let source_hash = hash_text(source_content);
        let Some((_, Some(marker))) = target.slot_mut(slot) else {
            continue;
        };

        match (marker.from, marker.need) {
            (Some(from), None) if from != source_hash => {
                marker.set_need(NeedFlag::Revise(from));
                flagged += 1;
            }
            _ => {}
        }
    }

    flagged
}

/// Make the target's structure mirror the source by position
///
/// Missing target units are created empty and untracked; surplus target
/// units are dropped. A missing frontmatter block is created empty when the
/// source has one. Returns true if the target changed.
pub fn align_target(source: &Document, target: &mut Document) -> bool {
    let mut changed = false;

    if source.frontmatter.is_some() && target.frontmatter.is_none() {
        target.frontmatter = Some(Default::default());
        changed = true;
    }

    let wanted = source.units.len();
    if target.units.len() > wanted {
        target.units.truncate(wanted);
        changed = true;
    }
    while target.units.len() < wanted {
        let title = source.units[target.units.len()].title.clone();
        target.units.push(Unit::placeholder(title));
        changed = true;
    }

    changed
}

/// Slots that exist on both sides of a pair
pub(crate) fn paired_slots(source: &Document, target: &Document) -> Vec<UnitSlot> {
    source
        .slots()
        .into_iter()
        .filter(|slot| target.slot(*slot).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Frontmatter;
    use tandem_snapshots::MemorySnapshotStore;

    #[test]
    fn test_commit_tracks_new_units() {
        let store = MemorySnapshotStore::new();
        let mut doc = Document::new(vec![Unit::new("Hello"), Unit::new("  ")]);

        let changed = commit_source(&mut doc, &store).unwrap();
        assert!(changed.is_empty());
        assert!(doc.units[0].marker.as_ref().unwrap().is_intact("Hello"));
        assert!(doc.units[1].marker.is_none());
        assert_eq!(store.get(&hash_text("Hello")).unwrap().as_deref(), Some("Hello"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_commit_reports_edits() {
        let store = MemorySnapshotStore::new();
        let mut doc = Document::new(vec![
            Unit::new("Hello there").with_marker(Marker::for_content("Hello")),
            Unit::new("Stable").with_marker(Marker::for_content("Stable")),
        ])
        .with_frontmatter(Frontmatter {
            content: "title: New".into(),
            marker: Some(Marker::for_content("title: Old")),
        });

        let changed = commit_source(&mut doc, &store).unwrap();
        assert_eq!(changed.len(), 2);
        assert_eq!(changed[&hash_text("Hello there")], hash_text("Hello"));
        assert_eq!(changed[&hash_text("title: New")], hash_text("title: Old"));
        assert!(doc.units[0].marker.as_ref().unwrap().is_intact("Hello there"));

        // Second commit is a no-op
        assert!(commit_source(&mut doc, &store).unwrap().is_empty());
    }

    #[test]
    fn test_flag_stale_targets() {
        let source = Document::new(vec![
            Unit::new("Hello there"),
            Unit::new("Stable"),
            Unit::new("Fresh"),
        ]);
        let mut target = Document::new(vec![
            Unit::new("Hola").with_marker(Marker::derived_from("Hola", hash_text("Hello"))),
            Unit::new("Estable").with_marker(Marker::derived_from("Estable", hash_text("Stable"))),
            Unit::new("Nuevo").with_marker(Marker::for_content("Nuevo")),
        ]);

        assert_eq!(flag_stale_targets(&source, &mut target), 1);
        assert_eq!(
            target.units[0].marker.as_ref().unwrap().need,
            Some(NeedFlag::Revise(hash_text("Hello")))
        );
        assert_eq!(target.units[1].marker.as_ref().unwrap().need, None);
        assert_eq!(target.units[2].marker.as_ref().unwrap().need, None);

        // Already flagged units are not counted twice
        assert_eq!(flag_stale_targets(&source, &mut target), 0);
    }

    #[test]
    fn test_align_target() {
        let source = Document::new(vec![
            Unit::new("a").with_title("A"),
            Unit::new("b").with_title("B"),
            Unit::new("c").with_title("C"),
        ])
        .with_frontmatter(Frontmatter::new("title: x"));

        let mut short = Document::new(vec![Unit::new("α")]);
        assert!(align_target(&source, &mut short));
        assert_eq!(short.units.len(), 3);
        assert_eq!(short.units[0].content, "α");
        assert!(short.units[2].is_blank());
        assert_eq!(short.units[2].title.as_deref(), Some("C"));
        assert!(short.frontmatter.is_some());
        assert!(!align_target(&source, &mut short));

        let mut long = Document::new(vec![Unit::new("1"), Unit::new("2"), Unit::new("3"), Unit::new("4")])
            .with_frontmatter(Frontmatter::new("title: y"));
        assert!(align_target(&source, &mut long));
        assert_eq!(long.units.len(), 3);
        assert_eq!(paired_slots(&source, &long).len(), 4);
    }
}
