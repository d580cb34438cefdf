//! Build status-tree input from parsed documents

use crate::document::Document;
use tandem_core::{classify, hash_text, ContentHash, Marker, UnitFacts, UnitState};
use tandem_status::{FileItem, FileStatus, Status, UnitSlot, UnitStatus};

/// State of a target unit against its paired source text
///
/// Differs from bare [`classify`] in one respect: a blank target next to a
/// non-blank source still has to be translated, so it is `NeedsTranslation`
/// rather than `Empty`. A blank source makes the pair `Empty`.
pub fn target_unit_state(source_content: &str, content: &str, marker: Option<&Marker>) -> UnitState {
    if source_content.trim().is_empty() {
        return UnitState::Empty;
    }
    let facts = UnitFacts::target(content, marker, Some(hash_text(source_content)));
    match classify(&facts) {
        UnitState::Empty => UnitState::NeedsTranslation,
        state => state,
    }
}

fn unit_status(
    source: &Document,
    slot: UnitSlot,
    title: Option<String>,
    content: &str,
    marker: Option<&Marker>,
) -> UnitStatus {
    let hash = hash_text(content);
    let status = match source.slot(slot) {
        Some((source_content, _)) => {
            UnitStatus::from_state(hash, &target_unit_state(source_content, content, marker))
        }
        None if content.trim().is_empty() => UnitStatus::new(hash, Status::Empty),
        None => UnitStatus::new(hash, Status::Unknown),
    };
    status
        .with_title(title)
        .with_need(marker.and_then(|m| m.need))
}

/// Status snapshot of a target file paired with its source document
///
/// Target units past the end of the source have no pair; they are reported
/// as `Unknown` and dropped by the next translation batch.
pub fn collect_file_status(path: &str, source: &Document, target: &Document) -> FileStatus {
    FileStatus {
        path: path.to_string(),
        error: None,
        frontmatter: target.frontmatter.as_ref().map(|fm| {
            unit_status(
                source,
                UnitSlot::Frontmatter,
                None,
                &fm.content,
                fm.marker.as_ref(),
            )
        }),
        units: target
            .units
            .iter()
            .enumerate()
            .map(|(index, unit)| {
                unit_status(
                    source,
                    UnitSlot::Unit(index),
                    unit.title.clone(),
                    &unit.content,
                    unit.marker.as_ref(),
                )
            })
            .collect(),
    }
}

/// Carry unit errors from the file's current tree node into a fresh snapshot
///
/// Markers never record failures, so a re-collected unit would otherwise
/// lose its `Error` state. A unit keeps the error only while its content
/// hash is the one that failed.
pub fn retain_errors(status: &mut FileStatus, previous: &FileItem) {
    fn carry(unit: &mut UnitStatus, hash: ContentHash, state: Status, message: Option<&String>) {
        if state == Status::Error && unit.hash == hash {
            unit.status = Status::Error;
            unit.error_message = message.cloned();
        }
    }

    if let (Some(fm), Some(prev)) = (status.frontmatter.as_mut(), previous.frontmatter.as_ref()) {
        carry(fm, prev.hash, prev.status, prev.error_message.as_ref());
    }
    for (unit, prev) in status.units.iter_mut().zip(&previous.units) {
        carry(unit, prev.hash, prev.status, prev.error_message.as_ref());
    }
}

/// Status snapshot of a source-language file: every unit is `Source`, blank
/// ones `Empty`
pub fn collect_source_status(path: &str, source: &Document) -> FileStatus {
    let status_of = |title: Option<String>, content: &str, marker: Option<&Marker>| {
        let state = if content.trim().is_empty() {
            UnitState::Empty
        } else {
            classify(&UnitFacts::source(content, marker))
        };
        UnitStatus::from_state(hash_text(content), &state).with_title(title)
    };

    FileStatus {
        path: path.to_string(),
        error: None,
        frontmatter: source
            .frontmatter
            .as_ref()
            .map(|fm| status_of(None, &fm.content, fm.marker.as_ref())),
        units: source
            .units
            .iter()
            .map(|u| status_of(u.title.clone(), &u.content, u.marker.as_ref()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Frontmatter, Unit};
    use tandem_core::NeedFlag;
    use tandem_status::{StatusTree, UnitPatch};

    fn pair() -> (Document, Document) {
        let source = Document::new(vec![
            Unit::new("Hello"),
            Unit::new("World"),
            Unit::new(""),
        ])
        .with_frontmatter(Frontmatter::new("title: Hi"));

        let mut reviewed = Marker::derived_from("Mundo", hash_text("World"));
        reviewed.set_need(NeedFlag::Review);
        let target = Document::new(vec![
            Unit::new("Hola").with_marker(Marker::derived_from("Hola", hash_text("Hello"))),
            Unit::new("Mundo").with_marker(reviewed),
            Unit::new(""),
            Unit::new("Sobra").with_marker(Marker::derived_from("Sobra", hash_text("x"))),
        ])
        .with_frontmatter(Frontmatter::new(""));
        (source, target)
    }

    #[test]
    fn test_target_unit_state() {
        assert_eq!(target_unit_state("Hello", "", None), UnitState::NeedsTranslation);
        assert_eq!(target_unit_state("  ", "Hola", None), UnitState::Empty);
        let marker = Marker::derived_from("Hola", hash_text("Hello"));
        assert_eq!(
            target_unit_state("Hello", "Hola", Some(&marker)),
            UnitState::Translated
        );
        assert_eq!(
            target_unit_state("Hello!", "Hola", Some(&marker)),
            UnitState::NeedsRevision {
                old_hash: hash_text("Hello")
            }
        );
    }

    #[test]
    fn test_collect_file_status() {
        let (source, target) = pair();
        let status = collect_file_status("es/a.md", &source, &target);

        assert_eq!(status.path, "es/a.md");
        assert_eq!(
            status.frontmatter.as_ref().map(|fm| fm.status),
            Some(Status::NeedsTranslation)
        );
        let statuses: Vec<Status> = status.units.iter().map(|u| u.status).collect();
        assert_eq!(
            statuses,
            vec![
                Status::Translated,
                Status::NeedsReview,
                Status::Empty,
                Status::Unknown
            ]
        );
        assert_eq!(status.units[1].need, Some(NeedFlag::Review));
        assert_eq!(status.units[0].hash, hash_text("Hola"));
    }

    #[test]
    fn test_retain_errors_while_content_unchanged() {
        let (source, target) = pair();
        let tree = StatusTree::new();
        tree.add_or_update_file(collect_file_status("es/a.md", &source, &target));
        tree.update_unit_at("es/a.md", UnitSlot::Unit(0), UnitPatch::failed("provider down"))
            .unwrap();
        tree.update_unit_at("es/a.md", UnitSlot::Frontmatter, UnitPatch::failed("bad yaml"))
            .unwrap();
        let previous = tree.get_file("es/a.md").unwrap();

        let mut status = collect_file_status("es/a.md", &source, &target);
        retain_errors(&mut status, &previous);
        assert_eq!(status.units[0].status, Status::Error);
        assert_eq!(status.units[0].error_message.as_deref(), Some("provider down"));
        assert_eq!(status.units[1].status, Status::NeedsReview);
        assert_eq!(status.frontmatter.as_ref().map(|fm| fm.status), Some(Status::Error));

        tree.add_or_update_file(status);
        assert_eq!(tree.get_file("es/a.md").unwrap().status, Status::Error);

        // Edited content no longer carries the failure
        let mut edited = target.clone();
        edited.units[0].content = "Hola!".to_string();
        let mut status = collect_file_status("es/a.md", &source, &edited);
        retain_errors(&mut status, &previous);
        assert_ne!(status.units[0].status, Status::Error);
        assert_eq!(status.units[0].error_message, None);
    }

    #[test]
    fn test_collected_status_feeds_tree() {
        let (source, target) = pair();
        let tree = StatusTree::new();
        tree.rebuild(vec![
            collect_source_status("en/a.md", &source),
            collect_file_status("es/a.md", &source, &target),
        ]);

        assert_eq!(tree.get_file("en/a.md").unwrap().status, Status::Source);
        assert_eq!(tree.get_file("es/a.md").unwrap().status, Status::NeedsTranslation);
        assert_eq!(tree.children("es/a.md").unwrap().len(), 4);
    }
}
