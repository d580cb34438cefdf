use std::sync::{Arc, Mutex};

use tandem_core::{hash_text, ContentHash, Marker, NeedFlag};
use tandem_pipeline::{
    commit_source, flag_stale_targets, AppContext, CancellationToken, Document, FullReason,
    MockMode, MockTranslator, OutcomeKind, PipelineError, QualityVerdict, TandemConfig,
    TranslationBatch, TranslationPath, Unit,
};
use tandem_snapshots::{MemorySnapshotStore, SnapshotError, SnapshotStore};
use tandem_status::{DisplayStatus, Status, StatusItem, StatusTree, TreeEvent};

/// Collects every tree event
struct Recorder(Arc<Mutex<Vec<TreeEvent>>>);

impl Recorder {
    fn attach(tree: &StatusTree) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        tree.subscribe(move |event: &TreeEvent| sink.lock().unwrap().push(event.clone()));
        Self(events)
    }

    fn events(&self) -> Vec<TreeEvent> {
        self.0.lock().unwrap().clone()
    }
}

/// Accepts writes but cannot read anything back
struct UnreadableStore;

impl SnapshotStore for UnreadableStore {
    fn put(&self, content: &str) -> Result<ContentHash, SnapshotError> {
        Ok(hash_text(content))
    }

    fn get(&self, _hash: &ContentHash) -> Result<Option<String>, SnapshotError> {
        Err(SnapshotError::InvalidRecord("disk gone".to_string()))
    }
}

fn dictionary() -> MockTranslator {
    MockTranslator::dictionary([
        ("one", "uno"),
        ("two", "dos"),
        ("three", "tres"),
        ("2", "II"),
    ])
}

fn memory_app(mock: MockTranslator) -> AppContext {
    AppContext::new(
        TandemConfig::default(),
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(mock),
    )
}

/// Source edited from `one two three` to `one 2 three`, target translated
/// from the old version and explicitly flagged for revision
fn revision_pair(app: &AppContext) -> (Document, Document) {
    let old_source = "one\ntwo\nthree\n";
    let old_hash = app.snapshots.put(old_source).unwrap();

    let mut marker = Marker::derived_from("uno\ndos\ntres\n", old_hash);
    marker.set_need(NeedFlag::Revise(old_hash));
    let source = Document::new(vec![Unit::new("one\n2\nthree\n")]);
    let target = Document::new(vec![Unit::new("uno\ndos\ntres\n").with_marker(marker)]);
    (source, target)
}

#[tokio::test]
async fn test_untracked_unit_is_translated() {
    let app = memory_app(MockTranslator::new(MockMode::Suffix));
    let source = Document::new(vec![Unit::new("Hello")]);
    let mut target = Document::new(vec![Unit::new("")]);

    let report = TranslationBatch::new(&app, CancellationToken::new())
        .run("es/intro.md", &source, &mut target)
        .await
        .unwrap();

    let unit = &target.units[0];
    assert_eq!(unit.content, "Hello_es");
    let marker = unit.marker.as_ref().unwrap();
    assert_eq!(marker.need, None);
    assert_eq!(marker.hash, hash_text("Hello_es"));
    assert_eq!(marker.from, Some(hash_text("Hello")));

    assert_eq!(report.translated(), 1);
    assert_eq!(
        report.outcomes[0].kind,
        OutcomeKind::Translated {
            path: TranslationPath::Full,
            needs_review: false,
            reasons: vec![],
        }
    );
    assert_eq!(
        app.tree.get_file("es/intro.md").unwrap().status,
        Status::Translated
    );
    // The source is now available as the base of a later revision
    assert!(app.snapshots.contains(&hash_text("Hello")).unwrap());
}

#[tokio::test]
async fn test_revision_applies_translated_patch() {
    let mock = dictionary();
    let app = memory_app(mock.clone());
    let (source, mut target) = revision_pair(&app);

    let report = TranslationBatch::new(&app, CancellationToken::new())
        .run("es/list.md", &source, &mut target)
        .await
        .unwrap();

    assert_eq!(target.units[0].content, "uno\nII\ntres\n");
    let marker = target.units[0].marker.as_ref().unwrap();
    assert_eq!(marker.need, None);
    assert_eq!(marker.from, Some(hash_text("one\n2\nthree\n")));
    assert_eq!(mock.patch_calls(), 1);
    assert_eq!(mock.translate_calls(), 0);
    assert!(matches!(
        report.outcomes[0].kind,
        OutcomeKind::Translated {
            path: TranslationPath::Patched,
            ..
        }
    ));
}

#[tokio::test]
async fn test_rejected_patch_falls_back_to_full_translation() {
    let mock = dictionary().with_patch_override("@@ -1,1 +1,1 @@\n-nada\n+algo\n");
    let app = memory_app(mock.clone());
    let (source, mut target) = revision_pair(&app);

    let report = TranslationBatch::new(&app, CancellationToken::new())
        .run("es/list.md", &source, &mut target)
        .await
        .unwrap();

    assert_eq!(target.units[0].content, "uno\nII\ntres\n");
    assert_eq!(mock.patch_calls(), 1);
    assert_eq!(mock.translate_calls(), 1);
    assert_eq!(report.stats.requests, 2);
    assert!(matches!(
        report.outcomes[0].kind,
        OutcomeKind::Translated {
            path: TranslationPath::Fallback(FullReason::PatchRejected),
            ..
        }
    ));
    assert_eq!(
        app.tree.get_file("es/list.md").unwrap().status,
        Status::Translated
    );
}

#[tokio::test]
async fn test_missing_snapshot_revises_by_full_translation() {
    let mock = dictionary();
    let app = memory_app(mock.clone());
    let stale = Marker::derived_from("uno\n", hash_text("never stored"));
    let source = Document::new(vec![Unit::new("one\n")]);
    let mut target = Document::new(vec![Unit::new("uno\n").with_marker(stale)]);

    let report = TranslationBatch::new(&app, CancellationToken::new())
        .run("es/x.md", &source, &mut target)
        .await
        .unwrap();

    assert_eq!(mock.patch_calls(), 0);
    assert!(matches!(
        report.outcomes[0].kind,
        OutcomeKind::Translated {
            path: TranslationPath::Fallback(FullReason::SnapshotMissing),
            ..
        }
    ));
}

#[tokio::test]
async fn test_quality_flag_marks_unit_for_review() {
    let app = memory_app(MockTranslator::new(MockMode::Suffix)).with_quality(
        Arc::new(|source: &str, _translated: &str| {
            if source.contains("tricky") {
                QualityVerdict::flag(vec!["idiom".to_string()])
            } else {
                QualityVerdict::accept()
            }
        }),
    );
    let source = Document::new(vec![Unit::new("plain"), Unit::new("tricky phrase")]);
    let mut target = Document::default();

    let report = TranslationBatch::new(&app, CancellationToken::new())
        .run("es/q.md", &source, &mut target)
        .await
        .unwrap();

    assert_eq!(report.needs_review(), 1);
    assert_eq!(target.units[0].marker.as_ref().unwrap().need, None);
    assert_eq!(
        target.units[1].marker.as_ref().unwrap().need,
        Some(NeedFlag::Review)
    );

    let file = app.tree.get_file("es/q.md").unwrap();
    assert_eq!(file.units[0].status, Status::Translated);
    assert_eq!(file.units[1].status, Status::NeedsReview);
    assert_eq!(file.status, Status::NeedsReview);
    assert_eq!(app.tree.get_directory("es").unwrap().status, Status::NeedsReview);
}

#[tokio::test]
async fn test_failure_stops_batch_and_keeps_earlier_units() {
    let app = memory_app(
        MockTranslator::new(MockMode::Suffix).failing_on("Second"),
    );
    let source = Document::new(vec![
        Unit::new("First"),
        Unit::new("Second"),
        Unit::new("Third"),
    ]);
    let mut target = Document::default();

    let err = TranslationBatch::new(&app, CancellationToken::new())
        .run("es/f.md", &source, &mut target)
        .await
        .unwrap_err();

    match err {
        PipelineError::Translation {
            file,
            unit_hash,
            message,
        } => {
            assert_eq!(file, "es/f.md");
            assert_eq!(unit_hash, hash_text(""));
            assert!(message.contains("Second"));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(target.units[0].content, "First_es");
    assert_eq!(target.units[1].content, "");
    assert_eq!(target.units[2].content, "");

    let file = app.tree.get_file("es/f.md").unwrap();
    assert_eq!(file.units[0].status, Status::Translated);
    assert_eq!(file.units[1].status, Status::Error);
    assert!(file.units[1].error_message.is_some());
    assert_eq!(file.units[2].status, Status::NeedsTranslation);
    assert_eq!(file.status, Status::Error);
    assert!(!file.is_translating);
    assert!(file.units.iter().all(|u| !u.is_translating));
}

#[tokio::test]
async fn test_failed_unit_stays_failed_across_reruns() {
    let app = memory_app(
        MockTranslator::new(MockMode::Suffix).failing_on("Second"),
    );
    let source = Document::new(vec![Unit::new("First"), Unit::new("Second")]);
    let mut target = Document::default();

    let batch = TranslationBatch::new(&app, CancellationToken::new());
    assert!(batch.run("es/f.md", &source, &mut target).await.is_err());

    // A rerun that stops before reaching the failed unit must not forget it
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = TranslationBatch::new(&app, cancel)
        .run("es/f.md", &source, &mut target)
        .await
        .unwrap();
    assert!(report.cancelled);

    let file = app.tree.get_file("es/f.md").unwrap();
    assert_eq!(file.units[0].status, Status::Translated);
    assert_eq!(file.units[1].status, Status::Error);
    assert!(file.units[1]
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("Second")));
    assert_eq!(file.status, Status::Error);
}

#[tokio::test]
async fn test_store_failure_names_file_and_unit() {
    let app = AppContext::new(
        TandemConfig::default(),
        Arc::new(UnreadableStore),
        Arc::new(dictionary()),
    );
    let (source, mut target) = {
        let old_hash = hash_text("one\ntwo\n");
        let marker = Marker::derived_from("uno\ndos\n", old_hash);
        (
            Document::new(vec![Unit::new("one\n2\n")]),
            Document::new(vec![Unit::new("uno\ndos\n").with_marker(marker)]),
        )
    };

    let err = TranslationBatch::new(&app, CancellationToken::new())
        .run("es/p.md", &source, &mut target)
        .await
        .unwrap_err();

    match err {
        PipelineError::Unit {
            file,
            unit_hash,
            source,
        } => {
            assert_eq!(file, "es/p.md");
            assert_eq!(unit_hash, hash_text("uno\ndos\n"));
            assert!(matches!(*source, PipelineError::Snapshot(SnapshotError::InvalidRecord(_))));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(target.units[0].content, "uno\ndos\n");
    let file = app.tree.get_file("es/p.md").unwrap();
    assert!(!file.units[0].is_translating);
    assert_ne!(file.units[0].status, Status::Error);
}

#[tokio::test]
async fn test_cancel_between_units() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let app = memory_app(MockTranslator::new(MockMode::Suffix)).with_quality(
        Arc::new(move |_: &str, _: &str| {
            trigger.cancel();
            QualityVerdict::accept()
        }),
    );
    let source = Document::new(vec![Unit::new("a"), Unit::new("b"), Unit::new("c")]);
    let mut target = Document::default();

    let report = TranslationBatch::new(&app, cancel)
        .run("es/c.md", &source, &mut target)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.translated(), 1);
    assert_eq!(target.units[0].content, "a_es");
    assert_eq!(target.units[1].content, "");

    let file = app.tree.get_file("es/c.md").unwrap();
    assert!(!file.is_translating);
    assert_eq!(file.status, Status::NeedsTranslation);
}

#[tokio::test]
async fn test_cancel_interrupts_slow_translator() {
    let mock = MockTranslator::new(MockMode::Suffix).with_delay(5_000);
    let app = memory_app(mock.clone());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let source = Document::new(vec![Unit::new("slow")]);
    let mut target = Document::default();
    let report = TranslationBatch::new(&app, cancel)
        .run("es/slow.md", &source, &mut target)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(mock.translate_calls(), 1);
    assert!(target.units[0].marker.is_none());
    let file = app.tree.get_file("es/slow.md").unwrap();
    assert!(!file.units[0].is_translating);
    assert_eq!(file.units[0].status, Status::NeedsTranslation);
}

#[tokio::test]
async fn test_observers_see_translating_state() {
    let app = memory_app(MockTranslator::new(MockMode::Suffix));
    let recorder = Recorder::attach(&app.tree);
    let source = Document::new(vec![Unit::new("Hello")]);
    let mut target = Document::default();

    TranslationBatch::new(&app, CancellationToken::new())
        .run("docs/es/a.md", &source, &mut target)
        .await
        .unwrap();

    let events = recorder.events();
    assert!(events.iter().any(|e| e
        .node
        .as_ref()
        .is_some_and(|n| n.display_status() == DisplayStatus::Translating)));
    let last = events.last().and_then(|e| e.node.clone()).unwrap();
    assert_eq!(last.display_status(), DisplayStatus::Translated);
    assert!(matches!(last, StatusItem::Directory(_) | StatusItem::File(_)));
}

#[tokio::test]
async fn test_source_edit_flows_into_revision() {
    let mock = dictionary();
    let app = memory_app(mock.clone());

    let mut source = Document::new(vec![Unit::new("one\ntwo\nthree\n")]);
    commit_source(&mut source, app.snapshots.as_ref()).unwrap();
    let mut target = Document::default();
    TranslationBatch::new(&app, CancellationToken::new())
        .run("es/flow.md", &source, &mut target)
        .await
        .unwrap();
    assert_eq!(target.units[0].content, "uno\ndos\ntres\n");

    source.units[0].content = "one\n2\nthree\n".to_string();
    let changed = commit_source(&mut source, app.snapshots.as_ref()).unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(flag_stale_targets(&source, &mut target), 1);
    assert_eq!(
        target.units[0].marker.as_ref().unwrap().need,
        Some(NeedFlag::Revise(hash_text("one\ntwo\nthree\n")))
    );

    TranslationBatch::new(&app, CancellationToken::new())
        .run("es/flow.md", &source, &mut target)
        .await
        .unwrap();
    assert_eq!(target.units[0].content, "uno\nII\ntres\n");
    assert_eq!(mock.patch_calls(), 1);
}

#[tokio::test]
async fn test_durable_store_survives_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut source = Document::new(vec![Unit::new("one\ntwo\nthree\n")]);
    let mut target = Document::default();

    {
        let app = AppContext::open_durable(
            TandemConfig::default(),
            dir.path(),
            Arc::new(dictionary()),
        )?;
        commit_source(&mut source, app.snapshots.as_ref())?;
        TranslationBatch::new(&app, CancellationToken::new())
            .run("es/d.md", &source, &mut target)
            .await?;
    }

    let mock = dictionary();
    let app = AppContext::open_durable(TandemConfig::default(), dir.path(), Arc::new(mock.clone()))?;
    source.units[0].content = "one\n2\nthree\n".to_string();
    commit_source(&mut source, app.snapshots.as_ref())?;
    flag_stale_targets(&source, &mut target);

    let report = TranslationBatch::new(&app, CancellationToken::new())
        .run("es/d.md", &source, &mut target)
        .await?;
    assert_eq!(target.units[0].content, "uno\nII\ntres\n");
    assert!(matches!(
        report.outcomes[0].kind,
        OutcomeKind::Translated {
            path: TranslationPath::Patched,
            ..
        }
    ));
    Ok(())
}
