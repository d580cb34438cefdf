//! Per-file translation batch
//!
//! One batch drives one source/target document pair. Units are processed
//! sequentially in document order, frontmatter first. Before each unit the
//! cancellation token is polled, and every translator call is raced against
//! it. A translator failure marks the unit `Error` and stops the batch;
//! units finished earlier stay committed.

use crate::app::AppContext;
use crate::collect::{collect_file_status, retain_errors, target_unit_state};
use crate::commit::{align_target, paired_slots};
use crate::context::TranslationContext;
use crate::document::Document;
use crate::error::{PipelineError, Result, TranslatorError};
use crate::revision::{apply_revision, plan_revision, FullReason, RevisionPlan};
use crate::translator::{TermSuggestion, TranslationStats};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tandem_core::{hash_text, ContentHash, Marker, NeedFlag, UnitState};
use tandem_status::{FileDirectoryPatch, Status, StatusTree, UnitPatch, UnitSlot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a translated unit was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationPath {
    /// Translated from scratch
    Full,
    /// Previous translation patched with the translated source diff
    Patched,
    /// Revision attempted, then translated from scratch
    Fallback(FullReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Nothing to do for this unit
    Skipped { status: Status },
    Translated {
        path: TranslationPath,
        needs_review: bool,
        reasons: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOutcome {
    pub slot: UnitSlot,
    pub source_hash: ContentHash,
    /// Target hash after the batch touched the unit
    pub target_hash: ContentHash,
    pub kind: OutcomeKind,
}

/// Result of a batch that ran to completion or was cancelled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub file: String,
    pub outcomes: Vec<UnitOutcome>,
    pub term_suggestions: Vec<TermSuggestion>,
    pub warnings: Vec<String>,
    pub stats: TranslationStats,
    /// The token fired before every unit was processed
    pub cancelled: bool,
}

impl BatchReport {
    pub fn translated(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.kind, OutcomeKind::Translated { .. }))
            .count()
    }

    pub fn needs_review(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o.kind,
                    OutcomeKind::Translated {
                        needs_review: true,
                        ..
                    }
                )
            })
            .count()
    }
}

/// Work decided for one unit
enum Job {
    Translate,
    Revise { old_source_hash: ContentHash },
}

/// Result of running a job
enum Step {
    Done { text: String, path: TranslationPath },
    Cancelled,
    Failed(TranslatorError),
}

/// Clears the file's `is_translating` flag however the batch exits
struct TranslatingGuard<'a> {
    tree: &'a StatusTree,
    path: &'a str,
}

impl<'a> TranslatingGuard<'a> {
    fn set(tree: &'a StatusTree, path: &'a str) -> Result<Self> {
        tree.update_file_partial(path, FileDirectoryPatch::translating(true))?;
        Ok(Self { tree, path })
    }
}

impl Drop for TranslatingGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self
            .tree
            .update_file_partial(self.path, FileDirectoryPatch::translating(false))
        {
            debug!(file = %self.path, error = %err, "could not clear translating flag");
        }
    }
}

pub struct TranslationBatch<'a> {
    app: &'a AppContext,
    cancel: CancellationToken,
}

impl<'a> TranslationBatch<'a> {
    pub fn new(app: &'a AppContext, cancel: CancellationToken) -> Self {
        Self { app, cancel }
    }

    /// Translate every unit of `target` that needs work against `source`
    ///
    /// `target` is aligned to `source` first and updated in place; the caller
    /// writes it back. `path` is the target file's key in the status tree.
    pub async fn run(
        &self,
        path: &str,
        source: &Document,
        target: &mut Document,
    ) -> Result<BatchReport> {
        if align_target(source, target) {
            debug!(file = %path, "aligned target structure to source");
        }
        let tree = self.app.tree.as_ref();
        let mut status = collect_file_status(path, source, target);
        if let Some(previous) = tree.get_file(path) {
            retain_errors(&mut status, &previous);
        }
        tree.add_or_update_file(status);
        let _guard = TranslatingGuard::set(tree, path)?;

        let mut report = BatchReport {
            file: path.to_string(),
            ..BatchReport::default()
        };
        let source_texts: Vec<&str> = source.units.iter().map(|u| u.content.as_str()).collect();

        for slot in paired_slots(source, target) {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let (Some((source_text, _)), Some((target_text, target_marker))) =
                (source.slot(slot), target.slot(slot))
            else {
                continue;
            };

            let source_hash = hash_text(source_text);
            let target_hash = hash_text(target_text);
            let state = target_unit_state(source_text, target_text, target_marker);
            let job = match state {
                UnitState::NeedsTranslation | UnitState::Error { .. } => Job::Translate,
                UnitState::NeedsRevision { old_hash } => Job::Revise {
                    old_source_hash: old_hash,
                },
                other => {
                    report.outcomes.push(UnitOutcome {
                        slot,
                        source_hash,
                        target_hash,
                        kind: OutcomeKind::Skipped {
                            status: Status::from(&other),
                        },
                    });
                    continue;
                }
            };

            tree.update_unit_at(path, slot, UnitPatch::translating())?;
            let previous = target_text.to_string();
            let step = match self
                .run_job(job, slot, source_text, &previous, &source_texts, &mut report)
                .await
            {
                Ok(step) => step,
                Err(err) => {
                    // Structural failure: leave the unit as it was
                    if let Err(clear_err) =
                        tree.update_unit_at(path, slot, UnitPatch::default().with_translating(false))
                    {
                        debug!(file = %path, error = %clear_err, "could not clear unit translating flag");
                    }
                    return Err(PipelineError::Unit {
                        file: path.to_string(),
                        unit_hash: target_hash,
                        source: Box::new(err),
                    });
                }
            };

            match step {
                Step::Done { text, path: how } => {
                    let verdict = self.app.quality.review(source_text, &text);
                    let mut marker = Marker::derived_from(&text, source_hash);
                    if verdict.needs_review {
                        marker.set_need(NeedFlag::Review);
                    }
                    let new_hash = marker.hash;
                    let need = marker.need;
                    if let Some((content, slot_marker)) = target.slot_mut(slot) {
                        *content = text;
                        *slot_marker = Some(marker);
                    }

                    let status = if verdict.needs_review {
                        Status::NeedsReview
                    } else {
                        Status::Translated
                    };
                    tree.update_unit_at(path, slot, UnitPatch::finished(new_hash, status, need))?;
                    debug!(file = %path, unit = %new_hash.short(), path = ?how, "unit translated");

                    report.outcomes.push(UnitOutcome {
                        slot,
                        source_hash,
                        target_hash: new_hash,
                        kind: OutcomeKind::Translated {
                            path: how,
                            needs_review: verdict.needs_review,
                            reasons: verdict.reasons,
                        },
                    });
                }
                Step::Cancelled => {
                    tree.update_unit_at(path, slot, UnitPatch::default().with_translating(false))?;
                    report.cancelled = true;
                    break;
                }
                Step::Failed(err) => {
                    let message = err.to_string();
                    tree.update_unit_at(path, slot, UnitPatch::failed(message.clone()))?;
                    warn!(file = %path, unit = %target_hash.short(), error = %message, "unit translation failed");
                    return Err(PipelineError::Translation {
                        file: path.to_string(),
                        unit_hash: target_hash,
                        message,
                    });
                }
            }
        }

        info!(
            file = %path,
            translated = report.translated(),
            needs_review = report.needs_review(),
            cancelled = report.cancelled,
            provider = self.app.translator.provider_name(),
            "translation batch finished"
        );
        Ok(report)
    }

    async fn run_job(
        &self,
        job: Job,
        slot: UnitSlot,
        source_text: &str,
        previous: &str,
        source_texts: &[&str],
        report: &mut BatchReport,
    ) -> Result<Step> {
        // The current source is the base of the next revision of this unit
        self.app.snapshots.put(source_text)?;

        let context = match slot {
            UnitSlot::Frontmatter => self
                .app
                .assembler()
                .assemble_standalone(source_text, &self.app.glossary)?,
            UnitSlot::Unit(index) => {
                self.app
                    .assembler()
                    .assemble(source_texts, index, &self.app.glossary)?
            }
        };

        let old_source_hash = match job {
            Job::Translate => {
                return Ok(self
                    .translate_full(source_text, &context, TranslationPath::Full, report)
                    .await)
            }
            Job::Revise { old_source_hash } => old_source_hash,
        };

        let plan = plan_revision(
            self.app.snapshots.as_ref(),
            &old_source_hash,
            source_text,
            self.app.config.diff.context_lines,
        )?;
        let source_diff = match plan {
            RevisionPlan::Patch { source_diff, .. } => source_diff,
            RevisionPlan::Full { reason } => {
                debug!(reason = ?reason, "revising by full translation");
                return Ok(self
                    .translate_full(source_text, &context, TranslationPath::Fallback(reason), report)
                    .await);
            }
        };

        let revision = context.clone().with_revision(previous, source_diff);
        let languages = &self.app.config.languages;
        let output = match self
            .race(self.app.translator.translate_revision_patch(
                source_text,
                &languages.source,
                &languages.target,
                &revision,
            ))
            .await
        {
            None => return Ok(Step::Cancelled),
            Some(Err(err)) => return Ok(Step::Failed(err)),
            Some(Ok(output)) => output,
        };
        absorb(report, output.term_suggestions, output.warnings, output.stats);

        let label = old_source_hash.short();
        match apply_revision(previous, &output.target_patch, &label) {
            Some(text) => Ok(Step::Done {
                text,
                path: TranslationPath::Patched,
            }),
            None => Ok(self
                .translate_full(
                    source_text,
                    &context,
                    TranslationPath::Fallback(FullReason::PatchRejected),
                    report,
                )
                .await),
        }
    }

    async fn translate_full(
        &self,
        source_text: &str,
        context: &TranslationContext,
        path: TranslationPath,
        report: &mut BatchReport,
    ) -> Step {
        let languages = &self.app.config.languages;
        let output = match self
            .race(self.app.translator.translate(
                source_text,
                &languages.source,
                &languages.target,
                context,
            ))
            .await
        {
            None => return Step::Cancelled,
            Some(Err(err)) => return Step::Failed(err),
            Some(Ok(output)) => output,
        };
        absorb(report, output.term_suggestions, output.warnings, output.stats);
        Step::Done {
            text: output.translated_text,
            path,
        }
    }

    /// `None` when the token fired first; the translator future is dropped
    async fn race<F, T>(&self, call: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = call => Some(out),
        }
    }
}

fn absorb(
    report: &mut BatchReport,
    suggestions: Vec<TermSuggestion>,
    warnings: Vec<String>,
    stats: Option<TranslationStats>,
) {
    report.term_suggestions.extend(suggestions);
    report.warnings.extend(warnings);
    if let Some(stats) = stats {
        report.stats.merge(&stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TandemConfig;
    use crate::document::{Frontmatter, Unit};
    use crate::mock::{MockMode, MockTranslator};
    use std::sync::Arc;
    use tandem_snapshots::MemorySnapshotStore;
    use tandem_status::DisplayStatus;

    fn app(mock: MockTranslator) -> AppContext {
        AppContext::new(
            TandemConfig::default(),
            Arc::new(MemorySnapshotStore::new()),
            Arc::new(mock),
        )
    }

    #[tokio::test]
    async fn test_aligns_and_translates_placeholders() {
        let app = app(MockTranslator::new(MockMode::Suffix));
        let source = Document::new(vec![Unit::new("One").with_title("A"), Unit::new("Two")])
            .with_frontmatter(Frontmatter::new("title: T"));
        let mut target = Document::new(vec![Unit::new(""), Unit::new(""), Unit::new("extra")]);

        let report = TranslationBatch::new(&app, CancellationToken::new())
            .run("es/a.md", &source, &mut target)
            .await
            .unwrap();

        assert_eq!(report.translated(), 3);
        assert_eq!(target.units.len(), 2);
        assert_eq!(target.units[0].content, "One_es");
        assert_eq!(target.units[1].content, "Two_es");
        assert_eq!(target.frontmatter.as_ref().unwrap().content, "title: T_es");
        assert_eq!(report.stats.requests, 3);

        let file = app.tree.get_file("es/a.md").unwrap();
        assert_eq!(file.status, Status::Translated);
        assert!(!file.is_translating);
        assert_eq!(file.display, DisplayStatus::Translated);
    }

    #[tokio::test]
    async fn test_skips_blank_and_synchronized_units() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let app = app(mock.clone());
        let source = Document::new(vec![Unit::new("Done"), Unit::new("  ")]);
        let mut target = Document::new(vec![
            Unit::new("Hecho").with_marker(Marker::derived_from("Hecho", hash_text("Done"))),
            Unit::new(""),
        ]);

        let report = TranslationBatch::new(&app, CancellationToken::new())
            .run("es/b.md", &source, &mut target)
            .await
            .unwrap();

        assert_eq!(report.translated(), 0);
        assert_eq!(mock.translate_calls(), 0);
        assert_eq!(
            report.outcomes[0].kind,
            OutcomeKind::Skipped {
                status: Status::Translated
            }
        );
        assert_eq!(
            report.outcomes[1].kind,
            OutcomeKind::Skipped {
                status: Status::Empty
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let app = app(mock.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let source = Document::new(vec![Unit::new("One")]);
        let mut target = Document::default();
        let report = TranslationBatch::new(&app, cancel)
            .run("es/c.md", &source, &mut target)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert!(report.outcomes.is_empty());
        assert_eq!(mock.translate_calls(), 0);
        assert!(!app.tree.get_file("es/c.md").unwrap().is_translating);
    }
}
