//! Tandem Pipeline - source/target document translation
//!
//! Ties the marker model, snapshot store and status tree together:
//! - [`commit_source`] snapshots edited source units and re-hashes their markers
//! - [`flag_stale_targets`] marks translations whose source moved on
//! - [`TranslationBatch`] translates or revises every unit that needs work,
//!   preferring a patch against the previous translation when the old source
//!   is still in the snapshot store
//!
//! Parsing documents and talking to a translation provider are left to the
//! host through [`DocumentParser`] and [`Translator`].

pub mod app;
pub mod batch;
pub mod collect;
pub mod commit;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod glossary;
pub mod mock;
pub mod quality;
pub mod revision;
pub mod translator;

pub use app::AppContext;
pub use batch::{BatchReport, OutcomeKind, TranslationBatch, TranslationPath, UnitOutcome};
pub use collect::{
    collect_file_status, collect_source_status, retain_errors, target_unit_state,
};
pub use commit::{align_target, commit_source, flag_stale_targets};
pub use config::{ContextConfig, DiffConfig, LanguageConfig, TandemConfig};
pub use context::{ContextAssembler, TranslationContext};
pub use document::{Document, DocumentParser, Frontmatter, Unit};
pub use error::{ConfigError, ParseError, PipelineError, Result, TranslatorError};
pub use glossary::{Glossary, GlossaryTerm};
pub use mock::{MockMode, MockTranslator};
pub use quality::{AcceptAll, QualityCheck, QualityVerdict};
pub use revision::{apply_revision, plan_revision, FullReason, RevisionPlan};
pub use translator::{PatchOutput, TermSuggestion, TranslationOutput, TranslationStats, Translator};

pub use tokio_util::sync::CancellationToken;
