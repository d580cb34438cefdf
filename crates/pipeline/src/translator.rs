//! Translation provider abstraction
//!
//! The pipeline never talks to a model or an API directly. A `Translator`
//! implementation receives the unit text together with the assembled
//! [`TranslationContext`] and returns either a full translation or, on the
//! revision path, a patch against the previous translation.

use crate::context::TranslationContext;
use crate::error::TranslatorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Glossary entry proposed by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSuggestion {
    pub source: String,
    pub target: String,
    pub note: Option<String>,
}

/// Usage accounting reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationStats {
    pub requests: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TranslationStats {
    pub fn merge(&mut self, other: &TranslationStats) {
        self.requests += other.requests;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationOutput {
    pub translated_text: String,
    pub term_suggestions: Vec<TermSuggestion>,
    pub warnings: Vec<String>,
    pub stats: Option<TranslationStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOutput {
    /// Unified diff to apply to the previous translation
    pub target_patch: String,
    pub term_suggestions: Vec<TermSuggestion>,
    pub warnings: Vec<String>,
    pub stats: Option<TranslationStats>,
}

/// Translation provider
///
/// Both calls may take arbitrarily long. The pipeline races them against its
/// cancellation token and drops the future when the token fires, so
/// implementations must be cancel-safe.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from scratch
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        context: &TranslationContext,
    ) -> Result<TranslationOutput, TranslatorError>;

    /// Translate the source diff in `context.source_diff` into a patch for
    /// `context.previous_translation`
    async fn translate_revision_patch(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        context: &TranslationContext,
    ) -> Result<PatchOutput, TranslatorError>;

    /// Name used in logs
    fn provider_name(&self) -> &str;
}
