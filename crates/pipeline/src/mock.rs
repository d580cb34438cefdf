//! Deterministic translator for tests
//!
//! Translates line by line, so a translated source diff is a valid patch
//! against a previous translation made by the same mock.
//!
//! # Example
//!
//! ```ignore
//! use tandem_pipeline::{MockMode, MockTranslator, Translator, TranslationContext};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockTranslator::new(MockMode::Suffix);
//!     let out = mock.translate("hello", "en", "fr", &TranslationContext::default()).await.unwrap();
//!     assert_eq!(out.translated_text, "hello_fr");
//! }
//! ```

use crate::context::TranslationContext;
use crate::error::TranslatorError;
use crate::translator::{PatchOutput, TranslationOutput, TranslationStats, Translator};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Mock translation modes
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append the target language to every non-blank line: "hello" → "hello_fr"
    Suffix,

    /// Look each line up in a table, falling back to `Suffix`
    Dictionary(HashMap<String, String>),

    /// Fail every call with this message
    Error(String),
}

/// Mock translator with call counters
#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    delay_ms: u64,
    /// Fail any call whose text contains this needle
    fail_on: Option<String>,
    /// Replace every revision patch with this text
    patch_override: Option<String>,
    translate_calls: Arc<AtomicUsize>,
    patch_calls: Arc<AtomicUsize>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay_ms: 0,
            fail_on: None,
            patch_override: None,
            translate_calls: Arc::new(AtomicUsize::new(0)),
            patch_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Build a `Dictionary` mock from `(source line, translated line)` pairs
    pub fn dictionary<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::new(MockMode::Dictionary(map))
    }

    /// Simulated latency per call
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.fail_on = Some(needle.into());
        self
    }

    pub fn with_patch_override(mut self, patch: impl Into<String>) -> Self {
        self.patch_override = Some(patch.into());
        self
    }

    pub fn translate_calls(&self) -> usize {
        self.translate_calls.load(Ordering::SeqCst)
    }

    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn check_failure(&self, text: &str) -> Result<(), TranslatorError> {
        if let MockMode::Error(msg) = &self.mode {
            return Err(TranslatorError::Provider(msg.clone()));
        }
        match &self.fail_on {
            Some(needle) if text.contains(needle.as_str()) => Err(TranslatorError::Provider(
                format!("refused to translate text containing `{}`", needle),
            )),
            _ => Ok(()),
        }
    }

    fn translate_line(&self, line: &str, target: &str) -> String {
        if line.trim().is_empty() {
            return line.to_string();
        }
        match &self.mode {
            MockMode::Dictionary(map) => map
                .get(line)
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", line, target)),
            _ => format!("{}_{}", line, target),
        }
    }

    fn translate_text(&self, text: &str, target: &str) -> String {
        text.split_inclusive('\n')
            .map(|line| match line.strip_suffix('\n') {
                Some(body) => format!("{}\n", self.translate_line(body, target)),
                None => self.translate_line(line, target),
            })
            .collect()
    }

    /// Translate the body of every `' '`, `'-'` and `'+'` line of a diff,
    /// leaving hunk headers and hints alone
    fn translate_diff(&self, diff: &str, target: &str) -> String {
        diff.split_inclusive('\n')
            .map(|line| {
                let (body, newline) = match line.strip_suffix('\n') {
                    Some(body) => (body, "\n"),
                    None => (line, ""),
                };
                match body.chars().next() {
                    Some(prefix @ (' ' | '-' | '+')) => format!(
                        "{}{}{}",
                        prefix,
                        self.translate_line(&body[1..], target),
                        newline
                    ),
                    _ => line.to_string(),
                }
            })
            .collect()
    }
}

fn stats(input: &str, output: &str) -> TranslationStats {
    TranslationStats {
        requests: 1,
        input_tokens: input.split_whitespace().count() as u64,
        output_tokens: output.split_whitespace().count() as u64,
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_lang: &str,
        target_lang: &str,
        _context: &TranslationContext,
    ) -> Result<TranslationOutput, TranslatorError> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        self.check_failure(text)?;

        let translated_text = self.translate_text(text, target_lang);
        Ok(TranslationOutput {
            stats: Some(stats(text, &translated_text)),
            translated_text,
            term_suggestions: Vec::new(),
            warnings: Vec::new(),
        })
    }

    async fn translate_revision_patch(
        &self,
        text: &str,
        _source_lang: &str,
        target_lang: &str,
        context: &TranslationContext,
    ) -> Result<PatchOutput, TranslatorError> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay().await;
        self.check_failure(text)?;

        let source_diff = context
            .source_diff
            .as_deref()
            .ok_or_else(|| TranslatorError::InvalidOutput("no source diff in context".into()))?;
        let target_patch = match &self.patch_override {
            Some(patch) => patch.clone(),
            None => self.translate_diff(source_diff, target_lang),
        };
        Ok(PatchOutput {
            stats: Some(stats(source_diff, &target_patch)),
            target_patch,
            term_suggestions: Vec::new(),
            warnings: Vec::new(),
        })
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}
