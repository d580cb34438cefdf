//! Translation context assembly
//!
//! The bundle built here is handed to the translator as-is; the pipeline
//! never interprets it.

use crate::error::Result;
use crate::glossary::{Glossary, GlossaryTerm};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationContext {
    /// Up to `window` units before the current one, in document order
    pub preceding: Vec<String>,
    /// Up to `window` units after the current one, in document order
    pub following: Vec<String>,
    /// Matched glossary terms as a JSON array
    pub glossary: String,
    pub terms: Vec<GlossaryTerm>,
    /// Set on the revision path
    pub previous_translation: Option<String>,
    /// Set on the revision path
    pub source_diff: Option<String>,
}

impl TranslationContext {
    pub fn with_revision(
        mut self,
        previous_translation: impl Into<String>,
        source_diff: impl Into<String>,
    ) -> Self {
        self.previous_translation = Some(previous_translation.into());
        self.source_diff = Some(source_diff.into());
        self
    }

    pub fn is_revision(&self) -> bool {
        self.source_diff.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAssembler {
    window: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(1)
    }
}

impl ContextAssembler {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Build the context for `units[index]`
    ///
    /// The window is clamped at the document boundaries rather than padded.
    /// An out-of-range `index` yields empty neighbour lists.
    pub fn assemble<S: AsRef<str>>(
        &self,
        units: &[S],
        index: usize,
        glossary: &Glossary,
    ) -> Result<TranslationContext> {
        let (preceding, following, text) = match units.get(index) {
            Some(current) => {
                let start = index.saturating_sub(self.window);
                let end = units.len().min(index + 1 + self.window);
                (
                    collect(&units[start..index]),
                    collect(&units[index + 1..end]),
                    current.as_ref(),
                )
            }
            None => (Vec::new(), Vec::new(), ""),
        };

        let terms = glossary.matching(text);
        Ok(TranslationContext {
            preceding,
            following,
            glossary: serde_json::to_string(&terms)?,
            terms,
            previous_translation: None,
            source_diff: None,
        })
    }

    /// Context for a text with no siblings, such as a frontmatter block
    pub fn assemble_standalone(&self, text: &str, glossary: &Glossary) -> Result<TranslationContext> {
        self.assemble(&[text], 0, glossary)
    }
}

fn collect<S: AsRef<str>>(units: &[S]) -> Vec<String> {
    units.iter().map(|u| u.as_ref().to_string()).collect()
}
