//! Terminology list

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryTerm {
    pub source: String,
    pub target: String,
    /// Alternative source spellings (plural, inflected, abbreviated)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GlossaryTerm {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            variants: Vec::new(),
            note: None,
        }
    }

    pub fn with_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variants = variants.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Plain substring containment on the source form or any variant. No
    /// word-boundary detection, so it also works for scripts without spaces.
    pub fn matches(&self, text: &str) -> bool {
        std::iter::once(&self.source)
            .chain(&self.variants)
            .any(|form| !form.is_empty() && text.contains(form.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Glossary {
    terms: Vec<GlossaryTerm>,
}

impl Glossary {
    pub fn new(terms: Vec<GlossaryTerm>) -> Self {
        Self { terms }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn push(&mut self, term: GlossaryTerm) {
        self.terms.push(term);
    }

    pub fn terms(&self) -> &[GlossaryTerm] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms that occur in `text`, in glossary order
    pub fn matching(&self, text: &str) -> Vec<GlossaryTerm> {
        self.terms
            .iter()
            .filter(|term| term.matches(text))
            .cloned()
            .collect()
    }
}
