//! Document model shared with the external parser

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use tandem_core::{hash_text, ContentHash, Marker};
use tandem_status::UnitSlot;

/// One translatable block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Presentation only
    pub title: Option<String>,
    pub content: String,
    /// Absent means "not yet tracked"
    pub marker: Option<Marker>,
}

impl Unit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            title: None,
            content: content.into(),
            marker: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Untracked placeholder aligned to a source unit
    pub fn placeholder(title: Option<String>) -> Self {
        Self {
            title,
            ..Self::default()
        }
    }

    /// Hash of the live content
    pub fn content_hash(&self) -> ContentHash {
        hash_text(&self.content)
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Frontmatter block; tracked exactly like a unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontmatter {
    pub content: String,
    pub marker: Option<Marker>,
}

impl Frontmatter {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            marker: None,
        }
    }
}

/// A parsed document: optional frontmatter followed by ordered units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub frontmatter: Option<Frontmatter>,
    pub units: Vec<Unit>,
}

impl Document {
    pub fn new(units: Vec<Unit>) -> Self {
        Self {
            frontmatter: None,
            units,
        }
    }

    pub fn with_frontmatter(mut self, frontmatter: Frontmatter) -> Self {
        self.frontmatter = Some(frontmatter);
        self
    }

    /// Frontmatter first, then units in document order
    pub fn slots(&self) -> Vec<UnitSlot> {
        self.frontmatter
            .iter()
            .map(|_| UnitSlot::Frontmatter)
            .chain((0..self.units.len()).map(UnitSlot::Unit))
            .collect()
    }

    /// Content and marker of a slot
    pub fn slot(&self, slot: UnitSlot) -> Option<(&str, Option<&Marker>)> {
        match slot {
            UnitSlot::Frontmatter => self
                .frontmatter
                .as_ref()
                .map(|fm| (fm.content.as_str(), fm.marker.as_ref())),
            UnitSlot::Unit(index) => self
                .units
                .get(index)
                .map(|u| (u.content.as_str(), u.marker.as_ref())),
        }
    }

    /// Mutable content and marker of a slot
    pub fn slot_mut(&mut self, slot: UnitSlot) -> Option<(&mut String, &mut Option<Marker>)> {
        match slot {
            UnitSlot::Frontmatter => self
                .frontmatter
                .as_mut()
                .map(|fm| (&mut fm.content, &mut fm.marker)),
            UnitSlot::Unit(index) => self
                .units
                .get_mut(index)
                .map(|u| (&mut u.content, &mut u.marker)),
        }
    }
}

/// External parser that splits a document into frontmatter and units
///
/// `stringify(parse(text))` must reproduce `text` byte for byte for every
/// unit that was not modified in between.
pub trait DocumentParser: Send + Sync {
    fn parse(&self, text: &str) -> Result<Document, ParseError>;

    fn stringify(&self, document: &Document) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_put_frontmatter_first() {
        let doc = Document::new(vec![Unit::new("a"), Unit::new("b")])
            .with_frontmatter(Frontmatter::new("title: x"));
        assert_eq!(
            doc.slots(),
            vec![UnitSlot::Frontmatter, UnitSlot::Unit(0), UnitSlot::Unit(1)]
        );
        assert_eq!(doc.slot(UnitSlot::Unit(1)).map(|(c, _)| c), Some("b"));
        assert!(doc.slot(UnitSlot::Unit(2)).is_none());
    }

    #[test]
    fn test_slot_mut_writes_through() {
        let mut doc = Document::new(vec![Unit::new("a")]);
        if let Some((content, marker)) = doc.slot_mut(UnitSlot::Unit(0)) {
            *content = "b".to_string();
            *marker = Some(Marker::for_content("b"));
        }
        assert_eq!(doc.units[0].content, "b");
        assert!(doc.units[0].marker.as_ref().unwrap().is_intact("b"));
        assert!(doc.slot_mut(UnitSlot::Frontmatter).is_none());
    }

    #[test]
    fn test_placeholder_is_blank_and_untracked() {
        let unit = Unit::placeholder(Some("Intro".into()));
        assert!(unit.is_blank());
        assert!(unit.marker.is_none());
        assert_eq!(unit.content_hash(), hash_text(""));
    }
}
