//! Marker lines embedded in documents
//!
//! Block markers sit on their own line immediately before the unit they
//! describe, wrapped in an HTML comment. Frontmatter markers live inside the
//! frontmatter block as a `#` comment line.
//!
//! ```text
//! <!-- 5f2c...e1 from:9ab0...44 need:review -->
//! # 71d3...0c from:2e8f...a9
//! ```

use crate::hash::ContentHash;
use crate::marker::{Marker, MarkerParseError};

const BLOCK_OPEN: &str = "<!--";
const BLOCK_CLOSE: &str = "-->";
const FRONTMATTER_OPEN: &str = "#";

/// Where a marker line is embedded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPlacement {
    /// Own line before a unit: `<!-- tokens -->`
    Block,
    /// Comment line inside frontmatter: `# tokens`
    Frontmatter,
}

/// A parsed marker line with its surrounding whitespace preserved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerLine {
    pub placement: MarkerPlacement,
    /// Whitespace before the opening delimiter
    pub indent: String,
    pub marker: Marker,
    /// Everything after the closing delimiter (trailing spaces, `\r\n`, `\n`)
    pub trailing: String,
}

impl MarkerLine {
    /// Recognize a marker line
    ///
    /// Returns `None` when the line is not a marker at all (ordinary comment,
    /// text). Returns `Some(Err(..))` when the line is shaped like a marker,
    /// i.e. its first token is a hash, but the rest does not follow the grammar.
    pub fn parse(line: &str, placement: MarkerPlacement) -> Option<Result<Self, MarkerParseError>> {
        let body_start = line.len() - line.trim_start().len();
        let body_end = line.trim_end().len();
        if body_start >= body_end {
            return None;
        }
        let indent = &line[..body_start];
        let body = &line[body_start..body_end];
        let trailing = &line[body_end..];

        let tokens = match placement {
            MarkerPlacement::Block => body.strip_prefix(BLOCK_OPEN)?.strip_suffix(BLOCK_CLOSE)?,
            MarkerPlacement::Frontmatter => body.strip_prefix(FRONTMATTER_OPEN)?,
        };

        let first = tokens.split_ascii_whitespace().next()?;
        if !ContentHash::is_hash_token(first) {
            return None;
        }

        Some(Marker::parse(tokens).map(|marker| Self {
            placement,
            indent: indent.to_string(),
            marker,
            trailing: trailing.to_string(),
        }))
    }

    /// Build a new line with no indentation and a `\n` terminator
    pub fn new(placement: MarkerPlacement, marker: Marker) -> Self {
        Self {
            placement,
            indent: String::new(),
            marker,
            trailing: "\n".to_string(),
        }
    }

    /// Render the line, keeping the original indentation and line ending
    pub fn render(&self) -> String {
        match self.placement {
            MarkerPlacement::Block => format!(
                "{}{} {} {}{}",
                self.indent, BLOCK_OPEN, self.marker, BLOCK_CLOSE, self.trailing
            ),
            MarkerPlacement::Frontmatter => format!(
                "{}{} {}{}",
                self.indent, FRONTMATTER_OPEN, self.marker, self.trailing
            ),
        }
    }
}

/// Replace the marker on an existing line, preserving its whitespace structure
///
/// Returns `None` if `line` is not a marker line for `placement`.
pub fn rewrite_marker_line(
    line: &str,
    placement: MarkerPlacement,
    marker: &Marker,
) -> Option<Result<String, MarkerParseError>> {
    MarkerLine::parse(line, placement).map(|parsed| {
        parsed.map(|mut parsed| {
            parsed.marker = marker.clone();
            parsed.render()
        })
    })
}
