//! Per-unit identity and revision metadata
//!
//! On disk a marker is a single-line token sequence:
//!
//! ```text
//! <hash> [from:<hash>] [need:(translate|review|revise@<hash>)]
//! ```

use crate::hash::{hash_text, ContentHash, HashParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const FROM_PREFIX: &str = "from:";
const NEED_PREFIX: &str = "need:";
const REVISE_PREFIX: &str = "revise@";

/// Pending action recorded on a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "hash")]
pub enum NeedFlag {
    /// Translate from scratch
    Translate,
    /// A translation exists but a quality check flagged it
    Review,
    /// Revise the translation; the hash names the source version last translated from
    Revise(ContentHash),
}

impl fmt::Display for NeedFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeedFlag::Translate => f.write_str("translate"),
            NeedFlag::Review => f.write_str("review"),
            NeedFlag::Revise(hash) => write!(f, "{}{}", REVISE_PREFIX, hash),
        }
    }
}

impl FromStr for NeedFlag {
    type Err = MarkerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "translate" => Ok(NeedFlag::Translate),
            "review" => Ok(NeedFlag::Review),
            _ => match s.strip_prefix(REVISE_PREFIX) {
                Some(hash) => Ok(NeedFlag::Revise(parse_hash(hash)?)),
                None => Err(MarkerParseError::UnknownNeed(s.to_string())),
            },
        }
    }
}

/// Errors raised while parsing a marker token sequence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerParseError {
    #[error("marker is empty")]
    Empty,
    #[error("invalid hash `{token}`: {source}")]
    InvalidHash {
        token: String,
        #[source]
        source: HashParseError,
    },
    #[error("duplicate `{0}` field in marker")]
    Duplicate(&'static str),
    #[error("unknown need flag `{0}`")]
    UnknownNeed(String),
    #[error("unexpected token `{0}` in marker")]
    UnexpectedToken(String),
}

fn parse_hash(token: &str) -> Result<ContentHash, MarkerParseError> {
    ContentHash::from_hex(token).map_err(|source| MarkerParseError::InvalidHash {
        token: token.to_string(),
        source,
    })
}

/// Identity and revision metadata attached to one unit (or a frontmatter block)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// Hash of the unit's text as of the last committing write
    pub hash: ContentHash,
    /// Hash of the source unit this translation was derived from
    pub from: Option<ContentHash>,
    /// Pending action, if any
    pub need: Option<NeedFlag>,
}

impl Marker {
    /// Marker for freshly committed content with no lineage
    pub fn for_content(content: &str) -> Self {
        Self {
            hash: hash_text(content),
            from: None,
            need: None,
        }
    }

    /// Marker for a translation derived from the given source hash
    pub fn derived_from(content: &str, source: ContentHash) -> Self {
        Self {
            hash: hash_text(content),
            from: Some(source),
            need: None,
        }
    }

    /// Recompute `hash` after a committing write. Returns the previous hash.
    pub fn commit(&mut self, content: &str) -> ContentHash {
        std::mem::replace(&mut self.hash, hash_text(content))
    }

    /// True when the stored hash still matches the live content
    pub fn is_intact(&self, content: &str) -> bool {
        self.hash == hash_text(content)
    }

    /// Set the pending action
    pub fn set_need(&mut self, need: NeedFlag) {
        self.need = Some(need);
    }

    /// Clear the pending action without touching `hash` or `from`
    pub fn remove_need_tag(&mut self) {
        self.need = None;
    }

    /// No pending action and derived from exactly this source version
    pub fn is_synchronized_with(&self, source: &ContentHash) -> bool {
        self.need.is_none() && self.from.as_ref() == Some(source)
    }

    /// Parse the on-disk token sequence
    ///
    /// Tokens may be separated by any run of ASCII whitespace. The optional
    /// `from:` and `need:` tokens may appear in either order, at most once.
    pub fn parse(s: &str) -> Result<Self, MarkerParseError> {
        let mut tokens = s.split_ascii_whitespace();
        let hash = parse_hash(tokens.next().ok_or(MarkerParseError::Empty)?)?;

        let mut from = None;
        let mut need = None;
        for token in tokens {
            if let Some(rest) = token.strip_prefix(FROM_PREFIX) {
                if from.is_some() {
                    return Err(MarkerParseError::Duplicate("from"));
                }
                from = Some(parse_hash(rest)?);
            } else if let Some(rest) = token.strip_prefix(NEED_PREFIX) {
                if need.is_some() {
                    return Err(MarkerParseError::Duplicate("need"));
                }
                need = Some(rest.parse()?);
            } else {
                return Err(MarkerParseError::UnexpectedToken(token.to_string()));
            }
        }

        Ok(Self { hash, from, need })
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)?;
        if let Some(from) = &self.from {
            write!(f, " {}{}", FROM_PREFIX, from)?;
        }
        if let Some(need) = &self.need {
            write!(f, " {}{}", NEED_PREFIX, need)?;
        }
        Ok(())
    }
}

impl FromStr for Marker {
    type Err = MarkerParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
