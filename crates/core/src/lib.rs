//! Tandem Core - unit identity and revision primitives
//!
//! This crate provides the leaf layer of the translation-sync engine:
//! - BLAKE3 content hashing
//! - Markers (hash, lineage, pending action) and their on-disk grammar
//! - The unit state machine
//! - Unified diffs and validated patch application

pub mod diff;
pub mod embed;
pub mod hash;
pub mod marker;
pub mod state;

// Re-export main types for convenience
pub use diff::{apply_patch, compute_diff, compute_labeled_diff, has_changed, ParsedPatch};
pub use embed::{MarkerLine, MarkerPlacement};
pub use hash::{hash_bytes, hash_text, ContentHash, HashParseError};
pub use marker::{Marker, MarkerParseError, NeedFlag};
pub use state::{classify, Side, UnitFacts, UnitState};
