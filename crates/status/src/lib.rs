//! Tandem Status - hierarchical translation status index
//!
//! Aggregates per-unit states into file and directory rollups, supports
//! point updates without a re-scan and notifies observers of every change.

pub mod event;
pub mod item;
pub mod patch;
pub mod status;
pub mod tree;

pub use event::{ListenerId, TreeEvent};
pub use item::{
    DirectoryItem, FileItem, FileStatus, FrontmatterItem, StatusItem, UnitItem, UnitStatus,
};
pub use patch::{FileDirectoryPatch, UnitPatch};
pub use status::{rank, DisplayStatus, Status};
pub use tree::{FileSummary, StatusTree, UnitLocation, UnitSlot};

use tandem_core::ContentHash;
use thiserror::Error;

/// Status tree errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("file not in status tree: {0}")]
    FileNotFound(String),

    #[error("directory not in status tree: {0}")]
    DirectoryNotFound(String),

    #[error("unit {hash} not found in {path}")]
    UnitNotFound { path: String, hash: ContentHash },

    #[error("no {slot:?} node in {path}")]
    SlotNotFound { path: String, slot: UnitSlot },
}

pub type Result<T> = std::result::Result<T, TreeError>;
