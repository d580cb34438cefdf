//! Typed partial updates for tree nodes
//!
//! Every field is optional; `None` leaves the node's field untouched. Fields
//! that are themselves optional on the node use `Option<Option<_>>` so a patch
//! can clear them.

use crate::item::{DirectoryItem, FileItem, FrontmatterItem, UnitItem};
use crate::status::Status;
use serde::{Deserialize, Serialize};
use tandem_core::{ContentHash, NeedFlag};

/// Partial update for a unit or frontmatter node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPatch {
    pub status: Option<Status>,
    pub need: Option<Option<NeedFlag>>,
    pub is_translating: Option<bool>,
    pub error_message: Option<Option<String>>,
    /// New content hash after the unit was re-hashed
    pub hash: Option<ContentHash>,
}

impl UnitPatch {
    /// Unit entered the translation loop
    pub fn translating() -> Self {
        Self {
            is_translating: Some(true),
            ..Self::default()
        }
    }

    /// Unit was translated and committed under `hash`
    pub fn finished(hash: ContentHash, status: Status, need: Option<NeedFlag>) -> Self {
        Self {
            status: Some(status),
            need: Some(need),
            is_translating: Some(false),
            error_message: Some(None),
            hash: Some(hash),
        }
    }

    /// The last operation on the unit failed; content is left as it was
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(Status::Error),
            is_translating: Some(false),
            error_message: Some(Some(message.into())),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_translating(mut self, translating: bool) -> Self {
        self.is_translating = Some(translating);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply_to_unit(&self, unit: &mut UnitItem) {
        merge_unit_fields(
            self,
            &mut unit.status,
            &mut unit.need,
            &mut unit.is_translating,
            &mut unit.error_message,
            &mut unit.hash,
        );
    }

    pub(crate) fn apply_to_frontmatter(&self, fm: &mut FrontmatterItem) {
        merge_unit_fields(
            self,
            &mut fm.status,
            &mut fm.need,
            &mut fm.is_translating,
            &mut fm.error_message,
            &mut fm.hash,
        );
    }
}

fn merge_unit_fields(
    patch: &UnitPatch,
    status: &mut Status,
    need: &mut Option<NeedFlag>,
    is_translating: &mut bool,
    error_message: &mut Option<String>,
    hash: &mut ContentHash,
) {
    if let Some(s) = patch.status {
        *status = s;
    }
    if let Some(n) = patch.need {
        *need = n;
    }
    if let Some(t) = patch.is_translating {
        *is_translating = t;
    }
    if let Some(e) = &patch.error_message {
        error_message.clone_from(e);
    }
    if let Some(h) = patch.hash {
        *hash = h;
    }
}

/// Partial update for whole-file or whole-directory flags.
/// Children are never touched; the rollup is recomputed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDirectoryPatch {
    pub is_translating: Option<bool>,
    pub error_message: Option<Option<String>>,
}

impl FileDirectoryPatch {
    pub fn translating(translating: bool) -> Self {
        Self {
            is_translating: Some(translating),
            ..Self::default()
        }
    }

    pub fn error(message: Option<String>) -> Self {
        Self {
            error_message: Some(message),
            ..Self::default()
        }
    }

    pub(crate) fn apply_to_file(&self, file: &mut FileItem) {
        if let Some(t) = self.is_translating {
            file.is_translating = t;
        }
        if let Some(e) = &self.error_message {
            file.error_message.clone_from(e);
        }
    }

    pub(crate) fn apply_to_directory(&self, dir: &mut DirectoryItem) {
        if let Some(t) = self.is_translating {
            dir.is_translating = t;
        }
        if let Some(e) = &self.error_message {
            dir.error_message.clone_from(e);
        }
    }
}
