//! Tree nodes and the per-file input snapshot
//!
//! Paths are relative and `/`-separated. The root directory has the empty
//! path. Nodes refer to each other by path and hash only; the tree owns them.

use crate::status::{DisplayStatus, Status};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tandem_core::{ContentHash, NeedFlag, UnitState};

/// Freshly collected status of one unit (or a frontmatter block)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    /// Hash of the live content
    pub hash: ContentHash,
    pub title: Option<String>,
    pub status: Status,
    /// Need flag currently recorded on the unit's marker
    pub need: Option<NeedFlag>,
    pub error_message: Option<String>,
}

impl UnitStatus {
    pub fn new(hash: ContentHash, status: Status) -> Self {
        Self {
            hash,
            title: None,
            status,
            need: None,
            error_message: None,
        }
    }

    /// Status derived from a classified unit state
    pub fn from_state(hash: ContentHash, state: &UnitState) -> Self {
        let error_message = match state {
            UnitState::Error { message } => Some(message.clone()),
            _ => None,
        };
        Self {
            error_message,
            ..Self::new(hash, Status::from(state))
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn with_need(mut self, need: Option<NeedFlag>) -> Self {
        self.need = need;
        self
    }
}

/// Freshly collected status of one file, as consumed by
/// [`StatusTree::rebuild`](crate::StatusTree::rebuild) and
/// [`StatusTree::add_or_update_file`](crate::StatusTree::add_or_update_file)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub path: String,
    /// Structural failure (parse, I/O) that prevented collecting units
    pub error: Option<String>,
    pub frontmatter: Option<UnitStatus>,
    pub units: Vec<UnitStatus>,
}

impl FileStatus {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            error: None,
            frontmatter: None,
            units: Vec::new(),
        }
    }

    /// Snapshot of a file that could not be read or parsed
    pub fn failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitItem {
    pub file_path: String,
    /// Position among the file's units
    pub index: usize,
    pub hash: ContentHash,
    pub title: Option<String>,
    pub status: Status,
    pub need: Option<NeedFlag>,
    pub is_translating: bool,
    pub error_message: Option<String>,
}

impl UnitItem {
    pub(crate) fn from_status(file_path: &str, index: usize, unit: UnitStatus) -> Self {
        Self {
            file_path: file_path.to_string(),
            index,
            hash: unit.hash,
            title: unit.title,
            status: unit.status,
            need: unit.need,
            is_translating: false,
            error_message: unit.error_message,
        }
    }

    pub fn display_status(&self) -> DisplayStatus {
        DisplayStatus::of(self.status, self.is_translating)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontmatterItem {
    pub file_path: String,
    pub hash: ContentHash,
    pub status: Status,
    pub need: Option<NeedFlag>,
    pub is_translating: bool,
    pub error_message: Option<String>,
}

impl FrontmatterItem {
    pub(crate) fn from_status(file_path: &str, unit: UnitStatus) -> Self {
        let item = UnitItem::from_status(file_path, 0, unit);
        Self {
            file_path: item.file_path,
            hash: item.hash,
            status: item.status,
            need: item.need,
            is_translating: item.is_translating,
            error_message: item.error_message,
        }
    }

    pub fn display_status(&self) -> DisplayStatus {
        DisplayStatus::of(self.status, self.is_translating)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub path: String,
    pub directory_path: String,
    /// Rollup of the children's statuses (`Error` if the file itself failed)
    pub status: Status,
    /// Rollup including in-flight translations anywhere in the file
    pub display: DisplayStatus,
    pub is_translating: bool,
    pub error_message: Option<String>,
    pub frontmatter: Option<FrontmatterItem>,
    pub units: Vec<UnitItem>,
}

impl FileItem {
    pub(crate) fn from_status(file: FileStatus) -> Self {
        let path = file.path;
        let frontmatter = file
            .frontmatter
            .map(|fm| FrontmatterItem::from_status(&path, fm));
        let units = file
            .units
            .into_iter()
            .enumerate()
            .map(|(index, unit)| UnitItem::from_status(&path, index, unit))
            .collect();

        let mut item = Self {
            directory_path: parent_dir(&path).to_string(),
            path,
            status: Status::Empty,
            display: DisplayStatus::Empty,
            is_translating: false,
            error_message: file.error,
            frontmatter,
            units,
        };
        item.recompute();
        item
    }

    /// Recompute the rollup from the children. Returns true if it changed.
    pub(crate) fn recompute(&mut self) -> bool {
        let before = (self.status, self.display);

        let children = self
            .frontmatter
            .iter()
            .map(|fm| (fm.status, fm.display_status()))
            .chain(self.units.iter().map(|u| (u.status, u.display_status())));

        let mut status = Status::Empty;
        let mut display = DisplayStatus::Empty;
        for (child_status, child_display) in children {
            status = status.max(child_status);
            display = display.max(child_display);
        }
        if self.error_message.is_some() {
            status = Status::Error;
        }

        self.status = status;
        self.display = display.max(DisplayStatus::of(status, self.is_translating));
        (self.status, self.display) != before
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryItem {
    pub path: String,
    pub status: Status,
    pub display: DisplayStatus,
    pub is_translating: bool,
    pub error_message: Option<String>,
    pub directories: BTreeSet<String>,
    pub files: BTreeSet<String>,
}

impl DirectoryItem {
    pub(crate) fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            status: Status::Empty,
            display: DisplayStatus::Empty,
            is_translating: false,
            error_message: None,
            directories: BTreeSet::new(),
            files: BTreeSet::new(),
        }
    }

    pub(crate) fn has_children(&self) -> bool {
        !self.directories.is_empty() || !self.files.is_empty()
    }
}

/// Any node of the tree, as handed out to readers and observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusItem {
    Directory(DirectoryItem),
    File(FileItem),
    Frontmatter(FrontmatterItem),
    Unit(UnitItem),
}

impl StatusItem {
    pub fn status(&self) -> Status {
        match self {
            StatusItem::Directory(d) => d.status,
            StatusItem::File(f) => f.status,
            StatusItem::Frontmatter(fm) => fm.status,
            StatusItem::Unit(u) => u.status,
        }
    }

    pub fn display_status(&self) -> DisplayStatus {
        match self {
            StatusItem::Directory(d) => d.display,
            StatusItem::File(f) => f.display,
            StatusItem::Frontmatter(fm) => fm.display_status(),
            StatusItem::Unit(u) => u.display_status(),
        }
    }

    pub fn is_translating(&self) -> bool {
        match self {
            StatusItem::Directory(d) => d.is_translating,
            StatusItem::File(f) => f.is_translating,
            StatusItem::Frontmatter(fm) => fm.is_translating,
            StatusItem::Unit(u) => u.is_translating,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            StatusItem::Directory(d) => d.error_message.as_deref(),
            StatusItem::File(f) => f.error_message.as_deref(),
            StatusItem::Frontmatter(fm) => fm.error_message.as_deref(),
            StatusItem::Unit(u) => u.error_message.as_deref(),
        }
    }

    /// Path of the file or directory this node belongs to
    pub fn path(&self) -> &str {
        match self {
            StatusItem::Directory(d) => &d.path,
            StatusItem::File(f) => &f.path,
            StatusItem::Frontmatter(fm) => &fm.file_path,
            StatusItem::Unit(u) => &u.file_path,
        }
    }
}

/// Directory part of a relative path; `""` for top-level entries
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::hash_text;

    fn unit(text: &str, state: UnitState) -> UnitStatus {
        UnitStatus::from_state(hash_text(text), &state)
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("docs/guide/intro.md"), "docs/guide");
        assert_eq!(parent_dir("docs/intro.md"), "docs");
        assert_eq!(parent_dir("intro.md"), "");
    }

    #[test]
    fn test_file_rollup_error_wins() {
        let mut status = FileStatus::new("docs/a.md");
        status.units = vec![
            unit("a", UnitState::Translated),
            unit(
                "b",
                UnitState::Error {
                    message: "timeout".into(),
                },
            ),
            unit("c", UnitState::NeedsTranslation),
        ];
        let file = FileItem::from_status(status);
        assert_eq!(file.status, Status::Error);
        assert_eq!(file.display, DisplayStatus::Error);
        assert_eq!(file.units[1].error_message.as_deref(), Some("timeout"));
        assert_eq!(file.directory_path, "docs");
    }

    #[test]
    fn test_file_rollup_review_is_distinct() {
        let mut status = FileStatus::new("a.md");
        status.units = vec![
            unit("a", UnitState::Translated),
            unit("b", UnitState::NeedsReview),
        ];
        assert_eq!(FileItem::from_status(status).status, Status::NeedsReview);
    }

    #[test]
    fn test_empty_units_only_roll_up_as_empty() {
        let mut status = FileStatus::new("a.md");
        status.units = vec![unit("", UnitState::Empty), unit(" ", UnitState::Empty)];
        assert_eq!(FileItem::from_status(status).status, Status::Empty);

        let mut status = FileStatus::new("b.md");
        status.units = vec![unit("", UnitState::Empty), unit("x", UnitState::Translated)];
        assert_eq!(FileItem::from_status(status).status, Status::Translated);
    }

    #[test]
    fn test_failed_file_is_error() {
        let file = FileItem::from_status(FileStatus::failed("a.md", "unreadable"));
        assert_eq!(file.status, Status::Error);
        assert!(file.units.is_empty());
    }

    #[test]
    fn test_translating_unit_raises_display_only() {
        let mut status = FileStatus::new("a.md");
        status.units = vec![unit("a", UnitState::NeedsTranslation)];
        let mut file = FileItem::from_status(status);

        file.units[0].is_translating = true;
        assert!(file.recompute());
        assert_eq!(file.status, Status::NeedsTranslation);
        assert_eq!(file.display, DisplayStatus::Translating);
        assert!(!file.recompute());
    }
}
