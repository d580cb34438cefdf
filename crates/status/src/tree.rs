//! Hierarchical status index with bottom-up rollups
//!
//! All nodes are owned by one [`TreeState`] behind a single `RwLock`. Every
//! mutator takes the write lock once, applies its change, recomputes the
//! rollups of the affected file and its ancestor directories, releases the
//! lock and only then notifies listeners. Readers therefore observe either the
//! state before a mutation or the state after it.

use crate::event::{Listener, ListenerId, Listeners, TreeEvent};
use crate::item::{parent_dir, DirectoryItem, FileItem, FileStatus, StatusItem};
use crate::patch::{FileDirectoryPatch, UnitPatch};
use crate::status::{DisplayStatus, Status};
use crate::{Result, TreeError};
use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;
use tandem_core::ContentHash;
use tracing::{debug, info};

/// Position of a unit-like node inside its file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSlot {
    Frontmatter,
    Unit(usize),
}

/// Where a content hash lives in the tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitLocation {
    pub path: String,
    pub slot: UnitSlot,
}

/// Per-status unit counts for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub counts: BTreeMap<Status, usize>,
    pub translating: usize,
    pub total: usize,
}

impl FileSummary {
    pub fn count(&self, status: Status) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

/// Node to report after a mutation
#[derive(Debug, Clone)]
enum Changed {
    Unit(UnitLocation),
    File(String),
    Directory(String),
}

type HashIndex = AHashMap<ContentHash, SmallVec<[UnitLocation; 1]>>;

struct TreeState {
    generation: u64,
    files: AHashMap<String, FileItem>,
    directories: AHashMap<String, DirectoryItem>,
    index: HashIndex,
}

impl TreeState {
    fn new(generation: u64) -> Self {
        let mut directories = AHashMap::new();
        directories.insert(String::new(), DirectoryItem::new(""));
        Self {
            generation,
            files: AHashMap::new(),
            directories,
            index: AHashMap::new(),
        }
    }

    fn insert_file(&mut self, status: FileStatus) -> Changed {
        let file = FileItem::from_status(status);
        let path = file.path.clone();
        let dir = file.directory_path.clone();

        if let Some(old) = self.files.remove(&path) {
            unindex_file(&mut self.index, &old);
        }
        index_file(&mut self.index, &file);
        self.files.insert(path.clone(), file);

        let structural = self.link_file(&path, &dir);
        let rolled = self.propagate(&dir);
        match higher(structural, rolled) {
            Some(dir) => Changed::Directory(dir),
            None => Changed::File(path),
        }
    }

    /// Attach a file to its directory chain, creating missing directories.
    /// Returns the highest directory whose child set changed.
    fn link_file(&mut self, path: &str, dir: &str) -> Option<String> {
        let mut changed = None;
        let entry = self
            .directories
            .entry(dir.to_string())
            .or_insert_with(|| DirectoryItem::new(dir));
        if entry.files.insert(path.to_string()) {
            changed = Some(dir.to_string());
        }

        let mut child = dir.to_string();
        while !child.is_empty() {
            let parent = parent_dir(&child).to_string();
            let entry = self
                .directories
                .entry(parent.clone())
                .or_insert_with(|| DirectoryItem::new(&parent));
            if entry.directories.insert(child) {
                changed = Some(parent.clone());
            }
            child = parent;
        }
        changed
    }

    fn remove_file(&mut self, path: &str) -> Result<Changed> {
        let file = self
            .files
            .remove(path)
            .ok_or_else(|| TreeError::FileNotFound(path.to_string()))?;
        unindex_file(&mut self.index, &file);

        let mut current = file.directory_path;
        if let Some(dir) = self.directories.get_mut(&current) {
            dir.files.remove(path);
        }

        // Drop directories left without children; the root always stays.
        while !current.is_empty() {
            let empty = self
                .directories
                .get(&current)
                .is_some_and(|dir| !dir.has_children());
            if !empty {
                break;
            }
            self.directories.remove(&current);
            let parent = parent_dir(&current).to_string();
            if let Some(dir) = self.directories.get_mut(&parent) {
                dir.directories.remove(&current);
            }
            current = parent;
        }

        let rolled = self.propagate(&current);
        Ok(Changed::Directory(
            higher(Some(current), rolled).unwrap_or_default(),
        ))
    }

    fn update_unit(&mut self, path: &str, hash: &ContentHash, patch: &UnitPatch) -> Result<Changed> {
        let file = self
            .files
            .get(path)
            .ok_or_else(|| TreeError::FileNotFound(path.to_string()))?;

        let slot = if file.frontmatter.as_ref().is_some_and(|fm| fm.hash == *hash) {
            UnitSlot::Frontmatter
        } else {
            file.units
                .iter()
                .position(|unit| unit.hash == *hash)
                .map(UnitSlot::Unit)
                .ok_or_else(|| TreeError::UnitNotFound {
                    path: path.to_string(),
                    hash: *hash,
                })?
        };
        self.update_slot(path, slot, patch)
    }

    fn update_slot(&mut self, path: &str, slot: UnitSlot, patch: &UnitPatch) -> Result<Changed> {
        let file = self
            .files
            .get_mut(path)
            .ok_or_else(|| TreeError::FileNotFound(path.to_string()))?;

        let hash = match (slot, file.frontmatter.as_mut()) {
            (UnitSlot::Frontmatter, Some(fm)) => {
                let hash = fm.hash;
                patch.apply_to_frontmatter(fm);
                hash
            }
            (UnitSlot::Unit(index), _) if index < file.units.len() => {
                let unit = &mut file.units[index];
                let hash = unit.hash;
                patch.apply_to_unit(unit);
                hash
            }
            _ => {
                return Err(TreeError::SlotNotFound {
                    path: path.to_string(),
                    slot,
                })
            }
        };
        let file_changed = file.recompute();
        let dir = file.directory_path.clone();

        let location = UnitLocation {
            path: path.to_string(),
            slot,
        };
        if let Some(new_hash) = patch.hash.filter(|new_hash| *new_hash != hash) {
            unindex_location(&mut self.index, &hash, &location);
            self.index.entry(new_hash).or_default().push(location.clone());
        }

        let rolled = if file_changed { self.propagate(&dir) } else { None };
        Ok(match rolled {
            Some(dir) => Changed::Directory(dir),
            None if file_changed => Changed::File(path.to_string()),
            None => Changed::Unit(location),
        })
    }

    fn update_file(&mut self, path: &str, patch: &FileDirectoryPatch) -> Result<Changed> {
        let file = self
            .files
            .get_mut(path)
            .ok_or_else(|| TreeError::FileNotFound(path.to_string()))?;
        patch.apply_to_file(file);
        let changed = file.recompute();
        let dir = file.directory_path.clone();

        let rolled = if changed { self.propagate(&dir) } else { None };
        Ok(match rolled {
            Some(dir) => Changed::Directory(dir),
            None => Changed::File(path.to_string()),
        })
    }

    fn update_directory(&mut self, path: &str, patch: &FileDirectoryPatch) -> Result<Changed> {
        let dir = self
            .directories
            .get_mut(path)
            .ok_or_else(|| TreeError::DirectoryNotFound(path.to_string()))?;
        patch.apply_to_directory(dir);
        Ok(Changed::Directory(
            self.propagate(path).unwrap_or_else(|| path.to_string()),
        ))
    }

    /// Recompute `start` and every ancestor up to the root. Returns the
    /// highest directory whose rollup changed.
    fn propagate(&mut self, start: &str) -> Option<String> {
        let mut dir = start.to_string();
        let mut highest = None;
        loop {
            if self.recompute_directory(&dir) {
                highest = Some(dir.clone());
            }
            if dir.is_empty() {
                break;
            }
            dir = parent_dir(&dir).to_string();
        }
        highest
    }

    fn recompute_directory(&mut self, path: &str) -> bool {
        let Some(dir) = self.directories.get(path) else {
            return false;
        };

        let mut status = Status::Empty;
        let mut display = DisplayStatus::Empty;
        let files = dir
            .files
            .iter()
            .filter_map(|p| self.files.get(p))
            .map(|f| (f.status, f.display));
        let subdirs = dir
            .directories
            .iter()
            .filter_map(|p| self.directories.get(p))
            .map(|d| (d.status, d.display));
        for (child_status, child_display) in files.chain(subdirs) {
            status = status.max(child_status);
            display = display.max(child_display);
        }
        if dir.error_message.is_some() {
            status = Status::Error;
        }
        display = display.max(DisplayStatus::of(status, dir.is_translating));

        match self.directories.get_mut(path) {
            Some(dir) => {
                let changed = (dir.status, dir.display) != (status, display);
                dir.status = status;
                dir.display = display;
                changed
            }
            None => false,
        }
    }

    fn unit_item(&self, location: &UnitLocation) -> Option<StatusItem> {
        let file = self.files.get(&location.path)?;
        match location.slot {
            UnitSlot::Frontmatter => file.frontmatter.clone().map(StatusItem::Frontmatter),
            UnitSlot::Unit(index) => file.units.get(index).cloned().map(StatusItem::Unit),
        }
    }

    fn snapshot(&self, changed: &Changed) -> Option<StatusItem> {
        match changed {
            Changed::Unit(location) => self.unit_item(location),
            Changed::File(path) => self.files.get(path).cloned().map(StatusItem::File),
            Changed::Directory(path) => self
                .directories
                .get(path)
                .cloned()
                .map(StatusItem::Directory),
        }
    }
}

fn depth(dir: &str) -> usize {
    if dir.is_empty() {
        0
    } else {
        dir.matches('/').count() + 1
    }
}

/// The higher of two directories on the same ancestor chain
fn higher(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if depth(&a) <= depth(&b) { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn index_file(index: &mut HashIndex, file: &FileItem) {
    if let Some(fm) = &file.frontmatter {
        index.entry(fm.hash).or_default().push(UnitLocation {
            path: file.path.clone(),
            slot: UnitSlot::Frontmatter,
        });
    }
    for unit in &file.units {
        index.entry(unit.hash).or_default().push(UnitLocation {
            path: file.path.clone(),
            slot: UnitSlot::Unit(unit.index),
        });
    }
}

fn unindex_file(index: &mut HashIndex, file: &FileItem) {
    let hashes = file
        .frontmatter
        .iter()
        .map(|fm| fm.hash)
        .chain(file.units.iter().map(|u| u.hash));
    for hash in hashes {
        if let Some(locations) = index.get_mut(&hash) {
            locations.retain(|loc| loc.path != file.path);
            if locations.is_empty() {
                index.remove(&hash);
            }
        }
    }
}

fn unindex_location(index: &mut HashIndex, hash: &ContentHash, location: &UnitLocation) {
    if let Some(locations) = index.get_mut(hash) {
        locations.retain(|loc| loc != location);
        if locations.is_empty() {
            index.remove(hash);
        }
    }
}

/// Directory → file → {frontmatter, units} status index
pub struct StatusTree {
    state: RwLock<TreeState>,
    listeners: Listeners,
}

impl Default for StatusTree {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTree {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TreeState::new(0)),
            listeners: Listeners::default(),
        }
    }

    /// Replace the whole tree. Safe to call repeatedly; node snapshots taken
    /// before the call are stale afterwards.
    pub fn rebuild(&self, files: Vec<FileStatus>) {
        let count = files.len();
        let generation = {
            let mut state = self.state.write();
            let mut fresh = TreeState::new(state.generation + 1);
            for file in files {
                fresh.insert_file(file);
            }
            *state = fresh;
            state.generation
        };
        info!(files = count, generation, "rebuilt status tree");
        self.listeners.emit(&TreeEvent {
            generation,
            node: None,
        });
    }

    /// Replace one file node and its children from a fresh snapshot
    pub fn add_or_update_file(&self, file: FileStatus) {
        let event = {
            let mut state = self.state.write();
            debug!(file = %file.path, units = file.units.len(), "updating file node");
            let changed = state.insert_file(file);
            TreeEvent {
                generation: state.generation,
                node: state.snapshot(&changed),
            }
        };
        self.listeners.emit(&event);
    }

    /// Drop a file that no longer exists
    pub fn remove_file(&self, path: &str) -> Result<()> {
        self.mutate(|state| state.remove_file(path))
    }

    /// Merge `patch` onto the unit (or frontmatter) with `hash` in `path`.
    /// When several units share the hash, the first in document order wins.
    pub fn update_unit(&self, path: &str, hash: &ContentHash, patch: UnitPatch) -> Result<()> {
        self.mutate(|state| state.update_unit(path, hash, &patch))
    }

    /// Merge `patch` onto the node at `slot`, regardless of its hash
    pub fn update_unit_at(&self, path: &str, slot: UnitSlot, patch: UnitPatch) -> Result<()> {
        self.mutate(|state| state.update_slot(path, slot, &patch))
    }

    pub fn update_file_partial(&self, path: &str, patch: FileDirectoryPatch) -> Result<()> {
        self.mutate(|state| state.update_file(path, &patch))
    }

    pub fn update_directory_partial(&self, path: &str, patch: FileDirectoryPatch) -> Result<()> {
        self.mutate(|state| state.update_directory(path, &patch))
    }

    fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut TreeState) -> Result<Changed>,
    {
        let event = {
            let mut state = self.state.write();
            let changed = f(&mut state)?;
            TreeEvent {
                generation: state.generation,
                node: state.snapshot(&changed),
            }
        };
        self.listeners.emit(&event);
        Ok(())
    }

    /// First node anywhere in the tree carrying `hash`
    pub fn get_unit_by_hash(&self, hash: &ContentHash) -> Option<StatusItem> {
        let state = self.state.read();
        let location = state.index.get(hash)?.first()?;
        state.unit_item(location)
    }

    /// Node carrying `hash`, preferring one in `preferred_path`
    pub fn get_unit(&self, hash: &ContentHash, preferred_path: Option<&str>) -> Option<StatusItem> {
        let state = self.state.read();
        let locations = state.index.get(hash)?;
        let location = preferred_path
            .and_then(|path| locations.iter().find(|loc| loc.path == path))
            .or_else(|| locations.first())?;
        state.unit_item(location)
    }

    /// Every location of `hash`
    pub fn locate(&self, hash: &ContentHash) -> Vec<UnitLocation> {
        self.state
            .read()
            .index
            .get(hash)
            .map(|locations| locations.to_vec())
            .unwrap_or_default()
    }

    pub fn get_file(&self, path: &str) -> Option<FileItem> {
        self.state.read().files.get(path).cloned()
    }

    pub fn get_directory(&self, path: &str) -> Option<DirectoryItem> {
        self.state.read().directories.get(path).cloned()
    }

    /// Display children of a directory (subdirectories, then files) or of a
    /// file (frontmatter, then units). `Empty` nodes are left out.
    pub fn children(&self, path: &str) -> Result<Vec<StatusItem>> {
        let state = self.state.read();

        if let Some(dir) = state.directories.get(path) {
            let subdirs = dir
                .directories
                .iter()
                .filter_map(|p| state.directories.get(p))
                .filter(|d| d.display != DisplayStatus::Empty)
                .cloned()
                .map(StatusItem::Directory);
            let files = dir
                .files
                .iter()
                .filter_map(|p| state.files.get(p))
                .filter(|f| f.display != DisplayStatus::Empty)
                .cloned()
                .map(StatusItem::File);
            return Ok(subdirs.chain(files).collect());
        }

        if let Some(file) = state.files.get(path) {
            let frontmatter = file
                .frontmatter
                .iter()
                .filter(|fm| fm.status != Status::Empty)
                .cloned()
                .map(StatusItem::Frontmatter);
            let units = file
                .units
                .iter()
                .filter(|u| u.status != Status::Empty)
                .cloned()
                .map(StatusItem::Unit);
            return Ok(frontmatter.chain(units).collect());
        }

        Err(TreeError::DirectoryNotFound(path.to_string()))
    }

    pub fn file_summary(&self, path: &str) -> Option<FileSummary> {
        let state = self.state.read();
        let file = state.files.get(path)?;

        let mut summary = FileSummary::default();
        let children = file
            .frontmatter
            .iter()
            .map(|fm| (fm.status, fm.is_translating))
            .chain(file.units.iter().map(|u| (u.status, u.is_translating)));
        for (status, translating) in children {
            *summary.counts.entry(status).or_insert(0) += 1;
            summary.translating += usize::from(translating);
            summary.total += 1;
        }
        Some(summary)
    }

    pub fn file_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.state.read().files.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&TreeEvent) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        self.listeners.add(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Release every node. Listeners stay subscribed and see one whole-tree event.
    pub fn clear(&self) {
        let generation = {
            let mut state = self.state.write();
            *state = TreeState::new(state.generation + 1);
            state.generation
        };
        self.listeners.emit(&TreeEvent {
            generation,
            node: None,
        });
    }

    /// Release every node and every listener
    pub fn dispose(&self) {
        self.listeners.clear();
        let mut state = self.state.write();
        *state = TreeState::new(state.generation + 1);
        debug!("disposed status tree");
    }
}
