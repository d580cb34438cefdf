//! Change notification

use crate::item::StatusItem;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One notification per mutating call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEvent {
    /// Bumped by every whole-tree replacement. Node snapshots taken under an
    /// older generation may refer to nodes that no longer exist.
    pub generation: u64,
    /// Highest node whose state changed, or `None` when the whole tree changed
    pub node: Option<StatusItem>,
}

impl TreeEvent {
    pub fn is_whole_tree(&self) -> bool {
        self.node.is_none()
    }
}

pub type Listener = Arc<dyn Fn(&TreeEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Subscriber registry
#[derive(Default)]
pub(crate) struct Listeners {
    entries: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Deliver an event. The registry lock is not held while listeners run, so
    /// a listener may subscribe, unsubscribe or read the tree.
    pub(crate) fn emit(&self, event: &TreeEvent) {
        let snapshot: Vec<Listener> = self
            .entries
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }
}
