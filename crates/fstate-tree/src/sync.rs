#![forbid(unsafe_code)]

//! Parent/child checked-state synchronization.
//!
//! Each node gets three listeners on its `checked` cell, in this order:
//!
//! 1. **Cascade**: an explicit write (user toggle or an ancestor's cascade)
//!    copies the value to every child, which cascade in turn. Skipped while
//!    the node's `blocked` flag is set.
//! 2. **Derive**: after a child changes, its parent becomes checked when all
//!    of its children are checked, and unchecked when it was checked but a
//!    child no longer is. The write is made with the parent's `blocked` flag
//!    set so the parent does not cascade its derived value back down.
//!    Skipped while the parent itself is cascading.
//! 3. **Flush**: schedule one microtask that writes the selected paths back
//!    into the selection. Any number of changes before the next drain
//!    produce a single write.
//!
//! Build-time seeding happens before the listeners are attached and never
//! triggers a flush.

use crate::tree::{FacetTree, NodeId};
use fstate_core::{FilterData, SelectedFilter, SelectionKey};
use fstate_runtime::{MicrotaskQueue, Observable, Subscription};
use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Where a tree writes its serialized selection.
#[derive(Clone)]
pub struct SelectionTarget {
    pub key: SelectionKey,
    pub selected: Observable<Rc<Vec<SelectedFilter>>>,
    pub microtasks: MicrotaskQueue,
}

impl fmt::Debug for SelectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionTarget")
            .field("key", &self.key)
            .field("microtasks", &self.microtasks)
            .finish_non_exhaustive()
    }
}

struct FlushState {
    target: SelectionTarget,
    pending: Cell<bool>,
    cancelled: Cell<bool>,
    writes: Cell<u64>,
}

/// Keeps a tree's checked cells consistent and mirrors them into the
/// selection. Dropping it detaches every listener.
pub struct CheckedSync {
    tree: Rc<FacetTree>,
    flush: Rc<FlushState>,
    _subscriptions: Vec<Subscription>,
}

impl fmt::Debug for CheckedSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckedSync")
            .field("tree", &self.tree)
            .field("pending", &self.flush.pending.get())
            .field("writes", &self.flush.writes.get())
            .finish()
    }
}

impl CheckedSync {
    /// Attach the listeners to every node of `tree`.
    #[must_use]
    pub fn attach(tree: Rc<FacetTree>, target: SelectionTarget) -> Self {
        let flush = Rc::new(FlushState {
            target,
            pending: Cell::new(false),
            cancelled: Cell::new(false),
            writes: Cell::new(0),
        });
        let mut subscriptions = Vec::with_capacity(tree.len() * 3);

        for (id, node) in tree.iter() {
            let cell = node.checked.clone();

            let weak = Rc::downgrade(&tree);
            subscriptions.push(cell.subscribe(move |&checked| {
                if let Some(tree) = weak.upgrade() {
                    cascade(&tree, id, checked);
                }
            }));

            let weak = Rc::downgrade(&tree);
            subscriptions.push(cell.subscribe(move |_| {
                if let Some(tree) = weak.upgrade() {
                    derive_parent(&tree, id);
                }
            }));

            let weak_tree = Rc::downgrade(&tree);
            let weak_flush = Rc::downgrade(&flush);
            subscriptions.push(cell.subscribe(move |_| {
                schedule_flush(&weak_tree, &weak_flush);
            }));
        }

        tracing::trace!(field = tree.field(), nodes = tree.len(), "checked sync attached");
        Self {
            tree,
            flush,
            _subscriptions: subscriptions,
        }
    }

    /// The synchronized tree.
    #[must_use]
    pub fn tree(&self) -> &Rc<FacetTree> {
        &self.tree
    }

    /// Whether a flush is waiting for the next drain.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.flush.pending.get()
    }

    /// Schedule a write of the tree's current selected paths, as if a node
    /// had just changed.
    pub fn request_flush(&self) {
        schedule_flush(&Rc::downgrade(&self.tree), &Rc::downgrade(&self.flush));
    }

    /// Discard a scheduled flush. The tree is about to be replaced and its
    /// pending state has been carried over or superseded.
    pub fn cancel_pending(&self) {
        if self.flush.pending.get() {
            self.flush.cancelled.set(true);
        }
    }

    /// Number of flushes that changed the selection.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.flush.writes.get()
    }
}

fn cascade(tree: &FacetTree, id: NodeId, checked: bool) {
    let node = tree.node(id);
    if node.blocked.get() || node.is_leaf() {
        return;
    }
    node.cascading.set(true);
    for &child in node.children() {
        tree.node(child).checked.set(checked);
    }
    node.cascading.set(false);
}

fn derive_parent(tree: &FacetTree, id: NodeId) {
    let Some(parent_id) = tree.node(id).parent() else {
        return;
    };
    let parent = tree.node(parent_id);
    if parent.cascading.get() {
        return;
    }
    let all_checked = parent
        .children()
        .iter()
        .all(|&child| tree.node(child).is_checked());
    let derived = if all_checked {
        true
    } else if parent.is_checked() {
        false
    } else {
        return;
    };

    parent.blocked.set(true);
    parent.checked.set(derived);
    parent.blocked.set(false);
}

fn schedule_flush(tree: &Weak<FacetTree>, flush: &Weak<FlushState>) {
    let (Some(tree), Some(state)) = (tree.upgrade(), flush.upgrade()) else {
        return;
    };
    if state.pending.replace(true) {
        return;
    }
    // The task owns the tree so a change made just before a rebuild still
    // reaches the selection.
    let queue = state.target.microtasks.clone();
    queue.schedule(move || {
        state.pending.set(false);
        if state.cancelled.replace(false) {
            return;
        }
        if write_selection(&tree, &state.target) {
            state.writes.set(state.writes.get() + 1);
        }
    });
}

/// Replace the target's selection with the tree's selected paths. An empty
/// set removes the selection. Returns whether the selection changed.
fn write_selection(tree: &FacetTree, target: &SelectionTarget) -> bool {
    let paths = tree.selected_paths();
    let mut next = target.selected.with(|current| Vec::clone(current));
    let position = next.iter().position(|f| f.key() == target.key);

    match (position, paths.is_empty()) {
        (Some(index), true) => {
            next.remove(index);
        }
        (Some(index), false) => next[index].data = FilterData::List(paths),
        (None, true) => return false,
        (None, false) => next.push(SelectedFilter::new(
            target.key.field.clone(),
            target.key.op,
            FilterData::List(paths),
        )),
    }

    let changed = target.selected.set(Rc::new(next));
    if changed {
        tracing::debug!(key = %target.key, "tree selection written");
    }
    changed
}
