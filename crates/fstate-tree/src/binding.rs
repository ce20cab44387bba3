#![forbid(unsafe_code)]

//! Keeps one hierarchical facet's tree in step with a session.
//!
//! The tree is rebuilt from scratch on every cache write, seeded from the
//! session's current selection and stored expand choices. Checked changes
//! that have not been flushed yet are carried into the new tree. Checked
//! changes flow back into the selection through [`CheckedSync`]; user expand
//! toggles are stored in the session so they survive rebuilds and history
//! navigation.
//!
//! The selection stays authoritative: when the bound key's selection changes
//! from outside the tree (clearing filters, history restore), the tree is
//! rebuilt from it and any unflushed toggle is dropped.

use crate::expand::ExpandSource;
use crate::sync::{CheckedSync, SelectionTarget};
use crate::tree::{FacetTree, TreeBuilder};
use fstate_core::{
    FacetKey, FacetKind, FacetValue, FilterOp, LocalFilterCache, SelectedFilter, SelectionKey,
};
use fstate_runtime::{ReconcilerSession, Subscription};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

struct BoundTree {
    tree: Rc<FacetTree>,
    sync: CheckedSync,
    _expand: Vec<Subscription>,
}

struct BindingState {
    key: FacetKey,
    session: ReconcilerSession,
    current: RefCell<Option<BoundTree>>,
    /// The bound key's selection as of the last sync.
    last_seen: RefCell<Vec<FacetValue>>,
    rebuilds: Cell<u64>,
}

impl BindingState {
    fn selection_key(&self) -> SelectionKey {
        self.key.selection_key()
    }

    fn selected_values(&self, selected: &[SelectedFilter]) -> Vec<FacetValue> {
        let selection_key = self.selection_key();
        selected
            .iter()
            .find(|f| f.key() == selection_key)
            .and_then(|f| f.data.as_list())
            .map(<[FacetValue]>::to_vec)
            .unwrap_or_default()
    }

    /// Rebuild after a cache write, keeping unflushed toggles.
    fn rebuild(&self, cache: &LocalFilterCache) {
        let carried = self.current.borrow().as_ref().and_then(|bound| {
            bound.sync.is_pending().then(|| {
                bound.sync.cancel_pending();
                bound.tree.selected_paths()
            })
        });
        let selected = self.selected_values(&self.session.selected());
        let seed = carried.as_deref().unwrap_or(&selected);
        self.replace(cache, seed, carried.is_some());
        self.last_seen.replace(selected);
    }

    /// Follow a selection change made outside the tree.
    fn resync(&self, selected: &[SelectedFilter]) {
        let values = self.selected_values(selected);
        if *self.last_seen.borrow() == values {
            return;
        }
        let in_sync = self
            .current
            .borrow()
            .as_ref()
            .is_none_or(|bound| bound.tree.selected_paths() == values);
        if !in_sync {
            if let Some(bound) = self.current.borrow().as_ref() {
                bound.sync.cancel_pending();
            }
            tracing::debug!(key = %self.key, "selection changed outside the tree, rebuilding");
            self.replace(&self.session.cache(), &values, false);
        }
        self.last_seen.replace(values);
    }

    fn replace(&self, cache: &LocalFilterCache, seed: &[FacetValue], flush: bool) {
        let next = cache.get(&self.key).and_then(|facet| {
            let expanded = self.session.expanded();
            match TreeBuilder::new(facet)
                .with_selection(seed)
                .with_expanded(&expanded)
                .build()
            {
                Ok(tree) => Some(self.bind(Rc::new(tree))),
                Err(e) => {
                    tracing::warn!(error = %e, "tree build failed");
                    None
                }
            }
        });
        if let Some(bound) = next.as_ref().filter(|_| flush) {
            bound.sync.request_flush();
        }

        self.rebuilds.set(self.rebuilds.get() + 1);
        tracing::trace!(
            key = %self.key,
            cache_revision = cache.revision(),
            present = next.is_some(),
            carried = flush,
            "tree rebuilt"
        );
        // Swap first, drop the old tree after the borrow is released.
        let previous = self.current.replace(next);
        drop(previous);
    }

    fn bind(&self, tree: Rc<FacetTree>) -> BoundTree {
        let sync = CheckedSync::attach(
            Rc::clone(&tree),
            SelectionTarget {
                key: self.selection_key(),
                selected: self.session.selected_signal(),
                microtasks: self.session.microtasks(),
            },
        );

        let expand = tree
            .iter()
            .map(|(_, node)| {
                let session = self.session.clone();
                let field = tree.field().to_owned();
                let path = node.path().to_vec();
                node.expanded_signal().subscribe(move |state| {
                    if state.source == ExpandSource::User {
                        session.set_expanded(&field, &path, state.expanded);
                    }
                })
            })
            .collect();

        BoundTree {
            tree,
            sync,
            _expand: expand,
        }
    }
}

/// A hierarchical facet tree bound to a [`ReconcilerSession`].
pub struct TreeBinding {
    state: Rc<BindingState>,
    _subscriptions: [Subscription; 2],
}

impl fmt::Debug for TreeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeBinding")
            .field("key", &self.state.key)
            .field("rebuilds", &self.state.rebuilds.get())
            .field("tree", &self.tree())
            .finish()
    }
}

impl TreeBinding {
    /// Bind the `checkbox-hierarchical` facet `(field, op)` of `session`.
    #[must_use]
    pub fn new(session: &ReconcilerSession, field: impl Into<String>, op: FilterOp) -> Self {
        let state = Rc::new(BindingState {
            key: FacetKey {
                field: field.into(),
                op,
                kind: FacetKind::CheckboxHierarchical,
            },
            session: session.clone(),
            current: RefCell::new(None),
            last_seen: RefCell::new(Vec::new()),
            rebuilds: Cell::new(0),
        });
        state.rebuild(&session.cache());

        let weak: Weak<BindingState> = Rc::downgrade(&state);
        let cache = session.cache_signal().subscribe(move |cache| {
            if let Some(state) = weak.upgrade() {
                state.rebuild(cache);
            }
        });
        let weak: Weak<BindingState> = Rc::downgrade(&state);
        let selected = session.selected_signal().subscribe(move |selected| {
            if let Some(state) = weak.upgrade() {
                state.resync(selected);
            }
        });

        Self {
            state,
            _subscriptions: [cache, selected],
        }
    }

    /// The current tree, if the facet is in the cache.
    #[must_use]
    pub fn tree(&self) -> Option<Rc<FacetTree>> {
        self.state
            .current
            .borrow()
            .as_ref()
            .map(|bound| Rc::clone(&bound.tree))
    }

    /// Number of builds so far, including the initial one.
    #[must_use]
    pub fn rebuilds(&self) -> u64 {
        self.state.rebuilds.get()
    }

    /// Identity of the bound facet.
    #[must_use]
    pub fn key(&self) -> &FacetKey {
        &self.state.key
    }

    /// Check or uncheck the node at `path`. Returns `false` when no such
    /// node exists or nothing changed.
    pub fn set_checked(&self, path: &[String], checked: bool) -> bool {
        let Some(tree) = self.tree() else { return false };
        tree.find(path)
            .is_some_and(|id| tree.set_checked(id, checked))
    }

    /// Expand or collapse the node at `path`.
    pub fn set_expanded(&self, path: &[String], expanded: bool) -> bool {
        let Some(tree) = self.tree() else { return false };
        tree.find(path)
            .is_some_and(|id| tree.set_expanded(id, expanded))
    }
}
