#![forbid(unsafe_code)]

//! Category trees built from `checkbox-hierarchical` facets.
//!
//! A hierarchical facet arrives as flat parallel arrays whose values are
//! category paths (`["Shoes", "Boots"]`). [`TreeBuilder`] turns them into an
//! arena of [`HierarchicalNode`]s with one node per distinct path.
//!
//! # Example
//!
//! ```
//! use fstate_core::{Facet, FacetMeta, FacetValue, FilterOp, ValueList};
//! use fstate_tree::TreeBuilder;
//!
//! let facet = Facet::new(
//!     "category",
//!     FilterOp::Any,
//!     FacetMeta::CheckboxHierarchical(ValueList::new([
//!         FacetValue::path(["Shoes"]),
//!         FacetValue::path(["Shoes", "Boots"]),
//!     ])),
//! );
//! let tree = TreeBuilder::new(&facet).build().unwrap();
//! assert_eq!(tree.roots().len(), 1);
//! assert_eq!(tree.node(tree.roots()[0]).children().len(), 1);
//! ```
//!
//! # Invariants
//!
//! 1. Exactly one node exists per distinct path, whatever the input order.
//!    A prefix node created implicitly for an earlier, deeper entry is
//!    corrected in place when its own entry arrives.
//! 2. Children keep the order in which their paths first appear.
//! 3. Checked seeding is consistent: descendants of a selected node are
//!    checked, and a node whose children are all checked is checked.

use crate::expand::ExpandedState;
use fstate_core::{ExpandedPaths, Facet, FacetKey, FacetMeta, FacetValue, FilterOp, SelectionKey};
use fstate_runtime::Observable;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from building a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The facet does not carry hierarchical values.
    NotHierarchical(FacetKey),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::NotHierarchical(key) => write!(f, "facet {key} is not hierarchical"),
        }
    }
}

impl std::error::Error for TreeError {}

// ─────────────────────────────────────────────────────────────────────────────
// Nodes
// ─────────────────────────────────────────────────────────────────────────────

/// Index of a node inside its [`FacetTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    /// Id for an arena position. Only meaningful for a tree with more than
    /// `index` nodes.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Position in the arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One category in a [`FacetTree`].
pub struct HierarchicalNode {
    path: Vec<String>,
    name: String,
    count: Option<u64>,
    explicit: bool,
    pub(crate) checked: Observable<bool>,
    pub(crate) expanded: Observable<ExpandedState>,
    children: Vec<NodeId>,
    child_index: HashMap<String, NodeId>,
    parent: Option<NodeId>,
    /// Set while an upward derivation writes `checked`.
    pub(crate) blocked: Cell<bool>,
    /// Set while this node cascades to its descendants.
    pub(crate) cascading: Cell<bool>,
}

impl fmt::Debug for HierarchicalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HierarchicalNode")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("count", &self.count)
            .field("checked", &self.checked.get())
            .field("expanded", &self.expanded.get())
            .field("children", &self.children.len())
            .finish()
    }
}

impl HierarchicalNode {
    fn new(path: Vec<String>, parent: Option<NodeId>) -> Self {
        let name = path.last().cloned().unwrap_or_default();
        Self {
            path,
            name,
            count: None,
            explicit: false,
            checked: Observable::new(false),
            expanded: Observable::new(ExpandedState::collapsed()),
            children: Vec::new(),
            child_index: HashMap::new(),
            parent,
            blocked: Cell::new(false),
            cascading: Cell::new(false),
        }
    }

    /// Full path, root first.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Last path segment.
    #[must_use]
    pub fn segment(&self) -> &str {
        self.path.last().map_or("", String::as_str)
    }

    /// Display name (the segment when the response carried none).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Result count, when the response carried one for this path.
    #[must_use]
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Whether the response listed this path itself, not only descendants.
    #[must_use]
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Path as a facet value.
    #[must_use]
    pub fn value(&self) -> FacetValue {
        FacetValue::Path(self.path.clone())
    }

    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.checked.get()
    }

    /// The checked cell; writing it is a user toggle.
    #[must_use]
    pub fn checked_signal(&self) -> Observable<bool> {
        self.checked.clone()
    }

    #[must_use]
    pub fn expanded(&self) -> ExpandedState {
        self.expanded.get()
    }

    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expanded.get().expanded
    }

    #[must_use]
    pub fn expanded_signal(&self) -> Observable<ExpandedState> {
        self.expanded.clone()
    }

    /// Children in first-appearance order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Nesting depth; roots are at 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tree
// ─────────────────────────────────────────────────────────────────────────────

/// Arena of category nodes for one hierarchical facet.
pub struct FacetTree {
    field: String,
    op: FilterOp,
    nodes: Vec<HierarchicalNode>,
    roots: Vec<NodeId>,
    root_index: HashMap<String, NodeId>,
    repaired: usize,
}

impl fmt::Debug for FacetTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetTree")
            .field("field", &self.field)
            .field("op", &self.op)
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots.len())
            .finish()
    }
}

impl FacetTree {
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[must_use]
    pub fn op(&self) -> FilterOp {
        self.op
    }

    /// Key of the selection this tree edits.
    #[must_use]
    pub fn selection_key(&self) -> SelectionKey {
        SelectionKey::new(self.field.clone(), self.op)
    }

    /// Top-level nodes in first-appearance order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Node by id.
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to another tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &HierarchicalNode {
        &self.nodes[id.0]
    }

    /// Node by id, `None` for foreign ids.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&HierarchicalNode> {
        self.nodes.get(id.0)
    }

    /// Look up a node by path.
    #[must_use]
    pub fn find(&self, path: &[String]) -> Option<NodeId> {
        let (first, rest) = path.split_first()?;
        let mut id = *self.root_index.get(first)?;
        for segment in rest {
            id = *self.nodes[id.0].child_index.get(segment)?;
        }
        Some(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Implicit nodes that were corrected in place during the build.
    #[must_use]
    pub fn repaired(&self) -> usize {
        self.repaired
    }

    /// All nodes in arena order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &HierarchicalNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Pre-order traversal from the roots.
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    /// Every descendant of `id`, pre-order, excluding `id`.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next.0].children.iter().rev().copied());
        }
        out
    }

    /// Toggle a node as the user would.
    pub fn set_checked(&self, id: NodeId, checked: bool) -> bool {
        self.nodes[id.0].checked.set(checked)
    }

    /// Expand or collapse a node as the user would.
    pub fn set_expanded(&self, id: NodeId, expanded: bool) -> bool {
        self.nodes[id.0].expanded.set(ExpandedState::user(expanded))
    }

    /// Flip a node's expand state as the user would.
    pub fn toggle_expanded(&self, id: NodeId) -> bool {
        let expanded = !self.nodes[id.0].is_expanded();
        self.set_expanded(id, expanded)
    }

    /// Paths to write back to the selection: checked nodes that are leaves or
    /// have no checked child. Pre-order.
    #[must_use]
    pub fn selected_paths(&self) -> Vec<FacetValue> {
        self.preorder()
            .into_iter()
            .map(|id| &self.nodes[id.0])
            .filter(|node| {
                node.is_checked()
                    && node
                        .children
                        .iter()
                        .all(|child| !self.nodes[child.0].is_checked())
            })
            .map(HierarchicalNode::value)
            .collect()
    }

    /// Nodes that are currently visible: roots, and children of visible
    /// expanded nodes. Pre-order.
    #[must_use]
    pub fn visible(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            let node = &self.nodes[id.0];
            if node.is_expanded() {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a [`FacetTree`] from a hierarchical facet.
#[derive(Debug, Clone)]
pub struct TreeBuilder<'a> {
    facet: &'a Facet,
    selection: &'a [FacetValue],
    expanded: Option<&'a ExpandedPaths>,
}

impl<'a> TreeBuilder<'a> {
    #[must_use]
    pub fn new(facet: &'a Facet) -> Self {
        Self {
            facet,
            selection: &[],
            expanded: None,
        }
    }

    /// Seed checked state from the selected values.
    #[must_use]
    pub fn with_selection(mut self, selection: &'a [FacetValue]) -> Self {
        self.selection = selection;
        self
    }

    /// Seed expand state from stored choices.
    #[must_use]
    pub fn with_expanded(mut self, expanded: &'a ExpandedPaths) -> Self {
        self.expanded = Some(expanded);
        self
    }

    /// Build the tree.
    pub fn build(self) -> Result<FacetTree, TreeError> {
        let FacetMeta::CheckboxHierarchical(list) = &self.facet.meta else {
            return Err(TreeError::NotHierarchical(self.facet.key()));
        };

        let mut tree = FacetTree {
            field: self.facet.field.clone(),
            op: self.facet.op,
            nodes: Vec::with_capacity(list.len()),
            roots: Vec::new(),
            root_index: HashMap::new(),
            repaired: 0,
        };

        for entry in list.entries() {
            let segments = entry.value.segments();
            if segments.is_empty() {
                tracing::debug!(field = %tree.field, "skipping empty category path");
                continue;
            }
            let (id, created) = insert_path(&mut tree, &segments);
            let node = &mut tree.nodes[id.0];
            if node.explicit {
                tracing::debug!(field = %tree.field, path = ?segments, "duplicate category path, keeping first");
                continue;
            }
            if !created {
                tree.repaired += 1;
                tracing::trace!(field = %tree.field, path = ?segments, "corrected implicit category node");
            }
            node.explicit = true;
            if let Some(name) = entry.name {
                node.name = name;
            }
            node.count = entry.count;
        }

        seed_checked(&tree, self.selection);
        seed_expanded(&tree, self.expanded);
        Ok(tree)
    }
}

/// Walk `segments`, creating missing nodes. Returns the terminal node and
/// whether it was created by this walk.
fn insert_path(tree: &mut FacetTree, segments: &[String]) -> (NodeId, bool) {
    let mut parent: Option<NodeId> = None;
    let mut created = false;
    for (depth, segment) in segments.iter().enumerate() {
        let existing = match parent {
            None => tree.root_index.get(segment).copied(),
            Some(p) => tree.nodes[p.0].child_index.get(segment).copied(),
        };
        let id = match existing {
            Some(id) => {
                created = false;
                id
            }
            None => {
                let id = NodeId(tree.nodes.len());
                tree.nodes
                    .push(HierarchicalNode::new(segments[..=depth].to_vec(), parent));
                match parent {
                    None => {
                        tree.roots.push(id);
                        tree.root_index.insert(segment.clone(), id);
                    }
                    Some(p) => {
                        let parent_node = &mut tree.nodes[p.0];
                        parent_node.children.push(id);
                        parent_node.child_index.insert(segment.clone(), id);
                    }
                }
                created = true;
                id
            }
        };
        parent = Some(id);
    }
    // `segments` is non-empty, so the loop ran at least once.
    (parent.unwrap_or(NodeId(0)), created)
}

fn seed_checked(tree: &FacetTree, selection: &[FacetValue]) {
    if selection.is_empty() || tree.nodes.is_empty() {
        return;
    }
    let selected: HashSet<Vec<String>> = selection.iter().map(FacetValue::segments).collect();
    let mut checked = vec![false; tree.nodes.len()];

    // Parents precede children in the arena, so one forward pass pushes
    // selection down.
    for (i, node) in tree.nodes.iter().enumerate() {
        let parent_checked = node.parent.is_some_and(|p| checked[p.0]);
        checked[i] = parent_checked || selected.contains(&node.path);
    }
    // One backward pass lifts fully checked child sets up.
    for i in (0..tree.nodes.len()).rev() {
        let node = &tree.nodes[i];
        if !node.children.is_empty() && node.children.iter().all(|c| checked[c.0]) {
            checked[i] = true;
        }
    }

    for (node, value) in tree.nodes.iter().zip(checked) {
        node.checked.set(value);
    }
}

fn seed_expanded(tree: &FacetTree, stored: Option<&ExpandedPaths>) {
    // Auto-expand: the only node of a level expands, as long as every
    // ancestor did too.
    let mut level: &[NodeId] = &tree.roots;
    while let [only] = level {
        tree.nodes[only.0].expanded.set(ExpandedState::auto());
        level = &tree.nodes[only.0].children;
    }

    if let Some(stored) = stored {
        for node in &tree.nodes {
            if let Some(expanded) = stored.get(&tree.field, &node.path) {
                let state = node.expanded.get().or(ExpandedState::persisted(expanded));
                node.expanded.set(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::ExpandSource;
    use fstate_core::ValueList;
    use pretty_assertions::assert_eq;

    fn p(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| (*s).to_owned()).collect()
    }

    fn facet(paths: &[&[&str]]) -> Facet {
        Facet::new(
            "category",
            FilterOp::Any,
            FacetMeta::CheckboxHierarchical(ValueList::new(
                paths.iter().map(|segments| FacetValue::path(segments.iter().copied())),
            )),
        )
    }

    #[test]
    fn rejects_flat_facets() {
        let flat = Facet::new("color", FilterOp::Any, FacetMeta::Checkbox(ValueList::new(["red"])));
        assert!(matches!(
            TreeBuilder::new(&flat).build(),
            Err(TreeError::NotHierarchical(_))
        ));
    }

    #[test]
    fn attaches_names_and_counts_to_terminal_nodes() {
        let f = Facet::new(
            "category",
            FilterOp::Any,
            FacetMeta::CheckboxHierarchical(
                ValueList::new([FacetValue::path(["Shoes"]), FacetValue::path(["Shoes", "Boots"])])
                    .with_names(["All shoes", "Boots"])
                    .with_counts([12, 4]),
            ),
        );
        let tree = TreeBuilder::new(&f).build().unwrap();
        let shoes = tree.node(tree.find(&p(&["Shoes"])).unwrap());
        let boots = tree.node(tree.find(&p(&["Shoes", "Boots"])).unwrap());
        assert_eq!(shoes.name(), "All shoes");
        assert_eq!(shoes.count(), Some(12));
        assert_eq!(boots.count(), Some(4));
        assert_eq!(boots.depth(), 1);
    }

    #[test]
    fn unsorted_input_yields_one_node_per_path() {
        let f = Facet::new(
            "category",
            FilterOp::Any,
            FacetMeta::CheckboxHierarchical(
                ValueList::new([
                    FacetValue::path(["Shoes", "Boots"]),
                    FacetValue::path(["Shoes"]),
                ])
                .with_names(["Boots", "Shoes"])
                .with_counts([4, 12]),
            ),
        );
        let tree = TreeBuilder::new(&f).build().unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.repaired(), 1);

        let shoes = tree.node(tree.roots()[0]);
        assert!(shoes.is_explicit());
        assert_eq!(shoes.count(), Some(12));
        assert_eq!(shoes.children().len(), 1);
    }

    #[test]
    fn implicit_prefix_without_entry_stays_implicit() {
        let tree = TreeBuilder::new(&facet(&[&["Shoes", "Boots"]])).build().unwrap();
        let shoes = tree.node(tree.roots()[0]);
        assert!(!shoes.is_explicit());
        assert_eq!(shoes.name(), "Shoes");
        assert_eq!(shoes.count(), None);
    }

    #[test]
    fn duplicate_paths_keep_first() {
        let f = Facet::new(
            "category",
            FilterOp::Any,
            FacetMeta::CheckboxHierarchical(
                ValueList::new([FacetValue::path(["Shoes"]), FacetValue::path(["Shoes"])])
                    .with_counts([1, 2]),
            ),
        );
        let tree = TreeBuilder::new(&f).build().unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node(tree.roots()[0]).count(), Some(1));
    }

    #[test]
    fn selection_seeds_descendants_and_full_parents() {
        let f = facet(&[
            &["A"],
            &["A", "x"],
            &["A", "y"],
            &["B"],
            &["B", "x"],
            &["B", "y"],
        ]);
        let selection = [
            FacetValue::path(["A"]),
            FacetValue::path(["B", "x"]),
            FacetValue::path(["B", "y"]),
        ];
        let tree = TreeBuilder::new(&f).with_selection(&selection).build().unwrap();
        let checked: [&[&str]; 5] = [&["A"], &["A", "x"], &["A", "y"], &["B"], &["B", "x"]];
        for path in checked {
            assert!(tree.node(tree.find(&p(path)).unwrap()).is_checked(), "{path:?}");
        }
        assert_eq!(
            tree.selected_paths(),
            vec![
                FacetValue::path(["A", "x"]),
                FacetValue::path(["A", "y"]),
                FacetValue::path(["B", "x"]),
                FacetValue::path(["B", "y"]),
            ]
        );
    }

    #[test]
    fn single_child_chain_auto_expands_to_first_branch() {
        let f = facet(&[&["A"], &["A", "B"], &["A", "B", "x"], &["A", "B", "y"]]);
        let tree = TreeBuilder::new(&f).build().unwrap();
        let state = |path: &[&str]| tree.node(tree.find(&p(path)).unwrap()).expanded();
        assert_eq!(state(&["A"]), ExpandedState::auto());
        assert_eq!(state(&["A", "B"]), ExpandedState::auto());
        assert_eq!(state(&["A", "B", "x"]), ExpandedState::collapsed());
        assert_eq!(tree.visible().len(), 4);
    }

    #[test]
    fn branching_roots_stay_collapsed() {
        let tree = TreeBuilder::new(&facet(&[&["A", "x"], &["B"]])).build().unwrap();
        assert!(tree.iter().all(|(_, n)| !n.is_expanded()));
        assert_eq!(tree.visible().len(), 2);
    }

    #[test]
    fn stored_choice_beats_auto_expand() {
        let f = facet(&[&["A"], &["A", "x"], &["B"], &["B", "y"]]);
        let mut stored = ExpandedPaths::new();
        stored.set("category", &p(&["B"]), true);
        stored.set("other", &p(&["A"]), true);
        let tree = TreeBuilder::new(&f).with_expanded(&stored).build().unwrap();

        let b = tree.node(tree.find(&p(&["B"])).unwrap()).expanded();
        assert_eq!(b.source, ExpandSource::Persisted);
        assert!(b.expanded);
        assert!(!tree.node(tree.find(&p(&["A"])).unwrap()).is_expanded());
    }

    #[test]
    fn find_missing_path_is_none() {
        let tree = TreeBuilder::new(&facet(&[&["A"]])).build().unwrap();
        assert_eq!(tree.find(&p(&["Z"])), None);
        assert_eq!(tree.find(&[]), None);
    }
}
