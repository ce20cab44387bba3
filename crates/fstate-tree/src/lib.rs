#![forbid(unsafe_code)]

//! Hierarchical facet trees for fstate.
//!
//! - [`TreeBuilder`] turns a `checkbox-hierarchical` facet into a
//!   [`FacetTree`] with one node per category path.
//! - [`CheckedSync`] keeps parent and child checkboxes consistent and writes
//!   the result back into the selection, once per microtask drain.
//! - [`TreeBinding`] rebuilds the tree whenever a session's cache changes.

pub mod binding;
pub mod expand;
pub mod sync;
pub mod tree;

pub use binding::TreeBinding;
pub use expand::{ExpandSource, ExpandedState};
pub use sync::{CheckedSync, SelectionTarget};
pub use tree::{FacetTree, HierarchicalNode, NodeId, TreeBuilder, TreeError};
